//! Strata Topology
//!
//! This crate provides the declared form of a deployment: a [`Topology`] of
//! [`Resource`]s whose dependency relation is a DAG, and the
//! [`TopologyBuilder`] that derives the container application stack from a
//! resolved [`strata_config::Config`].
//!
//! Key properties:
//! - A resource can only be added after every resource it depends on
//!   (missing dependencies fail at build time, before anything is submitted)
//! - Every resource gets one deferred output cell, so derived values like the
//!   public URL can be declared before anything exists
//! - [`Topology::order`] yields a submission order consistent with every edge

mod app;
mod binding;
mod builder;
mod error;
mod graph;
mod input;
mod resource;
mod topology;

pub use app::AppInfra;
pub use binding::{EndpointBinding, HealthCheck};
pub use builder::TopologyBuilder;
pub use error::TopologyError;
pub use graph::Graph;
pub use input::{AttributeRef, Input};
pub use resource::{Resource, ResourceId, ResourceKind};
pub use topology::{Plan, PlannedResource, Topology};
