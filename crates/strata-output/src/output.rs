use std::fmt;
use std::future::IntoFuture;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::oneshot;

use crate::error::OutputError;

type SharedResult<T> = Shared<BoxFuture<'static, Result<T, OutputError>>>;

/// A value that becomes known later, exactly once.
///
/// Cloning is cheap; every clone observes the same resolution.
pub struct Output<T> {
  inner: SharedResult<T>,
  label: Arc<str>,
}

/// The single writer of an [`Output`].
pub struct Producer<T> {
  sender: oneshot::Sender<Result<T, OutputError>>,
  label: Arc<str>,
}

impl<T> Clone for Output<T> {
  fn clone(&self) -> Self {
    Self {
      inner: self.inner.clone(),
      label: self.label.clone(),
    }
  }
}

impl<T> fmt::Debug for Output<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Output").field("label", &self.label).finish()
  }
}

impl<T> fmt::Debug for Producer<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Producer").field("label", &self.label).finish()
  }
}

impl<T> Output<T>
where
  T: Clone + Send + Sync + 'static,
{
  /// Create an unresolved output and the producer that will resolve it.
  pub fn pending(label: impl Into<String>) -> (Producer<T>, Output<T>) {
    let label: Arc<str> = Arc::from(label.into());
    let (sender, receiver) = oneshot::channel();

    let unresolved = label.clone();
    let fut = async move {
      match receiver.await {
        Ok(result) => result,
        Err(_) => Err(OutputError::Unresolved {
          label: unresolved.to_string(),
        }),
      }
    };

    let producer = Producer {
      sender,
      label: label.clone(),
    };
    (producer, Self::from_future(label, fut))
  }

  /// An output that is already known (a plain input).
  pub fn ready(label: impl Into<String>, value: T) -> Self {
    Self::from_future(Arc::from(label.into()), async move { Ok(value) })
  }

  /// An output that will never resolve.
  pub fn failed(label: impl Into<String>, error: OutputError) -> Self {
    Self::from_future(Arc::from(label.into()), async move { Err(error) })
  }

  fn from_future<F>(label: Arc<str>, fut: F) -> Self
  where
    F: std::future::Future<Output = Result<T, OutputError>> + Send + 'static,
  {
    Self {
      inner: fut.boxed().shared(),
      label,
    }
  }

  /// Name used in error messages.
  pub fn label(&self) -> &str {
    &self.label
  }

  /// Same value, different name in error messages.
  pub fn with_label(self, label: impl Into<String>) -> Self {
    Self {
      inner: self.inner,
      label: Arc::from(label.into()),
    }
  }

  /// Wait for the value.
  pub async fn get(&self) -> Result<T, OutputError> {
    self.inner.clone().await
  }

  /// Non-blocking look at the value: `None` while still pending.
  pub fn try_get(&self) -> Option<Result<T, OutputError>> {
    self.inner.clone().now_or_never()
  }

  /// Transform the value once it resolves.
  pub fn apply<U, F>(&self, f: F) -> Output<U>
  where
    U: Clone + Send + Sync + 'static,
    F: FnOnce(T) -> U + Send + 'static,
  {
    self.try_apply(move |value| Ok(f(value)))
  }

  /// Fallible [`apply`](Self::apply).
  pub fn try_apply<U, F>(&self, f: F) -> Output<U>
  where
    U: Clone + Send + Sync + 'static,
    F: FnOnce(T) -> Result<U, OutputError> + Send + 'static,
  {
    let source = self.inner.clone();
    Output::from_future(self.label.clone(), async move { f(source.await?) })
  }

  /// Wait for every input, then transform them together.
  ///
  /// The derived output is only computed after all inputs resolved, in input
  /// order. If any input fails, the derived output fails with that error.
  pub fn combine<U, F>(label: impl Into<String>, inputs: Vec<Output<T>>, f: F) -> Output<U>
  where
    U: Clone + Send + Sync + 'static,
    F: FnOnce(Vec<T>) -> U + Send + 'static,
  {
    Self::try_combine(label, inputs, move |values| Ok(f(values)))
  }

  /// Fallible [`combine`](Self::combine).
  pub fn try_combine<U, F>(label: impl Into<String>, inputs: Vec<Output<T>>, f: F) -> Output<U>
  where
    U: Clone + Send + Sync + 'static,
    F: FnOnce(Vec<T>) -> Result<U, OutputError> + Send + 'static,
  {
    let futures: Vec<SharedResult<T>> = inputs.into_iter().map(|o| o.inner).collect();
    Output::from_future(Arc::from(label.into()), async move {
      let values = futures::future::try_join_all(futures).await?;
      f(values)
    })
  }

  /// Pair two outputs of different types.
  pub fn zip<U>(&self, other: &Output<U>) -> Output<(T, U)>
  where
    U: Clone + Send + Sync + 'static,
  {
    let left = self.inner.clone();
    let right = other.inner.clone();
    let label = format!("({}, {})", self.label, other.label);
    Output::from_future(Arc::from(label), async move {
      futures::future::try_join(left, right).await
    })
  }
}

impl<T> IntoFuture for Output<T>
where
  T: Clone + Send + Sync + 'static,
{
  type Output = Result<T, OutputError>;
  type IntoFuture = SharedResult<T>;

  fn into_future(self) -> Self::IntoFuture {
    self.inner
  }
}

impl<T> Producer<T> {
  /// Name of the output this producer resolves.
  pub fn label(&self) -> &str {
    &self.label
  }

  /// Publish the value to every consumer.
  pub fn resolve(self, value: T) {
    // No receiver left means nobody is listening; nothing to do.
    let _ = self.sender.send(Ok(value));
  }

  /// Fail every consumer with a message.
  pub fn reject(self, message: impl Into<String>) {
    let error = OutputError::Rejected {
      label: self.label.to_string(),
      message: message.into(),
    };
    let _ = self.sender.send(Err(error));
  }
}
