use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use tracing::{debug, warn};

use crate::credential::{AuthorizationData, Credential};
use crate::error::CredentialError;
use crate::source::TokenSource;

/// Turns a registry id into a usable push credential.
pub struct RegistryCredentialBridge<S> {
  source: S,
}

impl<S: TokenSource> RegistryCredentialBridge<S> {
  /// Create a bridge fetching tokens from `source`.
  pub fn new(source: S) -> Self {
    Self { source }
  }

  /// The token source backing this bridge.
  pub fn source(&self) -> &S {
    &self.source
  }

  /// Fetch and decode a fresh credential. Nothing is cached.
  pub async fn fetch(&self, registry_id: &str) -> Result<Credential, CredentialError> {
    let data = self.source.authorization_token(registry_id).await?;

    if data.expires_at <= Utc::now() {
      warn!(registry_id = %registry_id, expired_at = %data.expires_at, "authorization token already expired");
      return Err(CredentialError::Expired {
        registry_id: registry_id.to_string(),
        expired_at: data.expires_at.to_rfc3339(),
      });
    }

    let credential = decode(&data)?;
    debug!(
      registry_id = %registry_id,
      endpoint = %credential.endpoint,
      valid_until = %credential.valid_until,
      "registry credential fetched"
    );
    Ok(credential)
  }
}

fn decode(data: &AuthorizationData) -> Result<Credential, CredentialError> {
  let (username, password) = decode_token(&data.authorization_token)?;
  Ok(Credential {
    username,
    password,
    endpoint: data.proxy_endpoint.clone(),
    valid_until: data.expires_at,
  })
}

/// Decode a base64 `username:password` token.
///
/// Splits on the first colon only; the password may itself contain colons.
pub fn decode_token(token: &str) -> Result<(String, String), CredentialError> {
  let bytes = STANDARD
    .decode(token.trim())
    .map_err(|e| CredentialError::Malformed(format!("invalid base64: {}", e)))?;
  let text = String::from_utf8(bytes)
    .map_err(|_| CredentialError::Malformed("token is not valid UTF-8".to_string()))?;

  let (username, password) = text
    .split_once(':')
    .ok_or_else(|| CredentialError::Malformed("expected username:password".to_string()))?;
  if username.is_empty() {
    return Err(CredentialError::Malformed("empty username".to_string()));
  }

  Ok((username.to_string(), password.to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::source::StaticTokenSource;
  use chrono::Duration;

  fn auth(token: &str, expires_in: Duration) -> AuthorizationData {
    AuthorizationData {
      authorization_token: STANDARD.encode(token),
      proxy_endpoint: "https://123456789012.dkr.ecr.local".to_string(),
      expires_at: Utc::now() + expires_in,
    }
  }

  #[test]
  fn test_decode_token() {
    let (user, pass) = decode_token(&STANDARD.encode("user:pass")).unwrap();
    assert_eq!(user, "user");
    assert_eq!(pass, "pass");
  }

  #[test]
  fn test_decode_splits_on_first_colon() {
    let (user, pass) = decode_token(&STANDARD.encode("AWS:abc:def")).unwrap();
    assert_eq!(user, "AWS");
    assert_eq!(pass, "abc:def");
  }

  #[test]
  fn test_decode_empty_password() {
    let (user, pass) = decode_token(&STANDARD.encode("AWS:")).unwrap();
    assert_eq!(user, "AWS");
    assert_eq!(pass, "");
  }

  #[test]
  fn test_decode_malformed() {
    assert!(matches!(
      decode_token(&STANDARD.encode("nocolon")),
      Err(CredentialError::Malformed(_))
    ));
    assert!(matches!(
      decode_token(&STANDARD.encode(":secret")),
      Err(CredentialError::Malformed(_))
    ));
    assert!(matches!(decode_token("%%%not base64"), Err(CredentialError::Malformed(_))));
    assert!(matches!(
      decode_token(&STANDARD.encode([0xff, 0xfe, b':', b'x'])),
      Err(CredentialError::Malformed(_))
    ));
  }

  #[tokio::test]
  async fn test_fetch() {
    let source = StaticTokenSource::new().with_token("123456789012", auth("AWS:secret", Duration::hours(12)));
    let bridge = RegistryCredentialBridge::new(source);

    let credential = bridge.fetch("123456789012").await.unwrap();
    assert_eq!(credential.username, "AWS");
    assert_eq!(credential.password, "secret");
    assert_eq!(credential.endpoint, "https://123456789012.dkr.ecr.local");
    assert!(credential.is_valid_at(Utc::now()));
    assert!(!format!("{:?}", credential).contains("secret"));
  }

  #[tokio::test]
  async fn test_fetch_unknown_registry() {
    let bridge = RegistryCredentialBridge::new(StaticTokenSource::new());
    assert!(matches!(
      bridge.fetch("000000000000").await,
      Err(CredentialError::Lookup { .. })
    ));
  }

  #[tokio::test]
  async fn test_fetch_expired() {
    let source = StaticTokenSource::new().with_token("123456789012", auth("AWS:secret", Duration::minutes(-1)));
    let bridge = RegistryCredentialBridge::new(source);
    assert!(matches!(
      bridge.fetch("123456789012").await,
      Err(CredentialError::Expired { .. })
    ));
  }
}
