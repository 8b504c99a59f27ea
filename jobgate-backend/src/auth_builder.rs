use std::sync::Arc;

use jobgate_auth::{AuthenticatorTrait, HeaderAuthenticator, JwtAuthenticator};
use jobgate_config::{AuthMode, Config};
use sha2::{Digest, Sha256};

/// Metadata about the configured authentication for logging purposes.
#[derive(Debug)]
pub struct AuthKeyInfo {
    pub mode: String,
    pub fingerprint: Option<String>,
    pub key_type: Option<String>,
}

/// Result of building an authenticator: the trait object and associated metadata.
pub type AuthResult = Result<(Arc<dyn AuthenticatorTrait>, AuthKeyInfo), String>;

/// Build authenticator from config.
///
/// In jwt mode tries JWT_PEM (inline), JWT_PEM_PATH (file), then JWT_SECRET in order.
pub fn build_authenticator_from_config(cfg: &Config) -> AuthResult {
    if cfg.auth.mode == AuthMode::Header {
        let auth: Arc<dyn AuthenticatorTrait> = Arc::new(HeaderAuthenticator);
        return Ok((
            auth,
            AuthKeyInfo {
                mode: "header(email)".into(),
                fingerprint: None,
                key_type: None,
            },
        ));
    }

    // Try inline PEM first
    if let Some(ref pem_inline) = cfg.auth.jwt_pem {
        return build_rs256_auth(pem_inline.clone(), "RS256(inline)".into());
    }

    // Try PEM from file path
    if let Some(ref pem_path) = cfg.auth.jwt_pem_path {
        let pem_content = std::fs::read_to_string(pem_path)
            .map_err(|e| format!("failed to read JWT_PEM_PATH '{pem_path}': {e}"))?;
        return build_rs256_auth(pem_content, format!("RS256(path={pem_path})"));
    }

    // Try HS256 secret
    if let Some(ref secret) = cfg.auth.jwt_secret {
        let fingerprint = compute_fingerprint(secret.as_bytes());
        let auth: Arc<dyn AuthenticatorTrait> =
            Arc::new(JwtAuthenticator::new_hs256(secret.clone()));
        return Ok((
            auth,
            AuthKeyInfo {
                mode: "HS256(secret)".into(),
                fingerprint,
                key_type: Some("HS256".into()),
            },
        ));
    }

    Err(
        "no JWT configuration found: set JWT_PEM (inline) or JWT_PEM_PATH (file) or JWT_SECRET"
            .into(),
    )
}

/// Build RS256 authenticator from PEM content string.
fn build_rs256_auth(pem_content: String, mode: String) -> AuthResult {
    let pem_parsed =
        pem::parse(pem_content.as_bytes()).map_err(|e| format!("failed to parse PEM: {e}"))?;

    let fingerprint = compute_fingerprint(pem_parsed.contents());
    let key_type = Some(pem_parsed.tag().to_string());
    let auth: Arc<dyn AuthenticatorTrait> = Arc::new(JwtAuthenticator::new_rs256(pem_content));

    Ok((
        auth,
        AuthKeyInfo {
            mode,
            fingerprint,
            key_type,
        },
    ))
}

/// Compute SHA256 fingerprint (first 12 hex chars) of raw bytes.
fn compute_fingerprint(data: &[u8]) -> Option<String> {
    let digest = Sha256::digest(data);
    hex::encode(digest).get(..12).map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_mode_needs_no_key() {
        let (_, info) = build_authenticator_from_config(&Config::default()).expect("header");
        assert_eq!(info.mode, "header(email)");
        assert!(info.fingerprint.is_none());
    }

    #[test]
    fn jwt_mode_with_secret_reports_fingerprint() {
        let mut cfg = Config::default();
        cfg.auth.mode = AuthMode::Jwt;
        cfg.auth.jwt_secret = Some("s3cret".into());
        let (_, info) = build_authenticator_from_config(&cfg).expect("jwt");
        assert_eq!(info.key_type.as_deref(), Some("HS256"));
        assert_eq!(info.fingerprint.as_deref().map(str::len), Some(12));
    }

    #[test]
    fn jwt_mode_without_key_fails() {
        let mut cfg = Config::default();
        cfg.auth.mode = AuthMode::Jwt;
        assert!(build_authenticator_from_config(&cfg).is_err());

        cfg.auth.jwt_pem = Some("not a pem".into());
        assert!(build_authenticator_from_config(&cfg).is_err());
    }
}
