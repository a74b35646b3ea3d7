use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use std::path::Path;

use crate::error::{AppError, Result};

#[derive(Debug, Serialize)]
struct JwtClaims {
    iat: i64,
    exp: i64,
    iss: String,
}

/// Sign an App JWT from PEM bytes. Valid from a minute ago for ten minutes.
pub fn sign_app_jwt(app_id: u64, key_pem: &[u8]) -> Result<String> {
    let encoding_key = EncodingKey::from_rsa_pem(key_pem)
        .map_err(|e| AppError::Config(format!("Invalid RSA private key: {e}")))?;

    let now = chrono::Utc::now().timestamp();
    let claims = JwtClaims {
        iat: now - 60,
        exp: now + 10 * 60,
        iss: app_id.to_string(),
    };

    encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
        .map_err(|e| AppError::Config(format!("Failed to generate JWT: {e}")))
}

/// Generate a JWT for GitHub App authentication from a key file.
pub fn generate_app_jwt(app_id: u64, private_key_path: &Path) -> Result<String> {
    let key_pem = std::fs::read(private_key_path).map_err(|e| {
        AppError::Config(format!(
            "Failed to read private key at {}: {e}",
            private_key_path.display()
        ))
    })?;

    sign_app_jwt(app_id, &key_pem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_file() {
        let err = generate_app_jwt(1, Path::new("/nonexistent/key.pem")).unwrap_err();
        assert!(err.to_string().contains("Failed to read private key"));
    }

    #[test]
    fn test_garbage_key_rejected() {
        let err = sign_app_jwt(1, b"not a pem").unwrap_err();
        assert!(err.to_string().contains("Invalid RSA private key"));
    }
}
