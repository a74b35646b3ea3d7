use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Verify the `X-Hub-Signature-256` header (`sha256=<hex>`) over the raw body.
///
/// A missing header and an unset secret are both verification failures.
pub fn verify_signature(secret: &str, payload: &[u8], signature_header: Option<&str>) -> Result<()> {
    if secret.is_empty() {
        return Err(AppError::WebhookVerification(
            "Webhook secret is not configured".to_string(),
        ));
    }

    let header = signature_header.ok_or_else(|| {
        AppError::WebhookVerification("Missing X-Hub-Signature-256 header".to_string())
    })?;

    let signature_hex = header
        .strip_prefix("sha256=")
        .ok_or_else(|| AppError::WebhookVerification("Missing sha256= prefix".to_string()))?;

    let signature_bytes = hex::decode(signature_hex.trim())
        .map_err(|e| AppError::WebhookVerification(format!("Invalid hex in signature: {e}")))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::WebhookVerification(format!("Invalid HMAC key: {e}")))?;
    mac.update(payload);

    // Constant-time comparison.
    mac.verify_slice(&signature_bytes)
        .map_err(|_| AppError::WebhookVerification("Signature mismatch".to_string()))
}

/// Header value GitHub would send for `payload`.
pub fn sign(secret: &str, payload: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::WebhookVerification(format!("Invalid HMAC key: {e}")))?;
    mac.update(payload);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}
