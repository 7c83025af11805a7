//! HMAC-SHA256 helpers keyed by the server secret
//!
//! Session tokens are stored only as keyed hashes. Flash cookies carry a
//! base64url payload followed by `.` and its base64url signature.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn mac_for(secret: &str, context: &str) -> Result<HmacSha256, String> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| format!("HMAC error: {}", e))?;
    // Separate keyspaces for session hashes and cookie signatures
    mac.update(context.as_bytes());
    mac.update(b"\0");
    Ok(mac)
}

/// Fresh random session token for the cookie
pub fn new_token() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

/// Hex digest under which a session token is stored
pub fn hash_token(token: &str, secret: &str) -> Result<String, String> {
    let mut mac = mac_for(secret, "session")?;
    mac.update(token.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// `payload_b64.signature_b64`
pub fn sign(payload: &[u8], secret: &str) -> Result<String, String> {
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload);
    let mut mac = mac_for(secret, "cookie")?;
    mac.update(payload_b64.as_bytes());
    let signature_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    Ok(format!("{}.{}", payload_b64, signature_b64))
}

/// Payload bytes of a value produced by [`sign`] with the same secret
pub fn verify(value: &str, secret: &str) -> Result<Vec<u8>, String> {
    let (payload_b64, signature_b64) = value
        .split_once('.')
        .ok_or_else(|| "Invalid signed value format".to_string())?;

    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| "Invalid signature encoding")?;

    let mut mac = mac_for(secret, "cookie")?;
    mac.update(payload_b64.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| "Invalid signature")?;

    URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| "Invalid payload encoding".to_string())
}
