use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub fn sign(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Checks a hex HMAC-SHA256 of the raw body, with or without a `sha256=` prefix.
pub fn verify_signature(secret: &str, body: &[u8], provided: &str) -> bool {
    let provided = provided.trim();
    let provided = provided.strip_prefix("sha256=").unwrap_or(provided);
    let Some(expected) = sign(secret, body) else {
        return false;
    };
    ConstantTimeEq::ct_eq(
        provided.to_ascii_lowercase().as_bytes(),
        expected.as_bytes(),
    )
    .into()
}
