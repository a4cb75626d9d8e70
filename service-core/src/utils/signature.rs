use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded HMAC-SHA256 of a raw request body.
pub fn sign_body(secret: &str, body: &[u8]) -> Result<String, anyhow::Error> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid key length: {}", e))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a hex HMAC-SHA256 body signature. An optional `sha256=` prefix is accepted.
pub fn verify_body_signature(
    secret: &str,
    body: &[u8],
    signature: &str,
) -> Result<bool, anyhow::Error> {
    let expected = sign_body(secret, body)?;
    let provided = signature.trim();
    let provided = provided.strip_prefix("sha256=").unwrap_or(provided);

    Ok(secrets_match(&expected, &provided.to_ascii_lowercase()))
}

/// Constant-time string equality for shared secrets and signatures.
pub fn secrets_match(expected: &str, provided: &str) -> bool {
    let expected_bytes = expected.as_bytes();
    let provided_bytes = provided.as_bytes();

    if expected_bytes.len() != provided_bytes.len() {
        return false;
    }

    expected_bytes.ct_eq(provided_bytes).into()
}
