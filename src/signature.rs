//! Webhook signature verification.
//!
//! LINE signs each webhook body with HMAC-SHA256 keyed by the channel secret
//! and sends the base64-encoded digest in the `x-line-signature` header.
//! Verification runs over the raw body bytes, before any parsing.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use sha2::Sha256;
use std::io::Read;
use std::path::Path;

use crate::config::Secrets;
use crate::error::{RelayError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the request signature.
pub const SIGNATURE_HEADER: &str = "x-line-signature";

fn mac_for(secret: &[u8], body: &[u8]) -> HmacSha256 {
    // HMAC accepts keys of any length, so this cannot fail.
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(body);
    mac
}

/// Computes the base64 signature LINE would send for `body`.
pub fn sign(secret: &[u8], body: &[u8]) -> String {
    STANDARD.encode(mac_for(secret, body).finalize().into_bytes())
}

/// Checks `signature` against the MAC of `body`.
///
/// The digest comparison is constant-time. A signature that is not valid
/// base64 is rejected the same way as a mismatch.
pub fn verify(secret: &[u8], body: &[u8], signature: &str) -> Result<()> {
    let supplied = STANDARD
        .decode(signature.trim())
        .map_err(|_| RelayError::InvalidSignature)?;

    mac_for(secret, body)
        .verify_slice(&supplied)
        .map_err(|_| RelayError::InvalidSignature)
}

/// Prints the signature for a payload file (`-` reads stdin).
///
/// Backs `relay sign`, for sending hand-crafted webhooks to a local server.
pub fn run_sign(path: &Path) -> anyhow::Result<()> {
    use anyhow::Context as _;

    let secret = Secrets::channel_secret_from_env()?;

    let body = if path == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf)?;
        buf
    } else {
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?
    };

    println!("{}", sign(secret.expose_secret().as_bytes(), &body));
    Ok(())
}
