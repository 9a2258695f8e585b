//! Request signing for webhook deliveries.
//!
//! The receiver recomputes `hex(HMAC-SHA256(secret, body))` over the raw
//! request body and compares it with the `X-Signature` header.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::services::delivery::error::DeliveryError;

type HmacSha256 = Hmac<Sha256>;

/// Signs the exact bytes that will be sent as the request body.
pub fn sign_payload(secret: &str, body: &str) -> Result<String, DeliveryError> {
	let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
		.map_err(|e| DeliveryError::Signing(format!("Invalid secret: {}", e)))?;
	mac.update(body.as_bytes());
	Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks a signature produced by [`sign_payload`] in constant time.
pub fn verify_signature(secret: &str, body: &str, signature: &str) -> bool {
	let Ok(expected) = hex::decode(signature) else {
		return false;
	};
	let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
		return false;
	};
	mac.update(body.as_bytes());
	mac.verify_slice(&expected).is_ok()
}
