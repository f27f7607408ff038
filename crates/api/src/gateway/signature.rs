//! Payment signature verification.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

use emporium_core::{OrderId, PaymentId};

type HmacSha256 = Hmac<Sha256>;

/// Errors from signature checks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    /// Supplied signature does not match.
    #[error("payment signature mismatch")]
    Mismatch,

    /// Secret could not key the MAC.
    #[error("invalid signature key")]
    InvalidKey,
}

/// HMAC-SHA256 signer/verifier for `order_id|payment_id`.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: SecretString,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl SignatureVerifier {
    #[must_use]
    pub const fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Lowercase hex signature for an order/payment pair.
    ///
    /// # Errors
    ///
    /// Returns `SignatureError::InvalidKey` if the secret cannot key the MAC.
    pub fn sign(&self, order_id: &OrderId, payment_id: &PaymentId) -> Result<String, SignatureError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| SignatureError::InvalidKey)?;
        mac.update(order_id.as_str().as_bytes());
        mac.update(b"|");
        mac.update(payment_id.as_str().as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Check a signature supplied by the client.
    ///
    /// # Errors
    ///
    /// Returns `SignatureError::Mismatch` unless the signature matches exactly.
    pub fn verify(
        &self,
        order_id: &OrderId,
        payment_id: &PaymentId,
        signature: &str,
    ) -> Result<(), SignatureError> {
        let expected = self.sign(order_id, payment_id)?;
        if constant_time_compare(&expected, signature) {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new(SecretString::from("test-signing-secret"))
    }

    fn ids() -> (OrderId, PaymentId) {
        (OrderId::new("order_ABC"), PaymentId::new("pay_XYZ"))
    }

    #[test]
    fn test_constant_time_compare_equal() {
        assert!(constant_time_compare("hello", "hello"));
        assert!(constant_time_compare("", ""));
    }

    #[test]
    fn test_constant_time_compare_not_equal() {
        assert!(!constant_time_compare("hello", "world"));
        assert!(!constant_time_compare("hello", "hell"));
        assert!(!constant_time_compare("hello", "helloo"));
    }

    #[test]
    fn test_sign_matches_manual_hmac() {
        let (order, payment) = ids();

        let mut mac = HmacSha256::new_from_slice(b"test-signing-secret").unwrap();
        mac.update(b"order_ABC|pay_XYZ");
        let expected = hex::encode(mac.finalize().into_bytes());

        let signature = verifier().sign(&order, &payment).unwrap();
        assert_eq!(signature, expected);
        assert_eq!(signature.len(), 64);
        assert!(signature.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)));
    }

    #[test]
    fn test_verify_accepts_valid_signature() {
        let (order, payment) = ids();
        let signature = verifier().sign(&order, &payment).unwrap();
        assert_eq!(verifier().verify(&order, &payment, &signature), Ok(()));
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let (order, payment) = ids();
        let signature = verifier().sign(&order, &payment).unwrap();

        let other_payment = PaymentId::new("pay_OTHER");
        assert_eq!(
            verifier().verify(&order, &other_payment, &signature),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            verifier().verify(&order, &payment, &signature.to_uppercase()),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            verifier().verify(&order, &payment, ""),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_verify_rejects_other_secret() {
        let (order, payment) = ids();
        let signature = SignatureVerifier::new(SecretString::from("another-secret"))
            .sign(&order, &payment)
            .unwrap();
        assert!(verifier().verify(&order, &payment, &signature).is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug_output = format!("{:?}", verifier());
        assert!(!debug_output.contains("test-signing-secret"));
    }
}
