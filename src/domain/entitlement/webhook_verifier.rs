//! Webhook signature verification.
//!
//! Implements verification of processor webhook signatures using HMAC-SHA256,
//! with timestamp validation to prevent replay attacks.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::processor_event::ProcessorEvent;
use super::webhook_errors::WebhookError;

/// Maximum allowed age for webhook events (5 minutes).
const MAX_EVENT_AGE_SECS: i64 = 300;

/// Maximum allowed clock skew for future events (1 minute).
const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Parsed components from the signature header.
///
/// Format: `t=<timestamp>,v1=<signature>[,v0=<legacy>]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Unix timestamp when the signature was generated.
    pub timestamp: i64,
    /// v1 signature (HMAC-SHA256).
    pub v1_signature: Vec<u8>,
    /// Optional v0 legacy signature.
    pub v0_signature: Option<Vec<u8>>,
}

impl SignatureHeader {
    /// Parses a signature header string.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::ParseError` if the header format is invalid.
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp: Option<i64> = None;
        let mut v1_signature: Option<Vec<u8>> = None;
        let mut v0_signature: Option<Vec<u8>> = None;

        for part in header.split(',') {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| WebhookError::ParseError("invalid header format".to_string()))?;

            match key.trim() {
                "t" => {
                    timestamp = Some(value.trim().parse().map_err(|_| {
                        WebhookError::ParseError("invalid timestamp".to_string())
                    })?);
                }
                "v1" => {
                    v1_signature = Some(hex_decode(value.trim()).ok_or_else(|| {
                        WebhookError::ParseError("invalid v1 signature hex".to_string())
                    })?);
                }
                "v0" => {
                    v0_signature = Some(hex_decode(value.trim()).ok_or_else(|| {
                        WebhookError::ParseError("invalid v0 signature hex".to_string())
                    })?);
                }
                _ => {
                    // Ignore unknown fields for forward compatibility
                }
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| WebhookError::ParseError("missing timestamp".to_string()))?;
        let v1_signature = v1_signature
            .ok_or_else(|| WebhookError::ParseError("missing v1 signature".to_string()))?;

        Ok(SignatureHeader {
            timestamp,
            v1_signature,
            v0_signature,
        })
    }
}

/// Decode a hex string to bytes.
fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    // The pair slicing below assumes single-byte characters.
    if hex.len() % 2 != 0 || !hex.is_ascii() {
        return None;
    }

    let mut bytes = Vec::with_capacity(hex.len() / 2);
    for i in (0..hex.len()).step_by(2) {
        let byte = u8::from_str_radix(&hex[i..i + 2], 16).ok()?;
        bytes.push(byte);
    }
    Some(bytes)
}

/// Encode bytes to hex string.
#[cfg(test)]
fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Verifier for processor webhook signatures.
pub struct WebhookVerifier {
    /// The webhook signing secret from the processor dashboard.
    secret: String,
}

impl WebhookVerifier {
    /// Creates a new verifier with the given webhook secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Verifies the webhook signature and parses the event.
    ///
    /// # Verification Steps
    ///
    /// 1. Parse the signature header
    /// 2. Validate timestamp is within acceptable range
    /// 3. Compute expected signature using HMAC-SHA256
    /// 4. Compare signatures using constant-time comparison
    /// 5. Parse the JSON payload into a ProcessorEvent
    ///
    /// # Errors
    ///
    /// - `InvalidSignature` - signature verification failed
    /// - `TimestampOutOfRange` - event is older than 5 minutes
    /// - `InvalidTimestamp` - event timestamp is in the future
    /// - `ParseError` - failed to parse header or JSON payload
    pub fn verify_and_parse(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<ProcessorEvent, WebhookError> {
        let header = SignatureHeader::parse(signature_header)?;

        self.validate_timestamp(header.timestamp)?;

        let expected_signature = self.compute_signature(header.timestamp, payload);

        if !constant_time_compare(&expected_signature, &header.v1_signature) {
            return Err(WebhookError::InvalidSignature);
        }

        let event: ProcessorEvent = serde_json::from_slice(payload)
            .map_err(|e| WebhookError::ParseError(e.to_string()))?;

        Ok(event)
    }

    /// Validates that the timestamp is within acceptable bounds.
    fn validate_timestamp(&self, timestamp: i64) -> Result<(), WebhookError> {
        let now = chrono::Utc::now().timestamp();
        let age = now - timestamp;

        // Reject events that are too old
        if age > MAX_EVENT_AGE_SECS {
            return Err(WebhookError::TimestampOutOfRange);
        }

        // Reject events from the future (with clock skew tolerance)
        if age < -MAX_CLOCK_SKEW_SECS {
            return Err(WebhookError::InvalidTimestamp);
        }

        Ok(())
    }

    /// Computes the HMAC-SHA256 signature for the given timestamp and payload.
    fn compute_signature(&self, timestamp: i64, payload: &[u8]) -> Vec<u8> {
        let signed_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));

        let mut mac =
            Hmac::<Sha256>::new_from_slice(self.secret.as_bytes()).expect("HMAC accepts any key");
        mac.update(signed_payload.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

/// Performs constant-time comparison of two byte slices.
///
/// Prevents timing attacks that could leak information about the expected
/// signature.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Computes an HMAC-SHA256 signature header value for test fixtures.
#[cfg(test)]
pub fn compute_test_signature(secret: &str, timestamp: i64, payload: &str) -> String {
    let signed_payload = format!("{}.{}", timestamp, payload);
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key");
    mac.update(signed_payload.as_bytes());
    hex_encode(&mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "whsec_test_secret_12345";

    fn test_payload() -> String {
        serde_json::json!({
            "id": "evt_verify_1",
            "type": "customer.subscription.updated",
            "created": chrono::Utc::now().timestamp(),
            "data": { "object": {} },
            "livemode": false,
            "api_version": "2023-10-16"
        })
        .to_string()
    }

    fn signed_header(secret: &str, timestamp: i64, payload: &str) -> String {
        format!(
            "t={},v1={}",
            timestamp,
            compute_test_signature(secret, timestamp, payload)
        )
    }

    // ══════════════════════════════════════════════════════════════
    // SignatureHeader Parsing Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn parse_header_with_v1_only() {
        let signature = "a".repeat(64);
        let header_str = format!("t=1234567890,v1={}", signature);

        let header = SignatureHeader::parse(&header_str).unwrap();

        assert_eq!(header.timestamp, 1234567890);
        assert_eq!(header.v1_signature.len(), 32);
        assert!(header.v0_signature.is_none());
    }

    #[test]
    fn parse_header_with_v0_and_v1() {
        let v1_sig = "a".repeat(64);
        let v0_sig = "b".repeat(64);
        let header_str = format!("t=1234567890,v1={},v0={}", v1_sig, v0_sig);

        let header = SignatureHeader::parse(&header_str).unwrap();

        assert_eq!(header.timestamp, 1234567890);
        assert!(header.v0_signature.is_some());
    }

    #[test]
    fn parse_header_ignores_unknown_fields() {
        let header_str = format!("t=1234567890,v1={},v2=future", "a".repeat(64));
        let header = SignatureHeader::parse(&header_str).unwrap();
        assert_eq!(header.timestamp, 1234567890);
    }

    #[test]
    fn parse_header_missing_timestamp_fails() {
        let result = SignatureHeader::parse(&format!("v1={}", "a".repeat(64)));
        assert!(matches!(result, Err(WebhookError::ParseError(_))));
    }

    #[test]
    fn parse_header_missing_v1_fails() {
        let result = SignatureHeader::parse("t=1234567890,v0=aabbccdd");
        assert!(matches!(result, Err(WebhookError::ParseError(_))));
    }

    #[test]
    fn parse_header_invalid_hex_fails() {
        let result = SignatureHeader::parse("t=1234567890,v1=not_valid_hex_xyz");
        assert!(matches!(result, Err(WebhookError::ParseError(_))));
    }

    #[test]
    fn parse_header_odd_length_hex_fails() {
        let result = SignatureHeader::parse("t=1234567890,v1=abc");
        assert!(matches!(result, Err(WebhookError::ParseError(_))));
    }

    // ══════════════════════════════════════════════════════════════
    // Verification Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn valid_signature_verifies_and_parses() {
        let verifier = WebhookVerifier::new(TEST_SECRET);
        let payload = test_payload();
        let timestamp = chrono::Utc::now().timestamp();
        let header = signed_header(TEST_SECRET, timestamp, &payload);

        let event = verifier.verify_and_parse(payload.as_bytes(), &header).unwrap();

        assert_eq!(event.id, "evt_verify_1");
        assert_eq!(event.event_type, "customer.subscription.updated");
    }

    #[test]
    fn wrong_secret_rejected() {
        let verifier = WebhookVerifier::new(TEST_SECRET);
        let payload = test_payload();
        let timestamp = chrono::Utc::now().timestamp();
        let header = signed_header("whsec_wrong_secret", timestamp, &payload);

        let result = verifier.verify_and_parse(payload.as_bytes(), &header);
        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
    }

    #[test]
    fn tampered_payload_rejected() {
        let verifier = WebhookVerifier::new(TEST_SECRET);
        let payload = test_payload();
        let timestamp = chrono::Utc::now().timestamp();
        let header = signed_header(TEST_SECRET, timestamp, &payload);

        let tampered = payload.replace("evt_verify_1", "evt_attacker");
        let result = verifier.verify_and_parse(tampered.as_bytes(), &header);
        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
    }

    #[test]
    fn stale_timestamp_rejected() {
        let verifier = WebhookVerifier::new(TEST_SECRET);
        let payload = test_payload();
        let timestamp = chrono::Utc::now().timestamp() - MAX_EVENT_AGE_SECS - 10;
        let header = signed_header(TEST_SECRET, timestamp, &payload);

        let result = verifier.verify_and_parse(payload.as_bytes(), &header);
        assert!(matches!(result, Err(WebhookError::TimestampOutOfRange)));
    }

    #[test]
    fn timestamp_at_age_boundary_accepted() {
        let verifier = WebhookVerifier::new(TEST_SECRET);
        let payload = test_payload();
        let timestamp = chrono::Utc::now().timestamp() - MAX_EVENT_AGE_SECS + 5;
        let header = signed_header(TEST_SECRET, timestamp, &payload);

        assert!(verifier.verify_and_parse(payload.as_bytes(), &header).is_ok());
    }

    #[test]
    fn future_timestamp_rejected() {
        let verifier = WebhookVerifier::new(TEST_SECRET);
        let payload = test_payload();
        let timestamp = chrono::Utc::now().timestamp() + MAX_CLOCK_SKEW_SECS + 30;
        let header = signed_header(TEST_SECRET, timestamp, &payload);

        let result = verifier.verify_and_parse(payload.as_bytes(), &header);
        assert!(matches!(result, Err(WebhookError::InvalidTimestamp)));
    }

    #[test]
    fn small_future_skew_tolerated() {
        let verifier = WebhookVerifier::new(TEST_SECRET);
        let payload = test_payload();
        let timestamp = chrono::Utc::now().timestamp() + 30;
        let header = signed_header(TEST_SECRET, timestamp, &payload);

        assert!(verifier.verify_and_parse(payload.as_bytes(), &header).is_ok());
    }

    #[test]
    fn malformed_json_with_valid_signature_is_parse_error() {
        let verifier = WebhookVerifier::new(TEST_SECRET);
        let payload = "{not json";
        let timestamp = chrono::Utc::now().timestamp();
        let header = signed_header(TEST_SECRET, timestamp, payload);

        let result = verifier.verify_and_parse(payload.as_bytes(), &header);
        assert!(matches!(result, Err(WebhookError::ParseError(_))));
    }

    // ══════════════════════════════════════════════════════════════
    // Hex Helper Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn hex_decode_roundtrip() {
        let original = vec![0xde, 0xad, 0xbe, 0xef];
        let encoded = hex_encode(&original);
        assert_eq!(hex_decode(&encoded).unwrap(), original);
    }

    #[test]
    fn hex_decode_rejects_odd_length() {
        assert!(hex_decode("abc").is_none());
    }

    #[test]
    fn hex_decode_rejects_non_ascii() {
        // Even byte length, but slicing at 2-byte steps would split the
        // multi-byte characters.
        assert!(hex_decode("éé").is_none());
    }
}
