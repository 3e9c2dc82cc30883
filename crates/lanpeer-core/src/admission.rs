//! Admission policy: the accept/reject decision for incoming connection attempts.
//!
//! Every attempt carries connect data; the initiator puts its copy of the
//! pre-shared key there.  The policy accepts when no key is configured, or
//! when the attempt's key matches the configured one.  Anything else is
//! rejected.  There are no retries and no partial acceptance, and the policy
//! keeps no state between calls.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::transport::ConnectionRequest;

/// Pre-shared key gating session establishment.
///
/// `Debug` and `Display` never print the key itself.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdmissionKey(String);

impl AdmissionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An empty key admits every connection attempt.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for AdmissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("AdmissionKey(<empty>)")
        } else {
            f.write_str("AdmissionKey(<redacted>)")
        }
    }
}

impl fmt::Display for AdmissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("<empty>")
        } else {
            f.write_str("<redacted>")
        }
    }
}

/// Outcome of [`AdmissionPolicy::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    Accept,
    Reject,
}

/// Stateless admission check against a configured [`AdmissionKey`].
#[derive(Debug, Clone)]
pub struct AdmissionPolicy {
    key: AdmissionKey,
}

impl AdmissionPolicy {
    pub fn new(key: AdmissionKey) -> Self {
        Self { key }
    }

    /// The key this policy checks against.
    pub fn key(&self) -> &AdmissionKey {
        &self.key
    }

    /// Decides whether `request` may open a session.
    pub fn evaluate(&self, request: &ConnectionRequest) -> AdmissionDecision {
        if self.key.is_empty() {
            return AdmissionDecision::Accept;
        }
        match request.key() {
            Some(offered) if offered == self.key.as_str() => AdmissionDecision::Accept,
            _ => AdmissionDecision::Reject,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RequestId;

    fn request_with(data: &[u8]) -> ConnectionRequest {
        ConnectionRequest::new(RequestId(0), "192.168.1.40:50123".parse().unwrap(), data.to_vec())
    }

    #[test]
    fn test_empty_key_accepts_any_request() {
        // Arrange
        let policy = AdmissionPolicy::new(AdmissionKey::default());

        // Act / Assert
        let cases: [&[u8]; 4] = [b"", b"TestKey", b"anything", &[0xFF, 0x00]];
        for data in cases {
            assert_eq!(policy.evaluate(&request_with(data)), AdmissionDecision::Accept);
        }
    }

    #[test]
    fn test_matching_key_is_accepted() {
        let policy = AdmissionPolicy::new(AdmissionKey::new("TestKey"));
        assert_eq!(
            policy.evaluate(&request_with(b"TestKey")),
            AdmissionDecision::Accept
        );
    }

    #[test]
    fn test_non_matching_keys_are_rejected() {
        // Arrange
        let policy = AdmissionPolicy::new(AdmissionKey::new("TestKey"));

        // Act / Assert
        let cases: [&[u8]; 5] = [b"", b"testkey", b"TestKey ", b"Test", &[0xC3, 0x28]];
        for data in cases {
            assert_eq!(
                policy.evaluate(&request_with(data)),
                AdmissionDecision::Reject,
                "connect data {data:?} must be rejected"
            );
        }
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let policy = AdmissionPolicy::new(AdmissionKey::new("k"));
        let request = request_with(b"k");
        assert_eq!(policy.evaluate(&request), policy.evaluate(&request));
    }

    #[test]
    fn test_admission_key_debug_is_redacted() {
        // Arrange
        let key = AdmissionKey::new("hunter2");

        // Act
        let debug = format!("{key:?}");
        let display = key.to_string();

        // Assert
        assert!(!debug.contains("hunter2"));
        assert!(!display.contains("hunter2"));
        assert_eq!(display, "<redacted>");
    }

    #[test]
    fn test_admission_key_empty_debug_says_empty() {
        assert_eq!(format!("{:?}", AdmissionKey::default()), "AdmissionKey(<empty>)");
    }
}
