//! Outcomes returned by the gate.

use serde::Serialize;

/// The result of a check-and-record call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// The operation was recorded. `timestamp` is the caller's `now`.
    Allowed { timestamp: String },
    /// The key is at its limit for this window. Nothing was recorded.
    Denied {
        key: String,
        current_count: u64,
        limit: u64,
    },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Decision::Denied { .. })
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Allowed { timestamp } => f.write_str(timestamp),
            Decision::Denied {
                key,
                current_count,
                limit,
            } => write!(f, "Rate limit reached {} {}/{}", key, current_count, limit),
        }
    }
}

/// Read-only view of a key's counter in the current window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub key: String,
    pub current_count: u64,
    pub limit: u64,
    pub remaining: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denied_message() {
        let decision = Decision::Denied {
            key: "K".to_string(),
            current_count: 10,
            limit: 10,
        };
        assert!(decision.is_denied());
        assert_eq!(decision.to_string(), "Rate limit reached K 10/10");
    }

    #[test]
    fn test_allowed_renders_timestamp() {
        let decision = Decision::Allowed {
            timestamp: "12:00:05".to_string(),
        };
        assert!(decision.is_allowed());
        assert_eq!(decision.to_string(), "12:00:05");
    }

    #[test]
    fn test_json_shape() {
        let decision = Decision::Denied {
            key: "K".to_string(),
            current_count: 3,
            limit: 3,
        };
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "decision": "denied",
                "key": "K",
                "current_count": 3,
                "limit": 3
            })
        );
    }
}
