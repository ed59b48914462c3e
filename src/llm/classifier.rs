//! Maps raw model/network errors to transient/terminal classifications.

use crate::error::codes;

/// An opaque error surfaced by the underlying model client. Real
/// providers raise HTTP-shaped failures; this mirrors the fields the
/// classifier actually inspects.
#[derive(Debug, Clone, Default)]
pub struct RawModelError {
    pub status: Option<u16>,
    pub code: Option<String>,
    pub message: String,
    pub retry_after_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Transient {
        code: String,
        retry_after_ms: Option<u64>,
    },
    Terminal {
        code: String,
    },
}

const NETWORK_CODES: [&str; 7] = [
    "ECONNRESET",
    "ETIMEDOUT",
    "ECONNREFUSED",
    "ENOTFOUND",
    "EAI_AGAIN",
    "ENETUNREACH",
    "EHOSTUNREACH",
];

/// Classification rules, first match wins.
pub fn classify(error: &RawModelError) -> Classification {
    let code = error.code.as_deref().unwrap_or_default();
    let message_lower = error.message.to_lowercase();

    if error.status == Some(429) || code == "rate_limit_exceeded" {
        return Classification::Transient {
            code: codes::RATE_LIMIT.to_string(),
            retry_after_ms: error.retry_after_secs.map(|secs| secs * 1000),
        };
    }

    if NETWORK_CODES.contains(&code) {
        return Classification::Transient {
            code: codes::NETWORK_ERROR.to_string(),
            retry_after_ms: None,
        };
    }

    if code == "timeout" || message_lower.contains("timeout") || message_lower.contains("timed out")
    {
        return Classification::Transient {
            code: codes::TIMEOUT.to_string(),
            retry_after_ms: None,
        };
    }

    if matches!(error.status, Some(500) | Some(502) | Some(503) | Some(504)) {
        return Classification::Transient {
            code: codes::SERVER_ERROR.to_string(),
            retry_after_ms: None,
        };
    }

    if error.status == Some(401) || code == "invalid_api_key" || code == "unauthorized" {
        return Classification::Terminal {
            code: codes::INVALID_API_KEY.to_string(),
        };
    }

    if error.status == Some(400) || code == "invalid_request_error" || code == "invalid_request" {
        return Classification::Terminal {
            code: codes::INVALID_REQUEST.to_string(),
        };
    }

    if error.status == Some(404) || code == "not_found" {
        let terminal_code = if message_lower.contains("model") {
            codes::INVALID_MODEL
        } else {
            codes::NOT_FOUND
        };
        return Classification::Terminal {
            code: terminal_code.to_string(),
        };
    }

    if code == "content_policy_violation"
        || code == "content_filter"
        || message_lower.contains("content policy")
        || message_lower.contains("content filter")
    {
        return Classification::Terminal {
            code: codes::CONTENT_POLICY_VIOLATION.to_string(),
        };
    }

    Classification::Terminal {
        code: if code.is_empty() {
            codes::UNKNOWN.to_string()
        } else {
            code.to_string()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16) -> RawModelError {
        RawModelError {
            status: Some(status),
            ..Default::default()
        }
    }

    #[test]
    fn classifies_429_as_transient_rate_limit() {
        let result = classify(&status(429));
        assert_eq!(
            result,
            Classification::Transient {
                code: "RATE_LIMIT".to_string(),
                retry_after_ms: None
            }
        );
    }

    #[test]
    fn classifies_401_as_terminal_invalid_api_key() {
        let result = classify(&status(401));
        assert_eq!(
            result,
            Classification::Terminal {
                code: "INVALID_API_KEY".to_string()
            }
        );
    }

    #[test]
    fn classifies_503_as_transient_server_error() {
        let result = classify(&status(503));
        assert_eq!(
            result,
            Classification::Transient {
                code: "SERVER_ERROR".to_string(),
                retry_after_ms: None
            }
        );
    }

    #[test]
    fn classifies_404_with_model_in_message_as_invalid_model() {
        let error = RawModelError {
            status: Some(404),
            message: "model gpt-9 not found".to_string(),
            ..Default::default()
        };
        assert_eq!(
            classify(&error),
            Classification::Terminal {
                code: "INVALID_MODEL".to_string()
            }
        );
    }

    #[test]
    fn unknown_error_falls_back_to_terminal_unknown() {
        let error = RawModelError::default();
        assert_eq!(
            classify(&error),
            Classification::Terminal {
                code: "UNKNOWN".to_string()
            }
        );
    }
}
