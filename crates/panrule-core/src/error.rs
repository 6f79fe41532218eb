// ── Core error types ──
//
// Domain errors surfaced by the reconciliation engine. Transport-level
// failures from panrule-api are translated by the `From` impl below so
// resources and the CLI only ever match on these variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Validation errors ────────────────────────────────────────────
    /// Input rejected before any remote call.
    #[error("Invalid value for {attribute}: {message}")]
    Validation { attribute: String, message: String },

    /// A relative placement names a rule that is not in the rulebase.
    #[error("cannot position group {position} \"{reference}\": reference not present")]
    ReferenceMissing { position: String, reference: String },

    /// The stored composite identity could not be decoded.
    #[error("Invalid resource identity {id:?}: {message}")]
    Identity { id: String, message: String },

    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to appliance at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Operation timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Operation cancelled")]
    Cancelled,

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Object not found: {what}")]
    NotFound { what: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// The appliance response code, when one was returned.
        code: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a validation failure on `attribute`.
    pub fn validation(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            attribute: attribute.into(),
            message: message.into(),
        }
    }

    /// Whether this error is the "object not present" sentinel.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<panrule_api::Error> for CoreError {
    fn from(err: panrule_api::Error) -> Self {
        match err {
            panrule_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            panrule_api::Error::MissingApiKey => CoreError::AuthenticationFailed {
                message: "no API key configured".into(),
            },
            panrule_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map(ToString::to_string)
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        code: None,
                    }
                }
            }
            panrule_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            panrule_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            panrule_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            panrule_api::Error::ObjectNotFound { xpath } => CoreError::NotFound { what: xpath },
            panrule_api::Error::Api { code, message } => {
                if code == Some(panrule_api::error::CODE_OBJECT_NOT_PRESENT) {
                    CoreError::NotFound { what: message }
                } else {
                    CoreError::Api { message, code }
                }
            }
            panrule_api::Error::InvalidRequest(message) => CoreError::Validation {
                attribute: "name".into(),
                message,
            },
            panrule_api::Error::Malformed { message, .. } => CoreError::Api {
                message: format!("malformed response: {message}"),
                code: None,
            },
            panrule_api::Error::Encode(message) => CoreError::Internal(message),
            panrule_api::Error::UnsupportedOperation(op) => CoreError::Api {
                message: format!("unsupported operation: {op}"),
                code: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_missing_names_the_rule() {
        let err = CoreError::ReferenceMissing {
            position: "after".into(),
            reference: "c".into(),
        };
        assert_eq!(
            err.to_string(),
            "cannot position group after \"c\": reference not present"
        );
    }

    #[test]
    fn object_not_present_becomes_not_found() {
        let err: CoreError = panrule_api::Error::Api {
            code: Some(7),
            message: "No such node".into(),
        }
        .into();
        assert!(err.is_not_found());

        let err: CoreError = panrule_api::Error::ObjectNotFound {
            xpath: "/config/x".into(),
        }
        .into();
        assert!(err.is_not_found());
    }
}
