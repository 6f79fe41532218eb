use thiserror::Error;

/// PAN-OS response code for "object not present".
pub const CODE_OBJECT_NOT_PRESENT: u16 = 7;
/// PAN-OS response code for "unauthorized".
pub const CODE_UNAUTHORIZED: u16 = 16;
/// PAN-OS response code for "session timed out".
pub const CODE_SESSION_TIMEOUT: u16 = 22;

/// Top-level error type for the `panrule-api` crate.
///
/// Covers every failure mode of the XML API surface: authentication,
/// transport, the `<response status="error">` envelope, and XML decoding.
/// `panrule-core` maps these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Key generation or request authentication failed.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// No API key has been configured or generated yet.
    #[error("No API key available -- configure one or call keygen first")]
    MissingApiKey,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── XML API ─────────────────────────────────────────────────────
    /// The configuration object addressed by `xpath` does not exist.
    #[error("Object not present: {xpath}")]
    ObjectNotFound { xpath: String },

    /// Error envelope returned by the appliance.
    #[error("XML API error{}: {message}", code.map(|c| format!(" (code {c})")).unwrap_or_default())]
    Api { code: Option<u16>, message: String },

    /// An xpath or element could not be built from the given input.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // ── Data ────────────────────────────────────────────────────────
    /// Response body was not a well-formed response envelope.
    #[error("Malformed response: {message}")]
    Malformed { message: String, body: String },

    /// XML encoding failed while building a request element.
    #[error("XML encoding error: {0}")]
    Encode(String),

    // ── Platform ────────────────────────────────────────────────────
    /// Operation not supported on this appliance.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(&'static str),
}

impl Error {
    /// Returns `true` if this error indicates the key is no longer valid
    /// and re-authentication might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::MissingApiKey)
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::ObjectNotFound { .. } => true,
            Self::Api { code, .. } => *code == Some(CODE_OBJECT_NOT_PRESENT),
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            _ => false,
        }
    }

    /// Extract the API error code, if available.
    pub fn api_error_code(&self) -> Option<u16> {
        match self {
            Self::Api { code, .. } => *code,
            Self::ObjectNotFound { .. } => Some(CODE_OBJECT_NOT_PRESENT),
            _ => None,
        }
    }
}
