use thiserror::Error;

/// Type alias for Result with TriageError
pub type Result<T> = std::result::Result<T, TriageError>;

/// Error taxonomy for the triage engine and the collaborators it talks to
#[derive(Error, Debug)]
pub enum TriageError {
    /// A rule is malformed: missing or conflicting matcher, bad age threshold
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// Search for a rule's matching messages failed
    #[error("Search failed for query `{query}`: {source}")]
    Locator {
        query: String,
        #[source]
        source: Box<TriageError>,
    },

    /// Batch label mutation failed as a whole
    #[error("Batch mutation of {count} messages failed: {source}")]
    Mutation {
        count: usize,
        #[source]
        source: Box<TriageError>,
    },

    /// The rule set could not be obtained or did not match the expected shape.
    /// Raised before any rule is processed; aborts the run.
    #[error("Rule set unavailable: {0}")]
    ConfigurationFatal(String),

    /// Gmail API returned an error
    #[error("Gmail API error: {0}")]
    ApiError(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Rate limit exceeded - should retry after specified seconds
    #[error("Rate limit exceeded, retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    /// Network-related error (connection issues, timeouts, etc.)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Server returned 5xx error
    #[error("Server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request (400), usually a query the store could not parse
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden (403)
    #[error("Access forbidden: {0}")]
    Forbidden(String),

    /// Label lookup or creation failed
    #[error("Label error: {0}")]
    LabelError(String),

    /// Configuration file error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// IO error (file operations, etc.)
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl TriageError {
    /// Check if the error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TriageError::RateLimitExceeded { .. }
                | TriageError::ServerError { .. }
                | TriageError::NetworkError(_)
        )
    }

    /// Check if the error is permanent and should not be retried
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// True for the only error kind that aborts a whole run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TriageError::ConfigurationFatal(_) | TriageError::ConfigError(_)
        )
    }

    pub(crate) fn locator(query: &str, source: TriageError) -> Self {
        TriageError::Locator {
            query: query.to_string(),
            source: Box::new(source),
        }
    }

    pub(crate) fn mutation(count: usize, source: TriageError) -> Self {
        TriageError::Mutation {
            count,
            source: Box::new(source),
        }
    }
}

/// Parse the Retry-After header from an HTTP response
///
/// Accepts delay-seconds ("120") or an HTTP-date. Missing, invalid or
/// past values fall back to 5 seconds.
fn parse_retry_after_header<B>(response: &hyper::Response<B>) -> u64 {
    const DEFAULT_RETRY_AFTER: u64 = 5;

    let Some(value) = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
    else {
        return DEFAULT_RETRY_AFTER;
    };

    if let Ok(seconds) = value.parse::<u64>() {
        return seconds;
    }

    httpdate::parse_http_date(value)
        .ok()
        .and_then(|when| when.duration_since(std::time::SystemTime::now()).ok())
        .map(|d| d.as_secs())
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

impl From<google_gmail1::Error> for TriageError {
    fn from(error: google_gmail1::Error) -> Self {
        match error {
            google_gmail1::Error::Failure(ref response) => {
                let status = response.status();
                let status_code = status.as_u16();
                let message = format!(
                    "HTTP {}: {}",
                    status_code,
                    status.canonical_reason().unwrap_or("Unknown")
                );

                match status_code {
                    429 => TriageError::RateLimitExceeded {
                        retry_after: parse_retry_after_header(response),
                    },
                    404 => TriageError::NotFound(message),
                    400 => TriageError::BadRequest(message),
                    403 => TriageError::Forbidden(message),
                    500..=599 => TriageError::ServerError {
                        status: status_code,
                        message,
                    },
                    _ => TriageError::ApiError(message),
                }
            }
            google_gmail1::Error::BadRequest(ref err) => TriageError::BadRequest(err.to_string()),
            google_gmail1::Error::HttpError(ref err) => {
                TriageError::NetworkError(format!("Connection error: {}", err))
            }
            google_gmail1::Error::Io(err) => TriageError::NetworkError(err.to_string()),
            _ => TriageError::ApiError(error.to_string()),
        }
    }
}
