use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuoteError {
    #[error("Live resolution unavailable: {reason}")]
    ModeUnavailable { reason: String },

    #[error("Transport failure calling {endpoint}: {message}")]
    TransportFailure {
        endpoint: String,
        message: String,
        timed_out: bool,
    },

    #[error("Upstream {endpoint} responded {status}: {detail}")]
    UpstreamFailure {
        endpoint: String,
        status: u16,
        detail: String,
    },

    #[error("Failed to parse {context}: {message}")]
    ParseFailure { context: String, message: String },

    #[error("Missing or malformed Authorization header")]
    Unauthorized,

    #[error("Refresh token rejected")]
    Forbidden,

    #[error("Refresh is not configured: {message}")]
    RefreshConfigError { message: String },

    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Upstream,
    Data,
    Authorization,
    Input,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl QuoteError {
    pub fn transport(endpoint: &str, err: reqwest::Error) -> Self {
        QuoteError::TransportFailure {
            endpoint: endpoint.to_string(),
            timed_out: err.is_timeout(),
            message: err.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        QuoteError::ValidationError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            QuoteError::ModeUnavailable { .. }
            | QuoteError::ConfigError { .. }
            | QuoteError::InvalidConfigValueError { .. }
            | QuoteError::MissingConfigError { .. }
            | QuoteError::RefreshConfigError { .. } => ErrorCategory::Configuration,
            QuoteError::TransportFailure { .. } | QuoteError::HttpClientError(_) => {
                ErrorCategory::Network
            }
            QuoteError::UpstreamFailure { .. } => ErrorCategory::Upstream,
            QuoteError::ParseFailure { .. }
            | QuoteError::SerializationError(_)
            | QuoteError::CsvError(_) => ErrorCategory::Data,
            QuoteError::Unauthorized | QuoteError::Forbidden => ErrorCategory::Authorization,
            QuoteError::ValidationError { .. } => ErrorCategory::Input,
            QuoteError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network | ErrorCategory::Upstream => ErrorSeverity::Medium,
            ErrorCategory::Input | ErrorCategory::Authorization | ErrorCategory::Data => {
                ErrorSeverity::High
            }
            ErrorCategory::Configuration | ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// 只有傳輸層失敗值得在更高層重試
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            QuoteError::TransportFailure { .. } | QuoteError::HttpClientError(_)
        )
    }

    /// HTTP status used when the error crosses the server boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            QuoteError::Unauthorized => 401,
            QuoteError::Forbidden => 403,
            QuoteError::ValidationError { .. } => 400,
            QuoteError::ModeUnavailable { .. } => 503,
            QuoteError::TransportFailure { timed_out: true, .. } => 504,
            QuoteError::TransportFailure { .. }
            | QuoteError::UpstreamFailure { .. }
            | QuoteError::ParseFailure { .. }
            | QuoteError::HttpClientError(_) => 502,
            _ => 500,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            QuoteError::ModeUnavailable { .. } => {
                "Live prices are disabled; only cached prices can be shown".to_string()
            }
            QuoteError::TransportFailure { timed_out: true, .. } => {
                "The price service took too long to answer".to_string()
            }
            QuoteError::TransportFailure { .. } => "Could not reach the price service".to_string(),
            QuoteError::UpstreamFailure { detail, .. } => {
                format!("The price service reported an error: {}", detail)
            }
            QuoteError::Unauthorized => "Authorization is required".to_string(),
            QuoteError::Forbidden => "The supplied token is not valid".to_string(),
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => "Check the [resolver], [remote] and [refresh] sections of the config file",
            ErrorCategory::Network => "Retry later or check that the backend is online",
            ErrorCategory::Upstream => "Inspect the backend logs; cached prices remain available",
            ErrorCategory::Data => "Verify the JSON shape of the cache or backend response",
            ErrorCategory::Authorization => "Send 'Authorization: Bearer <secret>' with the configured secret",
            ErrorCategory::Input => "Use YYYY-MM-DD dates with check-in before check-out",
            ErrorCategory::System => "Check file paths and permissions",
        }
    }
}

pub type Result<T> = std::result::Result<T, QuoteError>;
