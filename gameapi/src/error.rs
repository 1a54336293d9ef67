use thiserror::Error;

/// Domain error surfaced by every game API call.
///
/// Callers branch on [`ApiError::kind`]; the HTTP client is responsible for
/// normalizing transport and server responses into these variants so routine
/// code never inspects raw status codes or message strings.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("cooldown active: {seconds_left:.1}s left")]
    CooldownActive { seconds_left: f64 },

    #[error("bank not found on this map")]
    BankLocation,

    #[error("bank availability: {0}")]
    BankAvailability(String),

    #[error("insufficient skill: {0}")]
    InsufficientSkill(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("http {status}: {message}")]
    Http { status: u16, message: String },

    #[error("response parse error: {0}")]
    Parse(String),
}

/// Stable kind codes used in logs and block reasons.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Timeout,
    CooldownActive,
    BankLocation,
    BankAvailability,
    InsufficientSkill,
    NotFound,
    Http,
    Parse,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::CooldownActive => "cooldown_active",
            ErrorKind::BankLocation => "bank_location",
            ErrorKind::BankAvailability => "bank_availability",
            ErrorKind::InsufficientSkill => "insufficient_skill",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Http => "http",
            ErrorKind::Parse => "parse_error",
        }
    }
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Network(_) => ErrorKind::Network,
            ApiError::Timeout(_) => ErrorKind::Timeout,
            ApiError::CooldownActive { .. } => ErrorKind::CooldownActive,
            ApiError::BankLocation => ErrorKind::BankLocation,
            ApiError::BankAvailability(_) => ErrorKind::BankAvailability,
            ApiError::InsufficientSkill(_) => ErrorKind::InsufficientSkill,
            ApiError::NotFound(_) => ErrorKind::NotFound,
            ApiError::Http { .. } => ErrorKind::Http,
            ApiError::Parse(_) => ErrorKind::Parse,
        }
    }

    /// Transport-level failures worth an automatic retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Network(_) | ApiError::Timeout(_))
    }

    /// Classify a non-2xx server response by status and message.
    pub fn from_status(status: u16, message: &str) -> Self {
        let lower = message.to_ascii_lowercase();

        if status == 499 {
            // "Character in cooldown: 12.5 seconds left"
            let seconds_left = lower
                .split(':')
                .nth(1)
                .and_then(|rest| rest.trim().split(' ').next())
                .and_then(|n| n.parse::<f64>().ok())
                .unwrap_or(1.0);
            return ApiError::CooldownActive { seconds_left };
        }

        if lower.contains("bank not found on this map") {
            return ApiError::BankLocation;
        }

        if lower.contains("not enough") || lower.contains("insufficient quantity") {
            return ApiError::BankAvailability(message.to_string());
        }

        if lower.contains("skill level") || lower.contains("insufficient skill") {
            return ApiError::InsufficientSkill(message.to_string());
        }

        if status == 404 || lower.contains("not found") {
            // Availability-class when it's an item lookup; plain NotFound otherwise.
            if lower.contains("item") {
                return ApiError::BankAvailability(message.to_string());
            }
            return ApiError::NotFound(message.to_string());
        }

        ApiError::Http {
            status,
            message: message.to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout(e.to_string())
        } else if e.is_decode() {
            ApiError::Parse(e.to_string())
        } else {
            ApiError::Network(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_parses_seconds() {
        let e = ApiError::from_status(499, "Character in cooldown: 12.5 seconds left");
        match e {
            ApiError::CooldownActive { seconds_left } => assert_eq!(seconds_left, 12.5),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn location_fault_is_distinct_from_availability() {
        let loc = ApiError::from_status(598, "Bank not found on this map");
        assert_eq!(loc.kind(), ErrorKind::BankLocation);

        let avail = ApiError::from_status(478, "Not enough spruce_wood in bank");
        assert_eq!(avail.kind(), ErrorKind::BankAvailability);

        let missing = ApiError::from_status(404, "Item not found");
        assert_eq!(missing.kind(), ErrorKind::BankAvailability);
    }

    #[test]
    fn only_transport_errors_retry() {
        assert!(ApiError::Network("reset".into()).is_retryable());
        assert!(ApiError::Timeout("30s".into()).is_retryable());
        assert!(!ApiError::BankLocation.is_retryable());
        assert!(!ApiError::from_status(500, "boom").is_retryable());
    }
}
