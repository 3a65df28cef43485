//! Unified Error Model
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeoGuardError {
    #[error("GEO/COORDINATE: {0}")]
    InvalidCoordinate(String),

    #[error("GEO/LOCATION: {0}")]
    InvalidLocation(String),

    #[error("CONFIG/NO_ACTIVE: no active spoofing detection config")]
    NoActiveConfig,

    #[error("CONFIG/INVALID: {0}")]
    InvalidConfig(String),

    #[error("CONFIG/NOT_FOUND: {0}")]
    ConfigNotFound(String),

    #[error("SIGNAL/COLLECTION: {0}")]
    SignalCollectionFailure(String),

    #[error("REVIEW/DUPLICATE: detection {0} was already reviewed")]
    AlreadyReviewed(String),

    #[error("REVIEW/NOT_FOUND: no detection {0}")]
    DetectionNotFound(String),

    #[error("ATTENDANCE/NOT_FOUND: no attendance event {0}")]
    AttendanceNotFound(String),

    #[error("SERIALIZE/{0}")]
    SerializeError(String),
}

impl GeoGuardError {
    /// Stable error code, the part before the first `:` of the message
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCoordinate(_) => "GEO/COORDINATE",
            Self::InvalidLocation(_) => "GEO/LOCATION",
            Self::NoActiveConfig => "CONFIG/NO_ACTIVE",
            Self::InvalidConfig(_) => "CONFIG/INVALID",
            Self::ConfigNotFound(_) => "CONFIG/NOT_FOUND",
            Self::SignalCollectionFailure(_) => "SIGNAL/COLLECTION",
            Self::AlreadyReviewed(_) => "REVIEW/DUPLICATE",
            Self::DetectionNotFound(_) => "REVIEW/NOT_FOUND",
            Self::AttendanceNotFound(_) => "ATTENDANCE/NOT_FOUND",
            Self::SerializeError(_) => "SERIALIZE",
        }
    }

    /// HTTP status a transport layer should use for this error.
    ///
    /// Failures inside spoofing evaluation map to 403: the attempt is
    /// treated as blocked, never silently allowed.
    pub fn status_hint(&self) -> u16 {
        match self {
            Self::InvalidCoordinate(_) | Self::InvalidConfig(_) | Self::SerializeError(_) => 400,
            Self::InvalidLocation(_)
            | Self::ConfigNotFound(_)
            | Self::DetectionNotFound(_)
            | Self::AttendanceNotFound(_) => 404,
            Self::AlreadyReviewed(_) => 409,
            Self::NoActiveConfig | Self::SignalCollectionFailure(_) => 403,
        }
    }
}

impl From<serde_json::Error> for GeoGuardError {
    fn from(err: serde_json::Error) -> Self {
        GeoGuardError::SerializeError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GeoGuardError>;
