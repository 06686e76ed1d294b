//! The fixed status code vocabulary.

use std::fmt;

/// Every status code a method or its parent may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum StatusCode {
    Capabilities = 100,
    Log = 101,
    Status = 102,
    Redirect = 103,
    Warning = 104,
    UriStart = 200,
    UriDone = 201,
    AuxRequest = 351,
    UriFailure = 400,
    GeneralFailure = 401,
    AuthorizationRequired = 402,
    MediaFailure = 403,
    UriAcquire = 600,
    Configuration = 601,
    AuthorizationCredentials = 602,
    MediaChanged = 603,
}

impl StatusCode {
    /// All known codes, in numeric order.
    pub const ALL: [StatusCode; 16] = [
        Self::Capabilities,
        Self::Log,
        Self::Status,
        Self::Redirect,
        Self::Warning,
        Self::UriStart,
        Self::UriDone,
        Self::AuxRequest,
        Self::UriFailure,
        Self::GeneralFailure,
        Self::AuthorizationRequired,
        Self::MediaFailure,
        Self::UriAcquire,
        Self::Configuration,
        Self::AuthorizationCredentials,
        Self::MediaChanged,
    ];

    /// Numeric value of the code.
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// The summary text sent after the code.
    pub const fn summary(self) -> &'static str {
        match self {
            Self::Capabilities => "Capabilities",
            Self::Log => "Log",
            Self::Status => "Status",
            Self::Redirect => "Redirect",
            Self::Warning => "Warning",
            Self::UriStart => "URI Start",
            Self::UriDone => "URI Done",
            Self::AuxRequest => "Aux Request",
            Self::UriFailure => "URI Failure",
            Self::GeneralFailure => "General Failure",
            Self::AuthorizationRequired => "Authorization Required",
            Self::MediaFailure => "Media Failure",
            Self::UriAcquire => "URI Acquire",
            Self::Configuration => "Configuration",
            Self::AuthorizationCredentials => "Authorization Credentials",
            Self::MediaChanged => "Media Changed",
        }
    }

    /// Looks up a known code.
    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.code() == code)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.summary())
    }
}

/// Returns the status line text for a code (`"201 URI Done"`), or `None` if
/// the code is unknown.
pub fn status_text(code: u16) -> Option<String> {
    StatusCode::from_code(code).map(|status| status.to_string())
}
