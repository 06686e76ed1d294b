//! Authorization Required (402) and Authorization Credentials (602).

use std::fmt;

use crate::codec::Record;
use crate::field_record;
use crate::status::StatusCode;

field_record! {
    /// Asks the parent for credentials for `site`.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct AuthorizationRequired {
        pub site: String,
    }
}

impl AuthorizationRequired {
    pub fn new(site: impl Into<String>) -> Self {
        Self { site: site.into() }
    }
}

impl Record for AuthorizationRequired {
    const STATUS: StatusCode = StatusCode::AuthorizationRequired;
}

field_record! {
    /// The parent's answer to an [`AuthorizationRequired`].
    #[derive(Clone, Default, PartialEq, Eq)]
    pub struct AuthorizationCredentials {
        pub site: String,
        pub user: String,
        pub password: String,
    }
}

impl fmt::Debug for AuthorizationCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationCredentials")
            .field("site", &self.site)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Record for AuthorizationCredentials {
    const STATUS: StatusCode = StatusCode::AuthorizationCredentials;
}
