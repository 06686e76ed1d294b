//! Redirect (103) and Aux Request (351).

use url::Url;

use crate::codec::Record;
use crate::field_record;
use crate::status::StatusCode;

field_record! {
    /// `uri` should be fetched from `new_uri` instead.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct Redirect {
        pub uri: Option<Url> as "URI",
        pub new_uri: Option<Url> as "New-URI",
        pub alt_uris: Option<Url> as "Alt-URIs",
        pub used_mirror: bool as "Used-Mirror",
    }
}

impl Redirect {
    pub fn new(uri: Url, new_uri: Url) -> Self {
        Self {
            uri: Some(uri),
            new_uri: Some(new_uri),
            ..Default::default()
        }
    }
}

impl Record for Redirect {
    const STATUS: StatusCode = StatusCode::Redirect;
}

field_record! {
    /// Asks the parent to fetch an auxiliary file on behalf of `uri`.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct AuxRequest {
        pub uri: String as "URI",
        pub aux_uri: String as "Aux-URI",
        pub short_desc: String as "Aux-ShortDesc",
        pub description: String as "Aux-Description",
        pub maximum_size: Option<u64> as "MaximumSize",
    }
}

impl Record for AuxRequest {
    const STATUS: StatusCode = StatusCode::AuxRequest;
}
