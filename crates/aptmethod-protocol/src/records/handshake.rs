//! Capabilities (100) and Configuration (601).

use std::collections::BTreeMap;

use tracing::warn;

use crate::codec::{CodecResult, MarshalFields, Record, UnmarshalFields};
use crate::fields::Fields;
use crate::field_record;
use crate::status::StatusCode;

field_record! {
    /// What the method supports. Sent once, before anything else.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct Capabilities {
        pub single_instance: bool,
        pub needs_cleanup: bool,
        pub pipeline: bool,
        pub send_uri_encoded: bool as "Send-URI-Encoded",
        pub send_config: bool,
        pub removable: bool,
        pub aux_requests: bool as "AuxRequests",
        pub pre_scan: String,
        pub version: String,
    }
}

impl Capabilities {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..Default::default()
        }
    }
}

impl Record for Capabilities {
    const STATUS: StatusCode = StatusCode::Capabilities;
}

const CONFIG_ITEM: &str = "Config-Item";

/// Parent configuration: fully namespaced keys (`Acquire::http::Proxy`) to
/// raw values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    items: BTreeMap<String, String>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges every `Config-Item` of `fields`, later values winning.
    ///
    /// Items without `=` are skipped and returned.
    ///
    /// Field values are split on commas when the frame is parsed, and the
    /// lines of a repeated `Config-Item` are indistinguishable from the parts
    /// of one split value. An item whose value contains a comma therefore
    /// arrives cut at the first comma, and its tail comes back as a rejected
    /// item.
    pub fn merge_fields(&mut self, fields: &Fields) -> Vec<String> {
        let mut rejected = Vec::new();
        for item in fields.values(CONFIG_ITEM) {
            match item.split_once('=') {
                Some((key, value)) => {
                    self.items
                        .insert(key.trim().to_string(), value.trim().to_string());
                }
                None => rejected.push(item.clone()),
            }
        }
        rejected
    }

    /// Returns the keys under `prefix` with the prefix removed.
    ///
    /// `section("APT")` and `section("APT::")` are the same section.
    pub fn section(&self, prefix: &str) -> Configuration {
        let prefix = prefix.strip_suffix("::").unwrap_or(prefix);
        let prefix = format!("{prefix}::");
        let items = self
            .items
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(&prefix)
                    .map(|rest| (rest.to_string(), value.clone()))
            })
            .collect();
        Configuration { items }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.items.get(key).map(String::as_str)
    }

    /// Reads a key with the package manager's boolean spellings.
    ///
    /// Returns `None` when the key is absent or not a boolean.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)?.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" | "with" | "enable" => Some(true),
            "false" | "no" | "off" | "0" | "without" | "disable" => Some(false),
            _ => None,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.items.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.items
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl MarshalFields for Configuration {
    fn marshal_fields(&self) -> CodecResult<Fields> {
        let mut fields = Fields::new();
        for (key, value) in self.iter() {
            fields.add(CONFIG_ITEM, format!("{key}={value}"));
        }
        Ok(fields)
    }
}

impl UnmarshalFields for Configuration {
    fn unmarshal_fields(&mut self, fields: &Fields) -> CodecResult<()> {
        for item in self.merge_fields(fields) {
            warn!(item = %item, "Ignoring configuration item without '='");
        }
        Ok(())
    }
}

impl Record for Configuration {
    const STATUS: StatusCode = StatusCode::Configuration;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::from_fields;
    use crate::message::Message;

    #[test]
    fn handshake_encoding() {
        let capabilities = Capabilities {
            send_config: true,
            ..Capabilities::new("1.0")
        };
        let bytes = capabilities.to_message().unwrap().encode().unwrap();
        insta::assert_debug_snapshot!(
            String::from_utf8(bytes).unwrap(),
            @r#""100 Capabilities\nSend-Config: true\nVersion: 1.0\n\n""#
        );
    }

    #[test]
    fn every_capability() {
        let capabilities = Capabilities {
            single_instance: true,
            needs_cleanup: true,
            pipeline: true,
            send_uri_encoded: true,
            send_config: true,
            removable: true,
            aux_requests: true,
            pre_scan: "scan".into(),
            version: "2.0".into(),
        };
        let fields = capabilities.marshal_fields().unwrap();
        let keys: Vec<_> = fields.iter().map(|(key, _)| key).collect();
        assert_eq!(
            keys,
            [
                "Single-Instance",
                "Needs-Cleanup",
                "Pipeline",
                "Send-Uri-Encoded",
                "Send-Config",
                "Removable",
                "Auxrequests",
                "Pre-Scan",
                "Version",
            ]
        );
        assert_eq!(from_fields::<Capabilities>(&fields).unwrap(), capabilities);
    }

    fn config_message() -> Message {
        Message::decode(
            b"601 Configuration\n\
              Config-Item: APT::Architecture=amd64\n\
              Config-Item: APT::Get::Assume-Yes=true\n\
              Config-Item: Acquire::http::Proxy=http://proxy:3128/\n\
              Config-Item: APT::Get::Show-Versions=1",
        )
        .unwrap()
    }

    #[test]
    fn parses_config_items() {
        let config = Configuration::from_message(&config_message()).unwrap();
        assert_eq!(config.len(), 4);
        assert_eq!(config.get("APT::Architecture"), Some("amd64"));
        assert_eq!(config.get("Acquire::http::Proxy"), Some("http://proxy:3128/"));
    }

    #[test]
    fn section_trims_prefix() {
        let config = Configuration::from_message(&config_message()).unwrap();
        let get = config.section("APT::Get");
        assert_eq!(get.len(), 2);
        assert_eq!(get.get("Assume-Yes"), Some("true"));
        assert_eq!(get.get_bool("Show-Versions"), Some(true));
        assert_eq!(get, config.section("APT::Get::"));

        let apt = config.section("APT");
        assert_eq!(apt.get("Get::Assume-Yes"), Some("true"));
        assert!(config.section("APT::Missing").is_empty());
    }

    #[test]
    fn merge_reports_items_without_separator() {
        let mut config = Configuration::new();
        config.insert("Debug::Acquire", "false");
        let fields: Fields = [("Config-Item", "Debug::Acquire=true"), ("Config-Item", "broken")]
            .into_iter()
            .collect();
        assert_eq!(config.merge_fields(&fields), ["broken"]);
        assert_eq!(config.get_bool("Debug::Acquire"), Some(true));
        assert_eq!(config.get_bool("Missing"), None);
    }

    #[test]
    fn comma_in_item_value_is_cut() {
        let message = Message::decode(
            b"601 Configuration\nConfig-Item: Acquire::Languages=en,de",
        )
        .unwrap();
        let mut config = Configuration::new();
        assert_eq!(config.merge_fields(message.fields()), ["de"]);
        assert_eq!(config.get("Acquire::Languages"), Some("en"));
    }

    #[test]
    fn marshals_config_items() {
        let mut config = Configuration::new();
        config.insert("B::Key", "2");
        config.insert("A::Key", "x=y");
        let fields = config.marshal_fields().unwrap();
        assert_eq!(fields.values("config-item"), ["A::Key=x=y", "B::Key=2"]);

        let mut back = Configuration::new();
        back.unmarshal_fields(&fields).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn rejects_other_status() {
        let message = Message::decode(b"600 URI Acquire\nURI: http://a").unwrap();
        assert!(matches!(
            Configuration::from_message(&message),
            Err(crate::codec::CodecError::UnexpectedStatus { actual: 600, .. })
        ));
    }
}
