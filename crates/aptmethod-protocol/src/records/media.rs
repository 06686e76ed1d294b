//! Media Failure (403) and Media Changed (603).

use crate::codec::Record;
use crate::field_record;
use crate::status::StatusCode;

field_record! {
    /// Asks the parent to insert `media` into `drive`.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct MediaFailure {
        pub media: String,
        pub drive: String,
    }
}

impl MediaFailure {
    pub fn new(media: impl Into<String>, drive: impl Into<String>) -> Self {
        Self {
            media: media.into(),
            drive: drive.into(),
        }
    }
}

impl Record for MediaFailure {
    const STATUS: StatusCode = StatusCode::MediaFailure;
}

field_record! {
    /// The parent's answer to a [`MediaFailure`]. `fail` means the user gave up.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct MediaChanged {
        pub media: String,
        pub fail: bool,
    }
}

impl Record for MediaChanged {
    const STATUS: StatusCode = StatusCode::MediaChanged;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[test]
    fn media_changed_fail_flag() {
        let message = Message::decode(b"603 Media Changed\nMedia: Debian 12 Disc 1\nFail: true").unwrap();
        let changed = MediaChanged::from_message(&message).unwrap();
        assert_eq!(changed.media, "Debian 12 Disc 1");
        assert!(changed.fail);

        let message = Message::decode(b"603 Media Changed\nMedia: Debian 12 Disc 1").unwrap();
        assert!(!MediaChanged::from_message(&message).unwrap().fail);
    }

    #[test]
    fn media_failure_fields() {
        let message = MediaFailure::new("Debian 12 Disc 2", "/media/cdrom").to_message().unwrap();
        assert_eq!(message.fields().get("Media"), Some("Debian 12 Disc 2"));
        assert_eq!(message.fields().get("Drive"), Some("/media/cdrom"));
    }
}
