use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const IDENTITY_VERSION: &str = "#";
const IDENTITY_SEPARATOR: char = ':';

/// Durable identity of a message: account, folder and server uid.
///
/// Unlike [`super::NotificationId`] this stays meaningful across restarts and is
/// the join key between notifications and the persisted store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageReference {
    pub account_uuid: String,
    pub folder_id: i64,
    pub uid: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageReferenceParseError {
    #[error("Unsupported identity version in {0:?}")]
    UnsupportedVersion(String),

    #[error("Expected 4 identity parts, got {0}")]
    WrongPartCount(usize),

    #[error("Invalid base64 in identity part {0:?}")]
    InvalidEncoding(String),

    #[error("Invalid folder id {0:?}")]
    InvalidFolderId(String),
}

impl MessageReference {
    pub fn new(account_uuid: impl Into<String>, folder_id: i64, uid: impl Into<String>) -> Self {
        Self {
            account_uuid: account_uuid.into(),
            folder_id,
            uid: uid.into(),
        }
    }

    /// Encodes the reference as `#:<b64 account>:<folder id>:<b64 uid>`, a form
    /// that is safe to hand to the platform as an opaque extra.
    pub fn to_identity_string(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}{sep}{}",
            IDENTITY_VERSION,
            STANDARD.encode(self.account_uuid.as_bytes()),
            self.folder_id,
            STANDARD.encode(self.uid.as_bytes()),
            sep = IDENTITY_SEPARATOR
        )
    }

    fn decode_part(part: &str) -> Result<String, MessageReferenceParseError> {
        STANDARD
            .decode(part)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .ok_or_else(|| MessageReferenceParseError::InvalidEncoding(part.to_string()))
    }
}

impl FromStr for MessageReference {
    type Err = MessageReferenceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(IDENTITY_SEPARATOR).collect();
        if parts.first() != Some(&IDENTITY_VERSION) {
            return Err(MessageReferenceParseError::UnsupportedVersion(
                s.to_string(),
            ));
        }
        if parts.len() != 4 {
            return Err(MessageReferenceParseError::WrongPartCount(parts.len()));
        }

        let account_uuid = Self::decode_part(parts[1])?;
        let folder_id = parts[2]
            .parse::<i64>()
            .map_err(|_| MessageReferenceParseError::InvalidFolderId(parts[2].to_string()))?;
        let uid = Self::decode_part(parts[3])?;

        Ok(Self {
            account_uuid,
            folder_id,
            uid,
        })
    }
}

impl fmt::Display for MessageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.account_uuid, self.folder_id, self.uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_string_round_trip() {
        let reference = MessageReference::new("00000000-0000-4000-0000-000000000000", 42, "msg:1");

        let identity = reference.to_identity_string();
        assert!(identity.starts_with("#:"));
        // Separators inside the uid must not leak into the encoded form
        assert_eq!(identity.matches(':').count(), 3);

        let parsed: MessageReference = identity.parse().unwrap();
        assert_eq!(parsed, reference);
    }

    #[test]
    fn test_parse_rejects_unknown_version() {
        let result = "!:YQ==:1:Yg==".parse::<MessageReference>();
        assert!(matches!(
            result,
            Err(MessageReferenceParseError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_parse_rejects_wrong_part_count() {
        let result = "#:YQ==:1".parse::<MessageReference>();
        assert_eq!(result, Err(MessageReferenceParseError::WrongPartCount(3)));
    }

    #[test]
    fn test_parse_rejects_bad_base64() {
        let result = "#:not base64!:1:Yg==".parse::<MessageReference>();
        assert!(matches!(
            result,
            Err(MessageReferenceParseError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_parse_rejects_non_numeric_folder() {
        let result = "#:YQ==:inbox:Yg==".parse::<MessageReference>();
        assert_eq!(
            result,
            Err(MessageReferenceParseError::InvalidFolderId("inbox".to_string()))
        );
    }

    #[test]
    fn test_display_is_human_readable() {
        let reference = MessageReference::new("acc", 7, "uid-1");
        assert_eq!(reference.to_string(), "acc/7/uid-1");
    }
}
