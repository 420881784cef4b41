use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle of a registered notification.
///
/// Ids are handed out by the registry and are only unique for the lifetime of
/// that registry; they carry no meaning across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(u32);

impl NotificationId {
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u32 {
        self.0
    }
}

impl From<NotificationId> for i64 {
    fn from(id: NotificationId) -> Self {
        i64::from(id.0)
    }
}

impl TryFrom<i64> for NotificationId {
    type Error = std::num::TryFromIntError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u32::try_from(value).map(NotificationId)
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
