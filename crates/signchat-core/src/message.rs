//! Channel message wire types

use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Mask of the tick count in a binary timestamp (the top two bits carry the
/// timestamp kind).
const TICKS_MASK: i64 = 0x3FFF_FFFF_FFFF_FFFF;

/// A message as stored by the channel server.
///
/// `id` and `created_at` are assigned by the server; a message prepared
/// locally leaves them empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Message {
    /// Server assigned message ID
    #[serde(rename = "messageId")]
    pub id: String,
    /// Username the message claims to come from
    pub creator_name: String,
    /// Message text (the signed payload)
    pub text: String,
    /// Server timestamp as a binary tick count
    pub created_at: i64,
    /// Base64 Ed25519 signature over the UTF-8 bytes of `text`
    pub signature: String,
    /// Encoded public key the author claims to have signed with
    pub public_key: String,
}

impl Message {
    /// Time the server recorded the message, in UTC.
    ///
    /// `created_at` is a binary timestamp: the low 62 bits count 100ns ticks
    /// since 0001-01-01T00:00:00. Returns `None` if unset or out of range.
    pub fn created_time_utc(&self) -> Option<DateTime<Utc>> {
        let ticks = self.created_at & TICKS_MASK;
        if ticks == 0 {
            return None;
        }

        let epoch = NaiveDate::from_ymd_opt(1, 1, 1)?.and_hms_opt(0, 0, 0)?;
        let since_epoch = Duration::microseconds(ticks / 10)
            .checked_add(&Duration::nanoseconds((ticks % 10) * 100))?;

        epoch
            .checked_add_signed(since_epoch)
            .map(|naive| naive.and_utc())
    }

    /// [`created_time_utc`](Self::created_time_utc) in the system's local zone.
    pub fn created_time_local(&self) -> Option<DateTime<Local>> {
        self.created_time_utc().map(|t| t.with_timezone(&Local))
    }

    /// Body to POST when sending this message
    pub fn to_outgoing(&self) -> OutgoingMessage {
        OutgoingMessage {
            text: self.text.clone(),
            creator_name: self.creator_name.clone(),
            public_key: self.public_key.clone(),
            signature: self.signature.clone(),
        }
    }
}

/// Request body for sending a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub text: String,
    pub creator_name: String,
    pub public_key: String,
    pub signature: String,
}
