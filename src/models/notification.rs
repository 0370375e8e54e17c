//! Delivery audit models.

use std::str::FromStr;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Successful hand-off to the channel, keyed by the channel's message id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationRecord {
    pub message_id: String,
    pub recipient_id: i32,
    pub earthquake_id: i64,
    pub poll_name: String,
    pub is_read: bool,
    /// Reply text, set by a delivery-status update
    pub message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub message_id: String,
    pub recipient_id: i32,
    pub earthquake_id: i64,
    pub poll_name: String,
}

/// Why a recipient did not get an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The channel answered with a non-success status
    SendRejected,
    /// The request never produced a response
    SendError,
    /// Success status, but no delivery id in the body
    ConfirmationUnparsable,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::SendRejected => "send_rejected",
            FailureReason::SendError => "send_error",
            FailureReason::ConfirmationUnparsable => "confirmation_unparsable",
        }
    }
}

impl FromStr for FailureReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "send_rejected" => Ok(FailureReason::SendRejected),
            "send_error" => Ok(FailureReason::SendError),
            "confirmation_unparsable" => Ok(FailureReason::ConfirmationUnparsable),
            _ => Err(format!("Unrecognized failure reason: {}", s)),
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Never mutated after insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedNotificationRecord {
    pub id: i64,
    pub recipient_id: i32,
    pub earthquake_id: i64,
    pub reason: FailureReason,
    pub detail: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewFailedNotification {
    pub recipient_id: i32,
    pub earthquake_id: i64,
    pub reason: FailureReason,
    pub detail: String,
}

/// Update reported by the channel after the initial send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    Read,
    Failed,
    /// Recipient answered the template message
    Replied(String),
}
