//! Status callbacks reported by the channel after a send.
//!
//! The webhook body nests updates under `entry[].changes[].value`. Each
//! value may carry `statuses[]` (delivery receipts keyed by message id) and
//! `messages[]` (inbound messages; a reply names the original message in
//! `context.id`).

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::models::DeliveryStatus;
use crate::storage::NotificationStore;

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    #[serde(default)]
    entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default)]
    changes: Vec<Change>,
}

#[derive(Debug, Deserialize)]
struct Change {
    #[serde(default)]
    value: ChangeValue,
}

#[derive(Debug, Default, Deserialize)]
struct ChangeValue {
    #[serde(default)]
    statuses: Vec<StatusItem>,
    #[serde(default)]
    messages: Vec<InboundMessage>,
}

#[derive(Debug, Deserialize)]
struct StatusItem {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct InboundMessage {
    context: Option<MessageContext>,
    text: Option<MessageText>,
}

#[derive(Debug, Deserialize)]
struct MessageContext {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MessageText {
    body: String,
}

/// One update addressed to a sent notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub message_id: String,
    pub status: DeliveryStatus,
}

/// Extract every recognizable update from a webhook body.
///
/// Unknown status values and messages that do not reply to anything are
/// ignored. Only a body that does not match the envelope is an error.
pub fn parse_status_payload(body: &str) -> AppResult<Vec<StatusUpdate>> {
    let payload: WebhookPayload = serde_json::from_str(body).map_err(|e| AppError::BadRequest {
        message: format!("invalid status payload: {}", e),
    })?;

    let mut updates = Vec::new();
    for value in payload
        .entry
        .into_iter()
        .flat_map(|entry| entry.changes)
        .map(|change| change.value)
    {
        for item in value.statuses {
            let status = match item.status.as_str() {
                "delivered" => DeliveryStatus::Delivered,
                "read" => DeliveryStatus::Read,
                "failed" => DeliveryStatus::Failed,
                other => {
                    tracing::debug!(status = other, message_id = %item.id, "Ignoring status");
                    continue;
                }
            };
            updates.push(StatusUpdate {
                message_id: item.id,
                status,
            });
        }

        for message in value.messages {
            if let (Some(context), Some(text)) = (message.context, message.text) {
                updates.push(StatusUpdate {
                    message_id: context.id,
                    status: DeliveryStatus::Replied(text.body),
                });
            }
        }
    }

    Ok(updates)
}

/// Counts from applying one payload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusApplyReport {
    pub applied: usize,
    /// Updates naming a message id that was never recorded
    pub unknown: usize,
}

/// Parse `body` and apply every update to the notification store.
pub async fn apply_status_payload(
    store: &Arc<dyn NotificationStore>,
    body: &str,
) -> AppResult<StatusApplyReport> {
    let mut report = StatusApplyReport::default();

    for update in parse_status_payload(body)? {
        if store
            .apply_delivery_status(&update.message_id, &update.status)
            .await?
        {
            report.applied += 1;
        } else {
            tracing::warn!(message_id = %update.message_id, "Status for unknown message");
            report.unknown += 1;
        }
    }

    Ok(report)
}
