//! Fan-out of one alert to every active subscriber of a poll.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use jiff::tz::{Offset, TimeZone};
use serde::Serialize;

use super::channel::{MessagingChannel, TemplateParam};
use super::pacer::SendPacer;
use crate::error::AppResult;
use crate::models::{
    EarthquakeEvent, FailureReason, NewFailedNotification, NewNotification, Poll, Recipient,
};
use crate::storage::{NotificationStore, SubscriberDirectory};

/// Totals of one dispatch run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

enum Delivery {
    Delivered(String),
    Failed(FailureReason),
}

pub struct NotificationDispatcher {
    directory: Arc<dyn SubscriberDirectory>,
    notifications: Arc<dyn NotificationStore>,
    channel: Arc<dyn MessagingChannel>,
    pacer: Arc<dyn SendPacer>,
    template: String,
    display_tz: TimeZone,
}

impl NotificationDispatcher {
    pub fn new(
        directory: Arc<dyn SubscriberDirectory>,
        notifications: Arc<dyn NotificationStore>,
        channel: Arc<dyn MessagingChannel>,
        pacer: Arc<dyn SendPacer>,
        template: impl Into<String>,
        display_offset: Offset,
    ) -> Self {
        Self {
            directory,
            notifications,
            channel,
            pacer,
            template: template.into(),
            display_tz: TimeZone::fixed(display_offset),
        }
    }

    /// Active members of every active group subscribed to `poll`, each once,
    /// in group order then member order.
    pub async fn recipients(&self, poll: &Poll) -> AppResult<Vec<Recipient>> {
        let mut seen = HashSet::new();
        let mut recipients = Vec::new();

        for group in self.directory.groups_for_poll(poll.id).await? {
            for member in self.directory.active_members(group.id).await? {
                if seen.insert(member.id) {
                    recipients.push(member);
                }
            }
        }
        Ok(recipients)
    }

    /// Alert detail shown after the recipient's name
    pub fn detail_text(&self, event: &EarthquakeEvent) -> String {
        let local = event.timestamp.to_zoned(self.display_tz.clone());
        format!(
            "Biraz önce ({}) {} merkezli {:.1} büyüklüğünde ({})",
            local.strftime("%H:%M"),
            event.location,
            event.magnitude,
            event.source.label()
        )
    }

    /// Send the alert for `event` to every resolved recipient.
    ///
    /// Only a failure to resolve recipients is returned as an error. Each
    /// recipient's send and audit write is isolated from the others.
    pub async fn dispatch(&self, poll: &Poll, event: &EarthquakeEvent) -> AppResult<DispatchReport> {
        let recipients = self.recipients(poll).await?;
        let detail = self.detail_text(event);
        let mut report = DispatchReport::default();

        tracing::info!(
            poll = %poll.name,
            event_id = event.id,
            magnitude = event.magnitude,
            recipients = recipients.len(),
            "Dispatching alert"
        );

        for (index, recipient) in recipients.iter().enumerate() {
            self.pacer.pace(index).await;
            report.attempted += 1;

            let step = AssertUnwindSafe(self.deliver(poll, event, recipient, &detail))
                .catch_unwind()
                .await;

            match step {
                Ok(Ok(Delivery::Delivered(message_id))) => {
                    tracing::info!(recipient_id = recipient.id, %message_id, "Alert delivered");
                    report.delivered += 1;
                }
                Ok(Ok(Delivery::Failed(reason))) => {
                    tracing::warn!(recipient_id = recipient.id, %reason, "Alert not delivered");
                    report.failed += 1;
                }
                Ok(Err(e)) => {
                    tracing::error!(recipient_id = recipient.id, error = %e, "Recipient step failed");
                    report.failed += 1;
                }
                Err(_) => {
                    tracing::error!(recipient_id = recipient.id, "Recipient step panicked");
                    report.failed += 1;
                    let audit = self
                        .notifications
                        .record_failed(NewFailedNotification {
                            recipient_id: recipient.id,
                            earthquake_id: event.id,
                            reason: FailureReason::SendError,
                            detail: "panicked".to_string(),
                        })
                        .await;
                    if let Err(e) = audit {
                        tracing::error!(
                            recipient_id = recipient.id,
                            error = %e,
                            "Failure audit write failed"
                        );
                    }
                }
            }
        }

        tracing::info!(
            attempted = report.attempted,
            delivered = report.delivered,
            failed = report.failed,
            "Dispatch finished"
        );
        Ok(report)
    }

    async fn deliver(
        &self,
        poll: &Poll,
        event: &EarthquakeEvent,
        recipient: &Recipient,
        detail: &str,
    ) -> AppResult<Delivery> {
        let params = [
            TemplateParam::new("adsoyad", recipient.name.as_str()),
            TemplateParam::new("detay", detail),
        ];

        let (reason, raw) = match self
            .channel
            .send_template(&recipient.address, &self.template, &params)
            .await
        {
            Err(e) => (FailureReason::SendError, e.to_string()),
            Ok(resp) if !resp.is_success() => (
                FailureReason::SendRejected,
                format!("HTTP {}: {}", resp.status, resp.body),
            ),
            Ok(resp) => match resp.message_id() {
                Some(message_id) => {
                    self.notifications
                        .record_sent(NewNotification {
                            message_id: message_id.clone(),
                            recipient_id: recipient.id,
                            earthquake_id: event.id,
                            poll_name: poll.name.clone(),
                        })
                        .await?;
                    return Ok(Delivery::Delivered(message_id));
                }
                None => (FailureReason::ConfirmationUnparsable, resp.body),
            },
        };

        self.notifications
            .record_failed(NewFailedNotification {
                recipient_id: recipient.id,
                earthquake_id: event.id,
                reason,
                detail: raw,
            })
            .await?;
        Ok(Delivery::Failed(reason))
    }
}
