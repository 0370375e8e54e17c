//! One dispatch cycle: ingest, gate, cooldown, fan out.

use std::sync::Arc;

use jiff::Timestamp;
use jiff::tz::Offset;
use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use super::alerting::{CooldownGuard, CooldownStatus, GateDecision, evaluate};
use super::ingestion::{FeedCoordinator, IngestionReport};
use super::notifications::{
    DispatchReport, IntervalPacer, MessagingChannel, NotificationDispatcher, SendPacer,
};
use crate::config::Settings;
use crate::error::{AppError, AppResult};
use crate::storage::{StoragePorts, SubscriberDirectory};

/// How a cycle ended. Cycles never return errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    NothingNew,
    BelowThreshold {
        event_id: i64,
        magnitude: f64,
        threshold: f64,
    },
    CooldownActive {
        last_event_id: i64,
        remaining_seconds: i64,
    },
    Dispatched {
        event_id: i64,
        report: DispatchReport,
    },
    Failed {
        error: String,
    },
}

pub struct AlertCycle {
    coordinator: FeedCoordinator,
    directory: Arc<dyn SubscriberDirectory>,
    cooldown: CooldownGuard,
    dispatcher: NotificationDispatcher,
    poll_name: String,
}

impl AlertCycle {
    pub fn new(
        coordinator: FeedCoordinator,
        directory: Arc<dyn SubscriberDirectory>,
        cooldown: CooldownGuard,
        dispatcher: NotificationDispatcher,
        poll_name: impl Into<String>,
    ) -> Self {
        Self {
            coordinator,
            directory,
            cooldown,
            dispatcher,
            poll_name: poll_name.into(),
        }
    }

    /// Wire the production cycle from settings.
    pub fn from_settings(
        settings: &Settings,
        ports: StoragePorts,
        channel: Arc<dyn MessagingChannel>,
    ) -> AppResult<Self> {
        let coordinator = FeedCoordinator::from_config(&settings.feeds, ports.earthquakes.clone())?;
        let cooldown = CooldownGuard::new(
            ports.notifications.clone(),
            ports.earthquakes.clone(),
            settings.alerting.cooldown_minutes,
        );

        let display_offset =
            Offset::from_hours(settings.feeds.calendar_offset_hours).map_err(|e| {
                AppError::Validation {
                    field: "feeds.calendar_offset_hours".to_string(),
                    reason: e.to_string(),
                }
            })?;
        let pacer: Arc<dyn SendPacer> =
            Arc::new(IntervalPacer::from_millis(settings.channel.send_interval_ms));
        let dispatcher = NotificationDispatcher::new(
            ports.subscribers.clone(),
            ports.notifications,
            channel,
            pacer,
            settings.channel.template_name.clone(),
            display_offset,
        );

        Ok(Self::new(
            coordinator,
            ports.subscribers,
            cooldown,
            dispatcher,
            settings.alerting.poll_name.clone(),
        ))
    }

    pub async fn run(&self) -> CycleOutcome {
        self.run_at(Timestamp::now()).await
    }

    /// Run with `now` as the reference for the cooldown window.
    pub async fn run_at(&self, now: Timestamp) -> CycleOutcome {
        let cycle_id = Uuid::new_v4();
        let span = tracing::info_span!("cycle", %cycle_id, poll = %self.poll_name);

        async {
            match self.try_run(now).await {
                Ok(outcome) => {
                    tracing::info!(outcome = ?outcome, "Cycle finished");
                    outcome
                }
                Err(e) => {
                    tracing::error!(error = %e, "Cycle failed");
                    CycleOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Fetch and persist without alerting.
    pub async fn ingest_only(&self) -> AppResult<IngestionReport> {
        let poll = self.poll().await?;
        self.coordinator.run(poll.min_magnitude).await
    }

    async fn poll(&self) -> AppResult<crate::models::Poll> {
        self.directory
            .find_poll(&self.poll_name)
            .await?
            .ok_or_else(|| AppError::NotFound {
                entity: "poll".to_string(),
                field: "name".to_string(),
                value: self.poll_name.clone(),
            })
    }

    async fn try_run(&self, now: Timestamp) -> AppResult<CycleOutcome> {
        let poll = self.poll().await?;
        let report = self.coordinator.run(poll.min_magnitude).await?;

        let candidate = match evaluate(report.actionable(), poll.min_magnitude) {
            GateDecision::NoCandidate => return Ok(CycleOutcome::NothingNew),
            GateDecision::BelowThreshold(event) => {
                return Ok(CycleOutcome::BelowThreshold {
                    event_id: event.id,
                    magnitude: event.magnitude,
                    threshold: poll.min_magnitude,
                });
            }
            GateDecision::Alert(event) => event,
        };

        if let CooldownStatus::Active {
            last_event_id,
            remaining,
        } = self.cooldown.check(now).await?
        {
            tracing::info!(
                candidate_id = candidate.id,
                last_event_id,
                remaining_seconds = remaining.as_secs(),
                "Alert suppressed by cooldown"
            );
            return Ok(CycleOutcome::CooldownActive {
                last_event_id,
                remaining_seconds: remaining.as_secs(),
            });
        }

        let report = self.dispatcher.dispatch(&poll, &candidate).await?;
        Ok(CycleOutcome::Dispatched {
            event_id: candidate.id,
            report,
        })
    }
}
