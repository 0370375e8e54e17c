//! WhatsApp Cloud API channel.
//!
//! Sends pre-approved templates through `POST {base}/{number_id}/messages`
//! using the global `HTTP_CLIENT`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Value, json};

use super::channel::{ChannelResponse, MessagingChannel, TemplateParam};
use crate::config::ChannelConfig;
use crate::error::{AppError, AppResult};
use crate::external::client::HTTP_CLIENT;

pub struct WhatsAppChannel {
    config: ChannelConfig,
}

impl WhatsAppChannel {
    pub fn new(config: ChannelConfig) -> Self {
        if config.rehearsal {
            tracing::warn!(
                base_url = %config.rehearsal_base_url,
                "Rehearsal mode: messages go to the rehearsal endpoint"
            );
        }
        Self { config }
    }

    pub fn messages_url(&self) -> String {
        format!(
            "{}/{}/messages",
            self.config.effective_base_url().trim_end_matches('/'),
            self.config.number_id
        )
    }

    pub fn payload(&self, to: &str, template: &str, params: &[TemplateParam]) -> Value {
        let parameters: Vec<Value> = params
            .iter()
            .map(|p| json!({ "type": "text", "parameter_name": p.name, "text": p.text }))
            .collect();

        json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "template",
            "template": {
                "name": template,
                "language": { "code": self.config.template_language },
                "components": [{ "type": "body", "parameters": parameters }],
            },
        })
    }
}

#[async_trait]
impl MessagingChannel for WhatsAppChannel {
    async fn send_template(
        &self,
        to: &str,
        template: &str,
        params: &[TemplateParam],
    ) -> AppResult<ChannelResponse> {
        let start = Instant::now();

        let resp = HTTP_CLIENT
            .post(self.messages_url())
            .bearer_auth(&self.config.api_token)
            .timeout(Duration::from_secs(self.config.timeout_seconds))
            .json(&self.payload(to, template, params))
            .send()
            .await
            .map_err(|e| AppError::ExternalApi {
                platform: self.name().to_string(),
                message: format!("send failed: {}", e),
                source: Some(e.into()),
            })?;

        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();

        tracing::debug!(
            channel = self.name(),
            status,
            duration_ms = start.elapsed().as_millis() as u64,
            "Template sent"
        );

        Ok(ChannelResponse { status, body })
    }

    fn name(&self) -> &'static str {
        "whatsapp"
    }
}
