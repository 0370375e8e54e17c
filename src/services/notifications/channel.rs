//! Messaging channel abstraction.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::AppResult;

/// Named body parameter of a pre-approved template
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateParam {
    pub name: &'static str,
    pub text: String,
}

impl TemplateParam {
    pub fn new(name: &'static str, text: impl Into<String>) -> Self {
        Self {
            name,
            text: text.into(),
        }
    }
}

/// Raw answer of the channel to a send request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelResponse {
    pub status: u16,
    pub body: String,
}

impl ChannelResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Delivery id at `messages[0].id`, if the body carries one.
    pub fn message_id(&self) -> Option<String> {
        let value: Value = serde_json::from_str(&self.body).ok()?;
        value
            .get("messages")?
            .get(0)?
            .get("id")?
            .as_str()
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    }
}

/// Outbound channel that delivers templated messages.
///
/// An `Err` means no response was obtained at all; any answer from the
/// remote side, including rejections, comes back as a `ChannelResponse`.
#[async_trait]
pub trait MessagingChannel: Send + Sync {
    async fn send_template(
        &self,
        to: &str,
        template: &str,
        params: &[TemplateParam],
    ) -> AppResult<ChannelResponse>;

    fn name(&self) -> &'static str;
}
