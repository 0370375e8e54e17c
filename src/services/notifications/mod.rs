//! Alert delivery.
//!
//! The `MessagingChannel` trait is the send contract; `WhatsAppChannel` is
//! the production implementation. The dispatcher resolves subscribers and
//! records every outcome in the audit trail.

mod channel;
mod delivery_status;
mod dispatcher;
mod pacer;
mod whatsapp;

pub use channel::{ChannelResponse, MessagingChannel, TemplateParam};
pub use delivery_status::{
    StatusApplyReport, StatusUpdate, apply_status_payload, parse_status_payload,
};
pub use dispatcher::{DispatchReport, NotificationDispatcher};
pub use pacer::{IntervalPacer, SendPacer};
pub use whatsapp::WhatsAppChannel;
