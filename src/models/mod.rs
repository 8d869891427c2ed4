//! Domain models for the substitution plan and its notification topics.

mod entry;
mod notification;

pub use entry::{ClassNameShape, SubstituteEntry, SubstituteMessage};
pub use notification::{Audience, NotificationPayload, TokenRegistration, Topic, TOPIC_PREFIX};
