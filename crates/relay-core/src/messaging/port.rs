use async_trait::async_trait;

use crate::{
    domain::Recipient,
    messaging::types::{Outcome, Payload},
};

/// Outbound delivery port.
///
/// Implementations perform exactly one send attempt and classify the result.
/// They never retry or sleep on their own; backoff belongs to the dispatch
/// loop so that it can bound the worst-case duration of a broadcast.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, recipient: Recipient, payload: &Payload) -> Outcome;
}

/// Phrases in platform error descriptions that mean the recipient is gone for good.
const PERMANENT_DESCRIPTIONS: &[&str] = &[
    "bot was blocked",
    "bot was kicked",
    "chat not found",
    "user is deactivated",
    "group chat was deactivated",
    "group is deactivated",
    "group chat was upgraded",
    "bot is not a member",
    "user not found",
];

/// Best-effort classification of a free-form error description.
///
/// Used by adapters for errors their client library does not model.
pub fn is_permanent_description(description: &str) -> bool {
    let lower = description.to_lowercase();
    PERMANENT_DESCRIPTIONS.iter().any(|p| lower.contains(p))
}
