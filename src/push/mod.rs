//! Web Push delivery: VAPID signing, notification types and fan-out.
//!
//! Payloads are sent signed but unencrypted; the subscription's `p256dh` and
//! `auth` keys are stored for RFC 8291 encryption but not used yet.

mod dispatcher;
mod types;
pub mod vapid;

pub use dispatcher::{DispatcherStats, DispatcherStatsSnapshot, PushDispatcher};
pub use types::{
    DeliveryOutcome, DispatchResult, NotificationPayload, NotificationRequest, Subscription,
};
pub use vapid::{KeyError, ServerKeyPair, SigningError, VapidToken};
