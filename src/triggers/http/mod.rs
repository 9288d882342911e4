//! HTTP notification trigger handlers
//!
//! - Notify: fan a notification out to the caller's push subscriptions
//! - Public key: hand browsers the key they subscribe against

mod handlers;
mod models;

pub use handlers::{notify, vapid_public_key};
pub use models::{NotifyResponse, PublicKeyResponse};
