//! HTTP request/response models

use serde::Serialize;

use crate::push::DispatchResult;

/// Response for a notify call
#[derive(Debug, Serialize)]
pub struct NotifyResponse {
    pub message: String,
    pub successful: usize,
    pub failed: usize,
    pub total: usize,
}

impl NotifyResponse {
    pub fn from_result(result: DispatchResult) -> Self {
        let message = if result.total == 0 {
            "No subscriptions found"
        } else {
            "Notifications sent"
        };

        Self {
            message: message.to_string(),
            successful: result.successful,
            failed: result.failed,
            total: result.total,
        }
    }
}

/// Server public key in the form `PushManager.subscribe` expects
#[derive(Debug, Serialize)]
pub struct PublicKeyResponse {
    #[serde(rename = "vapidPublicKey")]
    pub vapid_public_key: String,
}
