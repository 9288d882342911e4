use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DEFAULT_ICON: &str = "/icon-192x192.png";
const DEFAULT_TAG: &str = "notification";
const DEFAULT_VIBRATE: [u32; 5] = [500, 200, 500, 200, 500];

/// A browser push subscription owned by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: String,
    /// Push service URL, unique per browser subscription
    pub endpoint: String,
    /// Browser ECDH public key (base64url)
    pub p256dh: String,
    /// Browser auth secret (base64url)
    pub auth: String,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    pub fn new(
        user_id: impl Into<String>,
        endpoint: impl Into<String>,
        p256dh: impl Into<String>,
        auth: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            endpoint: endpoint.into(),
            p256dh: p256dh.into(),
            auth: auth.into(),
            created_at: Utc::now(),
        }
    }
}

/// Caller-supplied notification content.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub vibrate: Option<Vec<u32>>,
    #[serde(default)]
    pub require_interaction: Option<bool>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// JSON body delivered to every subscription of a user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub tag: String,
    pub require_interaction: bool,
    pub vibrate: Vec<u32>,
    pub data: serde_json::Value,
}

impl From<&NotificationRequest> for NotificationPayload {
    fn from(request: &NotificationRequest) -> Self {
        Self {
            title: request.title.clone(),
            body: request.body.clone(),
            icon: request
                .icon
                .clone()
                .unwrap_or_else(|| DEFAULT_ICON.to_string()),
            tag: request
                .tag
                .clone()
                .unwrap_or_else(|| DEFAULT_TAG.to_string()),
            require_interaction: request.require_interaction.unwrap_or(true),
            vibrate: request
                .vibrate
                .clone()
                .unwrap_or_else(|| DEFAULT_VIBRATE.to_vec()),
            data: request
                .data
                .clone()
                .unwrap_or_else(|| serde_json::json!({})),
        }
    }
}

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Push service accepted the message (2xx)
    Delivered,
    /// Push service reported the subscription gone (410)
    Expired,
    /// Any other status, or a transport error
    Failed(String),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }

    pub fn label(&self) -> &'static str {
        match self {
            DeliveryOutcome::Delivered => "delivered",
            DeliveryOutcome::Expired => "expired",
            DeliveryOutcome::Failed(_) => "failed",
        }
    }
}

/// Aggregated counts for one dispatch call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchResult {
    pub successful: usize,
    pub failed: usize,
    pub total: usize,
}

impl DispatchResult {
    pub fn from_outcomes(outcomes: &[DeliveryOutcome]) -> Self {
        let total = outcomes.len();
        let successful = outcomes.iter().filter(|o| o.is_delivered()).count();
        Self {
            successful,
            failed: total - successful,
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_defaults() {
        let request = NotificationRequest {
            title: "Title".into(),
            body: "Body".into(),
            ..Default::default()
        };

        let payload = NotificationPayload::from(&request);
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "title": "Title",
                "body": "Body",
                "icon": "/icon-192x192.png",
                "tag": "notification",
                "requireInteraction": true,
                "vibrate": [500, 200, 500, 200, 500],
                "data": {},
            })
        );
    }

    #[test]
    fn test_payload_keeps_caller_values() {
        let request: NotificationRequest = serde_json::from_value(serde_json::json!({
            "title": "Standup",
            "body": "In 5 minutes",
            "tag": "task-42",
            "icon": "/task.png",
            "vibrate": [100],
            "requireInteraction": false,
            "data": { "taskId": 42 },
        }))
        .unwrap();

        let payload = NotificationPayload::from(&request);
        assert_eq!(payload.tag, "task-42");
        assert_eq!(payload.icon, "/task.png");
        assert_eq!(payload.vibrate, vec![100]);
        assert!(!payload.require_interaction);
        assert_eq!(payload.data["taskId"], 42);
    }

    #[test]
    fn test_dispatch_result_counts() {
        let outcomes = vec![
            DeliveryOutcome::Delivered,
            DeliveryOutcome::Expired,
            DeliveryOutcome::Failed("HTTP 500".into()),
            DeliveryOutcome::Delivered,
        ];

        let result = DispatchResult::from_outcomes(&outcomes);
        assert_eq!(
            result,
            DispatchResult {
                successful: 2,
                failed: 2,
                total: 4
            }
        );
        assert_eq!(DispatchResult::from_outcomes(&[]), DispatchResult::default());
    }
}
