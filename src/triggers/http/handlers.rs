//! HTTP notification handlers

use axum::{extract::State, Json};

use crate::error::{AppError, Result};
use crate::push::NotificationRequest;
use crate::server::{AppState, AuthenticatedUser};

use super::models::{NotifyResponse, PublicKeyResponse};

/// Send a notification to every push subscription of the caller
#[tracing::instrument(
    name = "http.notify",
    skip(state, user, request),
    fields(user_id = %user.user_id)
)]
pub async fn notify(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<NotificationRequest>,
) -> Result<Json<NotifyResponse>> {
    if request.title.trim().is_empty() {
        return Err(AppError::Validation("title must not be empty".to_string()));
    }

    let result = state.dispatcher.dispatch(&user.user_id, &request).await?;

    tracing::info!(
        successful = result.successful,
        failed = result.failed,
        total = result.total,
        "Notify request completed"
    );

    Ok(Json(NotifyResponse::from_result(result)))
}

/// Return the server's VAPID public key
pub async fn vapid_public_key(State(state): State<AppState>) -> Json<PublicKeyResponse> {
    Json(PublicKeyResponse {
        vapid_public_key: state.keys.public_key_base64url().to_string(),
    })
}
