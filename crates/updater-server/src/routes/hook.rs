use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method};

use crate::error::AppError;
use crate::state::AppState;
use crate::webhook::validate_webhook;

pub const ACK: &str = "Event received. Have a nice day.";

/// POST /hook: validate a GitHub delivery, acknowledge it, and process it
/// in the background.
///
/// The sender only ever learns whether the delivery was accepted; pipeline
/// failures are logged here and never returned.
pub async fn hook(
    State(app): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, AppError> {
    let delivery = validate_webhook(&method, &headers, &body, &app.hmac_secret).inspect_err(|e| {
        tracing::warn!(error = %e, "failed to validate payload");
    })?;

    let pipeline = app.pipeline.clone();
    tokio::task::spawn_blocking(move || {
        let handled = pipeline.handle_event(
            &delivery.event_type,
            &delivery.delivery_id,
            &delivery.payload,
        );
        match handled {
            Ok(outcome) => tracing::info!(
                delivery_id = %delivery.delivery_id,
                outcome = ?outcome,
                "event handled"
            ),
            Err(e) => tracing::error!(
                delivery_id = %delivery.delivery_id,
                error = %e,
                "error handling event"
            ),
        }
    });

    Ok(ACK)
}
