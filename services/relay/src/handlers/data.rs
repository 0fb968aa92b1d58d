use crate::codec;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
};
use chrono::Utc;

pub const SEQUENCE_HEADER: &str = "x-snapshot-sequence";
pub const AGE_HEADER: &str = "x-snapshot-age-ms";

pub async fn get_data(State(state): State<AppState>) -> Result<Response, AppError> {
    // Only an Arc clone happens under the store lock.
    let snapshot = state.store.get();

    let body = match &state.transform {
        Some(transform) => codec::encode_value(&transform.apply(&snapshot.value)),
        None => codec::encode(&snapshot),
    }
    .map_err(|e| AppError::Internal(e.into()))?;

    state.metrics.record_poll();

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(SEQUENCE_HEADER, HeaderValue::from(snapshot.sequence));
    if let Some(age) = snapshot.age_ms(Utc::now()) {
        headers.insert(AGE_HEADER, HeaderValue::from(age));
    }

    Ok((headers, body).into_response())
}
