use crate::metrics::MetricsSnapshot;
use crate::state::AppState;
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok` once producer data has arrived, `waiting` before.
    pub status: &'static str,
    pub sequence: u64,
    pub last_update: Option<DateTime<Utc>>,
    pub age_ms: Option<i64>,
    #[serde(flatten)]
    pub counters: MetricsSnapshot,
}

pub async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.store.get();

    Json(HealthResponse {
        status: if snapshot.is_placeholder() { "waiting" } else { "ok" },
        sequence: snapshot.sequence,
        last_update: snapshot.received_at,
        age_ms: snapshot.age_ms(Utc::now()),
        counters: state.metrics.snapshot(),
    })
}
