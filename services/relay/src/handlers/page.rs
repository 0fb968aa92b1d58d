use crate::error::AppError;
use crate::state::AppState;
use axum::{extract::State, response::Html};

/// Viewer shipped with the binary.
pub const BUILTIN_PAGE: &str = include_str!("../../static/index.html");

pub async fn get_index(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    match &state.page_path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .map(Html)
            .map_err(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Viewer page unavailable");
                AppError::PageUnavailable(e.to_string())
            }),
        None => Ok(Html(BUILTIN_PAGE.to_string())),
    }
}
