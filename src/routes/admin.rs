//! Administrative JSON API over the request log (read-only) and the block list.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::{
    error::{validation::validate_positive_number, AppResult},
    state::AppState,
    types::{LogPage, LogQuery, NewBlockedIp, UpdateBlockedIp},
};

pub async fn list_logs(State(state): State<AppState>, Query(query): Query<LogQuery>) -> AppResult<impl IntoResponse> {
    validate_positive_number(query.limit, "limit")?;
    let items = state.logs.list(&query).await?;
    let total_count = state.logs.count(&query).await?;
    Ok(Json(LogPage { items, total_count }))
}

pub async fn get_log(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<impl IntoResponse> {
    Ok(Json(state.logs.get(id).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct BlockedListQuery {
    #[serde(default)]
    pub active: Option<bool>,
}

pub async fn list_blocked(
    State(state): State<AppState>,
    Query(query): Query<BlockedListQuery>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.access.list(query.active.unwrap_or(false)).await?))
}

pub async fn create_blocked(
    State(state): State<AppState>,
    Json(req): Json<NewBlockedIp>,
) -> AppResult<impl IntoResponse> {
    let entry = state.access.add(req).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn get_blocked(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<impl IntoResponse> {
    Ok(Json(state.access.get(id).await?))
}

pub async fn update_blocked(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateBlockedIp>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.access.update(id, req).await?))
}

pub async fn activate_blocked(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<impl IntoResponse> {
    Ok(Json(state.access.set_active(id, true).await?))
}

pub async fn deactivate_blocked(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.access.set_active(id, false).await?))
}

pub async fn delete_blocked(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<impl IntoResponse> {
    state.access.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
