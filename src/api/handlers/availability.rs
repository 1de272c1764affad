use axum::{extract::{Path, Query, State}, response::IntoResponse, Json};
use std::sync::Arc;

use crate::api::dtos::requests::SlotsQuery;
use crate::api::dtos::responses::SlotsResponse;
use crate::error::AppError;
use crate::state::AppState;

pub async fn get_slots(
    State(state): State<Arc<AppState>>,
    Path(provider_id): Path<String>,
    Query(query): Query<SlotsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let slots = state
        .availability
        .slots_for_range(&provider_id, &query.session_type_id, query.from, query.to)
        .await?;

    Ok(Json(SlotsResponse {
        provider_id,
        session_type_id: query.session_type_id,
        slots,
    }))
}
