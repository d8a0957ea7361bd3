//! Handlers for the demo CRUD resource.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::instrument;

use crate::error::AppError;
use crate::state::AppState;
use crate::store::{Entity, EntityInput};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub name: String,
}

#[instrument(name = "entities::list", skip(state))]
pub async fn list(State(state): State<AppState>) -> Json<Vec<Entity>> {
    tracing::info!("GET /api/entities - retrieving all entities");
    let entities = state.store.list();
    tracing::debug!(count = entities.len(), "Retrieved entities");
    Json(entities)
}

#[instrument(name = "entities::get_by_id", skip(state))]
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Entity>, AppError> {
    tracing::info!(id, "GET /api/entities/:id - retrieving entity");
    state
        .store
        .get(id)
        .map(Json)
        .ok_or(AppError::EntityNotFound(id))
}

#[instrument(name = "entities::create", skip(state, input), fields(name = %input.name))]
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<EntityInput>,
) -> (StatusCode, Json<Entity>) {
    tracing::info!(name = %input.name, "POST /api/entities - creating entity");
    let entity = state.store.create(input);
    tracing::info!(id = entity.id, "Created entity");
    (StatusCode::CREATED, Json(entity))
}

#[instrument(name = "entities::update", skip(state, input))]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(input): Json<EntityInput>,
) -> Result<Json<Entity>, AppError> {
    tracing::info!(id, "PUT /api/entities/:id - updating entity");
    state
        .store
        .update(id, input)
        .map(Json)
        .ok_or(AppError::EntityNotFound(id))
}

#[instrument(name = "entities::remove", skip(state))]
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, AppError> {
    tracing::info!(id, "DELETE /api/entities/:id - deleting entity");
    if state.store.delete(id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        tracing::warn!(id, "Entity not found for deletion");
        Err(AppError::EntityNotFound(id))
    }
}

#[instrument(name = "entities::search", skip(state), fields(name = %params.name))]
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<Vec<Entity>> {
    tracing::info!(name = %params.name, "GET /api/entities/search - searching entities");
    let matches = state.store.search_by_name(&params.name);
    tracing::debug!(count = matches.len(), "Search finished");
    Json(matches)
}
