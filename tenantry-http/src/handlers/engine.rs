use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;
use tenantry::TenantryError;

use super::AppState;
use crate::dto::{EngineRequest, EngineResponse, ExistsResponse, GroupQuery, ListEnginesResponse};

/// Group from the JSON body, falling back to the query string.
fn requested_group(query: GroupQuery, body: Option<Json<EngineRequest>>) -> Option<String> {
    body.and_then(|Json(req)| req.group).or(query.group)
}

/// Provision the engine on a tenant index
#[utoipa::path(
    post,
    path = "/{plugin}/engine/{index}",
    tag = "engines",
    params(
        ("plugin" = String, Path, description = "Engine plugin name"),
        ("index" = String, Path, description = "Tenant index"),
        GroupQuery
    ),
    request_body(content = EngineRequest, description = "Optional engine group"),
    responses(
        (status = 200, description = "Engine created", body = EngineResponse),
        (status = 409, description = "Engine already exists on this index"),
        (status = 503, description = "Index initialization lock unavailable")
    )
)]
pub async fn create_engine(
    State(state): State<Arc<AppState>>,
    Path(index): Path<String>,
    Query(query): Query<GroupQuery>,
    body: Option<Json<EngineRequest>>,
) -> Result<Json<EngineResponse>, TenantryError> {
    let group = requested_group(query, body);
    let provisioned = state.engine.create(&index, group.as_deref()).await?;

    Ok(Json(EngineResponse {
        index,
        collections: provisioned.collections,
    }))
}

/// Re-run provisioning of an existing engine
#[utoipa::path(
    put,
    path = "/{plugin}/engine/{index}",
    tag = "engines",
    params(
        ("plugin" = String, Path, description = "Engine plugin name"),
        ("index" = String, Path, description = "Tenant index"),
        GroupQuery
    ),
    request_body(content = EngineRequest, description = "Optional engine group"),
    responses(
        (status = 200, description = "Engine updated", body = EngineResponse),
        (status = 404, description = "No engine on this index")
    )
)]
pub async fn update_engine(
    State(state): State<Arc<AppState>>,
    Path(index): Path<String>,
    Query(query): Query<GroupQuery>,
    body: Option<Json<EngineRequest>>,
) -> Result<Json<EngineResponse>, TenantryError> {
    let group = requested_group(query, body);
    let provisioned = state.engine.update(&index, group.as_deref()).await?;

    Ok(Json(EngineResponse {
        index,
        collections: provisioned.collections,
    }))
}

/// Tear down the engine of a tenant index
#[utoipa::path(
    delete,
    path = "/{plugin}/engine/{index}",
    tag = "engines",
    params(
        ("plugin" = String, Path, description = "Engine plugin name"),
        ("index" = String, Path, description = "Tenant index")
    ),
    responses(
        (status = 200, description = "Engine deleted", body = EngineResponse),
        (status = 404, description = "No engine on this index")
    )
)]
pub async fn delete_engine(
    State(state): State<Arc<AppState>>,
    Path(index): Path<String>,
) -> Result<Json<EngineResponse>, TenantryError> {
    let provisioned = state.engine.delete(&index).await?;

    Ok(Json(EngineResponse {
        index,
        collections: provisioned.collections,
    }))
}

/// List tenant indexes with the engine
#[utoipa::path(
    get,
    path = "/{plugin}/engines",
    tag = "engines",
    params(
        ("plugin" = String, Path, description = "Engine plugin name"),
        GroupQuery
    ),
    responses(
        (status = 200, description = "Registered engines", body = ListEnginesResponse)
    )
)]
pub async fn list_engines(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GroupQuery>,
) -> Result<Json<ListEnginesResponse>, TenantryError> {
    let engines = state.engine.list(query.group.as_deref()).await?;
    Ok(Json(ListEnginesResponse { engines }))
}

/// Whether the engine is active on a tenant index
#[utoipa::path(
    get,
    path = "/{plugin}/engine/{index}/_exists",
    tag = "engines",
    params(
        ("plugin" = String, Path, description = "Engine plugin name"),
        ("index" = String, Path, description = "Tenant index")
    ),
    responses(
        (status = 200, description = "Existence flag", body = ExistsResponse)
    )
)]
pub async fn engine_exists(
    State(state): State<Arc<AppState>>,
    Path(index): Path<String>,
) -> Result<Json<ExistsResponse>, TenantryError> {
    let exists = state.engine.exists(&index).await?;
    Ok(Json(ExistsResponse { exists }))
}
