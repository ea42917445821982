use axum::{
    extract::{Path, State},
    Extension, Json,
};

use crate::error::{ApiResponse, Result};
use crate::models::{
    AutocompleteData, CreatedVistoria, CurrentUser, VistoriaByContract, VistoriaDetails,
    VistoriaForm, VistoriaListItem, VistoriaStats,
};
use crate::services::VistoriaService;
use crate::AppState;

/// Create an inspection record
/// POST /api/v1/vistorias
pub async fn create_vistoria(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(form): Json<VistoriaForm>,
) -> Result<Json<ApiResponse<CreatedVistoria>>> {
    let created = VistoriaService::create(&state.db, &current_user.id, form).await?;
    Ok(Json(ApiResponse::success(created)))
}

/// GET /api/v1/vistorias
pub async fn list_vistorias(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<VistoriaListItem>>>> {
    let items = VistoriaService::list(&state.db, &current_user.id).await?;
    Ok(Json(ApiResponse::success(items)))
}

/// GET /api/v1/vistorias/:id
pub async fn get_vistoria(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<VistoriaDetails>>> {
    let details = VistoriaService::details(&state.db, &current_user.id, &id).await?;
    Ok(Json(ApiResponse::success(details)))
}

/// GET /api/v1/vistorias/stats
pub async fn get_stats(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<VistoriaStats>>> {
    let stats = VistoriaService::stats(&state.db, &current_user.id).await?;
    Ok(Json(ApiResponse::success(stats)))
}

/// GET /api/v1/vistorias/autocomplete
pub async fn get_autocomplete(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<AutocompleteData>>> {
    let data = VistoriaService::autocomplete(&state.db, &current_user.id).await?;
    Ok(Json(ApiResponse::success(data)))
}

/// Identification of the latest record for a contract; `data` is null when unknown
/// GET /api/v1/vistorias/by-contract/:numero
pub async fn get_by_contract(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(numero): Path<String>,
) -> Result<Json<ApiResponse<Option<VistoriaByContract>>>> {
    let found = VistoriaService::by_contract(&state.db, &current_user.id, &numero).await?;
    Ok(Json(ApiResponse::success(found)))
}
