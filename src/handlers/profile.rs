use axum::{extract::State, Extension, Json};

use crate::error::{ApiResponse, Result};
use crate::models::{CurrentUser, Profile};
use crate::services::ProfileService;
use crate::AppState;

/// GET /api/v1/profile
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Profile>>> {
    let profile = ProfileService::get(&state.db, &current_user.id).await?;
    Ok(Json(ApiResponse::success(profile)))
}
