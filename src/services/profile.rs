use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::Profile;

pub struct ProfileService;

impl ProfileService {
    pub async fn get(db: &Database, user_id: &str) -> Result<Profile> {
        sqlx::query_as("SELECT * FROM profiles WHERE id = ?")
            .bind(user_id)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))
    }
}
