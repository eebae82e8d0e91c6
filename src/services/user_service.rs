use crate::models::{UserPatch, UserResponse};
use crate::services::store::Store;
use crate::utils::AppError;

// Admin edit by participant ID (name, phone, role, isActive)
pub async fn update_user(store: &dyn Store, participant_id: &str, patch: &UserPatch) -> Result<UserResponse, AppError> {
    if patch.is_empty() {
        return Err(AppError::InvalidRequest("Nothing to update".to_string()));
    }
    if matches!(&patch.name, Some(name) if name.trim().is_empty()) {
        return Err(AppError::InvalidRequest("Name cannot be empty".to_string()));
    }

    let participant_id = participant_id.trim().to_uppercase();
    let user = store
        .update_user(&participant_id, patch)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", participant_id)))?;

    log::info!("✏️  User {} updated", user.participant_id);
    Ok(UserResponse::from(&user))
}
