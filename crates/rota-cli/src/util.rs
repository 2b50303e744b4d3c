use anyhow::{anyhow, Result};
use rota_core::error::CoreError;
use rota_core::models::InstanceView;
use rota_core::repository::Repository;
use uuid::Uuid;

/// Characters of the simple-form UUID shown in tables.
pub const SHORT_ID_LEN: usize = 8;

pub fn short_id(id: &Uuid) -> String {
    id.simple().to_string()[..SHORT_ID_LEN].to_string()
}

/// Resolves a full id or unique prefix to a stored occurrence.
pub async fn resolve_instance(repo: &impl Repository, user_id: Uuid, short_id: &str) -> Result<InstanceView> {
    if short_id.len() < 2 {
        return Err(anyhow!(CoreError::InvalidInput(
            "Short ID must be at least 2 characters long.".to_string()
        )));
    }
    let mut views = repo.find_instances_by_short_id_prefix(user_id, short_id).await?;
    match views.len() {
        1 => Ok(views.remove(0)),
        0 => Err(anyhow!(CoreError::NotFound(format!(
            "No occurrence found with ID prefix '{}'",
            short_id
        )))),
        _ => {
            let candidates: Vec<(String, String)> = views
                .into_iter()
                .map(|v| (v.key.to_string(), v.title))
                .collect();
            Err(anyhow!(CoreError::AmbiguousId(candidates)))
        }
    }
}
