use crate::error::CoreError;
use crate::models::Category;
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Sqlite, Transaction};
use uuid::Uuid;

#[async_trait]
impl super::CategoryRepository for SqliteRepository {
    async fn add_category(&self, user_id: Uuid, name: String, now: DateTime<Utc>) -> Result<Category, CoreError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(CoreError::validation("category", "name must not be empty"));
        }

        let category: Option<Category> = sqlx::query_as(
            r#"INSERT INTO categories (id, user_id, name, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, name) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(&name)
        .bind(now)
        .fetch_optional(self.pool())
        .await?;

        category.ok_or_else(|| CoreError::InvalidInput(format!("Category '{}' already exists", name)))
    }

    async fn find_category_by_name(&self, user_id: Uuid, name: &str) -> Result<Option<Category>, CoreError> {
        let category = sqlx::query_as("SELECT * FROM categories WHERE user_id = $1 AND LOWER(name) = LOWER($2)")
            .bind(user_id)
            .bind(name.trim())
            .fetch_optional(self.pool())
            .await?;
        Ok(category)
    }

    async fn find_categories(&self, user_id: Uuid) -> Result<Vec<Category>, CoreError> {
        let categories = sqlx::query_as("SELECT * FROM categories WHERE user_id = $1 ORDER BY name")
            .bind(user_id)
            .fetch_all(self.pool())
            .await?;
        Ok(categories)
    }
}

impl SqliteRepository {
    /// Looks a category up by name, creating it when the user has none by that name.
    pub(crate) async fn ensure_category_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        user_id: Uuid,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<Category, CoreError> {
        let name = name.trim();
        let existing: Option<Category> =
            sqlx::query_as("SELECT * FROM categories WHERE user_id = $1 AND LOWER(name) = LOWER($2)")
                .bind(user_id)
                .bind(name)
                .fetch_optional(&mut **tx)
                .await?;
        if let Some(category) = existing {
            return Ok(category);
        }

        let category = sqlx::query_as(
            r#"INSERT INTO categories (id, user_id, name, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(name)
        .bind(now)
        .fetch_one(&mut **tx)
        .await?;
        Ok(category)
    }
}
