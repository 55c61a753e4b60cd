// db/userdb.rs
use async_trait::async_trait;
use uuid::Uuid;

use super::db::DBClient;

use crate::models::{
    requestmodel::ServiceCategory,
    usermodel::{User, UserRole},
};

/// Directory reads. This service never writes users; identity and
/// provider registration live elsewhere.
#[async_trait]
pub trait UserExt {
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        email: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error>;

    /// All providers registered under a category. The fanout recipient
    /// set: category-exact, no geographic filtering.
    async fn get_providers_by_category(
        &self,
        category: ServiceCategory,
    ) -> Result<Vec<User>, sqlx::Error>;

    async fn get_display_name(&self, user_id: Uuid) -> Result<Option<String>, sqlx::Error>;
}

#[async_trait]
impl UserExt for DBClient {
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        email: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error> {
        let mut user: Option<User> = None;

        if let Some(user_id) = user_id {
            user = sqlx::query_as::<_, User>(
                r#"
                SELECT id, name, email, role, service_category, created_at, updated_at
                FROM users
                WHERE id = $1
                "#,
            )
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        } else if let Some(email) = email {
            user = sqlx::query_as::<_, User>(
                r#"
                SELECT id, name, email, role, service_category, created_at, updated_at
                FROM users
                WHERE email = $1
                "#,
            )
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        }

        Ok(user)
    }

    async fn get_providers_by_category(
        &self,
        category: ServiceCategory,
    ) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, role, service_category, created_at, updated_at
            FROM users
            WHERE role = $1 AND service_category = $2
            ORDER BY created_at ASC
            "#,
        )
        .bind(UserRole::Provider)
        .bind(category)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_display_name(&self, user_id: Uuid) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT name FROM users WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }
}
