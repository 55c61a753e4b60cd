use chrono::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::requestmodel::ServiceCategory;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Provider,
    User,
}

impl UserRole {
    pub fn to_str(&self) -> &str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Provider => "provider",
            UserRole::User => "user",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: uuid::Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    /// Set for providers; the category their fanout subscriptions match on.
    pub service_category: Option<ServiceCategory>,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_provider(&self) -> bool {
        self.role == UserRole::Provider
    }
}
