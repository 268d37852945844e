use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query, query_as, FromRow, SqlitePool};
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Project {
    fn default() -> Self {
        Project {
            id: Uuid::new_v4(),
            name: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

impl Project {
    pub async fn create(pool: &SqlitePool, name: &str) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Invalid("project name must not be empty".into()));
        }

        let project = Project {
            name: name.to_string(),
            ..Default::default()
        };

        query(
            r#"
            INSERT INTO projects (id, name, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(project.id)
        .bind(&project.name)
        .bind(project.created_at)
        .bind(project.updated_at)
        .execute(pool)
        .await?;

        debug!("Project created: {:?}", project);
        Ok(project)
    }

    pub async fn get(pool: &SqlitePool, project_id: Uuid) -> Result<Self> {
        query_as::<_, Project>("SELECT id, name, created_at, updated_at FROM projects WHERE id = ?")
            .bind(project_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::not_found("project", project_id))
    }
}
