use crate::domain::models::session_type::SessionType;
use crate::domain::ports::SessionTypeRepository;
use crate::error::AppError;
use async_trait::async_trait;
use sqlx::SqlitePool;

pub struct SqliteSessionTypeRepo {
    pool: SqlitePool,
}

impl SqliteSessionTypeRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionTypeRepository for SqliteSessionTypeRepo {
    async fn find_by_id(&self, id: &str) -> Result<Option<SessionType>, AppError> {
        sqlx::query_as::<_, SessionType>("SELECT * FROM session_types WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn create(&self, session_type: &SessionType) -> Result<SessionType, AppError> {
        if session_type.duration_minutes <= 0 {
            return Err(AppError::Validation("Session duration must be positive".into()));
        }

        sqlx::query_as::<_, SessionType>(
            "INSERT INTO session_types (id, provider_id, duration_minutes, price_cents, is_active, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING *",
        )
            .bind(&session_type.id).bind(&session_type.provider_id)
            .bind(session_type.duration_minutes).bind(session_type.price_cents)
            .bind(session_type.is_active).bind(session_type.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)
    }
}
