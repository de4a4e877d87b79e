use async_trait::async_trait;

use super::{db_error, PgUnitOfWork};
use crate::error::{AppError, Result};
use crate::models::UserBasicInfo;

#[async_trait]
pub trait UserBasicInfoRepo: Send {
    async fn find_by_id(&mut self, user_id: &str) -> Result<UserBasicInfo>;
}

#[async_trait]
impl UserBasicInfoRepo for PgUnitOfWork {
    async fn find_by_id(&mut self, user_id: &str) -> Result<UserBasicInfo> {
        let conn = self.conn()?;
        let row = sqlx::query_as::<_, UserBasicInfo>(
            r#"
            SELECT user_id, name
            FROM user_basic_info
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error("UserBasicInfoRepo.FindByID"))?;

        row.ok_or_else(|| AppError::NotFound(format!("user {} not found", user_id)))
    }
}
