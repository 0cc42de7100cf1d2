use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct Document {
    pub id: u64,
    pub owner_id: u64,
    pub original_name: String,
    pub stored_name: String,
    pub content_type: String,
    pub size_bytes: u64,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}
