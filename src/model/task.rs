use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, Display, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

/// Column list matching [`Task`]; expects `tasks t`, `projects p`, `users u` (assignee)
pub const TASK_COLUMNS: &str = "t.id, t.project_id, p.name AS project_name, t.title, t.description, \
     t.assigned_to, u.name AS assignee_name, u.employee_code AS assignee_code, t.assigned_by, \
     t.priority, t.status, t.due_date, t.completed_at, t.created_at";

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct Task {
    pub id: u64,
    pub project_id: u64,
    pub project_name: String,
    pub title: String,
    #[schema(nullable = true)]
    pub description: Option<String>,
    pub assigned_to: u64,
    pub assignee_name: String,
    pub assignee_code: String,
    pub assigned_by: u64,
    #[schema(example = "medium")]
    pub priority: String,
    #[schema(example = "in_progress")]
    pub status: String,
    #[schema(value_type = Option<String>, format = "date")]
    pub due_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub completed_at: Option<DateTime<Utc>>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}
