use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, Display, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProjectStatus {
    Planned,
    Active,
    OnHold,
    Completed,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct Project {
    pub id: u64,
    pub name: String,
    #[schema(nullable = true)]
    pub description: Option<String>,
    pub team_leader_id: u64,
    /// Joined from `users.name`
    pub team_leader_name: String,
    #[schema(example = "active")]
    pub status: String,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = Option<String>, format = "date")]
    pub end_date: Option<NaiveDate>,
    pub created_by: u64,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct ProjectMember {
    pub user_id: u64,
    pub employee_code: String,
    pub name: String,
    pub email: String,
    #[schema(value_type = String, format = "date-time")]
    pub added_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_uses_snake_case() {
        assert_eq!(ProjectStatus::OnHold.as_ref(), "on_hold");
        assert_eq!(ProjectStatus::from_str("completed").unwrap(), ProjectStatus::Completed);
        assert!(ProjectStatus::from_str("archived").is_err());
    }
}
