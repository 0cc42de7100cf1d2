use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveType {
    Annual,
    Sick,
    Casual,
    Unpaid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

/// Inclusive number of calendar days covered by a leave
pub fn leave_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}

/// Column list matching [`LeaveRecord`]; expects `leave_requests l` joined with `users u`
pub const LEAVE_COLUMNS: &str = "l.id, l.user_id, u.employee_code, u.name, l.leave_type, \
     l.start_date, l.end_date, l.reason, l.attachment_id, l.status, l.reviewed_by, l.reviewed_at, \
     l.remark, l.created_at";

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct LeaveRecord {
    pub id: u64,
    pub user_id: u64,
    pub employee_code: String,
    pub name: String,
    #[schema(example = "sick")]
    pub leave_type: String,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
    #[schema(nullable = true)]
    pub reason: Option<String>,
    #[schema(nullable = true)]
    pub attachment_id: Option<u64>,
    #[schema(example = "pending")]
    pub status: String,
    #[schema(nullable = true)]
    pub reviewed_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[schema(nullable = true)]
    pub remark: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

impl LeaveRecord {
    pub fn days(&self) -> i64 {
        leave_days(self.start_date, self.end_date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn days_are_inclusive() {
        let d = |day| NaiveDate::from_ymd_opt(2026, 2, day).unwrap();
        assert_eq!(leave_days(d(3), d(3)), 1);
        assert_eq!(leave_days(d(3), d(6)), 4);
    }

    #[test]
    fn leave_type_accepts_lowercase_names() {
        let t: LeaveType = serde_json::from_str("\"casual\"").unwrap();
        assert_eq!(t, LeaveType::Casual);
        assert!(serde_json::from_str::<LeaveType>("\"vacation\"").is_err());
    }
}
