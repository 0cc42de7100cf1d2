use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::Serialize;
use strum_macros::{AsRefStr, Display};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display)]
#[strum(serialize_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Late,
}

impl AttendanceStatus {
    /// Late once the check-in minute is past the cutoff; seconds are ignored
    pub fn for_check_in(check_in: NaiveTime, late_after: NaiveTime) -> Self {
        let minute = NaiveTime::from_hms_opt(check_in.hour(), check_in.minute(), 0).unwrap_or(check_in);
        if minute > late_after {
            AttendanceStatus::Late
        } else {
            AttendanceStatus::Present
        }
    }
}

/// Column list matching [`AttendanceRecord`]; expects `attendance a` joined with `users u`
pub const ATTENDANCE_COLUMNS: &str =
    "a.id, a.user_id, u.employee_code, u.name, a.date, a.check_in, a.check_out, a.status";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AttendanceRecord {
    pub id: u64,
    pub user_id: u64,
    pub employee_code: String,
    pub name: String,
    pub date: NaiveDate,
    pub check_in: NaiveTime,
    pub check_out: Option<NaiveTime>,
    pub status: String,
}

impl AttendanceRecord {
    /// Hours between check-in and check-out, rounded to two decimals
    pub fn worked_hours(&self) -> Option<f64> {
        let out = self.check_out?;
        let minutes = (out - self.check_in).num_minutes();
        if minutes < 0 {
            return None;
        }
        Some((minutes as f64 / 60.0 * 100.0).round() / 100.0)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AttendanceView {
    pub id: u64,
    pub user_id: u64,
    pub employee_code: String,
    pub name: String,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = String, example = "09:05:00")]
    pub check_in: NaiveTime,
    #[schema(value_type = Option<String>, example = "17:35:00")]
    pub check_out: Option<NaiveTime>,
    #[schema(example = "present")]
    pub status: String,
    #[schema(example = 8.5)]
    pub worked_hours: Option<f64>,
}

impl From<AttendanceRecord> for AttendanceView {
    fn from(r: AttendanceRecord) -> Self {
        let worked_hours = r.worked_hours();
        AttendanceView {
            id: r.id,
            user_id: r.user_id,
            employee_code: r.employee_code,
            name: r.name,
            date: r.date,
            check_in: r.check_in,
            check_out: r.check_out,
            status: r.status,
            worked_hours,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(check_in: (u32, u32), check_out: Option<(u32, u32)>) -> AttendanceRecord {
        AttendanceRecord {
            id: 1,
            user_id: 7,
            employee_code: "EMP-007".into(),
            name: "Jane".into(),
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            check_in: NaiveTime::from_hms_opt(check_in.0, check_in.1, 0).unwrap(),
            check_out: check_out.map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0).unwrap()),
            status: "present".into(),
        }
    }

    #[test]
    fn worked_hours_rounds_to_two_decimals() {
        assert_eq!(record((9, 0), Some((17, 20))).worked_hours(), Some(8.33));
        assert_eq!(record((9, 0), Some((9, 0))).worked_hours(), Some(0.0));
    }

    #[test]
    fn open_day_has_no_hours() {
        assert_eq!(record((9, 0), None).worked_hours(), None);
    }

    #[test]
    fn late_only_after_cutoff() {
        let cutoff = NaiveTime::from_hms_opt(9, 30, 0).unwrap();
        assert_eq!(AttendanceStatus::for_check_in(cutoff, cutoff), AttendanceStatus::Present);
        let within_minute = NaiveTime::from_hms_milli_opt(9, 30, 59, 500).unwrap();
        assert_eq!(
            AttendanceStatus::for_check_in(within_minute, cutoff),
            AttendanceStatus::Present
        );
        assert_eq!(
            AttendanceStatus::for_check_in(NaiveTime::from_hms_opt(9, 31, 0).unwrap(), cutoff),
            AttendanceStatus::Late
        );
        assert_eq!(AttendanceStatus::Late.as_ref(), "late");
    }
}
