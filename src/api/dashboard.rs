use std::collections::HashMap;
use std::fmt::Display;

use crate::{
    auth::auth::AuthUser,
    error::ApiError,
    model::{
        attendance::AttendanceStatus, leave_request::LeaveStatus, project::ProjectStatus, role::Role,
        task::TaskStatus,
    },
    models::MessageResponse,
    utils::db_utils::{SqlValue, bind_values},
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use strum::IntoEnumIterator;
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_TREND_DAYS: u32 = 7;
pub const MAX_TREND_DAYS: u32 = 90;

/// Everyone who checked in today; late arrivals count as present
const PRESENT_TODAY: &str = "SELECT COUNT(*) FROM attendance WHERE date = ?";

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusCount {
    #[schema(example = "active")]
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleCount {
    pub role_id: u8,
    #[schema(example = "Manager")]
    pub role: String,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminSummary {
    pub total_employees: i64,
    pub active_employees: i64,
    pub employees_by_role: Vec<RoleCount>,
    pub projects_by_status: Vec<StatusCount>,
    /// Checked in today, late arrivals included
    pub present_today: i64,
    /// Subset of `present_today`
    pub late_today: i64,
    pub pending_leaves: i64,
    pub open_tasks: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ManagerSummary {
    pub led_projects: i64,
    pub open_tasks_in_led_projects: i64,
    pub pending_leaves: i64,
    /// Checked in today, late arrivals included
    pub present_today: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EmployeeSummary {
    pub tasks_by_status: Vec<StatusCount>,
    pub leaves_by_status: Vec<StatusCount>,
    pub checked_in_today: bool,
    pub checked_out_today: bool,
}

/// Dashboard payload; `role` tells the client which widgets to draw
#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum DashboardSummary {
    Admin(AdminSummary),
    Manager(ManagerSummary),
    Employee(EmployeeSummary),
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TrendQuery {
    /// Number of days back from today (1..=90, default 7)
    pub days: Option<u32>,
}

#[derive(Debug, PartialEq, Serialize, ToSchema)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub present: i64,
    pub late: i64,
}

pub fn trend_days(requested: Option<u32>) -> u32 {
    requested.unwrap_or(DEFAULT_TREND_DAYS).clamp(1, MAX_TREND_DAYS)
}

/// One point per day from `start`, days without rows count as zero.
/// `late` is a subset of `present`, as in the summary counters.
pub fn fill_trend(rows: &[(NaiveDate, String, i64)], start: NaiveDate, days: u32) -> Vec<TrendPoint> {
    let mut by_day: HashMap<NaiveDate, (i64, i64)> = HashMap::new();
    for (date, status, count) in rows {
        let entry = by_day.entry(*date).or_default();
        entry.0 += count;
        if status == AttendanceStatus::Late.as_ref() {
            entry.1 += count;
        }
    }

    (0..days as i64)
        .map(|offset| {
            let date = start + Duration::days(offset);
            let (present, late) = by_day.get(&date).copied().unwrap_or_default();
            TrendPoint {
                date,
                present,
                late,
            }
        })
        .collect()
}

/// Every status of `E` in declaration order, missing ones reported as zero
pub fn all_statuses<E: IntoEnumIterator + Display>(counts: Vec<StatusCount>) -> Vec<StatusCount> {
    let by_status: HashMap<String, i64> = counts.into_iter().map(|c| (c.status, c.count)).collect();
    E::iter()
        .map(|status| {
            let status = status.to_string();
            let count = by_status.get(&status).copied().unwrap_or(0);
            StatusCount { status, count }
        })
        .collect()
}

async fn count(pool: &MySqlPool, sql: &str, values: Vec<SqlValue>) -> Result<i64, ApiError> {
    Ok(bind_values!(sqlx::query_scalar::<_, i64>(sql), values)
        .fetch_one(pool)
        .await?)
}

async fn grouped(pool: &MySqlPool, sql: &str, values: Vec<SqlValue>) -> Result<Vec<StatusCount>, ApiError> {
    let rows = bind_values!(sqlx::query_as::<_, (String, i64)>(sql), values)
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|(status, count)| StatusCount { status, count })
        .collect())
}

async fn admin_summary(pool: &MySqlPool, today: NaiveDate) -> Result<AdminSummary, ApiError> {
    let by_role = sqlx::query_as::<_, (u8, i64)>(
        "SELECT role_id, COUNT(*) FROM users WHERE is_active = TRUE GROUP BY role_id ORDER BY role_id",
    )
    .fetch_all(pool)
    .await?;

    let employees_by_role = by_role
        .into_iter()
        .map(|(role_id, count)| RoleCount {
            role_id,
            role: Role::from_id(role_id)
                .map(|r| format!("{r:?}"))
                .unwrap_or_else(|| "Unknown".to_string()),
            count,
        })
        .collect();

    Ok(AdminSummary {
        total_employees: count(pool, "SELECT COUNT(*) FROM users", vec![]).await?,
        active_employees: count(pool, "SELECT COUNT(*) FROM users WHERE is_active = TRUE", vec![])
            .await?,
        employees_by_role,
        projects_by_status: all_statuses::<ProjectStatus>(
            grouped(pool, "SELECT status, COUNT(*) FROM projects GROUP BY status", vec![]).await?,
        ),
        present_today: count(pool, PRESENT_TODAY, vec![today.into()]).await?,
        late_today: count(
            pool,
            "SELECT COUNT(*) FROM attendance WHERE date = ? AND status = ?",
            vec![today.into(), AttendanceStatus::Late.to_string().into()],
        )
        .await?,
        pending_leaves: count(
            pool,
            "SELECT COUNT(*) FROM leave_requests WHERE status = ?",
            vec![LeaveStatus::Pending.to_string().into()],
        )
        .await?,
        open_tasks: count(
            pool,
            "SELECT COUNT(*) FROM tasks WHERE status <> ?",
            vec![TaskStatus::Completed.to_string().into()],
        )
        .await?,
    })
}

async fn manager_summary(pool: &MySqlPool, user_id: u64, today: NaiveDate) -> Result<ManagerSummary, ApiError> {
    Ok(ManagerSummary {
        led_projects: count(
            pool,
            "SELECT COUNT(*) FROM projects WHERE team_leader_id = ?",
            vec![user_id.into()],
        )
        .await?,
        open_tasks_in_led_projects: count(
            pool,
            r#"
            SELECT COUNT(*) FROM tasks t
            JOIN projects p ON p.id = t.project_id
            WHERE p.team_leader_id = ? AND t.status <> ?
            "#,
            vec![user_id.into(), TaskStatus::Completed.to_string().into()],
        )
        .await?,
        pending_leaves: count(
            pool,
            "SELECT COUNT(*) FROM leave_requests WHERE status = ?",
            vec![LeaveStatus::Pending.to_string().into()],
        )
        .await?,
        present_today: count(pool, PRESENT_TODAY, vec![today.into()]).await?,
    })
}

async fn employee_summary(pool: &MySqlPool, user_id: u64, today: NaiveDate) -> Result<EmployeeSummary, ApiError> {
    let today_row = sqlx::query_as::<_, (i64,)>(
        "SELECT check_out IS NOT NULL FROM attendance WHERE user_id = ? AND date = ?",
    )
    .bind(user_id)
    .bind(today)
    .fetch_optional(pool)
    .await?;

    Ok(EmployeeSummary {
        tasks_by_status: all_statuses::<TaskStatus>(
            grouped(
                pool,
                "SELECT status, COUNT(*) FROM tasks WHERE assigned_to = ? GROUP BY status",
                vec![user_id.into()],
            )
            .await?,
        ),
        leaves_by_status: all_statuses::<LeaveStatus>(
            grouped(
                pool,
                "SELECT status, COUNT(*) FROM leave_requests WHERE user_id = ? GROUP BY status",
                vec![user_id.into()],
            )
            .await?,
        ),
        checked_in_today: today_row.is_some(),
        checked_out_today: today_row.is_some_and(|(out,)| out != 0),
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/dashboard/summary",
    responses(
        (status = 200, description = "Role specific dashboard counters", body = DashboardSummary),
        (status = 401, description = "Unauthorized", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn summary(auth: AuthUser, pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    let today = Local::now().date_naive();
    let pool = pool.get_ref();

    let summary = match auth.role {
        Role::Admin => DashboardSummary::Admin(admin_summary(pool, today).await?),
        Role::Manager => DashboardSummary::Manager(manager_summary(pool, auth.user_id, today).await?),
        Role::Employee => DashboardSummary::Employee(employee_summary(pool, auth.user_id, today).await?),
    };

    Ok(HttpResponse::Ok().json(summary))
}

#[utoipa::path(
    get,
    path = "/api/v1/dashboard/attendanceTrend",
    params(TrendQuery),
    responses(
        (status = 200, description = "Daily present/late counts, oldest first", body = [TrendPoint]),
        (status = 403, description = "Manager/Admin only", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn attendance_trend(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<TrendQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;

    let days = trend_days(query.days);
    let today = Local::now().date_naive();
    let start = today - Duration::days(days as i64 - 1);

    let rows = sqlx::query_as::<_, (NaiveDate, String, i64)>(
        r#"
        SELECT date, status, COUNT(*)
        FROM attendance
        WHERE date BETWEEN ? AND ?
        GROUP BY date, status
        "#,
    )
    .bind(start)
    .bind(today)
    .fetch_all(pool.get_ref())
    .await
    .map_err(ApiError::from)?;

    Ok(HttpResponse::Ok().json(fill_trend(&rows, start, days)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn present_today_includes_late_arrivals() {
        assert!(!PRESENT_TODAY.contains("status"));
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
    }

    #[test]
    fn trend_days_are_clamped() {
        assert_eq!(trend_days(None), 7);
        assert_eq!(trend_days(Some(0)), 1);
        assert_eq!(trend_days(Some(365)), 90);
        assert_eq!(trend_days(Some(30)), 30);
    }

    #[test]
    fn missing_days_are_zero_filled() {
        let rows = vec![
            (d(2), "present".to_string(), 5),
            (d(2), "late".to_string(), 2),
            (d(4), "present".to_string(), 3),
        ];
        let trend = fill_trend(&rows, d(1), 4);

        assert_eq!(trend.len(), 4);
        assert_eq!(trend[0], TrendPoint { date: d(1), present: 0, late: 0 });
        assert_eq!(trend[1], TrendPoint { date: d(2), present: 7, late: 2 });
        assert_eq!(trend[2].present, 0);
        assert_eq!(trend[3], TrendPoint { date: d(4), present: 3, late: 0 });
        assert_eq!(trend[3].date, d(4));
    }

    #[test]
    fn every_status_is_reported() {
        let counts = vec![StatusCount { status: "completed".into(), count: 4 }];
        let all = all_statuses::<TaskStatus>(counts);

        let statuses: Vec<&str> = all.iter().map(|c| c.status.as_str()).collect();
        assert_eq!(statuses, ["todo", "in_progress", "completed"]);
        assert_eq!(all[0].count, 0);
        assert_eq!(all[2].count, 4);
    }

    #[test]
    fn summary_is_tagged_by_role() {
        let summary = DashboardSummary::Manager(ManagerSummary {
            led_projects: 2,
            open_tasks_in_led_projects: 5,
            pending_leaves: 1,
            present_today: 9,
        });
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["role"], "manager");
        assert_eq!(json["led_projects"], 2);
    }
}
