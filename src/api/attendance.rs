use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::{ApiError, is_duplicate_key},
    model::attendance::{ATTENDANCE_COLUMNS, AttendanceRecord, AttendanceStatus, AttendanceView},
    models::MessageResponse,
    report::{self, ReportFormat, ReportTable},
    utils::{
        db_utils::{Filters, SqlValue, bind_values},
        pagination::Page,
    },
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

/// Length of the default personal history window, in days
const DEFAULT_HISTORY_DAYS: i64 = 30;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AttendanceQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub user_id: Option<u64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AttendanceReportQuery {
    /// pdf | excel; JSON rows when omitted
    #[serde(rename = "type")]
    pub report_type: Option<String>,
    pub user_id: Option<u64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceListResponse {
    pub data: Vec<AttendanceView>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[derive(Serialize, ToSchema)]
pub struct CheckInResponse {
    #[schema(example = "Checked in successfully")]
    pub message: String,
    #[schema(example = "late")]
    pub status: String,
}

pub fn check_order(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<(), ApiError> {
    match (from, to) {
        (Some(from), Some(to)) if from > to => {
            Err(ApiError::bad_request("'from' must not be after 'to'"))
        }
        _ => Ok(()),
    }
}

/// Fills a missing bound relative to the other; defaults to the last 30 days
pub fn personal_range(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), ApiError> {
    check_order(from, to)?;
    let window = Duration::days(DEFAULT_HISTORY_DAYS - 1);
    let (from, to) = match (from, to) {
        (Some(from), Some(to)) => (from, to),
        (Some(from), None) => (from, today.max(from)),
        (None, Some(to)) => {
            let from = to
                .checked_sub_signed(window)
                .ok_or_else(|| ApiError::bad_request("Invalid date range"))?;
            (from, to)
        }
        (None, None) => (today - window, today),
    };
    Ok((from, to))
}

fn range_filters(user_id: Option<u64>, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Filters {
    let mut filters = Filters::new();
    filters.eq("a.user_id", user_id);
    if let Some(from) = from {
        filters.push("a.date >= ?", [SqlValue::Date(from)]);
    }
    if let Some(to) = to {
        filters.push("a.date <= ?", [SqlValue::Date(to)]);
    }
    filters
}

async fn fetch_records(
    pool: &MySqlPool,
    filters: &Filters,
    order: &str,
) -> Result<Vec<AttendanceRecord>, ApiError> {
    let sql = format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance a JOIN users u ON u.id = a.user_id {} ORDER BY {order}",
        filters.where_clause()
    );
    Ok(
        bind_values!(sqlx::query_as::<_, AttendanceRecord>(&sql), filters.values.iter().cloned())
            .fetch_all(pool)
            .await?,
    )
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/checkIn",
    responses(
        (status = 200, description = "Checked in; status is present or late", body = CheckInResponse),
        (status = 400, description = "Already checked in today", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    let now = Local::now().naive_local();
    let status = AttendanceStatus::for_check_in(now.time(), config.late_after);

    let result = sqlx::query(
        r#"
        INSERT INTO attendance (user_id, date, check_in, status)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(auth.user_id)
    .bind(now.date())
    .bind(now.time())
    .bind(status.as_ref())
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(_) => {
            info!(user_id = auth.user_id, %status, "Checked in");
            Ok(HttpResponse::Ok().json(CheckInResponse {
                message: "Checked in successfully".to_string(),
                status: status.to_string(),
            }))
        }
        // one row per user per day
        Err(e) if is_duplicate_key(&e) => {
            Err(ApiError::bad_request("Already checked in today").into())
        }
        Err(e) => {
            error!(error = %e, user_id = auth.user_id, "Check-in failed");
            Err(ApiError::Internal.into())
        }
    }
}

/// Check-out endpoint
#[utoipa::path(
    put,
    path = "/api/v1/attendance/checkOut",
    responses(
        (status = 200, description = "Checked out successfully", body = MessageResponse),
        (status = 400, description = "No active check-in found for today", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let now = Local::now().naive_local();

    let result = sqlx::query(
        r#"
        UPDATE attendance
        SET check_out = ?
        WHERE user_id = ?
        AND date = ?
        AND check_out IS NULL
        "#,
    )
    .bind(now.time())
    .bind(auth.user_id)
    .bind(now.date())
    .execute(pool.get_ref())
    .await
    .map_err(ApiError::from)?;

    if result.rows_affected() == 0 {
        return Err(ApiError::bad_request("No active check-in found for today").into());
    }

    info!(user_id = auth.user_id, "Checked out");

    Ok(HttpResponse::Ok().json(MessageResponse::new("Checked out successfully")))
}

#[utoipa::path(
    get,
    path = "/api/v1/attendance/myAttendance",
    params(RangeQuery),
    responses(
        (status = 200, description = "Caller's attendance with worked hours", body = [AttendanceView]),
        (status = 400, description = "Invalid range", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn my_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<RangeQuery>,
) -> actix_web::Result<impl Responder> {
    let (from, to) = personal_range(query.from, query.to, Local::now().date_naive())?;

    let filters = range_filters(Some(auth.user_id), Some(from), Some(to));
    let records = fetch_records(pool.get_ref(), &filters, "a.date DESC").await?;

    let views: Vec<AttendanceView> = records.into_iter().map(AttendanceView::from).collect();
    Ok(HttpResponse::Ok().json(views))
}

#[utoipa::path(
    get,
    path = "/api/v1/attendance/getAllAttendance",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Paginated attendance records", body = AttendanceListResponse),
        (status = 403, description = "Manager/Admin only", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;
    check_order(query.from, query.to)?;
    let page = Page::resolve(query.page, query.per_page);

    let filters = range_filters(query.user_id, query.from, query.to);
    let where_clause = filters.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM attendance a {where_clause}");
    let total = bind_values!(
        sqlx::query_scalar::<_, i64>(&count_sql),
        filters.values.iter().cloned()
    )
    .fetch_one(pool.get_ref())
    .await
    .map_err(ApiError::from)?;

    let data_sql = format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance a JOIN users u ON u.id = a.user_id \
         {where_clause} ORDER BY a.date DESC, a.check_in DESC LIMIT ? OFFSET ?"
    );
    let records = bind_values!(
        sqlx::query_as::<_, AttendanceRecord>(&data_sql),
        filters.values.iter().cloned()
    )
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool.get_ref())
    .await
    .map_err(ApiError::from)?;

    Ok(HttpResponse::Ok().json(AttendanceListResponse {
        data: records.into_iter().map(AttendanceView::from).collect(),
        page: page.page,
        per_page: page.per_page,
        total,
    }))
}

pub fn attendance_table(records: &[AttendanceRecord]) -> ReportTable {
    let mut table = ReportTable::new(
        "Attendance Report",
        vec!["Date", "Employee ID", "Name", "Check In", "Check Out", "Hours", "Status"],
    );
    for r in records {
        table.push_row(vec![
            r.date.to_string().into(),
            r.employee_code.as_str().into(),
            r.name.as_str().into(),
            r.check_in.format("%H:%M").to_string().into(),
            r.check_out.map(|t| t.format("%H:%M").to_string()).into(),
            r.worked_hours().into(),
            r.status.as_str().into(),
        ]);
    }
    table
}

#[utoipa::path(
    get,
    path = "/api/v1/attendance/attendanceReport",
    params(AttendanceReportQuery),
    responses(
        (status = 200, description = "PDF, Excel or JSON rows", body = [AttendanceView]),
        (status = 400, description = "Unknown report type or invalid range", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn attendance_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceReportQuery>,
) -> actix_web::Result<HttpResponse> {
    auth.require_manager_or_admin()?;
    let format = ReportFormat::parse(query.report_type.as_deref())?;
    check_order(query.from, query.to)?;

    let filters = range_filters(query.user_id, query.from, query.to);
    let records = fetch_records(pool.get_ref(), &filters, "a.date, u.name").await?;

    match format {
        None => {
            let views: Vec<AttendanceView> = records.into_iter().map(AttendanceView::from).collect();
            Ok(HttpResponse::Ok().json(views))
        }
        Some(format) => {
            Ok(report::download(attendance_table(&records), format, "attendance-report").await?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, day).unwrap()
    }

    #[test]
    fn default_range_is_last_thirty_days() {
        let (from, to) = personal_range(None, None, d(3, 31)).unwrap();
        assert_eq!(to, d(3, 31));
        assert_eq!(from, d(3, 2));
        assert_eq!((to - from).num_days() + 1, DEFAULT_HISTORY_DAYS);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = personal_range(Some(d(3, 10)), Some(d(3, 1)), d(3, 31)).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn to_near_the_calendar_start_is_rejected() {
        let q = web::Query::<RangeQuery>::from_query("to=-262143-01-05").unwrap();
        let err = personal_range(q.from, q.to, d(3, 31)).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn future_from_keeps_a_valid_range() {
        let (from, to) = personal_range(Some(d(4, 5)), None, d(3, 31)).unwrap();
        assert_eq!((from, to), (d(4, 5), d(4, 5)));
    }

    #[test]
    fn report_rows_follow_headers() {
        let record = AttendanceRecord {
            id: 1,
            user_id: 7,
            employee_code: "EMP-007".into(),
            name: "Jane".into(),
            date: d(3, 2),
            check_in: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            check_out: Some(NaiveTime::from_hms_opt(17, 30, 0).unwrap()),
            status: "present".into(),
        };
        let table = attendance_table(&[record]);
        assert_eq!(table.headers.len(), 7);
        assert_eq!(table.rows[0][3].display(), "09:00");
        assert_eq!(table.rows[0][5].display(), "8.50");
    }
}
