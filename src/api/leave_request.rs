use crate::{
    api::upload::ensure_document_owner,
    auth::auth::AuthUser,
    error::ApiError,
    model::leave_request::{LEAVE_COLUMNS, LeaveRecord, LeaveStatus, LeaveType},
    models::{CreatedResponse, MessageResponse},
    report::{self, ReportFormat, ReportTable},
    utils::{
        db_utils::{Filters, SqlValue, bind_values},
        pagination::Page,
    },
};
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

const LEAVE_FROM: &str = "FROM leave_requests l JOIN users u ON u.id = l.user_id";
const NOT_PENDING: &str = "Leave request not found or already processed";

#[derive(Deserialize, ToSchema)]
pub struct ApplyLeave {
    pub leave_type: LeaveType,
    #[schema(value_type = String, format = "date", example = "2026-04-06")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date", example = "2026-04-08")]
    pub end_date: NaiveDate,
    #[schema(example = "Family event")]
    pub reason: Option<String>,
    /// Uploaded document id, e.g. a medical certificate
    pub attachment_id: Option<u64>,
}

#[derive(Deserialize, ToSchema)]
pub struct LeaveDecision {
    #[schema(example = "Enjoy your time off")]
    pub remark: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MyLeaveQuery {
    /// pending | approved | rejected | cancelled
    pub status: Option<LeaveStatus>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeaveQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub user_id: Option<u64>,
    pub status: Option<LeaveStatus>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeaveReportQuery {
    /// pdf | excel; JSON rows when omitted
    #[serde(rename = "type")]
    pub report_type: Option<String>,
    pub user_id: Option<u64>,
    pub status: Option<LeaveStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveView {
    #[serde(flatten)]
    pub leave: LeaveRecord,
    #[schema(example = 3)]
    pub days: i64,
}

impl From<LeaveRecord> for LeaveView {
    fn from(leave: LeaveRecord) -> Self {
        let days = leave.days();
        LeaveView { leave, days }
    }
}

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<LeaveView>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

pub fn validate_leave_dates(start: NaiveDate, end: NaiveDate) -> Result<(), ApiError> {
    if start > end {
        return Err(ApiError::bad_request("start_date cannot be after end_date"));
    }
    Ok(())
}

async fn fetch_leave(pool: &MySqlPool, leave_id: u64) -> Result<Option<LeaveRecord>, ApiError> {
    let sql = format!("SELECT {LEAVE_COLUMNS} {LEAVE_FROM} WHERE l.id = ?");
    Ok(sqlx::query_as::<_, LeaveRecord>(&sql)
        .bind(leave_id)
        .fetch_optional(pool)
        .await?)
}

async fn fetch_leaves(pool: &MySqlPool, filters: &Filters, order: &str) -> Result<Vec<LeaveView>, ApiError> {
    let sql = format!(
        "SELECT {LEAVE_COLUMNS} {LEAVE_FROM} {} ORDER BY {order}",
        filters.where_clause()
    );
    let rows = bind_values!(sqlx::query_as::<_, LeaveRecord>(&sql), filters.values.iter().cloned())
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(LeaveView::from).collect())
}

const LOCK_APPLICANT: &str = "SELECT id FROM users WHERE id = ? FOR UPDATE";

/// Pending and approved leave block the same days; rejected and cancelled do not
const OVERLAPPING_LEAVE: &str = r#"
    SELECT EXISTS(
        SELECT 1 FROM leave_requests
        WHERE user_id = ?
        AND status IN ('pending', 'approved')
        AND start_date <= ?
        AND end_date >= ?
    )
"#;

/// Apply for leave
#[utoipa::path(
    post,
    path = "/api/v1/leave/applyLeave",
    request_body = ApplyLeave,
    responses(
        (status = 201, description = "Leave request submitted", body = CreatedResponse),
        (status = 400, description = "Invalid dates or attachment", body = MessageResponse),
        (status = 403, description = "Attachment belongs to another user", body = MessageResponse),
        (status = 409, description = "Overlaps an existing leave", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn apply_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<ApplyLeave>,
) -> actix_web::Result<impl Responder> {
    validate_leave_dates(payload.start_date, payload.end_date)?;

    if let Some(attachment_id) = payload.attachment_id {
        ensure_document_owner(pool.get_ref(), attachment_id, auth.user_id).await?;
    }

    // serialize submissions per applicant so the overlap check holds until the insert
    let mut tx = pool.begin().await.map_err(ApiError::from)?;
    sqlx::query(LOCK_APPLICANT)
        .bind(auth.user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(ApiError::from)?;

    let overlapping = sqlx::query_scalar::<_, i64>(OVERLAPPING_LEAVE)
        .bind(auth.user_id)
        .bind(payload.end_date)
        .bind(payload.start_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(ApiError::from)?;

    if overlapping != 0 {
        return Err(ApiError::conflict("Leave overlaps an existing pending or approved request").into());
    }

    let result = sqlx::query(
        r#"
        INSERT INTO leave_requests (user_id, leave_type, start_date, end_date, reason, attachment_id, status)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(auth.user_id)
    .bind(payload.leave_type.as_ref())
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(payload.reason.as_deref())
    .bind(payload.attachment_id)
    .bind(LeaveStatus::Pending.as_ref())
    .execute(&mut *tx)
    .await
    .map_err(ApiError::from)?;
    tx.commit().await.map_err(ApiError::from)?;

    let leave_id = result.last_insert_id();
    info!(leave_id, user_id = auth.user_id, leave_type = %payload.leave_type, "Leave applied");

    Ok(HttpResponse::Created().json(CreatedResponse::new("Leave request submitted", leave_id)))
}

#[utoipa::path(
    get,
    path = "/api/v1/leave/myLeaves",
    params(MyLeaveQuery),
    responses((status = 200, description = "Caller's leave requests", body = [LeaveView])),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn my_leaves(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<MyLeaveQuery>,
) -> actix_web::Result<impl Responder> {
    let mut filters = Filters::new();
    filters.eq("l.user_id", Some(auth.user_id));
    filters.eq("l.status", query.status.map(|s| s.to_string()));

    let leaves = fetch_leaves(pool.get_ref(), &filters, "l.start_date DESC").await?;
    Ok(HttpResponse::Ok().json(leaves))
}

#[utoipa::path(
    get,
    path = "/api/v1/leave/getAllLeaves",
    params(LeaveQuery),
    responses(
        (status = 200, description = "Paginated leave requests", body = LeaveListResponse),
        (status = 403, description = "Manager/Admin only", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn list_leaves(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;
    let page = Page::resolve(query.page, query.per_page);

    let mut filters = Filters::new();
    filters.eq("l.user_id", query.user_id);
    filters.eq("l.status", query.status.map(|s| s.to_string()));
    let where_clause = filters.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM leave_requests l {where_clause}");
    let total = bind_values!(
        sqlx::query_scalar::<_, i64>(&count_sql),
        filters.values.iter().cloned()
    )
    .fetch_one(pool.get_ref())
    .await
    .map_err(ApiError::from)?;

    let data_sql = format!(
        "SELECT {LEAVE_COLUMNS} {LEAVE_FROM} {where_clause} ORDER BY l.created_at DESC LIMIT ? OFFSET ?"
    );
    let rows = bind_values!(
        sqlx::query_as::<_, LeaveRecord>(&data_sql),
        filters.values.iter().cloned()
    )
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool.get_ref())
    .await
    .map_err(ApiError::from)?;

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        data: rows.into_iter().map(LeaveView::from).collect(),
        page: page.page,
        per_page: page.per_page,
        total,
    }))
}

/// Leave application details
#[utoipa::path(
    get,
    path = "/api/v1/leave/{leave_id}",
    params(("leave_id" = u64, Path, description = "Leave request ID")),
    responses(
        (status = 200, description = "Leave found", body = LeaveView),
        (status = 403, description = "Not allowed", body = MessageResponse),
        (status = 404, description = "Leave not found", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let leave = fetch_leave(pool.get_ref(), path.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("Leave request not found"))?;
    auth.require_self_or_manager(leave.user_id)?;

    Ok(HttpResponse::Ok().json(LeaveView::from(leave)))
}

async fn decide(
    auth: &AuthUser,
    pool: &MySqlPool,
    leave_id: u64,
    outcome: LeaveStatus,
    remark: Option<&str>,
) -> Result<(), ApiError> {
    auth.require_manager_or_admin()?;

    let leave = fetch_leave(pool, leave_id)
        .await?
        .filter(|l| l.status == LeaveStatus::Pending.as_ref())
        .ok_or_else(|| ApiError::bad_request(NOT_PENDING))?;

    if leave.user_id == auth.user_id {
        warn!(leave_id, user_id = auth.user_id, "Attempt to decide own leave");
        return Err(ApiError::forbidden("You cannot approve or reject your own leave"));
    }

    let result = sqlx::query(
        r#"
        UPDATE leave_requests
        SET status = ?, reviewed_by = ?, reviewed_at = NOW(), remark = ?
        WHERE id = ?
        AND status = 'pending'
        "#,
    )
    .bind(outcome.as_ref())
    .bind(auth.user_id)
    .bind(remark)
    .bind(leave_id)
    .execute(pool)
    .await?;

    // lost a race with another reviewer
    if result.rows_affected() == 0 {
        return Err(ApiError::bad_request(NOT_PENDING));
    }

    info!(leave_id, reviewed_by = auth.user_id, status = %outcome, "Leave decided");
    Ok(())
}

/* =========================
Approve leave (Manager/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/approve",
    params(("leave_id" = u64, Path, description = "ID of the leave request to approve")),
    request_body = LeaveDecision,
    responses(
        (status = 200, description = "Leave approved", body = MessageResponse),
        (status = 400, description = "Leave request not found or already processed", body = MessageResponse),
        (status = 403, description = "Own leave or not a manager", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: Option<web::Json<LeaveDecision>>,
) -> actix_web::Result<impl Responder> {
    let remark = body.as_ref().and_then(|b| b.remark.as_deref());
    decide(&auth, pool.get_ref(), path.into_inner(), LeaveStatus::Approved, remark).await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new("Leave approved")))
}

/* =========================
Reject leave (Manager/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/reject",
    params(("leave_id" = u64, Path, description = "ID of the leave request to reject")),
    request_body = LeaveDecision,
    responses(
        (status = 200, description = "Leave rejected", body = MessageResponse),
        (status = 400, description = "Leave request not found or already processed", body = MessageResponse),
        (status = 403, description = "Own leave or not a manager", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: Option<web::Json<LeaveDecision>>,
) -> actix_web::Result<impl Responder> {
    let remark = body.as_ref().and_then(|b| b.remark.as_deref());
    decide(&auth, pool.get_ref(), path.into_inner(), LeaveStatus::Rejected, remark).await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new("Leave rejected")))
}

#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/cancel",
    params(("leave_id" = u64, Path, description = "ID of the caller's pending leave")),
    responses(
        (status = 200, description = "Leave cancelled", body = MessageResponse),
        (status = 400, description = "Leave request not found or already processed", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn cancel_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let leave_id = path.into_inner();

    let result = sqlx::query(
        r#"
        UPDATE leave_requests
        SET status = ?
        WHERE id = ?
        AND user_id = ?
        AND status = 'pending'
        "#,
    )
    .bind(LeaveStatus::Cancelled.as_ref())
    .bind(leave_id)
    .bind(auth.user_id)
    .execute(pool.get_ref())
    .await
    .map_err(ApiError::from)?;

    if result.rows_affected() == 0 {
        return Err(ApiError::bad_request(NOT_PENDING).into());
    }

    info!(leave_id, user_id = auth.user_id, "Leave cancelled");

    Ok(HttpResponse::Ok().json(MessageResponse::new("Leave cancelled")))
}

pub fn leave_table(leaves: &[LeaveView]) -> ReportTable {
    let mut table = ReportTable::new(
        "Leave Report",
        vec!["Employee ID", "Name", "Type", "From", "To", "Days", "Status", "Reason"],
    );
    for v in leaves {
        let l = &v.leave;
        table.push_row(vec![
            l.employee_code.as_str().into(),
            l.name.as_str().into(),
            l.leave_type.as_str().into(),
            l.start_date.to_string().into(),
            l.end_date.to_string().into(),
            v.days.into(),
            l.status.as_str().into(),
            l.reason.clone().into(),
        ]);
    }
    table
}

#[utoipa::path(
    get,
    path = "/api/v1/leave/leaveReport",
    params(LeaveReportQuery),
    responses(
        (status = 200, description = "PDF, Excel or JSON rows", body = [LeaveView]),
        (status = 400, description = "Unknown report type or invalid range", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveReportQuery>,
) -> actix_web::Result<HttpResponse> {
    auth.require_manager_or_admin()?;
    let format = ReportFormat::parse(query.report_type.as_deref())?;
    if let (Some(from), Some(to)) = (query.from, query.to) {
        validate_leave_dates(from, to)?;
    }

    let mut filters = Filters::new();
    filters.eq("l.user_id", query.user_id);
    filters.eq("l.status", query.status.map(|s| s.to_string()));
    // any leave touching the window
    if let Some(from) = query.from {
        filters.push("l.end_date >= ?", [SqlValue::Date(from)]);
    }
    if let Some(to) = query.to {
        filters.push("l.start_date <= ?", [SqlValue::Date(to)]);
    }

    let leaves = fetch_leaves(pool.get_ref(), &filters, "l.start_date, u.name").await?;

    match format {
        None => Ok(HttpResponse::Ok().json(leaves)),
        Some(format) => Ok(report::download(leave_table(&leaves), format, "leave-report").await?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn overlap_check_runs_under_an_applicant_lock() {
        assert!(LOCK_APPLICANT.trim_end().ends_with("FOR UPDATE"));
        assert!(OVERLAPPING_LEAVE.contains("status IN ('pending', 'approved')"));
    }

    #[test]
    fn status_filter_accepts_only_known_statuses() {
        let q = web::Query::<LeaveQuery>::from_query("status=approved").unwrap();
        assert_eq!(q.status, Some(LeaveStatus::Approved));

        assert!(web::Query::<MyLeaveQuery>::from_query("status=bogus").is_err());
        assert!(web::Query::<LeaveReportQuery>::from_query("status=Approved").is_err());
    }

    fn record(status: &str) -> LeaveRecord {
        LeaveRecord {
            id: 1,
            user_id: 7,
            employee_code: "EMP-007".into(),
            name: "Jane".into(),
            leave_type: "sick".into(),
            start_date: NaiveDate::from_ymd_opt(2026, 4, 6).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 4, 8).unwrap(),
            reason: None,
            attachment_id: None,
            status: status.into(),
            reviewed_by: None,
            reviewed_at: None,
            remark: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn single_day_leave_is_valid() {
        let day = NaiveDate::from_ymd_opt(2026, 4, 6).unwrap();
        assert!(validate_leave_dates(day, day).is_ok());
        assert!(validate_leave_dates(day, day.pred_opt().unwrap()).is_err());
    }

    #[test]
    fn view_carries_day_count() {
        let view = LeaveView::from(record("pending"));
        assert_eq!(view.days, 3);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["days"], 3);
        assert_eq!(json["status"], "pending");
    }

    #[test]
    fn report_has_one_row_per_leave() {
        let table = leave_table(&[LeaveView::from(record("approved"))]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0][5].display(), "3");
        assert_eq!(table.rows[0][7].display(), "");
    }
}
