use crate::{
    auth::auth::AuthUser,
    error::ApiError,
    model::task::{TASK_COLUMNS, Task, TaskPriority, TaskStatus},
    models::{CreatedResponse, MessageResponse},
    report::{self, ReportFormat, ReportTable},
    utils::{
        db_utils::{Filters, UpdateBuilder, bind_values, execute_update},
        pagination::Page,
    },
};
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const TASK_FROM: &str = r#"
    FROM tasks t
    JOIN projects p ON p.id = t.project_id
    JOIN users u ON u.id = t.assigned_to
"#;

#[derive(Deserialize, ToSchema)]
pub struct CreateTask {
    #[schema(example = 1)]
    pub project_id: u64,
    #[schema(example = "Prepare salary sheet")]
    pub title: String,
    pub description: Option<String>,
    #[schema(example = 9)]
    pub assigned_to: u64,
    pub priority: Option<TaskPriority>,
    #[schema(value_type = Option<String>, format = "date", example = "2026-03-31")]
    pub due_date: Option<NaiveDate>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub assigned_to: Option<u64>,
    pub priority: Option<TaskPriority>,
    #[schema(value_type = Option<String>, format = "date")]
    pub due_date: Option<NaiveDate>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateTaskStatus {
    pub status: TaskStatus,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TaskQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub project_id: Option<u64>,
    pub assigned_to: Option<u64>,
    /// todo | in_progress | completed
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MyTaskQuery {
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TaskReportQuery {
    /// pdf | excel; JSON rows when omitted
    #[serde(rename = "type")]
    pub report_type: Option<String>,
    pub project_id: Option<u64>,
    pub status: Option<TaskStatus>,
}

#[derive(Serialize, ToSchema)]
pub struct TaskListResponse {
    pub data: Vec<Task>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

/// Builds the status change; `completed_at` follows the status
pub fn status_update(status: TaskStatus) -> UpdateBuilder {
    let mut update = UpdateBuilder::new("tasks");
    update.set("status", Some(status.as_ref()));
    if status == TaskStatus::Completed {
        update.set_raw("completed_at", "NOW()");
    } else {
        update.set_raw("completed_at", "NULL");
    }
    update
}

async fn is_active_member(pool: &MySqlPool, project_id: u64, user_id: u64) -> Result<bool, ApiError> {
    let hit = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM project_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.project_id = ? AND m.user_id = ? AND u.is_active = TRUE
        )
        "#,
    )
    .bind(project_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(hit != 0)
}

async fn fetch_task(pool: &MySqlPool, task_id: u64) -> Result<Option<Task>, ApiError> {
    let sql = format!("SELECT {TASK_COLUMNS} {TASK_FROM} WHERE t.id = ?");
    Ok(sqlx::query_as::<_, Task>(&sql)
        .bind(task_id)
        .fetch_optional(pool)
        .await?)
}

#[utoipa::path(
    post,
    path = "/api/v1/task/createTask",
    request_body = CreateTask,
    responses(
        (status = 201, description = "Task created", body = CreatedResponse),
        (status = 400, description = "Validation failed", body = MessageResponse),
        (status = 404, description = "Project not found", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Task"
)]
pub async fn create_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateTask>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;

    if payload.title.trim().is_empty() {
        return Err(ApiError::bad_request("Task title must not be empty").into());
    }

    let project_exists = sqlx::query_scalar::<_, u64>("SELECT id FROM projects WHERE id = ?")
        .bind(payload.project_id)
        .fetch_optional(pool.get_ref())
        .await
        .map_err(ApiError::from)?;
    if project_exists.is_none() {
        return Err(ApiError::not_found("Project not found").into());
    }

    if !is_active_member(pool.get_ref(), payload.project_id, payload.assigned_to).await? {
        return Err(ApiError::bad_request("Assignee must be an active member of the project").into());
    }

    let priority = payload.priority.unwrap_or(TaskPriority::Medium);

    let result = sqlx::query(
        r#"
        INSERT INTO tasks (project_id, title, description, assigned_to, assigned_by, priority, status, due_date)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.project_id)
    .bind(payload.title.trim())
    .bind(payload.description.as_deref())
    .bind(payload.assigned_to)
    .bind(auth.user_id)
    .bind(priority.as_ref())
    .bind(TaskStatus::Todo.as_ref())
    .bind(payload.due_date)
    .execute(pool.get_ref())
    .await
    .map_err(ApiError::from)?;

    let task_id = result.last_insert_id();
    info!(task_id, project_id = payload.project_id, assigned_to = payload.assigned_to, "Task created");

    Ok(HttpResponse::Created().json(CreatedResponse::new("Task created successfully", task_id)))
}

#[utoipa::path(
    get,
    path = "/api/v1/task/getAllTasks",
    params(TaskQuery),
    responses(
        (status = 200, description = "Paginated tasks", body = TaskListResponse),
        (status = 403, description = "Manager/Admin only", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Task"
)]
pub async fn list_tasks(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<TaskQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;
    let page = Page::resolve(query.page, query.per_page);

    let mut filters = Filters::new();
    filters.eq("t.project_id", query.project_id);
    filters.eq("t.assigned_to", query.assigned_to);
    filters.eq("t.status", query.status.map(|s| s.to_string()));
    let where_clause = filters.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM tasks t {where_clause}");
    let total = bind_values!(
        sqlx::query_scalar::<_, i64>(&count_sql),
        filters.values.iter().cloned()
    )
    .fetch_one(pool.get_ref())
    .await
    .map_err(ApiError::from)?;

    let data_sql =
        format!("SELECT {TASK_COLUMNS} {TASK_FROM} {where_clause} ORDER BY t.id DESC LIMIT ? OFFSET ?");
    let data = bind_values!(
        sqlx::query_as::<_, Task>(&data_sql),
        filters.values.iter().cloned()
    )
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool.get_ref())
    .await
    .map_err(ApiError::from)?;

    Ok(HttpResponse::Ok().json(TaskListResponse {
        data,
        page: page.page,
        per_page: page.per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/task/myTasks",
    params(MyTaskQuery),
    responses((status = 200, description = "Tasks assigned to the caller", body = [Task])),
    security(("bearer_auth" = [])),
    tag = "Task"
)]
pub async fn my_tasks(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<MyTaskQuery>,
) -> actix_web::Result<impl Responder> {
    let mut filters = Filters::new();
    filters.eq("t.assigned_to", Some(auth.user_id));
    filters.eq("t.status", query.status.map(|s| s.to_string()));

    let sql = format!(
        "SELECT {TASK_COLUMNS} {TASK_FROM} {} ORDER BY t.due_date IS NULL, t.due_date, t.id DESC",
        filters.where_clause()
    );
    let tasks = bind_values!(sqlx::query_as::<_, Task>(&sql), filters.values.iter().cloned())
        .fetch_all(pool.get_ref())
        .await
        .map_err(ApiError::from)?;

    Ok(HttpResponse::Ok().json(tasks))
}

#[utoipa::path(
    get,
    path = "/api/v1/task/{task_id}",
    params(("task_id" = u64, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task found", body = Task),
        (status = 403, description = "Not allowed", body = MessageResponse),
        (status = 404, description = "Task not found", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Task"
)]
pub async fn get_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let task = fetch_task(pool.get_ref(), path.into_inner())
        .await?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;
    auth.require_self_or_manager(task.assigned_to)?;

    Ok(HttpResponse::Ok().json(task))
}

#[utoipa::path(
    put,
    path = "/api/v1/task/{task_id}",
    params(("task_id" = u64, Path, description = "Task ID")),
    request_body = UpdateTask,
    responses(
        (status = 200, description = "Task updated", body = MessageResponse),
        (status = 400, description = "Validation failed", body = MessageResponse),
        (status = 404, description = "Task not found", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Task"
)]
pub async fn update_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<UpdateTask>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;
    let task_id = path.into_inner();

    let task = fetch_task(pool.get_ref(), task_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;

    if body.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(ApiError::bad_request("Task title must not be empty").into());
    }
    if let Some(assignee) = body.assigned_to {
        if !is_active_member(pool.get_ref(), task.project_id, assignee).await? {
            return Err(
                ApiError::bad_request("Assignee must be an active member of the project").into(),
            );
        }
    }

    let mut update = UpdateBuilder::new("tasks");
    update
        .set("title", body.title.as_deref().map(str::trim))
        .set("description", body.description.clone())
        .set("assigned_to", body.assigned_to)
        .set("priority", body.priority.map(|p| p.to_string()))
        .set("due_date", body.due_date);

    execute_update(pool.get_ref(), update.build("id", task_id)?)
        .await
        .map_err(ApiError::from)?;

    info!(task_id, updated_by = auth.user_id, "Task updated");

    Ok(HttpResponse::Ok().json(MessageResponse::new("Task updated successfully")))
}

#[utoipa::path(
    put,
    path = "/api/v1/task/{task_id}/status",
    params(("task_id" = u64, Path, description = "Task ID")),
    request_body = UpdateTaskStatus,
    responses(
        (status = 200, description = "Status changed", body = MessageResponse),
        (status = 403, description = "Not the assignee", body = MessageResponse),
        (status = 404, description = "Task not found", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Task"
)]
pub async fn update_task_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<UpdateTaskStatus>,
) -> actix_web::Result<impl Responder> {
    let task_id = path.into_inner();

    let task = fetch_task(pool.get_ref(), task_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;
    auth.require_self_or_manager(task.assigned_to)?;

    let update = status_update(body.status).build("id", task_id)?;
    execute_update(pool.get_ref(), update)
        .await
        .map_err(ApiError::from)?;

    info!(task_id, status = %body.status, changed_by = auth.user_id, "Task status changed");

    Ok(HttpResponse::Ok().json(MessageResponse::new("Task status updated")))
}

#[utoipa::path(
    delete,
    path = "/api/v1/task/{task_id}",
    params(("task_id" = u64, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task deleted", body = MessageResponse),
        (status = 404, description = "Task not found", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Task"
)]
pub async fn delete_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;
    let task_id = path.into_inner();

    let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(task_id)
        .execute(pool.get_ref())
        .await
        .map_err(ApiError::from)?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Task not found").into());
    }

    info!(task_id, deleted_by = auth.user_id, "Task deleted");

    Ok(HttpResponse::Ok().json(MessageResponse::new("Task deleted")))
}

pub fn task_table(tasks: &[Task]) -> ReportTable {
    let mut table = ReportTable::new(
        "Task Report",
        vec!["Title", "Project", "Employee ID", "Assignee", "Priority", "Status", "Due Date", "Completed"],
    );
    for t in tasks {
        table.push_row(vec![
            t.title.as_str().into(),
            t.project_name.as_str().into(),
            t.assignee_code.as_str().into(),
            t.assignee_name.as_str().into(),
            t.priority.as_str().into(),
            t.status.as_str().into(),
            t.due_date.map(|d| d.to_string()).into(),
            t.completed_at.map(|d| d.format("%Y-%m-%d %H:%M").to_string()).into(),
        ]);
    }
    table
}

#[utoipa::path(
    get,
    path = "/api/v1/task/taskReport",
    params(TaskReportQuery),
    responses(
        (status = 200, description = "PDF, Excel or JSON rows", body = [Task]),
        (status = 400, description = "Unknown report type", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Task"
)]
pub async fn task_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<TaskReportQuery>,
) -> actix_web::Result<HttpResponse> {
    auth.require_manager_or_admin()?;
    let format = ReportFormat::parse(query.report_type.as_deref())?;

    let mut filters = Filters::new();
    filters.eq("t.project_id", query.project_id);
    filters.eq("t.status", query.status.map(|s| s.to_string()));

    let sql = format!(
        "SELECT {TASK_COLUMNS} {TASK_FROM} {} ORDER BY p.name, t.id",
        filters.where_clause()
    );
    let tasks = bind_values!(sqlx::query_as::<_, Task>(&sql), filters.values.iter().cloned())
        .fetch_all(pool.get_ref())
        .await
        .map_err(ApiError::from)?;

    match format {
        None => Ok(HttpResponse::Ok().json(tasks)),
        Some(format) => Ok(report::download(task_table(&tasks), format, "task-report").await?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::db_utils::SqlValue;

    #[test]
    fn status_filter_accepts_only_known_statuses() {
        let q = web::Query::<TaskQuery>::from_query("status=in_progress").unwrap();
        assert_eq!(q.status, Some(TaskStatus::InProgress));

        assert!(web::Query::<TaskQuery>::from_query("status=bogus").is_err());
        assert!(web::Query::<TaskReportQuery>::from_query("type=pdf&status=done").is_err());
    }

    #[test]
    fn completing_stamps_completed_at() {
        let update = status_update(TaskStatus::Completed).build("id", 5).unwrap();
        assert_eq!(
            update.sql,
            "UPDATE tasks SET status = ?, completed_at = NOW() WHERE id = ?"
        );
        assert_eq!(update.values[0], SqlValue::from("completed"));
    }

    #[test]
    fn reopening_clears_completed_at() {
        let update = status_update(TaskStatus::InProgress).build("id", 5).unwrap();
        assert_eq!(
            update.sql,
            "UPDATE tasks SET status = ?, completed_at = NULL WHERE id = ?"
        );
        assert_eq!(update.values[0], SqlValue::from("in_progress"));
    }
}
