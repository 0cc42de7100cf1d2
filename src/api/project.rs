use crate::{
    auth::auth::AuthUser,
    error::ApiError,
    model::project::{Project, ProjectMember, ProjectStatus},
    models::{CreatedResponse, MessageResponse},
    utils::{
        db_utils::{Filters, SqlValue, UpdateBuilder, bind_values, execute_update},
        pagination::Page,
    },
};
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const PROJECT_SELECT: &str = r#"
    SELECT p.id, p.name, p.description, p.team_leader_id, u.name AS team_leader_name,
           p.status, p.start_date, p.end_date, p.created_by, p.created_at
    FROM projects p
    JOIN users u ON u.id = p.team_leader_id
"#;

#[derive(Deserialize, ToSchema)]
pub struct CreateProject {
    #[schema(example = "Payroll revamp")]
    pub name: String,
    pub description: Option<String>,
    #[schema(example = 4)]
    pub team_leader_id: u64,
    pub status: Option<ProjectStatus>,
    #[schema(example = "2026-01-01", value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(example = "2026-06-30", value_type = Option<String>, format = "date")]
    pub end_date: Option<NaiveDate>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub description: Option<String>,
    pub team_leader_id: Option<u64>,
    pub status: Option<ProjectStatus>,
    #[schema(value_type = Option<String>, format = "date")]
    pub start_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = "date")]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProjectQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// planned | active | on_hold | completed
    pub status: Option<ProjectStatus>,
    /// Matches the project name
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ProjectListResponse {
    pub data: Vec<Project>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[derive(Serialize, ToSchema)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub members: Vec<ProjectMember>,
}

#[derive(Deserialize, ToSchema)]
pub struct AddMember {
    #[schema(example = 9)]
    pub user_id: u64,
}

pub fn validate_dates(start: NaiveDate, end: Option<NaiveDate>) -> Result<(), ApiError> {
    match end {
        Some(end) if end < start => Err(ApiError::bad_request(
            "end_date cannot be before start_date",
        )),
        _ => Ok(()),
    }
}

pub async fn is_active_user(pool: &MySqlPool, user_id: u64) -> Result<bool, ApiError> {
    Ok(
        sqlx::query_scalar::<_, bool>("SELECT is_active FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(pool)
            .await?
            .unwrap_or(false),
    )
}

pub async fn fetch_project(pool: &MySqlPool, project_id: u64) -> Result<Option<Project>, ApiError> {
    let sql = format!("{PROJECT_SELECT} WHERE p.id = ?");
    Ok(sqlx::query_as::<_, Project>(&sql)
        .bind(project_id)
        .fetch_optional(pool)
        .await?)
}

/// Leader or listed member
pub async fn is_participant(pool: &MySqlPool, project_id: u64, user_id: u64) -> Result<bool, ApiError> {
    let hit = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM projects WHERE id = ? AND team_leader_id = ?
            UNION ALL
            SELECT 1 FROM project_members WHERE project_id = ? AND user_id = ?
        )
        "#,
    )
    .bind(project_id)
    .bind(user_id)
    .bind(project_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(hit != 0)
}

async fn fetch_members(pool: &MySqlPool, project_id: u64) -> Result<Vec<ProjectMember>, ApiError> {
    Ok(sqlx::query_as::<_, ProjectMember>(
        r#"
        SELECT u.id AS user_id, u.employee_code, u.name, u.email, m.added_at
        FROM project_members m
        JOIN users u ON u.id = m.user_id
        WHERE m.project_id = ?
        ORDER BY u.name
        "#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?)
}

#[utoipa::path(
    post,
    path = "/api/v1/project/createProject",
    request_body = CreateProject,
    responses(
        (status = 201, description = "Project created", body = CreatedResponse),
        (status = 400, description = "Validation failed", body = MessageResponse),
        (status = 403, description = "Manager/Admin only", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Project"
)]
pub async fn create_project(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateProject>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;

    if payload.name.trim().is_empty() {
        return Err(ApiError::bad_request("Project name must not be empty").into());
    }
    validate_dates(payload.start_date, payload.end_date)?;
    if !is_active_user(pool.get_ref(), payload.team_leader_id).await? {
        return Err(ApiError::bad_request("Team leader not found").into());
    }

    let status = payload.status.unwrap_or(ProjectStatus::Planned);

    let mut tx = pool.begin().await.map_err(ApiError::from)?;
    let result = sqlx::query(
        r#"
        INSERT INTO projects (name, description, team_leader_id, status, start_date, end_date, created_by)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.name.trim())
    .bind(payload.description.as_deref())
    .bind(payload.team_leader_id)
    .bind(status.as_ref())
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(auth.user_id)
    .execute(&mut *tx)
    .await
    .map_err(ApiError::from)?;

    let project_id = result.last_insert_id();

    sqlx::query("INSERT INTO project_members (project_id, user_id) VALUES (?, ?)")
        .bind(project_id)
        .bind(payload.team_leader_id)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::from)?;
    tx.commit().await.map_err(ApiError::from)?;

    info!(project_id, created_by = auth.user_id, "Project created");

    Ok(HttpResponse::Created().json(CreatedResponse::new("Project created successfully", project_id)))
}

#[utoipa::path(
    get,
    path = "/api/v1/project/getAllProjects",
    params(ProjectQuery),
    responses(
        (status = 200, description = "Paginated projects visible to the caller", body = ProjectListResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Project"
)]
pub async fn list_projects(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ProjectQuery>,
) -> actix_web::Result<impl Responder> {
    let page = Page::resolve(query.page, query.per_page);

    let mut filters = Filters::new();
    filters.eq("p.status", query.status.map(|s| s.to_string()));
    filters.search(&["p.name"], query.search.as_deref());
    if auth.is_employee() {
        filters.push(
            "(p.team_leader_id = ? OR EXISTS (SELECT 1 FROM project_members m WHERE m.project_id = p.id AND m.user_id = ?))",
            [SqlValue::U64(auth.user_id), SqlValue::U64(auth.user_id)],
        );
    }
    let where_clause = filters.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM projects p {where_clause}");
    let total = bind_values!(
        sqlx::query_scalar::<_, i64>(&count_sql),
        filters.values.iter().cloned()
    )
    .fetch_one(pool.get_ref())
    .await
    .map_err(ApiError::from)?;

    let data_sql = format!("{PROJECT_SELECT} {where_clause} ORDER BY p.id DESC LIMIT ? OFFSET ?");
    let data = bind_values!(
        sqlx::query_as::<_, Project>(&data_sql),
        filters.values.iter().cloned()
    )
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool.get_ref())
    .await
    .map_err(ApiError::from)?;

    Ok(HttpResponse::Ok().json(ProjectListResponse {
        data,
        page: page.page,
        per_page: page.per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/project/{project_id}",
    params(("project_id" = u64, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project with members", body = ProjectDetail),
        (status = 403, description = "Not a participant", body = MessageResponse),
        (status = 404, description = "Project not found", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Project"
)]
pub async fn get_project(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let project_id = path.into_inner();

    let project = fetch_project(pool.get_ref(), project_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project not found"))?;

    if auth.is_employee() && !is_participant(pool.get_ref(), project_id, auth.user_id).await? {
        return Err(ApiError::forbidden("You are not part of this project").into());
    }

    let members = fetch_members(pool.get_ref(), project_id).await?;

    Ok(HttpResponse::Ok().json(ProjectDetail { project, members }))
}

#[utoipa::path(
    put,
    path = "/api/v1/project/{project_id}",
    params(("project_id" = u64, Path, description = "Project ID")),
    request_body = UpdateProject,
    responses(
        (status = 200, description = "Project updated", body = MessageResponse),
        (status = 400, description = "Validation failed", body = MessageResponse),
        (status = 404, description = "Project not found", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Project"
)]
pub async fn update_project(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<UpdateProject>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;
    let project_id = path.into_inner();

    let current = fetch_project(pool.get_ref(), project_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project not found"))?;

    if body.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::bad_request("Project name must not be empty").into());
    }
    validate_dates(
        body.start_date.unwrap_or(current.start_date),
        body.end_date.or(current.end_date),
    )?;

    let new_leader = body.team_leader_id.filter(|id| *id != current.team_leader_id);
    if let Some(leader) = new_leader {
        if !is_active_user(pool.get_ref(), leader).await? {
            return Err(ApiError::bad_request("Team leader not found").into());
        }
    }

    let mut update = UpdateBuilder::new("projects");
    update
        .set("name", body.name.as_deref().map(str::trim))
        .set("description", body.description.clone())
        .set("team_leader_id", body.team_leader_id)
        .set("status", body.status.map(|s| s.to_string()))
        .set("start_date", body.start_date)
        .set("end_date", body.end_date);

    execute_update(pool.get_ref(), update.build("id", project_id)?)
        .await
        .map_err(ApiError::from)?;

    if let Some(leader) = new_leader {
        sqlx::query("INSERT IGNORE INTO project_members (project_id, user_id) VALUES (?, ?)")
            .bind(project_id)
            .bind(leader)
            .execute(pool.get_ref())
            .await
            .map_err(ApiError::from)?;
    }

    info!(project_id, updated_by = auth.user_id, "Project updated");

    Ok(HttpResponse::Ok().json(MessageResponse::new("Project updated successfully")))
}

#[utoipa::path(
    delete,
    path = "/api/v1/project/{project_id}",
    params(("project_id" = u64, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project deleted with its members and tasks", body = MessageResponse),
        (status = 403, description = "Admin only", body = MessageResponse),
        (status = 404, description = "Project not found", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Project"
)]
pub async fn delete_project(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let project_id = path.into_inner();

    let result = sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(project_id)
        .execute(pool.get_ref())
        .await
        .map_err(ApiError::from)?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Project not found").into());
    }

    info!(project_id, deleted_by = auth.user_id, "Project deleted");

    Ok(HttpResponse::Ok().json(MessageResponse::new("Project deleted")))
}

#[utoipa::path(
    post,
    path = "/api/v1/project/{project_id}/members",
    params(("project_id" = u64, Path, description = "Project ID")),
    request_body = AddMember,
    responses(
        (status = 200, description = "Member added (idempotent)", body = MessageResponse),
        (status = 404, description = "Project or user not found", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Project"
)]
pub async fn add_member(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<AddMember>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;
    let project_id = path.into_inner();

    if fetch_project(pool.get_ref(), project_id).await?.is_none() {
        return Err(ApiError::not_found("Project not found").into());
    }
    if !is_active_user(pool.get_ref(), body.user_id).await? {
        return Err(ApiError::not_found("User not found").into());
    }

    sqlx::query("INSERT IGNORE INTO project_members (project_id, user_id) VALUES (?, ?)")
        .bind(project_id)
        .bind(body.user_id)
        .execute(pool.get_ref())
        .await
        .map_err(ApiError::from)?;

    Ok(HttpResponse::Ok().json(MessageResponse::new("Member added")))
}

#[utoipa::path(
    delete,
    path = "/api/v1/project/{project_id}/members/{user_id}",
    params(
        ("project_id" = u64, Path, description = "Project ID"),
        ("user_id" = u64, Path, description = "Member user ID")
    ),
    responses(
        (status = 200, description = "Member removed", body = MessageResponse),
        (status = 400, description = "Team leader cannot be removed", body = MessageResponse),
        (status = 404, description = "Not a member", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Project"
)]
pub async fn remove_member(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<(u64, u64)>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;
    let (project_id, user_id) = path.into_inner();

    let project = fetch_project(pool.get_ref(), project_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project not found"))?;
    if project.team_leader_id == user_id {
        return Err(ApiError::bad_request("The team leader cannot be removed").into());
    }

    let result = sqlx::query("DELETE FROM project_members WHERE project_id = ? AND user_id = ?")
        .bind(project_id)
        .bind(user_id)
        .execute(pool.get_ref())
        .await
        .map_err(ApiError::from)?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("User is not a member of this project").into());
    }

    Ok(HttpResponse::Ok().json(MessageResponse::new("Member removed")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_status_filter_is_rejected() {
        assert!(web::Query::<ProjectQuery>::from_query("status=bogus").is_err());
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, day).unwrap()
    }

    #[test]
    fn end_date_may_equal_start() {
        assert!(validate_dates(d(10), Some(d(10))).is_ok());
        assert!(validate_dates(d(10), None).is_ok());
    }

    #[test]
    fn end_before_start_is_rejected() {
        let err = validate_dates(d(10), Some(d(9))).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
