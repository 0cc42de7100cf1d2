use crate::{
    api::upload::ensure_document_owner,
    auth::{
        auth::AuthUser,
        handlers::{NewAccount, create_account, fetch_employee, validate_identity},
        password::validate_new_password,
    },
    error::{ApiError, is_duplicate_key},
    model::{
        role::Role,
        user::{EMPLOYEE_COLUMNS, Employee},
    },
    models::{CreatedResponse, MessageResponse},
    utils::{
        db_utils::{Filters, UpdateBuilder, bind_values, execute_update},
        directory_index::{self, IdentityKey},
        pagination::Page,
    },
};
use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = "Jane Doe")]
    pub name: String,
    #[schema(example = "jane.doe@company.com")]
    pub email: String,
    #[schema(example = "EMP-002")]
    pub employee_code: String,
    pub password: String,
    pub confirm_password: String,
    /// 1 = admin, 2 = manager, 3 = employee
    #[schema(example = 3)]
    pub role_id: u8,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub designation: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub role_id: Option<u8>,
    pub department: Option<String>,
    pub is_active: Option<bool>,
    /// Matches name, email or employee ID
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<Employee>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 42)]
    pub total: i64,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateEmployee {
    pub name: Option<String>,
    pub email: Option<String>,
    pub employee_code: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub designation: Option<String>,
    pub role_id: Option<u8>,
    pub is_active: Option<bool>,
    pub profile_document_id: Option<u64>,
}

impl UpdateEmployee {
    /// Fields a non-admin may change on their own record
    fn only_self_service_fields(&self) -> bool {
        self.email.is_none()
            && self.employee_code.is_none()
            && self.department.is_none()
            && self.designation.is_none()
            && self.role_id.is_none()
            && self.is_active.is_none()
    }
}

/// Create Employee (admin)
#[utoipa::path(
    post,
    path = "/api/v1/employee/createEmployee",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created", body = CreatedResponse),
        (status = 400, description = "Validation failed", body = MessageResponse),
        (status = 403, description = "Admin only", body = MessageResponse),
        (status = 409, description = "Email or employee ID taken", body = MessageResponse)
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateEmployee>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    validate_identity(&payload.name, &payload.email, &payload.employee_code)?;
    validate_new_password(&payload.password, &payload.confirm_password)?;
    let role = Role::from_id(payload.role_id)
        .ok_or_else(|| ApiError::bad_request("role_id must be 1, 2 or 3"))?;

    let id = create_account(
        pool.get_ref(),
        NewAccount {
            name: &payload.name,
            email: &payload.email,
            employee_code: &payload.employee_code,
            password: &payload.password,
            role,
            phone: payload.phone.as_deref(),
            department: payload.department.as_deref(),
            designation: payload.designation.as_deref(),
        },
    )
    .await?;

    info!(created_by = auth.user_id, user_id = id, "Employee created");

    Ok(HttpResponse::Created().json(CreatedResponse::new("Employee created successfully", id)))
}

#[utoipa::path(
    get,
    path = "/api/v1/employee/getAllEmployee",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse),
        (status = 403, description = "Manager/Admin only", body = MessageResponse)
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;

    let page = Page::resolve(query.page, query.per_page);

    let mut filters = Filters::new();
    filters.eq("role_id", query.role_id);
    filters.eq("department", query.department.clone());
    filters.eq("is_active", query.is_active);
    filters.search(&["name", "email", "employee_code"], query.search.as_deref());
    let where_clause = filters.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM users {where_clause}");
    debug!(sql = %count_sql, values = ?filters.values, "Counting employees");

    let total = bind_values!(
        sqlx::query_scalar::<_, i64>(&count_sql),
        filters.values.iter().cloned()
    )
    .fetch_one(pool.get_ref())
    .await
    .map_err(ApiError::from)?;

    let data_sql = format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM users {where_clause} ORDER BY id DESC LIMIT ? OFFSET ?"
    );

    let employees = bind_values!(
        sqlx::query_as::<_, Employee>(&data_sql),
        filters.values.iter().cloned()
    )
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool.get_ref())
    .await
    .map_err(ApiError::from)?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data: employees,
        page: page.page,
        per_page: page.per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/employee/{employee_id}",
    params(("employee_id" = u64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 403, description = "Not allowed", body = MessageResponse),
        (status = 404, description = "Employee not found", body = MessageResponse)
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    auth.require_self_or_manager(employee_id)?;

    let employee = fetch_employee(pool.get_ref(), employee_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Employee not found"))?;

    Ok(HttpResponse::Ok().json(employee))
}

#[utoipa::path(
    put,
    path = "/api/v1/employee/{employee_id}",
    params(("employee_id" = u64, Path, description = "User ID")),
    request_body = UpdateEmployee,
    responses(
        (status = 200, description = "Employee updated", body = MessageResponse),
        (status = 400, description = "Nothing to update or invalid value", body = MessageResponse),
        (status = 403, description = "Not allowed", body = MessageResponse),
        (status = 404, description = "Employee not found", body = MessageResponse),
        (status = 409, description = "Email or employee ID taken", body = MessageResponse)
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<UpdateEmployee>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();

    let is_admin = auth.role == Role::Admin;
    if !is_admin && !(auth.user_id == employee_id && body.only_self_service_fields()) {
        return Err(ApiError::forbidden("Not allowed to update this employee").into());
    }

    if let Some(role_id) = body.role_id {
        Role::from_id(role_id).ok_or_else(|| ApiError::bad_request("role_id must be 1, 2 or 3"))?;
    }
    if body.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::bad_request("Name must not be empty").into());
    }
    if body.email.as_deref().is_some_and(|e| !e.contains('@')) {
        return Err(ApiError::bad_request("Invalid email address").into());
    }
    if body.employee_code.as_deref().is_some_and(|c| c.trim().is_empty()) {
        return Err(ApiError::bad_request("Employee ID must not be empty").into());
    }
    if body.is_active == Some(false) && employee_id == auth.user_id {
        return Err(ApiError::bad_request("You cannot deactivate your own account").into());
    }

    let current = fetch_employee(pool.get_ref(), employee_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Employee not found"))?;

    if let Some(document_id) = body.profile_document_id {
        ensure_document_owner(pool.get_ref(), document_id, employee_id).await?;
    }

    let email = body.email.as_deref().map(|e| e.trim().to_lowercase());
    let code = body.employee_code.as_deref().map(|c| c.trim().to_uppercase());

    let mut update = UpdateBuilder::new("users");
    update
        .set("name", body.name.as_deref().map(str::trim))
        .set("email", email.clone())
        .set("employee_code", code.clone())
        .set("phone", body.phone.clone())
        .set("department", body.department.clone())
        .set("designation", body.designation.clone())
        .set("role_id", body.role_id)
        .set("is_active", body.is_active)
        .set("profile_document_id", body.profile_document_id);

    let sql_update = update.build("id", employee_id)?;

    match execute_update(pool.get_ref(), sql_update).await {
        Ok(_) => {}
        Err(e) if is_duplicate_key(&e) => {
            return Err(ApiError::conflict("Email or employee ID already exists").into());
        }
        Err(e) => return Err(ApiError::from(e).into()),
    }

    if let Some(email) = email.filter(|e| *e != current.email) {
        directory_index::forget(IdentityKey::Email(&current.email)).await;
        directory_index::remember(IdentityKey::Email(&email)).await;
    }
    if let Some(code) = code.filter(|c| *c != current.employee_code) {
        directory_index::forget(IdentityKey::EmployeeCode(&current.employee_code)).await;
        directory_index::remember(IdentityKey::EmployeeCode(&code)).await;
    }

    if body.is_active == Some(false) {
        revoke_sessions(pool.get_ref(), employee_id).await?;
    }

    info!(updated_by = auth.user_id, user_id = employee_id, "Employee updated");

    Ok(HttpResponse::Ok().json(MessageResponse::new("Employee updated successfully")))
}

async fn revoke_sessions(pool: &MySqlPool, user_id: u64) -> Result<(), ApiError> {
    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = ? AND revoked = FALSE")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Deactivate Employee (soft delete)
#[utoipa::path(
    delete,
    path = "/api/v1/employee/{employee_id}",
    params(("employee_id" = u64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Employee deactivated", body = MessageResponse),
        (status = 400, description = "Cannot deactivate yourself", body = MessageResponse),
        (status = 403, description = "Admin only", body = MessageResponse),
        (status = 404, description = "Employee not found", body = MessageResponse)
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn delete_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let employee_id = path.into_inner();
    if employee_id == auth.user_id {
        return Err(ApiError::bad_request("You cannot deactivate your own account").into());
    }

    let exists = sqlx::query_scalar::<_, u64>("SELECT id FROM users WHERE id = ?")
        .bind(employee_id)
        .fetch_optional(pool.get_ref())
        .await
        .map_err(ApiError::from)?;
    if exists.is_none() {
        return Err(ApiError::not_found("Employee not found").into());
    }

    sqlx::query("UPDATE users SET is_active = FALSE WHERE id = ?")
        .bind(employee_id)
        .execute(pool.get_ref())
        .await
        .map_err(ApiError::from)?;
    revoke_sessions(pool.get_ref(), employee_id).await?;

    info!(deactivated_by = auth.user_id, user_id = employee_id, "Employee deactivated");

    Ok(HttpResponse::Ok().json(MessageResponse::new("Employee deactivated")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_update() -> UpdateEmployee {
        UpdateEmployee {
            name: None,
            email: None,
            employee_code: None,
            phone: None,
            department: None,
            designation: None,
            role_id: None,
            is_active: None,
            profile_document_id: None,
        }
    }

    #[test]
    fn self_service_covers_name_phone_and_picture() {
        let mut u = empty_update();
        u.name = Some("Jane".into());
        u.phone = Some("+880".into());
        u.profile_document_id = Some(4);
        assert!(u.only_self_service_fields());
    }

    #[test]
    fn role_changes_are_not_self_service() {
        let mut u = empty_update();
        u.role_id = Some(1);
        assert!(!u.only_self_service_fields());

        let mut u = empty_update();
        u.email = Some("new@company.com".into());
        assert!(!u.only_self_service_fields());
    }
}
