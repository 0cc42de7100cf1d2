use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Column list matching [`Employee`]
pub const EMPLOYEE_COLUMNS: &str = "id, employee_code, name, email, role_id, phone, department, \
     designation, profile_document_id, is_active, last_login_at, created_at";

/// Public view of a user record; the password hash never leaves the auth layer.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "employee_code": "EMP-001",
        "name": "John Doe",
        "email": "john.doe@company.com",
        "role_id": 3,
        "phone": "+8801712345678",
        "department": "Engineering",
        "designation": "Backend Engineer",
        "profile_document_id": null,
        "is_active": true,
        "last_login_at": "2026-01-01T09:00:00Z",
        "created_at": "2026-01-01T00:00:00Z"
    })
)]
pub struct Employee {
    pub id: u64,
    pub employee_code: String,
    pub name: String,
    pub email: String,
    pub role_id: u8,
    #[schema(nullable = true)]
    pub phone: Option<String>,
    #[schema(nullable = true)]
    pub department: Option<String>,
    #[schema(nullable = true)]
    pub designation: Option<String>,
    #[schema(nullable = true)]
    pub profile_document_id: Option<u64>,
    pub is_active: bool,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub last_login_at: Option<DateTime<Utc>>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

/// Row used by login and password checks
#[derive(sqlx::FromRow)]
pub struct UserCredentials {
    pub id: u64,
    pub employee_code: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub role_id: u8,
    pub is_active: bool,
}
