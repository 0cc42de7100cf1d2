use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::user::Employee;

#[derive(Deserialize, ToSchema)]
pub struct SignupReq {
    #[schema(example = "John Doe")]
    pub name: String,
    #[schema(example = "john.doe@company.com")]
    pub email: String,
    #[schema(example = "EMP-001")]
    pub employee_code: String,
    #[schema(example = "secret123")]
    pub password: String,
    #[schema(example = "secret123")]
    pub confirm_password: String,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub designation: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginReqDto {
    #[schema(example = "john.doe@company.com")]
    pub email: String,
    #[schema(example = "secret123")]
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[schema(example = 3)]
    pub role: u8,
    #[schema(example = "/employee-dashboard")]
    pub redirect_to: String,
    pub user: SessionUser,
}

#[derive(Serialize, ToSchema)]
pub struct SessionUser {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub employee_code: String,
}

#[derive(Serialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Serialize, ToSchema)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub user: Employee,
    #[schema(example = "/employee-dashboard")]
    pub redirect_to: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ChangePasswordReq {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// Plain `{"message": ...}` body
#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    #[schema(example = "Done")]
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// `{"message": ..., "id": ...}` returned after an insert
#[derive(Serialize, ToSchema)]
pub struct CreatedResponse {
    #[schema(example = "Created successfully")]
    pub message: String,
    #[schema(example = 12)]
    pub id: u64,
}

impl CreatedResponse {
    pub fn new(message: impl Into<String>, id: u64) -> Self {
        Self {
            message: message.into(),
            id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    /// user email
    pub sub: String,
    pub role: u8, // role id
    pub exp: usize,
    pub jti: String,

    pub token_type: TokenType,
    pub employee_code: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum TokenType {
    Access,
    Refresh,
}
