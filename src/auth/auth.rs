use crate::{error::ApiError, model::role::Role};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload};
use futures::future::{Ready, ready};

/// Caller identity, placed in request extensions by `auth_middleware`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub email: String,
    pub role: Role,
    pub employee_code: String,
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(|| ApiError::unauthorized("Not authenticated")),
        )
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::forbidden("Admin only"))
        }
    }

    pub fn require_manager_or_admin(&self) -> Result<(), ApiError> {
        if self.role.is_manager_or_admin() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Manager/Admin only"))
        }
    }

    /// Lets a user act on their own records; managers and admins on anyone's
    pub fn require_self_or_manager(&self, owner_id: u64) -> Result<(), ApiError> {
        if self.user_id == owner_id || self.role.is_manager_or_admin() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Not allowed to access this record"))
        }
    }

    pub fn is_employee(&self) -> bool {
        self.role == Role::Employee
    }
}

#[cfg(test)]
pub(crate) fn test_user(user_id: u64, role: Role) -> AuthUser {
    AuthUser {
        user_id,
        email: format!("user{user_id}@company.com"),
        role,
        employee_code: format!("EMP-{user_id:03}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn employees_only_reach_their_own_records() {
        let emp = test_user(5, Role::Employee);
        assert!(emp.require_self_or_manager(5).is_ok());
        assert!(emp.require_self_or_manager(6).is_err());
        assert!(emp.require_manager_or_admin().is_err());
    }

    #[test]
    fn managers_are_not_admins() {
        let mgr = test_user(2, Role::Manager);
        assert!(mgr.require_manager_or_admin().is_ok());
        assert!(mgr.require_self_or_manager(99).is_ok());
        assert!(mgr.require_admin().is_err());
    }
}
