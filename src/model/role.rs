use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin = 1,
    Manager = 2,
    Employee = 3,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Manager),
            3 => Some(Role::Employee),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    /// Front-end route a freshly logged-in user lands on
    pub fn dashboard_path(self) -> &'static str {
        match self {
            Role::Admin => "/admin-dashboard",
            Role::Manager => "/manager-dashboard",
            Role::Employee => "/employee-dashboard",
        }
    }

    pub fn is_manager_or_admin(self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_follows_role_id() {
        let cases = [
            (1, "/admin-dashboard"),
            (2, "/manager-dashboard"),
            (3, "/employee-dashboard"),
        ];
        for (id, path) in cases {
            assert_eq!(Role::from_id(id).unwrap().dashboard_path(), path);
        }
    }

    #[test]
    fn unknown_role_ids_are_rejected() {
        assert_eq!(Role::from_id(0), None);
        assert_eq!(Role::from_id(4), None);
    }

    #[test]
    fn id_round_trips() {
        assert_eq!(Role::from_id(Role::Manager.id()), Some(Role::Manager));
    }
}
