use crate::api::attendance::{AttendanceListResponse, CheckInResponse};
use crate::api::dashboard::{
    AdminSummary, DashboardSummary, EmployeeSummary, ManagerSummary, RoleCount, StatusCount,
    TrendPoint,
};
use crate::api::employee::{CreateEmployee, EmployeeListResponse, UpdateEmployee};
use crate::api::leave_request::{ApplyLeave, LeaveDecision, LeaveListResponse, LeaveView};
use crate::api::project::{AddMember, CreateProject, ProjectDetail, ProjectListResponse, UpdateProject};
use crate::api::task::{CreateTask, TaskListResponse, UpdateTask, UpdateTaskStatus};
use crate::api::upload::{UploadForm, UploadResponse};
use crate::model::attendance::AttendanceView;
use crate::model::leave_request::{LeaveRecord, LeaveStatus, LeaveType};
use crate::model::project::{Project, ProjectMember, ProjectStatus};
use crate::model::role::Role;
use crate::model::task::{Task, TaskPriority, TaskStatus};
use crate::model::user::Employee;
use crate::models::{
    ChangePasswordReq, CreatedResponse, LoginReqDto, LoginResponse, MessageResponse,
    ProfileResponse, SessionUser, SignupReq, TokenPair,
};
use utoipa::Modify;
use utoipa::OpenApi;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Workforce Management API",
        version = "1.0.0",
        description = r#"
## Workforce Management System

REST backend for a workforce-management front end with admin, manager and employee dashboards.

### Key Features
- **Authentication**
  - Sign up, log in, token refresh and logout; login answers with the dashboard for the caller's role
- **Employee Directory**
  - Create, update, list, view and deactivate employees
- **Projects & Tasks**
  - Projects with a team leader and members, tasks assigned to project members
- **Attendance**
  - Daily check-in and check-out with late detection
- **Leave Management**
  - Apply, approve, reject and cancel leave, with optional document attachments
- **Reports**
  - Attendance, leave and task reports as PDF or Excel (`?type=pdf|excel`)
- **Uploads**
  - PDF, PNG and JPEG files up to 10 MB

### Security
Protected endpoints accept a **JWT Bearer** token or the `access_token` cookie set at login.
Roles: `1` Admin, `2` Manager, `3` Employee.

### Response Format
- JSON bodies; errors are `{"message": "..."}`
- Pagination (`page`, `per_page`) on list endpoints
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::me,
        crate::auth::handlers::change_password,

        crate::api::employee::create_employee,
        crate::api::employee::list_employees,
        crate::api::employee::get_employee,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,

        crate::api::project::create_project,
        crate::api::project::list_projects,
        crate::api::project::get_project,
        crate::api::project::update_project,
        crate::api::project::delete_project,
        crate::api::project::add_member,
        crate::api::project::remove_member,

        crate::api::task::create_task,
        crate::api::task::list_tasks,
        crate::api::task::my_tasks,
        crate::api::task::get_task,
        crate::api::task::update_task,
        crate::api::task::update_task_status,
        crate::api::task::delete_task,
        crate::api::task::task_report,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::my_attendance,
        crate::api::attendance::list_attendance,
        crate::api::attendance::attendance_report,

        crate::api::leave_request::apply_leave,
        crate::api::leave_request::my_leaves,
        crate::api::leave_request::list_leaves,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,
        crate::api::leave_request::cancel_leave,
        crate::api::leave_request::leave_report,

        crate::api::upload::upload_file,
        crate::api::upload::download_file,

        crate::api::dashboard::summary,
        crate::api::dashboard::attendance_trend
    ),
    components(
        schemas(
            SignupReq,
            LoginReqDto,
            LoginResponse,
            SessionUser,
            TokenPair,
            ProfileResponse,
            ChangePasswordReq,
            MessageResponse,
            CreatedResponse,
            Role,
            Employee,
            CreateEmployee,
            UpdateEmployee,
            EmployeeListResponse,
            Project,
            ProjectMember,
            ProjectStatus,
            ProjectDetail,
            ProjectListResponse,
            CreateProject,
            UpdateProject,
            AddMember,
            Task,
            TaskStatus,
            TaskPriority,
            CreateTask,
            UpdateTask,
            UpdateTaskStatus,
            TaskListResponse,
            AttendanceView,
            AttendanceListResponse,
            CheckInResponse,
            LeaveType,
            LeaveStatus,
            LeaveRecord,
            LeaveView,
            LeaveListResponse,
            ApplyLeave,
            LeaveDecision,
            UploadForm,
            UploadResponse,
            DashboardSummary,
            AdminSummary,
            ManagerSummary,
            EmployeeSummary,
            StatusCount,
            RoleCount,
            TrendPoint
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Signup, login, token refresh and logout"),
        (name = "User", description = "Caller profile and password"),
        (name = "Employee", description = "Employee directory APIs"),
        (name = "Project", description = "Project and membership APIs"),
        (name = "Task", description = "Task assignment and tracking APIs"),
        (name = "Attendance", description = "Attendance management APIs"),
        (name = "Leave", description = "Leave management APIs"),
        (name = "Upload", description = "Document upload APIs"),
        (name = "Dashboard", description = "Dashboard counters and chart data"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by protected paths
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_routes_and_bearer_scheme() {
        let doc = ApiDoc::openapi();

        assert!(doc.paths.paths.contains_key("/api/v1/userAuth/userLogin"));
        assert!(doc.paths.paths.contains_key("/api/v1/upload/uploadFile"));
        assert!(doc.paths.paths.contains_key("/api/v1/attendance/attendanceReport"));

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
