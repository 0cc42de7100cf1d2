pub mod attendance;
pub mod dashboard;
pub mod employee;
pub mod leave_request;
pub mod project;
pub mod task;
pub mod upload;
