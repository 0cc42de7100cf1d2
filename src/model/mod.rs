pub mod attendance;
pub mod document;
pub mod leave_request;
pub mod project;
pub mod role;
pub mod task;
pub mod user;
