use crate::{
    api::{attendance, dashboard, employee, leave_request, project, task, upload},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
    error::extractor_errors,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;
use tracing::warn;

/// Per-IP limiter allowing `requests_per_min` with an equal burst
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);

    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_else(|| {
            warn!(requests_per_min, "Invalid rate limit, using defaults");
            GovernorConfig::default()
        });
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    extractor_errors(cfg);

    // Public routes; registered before the protected prefix scope so they match first
    cfg.service(
        web::scope(&format!("{}/userAuth", config.api_prefix))
            .service(
                web::resource("/userLogin")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/userRegister")
                    .wrap(register_limiter)
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refreshToken")
                    .wrap(refresh_limiter)
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/userLogout")
                    .wrap(login_limiter)
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(
                web::scope("/user")
                    .route("/me", web::get().to(handlers::me))
                    .route("/changePassword", web::put().to(handlers::change_password)),
            )
            .service(
                web::scope("/employee")
                    .route("/createEmployee", web::post().to(employee::create_employee))
                    .route("/getAllEmployee", web::get().to(employee::list_employees))
                    // /employee/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(employee::get_employee))
                            .route(web::put().to(employee::update_employee))
                            .route(web::delete().to(employee::delete_employee)),
                    ),
            )
            .service(
                web::scope("/project")
                    .route("/createProject", web::post().to(project::create_project))
                    .route("/getAllProjects", web::get().to(project::list_projects))
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(project::get_project))
                            .route(web::put().to(project::update_project))
                            .route(web::delete().to(project::delete_project)),
                    )
                    .route("/{id}/members", web::post().to(project::add_member))
                    .route(
                        "/{id}/members/{user_id}",
                        web::delete().to(project::remove_member),
                    ),
            )
            .service(
                web::scope("/task")
                    .route("/createTask", web::post().to(task::create_task))
                    .route("/getAllTasks", web::get().to(task::list_tasks))
                    .route("/myTasks", web::get().to(task::my_tasks))
                    .route("/taskReport", web::get().to(task::task_report))
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(task::get_task))
                            .route(web::put().to(task::update_task))
                            .route(web::delete().to(task::delete_task)),
                    )
                    .route("/{id}/status", web::put().to(task::update_task_status)),
            )
            .service(
                web::scope("/attendance")
                    .route("/checkIn", web::post().to(attendance::check_in))
                    .route("/checkOut", web::put().to(attendance::check_out))
                    .route("/myAttendance", web::get().to(attendance::my_attendance))
                    .route("/getAllAttendance", web::get().to(attendance::list_attendance))
                    .route("/attendanceReport", web::get().to(attendance::attendance_report)),
            )
            .service(
                web::scope("/leave")
                    .route("/applyLeave", web::post().to(leave_request::apply_leave))
                    .route("/myLeaves", web::get().to(leave_request::my_leaves))
                    .route("/getAllLeaves", web::get().to(leave_request::list_leaves))
                    .route("/leaveReport", web::get().to(leave_request::leave_report))
                    // /leave/{id}
                    .route("/{id}", web::get().to(leave_request::get_leave))
                    .route("/{id}/approve", web::put().to(leave_request::approve_leave))
                    .route("/{id}/reject", web::put().to(leave_request::reject_leave))
                    .route("/{id}/cancel", web::put().to(leave_request::cancel_leave)),
            )
            .service(
                web::scope("/upload")
                    .route("/uploadFile", web::post().to(upload::upload_file))
                    .route("/{id}", web::get().to(upload::download_file)),
            )
            .service(
                web::scope("/dashboard")
                    .route("/summary", web::get().to(dashboard::summary))
                    .route("/attendanceTrend", web::get().to(dashboard::attendance_trend)),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)
//  └─ redirect_to by role: 1 admin, 2 manager, 3 employee

// API REQUEST
//  └─ Authorization: Bearer access_token (or the access_token cookie)

// ACCESS EXPIRED
//  └─ POST /userAuth/refreshToken with refresh_token
//       └─ rotates both tokens
