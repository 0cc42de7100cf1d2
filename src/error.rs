use actix_web::{
    HttpResponse, ResponseError,
    error::JsonPayloadError,
    http::StatusCode,
    web::{self, ServiceConfig},
};
use derive_more::Display;
use serde_json::json;

/// Error returned by handlers; rendered as `{"message": "..."}`.
#[derive(Debug, Display)]
pub enum ApiError {
    #[display(fmt = "{}", _0)]
    BadRequest(String),
    #[display(fmt = "{}", _0)]
    Unauthorized(String),
    #[display(fmt = "{}", _0)]
    Forbidden(String),
    #[display(fmt = "{}", _0)]
    NotFound(String),
    #[display(fmt = "{}", _0)]
    Conflict(String),
    #[display(fmt = "{}", _0)]
    PayloadTooLarge(String),
    #[display(fmt = "{}", _0)]
    UnsupportedMediaType(String),
    #[display(fmt = "Internal Server Error")]
    Internal,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        ApiError::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ApiError::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ApiError::Conflict(msg.into())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "message": self.to_string() }))
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!(error = %e, "Database error");
        ApiError::Internal
    }
}

/// Body, query and path extraction failures answer in the same `{"message"}` shape
pub fn extractor_errors(cfg: &mut ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        let api_err = match &err {
            JsonPayloadError::OverflowKnownLength { .. } | JsonPayloadError::Overflow { .. } => {
                ApiError::PayloadTooLarge(err.to_string())
            }
            JsonPayloadError::ContentType => ApiError::UnsupportedMediaType(err.to_string()),
            _ => ApiError::BadRequest(err.to_string()),
        };
        api_err.into()
    }))
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into()),
    );
}

/// MySQL reports unique-key violations as SQLSTATE 23000
pub fn is_duplicate_key(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23000"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::leave_request::ApplyLeave;
    use actix_web::body::to_bytes;
    use actix_web::{App, test};
    use serde::Deserialize;

    #[actix_web::test]
    async fn renders_message_body_with_status() {
        let resp = ApiError::conflict("Email already registered").error_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["message"], "Email already registered");
    }

    #[::std::prelude::v1::test]
    fn internal_error_hides_details() {
        let err: ApiError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Internal Server Error");
    }

    #[derive(Deserialize)]
    struct Paging {
        #[allow(dead_code)]
        page: u32,
    }

    async fn apply(_body: web::Json<ApplyLeave>) -> HttpResponse {
        HttpResponse::Created().finish()
    }

    async fn list(_q: web::Query<Paging>) -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    async fn show(_id: web::Path<u64>) -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    async fn message_of(resp: actix_web::dev::ServiceResponse) -> serde_json::Value {
        let body: serde_json::Value = test::read_body_json(resp).await;
        body
    }

    #[actix_web::test]
    async fn unknown_leave_type_is_a_json_bad_request() {
        let app = test::init_service(
            App::new()
                .configure(extractor_errors)
                .route("/leave", web::post().to(apply)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/leave")
            .set_json(json!({
                "leave_type": "vacation",
                "start_date": "2026-04-06",
                "end_date": "2026-04-08"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = message_of(resp).await;
        assert!(body["message"].as_str().unwrap().contains("vacation"));
    }

    #[actix_web::test]
    async fn bad_query_and_path_values_are_json_bad_requests() {
        let app = test::init_service(
            App::new()
                .configure(extractor_errors)
                .route("/items", web::get().to(list))
                .route("/items/{id}", web::get().to(show)),
        )
        .await;

        for uri in ["/items?page=first", "/items/abc"] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
            assert!(message_of(resp).await["message"].is_string(), "{uri}");
        }
    }

    #[::std::prelude::v1::test]
    fn non_database_errors_are_not_duplicates() {
        assert!(!is_duplicate_key(&sqlx::Error::RowNotFound));
    }
}
