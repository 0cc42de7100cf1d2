use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::model::role::Role;
use crate::models::TokenType;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use serde_json::json;
use tracing::debug;

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

fn reject(req: ServiceRequest, body: serde_json::Value) -> ServiceResponse<BoxBody> {
    let resp = HttpResponse::Unauthorized().json(body);
    req.into_response(resp.map_into_boxed_body())
}

/// Bearer header first, then the access cookie set at login
fn bearer_or_cookie(req: &ServiceRequest) -> Result<Option<String>, &'static str> {
    if let Some(h) = req.headers().get("Authorization") {
        let value = h
            .to_str()
            .map_err(|_| "Invalid Authorization header encoding")?;
        return value
            .strip_prefix("Bearer ")
            .map(|t| Some(t.trim().to_string()))
            .ok_or("Authorization header must start with Bearer");
    }

    Ok(req.cookie(ACCESS_COOKIE).map(|c| c.value().to_string()))
}

pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?
        .clone();

    let token = match bearer_or_cookie(&req) {
        Ok(Some(t)) => t,
        Ok(None) => return Ok(reject(req, json!({"message": "Missing access token"}))),
        Err(msg) => return Ok(reject(req, json!({"message": msg}))),
    };

    let claims = match verify_token(&token, &config.jwt_secret) {
        Ok(c) => c,
        Err(e) => {
            debug!(error = %e, "Access token rejected");
            return Ok(reject(req, json!({"message": "Invalid or expired token"})));
        }
    };

    if claims.token_type != TokenType::Access {
        return Ok(reject(req, json!({"message": "Access token required"})));
    }

    let role = match Role::from_id(claims.role) {
        Some(role) => role,
        None => return Ok(reject(req, json!({"message": "Invalid role"}))),
    };

    req.extensions_mut().insert(AuthUser {
        user_id: claims.user_id,
        email: claims.sub,
        role,
        employee_code: claims.employee_code,
    });

    next.call(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{TokenSubject, generate_access_token, generate_refresh_token};
    use crate::config::test_config;
    use actix_web::cookie::Cookie;
    use actix_web::http::StatusCode;
    use actix_web::middleware::from_fn;
    use actix_web::{App, HttpResponse, test, web};

    async fn whoami(user: AuthUser) -> HttpResponse {
        HttpResponse::Ok().body(user.role.dashboard_path())
    }

    fn subject(role: u8) -> TokenSubject {
        TokenSubject {
            user_id: 9,
            email: "mgr@company.com".into(),
            role,
            employee_code: "EMP-009".into(),
        }
    }

    macro_rules! app {
        () => {
            test::init_service(
                App::new().app_data(Data::new(test_config())).service(
                    web::scope("/api/v1")
                        .wrap(from_fn(auth_middleware))
                        .route("/whoami", web::get().to(whoami)),
                ),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn missing_token_is_unauthorized() {
        let app = app!();
        let req = test::TestRequest::get().uri("/api/v1/whoami").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn bearer_access_token_is_accepted() {
        let app = app!();
        let secret = test_config().jwt_secret;
        let token = generate_access_token(&subject(2), &secret, 60).unwrap();

        let req = test::TestRequest::get()
            .uri("/api/v1/whoami")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, "/manager-dashboard");
    }

    #[actix_web::test]
    async fn cookie_token_is_accepted() {
        let app = app!();
        let secret = test_config().jwt_secret;
        let token = generate_access_token(&subject(3), &secret, 60).unwrap();

        let req = test::TestRequest::get()
            .uri("/api/v1/whoami")
            .cookie(Cookie::new(ACCESS_COOKIE, token))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn refresh_token_cannot_be_used_for_access() {
        let app = app!();
        let secret = test_config().jwt_secret;
        let (token, _) = generate_refresh_token(&subject(1), &secret, 60).unwrap();

        let req = test::TestRequest::get()
            .uri("/api/v1/whoami")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn unknown_role_is_rejected() {
        let app = app!();
        let secret = test_config().jwt_secret;
        let token = generate_access_token(&subject(7), &secret, 60).unwrap();

        let req = test::TestRequest::get()
            .uri("/api/v1/whoami")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn bad_token_body_carries_only_a_message() {
        let app = app!();
        let req = test::TestRequest::get()
            .uri("/api/v1/whoami")
            .insert_header(("Authorization", "Bearer not-a-jwt"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({"message": "Invalid or expired token"}));
    }

    #[actix_web::test]
    async fn non_bearer_scheme_is_rejected() {
        let app = app!();
        let req = test::TestRequest::get()
            .uri("/api/v1/whoami")
            .insert_header(("Authorization", "Basic dXNlcjpwYXNz"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
