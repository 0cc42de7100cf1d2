use crate::{
    auth::{
        auth::AuthUser,
        jwt::{TokenSubject, generate_access_token, generate_refresh_token, verify_token},
        middleware::{ACCESS_COOKIE, REFRESH_COOKIE},
        password::{hash_password, validate_new_password, verify_password},
    },
    config::Config,
    error::{ApiError, is_duplicate_key},
    model::{
        role::Role,
        user::{EMPLOYEE_COLUMNS, Employee, UserCredentials},
    },
    models::{
        ChangePasswordReq, LoginReqDto, LoginResponse, MessageResponse, ProfileResponse,
        SessionUser, SignupReq, TokenPair, TokenType,
    },
    utils::directory_index::{self, IdentityKey},
};
use actix_web::{
    HttpRequest, HttpResponse, HttpResponseBuilder, Responder,
    cookie::{Cookie, SameSite, time::Duration as CookieDuration},
    web,
};
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument, warn};

/// Profile fields accepted when a new account is created
pub struct NewAccount<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub employee_code: &'a str,
    pub password: &'a str,
    pub role: Role,
    pub phone: Option<&'a str>,
    pub department: Option<&'a str>,
    pub designation: Option<&'a str>,
}

pub fn validate_identity(name: &str, email: &str, employee_code: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() || email.trim().is_empty() || employee_code.trim().is_empty() {
        return Err(ApiError::bad_request(
            "Name, email and employee ID must not be empty",
        ));
    }
    if !email.contains('@') {
        return Err(ApiError::bad_request("Invalid email address"));
    }
    Ok(())
}

/// Checks uniqueness, hashes the password and inserts the user; returns the new id
pub async fn create_account(pool: &MySqlPool, account: NewAccount<'_>) -> Result<u64, ApiError> {
    let email = account.email.trim().to_lowercase();
    let code = account.employee_code.trim().to_uppercase();

    if !directory_index::is_available(IdentityKey::Email(&email), pool).await? {
        return Err(ApiError::conflict("Email already registered"));
    }
    if !directory_index::is_available(IdentityKey::EmployeeCode(&code), pool).await? {
        return Err(ApiError::conflict("Employee ID already exists"));
    }

    let hashed = hash_password(account.password).map_err(|e| {
        error!(error = %e, "Failed to hash password");
        ApiError::Internal
    })?;

    let result = sqlx::query(
        r#"
        INSERT INTO users
            (employee_code, name, email, password, role_id, phone, department, designation)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&code)
    .bind(account.name.trim())
    .bind(&email)
    .bind(hashed)
    .bind(account.role.id())
    .bind(account.phone)
    .bind(account.department)
    .bind(account.designation)
    .execute(pool)
    .await;

    match result {
        Ok(done) => {
            directory_index::remember(IdentityKey::Email(&email)).await;
            directory_index::remember(IdentityKey::EmployeeCode(&code)).await;
            Ok(done.last_insert_id())
        }
        Err(e) if is_duplicate_key(&e) => {
            Err(ApiError::conflict("Email or employee ID already exists"))
        }
        Err(e) => Err(e.into()),
    }
}

/// User registration handler; self-registered accounts are always employees
#[utoipa::path(
    post,
    path = "/api/v1/userAuth/userRegister",
    request_body = SignupReq,
    responses(
        (status = 201, description = "Account created", body = MessageResponse),
        (status = 400, description = "Validation failed", body = MessageResponse),
        (status = 409, description = "Email or employee ID taken", body = MessageResponse)
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_register", skip(pool, user), fields(email = %user.email))]
pub async fn register(
    user: web::Json<SignupReq>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    validate_identity(&user.name, &user.email, &user.employee_code)?;
    validate_new_password(&user.password, &user.confirm_password)?;

    let id = create_account(
        pool.get_ref(),
        NewAccount {
            name: &user.name,
            email: &user.email,
            employee_code: &user.employee_code,
            password: &user.password,
            role: Role::Employee,
            phone: user.phone.as_deref(),
            department: user.department.as_deref(),
            designation: user.designation.as_deref(),
        },
    )
    .await?;

    info!(user_id = id, "User registered");

    Ok(HttpResponse::Created().json(MessageResponse::new("User registered successfully")))
}

fn auth_cookie(name: &'static str, value: String, ttl: usize, secure: bool) -> Cookie<'static> {
    Cookie::build(name, value)
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::seconds(ttl as i64))
        .finish()
}

fn removal_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::build(name, "").path("/").finish();
    cookie.make_removal();
    cookie
}

/// Issues a fresh access/refresh pair and records the refresh jti
async fn issue_tokens<'e, E>(
    subject: &TokenSubject,
    executor: E,
    config: &Config,
) -> Result<TokenPair, ApiError>
where
    E: sqlx::Executor<'e, Database = sqlx::MySql>,
{
    let access_token = generate_access_token(subject, &config.jwt_secret, config.access_token_ttl)
        .map_err(|e| {
            error!(error = %e, "Failed to sign access token");
            ApiError::Internal
        })?;

    let (refresh_token, refresh_claims) =
        generate_refresh_token(subject, &config.jwt_secret, config.refresh_token_ttl).map_err(
            |e| {
                error!(error = %e, "Failed to sign refresh token");
                ApiError::Internal
            },
        )?;

    debug!(user_id = subject.user_id, jti = %refresh_claims.jti, "Storing refresh token");

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(subject.user_id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(executor)
    .await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

fn with_token_cookies<'a>(
    builder: &'a mut HttpResponseBuilder,
    tokens: &TokenPair,
    config: &Config,
) -> &'a mut HttpResponseBuilder {
    builder
        .cookie(auth_cookie(
            ACCESS_COOKIE,
            tokens.access_token.clone(),
            config.access_token_ttl,
            config.cookie_secure,
        ))
        .cookie(auth_cookie(
            REFRESH_COOKIE,
            tokens.refresh_token.clone(),
            config.refresh_token_ttl,
            config.cookie_secure,
        ))
}

#[utoipa::path(
    post,
    path = "/api/v1/userAuth/userLogin",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Logged in; tokens also set as cookies", body = LoginResponse),
        (status = 400, description = "Missing fields", body = MessageResponse),
        (status = 401, description = "Invalid credentials", body = MessageResponse)
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_login", skip(pool, config, user), fields(email = %user.email))]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    info!("Login request received");

    // 1️⃣ Basic validation
    if user.email.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty email or password");
        return Err(ApiError::bad_request("Email and password are required").into());
    }

    // 2️⃣ Fetch user
    let db_user = sqlx::query_as::<_, UserCredentials>(
        r#"
        SELECT id, employee_code, name, email, password, role_id, is_active
        FROM users
        WHERE email = ?
        "#,
    )
    .bind(user.email.trim().to_lowercase())
    .fetch_optional(pool.get_ref())
    .await
    .map_err(ApiError::from)?;

    let db_user = match db_user {
        Some(u) if u.is_active => u,
        Some(u) => {
            info!(user_id = u.id, "Invalid credentials: account deactivated");
            return Err(ApiError::unauthorized("Invalid credentials").into());
        }
        None => {
            info!("Invalid credentials: user not found");
            return Err(ApiError::unauthorized("Invalid credentials").into());
        }
    };

    // 3️⃣ Verify password
    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(ApiError::unauthorized("Invalid credentials").into());
    }

    let role = Role::from_id(db_user.role_id).ok_or_else(|| {
        error!(user_id = db_user.id, role_id = db_user.role_id, "User has unknown role");
        ApiError::Internal
    })?;

    // 4️⃣ Tokens
    let subject = TokenSubject {
        user_id: db_user.id,
        email: db_user.email.clone(),
        role: db_user.role_id,
        employee_code: db_user.employee_code.clone(),
    };
    let tokens = issue_tokens(&subject, pool.get_ref(), config.get_ref()).await?;

    // 5️⃣ Update last_login_at (non-fatal)
    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        warn!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = db_user.id, "Login successful");

    let mut builder = HttpResponse::Ok();
    with_token_cookies(&mut builder, &tokens, config.get_ref());

    Ok(builder.json(LoginResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        role: role.id(),
        redirect_to: role.dashboard_path().to_string(),
        user: SessionUser {
            id: db_user.id,
            name: db_user.name,
            email: db_user.email,
            employee_code: db_user.employee_code,
        },
    }))
}

/// Refresh token from the Bearer header, falling back to the refresh cookie
fn presented_refresh_token(req: &HttpRequest) -> Option<String> {
    let from_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string());

    from_header.or_else(|| req.cookie(REFRESH_COOKIE).map(|c| c.value().to_string()))
}

const REVOKE_UNUSED_REFRESH: &str =
    "UPDATE refresh_tokens SET revoked = TRUE WHERE id = ? AND revoked = FALSE";

/// A concurrent rotation that already revoked the row wins
fn ensure_claimed(rows_affected: u64) -> Result<(), ApiError> {
    if rows_affected == 0 {
        warn!("Refresh token replayed during rotation");
        return Err(ApiError::unauthorized("Refresh token revoked"));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/v1/userAuth/refreshToken",
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Refresh token missing, invalid or revoked", body = MessageResponse)
    ),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    let token = presented_refresh_token(&req)
        .ok_or_else(|| ApiError::unauthorized("No refresh token"))?;

    let claims = verify_token(&token, &config.jwt_secret)
        .map_err(|_| ApiError::unauthorized("Invalid refresh token"))?;

    if claims.token_type != TokenType::Refresh {
        return Err(ApiError::unauthorized("Invalid refresh token").into());
    }

    // 🔍 find refresh token in DB
    let record = sqlx::query_as::<_, (u64, u64, bool)>(
        "SELECT id, user_id, revoked FROM refresh_tokens WHERE jti = ?",
    )
    .bind(&claims.jti)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(ApiError::from)?;

    let (record_id, _user_id) = match record {
        Some((id, user_id, false)) => (id, user_id),
        _ => return Err(ApiError::unauthorized("Refresh token revoked").into()),
    };

    // the account may have been deactivated since the token was issued
    let active = sqlx::query_scalar::<_, bool>("SELECT is_active FROM users WHERE id = ?")
        .bind(claims.user_id)
        .fetch_optional(pool.get_ref())
        .await
        .map_err(ApiError::from)?
        .unwrap_or(false);
    if !active {
        return Err(ApiError::unauthorized("Account deactivated").into());
    }

    // 🔥 revoke old refresh token; only one rotation may claim it
    let mut tx = pool.begin().await.map_err(ApiError::from)?;
    let revoked = sqlx::query(REVOKE_UNUSED_REFRESH)
        .bind(record_id)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::from)?
        .rows_affected();
    ensure_claimed(revoked)?;

    // 🔄 rotate
    let tokens = issue_tokens(&TokenSubject::from(&claims), &mut *tx, config.get_ref()).await?;
    tx.commit().await.map_err(ApiError::from)?;

    let mut builder = HttpResponse::Ok();
    with_token_cookies(&mut builder, &tokens, config.get_ref());
    Ok(builder.json(tokens))
}

#[utoipa::path(
    post,
    path = "/api/v1/userAuth/userLogout",
    responses(
        (status = 204, description = "Logged out (idempotent)")
    ),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let mut resp = HttpResponse::NoContent();
    resp.cookie(removal_cookie(ACCESS_COOKIE))
        .cookie(removal_cookie(REFRESH_COOKIE));

    let Some(token) = presented_refresh_token(&req) else {
        return resp.finish();
    };

    // only refresh tokens are revocable; anything else is ignored
    if let Ok(claims) = verify_token(&token, &config.jwt_secret) {
        if claims.token_type == TokenType::Refresh {
            if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
                .bind(&claims.jti)
                .execute(pool.get_ref())
                .await
            {
                error!(error = %e, "Failed to revoke refresh token");
            }
        }
    }

    resp.finish()
}

pub async fn fetch_employee(pool: &MySqlPool, user_id: u64) -> Result<Option<Employee>, ApiError> {
    let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM users WHERE id = ?");
    Ok(sqlx::query_as::<_, Employee>(&sql)
        .bind(user_id)
        .fetch_optional(pool)
        .await?)
}

#[utoipa::path(
    get,
    path = "/api/v1/user/me",
    responses(
        (status = 200, description = "Caller profile", body = ProfileResponse),
        (status = 401, description = "Unauthorized", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn me(auth: AuthUser, pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    let user = fetch_employee(pool.get_ref(), auth.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(HttpResponse::Ok().json(ProfileResponse {
        user,
        redirect_to: auth.role.dashboard_path().to_string(),
    }))
}

#[utoipa::path(
    put,
    path = "/api/v1/user/changePassword",
    request_body = ChangePasswordReq,
    responses(
        (status = 200, description = "Password changed; other sessions signed out", body = MessageResponse),
        (status = 400, description = "Validation failed", body = MessageResponse),
        (status = 401, description = "Current password is wrong", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn change_password(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: web::Json<ChangePasswordReq>,
) -> actix_web::Result<impl Responder> {
    validate_new_password(&body.new_password, &body.confirm_password)?;

    let current: String = sqlx::query_scalar("SELECT password FROM users WHERE id = ?")
        .bind(auth.user_id)
        .fetch_optional(pool.get_ref())
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if verify_password(&body.current_password, &current).is_err() {
        return Err(ApiError::unauthorized("Current password is incorrect").into());
    }

    let hashed = hash_password(&body.new_password).map_err(|e| {
        error!(error = %e, "Failed to hash password");
        ApiError::Internal
    })?;

    let mut tx = pool.begin().await.map_err(ApiError::from)?;
    sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(hashed)
        .bind(auth.user_id)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::from)?;
    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = ? AND revoked = FALSE")
        .bind(auth.user_id)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::from)?;
    tx.commit().await.map_err(ApiError::from)?;

    info!(user_id = auth.user_id, "Password changed");

    Ok(HttpResponse::Ok().json(MessageResponse::new("Password changed successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_fields_are_required() {
        assert!(validate_identity("", "a@b.c", "EMP-1").is_err());
        assert!(validate_identity("Jane", " ", "EMP-1").is_err());
        assert!(validate_identity("Jane", "a@b.c", "").is_err());
        assert!(validate_identity("Jane", "a@b.c", "EMP-1").is_ok());
    }

    #[test]
    fn email_needs_an_at_sign() {
        let err = validate_identity("Jane", "jane.company.com", "EMP-1").unwrap_err();
        assert_eq!(err.to_string(), "Invalid email address");
    }

    #[test]
    fn auth_cookies_are_http_only() {
        let c = auth_cookie(ACCESS_COOKIE, "tok".into(), 900, true);
        assert_eq!(c.http_only(), Some(true));
        assert_eq!(c.secure(), Some(true));
        assert_eq!(c.path(), Some("/"));
    }

    #[test]
    fn removal_cookie_expires_immediately() {
        let c = removal_cookie(REFRESH_COOKIE);
        assert_eq!(c.value(), "");
        assert!(c.max_age().is_some_and(|age| age.is_zero()));
    }

    #[test]
    fn rotation_claims_only_unrevoked_tokens() {
        assert!(REVOKE_UNUSED_REFRESH.ends_with("AND revoked = FALSE"));
        assert!(ensure_claimed(1).is_ok());

        let err = ensure_claimed(0).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[test]
    fn refresh_token_prefers_header_over_cookie() {
        let req = actix_web::test::TestRequest::default()
            .insert_header(("Authorization", "Bearer from-header"))
            .cookie(Cookie::new(REFRESH_COOKIE, "from-cookie"))
            .to_http_request();
        assert_eq!(presented_refresh_token(&req).as_deref(), Some("from-header"));

        let req = actix_web::test::TestRequest::default()
            .cookie(Cookie::new(REFRESH_COOKIE, "from-cookie"))
            .to_http_request();
        assert_eq!(presented_refresh_token(&req).as_deref(), Some("from-cookie"));
    }
}
