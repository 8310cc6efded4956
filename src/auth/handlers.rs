use crate::{
    auth::{
        jwt::{TokenSubject, generate_token, verify_token},
        password::{find_matching, verify_secret},
        two_factor::{TwoFactorAuthenticator, normalize_recovery_code, unix_now},
    },
    config::Config,
    error::AppError,
    model::user::{TwoFactorRow, UserSql},
    models::{Claims, LoginReqDto, LoginResponse, TokenType, TwoFactorChallenge, TwoFactorLoginReq},
    utils::replay_guard::TotpReplayGuard,
};
use actix_web::{HttpRequest, HttpResponse, web};
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument, warn};

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

fn token_error(e: jsonwebtoken::errors::Error) -> AppError {
    AppError::Internal(format!("token encoding failed: {e}"))
}

/// Issues an access/refresh pair and stores the refresh token id.
async fn issue_session(
    subject: &TokenSubject,
    pool: &MySqlPool,
    config: &Config,
) -> Result<LoginResponse, AppError> {
    let (access_token, _) = generate_token(
        subject,
        TokenType::Access,
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(token_error)?;

    let (refresh_token, refresh_claims) = generate_token(
        subject,
        TokenType::Refresh,
        &config.jwt_secret,
        config.refresh_token_ttl,
    )
    .map_err(token_error)?;

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
    .execute(pool)
    .await?;

    // non-fatal
    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(subject.user_id)
        .execute(pool)
        .await
    {
        error!(error = %e, "Failed to update last_login_at");
    }

    Ok(LoginResponse {
        access_token,
        refresh_token,
    })
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Session tokens, or a second-factor challenge", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_login", skip(pool, config, user), fields(username = %user.username))]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    info!("Login request received");

    if user.username.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty username or password");
        return Err(AppError::BadRequest("Username or password required".into()));
    }

    let db_user = sqlx::query_as::<_, UserSql>(
        r#"
        SELECT id, username, password, role_id, employee_id, is_active
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(user.username.trim())
    .fetch_optional(pool.get_ref())
    .await?;

    let db_user = match db_user {
        Some(u) if u.is_active => u,
        Some(_) => {
            info!("Rejected login for inactive user");
            return Err(AppError::Unauthorized("Invalid credentials"));
        }
        None => {
            info!("Invalid credentials: user not found");
            return Err(AppError::Unauthorized("Invalid credentials"));
        }
    };

    if let Err(e) = verify_secret(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(AppError::Unauthorized("Invalid credentials"));
    }

    let subject = TokenSubject {
        user_id: db_user.id,
        username: db_user.username.clone(),
        role: db_user.role_id,
        employee_id: db_user.employee_id,
    };

    let two_factor_enabled = sqlx::query_scalar::<_, bool>(
        "SELECT two_factor_enabled FROM users WHERE id = ?",
    )
    .bind(db_user.id)
    .fetch_one(pool.get_ref())
    .await?;

    if two_factor_enabled {
        info!(user_id = db_user.id, "Password verified, second factor required");
        let (challenge_token, _) = generate_token(
            &subject,
            TokenType::TwoFactorChallenge,
            &config.jwt_secret,
            config.challenge_token_ttl,
        )
        .map_err(token_error)?;

        return Ok(HttpResponse::Ok().json(TwoFactorChallenge {
            two_factor_required: true,
            challenge_token,
        }));
    }

    let session = issue_session(&subject, pool.get_ref(), &config).await?;
    info!(user_id = db_user.id, "Login successful");
    Ok(HttpResponse::Ok().json(session))
}

#[utoipa::path(
    post,
    path = "/auth/two-factor",
    request_body = TwoFactorLoginReq,
    responses(
        (status = 200, description = "Session tokens", body = LoginResponse),
        (status = 401, description = "Invalid or expired challenge, or wrong code")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_two_factor", skip_all)]
pub async fn two_factor_login(
    body: web::Json<TwoFactorLoginReq>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    authenticator: web::Data<TwoFactorAuthenticator>,
    replay_guard: web::Data<TotpReplayGuard>,
) -> Result<HttpResponse, AppError> {
    let claims: Claims = match verify_token(&body.challenge_token, &config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::TwoFactorChallenge => c,
        _ => return Err(AppError::Unauthorized("Invalid or expired challenge")),
    };

    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, TwoFactorRow>(
        r#"
        SELECT id, username, two_factor_secret, two_factor_enabled,
               two_factor_confirmed_at, two_factor_recovery_codes
        FROM users
        WHERE id = ?
        FOR UPDATE
        "#,
    )
    .bind(claims.user_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::Unauthorized("Invalid or expired challenge"))?;

    let secret = match (&row.two_factor_secret, row.two_factor_enabled) {
        (Some(s), true) => s.clone(),
        _ => return Err(AppError::Unauthorized("Two-factor authentication is not enabled")),
    };

    let accepted = if let Some(code) = body.code.as_deref() {
        match authenticator.matching_step(&secret, code, authenticator.window(), unix_now()) {
            Some(step) => {
                let fresh = replay_guard.claim(row.id, step).await;
                if !fresh {
                    warn!(user_id = row.id, "Replayed one-time code rejected");
                }
                fresh
            }
            None => false,
        }
    } else if let Some(code) = body.recovery_code.as_deref().and_then(normalize_recovery_code) {
        let mut hashes = row.recovery_hashes();
        match find_matching(&code, &hashes) {
            Some(index) => {
                hashes.remove(index);
                let remaining = serde_json::to_string(&hashes)
                    .map_err(|e| AppError::Internal(e.to_string()))?;
                sqlx::query("UPDATE users SET two_factor_recovery_codes = ? WHERE id = ?")
                    .bind(remaining)
                    .bind(row.id)
                    .execute(&mut *tx)
                    .await?;
                info!(user_id = row.id, remaining = hashes.len(), "Recovery code consumed");
                true
            }
            None => false,
        }
    } else {
        false
    };

    if !accepted {
        info!(user_id = row.id, "Second factor rejected");
        return Err(AppError::Unauthorized("Invalid authentication code"));
    }

    tx.commit().await?;

    let session = issue_session(&TokenSubject::from(&claims), pool.get_ref(), &config).await?;
    info!(user_id = row.id, "Login successful");
    Ok(HttpResponse::Ok().json(session))
}

pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let token = bearer(&req).ok_or(AppError::Unauthorized("No token"))?;

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::Refresh => c,
        _ => return Err(AppError::Unauthorized("Invalid token")),
    };

    let mut tx = pool.begin().await?;

    let record = sqlx::query_as::<_, (u64, bool)>(
        r#"
        SELECT id, revoked
        FROM refresh_tokens
        WHERE jti = ?
        FOR UPDATE
        "#,
    )
    .bind(&claims.jti)
    .fetch_optional(&mut *tx)
    .await?;

    let record_id = match record {
        Some((id, false)) => id,
        _ => return Err(AppError::Unauthorized("Invalid token")),
    };

    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE id = ?")
        .bind(record_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    let session = issue_session(&TokenSubject::from(&claims), pool.get_ref(), &config).await?;
    Ok(HttpResponse::Ok().json(session))
}

pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> HttpResponse {
    let claims = match bearer(&req).map(|t| verify_token(t, &config.jwt_secret)) {
        Some(Ok(c)) if c.token_type == TokenType::Refresh => c,
        _ => return HttpResponse::NoContent().finish(),
    };

    // idempotent
    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token");
    }

    HttpResponse::NoContent().finish()
}
