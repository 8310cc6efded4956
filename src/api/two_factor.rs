use actix_web::{HttpResponse, web};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{MySqlConnection, MySqlPool};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::auth::password::hash_secret;
use crate::auth::two_factor::{DEFAULT_SECRET_LENGTH, TwoFactorAuthenticator, unix_now};
use crate::error::AppError;
use crate::model::user::TwoFactorRow;
use crate::utils::replay_guard::TotpReplayGuard;

#[derive(Serialize, ToSchema)]
pub struct TwoFactorSetup {
    /// Base32 secret for manual entry.
    #[schema(example = "JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP")]
    pub secret: String,
    #[schema(example = "otpauth://totp/HRM:jane?secret=JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP&issuer=HRM&algorithm=SHA1&digits=6&period=30")]
    pub otpauth_uri: String,
}

#[derive(Deserialize, ToSchema)]
pub struct CodeRequest {
    #[schema(example = "287082")]
    pub code: String,
}

/// Shown once; only hashes are stored.
#[derive(Serialize, ToSchema)]
pub struct RecoveryCodes {
    #[schema(example = json!(["K7QM-2XRD", "9HFA-TZC4"]))]
    pub recovery_codes: Vec<String>,
}

async fn fetch_state(conn: &mut MySqlConnection, user_id: u64) -> Result<TwoFactorRow, AppError> {
    sqlx::query_as::<_, TwoFactorRow>(
        r#"
        SELECT id, username, two_factor_secret, two_factor_enabled,
               two_factor_confirmed_at, two_factor_recovery_codes
        FROM users
        WHERE id = ?
        FOR UPDATE
        "#,
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await?
    .ok_or(AppError::NotFound("User not found"))
}

/// Accepts `code` once per time step.
async fn check_code(
    authenticator: &TwoFactorAuthenticator,
    replay_guard: &TotpReplayGuard,
    user_id: u64,
    secret: &str,
    code: &str,
) -> Result<(), AppError> {
    let step = authenticator
        .matching_step(secret, code, authenticator.window(), unix_now())
        .ok_or(AppError::Unauthorized("Invalid authentication code"))?;

    if !replay_guard.claim(user_id, step).await {
        warn!(user_id, "Replayed one-time code rejected");
        return Err(AppError::Unauthorized("Invalid authentication code"));
    }
    Ok(())
}

/// Fresh plaintext codes plus the JSON array of their hashes.
fn issue_recovery_codes(
    authenticator: &TwoFactorAuthenticator,
) -> Result<(Vec<String>, String), AppError> {
    let codes = authenticator.generate_recovery_codes(authenticator.recovery_code_count());
    let hashes = codes
        .iter()
        .map(|c| hash_secret(c))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Internal(format!("recovery code hashing failed: {e}")))?;
    let json = serde_json::to_string(&hashes).map_err(|e| AppError::Internal(e.to_string()))?;
    Ok((codes, json))
}

fn enabled_secret(row: &TwoFactorRow) -> Result<&str, AppError> {
    match (&row.two_factor_secret, row.two_factor_enabled) {
        (Some(secret), true) => Ok(secret),
        _ => Err(AppError::Conflict(
            "Two-factor authentication is not enabled".into(),
        )),
    }
}

#[utoipa::path(
    post,
    path = "/api/two-factor/setup",
    responses(
        (status = 200, description = "Pending secret created", body = TwoFactorSetup),
        (status = 409, description = "Two-factor authentication already enabled")
    ),
    security(("bearer_auth" = [])),
    tag = "Two-Factor"
)]
pub async fn setup(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    authenticator: web::Data<TwoFactorAuthenticator>,
) -> Result<HttpResponse, AppError> {
    let mut tx = pool.begin().await?;
    let row = fetch_state(&mut tx, auth.user_id).await?;

    if row.two_factor_enabled {
        return Err(AppError::Conflict(
            "Two-factor authentication is already enabled".into(),
        ));
    }

    let secret = authenticator.generate_secret(DEFAULT_SECRET_LENGTH);
    sqlx::query(
        r#"
        UPDATE users
        SET two_factor_secret = ?, two_factor_confirmed_at = NULL,
            two_factor_recovery_codes = NULL
        WHERE id = ?
        "#,
    )
    .bind(&secret)
    .bind(row.id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    info!(user_id = row.id, "Two-factor setup started");

    Ok(HttpResponse::Ok().json(TwoFactorSetup {
        otpauth_uri: authenticator.provisioning_uri(&row.username, &secret),
        secret,
    }))
}

#[utoipa::path(
    post,
    path = "/api/two-factor/confirm",
    request_body = CodeRequest,
    responses(
        (status = 200, description = "Enabled; recovery codes are shown once", body = RecoveryCodes),
        (status = 401, description = "Wrong code"),
        (status = 409, description = "No pending setup or already enabled")
    ),
    security(("bearer_auth" = [])),
    tag = "Two-Factor"
)]
pub async fn confirm(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    authenticator: web::Data<TwoFactorAuthenticator>,
    replay_guard: web::Data<TotpReplayGuard>,
    body: web::Json<CodeRequest>,
) -> Result<HttpResponse, AppError> {
    let mut tx = pool.begin().await?;
    let row = fetch_state(&mut tx, auth.user_id).await?;

    let secret = match (&row.two_factor_secret, row.two_factor_enabled) {
        (_, true) => {
            return Err(AppError::Conflict(
                "Two-factor authentication is already enabled".into(),
            ));
        }
        (Some(secret), false) => secret.as_str(),
        (None, false) => {
            return Err(AppError::Conflict("Start two-factor setup first".into()));
        }
    };

    check_code(&authenticator, &replay_guard, row.id, secret, &body.code).await?;

    let (codes, hashes) = issue_recovery_codes(&authenticator)?;
    sqlx::query(
        r#"
        UPDATE users
        SET two_factor_enabled = TRUE, two_factor_confirmed_at = ?,
            two_factor_recovery_codes = ?
        WHERE id = ?
        "#,
    )
    .bind(Utc::now())
    .bind(hashes)
    .bind(row.id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    info!(user_id = row.id, "Two-factor authentication enabled");
    Ok(HttpResponse::Ok().json(RecoveryCodes {
        recovery_codes: codes,
    }))
}

#[utoipa::path(
    post,
    path = "/api/two-factor/recovery-codes",
    request_body = CodeRequest,
    responses(
        (status = 200, description = "Previous codes invalidated", body = RecoveryCodes),
        (status = 401, description = "Wrong code"),
        (status = 409, description = "Two-factor authentication not enabled")
    ),
    security(("bearer_auth" = [])),
    tag = "Two-Factor"
)]
pub async fn regenerate_recovery_codes(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    authenticator: web::Data<TwoFactorAuthenticator>,
    replay_guard: web::Data<TotpReplayGuard>,
    body: web::Json<CodeRequest>,
) -> Result<HttpResponse, AppError> {
    let mut tx = pool.begin().await?;
    let row = fetch_state(&mut tx, auth.user_id).await?;
    let secret = enabled_secret(&row)?;

    check_code(&authenticator, &replay_guard, row.id, secret, &body.code).await?;

    let (codes, hashes) = issue_recovery_codes(&authenticator)?;
    sqlx::query("UPDATE users SET two_factor_recovery_codes = ? WHERE id = ?")
        .bind(hashes)
        .bind(row.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(user_id = row.id, count = codes.len(), "Recovery codes regenerated");
    Ok(HttpResponse::Ok().json(RecoveryCodes {
        recovery_codes: codes,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/two-factor",
    request_body = CodeRequest,
    responses(
        (status = 204, description = "Two-factor authentication disabled"),
        (status = 401, description = "Wrong code"),
        (status = 409, description = "Two-factor authentication not enabled")
    ),
    security(("bearer_auth" = [])),
    tag = "Two-Factor"
)]
pub async fn disable(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    authenticator: web::Data<TwoFactorAuthenticator>,
    replay_guard: web::Data<TotpReplayGuard>,
    body: web::Json<CodeRequest>,
) -> Result<HttpResponse, AppError> {
    let mut tx = pool.begin().await?;
    let row = fetch_state(&mut tx, auth.user_id).await?;
    let secret = enabled_secret(&row)?;

    check_code(&authenticator, &replay_guard, row.id, secret, &body.code).await?;

    sqlx::query(
        r#"
        UPDATE users
        SET two_factor_enabled = FALSE, two_factor_secret = NULL,
            two_factor_confirmed_at = NULL, two_factor_recovery_codes = NULL
        WHERE id = ?
        "#,
    )
    .bind(row.id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    info!(user_id = row.id, "Two-factor authentication disabled");
    Ok(HttpResponse::NoContent().finish())
}
