use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{MySqlConnection, MySqlPool};
use tracing::info;
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::model::month_lock::{PayrollMonthLock, PayrollMonthLockEvent};
use crate::payroll::calendar::parse_month;
use crate::payroll::month_lock::{lock_month, unlock_month};
use crate::utils::lock_cache::LockedMonthCache;

#[derive(Deserialize, ToSchema)]
pub struct LockRequest {
    #[schema(example = "June payroll closed")]
    pub reason: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct UnlockRequest {
    #[schema(example = "Late attendance correction")]
    pub reason: String,
}

#[derive(Serialize, ToSchema)]
pub struct MonthLockStatus {
    #[schema(value_type = String, format = "date")]
    pub month: NaiveDate,
    pub is_locked: bool,
    pub lock: Option<PayrollMonthLock>,
}

pub(crate) fn month_from_path(raw: &str) -> Result<NaiveDate, AppError> {
    parse_month(raw).ok_or_else(|| AppError::BadRequest(format!("`{raw}` is not a YYYY-MM month")))
}

/// Reads the lock row, taking a row lock when `for_update` is set.
pub(crate) async fn fetch_lock(
    conn: &mut MySqlConnection,
    month: NaiveDate,
    for_update: bool,
) -> Result<Option<PayrollMonthLock>, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT month, is_locked, locked_by, locked_at, lock_reason,
               unlocked_by, unlocked_at, unlock_reason
        FROM payroll_month_locks
        WHERE month = ?
        {}
        "#,
        if for_update { "FOR UPDATE" } else { "" }
    );

    sqlx::query_as::<_, PayrollMonthLock>(&sql)
        .bind(month)
        .fetch_optional(conn)
        .await
}

async fn save_lock(
    conn: &mut MySqlConnection,
    lock: &PayrollMonthLock,
    event: &PayrollMonthLockEvent,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO payroll_month_locks
            (month, is_locked, locked_by, locked_at, lock_reason,
             unlocked_by, unlocked_at, unlock_reason)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            is_locked = VALUES(is_locked),
            locked_by = VALUES(locked_by),
            locked_at = VALUES(locked_at),
            lock_reason = VALUES(lock_reason),
            unlocked_by = VALUES(unlocked_by),
            unlocked_at = VALUES(unlocked_at),
            unlock_reason = VALUES(unlock_reason)
        "#,
    )
    .bind(lock.month)
    .bind(lock.is_locked)
    .bind(lock.locked_by)
    .bind(lock.locked_at)
    .bind(&lock.lock_reason)
    .bind(lock.unlocked_by)
    .bind(lock.unlocked_at)
    .bind(&lock.unlock_reason)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO payroll_month_lock_events (month, action, actor_id, reason, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(event.month)
    .bind(event.action.as_ref())
    .bind(event.actor_id)
    .bind(&event.reason)
    .bind(event.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/payroll-lock/{month}",
    params(("month" = String, Path, description = "Payroll month, YYYY-MM")),
    responses(
        (status = 200, body = MonthLockStatus),
        (status = 400, description = "Malformed month")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Lock"
)]
pub async fn get_lock(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
    cache: web::Data<LockedMonthCache>,
) -> Result<HttpResponse, AppError> {
    let month = month_from_path(&path)?;

    let mut conn = pool.acquire().await?;
    let lock = fetch_lock(&mut conn, month, false).await?;
    let is_locked = lock.as_ref().is_some_and(|l| l.is_locked);
    cache.set(month, is_locked).await;

    Ok(HttpResponse::Ok().json(MonthLockStatus {
        month,
        is_locked,
        lock,
    }))
}

#[utoipa::path(
    post,
    path = "/api/payroll-lock/{month}",
    params(("month" = String, Path, description = "Payroll month, YYYY-MM")),
    request_body = LockRequest,
    responses(
        (status = 200, body = PayrollMonthLock),
        (status = 403, description = "Role may not lock months"),
        (status = 409, description = "Month already locked")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Lock"
)]
pub async fn lock(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
    body: web::Json<LockRequest>,
    cache: web::Data<LockedMonthCache>,
) -> Result<HttpResponse, AppError> {
    let month = month_from_path(&path)?;

    let mut tx = pool.begin().await?;
    let existing = fetch_lock(&mut tx, month, true).await?;
    let (locked, event) = lock_month(
        existing.as_ref(),
        month,
        &auth.actor(),
        body.reason.as_deref(),
        Utc::now(),
    )?;
    save_lock(&mut tx, &locked, &event).await?;
    tx.commit().await?;

    cache.set(month, true).await;
    info!(month = %month, actor = auth.user_id, "Payroll month locked");

    Ok(HttpResponse::Ok().json(locked))
}

#[utoipa::path(
    delete,
    path = "/api/payroll-lock/{month}",
    params(("month" = String, Path, description = "Payroll month, YYYY-MM")),
    request_body = UnlockRequest,
    responses(
        (status = 200, body = PayrollMonthLock),
        (status = 400, description = "Reason missing"),
        (status = 403, description = "Only super admins may unlock"),
        (status = 409, description = "Month is not locked")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Lock"
)]
pub async fn unlock(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
    body: web::Json<UnlockRequest>,
    cache: web::Data<LockedMonthCache>,
) -> Result<HttpResponse, AppError> {
    let month = month_from_path(&path)?;

    let mut tx = pool.begin().await?;
    let existing = fetch_lock(&mut tx, month, true).await?;
    let (unlocked, event) = unlock_month(
        existing.as_ref(),
        month,
        &auth.actor(),
        Some(body.reason.as_str()),
        Utc::now(),
    )?;
    save_lock(&mut tx, &unlocked, &event).await?;
    tx.commit().await?;

    cache.set(month, false).await;
    info!(month = %month, actor = auth.user_id, reason = %body.reason, "Payroll month unlocked");

    Ok(HttpResponse::Ok().json(unlocked))
}
