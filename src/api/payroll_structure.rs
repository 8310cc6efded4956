use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::api::page_offset;
use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::model::payroll_structure::{
    PayrollStructure, PayrollStructureHistory, PayrollStructureHistoryRow, SalaryComponents,
};
use crate::payroll::structure::revise;

#[derive(Deserialize, ToSchema)]
pub struct ReviseStructure {
    #[serde(flatten)]
    pub components: SalaryComponents,

    #[schema(example = "2026-04-01", value_type = String, format = "date")]
    pub effective_from: NaiveDate,

    #[schema(example = "Annual increment")]
    pub reason: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct HistoryQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct StructureHistoryResponse {
    pub data: Vec<PayrollStructureHistory>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

async fn fetch_structure<'e, E>(executor: E, user_id: u64) -> Result<Option<PayrollStructure>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::MySql>,
{
    sqlx::query_as::<_, PayrollStructure>(
        r#"
        SELECT id, user_id, basic, hra, special_allowance, bonus, other_allowance,
               pf, tax, other_deduction, effective_from, updated_by, updated_at
        FROM payroll_structures
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

#[utoipa::path(
    get,
    path = "/api/payroll-structure/{user_id}",
    params(("user_id", description = "User ID")),
    responses(
        (status = 200, body = PayrollStructure),
        (status = 404, description = "No structure for this user")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Structure"
)]
pub async fn get_structure(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let user_id = path.into_inner();
    if !auth.can_view_payroll_of(user_id) {
        return Err(AppError::Forbidden("Cannot view another user's salary".into()));
    }

    let structure = fetch_structure(pool.get_ref(), user_id)
        .await?
        .ok_or(AppError::NotFound("No payroll structure for this user"))?;

    Ok(HttpResponse::Ok().json(structure))
}

#[utoipa::path(
    put,
    path = "/api/payroll-structure/{user_id}",
    params(("user_id", description = "User ID")),
    request_body = ReviseStructure,
    responses(
        (status = 200, description = "Structure revised", body = PayrollStructure),
        (status = 400, description = "Negative or non-numeric amount"),
        (status = 403, description = "Role may not revise structures"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Structure"
)]
pub async fn revise_structure(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<ReviseStructure>,
) -> Result<HttpResponse, AppError> {
    let user_id = path.into_inner();
    let body = body.into_inner();
    let now = Utc::now();

    let mut tx = pool.begin().await?;

    let exists = sqlx::query_scalar::<_, u64>("SELECT id FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound("User not found"));
    }

    let before = sqlx::query_as::<_, SalaryComponents>(
        r#"
        SELECT basic, hra, special_allowance, bonus, other_allowance,
               pf, tax, other_deduction
        FROM payroll_structures
        WHERE user_id = ?
        FOR UPDATE
        "#,
    )
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;

    let history = revise(
        before,
        user_id,
        body.components,
        body.effective_from,
        &auth.actor(),
        body.reason.as_deref(),
        now,
    )?;

    let after = &history.after;
    sqlx::query(
        r#"
        INSERT INTO payroll_structures
            (user_id, basic, hra, special_allowance, bonus, other_allowance,
             pf, tax, other_deduction, effective_from, updated_by, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            basic = VALUES(basic),
            hra = VALUES(hra),
            special_allowance = VALUES(special_allowance),
            bonus = VALUES(bonus),
            other_allowance = VALUES(other_allowance),
            pf = VALUES(pf),
            tax = VALUES(tax),
            other_deduction = VALUES(other_deduction),
            effective_from = VALUES(effective_from),
            updated_by = VALUES(updated_by),
            updated_at = VALUES(updated_at)
        "#,
    )
    .bind(user_id)
    .bind(after.basic)
    .bind(after.hra)
    .bind(after.special_allowance)
    .bind(after.bonus)
    .bind(after.other_allowance)
    .bind(after.pf)
    .bind(after.tax)
    .bind(after.other_deduction)
    .bind(history.effective_from)
    .bind(history.changed_by)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let before_json = history
        .before
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let after_json =
        serde_json::to_string(&history.after).map_err(|e| AppError::Internal(e.to_string()))?;

    sqlx::query(
        r#"
        INSERT INTO payroll_structure_history
            (user_id, changed_by, reason, before_json, after_json, effective_from, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(history.user_id)
    .bind(history.changed_by)
    .bind(&history.reason)
    .bind(before_json)
    .bind(after_json)
    .bind(history.effective_from)
    .bind(history.created_at)
    .execute(&mut *tx)
    .await?;

    let structure = fetch_structure(&mut *tx, user_id)
        .await?
        .ok_or_else(|| AppError::Internal("structure missing after upsert".into()))?;

    tx.commit().await?;

    info!(user_id, changed_by = auth.user_id, "Payroll structure revised");
    Ok(HttpResponse::Ok().json(structure))
}

#[utoipa::path(
    get,
    path = "/api/payroll-structure/{user_id}/history",
    params(("user_id", description = "User ID"), HistoryQuery),
    responses(
        (status = 200, body = StructureHistoryResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Structure"
)]
pub async fn structure_history(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse, AppError> {
    let user_id = path.into_inner();
    if !auth.can_view_payroll_of(user_id) {
        return Err(AppError::Forbidden("Cannot view another user's salary".into()));
    }

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = page_offset(page, per_page);

    let total = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM payroll_structure_history WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_one(pool.get_ref())
    .await?;

    let rows = sqlx::query_as::<_, PayrollStructureHistoryRow>(
        r#"
        SELECT user_id, changed_by, reason, before_json, after_json,
               effective_from, created_at
        FROM payroll_structure_history
        WHERE user_id = ?
        ORDER BY created_at DESC, id DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(user_id)
    .bind(per_page as i64)
    .bind(offset)
    .fetch_all(pool.get_ref())
    .await?;

    let data = rows
        .into_iter()
        .map(PayrollStructureHistory::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Internal(format!("corrupt structure history: {e}")))?;

    Ok(HttpResponse::Ok().json(StructureHistoryResponse {
        data,
        page,
        per_page,
        total,
    }))
}
