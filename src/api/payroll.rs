use std::collections::HashSet;

use actix_web::{HttpResponse, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{MySqlConnection, MySqlPool};
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};

use crate::api::month_lock::fetch_lock;
use crate::api::page_offset;
use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::AppError;
use crate::model::attendance::{Holiday, PeriodFacts};
use crate::model::leave_request::{ApprovedLeave, LeaveRequestRow};
use crate::model::payroll::{
    PAYROLL_COLUMNS, PaymentMethod, Payroll, PayrollRow, PayrollStatus, ui_status_to_db_status,
};
use crate::model::payroll_structure::PayrollStructure;
use crate::model::role::Role;
use crate::model::user::PayrollSubject;
use crate::payroll::calendar::{AttendanceSummary, month_end, parse_month};
use crate::payroll::financial_year::FinancialYear;
use crate::payroll::workflow::{self, GenerationInput, PaymentDetails, WorkflowError};
use crate::utils::lock_cache::LockedMonthCache;

#[derive(Deserialize, ToSchema)]
pub struct GeneratePayroll {
    #[schema(example = 42)]
    pub user_id: u64,

    #[schema(example = "2026-06")]
    pub month: String,

    /// Replaces the computed working day count.
    #[schema(example = 22.0)]
    pub working_days: Option<f64>,

    /// Replaces the computed loss-of-pay day count.
    #[schema(example = 2.0)]
    pub lop_days: Option<f64>,
}

#[derive(Serialize, ToSchema)]
pub struct PayrollResponse {
    pub id: u64,
    pub user_id: u64,

    #[schema(value_type = String, format = "date")]
    pub month: NaiveDate,
    #[schema(example = "2026-27")]
    pub financial_year: String,

    pub working_days: f64,
    pub payable_days: f64,
    pub lop_days: f64,

    pub basic: f64,
    pub hra: f64,
    pub special_allowance: f64,
    pub bonus: f64,
    pub other_allowance: f64,
    pub gross_earnings: f64,

    pub pf: f64,
    pub tax: f64,
    pub other_deduction: f64,
    pub total_deductions: f64,

    pub net_pay: f64,

    pub status: PayrollStatus,
    /// Frontend vocabulary: generated, approved, paid, failed.
    #[schema(example = "generated")]
    pub ui_status: &'static str,
    pub notes: Option<String>,

    pub generated_by: u64,
    #[schema(value_type = String, format = "date-time")]
    pub generated_at: DateTime<Utc>,
    pub approved_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub approved_at: Option<DateTime<Utc>>,
    pub paid_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_reference: Option<String>,
}

impl From<Payroll> for PayrollResponse {
    fn from(p: Payroll) -> Self {
        PayrollResponse {
            id: p.id.unwrap_or_default(),
            user_id: p.user_id,
            month: p.month,
            financial_year: p.financial_year,
            working_days: p.working_days,
            payable_days: p.payable_days,
            lop_days: p.lop_days,
            basic: p.basic,
            hra: p.hra,
            special_allowance: p.special_allowance,
            bonus: p.bonus,
            other_allowance: p.other_allowance,
            gross_earnings: p.gross_earnings,
            pf: p.pf,
            tax: p.tax,
            other_deduction: p.other_deduction,
            total_deductions: p.total_deductions,
            net_pay: p.net_pay,
            status: p.status,
            ui_status: p.status.ui_label(),
            notes: p.notes,
            generated_by: p.generated_by,
            generated_at: p.generated_at,
            approved_by: p.approved_by,
            approved_at: p.approved_at,
            paid_by: p.paid_by,
            paid_at: p.paid_at,
            payment_method: p.payment_method,
            payment_reference: p.payment_reference,
        }
    }
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct PayrollQuery {
    #[schema(example = 1)]
    pub page: Option<u32>,

    #[schema(example = 10)]
    pub per_page: Option<u32>,

    #[schema(example = 42)]
    pub user_id: Option<u64>,

    /// Payroll month, YYYY-MM
    #[schema(example = "2026-06")]
    pub month: Option<String>,

    /// generated, approved, paid or failed
    #[schema(example = "approved")]
    pub status: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedPayrollResponse {
    pub data: Vec<PayrollResponse>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

fn decode_row(row: PayrollRow) -> Result<Payroll, AppError> {
    let id = row.id;
    Payroll::try_from(row).map_err(|e| AppError::Internal(format!("payroll {id}: {e}")))
}

async fn fetch_payroll(
    conn: &mut MySqlConnection,
    id: u64,
    for_update: bool,
) -> Result<Option<Payroll>, AppError> {
    let sql = format!(
        "SELECT {PAYROLL_COLUMNS} FROM payrolls WHERE id = ? {}",
        if for_update { "FOR UPDATE" } else { "" }
    );

    sqlx::query_as::<_, PayrollRow>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?
        .map(decode_row)
        .transpose()
}

async fn fetch_payroll_for_month(
    conn: &mut MySqlConnection,
    user_id: u64,
    month: NaiveDate,
) -> Result<Option<Payroll>, AppError> {
    let sql = format!(
        "SELECT {PAYROLL_COLUMNS} FROM payrolls WHERE user_id = ? AND month = ? FOR UPDATE"
    );

    sqlx::query_as::<_, PayrollRow>(&sql)
        .bind(user_id)
        .bind(month)
        .fetch_optional(conn)
        .await?
        .map(decode_row)
        .transpose()
}

/// Inserts a new row or rewrites an existing one in place. Returns its id.
async fn save_payroll(conn: &mut MySqlConnection, p: &Payroll) -> Result<u64, sqlx::Error> {
    let query = match p.id {
        Some(_) => sqlx::query(
            r#"
            UPDATE payrolls
            SET financial_year = ?, working_days = ?, payable_days = ?, lop_days = ?,
                basic = ?, hra = ?, special_allowance = ?, bonus = ?, other_allowance = ?,
                gross_earnings = ?, pf = ?, tax = ?, other_deduction = ?,
                total_deductions = ?, net_pay = ?, status = ?, notes = ?,
                generated_by = ?, generated_at = ?, approved_by = ?, approved_at = ?,
                paid_by = ?, paid_at = ?, payment_method = ?, payment_reference = ?
            WHERE id = ?
            "#,
        ),
        None => sqlx::query(
            r#"
            INSERT INTO payrolls
                (financial_year, working_days, payable_days, lop_days,
                 basic, hra, special_allowance, bonus, other_allowance,
                 gross_earnings, pf, tax, other_deduction,
                 total_deductions, net_pay, status, notes,
                 generated_by, generated_at, approved_by, approved_at,
                 paid_by, paid_at, payment_method, payment_reference,
                 user_id, month)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        ),
    };

    let query = query
        .bind(&p.financial_year)
        .bind(p.working_days)
        .bind(p.payable_days)
        .bind(p.lop_days)
        .bind(p.basic)
        .bind(p.hra)
        .bind(p.special_allowance)
        .bind(p.bonus)
        .bind(p.other_allowance)
        .bind(p.gross_earnings)
        .bind(p.pf)
        .bind(p.tax)
        .bind(p.other_deduction)
        .bind(p.total_deductions)
        .bind(p.net_pay)
        .bind(p.status.as_ref())
        .bind(&p.notes)
        .bind(p.generated_by)
        .bind(p.generated_at)
        .bind(p.approved_by)
        .bind(p.approved_at)
        .bind(p.paid_by)
        .bind(p.paid_at)
        .bind(p.payment_method.map(|m| m.as_ref().to_string()))
        .bind(&p.payment_reference);

    match p.id {
        Some(id) => {
            query.bind(id).execute(conn).await?;
            Ok(id)
        }
        None => {
            let result = query.bind(p.user_id).bind(p.month).execute(conn).await?;
            Ok(result.last_insert_id())
        }
    }
}

/// Derives working and payable days from attendance, approved leave and holidays.
async fn collect_period_facts(
    conn: &mut MySqlConnection,
    subject: &PayrollSubject,
    month: NaiveDate,
    config: &Config,
) -> Result<PeriodFacts, AppError> {
    let end = month_end(month);

    let holidays: HashSet<NaiveDate> = sqlx::query_as::<_, Holiday>(
        "SELECT date, name FROM holidays WHERE date BETWEEN ? AND ?",
    )
    .bind(month)
    .bind(end)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|h| h.date)
    .collect();

    let (attended, leaves) = match subject.employee_id {
        Some(employee_id) => {
            let attended: HashSet<NaiveDate> = sqlx::query_scalar::<_, NaiveDate>(
                r#"
                SELECT date
                FROM attendance
                WHERE employee_id = ? AND date BETWEEN ? AND ?
                "#,
            )
            .bind(employee_id)
            .bind(month)
            .bind(end)
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .collect();

            let rows = sqlx::query_as::<_, LeaveRequestRow>(
                r#"
                SELECT start_date, end_date, leave_type
                FROM leave_requests
                WHERE employee_id = ?
                  AND status = 'approved'
                  AND start_date <= ? AND end_date >= ?
                "#,
            )
            .bind(employee_id)
            .bind(end)
            .bind(month)
            .fetch_all(&mut *conn)
            .await?;

            let mut leaves = Vec::with_capacity(rows.len());
            for row in rows {
                match row.leave_type.parse() {
                    Ok(leave_type) => leaves.push(ApprovedLeave {
                        start_date: row.start_date,
                        end_date: row.end_date,
                        leave_type,
                    }),
                    Err(_) => warn!(leave_type = %row.leave_type, "Skipping unknown leave type"),
                }
            }
            (attended, leaves)
        }
        None => (HashSet::new(), Vec::new()),
    };

    let summary = AttendanceSummary::build(
        month,
        &config.payroll,
        &holidays,
        &attended,
        &leaves,
        subject.hire_date,
    );

    Ok(summary.facts())
}

#[utoipa::path(
    post,
    path = "/api/payroll",
    request_body = GeneratePayroll,
    responses(
        (status = 201, description = "Payroll generated (status generated or failed)", body = PayrollResponse),
        (status = 403, description = "Role may not generate payroll"),
        (status = 404, description = "User or payroll structure not found"),
        (status = 409, description = "Month locked or payroll already approved")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
#[instrument(name = "payroll_generate", skip_all, fields(user_id = payload.user_id, month = %payload.month))]
pub async fn generate_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    cache: web::Data<LockedMonthCache>,
    payload: web::Json<GeneratePayroll>,
) -> Result<HttpResponse, AppError> {
    let actor = auth.actor();
    workflow::require(&actor, Role::can_generate_payroll, "generate payroll")?;

    let month = parse_month(&payload.month)
        .ok_or_else(|| AppError::BadRequest(format!("`{}` is not a YYYY-MM month", payload.month)))?;

    // Cached locks are confirmed against the row before rejecting.
    if cache.is_locked(month).await == Some(true) {
        let mut conn = pool.acquire().await?;
        let row = fetch_lock(&mut conn, month, false).await?;
        if cache.reconcile(month, row.as_ref()).await {
            return Err(WorkflowError::MonthLocked(month).into());
        }
    }

    let mut tx = pool.begin().await?;

    let subject = sqlx::query_as::<_, PayrollSubject>(
        r#"
        SELECT u.id, u.employee_id, e.hire_date
        FROM users u
        LEFT JOIN employees e ON e.id = u.employee_id
        WHERE u.id = ?
        "#,
    )
    .bind(payload.user_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("User not found"))?;

    let structure = sqlx::query_as::<_, PayrollStructure>(
        r#"
        SELECT id, user_id, basic, hra, special_allowance, bonus, other_allowance,
               pf, tax, other_deduction, effective_from, updated_by, updated_at
        FROM payroll_structures
        WHERE user_id = ?
        "#,
    )
    .bind(subject.id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("No payroll structure for this user"))?;

    if structure.effective_from > month_end(month) {
        return Err(AppError::Conflict(format!(
            "Payroll structure is effective from {}",
            structure.effective_from
        )));
    }

    let facts = match (payload.working_days, payload.lop_days) {
        (Some(working), Some(lop)) => PeriodFacts::from_lop(working, lop),
        (working, lop) => {
            let computed = collect_period_facts(&mut tx, &subject, month, &config).await?;
            let working = working.unwrap_or(computed.working_days);
            let lop = lop.unwrap_or_else(|| computed.lop_days());
            PeriodFacts::from_lop(working, lop)
        }
    };

    let lock = fetch_lock(&mut tx, month, true).await?;
    cache.reconcile(month, lock.as_ref()).await;
    let existing = fetch_payroll_for_month(&mut tx, subject.id, month).await?;

    let input = GenerationInput {
        user_id: subject.id,
        month,
        financial_year: FinancialYear::containing(month, config.payroll.financial_year_start_month)
            .label(),
        structure: structure.components,
        facts,
    };

    let mut payroll = workflow::generate(existing.as_ref(), lock.as_ref(), &actor, input, Utc::now())?;
    let id = save_payroll(&mut tx, &payroll).await?;
    tx.commit().await?;

    payroll.id = Some(id);
    info!(payroll_id = id, status = %payroll.status, net_pay = payroll.net_pay, "Payroll generated");

    Ok(HttpResponse::Created().json(PayrollResponse::from(payroll)))
}

#[utoipa::path(
    put,
    path = "/api/payroll/{payroll_id}/approve",
    params(("payroll_id", description = "Payroll ID")),
    responses(
        (status = 200, description = "Payroll approved", body = PayrollResponse),
        (status = 403, description = "Role may not approve payroll"),
        (status = 404, description = "Payroll not found"),
        (status = 409, description = "Month locked or payroll not in generated state")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn approve_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let payroll_id = path.into_inner();

    let mut tx = pool.begin().await?;
    let mut payroll = fetch_payroll(&mut tx, payroll_id, true)
        .await?
        .ok_or(AppError::NotFound("Payroll not found"))?;
    let lock = fetch_lock(&mut tx, payroll.month, true).await?;

    workflow::approve(&mut payroll, lock.as_ref(), &auth.actor(), Utc::now())?;
    save_payroll(&mut tx, &payroll).await?;
    tx.commit().await?;

    info!(payroll_id, approved_by = auth.user_id, "Payroll approved");
    Ok(HttpResponse::Ok().json(PayrollResponse::from(payroll)))
}

#[utoipa::path(
    put,
    path = "/api/payroll/{payroll_id}/pay",
    params(("payroll_id", description = "Payroll ID")),
    request_body = PaymentDetails,
    responses(
        (status = 200, description = "Payroll marked as paid", body = PayrollResponse),
        (status = 400, description = "Payment reference missing"),
        (status = 403, description = "Role may not mark payroll as paid"),
        (status = 404, description = "Payroll not found"),
        (status = 409, description = "Month locked or payroll not approved")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn pay_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<PaymentDetails>,
) -> Result<HttpResponse, AppError> {
    let payroll_id = path.into_inner();

    let mut tx = pool.begin().await?;
    let mut payroll = fetch_payroll(&mut tx, payroll_id, true)
        .await?
        .ok_or(AppError::NotFound("Payroll not found"))?;
    let lock = fetch_lock(&mut tx, payroll.month, true).await?;

    workflow::mark_paid(
        &mut payroll,
        lock.as_ref(),
        &auth.actor(),
        body.into_inner(),
        Utc::now(),
    )?;
    save_payroll(&mut tx, &payroll).await?;
    tx.commit().await?;

    info!(payroll_id, paid_by = auth.user_id, "Payroll marked as paid");
    Ok(HttpResponse::Ok().json(PayrollResponse::from(payroll)))
}

#[utoipa::path(
    get,
    path = "/api/payroll/{payroll_id}",
    params(("payroll_id", description = "Payroll ID")),
    responses(
        (status = 200, body = PayrollResponse),
        (status = 404, description = "Payroll not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn get_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let payroll_id = path.into_inner();

    let mut conn = pool.acquire().await?;
    let payroll = fetch_payroll(&mut conn, payroll_id, false)
        .await?
        .filter(|p| auth.can_view_payroll_of(p.user_id))
        .ok_or(AppError::NotFound("Payroll not found"))?;

    Ok(HttpResponse::Ok().json(PayrollResponse::from(payroll)))
}

/// WHERE clause and its binds for a list query.
#[derive(Debug, Default, PartialEq)]
struct PayrollFilter {
    user_id: Option<u64>,
    month: Option<NaiveDate>,
    status: Option<&'static str>,
}

impl PayrollFilter {
    fn from_query(query: &PayrollQuery, auth: &AuthUser) -> Result<Self, AppError> {
        let month = match query.month.as_deref() {
            Some(raw) => Some(
                parse_month(raw)
                    .ok_or_else(|| AppError::BadRequest(format!("`{raw}` is not a YYYY-MM month")))?,
            ),
            None => None,
        };

        let status = match query.status.as_deref() {
            Some(label) => Some(
                ui_status_to_db_status(label)
                    .ok_or_else(|| AppError::BadRequest(format!("Unknown payroll status `{label}`")))?,
            ),
            None => None,
        };

        let user_id = if auth.role.can_view_payroll() {
            query.user_id
        } else {
            Some(auth.user_id)
        };

        Ok(PayrollFilter {
            user_id,
            month,
            status,
        })
    }

    fn where_clause(&self) -> String {
        let mut conditions = Vec::new();
        if self.user_id.is_some() {
            conditions.push("user_id = ?");
        }
        if self.month.is_some() {
            conditions.push("month = ?");
        }
        if self.status.is_some() {
            conditions.push("status = ?");
        }

        if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/payroll",
    params(PayrollQuery),
    responses(
        (status = 200, body = PaginatedPayrollResponse),
        (status = 400, description = "Malformed month or unknown status")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn list_payrolls(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PayrollQuery>,
) -> Result<HttpResponse, AppError> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(10).clamp(1, 100);
    let offset = page_offset(page, per_page);

    let filter = PayrollFilter::from_query(&query, &auth)?;
    let where_clause = filter.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM payrolls {where_clause}");
    let mut count = sqlx::query_scalar::<_, i64>(&count_sql);
    if let Some(user_id) = filter.user_id {
        count = count.bind(user_id);
    }
    if let Some(month) = filter.month {
        count = count.bind(month);
    }
    if let Some(status) = filter.status {
        count = count.bind(status);
    }
    let total = count.fetch_one(pool.get_ref()).await?;

    let list_sql = format!(
        "SELECT {PAYROLL_COLUMNS} FROM payrolls {where_clause} ORDER BY month DESC, id DESC LIMIT ? OFFSET ?"
    );
    let mut list = sqlx::query_as::<_, PayrollRow>(&list_sql);
    if let Some(user_id) = filter.user_id {
        list = list.bind(user_id);
    }
    if let Some(month) = filter.month {
        list = list.bind(month);
    }
    if let Some(status) = filter.status {
        list = list.bind(status);
    }
    let rows = list
        .bind(per_page as i64)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await?;

    let data = rows
        .into_iter()
        .map(|row| decode_row(row).map(PayrollResponse::from))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(HttpResponse::Ok().json(PaginatedPayrollResponse {
        data,
        page,
        per_page,
        total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthUser {
        AuthUser { user_id: 7, role }
    }

    fn query(user_id: Option<u64>, month: Option<&str>, status: Option<&str>) -> PayrollQuery {
        PayrollQuery {
            page: None,
            per_page: None,
            user_id,
            month: month.map(str::to_string),
            status: status.map(str::to_string),
        }
    }

    #[test]
    fn ui_status_filter_maps_to_stored_status() {
        let filter =
            PayrollFilter::from_query(&query(None, Some("2026-06"), Some("approved")), &user(Role::Finance))
                .unwrap();

        assert_eq!(filter.status, Some("processed"));
        assert_eq!(filter.month, NaiveDate::from_ymd_opt(2026, 6, 1));
        assert_eq!(filter.where_clause(), "WHERE month = ? AND status = ?");
    }

    #[test]
    fn unknown_status_is_rejected() {
        let result =
            PayrollFilter::from_query(&query(None, None, Some("processed")), &user(Role::Admin));
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn employees_are_scoped_to_their_own_rows() {
        let filter =
            PayrollFilter::from_query(&query(Some(99), None, None), &user(Role::Employee)).unwrap();
        assert_eq!(filter.user_id, Some(7));
        assert_eq!(filter.where_clause(), "WHERE user_id = ?");
    }

    #[test]
    fn empty_filter_has_no_where_clause() {
        let filter = PayrollFilter::from_query(&query(None, None, None), &user(Role::Hr)).unwrap();
        assert_eq!(filter, PayrollFilter::default());
        assert!(filter.where_clause().is_empty());
    }
}
