use crate::api::month_lock::{LockRequest, MonthLockStatus, UnlockRequest};
use crate::api::payroll::{GeneratePayroll, PaginatedPayrollResponse, PayrollQuery, PayrollResponse};
use crate::api::payroll_structure::{ReviseStructure, StructureHistoryResponse};
use crate::api::two_factor::{CodeRequest, RecoveryCodes, TwoFactorSetup};
use crate::model::month_lock::{LockAction, PayrollMonthLock, PayrollMonthLockEvent};
use crate::model::payroll::{PaymentMethod, PayrollStatus};
use crate::model::payroll_structure::{PayrollStructure, PayrollStructureHistory, SalaryComponents};
use crate::models::{LoginReqDto, LoginResponse, TwoFactorChallenge, TwoFactorLoginReq};
use crate::payroll::workflow::PaymentDetails;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRM Payroll API",
        version = "1.0.0",
        description = r#"
## Payroll for the HRM system

Monthly payroll for each employee, computed from their salary structure and the
days they were payable in the month.

### 🔹 Key Features
- **Payroll Lifecycle**
  - Generate, approve and mark payrolls as paid
  - Frontend statuses: `generated`, `approved`, `paid`, `failed`
- **Salary Structures**
  - Per-employee components with an audited revision history
- **Month Locking**
  - Close a month so its payrolls can no longer change
- **Two-Factor Authentication**
  - TOTP (RFC 6238) with single-use recovery codes

### 🔐 Security
Endpoints under `/api` require a **JWT Bearer** access token.
Accounts with two-factor enabled receive a challenge token from `/auth/login`
and exchange it at `/auth/two-factor`.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::two_factor_login,

        crate::api::payroll::generate_payroll,
        crate::api::payroll::approve_payroll,
        crate::api::payroll::pay_payroll,
        crate::api::payroll::get_payroll,
        crate::api::payroll::list_payrolls,

        crate::api::payroll_structure::get_structure,
        crate::api::payroll_structure::revise_structure,
        crate::api::payroll_structure::structure_history,

        crate::api::month_lock::get_lock,
        crate::api::month_lock::lock,
        crate::api::month_lock::unlock,

        crate::api::two_factor::setup,
        crate::api::two_factor::confirm,
        crate::api::two_factor::regenerate_recovery_codes,
        crate::api::two_factor::disable
    ),
    components(
        schemas(
            LoginReqDto,
            LoginResponse,
            TwoFactorChallenge,
            TwoFactorLoginReq,
            GeneratePayroll,
            PayrollResponse,
            PaginatedPayrollResponse,
            PayrollQuery,
            PayrollStatus,
            PaymentMethod,
            PaymentDetails,
            SalaryComponents,
            PayrollStructure,
            PayrollStructureHistory,
            ReviseStructure,
            StructureHistoryResponse,
            PayrollMonthLock,
            PayrollMonthLockEvent,
            LockAction,
            LockRequest,
            UnlockRequest,
            MonthLockStatus,
            TwoFactorSetup,
            CodeRequest,
            RecoveryCodes
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Auth", description = "Login and session APIs"),
        (name = "Payroll", description = "Payroll generation and approval APIs"),
        (name = "Payroll Structure", description = "Salary structure APIs"),
        (name = "Payroll Lock", description = "Month closing APIs"),
        (name = "Two-Factor", description = "Authenticator app enrolment APIs"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_bearer_scheme_and_payroll_paths() {
        let doc = ApiDoc::openapi();

        let components = doc.components.as_ref().unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(doc.paths.paths.contains_key("/api/payroll/{payroll_id}/approve"));
        assert!(doc.paths.paths.contains_key("/api/payroll-lock/{month}"));
        assert!(doc.paths.paths.contains_key("/auth/two-factor"));
    }
}
