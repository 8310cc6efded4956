use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

#[derive(Debug, sqlx::FromRow)]
pub struct UserSql {
    pub id: u64,
    pub username: String,
    pub password: String,
    pub role_id: u8,
    pub employee_id: Option<u64>,
    pub is_active: bool,
}

/// Two-factor state of a user account.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TwoFactorRow {
    pub id: u64,
    pub username: String,
    #[serde(skip)]
    pub two_factor_secret: Option<String>,
    pub two_factor_enabled: bool,
    pub two_factor_confirmed_at: Option<DateTime<Utc>>,
    /// JSON array of argon2 hashes of unused recovery codes.
    #[serde(skip)]
    pub two_factor_recovery_codes: Option<String>,
}

impl TwoFactorRow {
    /// A corrupt list counts as no codes left.
    pub fn recovery_hashes(&self) -> Vec<String> {
        let Some(raw) = self.two_factor_recovery_codes.as_deref() else {
            return Vec::new();
        };

        match serde_json::from_str::<Vec<String>>(raw) {
            Ok(hashes) => hashes,
            Err(e) => {
                tracing::warn!(user_id = self.id, error = %e, "Corrupt recovery code list");
                Vec::new()
            }
        }
    }
}

/// The pieces of a user record payroll generation needs.
#[derive(Debug, sqlx::FromRow)]
pub struct PayrollSubject {
    pub id: u64,
    pub employee_id: Option<u64>,
    pub hire_date: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn row(codes: Option<&str>) -> TwoFactorRow {
        TwoFactorRow {
            id: 4,
            username: "hr".to_string(),
            two_factor_secret: None,
            two_factor_enabled: true,
            two_factor_confirmed_at: None,
            two_factor_recovery_codes: codes.map(str::to_string),
        }
    }

    #[rstest]
    #[case(None, 0)]
    #[case(Some("[]"), 0)]
    #[case(Some(r#"["$argon2id$a","$argon2id$b"]"#), 2)]
    #[case(Some("not json"), 0)]
    #[case(Some(r#"{"codes":[]}"#), 0)]
    fn recovery_hashes_from_stored_json(#[case] codes: Option<&str>, #[case] expected: usize) {
        assert_eq!(row(codes).recovery_hashes().len(), expected);
    }
}
