use std::env;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use chrono::Weekday;
use dotenvy::dotenv;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,
    pub challenge_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_two_factor_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    pub payroll: PayrollSettings,
    pub two_factor: TwoFactorSettings,
}

/// Company-wide payroll rules handed to the payroll core.
#[derive(Clone, Debug, PartialEq)]
pub struct PayrollSettings {
    pub weekly_off_days: Vec<Weekday>,
    /// Month (1-12) the financial year starts in.
    pub financial_year_start_month: u32,
    /// Working days without attendance or approved leave count as LOP.
    pub count_absence_as_lop: bool,
}

impl Default for PayrollSettings {
    fn default() -> Self {
        Self {
            weekly_off_days: vec![Weekday::Sat, Weekday::Sun],
            financial_year_start_month: 4,
            count_absence_as_lop: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TwoFactorSettings {
    pub issuer: String,
    /// Accepted drift in 30-second steps on either side of now.
    pub window: u32,
    pub recovery_code_count: usize,
}

impl Default for TwoFactorSettings {
    fn default() -> Self {
        Self {
            issuer: "HRM".to_string(),
            window: 1,
            recovery_code_count: 8,
        }
    }
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn parsed_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{key} is invalid: {e}")),
        Err(_) => Ok(default),
    }
}

/// Parses a comma separated weekday list such as `Fri,Sat`.
pub fn parse_weekdays(raw: &str) -> Result<Vec<Weekday>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Weekday>()
                .map_err(|_| anyhow!("unknown weekday `{s}`"))
        })
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let defaults = PayrollSettings::default();
        let weekly_off_days = match env::var("WEEKLY_OFF_DAYS") {
            Ok(raw) => parse_weekdays(&raw).context("WEEKLY_OFF_DAYS")?,
            Err(_) => defaults.weekly_off_days,
        };

        let financial_year_start_month =
            parsed_or("FINANCIAL_YEAR_START_MONTH", defaults.financial_year_start_month)?;
        if !(1..=12).contains(&financial_year_start_month) {
            return Err(anyhow!("FINANCIAL_YEAR_START_MONTH must be between 1 and 12"));
        }

        let tf_defaults = TwoFactorSettings::default();

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: parsed_or("ACCESS_TOKEN_TTL", 900)?, // default 15 min
            refresh_token_ttl: parsed_or("REFRESH_TOKEN_TTL", 604_800)?, // default 7 days
            challenge_token_ttl: parsed_or("CHALLENGE_TOKEN_TTL", 300)?,

            rate_login_per_min: parsed_or("RATE_LOGIN_PER_MIN", 60)?,
            rate_two_factor_per_min: parsed_or("RATE_TWO_FACTOR_PER_MIN", 10)?,
            rate_refresh_per_min: parsed_or("RATE_REFRESH_PER_MIN", 30)?,
            rate_protected_per_min: parsed_or("RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),

            payroll: PayrollSettings {
                weekly_off_days,
                financial_year_start_month,
                count_absence_as_lop: parsed_or(
                    "COUNT_ABSENCE_AS_LOP",
                    defaults.count_absence_as_lop,
                )?,
            },
            two_factor: TwoFactorSettings {
                issuer: env::var("TOTP_ISSUER").unwrap_or(tf_defaults.issuer),
                window: parsed_or("TOTP_WINDOW", tf_defaults.window)?,
                recovery_code_count: parsed_or(
                    "RECOVERY_CODE_COUNT",
                    tf_defaults.recovery_code_count,
                )?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_weekday_lists() {
        assert_eq!(
            parse_weekdays("Fri, Sat").unwrap(),
            vec![Weekday::Fri, Weekday::Sat]
        );
        assert_eq!(parse_weekdays("").unwrap(), Vec::<Weekday>::new());
        assert!(parse_weekdays("Funday").is_err());
    }

    #[test]
    fn payroll_defaults_follow_april_financial_year() {
        let settings = PayrollSettings::default();
        assert_eq!(settings.financial_year_start_month, 4);
        assert_eq!(settings.weekly_off_days, vec![Weekday::Sat, Weekday::Sun]);
        assert!(settings.count_absence_as_lop);
    }
}
