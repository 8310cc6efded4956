use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct LoginReqDto {
    #[schema(example = "jane")]
    pub username: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// Returned by login instead of tokens when the account has 2FA enabled.
#[derive(Serialize, ToSchema)]
pub struct TwoFactorChallenge {
    pub two_factor_required: bool,
    pub challenge_token: String,
}

#[derive(Deserialize, ToSchema)]
pub struct TwoFactorLoginReq {
    pub challenge_token: String,
    /// Six digit code from the authenticator app.
    #[schema(example = "287082")]
    pub code: Option<String>,
    /// One of the recovery codes issued when 2FA was enabled.
    #[schema(example = "AB12-CD34")]
    pub recovery_code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    pub sub: String,
    pub role: u8, // role id
    pub exp: usize,
    pub jti: String,

    pub token_type: TokenType,
    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
pub enum TokenType {
    Access,
    Refresh,
    /// Password accepted, second factor still pending.
    TwoFactorChallenge,
}
