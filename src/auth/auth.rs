use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::model::role::Role;
use crate::models::TokenType;
use crate::payroll::workflow::Actor;
use actix_web::{
    FromRequest, HttpMessage, HttpRequest, dev::Payload, error::ErrorUnauthorized, web::Data,
};
use futures::future::{Ready, ready};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub role: Role,
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // Already validated by auth_middleware on protected scopes.
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let token = match bearer_token(req) {
            Some(t) => t,
            None => return ready(Err(ErrorUnauthorized("Missing token"))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => {
                return ready(Err(actix_web::error::ErrorInternalServerError(
                    "Config missing",
                )));
            }
        };

        let claims = match verify_token(token, &config.jwt_secret) {
            Ok(c) if c.token_type == TokenType::Access => c,
            _ => return ready(Err(ErrorUnauthorized("Invalid token"))),
        };

        let role = match Role::from_id(claims.role) {
            Some(r) => r,
            None => return ready(Err(ErrorUnauthorized("Invalid role"))),
        };

        ready(Ok(AuthUser {
            user_id: claims.user_id,
            role,
        }))
    }
}

impl AuthUser {
    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.user_id,
            role: self.role,
        }
    }

    /// Staff may read anyone's payroll; employees only their own.
    pub fn can_view_payroll_of(&self, user_id: u64) -> bool {
        self.role.can_view_payroll() || self.user_id == user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{TokenSubject, generate_token};
    use crate::config::{PayrollSettings, TwoFactorSettings};
    use actix_web::test::TestRequest;

    fn config() -> Config {
        Config {
            database_url: String::new(),
            jwt_secret: "test-secret".to_string(),
            server_addr: String::new(),
            access_token_ttl: 60,
            refresh_token_ttl: 60,
            challenge_token_ttl: 60,
            rate_login_per_min: 60,
            rate_two_factor_per_min: 10,
            rate_refresh_per_min: 30,
            rate_protected_per_min: 1000,
            api_prefix: "/api".to_string(),
            payroll: PayrollSettings::default(),
            two_factor: TwoFactorSettings::default(),
        }
    }

    fn token(token_type: TokenType) -> String {
        let subject = TokenSubject {
            user_id: 5,
            username: "fin".to_string(),
            role: Role::Finance.id(),
            employee_id: None,
        };
        generate_token(&subject, token_type, "test-secret", 60).unwrap().0
    }

    #[actix_web::test]
    async fn extracts_user_from_access_token() {
        let req = TestRequest::default()
            .app_data(Data::new(config()))
            .insert_header(("Authorization", format!("Bearer {}", token(TokenType::Access))))
            .to_http_request();

        let user = AuthUser::extract(&req).await.unwrap();
        assert_eq!(user.user_id, 5);
        assert_eq!(user.role, Role::Finance);
        assert!(user.can_view_payroll_of(77));
    }

    #[actix_web::test]
    async fn rejects_challenge_tokens() {
        let req = TestRequest::default()
            .app_data(Data::new(config()))
            .insert_header((
                "Authorization",
                format!("Bearer {}", token(TokenType::TwoFactorChallenge)),
            ))
            .to_http_request();

        assert!(AuthUser::extract(&req).await.is_err());
    }

    #[actix_web::test]
    async fn rejects_missing_header() {
        let req = TestRequest::default()
            .app_data(Data::new(config()))
            .to_http_request();
        assert!(AuthUser::extract(&req).await.is_err());
    }

    #[test]
    fn employees_only_see_their_own_payroll() {
        let user = AuthUser {
            user_id: 9,
            role: Role::Employee,
        };
        assert!(user.can_view_payroll_of(9));
        assert!(!user.can_view_payroll_of(10));
    }
}
