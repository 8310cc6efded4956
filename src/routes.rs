use crate::{
    api::{month_lock, payroll, payroll_structure, two_factor},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::{Result, anyhow};
use std::sync::Arc;

fn build_limiter(requests_per_min: u32) -> Result<Governor<PeerIpKeyExtractor, NoOpMiddleware>> {
    let requests_per_min = requests_per_min.max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(60_000 / u64::from(requests_per_min))
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow!("invalid rate limit: {requests_per_min}/min"))?;
    Ok(Governor::new(&cfg))
}

/// Per-route rate limiters, built once at startup and shared by every worker.
#[derive(Clone)]
pub struct Limiters {
    login: Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>,
    two_factor: Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>,
    refresh: Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>,
    protected: Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>,
}

impl Limiters {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            login: Arc::new(build_limiter(config.rate_login_per_min)?),
            two_factor: Arc::new(build_limiter(config.rate_two_factor_per_min)?),
            refresh: Arc::new(build_limiter(config.rate_refresh_per_min)?),
            protected: Arc::new(build_limiter(config.rate_protected_per_min)?),
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: &Limiters) {
    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/two-factor")
                    .wrap(limiters.two_factor.clone())
                    .route(web::post().to(handlers::two_factor_login)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(limiters.refresh.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(limiters.protected.clone())
            .service(
                web::scope("/payroll")
                    // /payroll
                    .service(
                        web::resource("")
                            .route(web::post().to(payroll::generate_payroll))
                            .route(web::get().to(payroll::list_payrolls)),
                    )
                    // /payroll/{id}
                    .service(web::resource("/{id}").route(web::get().to(payroll::get_payroll)))
                    // /payroll/{id}/approve
                    .service(
                        web::resource("/{id}/approve")
                            .route(web::put().to(payroll::approve_payroll)),
                    )
                    // /payroll/{id}/pay
                    .service(
                        web::resource("/{id}/pay").route(web::put().to(payroll::pay_payroll)),
                    ),
            )
            .service(
                web::scope("/payroll-structure")
                    .service(
                        web::resource("/{user_id}")
                            .route(web::get().to(payroll_structure::get_structure))
                            .route(web::put().to(payroll_structure::revise_structure)),
                    )
                    .service(
                        web::resource("/{user_id}/history")
                            .route(web::get().to(payroll_structure::structure_history)),
                    ),
            )
            .service(
                web::resource("/payroll-lock/{month}")
                    .route(web::get().to(month_lock::get_lock))
                    .route(web::post().to(month_lock::lock))
                    .route(web::delete().to(month_lock::unlock)),
            )
            .service(
                web::scope("/two-factor")
                    .service(web::resource("").route(web::delete().to(two_factor::disable)))
                    .service(web::resource("/setup").route(web::post().to(two_factor::setup)))
                    .service(web::resource("/confirm").route(web::post().to(two_factor::confirm)))
                    .service(
                        web::resource("/recovery-codes")
                            .route(web::post().to(two_factor::regenerate_recovery_codes)),
                    ),
            ),
    );
}
