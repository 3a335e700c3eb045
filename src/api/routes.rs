use super::{health, stats, users, RqState};
use actix_web::dev::ServiceRequest;
use actix_web::web;
use actix_web_httpauth::extractors::bearer::{BearerAuth, Config};
use actix_web_httpauth::extractors::AuthenticationError;
use actix_web_httpauth::middleware::HttpAuthentication;

/// Health checks are open, everything under `/api` needs the bearer token.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health::routes()).service(
        web::scope("/api")
            .wrap(HttpAuthentication::bearer(validator))
            .service(stats::push_stats)
            .service(users::routes()),
    );
}

async fn validator(
    req: ServiceRequest,
    credentials: BearerAuth,
) -> Result<ServiceRequest, (actix_web::Error, ServiceRequest)> {
    let authorized = req
        .app_data::<RqState>()
        .map(|state| state.api_token == credentials.token())
        .unwrap_or(false);

    if authorized {
        Ok(req)
    } else {
        log::warn!("Rejected API request to {} with invalid token", req.path());
        let config = req.app_data::<Config>().cloned().unwrap_or_default();
        Err((AuthenticationError::from(config).into(), req))
    }
}
