use crate::RqState;
use actix_web::{get, web, HttpResponse, Responder};
use serde_json::json;

/// Health check endpoint for load balancers
#[get("")]
pub async fn health_check(state: RqState) -> impl Responder {
    match state.store.run(|_| Ok(())).await {
        Ok(()) => HttpResponse::Ok().json(json!({
            "status": "healthy",
            "database": "connected"
        })),
        Err(e) => {
            log::error!("Health check failed: {}", e);
            HttpResponse::ServiceUnavailable().json(json!({
                "status": "unhealthy",
                "database": "disconnected"
            }))
        }
    }
}

/// Liveness check - simple check to see if the app is alive
#[get("/live")]
pub async fn liveness_check() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub fn routes() -> actix_web::Scope {
    web::scope("/health")
        .service(health_check)
        .service(liveness_check)
}
