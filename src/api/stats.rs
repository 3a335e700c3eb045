use crate::RqState;
use actix_web::{get, HttpResponse};

/// Today's push counters.
#[get("/stats")]
pub async fn push_stats(state: RqState) -> HttpResponse {
    HttpResponse::Ok().json(state.stats.snapshot())
}
