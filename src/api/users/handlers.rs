use super::types::{RqUserPath, UserStats};
use crate::errors::AppResult;
use crate::models::{keywords::UserKeywords, subscription::Subscription};
use crate::RqState;
use actix_web::{get, HttpResponse};

#[get("/stats")]
pub async fn user_stats(state: RqState, user_path: RqUserPath) -> AppResult<HttpResponse> {
    let user_id = user_path.user_id;
    let push_summary = state.stats.summary();
    let stats = state
        .store
        .run(move |conn| {
            Ok(UserStats {
                user_id,
                subscriptions: Subscription::get_all_for_user(conn, user_id)?.len(),
                keywords: UserKeywords::get(conn, user_id)?.len(),
                push_summary,
            })
        })
        .await?;
    Ok(HttpResponse::Ok().json(stats))
}
