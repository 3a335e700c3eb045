use actix_web::{delete, get, post, web, HttpResponse};
use chrono::{DateTime, Utc};
use serde_json::json;

use super::types::{RqSubPath, SubscriptionCreate, SubscriptionResponse};
use crate::{
    api::users::types::RqUserPath,
    errors::{AppError, AppResult},
    models::subscription::{SubscribeOutcome, Subscription, UnsubscribeOutcome},
    tasks::feed_monitor::fetcher,
    RqState,
};

#[get("")]
pub async fn get_all_subscriptions(state: RqState, user_path: RqUserPath) -> AppResult<HttpResponse> {
    let user_id = user_path.user_id;
    let subscriptions = state
        .store
        .run(move |conn| Ok(Subscription::list_for_user(conn, user_id)?))
        .await?;
    Ok(HttpResponse::Ok().json(subscriptions))
}

#[post("")]
pub async fn create_subscription(
    state: RqState,
    user_path: RqUserPath,
    sub_req: web::Json<SubscriptionCreate>,
) -> AppResult<HttpResponse> {
    let user_id = user_path.user_id;
    let SubscriptionCreate { url, name, channel } = sub_req.into_inner();
    let url = url.trim().to_string();
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::invalid_input("name", "must not be empty"));
    }

    fetcher::validate_feed_url(&state.client, &url).await?;

    // with first-burst suppression the existing items are treated as already seen
    let initial_watermark = if state.suppress_first_burst {
        Utc::now()
    } else {
        DateTime::<Utc>::UNIX_EPOCH
    };
    let outcome = state
        .store
        .run(move |conn| {
            Ok(Subscription::subscribe(
                conn,
                user_id,
                &url,
                &name,
                channel,
                initial_watermark,
            )?)
        })
        .await?;

    match outcome {
        SubscribeOutcome::Created(subscription) => Ok(HttpResponse::Created().json(SubscriptionResponse {
            status: "created",
            subscription,
        })),
        SubscribeOutcome::Joined(subscription) => Ok(HttpResponse::Ok().json(SubscriptionResponse {
            status: "joined",
            subscription,
        })),
        SubscribeOutcome::AlreadySubscribed(_) => Err(AppError::FeedAlreadySubscribed),
    }
}

#[delete("/{name}")]
pub async fn delete_subscription(state: RqState, sub_path: RqSubPath) -> AppResult<HttpResponse> {
    let user_id = sub_path.user_id;
    let name = sub_path.name.clone();
    let outcome = state
        .store
        .run(move |conn| Ok(Subscription::unsubscribe(conn, user_id, &name)?))
        .await?;

    match outcome {
        UnsubscribeOutcome::Left => Ok(HttpResponse::Ok().json(json!({"status": "left"}))),
        UnsubscribeOutcome::Removed => Ok(HttpResponse::Ok().json(json!({"status": "removed"}))),
        UnsubscribeOutcome::NotSubscribed | UnsubscribeOutcome::NotFound => {
            Err(AppError::resource_not_found("Subscription"))
        }
    }
}
