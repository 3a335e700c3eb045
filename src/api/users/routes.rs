use super::handlers;
use crate::api::{keywords, subscriptions};
use actix_web::{web, Scope};

pub fn routes() -> Scope {
    web::scope("/users/{user_id}")
        .service(handlers::user_stats)
        .service(subscriptions::routes())
        .service(keywords::routes())
}
