use super::handlers;
use actix_web::{web, Scope};

pub fn routes() -> Scope {
    web::scope("/keywords")
        .service(handlers::get_keywords)
        .service(handlers::add_keywords)
        .service(handlers::remove_keyword)
}
