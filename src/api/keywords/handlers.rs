use actix_web::{delete, get, post, web, HttpResponse};

use super::types::{KeywordRemove, KeywordsAdd, KeywordsResponse};
use crate::{
    api::users::types::RqUserPath,
    errors::{AppError, AppResult},
    models::keywords::{split_input, UserKeywords},
    RqState,
};

#[get("")]
pub async fn get_keywords(state: RqState, user_path: RqUserPath) -> AppResult<HttpResponse> {
    let user_id = user_path.user_id;
    let keywords = state
        .store
        .run(move |conn| UserKeywords::get(conn, user_id))
        .await?;
    Ok(HttpResponse::Ok().json(KeywordsResponse { user_id, keywords }))
}

#[post("")]
pub async fn add_keywords(
    state: RqState,
    user_path: RqUserPath,
    body: web::Json<KeywordsAdd>,
) -> AppResult<HttpResponse> {
    let user_id = user_path.user_id;
    let input = body.into_inner().keywords;
    if split_input(&input).is_empty() {
        return Err(AppError::invalid_input("keywords", "no keywords given"));
    }

    let update = state
        .store
        .run(move |conn| UserKeywords::add(conn, user_id, &input))
        .await?;
    log::info!("User {} added {} keywords", user_id, update.added);
    Ok(HttpResponse::Ok().json(update))
}

#[delete("")]
pub async fn remove_keyword(
    state: RqState,
    user_path: RqUserPath,
    body: web::Json<KeywordRemove>,
) -> AppResult<HttpResponse> {
    let user_id = user_path.user_id;
    let keyword = body.into_inner().keyword.trim().to_string();
    if keyword.is_empty() {
        return Err(AppError::invalid_input("keyword", "must not be empty"));
    }

    let remaining = state
        .store
        .run(move |conn| UserKeywords::remove(conn, user_id, &keyword))
        .await?;
    match remaining {
        Some(keywords) => Ok(HttpResponse::Ok().json(KeywordsResponse { user_id, keywords })),
        None => Err(AppError::resource_not_found("Keyword")),
    }
}
