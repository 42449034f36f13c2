//! Boards, cards, checkout and comments

use super::{created, ApiJson, ApiPath, ApiQuery, ApiResult, AppState};
use crate::models::{
    Board, BoardDetail, BoardInput, Card, CardDetail, CardFilter, CardInput, CardPosition,
    CheckoutOutcome, CheckoutRequest, CommentInput,
};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/boards", get(list_boards).post(create_board))
        .route(
            "/boards/{id}",
            get(board_detail).put(update_board).delete(delete_board),
        )
        .route("/boards/{id}/cards", post(create_card_on_board))
        .route("/cards", get(list_cards).post(create_card))
        .route("/cards/position", post(save_position))
        .route(
            "/cards/{id}",
            get(card_detail).put(update_card).delete(delete_card),
        )
        .route("/cards/{id}/checkout", post(toggle_checkout))
        .route("/cards/{id}/comments", post(add_comment))
}

async fn list_boards(State(state): State<AppState>) -> ApiResult<Json<Vec<Board>>> {
    Ok(Json(state.run(|store| store.list_boards()).await?))
}

async fn create_board(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<BoardInput>,
) -> ApiResult<Response> {
    let board = state.run(move |store| store.create_board(&input)).await?;
    Ok(created(board))
}

async fn board_detail(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<BoardDetail>> {
    Ok(Json(state.run(move |store| store.board_detail(id)).await?))
}

async fn update_board(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<BoardInput>,
) -> ApiResult<Json<Board>> {
    Ok(Json(state.run(move |store| store.update_board(id, &input)).await?))
}

async fn delete_board(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    state.run(move |store| store.delete_board(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_card_on_board(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<CardInput>,
) -> ApiResult<Response> {
    let card = state
        .run(move |store| store.create_card_on_board(id, &input))
        .await?;
    Ok(created(card))
}

async fn list_cards(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<CardFilter>,
) -> ApiResult<Json<Vec<Card>>> {
    Ok(Json(state.run(move |store| store.list_cards(&filter)).await?))
}

async fn create_card(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<CardInput>,
) -> ApiResult<Response> {
    let card = state.run(move |store| store.create_card(&input)).await?;
    Ok(created(card))
}

async fn card_detail(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<CardDetail>> {
    Ok(Json(state.run(move |store| store.card_detail(id)).await?))
}

async fn update_card(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<CardInput>,
) -> ApiResult<Json<Card>> {
    Ok(Json(state.run(move |store| store.update_card(id, &input)).await?))
}

async fn delete_card(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    state.run(move |store| store.delete_card(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle_checkout(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<CheckoutRequest>,
) -> ApiResult<Json<CheckoutOutcome>> {
    Ok(Json(
        state
            .run(move |store| store.toggle_checkout(id, &request.user))
            .await?,
    ))
}

async fn save_position(
    State(state): State<AppState>,
    ApiJson(position): ApiJson<CardPosition>,
) -> ApiResult<Json<Card>> {
    Ok(Json(
        state
            .run(move |store| store.save_card_position(&position))
            .await?,
    ))
}

async fn add_comment(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<CommentInput>,
) -> ApiResult<Response> {
    let comment = state.run(move |store| store.add_comment(id, &input)).await?;
    Ok(created(comment))
}
