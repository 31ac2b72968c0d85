use crate::{
    dtos::{
        cards::{CardEnvelope, CardsEnvelope, CreateCardRequest, UpdateCardRequest},
        MoveRequest, SuccessResponse,
    },
    middleware::SessionUser,
    services::boards::CardPatch,
    startup::AppState,
    utils::ValidatedJson,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

pub async fn list_cards(
    State(state): State<AppState>,
    user: SessionUser,
    Path(list_id): Path<String>,
) -> Result<Json<CardsEnvelope>, AppError> {
    let cards = state.boards.list_cards(&user.user_id, &list_id).await?;

    Ok(Json(CardsEnvelope {
        cards: cards.into_iter().map(Into::into).collect(),
    }))
}

pub async fn create_card(
    State(state): State<AppState>,
    user: SessionUser,
    Path(list_id): Path<String>,
    ValidatedJson(req): ValidatedJson<CreateCardRequest>,
) -> Result<impl IntoResponse, AppError> {
    let card = state
        .boards
        .create_card(
            &user.user_id,
            &list_id,
            &req.title,
            req.description,
            req.position,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(CardEnvelope { card: card.into() })))
}

pub async fn update_card(
    State(state): State<AppState>,
    user: SessionUser,
    Path((list_id, card_id)): Path<(String, String)>,
    ValidatedJson(req): ValidatedJson<UpdateCardRequest>,
) -> Result<Json<CardEnvelope>, AppError> {
    let patch = CardPatch {
        title: req.title,
        description: req.description,
    };
    let card = state
        .boards
        .update_card(&user.user_id, &list_id, &card_id, patch)
        .await?;

    Ok(Json(CardEnvelope { card: card.into() }))
}

pub async fn delete_card(
    State(state): State<AppState>,
    user: SessionUser,
    Path((list_id, card_id)): Path<(String, String)>,
) -> Result<Json<SuccessResponse>, AppError> {
    state
        .boards
        .delete_card(&user.user_id, &list_id, &card_id)
        .await?;

    Ok(Json(SuccessResponse::ok()))
}

pub async fn move_card(
    State(state): State<AppState>,
    user: SessionUser,
    Path((list_id, card_id)): Path<(String, String)>,
    ValidatedJson(req): ValidatedJson<MoveRequest>,
) -> Result<Json<CardsEnvelope>, AppError> {
    let cards = state
        .boards
        .move_card(
            &user.user_id,
            &list_id,
            &card_id,
            req.to_index,
            req.from_index,
        )
        .await?;

    Ok(Json(CardsEnvelope {
        cards: cards.into_iter().map(Into::into).collect(),
    }))
}
