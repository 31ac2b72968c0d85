use crate::{
    dtos::{
        lists::{CreateListRequest, ListEnvelope, ListsEnvelope, UpdateListRequest},
        MoveRequest, SuccessResponse,
    },
    middleware::SessionUser,
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

pub async fn list_lists(
    State(state): State<AppState>,
    user: SessionUser,
    Path(board_id): Path<String>,
) -> Result<Json<ListsEnvelope>, AppError> {
    let lists = state.boards.list_lists(&user.user_id, &board_id).await?;

    Ok(Json(ListsEnvelope {
        lists: lists.into_iter().map(Into::into).collect(),
    }))
}

pub async fn create_list(
    State(state): State<AppState>,
    user: SessionUser,
    Path(board_id): Path<String>,
    ValidatedJson(req): ValidatedJson<CreateListRequest>,
) -> Result<impl IntoResponse, AppError> {
    let list = state
        .boards
        .create_list(&user.user_id, &board_id, &req.title, req.position)
        .await?;

    Ok((StatusCode::CREATED, Json(ListEnvelope { list: list.into() })))
}

pub async fn update_list(
    State(state): State<AppState>,
    user: SessionUser,
    Path((board_id, list_id)): Path<(String, String)>,
    ValidatedJson(req): ValidatedJson<UpdateListRequest>,
) -> Result<Json<ListEnvelope>, AppError> {
    let list = state
        .boards
        .update_list(&user.user_id, &board_id, &list_id, &req.title)
        .await?;

    Ok(Json(ListEnvelope { list: list.into() }))
}

pub async fn delete_list(
    State(state): State<AppState>,
    user: SessionUser,
    Path((board_id, list_id)): Path<(String, String)>,
) -> Result<Json<SuccessResponse>, AppError> {
    state
        .boards
        .delete_list(&user.user_id, &board_id, &list_id)
        .await?;

    Ok(Json(SuccessResponse::ok()))
}

pub async fn move_list(
    State(state): State<AppState>,
    user: SessionUser,
    Path((board_id, list_id)): Path<(String, String)>,
    ValidatedJson(req): ValidatedJson<MoveRequest>,
) -> Result<Json<ListsEnvelope>, AppError> {
    let lists = state
        .boards
        .move_list(
            &user.user_id,
            &board_id,
            &list_id,
            req.to_index,
            req.from_index,
        )
        .await?;

    Ok(Json(ListsEnvelope {
        lists: lists.into_iter().map(Into::into).collect(),
    }))
}
