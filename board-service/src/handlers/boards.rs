use crate::{
    dtos::{
        boards::{BoardEnvelope, BoardRequest, BoardsEnvelope},
        SuccessResponse,
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

pub async fn list_boards(
    State(state): State<AppState>,
    user: SessionUser,
) -> Result<Json<BoardsEnvelope>, AppError> {
    let boards = state.boards.list_boards(&user.user_id).await?;

    Ok(Json(BoardsEnvelope {
        boards: boards.into_iter().map(Into::into).collect(),
    }))
}

pub async fn create_board(
    State(state): State<AppState>,
    user: SessionUser,
    ValidatedJson(req): ValidatedJson<BoardRequest>,
) -> Result<impl IntoResponse, AppError> {
    let board = state.boards.create_board(&user.user_id, &req.title).await?;

    Ok((
        StatusCode::CREATED,
        Json(BoardEnvelope {
            board: board.into(),
        }),
    ))
}

pub async fn get_board(
    State(state): State<AppState>,
    user: SessionUser,
    Path(board_id): Path<String>,
) -> Result<Json<BoardEnvelope>, AppError> {
    let board = state.boards.get_board(&user.user_id, &board_id).await?;

    Ok(Json(BoardEnvelope {
        board: board.into(),
    }))
}

pub async fn update_board(
    State(state): State<AppState>,
    user: SessionUser,
    Path(board_id): Path<String>,
    ValidatedJson(req): ValidatedJson<BoardRequest>,
) -> Result<Json<BoardEnvelope>, AppError> {
    let board = state
        .boards
        .update_board(&user.user_id, &board_id, &req.title)
        .await?;

    Ok(Json(BoardEnvelope {
        board: board.into(),
    }))
}

pub async fn delete_board(
    State(state): State<AppState>,
    user: SessionUser,
    Path(board_id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.boards.delete_board(&user.user_id, &board_id).await?;

    Ok(Json(SuccessResponse::ok()))
}
