use crate::models::Board;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Title limits apply to the trimmed value and are enforced by `BoardService`.
#[derive(Debug, Deserialize, Validate)]
pub struct BoardRequest {
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BoardResponse {
    pub id: String,
    pub title: String,
    pub owner: String,
    pub members: Vec<String>,
    pub lists: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Board> for BoardResponse {
    fn from(board: Board) -> Self {
        Self {
            id: board.id,
            title: board.title,
            owner: board.owner,
            members: board.members,
            lists: board.lists,
            created_at: board.created_at.to_rfc3339(),
            updated_at: board.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BoardEnvelope {
    pub board: BoardResponse,
}

#[derive(Debug, Serialize)]
pub struct BoardsEnvelope {
    pub boards: Vec<BoardResponse>,
}
