use crate::models::List;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateListRequest {
    pub title: String,

    /// Desired index in the board; appended when absent.
    pub position: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateListRequest {
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse {
    pub id: String,
    pub title: String,
    pub board: String,
    pub cards: Vec<String>,
    pub position: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<List> for ListResponse {
    fn from(list: List) -> Self {
        Self {
            id: list.id,
            title: list.title,
            board: list.board,
            cards: list.cards,
            position: list.position,
            created_at: list.created_at.to_rfc3339(),
            updated_at: list.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListEnvelope {
    pub list: ListResponse,
}

#[derive(Debug, Serialize)]
pub struct ListsEnvelope {
    pub lists: Vec<ListResponse>,
}
