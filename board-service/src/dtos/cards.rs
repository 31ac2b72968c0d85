use crate::models::Card;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCardRequest {
    pub title: String,

    pub description: Option<String>,

    /// Desired index in the list; appended when absent.
    pub position: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCardRequest {
    pub title: Option<String>,

    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CardResponse {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub list: String,
    pub position: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Card> for CardResponse {
    fn from(card: Card) -> Self {
        Self {
            id: card.id,
            title: card.title,
            description: card.description,
            list: card.list,
            position: card.position,
            created_at: card.created_at.to_rfc3339(),
            updated_at: card.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CardEnvelope {
    pub card: CardResponse,
}

#[derive(Debug, Serialize)]
pub struct CardsEnvelope {
    pub cards: Vec<CardResponse>,
}
