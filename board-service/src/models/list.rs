use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct List {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub board: String,
    pub cards: Vec<String>,
    pub position: i64,
    pub version: i64,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl List {
    pub fn new(board: String, title: String, position: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title,
            board,
            cards: Vec::new(),
            position,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
