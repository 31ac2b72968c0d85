use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A board owns an ordered sequence of list ids.
///
/// `version` is bumped by every committed write that touches the board's
/// list sequence; writers guard on it to detect concurrent reorders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Board {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub owner: String,
    pub members: Vec<String>,
    pub lists: Vec<String>,
    pub version: i64,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Board {
    pub fn new(owner: String, title: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title,
            members: vec![owner.clone()],
            owner,
            lists: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owner(&self, user_id: &str) -> bool {
        self.owner == user_id
    }

    /// Owners are always members, even if the stored set lost them.
    pub fn is_member(&self, user_id: &str) -> bool {
        self.is_owner(user_id) || self.members.iter().any(|m| m == user_id)
    }
}
