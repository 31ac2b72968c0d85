//! Entity store contract for users, boards, lists and cards.
//!
//! Reads are plain lookups. Every multi-record write goes through
//! [`EntityStore::commit`], which applies a [`WriteBatch`] all-or-nothing and
//! optionally checks and bumps a parent's version in the same unit.

pub mod memory;
pub mod mongo;

pub use memory::{FailureKind, MemoryStore};
pub use mongo::MongoStore;

use crate::models::{Board, Card, List, User};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Version conflict")]
    Conflict,

    #[error("Duplicate value for {0}")]
    Duplicate(String),

    #[error("Store unavailable: {0}")]
    Unavailable(anyhow::Error),
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        if err.contains_label(mongodb::error::TRANSIENT_TRANSACTION_ERROR) {
            return StoreError::Conflict;
        }
        if is_duplicate_key(&err) {
            return StoreError::Duplicate("unique index".to_string());
        }
        StoreError::Unavailable(anyhow::Error::new(err))
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};

    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == 11000,
        ErrorKind::Command(e) => e.code == 11000,
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentKind {
    Board,
    List,
}

/// Optimistic-concurrency precondition: the parent must still be at
/// `expected_version`. A successful commit bumps it by one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionGuard {
    pub kind: ParentKind,
    pub id: String,
    pub expected_version: i64,
}

impl VersionGuard {
    pub fn board(board: &Board) -> Self {
        Self {
            kind: ParentKind::Board,
            id: board.id.clone(),
            expected_version: board.version,
        }
    }

    pub fn list(list: &List) -> Self {
        Self {
            kind: ParentKind::List,
            id: list.id.clone(),
            expected_version: list.version,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Mutation {
    SetBoardTitle { id: String, title: String },
    SetBoardLists { id: String, lists: Vec<String> },
    DeleteBoard { id: String },

    InsertList(List),
    SetListTitle { id: String, title: String },
    SetListPosition { id: String, position: i64 },
    SetListCards { id: String, cards: Vec<String> },
    DeleteList { id: String },
    DeleteListsInBoard { board_id: String },

    InsertCard(Card),
    SetCardFields {
        id: String,
        title: String,
        description: Option<String>,
    },
    SetCardPosition { id: String, position: i64 },
    DeleteCard { id: String },
    DeleteCardsInLists { list_ids: Vec<String> },
}

#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub guard: Option<VersionGuard>,
    pub mutations: Vec<Mutation>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn guarded(guard: VersionGuard) -> Self {
        Self {
            guard: Some(guard),
            mutations: Vec::new(),
        }
    }

    pub fn push(&mut self, mutation: Mutation) -> &mut Self {
        self.mutations.push(mutation);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.guard.is_none() && self.mutations.is_empty()
    }
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn health_check(&self) -> Result<(), StoreError>;

    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;
    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    /// Any user whose username or email matches either value.
    async fn find_user_by_login(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<User>, StoreError>;

    async fn insert_board(&self, board: &Board) -> Result<(), StoreError>;
    async fn find_board(&self, id: &str) -> Result<Option<Board>, StoreError>;
    /// Boards the user owns or is a member of, oldest first.
    async fn find_boards_for_user(&self, user_id: &str) -> Result<Vec<Board>, StoreError>;

    async fn find_list(&self, id: &str) -> Result<Option<List>, StoreError>;
    async fn find_lists_in_board(&self, board_id: &str) -> Result<Vec<List>, StoreError>;

    async fn find_card(&self, id: &str) -> Result<Option<Card>, StoreError>;
    async fn find_cards_in_list(&self, list_id: &str) -> Result<Vec<Card>, StoreError>;

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;
}
