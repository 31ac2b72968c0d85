//! In-process entity store.
//!
//! Used for local runs (`STORE_BACKEND=memory`) and as the test double for
//! the service layer. A commit works on a copy of the whole state and swaps it
//! in only when every mutation applied, which gives the same all-or-nothing
//! behaviour as a store transaction.

use super::{EntityStore, Mutation, ParentKind, StoreError, VersionGuard, WriteBatch};
use crate::models::{Board, Card, List, User};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Default)]
struct State {
    users: HashMap<String, User>,
    boards: HashMap<String, Board>,
    lists: HashMap<String, List>,
    cards: HashMap<String, Card>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Conflict,
    Unavailable,
}

#[derive(Debug, Default)]
struct FaultPlan {
    remaining: usize,
    kind: Option<FailureKind>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    faults: Arc<Mutex<FaultPlan>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` commits fail with `kind` without applying anything.
    pub fn fail_next_commits(&self, count: usize, kind: FailureKind) {
        let mut faults = lock(&self.faults);
        faults.remaining = count;
        faults.kind = Some(kind);
    }

    pub fn board_count(&self) -> usize {
        lock(&self.state).boards.len()
    }

    pub fn list_count(&self) -> usize {
        lock(&self.state).lists.len()
    }

    pub fn card_count(&self) -> usize {
        lock(&self.state).cards.len()
    }

    fn injected_failure(&self) -> Option<StoreError> {
        let mut faults = lock(&self.faults);
        if faults.remaining == 0 {
            return None;
        }
        faults.remaining -= 1;
        faults.kind.map(|kind| match kind {
            FailureKind::Conflict => StoreError::Conflict,
            FailureKind::Unavailable => {
                StoreError::Unavailable(anyhow::anyhow!("injected store outage"))
            }
        })
    }
}

// A poisoned lock only means another test thread panicked mid-commit; the
// state itself is always swapped whole, so it is safe to keep using.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn check_guard(state: &mut State, guard: &VersionGuard) -> Result<(), StoreError> {
    let version = match guard.kind {
        ParentKind::Board => state.boards.get_mut(&guard.id).map(|b| &mut b.version),
        ParentKind::List => state.lists.get_mut(&guard.id).map(|l| &mut l.version),
    };

    match version {
        Some(version) if *version == guard.expected_version => {
            *version += 1;
            Ok(())
        }
        _ => Err(StoreError::Conflict),
    }
}

fn apply(state: &mut State, mutation: Mutation) -> Result<(), StoreError> {
    let now = Utc::now();

    match mutation {
        Mutation::SetBoardTitle { id, title } => {
            let board = state
                .boards
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(format!("Board {}", id)))?;
            board.title = title;
            board.updated_at = now;
        }
        Mutation::SetBoardLists { id, lists } => {
            let board = state
                .boards
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(format!("Board {}", id)))?;
            board.lists = lists;
            board.updated_at = now;
        }
        Mutation::DeleteBoard { id } => {
            state
                .boards
                .remove(&id)
                .ok_or_else(|| StoreError::NotFound(format!("Board {}", id)))?;
        }
        Mutation::InsertList(list) => {
            state.lists.insert(list.id.clone(), list);
        }
        Mutation::SetListTitle { id, title } => {
            let list = state
                .lists
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(format!("List {}", id)))?;
            list.title = title;
            list.updated_at = now;
        }
        Mutation::SetListPosition { id, position } => {
            let list = state
                .lists
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(format!("List {}", id)))?;
            list.position = position;
            list.updated_at = now;
        }
        Mutation::SetListCards { id, cards } => {
            let list = state
                .lists
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(format!("List {}", id)))?;
            list.cards = cards;
            list.updated_at = now;
        }
        Mutation::DeleteList { id } => {
            state
                .lists
                .remove(&id)
                .ok_or_else(|| StoreError::NotFound(format!("List {}", id)))?;
        }
        Mutation::DeleteListsInBoard { board_id } => {
            state.lists.retain(|_, list| list.board != board_id);
        }
        Mutation::InsertCard(card) => {
            state.cards.insert(card.id.clone(), card);
        }
        Mutation::SetCardFields {
            id,
            title,
            description,
        } => {
            let card = state
                .cards
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(format!("Card {}", id)))?;
            card.title = title;
            card.description = description;
            card.updated_at = now;
        }
        Mutation::SetCardPosition { id, position } => {
            let card = state
                .cards
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(format!("Card {}", id)))?;
            card.position = position;
            card.updated_at = now;
        }
        Mutation::DeleteCard { id } => {
            state
                .cards
                .remove(&id)
                .ok_or_else(|| StoreError::NotFound(format!("Card {}", id)))?;
        }
        Mutation::DeleteCardsInLists { list_ids } => {
            state.cards.retain(|_, card| !list_ids.contains(&card.list));
        }
    }

    Ok(())
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        if state.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate("email".to_string()));
        }
        if state.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Duplicate("username".to_string()));
        }
        state.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(lock(&self.state).users.get(id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(lock(&self.state)
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_user_by_login(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<User>, StoreError> {
        Ok(lock(&self.state)
            .users
            .values()
            .find(|u| u.username == username || u.email == email)
            .cloned())
    }

    async fn insert_board(&self, board: &Board) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        if state.boards.contains_key(&board.id) {
            return Err(StoreError::Duplicate("_id".to_string()));
        }
        state.boards.insert(board.id.clone(), board.clone());
        Ok(())
    }

    async fn find_board(&self, id: &str) -> Result<Option<Board>, StoreError> {
        // Let concurrent requests interleave the way real I/O would.
        tokio::task::yield_now().await;
        Ok(lock(&self.state).boards.get(id).cloned())
    }

    async fn find_boards_for_user(&self, user_id: &str) -> Result<Vec<Board>, StoreError> {
        let mut boards: Vec<Board> = lock(&self.state)
            .boards
            .values()
            .filter(|b| b.is_member(user_id))
            .cloned()
            .collect();
        boards.sort_by_key(|b| b.created_at);
        Ok(boards)
    }

    async fn find_list(&self, id: &str) -> Result<Option<List>, StoreError> {
        tokio::task::yield_now().await;
        Ok(lock(&self.state).lists.get(id).cloned())
    }

    async fn find_lists_in_board(&self, board_id: &str) -> Result<Vec<List>, StoreError> {
        let mut lists: Vec<List> = lock(&self.state)
            .lists
            .values()
            .filter(|l| l.board == board_id)
            .cloned()
            .collect();
        lists.sort_by_key(|l| l.position);
        Ok(lists)
    }

    async fn find_card(&self, id: &str) -> Result<Option<Card>, StoreError> {
        Ok(lock(&self.state).cards.get(id).cloned())
    }

    async fn find_cards_in_list(&self, list_id: &str) -> Result<Vec<Card>, StoreError> {
        let mut cards: Vec<Card> = lock(&self.state)
            .cards
            .values()
            .filter(|c| c.list == list_id)
            .cloned()
            .collect();
        cards.sort_by_key(|c| c.position);
        Ok(cards)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if let Some(err) = self.injected_failure() {
            return Err(err);
        }

        let mut state = lock(&self.state);
        let mut next = state.clone();

        if let Some(guard) = &batch.guard {
            check_guard(&mut next, guard)?;
        }
        for mutation in batch.mutations {
            apply(&mut next, mutation)?;
        }

        *state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board() -> Board {
        Board::new("owner".to_string(), "Roadmap".to_string())
    }

    #[tokio::test]
    async fn guarded_commit_bumps_version() {
        let store = MemoryStore::new();
        let board = board();
        store.insert_board(&board).await.unwrap();

        let mut batch = WriteBatch::guarded(VersionGuard::board(&board));
        batch.push(Mutation::SetBoardTitle {
            id: board.id.clone(),
            title: "Renamed".to_string(),
        });
        store.commit(batch).await.unwrap();

        let stored = store.find_board(&board.id).await.unwrap().unwrap();
        assert_eq!(stored.version, board.version + 1);
        assert_eq!(stored.title, "Renamed");
    }

    #[tokio::test]
    async fn stale_guard_is_rejected() {
        let store = MemoryStore::new();
        let board = board();
        store.insert_board(&board).await.unwrap();

        store
            .commit(WriteBatch::guarded(VersionGuard::board(&board)))
            .await
            .unwrap();
        let result = store
            .commit(WriteBatch::guarded(VersionGuard::board(&board)))
            .await;

        assert!(matches!(result, Err(StoreError::Conflict)));
    }

    #[tokio::test]
    async fn failed_mutation_rolls_back_whole_batch() {
        let store = MemoryStore::new();
        let board = board();
        store.insert_board(&board).await.unwrap();

        let mut batch = WriteBatch::guarded(VersionGuard::board(&board));
        batch
            .push(Mutation::InsertList(List::new(
                board.id.clone(),
                "Todo".to_string(),
                0,
            )))
            .push(Mutation::SetCardPosition {
                id: "missing".to_string(),
                position: 3,
            });

        let result = store.commit(batch).await;

        assert!(matches!(result, Err(StoreError::NotFound(_))));
        assert_eq!(store.list_count(), 0);
        let stored = store.find_board(&board.id).await.unwrap().unwrap();
        assert_eq!(stored.version, board.version);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let store = MemoryStore::new();
        store.fail_next_commits(1, FailureKind::Unavailable);

        assert!(matches!(
            store.commit(WriteBatch::new()).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.commit(WriteBatch::new()).await.is_ok());
    }

    #[tokio::test]
    async fn duplicate_users_are_rejected() {
        let store = MemoryStore::new();
        let user = User::new("ada".to_string(), "ada@example.com".to_string(), "h".to_string());
        store.insert_user(&user).await.unwrap();

        let clash = User::new("ada".to_string(), "other@example.com".to_string(), "h".to_string());

        assert!(matches!(
            store.insert_user(&clash).await,
            Err(StoreError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn board_ids_are_unique() {
        let store = MemoryStore::new();
        let board = board();
        store.insert_board(&board).await.unwrap();

        assert!(matches!(
            store.insert_board(&board).await,
            Err(StoreError::Duplicate(_))
        ));
        assert_eq!(store.board_count(), 1);
    }
}
