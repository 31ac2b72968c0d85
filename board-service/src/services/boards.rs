//! Board, list and card operations.
//!
//! Every write loads the parent, runs the ordering engine on its child
//! sequence and commits the resulting changes as one guarded batch. A version
//! conflict or store outage reruns the whole load/compute/commit cycle under
//! the retry policy.

use crate::{
    models::{Board, Card, List},
    services::{
        metrics::{record_compaction, record_conflict, record_write},
        ordering::{OrderError, OrderedChildren, Reorder},
        store::{Mutation, StoreError, VersionGuard, WriteBatch},
        EntityStore, ServiceError,
    },
};
use chrono::Utc;
use service_core::retry::{retry_async, RetryConfig};
use std::collections::HashMap;
use std::sync::Arc;

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 2000;

/// Title and description changes for a card. `None` leaves a field alone; an
/// empty description clears it.
#[derive(Debug, Clone, Default)]
pub struct CardPatch {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Clone)]
pub struct BoardService {
    store: Arc<dyn EntityStore>,
    retry: RetryConfig,
}

impl BoardService {
    pub fn new(store: Arc<dyn EntityStore>, retry: RetryConfig) -> Self {
        Self { store, retry }
    }

    // Boards

    pub async fn create_board(&self, owner_id: &str, title: &str) -> Result<Board, ServiceError> {
        let board = Board::new(owner_id.to_string(), normalize_title(title)?);
        let pending = &board;

        retry_async(&self.retry, "create_board", || self.try_insert_board(pending)).await?;

        record_write("create_board");
        tracing::info!(board_id = %board.id, user_id = %owner_id, "Board created");

        Ok(board)
    }

    /// Insert a new board. A duplicate id means an earlier attempt landed but
    /// its acknowledgement was lost, so the stored board counts as success.
    async fn try_insert_board(&self, board: &Board) -> Result<(), ServiceError> {
        match self.store.insert_board(board).await {
            Ok(()) => Ok(()),
            Err(StoreError::Duplicate(_)) => match self.store.find_board(&board.id).await? {
                Some(stored) if stored.owner == board.owner => {
                    tracing::warn!(board_id = %board.id, "Board already stored by an earlier attempt");
                    Ok(())
                }
                _ => Err(ServiceError::Internal(anyhow::anyhow!(
                    "Board id {} collides with an existing record",
                    board.id
                ))),
            },
            Err(err) => Err(err.into()),
        }
    }

    pub async fn list_boards(&self, user_id: &str) -> Result<Vec<Board>, ServiceError> {
        retry_async(&self.retry, "list_boards", || async move {
            self.store
                .find_boards_for_user(user_id)
                .await
                .map_err(ServiceError::from)
        })
        .await
    }

    pub async fn get_board(&self, user_id: &str, board_id: &str) -> Result<Board, ServiceError> {
        retry_async(&self.retry, "get_board", || async move {
            let board = self.load_board(board_id).await?;
            require_member(&board, user_id)?;
            Ok(board)
        })
        .await
    }

    pub async fn update_board(
        &self,
        user_id: &str,
        board_id: &str,
        title: &str,
    ) -> Result<Board, ServiceError> {
        let title = normalize_title(title)?;

        retry_async(&self.retry, "update_board", || {
            self.try_update_board(user_id, board_id, &title)
        })
        .await
    }

    async fn try_update_board(
        &self,
        user_id: &str,
        board_id: &str,
        title: &str,
    ) -> Result<Board, ServiceError> {
        let mut board = self.load_board(board_id).await?;
        require_owner(&board, user_id)?;

        let mut batch = WriteBatch::new();
        batch.push(Mutation::SetBoardTitle {
            id: board.id.clone(),
            title: title.to_string(),
        });
        self.commit("update_board", batch).await?;

        board.title = title.to_string();
        board.updated_at = Utc::now();
        tracing::info!(board_id = %board.id, "Board updated");

        Ok(board)
    }

    /// Delete a board together with all of its lists and their cards.
    pub async fn delete_board(&self, user_id: &str, board_id: &str) -> Result<(), ServiceError> {
        retry_async(&self.retry, "delete_board", || {
            self.try_delete_board(user_id, board_id)
        })
        .await
    }

    async fn try_delete_board(&self, user_id: &str, board_id: &str) -> Result<(), ServiceError> {
        let board = self.load_board(board_id).await?;
        require_owner(&board, user_id)?;

        let list_ids: Vec<String> = self
            .store
            .find_lists_in_board(board_id)
            .await?
            .into_iter()
            .map(|l| l.id)
            .collect();

        let mut batch = WriteBatch::guarded(VersionGuard::board(&board));
        batch
            .push(Mutation::DeleteCardsInLists {
                list_ids: list_ids.clone(),
            })
            .push(Mutation::DeleteListsInBoard {
                board_id: board.id.clone(),
            })
            .push(Mutation::DeleteBoard {
                id: board.id.clone(),
            });
        self.commit("delete_board", batch).await?;

        tracing::info!(board_id = %board.id, lists = list_ids.len(), "Board deleted");

        Ok(())
    }

    // Lists

    pub async fn list_lists(&self, user_id: &str, board_id: &str) -> Result<Vec<List>, ServiceError> {
        retry_async(&self.retry, "list_lists", || async move {
            let board = self.load_board(board_id).await?;
            require_member(&board, user_id)?;
            Ok(self.store.find_lists_in_board(board_id).await?)
        })
        .await
    }

    /// Create a list at `desired_index` (clamped; appended when `None`).
    pub async fn create_list(
        &self,
        user_id: &str,
        board_id: &str,
        title: &str,
        desired_index: Option<i64>,
    ) -> Result<List, ServiceError> {
        let title = normalize_title(title)?;

        retry_async(&self.retry, "create_list", || {
            self.try_create_list(user_id, board_id, &title, desired_index)
        })
        .await
    }

    async fn try_create_list(
        &self,
        user_id: &str,
        board_id: &str,
        title: &str,
        desired_index: Option<i64>,
    ) -> Result<List, ServiceError> {
        let board = self.load_board(board_id).await?;
        require_owner(&board, user_id)?;

        let (mut order, _) = self.board_order(&board).await?;
        let mut list = List::new(board.id.clone(), title.to_string(), 0);

        let reorder = order.insert(&list.id, desired_index.unwrap_or(i64::MAX))?;
        list.position = reorder.position_of(&list.id).unwrap_or(list.position);

        let mut batch = WriteBatch::guarded(VersionGuard::board(&board));
        batch.push(Mutation::InsertList(list.clone()));
        push_list_positions(&mut batch, &reorder, &list.id);
        batch.push(Mutation::SetBoardLists {
            id: board.id.clone(),
            lists: order.ids(),
        });
        self.commit("create_list", batch).await?;

        self.note_compaction("list", &board.id, &reorder);
        tracing::info!(
            board_id = %board.id,
            list_id = %list.id,
            position = list.position,
            "List created"
        );

        Ok(list)
    }

    pub async fn update_list(
        &self,
        user_id: &str,
        board_id: &str,
        list_id: &str,
        title: &str,
    ) -> Result<List, ServiceError> {
        let title = normalize_title(title)?;

        retry_async(&self.retry, "update_list", || {
            self.try_update_list(user_id, board_id, list_id, &title)
        })
        .await
    }

    async fn try_update_list(
        &self,
        user_id: &str,
        board_id: &str,
        list_id: &str,
        title: &str,
    ) -> Result<List, ServiceError> {
        let board = self.load_board(board_id).await?;
        require_owner(&board, user_id)?;
        let mut list = self.load_list_in(&board, list_id).await?;

        let mut batch = WriteBatch::new();
        batch.push(Mutation::SetListTitle {
            id: list.id.clone(),
            title: title.to_string(),
        });
        self.commit("update_list", batch).await?;

        list.title = title.to_string();
        list.updated_at = Utc::now();
        tracing::info!(board_id = %board.id, list_id = %list.id, "List updated");

        Ok(list)
    }

    /// Delete a list and every card in it.
    pub async fn delete_list(
        &self,
        user_id: &str,
        board_id: &str,
        list_id: &str,
    ) -> Result<(), ServiceError> {
        retry_async(&self.retry, "delete_list", || {
            self.try_delete_list(user_id, board_id, list_id)
        })
        .await
    }

    async fn try_delete_list(
        &self,
        user_id: &str,
        board_id: &str,
        list_id: &str,
    ) -> Result<(), ServiceError> {
        let board = self.load_board(board_id).await?;
        require_owner(&board, user_id)?;
        let list = self.load_list_in(&board, list_id).await?;

        let (mut order, _) = self.board_order(&board).await?;
        order.remove(&list.id)?;

        let mut batch = WriteBatch::guarded(VersionGuard::board(&board));
        batch
            .push(Mutation::DeleteCardsInLists {
                list_ids: vec![list.id.clone()],
            })
            .push(Mutation::DeleteList {
                id: list.id.clone(),
            })
            .push(Mutation::SetBoardLists {
                id: board.id.clone(),
                lists: order.ids(),
            });
        self.commit("delete_list", batch).await?;

        tracing::info!(board_id = %board.id, list_id = %list.id, "List deleted");

        Ok(())
    }

    /// Move a list to `to_index` and return the board's lists in their new
    /// order. Moving to the current index writes nothing.
    pub async fn move_list(
        &self,
        user_id: &str,
        board_id: &str,
        list_id: &str,
        to_index: i64,
        from_index: Option<i64>,
    ) -> Result<Vec<List>, ServiceError> {
        retry_async(&self.retry, "move_list", || {
            self.try_move_list(user_id, board_id, list_id, to_index, from_index)
        })
        .await
    }

    async fn try_move_list(
        &self,
        user_id: &str,
        board_id: &str,
        list_id: &str,
        to_index: i64,
        from_index: Option<i64>,
    ) -> Result<Vec<List>, ServiceError> {
        let board = self.load_board(board_id).await?;
        require_owner(&board, user_id)?;
        let list = self.load_list_in(&board, list_id).await?;

        let (mut order, lists) = self.board_order(&board).await?;
        let reorder = move_in(&mut order, &list.id, from_index, to_index)?;

        if reorder.is_noop() {
            return Ok(arrange(&order, lists, &reorder));
        }

        let mut batch = WriteBatch::guarded(VersionGuard::board(&board));
        push_list_positions(&mut batch, &reorder, "");
        batch.push(Mutation::SetBoardLists {
            id: board.id.clone(),
            lists: order.ids(),
        });
        self.commit("move_list", batch).await?;

        self.note_compaction("list", &board.id, &reorder);
        tracing::info!(
            board_id = %board.id,
            list_id = %list.id,
            to_index,
            repositioned = reorder.positions.len(),
            "List moved"
        );

        Ok(arrange(&order, lists, &reorder))
    }

    // Cards

    pub async fn list_cards(&self, user_id: &str, list_id: &str) -> Result<Vec<Card>, ServiceError> {
        retry_async(&self.retry, "list_cards", || async move {
            let list = self.load_list(list_id).await?;
            let board = self.load_board(&list.board).await?;
            require_member(&board, user_id)?;
            Ok(self.store.find_cards_in_list(list_id).await?)
        })
        .await
    }

    /// Create a card at `desired_index` (clamped; appended when `None`).
    pub async fn create_card(
        &self,
        user_id: &str,
        list_id: &str,
        title: &str,
        description: Option<String>,
        desired_index: Option<i64>,
    ) -> Result<Card, ServiceError> {
        let title = normalize_title(title)?;
        let description = normalize_description(description)?;

        retry_async(&self.retry, "create_card", || {
            self.try_create_card(user_id, list_id, &title, description.clone(), desired_index)
        })
        .await
    }

    async fn try_create_card(
        &self,
        user_id: &str,
        list_id: &str,
        title: &str,
        description: Option<String>,
        desired_index: Option<i64>,
    ) -> Result<Card, ServiceError> {
        let (list, _) = self.load_owned_list(user_id, list_id).await?;

        let (mut order, _) = self.list_order(&list).await?;
        let mut card = Card::new(list.id.clone(), title.to_string(), description, 0);

        let reorder = order.insert(&card.id, desired_index.unwrap_or(i64::MAX))?;
        card.position = reorder.position_of(&card.id).unwrap_or(card.position);

        let mut batch = WriteBatch::guarded(VersionGuard::list(&list));
        batch.push(Mutation::InsertCard(card.clone()));
        push_card_positions(&mut batch, &reorder, &card.id);
        batch.push(Mutation::SetListCards {
            id: list.id.clone(),
            cards: order.ids(),
        });
        self.commit("create_card", batch).await?;

        self.note_compaction("card", &list.id, &reorder);
        tracing::info!(
            list_id = %list.id,
            card_id = %card.id,
            position = card.position,
            "Card created"
        );

        Ok(card)
    }

    pub async fn update_card(
        &self,
        user_id: &str,
        list_id: &str,
        card_id: &str,
        patch: CardPatch,
    ) -> Result<Card, ServiceError> {
        if patch.title.is_none() && patch.description.is_none() {
            return Err(ServiceError::Validation(
                "Provide a title or a description".to_string(),
            ));
        }
        let title = patch.title.as_deref().map(normalize_title).transpose()?;
        let description = patch
            .description
            .map(|d| normalize_description(Some(d)))
            .transpose()?;

        retry_async(&self.retry, "update_card", || {
            self.try_update_card(user_id, list_id, card_id, title.clone(), description.clone())
        })
        .await
    }

    async fn try_update_card(
        &self,
        user_id: &str,
        list_id: &str,
        card_id: &str,
        title: Option<String>,
        description: Option<Option<String>>,
    ) -> Result<Card, ServiceError> {
        let (list, _) = self.load_owned_list(user_id, list_id).await?;
        let mut card = self.load_card_in(&list, card_id).await?;

        if let Some(title) = title {
            card.title = title;
        }
        if let Some(description) = description {
            card.description = description;
        }

        let mut batch = WriteBatch::new();
        batch.push(Mutation::SetCardFields {
            id: card.id.clone(),
            title: card.title.clone(),
            description: card.description.clone(),
        });
        self.commit("update_card", batch).await?;

        card.updated_at = Utc::now();
        tracing::info!(list_id = %list.id, card_id = %card.id, "Card updated");

        Ok(card)
    }

    pub async fn delete_card(
        &self,
        user_id: &str,
        list_id: &str,
        card_id: &str,
    ) -> Result<(), ServiceError> {
        retry_async(&self.retry, "delete_card", || {
            self.try_delete_card(user_id, list_id, card_id)
        })
        .await
    }

    async fn try_delete_card(
        &self,
        user_id: &str,
        list_id: &str,
        card_id: &str,
    ) -> Result<(), ServiceError> {
        let (list, _) = self.load_owned_list(user_id, list_id).await?;
        let card = self.load_card_in(&list, card_id).await?;

        let (mut order, _) = self.list_order(&list).await?;
        order.remove(&card.id)?;

        let mut batch = WriteBatch::guarded(VersionGuard::list(&list));
        batch
            .push(Mutation::DeleteCard {
                id: card.id.clone(),
            })
            .push(Mutation::SetListCards {
                id: list.id.clone(),
                cards: order.ids(),
            });
        self.commit("delete_card", batch).await?;

        tracing::info!(list_id = %list.id, card_id = %card.id, "Card deleted");

        Ok(())
    }

    /// Move a card within its list and return the list's cards in their new
    /// order. Moving to the current index writes nothing.
    pub async fn move_card(
        &self,
        user_id: &str,
        list_id: &str,
        card_id: &str,
        to_index: i64,
        from_index: Option<i64>,
    ) -> Result<Vec<Card>, ServiceError> {
        retry_async(&self.retry, "move_card", || {
            self.try_move_card(user_id, list_id, card_id, to_index, from_index)
        })
        .await
    }

    async fn try_move_card(
        &self,
        user_id: &str,
        list_id: &str,
        card_id: &str,
        to_index: i64,
        from_index: Option<i64>,
    ) -> Result<Vec<Card>, ServiceError> {
        let (list, _) = self.load_owned_list(user_id, list_id).await?;
        let card = self.load_card_in(&list, card_id).await?;

        let (mut order, cards) = self.list_order(&list).await?;
        let reorder = move_in(&mut order, &card.id, from_index, to_index)?;

        if reorder.is_noop() {
            return Ok(arrange(&order, cards, &reorder));
        }

        let mut batch = WriteBatch::guarded(VersionGuard::list(&list));
        push_card_positions(&mut batch, &reorder, "");
        batch.push(Mutation::SetListCards {
            id: list.id.clone(),
            cards: order.ids(),
        });
        self.commit("move_card", batch).await?;

        self.note_compaction("card", &list.id, &reorder);
        tracing::info!(
            list_id = %list.id,
            card_id = %card.id,
            to_index,
            repositioned = reorder.positions.len(),
            "Card moved"
        );

        Ok(arrange(&order, cards, &reorder))
    }

    // Loading and committing

    async fn load_board(&self, board_id: &str) -> Result<Board, ServiceError> {
        self.store
            .find_board(board_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Board {}", board_id)))
    }

    async fn load_list(&self, list_id: &str) -> Result<List, ServiceError> {
        self.store
            .find_list(list_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("List {}", list_id)))
    }

    async fn load_list_in(&self, board: &Board, list_id: &str) -> Result<List, ServiceError> {
        let list = self.load_list(list_id).await?;
        if list.board != board.id {
            return Err(ServiceError::ReferentialIntegrity(format!(
                "List {} does not belong to board {}",
                list_id, board.id
            )));
        }
        Ok(list)
    }

    /// Resolve a list through its board and check the caller owns that board.
    async fn load_owned_list(
        &self,
        user_id: &str,
        list_id: &str,
    ) -> Result<(List, Board), ServiceError> {
        let list = self.load_list(list_id).await?;
        let board = self.load_board(&list.board).await?;
        require_owner(&board, user_id)?;
        Ok((list, board))
    }

    async fn load_card_in(&self, list: &List, card_id: &str) -> Result<Card, ServiceError> {
        let card = self
            .store
            .find_card(card_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Card {}", card_id)))?;
        if card.list != list.id {
            return Err(ServiceError::ReferentialIntegrity(format!(
                "Card {} does not belong to list {}",
                card_id, list.id
            )));
        }
        Ok(card)
    }

    async fn board_order(
        &self,
        board: &Board,
    ) -> Result<(OrderedChildren, Vec<List>), ServiceError> {
        let lists = self.store.find_lists_in_board(&board.id).await?;
        let order = OrderedChildren::from_sequence(
            board.id.clone(),
            &board.lists,
            lists.iter().map(|l| (l.id.clone(), l.position)),
        )?;
        Ok((order, lists))
    }

    async fn list_order(&self, list: &List) -> Result<(OrderedChildren, Vec<Card>), ServiceError> {
        let cards = self.store.find_cards_in_list(&list.id).await?;
        let order = OrderedChildren::from_sequence(
            list.id.clone(),
            &list.cards,
            cards.iter().map(|c| (c.id.clone(), c.position)),
        )?;
        Ok((order, cards))
    }

    async fn commit(&self, op: &'static str, batch: WriteBatch) -> Result<(), ServiceError> {
        match self.store.commit(batch).await {
            Ok(()) => {
                record_write(op);
                Ok(())
            }
            Err(StoreError::Conflict) => {
                record_conflict(op);
                tracing::warn!(op, "Version conflict on commit");
                Err(ServiceError::ConcurrencyConflict)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn note_compaction(&self, kind: &'static str, parent_id: &str, reorder: &Reorder) {
        if reorder.compacted {
            record_compaction(kind);
            tracing::info!(kind, parent_id = %parent_id, "Renumbered sibling positions");
        }
    }
}

fn normalize_title(raw: &str) -> Result<String, ServiceError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(ServiceError::Validation("Title is required".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ServiceError::Validation(format!(
            "Title must be at most {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(title.to_string())
}

fn normalize_description(raw: Option<String>) -> Result<Option<String>, ServiceError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let description = raw.trim();
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ServiceError::Validation(format!(
            "Description must be at most {} characters",
            MAX_DESCRIPTION_LEN
        )));
    }
    Ok((!description.is_empty()).then(|| description.to_string()))
}

fn require_owner(board: &Board, user_id: &str) -> Result<(), ServiceError> {
    if board.is_owner(user_id) {
        Ok(())
    } else {
        Err(ServiceError::PermissionDenied(format!(
            "Only the owner can modify board {}",
            board.id
        )))
    }
}

fn require_member(board: &Board, user_id: &str) -> Result<(), ServiceError> {
    if board.is_member(user_id) {
        Ok(())
    } else {
        Err(ServiceError::PermissionDenied(format!(
            "No access to board {}",
            board.id
        )))
    }
}

/// Run a move on `order`, defaulting `from_index` to the child's current slot.
fn move_in(
    order: &mut OrderedChildren,
    child_id: &str,
    from_index: Option<i64>,
    to_index: i64,
) -> Result<Reorder, ServiceError> {
    let len = order.len();
    let to_slot = |index: i64| {
        usize::try_from(index).map_err(|_| OrderError::IndexOutOfRange { index, len })
    };

    let to = to_slot(to_index)?;
    let from = match from_index {
        Some(index) => to_slot(index)?,
        None => order.index_of(child_id).ok_or_else(|| OrderError::NotAChild {
            parent: order.parent_id().to_string(),
            child: child_id.to_string(),
        })?,
    };

    Ok(order.move_child(child_id, from, to)?)
}

/// Sibling records that can carry a position.
trait Positioned {
    fn id(&self) -> &str;
    fn set_position(&mut self, position: i64);
}

impl Positioned for List {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_position(&mut self, position: i64) {
        self.position = position;
    }
}

impl Positioned for Card {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_position(&mut self, position: i64) {
        self.position = position;
    }
}

/// Put `records` in `order`'s sequence with the positions from `reorder`.
/// Records outside the sequence are dropped.
fn arrange<T: Positioned>(order: &OrderedChildren, records: Vec<T>, reorder: &Reorder) -> Vec<T> {
    let mut by_id: HashMap<String, T> = records
        .into_iter()
        .map(|r| (r.id().to_string(), r))
        .collect();

    order
        .ids()
        .into_iter()
        .filter_map(|id| {
            let mut record = by_id.remove(&id)?;
            if let Some(position) = reorder.position_of(&id) {
                record.set_position(position);
            }
            Some(record)
        })
        .collect()
}

/// Reposition existing lists; `skip` is a freshly inserted list whose
/// position is already in its insert.
fn push_list_positions(batch: &mut WriteBatch, reorder: &Reorder, skip: &str) {
    for (id, position) in &reorder.positions {
        if id != skip {
            batch.push(Mutation::SetListPosition {
                id: id.clone(),
                position: *position,
            });
        }
    }
}

fn push_card_positions(batch: &mut WriteBatch, reorder: &Reorder, skip: &str) {
    for (id, position) in &reorder.positions {
        if id != skip {
            batch.push(Mutation::SetCardPosition {
                id: id.clone(),
                position: *position,
            });
        }
    }
}
