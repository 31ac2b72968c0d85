//! Ordering engine for sibling collections (lists in a board, cards in a list).
//!
//! Children are held in display order together with their `position` keys.
//! Positions only need to be strictly increasing along that order; gaps are
//! fine. Moves try to touch only the moved child by taking the midpoint of its
//! new neighbours, and fall back to a dense `0..n` renumber when no integer
//! fits between them.
//!
//! The engine is pure: every operation mutates the in-memory collection and
//! reports the position and sequence changes as a [`Reorder`], which the
//! service layer turns into one atomic store commit.

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sibling {
    pub id: String,
    pub position: i64,
}

impl Sibling {
    pub fn new(id: impl Into<String>, position: i64) -> Self {
        Self {
            id: id.into(),
            position,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("Index {index} is out of range for {len} children")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("{child} does not belong to {parent}")]
    NotAChild { parent: String, child: String },

    #[error("{child} is already in {parent}")]
    AlreadyPresent { parent: String, child: String },

    #[error("{parent} references missing child {child}")]
    DanglingChild { parent: String, child: String },

    #[error("{child} is at index {actual}, not {expected}")]
    StaleIndex {
        child: String,
        expected: usize,
        actual: usize,
    },
}

/// Changes produced by one engine operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reorder {
    /// Every child whose position changed, with its new position. A newly
    /// inserted child is always included.
    pub positions: Vec<(String, i64)>,
    /// Whether the parent's id sequence changed.
    pub sequence_changed: bool,
    /// Whether the operation had to densely renumber the whole collection.
    pub compacted: bool,
}

impl Reorder {
    pub fn is_noop(&self) -> bool {
        self.positions.is_empty() && !self.sequence_changed
    }

    /// New position assigned to `id`, if it changed.
    pub fn position_of(&self, id: &str) -> Option<i64> {
        self.positions
            .iter()
            .find(|(child, _)| child == id)
            .map(|(_, position)| *position)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedChildren {
    parent_id: String,
    children: Vec<Sibling>,
}

impl OrderedChildren {
    pub fn new(parent_id: impl Into<String>, children: Vec<Sibling>) -> Self {
        Self {
            parent_id: parent_id.into(),
            children,
        }
    }

    /// Build the collection from the parent's id sequence and the positions of
    /// the child records that point at it. Records missing from the sequence
    /// are not members and are ignored; sequence entries without a record are
    /// a referential break.
    pub fn from_sequence<I>(
        parent_id: impl Into<String>,
        sequence: &[String],
        records: I,
    ) -> Result<Self, OrderError>
    where
        I: IntoIterator<Item = (String, i64)>,
    {
        let parent_id = parent_id.into();
        let positions: HashMap<String, i64> = records.into_iter().collect();

        let children = sequence
            .iter()
            .map(|id| {
                positions
                    .get(id)
                    .map(|position| Sibling::new(id.clone(), *position))
                    .ok_or_else(|| OrderError::DanglingChild {
                        parent: parent_id.clone(),
                        child: id.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            parent_id,
            children,
        })
    }

    pub fn parent_id(&self) -> &str {
        &self.parent_id
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn children(&self) -> &[Sibling] {
        &self.children
    }

    pub fn ids(&self) -> Vec<String> {
        self.children.iter().map(|c| c.id.clone()).collect()
    }

    pub fn index_of(&self, child_id: &str) -> Option<usize> {
        self.children.iter().position(|c| c.id == child_id)
    }

    /// Positions strictly increase along the sequence.
    pub fn is_consistent(&self) -> bool {
        self.children
            .windows(2)
            .all(|pair| pair[0].position < pair[1].position)
    }

    /// Insert `child_id` so it lands at `desired_index`, clamped to `[0, len]`.
    ///
    /// Siblings after the slot are shifted up only as far as needed to keep
    /// positions unique.
    pub fn insert(&mut self, child_id: &str, desired_index: i64) -> Result<Reorder, OrderError> {
        if self.index_of(child_id).is_some() {
            return Err(OrderError::AlreadyPresent {
                parent: self.parent_id.clone(),
                child: child_id.to_string(),
            });
        }

        let before = self.snapshot();
        let index = desired_index.clamp(0, self.len() as i64) as usize;

        let position = if self.is_empty() {
            Some(0)
        } else if index == 0 {
            self.children[0].position.checked_sub(1)
        } else if index == self.len() {
            self.children[index - 1].position.checked_add(1)
        } else {
            midpoint(self.children[index - 1].position, self.children[index].position)
        };

        let mut compacted = false;
        match position {
            Some(position) => self.children.insert(index, Sibling::new(child_id, position)),
            None if index > 0 && index < self.len() => {
                match self.children[index - 1].position.checked_add(1) {
                    Some(position) => {
                        self.children.insert(index, Sibling::new(child_id, position));
                        if !self.shift_after(index) {
                            self.renumber();
                            compacted = true;
                        }
                    }
                    None => {
                        self.children.insert(index, Sibling::new(child_id, 0));
                        self.renumber();
                        compacted = true;
                    }
                }
            }
            None => {
                self.children.insert(index, Sibling::new(child_id, 0));
                self.renumber();
                compacted = true;
            }
        }

        Ok(self.finish(&before, true, compacted))
    }

    /// Drop `child_id` from the sequence. Remaining positions are left as-is.
    pub fn remove(&mut self, child_id: &str) -> Result<Reorder, OrderError> {
        let index = self.require_index(child_id)?;
        self.children.remove(index);

        Ok(Reorder {
            positions: Vec::new(),
            sequence_changed: true,
            compacted: false,
        })
    }

    /// Relocate `child_id` from `from_index` to `to_index`.
    ///
    /// Only the moved child gets a new position unless its new neighbours
    /// leave no integer between them, in which case the whole collection is
    /// renumbered densely.
    pub fn move_child(
        &mut self,
        child_id: &str,
        from_index: usize,
        to_index: usize,
    ) -> Result<Reorder, OrderError> {
        let current = self.require_index(child_id)?;
        let len = self.len();

        for index in [from_index, to_index] {
            if index >= len {
                return Err(OrderError::IndexOutOfRange {
                    index: index as i64,
                    len,
                });
            }
        }

        if from_index != current {
            return Err(OrderError::StaleIndex {
                child: child_id.to_string(),
                expected: from_index,
                actual: current,
            });
        }

        if from_index == to_index {
            return Ok(Reorder::default());
        }

        let before = self.snapshot();
        let mut moved = self.children.remove(current);

        let prev = to_index
            .checked_sub(1)
            .map(|i| self.children[i].position);
        let next = self.children.get(to_index).map(|c| c.position);

        let position = match (prev, next) {
            (Some(prev), Some(next)) => midpoint(prev, next),
            (None, Some(next)) => next.checked_sub(1),
            (Some(prev), None) => prev.checked_add(1),
            (None, None) => Some(moved.position),
        };

        let compacted = match position {
            Some(position) => {
                moved.position = position;
                self.children.insert(to_index, moved);
                false
            }
            None => {
                self.children.insert(to_index, moved);
                self.renumber();
                true
            }
        };

        Ok(self.finish(&before, true, compacted))
    }

    /// Densely renumber all children `0..n` in their current order.
    pub fn reindex_all(&mut self) -> Reorder {
        let before = self.snapshot();
        self.renumber();
        self.finish(&before, false, true)
    }

    fn require_index(&self, child_id: &str) -> Result<usize, OrderError> {
        self.index_of(child_id).ok_or_else(|| OrderError::NotAChild {
            parent: self.parent_id.clone(),
            child: child_id.to_string(),
        })
    }

    fn snapshot(&self) -> HashMap<String, i64> {
        self.children
            .iter()
            .map(|c| (c.id.clone(), c.position))
            .collect()
    }

    fn renumber(&mut self) {
        for (i, child) in self.children.iter_mut().enumerate() {
            child.position = i as i64;
        }
    }

    /// Bump siblings after `index` until positions increase again. Returns
    /// false if a position would overflow.
    fn shift_after(&mut self, index: usize) -> bool {
        for i in index + 1..self.children.len() {
            let floor = self.children[i - 1].position;
            if self.children[i].position > floor {
                break;
            }
            match floor.checked_add(1) {
                Some(position) => self.children[i].position = position,
                None => return false,
            }
        }
        true
    }

    /// Collect changed positions relative to `before`. Stored data may already
    /// contain ties; those are compacted here so no operation ever leaves one.
    fn finish(
        &mut self,
        before: &HashMap<String, i64>,
        sequence_changed: bool,
        mut compacted: bool,
    ) -> Reorder {
        if !self.is_consistent() {
            self.renumber();
            compacted = true;
        }

        let positions = self
            .children
            .iter()
            .filter(|c| before.get(&c.id) != Some(&c.position))
            .map(|c| (c.id.clone(), c.position))
            .collect();

        Reorder {
            positions,
            sequence_changed,
            compacted,
        }
    }
}

/// Integer strictly between `low` and `high`, if one exists.
fn midpoint(low: i64, high: i64) -> Option<i64> {
    let gap = high.checked_sub(low)?;
    if gap >= 2 {
        Some(low + gap / 2)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dense(ids: &[&str]) -> OrderedChildren {
        OrderedChildren::new(
            "parent",
            ids.iter()
                .enumerate()
                .map(|(i, id)| Sibling::new(*id, i as i64))
                .collect(),
        )
    }

    fn order(children: &OrderedChildren) -> Vec<&str> {
        children.children().iter().map(|c| c.id.as_str()).collect()
    }

    fn sorted_by_position(children: &OrderedChildren) -> Vec<String> {
        let mut sorted = children.children().to_vec();
        sorted.sort_by_key(|c| c.position);
        sorted.into_iter().map(|c| c.id).collect()
    }

    #[test]
    fn move_to_front_only_touches_moved_child() {
        let mut lists = dense(&["l1", "l2", "l3"]);

        let reorder = lists.move_child("l3", 2, 0).unwrap();

        assert_eq!(order(&lists), vec!["l3", "l1", "l2"]);
        assert_eq!(reorder.positions.len(), 1);
        let l3 = reorder.position_of("l3").unwrap();
        assert!(l3 < 0);
        assert_eq!(lists.children()[1].position, 0);
        assert_eq!(lists.children()[2].position, 1);
        assert!(!reorder.compacted);
    }

    #[test]
    fn move_to_end_appends_after_last() {
        let mut lists = dense(&["a", "b", "c"]);

        let reorder = lists.move_child("a", 0, 2).unwrap();

        assert_eq!(order(&lists), vec!["b", "c", "a"]);
        assert_eq!(reorder.positions, vec![("a".to_string(), 3)]);
    }

    #[test]
    fn move_uses_midpoint_when_gap_allows() {
        let mut cards = OrderedChildren::new(
            "list",
            vec![
                Sibling::new("a", 0),
                Sibling::new("b", 10),
                Sibling::new("c", 20),
            ],
        );

        let reorder = cards.move_child("c", 2, 1).unwrap();

        assert_eq!(order(&cards), vec!["a", "c", "b"]);
        assert_eq!(reorder.positions, vec![("c".to_string(), 5)]);
        assert!(!reorder.compacted);
    }

    #[test]
    fn move_without_gap_compacts_densely() {
        let mut cards = dense(&["a", "b", "c", "d"]);

        let reorder = cards.move_child("d", 3, 1).unwrap();

        assert_eq!(order(&cards), vec!["a", "d", "b", "c"]);
        assert!(reorder.compacted);
        let positions: Vec<i64> = cards.children().iter().map(|c| c.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3]);
        // "a" kept position 0 so it is not reported
        assert!(reorder.position_of("a").is_none());
    }

    #[test]
    fn move_to_same_index_is_noop() {
        let mut cards = dense(&["a", "b"]);
        let before = cards.clone();

        let reorder = cards.move_child("b", 1, 1).unwrap();

        assert!(reorder.is_noop());
        assert_eq!(cards, before);
    }

    #[test]
    fn move_rejects_out_of_range_index() {
        let mut cards = dense(&["a", "b"]);

        let err = cards.move_child("a", 0, 2).unwrap_err();

        assert_eq!(err, OrderError::IndexOutOfRange { index: 2, len: 2 });
    }

    #[test]
    fn move_rejects_foreign_child() {
        let mut cards = dense(&["a", "b"]);

        let err = cards.move_child("z", 0, 1).unwrap_err();

        assert!(matches!(err, OrderError::NotAChild { .. }));
    }

    #[test]
    fn move_rejects_stale_from_index() {
        let mut cards = dense(&["a", "b", "c"]);

        let err = cards.move_child("c", 0, 1).unwrap_err();

        assert_eq!(
            err,
            OrderError::StaleIndex {
                child: "c".to_string(),
                expected: 0,
                actual: 2
            }
        );
    }

    #[test]
    fn insert_between_dense_siblings_shifts_followers() {
        let mut cards = dense(&["c1", "c2"]);

        let reorder = cards.insert("c3", 1).unwrap();

        assert_eq!(order(&cards), vec!["c1", "c3", "c2"]);
        assert_eq!(reorder.position_of("c3"), Some(1));
        assert_eq!(reorder.position_of("c2"), Some(2));
        assert!(reorder.position_of("c1").is_none());
        assert!(reorder.sequence_changed);
    }

    #[test]
    fn insert_shift_stops_at_first_gap() {
        let mut cards = OrderedChildren::new(
            "list",
            vec![
                Sibling::new("a", 0),
                Sibling::new("b", 1),
                Sibling::new("c", 9),
            ],
        );

        let reorder = cards.insert("x", 1).unwrap();

        assert_eq!(order(&cards), vec!["a", "x", "b", "c"]);
        assert_eq!(reorder.position_of("x"), Some(1));
        assert_eq!(reorder.position_of("b"), Some(2));
        assert!(reorder.position_of("c").is_none());
    }

    #[test]
    fn insert_after_maximal_position_renumbers() {
        let mut cards = OrderedChildren::new(
            "list",
            vec![Sibling::new("a", i64::MAX), Sibling::new("b", 0)],
        );

        let reorder = cards.insert("x", 1).unwrap();

        assert_eq!(order(&cards), vec!["a", "x", "b"]);
        assert!(cards.is_consistent());
        assert!(reorder.compacted);
    }

    #[test]
    fn insert_clamps_index() {
        let mut cards = dense(&["a", "b"]);

        cards.insert("end", 99).unwrap();
        cards.insert("start", -5).unwrap();

        assert_eq!(order(&cards), vec!["start", "a", "b", "end"]);
        assert!(cards.is_consistent());
    }

    #[test]
    fn insert_into_empty_starts_at_zero() {
        let mut cards = OrderedChildren::new("list", Vec::new());

        let reorder = cards.insert("a", 0).unwrap();

        assert_eq!(reorder.positions, vec![("a".to_string(), 0)]);
    }

    #[test]
    fn insert_rejects_duplicate_child() {
        let mut cards = dense(&["a"]);

        let err = cards.insert("a", 0).unwrap_err();

        assert!(matches!(err, OrderError::AlreadyPresent { .. }));
    }

    #[test]
    fn insert_then_remove_restores_order() {
        let mut cards = dense(&["a", "b", "c"]);
        let original = cards.ids();

        cards.insert("x", 1).unwrap();
        let reorder = cards.remove("x").unwrap();

        assert_eq!(cards.ids(), original);
        assert!(reorder.positions.is_empty());
    }

    #[test]
    fn remove_leaves_gaps() {
        let mut cards = dense(&["a", "b", "c"]);

        cards.remove("b").unwrap();

        let positions: Vec<i64> = cards.children().iter().map(|c| c.position).collect();
        assert_eq!(positions, vec![0, 2]);
    }

    #[test]
    fn remove_rejects_foreign_child() {
        let mut cards = dense(&["a"]);

        assert!(matches!(
            cards.remove("b"),
            Err(OrderError::NotAChild { .. })
        ));
    }

    #[test]
    fn position_overflow_falls_back_to_renumber() {
        let mut cards = OrderedChildren::new(
            "list",
            vec![Sibling::new("a", i64::MIN), Sibling::new("b", 0)],
        );

        let reorder = cards.move_child("b", 1, 0).unwrap();

        assert!(reorder.compacted);
        assert_eq!(order(&cards), vec!["b", "a"]);
        assert!(cards.is_consistent());
    }

    #[test]
    fn ties_in_stored_data_are_compacted() {
        let mut cards = OrderedChildren::new(
            "list",
            vec![
                Sibling::new("a", 0),
                Sibling::new("b", 0),
                Sibling::new("c", 0),
            ],
        );

        let reorder = cards.insert("d", 3).unwrap();

        assert!(reorder.compacted);
        assert!(cards.is_consistent());
        assert_eq!(order(&cards), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn reindex_all_is_dense() {
        let mut cards = OrderedChildren::new(
            "list",
            vec![Sibling::new("a", -4), Sibling::new("b", 7)],
        );

        let reorder = cards.reindex_all();

        assert_eq!(
            reorder.positions,
            vec![("a".to_string(), 0), ("b".to_string(), 1)]
        );
        assert!(!reorder.sequence_changed);
    }

    #[test]
    fn from_sequence_detects_dangling_ids() {
        let err = OrderedChildren::from_sequence(
            "board",
            &["l1".to_string(), "l2".to_string()],
            vec![("l1".to_string(), 0)],
        )
        .unwrap_err();

        assert!(matches!(err, OrderError::DanglingChild { .. }));
    }

    #[test]
    fn order_matches_positions_after_mixed_operations() {
        // Deterministic pseudo-random walk over inserts, moves and removes.
        let mut seed: u64 = 0x5eed;
        let mut next = move |bound: usize| {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((seed >> 33) as usize) % bound.max(1)
        };

        let mut cards = OrderedChildren::new("list", Vec::new());
        let mut counter = 0;

        for _ in 0..500 {
            match next(3) {
                0 => {
                    counter += 1;
                    let index = next(cards.len() + 3) as i64 - 1;
                    cards.insert(&format!("c{}", counter), index).unwrap();
                }
                1 if !cards.is_empty() => {
                    let from = next(cards.len());
                    let to = next(cards.len());
                    let id = cards.children()[from].id.clone();
                    cards.move_child(&id, from, to).unwrap();
                }
                2 if !cards.is_empty() => {
                    let id = cards.children()[next(cards.len())].id.clone();
                    cards.remove(&id).unwrap();
                }
                _ => {}
            }

            assert!(cards.is_consistent());
            assert_eq!(sorted_by_position(&cards), cards.ids());
        }
    }
}
