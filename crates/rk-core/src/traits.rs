//! # Core Traits (Ports)
//!
//! Any storage plugin must implement these traits to be used by the binary.
//! Every mutating operation runs inside exactly one [`UnitOfWork`]; nothing
//! here holds an ambient connection.

use crate::error::Result;
use crate::models::{Board, Card, ItemKind, List, Placement};
use async_trait::async_trait;
use uuid::Uuid;

/// Inclusive range of positions inside one container.
/// `to: None` means "up to the end of the container".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionRange {
    pub from: i64,
    pub to: Option<i64>,
}

impl PositionRange {
    /// `[from, to]`
    pub fn between(from: i64, to: i64) -> Self {
        Self { from, to: Some(to) }
    }

    /// `[from, ∞)`
    pub fn starting_at(from: i64) -> Self {
        Self { from, to: None }
    }

    pub fn contains(&self, position: i64) -> bool {
        position >= self.from && self.to.map_or(true, |to| position <= to)
    }
}

/// Entry point to the store. Hands out transactions and serves the few reads
/// that span every board.
#[async_trait]
pub trait BoardRepo: Send + Sync {
    /// Opens a transaction. Dropping the returned handle without calling
    /// [`UnitOfWork::commit`] rolls everything back.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;

    /// All boards, oldest first.
    async fn list_boards(&self) -> Result<Vec<Board>>;
}

/// One transaction against the store.
///
/// Reads of current positions, bulk shifts and point updates issued through
/// the same handle are isolated from concurrent transactions. When the store
/// detects a conflicting writer the call fails with `AppError::Conflict`.
#[async_trait]
pub trait UnitOfWork: Send {
    // Placement operations, shared by cards and lists

    async fn find_placement(&mut self, kind: ItemKind, id: Uuid) -> Result<Option<Placement>>;
    async fn container_exists(&mut self, kind: ItemKind, container_id: Uuid) -> Result<bool>;
    async fn count_children(&mut self, kind: ItemKind, container_id: Uuid) -> Result<i64>;

    /// Children of a container ordered by position, ties by creation time.
    async fn list_children(&mut self, kind: ItemKind, container_id: Uuid) -> Result<Vec<Placement>>;

    /// Adds `delta` to the position of every child of `container_id` whose
    /// position lies in `range`. Returns the number of rows touched.
    async fn shift_positions(
        &mut self,
        kind: ItemKind,
        container_id: Uuid,
        range: PositionRange,
        delta: i64,
    ) -> Result<u64>;

    /// Point update of one item's position, optionally re-parenting it.
    async fn update_placement(
        &mut self,
        kind: ItemKind,
        id: Uuid,
        container_id: Option<Uuid>,
        position: i64,
    ) -> Result<()>;

    /// Removes a card, or a list together with all of its cards.
    async fn delete_item(&mut self, kind: ItemKind, id: Uuid) -> Result<()>;

    // Entity operations

    async fn insert_board(&mut self, board: &Board) -> Result<()>;
    async fn insert_list(&mut self, list: &List) -> Result<()>;
    async fn insert_card(&mut self, card: &Card) -> Result<()>;

    async fn get_board(&mut self, id: Uuid) -> Result<Option<Board>>;
    async fn get_list(&mut self, id: Uuid) -> Result<Option<List>>;
    async fn get_card(&mut self, id: Uuid) -> Result<Option<Card>>;

    async fn lists_for_board(&mut self, board_id: Uuid) -> Result<Vec<List>>;
    async fn cards_for_list(&mut self, list_id: Uuid) -> Result<Vec<Card>>;

    async fn update_card_details(
        &mut self,
        id: Uuid,
        title: &str,
        description: Option<&str>,
    ) -> Result<()>;
    async fn rename_list(&mut self, id: Uuid, title: &str) -> Result<()>;

    /// Removes a board, its lists and their cards.
    async fn delete_board(&mut self, id: Uuid) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::PositionRange;

    #[test]
    fn test_range_bounds_are_inclusive() {
        let range = PositionRange::between(1, 3);
        assert!(!range.contains(0));
        assert!(range.contains(1));
        assert!(range.contains(3));
        assert!(!range.contains(4));
    }

    #[test]
    fn test_open_range_has_no_upper_bound() {
        let range = PositionRange::starting_at(2);
        assert!(!range.contains(1));
        assert!(range.contains(2));
        assert!(range.contains(i64::MAX));
    }
}
