//! Shared fixtures for the integration tests: an in-memory SQLite store, a
//! service wired to it, and helpers to seed and inspect containers.

use rk_core::{BoardRepo, BoardService, Card, ItemKind, List, NewCard, NewList};
use rk_db_sqlite::SqliteBoardRepo;
use std::sync::Arc;
use uuid::Uuid;

pub struct Harness {
    pub repo: Arc<SqliteBoardRepo>,
    pub service: BoardService,
}

impl Harness {
    pub async fn in_memory() -> Self {
        Self::connect("sqlite::memory:").await
    }

    pub async fn connect(url: &str) -> Self {
        let repo = Arc::new(SqliteBoardRepo::new(url).await.expect("open sqlite store"));
        let service = BoardService::new(repo.clone());
        Self { repo, service }
    }

    pub async fn board(&self) -> Uuid {
        self.service.create_board("Test Board").await.expect("create board").id
    }

    /// Creates a list on `board_id` holding one card per title, in order.
    pub async fn list_with_cards(&self, board_id: Uuid, titles: &[&str]) -> (List, Vec<Card>) {
        let list = self
            .service
            .create_list(board_id, NewList { title: "List".into(), position: None })
            .await
            .expect("create list");
        let mut cards = Vec::new();
        for title in titles {
            let card = self
                .service
                .create_card(list.id, NewCard { title: (*title).into(), ..Default::default() })
                .await
                .expect("create card");
            cards.push(card);
        }
        (list, cards)
    }

    /// Card titles of a list in position order.
    pub async fn titles(&self, list_id: Uuid) -> Vec<String> {
        self.service
            .cards(list_id)
            .await
            .expect("read cards")
            .into_iter()
            .map(|c| c.title)
            .collect()
    }

    /// Raw `(title, position)` pairs, to check exact numbering.
    pub async fn positions(&self, list_id: Uuid) -> Vec<(String, i64)> {
        self.service
            .cards(list_id)
            .await
            .expect("read cards")
            .into_iter()
            .map(|c| (c.title, c.position))
            .collect()
    }

    /// Asserts the density invariant for one container.
    pub async fn assert_dense(&self, kind: ItemKind, container_id: Uuid) {
        self.service
            .audit(kind, container_id)
            .await
            .unwrap_or_else(|e| panic!("{kind} container {container_id} not dense: {e}"));
    }

    /// Opens a gap by bumping every child at or after `from`, bypassing the
    /// reindexer, the way older code left stores behind.
    pub async fn punch_gap(&self, kind: ItemKind, container_id: Uuid, from: i64) {
        let mut uow = self.repo.begin().await.expect("begin");
        uow.shift_positions(kind, container_id, rk_core::PositionRange::starting_at(from), 1)
            .await
            .expect("shift");
        uow.commit().await.expect("commit");
    }
}

/// `[("A", 0), ("B", 1)]` as owned pairs, for comparing against [`Harness::positions`].
pub fn pairs(expected: &[(&str, i64)]) -> Vec<(String, i64)> {
    expected.iter().map(|(title, position)| (title.to_string(), *position)).collect()
}
