//! # Board Service
//!
//! Orchestrates one transaction per operation: begin, reindex, write, commit.
//! This is the surface the binary (or any other front end) talks to.

use crate::error::{AppError, Result};
use crate::models::{Board, BoardView, Card, ItemKind, List, ListView, NewCard, NewList, Placement};
use crate::reindex;
use crate::traits::{BoardRepo, UnitOfWork};
use chrono::Utc;
use log::{info, warn};
use std::sync::Arc;
use uuid::Uuid;

pub struct BoardService {
    repo: Arc<dyn BoardRepo>,
}

fn check_title(title: &str) -> Result<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(AppError::ValidationError("title must not be empty".into()));
    }
    Ok(trimmed.to_string())
}

/// Logs store conflicts on the way out so retries are visible in the logs.
fn note_conflict<T>(operation: &str, result: Result<T>) -> Result<T> {
    if let Err(AppError::Conflict(reason)) = &result {
        warn!("{operation} aborted by a concurrent writer: {reason}");
    }
    result
}

impl BoardService {
    pub fn new(repo: Arc<dyn BoardRepo>) -> Self {
        Self { repo }
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        self.repo.begin().await
    }

    // ── Boards ──────────────────────────────────────────────────────────────

    pub async fn create_board(&self, title: &str) -> Result<Board> {
        let board = Board { id: Uuid::now_v7(), title: check_title(title)?, created_at: Utc::now() };
        let mut uow = self.begin().await?;
        uow.insert_board(&board).await?;
        uow.commit().await?;
        info!("created board {} ({})", board.id, board.title);
        Ok(board)
    }

    pub async fn list_boards(&self) -> Result<Vec<Board>> {
        self.repo.list_boards().await
    }

    /// The board with its lists and their cards, each sorted by position.
    pub async fn board_view(&self, board_id: Uuid) -> Result<BoardView> {
        let mut uow = self.begin().await?;
        let board = uow
            .get_board(board_id)
            .await?
            .ok_or_else(|| AppError::not_found("Board", board_id))?;

        let mut lists = Vec::new();
        for list in uow.lists_for_board(board_id).await? {
            let cards = uow.cards_for_list(list.id).await?;
            lists.push(ListView { list, cards });
        }
        Ok(BoardView { board, lists })
    }

    pub async fn delete_board(&self, board_id: Uuid) -> Result<()> {
        let result = async {
            let mut uow = self.begin().await?;
            if uow.get_board(board_id).await?.is_none() {
                return Err(AppError::not_found("Board", board_id));
            }
            uow.delete_board(board_id).await?;
            uow.commit().await
        }
        .await;
        note_conflict("delete board", result)?;
        info!("deleted board {board_id}");
        Ok(())
    }

    // ── Lists ───────────────────────────────────────────────────────────────

    pub async fn lists(&self, board_id: Uuid) -> Result<Vec<List>> {
        let mut uow = self.begin().await?;
        if uow.get_board(board_id).await?.is_none() {
            return Err(AppError::not_found("Board", board_id));
        }
        uow.lists_for_board(board_id).await
    }

    pub async fn create_list(&self, board_id: Uuid, new: NewList) -> Result<List> {
        let title = check_title(&new.title)?;
        let result = async {
            let mut uow = self.begin().await?;
            let position = reindex::open_slot(uow.as_mut(), ItemKind::List, board_id, new.position).await?;
            let list = List { id: Uuid::now_v7(), board_id, title, position, created_at: Utc::now() };
            uow.insert_list(&list).await?;
            uow.commit().await?;
            Ok::<_, AppError>(list)
        }
        .await;
        let list = note_conflict("create list", result)?;
        info!("created list {} at {} on board {board_id}", list.id, list.position);
        Ok(list)
    }

    pub async fn move_list(&self, list_id: Uuid, board_id: Uuid, position: i64) -> Result<List> {
        let result = async {
            let mut uow = self.begin().await?;
            let placed = reindex::relocate(uow.as_mut(), ItemKind::List, list_id, board_id, position).await?;
            let list = uow
                .get_list(list_id)
                .await?
                .ok_or_else(|| AppError::not_found("List", list_id))?;
            uow.commit().await?;
            Ok::<_, AppError>((placed, list))
        }
        .await;
        let (placed, list) = note_conflict("move list", result)?;
        info!("moved list {list_id} to {} on board {}", placed.position, placed.container_id);
        Ok(list)
    }

    pub async fn rename_list(&self, list_id: Uuid, title: &str) -> Result<List> {
        let title = check_title(title)?;
        let result = async {
            let mut uow = self.begin().await?;
            if uow.get_list(list_id).await?.is_none() {
                return Err(AppError::not_found("List", list_id));
            }
            uow.rename_list(list_id, &title).await?;
            let list = uow
                .get_list(list_id)
                .await?
                .ok_or_else(|| AppError::not_found("List", list_id))?;
            uow.commit().await?;
            Ok::<_, AppError>(list)
        }
        .await;
        note_conflict("rename list", result)
    }

    /// Deletes a list with its cards and closes the gap among the board's lists.
    pub async fn delete_list(&self, list_id: Uuid) -> Result<()> {
        let removed = self.remove(ItemKind::List, list_id).await?;
        info!("deleted list {list_id} from board {}", removed.container_id);
        Ok(())
    }

    // ── Cards ───────────────────────────────────────────────────────────────

    pub async fn cards(&self, list_id: Uuid) -> Result<Vec<Card>> {
        let mut uow = self.begin().await?;
        if uow.get_list(list_id).await?.is_none() {
            return Err(AppError::not_found("List", list_id));
        }
        uow.cards_for_list(list_id).await
    }

    pub async fn create_card(&self, list_id: Uuid, new: NewCard) -> Result<Card> {
        let title = check_title(&new.title)?;
        let result = async {
            let mut uow = self.begin().await?;
            let position = reindex::open_slot(uow.as_mut(), ItemKind::Card, list_id, new.position).await?;
            let card = Card {
                id: Uuid::now_v7(),
                list_id,
                title,
                description: new.description,
                position,
                created_at: Utc::now(),
            };
            uow.insert_card(&card).await?;
            uow.commit().await?;
            Ok::<_, AppError>(card)
        }
        .await;
        let card = note_conflict("create card", result)?;
        info!("created card {} at {} in list {list_id}", card.id, card.position);
        Ok(card)
    }

    pub async fn move_card(&self, card_id: Uuid, list_id: Uuid, position: i64) -> Result<Card> {
        let result = async {
            let mut uow = self.begin().await?;
            let placed = reindex::relocate(uow.as_mut(), ItemKind::Card, card_id, list_id, position).await?;
            let card = uow
                .get_card(card_id)
                .await?
                .ok_or_else(|| AppError::not_found("Card", card_id))?;
            uow.commit().await?;
            Ok::<_, AppError>((placed, card))
        }
        .await;
        let (placed, card) = note_conflict("move card", result)?;
        info!("moved card {card_id} to {} in list {}", placed.position, placed.container_id);
        Ok(card)
    }

    /// Replaces title and description. Position is left alone.
    pub async fn update_card(
        &self,
        card_id: Uuid,
        title: &str,
        description: Option<&str>,
    ) -> Result<Card> {
        let title = check_title(title)?;
        let result = async {
            let mut uow = self.begin().await?;
            if uow.get_card(card_id).await?.is_none() {
                return Err(AppError::not_found("Card", card_id));
            }
            uow.update_card_details(card_id, &title, description).await?;
            let card = uow
                .get_card(card_id)
                .await?
                .ok_or_else(|| AppError::not_found("Card", card_id))?;
            uow.commit().await?;
            Ok::<_, AppError>(card)
        }
        .await;
        note_conflict("update card", result)
    }

    pub async fn delete_card(&self, card_id: Uuid) -> Result<()> {
        let removed = self.remove(ItemKind::Card, card_id).await?;
        info!("deleted card {card_id} from list {}", removed.container_id);
        Ok(())
    }

    async fn remove(&self, kind: ItemKind, id: Uuid) -> Result<Placement> {
        let result = async {
            let mut uow = self.begin().await?;
            let removed = reindex::remove(uow.as_mut(), kind, id).await?;
            uow.commit().await?;
            Ok::<_, AppError>(removed)
        }
        .await;
        note_conflict("delete", result)
    }

    // ── Maintenance ─────────────────────────────────────────────────────────

    /// Fails with `Internal` if the container's positions are not `0..n`.
    pub async fn audit(&self, kind: ItemKind, container_id: Uuid) -> Result<()> {
        let mut uow = self.begin().await?;
        if !uow.container_exists(kind, container_id).await? {
            return Err(AppError::not_found(kind.container_name(), container_id));
        }
        reindex::audit(uow.as_mut(), kind, container_id).await
    }

    /// Audits a board's lists and every list's cards against one snapshot.
    pub async fn audit_board(&self, board_id: Uuid) -> Result<()> {
        let mut uow = self.begin().await?;
        if uow.get_board(board_id).await?.is_none() {
            return Err(AppError::not_found("Board", board_id));
        }
        reindex::audit(uow.as_mut(), ItemKind::List, board_id).await?;
        for list in uow.lists_for_board(board_id).await? {
            reindex::audit(uow.as_mut(), ItemKind::Card, list.id).await?;
        }
        Ok(())
    }

    /// Renumbers one container. Returns the number of rows rewritten.
    pub async fn compact(&self, kind: ItemKind, container_id: Uuid) -> Result<usize> {
        let result = async {
            let mut uow = self.begin().await?;
            if !uow.container_exists(kind, container_id).await? {
                return Err(AppError::not_found(kind.container_name(), container_id));
            }
            let rewritten = reindex::compact(uow.as_mut(), kind, container_id).await?;
            uow.commit().await?;
            Ok::<_, AppError>(rewritten)
        }
        .await;
        note_conflict("compact", result)
    }

    /// Compacts a board's lists and every list's cards in one transaction.
    pub async fn repair_board(&self, board_id: Uuid) -> Result<usize> {
        let result = async {
            let mut uow = self.begin().await?;
            if uow.get_board(board_id).await?.is_none() {
                return Err(AppError::not_found("Board", board_id));
            }
            let mut rewritten = reindex::compact(uow.as_mut(), ItemKind::List, board_id).await?;
            for list in uow.lists_for_board(board_id).await? {
                rewritten += reindex::compact(uow.as_mut(), ItemKind::Card, list.id).await?;
            }
            uow.commit().await?;
            Ok::<_, AppError>(rewritten)
        }
        .await;
        let rewritten = note_conflict("repair board", result)?;
        if rewritten > 0 {
            warn!("repaired board {board_id}: {rewritten} positions rewritten");
        }
        Ok(rewritten)
    }
}
