//! # Domain Models
//!
//! These structs represent the core entities of Rusty-Kanban.
//! We use UUID v7 for time-ordered, globally unique identification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A top-level board. Owns its lists (and, through them, their cards).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// An ordered column of cards on a board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct List {
    pub id: Uuid,
    pub board_id: Uuid,
    pub title: String,
    /// Zero-based, dense within the owning board
    pub position: i64,
    pub created_at: DateTime<Utc>,
}

/// The unit of work on a board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: Uuid,
    pub list_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// Zero-based, dense within the owning list
    pub position: i64,
    pub created_at: DateTime<Utc>,
}

/// A list together with its cards, sorted by position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListView {
    #[serde(flatten)]
    pub list: List,
    pub cards: Vec<Card>,
}

/// The full nested read model of a board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardView {
    #[serde(flatten)]
    pub board: Board,
    pub lists: Vec<ListView>,
}

/// Which kind of positioned item an operation targets.
///
/// Cards live in lists, lists live in boards. The reindexer treats both the
/// same way; only the table and container names differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Card,
    List,
}

impl ItemKind {
    /// Human-readable name of the item itself.
    pub fn name(self) -> &'static str {
        match self {
            ItemKind::Card => "Card",
            ItemKind::List => "List",
        }
    }

    /// Human-readable name of the container holding this kind of item.
    pub fn container_name(self) -> &'static str {
        match self {
            ItemKind::Card => "List",
            ItemKind::List => "Board",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where an item currently sits: its container and its position there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    pub id: Uuid,
    pub container_id: Uuid,
    pub position: i64,
}

impl From<&Card> for Placement {
    fn from(card: &Card) -> Self {
        Self { id: card.id, container_id: card.list_id, position: card.position }
    }
}

impl From<&List> for Placement {
    fn from(list: &List) -> Self {
        Self { id: list.id, container_id: list.board_id, position: list.position }
    }
}

/// Attributes for a new card. `position: None` appends.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCard {
    pub title: String,
    pub description: Option<String>,
    pub position: Option<i64>,
}

/// Attributes for a new list. `position: None` appends.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewList {
    pub title: String,
    pub position: Option<i64>,
}
