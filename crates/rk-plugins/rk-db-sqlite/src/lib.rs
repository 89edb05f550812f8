//! # rk-db-sqlite Implementation
//!
//! This module implements the data mapping between the SQLite relational model
//! and the `rk-core` domain models, plus the transactional unit of work the
//! reindexer runs in.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use rk_core::error::{AppError, Result};
use rk_core::models::{Board, Card, ItemKind, List, Placement};
use rk_core::traits::{BoardRepo, PositionRange, UnitOfWork};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Row, Sqlite, Transaction};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// Statements run on every connect. Idempotent.
///
/// No UNIQUE (container, position) index: a bulk shift passes through
/// transient duplicates before the statement completes.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS boards (
        id         BLOB PRIMARY KEY NOT NULL,
        title      TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS lists (
        id         BLOB PRIMARY KEY NOT NULL,
        board_id   BLOB NOT NULL REFERENCES boards(id),
        title      TEXT NOT NULL,
        position   INTEGER NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_lists_board_position ON lists (board_id, position)",
    "CREATE TABLE IF NOT EXISTS cards (
        id          BLOB PRIMARY KEY NOT NULL,
        list_id     BLOB NOT NULL REFERENCES lists(id),
        title       TEXT NOT NULL,
        description TEXT,
        position    INTEGER NOT NULL,
        created_at  TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_cards_list_position ON cards (list_id, position)",
];

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// SQLite primary result codes that mean "someone else holds the lock".
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

pub struct SqliteBoardRepo {
    pool: SqlitePool,
}

// Helper for UUID conversion
fn uuid_to_blob(id: Uuid) -> Vec<u8> {
    id.as_bytes().to_vec()
}

fn blob_to_uuid(blob: &[u8]) -> Result<Uuid> {
    Uuid::from_slice(blob).map_err(|e| AppError::Internal(format!("corrupt id column: {e}")))
}

/// Maps driver failures onto the domain taxonomy. Lock contention becomes
/// `Conflict` so callers know the whole operation may be retried.
pub fn db_err(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        let primary = db
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .map(|code| code & 0xff);
        if matches!(primary, Some(SQLITE_BUSY) | Some(SQLITE_LOCKED)) {
            return AppError::Conflict(db.message().to_string());
        }
    }
    AppError::Internal(err.to_string())
}

/// Table layout for one kind of positioned item.
struct Table {
    name: &'static str,
    container_column: &'static str,
    container_table: &'static str,
}

fn table(kind: ItemKind) -> Table {
    match kind {
        ItemKind::Card => Table { name: "cards", container_column: "list_id", container_table: "lists" },
        ItemKind::List => Table { name: "lists", container_column: "board_id", container_table: "boards" },
    }
}

fn board_from_row(row: &SqliteRow) -> Result<Board> {
    Ok(Board {
        id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("id").map_err(db_err)?)?,
        title: row.try_get("title").map_err(db_err)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(db_err)?,
    })
}

fn list_from_row(row: &SqliteRow) -> Result<List> {
    Ok(List {
        id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("id").map_err(db_err)?)?,
        board_id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("board_id").map_err(db_err)?)?,
        title: row.try_get("title").map_err(db_err)?,
        position: row.try_get("position").map_err(db_err)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(db_err)?,
    })
}

fn card_from_row(row: &SqliteRow) -> Result<Card> {
    Ok(Card {
        id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("id").map_err(db_err)?)?,
        list_id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("list_id").map_err(db_err)?)?,
        title: row.try_get("title").map_err(db_err)?,
        description: row.try_get("description").map_err(db_err)?,
        position: row.try_get("position").map_err(db_err)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(db_err)?,
    })
}

fn placement_from_row(row: &SqliteRow) -> Result<Placement> {
    Ok(Placement {
        id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("id").map_err(db_err)?)?,
        container_id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("container_id").map_err(db_err)?)?,
        position: row.try_get("position").map_err(db_err)?,
    })
}

impl SqliteBoardRepo {
    /// Connects with the default pool size and ensures the schema exists.
    pub async fn new(url: &str) -> Result<Self> {
        Self::connect(url, DEFAULT_MAX_CONNECTIONS).await
    }

    /// In-memory databases get a single connection so that every unit of
    /// work sees the same data.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let options = SqliteConnectOptions::from_str(url)
            .map_err(db_err)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);
        let options = if in_memory {
            options
        } else {
            options.journal_mode(SqliteJournalMode::Wal)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { max_connections.max(1) })
            .connect_with(options)
            .await
            .map_err(db_err)?;

        let repo = Self { pool };
        repo.migrate().await?;
        Ok(repo)
    }

    async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await.map_err(db_err)?;
        }
        debug!("sqlite schema ready");
        Ok(())
    }
}

#[async_trait]
impl BoardRepo for SqliteBoardRepo {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await.map_err(db_err)?;
        Ok(Box::new(SqliteUnitOfWork { tx }))
    }

    async fn list_boards(&self) -> Result<Vec<Board>> {
        let rows = sqlx::query("SELECT id, title, created_at FROM boards ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter().map(board_from_row).collect()
    }
}

/// One SQLite transaction. Rolled back on drop unless committed.
pub struct SqliteUnitOfWork {
    tx: Transaction<'static, Sqlite>,
}

impl SqliteUnitOfWork {
    async fn execute_by_id(&mut self, sql: &str, id: Uuid) -> Result<u64> {
        let done = sqlx::query(sql)
            .bind(uuid_to_blob(id))
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(done.rows_affected())
    }
}

#[async_trait]
impl UnitOfWork for SqliteUnitOfWork {
    async fn find_placement(&mut self, kind: ItemKind, id: Uuid) -> Result<Option<Placement>> {
        let t = table(kind);
        let sql = format!(
            "SELECT id, {} AS container_id, position FROM {} WHERE id = ?",
            t.container_column, t.name
        );
        let row = sqlx::query(&sql)
            .bind(uuid_to_blob(id))
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;

        row.as_ref().map(placement_from_row).transpose()
    }

    async fn container_exists(&mut self, kind: ItemKind, container_id: Uuid) -> Result<bool> {
        let sql = format!("SELECT 1 FROM {} WHERE id = ?", table(kind).container_table);
        let row = sqlx::query(&sql)
            .bind(uuid_to_blob(container_id))
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(row.is_some())
    }

    async fn count_children(&mut self, kind: ItemKind, container_id: Uuid) -> Result<i64> {
        let t = table(kind);
        let sql = format!("SELECT COUNT(*) FROM {} WHERE {} = ?", t.name, t.container_column);
        let row = sqlx::query(&sql)
            .bind(uuid_to_blob(container_id))
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db_err)?;
        row.try_get::<i64, _>(0).map_err(db_err)
    }

    async fn list_children(&mut self, kind: ItemKind, container_id: Uuid) -> Result<Vec<Placement>> {
        let t = table(kind);
        let sql = format!(
            "SELECT id, {col} AS container_id, position FROM {tbl} WHERE {col} = ? \
             ORDER BY position, created_at, id",
            col = t.container_column,
            tbl = t.name
        );
        let rows = sqlx::query(&sql)
            .bind(uuid_to_blob(container_id))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_err)?;

        rows.iter().map(placement_from_row).collect()
    }

    async fn shift_positions(
        &mut self,
        kind: ItemKind,
        container_id: Uuid,
        range: PositionRange,
        delta: i64,
    ) -> Result<u64> {
        let t = table(kind);
        let mut sql = format!(
            "UPDATE {} SET position = position + ? WHERE {} = ? AND position >= ?",
            t.name, t.container_column
        );
        if range.to.is_some() {
            sql.push_str(" AND position <= ?");
        }

        let mut query = sqlx::query(&sql)
            .bind(delta)
            .bind(uuid_to_blob(container_id))
            .bind(range.from);
        if let Some(to) = range.to {
            query = query.bind(to);
        }

        let done = query.execute(&mut *self.tx).await.map_err(db_err)?;
        Ok(done.rows_affected())
    }

    async fn update_placement(
        &mut self,
        kind: ItemKind,
        id: Uuid,
        container_id: Option<Uuid>,
        position: i64,
    ) -> Result<()> {
        let t = table(kind);
        let done = match container_id {
            Some(container_id) => {
                let sql = format!("UPDATE {} SET {} = ?, position = ? WHERE id = ?", t.name, t.container_column);
                sqlx::query(&sql)
                    .bind(uuid_to_blob(container_id))
                    .bind(position)
                    .bind(uuid_to_blob(id))
                    .execute(&mut *self.tx)
                    .await
            }
            None => {
                let sql = format!("UPDATE {} SET position = ? WHERE id = ?", t.name);
                sqlx::query(&sql)
                    .bind(position)
                    .bind(uuid_to_blob(id))
                    .execute(&mut *self.tx)
                    .await
            }
        }
        .map_err(db_err)?;

        if done.rows_affected() == 0 {
            return Err(AppError::not_found(kind.name(), id));
        }
        Ok(())
    }

    /// Children go first; the schema has no ON DELETE CASCADE.
    async fn delete_item(&mut self, kind: ItemKind, id: Uuid) -> Result<()> {
        if kind == ItemKind::List {
            let cards = self.execute_by_id("DELETE FROM cards WHERE list_id = ?", id).await?;
            debug!("removed {cards} cards with list {id}");
        }
        let sql = format!("DELETE FROM {} WHERE id = ?", table(kind).name);
        if self.execute_by_id(&sql, id).await? == 0 {
            return Err(AppError::not_found(kind.name(), id));
        }
        Ok(())
    }

    async fn insert_board(&mut self, board: &Board) -> Result<()> {
        sqlx::query("INSERT INTO boards (id, title, created_at) VALUES (?, ?, ?)")
            .bind(uuid_to_blob(board.id))
            .bind(&board.title)
            .bind(board.created_at)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn insert_list(&mut self, list: &List) -> Result<()> {
        sqlx::query("INSERT INTO lists (id, board_id, title, position, created_at) VALUES (?, ?, ?, ?, ?)")
            .bind(uuid_to_blob(list.id))
            .bind(uuid_to_blob(list.board_id))
            .bind(&list.title)
            .bind(list.position)
            .bind(list.created_at)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn insert_card(&mut self, card: &Card) -> Result<()> {
        sqlx::query("INSERT INTO cards (id, list_id, title, description, position, created_at) VALUES (?, ?, ?, ?, ?, ?)")
            .bind(uuid_to_blob(card.id))
            .bind(uuid_to_blob(card.list_id))
            .bind(&card.title)
            .bind(&card.description)
            .bind(card.position)
            .bind(card.created_at)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn get_board(&mut self, id: Uuid) -> Result<Option<Board>> {
        let row = sqlx::query("SELECT id, title, created_at FROM boards WHERE id = ?")
            .bind(uuid_to_blob(id))
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;
        row.as_ref().map(board_from_row).transpose()
    }

    async fn get_list(&mut self, id: Uuid) -> Result<Option<List>> {
        let row = sqlx::query("SELECT * FROM lists WHERE id = ?")
            .bind(uuid_to_blob(id))
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;
        row.as_ref().map(list_from_row).transpose()
    }

    async fn get_card(&mut self, id: Uuid) -> Result<Option<Card>> {
        let row = sqlx::query("SELECT * FROM cards WHERE id = ?")
            .bind(uuid_to_blob(id))
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;
        row.as_ref().map(card_from_row).transpose()
    }

    async fn lists_for_board(&mut self, board_id: Uuid) -> Result<Vec<List>> {
        let rows = sqlx::query("SELECT * FROM lists WHERE board_id = ? ORDER BY position, created_at, id")
            .bind(uuid_to_blob(board_id))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_err)?;
        rows.iter().map(list_from_row).collect()
    }

    async fn cards_for_list(&mut self, list_id: Uuid) -> Result<Vec<Card>> {
        let rows = sqlx::query("SELECT * FROM cards WHERE list_id = ? ORDER BY position, created_at, id")
            .bind(uuid_to_blob(list_id))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_err)?;
        rows.iter().map(card_from_row).collect()
    }

    async fn update_card_details(
        &mut self,
        id: Uuid,
        title: &str,
        description: Option<&str>,
    ) -> Result<()> {
        let done = sqlx::query("UPDATE cards SET title = ?, description = ? WHERE id = ?")
            .bind(title)
            .bind(description)
            .bind(uuid_to_blob(id))
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        if done.rows_affected() == 0 {
            return Err(AppError::not_found("Card", id));
        }
        Ok(())
    }

    async fn rename_list(&mut self, id: Uuid, title: &str) -> Result<()> {
        let done = sqlx::query("UPDATE lists SET title = ? WHERE id = ?")
            .bind(title)
            .bind(uuid_to_blob(id))
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        if done.rows_affected() == 0 {
            return Err(AppError::not_found("List", id));
        }
        Ok(())
    }

    async fn delete_board(&mut self, id: Uuid) -> Result<()> {
        self.execute_by_id(
            "DELETE FROM cards WHERE list_id IN (SELECT id FROM lists WHERE board_id = ?)",
            id,
        )
        .await?;
        self.execute_by_id("DELETE FROM lists WHERE board_id = ?", id).await?;
        if self.execute_by_id("DELETE FROM boards WHERE id = ?", id).await? == 0 {
            return Err(AppError::not_found("Board", id));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let SqliteUnitOfWork { tx } = *self;
        tx.commit().await.map_err(|e| {
            let err = db_err(e);
            if matches!(err, AppError::Conflict(_)) {
                warn!("commit rejected: {err}");
            }
            err
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> (SqliteBoardRepo, Uuid, Uuid) {
        let repo = SqliteBoardRepo::new("sqlite::memory:").await.unwrap();
        let board = Board { id: Uuid::now_v7(), title: "Test Board".into(), created_at: Utc::now() };
        let list = List {
            id: Uuid::now_v7(),
            board_id: board.id,
            title: "To Do".into(),
            position: 0,
            created_at: Utc::now(),
        };

        let mut uow = repo.begin().await.unwrap();
        uow.insert_board(&board).await.unwrap();
        uow.insert_list(&list).await.unwrap();
        for position in 0..4 {
            let card = Card {
                id: Uuid::now_v7(),
                list_id: list.id,
                title: format!("card {position}"),
                description: None,
                position,
                created_at: Utc::now(),
            };
            uow.insert_card(&card).await.unwrap();
        }
        uow.commit().await.unwrap();
        (repo, board.id, list.id)
    }

    async fn card_positions(repo: &SqliteBoardRepo, list_id: Uuid) -> Vec<(String, i64)> {
        let mut uow = repo.begin().await.unwrap();
        uow.cards_for_list(list_id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| (c.title, c.position))
            .collect()
    }

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let repo = SqliteBoardRepo::new("sqlite::memory:").await.unwrap();
        repo.migrate().await.expect("second migrate should be a no-op");
        assert!(repo.list_boards().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shift_respects_closed_range() {
        let (repo, _, list_id) = seeded().await;

        let mut uow = repo.begin().await.unwrap();
        let touched = uow
            .shift_positions(ItemKind::Card, list_id, PositionRange::between(1, 2), 1)
            .await
            .unwrap();
        uow.commit().await.unwrap();

        assert_eq!(touched, 2);
        let positions: Vec<i64> = card_positions(&repo, list_id).await.into_iter().map(|(_, p)| p).collect();
        assert_eq!(positions, vec![0, 2, 3, 3]);
    }

    #[tokio::test]
    async fn test_shift_with_open_range_reaches_the_end() {
        let (repo, _, list_id) = seeded().await;

        let mut uow = repo.begin().await.unwrap();
        let touched = uow
            .shift_positions(ItemKind::Card, list_id, PositionRange::starting_at(2), -1)
            .await
            .unwrap();
        assert_eq!(touched, 2);
    }

    #[tokio::test]
    async fn test_dropped_unit_of_work_rolls_back() {
        let (repo, _, list_id) = seeded().await;
        let before = card_positions(&repo, list_id).await;

        {
            let mut uow = repo.begin().await.unwrap();
            uow.shift_positions(ItemKind::Card, list_id, PositionRange::starting_at(0), 10)
                .await
                .unwrap();
        }

        assert_eq!(card_positions(&repo, list_id).await, before);
    }

    #[tokio::test]
    async fn test_deleting_a_list_removes_its_cards() {
        let (repo, board_id, list_id) = seeded().await;

        let mut uow = repo.begin().await.unwrap();
        uow.delete_item(ItemKind::List, list_id).await.unwrap();
        assert_eq!(uow.count_children(ItemKind::Card, list_id).await.unwrap(), 0);
        assert_eq!(uow.count_children(ItemKind::List, board_id).await.unwrap(), 0);
        uow.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_update_placement_reparents() {
        let (repo, board_id, list_id) = seeded().await;
        let other = List {
            id: Uuid::now_v7(),
            board_id,
            title: "Done".into(),
            position: 1,
            created_at: Utc::now(),
        };

        let mut uow = repo.begin().await.unwrap();
        uow.insert_list(&other).await.unwrap();
        let first = uow.list_children(ItemKind::Card, list_id).await.unwrap()[0];
        uow.update_placement(ItemKind::Card, first.id, Some(other.id), 0).await.unwrap();

        let moved = uow.find_placement(ItemKind::Card, first.id).await.unwrap().unwrap();
        assert_eq!(moved.container_id, other.id);
        assert_eq!(uow.count_children(ItemKind::Card, list_id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_missing_rows_are_not_found() {
        let repo = SqliteBoardRepo::new("sqlite::memory:").await.unwrap();
        let mut uow = repo.begin().await.unwrap();
        let ghost = Uuid::now_v7();

        assert!(uow.find_placement(ItemKind::Card, ghost).await.unwrap().is_none());
        assert!(!uow.container_exists(ItemKind::Card, ghost).await.unwrap());
        assert!(matches!(
            uow.update_placement(ItemKind::Card, ghost, None, 0).await,
            Err(AppError::NotFound(_, _))
        ));
        assert!(matches!(uow.delete_board(ghost).await, Err(AppError::NotFound(_, _))));
    }

    #[tokio::test]
    async fn test_foreign_keys_reject_orphans() {
        let repo = SqliteBoardRepo::new("sqlite::memory:").await.unwrap();
        let mut uow = repo.begin().await.unwrap();
        let orphan = Card {
            id: Uuid::now_v7(),
            list_id: Uuid::now_v7(),
            title: "orphan".into(),
            description: None,
            position: 0,
            created_at: Utc::now(),
        };
        assert!(matches!(uow.insert_card(&orphan).await, Err(AppError::Internal(_))));
    }
}
