//! # Rusty-Kanban Binary
//!
//! The entry point that assembles the application based on compile-time
//! features and maps subcommands onto `BoardService` calls. Results are
//! printed to stdout as JSON; logs go to stderr.

mod config;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::StoreConfig;
use rk_core::{BoardService, NewCard, NewList};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

// Feature-gated imports: the storage plugin is chosen at compile time
#[cfg(feature = "db-sqlite")]
use rk_db_sqlite::SqliteBoardRepo;

#[cfg(not(feature = "db-sqlite"))]
compile_error!("rusty-kanban needs a storage plugin; enable the `db-sqlite` feature");

#[derive(Parser)]
#[command(name = "rusty-kanban", version, about = "Kanban boards with densely ordered lists and cards")]
struct Cli {
    #[command(flatten)]
    store: StoreConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create, inspect and delete boards
    #[command(subcommand)]
    Board(BoardCommand),
    /// Create, reorder, rename and delete lists
    #[command(subcommand)]
    List(ListCommand),
    /// Create, move, edit and delete cards
    #[command(subcommand)]
    Card(CardCommand),
    /// Renumber a board's lists and cards to close any gaps
    Repair { board: Uuid },
    /// Check that a board's lists and cards are numbered without gaps
    Audit { board: Uuid },
}

#[derive(Subcommand)]
enum BoardCommand {
    Create { title: String },
    List,
    Show { id: Uuid },
    Delete { id: Uuid },
}

#[derive(Subcommand)]
enum ListCommand {
    Create {
        board: Uuid,
        title: String,
        /// Insert at this position instead of appending
        #[arg(long)]
        position: Option<u32>,
    },
    Move { id: Uuid, board: Uuid, position: u32 },
    Rename { id: Uuid, title: String },
    Delete { id: Uuid },
}

#[derive(Subcommand)]
enum CardCommand {
    Create {
        list: Uuid,
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// Insert at this position instead of appending
        #[arg(long)]
        position: Option<u32>,
    },
    Move { id: Uuid, list: Uuid, position: u32 },
    Update {
        id: Uuid,
        title: String,
        #[arg(long)]
        description: Option<String>,
    },
    Delete { id: Uuid },
}

#[derive(Serialize)]
struct Deleted {
    deleted: bool,
    id: Uuid,
}

#[derive(Serialize)]
struct Repaired {
    board: Uuid,
    rewritten: usize,
}

fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn deleted(id: Uuid) -> anyhow::Result<()> {
    print(&Deleted { deleted: true, id })
}

async fn run(service: &BoardService, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Board(cmd) => match cmd {
            BoardCommand::Create { title } => print(&service.create_board(&title).await?),
            BoardCommand::List => print(&service.list_boards().await?),
            BoardCommand::Show { id } => print(&service.board_view(id).await?),
            BoardCommand::Delete { id } => {
                service.delete_board(id).await?;
                deleted(id)
            }
        },
        Command::List(cmd) => match cmd {
            ListCommand::Create { board, title, position } => {
                let new = NewList { title, position: position.map(i64::from) };
                print(&service.create_list(board, new).await?)
            }
            ListCommand::Move { id, board, position } => {
                print(&service.move_list(id, board, i64::from(position)).await?)
            }
            ListCommand::Rename { id, title } => print(&service.rename_list(id, &title).await?),
            ListCommand::Delete { id } => {
                service.delete_list(id).await?;
                deleted(id)
            }
        },
        Command::Card(cmd) => match cmd {
            CardCommand::Create { list, title, description, position } => {
                let new = NewCard { title, description, position: position.map(i64::from) };
                print(&service.create_card(list, new).await?)
            }
            CardCommand::Move { id, list, position } => {
                print(&service.move_card(id, list, i64::from(position)).await?)
            }
            CardCommand::Update { id, title, description } => {
                print(&service.update_card(id, &title, description.as_deref()).await?)
            }
            CardCommand::Delete { id } => {
                service.delete_card(id).await?;
                deleted(id)
            }
        },
        Command::Repair { board } => {
            let rewritten = service.repair_board(board).await?;
            print(&Repaired { board, rewritten })
        }
        Command::Audit { board } => {
            service.audit_board(board).await?;
            print(&serde_json::json!({ "board": board, "dense": true }))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = Cli::parse();

    // 1. Initialize Database Implementation
    #[cfg(feature = "db-sqlite")]
    let repo = SqliteBoardRepo::connect(&cli.store.database_url, cli.store.max_connections)
        .await
        .with_context(|| format!("failed to open {}", cli.store.database_url))?;

    log::debug!("using store at {}", cli.store.database_url);

    // 2. Wrap in the service (dynamic dispatch keeps plugins swappable)
    let service = BoardService::new(Arc::new(repo));

    run(&service, cli.command).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_move_parses_positional_arguments() {
        let list = Uuid::now_v7();
        let card = Uuid::now_v7();
        let (card_arg, list_arg) = (card.to_string(), list.to_string());
        let cli = Cli::parse_from([
            "rusty-kanban",
            "card",
            "move",
            card_arg.as_str(),
            list_arg.as_str(),
            "3",
        ]);
        match cli.command {
            Command::Card(CardCommand::Move { id, list: to, position }) => {
                assert_eq!((id, to, position), (card, list, 3));
            }
            _ => panic!("parsed the wrong subcommand"),
        }
    }

    #[test]
    fn test_negative_position_is_rejected_by_the_parser() {
        let id = Uuid::now_v7().to_string();
        let result = Cli::try_parse_from(["rusty-kanban", "card", "move", id.as_str(), id.as_str(), "-1"]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_run_creates_and_shows_a_board() {
        let repo = SqliteBoardRepo::new("sqlite::memory:").await.unwrap();
        let service = BoardService::new(Arc::new(repo));

        run(&service, Command::Board(BoardCommand::Create { title: "CLI".into() }))
            .await
            .unwrap();
        let boards = service.list_boards().await.unwrap();
        assert_eq!(boards.len(), 1);

        run(&service, Command::Board(BoardCommand::Show { id: boards[0].id })).await.unwrap();
        let missing = run(&service, Command::Board(BoardCommand::Show { id: Uuid::now_v7() })).await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn test_audit_command_checks_the_whole_board() {
        let repo = SqliteBoardRepo::new("sqlite::memory:").await.unwrap();
        let service = BoardService::new(Arc::new(repo));
        let board = service.create_board("Audit").await.unwrap();
        let list = service.create_list(board.id, NewList { title: "Todo".into(), position: None }).await.unwrap();
        service.create_card(list.id, NewCard { title: "A".into(), ..Default::default() }).await.unwrap();

        run(&service, Command::Audit { board: board.id }).await.unwrap();
        assert!(run(&service, Command::Audit { board: Uuid::now_v7() }).await.is_err());
    }
}
