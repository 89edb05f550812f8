//! # Configuration
//!
//! Settings come from, in increasing priority: built-in defaults, a `.env`
//! file, environment variables, then command-line flags.

use clap::Args;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:rusty_kanban.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Store settings shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct StoreConfig {
    /// Database connection string
    #[arg(long, global = true, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    pub database_url: String,

    /// Upper bound on pooled connections (in-memory stores always use one)
    #[arg(
        long,
        global = true,
        env = "RUSTY_KANBAN_MAX_CONNECTIONS",
        default_value_t = DEFAULT_MAX_CONNECTIONS
    )]
    pub max_connections: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        store: StoreConfig,
    }

    #[test]
    fn test_flags_override_defaults() {
        let parsed = Harness::parse_from([
            "rusty-kanban",
            "--database-url",
            "sqlite::memory:",
            "--max-connections",
            "2",
        ]);
        assert_eq!(parsed.store.database_url, "sqlite::memory:");
        assert_eq!(parsed.store.max_connections, 2);
    }
}
