//! tabula - drive the table editor from the command line
//!
//! Compiles filter rules into query options, commits staged row edits and
//! deletes rows against a configured backend.

mod commands;
mod logging;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tabula_services::ClientConfig;

#[derive(Parser)]
#[command(name = "tabula")]
#[command(about = "Filter, edit and delete table rows", long_about = None)]
struct Cli {
    /// Config file (defaults to <config dir>/tabula/config.toml)
    #[arg(long, global = true, env = "TABULA_CONFIG")]
    config: Option<PathBuf>,

    /// Backend base URL
    #[arg(long, global = true, env = "TABULA_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, global = true, env = "TABULA_WORKSPACE_ID")]
    workspace_id: Option<String>,

    #[arg(long, global = true, env = "TABULA_TABLE_ID")]
    table_id: Option<String>,

    /// Also write JSON logs to the log directory
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile filter rules and print the resulting query
    Filter {
        /// JSON array of filter rules
        rules: PathBuf,

        /// JSON array of column definitions
        #[arg(long)]
        columns: Option<PathBuf>,

        /// Sort column
        #[arg(long)]
        sort: Option<String>,

        /// Sort descending
        #[arg(long, requires = "sort")]
        desc: bool,
    },

    /// Stage new rows and row patches, then save them
    Commit {
        /// JSON file with `newRows` and `updates`
        changes: PathBuf,

        /// JSON array of column definitions
        #[arg(long)]
        columns: PathBuf,
    },

    /// Delete rows by id
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

impl Cli {
    fn client_config(&self) -> anyhow::Result<ClientConfig> {
        let mut config = ClientConfig::load_or_default(self.config.as_deref())?;
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(workspace_id) = &self.workspace_id {
            config.workspace_id = Some(workspace_id.clone());
        }
        if let Some(table_id) = &self.table_id {
            config.table_id = Some(table_id.clone());
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logging_config = if cfg!(debug_assertions) {
        logging::LoggingConfig::development()
    } else {
        logging::LoggingConfig::production()
    };
    logging::init(logging_config.with_json_logs(cli.json_logs))?;

    let result = match &cli.command {
        Commands::Filter {
            rules,
            columns,
            sort,
            desc,
        } => commands::filter(rules, columns.as_deref(), sort.as_deref(), *desc, cli.client_config()?),
        Commands::Commit { changes, columns } => {
            commands::commit(changes, columns, cli.client_config()?).await
        }
        Commands::Delete { ids } => commands::delete(ids, cli.client_config()?).await,
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Command failed");
    }
    result
}
