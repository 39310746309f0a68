//! Checks that the hosted players table is provisioned and writable.
//!
//! Prints the provisioning SQL when the table is missing.

use clap::Parser;
use client::config::BackendConfig;
use client::database::{PlayerStore, PlayerTable};
use client::ClientError;
use log::{error, info};
use shared::{PlayerRow, CENTER_X, CENTER_Y, PLAYERS_TABLE};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(author, version, about = "Verify the players table setup")]
struct Args {
    #[arg(short = 'u', long, env = "SUPABASE_URL")]
    url: String,

    #[arg(short = 'k', long, env = "SUPABASE_ANON_KEY", hide_env_values = true)]
    anon_key: String,

    #[arg(short = 't', long, env = "FIELD_TABLE", default_value = PLAYERS_TABLE)]
    table: String,
}

fn provisioning_sql(table: &str) -> String {
    format!(
        r#"-- Create the {table} table
CREATE TABLE IF NOT EXISTS {table} (
  id UUID PRIMARY KEY,
  name VARCHAR(50) NOT NULL,
  x REAL NOT NULL DEFAULT 400,
  y REAL NOT NULL DEFAULT 300,
  color VARCHAR(7) NOT NULL,
  created_at TIMESTAMPTZ DEFAULT NOW()
);

-- Row level security with a policy allowing every operation
ALTER TABLE {table} ENABLE ROW LEVEL SECURITY;
CREATE POLICY "Allow all operations on {table}" ON {table}
  FOR ALL USING (true)
  WITH CHECK (true);

-- Publish row changes to the realtime feed
ALTER PUBLICATION supabase_realtime ADD TABLE {table};

CREATE INDEX IF NOT EXISTS idx_{table}_created_at ON {table}(created_at);
CREATE INDEX IF NOT EXISTS idx_{table}_id ON {table}(id);
"#
    )
}

fn probe_row() -> PlayerRow {
    PlayerRow {
        id: Uuid::nil(),
        name: "Test Player".to_string(),
        x: CENTER_X,
        y: CENTER_Y,
        color: "#FF0000".to_string(),
        created_at: None,
    }
}

async fn check_permissions(table: &PlayerTable) -> Result<(), ClientError> {
    let row = probe_row();
    table.insert_player(&row).await?;
    table.remove_player(row.id).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let backend = BackendConfig::new(args.url, args.anon_key).with_table(args.table);
    let table = PlayerTable::new(&backend)?;

    info!("Checking table '{}' at {}", backend.table, backend.url);
    match table.probe().await {
        Ok(()) => info!("Table '{}' exists", backend.table),
        Err(ClientError::Status { status, body }) => {
            error!("Table '{}' is not readable ({}): {}", backend.table, status, body);
            println!(
                "Run the following SQL in the project's SQL editor, then run this check again:\n"
            );
            println!("{}", provisioning_sql(&backend.table));
            std::process::exit(1);
        }
        Err(e) => {
            error!("Could not reach the backend: {}", e);
            std::process::exit(1);
        }
    }

    info!("Testing insert and delete permissions...");
    if let Err(e) = check_permissions(&table).await {
        error!("Permission check failed: {}", e);
        error!("Make sure the row level security policies allow insert and delete");
        std::process::exit(1);
    }

    info!("Table permissions working correctly");
    info!("Realtime delivery needs a manual check: run two clients and move one of them");
    Ok(())
}
