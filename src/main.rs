use std::sync::Arc;

use clap::Parser;
use log::{error, info};
use swiss_domain::store::ArcTournamentStore;
use swiss_persistence_sqlite::{SqliteTournamentStore, create_db_pool};

use crate::{
    app::AppState,
    cli::{Cli, CliError},
};

mod app;
mod cli;
mod logs;

async fn start(cli: Cli) -> Result<(), CliError> {
    let pool = create_db_pool(&cli.db).await?;
    let store: ArcTournamentStore = Arc::new(Box::new(SqliteTournamentStore::new(pool)));
    let app = AppState::new(store, cli.strategy);

    info!("Using {:?} pairing", cli.strategy);
    cli::run(cli.command, &app).await
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    logs::init_logger();

    let cli = Cli::parse();
    if let Err(e) = start(cli).await {
        error!("{}", e);
        std::process::exit(1);
    }
}
