use std::sync::Arc;

use swiss_domain::{
    ServiceResult,
    ledger::TournamentLocks,
    registry::{RegistryService, RegistryServiceImpl},
    store::ArcTournamentStore,
    tournament::{PlayerEntry, TournamentId},
};
use swiss_persistence_sqlite::{SqliteTournamentStore, create_db_pool_from_env};

async fn register_all(
    registry: &dyn RegistryService,
    tournament: TournamentId,
    names: &[String],
) -> Vec<ServiceResult<PlayerEntry>> {
    let mut results = Vec::with_capacity(names.len());
    for name in names {
        results.push(registry.register_player(tournament, name).await);
    }
    results
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: add_player <tournament_id> <name>...");
        std::process::exit(1);
    }

    let tournament = match args[1].parse::<i64>() {
        Ok(id) => TournamentId(id),
        Err(_) => {
            eprintln!("Tournament id must be an integer, got [{}]", args[1]);
            std::process::exit(1);
        }
    };

    let pool = create_db_pool_from_env()
        .await
        .expect("Failed to open tournament database");
    let store: ArcTournamentStore = Arc::new(Box::new(SqliteTournamentStore::new(pool)));
    let registry = RegistryServiceImpl::new(store, Arc::new(TournamentLocks::new()));

    let mut failed = false;
    for (name, result) in args[2..]
        .iter()
        .zip(register_all(&registry, tournament, &args[2..]).await)
    {
        match result {
            Ok(entry) => println!(
                "Registered player [{}] with id [{}] in tournament [{}]",
                entry.name, entry.player_id, tournament
            ),
            Err(e) => {
                eprintln!("Failed to register [{}]: {}", name, e);
                failed = true;
            }
        }
    }
    if failed {
        std::process::exit(1);
    }
}
