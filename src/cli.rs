use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use swiss_domain::{
    ServiceError,
    pairing::PairingStrategy,
    store::StoreError,
    tournament::{Outcome, PlayerId, TournamentId},
};
use thiserror::Error;

use crate::app::AppState;

#[derive(Debug, Parser)]
#[command(
    name = "swiss-server",
    about = "Records Swiss-system results, ranks players and pairs the next round"
)]
pub struct Cli {
    /// SQLite database file, created on first use.
    #[arg(long, env = "SWISS_DB")]
    pub db: String,

    /// `adjacent` or `avoid-rematch`.
    #[arg(long, env = "SWISS_PAIRING_STRATEGY", default_value = "adjacent")]
    pub strategy: PairingStrategy,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    CreateTournament {
        name: String,
    },
    DeleteTournament {
        tournament: i64,
    },
    Register {
        tournament: i64,
        name: String,
    },
    CountPlayers {
        tournament: i64,
    },
    /// Outcome is `a`, `b` or `tie`, relative to the argument order.
    Report {
        tournament: i64,
        player_a: i64,
        player_b: i64,
        outcome: Outcome,
    },
    Bye {
        tournament: i64,
        player: i64,
    },
    Standings {
        tournament: i64,
    },
    Pairings {
        tournament: i64,
    },
    Status {
        tournament: i64,
    },
    DeleteMatches {
        tournament: i64,
    },
    DeletePlayers {
        tournament: i64,
    },
    PurgePlayer {
        tournament: i64,
        player: i64,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("cannot encode output: {0}")]
    Output(#[from] serde_json::Error),
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn run(command: Command, app: &AppState) -> Result<(), CliError> {
    match command {
        Command::CreateTournament { name } => {
            print_json(&app.registry_service.create_tournament(&name).await?)
        }
        Command::DeleteTournament { tournament } => {
            let tournament = TournamentId(tournament);
            app.registry_service.delete_tournament(tournament).await?;
            print_json(&json!({ "deleted": tournament }))
        }
        Command::Register { tournament, name } => print_json(
            &app.registry_service
                .register_player(TournamentId(tournament), &name)
                .await?,
        ),
        Command::CountPlayers { tournament } => {
            let count = app
                .registry_service
                .count_players(TournamentId(tournament))
                .await?;
            print_json(&json!({ "players": count }))
        }
        Command::Report {
            tournament,
            player_a,
            player_b,
            outcome,
        } => {
            let match_id = app
                .ledger_service
                .record_match(
                    TournamentId(tournament),
                    PlayerId(player_a),
                    PlayerId(player_b),
                    outcome,
                )
                .await?;
            print_json(&json!({ "match_id": match_id }))
        }
        Command::Bye { tournament, player } => {
            let match_id = app
                .ledger_service
                .record_bye(TournamentId(tournament), PlayerId(player))
                .await?;
            print_json(&json!({ "match_id": match_id }))
        }
        Command::Standings { tournament } => print_json(
            &app.standings_service
                .standings(TournamentId(tournament))
                .await?,
        ),
        Command::Pairings { tournament } => print_json(
            &app.pairing_service
                .next_round_pairings(TournamentId(tournament))
                .await?,
        ),
        Command::Status { tournament } => print_json(
            &app.round_service
                .round_status(TournamentId(tournament))
                .await?,
        ),
        Command::DeleteMatches { tournament } => {
            let removed = app
                .registry_service
                .delete_matches(TournamentId(tournament))
                .await?;
            print_json(&json!({ "deleted_matches": removed }))
        }
        Command::DeletePlayers { tournament } => {
            let removed = app
                .registry_service
                .delete_players(TournamentId(tournament))
                .await?;
            print_json(&json!({ "deleted_players": removed }))
        }
        Command::PurgePlayer { tournament, player } => {
            let player = PlayerId(player);
            app.registry_service
                .purge_player(TournamentId(tournament), player)
                .await?;
            print_json(&json!({ "purged": player }))
        }
    }
}
