use std::sync::Arc;

use thiserror::Error;

use crate::tournament::{
    LedgerSnapshot, MatchId, MatchRow, NewMatch, PlayerEntry, PlayerId, RecordRow, Tournament,
    TournamentId,
};

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub type ArcTournamentStore = Arc<Box<dyn TournamentStore + Send + Sync + 'static>>;

/// Persistence port for tournaments, players and the match ledger.
///
/// Every tournament-scoped query fails with `StoreError::NotFound` when the
/// tournament does not exist. `append_match` inserts the match row and all of
/// its records atomically and rejects a second non-bye match for the same
/// canonical pair, or a second bye for the same player, with
/// `StoreError::Conflict`.
#[async_trait::async_trait]
pub trait TournamentStore {
    async fn create_tournament(&self, name: &str) -> StoreResult<Tournament>;
    async fn get_tournament(&self, id: TournamentId) -> StoreResult<Tournament>;
    async fn delete_tournament(&self, id: TournamentId) -> StoreResult<()>;

    async fn register_player(&self, tournament: TournamentId, name: &str)
    -> StoreResult<PlayerEntry>;
    async fn delete_player(&self, tournament: TournamentId, player: PlayerId) -> StoreResult<()>;
    async fn delete_players(&self, tournament: TournamentId) -> StoreResult<u64>;
    async fn delete_matches(&self, tournament: TournamentId) -> StoreResult<u64>;

    async fn list_players(&self, tournament: TournamentId) -> StoreResult<Vec<PlayerEntry>>;
    async fn list_matches(&self, tournament: TournamentId) -> StoreResult<Vec<MatchRow>>;
    async fn list_records(&self, tournament: TournamentId) -> StoreResult<Vec<RecordRow>>;

    async fn append_match(&self, tournament: TournamentId, new_match: &NewMatch)
    -> StoreResult<MatchId>;

    async fn count_players(&self, tournament: TournamentId) -> StoreResult<usize> {
        Ok(self.list_players(tournament).await?.len())
    }

    /// Stores that can read all three tables in one transaction should override this.
    async fn snapshot(&self, tournament: TournamentId) -> StoreResult<LedgerSnapshot> {
        let players = self.list_players(tournament).await?;
        let matches = self.list_matches(tournament).await?;
        let records = self.list_records(tournament).await?;
        Ok(LedgerSnapshot {
            players,
            matches,
            records,
        })
    }
}
