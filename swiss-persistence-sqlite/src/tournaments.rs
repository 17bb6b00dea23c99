use sqlx::{Executor, Pool, Sqlite};
use swiss_domain::{
    store::{StoreError, StoreResult, TournamentStore},
    tournament::{
        LedgerSnapshot, MatchId, MatchRow, NewMatch, OutcomeFlag, PlayerEntry, PlayerId,
        RecordRow, Tournament, TournamentId,
    },
};

use crate::store_error;

pub struct SqliteTournamentStore {
    pool: Pool<Sqlite>,
}

impl SqliteTournamentStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn missing(id: TournamentId) -> StoreError {
        StoreError::NotFound(format!("tournament {}", id))
    }

    async fn ensure_tournament<'e, E>(executor: E, id: TournamentId) -> StoreResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM tournaments WHERE id = ?")
            .bind(id.0)
            .fetch_optional(executor)
            .await
            .map_err(store_error)?;
        row.map(|_| ()).ok_or_else(|| Self::missing(id))
    }

    async fn fetch_players<'e, E>(executor: E, id: TournamentId) -> StoreResult<Vec<PlayerEntry>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let rows: Vec<(i64, String)> =
            sqlx::query_as("SELECT id, name FROM players WHERE tournament_id = ? ORDER BY id")
                .bind(id.0)
                .fetch_all(executor)
                .await
                .map_err(store_error)?;
        Ok(rows
            .into_iter()
            .map(|(player_id, name)| PlayerEntry {
                player_id: PlayerId(player_id),
                name,
            })
            .collect())
    }

    async fn fetch_matches<'e, E>(executor: E, id: TournamentId) -> StoreResult<Vec<MatchRow>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let rows: Vec<(i64, i64, Option<i64>)> = sqlx::query_as(
            "SELECT id, player_a, player_b FROM matches WHERE tournament_id = ? ORDER BY id",
        )
        .bind(id.0)
        .fetch_all(executor)
        .await
        .map_err(store_error)?;
        Ok(rows
            .into_iter()
            .map(|(match_id, player_a, player_b)| MatchRow {
                match_id: MatchId(match_id),
                player_a: PlayerId(player_a),
                player_b: player_b.map(PlayerId),
            })
            .collect())
    }

    async fn fetch_records<'e, E>(executor: E, id: TournamentId) -> StoreResult<Vec<RecordRow>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let rows: Vec<(i64, i64, String)> = sqlx::query_as(
            "SELECT r.match_id, r.player_id, r.outcome FROM records r \
             JOIN matches m ON m.id = r.match_id \
             WHERE m.tournament_id = ? ORDER BY r.match_id, r.player_id",
        )
        .bind(id.0)
        .fetch_all(executor)
        .await
        .map_err(store_error)?;
        rows.into_iter()
            .map(|(match_id, player_id, outcome)| {
                let outcome: OutcomeFlag = outcome
                    .parse()
                    .map_err(|e| StoreError::Storage(format!("corrupt record: {}", e)))?;
                Ok(RecordRow {
                    match_id: MatchId(match_id),
                    player_id: PlayerId(player_id),
                    outcome,
                })
            })
            .collect::<StoreResult<Vec<RecordRow>>>()
    }
}

#[async_trait::async_trait]
impl TournamentStore for SqliteTournamentStore {
    async fn create_tournament(&self, name: &str) -> StoreResult<Tournament> {
        let res = sqlx::query("INSERT INTO tournaments (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(Tournament {
            id: TournamentId(res.last_insert_rowid()),
            name: name.to_string(),
        })
    }

    async fn get_tournament(&self, id: TournamentId) -> StoreResult<Tournament> {
        let row: Option<(String,)> = sqlx::query_as("SELECT name FROM tournaments WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        let (name,) = row.ok_or_else(|| Self::missing(id))?;
        Ok(Tournament { id, name })
    }

    async fn delete_tournament(&self, id: TournamentId) -> StoreResult<()> {
        let res = sqlx::query("DELETE FROM tournaments WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        if res.rows_affected() == 0 {
            return Err(Self::missing(id));
        }
        Ok(())
    }

    async fn register_player(
        &self,
        tournament: TournamentId,
        name: &str,
    ) -> StoreResult<PlayerEntry> {
        Self::ensure_tournament(&self.pool, tournament).await?;
        let res = sqlx::query("INSERT INTO players (tournament_id, name) VALUES (?, ?)")
            .bind(tournament.0)
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(PlayerEntry {
            player_id: PlayerId(res.last_insert_rowid()),
            name: name.to_string(),
        })
    }

    async fn delete_player(&self, tournament: TournamentId, player: PlayerId) -> StoreResult<()> {
        Self::ensure_tournament(&self.pool, tournament).await?;
        let res = sqlx::query("DELETE FROM players WHERE id = ? AND tournament_id = ?")
            .bind(player.0)
            .bind(tournament.0)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!(
                "player {} in tournament {}",
                player, tournament
            )));
        }
        Ok(())
    }

    async fn delete_players(&self, tournament: TournamentId) -> StoreResult<u64> {
        Self::ensure_tournament(&self.pool, tournament).await?;
        let res = sqlx::query("DELETE FROM players WHERE tournament_id = ?")
            .bind(tournament.0)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(res.rows_affected())
    }

    async fn delete_matches(&self, tournament: TournamentId) -> StoreResult<u64> {
        Self::ensure_tournament(&self.pool, tournament).await?;
        let res = sqlx::query("DELETE FROM matches WHERE tournament_id = ?")
            .bind(tournament.0)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(res.rows_affected())
    }

    async fn list_players(&self, tournament: TournamentId) -> StoreResult<Vec<PlayerEntry>> {
        Self::ensure_tournament(&self.pool, tournament).await?;
        Self::fetch_players(&self.pool, tournament).await
    }

    async fn list_matches(&self, tournament: TournamentId) -> StoreResult<Vec<MatchRow>> {
        Self::ensure_tournament(&self.pool, tournament).await?;
        Self::fetch_matches(&self.pool, tournament).await
    }

    async fn list_records(&self, tournament: TournamentId) -> StoreResult<Vec<RecordRow>> {
        Self::ensure_tournament(&self.pool, tournament).await?;
        Self::fetch_records(&self.pool, tournament).await
    }

    async fn count_players(&self, tournament: TournamentId) -> StoreResult<usize> {
        Self::ensure_tournament(&self.pool, tournament).await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM players WHERE tournament_id = ?")
            .bind(tournament.0)
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(count as usize)
    }

    async fn append_match(
        &self,
        tournament: TournamentId,
        new_match: &NewMatch,
    ) -> StoreResult<MatchId> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;
        Self::ensure_tournament(&mut *tx, tournament).await?;

        let res = sqlx::query(
            "INSERT INTO matches (tournament_id, player_a, player_b) VALUES (?, ?, ?)",
        )
        .bind(tournament.0)
        .bind(new_match.player_a.0)
        .bind(new_match.player_b.map(|p| p.0))
        .execute(&mut *tx)
        .await
        .map_err(store_error)?;
        let match_id = res.last_insert_rowid();

        for (player_id, outcome) in &new_match.records {
            sqlx::query("INSERT INTO records (match_id, player_id, outcome) VALUES (?, ?, ?)")
                .bind(match_id)
                .bind(player_id.0)
                .bind(outcome.as_str())
                .execute(&mut *tx)
                .await
                .map_err(store_error)?;
        }

        tx.commit().await.map_err(store_error)?;
        Ok(MatchId(match_id))
    }

    async fn snapshot(&self, tournament: TournamentId) -> StoreResult<LedgerSnapshot> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;
        Self::ensure_tournament(&mut *tx, tournament).await?;
        let players = Self::fetch_players(&mut *tx, tournament).await?;
        let matches = Self::fetch_matches(&mut *tx, tournament).await?;
        let records = Self::fetch_records(&mut *tx, tournament).await?;
        tx.commit().await.map_err(store_error)?;
        Ok(LedgerSnapshot {
            players,
            matches,
            records,
        })
    }
}
