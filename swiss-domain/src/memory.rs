use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::DashMap;

use crate::{
    store::{StoreError, StoreResult, TournamentStore},
    tournament::{
        LedgerSnapshot, MatchId, MatchRow, NewMatch, PlayerEntry, PlayerId, RecordRow, Tournament,
        TournamentId,
    },
};

#[derive(Debug, Default)]
struct TournamentTables {
    name: String,
    players: Vec<PlayerEntry>,
    matches: Vec<MatchRow>,
    records: Vec<RecordRow>,
}

impl TournamentTables {
    fn conflicts_with(&self, new_match: &NewMatch) -> bool {
        self.matches
            .iter()
            .any(|m| m.player_a == new_match.player_a && m.player_b == new_match.player_b)
    }

    fn drop_matches_of(&mut self, player: PlayerId) {
        let removed: Vec<MatchId> = self
            .matches
            .iter()
            .filter(|m| m.involves(player))
            .map(|m| m.match_id)
            .collect();
        self.matches.retain(|m| !removed.contains(&m.match_id));
        self.records.retain(|r| !removed.contains(&r.match_id));
    }
}

/// Process-local store. Each tournament lives in one map entry, so every
/// write to a tournament holds that entry exclusively for its duration.
pub struct InMemoryTournamentStore {
    tournaments: DashMap<TournamentId, TournamentTables>,
    next_tournament_id: AtomicI64,
    next_player_id: AtomicI64,
    next_match_id: AtomicI64,
}

impl InMemoryTournamentStore {
    pub fn new() -> Self {
        Self {
            tournaments: DashMap::new(),
            next_tournament_id: AtomicI64::new(1),
            next_player_id: AtomicI64::new(1),
            next_match_id: AtomicI64::new(1),
        }
    }

    fn missing(id: TournamentId) -> StoreError {
        StoreError::NotFound(format!("tournament {}", id))
    }
}

impl Default for InMemoryTournamentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TournamentStore for InMemoryTournamentStore {
    async fn create_tournament(&self, name: &str) -> StoreResult<Tournament> {
        let id = TournamentId(self.next_tournament_id.fetch_add(1, Ordering::SeqCst));
        self.tournaments.insert(
            id,
            TournamentTables {
                name: name.to_string(),
                ..Default::default()
            },
        );
        Ok(Tournament {
            id,
            name: name.to_string(),
        })
    }

    async fn get_tournament(&self, id: TournamentId) -> StoreResult<Tournament> {
        let tables = self.tournaments.get(&id).ok_or_else(|| Self::missing(id))?;
        Ok(Tournament {
            id,
            name: tables.name.clone(),
        })
    }

    async fn delete_tournament(&self, id: TournamentId) -> StoreResult<()> {
        self.tournaments
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Self::missing(id))
    }

    async fn register_player(
        &self,
        tournament: TournamentId,
        name: &str,
    ) -> StoreResult<PlayerEntry> {
        let mut tables = self
            .tournaments
            .get_mut(&tournament)
            .ok_or_else(|| Self::missing(tournament))?;
        let entry = PlayerEntry {
            player_id: PlayerId(self.next_player_id.fetch_add(1, Ordering::SeqCst)),
            name: name.to_string(),
        };
        tables.players.push(entry.clone());
        Ok(entry)
    }

    async fn delete_player(&self, tournament: TournamentId, player: PlayerId) -> StoreResult<()> {
        let mut tables = self
            .tournaments
            .get_mut(&tournament)
            .ok_or_else(|| Self::missing(tournament))?;
        let before = tables.players.len();
        tables.players.retain(|p| p.player_id != player);
        if tables.players.len() == before {
            return Err(StoreError::NotFound(format!(
                "player {} in tournament {}",
                player, tournament
            )));
        }
        tables.drop_matches_of(player);
        Ok(())
    }

    async fn delete_players(&self, tournament: TournamentId) -> StoreResult<u64> {
        let mut tables = self
            .tournaments
            .get_mut(&tournament)
            .ok_or_else(|| Self::missing(tournament))?;
        let removed = tables.players.len() as u64;
        tables.players.clear();
        tables.matches.clear();
        tables.records.clear();
        Ok(removed)
    }

    async fn delete_matches(&self, tournament: TournamentId) -> StoreResult<u64> {
        let mut tables = self
            .tournaments
            .get_mut(&tournament)
            .ok_or_else(|| Self::missing(tournament))?;
        let removed = tables.matches.len() as u64;
        tables.matches.clear();
        tables.records.clear();
        Ok(removed)
    }

    async fn list_players(&self, tournament: TournamentId) -> StoreResult<Vec<PlayerEntry>> {
        let tables = self
            .tournaments
            .get(&tournament)
            .ok_or_else(|| Self::missing(tournament))?;
        Ok(tables.players.clone())
    }

    async fn list_matches(&self, tournament: TournamentId) -> StoreResult<Vec<MatchRow>> {
        let tables = self
            .tournaments
            .get(&tournament)
            .ok_or_else(|| Self::missing(tournament))?;
        Ok(tables.matches.clone())
    }

    async fn list_records(&self, tournament: TournamentId) -> StoreResult<Vec<RecordRow>> {
        let tables = self
            .tournaments
            .get(&tournament)
            .ok_or_else(|| Self::missing(tournament))?;
        Ok(tables.records.clone())
    }

    async fn append_match(
        &self,
        tournament: TournamentId,
        new_match: &NewMatch,
    ) -> StoreResult<MatchId> {
        let mut tables = self
            .tournaments
            .get_mut(&tournament)
            .ok_or_else(|| Self::missing(tournament))?;
        if tables.conflicts_with(new_match) {
            return Err(StoreError::Conflict(match new_match.player_b {
                Some(b) => format!("players {} and {} already met", new_match.player_a, b),
                None => format!("player {} already had a bye", new_match.player_a),
            }));
        }
        let match_id = MatchId(self.next_match_id.fetch_add(1, Ordering::SeqCst));
        tables.matches.push(MatchRow {
            match_id,
            player_a: new_match.player_a,
            player_b: new_match.player_b,
        });
        for (player_id, outcome) in &new_match.records {
            tables.records.push(RecordRow {
                match_id,
                player_id: *player_id,
                outcome: *outcome,
            });
        }
        Ok(match_id)
    }

    async fn snapshot(&self, tournament: TournamentId) -> StoreResult<LedgerSnapshot> {
        let tables = self
            .tournaments
            .get(&tournament)
            .ok_or_else(|| Self::missing(tournament))?;
        Ok(LedgerSnapshot {
            players: tables.players.clone(),
            matches: tables.matches.clone(),
            records: tables.records.clone(),
        })
    }
}
