use std::{collections::BTreeSet, sync::Arc};

use dashmap::DashMap;
use log::info;
use tokio::sync::RwLock;

use crate::{
    ServiceError, ServiceResult,
    store::{ArcTournamentStore, StoreError},
    tournament::{LedgerSnapshot, MatchId, NewMatch, Outcome, PlayerId, TournamentId},
};

/// One reader/writer lock per tournament. Ledger writes hold the write half
/// from validation to append; snapshots hold the read half.
pub struct TournamentLocks {
    locks: DashMap<TournamentId, Arc<RwLock<()>>>,
}

pub type ArcTournamentLocks = Arc<TournamentLocks>;

impl TournamentLocks {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    pub fn lock_for(&self, tournament: TournamentId) -> Arc<RwLock<()>> {
        self.locks.entry(tournament).or_default().clone()
    }

    /// Readers share the writers' lock when one exists and otherwise take an
    /// unshared one, so lookups of unknown tournaments leave no entry behind.
    pub fn read_lock_for(&self, tournament: TournamentId) -> Arc<RwLock<()>> {
        self.locks
            .get(&tournament)
            .map(|lock| lock.value().clone())
            .unwrap_or_default()
    }

    /// Write lock for a tournament the store knows about. Unknown ids fail
    /// with `NotFound` before any lock is registered.
    pub async fn lock_existing(
        &self,
        store: &ArcTournamentStore,
        tournament: TournamentId,
    ) -> ServiceResult<Arc<RwLock<()>>> {
        store
            .get_tournament(tournament)
            .await
            .map_err(ServiceError::from_lookup)?;
        Ok(self.lock_for(tournament))
    }

    pub fn forget(&self, tournament: TournamentId) {
        self.locks.remove(&tournament);
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.len()
    }
}

impl Default for TournamentLocks {
    fn default() -> Self {
        Self::new()
    }
}

pub type ArcLedgerService = Arc<Box<dyn LedgerService + Send + Sync + 'static>>;

#[async_trait::async_trait]
pub trait LedgerService {
    async fn record_match(
        &self,
        tournament: TournamentId,
        player_a: PlayerId,
        player_b: PlayerId,
        outcome: Outcome,
    ) -> ServiceResult<MatchId>;
    async fn record_bye(&self, tournament: TournamentId, player: PlayerId)
    -> ServiceResult<MatchId>;
    async fn has_played(
        &self,
        tournament: TournamentId,
        player_a: PlayerId,
        player_b: PlayerId,
    ) -> ServiceResult<bool>;
    async fn has_had_bye(&self, tournament: TournamentId, player: PlayerId) -> ServiceResult<bool>;
    async fn opponents_of(
        &self,
        tournament: TournamentId,
        player: PlayerId,
    ) -> ServiceResult<BTreeSet<PlayerId>>;
    async fn snapshot(&self, tournament: TournamentId) -> ServiceResult<LedgerSnapshot>;
}

pub struct LedgerServiceImpl {
    store: ArcTournamentStore,
    locks: ArcTournamentLocks,
}

impl LedgerServiceImpl {
    pub fn new(store: ArcTournamentStore, locks: ArcTournamentLocks) -> Self {
        Self { store, locks }
    }

    async fn append(
        &self,
        tournament: TournamentId,
        new_match: NewMatch,
    ) -> ServiceResult<MatchId> {
        match self.store.append_match(tournament, &new_match).await {
            Ok(match_id) => Ok(match_id),
            Err(StoreError::Conflict(msg)) => ServiceError::invalid_argument(msg),
            Err(e) => Err(ServiceError::from_lookup(e)),
        }
    }

    fn check_member(
        snapshot: &LedgerSnapshot,
        tournament: TournamentId,
        player: PlayerId,
    ) -> ServiceResult<()> {
        if !snapshot.is_member(player) {
            return ServiceError::invalid_argument(format!(
                "player {} is not registered in tournament {}",
                player, tournament
            ));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl LedgerService for LedgerServiceImpl {
    async fn record_match(
        &self,
        tournament: TournamentId,
        player_a: PlayerId,
        player_b: PlayerId,
        outcome: Outcome,
    ) -> ServiceResult<MatchId> {
        if player_a == player_b {
            return ServiceError::invalid_argument(format!(
                "player {} cannot play against themselves",
                player_a
            ));
        }
        let lock = self.locks.lock_existing(&self.store, tournament).await?;
        let _guard = lock.write().await;

        let snapshot = self
            .store
            .snapshot(tournament)
            .await
            .map_err(ServiceError::from_lookup)?;
        Self::check_member(&snapshot, tournament, player_a)?;
        Self::check_member(&snapshot, tournament, player_b)?;
        if snapshot.has_played(player_a, player_b) {
            return ServiceError::invalid_argument(format!(
                "players {} and {} have already played in tournament {}",
                player_a, player_b, tournament
            ));
        }

        let match_id = self
            .append(tournament, NewMatch::played(player_a, player_b, outcome))
            .await?;
        info!(
            "Recorded match {} in tournament {}: {} vs {} ({:?})",
            match_id, tournament, player_a, player_b, outcome
        );
        Ok(match_id)
    }

    async fn record_bye(
        &self,
        tournament: TournamentId,
        player: PlayerId,
    ) -> ServiceResult<MatchId> {
        let lock = self.locks.lock_existing(&self.store, tournament).await?;
        let _guard = lock.write().await;

        let snapshot = self
            .store
            .snapshot(tournament)
            .await
            .map_err(ServiceError::from_lookup)?;
        Self::check_member(&snapshot, tournament, player)?;
        if snapshot.has_had_bye(player) {
            return ServiceError::invalid_argument(format!(
                "player {} already had a bye in tournament {}",
                player, tournament
            ));
        }

        let match_id = self.append(tournament, NewMatch::bye(player)).await?;
        info!(
            "Recorded bye {} in tournament {} for player {}",
            match_id, tournament, player
        );
        Ok(match_id)
    }

    async fn has_played(
        &self,
        tournament: TournamentId,
        player_a: PlayerId,
        player_b: PlayerId,
    ) -> ServiceResult<bool> {
        Ok(self.snapshot(tournament).await?.has_played(player_a, player_b))
    }

    async fn has_had_bye(&self, tournament: TournamentId, player: PlayerId) -> ServiceResult<bool> {
        Ok(self.snapshot(tournament).await?.has_had_bye(player))
    }

    async fn opponents_of(
        &self,
        tournament: TournamentId,
        player: PlayerId,
    ) -> ServiceResult<BTreeSet<PlayerId>> {
        Ok(self.snapshot(tournament).await?.opponents_of(player))
    }

    async fn snapshot(&self, tournament: TournamentId) -> ServiceResult<LedgerSnapshot> {
        let lock = self.locks.read_lock_for(tournament);
        let _guard = lock.read().await;
        self.store
            .snapshot(tournament)
            .await
            .map_err(ServiceError::from_lookup)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        memory::InMemoryTournamentStore,
        store::{StoreResult, TournamentStore},
        tournament::{MatchRow, OutcomeFlag, PlayerEntry, RecordRow, Tournament},
    };

    use super::*;

    async fn setup(
        players: usize,
    ) -> (ArcTournamentStore, LedgerServiceImpl, TournamentId, Vec<PlayerId>) {
        let store: ArcTournamentStore = Arc::new(Box::new(InMemoryTournamentStore::new()));
        let tournament = store.create_tournament("open").await.expect("create").id;
        let mut ids = Vec::new();
        for i in 0..players {
            let entry = store
                .register_player(tournament, &format!("player{}", i + 1))
                .await
                .expect("register");
            ids.push(entry.player_id);
        }
        let ledger = LedgerServiceImpl::new(store.clone(), Arc::new(TournamentLocks::new()));
        (store, ledger, tournament, ids)
    }

    #[tokio::test]
    async fn test_record_match_writes_two_records() {
        let (_, ledger, t, p) = setup(2).await;
        ledger
            .record_match(t, p[1], p[0], Outcome::AWins)
            .await
            .expect("record");

        let snapshot = ledger.snapshot(t).await.expect("snapshot");
        assert_eq!(snapshot.matches.len(), 1);
        assert_eq!(snapshot.matches[0].player_a, p[0]);
        assert_eq!(snapshot.matches[0].player_b, Some(p[1]));
        assert!(
            snapshot
                .records
                .iter()
                .any(|r| r.player_id == p[1] && r.outcome == OutcomeFlag::Win)
        );
        assert!(
            snapshot
                .records
                .iter()
                .any(|r| r.player_id == p[0] && r.outcome == OutcomeFlag::Loss)
        );
    }

    #[tokio::test]
    async fn test_reversed_rematch_is_rejected() {
        let (_, ledger, t, p) = setup(2).await;
        ledger
            .record_match(t, p[0], p[1], Outcome::AWins)
            .await
            .expect("first");
        assert!(matches!(
            ledger.record_match(t, p[1], p[0], Outcome::AWins).await,
            Err(ServiceError::InvalidArgument(..))
        ));
        assert_eq!(ledger.snapshot(t).await.expect("snapshot").matches.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_participants() {
        let (store, ledger, t, p) = setup(2).await;
        assert!(matches!(
            ledger.record_match(t, p[0], p[0], Outcome::Tie).await,
            Err(ServiceError::InvalidArgument(..))
        ));

        let other = store.create_tournament("other").await.expect("create").id;
        let outsider = store
            .register_player(other, "outsider")
            .await
            .expect("register")
            .player_id;
        assert!(matches!(
            ledger.record_match(t, p[0], outsider, Outcome::Tie).await,
            Err(ServiceError::InvalidArgument(..))
        ));
        assert!(matches!(
            ledger.record_bye(t, outsider).await,
            Err(ServiceError::InvalidArgument(..))
        ));
        assert!(matches!(
            ledger.record_bye(TournamentId(999), p[0]).await,
            Err(ServiceError::NotFound(..))
        ));
    }

    #[tokio::test]
    async fn test_second_bye_is_rejected() {
        let (_, ledger, t, p) = setup(3).await;
        ledger.record_bye(t, p[2]).await.expect("bye");
        assert!(ledger.has_had_bye(t, p[2]).await.expect("query"));
        assert!(!ledger.has_had_bye(t, p[1]).await.expect("query"));
        assert!(matches!(
            ledger.record_bye(t, p[2]).await,
            Err(ServiceError::InvalidArgument(..))
        ));
    }

    #[tokio::test]
    async fn test_opponents_exclude_byes() {
        let (_, ledger, t, p) = setup(3).await;
        ledger
            .record_match(t, p[0], p[1], Outcome::Tie)
            .await
            .expect("match");
        ledger
            .record_match(t, p[2], p[0], Outcome::BWins)
            .await
            .expect("match");
        ledger.record_bye(t, p[1]).await.expect("bye");

        let opponents = ledger.opponents_of(t, p[0]).await.expect("query");
        assert_eq!(opponents.into_iter().collect::<Vec<_>>(), vec![p[1], p[2]]);
        let opponents = ledger.opponents_of(t, p[1]).await.expect("query");
        assert_eq!(opponents.into_iter().collect::<Vec<_>>(), vec![p[0]]);
        assert!(ledger.has_played(t, p[2], p[0]).await.expect("query"));
        assert!(!ledger.has_played(t, p[1], p[2]).await.expect("query"));
    }

    #[tokio::test]
    async fn test_racing_writers_for_same_pair() {
        let (_, ledger, t, p) = setup(2).await;
        let ledger = Arc::new(ledger);
        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = ledger.clone();
            let (a, b) = (p[0], p[1]);
            handles.push(tokio::spawn(async move {
                ledger.record_match(t, a, b, Outcome::Tie).await
            }));
        }
        let mut successes = 0;
        for handle in handles {
            match handle.await.expect("join") {
                Ok(_) => successes += 1,
                Err(e) => assert!(matches!(e, ServiceError::InvalidArgument(..))),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(ledger.snapshot(t).await.expect("snapshot").records.len(), 2);
    }

    #[tokio::test]
    async fn test_racing_byes_for_same_player() {
        let (_, ledger, t, p) = setup(3).await;
        let ledger = Arc::new(ledger);
        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = ledger.clone();
            let player = p[2];
            handles.push(tokio::spawn(
                async move { ledger.record_bye(t, player).await },
            ));
        }
        let mut successes = 0;
        for handle in handles {
            match handle.await.expect("join") {
                Ok(_) => successes += 1,
                Err(e) => assert!(matches!(e, ServiceError::InvalidArgument(..))),
            }
        }
        assert_eq!(successes, 1);
        let snapshot = ledger.snapshot(t).await.expect("snapshot");
        assert_eq!(snapshot.matches.len(), 1);
        assert_eq!(snapshot.records.len(), 1);
    }

    /// Serves snapshots without any matches, so only the store's own
    /// uniqueness check stands between the ledger and a duplicate.
    struct StaleSnapshotStore {
        inner: InMemoryTournamentStore,
    }

    #[async_trait::async_trait]
    impl TournamentStore for StaleSnapshotStore {
        async fn create_tournament(&self, name: &str) -> StoreResult<Tournament> {
            self.inner.create_tournament(name).await
        }

        async fn get_tournament(&self, id: TournamentId) -> StoreResult<Tournament> {
            self.inner.get_tournament(id).await
        }

        async fn delete_tournament(&self, id: TournamentId) -> StoreResult<()> {
            self.inner.delete_tournament(id).await
        }

        async fn register_player(
            &self,
            tournament: TournamentId,
            name: &str,
        ) -> StoreResult<PlayerEntry> {
            self.inner.register_player(tournament, name).await
        }

        async fn delete_player(
            &self,
            tournament: TournamentId,
            player: PlayerId,
        ) -> StoreResult<()> {
            self.inner.delete_player(tournament, player).await
        }

        async fn delete_players(&self, tournament: TournamentId) -> StoreResult<u64> {
            self.inner.delete_players(tournament).await
        }

        async fn delete_matches(&self, tournament: TournamentId) -> StoreResult<u64> {
            self.inner.delete_matches(tournament).await
        }

        async fn list_players(&self, tournament: TournamentId) -> StoreResult<Vec<PlayerEntry>> {
            self.inner.list_players(tournament).await
        }

        async fn list_matches(&self, _tournament: TournamentId) -> StoreResult<Vec<MatchRow>> {
            Ok(vec![])
        }

        async fn list_records(&self, _tournament: TournamentId) -> StoreResult<Vec<RecordRow>> {
            Ok(vec![])
        }

        async fn append_match(
            &self,
            tournament: TournamentId,
            new_match: &NewMatch,
        ) -> StoreResult<MatchId> {
            self.inner.append_match(tournament, new_match).await
        }
    }

    #[tokio::test]
    async fn test_store_conflict_is_invalid_argument() {
        let store: ArcTournamentStore = Arc::new(Box::new(StaleSnapshotStore {
            inner: InMemoryTournamentStore::new(),
        }));
        let t = store.create_tournament("open").await.expect("create").id;
        let a = store.register_player(t, "a").await.expect("a").player_id;
        let b = store.register_player(t, "b").await.expect("b").player_id;
        let ledger = LedgerServiceImpl::new(store.clone(), Arc::new(TournamentLocks::new()));

        ledger
            .record_match(t, a, b, Outcome::AWins)
            .await
            .expect("first");
        assert!(!ledger.has_played(t, a, b).await.expect("stale view"));
        assert!(matches!(
            ledger.record_match(t, b, a, Outcome::Tie).await,
            Err(ServiceError::InvalidArgument(..))
        ));

        ledger.record_bye(t, a).await.expect("bye");
        assert!(matches!(
            ledger.record_bye(t, a).await,
            Err(ServiceError::InvalidArgument(..))
        ));
    }

    #[tokio::test]
    async fn test_unknown_tournaments_leave_no_locks() {
        let (_, ledger, t, p) = setup(2).await;
        let missing = TournamentId(999);
        assert!(matches!(
            ledger.snapshot(missing).await,
            Err(ServiceError::NotFound(..))
        ));
        assert!(matches!(
            ledger.record_match(missing, p[0], p[1], Outcome::Tie).await,
            Err(ServiceError::NotFound(..))
        ));
        assert!(matches!(
            ledger.record_bye(missing, p[0]).await,
            Err(ServiceError::NotFound(..))
        ));
        assert_eq!(ledger.locks.tracked(), 0);

        ledger
            .record_match(t, p[0], p[1], Outcome::Tie)
            .await
            .expect("match");
        ledger.snapshot(t).await.expect("snapshot");
        assert_eq!(ledger.locks.tracked(), 1);
    }
}
