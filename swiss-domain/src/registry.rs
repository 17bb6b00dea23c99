use std::sync::Arc;

use log::info;

use crate::{
    ServiceError, ServiceResult,
    ledger::ArcTournamentLocks,
    store::ArcTournamentStore,
    tournament::{PlayerEntry, PlayerId, Tournament, TournamentId},
};

pub type ArcRegistryService = Arc<Box<dyn RegistryService + Send + Sync + 'static>>;

#[async_trait::async_trait]
pub trait RegistryService {
    async fn create_tournament(&self, name: &str) -> ServiceResult<Tournament>;
    async fn delete_tournament(&self, tournament: TournamentId) -> ServiceResult<()>;
    async fn register_player(
        &self,
        tournament: TournamentId,
        name: &str,
    ) -> ServiceResult<PlayerEntry>;
    async fn count_players(&self, tournament: TournamentId) -> ServiceResult<usize>;
    /// Removes every match and record, keeping the players registered.
    async fn delete_matches(&self, tournament: TournamentId) -> ServiceResult<u64>;
    /// Removes every player together with their matches and records.
    async fn delete_players(&self, tournament: TournamentId) -> ServiceResult<u64>;
    async fn purge_player(&self, tournament: TournamentId, player: PlayerId) -> ServiceResult<()>;
}

pub struct RegistryServiceImpl {
    store: ArcTournamentStore,
    locks: ArcTournamentLocks,
}

impl RegistryServiceImpl {
    pub fn new(store: ArcTournamentStore, locks: ArcTournamentLocks) -> Self {
        Self { store, locks }
    }

    fn validate_name(kind: &str, name: &str) -> ServiceResult<String> {
        let name = name.trim();
        if name.is_empty() {
            return ServiceError::invalid_argument(format!("{} name must not be empty", kind));
        }
        Ok(name.to_string())
    }
}

#[async_trait::async_trait]
impl RegistryService for RegistryServiceImpl {
    async fn create_tournament(&self, name: &str) -> ServiceResult<Tournament> {
        let name = Self::validate_name("tournament", name)?;
        let tournament = self.store.create_tournament(&name).await?;
        info!("Created tournament {} ({})", tournament.id, tournament.name);
        Ok(tournament)
    }

    async fn delete_tournament(&self, tournament: TournamentId) -> ServiceResult<()> {
        let lock = self.locks.lock_existing(&self.store, tournament).await?;
        {
            let _guard = lock.write().await;
            self.store
                .delete_tournament(tournament)
                .await
                .map_err(ServiceError::from_lookup)?;
        }
        self.locks.forget(tournament);
        info!("Deleted tournament {}", tournament);
        Ok(())
    }

    async fn register_player(
        &self,
        tournament: TournamentId,
        name: &str,
    ) -> ServiceResult<PlayerEntry> {
        let name = Self::validate_name("player", name)?;
        let lock = self.locks.lock_existing(&self.store, tournament).await?;
        let _guard = lock.write().await;
        let entry = self
            .store
            .register_player(tournament, &name)
            .await
            .map_err(ServiceError::from_lookup)?;
        info!(
            "Registered player {} ({}) in tournament {}",
            entry.player_id, entry.name, tournament
        );
        Ok(entry)
    }

    async fn count_players(&self, tournament: TournamentId) -> ServiceResult<usize> {
        self.store
            .count_players(tournament)
            .await
            .map_err(ServiceError::from_lookup)
    }

    async fn delete_matches(&self, tournament: TournamentId) -> ServiceResult<u64> {
        let lock = self.locks.lock_existing(&self.store, tournament).await?;
        let _guard = lock.write().await;
        let removed = self
            .store
            .delete_matches(tournament)
            .await
            .map_err(ServiceError::from_lookup)?;
        info!("Deleted {} matches from tournament {}", removed, tournament);
        Ok(removed)
    }

    async fn delete_players(&self, tournament: TournamentId) -> ServiceResult<u64> {
        let lock = self.locks.lock_existing(&self.store, tournament).await?;
        let _guard = lock.write().await;
        let removed = self
            .store
            .delete_players(tournament)
            .await
            .map_err(ServiceError::from_lookup)?;
        info!("Deleted {} players from tournament {}", removed, tournament);
        Ok(removed)
    }

    async fn purge_player(&self, tournament: TournamentId, player: PlayerId) -> ServiceResult<()> {
        let lock = self.locks.lock_existing(&self.store, tournament).await?;
        let _guard = lock.write().await;
        self.store
            .delete_player(tournament, player)
            .await
            .map_err(ServiceError::from_lookup)?;
        info!("Purged player {} from tournament {}", player, tournament);
        Ok(())
    }
}
