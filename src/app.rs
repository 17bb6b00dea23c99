use std::sync::Arc;

use swiss_domain::{
    ledger::{ArcLedgerService, LedgerServiceImpl, TournamentLocks},
    pairing::{ArcPairingService, PairingServiceImpl, PairingStrategy},
    registry::{ArcRegistryService, RegistryServiceImpl},
    round::{ArcRoundService, RoundServiceImpl},
    standings::{ArcStandingsService, StandingsServiceImpl},
    store::ArcTournamentStore,
};

#[derive(Clone)]
pub struct AppState {
    pub ledger_service: ArcLedgerService,
    pub standings_service: ArcStandingsService,
    pub pairing_service: ArcPairingService,
    pub round_service: ArcRoundService,
    pub registry_service: ArcRegistryService,
}

impl AppState {
    pub fn new(store: ArcTournamentStore, strategy: PairingStrategy) -> Self {
        let locks = Arc::new(TournamentLocks::new());

        let ledger_service: ArcLedgerService = Arc::new(Box::new(LedgerServiceImpl::new(
            store.clone(),
            locks.clone(),
        )));
        let standings_service: ArcStandingsService =
            Arc::new(Box::new(StandingsServiceImpl::new(ledger_service.clone())));
        let pairing_service: ArcPairingService = Arc::new(Box::new(PairingServiceImpl::new(
            ledger_service.clone(),
            strategy,
        )));
        let round_service: ArcRoundService =
            Arc::new(Box::new(RoundServiceImpl::new(ledger_service.clone())));
        let registry_service: ArcRegistryService =
            Arc::new(Box::new(RegistryServiceImpl::new(store, locks)));

        Self {
            ledger_service,
            standings_service,
            pairing_service,
            round_service,
            registry_service,
        }
    }
}
