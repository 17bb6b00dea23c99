use std::{collections::HashMap, sync::Arc};

use serde::Serialize;

use crate::{
    ServiceResult,
    ledger::ArcLedgerService,
    tournament::{LedgerSnapshot, PlayerId, TournamentId},
};

/// Progress of the current round, derived from how often each player appears in the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RoundStatus {
    pub round: u32,
    pub complete: bool,
    pub pending: Vec<PlayerId>,
}

pub fn round_status(snapshot: &LedgerSnapshot) -> RoundStatus {
    let mut appearances: HashMap<PlayerId, u32> = snapshot
        .players
        .iter()
        .map(|p| (p.player_id, 0))
        .collect();
    for m in &snapshot.matches {
        for player in std::iter::once(m.player_a).chain(m.player_b) {
            if let Some(count) = appearances.get_mut(&player) {
                *count += 1;
            }
        }
    }

    let round = appearances.values().copied().max().unwrap_or(0);
    let mut pending: Vec<PlayerId> = appearances
        .into_iter()
        .filter(|(_, count)| *count < round)
        .map(|(player, _)| player)
        .collect();
    pending.sort();

    RoundStatus {
        round,
        complete: pending.is_empty(),
        pending,
    }
}

pub type ArcRoundService = Arc<Box<dyn RoundService + Send + Sync + 'static>>;

#[async_trait::async_trait]
pub trait RoundService {
    async fn round_status(&self, tournament: TournamentId) -> ServiceResult<RoundStatus>;
}

pub struct RoundServiceImpl {
    ledger: ArcLedgerService,
}

impl RoundServiceImpl {
    pub fn new(ledger: ArcLedgerService) -> Self {
        Self { ledger }
    }
}

#[async_trait::async_trait]
impl RoundService for RoundServiceImpl {
    async fn round_status(&self, tournament: TournamentId) -> ServiceResult<RoundStatus> {
        let snapshot = self.ledger.snapshot(tournament).await?;
        Ok(round_status(&snapshot))
    }
}
