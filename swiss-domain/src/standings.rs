use std::{collections::HashMap, sync::Arc};

use log::debug;
use serde::Serialize;

use crate::{
    ServiceResult,
    ledger::ArcLedgerService,
    tournament::{LedgerSnapshot, OutcomeFlag, PlayerId, TournamentId},
};

pub const POINTS_PER_WIN: u32 = 3;
pub const POINTS_PER_TIE: u32 = 1;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Standing {
    pub player_id: PlayerId,
    pub name: String,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub byes: u32,
    /// Wins, losses and ties. Byes are not matches.
    pub matches_played: u32,
    pub match_points: u32,
    pub omw: f64,
    pub score: f64,
}

#[derive(Clone, Copy, Debug, Default)]
struct Tally {
    wins: u32,
    losses: u32,
    ties: u32,
    byes: u32,
}

impl Tally {
    fn matches_played(&self) -> u32 {
        self.wins + self.losses + self.ties
    }

    fn match_points(&self) -> u32 {
        POINTS_PER_WIN * (self.wins + self.byes) + POINTS_PER_TIE * self.ties
    }
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Opponent match win fraction over the distinct opponents of `player`.
fn opponent_match_wins(
    snapshot: &LedgerSnapshot,
    tallies: &HashMap<PlayerId, Tally>,
    player: PlayerId,
) -> f64 {
    let (wins, matches) = snapshot
        .opponents_of(player)
        .into_iter()
        .filter_map(|opponent| tallies.get(&opponent))
        .fold((0u32, 0u32), |(wins, matches), tally| {
            (wins + tally.wins, matches + tally.matches_played())
        });
    if matches == 0 {
        return 0.0;
    }
    round_to_hundredths(wins as f64 / matches as f64)
}

/// Ranks every registered player of the snapshot.
///
/// Ordered by score descending; equal scores fall back to match points
/// descending and then player id ascending, so the order is total.
pub fn rank(snapshot: &LedgerSnapshot) -> Vec<Standing> {
    let mut tallies: HashMap<PlayerId, Tally> = snapshot
        .players
        .iter()
        .map(|p| (p.player_id, Tally::default()))
        .collect();
    for record in &snapshot.records {
        let Some(tally) = tallies.get_mut(&record.player_id) else {
            continue;
        };
        match record.outcome {
            OutcomeFlag::Win => tally.wins += 1,
            OutcomeFlag::Loss => tally.losses += 1,
            OutcomeFlag::Tie => tally.ties += 1,
            OutcomeFlag::Bye => tally.byes += 1,
        }
    }

    let mut standings: Vec<Standing> = snapshot
        .players
        .iter()
        .map(|player| {
            let tally = tallies.get(&player.player_id).copied().unwrap_or_default();
            let omw = opponent_match_wins(snapshot, &tallies, player.player_id);
            let match_points = tally.match_points();
            Standing {
                player_id: player.player_id,
                name: player.name.clone(),
                wins: tally.wins,
                losses: tally.losses,
                ties: tally.ties,
                byes: tally.byes,
                matches_played: tally.matches_played(),
                match_points,
                omw,
                score: match_points as f64 + omw,
            }
        })
        .collect();

    standings.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(b.match_points.cmp(&a.match_points))
            .then(a.player_id.cmp(&b.player_id))
    });
    standings
}

pub type ArcStandingsService = Arc<Box<dyn StandingsService + Send + Sync + 'static>>;

#[async_trait::async_trait]
pub trait StandingsService {
    async fn standings(&self, tournament: TournamentId) -> ServiceResult<Vec<Standing>>;
}

pub struct StandingsServiceImpl {
    ledger: ArcLedgerService,
}

impl StandingsServiceImpl {
    pub fn new(ledger: ArcLedgerService) -> Self {
        Self { ledger }
    }
}

#[async_trait::async_trait]
impl StandingsService for StandingsServiceImpl {
    async fn standings(&self, tournament: TournamentId) -> ServiceResult<Vec<Standing>> {
        let snapshot = self.ledger.snapshot(tournament).await?;
        let standings = rank(&snapshot);
        debug!(
            "Computed standings for tournament {} over {} players",
            tournament,
            standings.len()
        );
        Ok(standings)
    }
}
