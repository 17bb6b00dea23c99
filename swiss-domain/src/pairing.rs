use std::{str::FromStr, sync::Arc};

use log::{debug, warn};
use serde::Serialize;

use crate::{
    ServiceError, ServiceResult,
    ledger::ArcLedgerService,
    standings::{Standing, rank},
    tournament::{LedgerSnapshot, PlayerId, TournamentId},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Pairing {
    Match {
        player1: PlayerId,
        name1: String,
        player2: PlayerId,
        name2: String,
    },
    Bye {
        player: PlayerId,
        name: String,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PairingStrategy {
    /// Pairs positions (0,1), (2,3), ... without looking at previous meetings.
    #[default]
    Adjacent,
    /// Skips down the standings past opponents already met, falling back to
    /// the adjacent player when nobody else is left.
    AvoidRematch,
}

impl FromStr for PairingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "adjacent" => Ok(PairingStrategy::Adjacent),
            "avoid-rematch" => Ok(PairingStrategy::AvoidRematch),
            other => Err(format!(
                "unknown pairing strategy '{}', expected adjacent or avoid-rematch",
                other
            )),
        }
    }
}

/// Lowest ranked player who has not had a bye yet.
fn pick_bye(standings: &[Standing], snapshot: &LedgerSnapshot) -> Option<usize> {
    standings
        .iter()
        .enumerate()
        .rev()
        .find(|(_, s)| !snapshot.has_had_bye(s.player_id))
        .map(|(index, _)| index)
}

fn match_of(first: &Standing, second: &Standing) -> Pairing {
    Pairing::Match {
        player1: first.player_id,
        name1: first.name.clone(),
        player2: second.player_id,
        name2: second.name.clone(),
    }
}

/// Builds the next round from standings ranked best first.
pub fn pair_round(
    standings: &[Standing],
    snapshot: &LedgerSnapshot,
    strategy: PairingStrategy,
) -> ServiceResult<Vec<Pairing>> {
    let mut pool: Vec<&Standing> = standings.iter().collect();

    let bye = if pool.len() % 2 == 1 {
        let Some(index) = pick_bye(standings, snapshot) else {
            return Err(ServiceError::NoEligibleByeCandidate(pool.len()));
        };
        let player = pool.remove(index);
        Some(Pairing::Bye {
            player: player.player_id,
            name: player.name.clone(),
        })
    } else {
        None
    };

    let mut pairings = Vec::with_capacity(pool.len() / 2 + 1);
    match strategy {
        PairingStrategy::Adjacent => {
            for pair in pool.chunks_exact(2) {
                pairings.push(match_of(pair[0], pair[1]));
            }
        }
        PairingStrategy::AvoidRematch => {
            while !pool.is_empty() {
                let first = pool.remove(0);
                let partner = pool
                    .iter()
                    .position(|s| !snapshot.has_played(first.player_id, s.player_id))
                    .unwrap_or(0);
                let second = pool.remove(partner);
                pairings.push(match_of(first, second));
            }
        }
    }

    pairings.extend(bye);
    Ok(pairings)
}

pub type ArcPairingService = Arc<Box<dyn PairingService + Send + Sync + 'static>>;

#[async_trait::async_trait]
pub trait PairingService {
    async fn next_round_pairings(&self, tournament: TournamentId) -> ServiceResult<Vec<Pairing>>;
}

pub struct PairingServiceImpl {
    ledger: ArcLedgerService,
    strategy: PairingStrategy,
}

impl PairingServiceImpl {
    pub fn new(ledger: ArcLedgerService, strategy: PairingStrategy) -> Self {
        Self { ledger, strategy }
    }
}

#[async_trait::async_trait]
impl PairingService for PairingServiceImpl {
    async fn next_round_pairings(&self, tournament: TournamentId) -> ServiceResult<Vec<Pairing>> {
        let snapshot = self.ledger.snapshot(tournament).await?;
        let standings = rank(&snapshot);
        match pair_round(&standings, &snapshot, self.strategy) {
            Ok(pairings) => {
                debug!(
                    "Generated {} pairings for tournament {} ({:?})",
                    pairings.len(),
                    tournament,
                    self.strategy
                );
                Ok(pairings)
            }
            Err(e) => {
                warn!("Cannot pair tournament {}: {}", tournament, e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        ledger::{LedgerService, LedgerServiceImpl, TournamentLocks},
        memory::InMemoryTournamentStore,
        store::{ArcTournamentStore, TournamentStore},
        tournament::Outcome,
    };

    use super::*;

    async fn setup(players: usize) -> (ArcLedgerService, TournamentId, Vec<PlayerId>) {
        let store: ArcTournamentStore = Arc::new(Box::new(InMemoryTournamentStore::new()));
        let tournament = store.create_tournament("swiss").await.expect("create").id;
        let mut ids = Vec::new();
        for i in 0..players {
            ids.push(
                store
                    .register_player(tournament, &format!("p{}", i + 1))
                    .await
                    .expect("register")
                    .player_id,
            );
        }
        let ledger: ArcLedgerService = Arc::new(Box::new(LedgerServiceImpl::new(
            store,
            Arc::new(TournamentLocks::new()),
        )));
        (ledger, tournament, ids)
    }

    fn ids(pairings: &[Pairing]) -> Vec<Vec<PlayerId>> {
        pairings
            .iter()
            .map(|p| match p {
                Pairing::Match {
                    player1, player2, ..
                } => vec![*player1, *player2],
                Pairing::Bye { player, .. } => vec![*player],
            })
            .collect()
    }

    #[tokio::test]
    async fn test_even_round_pairs_adjacent_standings() {
        let (ledger, t, p) = setup(4).await;
        ledger
            .record_match(t, p[0], p[1], Outcome::AWins)
            .await
            .expect("record");
        ledger
            .record_match(t, p[2], p[3], Outcome::BWins)
            .await
            .expect("record");
        let service = PairingServiceImpl::new(ledger, PairingStrategy::Adjacent);

        let pairings = service.next_round_pairings(t).await.expect("pairings");
        // Winners p1 and p4 meet, losers p2 and p3 meet.
        assert_eq!(ids(&pairings), vec![vec![p[0], p[3]], vec![p[1], p[2]]]);
        assert!(matches!(
            &pairings[0],
            Pairing::Match { name1, name2, .. } if name1 == "p1" && name2 == "p4"
        ));
    }

    #[tokio::test]
    async fn test_odd_round_gives_lowest_ranked_player_the_bye() {
        let (ledger, t, p) = setup(5).await;
        ledger
            .record_match(t, p[0], p[1], Outcome::AWins)
            .await
            .expect("record");
        ledger
            .record_match(t, p[2], p[3], Outcome::AWins)
            .await
            .expect("record");
        let service = PairingServiceImpl::new(ledger, PairingStrategy::Adjacent);

        let pairings = service.next_round_pairings(t).await.expect("pairings");
        // p5 has not played at all and ranks below the two losers.
        assert_eq!(
            ids(&pairings),
            vec![vec![p[0], p[2]], vec![p[1], p[3]], vec![p[4]]]
        );
        assert!(matches!(&pairings[2], Pairing::Bye { name, .. } if name == "p5"));
    }

    #[tokio::test]
    async fn test_bye_skips_players_who_already_had_one() {
        let (ledger, t, p) = setup(5).await;
        for player in &p[0..4] {
            ledger.record_bye(t, *player).await.expect("bye");
        }
        // p5 leads the standings but is the only one still owed a bye.
        ledger
            .record_match(t, p[4], p[0], Outcome::AWins)
            .await
            .expect("record");
        ledger
            .record_match(t, p[4], p[1], Outcome::AWins)
            .await
            .expect("record");
        let service = PairingServiceImpl::new(ledger, PairingStrategy::Adjacent);

        let pairings = service.next_round_pairings(t).await.expect("pairings");
        assert_eq!(
            ids(&pairings),
            vec![vec![p[0], p[1]], vec![p[2], p[3]], vec![p[4]]]
        );
    }

    #[tokio::test]
    async fn test_no_eligible_bye_candidate() {
        let (ledger, t, p) = setup(5).await;
        for player in &p {
            ledger.record_bye(t, *player).await.expect("bye");
        }
        let service = PairingServiceImpl::new(ledger, PairingStrategy::Adjacent);

        assert!(matches!(
            service.next_round_pairings(t).await,
            Err(ServiceError::NoEligibleByeCandidate(5))
        ));
    }

    #[tokio::test]
    async fn test_pairings_are_deterministic() {
        let (ledger, t, p) = setup(7).await;
        ledger
            .record_match(t, p[4], p[1], Outcome::Tie)
            .await
            .expect("record");
        ledger
            .record_match(t, p[6], p[0], Outcome::AWins)
            .await
            .expect("record");
        let service = PairingServiceImpl::new(ledger, PairingStrategy::Adjacent);

        let first = service.next_round_pairings(t).await.expect("first");
        let second = service.next_round_pairings(t).await.expect("second");
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
        assert_eq!(
            first
                .iter()
                .filter(|p| matches!(p, Pairing::Match { .. }))
                .count(),
            3
        );
    }

    #[tokio::test]
    async fn test_adjacent_strategy_allows_rematch() {
        let (ledger, t, p) = setup(4).await;
        // p1 and p2 tie, p3 and p4 play nothing yet: p1, p2 stay adjacent.
        ledger
            .record_match(t, p[0], p[1], Outcome::Tie)
            .await
            .expect("record");

        let adjacent = PairingServiceImpl::new(ledger.clone(), PairingStrategy::Adjacent);
        let pairings = adjacent.next_round_pairings(t).await.expect("pairings");
        assert_eq!(ids(&pairings), vec![vec![p[0], p[1]], vec![p[2], p[3]]]);

        let strict = PairingServiceImpl::new(ledger, PairingStrategy::AvoidRematch);
        let pairings = strict.next_round_pairings(t).await.expect("pairings");
        assert_eq!(ids(&pairings), vec![vec![p[0], p[2]], vec![p[1], p[3]]]);
    }

    #[tokio::test]
    async fn test_empty_tournament_has_no_pairings() {
        let (ledger, t, _) = setup(0).await;
        let service = PairingServiceImpl::new(ledger, PairingStrategy::Adjacent);
        assert!(service.next_round_pairings(t).await.expect("pairings").is_empty());
    }

    #[test]
    fn test_parse_strategy() {
        assert_eq!(
            "avoid-rematch".parse::<PairingStrategy>(),
            Ok(PairingStrategy::AvoidRematch)
        );
        assert_eq!("Adjacent".parse::<PairingStrategy>(), Ok(PairingStrategy::Adjacent));
        assert!("random".parse::<PairingStrategy>().is_err());
    }
}
