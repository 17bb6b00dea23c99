use std::{collections::BTreeSet, str::FromStr};

use serde::Serialize;

use crate::{ServiceError, ServiceResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TournamentId(pub i64);

impl std::fmt::Display for TournamentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PlayerId(pub i64);

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MatchId(pub i64);

impl std::fmt::Display for MatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of a match as reported by the caller, relative to the argument order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    AWins,
    BWins,
    Tie,
}

impl FromStr for Outcome {
    type Err = ServiceError;

    fn from_str(s: &str) -> ServiceResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" => Ok(Outcome::AWins),
            "b" => Ok(Outcome::BWins),
            "tie" => Ok(Outcome::Tie),
            other => ServiceError::invalid_argument(format!(
                "unknown outcome '{}', expected one of a, b, tie",
                other
            )),
        }
    }
}

/// Outcome stored on a single record, from the owning player's point of view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeFlag {
    Win,
    Loss,
    Tie,
    Bye,
}

impl OutcomeFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeFlag::Win => "win",
            OutcomeFlag::Loss => "loss",
            OutcomeFlag::Tie => "tie",
            OutcomeFlag::Bye => "bye",
        }
    }
}

impl FromStr for OutcomeFlag {
    type Err = ServiceError;

    fn from_str(s: &str) -> ServiceResult<Self> {
        match s {
            "win" => Ok(OutcomeFlag::Win),
            "loss" => Ok(OutcomeFlag::Loss),
            "tie" => Ok(OutcomeFlag::Tie),
            "bye" => Ok(OutcomeFlag::Bye),
            other => ServiceError::invalid_argument(format!("unknown outcome flag '{}'", other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlayerEntry {
    pub player_id: PlayerId,
    pub name: String,
}

/// A stored match. `player_b` is `None` for a bye, otherwise `player_a < player_b`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchRow {
    pub match_id: MatchId,
    pub player_a: PlayerId,
    pub player_b: Option<PlayerId>,
}

impl MatchRow {
    pub fn is_bye(&self) -> bool {
        self.player_b.is_none()
    }

    pub fn involves(&self, player: PlayerId) -> bool {
        self.player_a == player || self.player_b == Some(player)
    }

    pub fn opponent_of(&self, player: PlayerId) -> Option<PlayerId> {
        match self.player_b {
            Some(b) if self.player_a == player => Some(b),
            Some(b) if b == player => Some(self.player_a),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordRow {
    pub match_id: MatchId,
    pub player_id: PlayerId,
    pub outcome: OutcomeFlag,
}

/// A match to be appended together with its records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewMatch {
    pub player_a: PlayerId,
    pub player_b: Option<PlayerId>,
    pub records: Vec<(PlayerId, OutcomeFlag)>,
}

impl NewMatch {
    pub fn played(player_a: PlayerId, player_b: PlayerId, outcome: Outcome) -> Self {
        let (flag_a, flag_b) = match outcome {
            Outcome::AWins => (OutcomeFlag::Win, OutcomeFlag::Loss),
            Outcome::BWins => (OutcomeFlag::Loss, OutcomeFlag::Win),
            Outcome::Tie => (OutcomeFlag::Tie, OutcomeFlag::Tie),
        };
        let (low, high) = canonical_pair(player_a, player_b);
        Self {
            player_a: low,
            player_b: Some(high),
            records: vec![(player_a, flag_a), (player_b, flag_b)],
        }
    }

    pub fn bye(player: PlayerId) -> Self {
        Self {
            player_a: player,
            player_b: None,
            records: vec![(player, OutcomeFlag::Bye)],
        }
    }
}

pub fn canonical_pair(a: PlayerId, b: PlayerId) -> (PlayerId, PlayerId) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Everything the engine needs about one tournament, read in one consistent pass.
#[derive(Clone, Debug, Default)]
pub struct LedgerSnapshot {
    pub players: Vec<PlayerEntry>,
    pub matches: Vec<MatchRow>,
    pub records: Vec<RecordRow>,
}

impl LedgerSnapshot {
    pub fn is_member(&self, player: PlayerId) -> bool {
        self.players.iter().any(|p| p.player_id == player)
    }

    pub fn has_played(&self, a: PlayerId, b: PlayerId) -> bool {
        let (low, high) = canonical_pair(a, b);
        self.matches
            .iter()
            .any(|m| m.player_a == low && m.player_b == Some(high))
    }

    pub fn has_had_bye(&self, player: PlayerId) -> bool {
        self.matches
            .iter()
            .any(|m| m.is_bye() && m.player_a == player)
    }

    pub fn opponents_of(&self, player: PlayerId) -> BTreeSet<PlayerId> {
        self.matches
            .iter()
            .filter_map(|m| m.opponent_of(player))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_played_match_is_canonical() {
        let m = NewMatch::played(PlayerId(7), PlayerId(3), Outcome::AWins);
        assert_eq!(m.player_a, PlayerId(3));
        assert_eq!(m.player_b, Some(PlayerId(7)));
        assert_eq!(
            m.records,
            vec![
                (PlayerId(7), OutcomeFlag::Win),
                (PlayerId(3), OutcomeFlag::Loss)
            ]
        );
    }

    #[test]
    fn test_parse_outcome() {
        assert_eq!("A".parse::<Outcome>().ok(), Some(Outcome::AWins));
        assert_eq!(" tie ".parse::<Outcome>().ok(), Some(Outcome::Tie));
        assert!(matches!(
            "draw".parse::<Outcome>(),
            Err(ServiceError::InvalidArgument(..))
        ));
    }

    #[test]
    fn test_snapshot_relations() {
        let snapshot = LedgerSnapshot {
            players: vec![],
            matches: vec![
                MatchRow {
                    match_id: MatchId(1),
                    player_a: PlayerId(1),
                    player_b: Some(PlayerId(2)),
                },
                MatchRow {
                    match_id: MatchId(2),
                    player_a: PlayerId(3),
                    player_b: None,
                },
            ],
            records: vec![],
        };
        assert!(snapshot.has_played(PlayerId(2), PlayerId(1)));
        assert!(!snapshot.has_played(PlayerId(1), PlayerId(3)));
        assert!(snapshot.has_had_bye(PlayerId(3)));
        assert!(!snapshot.has_had_bye(PlayerId(1)));
        assert!(snapshot.opponents_of(PlayerId(3)).is_empty());
        assert_eq!(
            snapshot.opponents_of(PlayerId(1)).into_iter().collect::<Vec<_>>(),
            vec![PlayerId(2)]
        );
    }
}
