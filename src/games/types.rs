use crate::errors::BetError;
use crate::games::board::{BoardTopology, Color, MAX_NUMBER};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt, str::FromStr};

/// Odd or even
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    Odd,
    Even,
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parity::Odd => write!(f, "odd"),
            Parity::Even => write!(f, "even"),
        }
    }
}

/// What a bet covers.
///
/// Split and corner selections are kept sorted and can only be built from
/// board-adjacent numbers, so two descriptors covering the same numbers
/// always compare equal. The persisted form is the `Display` string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BetDescriptor {
    Straight(u8),
    Color(Color),
    Parity(Parity),
    Half(u8),
    Dozen(u8),
    Row(u8),
    Split([u8; 2]),
    Corner([u8; 4]),
}

impl BetDescriptor {
    pub fn straight(number: u8) -> Result<Self, BetError> {
        if number > MAX_NUMBER {
            return Err(BetError::InvalidDescriptor(format!(
                "{} is not on the wheel",
                number
            )));
        }
        Ok(BetDescriptor::Straight(number))
    }

    pub fn half(half: u8) -> Result<Self, BetError> {
        in_range("half", half, 2).map(BetDescriptor::Half)
    }

    pub fn dozen(dozen: u8) -> Result<Self, BetError> {
        in_range("group", dozen, 3).map(BetDescriptor::Dozen)
    }

    pub fn row(row: u8) -> Result<Self, BetError> {
        in_range("row", row, 3).map(BetDescriptor::Row)
    }

    /// Build a split or corner bet, rejecting anything that is not a
    /// board-adjacent pair or 2x2 block.
    pub fn neighbours(numbers: &[u8]) -> Result<Self, BetError> {
        let selection: BTreeSet<u8> = numbers.iter().copied().collect();
        if selection.len() != numbers.len()
            || !BoardTopology::get().is_valid_neighbour_group(&selection)
        {
            return Err(BetError::InvalidDescriptor(format!(
                "{} are not neighbours on the board",
                join_numbers(numbers)
            )));
        }

        let sorted: Vec<u8> = selection.into_iter().collect();
        Ok(match sorted.as_slice() {
            [a, b] => BetDescriptor::Split([*a, *b]),
            [a, b, c, d] => BetDescriptor::Corner([*a, *b, *c, *d]),
            _ => {
                return Err(BetError::InvalidDescriptor(
                    "neighbour bets cover two or four numbers".to_string(),
                ))
            }
        })
    }

    /// Check a descriptor built directly from its variants. Anything that
    /// passes here has a `Display` form that parses back to itself.
    pub fn validate(&self) -> Result<(), BetError> {
        let rebuilt = match self {
            BetDescriptor::Straight(n) => BetDescriptor::straight(*n)?,
            BetDescriptor::Color(_) | BetDescriptor::Parity(_) => return Ok(()),
            BetDescriptor::Half(h) => BetDescriptor::half(*h)?,
            BetDescriptor::Dozen(d) => BetDescriptor::dozen(*d)?,
            BetDescriptor::Row(r) => BetDescriptor::row(*r)?,
            BetDescriptor::Split(pair) => BetDescriptor::neighbours(pair)?,
            BetDescriptor::Corner(quad) => BetDescriptor::neighbours(quad)?,
        };
        if rebuilt != *self {
            return Err(BetError::InvalidDescriptor(format!(
                "{} must list its numbers in ascending order",
                self
            )));
        }
        Ok(())
    }

    /// Numbers covered by this bet
    pub fn selection(&self) -> Vec<u8> {
        let board = BoardTopology::get();
        match self {
            BetDescriptor::Straight(n) => vec![*n],
            BetDescriptor::Color(Color::Red) => board.red_numbers().to_vec(),
            BetDescriptor::Color(Color::Black) => board.black_numbers().to_vec(),
            BetDescriptor::Parity(p) => (1..=MAX_NUMBER)
                .filter(|n| (n % 2 == 1) == (*p == Parity::Odd))
                .collect(),
            BetDescriptor::Half(h) => (1..=MAX_NUMBER)
                .filter(|n| board.half_of(*n) == Some(*h))
                .collect(),
            BetDescriptor::Dozen(d) => (1..=MAX_NUMBER)
                .filter(|n| board.dozen_of(*n) == Some(*d))
                .collect(),
            BetDescriptor::Row(r) => (1..=MAX_NUMBER)
                .filter(|n| board.row_of(*n) == Some(*r))
                .collect(),
            BetDescriptor::Split(pair) => pair.to_vec(),
            BetDescriptor::Corner(quad) => quad.to_vec(),
        }
    }

    /// Payout factor applied to the stake when the bet wins
    pub fn multiplier(&self) -> i64 {
        match self {
            BetDescriptor::Straight(_) => 35,
            BetDescriptor::Split(pair) => 36 / pair.len() as i64,
            BetDescriptor::Corner(quad) => 36 / quad.len() as i64,
            BetDescriptor::Color(_) | BetDescriptor::Parity(_) | BetDescriptor::Half(_) => 2,
            BetDescriptor::Dozen(_) | BetDescriptor::Row(_) => 3,
        }
    }
}

fn in_range(kind: &str, value: u8, max: u8) -> Result<u8, BetError> {
    if (1..=max).contains(&value) {
        Ok(value)
    } else {
        Err(BetError::InvalidDescriptor(format!(
            "{} must be between 1 and {}, got {}",
            kind, max, value
        )))
    }
}

fn join_numbers(numbers: &[u8]) -> String {
    numbers
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join("-")
}

impl fmt::Display for BetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetDescriptor::Straight(n) => write!(f, "{}", n),
            BetDescriptor::Color(c) => write!(f, "{}", c),
            BetDescriptor::Parity(p) => write!(f, "{}", p),
            BetDescriptor::Half(h) => write!(f, "half {}", h),
            BetDescriptor::Dozen(d) => write!(f, "group {}", d),
            BetDescriptor::Row(r) => write!(f, "row {}", r),
            BetDescriptor::Split(pair) => write!(f, "neighbours {}", join_numbers(pair)),
            BetDescriptor::Corner(quad) => write!(f, "neighbours {}", join_numbers(quad)),
        }
    }
}

impl FromStr for BetDescriptor {
    type Err = BetError;

    /// Accepts the English and German bet keywords of the chat commands,
    /// e.g. `17`, `red`, `schwarz`, `half 2`, `gruppe 1`, `row 3`,
    /// `neighbours 1-2-4-5`.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        let mut parts = normalized.split_whitespace();
        let keyword = parts
            .next()
            .ok_or_else(|| BetError::InvalidDescriptor("empty bet".to_string()))?;
        let argument = parts.next();
        if parts.next().is_some() {
            return Err(BetError::InvalidDescriptor(input.to_string()));
        }

        let number_argument = |kind: &str| -> Result<u8, BetError> {
            argument
                .and_then(|a| a.parse::<u8>().ok())
                .ok_or_else(|| BetError::InvalidDescriptor(format!("{} needs a number", kind)))
        };

        match (keyword, argument) {
            ("red" | "rot", None) => Ok(BetDescriptor::Color(Color::Red)),
            ("black" | "schwarz", None) => Ok(BetDescriptor::Color(Color::Black)),
            ("odd" | "ungerade", None) => Ok(BetDescriptor::Parity(Parity::Odd)),
            ("even" | "gerade", None) => Ok(BetDescriptor::Parity(Parity::Even)),
            ("half" | "hälfte", Some(_)) => BetDescriptor::half(number_argument("half")?),
            ("group" | "gruppe" | "dozen", Some(_)) => {
                BetDescriptor::dozen(number_argument("group")?)
            }
            ("row" | "reihe", Some(_)) => BetDescriptor::row(number_argument("row")?),
            ("neighbours" | "nachbarn" | "split" | "corner", Some(list)) => {
                let numbers = list
                    .split('-')
                    .map(|n| n.parse::<u8>())
                    .collect::<Result<Vec<u8>, _>>()
                    .map_err(|_| BetError::InvalidDescriptor(format!("bad number list {}", list)))?;
                BetDescriptor::neighbours(&numbers)
            }
            (number, None) => match number.parse::<u8>() {
                Ok(n) => BetDescriptor::straight(n),
                Err(_) => Err(BetError::InvalidDescriptor(input.to_string())),
            },
            _ => Err(BetError::InvalidDescriptor(input.to_string())),
        }
    }
}

impl TryFrom<String> for BetDescriptor {
    type Error = BetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BetDescriptor> for String {
    fn from(descriptor: BetDescriptor) -> Self {
        descriptor.to_string()
    }
}

/// A pending wager
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bet {
    pub game_id: String,
    pub user_id: String,
    /// Where replies go; differs from the user in group chats
    pub sender_id: String,
    pub descriptor: BetDescriptor,
    pub stake_cents: i64,
    /// Placement order within the game; assigned by the bet store
    #[serde(default)]
    pub seq: u64,
}

impl Bet {
    pub fn new(
        game_id: impl Into<String>,
        user_id: impl Into<String>,
        sender_id: impl Into<String>,
        descriptor: BetDescriptor,
        stake_cents: i64,
    ) -> Self {
        Self {
            game_id: game_id.into(),
            user_id: user_id.into(),
            sender_id: sender_id.into(),
            descriptor,
            stake_cents,
            seq: 0,
        }
    }
}

/// Result of a successful placement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacedBet {
    /// Stake now riding on the descriptor, including earlier merged bets
    pub stake_cents: i64,
    pub balance_cents: i64,
}

/// The number the ball landed on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpinResult {
    pub outcome: u8,
    pub color: Option<Color>,
}

impl SpinResult {
    pub fn new(outcome: u8) -> Self {
        Self {
            outcome,
            color: BoardTopology::get().color_of(outcome),
        }
    }
}

impl fmt::Display for SpinResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.color {
            Some(color) => write!(f, "{} ({})", self.outcome, color),
            None => write!(f, "{} (green)", self.outcome),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keywords() {
        assert_eq!("17".parse::<BetDescriptor>().unwrap(), BetDescriptor::Straight(17));
        assert_eq!("0".parse::<BetDescriptor>().unwrap(), BetDescriptor::Straight(0));
        assert_eq!(
            "Red".parse::<BetDescriptor>().unwrap(),
            BetDescriptor::Color(Color::Red)
        );
        assert_eq!(
            "schwarz".parse::<BetDescriptor>().unwrap(),
            BetDescriptor::Color(Color::Black)
        );
        assert_eq!(
            "ungerade".parse::<BetDescriptor>().unwrap(),
            BetDescriptor::Parity(Parity::Odd)
        );
        assert_eq!("hälfte 2".parse::<BetDescriptor>().unwrap(), BetDescriptor::Half(2));
        assert_eq!("gruppe 3".parse::<BetDescriptor>().unwrap(), BetDescriptor::Dozen(3));
        assert_eq!("row 1".parse::<BetDescriptor>().unwrap(), BetDescriptor::Row(1));
    }

    #[test]
    fn test_parse_neighbours_normalizes_order() {
        let split = "neighbours 2-1".parse::<BetDescriptor>().unwrap();
        assert_eq!(split, BetDescriptor::Split([1, 2]));

        let corner = "nachbarn 5-4-2-1".parse::<BetDescriptor>().unwrap();
        assert_eq!(corner, BetDescriptor::Corner([1, 2, 4, 5]));
        assert_eq!(corner.to_string(), "neighbours 1-2-4-5");
    }

    #[test]
    fn test_parse_rejects_invalid() {
        for input in [
            "",
            "37",
            "purple",
            "half 3",
            "group 0",
            "row",
            "neighbours 1-36",
            "neighbours 1-2-3",
            "neighbours 1-1",
            "red 5",
            "neighbours a-b",
        ] {
            assert!(
                matches!(input.parse::<BetDescriptor>(), Err(BetError::InvalidDescriptor(_))),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_validate_hand_built_descriptors() {
        for descriptor in [
            BetDescriptor::Straight(0),
            BetDescriptor::Straight(36),
            BetDescriptor::Color(Color::Red),
            BetDescriptor::Half(2),
            BetDescriptor::Dozen(3),
            BetDescriptor::Row(1),
            BetDescriptor::Split([1, 4]),
            BetDescriptor::Corner([1, 2, 4, 5]),
        ] {
            assert_eq!(descriptor.validate(), Ok(()), "{descriptor:?}");
        }

        for descriptor in [
            BetDescriptor::Straight(37),
            BetDescriptor::Half(0),
            BetDescriptor::Half(7),
            BetDescriptor::Dozen(4),
            BetDescriptor::Row(0),
            BetDescriptor::Split([1, 36]),
            BetDescriptor::Split([2, 1]),
            BetDescriptor::Split([3, 3]),
            BetDescriptor::Corner([1, 2, 3, 4]),
            BetDescriptor::Corner([5, 4, 2, 1]),
        ] {
            assert!(
                matches!(descriptor.validate(), Err(BetError::InvalidDescriptor(_))),
                "{descriptor:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_display_parses_back() {
        let descriptors = [
            BetDescriptor::Straight(36),
            BetDescriptor::Color(Color::Black),
            BetDescriptor::Parity(Parity::Even),
            BetDescriptor::Half(1),
            BetDescriptor::Dozen(2),
            BetDescriptor::Row(3),
            BetDescriptor::Split([17, 20]),
            BetDescriptor::Corner([26, 27, 29, 30]),
        ];
        for descriptor in descriptors {
            assert_eq!(descriptor.to_string().parse::<BetDescriptor>().unwrap(), descriptor);
        }
    }

    #[test]
    fn test_serde_uses_canonical_string() {
        let bet = Bet::new("roulette", "alice", "group-1", BetDescriptor::Split([1, 2]), 500);
        let json = serde_json::to_string(&bet).unwrap();
        assert!(json.contains("\"descriptor\":\"neighbours 1-2\""));

        let decoded: Bet = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, bet);

        let tampered = json.replace("neighbours 1-2", "neighbours 1-36");
        assert!(serde_json::from_str::<Bet>(&tampered).is_err());
    }

    #[test]
    fn test_selection_sizes_and_multipliers() {
        assert_eq!(BetDescriptor::Straight(5).multiplier(), 35);
        assert_eq!(BetDescriptor::Split([1, 2]).multiplier(), 18);
        assert_eq!(BetDescriptor::Corner([1, 2, 4, 5]).multiplier(), 9);
        assert_eq!(BetDescriptor::Color(Color::Red).selection().len(), 18);
        assert_eq!(BetDescriptor::Parity(Parity::Even).selection().len(), 18);
        assert_eq!(BetDescriptor::Dozen(2).selection(), (13..=24).collect::<Vec<u8>>());
        assert_eq!(BetDescriptor::Row(1).selection().len(), 12);
        assert_eq!(BetDescriptor::Half(2).selection().len(), 18);
    }

    #[test]
    fn test_spin_result_display() {
        assert_eq!(SpinResult::new(0).to_string(), "0 (green)");
        assert_eq!(SpinResult::new(7).to_string(), "7 (red)");
        assert_eq!(SpinResult::new(8).to_string(), "8 (black)");
    }
}
