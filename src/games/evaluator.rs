//! Payout computation for resolved bets

use crate::games::{
    board::BoardTopology,
    types::{BetDescriptor, Parity},
};

/// Amount credited for `stake_cents` riding on `descriptor` when the ball
/// lands on `outcome`; zero when the bet loses.
///
/// The stake itself was withdrawn at placement, so the returned value is the
/// full credit, e.g. 35x for a straight-up hit and 2x for an even-money win.
pub fn evaluate(descriptor: &BetDescriptor, stake_cents: i64, outcome: u8) -> i64 {
    if wins(descriptor, outcome) {
        stake_cents.saturating_mul(descriptor.multiplier())
    } else {
        0
    }
}

/// Whether the descriptor covers the outcome. Zero only ever wins straight-up.
pub fn wins(descriptor: &BetDescriptor, outcome: u8) -> bool {
    let board = BoardTopology::get();
    match descriptor {
        BetDescriptor::Straight(n) => *n == outcome,
        BetDescriptor::Split(pair) => pair.contains(&outcome),
        BetDescriptor::Corner(quad) => quad.contains(&outcome),
        BetDescriptor::Color(color) => board.color_of(outcome) == Some(*color),
        BetDescriptor::Parity(parity) => {
            outcome != 0 && (outcome % 2 == 1) == (*parity == Parity::Odd)
        }
        BetDescriptor::Half(half) => board.half_of(outcome) == Some(*half),
        BetDescriptor::Dozen(dozen) => board.dozen_of(outcome) == Some(*dozen),
        BetDescriptor::Row(row) => board.row_of(outcome) == Some(*row),
    }
}
