//! European roulette board layout and derived adjacency groups

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt};

/// Highest number on the wheel
pub const MAX_NUMBER: u8 = 36;

/// The felt as printed, top row first. Zero sits outside the grid.
pub const BOARD_GRID: [[u8; 12]; 3] = [
    [3, 6, 9, 12, 15, 18, 21, 24, 27, 30, 33, 36],
    [2, 5, 8, 11, 14, 17, 20, 23, 26, 29, 32, 35],
    [1, 4, 7, 10, 13, 16, 19, 22, 25, 28, 31, 34],
];

pub const RED_NUMBERS: [u8; 18] = [
    1, 3, 5, 7, 9, 12, 14, 16, 18, 19, 21, 23, 25, 27, 30, 32, 34, 36,
];

pub const BLACK_NUMBERS: [u8; 18] = [
    2, 4, 6, 8, 10, 11, 13, 15, 17, 20, 22, 24, 26, 28, 29, 31, 33, 35,
];

static BOARD: Lazy<BoardTopology> = Lazy::new(BoardTopology::build);

/// Pocket colour
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Black,
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Red => write!(f, "red"),
            Color::Black => write!(f, "black"),
        }
    }
}

/// Board layout plus the split and corner groups derived from it
#[derive(Debug)]
pub struct BoardTopology {
    pairs: Vec<[u8; 2]>,
    quads: Vec<[u8; 4]>,
}

impl BoardTopology {
    /// Shared, lazily built topology
    pub fn get() -> &'static BoardTopology {
        &BOARD
    }

    fn build() -> Self {
        let rows = BOARD_GRID.len();
        let cols = BOARD_GRID[0].len();
        let mut pairs = Vec::new();
        let mut quads = Vec::new();

        for row in 0..rows {
            for col in 0..cols {
                let here = BOARD_GRID[row][col];
                if col + 1 < cols {
                    pairs.push(sorted_pair(here, BOARD_GRID[row][col + 1]));
                }
                if row + 1 < rows {
                    pairs.push(sorted_pair(here, BOARD_GRID[row + 1][col]));
                }
                if row + 1 < rows && col + 1 < cols {
                    let mut quad = [
                        here,
                        BOARD_GRID[row][col + 1],
                        BOARD_GRID[row + 1][col],
                        BOARD_GRID[row + 1][col + 1],
                    ];
                    quad.sort_unstable();
                    quads.push(quad);
                }
            }
        }

        pairs.sort_unstable();
        quads.sort_unstable();
        Self { pairs, quads }
    }

    pub fn red_numbers(&self) -> &'static [u8] {
        &RED_NUMBERS
    }

    pub fn black_numbers(&self) -> &'static [u8] {
        &BLACK_NUMBERS
    }

    /// Every pair of horizontally or vertically adjacent cells, sorted
    pub fn neighbour_pairs(&self) -> &[[u8; 2]] {
        &self.pairs
    }

    /// Every 2x2 block of cells, sorted
    pub fn neighbour_quads(&self) -> &[[u8; 4]] {
        &self.quads
    }

    pub fn color_of(&self, number: u8) -> Option<Color> {
        if RED_NUMBERS.contains(&number) {
            Some(Color::Red)
        } else if BLACK_NUMBERS.contains(&number) {
            Some(Color::Black)
        } else {
            None
        }
    }

    /// Row 1 is the bottom line of the felt (1, 4, 7, ...), row 3 the top.
    pub fn row_of(&self, number: u8) -> Option<u8> {
        match number {
            1..=MAX_NUMBER => Some(match number % 3 {
                1 => 1,
                2 => 2,
                _ => 3,
            }),
            _ => None,
        }
    }

    pub fn dozen_of(&self, number: u8) -> Option<u8> {
        match number {
            1..=MAX_NUMBER => Some((number - 1) / 12 + 1),
            _ => None,
        }
    }

    pub fn half_of(&self, number: u8) -> Option<u8> {
        match number {
            1..=18 => Some(1),
            19..=MAX_NUMBER => Some(2),
            _ => None,
        }
    }

    /// True iff the selection is exactly one split pair or corner quad.
    pub fn is_valid_neighbour_group(&self, selection: &BTreeSet<u8>) -> bool {
        let numbers: Vec<u8> = selection.iter().copied().collect();
        match numbers.len() {
            2 => self
                .pairs
                .binary_search(&[numbers[0], numbers[1]])
                .is_ok(),
            4 => self
                .quads
                .binary_search(&[numbers[0], numbers[1], numbers[2], numbers[3]])
                .is_ok(),
            _ => false,
        }
    }
}

fn sorted_pair(a: u8, b: u8) -> [u8; 2] {
    if a <= b {
        [a, b]
    } else {
        [b, a]
    }
}
