use crate::error::{Result, SeatingError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rows are labelled with a single letter, so a grid has at most 26 of them.
pub const MAX_ROWS: usize = 26;

/// A grid cell address, labelled `A1`, `A2`, ..., `B1`, ...
///
/// Ordering is row-major, which is also the order seats are filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SeatId {
    row: usize,
    col: usize,
}

impl SeatId {
    pub fn new(row: usize, col: usize) -> Result<Self> {
        if row >= MAX_ROWS {
            return Err(SeatingError::RowOutOfRange(row));
        }
        Ok(Self { row, col })
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn col(&self) -> usize {
        self.col
    }
}

/// Label for raw coordinates, as stored beside `rowIndex`/`colIndex`.
pub fn encode(row: usize, col: usize) -> Result<String> {
    SeatId::new(row, col).map(|s| s.to_string())
}

pub fn decode(seat_id: &str) -> Result<(usize, usize)> {
    seat_id.parse::<SeatId>().map(|s| (s.row, s.col))
}

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = (b'A' + self.row as u8) as char;
        write!(f, "{}{}", letter, self.col + 1)
    }
}

impl FromStr for SeatId {
    type Err = SeatingError;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || SeatingError::InvalidSeatId(s.to_string());
        let mut chars = s.chars();
        let letter = chars.next().ok_or_else(bad)?;
        if !letter.is_ascii_uppercase() {
            return Err(bad());
        }
        let rest = chars.as_str();
        if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
            return Err(bad());
        }
        let number: usize = rest.parse().map_err(|_| bad())?;
        if number == 0 {
            return Err(bad());
        }
        Ok(Self {
            row: (letter as u8 - b'A') as usize,
            col: number - 1,
        })
    }
}

impl TryFrom<String> for SeatId {
    type Error = SeatingError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<SeatId> for String {
    fn from(value: SeatId) -> Self {
        value.to_string()
    }
}
