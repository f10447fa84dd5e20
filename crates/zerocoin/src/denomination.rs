//! Fixed coin denominations.

use vitaed_consensus::money::{Amount, COIN};

/// The minted denominations. `Error` mirrors the wire encoding's zero
/// value and marks an undecodable denomination.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Denomination {
    Error,
    One,
    Five,
    Ten,
    Fifty,
    OneHundred,
    FiveHundred,
    OneThousand,
    FiveThousand,
}

/// Every real denomination, smallest first.
pub const DENOMINATIONS: [Denomination; 8] = [
    Denomination::One,
    Denomination::Five,
    Denomination::Ten,
    Denomination::Fifty,
    Denomination::OneHundred,
    Denomination::FiveHundred,
    Denomination::OneThousand,
    Denomination::FiveThousand,
];

impl Denomination {
    /// Whole-coin value; zero for `Error`.
    pub const fn value(self) -> i64 {
        match self {
            Denomination::Error => 0,
            Denomination::One => 1,
            Denomination::Five => 5,
            Denomination::Ten => 10,
            Denomination::Fifty => 50,
            Denomination::OneHundred => 100,
            Denomination::FiveHundred => 500,
            Denomination::OneThousand => 1_000,
            Denomination::FiveThousand => 5_000,
        }
    }

    pub const fn amount(self) -> Amount {
        self.value() * COIN
    }

    pub fn from_value(value: i64) -> Denomination {
        match value {
            1 => Denomination::One,
            5 => Denomination::Five,
            10 => Denomination::Ten,
            50 => Denomination::Fifty,
            100 => Denomination::OneHundred,
            500 => Denomination::FiveHundred,
            1_000 => Denomination::OneThousand,
            5_000 => Denomination::FiveThousand,
            _ => Denomination::Error,
        }
    }

    pub fn from_amount(amount: Amount) -> Denomination {
        if amount % COIN != 0 {
            return Denomination::Error;
        }
        Denomination::from_value(amount / COIN)
    }

    /// Position within [`DENOMINATIONS`]; `Error` has none.
    pub fn index(self) -> Option<usize> {
        DENOMINATIONS.iter().position(|denom| *denom == self)
    }
}
