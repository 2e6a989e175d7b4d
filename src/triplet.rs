//! The 18-bit X/26 enhancement instruction: address (6 bits), mode (5 bits),
//! data (7 bits).

use serde::{Deserialize, Serialize};

/// Row-address triplets use `address >= ROW_ADDRESS_BASE`; the row number is
/// `address - ROW_ADDRESS_BASE`, with 0 meaning row 24 (wrap) per the
/// broadcast standard's "address 40 means row 24" convention handled by
/// callers, not here.
pub const ROW_ADDRESS_BASE: u8 = 40;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triplet {
    pub address: u8,
    pub mode: u8,
    pub data: u8,
}

impl Triplet {
    pub fn new(address: u8, mode: u8, data: u8) -> Self {
        Triplet {
            address: address & 0x3F,
            mode: mode & 0x1F,
            data: data & 0x7F,
        }
    }

    pub fn is_row_address(self) -> bool {
        self.address >= ROW_ADDRESS_BASE
    }

    pub fn is_column_address(self) -> bool {
        !self.is_row_address()
    }

    /// Unpack from the wire's 18-bit little-endian triple-Hamming word.
    pub fn from_packed(word: u32) -> Self {
        Triplet::new(
            (word & 0x3F) as u8,
            ((word >> 6) & 0x1F) as u8,
            ((word >> 11) & 0x7F) as u8,
        )
    }

    pub fn to_packed(self) -> u32 {
        (self.address as u32 & 0x3F)
            | ((self.mode as u32 & 0x1F) << 6)
            | ((self.data as u32 & 0x7F) << 11)
    }
}
