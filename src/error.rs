//! Error taxonomy for the formatter, per the five failure classes of the
//! broadcast standard: not-formattable source pages, structural X/26 VM
//! violations, cross-page typing conflicts, soft data errors (silently
//! recovered, never surfaced here) and degraded-level cache misses.

use thiserror::Error;

use crate::page::{Pgno, Subno};

/// Failure of a `format_page`/`fetch_page` call.
///
/// Soft data errors (odd-parity failures, stray transparency) are recovered
/// in place and never reach this type; only the failures that abort a whole
/// format call or roll back to the Level-1 result are represented.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// The source page is not a LOP or TRIGGER, or the page was not found
    /// in the cache at all.
    #[error("page {pgno:03x}/{subno:04x} is not formattable")]
    NotFormattable { pgno: Pgno, subno: Subno },

    /// The X/26 enhancement stream violated the virtual machine: bad PDC
    /// ordering, an impossible triplet address, a failed object-definition
    /// XOR check, a priority violation, or an origin modifier out of range.
    /// The caller should treat the page as formatted at Level-1 only.
    #[error("structural enhancement failure: {reason}")]
    Structural { reason: &'static str },

    /// A referenced POP/GPOP/DRCS/GDRCS page exists in the cache but is
    /// already typed as something else. Handled identically to
    /// `Structural` by the driver (rollback to Level-1) but kept distinct
    /// so callers can tell the two apart.
    #[error("page {pgno:03x}/{subno:04x} has incompatible function, expected {expected:?}")]
    CrossPageTyping {
        pgno: Pgno,
        subno: Subno,
        expected: crate::page::PageFunction,
    },

    /// A Level 2.5/3.5 resolution failed purely due to a missing cache
    /// entry. The core does not retry; the caller is expected to call again
    /// with a lower `max_level`.
    #[error("page {pgno:03x}/{subno:04x} required for level {level:?} is not cached")]
    DegradedLevel {
        pgno: Pgno,
        subno: Subno,
        level: crate::driver::Level,
    },
}

pub type Result<T> = std::result::Result<T, FormatError>;
