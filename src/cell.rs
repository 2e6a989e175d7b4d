//! The attributed cell and the 25x41 page buffer (C1): the data structures
//! every other component reads and writes, never computed behaviour.

use serde::{Deserialize, Serialize};

use crate::page::{Pgno, Subno};

pub const ROWS: usize = 25;
pub const COLUMNS: usize = 40;
/// Column 40 is the off-screen scratch column the Level-1 pass writes
/// through for double-width continuation bookkeeping.
pub const EXT_COLUMNS: usize = 41;

/// Index into the 40-entry colour lookup table. `TRANSPARENT_BLACK` is not a
/// real palette slot: it is a sentinel foreground/background value the
/// enhancement interpreter and post-enhance pass treat specially.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Colour(pub u8);

impl Colour {
    pub const BLACK: Colour = Colour(0);
    pub const RED: Colour = Colour(1);
    pub const GREEN: Colour = Colour(2);
    pub const YELLOW: Colour = Colour(3);
    pub const BLUE: Colour = Colour(4);
    pub const MAGENTA: Colour = Colour(5);
    pub const CYAN: Colour = Colour(6);
    pub const WHITE: Colour = Colour(7);
    pub const TRANSPARENT_BLACK: Colour = Colour(8);

    pub fn is_transparent_black(self) -> bool {
        self == Colour::TRANSPARENT_BLACK
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opacity {
    #[default]
    Opaque,
    SemiTransparent,
    TransparentSpace,
    TransparentBlack,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Size {
    #[default]
    Normal,
    DoubleWidth,
    DoubleHeight,
    DoubleSize,
    /// Row below a `DoubleHeight` cell.
    DoubleHeightContinuation,
    /// Row below a `DoubleSize` cell.
    DoubleSizeContinuation,
    /// Column to the right of a `DoubleWidth`/`DoubleSize` cell.
    OverTop,
    /// Diagonal neighbour of a `DoubleSize` cell.
    OverBottom,
}

impl Size {
    pub fn is_continuation(self) -> bool {
        matches!(
            self,
            Size::DoubleHeightContinuation
                | Size::DoubleSizeContinuation
                | Size::OverTop
                | Size::OverBottom
        )
    }
}

/// A single rendered glyph cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub code_point: u16,
    pub foreground: Colour,
    pub background: Colour,
    pub opacity: Opacity,
    pub size: Size,
    pub flash: bool,
    pub conceal: bool,
    pub underline: bool,
    pub proportional: bool,
    pub bold: bool,
    pub italic: bool,
    pub link: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Cell {
            code_point: 0x0020,
            foreground: Colour::WHITE,
            background: Colour::BLACK,
            opacity: Opacity::Opaque,
            size: Size::Normal,
            flash: false,
            conceal: false,
            underline: false,
            proportional: false,
            bold: false,
            italic: false,
            link: false,
        }
    }
}

/// A navigation target: a page and (usually definite) subpage number.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavLink {
    pub pgno: Pgno,
    pub subno: Subno,
}

/// The fully-rendered logical page: a 25x41 cell grid plus sidecar state.
///
/// Allocated by the caller and populated in place by the format driver (C9);
/// thereafter read-only, per the "Lifecycle" invariant in the data model.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Page {
    pub pgno: Pgno,
    pub subno: Subno,
    pub national_unique_id: u32,

    /// Row-major grid, `ROWS * EXT_COLUMNS` cells.
    pub text: Vec<Cell>,
    pub rows: usize,
    pub columns: usize,

    /// `[row 0, rows 1..24]`.
    pub page_opacity: [Opacity; 2],
    /// `[row 0, rows 1..24]`.
    pub boxed_opacity: [Opacity; 2],

    pub screen_colour: Colour,
    pub screen_opacity: Opacity,

    /// 40-entry transparency-resolved colour map.
    #[serde(with = "crate::serde_big_array")]
    pub color_map: [u32; 40],
    pub drcs_clut: [u8; 4],
    /// 32 glyph banks, each referencing a DRCS page's raw bitmap (or empty).
    #[serde(with = "drcs_bank_array")]
    pub drcs: [Option<[u8; 60]>; 32],

    /// Rows 0..24 with a `DOUBLE_HEIGHT*`-continuation row written below
    /// them by the Level-1 pass (bit `r` set means row `r` is such a
    /// continuation).
    pub double_height_lower: u32,

    pub nav_link: [NavLink; 6],
    #[serde(with = "crate::serde_big_array")]
    pub nav_index: [u8; COLUMNS],
}

/// `serde(with = ...)` helper for the `drcs` field: each of the 32 banks is
/// an `Option<[u8; 60]>`, and a 60-byte array is above serde's built-in
/// derive support, so each present bank round-trips via a `Vec<u8>` of the
/// same 60 bytes instead.
mod drcs_bank_array {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(data: &[Option<[u8; 60]>; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let converted: [Option<Vec<u8>>; 32] = std::array::from_fn(|i| data[i].map(|a| a.to_vec()));
        converted.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[Option<[u8; 60]>; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let items: [Option<Vec<u8>>; 32] = Deserialize::deserialize(deserializer)?;
        let mut out: [Option<[u8; 60]>; 32] = [None; 32];
        for (i, item) in items.into_iter().enumerate() {
            if let Some(v) = item {
                let len = v.len();
                let arr: [u8; 60] = v.try_into().map_err(|_| {
                    serde::de::Error::custom(format!("expected 60 bytes in drcs bank, got {len}"))
                })?;
                out[i] = Some(arr);
            }
        }
        Ok(out)
    }
}

impl Page {
    /// A blank page sized for `rows` visible rows (clamped to `[1, ROWS]`).
    pub fn new(rows: usize) -> Self {
        let rows = rows.clamp(1, ROWS);
        Page {
            pgno: 0,
            subno: 0,
            national_unique_id: 0,
            text: vec![Cell::default(); ROWS * EXT_COLUMNS],
            rows,
            columns: EXT_COLUMNS,
            page_opacity: [Opacity::Opaque; 2],
            boxed_opacity: [Opacity::Opaque; 2],
            screen_colour: Colour::BLACK,
            screen_opacity: Opacity::Opaque,
            color_map: [0; 40],
            drcs_clut: [0; 4],
            drcs: [None; 32],
            double_height_lower: 0,
            nav_link: [NavLink::default(); 6],
            nav_index: [0; COLUMNS],
        }
    }

    #[inline]
    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        &self.text[row * EXT_COLUMNS + col]
    }

    #[inline]
    pub fn cell_mut(&mut self, row: usize, col: usize) -> &mut Cell {
        &mut self.text[row * EXT_COLUMNS + col]
    }

    #[inline]
    pub fn row(&self, row: usize) -> &[Cell] {
        &self.text[row * EXT_COLUMNS..(row + 1) * EXT_COLUMNS]
    }

    #[inline]
    pub fn row_mut(&mut self, row: usize) -> &mut [Cell] {
        &mut self.text[row * EXT_COLUMNS..(row + 1) * EXT_COLUMNS]
    }

    /// Checks the size-continuation invariant of the data model for every
    /// cell: a double-width cell at `(r, c)` requires `OverTop` at
    /// `(r, c+1)`; a double-height cell requires a continuation row below;
    /// a double-size cell requires both plus the diagonal `OverBottom`.
    #[cfg(test)]
    pub fn check_size_invariant(&self) -> Result<(), String> {
        for r in 0..ROWS.min(self.rows) {
            for c in 0..COLUMNS {
                let cell = self.cell(r, c);
                match cell.size {
                    Size::DoubleWidth if c + 1 < COLUMNS => {
                        if self.cell(r, c + 1).size != Size::OverTop {
                            return Err(format!("({r},{c}) double-width without over-top"));
                        }
                    }
                    Size::DoubleHeight if r + 1 < ROWS => {
                        if self.cell(r + 1, c).size != Size::DoubleHeightContinuation {
                            return Err(format!("({r},{c}) double-height without continuation"));
                        }
                    }
                    Size::DoubleSize if r + 1 < ROWS && c + 1 < COLUMNS => {
                        if self.cell(r + 1, c).size != Size::DoubleSizeContinuation {
                            return Err(format!("({r},{c}) double-size without continuation"));
                        }
                        if self.cell(r + 1, c + 1).size != Size::OverBottom {
                            return Err(format!("({r},{c}) double-size without over-bottom"));
                        }
                        if self.cell(r, c + 1).size != Size::OverTop {
                            return Err(format!("({r},{c}) double-size without over-top"));
                        }
                    }
                    _ => {}
                }
                if cell.background == Colour::TRANSPARENT_BLACK {
                    if !matches!(cell.opacity, Opacity::SemiTransparent | Opacity::TransparentSpace) {
                        return Err(format!(
                            "({r},{c}) transparent-black background with opacity {:?}",
                            cell.opacity
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_page_has_default_cells() {
        let pg = Page::new(25);
        assert_eq!(pg.text.len(), ROWS * EXT_COLUMNS);
        assert_eq!(pg.cell(0, 0).code_point, 0x0020);
    }

    #[test]
    fn rows_clamped_to_valid_range() {
        assert_eq!(Page::new(0).rows, 1);
        assert_eq!(Page::new(100).rows, ROWS);
    }

    #[test]
    fn blank_page_satisfies_size_invariant() {
        Page::new(25).check_size_invariant().unwrap();
    }
}
