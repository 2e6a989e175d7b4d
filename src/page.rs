//! The cache-entry data model: page numbers, the tagged `PageFunction` DAG,
//! the raw encoded page and magazine extension, and the `PageCache`
//! collaborator trait (out of scope to implement, per spec, but the seam
//! every other component is written against).

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::cell::{Colour, NavLink};
use crate::triplet::Triplet;

pub type Pgno = u16;
pub type Subno = u16;

/// Rows 0..24: the header, 23 body rows, and the optional packet-24 row
/// (drawn by the broadcaster itself rather than synthesised by C8).
pub const ROWS1: usize = 25;
pub const COLS1: usize = 40;
pub const DESIGNATIONS: usize = 16;
pub const TRIPLETS_PER_DESIGNATION: usize = 13;
pub const POP_POINTERS: usize = 96;
pub const POP_POOL_SIZE: usize = 506;
pub const DRCS_GLYPHS: usize = 48;
/// Bytes to hold a 12x10 1bpp DRCS glyph bitmap (120 bits).
pub const DRCS_GLYPH_BYTES: usize = 15;
pub const AIT_ENTRIES: usize = 46;
pub const LINK_SLOTS: usize = 16;

/// Indices into [`RawPage::link`]. Slots 0..3 are the X/27/0 FLOF link
/// array (`lop.link[i]` in the component design); slots 4..9 are the
/// X/27/4 POP/GPOP/DRCS/GDRCS override table. A zero `pgno` in a slot means
/// "no override"/"no link", matching [`NavLink::default`].
pub const LINK_FLOF_0: usize = 0;
pub const LINK_FLOF_3: usize = 3;
pub const LINK_POP: usize = 4;
pub const LINK_GPOP: usize = 5;
pub const LINK_DRCS: usize = 6;
pub const LINK_GDRCS: usize = 7;

/// Cache entry function tag. Legal transitions form a DAG rooted at
/// `Unknown`; see [`PageFunction::can_coerce_to`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PageFunction {
    #[default]
    Unknown,
    Lop,
    Trigger,
    Pop,
    Gpop,
    Drcs,
    Gdrcs,
    Ait,
    Mip,
    Btt,
    Mot,
}

impl PageFunction {
    /// Whether a page currently tagged `self` may be retyped to `to`. Only
    /// `Unknown` ever moves; every other function is a terminal node once
    /// assigned (including POP/GPOP, which are distinct nodes; promotion
    /// between them is a caller-level decision, not a coercion).
    pub fn can_coerce_to(self, to: PageFunction) -> bool {
        self == PageFunction::Unknown
            && matches!(
                to,
                PageFunction::Pop
                    | PageFunction::Gpop
                    | PageFunction::Drcs
                    | PageFunction::Gdrcs
                    | PageFunction::Ait
                    | PageFunction::Mip
                    | PageFunction::Btt
                    | PageFunction::Mot
            )
    }
}

const C5_NEWSFLASH: u32 = 1 << 0;
const C6_SUBTITLE: u32 = 1 << 1;
const C7_SUPPRESS_HEADER: u32 = 1 << 2;
const C10_INHIBIT_DISPLAY: u32 = 1 << 3;
const C4_ERASE_PAGE: u32 = 1 << 4;
const C11_MAGAZINE_SERIAL: u32 = 1 << 5;

crate::flags_to_struct!(
    PageFlags, u32,
    C5_NEWSFLASH is_newsflash "Display as a newsflash: screen becomes transparent-space.",
    C6_SUBTITLE is_subtitle "Display as a subtitle: screen becomes transparent-space.",
    C7_SUPPRESS_HEADER suppress_header "Row 0 is forced transparent regardless of content.",
    C10_INHIBIT_DISPLAY inhibit_display "Whole page becomes transparent-space.",
    C4_ERASE_PAGE erase_page "Clear the page buffer before drawing (decoder-level hint).",
    C11_MAGAZINE_SERIAL magazine_serial "Magazine is serial rather than parallel transmitted.",
);

/// Shared X/28 extension fields: present once per magazine (mandatory) and
/// optionally once per page as a local override.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Extension {
    /// `[primary, secondary]` default character-set descriptor indices.
    pub char_set: [u8; 2],
    pub screen_colour: Colour,
    pub row_colour: Colour,
    pub clut_fg_offset: u8,
    pub clut_bg_offset: u8,
    pub drcs_clut: [u8; 4],
}

impl Default for Extension {
    fn default() -> Self {
        Extension {
            char_set: [0, 0],
            screen_colour: Colour::BLACK,
            row_colour: Colour::BLACK,
            clut_fg_offset: 0,
            clut_bg_offset: 0,
            drcs_clut: [0, 0, 0, 0],
        }
    }
}

/// Per-magazine state: the always-present extension plus MOT linkage.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Magazine {
    pub extension: Extension,
    /// Low byte of a page number -> index into `pop_link`, or `0xFF` absent.
    pub mot_pop_index: Vec<u8>,
    /// Low byte of a page number -> index into `drcs_link`, or `0xFF` absent.
    pub mot_drcs_index: Vec<u8>,
    /// Slots 0..7 default links, 8..15 Level-3.5 replacements.
    pub pop_link: [NavLink; LINK_SLOTS],
    pub drcs_link: [NavLink; LINK_SLOTS],
    pub initial_page: NavLink,
    /// The magazine's BTT page, if TOP metadata is present.
    pub btt_page: Option<NavLink>,
    /// The magazine's AIT page, if TOP metadata is present. Simplified from
    /// the standard's per-block AIT chaining (`btt_link` type=2 entries) to
    /// one AIT page per magazine.
    pub ait_page: Option<NavLink>,
}

impl Magazine {
    pub fn new() -> Self {
        Magazine {
            extension: Extension::default(),
            mot_pop_index: vec![0xFF; 256],
            mot_drcs_index: vec![0xFF; 256],
            pop_link: [NavLink::default(); LINK_SLOTS],
            drcs_link: [NavLink::default(); LINK_SLOTS],
            initial_page: NavLink::default(),
            btt_page: None,
            ait_page: None,
        }
    }
}

impl Default for Magazine {
    fn default() -> Self {
        Self::new()
    }
}

/// A table of the 8 magazines (1..8, indexed 0..7) a decoder tracks.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MagazineTable {
    pub magazines: [Magazine; 8],
}

impl MagazineTable {
    /// The magazine governing `pgno` at `max_level`: magazine 0 below
    /// Level-1.5 (no MOT yet resolved), else the page's own magazine.
    pub fn select(&self, pgno: Pgno, max_level: crate::driver::Level) -> &Magazine {
        use crate::driver::Level;
        let idx = if max_level <= Level::L1_5 {
            0
        } else {
            ((pgno >> 8) & 7) as usize
        };
        &self.magazines[idx]
    }
}

/// `{page, 12-character title}` AIT entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AitEntry {
    pub page: NavLink,
    pub text: [u8; 12],
}

/// The function-specific payload a cache entry carries, selected by
/// [`PageFunction`]. `Lop`/`Trigger`/`Unknown` carry no extra payload beyond
/// the common fields.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum PagePayload {
    None,
    Pop {
        #[serde(with = "crate::serde_big_array")]
        pointers: [u16; POP_POINTERS],
        #[serde(with = "crate::serde_big_array")]
        pool: [Triplet; POP_POOL_SIZE],
    },
    Drcs {
        #[serde(with = "crate::serde_big_array")]
        glyphs: [[u8; DRCS_GLYPH_BYTES]; DRCS_GLYPHS],
        invalid: u64,
    },
    Ait {
        #[serde(with = "crate::serde_big_array")]
        entries: [AitEntry; AIT_ENTRIES],
    },
    /// BTT (Basic Top Table): one page-type byte per page number in
    /// `0x100..=0x8FF`, indexed by `pgno - 0x100`. `0`=unused, `1`=block,
    /// `2`=group, `3`=normal page with no link, `4`=ordinary normal page.
    Btt { page_types: Vec<u8> },
}

/// A raw encoded page as the cache stores it, identified by `(pgno, subno)`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawPage {
    pub pgno: Pgno,
    pub subno: Subno,
    pub function: PageFunction,
    pub national: u8,
    pub flags: PageFlags,
    /// 24 rows x 40 columns, odd-parity Level-1 text.
    pub level1: Vec<u8>,
    /// Designation-coded X/26 triplets, up to 16 designations x 13 triplets.
    pub enhancement: [[Triplet; TRIPLETS_PER_DESIGNATION]; DESIGNATIONS],
    /// Bitmask of which designations in `enhancement` were actually
    /// transmitted (undesignated slots are all-zero and must be skipped).
    pub enhancement_present: u32,
    /// X/27/0 and X/27/4 link array: FLOF linkage at [`LINK_FLOF_0`]..
    /// [`LINK_FLOF_3`], POP/GPOP/DRCS/GDRCS overrides from [`LINK_POP`] up.
    pub link: [NavLink; LINK_SLOTS],
    /// Page-local X/28 override; falls back to the magazine's when absent.
    pub extension: Option<Extension>,
    /// Bit `r` set means row `r` was actually transmitted/drawn (used by
    /// FLOF coloured-link mode to detect a hand-drawn row 24).
    pub lop_lines: u32,
    pub payload: PagePayload,
}

impl RawPage {
    pub fn new(pgno: Pgno, subno: Subno) -> Self {
        RawPage {
            pgno,
            subno,
            function: PageFunction::Unknown,
            national: 0,
            flags: PageFlags::from_raw(0).expect("0 has no invalid bits"),
            level1: vec![0x20; ROWS1 * COLS1],
            enhancement: [[Triplet::default(); TRIPLETS_PER_DESIGNATION]; DESIGNATIONS],
            enhancement_present: 0,
            link: [NavLink::default(); LINK_SLOTS],
            extension: None,
            lop_lines: 0,
            payload: PagePayload::None,
        }
    }

    pub fn row1(&self, row: usize) -> &[u8] {
        &self.level1[row * COLS1..(row + 1) * COLS1]
    }
}

pub type RawPageHandle = Rc<RawPage>;
