//! Enhancement interpreter (C5): the recursive X/26 triplet virtual machine.
//! Machine state lives on [`Enhancer`]; `flush`/`flush_row` are its methods,
//! not closures, since the original's nested-function trick does not
//! translate (see the "Nested functions" design note).

use crate::cache::PageCache;
use crate::cell::{Cell, Colour, NavLink, Opacity, Page, Size, COLUMNS, EXT_COLUMNS};
use crate::driver::Level;
use crate::error::{FormatError, Result};
use crate::fonts::CharacterSet;
use crate::page::{
    Extension, Magazine, PageFunction, PagePayload, RawPage, DRCS_GLYPH_BYTES, ROWS1,
};
use crate::pdc::PdcTape;
use crate::resolver::{resolve_object_address, ObjectType};
use crate::triplet::Triplet;

/// Total triplets a single `format_page` call may interpret across every
/// recursive object invocation, bounding an otherwise unbounded VM.
const MAX_TRIPLETS_TOTAL: u32 = 16 * 13 * 4;

pub struct Budget {
    remaining: u32,
}

impl Budget {
    pub fn new() -> Self {
        Budget {
            remaining: MAX_TRIPLETS_TOTAL,
        }
    }

    fn consume(&mut self) -> Result<()> {
        if self.remaining == 0 {
            return Err(FormatError::Structural {
                reason: "triplet interpretation budget exhausted",
            });
        }
        self.remaining -= 1;
        Ok(())
    }
}

impl Default for Budget {
    fn default() -> Self {
        Self::new()
    }
}

pub fn local_triplets(raw: &RawPage) -> &[Triplet] {
    raw.enhancement.as_flattened()
}

#[derive(Clone, Copy, Debug, Default)]
struct ModifiedMask {
    foreground: bool,
    background: bool,
    opacity: bool,
    flash: bool,
    conceal: bool,
    underline: bool,
    size: bool,
    code_point: bool,
}

impl ModifiedMask {
    fn all() -> Self {
        ModifiedMask {
            foreground: true,
            background: true,
            opacity: true,
            flash: true,
            conceal: true,
            underline: true,
            size: true,
            code_point: true,
        }
    }
}

fn is_mosaic(code_point: u16) -> bool {
    (0xEE00..0xEF00).contains(&code_point)
}

pub struct Enhancer<'a> {
    object_type: ObjectType,
    extension: &'a Extension,
    max_level: Level,
    header_only: bool,

    active_row: i32,
    active_column: i32,
    inv_row: i32,
    inv_column: i32,
    offset_row: i32,
    offset_column: i32,

    row_color: Colour,
    next_row_color: Colour,
    invert: bool,

    ac: Cell,
    mac: ModifiedMask,

    current_font: u8,
    drcs_bank: [u8; 2],

    pub pdc: PdcTape,
}

impl<'a> Enhancer<'a> {
    pub fn new(
        object_type: ObjectType,
        extension: &'a Extension,
        max_level: Level,
        header_only: bool,
    ) -> Self {
        let passive = object_type == ObjectType::Passive;
        Enhancer {
            object_type,
            extension,
            max_level,
            header_only,
            active_row: 0,
            active_column: 0,
            inv_row: 0,
            inv_column: 0,
            offset_row: 0,
            offset_column: 0,
            row_color: extension.row_colour,
            next_row_color: extension.row_colour,
            invert: false,
            ac: if passive {
                Cell {
                    foreground: Colour::WHITE,
                    background: Colour::BLACK,
                    ..Cell::default()
                }
            } else {
                Cell::default()
            },
            mac: if passive {
                ModifiedMask::all()
            } else {
                ModifiedMask::default()
            },
            current_font: 0,
            drcs_bank: [0, 0],
            pdc: PdcTape::new(false),
        }
    }

    pub fn with_invocation(mut self, inv_row: i32, inv_column: i32) -> Self {
        self.inv_row = inv_row;
        self.inv_column = inv_column;
        self
    }

    /// Interprets `triplets` in place over `page`. `raw` supplies the
    /// Level-1 bytes used for neighbour-scan cancellation.
    pub fn run(
        &mut self,
        cache: &dyn PageCache,
        magazine: &Magazine,
        fonts: &dyn CharacterSet,
        page: &mut Page,
        raw: &RawPage,
        triplets: &[Triplet],
        budget: &mut Budget,
    ) -> Result<()> {
        let mut i = 0usize;
        while i < triplets.len() {
            budget.consume()?;
            let t = triplets[i];

            if t.is_row_address() {
                match self.row_address(cache, magazine, fonts, page, raw, t, budget)? {
                    RowOutcome::Continue => {}
                    RowOutcome::Terminate => {
                        self.flush_row(page, raw);
                        return Ok(());
                    }
                    RowOutcome::SkipToHeaderOrTerminate => {
                        match self.skip_to_header_or_terminate(page, raw, triplets, budget, i)? {
                            Some(next_i) => {
                                i = next_i;
                                continue;
                            }
                            None => return Ok(()),
                        }
                    }
                }
            } else {
                self.column_address(cache, magazine, fonts, page, raw, t)?;
            }

            i += 1;
        }

        self.flush_row(page, raw);
        Ok(())
    }

    /// Called once a row-address triplet has moved the cursor off row 0 in
    /// header-only mode: advances the triplet cursor past everything meant
    /// for the skipped row, stopping at the next row-0 target (`mode ==
    /// 0x07`, returned unconsumed for normal dispatch) or terminating
    /// outright on a terminator/reserved row-address mode (`mode >= 0x1F`).
    /// Column-address triplets and row-address triplets for other non-zero
    /// rows are consumed from the budget and skipped in place.
    fn skip_to_header_or_terminate(
        &mut self,
        page: &mut Page,
        raw: &RawPage,
        triplets: &[Triplet],
        budget: &mut Budget,
        start: usize,
    ) -> Result<Option<usize>> {
        let mut j = start + 1;
        while j < triplets.len() {
            let t = triplets[j];
            if t.is_row_address() {
                if t.mode == 0x07 {
                    return Ok(Some(j));
                }
                if t.mode >= 0x1F {
                    budget.consume()?;
                    self.flush_row(page, raw);
                    return Ok(None);
                }
            }
            budget.consume()?;
            j += 1;
        }
        Ok(Some(j))
    }

    fn row_address(
        &mut self,
        cache: &dyn PageCache,
        magazine: &Magazine,
        fonts: &dyn CharacterSet,
        page: &mut Page,
        raw: &RawPage,
        t: Triplet,
        budget: &mut Budget,
    ) -> Result<RowOutcome> {
        if self.pdc.has_pending_hour() {
            return Err(FormatError::Structural {
                reason: "row-address triplet while a PDC hour is pending",
            });
        }

        let s = t.data >> 5;
        let row = if t.address == crate::triplet::ROW_ADDRESS_BASE {
            24
        } else {
            (t.address - crate::triplet::ROW_ADDRESS_BASE) as i32
        };

        match t.mode {
            0x00 => {
                if self.max_level >= Level::L2_5 && s == 0 && self.object_type <= ObjectType::Active
                {
                    page.screen_colour = Colour(t.data & 0x1F);
                }
                Ok(RowOutcome::Continue)
            }
            0x01 | 0x07 => {
                if t.mode == 0x07 && t.address != 0x3F {
                    return Ok(RowOutcome::Continue);
                }
                let row = if t.mode == 0x07 { 0 } else { row };
                self.row_color = self.next_row_color;
                if s == 0 {
                    self.row_color = Colour(t.data & 0x1F);
                    self.next_row_color = self.extension.row_colour;
                } else if s == 3 {
                    self.row_color = Colour(t.data & 0x1F);
                    self.next_row_color = self.row_color;
                }
                if self.header_only && row > 0 {
                    return Ok(RowOutcome::SkipToHeaderOrTerminate);
                }
                self.set_active(page, raw, row, 0);
                Ok(RowOutcome::Continue)
            }
            0x04 => {
                let mut column = 0;
                if self.max_level >= Level::L2_5 {
                    if (t.data as usize) >= COLUMNS {
                        return Ok(RowOutcome::Continue);
                    }
                    column = t.data as i32;
                }
                if row > self.active_row {
                    self.row_color = self.next_row_color;
                }
                if self.header_only && row > 0 {
                    return Ok(RowOutcome::SkipToHeaderOrTerminate);
                }
                self.set_active(page, raw, row, column);
                Ok(RowOutcome::Continue)
            }
            0x08 => {
                self.pdc.tag_cni(t.address, t.data);
                Ok(RowOutcome::Continue)
            }
            0x09 => {
                self.pdc.tag_month_day(t.address, t.data);
                Ok(RowOutcome::Continue)
            }
            0x0A | 0x0B => {
                self.pdc
                    .tag_hour(t.mode, t.data, row as u8)
                    .map_err(|_| FormatError::Structural {
                        reason: "PDC hour tagging out of order",
                    })?;
                Ok(RowOutcome::Continue)
            }
            0x0C => {
                self.pdc.tag_local_time_offset(t.data);
                Ok(RowOutcome::Continue)
            }
            0x0D => {
                self.pdc.tag_series(t.address, t.data);
                Ok(RowOutcome::Continue)
            }
            0x10 => {
                if self.max_level >= Level::L2_5 && t.data < 72 {
                    self.offset_column = t.data as i32;
                    self.offset_row = row;
                }
                Ok(RowOutcome::Continue)
            }
            0x11..=0x13 => {
                self.invoke_object(cache, magazine, fonts, page, raw, t, budget)?;
                Ok(RowOutcome::Continue)
            }
            0x15..=0x17 => Ok(RowOutcome::Terminate),
            0x18 => {
                self.drcs_bank[(t.data >> 6) as usize] = t.data & 0x0F;
                Ok(RowOutcome::Continue)
            }
            0x1F => Ok(RowOutcome::Terminate),
            _ => Ok(RowOutcome::Continue),
        }
    }

    fn set_active(&mut self, page: &mut Page, raw: &RawPage, row: i32, column: i32) {
        if row > self.active_row {
            self.flush_row(page, raw);
        }
        self.active_row = row;
        self.active_column = column;
    }

    #[allow(clippy::too_many_arguments)]
    fn column_address(
        &mut self,
        cache: &dyn PageCache,
        magazine: &Magazine,
        fonts: &dyn CharacterSet,
        page: &mut Page,
        raw: &RawPage,
        t: Triplet,
    ) -> Result<()> {
        let s = t.data >> 5;
        let column = t.address as i32;

        match t.mode {
            0x00 => {
                if self.max_level >= Level::L2_5 && s == 0 {
                    self.flush(page, raw, column);
                    self.ac.foreground = Colour(t.data & 0x1F);
                    self.mac.foreground = true;
                }
            }
            0x01 => {
                if self.max_level >= Level::L2_5 {
                    if t.data & 0x20 != 0 {
                        self.flush(page, raw, column);
                        self.store(0xEE00 + t.data as u16);
                    } else if t.data >= 0x40 {
                        self.flush(page, raw, column);
                        let ch = fonts.g0(0, t.data);
                        self.store(ch as u16);
                    }
                }
            }
            0x02 | 0x0B => {
                if t.mode == 0x0B && self.max_level < Level::L2_5 {
                    return Ok(());
                }
                if t.data >= 0x20 {
                    self.flush(page, raw, column);
                    self.store(0xEF00 + t.data as u16);
                }
            }
            0x03 => {
                if self.max_level >= Level::L2_5 && s == 0 {
                    self.flush(page, raw, column);
                    self.ac.background = Colour(t.data & 0x1F);
                    self.mac.background = true;
                }
            }
            0x06 => {
                self.pdc
                    .complete_minutes(t.data, column as u8)
                    .map_err(|_| FormatError::Structural {
                        reason: "PDC minutes triplet without a pending hour",
                    })?;
            }
            0x07 => {
                if self.max_level >= Level::L2_5 {
                    self.flush(page, raw, column);
                    self.ac.flash = t.data & 3 != 0;
                    self.mac.flash = true;
                }
            }
            0x08 => {
                if self.max_level >= Level::L2_5 {
                    self.flush(page, raw, column);
                    self.current_font = if fonts.is_valid_descriptor(t.data) {
                        t.data
                    } else {
                        0
                    };
                }
            }
            0x09 => {
                if self.max_level >= Level::L2_5 && t.data >= 0x20 {
                    self.flush(page, raw, column);
                    let ch = fonts.g0(self.current_font, t.data);
                    self.store(ch as u16);
                }
            }
            0x0C => {
                if self.max_level >= Level::L2_5 {
                    self.flush(page, raw, column);
                    self.ac.size = match (t.data & 0x40 != 0, t.data & 1 != 0) {
                        (true, true) => Size::DoubleSize,
                        (true, false) => Size::DoubleWidth,
                        (false, true) => Size::DoubleHeight,
                        (false, false) => Size::Normal,
                    };
                    self.mac.size = true;

                    self.ac.opacity = if t.data & 2 != 0 {
                        Opacity::TransparentSpace
                    } else {
                        page.page_opacity[1]
                    };
                    self.mac.opacity = true;

                    self.ac.conceal = t.data & 4 != 0;
                    self.mac.conceal = true;

                    self.invert = t.data & 0x10 != 0;

                    self.ac.underline = t.data & 0x20 != 0;
                    self.mac.underline = true;
                }
            }
            0x0D => {
                if self.max_level >= Level::L2_5 {
                    self.invoke_drcs(cache, magazine, page, raw, column, t)?;
                }
            }
            0x0E => {
                if self.max_level >= Level::L3_5 {
                    self.apply_font_style(page, column, t.data);
                }
            }
            0x0F => {
                if t.data >= 0x20 {
                    self.flush(page, raw, column);
                    let ch = fonts.g2(t.data);
                    self.store(ch as u16);
                }
            }
            0x10..=0x1F => {
                if t.data >= 0x20 {
                    self.flush(page, raw, column);
                    let base = fonts.g2(t.data);
                    let ch = fonts.composed(t.mode - 0x10, base);
                    self.store(ch as u16);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn store(&mut self, code_point: u16) {
        self.ac.code_point = code_point;
        self.mac.code_point = true;
    }

    fn flush(&mut self, page: &mut Page, raw: &RawPage, column: i32) {
        if column <= self.active_column {
            return;
        }

        let row = self.inv_row + self.active_row;
        if row < 0 || row as usize >= 25 {
            self.active_column = column;
            return;
        }
        let row = row as usize;

        if self.object_type == ObjectType::Passive && !self.mac.code_point {
            self.active_column = column;
            return;
        }

        let mut i = self.inv_column + self.active_column;
        let end = self.inv_column + column;
        while i < end {
            if i > 39 {
                break;
            }
            let idx = i as usize;
            let mut c = *page.cell(row, idx);

            if self.mac.underline {
                let mut u = self.ac.underline;
                let mut unicode = if self.mac.code_point {
                    self.ac.code_point
                } else {
                    c.code_point
                };
                if is_mosaic(unicode) {
                    if u {
                        unicode &= !0x20;
                    } else {
                        unicode |= 0x20;
                    }
                    self.ac.code_point = unicode;
                    self.mac.code_point = true;
                    u = false;
                }
                c.underline = u;
            }
            if self.mac.foreground {
                c.foreground = if self.ac.foreground.is_transparent_black() {
                    self.row_color
                } else {
                    self.ac.foreground
                };
            }
            if self.mac.background {
                c.background = if self.ac.background.is_transparent_black() {
                    self.row_color
                } else {
                    self.ac.background
                };
            }
            if self.invert {
                std::mem::swap(&mut c.foreground, &mut c.background);
            }
            if self.mac.opacity {
                c.opacity = self.ac.opacity;
            }
            if self.mac.flash {
                c.flash = self.ac.flash;
            }
            if self.mac.conceal {
                c.conceal = self.ac.conceal;
            }
            if self.mac.code_point {
                c.code_point = self.ac.code_point;
                self.mac.code_point = false;
                if self.mac.size {
                    c.size = self.ac.size;
                } else if (c.size as u8) > (Size::DoubleSize as u8) {
                    c.size = Size::Normal;
                }
            }

            *page.cell_mut(row, idx) = c;

            if self.object_type == ObjectType::Passive {
                i += 1;
                break;
            }
            i += 1;

            if self.object_type != ObjectType::Passive && self.object_type != ObjectType::Adaptive {
                self.cancel_non_spacing(raw, row, i);
            }
        }

        self.active_column = column;
    }

    /// Neighbour-scan cancellation: a Level-1 spacing control byte at or
    /// past `i` cancels a still-pending non-spacing modifier, reproducing
    /// Level-1 cancellation semantics under the enhancement overlay.
    fn cancel_non_spacing(&mut self, raw: &RawPage, row: usize, i: i32) {
        if row >= ROWS1 || i < 0 {
            return;
        }
        let read = |col: i32| -> u8 {
            if col < 0 || col as usize >= COLUMNS {
                0x20
            } else {
                raw.row1(row).get(col as usize).copied().unwrap_or(b' ') & 0x7F
            }
        };

        let set_after = read(i - 1);
        match set_after {
            0x00..=0x07 | 0x10..=0x17 => {
                self.mac.foreground = false;
                self.mac.conceal = false;
            }
            0x08 => self.mac.flash = false,
            0x0A | 0x0B => {
                if read(i) == set_after {
                    self.mac.opacity = false;
                }
            }
            0x0D | 0x0E | 0x0F => self.mac.size = false,
            _ => {}
        }

        if i > 39 {
            return;
        }
        match read(i) {
            0x09 => self.mac.flash = false,
            0x0C => self.mac.size = false,
            0x18 => self.mac.conceal = false,
            0x1C | 0x1D => self.mac.background = false,
            _ => {}
        }
    }

    fn flush_row(&mut self, page: &mut Page, raw: &RawPage) {
        if self.object_type == ObjectType::Passive || self.object_type == ObjectType::Adaptive {
            let col = self.active_column + 1;
            self.flush(page, raw, col);
        } else {
            self.flush(page, raw, COLUMNS as i32);
        }
        if self.object_type != ObjectType::Passive {
            self.mac = ModifiedMask::default();
        }
    }

    fn apply_font_style(&mut self, page: &mut Page, column: i32, data: u8) {
        let proportional = data & 1 != 0;
        let bold = (data >> 1) & 1 != 0;
        let italic = (data >> 2) & 1 != 0;
        let count = (data >> 4) + 1;
        let mut row = self.inv_row + self.active_row;
        let mut remaining = count;
        while row < 25 && remaining > 0 {
            if row >= 0 {
                for col in (self.inv_column + column)..COLUMNS as i32 {
                    if col < 0 || col as usize >= EXT_COLUMNS {
                        continue;
                    }
                    let cell = page.cell_mut(row as usize, col as usize);
                    cell.italic = italic;
                    cell.bold = bold;
                    cell.proportional = proportional;
                }
            }
            row += 1;
            remaining -= 1;
        }
    }

    fn invoke_object(
        &mut self,
        cache: &dyn PageCache,
        magazine: &Magazine,
        fonts: &dyn CharacterSet,
        page: &mut Page,
        raw: &RawPage,
        t: Triplet,
        budget: &mut Budget,
    ) -> Result<()> {
        if self.max_level < Level::L2_5 {
            return Ok(());
        }
        let source = (t.address >> 3) & 3;
        let new_type = match t.mode & 3 {
            0 => ObjectType::Local,
            1 => ObjectType::Active,
            2 => ObjectType::Adaptive,
            _ => ObjectType::Passive,
        };

        if new_type <= self.object_type {
            return Err(FormatError::Structural {
                reason: "object invocation priority violation",
            });
        }
        if source == 0 {
            return Ok(());
        }

        let body_triplets: Vec<Triplet> = if source == 1 {
            if self.object_type != ObjectType::Local {
                return Ok(());
            }
            let designation = (t.data >> 4) + ((t.address & 1) << 4);
            let triplet_idx = t.data & 15;
            if triplet_idx > 12 {
                return Ok(());
            }
            let flat = local_triplets(raw);
            let start = designation as usize * 13 + triplet_idx as usize;
            if start >= flat.len() {
                return Err(FormatError::Structural {
                    reason: "local object address out of range",
                });
            }
            flat[start..].to_vec()
        } else {
            let global = source == 3;
            let function = if global {
                PageFunction::Gpop
            } else {
                PageFunction::Pop
            };
            let pgno = resolve_pop_pgno(raw, magazine, self.max_level, global).ok_or(
                FormatError::Structural {
                    reason: "dead MOT/X-27-4 POP link",
                },
            )?;
            let combined = ((t.address as u16) << 7) | t.data as u16;
            let body = resolve_object_address(cache, new_type, pgno, combined, function)?;
            body.triplets().to_vec()
        };

        let row = self.inv_row + self.active_row;
        let column = self.inv_column + self.active_column;
        let mut nested = Enhancer::new(new_type, self.extension, self.max_level, self.header_only)
            .with_invocation(row + self.offset_row, column + self.offset_column);
        nested.pdc = std::mem::replace(&mut self.pdc, PdcTape::new(false));
        nested.run(cache, magazine, fonts, page, raw, &body_triplets, budget)?;
        self.pdc = nested.pdc;

        self.offset_row = 0;
        self.offset_column = 0;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn invoke_drcs(
        &mut self,
        cache: &dyn PageCache,
        magazine: &Magazine,
        page: &mut Page,
        raw: &RawPage,
        column: i32,
        t: Triplet,
    ) -> Result<()> {
        let normal = t.data >> 6;
        let offset = t.data & 0x3F;
        if offset >= 48 {
            return Ok(());
        }
        self.flush(page, raw, column);

        let bank = self.drcs_bank[normal as usize];
        let page_slot = (normal as usize) * 16 + bank as usize;
        let global = normal == 0;

        if let Some(pgno) = resolve_drcs_pgno(raw, magazine, self.max_level, global) {
            if let Some(drcs_page) = cache.get(pgno, bank as u16) {
                if let PagePayload::Drcs { glyphs, invalid } = &drcs_page.payload {
                    if invalid & (1u64 << offset) == 0 {
                        let packed = glyphs[offset as usize];
                        // The cache's DRCS payload keeps the wire-packed
                        // 15 byte bitmap; the renderer unpacks pixels, so
                        // the page's glyph slot carries the packed bytes
                        // zero-extended to its fixed width.
                        let mut slot = [0u8; 60];
                        slot[..DRCS_GLYPH_BYTES].copy_from_slice(&packed);
                        page.drcs[page_slot] = Some(slot);
                    }
                }
            }
        }

        let code_point = 0xF000u16 + ((page_slot as u16) << 6) + offset as u16;
        self.store(code_point);
        Ok(())
    }
}

enum RowOutcome {
    Continue,
    Terminate,
    SkipToHeaderOrTerminate,
}

fn pick_level35_or_default(links: &[NavLink; 16], slot: usize, max_level: Level) -> Option<u16> {
    if max_level >= Level::L3_5 {
        if let Some(slot8) = links.get(slot + 8) {
            if slot8.pgno != 0 {
                return Some(slot8.pgno);
            }
        }
    }
    links.get(slot).filter(|l| l.pgno != 0).map(|l| l.pgno)
}

fn resolve_pop_pgno(raw: &RawPage, magazine: &Magazine, max_level: Level, global: bool) -> Option<u16> {
    let override_slot = if global {
        crate::page::LINK_GPOP
    } else {
        crate::page::LINK_POP
    };
    if raw.link[override_slot].pgno != 0 {
        return Some(raw.link[override_slot].pgno);
    }
    if global {
        pick_level35_or_default(&magazine.pop_link, 0, max_level)
    } else {
        let i = magazine.mot_pop_index[(raw.pgno & 0xFF) as usize];
        if i == 0xFF {
            return None;
        }
        pick_level35_or_default(&magazine.pop_link, i as usize, max_level)
    }
}

fn resolve_drcs_pgno(raw: &RawPage, magazine: &Magazine, max_level: Level, global: bool) -> Option<u16> {
    let override_slot = if global {
        crate::page::LINK_GDRCS
    } else {
        crate::page::LINK_DRCS
    };
    if raw.link[override_slot].pgno != 0 {
        return Some(raw.link[override_slot].pgno);
    }
    if global {
        pick_level35_or_default(&magazine.drcs_link, 0, max_level)
    } else {
        let i = magazine.mot_drcs_index[(raw.pgno & 0xFF) as usize];
        if i == 0xFF {
            return None;
        }
        pick_level35_or_default(&magazine.drcs_link, i as usize, max_level)
    }
}

/// Default-object invocation: a page without its own X/26 packet 0 is
/// enhanced by invoking its magazine's default POP object(s), lower
/// priority first.
#[allow(clippy::too_many_arguments)]
pub fn run_default_object(
    cache: &dyn PageCache,
    magazine: &Magazine,
    fonts: &dyn CharacterSet,
    page: &mut Page,
    raw: &RawPage,
    extension: &Extension,
    max_level: Level,
    header_only: bool,
    budget: &mut Budget,
) -> Result<()> {
    if max_level < Level::L2_5 {
        return Ok(());
    }
    for (object_type, global) in [(ObjectType::Active, false), (ObjectType::Adaptive, true)] {
        let pgno = match resolve_pop_pgno(raw, magazine, max_level, global) {
            Some(p) => p,
            None => continue,
        };
        // Default objects always sit at the pointer table's first entry.
        let combined: u16 = 0;
        let function = if global { PageFunction::Gpop } else { PageFunction::Pop };
        let body = resolve_object_address(cache, object_type, pgno, combined, function)?;
        let triplets = body.triplets().to_vec();
        let mut nested = Enhancer::new(object_type, extension, max_level, header_only);
        nested.run(cache, magazine, fonts, page, raw, &triplets, budget)?;
    }
    Ok(())
}
