//! Level-1 formatter (C3): streams a raw page's odd-parity text through a
//! per-row spacing-attribute state machine into the cell grid.

use crate::cell::{Cell, Colour, Opacity, Page, Size, COLUMNS, EXT_COLUMNS};
use crate::charset::FontPair;
use crate::fonts::CharacterSet;
use crate::page::{Extension, RawPage};

fn unpar8(byte: u8) -> Option<u8> {
    (byte.count_ones() % 2 == 1).then(|| byte & 0x7F)
}

/// Strip the odd-parity bit; a parity failure decodes to a space, per the
/// soft-data-error policy.
fn unpar8_or_space(byte: u8) -> u8 {
    unpar8(byte).unwrap_or(b' ')
}

struct RowState {
    cell: Cell,
    font_primary: bool,
    mosaic: bool,
    mosaic_unicodes: u16,
    held_mosaic_unicode: u16,
    hold: bool,
    double_height: bool,
    wide_char: bool,
}

impl RowState {
    fn new(page_opacity: Opacity) -> Self {
        let mut cell = Cell {
            code_point: 0x0020,
            foreground: Colour::WHITE,
            background: Colour::BLACK,
            opacity: page_opacity,
            size: Size::Normal,
            ..Cell::default()
        };
        RowState {
            cell,
            font_primary: true,
            mosaic: false,
            mosaic_unicodes: 0xEE20,
            held_mosaic_unicode: 0xEE20,
            hold: false,
            double_height: false,
            wide_char: false,
        }
    }
}

/// Runs the Level-1 pass over `raw`'s text into `page` (already allocated by
/// the driver), using `extension` for the CLUT offsets and default colours
/// and `fonts`/`font_pair` for glyph lookup.
pub fn format_level1(
    page: &mut Page,
    raw: &RawPage,
    extension: &Extension,
    font_pair: FontPair,
    fonts: &dyn CharacterSet,
) {
    let display_rows = page.rows.min(25);
    page.double_height_lower = 0;

    let header = format!("\u{02}{:x}.{:02x}\u{07}", raw.pgno, raw.subno & 0xFF);
    let header_bytes = header.as_bytes();

    let mut row = 0usize;
    while row < display_rows {
        let page_opacity = page.page_opacity[(row > 0) as usize];
        let mut st = RowState::new(page_opacity);
        let mut current_font = font_pair.primary;

        for column in 0..COLUMNS {
            let raw_byte = if row == 0 && column < 8 {
                *header_bytes.get(column).unwrap_or(&b' ')
            } else {
                unpar8_or_space(raw.row1(row)[column])
            };

            // set-at spacing attributes
            match raw_byte {
                0x09 => st.cell.flash = false,
                0x0C => st.cell.size = Size::Normal,
                0x18 => st.cell.conceal = true,
                0x19 => st.mosaic_unicodes = 0xEE20,
                0x1A => st.mosaic_unicodes = 0xEE00,
                0x1C => st.cell.background = Colour(extension.clut_bg_offset + Colour::BLACK.0),
                0x1D => {
                    st.cell.background = Colour(extension.clut_bg_offset + (st.cell.foreground.0 & 7))
                }
                0x1E => st.hold = true,
                _ => {}
            }

            if raw_byte <= 0x1F {
                st.cell.code_point = if st.hold && st.mosaic {
                    st.held_mosaic_unicode
                } else {
                    0x0020
                };
            } else if st.mosaic && (raw_byte & 0x20) != 0 {
                st.held_mosaic_unicode = st.mosaic_unicodes + (raw_byte - 0x20) as u16;
                st.cell.code_point = st.held_mosaic_unicode;
            } else {
                let descriptor = if current_font {
                    font_pair.primary
                } else {
                    font_pair.secondary
                };
                let ch = fonts.g0(descriptor, raw_byte);
                st.cell.code_point = ch as u32 as u16;
            }

            if !st.wide_char {
                *page.cell_mut(row, column) = st.cell;
                st.wide_char = st.cell.size == Size::DoubleWidth;
                if st.wide_char && column < COLUMNS - 1 {
                    let mut over_top = st.cell;
                    over_top.size = Size::OverTop;
                    *page.cell_mut(row, column + 1) = over_top;
                }
            } else {
                st.wide_char = false;
            }

            // set-after spacing attributes
            match raw_byte {
                0x00..=0x07 => {
                    st.cell.foreground = Colour(extension.clut_fg_offset + (raw_byte & 7));
                    st.cell.conceal = false;
                    st.mosaic = false;
                }
                0x08 => st.cell.flash = true,
                0x0A => {
                    if column < COLUMNS - 1 && unpar8_or_space(raw.row1(row)[column + 1]) == 0x0A {
                        st.cell.opacity = page.page_opacity[(row > 0) as usize];
                    }
                }
                0x0B => {
                    if column < COLUMNS - 1 && unpar8_or_space(raw.row1(row)[column + 1]) == 0x0B {
                        st.cell.opacity = page.boxed_opacity[(row > 0) as usize];
                    }
                }
                0x0D => {
                    if row > 0 && row < 23 {
                        st.cell.size = Size::DoubleHeight;
                        st.double_height = true;
                    }
                }
                0x0E => {
                    if column < COLUMNS - 1 {
                        st.cell.size = Size::DoubleWidth;
                    }
                }
                0x0F => {
                    if column < COLUMNS - 1 && row > 0 && row < 23 {
                        st.cell.size = Size::DoubleSize;
                        st.double_height = true;
                    }
                }
                0x10..=0x17 => {
                    st.cell.foreground = Colour(extension.clut_fg_offset + (raw_byte & 7));
                    st.cell.conceal = false;
                    st.mosaic = true;
                }
                0x1F => st.hold = false,
                0x1B => current_font = !current_font,
                _ => {}
            }
        }

        if st.double_height {
            let mut column = 0usize;
            while column < EXT_COLUMNS {
                let ac = *page.cell(row, column);
                match ac.size {
                    Size::DoubleHeight => {
                        let mut below = ac;
                        below.size = Size::DoubleHeightContinuation;
                        *page.cell_mut(row + 1, column) = below;
                    }
                    Size::DoubleSize => {
                        let mut below = ac;
                        below.size = Size::DoubleSizeContinuation;
                        *page.cell_mut(row + 1, column) = below;
                        column += 1;
                        let mut diag = ac;
                        diag.size = Size::OverBottom;
                        if column < EXT_COLUMNS {
                            *page.cell_mut(row + 1, column) = diag;
                        }
                    }
                    _ => {
                        let mut blank = ac;
                        blank.size = Size::Normal;
                        blank.code_point = 0x0020;
                        *page.cell_mut(row + 1, column) = blank;
                    }
                }
                column += 1;
            }
            row += 1;
            page.double_height_lower |= 1 << row;
        }

        row += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::Latin1CharacterSet;
    use crate::page::RawPage;

    fn ascii_page(pgno: u16, rows: &[&str]) -> RawPage {
        let mut raw = RawPage::new(pgno, 0);
        for (r, text) in rows.iter().enumerate() {
            for (c, byte) in text.bytes().enumerate().take(COLUMNS) {
                raw.level1[r * COLUMNS + c] = byte | (byte.count_ones() % 2 == 0) as u8;
            }
        }
        raw
    }

    fn odd_parity(byte: u8) -> u8 {
        if byte.count_ones() % 2 == 1 {
            byte
        } else {
            byte | 0x80
        }
    }

    #[test]
    fn header_is_overwritten_regardless_of_input() {
        let mut raw = RawPage::new(0x100, 0);
        for c in 0..COLUMNS {
            raw.level1[c] = odd_parity(b' ');
        }
        let mut page = Page::new(25);
        let ext = Extension::default();
        let fonts = Latin1CharacterSet;
        format_level1(
            &mut page,
            &raw,
            &ext,
            FontPair { primary: 0, secondary: 0 },
            &fonts,
        );
        let header: String = (0..8).map(|c| page.cell(0, c).code_point as u8 as char).collect();
        assert_eq!(header, "\u{02}100.00\u{07}");
    }

    #[test]
    fn plain_ascii_row_renders_white_on_black() {
        let mut raw = RawPage::new(0x100, 0);
        let text = b"ABC";
        for (c, &b) in text.iter().enumerate() {
            raw.level1[COLUMNS + c] = odd_parity(b);
        }
        let mut page = Page::new(25);
        let ext = Extension::default();
        let fonts = Latin1CharacterSet;
        format_level1(
            &mut page,
            &raw,
            &ext,
            FontPair { primary: 0, secondary: 0 },
            &fonts,
        );
        assert_eq!(page.cell(1, 0).code_point, b'A' as u16);
        assert_eq!(page.cell(1, 0).foreground, Colour::WHITE);
        assert_eq!(page.cell(1, 0).background, Colour::BLACK);
    }

    #[test]
    fn double_height_writes_continuation_row() {
        let mut raw = RawPage::new(0x100, 0);
        raw.level1[2 * COLUMNS] = odd_parity(0x0D);
        raw.level1[2 * COLUMNS + 1] = odd_parity(b'X');
        let mut page = Page::new(25);
        let ext = Extension::default();
        let fonts = Latin1CharacterSet;
        format_level1(
            &mut page,
            &raw,
            &ext,
            FontPair { primary: 0, secondary: 0 },
            &fonts,
        );
        assert_eq!(page.cell(2, 1).size, Size::DoubleHeight);
        assert_eq!(page.cell(3, 1).size, Size::DoubleHeightContinuation);
        assert_eq!(page.double_height_lower & (1 << 3), 1 << 3);
    }
}
