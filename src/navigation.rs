//! Navigation synthesis (C8): FLOF bar/coloured-link mode, TOP bar, and the
//! virtual TOP index page.
//!
//! Grounded on `original_source/src/teletext.c`'s `flof_navigation_bar()`
//! (plain FLOF bar: palette `{red,green,yellow,cyan}` at column `10*i+3`)
//! and `flof_links()` (coloured-link mode: groups row 24 into runs of a
//! palette foreground colour, trimming each run's leading/trailing spaces
//! before marking it clickable) for C7/C8's FLOF half, and on `top_label()`
//! / `top_index()` for the TOP bar's neighbour search and the virtual
//! index page's per-subpage AIT listing.

use crate::cache::PageCache;
use crate::cell::{Cell, Colour, NavLink, Page, Size, COLUMNS};
use crate::page::{AitEntry, Magazine, PagePayload, Pgno, RawPage, Subno};

const FLOF_PALETTE: [Colour; 4] = [Colour::RED, Colour::GREEN, Colour::YELLOW, Colour::CYAN];
const DEAD_LINK: Pgno = 0x0FFF;
const LAST_ROW: usize = 24;

fn blank_nav_cell(colour: Colour) -> Cell {
    Cell {
        code_point: 0x0020,
        foreground: colour,
        background: Colour::BLACK,
        ..Cell::default()
    }
}

fn write_text(page: &mut Page, row: usize, col: usize, text: &str, colour: Colour) {
    for (i, ch) in text.chars().enumerate() {
        if col + i >= COLUMNS {
            break;
        }
        *page.cell_mut(row, col + i) = Cell {
            code_point: ch as u16,
            foreground: colour,
            background: Colour::BLACK,
            ..Cell::default()
        };
    }
}

/// Entry point referenced by the format driver once Level-1/enhancement is
/// complete and the caller asked for a fully rendered (25-row) page.
pub fn render_last_row(page: &mut Page, raw: &RawPage, magazine: &Magazine, cache: &dyn PageCache) {
    let flof_links: Vec<NavLink> = (0..4)
        .map(|i| raw.link[crate::page::LINK_FLOF_0 + i])
        .collect();
    let flof_declared = flof_links.iter().any(|l| l.pgno != 0);

    if flof_declared {
        if raw.lop_lines & (1 << LAST_ROW) != 0 {
            flof_coloured_link_mode(page, &flof_links);
        } else {
            flof_bar(page, &flof_links);
        }
    } else if magazine.btt_page.is_some() {
        top_bar(page, raw.pgno, magazine, cache);
    }
}

fn flof_bar(page: &mut Page, links: &[NavLink]) {
    for c in 0..COLUMNS {
        *page.cell_mut(LAST_ROW, c) = blank_nav_cell(Colour::WHITE);
    }
    for (i, link) in links.iter().enumerate() {
        let colour = FLOF_PALETTE[i];
        let col = 10 * i + 3;
        let text = format!("{:03x}", link.pgno & 0xFFF);
        write_text(page, LAST_ROW, col, &text, colour);
        if link.pgno != DEAD_LINK && link.pgno != 0 {
            for c in col..col + 3 {
                page.cell_mut(LAST_ROW, c).link = true;
                page.nav_index[c] = i as u8;
            }
        }
    }
}

/// A page whose own Level-1 formatter already drew row 24: find runs of a
/// FLOF palette colour and mark them clickable instead of overwriting them.
fn flof_coloured_link_mode(page: &mut Page, links: &[NavLink]) {
    let mut c = 0;
    while c < COLUMNS {
        let colour = page.cell(LAST_ROW, c).foreground;
        let slot = FLOF_PALETTE.iter().position(|&p| p == colour);
        let run_start = c;
        let mut run_end = c + 1;
        while run_end < COLUMNS && page.cell(LAST_ROW, run_end).foreground == colour {
            run_end += 1;
        }
        if let Some(i) = slot {
            if links[i].pgno != 0 && links[i].pgno != DEAD_LINK {
                let mut start = run_start;
                let mut end = run_end;
                while start < end && page.cell(LAST_ROW, start).code_point == 0x0020 {
                    start += 1;
                }
                while end > start && page.cell(LAST_ROW, end - 1).code_point == 0x0020 {
                    end -= 1;
                }
                for col in start..end {
                    page.cell_mut(LAST_ROW, col).link = true;
                    page.nav_index[col] = i as u8;
                }
            }
        }
        c = run_end;
    }
}

struct TopNeighbours {
    prior: Option<Pgno>,
    next_group: Option<Pgno>,
    next_block: Option<Pgno>,
}

fn btt_page_type(page_types: &[u8], pgno: Pgno) -> u8 {
    let idx = (pgno.wrapping_sub(0x100)) as usize;
    page_types.get(idx).copied().unwrap_or(0)
}

fn find_top_neighbours(page_types: &[u8], pgno: Pgno) -> TopNeighbours {
    let mut prior = None;
    let mut p = pgno;
    while p > 0x100 {
        p -= 1;
        match btt_page_type(page_types, p) {
            1 | 2 => {
                prior = Some(p);
                break;
            }
            _ => {}
        }
    }

    let mut next_group = None;
    let mut next_block = None;
    let mut p = pgno;
    while p < 0x8FF {
        p += 1;
        match btt_page_type(page_types, p) {
            2 if next_group.is_none() => next_group = Some(p),
            1 if next_block.is_none() => next_block = Some(p),
            _ => {}
        }
        if next_group.is_some() && next_block.is_some() {
            break;
        }
    }

    TopNeighbours {
        prior,
        next_group,
        next_block,
    }
}

fn ait_title(cache: &dyn PageCache, magazine: &Magazine, pgno: Pgno) -> String {
    let Some(ait_link) = magazine.ait_page else {
        return String::new();
    };
    let Some(ait) = cache.get(ait_link.pgno, ait_link.subno) else {
        return String::new();
    };
    if let PagePayload::Ait { entries } = &ait.payload {
        if let Some(entry) = entries.iter().find(|e| e.page.pgno == pgno) {
            return ait_text(entry);
        }
    }
    String::new()
}

fn ait_text(entry: &AitEntry) -> String {
    let end = entry.text.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
    String::from_utf8_lossy(&entry.text[..end]).into_owned()
}

fn centred(label: &str, width: usize) -> String {
    let label = if label.len() > width { &label[..width] } else { label };
    let pad = width - label.len();
    let left = pad / 2;
    let right = pad - left;
    format!("{}{}{}", " ".repeat(left), label, " ".repeat(right))
}

fn top_bar(page: &mut Page, pgno: Pgno, magazine: &Magazine, cache: &dyn PageCache) {
    for c in 0..COLUMNS {
        *page.cell_mut(LAST_ROW, c) = blank_nav_cell(Colour::WHITE);
    }

    let Some(btt_link) = magazine.btt_page else { return };
    let Some(btt) = cache.get(btt_link.pgno, btt_link.subno) else {
        return;
    };
    let PagePayload::Btt { page_types } = &btt.payload else {
        return;
    };

    let neighbours = find_top_neighbours(page_types, pgno);

    if let Some(prior) = neighbours.prior {
        let label = centred(&ait_title(cache, magazine, prior), 12);
        write_text(page, LAST_ROW, 1, &label, Colour::WHITE);
    }
    if let Some(next_group) = neighbours.next_group {
        let mut label = centred(&ait_title(cache, magazine, next_group), 10);
        label.push_str(">");
        write_text(page, LAST_ROW, 14, &label, Colour::GREEN);
    }
    if let Some(next_block) = neighbours.next_block {
        let mut label = centred(&ait_title(cache, magazine, next_block), 9);
        label.push_str(">>");
        write_text(page, LAST_ROW, 27, &label, Colour::YELLOW);
    }
}

/// Builds the virtual TOP index page (pgno `0x900`), 17 rows of AIT entries
/// per subpage.
pub fn build_top_index(cache: &dyn PageCache, magazine: &Magazine, subno: Subno) -> Page {
    let mut page = Page::new(25);
    page.pgno = 0x900;
    page.subno = subno;

    let header: &str = "TOP Index";
    for (i, ch) in header.chars().enumerate() {
        let col = 2 + i * 2;
        if col + 1 >= COLUMNS {
            break;
        }
        *page.cell_mut(0, col) = Cell {
            code_point: ch as u16,
            size: Size::DoubleWidth,
            ..Cell::default()
        };
    }

    let Some(ait_link) = magazine.ait_page else {
        return page;
    };
    let Some(ait) = cache.get(ait_link.pgno, ait_link.subno) else {
        return page;
    };
    let PagePayload::Ait { entries } = &ait.payload else {
        return page;
    };
    let Some(btt_link) = magazine.btt_page else {
        return page;
    };
    let Some(btt) = cache.get(btt_link.pgno, btt_link.subno) else {
        return page;
    };
    let PagePayload::Btt { page_types } = &btt.payload else {
        return page;
    };

    let mut sorted: Vec<&AitEntry> = entries.iter().filter(|e| e.page.pgno != 0).collect();
    sorted.sort_by_key(|e| (e.page.pgno, e.page.subno));

    let skip = 17 * subno as usize;
    let mut row = 1;
    for entry in sorted.into_iter().skip(skip).take(17) {
        let page_type = btt_page_type(page_types, entry.page.pgno);
        let indent = if page_type == 1 { 1 } else { 3 };
        let title = ait_text(entry);
        let dots_width = COLUMNS.saturating_sub(indent + 4);
        let mut line = title;
        line.truncate(dots_width);
        let padding = dots_width.saturating_sub(line.len());
        line.push_str(&".".repeat(padding));
        line.push_str(&format!("{:03x}", entry.page.pgno & 0xFFF));
        write_text(&mut page, row, indent, &line, Colour::WHITE);
        row += 1;
    }

    page
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::test_support::MapCache;
    use crate::page::RawPage;

    #[test]
    fn flof_bar_renders_pgno_and_skips_dead_link() {
        let mut raw = RawPage::new(0x150, 0);
        raw.link[crate::page::LINK_FLOF_0] = NavLink { pgno: 0x123, subno: 0 };
        raw.link[crate::page::LINK_FLOF_0 + 1] = NavLink { pgno: 0x456, subno: 0 };
        raw.link[crate::page::LINK_FLOF_0 + 2] = NavLink { pgno: 0x789, subno: 0 };
        raw.link[crate::page::LINK_FLOF_0 + 3] = NavLink { pgno: 0xFFF, subno: 0 };

        let mut page = Page::new(25);
        let magazine = Magazine::new();
        let cache = MapCache::default();
        render_last_row(&mut page, &raw, &magazine, &cache);

        assert_eq!(page.cell(24, 3).foreground, Colour::RED);
        assert!(page.cell(24, 3).link);
        assert!(!page.cell(24, 33).link);
    }

    #[test]
    fn no_flof_and_no_top_leaves_row_untouched() {
        let raw = RawPage::new(0x150, 0);
        let mut page = Page::new(25);
        let magazine = Magazine::new();
        let cache = MapCache::default();
        render_last_row(&mut page, &raw, &magazine, &cache);
        assert_eq!(page.cell(24, 3).code_point, 0x0020);
    }
}
