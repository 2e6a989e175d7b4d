//! Post-enhance fixup (C6): resolves transparency semantics and propagates
//! double-height/width/size continuation cells left behind by C5.

use crate::cell::{Colour, Opacity, Page, Size, COLUMNS, ROWS};

/// One pass over the visible rows, per the "Flush semantics" design note:
/// resolve transparency first, then stamp continuation cells, then clean up
/// any continuation left orphaned by a since-overwritten parent.
pub fn post_enhance(page: &mut Page, display_rows: usize) {
    let rows = display_rows.clamp(1, ROWS);

    let mut written = vec![false; ROWS * COLUMNS];

    for r in 0..rows {
        for c in 0..COLUMNS {
            if page.cell(r, c).size.is_continuation() {
                continue;
            }
            resolve_transparency(page.cell_mut(r, c));
            stamp_continuations(page, &mut written, r, c);
        }
    }

    for r in 0..rows {
        for c in 0..COLUMNS {
            let idx = r * COLUMNS + c;
            let is_continuation = page.cell(r, c).size.is_continuation();
            if is_continuation && !written[idx] {
                cleanup_orphan(page, r, c);
            } else if is_continuation {
                resolve_transparency(page.cell_mut(r, c));
            }
        }
    }
}

fn resolve_transparency(cell: &mut crate::cell::Cell) {
    if cell.background != Colour::TRANSPARENT_BLACK {
        return;
    }
    if cell.foreground == Colour::TRANSPARENT_BLACK {
        cell.opacity = Opacity::TransparentSpace;
        cell.code_point = 0x0020;
    } else {
        cell.opacity = Opacity::SemiTransparent;
    }
}

fn stamp_continuations(page: &mut Page, written: &mut [bool], r: usize, c: usize) {
    let cell = *page.cell(r, c);
    let below_size = match cell.size {
        Size::DoubleHeight => Some(Size::DoubleHeightContinuation),
        Size::DoubleSize => Some(Size::DoubleSizeContinuation),
        _ => None,
    };

    if let Some(size) = below_size {
        if r + 1 < ROWS {
            let below = page.cell_mut(r + 1, c);
            *below = cell;
            below.size = size;
            written[(r + 1) * COLUMNS + c] = true;
        }
    }

    if matches!(cell.size, Size::DoubleWidth | Size::DoubleSize) && c + 1 < COLUMNS {
        let right = page.cell_mut(r, c + 1);
        *right = cell;
        right.size = Size::OverTop;
        written[r * COLUMNS + c + 1] = true;
    }

    if cell.size == Size::DoubleSize && r + 1 < ROWS && c + 1 < COLUMNS {
        let diagonal = page.cell_mut(r + 1, c + 1);
        *diagonal = cell;
        diagonal.size = Size::OverBottom;
        written[(r + 1) * COLUMNS + c + 1] = true;
    }
}

/// A continuation cell nobody's parent wrote this pass: the enhancer
/// overwrote the parent with an ordinary cell, leaving the continuation
/// stale. Only reclaimed when the cell directly above is itself `Normal`,
/// per the fixup rule.
fn cleanup_orphan(page: &mut Page, r: usize, c: usize) {
    if r == 0 {
        return;
    }
    if page.cell(r - 1, c).size != Size::Normal {
        return;
    }
    let cell = page.cell_mut(r, c);
    cell.size = Size::Normal;
    cell.code_point = 0x0020;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;

    #[test]
    fn both_transparent_black_becomes_transparent_space() {
        let mut page = Page::new(25);
        let cell = page.cell_mut(1, 0);
        cell.foreground = Colour::TRANSPARENT_BLACK;
        cell.background = Colour::TRANSPARENT_BLACK;
        cell.code_point = b'X' as u16;
        post_enhance(&mut page, 25);
        let cell = page.cell(1, 0);
        assert_eq!(cell.opacity, Opacity::TransparentSpace);
        assert_eq!(cell.code_point, 0x0020);
    }

    #[test]
    fn background_only_transparent_black_becomes_semi_transparent() {
        let mut page = Page::new(25);
        let cell = page.cell_mut(1, 0);
        cell.foreground = Colour::WHITE;
        cell.background = Colour::TRANSPARENT_BLACK;
        post_enhance(&mut page, 25);
        assert_eq!(page.cell(1, 0).opacity, Opacity::SemiTransparent);
    }

    #[test]
    fn double_size_writes_all_three_continuations() {
        let mut page = Page::new(25);
        page.cell_mut(2, 5).size = Size::DoubleSize;
        post_enhance(&mut page, 25);
        assert_eq!(page.cell(3, 5).size, Size::DoubleSizeContinuation);
        assert_eq!(page.cell(2, 6).size, Size::OverTop);
        assert_eq!(page.cell(3, 6).size, Size::OverBottom);
    }

    #[test]
    fn orphaned_continuation_under_a_normal_parent_resets() {
        let mut page = Page::new(25);
        // Simulate the enhancer leaving a continuation cell from a previous
        // pass while the parent above was subsequently overwritten plain.
        let stale: Cell = Cell {
            size: Size::DoubleHeightContinuation,
            code_point: b'Z' as u16,
            ..Cell::default()
        };
        *page.cell_mut(4, 2) = stale;
        post_enhance(&mut page, 25);
        assert_eq!(page.cell(4, 2).size, Size::Normal);
        assert_eq!(page.cell(4, 2).code_point, 0x0020);
    }
}
