//! Link scanner (C7): flattens a row into an ASCII-ish buffer and recognises
//! page, subpage, URL and e-mail keywords in it, flagging the spanned cells.
//!
//! Grounded on `original_source/src/teletext.c`'s `keyword()` (the per-form
//! recogniser), `zap_links()` (the row scan that drives it) and
//! `vbi_resolve_link()` (the click-resolution fallback that retries from the
//! nearest `@`/`(a`/`(at` anchor to the left of the queried column).

use crate::cell::{Page, COLUMNS};
use crate::page::{Pgno, Subno};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkTarget {
    Page(Pgno),
    Subpage(Pgno, Subno),
    Url(String),
    Email(String),
}

const URL_BODY: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789%&/=?+-~:;@_.";
const EMAIL_LOCAL: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789._~-";

fn is_in(set: &[u8], b: u8) -> bool {
    set.contains(&b)
}

fn is_digit(b: u8) -> bool {
    b.is_ascii_digit()
}

/// Flattens row `row` into a padded ASCII buffer: index 0 and `len-1` are the
/// spec's leading/trailing padding spaces, column `c` lives at index `c+1`.
/// Continuation cells (`OverTop`/`OverBottom`) contribute a space so a scan
/// never spans across them.
fn flatten_row(page: &Page, row: usize) -> Vec<u8> {
    let mut buf = vec![b' '; COLUMNS + 2];
    for c in 0..COLUMNS {
        let cell = page.cell(row, c);
        if cell.size.is_continuation() {
            continue;
        }
        let ch = cell.code_point;
        buf[c + 1] = if (0x20..0x7F).contains(&ch) { ch as u8 } else { b' ' };
    }
    buf
}

fn parse_hex_digit_run(buf: &[u8], start: usize, count: usize) -> Option<u16> {
    let mut value: u16 = 0;
    for i in 0..count {
        let b = *buf.get(start + i)?;
        if !is_digit(b) {
            return None;
        }
        value = value * 16 + (b - b'0') as u16;
    }
    Some(value)
}

/// BCD-increments a two-digit subpage value, wrapping `0x99 -> 0x01` (there
/// is no subpage `0x00`).
fn bcd_increment_subpage(value: u16) -> u16 {
    let mut tens = value / 16;
    let mut ones = value % 16;
    ones += 1;
    if ones > 9 {
        ones = 0;
        tens += 1;
    }
    if tens > 9 {
        return 0x01;
    }
    tens * 16 + ones
}

/// Tries every recognised form starting at buffer index `i`; returns the
/// half-open `[start, end)` buffer range spanned and the resolved target.
fn recognize(buf: &[u8], i: usize, current_pgno: Pgno, current_subno: Subno) -> Option<(usize, usize, LinkTarget)> {
    recognize_subpage(buf, i, current_pgno, current_subno)
        .or_else(|| recognize_page(buf, i))
        .or_else(|| recognize_url(buf, i))
        .or_else(|| recognize_email(buf, i))
}

fn recognize_page(buf: &[u8], i: usize) -> Option<(usize, usize, LinkTarget)> {
    if i > 0 && is_digit(buf[i - 1]) {
        return None;
    }
    let value = parse_hex_digit_run(buf, i, 3)?;
    if buf.get(i + 3).copied().is_some_and(is_digit) {
        return None;
    }
    if !(0x100..=0x899).contains(&value) {
        return None;
    }
    Some((i, i + 3, LinkTarget::Page(value)))
}

/// Matches the page's own subpage indicator (e.g. the "04/28" counter a
/// broadcaster prints in a corner) rather than a link to some other page:
/// the leading one-or-two-digit group must equal the page's own current
/// subno, a lone trailing digit follows the separator, and the link target
/// is simply "the next subpage" (wrapping to `0x01` when the two typed
/// groups read identical, e.g. "05/05").
fn recognize_subpage(
    buf: &[u8],
    i: usize,
    current_pgno: Pgno,
    current_subno: Subno,
) -> Option<(usize, usize, LinkTarget)> {
    if i > 0 && is_digit(buf[i - 1]) {
        return None;
    }
    let mut len = 0usize;
    while len < 3 && buf.get(i + len).copied().is_some_and(is_digit) {
        len += 1;
    }
    if len == 0 || len == 3 {
        return None;
    }
    let leading = parse_hex_digit_run(buf, i, len)?;
    let sep = *buf.get(i + len)?;
    if sep != b'/' && sep != b':' {
        return None;
    }
    if leading != (current_subno & 0xFF) {
        return None;
    }
    let trailing_at = i + len + 1;
    let trailing = *buf.get(trailing_at)?;
    if !is_digit(trailing) {
        return None;
    }
    if buf.get(trailing_at + 1).copied().is_some_and(is_digit) {
        return None;
    }
    let trailing = (trailing - b'0') as u16;
    let subno = if leading == trailing {
        0x01
    } else {
        bcd_increment_subpage(leading)
    };
    Some((i, trailing_at + 1, LinkTarget::Subpage(current_pgno, subno)))
}

fn recognize_url(buf: &[u8], i: usize) -> Option<(usize, usize, LinkTarget)> {
    const SCHEMES: [(&[u8], &str); 4] = [
        (b"http://", ""),
        (b"https://", ""),
        (b"ftp://", ""),
        (b"www.", "http://"),
    ];
    for (prefix, rewrite) in SCHEMES {
        if buf[i..].starts_with(prefix) {
            let mut end = i + prefix.len();
            while buf.get(end).copied().is_some_and(|b| is_in(URL_BODY, b)) {
                end += 1;
            }
            let body = &buf[i..end];
            if !has_dotted_host(body) {
                continue;
            }
            let text = String::from_utf8_lossy(body);
            let url = if rewrite.is_empty() {
                text.into_owned()
            } else {
                format!("{rewrite}{text}")
            };
            return Some((i, end, LinkTarget::Url(url)));
        }
    }
    None
}

fn has_dotted_host(body: &[u8]) -> bool {
    let host_start = body.iter().position(|&b| b == b'/').unwrap_or(body.len());
    let host = &body[..host_start];
    let after_scheme = host
        .windows(3)
        .position(|w| w == b"://")
        .map(|p| p + 3)
        .unwrap_or(0);
    let host = &host[after_scheme..];
    let host = host.strip_prefix(b"www.").unwrap_or(host);
    host.contains(&b'.') && host.iter().any(u8::is_ascii_alphanumeric)
}

fn recognize_email(buf: &[u8], i: usize) -> Option<(usize, usize, LinkTarget)> {
    let at_markers: [&[u8]; 4] = [b"@", b"\xa7", b"(at)", b"(a)"];
    for marker in at_markers {
        if !buf[i..].starts_with(marker) {
            continue;
        }
        let after = i + marker.len();
        let mut host_end = after;
        while buf
            .get(host_end)
            .copied()
            .is_some_and(|b| is_in(URL_BODY, b) && b != b'@')
        {
            host_end += 1;
        }
        let host = &buf[after..host_end];
        if !(host.contains(&b'.') && host.iter().any(u8::is_ascii_alphanumeric)) {
            continue;
        }

        let mut local_start = i;
        while local_start > 0 && is_in(EMAIL_LOCAL, buf[local_start - 1]) {
            local_start -= 1;
        }
        if local_start == i {
            continue;
        }

        let local = String::from_utf8_lossy(&buf[local_start..i]);
        let host_str = String::from_utf8_lossy(host);
        return Some((local_start, host_end, LinkTarget::Email(format!("mailto:{local}@{host_str}"))));
    }
    None
}

/// Scans row `row` for keyword links, flagging every spanned cell's `link`
/// bit. Rows 0 and the navigation row are the caller's responsibility to
/// exclude; this function scans whatever row it is given.
pub fn scan_row(page: &mut Page, row: usize) {
    let buf = flatten_row(page, row);
    let current_pgno = page.pgno;
    let current_subno = page.subno;

    let mut i = 1; // skip the leading pad
    while i < buf.len() - 1 {
        match recognize(&buf, i, current_pgno, current_subno) {
            Some((start, end, _target)) => {
                for col in start.saturating_sub(1)..end.saturating_sub(1) {
                    if col < COLUMNS {
                        page.cell_mut(row, col).link = true;
                    }
                }
                i = end.max(i + 1);
            }
            None => i += 1,
        }
    }
}

/// Re-runs the scan starting at `col` on row `row`; if nothing is found
/// there, retries from the nearest e-mail anchor (`@`, `\xa7`, `(at)` or
/// `(a)`) to the left, matching `vbi_resolve_link`'s fallback for a click
/// that lands inside an e-mail local-part rather than at its `@`.
pub fn resolve_link(page: &Page, row: usize, col: usize) -> Option<LinkTarget> {
    let buf = flatten_row(page, row);
    let current_pgno = page.pgno;
    let current_subno = page.subno;

    if let Some((_, _, target)) = recognize(&buf, col + 1, current_pgno, current_subno) {
        return Some(target);
    }
    let anchor = find_email_anchor_before(&buf, col + 1)?;
    recognize(&buf, anchor, current_pgno, current_subno).map(|(_, _, t)| t)
}

fn find_email_anchor_before(buf: &[u8], before: usize) -> Option<usize> {
    const MARKERS: [&[u8]; 4] = [b"(at)", b"(a)", b"@", b"\xa7"];
    (0..before).rev().find(|&j| MARKERS.iter().any(|m| buf[j..].starts_with(m)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;

    fn write_text(page: &mut Page, row: usize, col: usize, text: &str) {
        for (i, ch) in text.chars().enumerate() {
            *page.cell_mut(row, col + i) = Cell {
                code_point: ch as u16,
                ..Cell::default()
            };
        }
    }

    #[test]
    fn recognises_a_bare_three_digit_page_number() {
        let mut page = Page::new(25);
        write_text(&mut page, 5, 10, "see p150 now");
        scan_row(&mut page, 5);
        assert!(page.cell(5, 14).link);
        assert!(page.cell(5, 15).link);
        assert!(page.cell(5, 16).link);
    }

    #[test]
    fn scanning_twice_leaves_the_same_link_flags() {
        let mut page = Page::new(25);
        write_text(&mut page, 5, 10, "see p150 or www.example.com now");
        scan_row(&mut page, 5);
        let first: Vec<bool> = (0..COLUMNS).map(|c| page.cell(5, c).link).collect();
        scan_row(&mut page, 5);
        let second: Vec<bool> = (0..COLUMNS).map(|c| page.cell(5, c).link).collect();
        assert_eq!(first, second);
        assert!(first.iter().any(|&l| l));
    }

    #[test]
    fn does_not_match_a_four_digit_run() {
        let mut page = Page::new(25);
        write_text(&mut page, 5, 0, "21500");
        scan_row(&mut page, 5);
        assert!(!page.cell(5, 0).link);
    }

    #[test]
    fn recognises_a_www_url() {
        let mut page = Page::new(25);
        write_text(&mut page, 5, 0, "www.example.com/page");
        scan_row(&mut page, 5);
        assert!(page.cell(5, 0).link);
    }

    #[test]
    fn recognises_an_email_address() {
        let mut page = Page::new(25);
        write_text(&mut page, 5, 0, "mail me at bob@example.com today");
        scan_row(&mut page, 5);
        let at = "mail me at bob@example.com today".find('@').unwrap();
        assert!(page.cell(5, at - 3).link);
    }

    #[test]
    fn recognises_the_short_a_email_form() {
        let mut page = Page::new(25);
        write_text(&mut page, 5, 0, "bob(a)example.com");
        scan_row(&mut page, 5);
        assert!(page.cell(5, 0).link);
        assert!(page.cell(5, "bob(a)example.com".len() - 1).link);
    }

    #[test]
    fn recognises_the_subpage_counter_and_bcd_increments_it() {
        let mut page = Page::new(25);
        page.pgno = 0x150;
        page.subno = 0x04;
        write_text(&mut page, 5, 0, "04/9 of this edition");
        scan_row(&mut page, 5);
        for col in 0..4 {
            assert!(page.cell(5, col).link, "expected link at column {col}");
        }
        assert!(!page.cell(5, 4).link);

        match resolve_link(&page, 5, 0) {
            Some(LinkTarget::Subpage(pgno, subno)) => {
                assert_eq!(pgno, 0x150);
                assert_eq!(subno, 0x05);
            }
            other => panic!("expected a subpage link, got {other:?}"),
        }
    }

    #[test]
    fn subpage_counter_wraps_to_one_when_the_two_groups_match() {
        let mut page = Page::new(25);
        page.pgno = 0x150;
        page.subno = 0x05;
        write_text(&mut page, 5, 0, "05/5");
        scan_row(&mut page, 5);

        match resolve_link(&page, 5, 0) {
            Some(LinkTarget::Subpage(_, subno)) => assert_eq!(subno, 0x01),
            other => panic!("expected a subpage link, got {other:?}"),
        }
    }

    #[test]
    fn subpage_counter_does_not_match_a_foreign_leading_group() {
        let mut page = Page::new(25);
        page.pgno = 0x150;
        page.subno = 0x04;
        write_text(&mut page, 5, 0, "07/9");
        scan_row(&mut page, 5);
        assert!(!page.cell(5, 0).link);
    }
}
