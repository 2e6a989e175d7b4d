//! Support types for the `ttx-tools` binary: a JSON fixture format and a
//! single-threaded cache built from it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::cache::PageCache;
use crate::page::{Magazine, PageFunction, Pgno, RawPage, RawPageHandle, Subno};

/// A fixture file: every page a `format-page`/`dump-triplets` invocation
/// might need, plus the one magazine extension state they share.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Fixture {
    pub pages: Vec<RawPage>,
    #[serde(default)]
    pub magazine: Magazine,
}

impl Fixture {
    pub fn load(path: &std::path::Path) -> anyhow::Result<Fixture> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn page(&self, pgno: Pgno, subno: Subno) -> anyhow::Result<&RawPage> {
        self.pages
            .iter()
            .find(|p| p.pgno == pgno && p.subno == subno)
            .ok_or_else(|| anyhow::anyhow!("fixture has no page {pgno:03x}/{subno:02x}"))
    }
}

/// A `PageCache` over a fixture's pages, for one-shot CLI use. Retyping
/// `Unknown` pages is honoured in memory only; the fixture file on disk is
/// never rewritten.
pub struct FixtureCache {
    pages: RefCell<HashMap<(Pgno, Subno), Rc<RawPage>>>,
}

impl FixtureCache {
    pub fn new(fixture: &Fixture) -> Self {
        let pages = fixture
            .pages
            .iter()
            .cloned()
            .map(|p| ((p.pgno, p.subno), Rc::new(p)))
            .collect();
        FixtureCache {
            pages: RefCell::new(pages),
        }
    }
}

impl PageCache for FixtureCache {
    fn get(&self, pgno: Pgno, subno: Subno) -> Option<RawPageHandle> {
        self.pages.borrow().get(&(pgno, subno)).cloned()
    }

    fn coerce_unknown(&self, pgno: Pgno, subno: Subno, to: PageFunction) -> bool {
        let mut pages = self.pages.borrow_mut();
        match pages.get_mut(&(pgno, subno)) {
            Some(rc) if rc.function.can_coerce_to(to) => {
                let mut updated = (**rc).clone();
                updated.function = to;
                *rc = Rc::new(updated);
                true
            }
            _ => false,
        }
    }
}

/// Renders a formatted page as 25 lines of plain text, one row per line,
/// trailing spaces trimmed.
pub fn render_plain_text(page: &crate::cell::Page) -> String {
    let mut out = String::new();
    for r in 0..page.rows {
        let mut line = String::new();
        for c in 0..crate::cell::COLUMNS {
            let cp = page.cell(r, c).code_point;
            let ch = char::from_u32(cp as u32).unwrap_or(' ');
            line.push(if ch.is_control() { ' ' } else { ch });
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}
