//! Format driver (C9): orchestrates C2 -> C3 -> C5 -> C6 -> C7 -> C8 for one
//! `format_page` call and applies the header/subtitle/box opacity policy.

use serde::{Deserialize, Serialize};

use crate::cache::PageCache;
use crate::cell::{Opacity, Page};
use crate::charset::character_set_designation;
use crate::enhance::{self, Budget, Enhancer};
use crate::error::{FormatError, Result};
use crate::fonts::CharacterSet;
use crate::level1::format_level1;
use crate::links;
use crate::navigation;
use crate::page::{MagazineTable, PageFunction, Pgno, RawPage, Subno};
use crate::post_enhance;
use crate::resolver::ObjectType;

/// Caller-specified implementation level, ordered lowest to highest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Level {
    L1_0,
    L1_5,
    L2_5,
    L3_5,
}

pub struct FetchParams {
    pub pgno: Pgno,
    pub subno: Subno,
    pub max_level: Level,
    pub display_rows: usize,
    pub navigation: bool,
}

/// Runs the full C2..C8 pipeline into a freshly allocated page.
pub fn format_page(
    cache: &dyn PageCache,
    magazines: &MagazineTable,
    fonts: &dyn CharacterSet,
    params: &FetchParams,
) -> Result<Page> {
    let raw = cache
        .get(params.pgno, params.subno)
        .ok_or(FormatError::NotFormattable {
            pgno: params.pgno,
            subno: params.subno,
        })?;

    if !matches!(raw.function, PageFunction::Lop | PageFunction::Trigger) {
        return Err(FormatError::NotFormattable {
            pgno: params.pgno,
            subno: params.subno,
        });
    }

    let display_rows = params.display_rows.clamp(1, 25);
    let magazine = magazines.select(params.pgno, params.max_level);
    let extension = raw.extension.as_ref().unwrap_or(&magazine.extension);

    let mut page = Page::new(display_rows);
    page.pgno = raw.pgno;
    page.subno = raw.subno;

    page.page_opacity[1] = if raw.flags.is_newsflash() || raw.flags.is_subtitle() || raw.flags.inhibit_display()
    {
        Opacity::TransparentSpace
    } else {
        Opacity::Opaque
    };
    page.boxed_opacity[1] = if raw.flags.inhibit_display() {
        Opacity::TransparentSpace
    } else {
        Opacity::SemiTransparent
    };

    if raw.flags.suppress_header() {
        page.page_opacity[0] = Opacity::TransparentSpace;
        page.boxed_opacity[0] = Opacity::TransparentSpace;
    } else {
        page.page_opacity[0] = page.page_opacity[1];
        page.boxed_opacity[0] = page.boxed_opacity[1];
    }
    page.screen_colour = extension.screen_colour;
    page.screen_opacity = page.page_opacity[1];
    page.drcs_clut = extension.drcs_clut;

    let font_pair = character_set_designation(&raw, extension, fonts);
    format_level1(&mut page, &raw, extension, font_pair, fonts);

    if params.max_level >= Level::L1_5 {
        let snapshot = page.clone();
        let header_only = display_rows == 1;
        let mut budget = Budget::new();

        let result = if raw.enhancement_present != 0 {
            let triplets = enhance::local_triplets(&raw);
            let mut machine = Enhancer::new(ObjectType::Local, extension, params.max_level, header_only);
            machine.run(cache, magazine, fonts, &mut page, &raw, triplets, &mut budget)
        } else {
            enhance::run_default_object(cache, magazine, fonts, &mut page, &raw, extension, params.max_level, header_only, &mut budget)
        };

        match result {
            Ok(()) => {
                if params.max_level >= Level::L2_5 {
                    post_enhance::post_enhance(&mut page, display_rows);
                }
            }
            Err(_) => {
                page = snapshot;
            }
        }
    }

    if params.navigation {
        page.nav_link[5] = magazine.initial_page;
        for row in 1..display_rows.saturating_sub(1).max(1) {
            links::scan_row(&mut page, row);
        }
        if display_rows >= 25 {
            navigation::render_last_row(&mut page, &raw, magazine, cache);
        }
    }

    Ok(page)
}
