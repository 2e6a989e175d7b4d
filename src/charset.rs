//! Character-set designator (C2): resolves the primary/secondary font
//! descriptors in effect for a page from its magazine extension, its own
//! national bits, and an optional compile-time override.

use crate::fonts::CharacterSet;
use crate::page::{Extension, RawPage};

/// Primary and secondary (ESC-shifted) font descriptor indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FontPair {
    pub primary: u8,
    pub secondary: u8,
}

/// A build configured, fixed descriptor index that short-circuits both
/// slots, mirroring the original's `#ifdef libzvbi_TTX_OVERRIDE_CHAR_SET`
/// compile-time branch.
#[cfg(feature = "fixed-charset-override")]
const FIXED_OVERRIDE: Option<u8> = parse_override(option_env!("TTX_CHARSET_OVERRIDE"));

#[cfg(feature = "fixed-charset-override")]
const fn parse_override(raw: Option<&str>) -> Option<u8> {
    match raw {
        None => None,
        Some(s) => {
            let bytes = s.as_bytes();
            let mut value: u32 = 0;
            let mut i = 0;
            while i < bytes.len() {
                let d = bytes[i];
                if !d.is_ascii_digit() {
                    return None;
                }
                value = value * 10 + (d - b'0') as u32;
                i += 1;
            }
            if value > 0xFF {
                None
            } else {
                Some(value as u8)
            }
        }
    }
}

fn designate(extension_slot: u8, national: u8, fonts: &dyn CharacterSet) -> u8 {
    #[cfg(feature = "fixed-charset-override")]
    if let Some(fixed) = FIXED_OVERRIDE {
        return fixed;
    }
    let candidate = (extension_slot & !7) | (national & 7);
    if fonts.is_valid_descriptor(candidate) {
        candidate
    } else {
        extension_slot
    }
}

/// Resolve the `(primary, alternate)` descriptor pair for `page`, given the
/// effective extension (page-local if present, else the magazine's).
pub fn character_set_designation(
    page: &RawPage,
    extension: &Extension,
    fonts: &dyn CharacterSet,
) -> FontPair {
    FontPair {
        primary: designate(extension.char_set[0], page.national, fonts),
        secondary: designate(extension.char_set[1], page.national, fonts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::Latin1CharacterSet;
    use crate::page::RawPage;

    #[test]
    fn prefers_national_variant_when_valid() {
        let mut page = RawPage::new(0x100, 0);
        page.national = 3;
        let ext = Extension {
            char_set: [0x08, 0x00],
            ..Extension::default()
        };
        let pair = character_set_designation(&page, &ext, &Latin1CharacterSet);
        assert_eq!(pair.primary, 0x0B);
    }

    #[test]
    fn falls_back_to_extension_slot_when_invalid() {
        struct NoneValid;
        impl CharacterSet for NoneValid {
            fn g0(&self, _: u8, c: u8) -> char {
                c as char
            }
            fn g2(&self, c: u8) -> char {
                c as char
            }
            fn composed(&self, _: u8, base: char) -> char {
                base
            }
            fn is_valid_descriptor(&self, _: u8) -> bool {
                false
            }
        }
        let page = RawPage::new(0x100, 0);
        let ext = Extension {
            char_set: [0x08, 0x00],
            ..Extension::default()
        };
        let pair = character_set_designation(&page, &ext, &NoneValid);
        assert_eq!(pair.primary, 0x08);
    }
}
