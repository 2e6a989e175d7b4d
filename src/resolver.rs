//! Object address resolver (C4): given a target object type, a source page
//! and a packed triplet address, locates the object-definition header in a
//! POP/GPOP page's triplet pool and returns the body that follows it.

use crate::cache::PageCache;
use crate::error::{FormatError, Result};
use crate::page::{PageFunction, PagePayload, Pgno, RawPageHandle, POP_POOL_SIZE};
use crate::triplet::Triplet;

/// Invocation priority, lowest first: a page's own local X/26 data, then
/// active/adaptive/passive objects. An object may only invoke a strictly
/// higher type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ObjectType {
    Local,
    Active,
    Adaptive,
    Passive,
}

impl ObjectType {
    /// The object-definition header mode this type's header triplet must
    /// carry (`0x14` active .. `0x16` passive). `Local` never resolves
    /// through a pointer table and has no header mode.
    pub fn header_mode(self) -> u8 {
        0x14 + self.remote_index()
    }

    fn remote_index(self) -> u8 {
        match self {
            ObjectType::Local => unreachable!("local objects never resolve through a pointer table"),
            ObjectType::Active => 0,
            ObjectType::Adaptive => 1,
            ObjectType::Passive => 2,
        }
    }

    fn index(self) -> u8 {
        self.remote_index()
    }
}

/// A resolved object: the page holding its triplet pool, kept alive via the
/// cache's reference-counted handle, plus the body's bounds within it.
pub struct ObjectBody {
    page: RawPageHandle,
    start: usize,
    remaining: usize,
}

impl ObjectBody {
    pub fn triplets(&self) -> &[Triplet] {
        match &self.page.payload {
            PagePayload::Pop { pool, .. } => {
                let end = (self.start + self.remaining).min(pool.len());
                &pool[self.start..end]
            }
            _ => &[],
        }
    }
}

/// `address` is the 13-bit combined word `(triplet.address << 7) |
/// triplet.data` from the invoking column-address triplet.
pub fn resolve_object_address(
    cache: &dyn PageCache,
    object_type: ObjectType,
    pgno: Pgno,
    address: u16,
    expected_function: PageFunction,
) -> Result<ObjectBody> {
    let s1 = (address & 0xF) as u16;
    let packet = (address >> 7) & 3;
    let i = ((address >> 5) & 3) * 3 + object_type.index() as u16;

    let page = cache
        .get(pgno, s1)
        .ok_or(FormatError::NotFormattable { pgno, subno: s1 })?;

    let typed = match page.function {
        PageFunction::Unknown => {
            if !cache.coerce_unknown(pgno, s1, expected_function) {
                return Err(FormatError::CrossPageTyping {
                    pgno,
                    subno: s1,
                    expected: expected_function,
                });
            }
            cache.get(pgno, s1).ok_or(FormatError::NotFormattable {
                pgno,
                subno: s1,
            })?
        }
        // POP and GPOP pages share the same on-wire pointer-table/pool
        // layout; a page already typed as one is accepted in place of the
        // other.
        PageFunction::Pop | PageFunction::Gpop => page,
        other if other == expected_function => page,
        other => {
            return Err(FormatError::CrossPageTyping {
                pgno,
                subno: s1,
                expected: other,
            })
        }
    };

    let (pointers, pool) = match &typed.payload {
        PagePayload::Pop { pointers, pool } => (pointers, pool),
        _ => {
            return Err(FormatError::Structural {
                reason: "resolved page has no POP pointer table",
            })
        }
    };

    let pointer_index = (packet * 24 + i * 2 + ((address >> 4) & 1)) as usize;
    let pointer = *pointers.get(pointer_index).ok_or(FormatError::Structural {
        reason: "pointer index out of range",
    })? as usize;

    if pointer >= POP_POOL_SIZE {
        return Err(FormatError::Structural {
            reason: "triplet pointer out of bounds",
        });
    }

    let header = pool[pointer];
    let remaining = POP_POOL_SIZE - (pointer + 1);

    let mut check = address as u32;
    check ^= (header.address as u32) << 7;
    check ^= header.data as u32;

    if header.mode != object_type.header_mode() || (check & 0x1FF) != 0 {
        return Err(FormatError::Structural {
            reason: "object definition header failed validation",
        });
    }

    Ok(ObjectBody {
        page: typed,
        start: pointer + 1,
        remaining,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::test_support::MapCache;
    use crate::page::{RawPage, POP_POINTERS};

    fn pop_page(pgno: Pgno, subno: u16) -> RawPage {
        let mut raw = RawPage::new(pgno, subno);
        raw.function = PageFunction::Pop;
        raw.payload = PagePayload::Pop {
            pointers: [0xFFFF; POP_POINTERS],
            pool: [Triplet::default(); POP_POOL_SIZE],
        };
        raw
    }

    #[test]
    fn valid_header_resolves_to_body_start() {
        let mut raw = pop_page(0x150, 0);
        let object_type = ObjectType::Active;
        let address: u16 = 0x0030; // s1=0, packet=0, sub=1, low bit=0
        let i = ((address >> 5) & 3) * 3 + object_type.index() as u16;
        let pointer_index = ((address >> 7) & 3) * 24 + i * 2 + ((address >> 4) & 1);
        let header = Triplet::new(
            ((address >> 7) & 0x3F) as u8,
            object_type.header_mode(),
            (address & 0x7F) as u8,
        );
        if let PagePayload::Pop { pointers, pool } = &mut raw.payload {
            pointers[pointer_index as usize] = 10;
            pool[10] = header;
        }
        let cache = MapCache::default();
        cache.insert(raw);

        let result = resolve_object_address(&cache, object_type, 0x150, address, PageFunction::Pop);
        assert!(result.is_ok());
        assert_eq!(result.unwrap().start, 11);
    }

    #[test]
    fn missing_page_is_not_formattable() {
        let cache = MapCache::default();
        let err = resolve_object_address(&cache, ObjectType::Active, 0x150, 0, PageFunction::Pop)
            .unwrap_err();
        assert!(matches!(err, FormatError::NotFormattable { .. }));
    }

    #[test]
    fn out_of_bounds_pointer_is_structural() {
        let mut raw = pop_page(0x150, 0);
        if let PagePayload::Pop { pointers, .. } = &mut raw.payload {
            pointers[0] = 999;
        }
        let cache = MapCache::default();
        cache.insert(raw);
        let err = resolve_object_address(&cache, ObjectType::Active, 0x150, 0, PageFunction::Pop)
            .unwrap_err();
        assert!(matches!(err, FormatError::Structural { .. }));
    }
}
