//! The page cache collaborator (out of scope to implement, per spec.md §1):
//! a keyed, interior-mutable store of encoded pages. This is the trait
//! boundary every resolving component (`resolver`, `enhance`, `driver`) is
//! written against.

use crate::page::{PageFunction, Pgno, RawPageHandle, Subno};

pub trait PageCache {
    fn get(&self, pgno: Pgno, subno: Subno) -> Option<RawPageHandle>;

    /// The one mutation the formatter may ever request: retype a page
    /// currently `Unknown` to a concrete function. Implementors must
    /// serialise this against concurrent format calls (a lock or a
    /// compare-and-set on the stored tag); returns whether the retyping
    /// happened (`false` if the page was already typed to something else,
    /// or the page was not `Unknown`).
    fn coerce_unknown(&self, pgno: Pgno, subno: Subno, to: PageFunction) -> bool;
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use crate::page::RawPage;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    /// A single-threaded cache backing unit tests colocated with production
    /// code, and the centralised `src/test.rs` end-to-end scenarios.
    #[derive(Default)]
    pub struct MapCache {
        pages: RefCell<HashMap<(Pgno, Subno), Rc<RawPage>>>,
    }

    impl MapCache {
        pub fn insert(&self, page: RawPage) {
            self.pages
                .borrow_mut()
                .insert((page.pgno, page.subno), Rc::new(page));
        }
    }

    impl PageCache for MapCache {
        fn get(&self, pgno: Pgno, subno: Subno) -> Option<RawPageHandle> {
            self.pages.borrow().get(&(pgno, subno)).cloned()
        }

        fn coerce_unknown(&self, pgno: Pgno, subno: Subno, to: PageFunction) -> bool {
            let mut pages = self.pages.borrow_mut();
            match pages.get_mut(&(pgno, subno)) {
                Some(rc) => {
                    if !rc.function.can_coerce_to(to) {
                        return false;
                    }
                    let mut updated = (**rc).clone();
                    updated.function = to;
                    *rc = Rc::new(updated);
                    true
                }
                None => false,
            }
        }
    }
}
