//! Buffering, ordering and truncation of the records of one pkey group.
//!
//! A sorter collects a group with [KKVDocSorter::add_doc], resolves it with
//! [KKVDocSorter::sort], hands out the survivors with [KKVDocSorter::sorted_docs] and
//! is then [reset](KKVDocSorter::reset) for the next group.

use crate::doc::{KKVDoc, SKeyCollectInfoPool};
use crate::options::KKVIndexConfig;
use crate::Result;

mod comparator;
mod factory;
mod normal;
mod truncate;

pub use comparator::{KKVComparator, SKeyComparator};
pub use factory::{create_sorter, SortPhase};
pub use normal::NormalKKVDocSorter;
pub use truncate::TruncateKKVDocSorter;

pub trait KKVDocSorter {
    fn add_doc(&mut self, is_deleted_pkey: bool, doc: KKVDoc);

    /// Resolve the collected group. Called once, after the last record was added.
    fn sort(&mut self);

    /// Surviving records in dump order, with their pkey tombstone flag.
    fn sorted_docs(&self) -> Box<dyn Iterator<Item = (bool, &KKVDoc)> + '_>;

    fn sorted_len(&self) -> usize;

    fn reset(&mut self);

    /// Whether output groups are fully ordered and never truncated.
    fn keep_skey_sorted(&self) -> bool;
}

/// State shared by the sorter variants.
pub struct KKVDocSorterBase {
    docs: Vec<KKVDoc>,
    pool: SKeyCollectInfoPool,
    /// Pool indices in output order. The pool itself is never reordered.
    order: Vec<usize>,
    valid_skey_count: usize,
    deleted_skey_count: usize,
    has_deleted_pkey: bool,
    comparator: KKVComparator,
}

impl KKVDocSorterBase {
    pub fn new(config: &KKVIndexConfig) -> Result<KKVDocSorterBase> {
        Ok(KKVDocSorterBase {
            docs: vec![],
            pool: SKeyCollectInfoPool::default(),
            order: vec![],
            valid_skey_count: 0,
            deleted_skey_count: 0,
            has_deleted_pkey: false,
            comparator: KKVComparator::new(config)?,
        })
    }

    fn add_doc(&mut self, is_deleted_pkey: bool, doc: KKVDoc) {
        // a pkey tombstone can only open a group
        debug_assert!(!is_deleted_pkey || self.docs.is_empty());
        let doc_id = self.docs.len();
        let idx = self.pool.allocate();
        self.pool[idx].fill(is_deleted_pkey, &doc, doc_id);
        self.order.push(idx);
        self.docs.push(doc);

        if is_deleted_pkey {
            self.has_deleted_pkey = true;
        } else if self.pool[idx].is_deleted_skey {
            self.deleted_skey_count += 1;
        } else {
            self.valid_skey_count += 1;
        }
    }

    /// Position in `order` where the sortable records start.
    #[inline]
    fn sort_begin(&self) -> usize {
        if self.has_deleted_pkey {
            1
        } else {
            0
        }
    }

    /// Stable full sort of the records after the leading pkey tombstone.
    fn sort_all(&mut self) {
        let begin = self.sort_begin();
        let (docs, pool, comparator) = (&self.docs, &self.pool, &self.comparator);
        self.order[begin..].sort_by(|&l, &r| comparator.compare(&pool[l], &pool[r], docs));
    }

    fn sorted_docs(&self) -> Box<dyn Iterator<Item = (bool, &KKVDoc)> + '_> {
        Box::new(self.order.iter().map(move |&idx| {
            let info = &self.pool[idx];
            (info.is_deleted_pkey, &self.docs[info.doc_id])
        }))
    }

    fn reset(&mut self) {
        self.docs.clear();
        self.pool.reset();
        self.order.clear();
        self.valid_skey_count = 0;
        self.deleted_skey_count = 0;
        self.has_deleted_pkey = false;
    }

    #[inline]
    pub fn valid_skey_count(&self) -> usize {
        self.valid_skey_count
    }

    #[inline]
    pub fn deleted_skey_count(&self) -> usize {
        self.deleted_skey_count
    }
}
