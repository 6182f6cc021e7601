use crate::doc::KKVDoc;
use crate::options::KKVIndexConfig;
use crate::sort::{KKVDocSorter, KKVDocSorterBase};
use crate::Result;

/// Keeps at most `limit` valid records of a group, plus every tombstone.
///
/// Survivors are picked by skey order and then ordered with the full comparator.
pub struct TruncateKKVDocSorter {
    base: KKVDocSorterBase,
    limit: usize,
}

impl TruncateKKVDocSorter {
    pub fn new(config: &KKVIndexConfig, limit: u32) -> Result<TruncateKKVDocSorter> {
        Ok(TruncateKKVDocSorter {
            base: KKVDocSorterBase::new(config)?,
            limit: limit as usize,
        })
    }

    fn truncate(&mut self) {
        let base = &mut self.base;
        if base.valid_skey_count <= self.limit {
            return;
        }
        let begin = base.sort_begin();
        let flush_count = base.deleted_skey_count + self.limit;
        debug!(
            "truncate group of {} valid and {} deleted skeys to {}",
            base.valid_skey_count, base.deleted_skey_count, flush_count
        );

        let (pool, comparator) = (&base.pool, &base.comparator);
        base.order[begin..].select_nth_unstable_by(flush_count, |&l, &r| {
            comparator.compare_by_skey(&pool[l], &pool[r])
        });
        base.order.truncate(begin + flush_count);
        base.valid_skey_count = self.limit;
    }
}

impl KKVDocSorter for TruncateKKVDocSorter {
    fn add_doc(&mut self, is_deleted_pkey: bool, doc: KKVDoc) {
        self.base.add_doc(is_deleted_pkey, doc);
    }

    fn sort(&mut self) {
        self.truncate();
        self.base.sort_all();
    }

    fn sorted_docs(&self) -> Box<dyn Iterator<Item = (bool, &KKVDoc)> + '_> {
        self.base.sorted_docs()
    }

    #[inline]
    fn sorted_len(&self) -> usize {
        self.base.order.len()
    }

    fn reset(&mut self) {
        self.base.reset();
    }

    fn keep_skey_sorted(&self) -> bool {
        false
    }
}
