use crate::doc::KKVDoc;
use crate::options::KKVIndexConfig;
use crate::sort::{KKVDocSorter, KKVDocSorterBase};
use crate::Result;

/// Orders a whole group with the [KKVComparator](crate::sort::KKVComparator), never drops records.
pub struct NormalKKVDocSorter {
    base: KKVDocSorterBase,
}

impl NormalKKVDocSorter {
    pub fn new(config: &KKVIndexConfig) -> Result<NormalKKVDocSorter> {
        Ok(NormalKKVDocSorter {
            base: KKVDocSorterBase::new(config)?,
        })
    }
}

impl KKVDocSorter for NormalKKVDocSorter {
    fn add_doc(&mut self, is_deleted_pkey: bool, doc: KKVDoc) {
        self.base.add_doc(is_deleted_pkey, doc);
    }

    fn sort(&mut self) {
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
        true
    }
}
