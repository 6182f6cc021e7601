use crate::doc::{KKVDoc, SKeyCollectInfo};
use crate::error::KKVError;
use crate::options::{FieldSchema, FieldType, KKVIndexConfig, SortOrder, TIMESTAMP_SORT_FIELD};
use crate::value::{compare_field, locate_field};
use crate::Result;
use std::cmp::Ordering;

#[inline]
fn apply_order(ordering: Ordering, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Ascending => ordering,
        SortOrder::Descending => ordering.reverse(),
    }
}

/// Orders raw skeys by their declared type. Signed skeys are sign-extended in their
/// raw form, string skeys compare by hash.
#[derive(Copy, Clone, Debug)]
pub struct SKeyComparator {
    signed: bool,
    order: SortOrder,
}

impl SKeyComparator {
    pub fn new(field_type: FieldType, order: SortOrder) -> SKeyComparator {
        let signed = matches!(
            field_type,
            FieldType::Int8 | FieldType::Int16 | FieldType::Int32 | FieldType::Int64
        );
        SKeyComparator { signed, order }
    }

    pub fn compare(&self, lhs: u64, rhs: u64) -> Ordering {
        let ordering = if self.signed {
            (lhs as i64).cmp(&(rhs as i64))
        } else {
            lhs.cmp(&rhs)
        };
        apply_order(ordering, self.order)
    }
}

#[derive(Clone, Debug)]
enum SortLayer {
    Timestamp(SortOrder),
    SKey(SKeyComparator),
    ValueField {
        index: usize,
        field_type: FieldType,
        order: SortOrder,
    },
}

/// Multi-layer record order of a pkey group.
#[derive(Clone, Debug)]
pub struct KKVComparator {
    skey_comparator: SKeyComparator,
    layers: Vec<SortLayer>,
    fields: Vec<FieldSchema>,
}

impl KKVComparator {
    pub fn new(config: &KKVIndexConfig) -> Result<KKVComparator> {
        let skey_comparator = SKeyComparator::new(config.skey_field.field_type, config.skey_order);
        let mut layers = Vec::with_capacity(config.sort_params.len());
        for param in &config.sort_params {
            let layer = if param.field == TIMESTAMP_SORT_FIELD {
                SortLayer::Timestamp(param.order)
            } else if param.field == config.skey_field.name {
                if !config.skey_field.field_type.is_numeric() {
                    return Err(invalid_sort_field(&param.field, "string skey is not sortable"));
                }
                SortLayer::SKey(SKeyComparator::new(
                    config.skey_field.field_type,
                    param.order,
                ))
            } else {
                let index = config.value.field_index(&param.field).ok_or_else(|| {
                    invalid_sort_field(&param.field, "field not found in value schema")
                })?;
                let field = &config.value.fields[index];
                if field.multi_value || !field.field_type.is_numeric() {
                    return Err(invalid_sort_field(
                        &param.field,
                        "multi-value or string field is not sortable",
                    ));
                }
                SortLayer::ValueField {
                    index,
                    field_type: field.field_type,
                    order: param.order,
                }
            };
            layers.push(layer);
        }

        Ok(KKVComparator {
            skey_comparator,
            layers,
            fields: config.value.fields.clone(),
        })
    }

    /// Order of two records of one group. skey tombstones come first, ordered by skey,
    /// live records are ordered by the sort layers and then by skey.
    pub fn compare(
        &self,
        lhs: &SKeyCollectInfo,
        rhs: &SKeyCollectInfo,
        docs: &[KKVDoc],
    ) -> Ordering {
        debug_assert!(!lhs.is_deleted_pkey && !rhs.is_deleted_pkey);
        match (lhs.is_deleted_skey, rhs.is_deleted_skey) {
            (true, true) => return self.skey_comparator.compare(lhs.skey, rhs.skey),
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (false, false) => {}
        }

        for layer in &self.layers {
            let ordering = match layer {
                SortLayer::Timestamp(order) => apply_order(lhs.ts.cmp(&rhs.ts), *order),
                SortLayer::SKey(comparator) => comparator.compare(lhs.skey, rhs.skey),
                SortLayer::ValueField {
                    index,
                    field_type,
                    order,
                } => {
                    let l = locate_field(&self.fields, lhs.value(docs), *index);
                    let r = locate_field(&self.fields, rhs.value(docs), *index);
                    let ordering = match (l, r) {
                        (Some(l), Some(r)) => compare_field(*field_type, l, r),
                        // values missing the field sort first
                        (l, r) => l.is_some().cmp(&r.is_some()),
                    };
                    apply_order(ordering, *order)
                }
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        self.skey_comparator.compare(lhs.skey, rhs.skey)
    }

    /// Order used to pick the records kept by truncation: tombstones first, then skey order.
    pub fn compare_by_skey(&self, lhs: &SKeyCollectInfo, rhs: &SKeyCollectInfo) -> Ordering {
        debug_assert!(!lhs.is_deleted_pkey && !rhs.is_deleted_pkey);
        rhs.is_deleted_skey
            .cmp(&lhs.is_deleted_skey)
            .then_with(|| self.skey_comparator.compare(lhs.skey, rhs.skey))
    }
}

fn invalid_sort_field(field: &str, reason: &str) -> KKVError {
    error!("invalid sort field {}: {}", field, reason);
    KKVError::InvalidSortField {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
