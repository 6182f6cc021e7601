use crate::options::KKVIndexConfig;
use crate::sort::{KKVDocSorter, NormalKKVDocSorter, TruncateKKVDocSorter};
use crate::Result;

/// Build or merge context a table is dumped in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SortPhase {
    /// Dump of freshly built in-memory data.
    IncBuildDump,
    /// Merge into the bottom level.
    BottomLevelMerge,
    /// Merge that always applies the retention limit.
    TruncateMerge,
    /// Plain merge, records are dumped as they arrive.
    Merge,
}

/// Sorter for `phase`, `None` when records are dumped as they arrive.
pub fn create_sorter(
    config: &KKVIndexConfig,
    phase: SortPhase,
) -> Result<Option<Box<dyn KKVDocSorter>>> {
    let truncate_sorter = |limit: u32| -> Result<Option<Box<dyn KKVDocSorter>>> {
        Ok(Some(Box::new(TruncateKKVDocSorter::new(config, limit)?)))
    };

    match phase {
        SortPhase::IncBuildDump => match config.skey_count_limit {
            Some(limit) => truncate_sorter(limit),
            None => Ok(None),
        },
        SortPhase::BottomLevelMerge => {
            if config.keep_sort_sequence {
                Ok(Some(Box::new(NormalKKVDocSorter::new(config)?)))
            } else if let Some(limit) = config.skey_count_limit {
                truncate_sorter(limit)
            } else {
                Ok(None)
            }
        }
        SortPhase::TruncateMerge => truncate_sorter(config.skey_count_limit.unwrap_or(u32::MAX)),
        SortPhase::Merge => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use crate::error::KKVError;
    use crate::options::{KKVIndexConfig, SortOrder, SortParam};
    use crate::sort::{create_sorter, SortPhase};

    #[test]
    fn test_create_sorter() {
        let plain = KKVIndexConfig::default();
        assert!(create_sorter(&plain, SortPhase::IncBuildDump).unwrap().is_none());
        assert!(create_sorter(&plain, SortPhase::BottomLevelMerge).unwrap().is_none());
        assert!(create_sorter(&plain, SortPhase::Merge).unwrap().is_none());
        let sorter = create_sorter(&plain, SortPhase::TruncateMerge).unwrap().unwrap();
        assert!(!sorter.keep_skey_sorted());

        let truncated = KKVIndexConfig {
            skey_count_limit: Some(10),
            ..Default::default()
        };
        let sorter = create_sorter(&truncated, SortPhase::IncBuildDump).unwrap().unwrap();
        assert!(!sorter.keep_skey_sorted());
        let sorter = create_sorter(&truncated, SortPhase::BottomLevelMerge).unwrap().unwrap();
        assert!(!sorter.keep_skey_sorted());
        assert!(create_sorter(&truncated, SortPhase::Merge).unwrap().is_none());

        let sorted = KKVIndexConfig {
            keep_sort_sequence: true,
            skey_count_limit: Some(10),
            ..Default::default()
        };
        let sorter = create_sorter(&sorted, SortPhase::BottomLevelMerge).unwrap().unwrap();
        assert!(sorter.keep_skey_sorted());
    }

    #[test]
    fn test_invalid_config() {
        let config = KKVIndexConfig {
            skey_count_limit: Some(1),
            sort_params: vec![SortParam::new("missing", SortOrder::Ascending)],
            ..Default::default()
        };
        assert_eq!(
            create_sorter(&config, SortPhase::IncBuildDump).err(),
            Some(KKVError::InvalidSortField {
                field: "missing".to_string(),
                reason: String::new(),
            })
        );
        assert!(create_sorter(&config, SortPhase::Merge).unwrap().is_none());
    }
}
