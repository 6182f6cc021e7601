//! Dump of a KKV table.
//!
//! Records arrive grouped by pkey. Each group is optionally buffered and resolved by
//! a [KKVDocSorter], then every surviving record is encoded into the skey file (and
//! the value file of a normal table). The first node of each group is reported to the
//! pkey table.
//!
//! Files of a dumped table:
//!
//! | file | contents |
//! |---|---|
//! | [SKEY_FILE_NAME] | skey nodes, values too for an inline table |
//! | [VALUE_FILE_NAME] | values of a normal table |
//! | [PKEY_FILE_NAME] | pkey to skey node offset, see [pkey] |
//! | [FORMAT_FILE_NAME] | [KKVFormat] |

use crate::chunk::ItemOffset;
use crate::doc::KKVDoc;
use crate::env::{Directory, FileWriter};
use crate::error::KKVError;
use crate::options::{FieldType, KKVIndexConfig, WriterOptions};
use crate::sort::{create_sorter, KKVDocSorter, SortPhase};
use crate::Result;

mod format;
mod inline;
mod normal;
pub mod pkey;

pub use format::KKVFormat;
pub use inline::InlineDumpEncoder;
pub use normal::NormalDumpEncoder;
pub use pkey::{load_pkey_offsets, PKeyDumper, PKeyOffsetWriter};

pub const SKEY_FILE_NAME: &str = "skey";
pub const VALUE_FILE_NAME: &str = "value";
pub const PKEY_FILE_NAME: &str = "pkey";
pub const FORMAT_FILE_NAME: &str = "kkv_format";

pub trait DataDumper {
    /// Open the output files in `directory`. Configuration errors are reported before
    /// any file is created.
    fn init(
        &mut self,
        directory: &dyn Directory,
        skey_options: &WriterOptions,
        value_options: &WriterOptions,
        estimated_pkey_count: usize,
    ) -> Result<()>;

    /// Records of one pkey must be dumped contiguously, `is_last_skey` set on the last one
    /// only. A pkey tombstone can only open a group.
    fn dump(
        &mut self,
        pkey: u64,
        is_deleted_pkey: bool,
        is_last_skey: bool,
        doc: KKVDoc,
    ) -> Result<()>;

    fn close(&mut self) -> Result<()>;

    /// Max encoded value size, length prefix included.
    fn max_value_len(&self) -> usize;

    fn total_skey_count(&self) -> u64;

    /// Max node count of one pkey group.
    fn max_skey_count(&self) -> u32;

    /// Number of groups reported to the pkey table.
    fn pkey_count(&self) -> u64;
}

/// Node and value encoding of one table kind.
pub trait DumpEncoder: Sized {
    const VALUE_INLINE: bool;

    fn open(
        directory: &dyn Directory,
        config: &KKVIndexConfig,
        skey_options: &WriterOptions,
        value_options: &WriterOptions,
    ) -> Result<Self>;

    /// Encode a record, returning the offset of its skey node.
    fn encode(
        &mut self,
        is_deleted_pkey: bool,
        is_last_node: bool,
        doc: &KKVDoc,
    ) -> Result<ItemOffset>;

    fn close(&mut self) -> Result<()>;

    fn max_value_len(&self) -> usize;

    fn total_skey_count(&self) -> u64;

    fn max_skey_count(&self) -> u32;
}

struct DumpState<E> {
    encoder: E,
    pkey_dumper: Box<dyn PKeyDumper>,
    format_writer: Box<dyn FileWriter>,
    at_group_start: bool,
    group_pkey: Option<u64>,
    pkey_count: u64,
}

impl<E: DumpEncoder> DumpState<E> {
    fn do_dump(
        &mut self,
        pkey: u64,
        is_deleted_pkey: bool,
        is_last_node: bool,
        doc: &KKVDoc,
    ) -> Result<()> {
        debug_assert!(self.at_group_start || self.group_pkey == Some(pkey));
        let offset = self.encoder.encode(is_deleted_pkey, is_last_node, doc)?;
        if self.at_group_start {
            self.pkey_dumper.dump(pkey, offset)?;
            self.pkey_count += 1;
            self.group_pkey = Some(pkey);
        }
        self.at_group_start = is_last_node;
        Ok(())
    }
}

fn closed_error() -> KKVError {
    KKVError::Custom("dump to a closed table".into())
}

fn uninitialized_error() -> KKVError {
    KKVError::Custom("table dumper is not initialized".into())
}

/// Dump protocol shared by inline and normal tables.
pub struct DataDumperBase<E> {
    config: KKVIndexConfig,
    phase: SortPhase,
    sorter: Option<Box<dyn KKVDocSorter>>,
    state: Option<DumpState<E>>,
    closed: bool,
}

pub type InlineDataDumper<S> = DataDumperBase<InlineDumpEncoder<S>>;
pub type NormalDataDumper<S> = DataDumperBase<NormalDumpEncoder<S>>;

impl<E: DumpEncoder> DataDumperBase<E> {
    pub fn new(config: KKVIndexConfig, phase: SortPhase) -> DataDumperBase<E> {
        DataDumperBase {
            config,
            phase,
            sorter: None,
            state: None,
            closed: false,
        }
    }

    fn state_mut(&mut self) -> Result<&mut DumpState<E>> {
        if self.closed {
            return Err(closed_error());
        }
        self.state.as_mut().ok_or_else(uninitialized_error)
    }

    fn keep_skey_sorted(&self) -> bool {
        self.sorter
            .as_ref()
            .map_or(false, |sorter| sorter.keep_skey_sorted())
    }
}

impl<E: DumpEncoder> DataDumper for DataDumperBase<E> {
    fn init(
        &mut self,
        directory: &dyn Directory,
        skey_options: &WriterOptions,
        value_options: &WriterOptions,
        estimated_pkey_count: usize,
    ) -> Result<()> {
        if self.state.is_some() {
            return Err(KKVError::Custom("table dumper initialized twice".into()));
        }
        self.sorter = create_sorter(&self.config, self.phase)?;

        let encoder = E::open(directory, &self.config, skey_options, value_options)?;
        let pkey_dumper = PKeyOffsetWriter::open(
            directory,
            PKEY_FILE_NAME,
            skey_options,
            estimated_pkey_count,
        )?;
        let format_writer =
            directory.create_file_writer(FORMAT_FILE_NAME, &WriterOptions::default())?;
        self.state = Some(DumpState {
            encoder,
            pkey_dumper: Box::new(pkey_dumper),
            format_writer,
            at_group_start: true,
            group_pkey: None,
            pkey_count: 0,
        });
        info!(
            "open kkv table dump, phase: {:?}, value inline: {}, sorted: {}",
            self.phase,
            E::VALUE_INLINE,
            self.sorter.is_some()
        );
        Ok(())
    }

    fn dump(
        &mut self,
        pkey: u64,
        is_deleted_pkey: bool,
        is_last_skey: bool,
        doc: KKVDoc,
    ) -> Result<()> {
        if self.closed {
            return Err(closed_error());
        }
        let state = self.state.as_mut().ok_or_else(uninitialized_error)?;
        let sorter = match self.sorter.as_mut() {
            Some(sorter) => sorter,
            None => return state.do_dump(pkey, is_deleted_pkey, is_last_skey, &doc),
        };

        sorter.add_doc(is_deleted_pkey, doc);
        if !is_last_skey {
            return Ok(());
        }
        sorter.sort();
        let survivors = sorter.sorted_len();
        for (i, (is_deleted_pkey, doc)) in sorter.sorted_docs().enumerate() {
            state.do_dump(pkey, is_deleted_pkey, i + 1 == survivors, doc)?;
        }
        if survivors == 0 {
            debug!("every record of pkey {} was truncated", pkey);
        }
        sorter.reset();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            warn!("kkv table dumper closed twice");
            return Ok(());
        }
        debug_assert!(self.sorter.as_ref().map_or(true, |s| s.sorted_len() == 0));
        let format = KKVFormat {
            store_ts: self.config.store_ts,
            keep_skey_sorted: self.keep_skey_sorted(),
            value_inline: E::VALUE_INLINE,
        };
        let state = self.state_mut()?;
        debug_assert!(state.at_group_start, "last group is not terminated");
        state.encoder.close()?;
        state.pkey_dumper.close()?;
        format.write_to(state.format_writer.as_mut())?;
        self.closed = true;

        info!(
            "close kkv table dump, pkeys: {}, skeys: {}, max skeys per pkey: {}, max value length: {}",
            self.pkey_count(),
            self.total_skey_count(),
            self.max_skey_count(),
            self.max_value_len()
        );
        Ok(())
    }

    fn max_value_len(&self) -> usize {
        self.state
            .as_ref()
            .map_or(0, |state| state.encoder.max_value_len())
    }

    fn total_skey_count(&self) -> u64 {
        self.state
            .as_ref()
            .map_or(0, |state| state.encoder.total_skey_count())
    }

    fn max_skey_count(&self) -> u32 {
        self.state
            .as_ref()
            .map_or(0, |state| state.encoder.max_skey_count())
    }

    fn pkey_count(&self) -> u64 {
        self.state.as_ref().map_or(0, |state| state.pkey_count)
    }
}

macro_rules! dumper_for_skey_type {
    ($encoder:ident, $config:expr, $phase:expr) => {{
        let config: KKVIndexConfig = $config;
        let dumper: Box<dyn DataDumper> = match config.skey_field.field_type {
            FieldType::Int8 => Box::new(DataDumperBase::<$encoder<i8>>::new(config, $phase)),
            FieldType::Int16 => Box::new(DataDumperBase::<$encoder<i16>>::new(config, $phase)),
            FieldType::Int32 => Box::new(DataDumperBase::<$encoder<i32>>::new(config, $phase)),
            FieldType::Int64 => Box::new(DataDumperBase::<$encoder<i64>>::new(config, $phase)),
            FieldType::UInt8 => Box::new(DataDumperBase::<$encoder<u8>>::new(config, $phase)),
            FieldType::UInt16 => Box::new(DataDumperBase::<$encoder<u16>>::new(config, $phase)),
            FieldType::UInt32 => Box::new(DataDumperBase::<$encoder<u32>>::new(config, $phase)),
            // string skeys are stored as their hash
            FieldType::UInt64 | FieldType::String => {
                Box::new(DataDumperBase::<$encoder<u64>>::new(config, $phase))
            }
            FieldType::Float | FieldType::Double => {
                error!("unsupported skey type {:?}", config.skey_field.field_type);
                return Err(KKVError::InvalidConfig(format!(
                    "skey field `{}` of type {:?} is not supported",
                    config.skey_field.name, config.skey_field.field_type
                )));
            }
        };
        dumper
    }};
}

/// Dumper of the table kind and skey width declared by `config`.
pub fn create_data_dumper(
    config: KKVIndexConfig,
    phase: SortPhase,
) -> Result<Box<dyn DataDumper>> {
    if config.value_inline {
        Ok(dumper_for_skey_type!(InlineDumpEncoder, config, phase))
    } else {
        Ok(dumper_for_skey_type!(NormalDumpEncoder, config, phase))
    }
}

#[cfg(test)]
mod tests {
    use crate::doc::KKVDoc;
    use crate::dumper::{
        create_data_dumper, load_pkey_offsets, DataDumper, InlineDataDumper, KKVFormat,
        NormalDataDumper, FORMAT_FILE_NAME, PKEY_FILE_NAME, SKEY_FILE_NAME, VALUE_FILE_NAME,
    };
    use crate::env::FsDirectory;
    use crate::error::KKVError;
    use crate::options::{
        FieldSchema, FieldType, KKVIndexConfig, SortOrder, SortParam, WriterOptions,
    };
    use crate::sort::SortPhase;

    fn init(dumper: &mut dyn DataDumper, directory: &FsDirectory) -> crate::Result<()> {
        let options = WriterOptions::default();
        dumper.init(directory, &options, &options, 16)
    }

    #[test]
    fn test_files_and_format() {
        let _ = env_logger::try_init();
        let temp_dir = tempfile::tempdir().unwrap();
        let directory = FsDirectory::open(temp_dir.path()).unwrap();
        let config = KKVIndexConfig {
            keep_sort_sequence: true,
            sort_params: vec![SortParam::timestamp(SortOrder::Descending)],
            ..Default::default()
        };
        let mut dumper = NormalDataDumper::<u64>::new(config, SortPhase::BottomLevelMerge);
        init(&mut dumper, &directory).unwrap();
        dumper.dump(1, false, false, KKVDoc::new(1, 1, b"a".to_vec())).unwrap();
        dumper.dump(1, false, true, KKVDoc::new(2, 2, b"bb".to_vec())).unwrap();
        dumper.dump(3, true, true, KKVDoc::deleted_pkey(3)).unwrap();
        dumper.close().unwrap();
        dumper.close().unwrap();

        for name in [SKEY_FILE_NAME, VALUE_FILE_NAME, PKEY_FILE_NAME, FORMAT_FILE_NAME] {
            assert!(temp_dir.path().join(name).exists(), "{}", name);
        }
        assert_eq!(dumper.pkey_count(), 2);
        assert_eq!(dumper.total_skey_count(), 3);
        assert_eq!(dumper.max_skey_count(), 2);
        assert_eq!(dumper.max_value_len(), 3);
        assert_eq!(
            KKVFormat::load(&directory, FORMAT_FILE_NAME).unwrap(),
            KKVFormat {
                store_ts: true,
                keep_skey_sorted: true,
                value_inline: false,
            }
        );
        let pkeys: Vec<u64> = load_pkey_offsets(&directory, PKEY_FILE_NAME)
            .unwrap()
            .into_iter()
            .map(|(pkey, _)| pkey)
            .collect();
        assert_eq!(pkeys, vec![1, 3]);
        assert!(dumper.dump(4, false, true, KKVDoc::new(1, 1, vec![])).is_err());
    }

    #[test]
    fn test_inline_without_value_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let directory = FsDirectory::open(temp_dir.path()).unwrap();
        let config = KKVIndexConfig {
            value_inline: true,
            skey_count_limit: Some(1),
            ..Default::default()
        };
        let mut dumper = InlineDataDumper::<u32>::new(config, SortPhase::IncBuildDump);
        assert!(dumper.dump(0, false, true, KKVDoc::new(1, 1, vec![])).is_err());
        init(&mut dumper, &directory).unwrap();
        assert!(init(&mut dumper, &directory).is_err());
        dumper.dump(0, false, false, KKVDoc::new(1, 1, b"1".to_vec())).unwrap();
        dumper.dump(0, false, true, KKVDoc::new(0, 0, b"0".to_vec())).unwrap();
        dumper.close().unwrap();

        assert!(!temp_dir.path().join(VALUE_FILE_NAME).exists());
        assert_eq!(dumper.total_skey_count(), 1);
        assert!(!KKVFormat::load(&directory, FORMAT_FILE_NAME).unwrap().keep_skey_sorted);
    }

    #[test]
    fn test_config_error_before_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let directory = FsDirectory::open(temp_dir.path()).unwrap();
        let config = KKVIndexConfig {
            skey_count_limit: Some(3),
            sort_params: vec![SortParam::new("price", SortOrder::Ascending)],
            ..Default::default()
        };
        let mut dumper = create_data_dumper(config, SortPhase::IncBuildDump).unwrap();
        assert_eq!(
            init(dumper.as_mut(), &directory).unwrap_err(),
            KKVError::InvalidSortField {
                field: "price".to_string(),
                reason: String::new(),
            }
        );
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_create_data_dumper() {
        for field_type in [
            FieldType::Int8,
            FieldType::UInt16,
            FieldType::Int32,
            FieldType::UInt64,
            FieldType::String,
        ] {
            let config = KKVIndexConfig {
                skey_field: FieldSchema::new("skey", field_type),
                ..Default::default()
            };
            assert!(create_data_dumper(config, SortPhase::Merge).is_ok());
        }
        let config = KKVIndexConfig {
            skey_field: FieldSchema::new("skey", FieldType::Double),
            value_inline: true,
            ..Default::default()
        };
        assert!(matches!(
            create_data_dumper(config, SortPhase::Merge),
            Err(KKVError::InvalidConfig(_))
        ));
    }
}
