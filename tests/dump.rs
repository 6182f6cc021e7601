use kkvlite::chunk::ChunkReader;
use kkvlite::doc::KKVDoc;
use kkvlite::dumper::{SKEY_FILE_NAME, VALUE_FILE_NAME};
use kkvlite::env::{Directory, FsDirectory};
use kkvlite::options::{
    FieldSchema, FieldType, KKVIndexConfig, SortOrder, SortParam, ValueConfig, WriterOptions,
};
use kkvlite::reader::SKeyRecord;
use kkvlite::skey::{InlineSKeyNode, NormalSKeyNode, SKeyNode};
use kkvlite::sort::SortPhase;
use kkvlite::value::VALUE_CHUNK_ALIGN_BIT;
use kkvlite::{create_data_dumper, KKVTableReader, Result};
use rand::seq::SliceRandom;
use rand::Rng;

/// Dump `groups` of `(is_deleted_pkey, doc)` in order, one group per pkey.
fn dump_groups(
    directory: &FsDirectory,
    config: &KKVIndexConfig,
    phase: SortPhase,
    groups: &[(u64, Vec<(bool, KKVDoc)>)],
) -> Result<()> {
    let mut dumper = create_data_dumper(config.clone(), phase)?;
    let options = WriterOptions::default();
    dumper.init(directory, &options, &options, groups.len())?;
    for (pkey, docs) in groups {
        for (i, (is_deleted_pkey, doc)) in docs.iter().enumerate() {
            dumper.dump(*pkey, *is_deleted_pkey, i + 1 == docs.len(), doc.clone())?;
        }
    }
    dumper.close()
}

fn is_valid(record: &SKeyRecord<u64>) -> bool {
    !record.is_deleted_pkey && !record.is_deleted_skey
}

#[test]
fn test_inline_two_records() -> Result<()> {
    let _ = env_logger::try_init();
    let temp_dir = tempfile::tempdir()?;
    let directory = FsDirectory::open(temp_dir.path())?;
    let config = KKVIndexConfig {
        value_inline: true,
        ..Default::default()
    };
    let docs = vec![
        (false, KKVDoc::new(1, 1, b"1".to_vec())),
        (false, KKVDoc::new(0, 0, b"0".to_vec())),
    ];
    dump_groups(&directory, &config, SortPhase::Merge, &[(0, docs)])?;

    let mut skey_reader = ChunkReader::new(directory.open_file_reader(SKEY_FILE_NAME)?, 0);
    assert_eq!(skey_reader.chunk_offsets()?, vec![0]);
    let chunk = skey_reader.load_chunk(0)?.to_vec();
    // node, timestamp, length prefix and one value byte
    let record_size = InlineSKeyNode::<u64>::SIZE + 4 + 1 + 1;
    assert_eq!(chunk.len(), 2 * record_size);
    let first = InlineSKeyNode::<u64>::decode(&chunk);
    let second = InlineSKeyNode::<u64>::decode(&chunk[record_size..]);
    assert!(!first.is_last_node());
    assert!(second.is_last_node());
    assert_eq!(&chunk[record_size - 1..record_size], b"1");

    let mut reader = KKVTableReader::<u64>::open(&directory, &config)?;
    let records = reader.lookup(0)?.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].skey, 1);
    assert_eq!(records[0].value.as_deref(), Some(&b"1"[..]));
    assert_eq!(records[1].skey, 0);
    assert_eq!(records[1].ts, Some(0));
    assert!(records[1].is_last_node);
    Ok(())
}

#[test]
fn test_pkey_tombstone() -> Result<()> {
    let _ = env_logger::try_init();
    for value_inline in [true, false] {
        let temp_dir = tempfile::tempdir()?;
        let directory = FsDirectory::open(temp_dir.path())?;
        let config = KKVIndexConfig {
            value_inline,
            store_ts: false,
            ..Default::default()
        };
        let groups = vec![(1, vec![(true, KKVDoc::deleted_pkey(9))])];
        dump_groups(&directory, &config, SortPhase::Merge, &groups)?;

        let mut skey_reader = ChunkReader::new(directory.open_file_reader(SKEY_FILE_NAME)?, 0);
        let chunk = skey_reader.load_chunk(0)?.to_vec();
        if value_inline {
            assert_eq!(chunk.len(), InlineSKeyNode::<u64>::SIZE);
            let node = InlineSKeyNode::<u64>::decode(&chunk);
            assert!(node.is_pkey_deleted() && node.is_last_node() && !node.has_value());
        } else {
            assert_eq!(chunk.len(), NormalSKeyNode::<u64>::SIZE);
            let node = NormalSKeyNode::<u64>::decode(&chunk);
            assert!(node.is_pkey_deleted() && node.is_last_node());
            assert_eq!(node.value_offset(), None);
            // nothing was written to the value file
            let mut value_reader = ChunkReader::new(
                directory.open_file_reader(VALUE_FILE_NAME)?,
                VALUE_CHUNK_ALIGN_BIT,
            );
            assert_eq!(value_reader.file_length()?, 0);
        }

        let mut reader = KKVTableReader::<u64>::open(&directory, &config)?;
        let records = reader.lookup(1)?.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_deleted_pkey && records[0].is_last_node);
        assert_eq!(records[0].value, None);
    }
    Ok(())
}

#[test]
fn test_limit_one() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let directory = FsDirectory::open(temp_dir.path())?;
    let config = KKVIndexConfig {
        skey_count_limit: Some(1),
        ..Default::default()
    };
    let docs = vec![
        (false, KKVDoc::new(8, 1, b"8".to_vec())),
        (false, KKVDoc::new(3, 2, b"3".to_vec())),
    ];
    dump_groups(&directory, &config, SortPhase::TruncateMerge, &[(5, docs)])?;

    let mut reader = KKVTableReader::<u64>::open(&directory, &config)?;
    let records = reader.lookup(5)?.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].skey, 3);
    assert!(records[0].is_last_node);
    assert!(!reader.format().keep_skey_sorted);
    Ok(())
}

#[test]
fn test_skey_chunk_alignment() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let directory = FsDirectory::open(temp_dir.path())?;
    let align_bit = 6;
    let config = KKVIndexConfig {
        value_inline: true,
        skey_chunk_align_bit: align_bit,
        ..Default::default()
    };
    let groups: Vec<(u64, Vec<(bool, KKVDoc)>)> = (0..20u64)
        .map(|pkey| {
            let docs = (0..300u64)
                .map(|skey| (false, KKVDoc::new(skey, 0, vec![pkey as u8; 3])))
                .collect();
            (pkey, docs)
        })
        .collect();
    dump_groups(&directory, &config, SortPhase::Merge, &groups)?;

    let mut skey_reader =
        ChunkReader::new(directory.open_file_reader(SKEY_FILE_NAME)?, align_bit);
    let offsets = skey_reader.chunk_offsets()?;
    assert!(offsets.len() > 1);
    for offset in offsets {
        assert_eq!(offset % (1 << align_bit), 0);
    }
    Ok(())
}

#[test]
fn test_random_truncated_groups() -> Result<()> {
    let _ = env_logger::try_init();
    let mut rng = rand::thread_rng();
    let limit = 5;
    for value_inline in [true, false] {
        let temp_dir = tempfile::tempdir()?;
        let directory = FsDirectory::open(temp_dir.path())?;
        let config = KKVIndexConfig {
            value_inline,
            skey_count_limit: Some(limit),
            sort_params: vec![SortParam::timestamp(SortOrder::Descending)],
            ..Default::default()
        };

        let groups: Vec<(u64, Vec<(bool, KKVDoc)>)> = (0..50u64)
            .map(|pkey| {
                let mut skeys: Vec<u64> = (0..rng.gen_range(1..20)).collect();
                skeys.shuffle(&mut rng);
                let mut docs = vec![];
                if rng.gen_bool(0.2) {
                    docs.push((true, KKVDoc::deleted_pkey(100)));
                }
                for skey in skeys {
                    let ts = rng.gen_range(0..10);
                    let doc = if rng.gen_bool(0.3) {
                        KKVDoc::deleted_skey(skey, ts)
                    } else {
                        KKVDoc::new(skey, ts, format!("{}-{}", pkey, skey).into_bytes())
                    };
                    docs.push((false, doc));
                }
                (pkey * 2, docs)
            })
            .collect();
        dump_groups(&directory, &config, SortPhase::TruncateMerge, &groups)?;

        let mut reader = KKVTableReader::<u64>::open(&directory, &config)?;
        assert_eq!(reader.pkeys().count(), groups.len());
        for (pkey, docs) in &groups {
            let records = reader.lookup(*pkey)?.unwrap();
            let has_deleted_pkey = docs[0].0;
            assert_eq!(records[0].is_deleted_pkey, has_deleted_pkey);
            assert!(records.last().unwrap().is_last_node);

            let mut valid_skeys: Vec<u64> = docs
                .iter()
                .filter(|(deleted_pkey, doc)| !deleted_pkey && !doc.skey_deleted)
                .map(|(_, doc)| doc.skey)
                .collect();
            valid_skeys.sort_unstable();
            valid_skeys.truncate(limit as usize);
            let mut kept: Vec<u64> = records
                .iter()
                .filter(|r| is_valid(r))
                .map(|r| r.skey)
                .collect();
            kept.sort_unstable();
            assert_eq!(kept, valid_skeys);

            let deleted_count = docs.iter().filter(|(_, doc)| doc.skey_deleted).count();
            assert_eq!(records.iter().filter(|r| r.is_deleted_skey).count(), deleted_count);

            // skey tombstones first, then valid records by timestamp descending
            let body = &records[has_deleted_pkey as usize..];
            for pair in body.windows(2) {
                let (lhs, rhs) = (&pair[0], &pair[1]);
                assert!(!(is_valid(lhs) && rhs.is_deleted_skey));
                if lhs.is_deleted_skey && rhs.is_deleted_skey {
                    assert!(lhs.skey < rhs.skey);
                }
                if is_valid(lhs) && is_valid(rhs) {
                    assert!(
                        lhs.ts > rhs.ts || (lhs.ts == rhs.ts && lhs.skey < rhs.skey),
                        "{:?} {:?}",
                        lhs,
                        rhs
                    );
                }
            }
            for record in records.iter().filter(|r| is_valid(r)) {
                let expected = format!("{}-{}", pkey / 2, record.skey).into_bytes();
                assert_eq!(record.value.as_ref(), Some(&expected));
            }
        }
    }
    Ok(())
}

#[test]
fn test_fixed_len_values() -> Result<()> {
    let _ = env_logger::try_init();
    let mut rng = rand::thread_rng();
    for value_inline in [true, false] {
        let temp_dir = tempfile::tempdir()?;
        let directory = FsDirectory::open(temp_dir.path())?;
        let config = KKVIndexConfig {
            skey_field: FieldSchema::new("skey", FieldType::Int8),
            value: ValueConfig::from_fields(vec![FieldSchema::new("price", FieldType::Int32)]),
            store_expire_time: true,
            value_inline,
            keep_sort_sequence: true,
            sort_params: vec![SortParam::new("price", SortOrder::Descending)],
            ..Default::default()
        };
        assert_eq!(config.value.fixed_len, 4);

        let groups: Vec<(u64, Vec<(bool, KKVDoc)>)> = (0..20u64)
            .map(|pkey| {
                let docs = (-50i64..50)
                    .map(|skey| {
                        let price: i32 = rng.gen_range(-1000..1000);
                        let doc = KKVDoc::new(skey as u64, 1, price.to_le_bytes().to_vec())
                            .expire_at(pkey as u32);
                        (false, doc)
                    })
                    .collect();
                (pkey, docs)
            })
            .collect();
        dump_groups(&directory, &config, SortPhase::BottomLevelMerge, &groups)?;

        let mut reader = KKVTableReader::<i8>::open(&directory, &config)?;
        assert!(reader.format().keep_skey_sorted);
        for (pkey, docs) in &groups {
            let records = reader.lookup(*pkey)?.unwrap();
            assert_eq!(records.len(), docs.len());
            let mut prices = vec![];
            for record in &records {
                assert_eq!(record.expire_time, Some(*pkey as u32));
                let value = record.value.as_ref().unwrap();
                assert_eq!(value.len(), 4);
                let price = i32::from_le_bytes([value[0], value[1], value[2], value[3]]);
                let (_, doc) = docs
                    .iter()
                    .find(|(_, doc)| doc.skey == record.skey as i64 as u64)
                    .unwrap();
                assert_eq!(doc.value_bytes(), value.as_slice());
                prices.push((price, record.skey));
            }
            // price descending, then skey ascending
            for pair in prices.windows(2) {
                assert!(pair[0].0 > pair[1].0 || (pair[0].0 == pair[1].0 && pair[0].1 < pair[1].1));
            }
        }
    }
    Ok(())
}
