#![no_main]

use kkvlite::doc::KKVDoc;
use kkvlite::env::FsDirectory;
use kkvlite::options::{FieldSchema, FieldType, KKVIndexConfig, WriterOptions};
use kkvlite::sort::SortPhase;
use kkvlite::{create_data_dumper, KKVTableReader};
use libfuzzer_sys::arbitrary;
use libfuzzer_sys::fuzz_target;

#[derive(arbitrary::Arbitrary, Debug)]
struct Record {
    skey: i16,
    ts: u32,
    deleted: bool,
    value: Vec<u8>,
}

#[derive(arbitrary::Arbitrary, Debug)]
struct Group {
    deleted_pkey: bool,
    records: Vec<Record>,
}

#[derive(arbitrary::Arbitrary, Debug)]
struct Table {
    value_inline: bool,
    store_ts: bool,
    align_bit: u8,
    limit: Option<u8>,
    groups: Vec<Group>,
}

fn to_doc(record: &Record) -> KKVDoc {
    if record.deleted {
        KKVDoc::deleted_skey(record.skey as i64 as u64, record.ts)
    } else {
        KKVDoc::new(record.skey as i64 as u64, record.ts, record.value.clone())
    }
}

fuzz_target!(|table: Table| {
    let config = KKVIndexConfig {
        skey_field: FieldSchema::new("skey", FieldType::Int16),
        value_inline: table.value_inline,
        store_ts: table.store_ts,
        skey_chunk_align_bit: table.align_bit % 8,
        skey_count_limit: table.limit.map(u32::from),
        ..Default::default()
    };
    let phase = if config.skey_count_limit.is_some() {
        SortPhase::TruncateMerge
    } else {
        SortPhase::Merge
    };

    let temp_dir = tempfile::tempdir().unwrap();
    let directory = FsDirectory::open(temp_dir.path()).unwrap();
    let mut dumper = create_data_dumper(config.clone(), phase).unwrap();
    let options = WriterOptions::default();
    dumper
        .init(&directory, &options, &options, table.groups.len())
        .unwrap();

    let mut groups = vec![];
    for (pkey, group) in table.groups.iter().enumerate() {
        let mut docs = vec![];
        if group.deleted_pkey {
            docs.push((true, KKVDoc::deleted_pkey(0)));
        }
        docs.extend(group.records.iter().map(|r| (false, to_doc(r))));
        if docs.is_empty() {
            continue;
        }
        let len = docs.len();
        for (i, (is_deleted_pkey, doc)) in docs.iter().enumerate() {
            dumper
                .dump(pkey as u64, *is_deleted_pkey, i + 1 == len, doc.clone())
                .unwrap();
        }
        groups.push((pkey as u64, docs));
    }
    dumper.close().unwrap();

    let mut reader = KKVTableReader::<i16>::open(&directory, &config).unwrap();
    for (pkey, docs) in groups {
        let records = match reader.lookup(pkey).unwrap() {
            Some(records) => records,
            None => {
                // every record was truncated away
                assert_eq!(config.skey_count_limit, Some(0));
                continue;
            }
        };
        assert!(records.last().unwrap().is_last_node);
        assert!(records[..records.len() - 1].iter().all(|r| !r.is_last_node));

        match config.skey_count_limit {
            Some(limit) => {
                let valid = records
                    .iter()
                    .filter(|r| !r.is_deleted_pkey && !r.is_deleted_skey)
                    .count();
                let input_valid = docs
                    .iter()
                    .filter(|(deleted_pkey, doc)| !deleted_pkey && !doc.skey_deleted)
                    .count();
                assert_eq!(valid, input_valid.min(limit as usize));
            }
            None => {
                assert_eq!(records.len(), docs.len());
                for (record, (is_deleted_pkey, doc)) in records.iter().zip(&docs) {
                    assert_eq!(record.skey as i64 as u64, doc.skey);
                    assert_eq!(record.is_deleted_pkey, *is_deleted_pkey);
                    assert_eq!(record.is_deleted_skey, !is_deleted_pkey && doc.skey_deleted);
                    if config.store_ts {
                        assert_eq!(record.ts, Some(doc.timestamp));
                    }
                    if !record.is_deleted_pkey && !record.is_deleted_skey {
                        assert_eq!(record.value.as_deref(), Some(doc.value_bytes()));
                    }
                }
            }
        }
    }
});
