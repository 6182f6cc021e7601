use kkvlite::doc::KKVDoc;
use kkvlite::env::FsDirectory;
use kkvlite::options::{KKVIndexConfig, SortOrder, SortParam, WriterOptions};
use kkvlite::sort::SortPhase;
use kkvlite::{create_data_dumper, KKVTableReader};
use procfs::CpuInfo;
use rand::distributions::Uniform;
use rand::{Rng, RngCore};
use tempfile::TempDir;

#[cfg(feature = "use_jemalloc")]
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

const NUM_PKEYS: u64 = 10000;
const SKEYS_PER_PKEY: u64 = 100;
const SKEY_SIZE: usize = std::mem::size_of::<u64>();
const VALUE_SIZE: usize = 100;
const RETENTION_LIMIT: u32 = 20;
const RAW_SIZE: f64 =
    ((SKEY_SIZE + VALUE_SIZE) as u64 * NUM_PKEYS * SKEYS_PER_PKEY) as f64 / 1024f64 / 1024f64;

fn print_environment() {
    println!("KKVLite: version {}", env!("CARGO_PKG_VERSION"));

    let datetime = chrono::Utc::now();
    println!("Date: {:?}", datetime.naive_utc());

    match CpuInfo::new() {
        Ok(cpu_info) => {
            println!(
                "CPU: {} * {}",
                cpu_info.cpus.len(),
                cpu_info.fields.get("model name").map_or("unknown", |s| s.as_str())
            );
            println!(
                "CPU Cache: {}",
                cpu_info.fields.get("cache size").map_or("unknown", |s| s.as_str())
            );
        }
        Err(e) => println!("CPU: unknown ({})", e),
    }
}

fn print_arguments() {
    println!("SKeys: {} bytes each", SKEY_SIZE);
    println!("Values: {} bytes each", VALUE_SIZE);
    println!("PKeys: {}", NUM_PKEYS);
    println!("SKeys per PKey: {}", SKEYS_PER_PKEY);
    println!("RawSize: {} MB (estimated)", RAW_SIZE);
}

struct BenchMark {
    temp_dir: TempDir,
    directory: FsDirectory,
}

impl BenchMark {
    fn new() -> BenchMark {
        let temp_dir = tempfile::tempdir().unwrap();
        let directory = FsDirectory::open(temp_dir.path()).unwrap();
        BenchMark {
            temp_dir,
            directory,
        }
    }

    fn reopen_dir(&mut self) {
        let temp_dir = tempfile::tempdir().unwrap();
        self.directory = FsDirectory::open(temp_dir.path()).unwrap();
        self.temp_dir = temp_dir;
    }

    /// Dump random groups with `config`, returning the elapsed seconds.
    fn do_dump(&mut self, config: &KKVIndexConfig, phase: SortPhase) -> f64 {
        self.reopen_dir();
        let mut dumper = create_data_dumper(config.clone(), phase).unwrap();
        let options = WriterOptions::default();
        dumper
            .init(&self.directory, &options, &options, NUM_PKEYS as usize)
            .unwrap();

        let mut random = rand::thread_rng();
        let start = std::time::Instant::now();
        for pkey in 0..NUM_PKEYS {
            for i in 0..SKEYS_PER_PKEY {
                let mut value = vec![0u8; VALUE_SIZE];
                random.fill_bytes(&mut value);
                let doc = KKVDoc::new(random.gen(), random.gen(), value);
                dumper
                    .dump(pkey, false, i + 1 == SKEYS_PER_PKEY, doc)
                    .unwrap();
            }
        }
        dumper.close().unwrap();
        let end = std::time::Instant::now();
        (end - start).as_secs_f64()
    }

    fn report(&self, name: &str, elapsed: f64) {
        let file_size = fs_extra::dir::get_size(self.directory.path()).unwrap();
        println!(
            "{}: {:?} MB/s | file size: {}",
            name,
            RAW_SIZE / elapsed,
            file_size
        );
    }

    fn dump_inline(&mut self) {
        let config = KKVIndexConfig {
            value_inline: true,
            ..Default::default()
        };
        let elapsed = self.do_dump(&config, SortPhase::Merge);
        self.report("dump_inline", elapsed);
    }

    fn dump_normal(&mut self) {
        let elapsed = self.do_dump(&KKVIndexConfig::default(), SortPhase::Merge);
        self.report("dump_normal", elapsed);
    }

    fn dump_sorted(&mut self) {
        let config = KKVIndexConfig {
            keep_sort_sequence: true,
            sort_params: vec![SortParam::timestamp(SortOrder::Descending)],
            ..Default::default()
        };
        let elapsed = self.do_dump(&config, SortPhase::BottomLevelMerge);
        self.report("dump_sorted", elapsed);
    }

    fn dump_truncated(&mut self) -> KKVIndexConfig {
        let config = KKVIndexConfig {
            skey_count_limit: Some(RETENTION_LIMIT),
            sort_params: vec![SortParam::timestamp(SortOrder::Descending)],
            ..Default::default()
        };
        let elapsed = self.do_dump(&config, SortPhase::TruncateMerge);
        self.report("dump_truncated", elapsed);
        config
    }

    fn read_random(&self, config: &KKVIndexConfig) {
        let mut reader = KKVTableReader::<u64>::open(&self.directory, config).unwrap();
        let mut random = rand::thread_rng().sample_iter(Uniform::new(0, NUM_PKEYS));
        let mut records = 0;
        let start = std::time::Instant::now();
        for _ in 0..NUM_PKEYS {
            let pkey = random.next().unwrap();
            records += reader.lookup(pkey).unwrap().map_or(0, |r| r.len());
        }
        let end = std::time::Instant::now();
        let elapsed = (end - start).as_secs_f64();
        println!(
            "read_random: {:?} lookups per second ({} records)",
            NUM_PKEYS as f64 / elapsed,
            records
        );
    }
}

fn main() {
    print_environment();
    print_arguments();
    if cfg!(feature = "use_jemalloc") {
        println!("Use jemalloc");
    } else {
        println!("Use system default memory allocator");
    }
    if cfg!(feature = "mmap") {
        println!("Read with mmap");
    }

    println!("-------------------------------------------------");
    let mut benchmark = BenchMark::new();
    benchmark.dump_inline();
    benchmark.dump_normal();
    benchmark.dump_sorted();
    let config = benchmark.dump_truncated();
    benchmark.read_random(&config);
}
