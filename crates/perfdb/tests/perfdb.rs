//! Database behavior under single handles, concurrent handles, threads,
//! and cooperating processes.

use convplan_perfdb::{FieldVisitor, PerfDb, Record, TuningFields};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use tempfile::TempDir;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct TestData {
    x: i32,
    y: i32,
}

impl TestData {
    fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl TuningFields for TestData {
    fn visit(&mut self, visitor: &mut dyn FieldVisitor) {
        visitor.field(&mut self.x, "x");
        visitor.field(&mut self.y, "y");
    }
}

fn key() -> TestData {
    TestData::new(1, 2)
}

fn value0() -> TestData {
    TestData::new(3, 4)
}

fn value1() -> TestData {
    TestData::new(5, 6)
}

fn value2() -> TestData {
    TestData::new(7, 8)
}

struct Scratch {
    _dir: TempDir,
    path: PathBuf,
}

impl Scratch {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("tuned.db");
        Self { _dir: dir, path }
    }

    fn open(&self) -> PerfDb {
        PerfDb::open(&self.path).expect("open db")
    }
}

#[test]
fn find_returns_stored_record() {
    let scratch = Scratch::new();
    fs::write(&scratch.path, "1,2=1:5,6;0:3,4\n").unwrap();

    let db = scratch.open();
    let record = db.find_record(&key()).unwrap().expect("record present");
    let missing = db.find_record(&TestData::new(100, 200)).unwrap();

    let mut read0 = TestData::default();
    let mut read1 = TestData::default();
    assert!(record.get_values("0", &mut read0));
    assert!(record.get_values("1", &mut read1));
    assert_eq!(read0, value0());
    assert_eq!(read1, value1());
    assert!(missing.is_none());
}

#[test]
fn store_then_reopen_yields_one_line() {
    let scratch = Scratch::new();

    let mut record = Record::new(&key());
    assert!(record.set_values("0", &value0()));
    assert!(record.set_values("1", &value1()));
    scratch.open().store_record(&record).unwrap();

    let text = fs::read_to_string(&scratch.path).unwrap();
    assert_eq!(text.lines().count(), 1);

    let read = scratch
        .open()
        .find_record(&key())
        .unwrap()
        .expect("record present");
    assert_eq!(read, record);
}

#[test]
fn update_record_merges_with_stored_ids() {
    let scratch = Scratch::new();

    let mut record0 = Record::new(&key());
    assert!(record0.set_values("0", &value0()));
    scratch.open().store_record(&record0).unwrap();

    let mut record1 = Record::new(&key());
    assert!(record1.set_values("1", &value1()));
    scratch.open().update_record(&mut record1).unwrap();

    // The passed record absorbs the merged state.
    let mut read0 = TestData::default();
    let mut read1 = TestData::default();
    assert!(record1.get_values("0", &mut read0));
    assert!(record1.get_values("1", &mut read1));
    assert_eq!(read0, value0());
    assert_eq!(read1, value1());

    let stored = scratch
        .open()
        .find_record(&key())
        .unwrap()
        .expect("record present");
    assert_eq!(stored, record1);
}

#[test]
fn remove_record_drops_the_key() {
    let scratch = Scratch::new();

    let mut record = Record::new(&key());
    assert!(record.set_values("0", &value0()));
    assert!(record.set_values("1", &value1()));
    scratch.open().store_record(&record).unwrap();

    let db = scratch.open();
    assert!(db.find_record(&key()).unwrap().is_some());
    assert!(db.remove_record(&key()).unwrap());
    assert!(db.find_record(&key()).unwrap().is_none());
    assert!(!db.remove_record(&key()).unwrap());
}

#[test]
fn triple_operations_cover_rewrite_and_removal() {
    let scratch = Scratch::new();

    {
        let db = scratch.open();
        assert!(db.update(&key(), "0", &value2()).unwrap());
        assert!(db.update(&key(), "1", &value2()).unwrap());
        // Overwrite with a different value, then with the identical one;
        // the second call short-circuits without a rewrite.
        assert!(db.update(&key(), "1", &value1()).unwrap());
        assert!(db.update(&key(), "1", &value1()).unwrap());
        assert!(db.update(&key(), "0", &value0()).unwrap());
    }

    {
        let db = scratch.open();
        let untouched = TestData::new(-1, -1);
        let mut read_missing = untouched;
        assert!(!db.load(&key(), "9", &mut read_missing).unwrap());
        assert_eq!(read_missing, untouched);

        let mut read0 = TestData::default();
        let mut read1 = TestData::default();
        assert!(db.load(&key(), "0", &mut read0).unwrap());
        assert!(db.load(&key(), "1", &mut read1).unwrap());
        assert_eq!(read0, value0());
        assert_eq!(read1, value1());

        assert!(db.remove(&key(), "0").unwrap());
        read0 = untouched;
        assert!(!db.load(&key(), "0", &mut read0).unwrap());
        assert_eq!(read0, untouched);
        assert!(db.load(&key(), "1", &mut read1).unwrap());
        assert_eq!(read1, value1());
        assert!(!db.remove(&key(), "0").unwrap());
    }

    // State survives reopening.
    let db = scratch.open();
    let mut read1 = TestData::default();
    assert!(db.load(&key(), "1", &mut read1).unwrap());
    assert_eq!(read1, value1());
}

#[test]
fn removing_last_id_leaves_no_line_for_the_key() {
    let scratch = Scratch::new();

    let db = scratch.open();
    assert!(db.update(&key(), "0", &value0()).unwrap());
    assert!(db.remove(&key(), "0").unwrap());

    let text = fs::read_to_string(&scratch.path).unwrap();
    assert!(
        !text.contains("1,2="),
        "emptied record still on disk: {text:?}"
    );
    assert!(db.find_record(&key()).unwrap().is_none());
}

#[test]
fn storing_empty_record_prunes_the_key() {
    let scratch = Scratch::new();

    let db = scratch.open();
    assert!(db.update(&key(), "0", &value0()).unwrap());
    db.store_record(&Record::new(&key())).unwrap();
    assert!(db.find_record(&key()).unwrap().is_none());
}

#[test]
fn unparseable_lines_survive_rewrites() {
    let scratch = Scratch::new();
    fs::write(&scratch.path, "#banner, not a record\n1,2=0:3,4\n").unwrap();

    let db = scratch.open();
    assert!(db.update(&key(), "1", &value1()).unwrap());

    let text = fs::read_to_string(&scratch.path).unwrap();
    assert!(text.contains("#banner, not a record"));

    let mut read0 = TestData::default();
    assert!(db.load(&key(), "0", &mut read0).unwrap());
    assert_eq!(read0, value0());
}

#[test]
fn parallel_handles_merge_disjoint_ids() {
    let scratch = Scratch::new();

    {
        let db = scratch.open();
        assert!(db.update(&key(), "0", &value0()).unwrap());
    }

    {
        let db0 = scratch.open();
        let db1 = scratch.open();

        let mut r0 = db0.find_record(&key()).unwrap().expect("record present");
        let mut r1 = db1.find_record(&key()).unwrap().expect("record present");

        assert!(r0.set_values("1", &value1()));
        assert!(r1.set_values("2", &value2()));

        db0.update_record(&mut r0).unwrap();
        db1.update_record(&mut r1).unwrap();
    }

    let db = scratch.open();
    let mut read1 = TestData::default();
    let mut read2 = TestData::default();
    assert!(db.load(&key(), "1", &mut read1).unwrap());
    assert!(db.load(&key(), "2", &mut read2).unwrap());
    assert_eq!(read1, value1());
    assert_eq!(read2, value2());
}

// Shared workload for the thread and process stress tests: every worker
// writes the same seeded "common" entries plus its own random noise; the
// common entries must all survive verbatim.

const WORKERS: u32 = 8;
const COMMON_PART_SIZE: u32 = 64;
const UNIQUE_PART_SIZE: u32 = 64;
const IDS_PER_KEY: u32 = 8;
const COMMON_PART_SEED: u64 = 435_345;

fn common_part() -> Vec<TestData> {
    let mut rng = fastrand::Rng::with_seed(COMMON_PART_SEED);
    (0..COMMON_PART_SIZE)
        .map(|_| TestData::new(rng.i32(0..1_000_000), rng.i32(0..1_000_000)))
        .collect()
}

fn stress_work_item(worker: u32, db_path: &Path) {
    let common = common_part();
    // Alternate between a long-lived handle and per-write handles, as real
    // callers do.
    let db = PerfDb::open(db_path).expect("open db");
    for (i, data) in common.iter().enumerate() {
        let i = i as u32;
        let entry_key = (i / IDS_PER_KEY) as i32;
        let id = (i % IDS_PER_KEY).to_string();
        if i % 2 == 0 {
            assert!(db.update(&entry_key, &id, data).unwrap());
        } else {
            let fresh = PerfDb::open(db_path).expect("open db");
            assert!(fresh.update(&entry_key, &id, data).unwrap());
        }
    }

    // Noise outside the common key range.
    let mut rng = fastrand::Rng::with_seed(123_123 + u64::from(worker));
    for _ in 0..UNIQUE_PART_SIZE {
        let entry_key = 1_000 + rng.i32(0..64);
        let id = rng.u32(0..IDS_PER_KEY + 4).to_string();
        let data = TestData::new(rng.i32(..), rng.i32(..));
        assert!(db.update(&entry_key, &id, &data).unwrap());
    }
}

fn validate_common_part(db_path: &Path) {
    let db = PerfDb::open(db_path).expect("open db");
    for (i, expected) in common_part().iter().enumerate() {
        let i = i as u32;
        let entry_key = (i / IDS_PER_KEY) as i32;
        let id = (i % IDS_PER_KEY).to_string();
        let mut read = TestData::default();
        assert!(
            db.load(&entry_key, &id, &mut read).unwrap(),
            "common entry {entry_key}:{id} missing"
        );
        assert_eq!(read, *expected, "common entry {entry_key}:{id} corrupted");
    }
}

#[test]
fn multi_threaded_writers_preserve_the_common_part() {
    let scratch = Scratch::new();

    let threads: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let path = scratch.path.clone();
            thread::spawn(move || stress_work_item(worker, &path))
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    validate_common_part(&scratch.path);
}

const STRESS_WORKER_VAR: &str = "CONVPLAN_PERFDB_STRESS_WORKER";
const STRESS_PATH_VAR: &str = "CONVPLAN_PERFDB_STRESS_PATH";

/// Runs one stress worker when re-executed by
/// `multi_process_writers_preserve_the_common_part`; a no-op otherwise.
#[test]
fn multi_process_worker() {
    let (Ok(worker), Ok(path)) = (
        std::env::var(STRESS_WORKER_VAR),
        std::env::var(STRESS_PATH_VAR),
    ) else {
        return;
    };
    stress_work_item(worker.parse().expect("worker id"), Path::new(&path));
}

#[test]
fn multi_process_writers_preserve_the_common_part() {
    let scratch = Scratch::new();
    let exe = std::env::current_exe().expect("test binary path");

    let children: Vec<_> = (0..4u32)
        .map(|worker| {
            Command::new(&exe)
                .args(["multi_process_worker", "--exact", "--nocapture"])
                .env(STRESS_WORKER_VAR, worker.to_string())
                .env(STRESS_PATH_VAR, &scratch.path)
                .spawn()
                .expect("spawn stress worker")
        })
        .collect();

    for mut child in children {
        let status = child.wait().expect("wait for stress worker");
        assert!(status.success(), "stress worker failed: {status}");
    }

    validate_common_part(&scratch.path);
}
