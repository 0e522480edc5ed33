use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use pn_store::{StoreError, TimeSeriesStore};
use proptest::prelude::*;

fn unique_temp_file(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    std::env::temp_dir().join(format!("{}_{}.pnstore", prefix, nanos))
}

fn plume_keys() -> Vec<String> {
    let mut keys = Vec::new();
    for reactor in ["combustor", "exhaust_1", "exhaust_2"] {
        for component in ["mass", "temperature", "N2", "O2", "CO2"] {
            keys.push(format!("{reactor}:{component}"));
        }
    }
    keys
}

fn sample(seed: f64) -> Vec<f64> {
    (0..15).map(|i| seed * 10.0 + i as f64).collect()
}

#[test]
fn append_reopen_retrieve_round_trip() {
    let path = unique_temp_file("pn_store_round_trip");
    let keys = plume_keys();
    let v1 = sample(1.0);
    let v2 = sample(2.0);

    let mut store = TimeSeriesStore::create(&path, &keys, keys.len(), 100).unwrap();
    store.append(&v1, 0.25).unwrap();
    store.append(&v2, 0.5).unwrap();
    drop(store);

    let store = TimeSeriesStore::reopen(&path).unwrap();
    assert_eq!(store.keys(), keys.as_slice());
    assert_eq!(store.groups(), ["combustor", "exhaust_1", "exhaust_2"]);

    let (times, values) = store.retrieve(1, "temperature").unwrap();
    let slot = 5 + 1;
    assert_eq!(times, vec![0.25, 0.5]);
    assert_eq!(values, vec![v1[slot], v2[slot]]);

    let (_, by_name) = store.retrieve_by_name("exhaust_2", "CO2").unwrap();
    assert_eq!(by_name, vec![v1[14], v2[14]]);
    fs::remove_file(&path).ok();
}

#[test]
fn growth_happens_once_and_keeps_rows() {
    let path = unique_temp_file("pn_store_growth");
    let keys = plume_keys();
    let chunk = 8;

    let mut store = TimeSeriesStore::create(&path, &keys, keys.len(), chunk).unwrap();
    for i in 0..=chunk {
        store.append(&sample(i as f64), i as f64).unwrap();
    }
    assert_eq!(store.capacity(), 2 * chunk);
    assert_eq!(store.dshape().unwrap()[0][0], 2 * chunk);
    drop(store);

    let store = TimeSeriesStore::reopen(&path).unwrap();
    assert_eq!(store.series_len(), chunk + 1);
    assert_eq!(store.dshape().unwrap()[0][0], 2 * chunk);
    for i in 0..=chunk {
        assert_eq!(store.read_row(i).unwrap(), sample(i as f64));
    }
    let (times, _) = store.retrieve(0, "mass").unwrap();
    assert_eq!(times.len(), chunk + 1);
    fs::remove_file(&path).ok();
}

#[test]
fn reopen_without_appends_is_empty() {
    let path = unique_temp_file("pn_store_empty");
    let keys = plume_keys();
    TimeSeriesStore::create(&path, &keys, keys.len(), 5).unwrap();

    let store = TimeSeriesStore::reopen(&path).unwrap();
    assert_eq!(store.series_len(), 0);
    for (g, group) in store.groups().iter().enumerate() {
        let (times, values) = store.retrieve(g, "mass").unwrap();
        assert!(times.is_empty(), "{group}");
        assert!(values.is_empty(), "{group}");
    }
    assert_eq!(store.last_time().unwrap(), None);
    fs::remove_file(&path).ok();
}

#[test]
fn reopened_store_continues_appending() {
    let path = unique_temp_file("pn_store_resume");
    let keys = plume_keys();

    let mut store = TimeSeriesStore::create(&path, &keys, keys.len(), 2).unwrap();
    store.append(&sample(0.0), 0.0).unwrap();
    store.append(&sample(1.0), 1.0).unwrap();
    drop(store);

    let mut store = TimeSeriesStore::reopen(&path).unwrap();
    store.append(&sample(2.0), 2.0).unwrap();
    drop(store);

    let store = TimeSeriesStore::reopen(&path).unwrap();
    assert_eq!(store.times().unwrap(), vec![0.0, 1.0, 2.0]);
    assert_eq!(store.read_row(2).unwrap(), sample(2.0));
    fs::remove_file(&path).ok();
}

#[test]
fn foreign_file_is_corrupt() {
    let path = unique_temp_file("pn_store_foreign");
    fs::write(&path, b"definitely not a store, just some bytes").unwrap();
    assert!(matches!(
        TimeSeriesStore::reopen(&path),
        Err(StoreError::Corrupt { .. })
    ));
    fs::remove_file(&path).ok();
}

#[test]
fn truncated_file_is_corrupt() {
    let path = unique_temp_file("pn_store_truncated");
    let keys = plume_keys();
    TimeSeriesStore::create(&path, &keys, keys.len(), 5).unwrap();

    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
    assert!(matches!(
        TimeSeriesStore::reopen(&path),
        Err(StoreError::Corrupt { .. })
    ));
    fs::remove_file(&path).ok();
}

#[test]
fn missing_file_is_not_found() {
    let path = unique_temp_file("pn_store_missing");
    assert!(matches!(
        TimeSeriesStore::reopen(&path),
        Err(StoreError::NotFound { .. })
    ));
}

#[test]
fn file_size_stays_linear_in_samples() {
    let path = unique_temp_file("pn_store_linear");
    let keys = plume_keys();
    let samples = 300;

    let mut store = TimeSeriesStore::create(&path, &keys, keys.len(), 1).unwrap();
    for i in 0..samples {
        store.append(&sample(i as f64), i as f64).unwrap();
    }
    drop(store);

    // group rows plus the times column
    let live = (samples * (keys.len() + 1) * 8) as u64;
    let file_len = fs::metadata(&path).unwrap().len();
    assert!(
        file_len < live + 32 * 1024,
        "{file_len} bytes on disk for {live} bytes of samples"
    );

    let store = TimeSeriesStore::reopen(&path).unwrap();
    assert_eq!(store.series_len(), samples);
    assert_eq!(store.read_row(samples - 1).unwrap(), sample((samples - 1) as f64));
    fs::remove_file(&path).ok();
}

/// Rewrite the committed directory through `edit` and repoint the superblock.
fn patch_directory(path: &Path, edit: impl FnOnce(&mut serde_json::Value)) {
    let mut file = fs::OpenOptions::new().read(true).write(true).open(path).unwrap();
    let mut superblock = [0_u8; 32];
    file.read_exact(&mut superblock).unwrap();
    let offset = u64::from_le_bytes(superblock[16..24].try_into().unwrap());
    let len = u64::from_le_bytes(superblock[24..32].try_into().unwrap());

    let mut raw = vec![0_u8; len as usize];
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.read_exact(&mut raw).unwrap();
    let mut directory: serde_json::Value = serde_json::from_slice(&raw).unwrap();
    edit(&mut directory);

    let end = file.seek(SeekFrom::End(0)).unwrap();
    let capacity = 1_u64 << 16;
    for slot in directory["slots"].as_array_mut().unwrap() {
        if slot["offset"] == offset {
            slot["offset"] = end.into();
            slot["capacity"] = capacity.into();
        }
    }
    let patched = serde_json::to_vec(&directory).unwrap();
    assert!((patched.len() as u64) < capacity);
    file.set_len(end + capacity).unwrap();
    file.seek(SeekFrom::Start(end)).unwrap();
    file.write_all(&patched).unwrap();

    superblock[16..24].copy_from_slice(&end.to_le_bytes());
    superblock[24..32].copy_from_slice(&(patched.len() as u64).to_le_bytes());
    file.seek(SeekFrom::Start(0)).unwrap();
    file.write_all(&superblock).unwrap();
}

#[test]
fn huge_dataset_in_directory_is_corrupt() {
    let path = unique_temp_file("pn_store_huge_rows");
    let keys = plume_keys();
    TimeSeriesStore::create(&path, &keys, keys.len(), 4).unwrap();

    patch_directory(&path, |directory| {
        for entry in directory["datasets"].as_array_mut().unwrap() {
            if entry["name"] == "times" {
                entry["rows"] = (1_u64 << 62).into();
                entry["extent_rows"] = (1_u64 << 62).into();
            }
        }
    });

    assert!(matches!(
        TimeSeriesStore::reopen(&path),
        Err(StoreError::Corrupt { .. })
    ));
    assert!(matches!(
        TimeSeriesStore::open_read_only(&path),
        Err(StoreError::Corrupt { .. })
    ));
    fs::remove_file(&path).ok();
}

#[test]
fn read_only_open_reads_what_was_written() {
    let path = unique_temp_file("pn_store_read_only");
    let keys = plume_keys();
    let mut store = TimeSeriesStore::create(&path, &keys, keys.len(), 3).unwrap();
    for i in 0..5 {
        store.append(&sample(i as f64), i as f64 * 0.5).unwrap();
    }
    drop(store);

    let store = TimeSeriesStore::open_read_only(&path).unwrap();
    assert_eq!(store.series_len(), 5);
    assert_eq!(store.times().unwrap(), vec![0.0, 0.5, 1.0, 1.5, 2.0]);
    let (_, o2) = store.retrieve_by_name("exhaust_1", "O2").unwrap();
    assert_eq!(o2, (0..5).map(|i| sample(i as f64)[8]).collect::<Vec<_>>());
    fs::remove_file(&path).ok();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn every_appended_row_is_retrievable(
        chunk in 1usize..6,
        rows in prop::collection::vec(prop::collection::vec(-1e6f64..1e6, 15), 1..20),
    ) {
        let path = unique_temp_file("pn_store_prop");
        let keys = plume_keys();
        let mut store = TimeSeriesStore::create(&path, &keys, keys.len(), chunk).unwrap();
        for (i, row) in rows.iter().enumerate() {
            store.append(row, i as f64).unwrap();
        }
        drop(store);

        let store = TimeSeriesStore::reopen(&path).unwrap();
        prop_assert_eq!(store.series_len(), rows.len());
        prop_assert_eq!(store.capacity() % chunk, 0);
        let (_, masses) = store.retrieve(2, "mass").unwrap();
        let expected: Vec<f64> = rows.iter().map(|r| r[10]).collect();
        prop_assert_eq!(masses, expected);
        fs::remove_file(&path).ok();
    }
}
