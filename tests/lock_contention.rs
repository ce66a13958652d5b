use netcore_ipc::region::{
    CrossCoreLock, HwMutex, OTA_CHUNK_SIZE, Shared, SharedRegion, SpinMutex,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

const WRITES_PER_WRITER: u32 = 2_000;

/// Byte `j` of a chunk published by `writer` with `index` and `size`.
fn pattern(writer: u8, index: u32, size: usize, j: usize) -> u8 {
    writer ^ (index as u8) ^ (size as u8) ^ (j as u8)
}

/// Publish chunks field by field, yielding at random points inside the
/// critical section.  The writer id goes in `image_size`.
fn writer<M: HwMutex>(shared: Shared<'_, M>, id: u8, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    for _ in 0..WRITES_PER_WRITER {
        let index: u32 = rng.gen_range(0..32);
        let size: usize = rng.gen_range(0..=OTA_CHUNK_SIZE);
        let yield_at = rng.gen_range(0..=size);
        shared
            .with_ota(|ota| {
                ota.image_size = id as u32;
                ota.chunk_index = index;
                if rng.gen_bool(0.5) {
                    std::thread::yield_now();
                }
                ota.chunk_size = size as u32;
                for j in 0..size {
                    if j == yield_at {
                        std::thread::yield_now();
                    }
                    ota.chunk[j] = pattern(id, index, size, j);
                }
            })
            .unwrap();
        if rng.gen_bool(0.3) {
            std::thread::yield_now();
        }
    }
}

#[test]
fn test_ota_updates_never_interleave() {
    let region = SharedRegion::new();
    let lock = CrossCoreLock::new(SpinMutex::new());
    let shared = unsafe { Shared::new(&region, &lock) };
    let done = AtomicU32::new(0);
    let torn = AtomicBool::new(false);

    std::thread::scope(|s| {
        for (id, seed) in [(1u8, 0x5EED_0001u64), (2, 0x5EED_0002)] {
            let done = &done;
            s.spawn(move || {
                writer(shared, id, seed);
                done.fetch_add(1, Ordering::Release);
            });
        }

        let mut rng = StdRng::seed_from_u64(0x5EED_0003);
        loop {
            let finished = done.load(Ordering::Acquire) == 2;
            let ota = shared.with_ota(|ota| *ota).unwrap();
            let id = ota.image_size as u8;
            let bytes = ota.chunk_bytes().unwrap();
            for (j, &byte) in bytes.iter().enumerate() {
                if byte != pattern(id, ota.chunk_index, bytes.len(), j) {
                    torn.store(true, Ordering::Relaxed);
                }
            }
            if finished {
                break;
            }
            if rng.gen_bool(0.2) {
                std::thread::yield_now();
            }
        }
    });

    assert!(!torn.load(Ordering::Relaxed), "reader saw a torn chunk");
}

#[test]
fn test_bounded_lock_reports_contention() {
    let region = SharedRegion::new();
    let lock = CrossCoreLock::with_spin_limit(SpinMutex::new(), 64);
    let shared = unsafe { Shared::new(&region, &lock) };
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..100 {
        let held = rng.gen_bool(0.5);
        if held {
            lock.acquire().unwrap();
        }
        let result = shared.with_ota(|ota| ota.chunk_index);
        if held {
            assert!(result.is_err());
            lock.release();
        } else {
            assert_eq!(result, Ok(0));
        }
    }
}
