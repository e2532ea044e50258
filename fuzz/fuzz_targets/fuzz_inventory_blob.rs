//! Fuzz target: persisted inventory blob decoder
//!
//! Whatever is in flash, boot must not panic:
//! - `decode_blob` accepts only exact-size blobs
//! - availability is always derived from stock
//! - re-encoding an accepted blob is stable
//!
//! cargo fuzz run fuzz_inventory_blob

#![no_main]

use libfuzzer_sys::fuzz_target;
use meddispenser::inventory::{BLOB_SIZE, InventoryStore};

fuzz_target!(|data: &[u8]| {
    let Some(slots) = InventoryStore::decode_blob(data) else {
        return;
    };
    assert_eq!(data.len(), BLOB_SIZE);
    for rec in &slots {
        assert_eq!(rec.is_available(), rec.stock() > 0);
    }

    let once = InventoryStore::new(slots).encode_blob();
    let again = InventoryStore::decode_blob(&once).map(|s| InventoryStore::new(s).encode_blob());
    assert_eq!(again, Some(once));
});
