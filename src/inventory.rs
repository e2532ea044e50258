//! Slot inventory: stock records, persistence and availability queries.
//!
//! One [`SlotRecord`] per physical slot, held in a single ordered array
//! indexed by slot.  The store is the only place stock is mutated; every
//! mutation recomputes `available` so `available == (stock > 0)` always
//! holds.
//!
//! ## Persisted layout
//!
//! A flat blob of `SLOT_COUNT` fixed-size records, record `n` at offset
//! `n * RECORD_SIZE`:
//!
//! ```text
//!  0      4      8   9     12
//!  ┌──────┬──────┬───┬─────┐
//!  │ id   │stock │av │ pad │   id, stock: i32 little-endian
//!  └──────┴──────┴───┴─────┘   av: 0 / 1, pad: zero
//! ```
//!
//! No version field: a layout change requires wiping the blob.

use log::{info, warn};

use crate::app::ports::{StorageError, StoragePort};
use crate::error::PersistenceError;

/// Identifier of the item type held by a slot.
pub type ItemId = i32;

/// Number of physical dispensing slots.
pub const SLOT_COUNT: usize = 10;

/// Size of one persisted slot record in bytes.
pub const RECORD_SIZE: usize = 12;

/// Size of the whole inventory blob in bytes.
pub const BLOB_SIZE: usize = SLOT_COUNT * RECORD_SIZE;

/// Largest stock a slot can hold; the persisted field is an `i32`.
pub const MAX_STOCK: u32 = i32::MAX as u32;

pub const INVENTORY_NAMESPACE: &str = "dispenser";
pub const INVENTORY_KEY: &str = "inventory";

/// Item ids in slot 0 that mark a blank (never written) blob.
const BLANK_SENTINELS: [ItemId; 2] = [0, 255];

const DEFAULT_STOCK: [u32; SLOT_COUNT] = [15, 12, 8, 20, 18, 25, 16, 14, 10, 7];

// ---------------------------------------------------------------------------
// SlotRecord
// ---------------------------------------------------------------------------

/// Stock record for one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRecord {
    pub item_id: ItemId,
    stock: u32,
    available: bool,
}

impl SlotRecord {
    /// Stock above [`MAX_STOCK`] is capped so the record survives a save.
    pub fn new(item_id: ItemId, stock: u32) -> Self {
        let stock = stock.min(MAX_STOCK);
        Self {
            item_id,
            stock,
            available: stock > 0,
        }
    }

    pub fn stock(&self) -> u32 {
        self.stock
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    fn set_stock(&mut self, stock: u32) {
        let stock = stock.min(MAX_STOCK);
        self.stock = stock;
        self.available = stock > 0;
    }

    fn encode(&self, out: &mut [u8]) {
        let stock = self.stock as i32;
        out[0..4].copy_from_slice(&self.item_id.to_le_bytes());
        out[4..8].copy_from_slice(&stock.to_le_bytes());
        out[8] = u8::from(self.available);
        out[9..RECORD_SIZE].fill(0);
    }

    fn decode(raw: &[u8]) -> Self {
        let item_id = ItemId::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        let stock = i32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]);
        // The stored flag is advisory; availability is always derived.
        Self::new(item_id, stock.max(0) as u32)
    }
}

/// Factory inventory used on first boot: ids 1–10 with mixed stock.
pub fn default_fixture() -> [SlotRecord; SLOT_COUNT] {
    core::array::from_fn(|slot| SlotRecord::new(slot as ItemId + 1, DEFAULT_STOCK[slot]))
}

/// Where [`InventoryStore::load`] got its records from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    /// Decoded from the persisted blob.
    Stored,
    /// The blob was blank or unreadable; the caller's fixture was used.
    Fixture,
}

// ---------------------------------------------------------------------------
// InventoryStore
// ---------------------------------------------------------------------------

/// In-memory inventory, authoritative between saves.
#[derive(Debug, Clone)]
pub struct InventoryStore {
    slots: [SlotRecord; SLOT_COUNT],
}

impl InventoryStore {
    pub fn new(slots: [SlotRecord; SLOT_COUNT]) -> Self {
        Self { slots }
    }

    /// Restore from storage, falling back to `fixture` when the blob is
    /// missing, has the wrong size, or carries a blank sentinel in slot 0.
    pub fn load(
        storage: &impl StoragePort,
        fixture: [SlotRecord; SLOT_COUNT],
    ) -> (Self, LoadSource) {
        // Oversized buffer so a blob longer than BLOB_SIZE is detected.
        let mut buf = [0u8; BLOB_SIZE * 2];
        match storage.read(INVENTORY_NAMESPACE, INVENTORY_KEY, &mut buf) {
            Ok(len) => {
                if let Some(slots) = Self::decode_blob(&buf[..len]) {
                    info!("Inventory: restored {} slots from storage", SLOT_COUNT);
                    return (Self::new(slots), LoadSource::Stored);
                }
                warn!("Inventory: stored blob blank or malformed ({} bytes), using defaults", len);
            }
            Err(StorageError::NotFound) => {
                info!("Inventory: no stored blob, using defaults");
            }
            Err(e) => {
                warn!("Inventory: read failed ({}), using defaults", e);
            }
        }
        (Self::new(fixture), LoadSource::Fixture)
    }

    /// Serialise every slot and write the blob in one atomic write.
    pub fn save(&self, storage: &mut impl StoragePort) -> Result<(), PersistenceError> {
        storage.write(INVENTORY_NAMESPACE, INVENTORY_KEY, &self.encode_blob())?;
        Ok(())
    }

    /// Decode a persisted blob.  `None` when the length is wrong or slot 0
    /// holds a blank sentinel id.
    pub fn decode_blob(bytes: &[u8]) -> Option<[SlotRecord; SLOT_COUNT]> {
        if bytes.len() != BLOB_SIZE {
            return None;
        }
        let slots: [SlotRecord; SLOT_COUNT] = core::array::from_fn(|slot| {
            let offset = slot * RECORD_SIZE;
            SlotRecord::decode(&bytes[offset..offset + RECORD_SIZE])
        });
        if BLANK_SENTINELS.contains(&slots[0].item_id) {
            return None;
        }
        Some(slots)
    }

    pub fn encode_blob(&self) -> [u8; BLOB_SIZE] {
        let mut blob = [0u8; BLOB_SIZE];
        for (record, chunk) in self.slots.iter().zip(blob.chunks_exact_mut(RECORD_SIZE)) {
            record.encode(chunk);
        }
        blob
    }

    // ── Queries ───────────────────────────────────────────────

    /// First slot holding `item_id`.  Ids are not unique by construction;
    /// a duplicate further down is never consulted.
    pub fn find_slot(&self, item_id: ItemId) -> Option<usize> {
        self.slots.iter().position(|r| r.item_id == item_id)
    }

    /// `None` if no slot holds `item_id`.
    pub fn has_sufficient_stock(&self, item_id: ItemId, quantity: u32) -> Option<bool> {
        self.find_slot(item_id)
            .map(|slot| self.slots[slot].stock >= quantity)
    }

    pub fn records(&self) -> &[SlotRecord; SLOT_COUNT] {
        &self.slots
    }

    // ── Mutations ─────────────────────────────────────────────

    /// Remove `quantity` units from `slot`.  Stock saturates at zero;
    /// validation guarantees it never has to.
    pub fn apply_consumption(&mut self, slot: usize, quantity: u32) {
        if let Some(record) = self.slots.get_mut(slot) {
            if record.stock < quantity {
                warn!(
                    "Inventory: slot {} consumption {} exceeds stock {}, flooring at 0",
                    slot + 1,
                    quantity,
                    record.stock
                );
            }
            let remaining = record.stock.saturating_sub(quantity);
            record.set_stock(remaining);
        }
    }

    /// Overwrite the stock of the first slot holding `item_id`, capped at
    /// [`MAX_STOCK`].  Returns the slot index, or `None` if the item is
    /// unknown.
    pub fn restock(&mut self, item_id: ItemId, new_stock: u32) -> Option<usize> {
        let slot = self.find_slot(item_id)?;
        if new_stock > MAX_STOCK {
            warn!("Inventory: stock {} for id {} capped at {}", new_stock, item_id, MAX_STOCK);
        }
        self.slots[slot].set_stock(new_stock);
        info!(
            "Inventory: slot {} (id {}) restocked to {}",
            slot + 1,
            item_id,
            self.slots[slot].stock
        );
        Some(slot)
    }
}

impl Default for InventoryStore {
    fn default() -> Self {
        Self::new(default_fixture())
    }
}
