//! Integration tests for the DispenseService → FSM → actuator pipeline.
//!
//! Drives whole transactions through the public service API with mock
//! adapters and checks inventory, persistence, feedback and events.

use crate::mock_hw::{LogSink, MockActuator, MockNotifier, MockNvs};

use meddispenser::app::events::{AppEvent, Notice};
use meddispenser::app::ports::Detection;
use meddispenser::app::service::DispenseService;
use meddispenser::config::SystemConfig;
use meddispenser::error::RequestRejection;
use meddispenser::fsm::StateId;
use meddispenser::inventory::{
    INVENTORY_KEY, INVENTORY_NAMESPACE, InventoryStore, LoadSource, SLOT_COUNT, SlotRecord,
    default_fixture,
};
use meddispenser::transaction::{
    DispenseItem, DispenseRequest, RequestItems, TransactionId, TransactionState,
};

struct Rig {
    svc: DispenseService,
    hw: MockActuator,
    notes: MockNotifier,
    nvs: MockNvs,
    sink: LogSink,
    now: u64,
}

impl Rig {
    fn with_slots(slots: [SlotRecord; SLOT_COUNT]) -> Self {
        let mut sink = LogSink::new();
        let mut svc = DispenseService::new(SystemConfig::default(), InventoryStore::new(slots));
        svc.start(&mut sink);
        Self {
            svc,
            hw: MockActuator::new(),
            notes: MockNotifier::default(),
            nvs: MockNvs::new(),
            sink,
            now: 0,
        }
    }

    fn fixture() -> Self {
        Self::with_slots(default_fixture())
    }

    fn submit(&mut self, id: &str, items: &[(i32, u32)]) -> Result<(), RequestRejection> {
        self.svc
            .submit(request(id, items), self.now, &mut self.notes, &mut self.sink)
    }

    fn tick(&mut self) {
        self.now += 10;
        self.svc.tick(
            self.now,
            &mut self.hw,
            &mut self.notes,
            &mut self.nvs,
            &mut self.sink,
        );
    }

    /// Tick until the service leaves Dispensing (bounded).
    fn run_to_end(&mut self) {
        for _ in 0..200 {
            if !self.svc.is_busy() {
                return;
            }
            self.tick();
        }
        panic!("transaction never finished");
    }

    fn stock(&self, slot: usize) -> u32 {
        self.svc.query_inventory().records()[slot].stock()
    }
}

fn request(id: &str, items: &[(i32, u32)]) -> DispenseRequest {
    let mut list = RequestItems::new();
    for &(item_id, qty) in items {
        list.push(DispenseItem::new(item_id, qty).unwrap()).unwrap();
    }
    DispenseRequest {
        transaction_id: TransactionId::try_from(id).unwrap(),
        items: list,
    }
}

fn slots_with(first: SlotRecord) -> [SlotRecord; SLOT_COUNT] {
    let mut slots = default_fixture();
    slots[0] = first;
    slots
}

// ── Happy path ───────────────────────────────────────────────

#[test]
fn single_item_completes_and_consumes_stock() {
    let mut rig = Rig::with_slots(slots_with(SlotRecord::new(1, 5)));
    rig.submit("t1", &[(1, 2)]).unwrap();
    assert_eq!(rig.svc.state(), StateId::Dispensing);

    rig.run_to_end();
    assert_eq!(rig.svc.state(), StateId::Completed);
    assert_eq!(rig.hw.units(), vec![0, 0]);
    assert_eq!(rig.stock(0), 3);
    assert!(rig.svc.query_inventory().records()[0].is_available());

    let status = rig.svc.query_status();
    assert!(!status.busy);
    assert_eq!(status.transaction_id.as_deref(), Some("t1"));
    assert_eq!(status.transaction_state, Some(TransactionState::Completed));

    assert_eq!(
        rig.notes.notices,
        vec![
            Notice::Started,
            Notice::UnitDispensed { slot: 0, confirmed: true },
            Notice::UnitDispensed { slot: 0, confirmed: true },
            Notice::Completed,
        ]
    );
}

#[test]
fn multi_item_request_pauses_between_items_and_persists_each() {
    let mut rig = Rig::fixture();
    let before: Vec<u32> = (0..SLOT_COUNT).map(|s| rig.stock(s)).collect();

    rig.submit("t2", &[(2, 1), (5, 2), (10, 1)]).unwrap();
    rig.run_to_end();

    assert_eq!(rig.hw.units(), vec![1, 4, 4, 9]);
    assert_eq!(rig.hw.pauses(), 2);
    assert_eq!(rig.stock(1), before[1] - 1);
    assert_eq!(rig.stock(4), before[4] - 2);
    assert_eq!(rig.stock(9), before[9] - 1);
    for slot in [0, 2, 3, 5, 6, 7, 8] {
        assert_eq!(rig.stock(slot), before[slot]);
    }
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::InventoryPersisted)), 3);

    // What landed in storage decodes to what is in memory.
    let blob = rig.nvs.raw(INVENTORY_NAMESPACE, INVENTORY_KEY).unwrap();
    let stored = InventoryStore::decode_blob(blob).unwrap();
    assert_eq!(&stored, rig.svc.query_inventory().records());
}

#[test]
fn unconfirmed_units_still_count() {
    let mut rig = Rig::with_slots(slots_with(SlotRecord::new(1, 4)));
    rig.hw.detections.extend([Detection::NotDetected, Detection::Detected]);
    rig.submit("t3", &[(1, 2)]).unwrap();
    rig.run_to_end();

    assert_eq!(rig.svc.state(), StateId::Completed);
    assert_eq!(rig.stock(0), 2);
    assert!(rig
        .notes
        .notices
        .contains(&Notice::UnitDispensed { slot: 0, confirmed: false }));
    let finished = rig
        .sink
        .events
        .iter()
        .find_map(|e| match e {
            AppEvent::TransactionFinished {
                units_dispensed,
                units_unconfirmed,
                ..
            } => Some((*units_dispensed, *units_unconfirmed)),
            _ => None,
        })
        .unwrap();
    assert_eq!(finished, (2, 1));
}

#[test]
fn stock_can_be_drained_to_zero() {
    let mut rig = Rig::with_slots(slots_with(SlotRecord::new(1, 2)));
    rig.submit("t4", &[(1, 2)]).unwrap();
    rig.run_to_end();
    assert_eq!(rig.stock(0), 0);
    assert!(!rig.svc.query_inventory().records()[0].is_available());

    rig.tick();
    assert_eq!(
        rig.submit("t5", &[(1, 1)]),
        Err(RequestRejection::InsufficientStock(1))
    );
}

// ── Rejections ───────────────────────────────────────────────

#[test]
fn insufficient_stock_rejects_without_touching_inventory() {
    let mut rig = Rig::with_slots(slots_with(SlotRecord::new(1, 0)));
    assert_eq!(
        rig.submit("t1", &[(1, 2)]),
        Err(RequestRejection::InsufficientStock(1))
    );
    assert_eq!(rig.svc.state(), StateId::Rejected);
    rig.tick();
    assert_eq!(rig.svc.state(), StateId::Idle);

    assert_eq!(rig.stock(0), 0);
    assert!(rig.hw.calls.is_empty());
    assert_eq!(rig.nvs.writes, 0);
    assert_eq!(rig.notes.notices, vec![Notice::Error]);
}

#[test]
fn unknown_item_is_not_found() {
    let mut rig = Rig::fixture();
    assert_eq!(
        rig.submit("t1", &[(1, 1), (99, 1)]),
        Err(RequestRejection::NotFound(99))
    );
    assert!(rig.hw.calls.is_empty());
}

#[test]
fn quantities_for_one_slot_are_summed() {
    let mut rig = Rig::with_slots(slots_with(SlotRecord::new(1, 3)));
    assert_eq!(
        rig.submit("t1", &[(1, 2), (1, 2)]),
        Err(RequestRejection::InsufficientStock(1))
    );
    rig.tick();
    assert!(rig.submit("t2", &[(1, 2), (1, 1)]).is_ok());
}

#[test]
fn busy_while_dispensing_leaves_active_transaction_alone() {
    let mut rig = Rig::fixture();
    rig.submit("t1", &[(1, 3)]).unwrap();
    rig.tick();

    assert_eq!(rig.submit("t2", &[(2, 1)]), Err(RequestRejection::Busy));
    assert_eq!(rig.svc.state(), StateId::Dispensing);
    assert_eq!(
        rig.svc.query_status().transaction_id.as_deref(),
        Some("t1")
    );
    // No error tone for a busy rejection.
    assert!(!rig.notes.notices.contains(&Notice::Error));

    rig.run_to_end();
    assert_eq!(rig.hw.units(), vec![0, 0, 0]);
    assert!(rig.submit("t3", &[(2, 1)]).is_ok());
}

// ── Watchdog ─────────────────────────────────────────────────

#[test]
fn stuck_transaction_times_out_and_frees_the_controller() {
    let mut rig = Rig::fixture();
    let before = rig.stock(0);
    rig.submit("slow", &[(1, 3)]).unwrap();
    rig.tick();

    rig.now = SystemConfig::default().dispense_timeout_ms + 1_000;
    rig.tick();
    assert_eq!(rig.svc.state(), StateId::TimedOut);
    assert!(!rig.svc.is_busy());
    assert_eq!(rig.stock(0), before);

    let status = rig.svc.query_status();
    assert_eq!(status.transaction_state, Some(TransactionState::TimedOut));
    assert_eq!(rig.notes.notices.last(), Some(&Notice::Error));

    assert!(rig.submit("next", &[(2, 1)]).is_ok());
}

// ── Restock ──────────────────────────────────────────────────

#[test]
fn restock_updates_availability_and_persists() {
    let mut rig = Rig::with_slots(slots_with(SlotRecord::new(1, 0)));
    rig.svc
        .restock(1, 30, &mut rig.nvs, &mut rig.sink)
        .unwrap();
    assert_eq!(rig.stock(0), 30);
    assert!(rig.svc.query_inventory().records()[0].is_available());
    assert_eq!(rig.nvs.writes, 1);

    assert_eq!(
        rig.svc.restock(404, 1, &mut rig.nvs, &mut rig.sink),
        Err(RequestRejection::NotFound(404))
    );
}

#[test]
fn persistence_failure_is_not_fatal() {
    let mut rig = Rig::with_slots(slots_with(SlotRecord::new(1, 5)));
    rig.nvs.fail_writes = true;
    rig.submit("t1", &[(1, 1)]).unwrap();
    rig.run_to_end();

    assert_eq!(rig.svc.state(), StateId::Completed);
    assert_eq!(rig.stock(0), 4);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::PersistFailed(_))), 1);
}

// ── Boot ─────────────────────────────────────────────────────

#[test]
fn state_survives_a_reboot_through_storage() {
    let mut rig = Rig::fixture();
    rig.submit("t1", &[(3, 2)]).unwrap();
    rig.run_to_end();

    let (restored, source) = InventoryStore::load(&rig.nvs, default_fixture());
    assert_eq!(source, LoadSource::Stored);
    assert_eq!(restored.records(), rig.svc.query_inventory().records());
}

#[test]
fn first_boot_falls_back_to_fixture() {
    let nvs = MockNvs::new();
    let (inv, source) = InventoryStore::load(&nvs, default_fixture());
    assert_eq!(source, LoadSource::Fixture);
    assert_eq!(inv.records(), &default_fixture());
}
