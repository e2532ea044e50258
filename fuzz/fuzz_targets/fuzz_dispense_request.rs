//! Fuzz target: HTTP request routing and body parsing
//!
//! Feeds arbitrary bodies to every POST route and checks:
//! - No panics under arbitrary byte inputs
//! - An accepted dispense request has 1-16 items, all with quantity > 0
//! - Immediate answers are always 4xx JSON errors
//!
//! cargo fuzz run fuzz_dispense_request

#![no_main]

use libfuzzer_sys::fuzz_target;
use meddispenser::api::{self, Method, Route};
use meddispenser::app::commands::AppCommand;
use meddispenser::transaction::MAX_REQUEST_ITEMS;

fuzz_target!(|data: &[u8]| {
    for path in ["/api/dispense", "/api/inventory", "/api/reset"] {
        match api::route(Method::Post, path, data) {
            Route::Forward(AppCommand::Dispense(req)) => {
                assert!(!req.items.is_empty());
                assert!(req.items.len() <= MAX_REQUEST_ITEMS);
                assert!(req.items.iter().all(|i| i.quantity.get() > 0));
            }
            Route::Forward(_) => {}
            Route::Immediate(resp) => {
                assert!((400..500).contains(&resp.status));
                assert!(resp.body.starts_with(r#"{"error":"#));
            }
        }
    }
});
