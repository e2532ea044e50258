//! HTTP API: routing, request parsing and JSON rendering.
//!
//! Everything here is pure.  [`route`] either answers a request on the
//! spot (health, CORS preflight, malformed bodies, unknown paths) or
//! turns it into an [`AppCommand`] for the control loop, whose
//! [`AppReply`] is later rendered by [`render_reply`].  The ESP-IDF server
//! glue lives in `adapters::http_server`.
//!
//! | Method  | Path             | Outcome                          |
//! |---------|------------------|----------------------------------|
//! | GET     | `/api/inventory` | `QueryInventory`                 |
//! | POST    | `/api/inventory` | `Restock`                        |
//! | POST    | `/api/dispense`  | `Dispense`                       |
//! | GET     | `/api/status`    | `QueryStatus`                    |
//! | GET     | `/api/health`    | answered immediately             |
//! | POST    | `/api/reset`     | `Reset`                          |
//! | OPTIONS | dispense, inventory, status | CORS preflight        |

pub mod channels;

use serde::{Deserialize, Serialize};

use crate::app::commands::{AppCommand, AppReply, StatusSnapshot};
use crate::error::RequestRejection;
use crate::inventory::{ItemId, MAX_STOCK, SLOT_COUNT, SlotRecord};
use crate::transaction::{
    DispenseItem, DispenseRequest, MAX_REQUEST_ITEMS, RequestItems, TransactionId,
};

pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Headers every response carries.
pub const CORS_HEADERS: &[(&str, &str)] = &[("Access-Control-Allow-Origin", "*")];

/// Extra headers on a preflight response.
pub const PREFLIGHT_HEADERS: &[(&str, &str)] = &[
    ("Access-Control-Allow-Methods", "GET, POST, OPTIONS"),
    ("Access-Control-Allow-Headers", "Content-Type"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Options,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// JSON body; empty for preflight.
    pub body: String,
    pub preflight: bool,
}

impl HttpResponse {
    fn json(status: u16, body: impl Serialize) -> Self {
        // Serialising these plain structs cannot fail; fall back to an
        // empty object rather than panic.
        let body = serde_json::to_string(&body).unwrap_or_else(|_| String::from("{}"));
        Self {
            status,
            body,
            preflight: false,
        }
    }

    fn error(status: u16, message: &str) -> Self {
        Self::json(status, ErrorBody { error: message })
    }

    fn preflight() -> Self {
        Self {
            status: 200,
            body: String::new(),
            preflight: true,
        }
    }

    /// Gateway-side failure: the control loop did not answer in time or
    /// its inbox was full.
    pub fn unavailable() -> Self {
        Self::error(503, "Service unavailable")
    }

    pub fn headers(&self) -> impl Iterator<Item = &'static (&'static str, &'static str)> {
        let extra: &'static [(&str, &str)] = if self.preflight { PREFLIGHT_HEADERS } else { &[] };
        CORS_HEADERS.iter().chain(extra.iter())
    }
}

/// Device health folded into status replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SystemHealth {
    pub wifi_connected: bool,
    pub free_heap: u32,
    pub uptime_ms: u64,
}

#[derive(Debug)]
pub enum Route {
    /// Answer without involving the control loop.
    Immediate(HttpResponse),
    /// Hand to the control loop, then render its reply.
    Forward(AppCommand),
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DispenseBody {
    transaction_id: TransactionId,
    items: heapless::Vec<ItemBody, MAX_REQUEST_ITEMS>,
}

#[derive(Debug, Deserialize)]
struct ItemBody {
    id: ItemId,
    quantity: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestockBody {
    medicine_id: ItemId,
    stock: u32,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

#[derive(Serialize)]
struct StatusOnly {
    status: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DispenseStarted<'a> {
    status: &'static str,
    transaction_id: &'a str,
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct MedicineBody {
    id: ItemId,
    stock: u32,
    available: bool,
    /// 1-based.
    slot: usize,
}

#[derive(Serialize)]
struct InventoryBody {
    medicines: heapless::Vec<MedicineBody, SLOT_COUNT>,
    status: &'static str,
    timestamp: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusBody<'a> {
    dispensing_in_progress: bool,
    current_transaction: &'a str,
    state: &'static str,
    system_health: &'static str,
    wifi_connected: bool,
    free_heap: u32,
    uptime: u64,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a dispense body.  `None` for anything malformed: bad JSON,
/// over-long id, too many items, no items, or a zero quantity.
pub fn parse_dispense(body: &[u8]) -> Option<DispenseRequest> {
    let parsed: DispenseBody = serde_json::from_slice(body).ok()?;
    if parsed.items.is_empty() {
        return None;
    }
    let mut items = RequestItems::new();
    for item in &parsed.items {
        items.push(DispenseItem::new(item.id, item.quantity)?).ok()?;
    }
    Some(DispenseRequest {
        transaction_id: parsed.transaction_id,
        items,
    })
}

/// Parse a restock body into `(medicine id, new stock)`.  Stock the
/// inventory blob cannot hold is refused.
pub fn parse_restock(body: &[u8]) -> Option<(ItemId, u32)> {
    let parsed: RestockBody = serde_json::from_slice(body).ok()?;
    if parsed.stock > MAX_STOCK {
        return None;
    }
    Some((parsed.medicine_id, parsed.stock))
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

pub fn route(method: Method, path: &str, body: &[u8]) -> Route {
    // Query strings are ignored.
    let path = path.split('?').next().unwrap_or(path);

    match (method, path) {
        (Method::Get, "/api/inventory") => Route::Forward(AppCommand::QueryInventory),
        (Method::Post, "/api/inventory") => match parse_restock(body) {
            Some((item_id, stock)) => Route::Forward(AppCommand::Restock { item_id, stock }),
            None => Route::Immediate(HttpResponse::error(400, "Invalid request")),
        },
        (Method::Post, "/api/dispense") => match parse_dispense(body) {
            Some(request) => Route::Forward(AppCommand::Dispense(request)),
            None => Route::Immediate(HttpResponse::error(400, "Invalid request body")),
        },
        (Method::Get, "/api/status") => Route::Forward(AppCommand::QueryStatus),
        (Method::Get, "/api/health") => Route::Immediate(HttpResponse::json(
            200,
            HealthBody {
                status: "healthy",
                version: env!("CARGO_PKG_VERSION"),
            },
        )),
        (Method::Post, "/api/reset") => Route::Forward(AppCommand::Reset),
        (Method::Options, "/api/dispense" | "/api/inventory" | "/api/status") => {
            Route::Immediate(HttpResponse::preflight())
        }
        _ => Route::Immediate(HttpResponse::error(404, "Endpoint not found")),
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn rejection_status(reason: RequestRejection) -> u16 {
    match reason {
        RequestRejection::Busy => 409,
        RequestRejection::NotFound(_) | RequestRejection::InsufficientStock(_) => 400,
    }
}

pub fn render_reply(reply: &AppReply, health: &SystemHealth) -> HttpResponse {
    match reply {
        AppReply::Accepted(id) => HttpResponse::json(
            200,
            DispenseStarted {
                status: "dispensing_started",
                transaction_id: id.as_str(),
            },
        ),
        AppReply::Restocked => HttpResponse::json(200, StatusOnly { status: "success" }),
        AppReply::Resetting => HttpResponse::json(200, StatusOnly { status: "resetting" }),
        AppReply::Inventory(records) => render_inventory(records, health.uptime_ms),
        AppReply::Status(status) => render_status(status, health),
        AppReply::Rejected(reason) => {
            HttpResponse::error(rejection_status(*reason), &reason.to_string())
        }
        AppReply::RestockRejected(reason) => {
            let status = match reason {
                RequestRejection::NotFound(_) => 404,
                other => rejection_status(*other),
            };
            HttpResponse::error(status, &reason.to_string())
        }
    }
}

fn render_inventory(records: &[SlotRecord; SLOT_COUNT], uptime_ms: u64) -> HttpResponse {
    let medicines = records
        .iter()
        .enumerate()
        .map(|(slot, r)| MedicineBody {
            id: r.item_id,
            stock: r.stock(),
            available: r.is_available(),
            slot: slot + 1,
        })
        .collect();
    HttpResponse::json(
        200,
        InventoryBody {
            medicines,
            status: "success",
            timestamp: uptime_ms,
        },
    )
}

fn render_status(status: &StatusSnapshot, health: &SystemHealth) -> HttpResponse {
    HttpResponse::json(
        200,
        StatusBody {
            dispensing_in_progress: status.busy,
            current_transaction: status.transaction_id.as_deref().unwrap_or(""),
            state: status.transaction_state.map_or("idle", |s| s.as_str()),
            system_health: "OK",
            wifi_connected: health.wifi_connected,
            free_heap: health.free_heap,
            uptime: health.uptime_ms,
        },
    )
}
