//! Request/reply bridge between the HTTP server task and the control loop.
//!
//! Uses `embassy-sync` bounded channels so both sides share static queues
//! without heap allocation.  The httpd task only parses and renders; every
//! command that touches the service is executed by the control loop.
//!
//! ```text
//! ┌──────────────┐  ApiRequest  ┌───────────────┐
//! │  httpd task  │─────────────▶│ Control Loop  │
//! │ (handlers)   │◀─────────────│ (sync)        │
//! └──────────────┘   ApiReply   └───────────────┘
//! ```
//!
//! Handlers run one at a time on the httpd task, so there is at most one
//! outstanding request.  When a handler gives up waiting it records its
//! `seq`; the control loop then skips every queued request up to that
//! number, so a client that got a 503 never triggers a dispense later.
//! A request already taken by the loop when its waiter gives up still
//! runs; its reply no longer matches and is dropped by the next waiter.

use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embedded_hal::delay::DelayNs;
use log::warn;

use super::SystemHealth;
use crate::app::commands::{AppCommand, AppReply};

pub struct ApiRequest {
    pub seq: u32,
    pub command: AppCommand,
}

pub struct ApiReply {
    pub seq: u32,
    pub reply: AppReply,
    pub health: SystemHealth,
}

const REQUEST_DEPTH: usize = 4;
const REPLY_DEPTH: usize = 4;

/// How long a handler waits for the control loop before answering 503.
pub const REPLY_TIMEOUT_MS: u32 = 5_000;
const REPLY_POLL_MS: u32 = 10;

pub type RequestChannel = Channel<CriticalSectionRawMutex, ApiRequest, REQUEST_DEPTH>;
pub type ReplyChannel = Channel<CriticalSectionRawMutex, ApiReply, REPLY_DEPTH>;

/// httpd task → control loop.
pub static REQUEST_CHANNEL: RequestChannel = Channel::new();

/// Control loop → httpd task.
pub static REPLY_CHANNEL: ReplyChannel = Channel::new();

/// One end-to-end path through a request and a reply channel.
pub struct Bridge<'a> {
    requests: &'a RequestChannel,
    replies: &'a ReplyChannel,
    next_seq: AtomicU32,
    /// Highest `seq` whose waiter has given up; 0 when none has.
    abandoned: AtomicU32,
}

static BRIDGE: Bridge<'static> = Bridge::new(&REQUEST_CHANNEL, &REPLY_CHANNEL);

/// The firmware's bridge over the static channels.
pub fn bridge() -> &'static Bridge<'static> {
    &BRIDGE
}

impl<'a> Bridge<'a> {
    pub const fn new(requests: &'a RequestChannel, replies: &'a ReplyChannel) -> Self {
        Self {
            requests,
            replies,
            next_seq: AtomicU32::new(1),
            abandoned: AtomicU32::new(0),
        }
    }

    /// Handler side: queue `command` and wait for its reply.
    ///
    /// `None` when the control loop's inbox is full or no matching reply
    /// arrived within [`REPLY_TIMEOUT_MS`].
    pub fn exchange(&self, command: AppCommand, delay: &mut impl DelayNs) -> Option<ApiReply> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        if self.requests.try_send(ApiRequest { seq, command }).is_err() {
            warn!("Bridge: request channel full, rejecting #{}", seq);
            return None;
        }

        let mut waited = 0;
        while waited < REPLY_TIMEOUT_MS {
            while let Ok(reply) = self.replies.try_receive() {
                if reply.seq == seq {
                    return Some(reply);
                }
                warn!("Bridge: dropping stale reply #{} (waiting for #{})", reply.seq, seq);
            }
            delay.delay_ms(REPLY_POLL_MS);
            waited += REPLY_POLL_MS;
        }
        warn!("Bridge: request #{} timed out", seq);
        self.abandoned.fetch_max(seq, Ordering::Release);
        None
    }

    /// Control-loop side: next pending request whose waiter is still
    /// listening, if any.
    pub fn next_request(&self) -> Option<ApiRequest> {
        while let Ok(request) = self.requests.try_receive() {
            if request.seq > self.abandoned.load(Ordering::Acquire) {
                return Some(request);
            }
            warn!("Bridge: skipping abandoned request #{}", request.seq);
        }
        None
    }

    /// Control-loop side: answer request `seq`.
    pub fn reply(&self, seq: u32, reply: AppReply, health: SystemHealth) {
        if self.replies.try_send(ApiReply { seq, reply, health }).is_err() {
            warn!("Bridge: reply channel full, dropping reply #{}", seq);
        }
    }
}
