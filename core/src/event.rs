//! The session event log — every state change, in order.
//!
//! RULE: Every committed mutation of stats, slots, bookings or the
//! community emits exactly one event. Rejected intents emit
//! `IntentRejected` and mutate nothing.

use crate::{
    oracle::EventScope,
    types::{Money, SessionId, ServiceId, SlotId, Tick, TierLevel, Timestamp},
};
use serde::{Deserialize, Serialize};

/// Every event emitted during a session.
/// Variants may be appended — never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    // ── Engine events ──────────────────────────────
    TickStarted {
        tick: Tick,
    },
    TickCompleted {
        tick: Tick,
    },
    SessionInitialized {
        session_id: SessionId,
        seed: u64,
    },

    // ── Slot scheduler ─────────────────────────────
    ServiceAssigned {
        tick: Tick,
        slot_id: SlotId,
        service_id: ServiceId,
        tier: TierLevel,
        guest_name: String,
        start_ms: Timestamp,
        end_ms: Timestamp,
    },
    ServiceReady {
        tick: Tick,
        slot_id: SlotId,
        service_id: ServiceId,
    },
    ServiceCompleted {
        tick: Tick,
        slot_id: SlotId,
        service_id: ServiceId,
        tier: TierLevel,
        revenue: Money,
        eco_score: i32,
        reputation: i64,
    },

    // ── Bookings ───────────────────────────────────
    BookingsGenerated {
        tick: Tick,
        count: usize,
    },
    BookingAccepted {
        tick: Tick,
        booking_id: String,
        slot_id: SlotId,
        group_name: String,
    },

    // ── Ledger ─────────────────────────────────────
    DonationRecorded {
        tick: Tick,
        amount: Money,
        total_donated: Money,
        project_current: Money,
    },
    InventoryPurchased {
        tick: Tick,
        resource: String,
        quantity: u32,
        cost: Money,
    },
    ServiceUpgraded {
        tick: Tick,
        service_id: ServiceId,
        tier: TierLevel,
        cost: Money,
    },

    // ── Community ──────────────────────────────────
    CommunityDrifted {
        tick: Tick,
        funding_delta: Money,
        project_current: Money,
    },

    // ── Advisory gateway ───────────────────────────
    ShockRequested {
        tick: Tick,
        request_id: String,
    },
    AdviceRequested {
        tick: Tick,
        request_id: String,
        action: String,
    },
    ShockApplied {
        tick: Tick,
        request_id: String,
        title: String,
        concept: String,
        scope: EventScope,
        eco_penalty: i32,
    },
    AdviceReceived {
        tick: Tick,
        request_id: String,
    },
    OracleFailed {
        tick: Tick,
        request_id: String,
        error_kind: String,
        reason: String,
    },

    // ── Player intents ─────────────────────────────
    IntentRejected {
        tick: Tick,
        command: String,
        error_kind: String,
        message: String,
    },
}

impl SimEvent {
    /// Stable string name of the variant.
    /// Used for the event_type column in event_log.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::TickStarted { .. }        => "tick_started",
            Self::TickCompleted { .. }      => "tick_completed",
            Self::SessionInitialized { .. } => "session_initialized",
            Self::ServiceAssigned { .. }    => "service_assigned",
            Self::ServiceReady { .. }       => "service_ready",
            Self::ServiceCompleted { .. }   => "service_completed",
            Self::BookingsGenerated { .. }  => "bookings_generated",
            Self::BookingAccepted { .. }    => "booking_accepted",
            Self::DonationRecorded { .. }   => "donation_recorded",
            Self::InventoryPurchased { .. } => "inventory_purchased",
            Self::ServiceUpgraded { .. }    => "service_upgraded",
            Self::CommunityDrifted { .. }   => "community_drifted",
            Self::ShockRequested { .. }     => "shock_requested",
            Self::AdviceRequested { .. }    => "advice_requested",
            Self::ShockApplied { .. }       => "shock_applied",
            Self::AdviceReceived { .. }     => "advice_received",
            Self::OracleFailed { .. }       => "oracle_failed",
            Self::IntentRejected { .. }     => "intent_rejected",
        }
    }
}

/// The event log entry as stored in the session audit store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub session_id: SessionId,
    pub tick: Tick,
    pub subsystem: String,
    pub event_type: String,
    pub payload: String, // JSON-serialized SimEvent
}
