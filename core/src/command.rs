use crate::{
    booking::AcceptedBooking,
    ledger::{DonationReceipt, PurchaseReceipt, UpgradeReceipt},
    scheduler::{CompletedService, Occupancy},
    types::{Money, ServiceId, SlotId},
};
use serde::{Deserialize, Serialize};

/// All player-issued intents.
/// Variants may be appended — never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum PlayerCommand {
    // ── Clock control ─────────────────────────────
    Pause,
    Resume,

    // ── Slots ─────────────────────────────────────
    AssignService {
        slot_id:    SlotId,
        service_id: ServiceId,
        /// Falls back to the configured walk-in name.
        #[serde(default)]
        guest_name: Option<String>,
    },
    CompleteService {
        slot_id: SlotId,
    },

    // ── Bookings ──────────────────────────────────
    AcceptBooking {
        booking_id: String,
    },
    RefreshBookings,

    // ── Economy ───────────────────────────────────
    Donate {
        amount: Money,
    },
    PurchaseInventory {
        resource: String,
    },
    UpgradeService {
        service_id: ServiceId,
    },
}

impl PlayerCommand {
    /// Stable snake_case name, matching the serde tag.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pause                  => "pause",
            Self::Resume                 => "resume",
            Self::AssignService { .. }   => "assign_service",
            Self::CompleteService { .. } => "complete_service",
            Self::AcceptBooking { .. }   => "accept_booking",
            Self::RefreshBookings        => "refresh_bookings",
            Self::Donate { .. }          => "donate",
            Self::PurchaseInventory { .. } => "purchase_inventory",
            Self::UpgradeService { .. }  => "upgrade_service",
        }
    }

    /// Clock control is accepted while paused; everything else is not.
    pub fn allowed_while_paused(&self) -> bool {
        matches!(self, Self::Pause | Self::Resume)
    }
}

/// What a successful intent committed.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Paused,
    Resumed,
    Assigned { slot_id: SlotId, occupancy: Occupancy },
    Completed(CompletedService),
    BookingAccepted(AcceptedBooking),
    BookingsRefreshed { count: usize },
    Donated(DonationReceipt),
    Purchased(PurchaseReceipt),
    Upgraded(UpgradeReceipt),
}
