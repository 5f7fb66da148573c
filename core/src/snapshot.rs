//! Read model handed to the presentation layer.
//!
//! A snapshot is a plain serializable copy of everything the player can
//! see at one instant. Derived values (slot progress, readiness,
//! donation affordability, leaderboard order) are computed here from
//! `now_ms` so the presentation layer never re-derives game rules.

use crate::{
    booking::BookingRequest,
    community::{CommunityStats, Peer},
    ledger::{HistorySample, PlayerStats},
    oracle::EconomicEvent,
    types::{Money, ServiceId, SessionId, SlotId, Tick, TierLevel, Timestamp},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotView {
    pub slot_id:      SlotId,
    pub service_id:   Option<ServiceId>,
    pub service_name: Option<String>,
    pub tier:         Option<TierLevel>,
    pub guest_name:   Option<String>,
    pub start_ms:     Option<Timestamp>,
    pub end_ms:       Option<Timestamp>,
    pub remaining_ms: Option<u64>,
    pub progress_pct: f64,
    pub ready:        bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DonationOption {
    pub amount:     Money,
    pub affordable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommunityView {
    pub stats:        CommunityStats,
    pub progress_pct: f64,
    /// Peers by score, highest first.
    pub leaderboard:  Vec<Peer>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSnapshot {
    pub session_id:    SessionId,
    pub tick:          Tick,
    pub now_ms:        Timestamp,
    pub paused:        bool,
    pub stats:         PlayerStats,
    pub community:     CommunityView,
    pub slots:         Vec<SlotView>,
    pub bookings:      Vec<BookingRequest>,
    pub history:       Vec<HistorySample>,
    pub advisory_text: String,
    pub current_event: Option<EconomicEvent>,
    pub donations:     Vec<DonationOption>,
}

impl CommunityView {
    pub fn new(stats: &CommunityStats) -> Self {
        Self {
            progress_pct: stats.progress_pct(),
            leaderboard:  stats.leaderboard().into_iter().cloned().collect(),
            stats:        stats.clone(),
        }
    }
}

/// Presets the player can afford right now are flagged; the rest stay
/// listed but disabled.
pub fn donation_options(presets: &[Money], money: Money) -> Vec<DonationOption> {
    presets
        .iter()
        .map(|&amount| DonationOption { amount, affordable: amount <= money })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_flag_affordability() {
        let opts = donation_options(&[50, 200, 500], 200);
        let flags: Vec<_> = opts.iter().map(|o| o.affordable).collect();
        assert_eq!(flags, vec![true, true, false]);
    }
}
