//! Booking generator — batches of guest requests the player can accept
//! into a free slot.
//!
//! A batch replaces whatever was pending before it. Requests have no
//! individual expiry. Accepting a request assigns its service to the
//! lowest empty slot; the request leaves the board only if that
//! assignment succeeds.

use crate::{
    catalog::Catalog,
    config::BookingConfig,
    error::IntentError,
    ledger::{EconomyLedger, PlayerStats},
    name_generator::NameGenerator,
    rng::{next_uuid, RandomSource},
    scheduler::{Occupancy, SlotScheduler},
    types::{Money, ServiceId, SlotId, TierLevel, Timestamp},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingRequest {
    pub id:          String,
    pub group_name:  String,
    pub service_id:  ServiceId,
    /// Tier the price was quoted at.
    pub quoted_tier: TierLevel,
    /// Party size. Informational.
    pub quantity:    u32,
    /// Offered total, base price plus markup. Informational; completion
    /// pays the catalog base price.
    pub offered_pay: Money,
    /// Informational; does not affect payout or ordering.
    pub urgency:     Urgency,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedBooking {
    pub request:   BookingRequest,
    pub slot_id:   SlotId,
    pub occupancy: Occupancy,
}

pub struct BookingGenerator {
    config: BookingConfig,
}

impl BookingGenerator {
    pub fn new(config: BookingConfig) -> Self {
        Self { config }
    }

    /// Produce one batch. Per request the draw order is: service,
    /// party size, markup, urgency, group name, id.
    pub fn generate(
        &self,
        catalog: &Catalog,
        stats: &PlayerStats,
        rng: &mut dyn RandomSource,
    ) -> Vec<BookingRequest> {
        let service_ids = catalog.service_ids();
        if service_ids.is_empty() {
            return Vec::new();
        }

        let mut out = Vec::with_capacity(self.config.batch_size);
        for i in 0..self.config.batch_size {
            let service_id = service_ids[rng.next_u64_below(service_ids.len() as u64) as usize];
            let tier = stats.tier_of(service_id);
            let quantity = 1 + rng.floor_scaled(self.config.max_guests.max(1) as u64) as u32;
            let markup = rng.next_f64() * self.config.max_markup;
            let urgency = if rng.next_f64() > 0.5 { Urgency::High } else { Urgency::Low };
            let group_name = NameGenerator::generate_group_name(rng);
            let id = format!("b-{i}-{}", next_uuid(rng));

            let base_price = catalog.get(service_id, tier).map(|d| d.base_price).unwrap_or(0);
            let offered_pay = (base_price as f64 * (1.0 + markup)).round() as Money;

            out.push(BookingRequest {
                id,
                group_name,
                service_id: service_id.to_string(),
                quoted_tier: tier,
                quantity,
                offered_pay,
                urgency,
            });
        }
        out
    }
}

pub struct BookingBoard {
    generator: BookingGenerator,
    pending:   Vec<BookingRequest>,
}

impl BookingBoard {
    pub fn new(config: BookingConfig) -> Self {
        Self {
            generator: BookingGenerator::new(config),
            pending:   Vec::new(),
        }
    }

    pub fn pending(&self) -> &[BookingRequest] {
        &self.pending
    }

    pub fn get(&self, booking_id: &str) -> Option<&BookingRequest> {
        self.pending.iter().find(|b| b.id == booking_id)
    }

    /// Discard every pending request and draw a fresh batch.
    pub fn regenerate(
        &mut self,
        catalog: &Catalog,
        stats: &PlayerStats,
        rng: &mut dyn RandomSource,
    ) -> &[BookingRequest] {
        self.pending = self.generator.generate(catalog, stats, rng);
        &self.pending
    }

    /// Seat a pending request in the first empty slot.
    pub fn accept(
        &mut self,
        booking_id: &str,
        scheduler: &mut SlotScheduler,
        catalog: &Catalog,
        ledger: &mut EconomyLedger,
        now: Timestamp,
    ) -> Result<AcceptedBooking, IntentError> {
        let idx = self
            .pending
            .iter()
            .position(|b| b.id == booking_id)
            .ok_or_else(|| IntentError::UnknownBooking(booking_id.to_string()))?;
        let slot_id = scheduler.first_empty().ok_or(IntentError::NoCapacity)?;

        let request = &self.pending[idx];
        let occupancy = scheduler.assign(
            slot_id,
            &request.service_id,
            &request.group_name,
            now,
            catalog,
            ledger,
        )?;

        let request = self.pending.remove(idx);
        Ok(AcceptedBooking { request, slot_id, occupancy })
    }
}
