//! Slot scheduler — a fixed row of service bays.
//!
//! Each slot is a two-state machine, Empty → Occupied → Empty. The
//! service, guest, start and end of an occupied slot live together in
//! one `Occupancy`, so they are present or absent as a unit.
//!
//! "Ready to collect" is not a stored state: it is `now >= end_ms`,
//! evaluated against the clock whenever asked. A ready slot stays
//! occupied until the player collects it.
//!
//! The tier is captured at assignment. Completion pays out that tier
//! even if the line was upgraded while the guest was on the tour.

use crate::{
    catalog::Catalog,
    error::{IntentError, SimResult},
    event::SimEvent,
    ledger::{CompletionReceipt, EconomyLedger},
    rng::RandomSource,
    subsystem::{SimSubsystem, TickContext},
    types::{ServiceId, SlotId, TierLevel, Timestamp},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Occupancy {
    pub service_id: ServiceId,
    pub tier:       TierLevel,
    pub guest_name: String,
    pub start_ms:   Timestamp,
    pub end_ms:     Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceSlot {
    pub id:    SlotId,
    occupancy: Option<Occupancy>,
    #[serde(skip)]
    ready_announced: bool,
}

impl ServiceSlot {
    fn empty(id: SlotId) -> Self {
        Self { id, occupancy: None, ready_announced: false }
    }

    pub fn is_empty(&self) -> bool {
        self.occupancy.is_none()
    }

    pub fn occupancy(&self) -> Option<&Occupancy> {
        self.occupancy.as_ref()
    }

    pub fn is_ready(&self, now: Timestamp) -> bool {
        self.occupancy.as_ref().is_some_and(|o| now >= o.end_ms)
    }

    pub fn remaining_ms(&self, now: Timestamp) -> Option<u64> {
        self.occupancy.as_ref().map(|o| o.end_ms.saturating_sub(now))
    }

    /// Elapsed share of the service in [0, 100]. Empty slots report 0.
    pub fn progress_pct(&self, now: Timestamp) -> f64 {
        let Some(o) = &self.occupancy else { return 0.0 };
        let span = o.end_ms.saturating_sub(o.start_ms);
        if span == 0 {
            return 100.0;
        }
        (now.saturating_sub(o.start_ms) as f64 * 100.0 / span as f64).min(100.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletedService {
    pub slot_id:   SlotId,
    pub occupancy: Occupancy,
    pub receipt:   CompletionReceipt,
}

pub struct SlotScheduler {
    slots: Vec<ServiceSlot>,
}

impl SlotScheduler {
    pub fn new(slot_count: usize) -> Self {
        Self {
            slots: (0..slot_count).map(ServiceSlot::empty).collect(),
        }
    }

    pub fn slots(&self) -> &[ServiceSlot] {
        &self.slots
    }

    pub fn slot(&self, slot_id: SlotId) -> Option<&ServiceSlot> {
        self.slots.get(slot_id)
    }

    /// Lowest-numbered empty slot, if any.
    pub fn first_empty(&self) -> Option<SlotId> {
        self.slots.iter().find(|s| s.is_empty()).map(|s| s.id)
    }

    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_empty()).count()
    }

    /// Start a service in an empty slot. Resources are debited through
    /// the ledger; on any failure neither the slot nor the ledger moves.
    pub fn assign(
        &mut self,
        slot_id: SlotId,
        service_id: &str,
        guest_name: &str,
        now: Timestamp,
        catalog: &Catalog,
        ledger: &mut EconomyLedger,
    ) -> Result<Occupancy, IntentError> {
        let slot = self
            .slots
            .get_mut(slot_id)
            .ok_or(IntentError::UnknownSlot(slot_id))?;
        if !slot.is_empty() {
            return Err(IntentError::SlotOccupied(slot_id));
        }

        let tier = ledger.tier_of(service_id);
        let service = catalog
            .get(service_id, tier)
            .ok_or_else(|| IntentError::UnknownService(service_id.to_string()))?;

        ledger.apply_service_cost(service)?;

        let occupancy = Occupancy {
            service_id: service_id.to_string(),
            tier,
            guest_name: guest_name.to_string(),
            start_ms:   now,
            end_ms:     now + service.duration_ms(),
        };
        slot.occupancy = Some(occupancy.clone());
        slot.ready_announced = false;
        Ok(occupancy)
    }

    /// Collect a finished service: pay out the snapshotted tier and
    /// free the slot.
    pub fn complete(
        &mut self,
        slot_id: SlotId,
        now: Timestamp,
        time_label: String,
        catalog: &Catalog,
        ledger: &mut EconomyLedger,
    ) -> Result<CompletedService, IntentError> {
        let slot = self
            .slots
            .get_mut(slot_id)
            .ok_or(IntentError::UnknownSlot(slot_id))?;
        let occupancy = slot.occupancy.clone().ok_or(IntentError::SlotEmpty(slot_id))?;

        if now < occupancy.end_ms {
            return Err(IntentError::NotReady {
                slot_id,
                remaining_ms: occupancy.end_ms - now,
            });
        }

        let service = catalog
            .get(&occupancy.service_id, occupancy.tier)
            .ok_or_else(|| IntentError::UnknownService(occupancy.service_id.clone()))?;

        let receipt = ledger.apply_service_completion(service, now, time_label);
        slot.occupancy = None;
        slot.ready_announced = false;

        Ok(CompletedService { slot_id, occupancy, receipt })
    }
}

impl SimSubsystem for SlotScheduler {
    fn name(&self) -> &'static str { "scheduler" }

    /// Announce each slot once, on the first tick at or after its end.
    fn update(
        &mut self,
        ctx: &TickContext<'_>,
        _events_in: &[SimEvent],
        _rng: &mut dyn RandomSource,
    ) -> SimResult<Vec<SimEvent>> {
        let mut out = Vec::new();
        for slot in &mut self.slots {
            if slot.ready_announced || !slot.is_ready(ctx.now) {
                continue;
            }
            slot.ready_announced = true;
            if let Some(o) = &slot.occupancy {
                log::debug!("tick={} scheduler: slot {} ready ({})", ctx.tick, slot.id, o.service_id);
                out.push(SimEvent::ServiceReady {
                    tick: ctx.tick,
                    slot_id: slot.id,
                    service_id: o.service_id.clone(),
                });
            }
        }
        Ok(out)
    }
}
