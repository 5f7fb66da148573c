//! The session engine — one game session, owned in one place.
//!
//! EXECUTION ORDER per tick (fixed, never reordered):
//!   0. Apply oracle replies that arrived since the last tick
//!   1. Slot scheduler  (readiness scan)
//!   2. Community       (probabilistic drift)
//!   3. Advisory        (periodic shock trigger)
//!
//! RULES:
//!   - All game state lives in this struct. Nothing is global.
//!   - Player intents run synchronously through `submit()`, between ticks.
//!   - A rejected intent mutates nothing except the advisory text.
//!   - All randomness flows through the RngBank.
//!   - All state changes are recorded in the event log.

use crate::{
    advisory::{AdvisoryGateway, AppliedReply, OracleReply},
    booking::{BookingBoard, BookingRequest},
    clock::SimClock,
    command::{CommandOutcome, PlayerCommand},
    community::{CommunitySimulator, CommunityStats},
    config::SessionConfig,
    error::{IntentError, SimResult},
    event::{EventLogEntry, SimEvent},
    ledger::{EconomyLedger, HistorySample, PlayerStats},
    oracle::{AdvisoryOracle, EconomicEvent, VillageElderOracle},
    rng::{next_uuid, RandomSource, RngBank, SubsystemSlot},
    scheduler::{Occupancy, SlotScheduler},
    snapshot::{donation_options, CommunityView, SessionSnapshot, SlotView},
    store::{JournalCategory, SimStore},
    subsystem::{SimSubsystem, TickContext},
    types::{Money, SessionId, SlotId, Tick},
};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;

pub struct SessionEngine {
    pub session_id: SessionId,
    pub clock:      SimClock,
    pub rng_bank:   RngBank,
    seed:           u64,
    config:         SessionConfig,
    ledger:         EconomyLedger,
    scheduler:      SlotScheduler,
    bookings:       BookingBoard,
    community:      CommunitySimulator,
    advisory:       AdvisoryGateway,
    store:          SimStore,
}

impl SessionEngine {
    /// Build a fully wired session. The clock starts running.
    pub fn build(
        session_id: SessionId,
        seed: u64,
        config: SessionConfig,
        oracle: Arc<dyn AdvisoryOracle>,
        started_at: DateTime<Utc>,
    ) -> SimResult<Self> {
        config.validate()?;

        let store = SimStore::in_memory()?;
        store.migrate()?;
        store.insert_session(&session_id, seed, env!("CARGO_PKG_VERSION"), &started_at.to_rfc3339())?;

        let mut clock = SimClock::new(session_id.clone(), config.tick_interval_ms, started_at);
        clock.resume();

        let mut engine = Self {
            ledger:     EconomyLedger::new(config.ledger.clone(), &config.player),
            scheduler:  SlotScheduler::new(config.scheduler.slot_count),
            bookings:   BookingBoard::new(config.booking.clone()),
            community:  CommunitySimulator::new(config.community.clone()),
            advisory:   AdvisoryGateway::new(config.advisory.clone(), oracle),
            rng_bank:   RngBank::new(seed),
            session_id,
            clock,
            seed,
            config,
            store,
        };

        let init = SimEvent::SessionInitialized {
            session_id: engine.session_id.clone(),
            seed,
        };
        engine.append(0, "engine", &init)?;

        let count = engine.regenerate_bookings();
        engine.append(0, "booking", &SimEvent::BookingsGenerated { tick: 0, count })?;

        log::info!(
            "tick=0 engine: session {} started (seed {seed}, {} slots)",
            engine.session_id,
            engine.config.scheduler.slot_count
        );
        Ok(engine)
    }

    /// Standard balance, offline oracle, fixed start time. For tests.
    pub fn build_test(session_id: SessionId, seed: u64) -> SimResult<Self> {
        Self::build_test_with(session_id, seed, SessionConfig::standard(), Arc::new(VillageElderOracle::new()))
    }

    pub fn build_test_with(
        session_id: SessionId,
        seed: u64,
        config: SessionConfig,
        oracle: Arc<dyn AdvisoryOracle>,
    ) -> SimResult<Self> {
        let started_at = Utc
            .with_ymd_and_hms(2024, 3, 1, 8, 0, 0)
            .single()
            .ok_or_else(|| anyhow::anyhow!("invalid test start time"))?;
        Self::build(session_id, seed, config, oracle, started_at)
    }

    // ── Tick pipeline ──────────────────────────────────────────

    /// Advance one tick. A paused session does not advance and
    /// returns no events.
    pub fn tick(&mut self) -> SimResult<Vec<SimEvent>> {
        if self.clock.paused {
            return Ok(vec![]);
        }

        let tick = self.clock.advance();
        let now = self.clock.now_ms;
        let mut tick_events = vec![SimEvent::TickStarted { tick }];

        // 0. Oracle replies, in arrival order.
        for reply in self.advisory.try_drain() {
            tick_events.push(self.apply_reply(reply)?);
        }

        let ctx = TickContext { tick, now, stats: self.ledger.stats() };
        let store = &self.store;
        let session_id = self.session_id.as_str();

        // 1–3. Subsystems, each on its own RNG stream.
        run_stage(
            store,
            session_id,
            &mut self.scheduler,
            &ctx,
            &mut tick_events,
            self.rng_bank.for_subsystem(SubsystemSlot::Scheduler),
        )?;
        run_stage(
            store,
            session_id,
            &mut self.community,
            &ctx,
            &mut tick_events,
            self.rng_bank.for_subsystem(SubsystemSlot::Community),
        )?;
        run_stage(
            store,
            session_id,
            &mut self.advisory,
            &ctx,
            &mut tick_events,
            self.rng_bank.for_subsystem(SubsystemSlot::Advisory),
        )?;

        tick_events.push(SimEvent::TickCompleted { tick });
        Ok(tick_events)
    }

    /// Run n ticks in a loop. Used for testing and fast-forward.
    pub fn run_ticks(&mut self, n: u64) -> SimResult<()> {
        for _ in 0..n {
            self.tick()?;
        }
        Ok(())
    }

    /// Wait for every in-flight oracle call and apply its reply.
    pub async fn flush_advisories(&mut self) -> SimResult<Vec<SimEvent>> {
        let mut applied = Vec::new();
        while let Some(reply) = self.advisory.next_reply().await {
            applied.push(self.apply_reply(reply)?);
        }
        Ok(applied)
    }

    fn apply_reply(&mut self, reply: OracleReply) -> SimResult<SimEvent> {
        let tick = self.clock.current_tick;
        let event = match self.advisory.apply(reply) {
            AppliedReply::Shock { request_id, event, eco_penalty } => {
                if eco_penalty > 0 {
                    let score = self.ledger.apply_eco_penalty(eco_penalty);
                    log::info!(
                        "tick={tick} advisory: '{}' ({}) costs {eco_penalty} eco, now {score}",
                        event.title,
                        event.concept
                    );
                }
                SimEvent::ShockApplied {
                    tick,
                    request_id,
                    title: event.title,
                    concept: event.concept,
                    scope: event.scope,
                    eco_penalty,
                }
            }
            AppliedReply::Advice { request_id } => SimEvent::AdviceReceived { tick, request_id },
            AppliedReply::Failed { request_id, error } => {
                log::warn!("tick={tick} advisory: request {request_id} failed: {error}");
                SimEvent::OracleFailed {
                    tick,
                    request_id,
                    error_kind: error.kind().to_string(),
                    reason: error.to_string(),
                }
            }
        };
        self.append(tick, "advisory", &event)?;
        Ok(event)
    }

    // ── Player intents ─────────────────────────────────────────

    /// Apply one player intent. On rejection nothing but the advisory
    /// text changes, and an `IntentRejected` event is logged.
    pub fn submit(&mut self, command: PlayerCommand) -> Result<CommandOutcome, IntentError> {
        let result = if self.clock.paused && !command.allowed_while_paused() {
            Err(IntentError::Paused)
        } else {
            self.execute(&command)
        };

        result.or_else(|err| {
            let tick = self.clock.current_tick;
            log::info!("tick={tick} engine: {} rejected: {err}", command.name());
            self.advisory.set_advisory(rejection_message(&err));
            self.record("engine", &SimEvent::IntentRejected {
                tick,
                command: command.name().to_string(),
                error_kind: err.kind().to_string(),
                message: err.to_string(),
            });
            Err(err)
        })
    }

    fn execute(&mut self, command: &PlayerCommand) -> Result<CommandOutcome, IntentError> {
        let tick = self.clock.current_tick;
        let now = self.clock.now_ms;

        match command {
            PlayerCommand::Pause => {
                self.clock.pause();
                log::info!("tick={tick} engine: paused");
                Ok(CommandOutcome::Paused)
            }
            PlayerCommand::Resume => {
                self.clock.resume();
                log::info!("tick={tick} engine: resumed");
                Ok(CommandOutcome::Resumed)
            }

            PlayerCommand::AssignService { slot_id, service_id, guest_name } => {
                let guest = guest_name
                    .clone()
                    .unwrap_or_else(|| self.config.scheduler.default_guest_name.clone());
                let occupancy = self.scheduler.assign(
                    *slot_id,
                    service_id,
                    &guest,
                    now,
                    &self.config.catalog,
                    &mut self.ledger,
                )?;
                self.after_assignment(*slot_id, &occupancy);
                Ok(CommandOutcome::Assigned { slot_id: *slot_id, occupancy })
            }

            PlayerCommand::CompleteService { slot_id } => {
                let label = self.clock.time_label(now);
                let done = self.scheduler.complete(
                    *slot_id,
                    now,
                    label,
                    &self.config.catalog,
                    &mut self.ledger,
                )?;
                self.record("scheduler", &SimEvent::ServiceCompleted {
                    tick,
                    slot_id: done.slot_id,
                    service_id: done.occupancy.service_id.clone(),
                    tier: done.occupancy.tier,
                    revenue: done.receipt.revenue,
                    eco_score: done.receipt.eco_score,
                    reputation: done.receipt.reputation,
                });
                self.journal(
                    JournalCategory::ServiceRevenue,
                    &done.occupancy.service_id,
                    done.receipt.revenue,
                    done.receipt.money_after,
                );
                log::debug!(
                    "tick={tick} scheduler: slot {} paid {} for {}",
                    done.slot_id,
                    done.receipt.revenue,
                    done.occupancy.service_id
                );
                Ok(CommandOutcome::Completed(done))
            }

            PlayerCommand::AcceptBooking { booking_id } => {
                let accepted = self.bookings.accept(
                    booking_id,
                    &mut self.scheduler,
                    &self.config.catalog,
                    &mut self.ledger,
                    now,
                )?;
                self.record("booking", &SimEvent::BookingAccepted {
                    tick,
                    booking_id: accepted.request.id.clone(),
                    slot_id: accepted.slot_id,
                    group_name: accepted.request.group_name.clone(),
                });
                self.after_assignment(accepted.slot_id, &accepted.occupancy);
                Ok(CommandOutcome::BookingAccepted(accepted))
            }

            PlayerCommand::RefreshBookings => {
                let count = self.regenerate_bookings();
                self.record("booking", &SimEvent::BookingsGenerated { tick, count });
                Ok(CommandOutcome::BookingsRefreshed { count })
            }

            PlayerCommand::Donate { amount } => {
                let receipt = self.ledger.donate(*amount, &mut self.community.stats)?;
                self.advisory.set_advisory(format!(
                    "¡Excelente! Donating {amount} to the National Park fund. You're a true Pura Vida leader!"
                ));
                self.record("ledger", &SimEvent::DonationRecorded {
                    tick,
                    amount: receipt.amount,
                    total_donated: receipt.total_donated,
                    project_current: receipt.project_current,
                });
                self.journal(JournalCategory::Donation, "national_park", -receipt.amount, receipt.money_after);
                Ok(CommandOutcome::Donated(receipt))
            }

            PlayerCommand::PurchaseInventory { resource } => {
                let receipt = self.ledger.purchase_inventory(&self.config.catalog, resource)?;
                self.record("ledger", &SimEvent::InventoryPurchased {
                    tick,
                    resource: receipt.resource.clone(),
                    quantity: receipt.quantity,
                    cost: receipt.cost,
                });
                self.journal(JournalCategory::InventoryPurchase, &receipt.resource, -receipt.cost, receipt.money_after);
                Ok(CommandOutcome::Purchased(receipt))
            }

            PlayerCommand::UpgradeService { service_id } => {
                let receipt = self.ledger.upgrade_service(&self.config.catalog, service_id)?;
                self.record("ledger", &SimEvent::ServiceUpgraded {
                    tick,
                    service_id: receipt.service_id.clone(),
                    tier: receipt.tier,
                    cost: receipt.cost,
                });
                self.journal(JournalCategory::Upgrade, &receipt.service_id, -receipt.cost, receipt.money_after);
                Ok(CommandOutcome::Upgraded(receipt))
            }
        }
    }

    /// Log the assignment and ask the oracle for flavour text. The
    /// assignment is already committed; the reply only touches the
    /// advisory text.
    fn after_assignment(&mut self, slot_id: SlotId, occupancy: &Occupancy) {
        let tick = self.clock.current_tick;
        self.record("scheduler", &SimEvent::ServiceAssigned {
            tick,
            slot_id,
            service_id: occupancy.service_id.clone(),
            tier: occupancy.tier,
            guest_name: occupancy.guest_name.clone(),
            start_ms: occupancy.start_ms,
            end_ms: occupancy.end_ms,
        });

        let name = self
            .config
            .catalog
            .get(&occupancy.service_id, occupancy.tier)
            .map(|d| d.name.as_str())
            .unwrap_or(occupancy.service_id.as_str());
        let action = format!("Started {name} (Tier {}) for {}", occupancy.tier, occupancy.guest_name);

        let request_id = next_uuid(self.rng_bank.for_subsystem(SubsystemSlot::Ids)).to_string();
        self.advisory.request_advice(request_id.clone(), action.clone(), self.ledger.stats());
        self.record("advisory", &SimEvent::AdviceRequested { tick, request_id, action });
    }

    fn regenerate_bookings(&mut self) -> usize {
        self.bookings
            .regenerate(
                &self.config.catalog,
                self.ledger.stats(),
                self.rng_bank.for_subsystem(SubsystemSlot::Booking),
            )
            .len()
    }

    // ── Audit trail ────────────────────────────────────────────

    fn append(&self, tick: Tick, subsystem: &str, event: &SimEvent) -> SimResult<()> {
        append_event(&self.store, &self.session_id, tick, subsystem, event)
    }

    /// Intent-path logging. The intent is already committed when this
    /// runs, so a failed audit write is reported but cannot undo it.
    fn record(&self, subsystem: &str, event: &SimEvent) {
        let tick = self.clock.current_tick;
        if let Err(e) = self.append(tick, subsystem, event) {
            log::error!("tick={tick} engine: failed to log {}: {e}", event.type_name());
        }
    }

    fn journal(&self, category: JournalCategory, reference: &str, amount: Money, balance: Money) {
        let tick = self.clock.current_tick;
        if let Err(e) = self
            .store
            .record_money(&self.session_id, tick, category, reference, amount, balance)
        {
            log::error!("tick={tick} engine: failed to journal {}: {e}", category.as_str());
        }
    }

    // ── Read access ────────────────────────────────────────────

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn stats(&self) -> &PlayerStats {
        self.ledger.stats()
    }

    pub fn ledger(&self) -> &EconomyLedger {
        &self.ledger
    }

    pub fn history(&self) -> Vec<HistorySample> {
        self.ledger.history().cloned().collect()
    }

    pub fn community(&self) -> &CommunityStats {
        &self.community.stats
    }

    pub fn scheduler(&self) -> &SlotScheduler {
        &self.scheduler
    }

    pub fn bookings(&self) -> &[BookingRequest] {
        self.bookings.pending()
    }

    pub fn advisory_text(&self) -> &str {
        self.advisory.advisory_text()
    }

    pub fn current_event(&self) -> Option<&EconomicEvent> {
        self.advisory.current_event()
    }

    pub fn advisory(&self) -> &AdvisoryGateway {
        &self.advisory
    }

    /// Everything the presentation layer may read, as of now.
    pub fn snapshot(&self) -> SessionSnapshot {
        let now = self.clock.now_ms;
        let catalog = &self.config.catalog;

        let slots = self
            .scheduler
            .slots()
            .iter()
            .map(|slot| {
                let occ = slot.occupancy();
                SlotView {
                    slot_id:      slot.id,
                    service_id:   occ.map(|o| o.service_id.clone()),
                    service_name: occ
                        .and_then(|o| catalog.get(&o.service_id, o.tier))
                        .map(|d| d.name.clone()),
                    tier:         occ.map(|o| o.tier),
                    guest_name:   occ.map(|o| o.guest_name.clone()),
                    start_ms:     occ.map(|o| o.start_ms),
                    end_ms:       occ.map(|o| o.end_ms),
                    remaining_ms: slot.remaining_ms(now),
                    progress_pct: slot.progress_pct(now),
                    ready:        slot.is_ready(now),
                }
            })
            .collect();

        SessionSnapshot {
            session_id:    self.session_id.clone(),
            tick:          self.clock.current_tick,
            now_ms:        now,
            paused:        self.clock.paused,
            stats:         self.ledger.stats().clone(),
            community:     CommunityView::new(&self.community.stats),
            slots,
            bookings:      self.bookings.pending().to_vec(),
            history:       self.history(),
            advisory_text: self.advisory.advisory_text().to_string(),
            current_event: self.advisory.current_event().cloned(),
            donations:     donation_options(
                &self.community.config().donation_presets,
                self.ledger.stats().money,
            ),
        }
    }

    // ── Store queries ──────────────────────────────────────────

    /// Events logged at one tick, in order.
    /// Used by the determinism test and replay tooling.
    pub fn store_events_for_tick(&self, tick: Tick) -> SimResult<Vec<EventLogEntry>> {
        self.store.events_for_tick(&self.session_id, tick)
    }

    pub fn store_all_events(&self) -> SimResult<Vec<EventLogEntry>> {
        self.store.all_events(&self.session_id)
    }

    pub fn store_event_count(&self, event_type: &str) -> SimResult<i64> {
        self.store.event_count_by_type(&self.session_id, event_type)
    }

    pub fn store_journal_total(&self, category: JournalCategory) -> SimResult<Money> {
        self.store.journal_total(&self.session_id, category)
    }
}

/// Player-facing advisory line for a rejected intent.
fn rejection_message(err: &IntentError) -> String {
    match err {
        IntentError::InsufficientResource { resource, .. } => {
            format!("¡Ay caramba! We're out of {resource}. Ask a classmate for a gift or restock!")
        }
        IntentError::NoCapacity => "¡Qué pena! No more room. We need more capacity!".to_string(),
        IntentError::InsufficientFunds { required, available } => format!(
            "¡Uy! That costs {required} colones and the till only holds {available}. Finish a tour first."
        ),
        IntentError::NotReady { remaining_ms, .. } => format!(
            "Paciencia, amigo. Those guests need {} more seconds.",
            remaining_ms.div_ceil(1000)
        ),
        IntentError::MaxTierReached { .. } => {
            "That service is already the best in the valley!".to_string()
        }
        IntentError::Paused => "The village is resting. Resume the day first.".to_string(),
        other => format!("Hmm, that didn't work: {other}."),
    }
}

fn append_event(
    store: &SimStore,
    session_id: &str,
    tick: Tick,
    subsystem: &str,
    event: &SimEvent,
) -> SimResult<()> {
    let entry = EventLogEntry {
        id:         None,
        session_id: session_id.to_string(),
        tick,
        subsystem:  subsystem.to_string(),
        event_type: event.type_name().to_string(),
        payload:    serde_json::to_string(event)?,
    };
    store.append_event(&entry)
}

/// Run one subsystem and log what it emitted. Each subsystem sees every
/// event emitted so far this tick.
fn run_stage(
    store: &SimStore,
    session_id: &str,
    subsystem: &mut dyn SimSubsystem,
    ctx: &TickContext<'_>,
    tick_events: &mut Vec<SimEvent>,
    rng: &mut dyn RandomSource,
) -> SimResult<()> {
    let new_events = subsystem.update(ctx, tick_events, rng)?;
    for event in &new_events {
        append_event(store, session_id, ctx.tick, subsystem.name(), event)?;
    }
    tick_events.extend(new_events);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_starts_running_with_a_booking_batch() {
        let engine = SessionEngine::build_test("t".into(), 1).unwrap();
        assert!(!engine.clock.paused);
        assert_eq!(engine.bookings().len(), 4);
        assert_eq!(engine.store_event_count("session_initialized").unwrap(), 1);
        assert_eq!(engine.advisory_text(), engine.config().advisory.greeting);
    }

    #[test]
    fn paused_session_rejects_intents_and_does_not_tick() {
        let mut engine = SessionEngine::build_test("t".into(), 1).unwrap();
        engine.submit(PlayerCommand::Pause).unwrap();

        assert!(engine.tick().unwrap().is_empty());
        assert_eq!(engine.clock.current_tick, 0);
        assert_eq!(
            engine.submit(PlayerCommand::Donate { amount: 50 }),
            Err(IntentError::Paused)
        );
        assert_eq!(engine.stats().money, 1500);

        engine.submit(PlayerCommand::Resume).unwrap();
        engine.tick().unwrap();
        assert_eq!(engine.clock.current_tick, 1);
    }

    #[test]
    fn rejection_sets_mentor_text() {
        let mut engine = SessionEngine::build_test("t".into(), 1).unwrap();
        // five permits, one per lodge stay
        for slot in 0..5 {
            engine
                .submit(PlayerCommand::AssignService {
                    slot_id: slot,
                    service_id: "lodge".into(),
                    guest_name: None,
                })
                .unwrap();
        }
        let err = engine
            .submit(PlayerCommand::AssignService { slot_id: 5, service_id: "lodge".into(), guest_name: None })
            .unwrap_err();
        assert_eq!(err.kind(), "insufficient_resource");
        assert_eq!(
            engine.advisory_text(),
            "¡Ay caramba! We're out of permit. Ask a classmate for a gift or restock!"
        );
        assert_eq!(engine.store_event_count("intent_rejected").unwrap(), 1);
    }
}
