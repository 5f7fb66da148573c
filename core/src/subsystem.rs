//! Subsystem trait for the per-tick pipeline.
//!
//! RULE: Every tick-driven component implements SimSubsystem.
//! The engine calls update() on each in the fixed order documented
//! in engine.rs. Player intents never go through update(); they are
//! applied synchronously by the engine.

use crate::{
    error::SimResult,
    event::SimEvent,
    ledger::PlayerStats,
    rng::RandomSource,
    types::{Tick, Timestamp},
};

/// Read-only view of the session handed to each subsystem per tick.
pub struct TickContext<'a> {
    pub tick:  Tick,
    pub now:   Timestamp,
    pub stats: &'a PlayerStats,
}

/// The contract every tick-driven component must fulfill.
pub trait SimSubsystem {
    /// Unique stable name for this subsystem.
    fn name(&self) -> &'static str;

    /// Called once per tick by the engine.
    ///
    /// - `ctx`:       tick number, simulated time, player stats
    /// - `events_in`: events emitted by earlier subsystems this tick
    /// - `rng`:       this subsystem's randomness stream
    ///
    /// Returns a vec of new events to add to the tick's event log.
    fn update(
        &mut self,
        ctx: &TickContext<'_>,
        events_in: &[SimEvent],
        rng: &mut dyn RandomSource,
    ) -> SimResult<Vec<SimEvent>>;
}
