//! Community simulator — the shared National Park fund and the cohort
//! of simulated peers.
//!
//! The drift is a player-independent background process: on each tick
//! it fires with a small fixed probability, nudges the fund, and nudges
//! every peer's score (and, less often, their contribution). It never
//! reads the player's stats. Donations are the only player-driven input
//! and arrive through `EconomyLedger::donate`.

use crate::{
    config::CommunityConfig,
    error::SimResult,
    event::SimEvent,
    rng::RandomSource,
    subsystem::{SimSubsystem, TickContext},
    types::{EntityId, Money},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Peer {
    pub id:           EntityId,
    pub name:         String,
    pub avatar:       String,
    pub score:        i64,
    pub eco_score:    i32,
    pub contribution: Money,
}

impl Peer {
    pub fn new(
        id: &str,
        name: &str,
        avatar: &str,
        score: i64,
        eco_score: i32,
        contribution: Money,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            avatar: avatar.into(),
            score,
            eco_score,
            contribution,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommunityStats {
    pub project_goal:      Money,
    pub project_current:   Money,
    /// Displayed only; no operation reads or writes it after setup.
    pub global_eco_status: i32,
    pub peers:             Vec<Peer>,
}

impl CommunityStats {
    /// Player donations land here directly, outside the random drift.
    pub fn record_donation(&mut self, amount: Money) {
        self.project_current += amount;
    }

    /// Funding progress as a percentage. Can exceed 100 once the goal
    /// is passed.
    pub fn progress_pct(&self) -> f64 {
        if self.project_goal <= 0 {
            return 0.0;
        }
        self.project_current as f64 * 100.0 / self.project_goal as f64
    }

    /// Peers ordered by score, highest first. Ties keep roster order.
    pub fn leaderboard(&self) -> Vec<&Peer> {
        let mut ranked: Vec<&Peer> = self.peers.iter().collect();
        ranked.sort_by(|a, b| b.score.cmp(&a.score));
        ranked
    }
}

pub struct CommunitySimulator {
    config: CommunityConfig,
    pub stats: CommunityStats,
}

impl CommunitySimulator {
    pub fn new(config: CommunityConfig) -> Self {
        let stats = CommunityStats {
            project_goal:      config.project_goal,
            project_current:   config.project_current,
            global_eco_status: config.global_eco_status,
            peers:             config.peers.clone(),
        };
        Self { config, stats }
    }

    pub fn config(&self) -> &CommunityConfig {
        &self.config
    }

    /// One drift roll. Returns the funding increment if the drift fired.
    ///
    /// Draw order is fixed: gate roll, fund increment, then per peer a
    /// score increment followed by a contribution roll.
    pub fn drift(&mut self, rng: &mut dyn RandomSource) -> Option<Money> {
        if !rng.chance(self.config.drift_probability) {
            return None;
        }

        let funding_delta = rng.floor_scaled(self.config.funding_drift_max) as Money;
        self.stats.project_current += funding_delta;

        for peer in &mut self.stats.peers {
            peer.score += rng.floor_scaled(self.config.peer_score_drift_max) as i64;
            if rng.chance(self.config.contribution_probability) {
                peer.contribution += self.config.contribution_step;
            }
        }
        Some(funding_delta)
    }
}

impl SimSubsystem for CommunitySimulator {
    fn name(&self) -> &'static str { "community" }

    fn update(
        &mut self,
        ctx: &TickContext<'_>,
        _events_in: &[SimEvent],
        rng: &mut dyn RandomSource,
    ) -> SimResult<Vec<SimEvent>> {
        let Some(funding_delta) = self.drift(rng) else {
            return Ok(vec![]);
        };

        log::debug!(
            "tick={} community: drift +{funding_delta}, fund {}/{}",
            ctx.tick,
            self.stats.project_current,
            self.stats.project_goal
        );

        Ok(vec![SimEvent::CommunityDrifted {
            tick: ctx.tick,
            funding_delta,
            project_current: self.stats.project_current,
        }])
    }
}
