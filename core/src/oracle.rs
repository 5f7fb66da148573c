//! The advisory oracle boundary.
//!
//! The oracle is an external, unreliable collaborator that turns a
//! stats snapshot into either a structured shock event or a short piece
//! of mentor advice. The engine only ever talks to it through
//! `AdvisoryOracle`, and only through the gateway in advisory.rs.

use crate::{error::OracleError, ledger::PlayerStats};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
#[cfg(any(test, feature = "test-util"))]
use std::{collections::VecDeque, sync::Mutex, time::Duration};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventScope {
    Local,
    Community,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EconomicEvent {
    pub title:       String,
    pub description: String,
    pub impact:      String,
    /// Free-text economic concept ("Public Goods", "Negative Externality").
    pub concept:     String,
    pub scope:       EventScope,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEvent {
    title:       String,
    description: String,
    impact:      String,
    concept:     String,
    scope:       String,
}

impl EconomicEvent {
    /// Validate an oracle reply. Any missing, empty, or unknown field
    /// fails the whole reply; nothing is partially accepted.
    pub fn from_json(json: &str) -> Result<Self, OracleError> {
        let raw: RawEvent = serde_json::from_str(json.trim())
            .map_err(|e| OracleError::Malformed(e.to_string()))?;

        for (field, value) in [
            ("title", &raw.title),
            ("description", &raw.description),
            ("impact", &raw.impact),
            ("concept", &raw.concept),
        ] {
            if value.trim().is_empty() {
                return Err(OracleError::Malformed(format!("field '{field}' is empty")));
            }
        }

        let scope = match raw.scope.as_str() {
            "local" => EventScope::Local,
            "community" => EventScope::Community,
            other => {
                return Err(OracleError::Malformed(format!("unknown scope '{other}'")));
            }
        };

        Ok(Self {
            title: raw.title,
            description: raw.description,
            impact: raw.impact,
            concept: raw.concept,
            scope,
        })
    }

    /// Shock events whose concept mentions "negative" cost eco-score.
    pub fn is_negative(&self) -> bool {
        self.concept.to_lowercase().contains("negative")
    }
}

#[async_trait]
pub trait AdvisoryOracle: Send + Sync + 'static {
    /// Produce a disruption event for the village.
    async fn generate_shock(&self, stats: &PlayerStats) -> Result<EconomicEvent, OracleError>;

    /// Comment on an action the player just took.
    async fn advise(&self, action: &str, stats: &PlayerStats) -> Result<String, OracleError>;
}

/// Offline oracle with a fixed repertoire, cycling in order.
///
/// Used by the runner when no remote oracle is configured. Replies are
/// a pure function of call count and stats, so sessions replay.
pub struct VillageElderOracle {
    shocks_served: AtomicU64,
}

impl VillageElderOracle {
    pub fn new() -> Self {
        Self { shocks_served: AtomicU64::new(0) }
    }

    fn repertoire() -> &'static [(&'static str, &'static str, &'static str, &'static str, EventScope)] {
        &[
            (
                "Crowded Waterfall",
                "Three lodges sent guests to the same waterfall this week. The trail is eroding and nobody wants to pay for repairs.",
                "Trail maintenance costs rise for everyone.",
                "Tragedy of the Commons",
                EventScope::Community,
            ),
            (
                "Diesel Haze Over the Valley",
                "Old shuttles are idling at the airport road. Neighbours complain about the smoke drifting over the coffee farms.",
                "Village air quality drops.",
                "Negative Externality",
                EventScope::Community,
            ),
            (
                "Park Ranger Fund Drive",
                "The rangers protecting the cloud forest need new radios. Every business benefits, but who will chip in?",
                "Donations now protect tomorrow's tourism.",
                "Public Goods",
                EventScope::Community,
            ),
            (
                "The Quiet Neighbour",
                "One lodge owner enjoys the new park road but never donated a colon to build it.",
                "Trust in the cooperative weakens.",
                "Free-Rider Problem",
                EventScope::Local,
            ),
            (
                "Coffee Harvest Boom",
                "A great harvest means cheap beans and happy farm tours this month.",
                "Coffee tours are easier to run.",
                "Positive Supply Shock",
                EventScope::Local,
            ),
            (
                "Zipline Noise Complaints",
                "Howler monkeys have moved away from the canopy route. Birdwatchers are unhappy.",
                "Wildlife tourism suffers.",
                "Negative Externality of Production",
                EventScope::Local,
            ),
        ]
    }
}

impl Default for VillageElderOracle {
    fn default() -> Self { Self::new() }
}

#[async_trait]
impl AdvisoryOracle for VillageElderOracle {
    async fn generate_shock(&self, _stats: &PlayerStats) -> Result<EconomicEvent, OracleError> {
        let list = Self::repertoire();
        let n = self.shocks_served.fetch_add(1, Ordering::Relaxed) as usize;
        let (title, description, impact, concept, scope) = list[n % list.len()];
        Ok(EconomicEvent {
            title: title.into(),
            description: description.into(),
            impact: impact.into(),
            concept: concept.into(),
            scope,
        })
    }

    async fn advise(&self, action: &str, stats: &PlayerStats) -> Result<String, OracleError> {
        let advice = if stats.eco_score < 40 {
            format!("{action}? Careful, amigo. The forest is tired. When one lodge pollutes, the whole village pays. Somos un equipo.")
        } else if stats.total_donated == 0 && stats.money > 2_000 {
            format!("{action}. Good business! But the park helps everyone, even those who never pay. Don't be the free rider. The village depends on you.")
        } else if stats.reputation >= 80 {
            format!("{action}. Your name travels far now. Use it to lift the whole pueblo, not only your own porch.")
        } else {
            format!("{action}. Competition fills your purse, cooperation fills the village. Somos un equipo!")
        };
        Ok(advice)
    }
}

/// Oracle that replays queued replies, for tests.
///
/// An empty queue answers `Unavailable`. An optional delay is applied
/// before every reply.
#[cfg(any(test, feature = "test-util"))]
#[derive(Default)]
pub struct ScriptedOracle {
    shocks: Mutex<VecDeque<Result<EconomicEvent, OracleError>>>,
    advice: Mutex<VecDeque<Result<String, OracleError>>>,
    delay:  Option<Duration>,
}

#[cfg(any(test, feature = "test-util"))]
impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_shock(&self, reply: Result<EconomicEvent, OracleError>) {
        if let Ok(mut q) = self.shocks.lock() {
            q.push_back(reply);
        }
    }

    pub fn push_advice(&self, reply: Result<String, OracleError>) {
        if let Ok(mut q) = self.advice.lock() {
            q.push_back(reply);
        }
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
#[async_trait]
impl AdvisoryOracle for ScriptedOracle {
    async fn generate_shock(&self, _stats: &PlayerStats) -> Result<EconomicEvent, OracleError> {
        self.pause().await;
        let next = self.shocks.lock().ok().and_then(|mut q| q.pop_front());
        next.unwrap_or_else(|| Err(OracleError::Unavailable("no scripted shock".into())))
    }

    async fn advise(&self, _action: &str, _stats: &PlayerStats) -> Result<String, OracleError> {
        self.pause().await;
        let next = self.advice.lock().ok().and_then(|mut q| q.pop_front());
        next.unwrap_or_else(|| Err(OracleError::Unavailable("no scripted advice".into())))
    }
}
