//! Session configuration: every tunable constant of the village economy.
//!
//! `SessionConfig::standard()` is the reference balance. The runner can
//! load the same shape from `data/session.json` + `data/catalog.json`.

use crate::{
    catalog::Catalog,
    community::Peer,
    types::{Money, TierLevel},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerConfig {
    pub money:      Money,
    pub eco_score:  i32,
    pub reputation: i64,
    pub inventory:  BTreeMap<String, u32>,
    pub upgrades:   BTreeMap<String, TierLevel>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerConfig {
    /// Reputation added per completed service.
    pub reputation_gain:    i64,
    /// Upper clamp for reputation. Lower clamp is always 0.
    pub reputation_ceiling: i64,
    /// History samples retained (oldest evicted first).
    pub history_cap:        usize,
    pub purchase_unit_cost: Money,
    pub purchase_quantity:  u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchedulerConfig {
    pub slot_count:         usize,
    pub default_guest_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingConfig {
    pub batch_size: usize,
    /// Upper bound of the uniform markup over base price (0.5 = +50%).
    pub max_markup: f64,
    /// Party size is drawn from `1..=max_guests`.
    pub max_guests: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommunityConfig {
    pub project_goal:             Money,
    pub project_current:          Money,
    pub global_eco_status:        i32,
    /// Chance per tick that the cohort drifts at all.
    pub drift_probability:        f64,
    /// Funding increment is drawn from `[0, funding_drift_max)`.
    pub funding_drift_max:        u64,
    /// Peer score increment is drawn from `[0, peer_score_drift_max)`.
    pub peer_score_drift_max:     u64,
    pub contribution_probability: f64,
    pub contribution_step:        Money,
    pub donation_presets:         Vec<Money>,
    pub peers:                    Vec<Peer>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdvisoryConfig {
    pub shock_interval_ms: u64,
    pub shock_eco_penalty: i32,
    /// Oracle calls slower than this resolve as unavailable.
    pub oracle_timeout_ms: u64,
    pub greeting:          String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    pub tick_interval_ms: u64,
    pub player:           PlayerConfig,
    pub ledger:           LedgerConfig,
    pub scheduler:        SchedulerConfig,
    pub booking:          BookingConfig,
    pub community:        CommunityConfig,
    pub advisory:         AdvisoryConfig,
    #[serde(skip, default = "Catalog::standard")]
    pub catalog:          Catalog,
}

impl SessionConfig {
    /// Load from the data/ directory.
    /// In tests, use SessionConfig::standard().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let session_path = format!("{data_dir}/session.json");
        let session_content = std::fs::read_to_string(&session_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {session_path}: {e}"))?;
        let mut config: SessionConfig = serde_json::from_str(&session_content)?;

        let catalog_path = format!("{data_dir}/catalog.json");
        let catalog_content = std::fs::read_to_string(&catalog_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {catalog_path}: {e}"))?;
        config.catalog = Catalog::from_json(&catalog_content)?;

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot honour.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.tick_interval_ms == 0 {
            anyhow::bail!("tick_interval_ms must be > 0");
        }
        if self.scheduler.slot_count == 0 {
            anyhow::bail!("slot_count must be > 0");
        }
        if !(0..=100).contains(&self.player.eco_score) {
            anyhow::bail!("starting eco_score must be within [0, 100]");
        }
        if self.player.money < 0 || self.player.reputation < 0 {
            anyhow::bail!("starting money and reputation must be non-negative");
        }
        for (p, name) in [
            (self.community.drift_probability, "drift_probability"),
            (self.community.contribution_probability, "contribution_probability"),
        ] {
            if !(0.0..=1.0).contains(&p) {
                anyhow::bail!("{name} must be within [0, 1]");
            }
        }
        for (service_id, tier) in &self.player.upgrades {
            if self.catalog.get(service_id, *tier).is_none() {
                anyhow::bail!("starting upgrade {service_id}@{tier} is not in the catalog");
            }
        }
        Ok(())
    }

    /// The reference balance of the village economy.
    pub fn standard() -> Self {
        let inventory = [("gear", 5), ("permit", 5), ("beans", 10), ("fuel", 5)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let upgrades = ["lodge", "zipline", "coffee", "shuttle"]
            .into_iter()
            .map(|k| (k.to_string(), 1))
            .collect();

        Self {
            tick_interval_ms: 1000,
            player: PlayerConfig {
                money: 1500,
                eco_score: 85,
                reputation: 50,
                inventory,
                upgrades,
            },
            ledger: LedgerConfig {
                reputation_gain: 2,
                reputation_ceiling: 100,
                history_cap: 20,
                purchase_unit_cost: 50,
                purchase_quantity: 5,
            },
            scheduler: SchedulerConfig {
                slot_count: 6,
                default_guest_name: "Walk-in Guest".into(),
            },
            booking: BookingConfig {
                batch_size: 4,
                max_markup: 0.5,
                max_guests: 2,
            },
            community: CommunityConfig {
                project_goal: 10_000,
                project_current: 1_550,
                global_eco_status: 72,
                drift_probability: 0.05,
                funding_drift_max: 50,
                peer_score_drift_max: 20,
                contribution_probability: 0.2,
                contribution_step: 10,
                donation_presets: vec![50, 200, 500],
                peers: vec![
                    Peer::new("p1", "Student Mateo", "🎒", 2400, 92, 500),
                    Peer::new("p2", "Manager Sofia", "🌿", 1800, 88, 200),
                    Peer::new("p3", "Capitán Diego", "🛶", 3200, 45, 50),
                    Peer::new("p4", "Elena Eco", "🦋", 1500, 98, 800),
                ],
            },
            advisory: AdvisoryConfig {
                shock_interval_ms: 45_000,
                shock_eco_penalty: 5,
                oracle_timeout_ms: 20_000,
                greeting: "¡Pura Vida! Don Carlos here. Don't forget, our Pueblo is building \
                           a National Park. Every colon you donate helps our environment!"
                    .into(),
            },
            catalog: Catalog::standard(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_is_valid() {
        SessionConfig::standard().validate().unwrap();
    }

    #[test]
    fn json_round_trip_keeps_catalog_default() {
        let config = SessionConfig::standard();
        let json = serde_json::to_string(&config).unwrap();
        let back: SessionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn rejects_out_of_range_eco() {
        let mut config = SessionConfig::standard();
        config.player.eco_score = 140;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reads_data_dir() {
        let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/../data");
        let config = SessionConfig::load(dir).unwrap();
        assert_eq!(config, SessionConfig::standard());
    }
}
