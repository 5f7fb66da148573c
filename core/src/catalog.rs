//! Static service catalog: tiers, prices, durations, requirements,
//! upgrade costs. Pure lookup tables, immutable for the session.

use crate::types::{Money, ServiceId, TierLevel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCategory {
    Accommodation,
    Tour,
    Transport,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceDefinition {
    pub service_id:       ServiceId,
    pub tier:             TierLevel,
    pub name:             String,
    pub base_price:       Money,
    pub duration_seconds: u64,
    pub category:         ServiceCategory,
    /// Signed eco-score delta applied on completion.
    pub eco_impact:       i32,
    /// resource name → units consumed on assignment.
    pub requirements:     BTreeMap<String, u32>,
}

impl ServiceDefinition {
    pub fn duration_ms(&self) -> u64 {
        self.duration_seconds * 1000
    }
}

/// One service line: its tiers (ascending) and its upgrade cost.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceLine {
    pub service_id:   ServiceId,
    pub upgrade_cost: Money,
    pub tiers:        Vec<ServiceDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogFile {
    services: Vec<ServiceLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Catalog {
    lines: BTreeMap<ServiceId, ServiceLine>,
}

impl Catalog {
    pub fn from_lines(lines: impl IntoIterator<Item = ServiceLine>) -> Self {
        let lines = lines
            .into_iter()
            .map(|mut line| {
                line.tiers.sort_by_key(|t| t.tier);
                (line.service_id.clone(), line)
            })
            .collect();
        Self { lines }
    }

    /// Parse the `data/catalog.json` layout.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let file: CatalogFile = serde_json::from_str(json)?;
        let catalog = Self::from_lines(file.services);
        catalog.validate()?;
        Ok(catalog)
    }

    /// Tiers must start at 1 and be contiguous; every tier must belong
    /// to its line.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (id, line) in &self.lines {
            if line.tiers.is_empty() {
                anyhow::bail!("service '{id}' has no tiers");
            }
            for (idx, def) in line.tiers.iter().enumerate() {
                if def.tier as usize != idx + 1 {
                    anyhow::bail!("service '{id}' tiers must be contiguous from 1");
                }
                if &def.service_id != id {
                    anyhow::bail!("tier {} of '{id}' is labelled '{}'", def.tier, def.service_id);
                }
            }
        }
        Ok(())
    }

    /// The village's four service lines.
    pub fn standard() -> Self {
        fn tier(
            id: &str,
            tier: TierLevel,
            name: &str,
            base_price: Money,
            duration_seconds: u64,
            category: ServiceCategory,
            eco_impact: i32,
            resource: &str,
        ) -> ServiceDefinition {
            ServiceDefinition {
                service_id: id.into(),
                tier,
                name: name.into(),
                base_price,
                duration_seconds,
                category,
                eco_impact,
                requirements: [(resource.to_string(), 1)].into(),
            }
        }
        use ServiceCategory::*;

        Self::from_lines([
            ServiceLine {
                service_id: "lodge".into(),
                upgrade_cost: 1200,
                tiers: vec![
                    tier("lodge", 1, "Eco-Lodge Stay", 200, 60, Accommodation, -2, "permit"),
                    tier("lodge", 2, "Luxury Jungle Suite", 480, 60, Accommodation, -5, "permit"),
                ],
            },
            ServiceLine {
                service_id: "zipline".into(),
                upgrade_cost: 750,
                tiers: vec![
                    tier("zipline", 1, "Canopy Zipline", 85, 30, Tour, -1, "gear"),
                    tier("zipline", 2, "Mega-Circuit Zipline", 195, 30, Tour, -3, "gear"),
                ],
            },
            ServiceLine {
                service_id: "coffee".into(),
                upgrade_cost: 600,
                tiers: vec![
                    tier("coffee", 1, "Coffee Farm Tour", 45, 20, Tour, 2, "beans"),
                    tier("coffee", 2, "Organic Roastery Exp", 125, 20, Tour, 5, "beans"),
                ],
            },
            ServiceLine {
                service_id: "shuttle".into(),
                upgrade_cost: 900,
                tiers: vec![
                    tier("shuttle", 1, "Airport Shuttle", 120, 45, Transport, -3, "fuel"),
                    tier("shuttle", 2, "VIP Electric Van", 280, 45, Transport, 2, "fuel"),
                ],
            },
        ])
    }

    pub fn get(&self, service_id: &str, tier: TierLevel) -> Option<&ServiceDefinition> {
        self.lines
            .get(service_id)?
            .tiers
            .iter()
            .find(|d| d.tier == tier)
    }

    pub fn contains(&self, service_id: &str) -> bool {
        self.lines.contains_key(service_id)
    }

    pub fn max_tier(&self, service_id: &str) -> Option<TierLevel> {
        self.lines.get(service_id)?.tiers.last().map(|d| d.tier)
    }

    pub fn upgrade_cost(&self, service_id: &str) -> Option<Money> {
        self.lines.get(service_id).map(|l| l.upgrade_cost)
    }

    /// Service ids in stable (sorted) order.
    pub fn service_ids(&self) -> Vec<&str> {
        self.lines.keys().map(String::as_str).collect()
    }

    /// Every resource named by any tier's requirements.
    pub fn resources(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self
            .lines
            .values()
            .flat_map(|l| l.tiers.iter())
            .flat_map(|d| d.requirements.keys().map(String::as_str))
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    pub fn lines(&self) -> impl Iterator<Item = &ServiceLine> {
        self.lines.values()
    }
}
