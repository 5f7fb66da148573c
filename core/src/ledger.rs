//! Economy ledger — the only owner of the player's money, eco-score,
//! reputation, inventory, upgrade levels and donation total.
//!
//! Every operation validates in full before it writes anything, so a
//! rejected call leaves the stats byte-identical. Invariants after any
//! operation:
//!   - money >= 0
//!   - eco_score in [0, 100]
//!   - reputation in [0, reputation_ceiling]
//!   - total_donated never decreases
//!   - history.len() <= history_cap

use crate::{
    catalog::{Catalog, ServiceDefinition},
    community::CommunityStats,
    config::{LedgerConfig, PlayerConfig},
    error::IntentError,
    types::{Money, TierLevel, Timestamp},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

pub const ECO_MIN: i32 = 0;
pub const ECO_MAX: i32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerStats {
    pub money:         Money,
    pub eco_score:     i32,
    pub reputation:    i64,
    pub inventory:     BTreeMap<String, u32>,
    pub upgrades:      BTreeMap<String, TierLevel>,
    pub total_donated: Money,
}

impl PlayerStats {
    /// Current tier of a service line; lines never upgraded are tier 1.
    pub fn tier_of(&self, service_id: &str) -> TierLevel {
        self.upgrades.get(service_id).copied().unwrap_or(1)
    }

    pub fn stock(&self, resource: &str) -> u32 {
        self.inventory.get(resource).copied().unwrap_or(0)
    }
}

/// One point on the revenue / eco trend, appended per completed service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistorySample {
    pub time_label: String,
    pub at_ms:      Timestamp,
    pub revenue:    Money,
    /// Eco-score at the moment of completion, before the service's impact.
    pub eco_score:  i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionReceipt {
    pub revenue:     Money,
    pub eco_score:   i32,
    pub reputation:  i64,
    pub money_after: Money,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DonationReceipt {
    pub amount:          Money,
    pub total_donated:   Money,
    pub project_current: Money,
    pub money_after:     Money,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseReceipt {
    pub resource:    String,
    pub quantity:    u32,
    pub cost:        Money,
    pub money_after: Money,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpgradeReceipt {
    pub service_id:  String,
    pub tier:        TierLevel,
    pub cost:        Money,
    pub money_after: Money,
}

#[derive(Debug, Clone)]
pub struct EconomyLedger {
    config:  LedgerConfig,
    stats:   PlayerStats,
    history: VecDeque<HistorySample>,
}

impl EconomyLedger {
    pub fn new(config: LedgerConfig, start: &PlayerConfig) -> Self {
        Self {
            stats: PlayerStats {
                money:         start.money.max(0),
                eco_score:     start.eco_score.clamp(ECO_MIN, ECO_MAX),
                reputation:    start.reputation.clamp(0, config.reputation_ceiling),
                inventory:     start.inventory.clone(),
                upgrades:      start.upgrades.clone(),
                total_donated: 0,
            },
            history: VecDeque::with_capacity(config.history_cap),
            config,
        }
    }

    pub fn stats(&self) -> &PlayerStats {
        &self.stats
    }

    pub fn history(&self) -> impl ExactSizeIterator<Item = &HistorySample> {
        self.history.iter()
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn tier_of(&self, service_id: &str) -> TierLevel {
        self.stats.tier_of(service_id)
    }

    fn require_funds(&self, required: Money) -> Result<(), IntentError> {
        if self.stats.money < required {
            return Err(IntentError::InsufficientFunds {
                required,
                available: self.stats.money,
            });
        }
        Ok(())
    }

    /// Check every requirement of a service against inventory without
    /// touching it. Reports the first short resource in name order.
    pub fn check_service_cost(&self, service: &ServiceDefinition) -> Result<(), IntentError> {
        for (resource, &required) in &service.requirements {
            let available = self.stats.stock(resource);
            if available < required {
                return Err(IntentError::InsufficientResource {
                    resource: resource.clone(),
                    required,
                    available,
                });
            }
        }
        Ok(())
    }

    /// Deduct all of a service's requirements, or none of them.
    pub fn apply_service_cost(&mut self, service: &ServiceDefinition) -> Result<(), IntentError> {
        self.check_service_cost(service)?;
        for (resource, &required) in &service.requirements {
            if let Some(stock) = self.stats.inventory.get_mut(resource) {
                *stock -= required;
            }
        }
        Ok(())
    }

    /// Pay out a finished service: base price, eco impact, reputation,
    /// and one history sample.
    pub fn apply_service_completion(
        &mut self,
        service: &ServiceDefinition,
        at_ms: Timestamp,
        time_label: String,
    ) -> CompletionReceipt {
        let eco_before = self.stats.eco_score;

        self.stats.money += service.base_price;
        self.stats.eco_score = (eco_before + service.eco_impact).clamp(ECO_MIN, ECO_MAX);
        self.stats.reputation = (self.stats.reputation + self.config.reputation_gain)
            .clamp(0, self.config.reputation_ceiling);

        self.push_history(HistorySample {
            time_label,
            at_ms,
            revenue: service.base_price,
            eco_score: eco_before,
        });

        CompletionReceipt {
            revenue:     service.base_price,
            eco_score:   self.stats.eco_score,
            reputation:  self.stats.reputation,
            money_after: self.stats.money,
        }
    }

    fn push_history(&mut self, sample: HistorySample) {
        if self.config.history_cap == 0 {
            return;
        }
        while self.history.len() >= self.config.history_cap {
            self.history.pop_front();
        }
        self.history.push_back(sample);
    }

    /// Move `amount` from the player's purse into the community fund.
    ///
    /// Both sides are written after the single funds check, so either
    /// both reflect the donation or neither does.
    pub fn donate(
        &mut self,
        amount: Money,
        community: &mut CommunityStats,
    ) -> Result<DonationReceipt, IntentError> {
        if amount <= 0 {
            return Err(IntentError::InvalidAmount(amount));
        }
        self.require_funds(amount)?;

        self.stats.money -= amount;
        self.stats.total_donated += amount;
        community.record_donation(amount);

        Ok(DonationReceipt {
            amount,
            total_donated:   self.stats.total_donated,
            project_current: community.project_current,
            money_after:     self.stats.money,
        })
    }

    /// Buy a fixed bundle of one resource at a fixed price.
    pub fn purchase_inventory(
        &mut self,
        catalog: &Catalog,
        resource: &str,
    ) -> Result<PurchaseReceipt, IntentError> {
        let known = self.stats.inventory.contains_key(resource)
            || catalog.resources().contains(&resource);
        if !known {
            return Err(IntentError::UnknownResource(resource.to_string()));
        }
        let cost = self.config.purchase_unit_cost;
        self.require_funds(cost)?;

        let quantity = self.config.purchase_quantity;
        self.stats.money -= cost;
        *self.stats.inventory.entry(resource.to_string()).or_insert(0) += quantity;

        Ok(PurchaseReceipt {
            resource: resource.to_string(),
            quantity,
            cost,
            money_after: self.stats.money,
        })
    }

    /// Raise a service line by one tier.
    pub fn upgrade_service(
        &mut self,
        catalog: &Catalog,
        service_id: &str,
    ) -> Result<UpgradeReceipt, IntentError> {
        let (Some(max_tier), Some(cost)) =
            (catalog.max_tier(service_id), catalog.upgrade_cost(service_id))
        else {
            return Err(IntentError::UnknownService(service_id.to_string()));
        };

        let current = self.tier_of(service_id);
        if current >= max_tier {
            return Err(IntentError::MaxTierReached {
                service_id: service_id.to_string(),
                tier: current,
            });
        }
        self.require_funds(cost)?;

        self.stats.money -= cost;
        self.stats.upgrades.insert(service_id.to_string(), current + 1);

        Ok(UpgradeReceipt {
            service_id: service_id.to_string(),
            tier: current + 1,
            cost,
            money_after: self.stats.money,
        })
    }

    /// Lower the eco-score by `penalty`, clamped. Returns the new score.
    pub fn apply_eco_penalty(&mut self, penalty: i32) -> i32 {
        self.stats.eco_score = (self.stats.eco_score - penalty).clamp(ECO_MIN, ECO_MAX);
        self.stats.eco_score
    }
}
