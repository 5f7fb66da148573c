//! Money journal: one row per committed money movement.
//!
//! The journal is an audit trail. The ledger stays the source of truth;
//! `balance` is copied from it after each movement.

use crate::{error::SimResult, types::{Money, Tick}};
use rusqlite::params;
use serde::{Deserialize, Serialize};

use super::SimStore;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JournalCategory {
    ServiceRevenue,
    Donation,
    InventoryPurchase,
    Upgrade,
}

impl JournalCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServiceRevenue    => "service_revenue",
            Self::Donation          => "donation",
            Self::InventoryPurchase => "inventory_purchase",
            Self::Upgrade           => "upgrade",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub tick:      Tick,
    pub category:  String,
    pub reference: String,
    pub amount:    Money,
    pub balance:   Money,
}

impl SimStore {
    pub fn record_money(
        &self,
        session_id: &str,
        tick: Tick,
        category: JournalCategory,
        reference: &str,
        amount: Money,
        balance: Money,
    ) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO money_journal (session_id, tick, category, reference, amount, balance)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![session_id, tick as i64, category.as_str(), reference, amount, balance],
        )?;
        Ok(())
    }

    /// Net amount booked under one category.
    pub fn journal_total(&self, session_id: &str, category: JournalCategory) -> SimResult<Money> {
        let total: Money = self.conn.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM money_journal
             WHERE session_id = ?1 AND category = ?2",
            params![session_id, category.as_str()],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    pub fn journal(&self, session_id: &str) -> SimResult<Vec<JournalEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT tick, category, reference, amount, balance
             FROM money_journal WHERE session_id = ?1
             ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![session_id], |row| {
                Ok(JournalEntry {
                    tick:      row.get::<_, i64>(0)? as u64,
                    category:  row.get(1)?,
                    reference: row.get(2)?,
                    amount:    row.get(3)?,
                    balance:   row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
