//! Agent coordination records over the auxiliary KV store.
//!
//! Agents report a state label and last-activity timestamp, and hold named
//! "slots" referencing issues they are working with. Both live as small
//! documents beside the issue tree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use braid_storage::KvStore;

use crate::error::Result;

const AGENTS_NS: &str = "agents";
const SLOTS_NS: &str = "slots";

/// Self-reported state of one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    /// Free-form state label (e.g. "idle", "working", "stuck").
    pub state: String,
    pub last_activity: DateTime<Utc>,
}

/// Agent state and slot registry.
pub struct AgentRegistry {
    kv: KvStore,
}

impl AgentRegistry {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    /// Records the agent's state, stamping `last_activity` with now.
    pub fn set_state(&self, agent: &str, state: &str) -> Result<AgentRecord> {
        let record = AgentRecord {
            state: state.to_string(),
            last_activity: Utc::now(),
        };
        let bytes = serde_json::to_vec(&record).map_err(braid_storage::StoreError::from)?;
        self.kv.set(AGENTS_NS, agent, &bytes)?;
        Ok(record)
    }

    /// Reads the agent's last-reported state.
    pub fn get_state(&self, agent: &str) -> Result<AgentRecord> {
        let bytes = self.kv.get(AGENTS_NS, agent)?;
        Ok(serde_json::from_slice(&bytes).map_err(braid_storage::StoreError::from)?)
    }

    /// All agents with a recorded state.
    pub fn list_agents(&self) -> Result<Vec<String>> {
        Ok(self.kv.list(AGENTS_NS)?)
    }

    /// Points the agent's named slot at an issue.
    pub fn set_slot(&self, agent: &str, slot: &str, issue_id: &str) -> Result<()> {
        Ok(self
            .kv
            .set(SLOTS_NS, &slot_key(agent, slot), issue_id.as_bytes())?)
    }

    /// The issue id a slot points at.
    pub fn get_slot(&self, agent: &str, slot: &str) -> Result<String> {
        let bytes = self.kv.get(SLOTS_NS, &slot_key(agent, slot))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Clears a slot. Absent slots are a no-op.
    pub fn clear_slot(&self, agent: &str, slot: &str) -> Result<()> {
        Ok(self.kv.delete(SLOTS_NS, &slot_key(agent, slot))?)
    }

    /// Slot names held by one agent.
    pub fn list_slots(&self, agent: &str) -> Result<Vec<String>> {
        let prefix = format!("{agent}.");
        Ok(self
            .kv
            .list(SLOTS_NS)?
            .into_iter()
            .filter_map(|key| key.strip_prefix(&prefix).map(str::to_string))
            .collect())
    }
}

fn slot_key(agent: &str, slot: &str) -> String {
    format!("{agent}.{slot}")
}
