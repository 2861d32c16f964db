use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type DistributionId = u64;
pub type PropertyId = u64;
pub type HolderId = String;
pub type Amount = u128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistributionStatus {
    Pending,
    Distributing,
    Paused,
    Completed,
}

impl DistributionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistributionStatus::Pending => "pending",
            DistributionStatus::Distributing => "distributing",
            DistributionStatus::Paused => "paused",
            DistributionStatus::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DistributionStatus::Completed)
    }
}

/// One batch of pooled yield earmarked for a fixed set of holders.
///
/// Balances are kept in a map for constant-time claims; `holder_order`
/// remembers creation order for audit output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub id: DistributionId,
    pub property_id: PropertyId,
    pub total_yield: Amount,
    pub distributed_yield: Amount,
    pub status: DistributionStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub(crate) balances: HashMap<HolderId, Amount>,
    pub(crate) holder_order: Vec<HolderId>,
}

impl Distribution {
    pub fn remaining_yield(&self) -> Amount {
        self.total_yield - self.distributed_yield
    }

    pub fn remaining_balance(&self, holder: &str) -> Option<Amount> {
        self.balances.get(holder).copied()
    }

    pub fn holder_count(&self) -> usize {
        self.holder_order.len()
    }

    /// Holders with their remaining balances, in creation order.
    pub fn holders(&self) -> Vec<HolderShare> {
        self.holder_order
            .iter()
            .map(|holder| HolderShare {
                holder_id: holder.clone(),
                remaining_balance: self.balances.get(holder).copied().unwrap_or(0),
            })
            .collect()
    }

    pub fn view(&self) -> DistributionView {
        DistributionView {
            id: self.id,
            property_id: self.property_id,
            total_yield: self.total_yield,
            distributed_yield: self.distributed_yield,
            status: self.status,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            holders: self.holders(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolderShare {
    pub holder_id: HolderId,
    pub remaining_balance: Amount,
}

/// Read-only projection returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionView {
    pub id: DistributionId,
    pub property_id: PropertyId,
    pub total_yield: Amount,
    pub distributed_yield: Amount,
    pub status: DistributionStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub holders: Vec<HolderShare>,
}

/// Input for creating a distribution. Holders and balances are parallel lists
/// as supplied by the issuance layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDistribution {
    pub property_id: PropertyId,
    pub total_yield: Amount,
    pub holders: Vec<HolderId>,
    pub balances: Vec<Amount>,
}
