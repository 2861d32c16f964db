//! Caller roles and the actions they may perform on the engine

use serde::{Deserialize, Serialize};

/// Roles recognised by the engine
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full administrative control
    Admin,
    /// Automated jobs: risk checks, price refreshes, default reports
    Operator,
}

/// Every mutating entry point, as seen by the access check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineAction<'a> {
    CreateDistribution,
    ManageDistribution,
    Claim { holder: &'a str },
    ManagePool,
    RecordDefault,
    CheckReserveHealth,
    RefreshPrices,
    ManageSafeguard,
    ManageThresholds,
}

impl EngineAction<'_> {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineAction::CreateDistribution => "create distributions",
            EngineAction::ManageDistribution => "manage distributions",
            EngineAction::Claim { .. } => "claim for this holder",
            EngineAction::ManagePool => "manage the yield pool",
            EngineAction::RecordDefault => "record defaults",
            EngineAction::CheckReserveHealth => "check reserve health",
            EngineAction::RefreshPrices => "refresh price feeds",
            EngineAction::ManageSafeguard => "manage the safeguard",
            EngineAction::ManageThresholds => "manage risk thresholds",
        }
    }
}

impl Role {
    /// Whether this role may perform `action` on behalf of someone else
    pub fn permits(&self, action: &EngineAction<'_>) -> bool {
        match self {
            Role::Admin => true,
            Role::Operator => matches!(
                action,
                EngineAction::RecordDefault
                    | EngineAction::CheckReserveHealth
                    | EngineAction::RefreshPrices
            ),
        }
    }
}
