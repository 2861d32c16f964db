use std::collections::HashMap;
use tracing::warn;

use super::{EngineAction, Role};
use crate::error::AppError;

/// Capability gate consulted before every mutating engine call.
pub trait AccessControl: Send + Sync {
    fn role_of(&self, caller: &str) -> Option<Role>;

    /// Holders may claim their own share; everything else depends on role.
    fn authorize(&self, caller: &str, action: EngineAction<'_>) -> Result<(), AppError> {
        if let EngineAction::Claim { holder } = action {
            if holder == caller {
                return Ok(());
            }
        }
        match self.role_of(caller) {
            Some(role) if role.permits(&action) => Ok(()),
            _ => {
                warn!("Denied {} to {}", action.as_str(), caller);
                Err(AppError::Unauthorized {
                    caller: caller.to_string(),
                    action: action.as_str(),
                })
            }
        }
    }
}

/// Fixed mapping of caller identities to roles.
#[derive(Debug, Clone, Default)]
pub struct RoleRegistry {
    roles: HashMap<String, Role>,
}

impl RoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_admin(mut self, caller: impl Into<String>) -> Self {
        self.roles.insert(caller.into(), Role::Admin);
        self
    }

    pub fn with_operator(mut self, caller: impl Into<String>) -> Self {
        self.roles.entry(caller.into()).or_insert(Role::Operator);
        self
    }

    pub fn from_lists(admins: &[String], operators: &[String]) -> Self {
        let registry = admins
            .iter()
            .fold(Self::new(), |registry, admin| registry.with_admin(admin.clone()));
        operators
            .iter()
            .fold(registry, |registry, operator| registry.with_operator(operator.clone()))
    }
}

impl AccessControl for RoleRegistry {
    fn role_of(&self, caller: &str) -> Option<Role> {
        self.roles.get(caller).copied()
    }
}
