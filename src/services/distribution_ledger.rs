use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

use crate::error::AppError;
use crate::models::{
    Amount, CreateDistribution, Distribution, DistributionId, DistributionStatus,
    DistributionView, EngineEvent,
};
use crate::services::YieldPoolManager;
use crate::utils::math::checked_add;

/// Owns every distribution record and its lifecycle.
///
/// ```text
/// Pending --start--> Distributing <--pause/resume--> Paused
/// Distributing --(distributed == total)--> Completed
/// ```
#[derive(Debug, Clone, Default)]
pub struct DistributionLedger {
    distributions: BTreeMap<DistributionId, Distribution>,
    distribution_count: u64,
    last_distribution_timestamp: Option<DateTime<Utc>>,
}

impl DistributionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn restore(
        distributions: BTreeMap<DistributionId, Distribution>,
        distribution_count: u64,
        last_distribution_timestamp: Option<DateTime<Utc>>,
    ) -> Result<Self, AppError> {
        if let Some((&highest, _)) = distributions.iter().next_back() {
            if highest > distribution_count {
                return Err(AppError::InternalError(format!(
                    "snapshot holds distribution {} but count is {}",
                    highest, distribution_count
                )));
            }
        }
        Ok(Self {
            distributions,
            distribution_count,
            last_distribution_timestamp,
        })
    }

    pub fn distributions(&self) -> &BTreeMap<DistributionId, Distribution> {
        &self.distributions
    }

    pub fn distribution_count(&self) -> u64 {
        self.distribution_count
    }

    pub fn last_distribution_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_distribution_timestamp
    }

    /// Records a new Pending distribution and credits its total to the pool.
    pub fn create(
        &mut self,
        pool: &mut YieldPoolManager,
        request: CreateDistribution,
        now: DateTime<Utc>,
        events: &mut Vec<EngineEvent>,
    ) -> Result<DistributionId, AppError> {
        let CreateDistribution {
            property_id,
            total_yield,
            holders,
            balances,
        } = request;

        if total_yield == 0 {
            return Err(AppError::InvalidAmount("total yield must be positive".to_string()));
        }
        if holders.len() != balances.len() {
            return Err(AppError::ArityMismatch {
                holders: holders.len(),
                balances: balances.len(),
            });
        }

        let mut shares = HashMap::with_capacity(holders.len());
        let mut sum: Amount = 0;
        for (holder, balance) in holders.iter().zip(balances.iter()) {
            if shares.insert(holder.clone(), *balance).is_some() {
                return Err(AppError::DuplicateHolder(holder.clone()));
            }
            sum = checked_add(sum, *balance, "holder balances")?;
        }
        if sum != total_yield {
            return Err(AppError::InvalidAmount(format!(
                "holder balances sum to {} but total yield is {}",
                sum, total_yield
            )));
        }
        pool.ensure_creditable(total_yield)?;

        let id = self
            .distribution_count
            .checked_add(1)
            .ok_or(AppError::ArithmeticOverflow("distribution id"))?;

        let distribution = Distribution {
            id,
            property_id,
            total_yield,
            distributed_yield: 0,
            status: DistributionStatus::Pending,
            created_at: now,
            started_at: None,
            completed_at: None,
            balances: shares,
            holder_order: holders,
        };

        events.push(EngineEvent::DistributionCreated {
            distribution_id: id,
            property_id,
            total_yield,
            holder_count: distribution.holder_count(),
            at: now,
        });
        pool.credit(total_yield, now, events)?;

        self.distribution_count = id;
        self.distributions.insert(id, distribution);
        info!(
            "Created distribution {} for property {} ({} yield)",
            id, property_id, total_yield
        );
        Ok(id)
    }

    pub fn start(
        &mut self,
        id: DistributionId,
        now: DateTime<Utc>,
        events: &mut Vec<EngineEvent>,
    ) -> Result<(), AppError> {
        let distribution = self.get_mut(id)?;
        if distribution.status != DistributionStatus::Pending || distribution.total_yield == 0 {
            return Err(invalid_state(distribution, "start"));
        }

        distribution.status = DistributionStatus::Distributing;
        distribution.started_at = Some(now);
        events.push(EngineEvent::DistributionStarted {
            distribution_id: id,
            property_id: distribution.property_id,
            total_yield: distribution.total_yield,
            at: now,
        });
        self.last_distribution_timestamp = Some(now);
        info!("Distribution {} started", id);
        Ok(())
    }

    pub fn pause(
        &mut self,
        id: DistributionId,
        now: DateTime<Utc>,
        events: &mut Vec<EngineEvent>,
    ) -> Result<(), AppError> {
        let distribution = self.get_mut(id)?;
        if distribution.status != DistributionStatus::Distributing {
            return Err(invalid_state(distribution, "pause"));
        }

        distribution.status = DistributionStatus::Paused;
        events.push(EngineEvent::DistributionPaused {
            distribution_id: id,
            at: now,
        });
        info!("Distribution {} paused", id);
        Ok(())
    }

    pub fn resume(
        &mut self,
        id: DistributionId,
        now: DateTime<Utc>,
        events: &mut Vec<EngineEvent>,
    ) -> Result<(), AppError> {
        let distribution = self.get_mut(id)?;
        if distribution.status != DistributionStatus::Paused {
            return Err(invalid_state(distribution, "resume"));
        }

        distribution.status = DistributionStatus::Distributing;
        events.push(EngineEvent::DistributionResumed {
            distribution_id: id,
            at: now,
        });
        info!("Distribution {} resumed", id);
        Ok(())
    }

    /// Pays out a holder's whole remaining balance.
    ///
    /// A holder who has already been paid gets `NothingToClaim` whatever the
    /// distribution status, so retried claims never pay twice.
    pub fn claim(
        &mut self,
        pool: &mut YieldPoolManager,
        id: DistributionId,
        holder: &str,
        now: DateTime<Utc>,
        events: &mut Vec<EngineEvent>,
    ) -> Result<Amount, AppError> {
        let distribution = self
            .distributions
            .get_mut(&id)
            .ok_or_else(|| not_found(id))?;

        let amount = distribution
            .balances
            .get(holder)
            .copied()
            .ok_or_else(|| AppError::HolderNotFound {
                id,
                holder: holder.to_string(),
            })?;
        if amount == 0 {
            return Err(AppError::NothingToClaim {
                id,
                holder: holder.to_string(),
            });
        }
        if distribution.status != DistributionStatus::Distributing {
            return Err(invalid_state(distribution, "claim"));
        }

        let distributed = checked_add(distribution.distributed_yield, amount, "distributed yield")?;
        if distributed > distribution.total_yield {
            // Balances were validated to sum to the total at creation.
            return Err(AppError::InternalError(format!(
                "distribution {} would pay {} of {}",
                id, distributed, distribution.total_yield
            )));
        }
        pool.ensure_payable(amount)?;

        distribution.balances.insert(holder.to_string(), 0);
        distribution.distributed_yield = distributed;
        events.push(EngineEvent::YieldClaimed {
            distribution_id: id,
            holder_id: holder.to_string(),
            amount,
            at: now,
        });
        pool.record_claim(amount, now, events)?;
        info!("Holder {} claimed {} from distribution {}", holder, amount, id);

        if distribution.distributed_yield == distribution.total_yield {
            distribution.status = DistributionStatus::Completed;
            distribution.completed_at = Some(now);
            events.push(EngineEvent::DistributionCompleted {
                distribution_id: id,
                distributed_yield: distribution.distributed_yield,
                at: now,
            });
            info!("Distribution {} completed", id);
        }

        Ok(amount)
    }

    pub fn get(&self, id: DistributionId) -> Result<DistributionView, AppError> {
        self.distributions
            .get(&id)
            .map(Distribution::view)
            .ok_or_else(|| not_found(id))
    }

    pub fn list(&self) -> Vec<DistributionView> {
        self.distributions.values().map(Distribution::view).collect()
    }

    pub fn claimable(&self, id: DistributionId, holder: &str) -> Result<Amount, AppError> {
        let distribution = self.distributions.get(&id).ok_or_else(|| not_found(id))?;
        distribution
            .remaining_balance(holder)
            .ok_or_else(|| AppError::HolderNotFound {
                id,
                holder: holder.to_string(),
            })
    }

    /// Sum of unclaimed balances across all distributions that are not Completed.
    pub fn outstanding_obligations(&self) -> Amount {
        self.distributions
            .values()
            .filter(|d| !d.status.is_terminal())
            .map(Distribution::remaining_yield)
            .fold(0u128, |acc, remaining| acc.saturating_add(remaining))
    }

    fn get_mut(&mut self, id: DistributionId) -> Result<&mut Distribution, AppError> {
        self.distributions.get_mut(&id).ok_or_else(|| not_found(id))
    }
}

fn not_found(id: DistributionId) -> AppError {
    AppError::NotFound(format!("distribution {}", id))
}

fn invalid_state(distribution: &Distribution, operation: &'static str) -> AppError {
    warn!(
        "Rejected {} on distribution {} in status {}",
        operation,
        distribution.id,
        distribution.status.as_str()
    );
    AppError::InvalidState {
        id: distribution.id,
        status: distribution.status,
        operation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(total: Amount, holders: &[(&str, Amount)]) -> CreateDistribution {
        CreateDistribution {
            property_id: 1,
            total_yield: total,
            holders: holders.iter().map(|(h, _)| h.to_string()).collect(),
            balances: holders.iter().map(|(_, b)| *b).collect(),
        }
    }

    fn setup() -> (DistributionLedger, YieldPoolManager, Vec<EngineEvent>) {
        (DistributionLedger::new(), YieldPoolManager::new(), Vec::new())
    }

    #[test]
    fn test_full_lifecycle_completes() {
        let (mut ledger, mut pool, mut events) = setup();
        let now = Utc::now();
        let id = ledger
            .create(&mut pool, request(1_000, &[("A", 600), ("B", 400)]), now, &mut events)
            .unwrap();
        ledger.start(id, now, &mut events).unwrap();

        assert_eq!(ledger.claim(&mut pool, id, "A", now, &mut events).unwrap(), 600);
        assert_eq!(ledger.claim(&mut pool, id, "B", now, &mut events).unwrap(), 400);

        let view = ledger.get(id).unwrap();
        assert_eq!(view.distributed_yield, 1_000);
        assert_eq!(view.status, DistributionStatus::Completed);
        assert!(view.completed_at.is_some());
        assert_eq!(pool.totals().total_distributed_yield, 1_000);
        assert_eq!(pool.totals().total_yield_pool, 0);
    }

    #[test]
    fn test_create_validates_inputs() {
        let (mut ledger, mut pool, mut events) = setup();
        let now = Utc::now();

        let err = ledger
            .create(&mut pool, request(0, &[]), now, &mut events)
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidAmount(_)));

        let mut mismatched = request(100, &[("A", 100)]);
        mismatched.balances.push(5);
        let err = ledger.create(&mut pool, mismatched, now, &mut events).unwrap_err();
        assert_eq!(err, AppError::ArityMismatch { holders: 1, balances: 2 });

        let err = ledger
            .create(&mut pool, request(100, &[("A", 60), ("B", 30)]), now, &mut events)
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidAmount(_)));

        let err = ledger
            .create(&mut pool, request(100, &[("A", 50), ("A", 50)]), now, &mut events)
            .unwrap_err();
        assert_eq!(err, AppError::DuplicateHolder("A".to_string()));

        assert_eq!(ledger.distribution_count(), 0);
        assert_eq!(pool.totals().total_yield_pool, 0);
        assert!(events.is_empty());
    }

    #[test]
    fn test_second_claim_returns_nothing_to_claim() {
        let (mut ledger, mut pool, mut events) = setup();
        let now = Utc::now();
        let id = ledger
            .create(&mut pool, request(1_000, &[("A", 600), ("B", 400)]), now, &mut events)
            .unwrap();
        ledger.start(id, now, &mut events).unwrap();
        ledger.claim(&mut pool, id, "A", now, &mut events).unwrap();

        let err = ledger.claim(&mut pool, id, "A", now, &mut events).unwrap_err();
        assert!(matches!(err, AppError::NothingToClaim { .. }));
        assert_eq!(ledger.get(id).unwrap().distributed_yield, 600);
    }

    #[test]
    fn test_claim_after_completion_still_nothing_to_claim() {
        let (mut ledger, mut pool, mut events) = setup();
        let now = Utc::now();
        let id = ledger
            .create(&mut pool, request(10, &[("A", 10)]), now, &mut events)
            .unwrap();
        ledger.start(id, now, &mut events).unwrap();
        ledger.claim(&mut pool, id, "A", now, &mut events).unwrap();

        let err = ledger.claim(&mut pool, id, "A", now, &mut events).unwrap_err();
        assert!(matches!(err, AppError::NothingToClaim { .. }));
    }

    #[test]
    fn test_claim_requires_distributing() {
        let (mut ledger, mut pool, mut events) = setup();
        let now = Utc::now();
        let id = ledger
            .create(&mut pool, request(10, &[("A", 10)]), now, &mut events)
            .unwrap();

        let err = ledger.claim(&mut pool, id, "A", now, &mut events).unwrap_err();
        assert!(matches!(err, AppError::InvalidState { operation: "claim", .. }));

        ledger.start(id, now, &mut events).unwrap();
        ledger.pause(id, now, &mut events).unwrap();
        let err = ledger.claim(&mut pool, id, "A", now, &mut events).unwrap_err();
        assert!(matches!(err, AppError::InvalidState { status: DistributionStatus::Paused, .. }));
        assert_eq!(ledger.claimable(id, "A").unwrap(), 10);
    }

    #[test]
    fn test_claim_checks_balance_before_status() {
        let (mut ledger, mut pool, mut events) = setup();
        let now = Utc::now();
        let id = ledger
            .create(&mut pool, request(10, &[("A", 10), ("Z", 0)]), now, &mut events)
            .unwrap();
        let emitted = events.len();

        // Pending: a zero balance wins over the wrong state.
        let err = ledger.claim(&mut pool, id, "Z", now, &mut events).unwrap_err();
        assert_eq!(err, AppError::NothingToClaim { id, holder: "Z".to_string() });
        let err = ledger.claim(&mut pool, id, "A", now, &mut events).unwrap_err();
        assert!(matches!(err, AppError::InvalidState { status: DistributionStatus::Pending, .. }));
        // An unknown holder is reported before either.
        let err = ledger.claim(&mut pool, id, "Q", now, &mut events).unwrap_err();
        assert!(matches!(err, AppError::HolderNotFound { .. }));

        assert_eq!(events.len(), emitted);
        assert_eq!(ledger.get(id).unwrap().distributed_yield, 0);
    }

    #[test]
    fn test_unknown_holder_and_distribution() {
        let (mut ledger, mut pool, mut events) = setup();
        let now = Utc::now();
        let id = ledger
            .create(&mut pool, request(10, &[("A", 10)]), now, &mut events)
            .unwrap();
        ledger.start(id, now, &mut events).unwrap();

        assert!(matches!(
            ledger.claim(&mut pool, id, "Z", now, &mut events),
            Err(AppError::HolderNotFound { .. })
        ));
        assert!(matches!(
            ledger.claim(&mut pool, 99, "A", now, &mut events),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(ledger.get(99), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_pause_resume_transitions() {
        let (mut ledger, mut pool, mut events) = setup();
        let now = Utc::now();
        let id = ledger
            .create(&mut pool, request(10, &[("A", 10)]), now, &mut events)
            .unwrap();

        assert!(ledger.pause(id, now, &mut events).is_err());
        assert!(ledger.resume(id, now, &mut events).is_err());

        ledger.start(id, now, &mut events).unwrap();
        assert!(ledger.start(id, now, &mut events).is_err());
        ledger.pause(id, now, &mut events).unwrap();

        let before = ledger.get(id).unwrap();
        assert!(matches!(
            ledger.pause(id, now, &mut events),
            Err(AppError::InvalidState { .. })
        ));
        assert_eq!(ledger.get(id).unwrap(), before);

        ledger.resume(id, now, &mut events).unwrap();
        assert_eq!(ledger.get(id).unwrap().status, DistributionStatus::Distributing);
    }

    #[test]
    fn test_completed_is_terminal() {
        let (mut ledger, mut pool, mut events) = setup();
        let now = Utc::now();
        let id = ledger
            .create(&mut pool, request(10, &[("A", 10)]), now, &mut events)
            .unwrap();
        ledger.start(id, now, &mut events).unwrap();
        ledger.claim(&mut pool, id, "A", now, &mut events).unwrap();

        assert!(ledger.pause(id, now, &mut events).is_err());
        assert!(ledger.resume(id, now, &mut events).is_err());
        assert!(ledger.start(id, now, &mut events).is_err());
    }

    #[test]
    fn test_holders_keep_creation_order() {
        let (mut ledger, mut pool, mut events) = setup();
        let now = Utc::now();
        let id = ledger
            .create(
                &mut pool,
                request(6, &[("carol", 3), ("alice", 1), ("bob", 2)]),
                now,
                &mut events,
            )
            .unwrap();

        let order: Vec<String> = ledger
            .get(id)
            .unwrap()
            .holders
            .into_iter()
            .map(|h| h.holder_id)
            .collect();
        assert_eq!(order, vec!["carol", "alice", "bob"]);
    }

    #[test]
    fn test_ids_are_monotonic() {
        let (mut ledger, mut pool, mut events) = setup();
        let now = Utc::now();
        let first = ledger
            .create(&mut pool, request(1, &[("A", 1)]), now, &mut events)
            .unwrap();
        let second = ledger
            .create(&mut pool, request(2, &[("A", 2)]), now, &mut events)
            .unwrap();
        assert_eq!((first, second), (1, 2));
        assert_eq!(ledger.outstanding_obligations(), 3);
    }
}
