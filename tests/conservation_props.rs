use chrono::Utc;
use proptest::prelude::*;

use rental_yield_engine::{
    models::{CreateDistribution, DistributionStatus},
    services::{DistributionLedger, YieldPoolManager},
};

fn shares() -> impl Strategy<Value = Vec<u128>> {
    prop::collection::vec(0u128..1_000_000, 1..20)
        .prop_filter("needs a positive total", |b| b.iter().sum::<u128>() > 0)
}

proptest! {
    #[test]
    fn prop_claims_conserve_yield(balances in shares(), order in prop::collection::vec(any::<prop::sample::Index>(), 0..40)) {
        let holders: Vec<String> = (0..balances.len()).map(|i| format!("h{}", i)).collect();
        let total: u128 = balances.iter().sum();
        let mut ledger = DistributionLedger::new();
        let mut pool = YieldPoolManager::new();
        let mut events = Vec::new();
        let now = Utc::now();

        let id = ledger
            .create(
                &mut pool,
                CreateDistribution {
                    property_id: 1,
                    total_yield: total,
                    holders: holders.clone(),
                    balances: balances.clone(),
                },
                now,
                &mut events,
            )
            .unwrap();
        ledger.start(id, now, &mut events).unwrap();

        let mut paid = 0u128;
        for index in order {
            let holder = index.get(holders.as_slice());
            if let Ok(amount) = ledger.claim(&mut pool, id, holder, now, &mut events) {
                paid += amount;
            }

            let view = ledger.get(id).unwrap();
            let remaining: u128 = view.holders.iter().map(|h| h.remaining_balance).sum();
            prop_assert_eq!(view.distributed_yield + remaining, total);
            prop_assert_eq!(view.distributed_yield, paid);

            let totals = pool.totals();
            prop_assert_eq!(totals.total_yield_pool + totals.total_distributed_yield, total);
            prop_assert_eq!(view.status == DistributionStatus::Completed, paid == total);
        }
    }

    #[test]
    fn prop_rejected_create_leaves_no_trace(balances in shares(), skew in 1u128..1_000) {
        let holders: Vec<String> = (0..balances.len()).map(|i| format!("h{}", i)).collect();
        let mut ledger = DistributionLedger::new();
        let mut pool = YieldPoolManager::new();
        let mut events = Vec::new();

        let result = ledger.create(
            &mut pool,
            CreateDistribution {
                property_id: 1,
                total_yield: balances.iter().sum::<u128>() + skew,
                holders,
                balances,
            },
            Utc::now(),
            &mut events,
        );

        prop_assert!(result.is_err());
        prop_assert_eq!(ledger.distribution_count(), 0);
        prop_assert_eq!(pool.totals().total_yield_pool, 0);
        prop_assert!(events.is_empty());
    }
}
