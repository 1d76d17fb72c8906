use clinic_payments::domain::amount_policy::{AmountPolicy, AmountRejection};
use clinic_payments::domain::gateway::GatewayStatus;
use clinic_payments::domain::money::{Currency, MoneyAmount};
use clinic_payments::domain::purchase::PurchaseStatus;
use clinic_payments::domain::transaction::TransactionStatus;
use proptest::prelude::*;

fn arb_gateway_status() -> impl Strategy<Value = GatewayStatus> {
    prop_oneof![
        Just(GatewayStatus::Pending),
        Just(GatewayStatus::Approved),
        Just(GatewayStatus::Declined),
        Just(GatewayStatus::Voided),
        Just(GatewayStatus::Error),
        "[A-Z_]{1,12}".prop_map(|s| GatewayStatus::from(s.as_str())),
    ]
}

fn arb_transaction_status() -> impl Strategy<Value = TransactionStatus> {
    prop_oneof![
        Just(TransactionStatus::Pending),
        Just(TransactionStatus::Processing),
        Just(TransactionStatus::Completed),
        Just(TransactionStatus::Failed),
        Just(TransactionStatus::Cancelled),
        Just(TransactionStatus::Refunded),
    ]
}

fn bounded_policy(min: i64, max: i64) -> AmountPolicy {
    AmountPolicy::new().with_bounds(
        Currency::Cop,
        MoneyAmount::new(min).unwrap(),
        MoneyAmount::new(max).unwrap(),
    )
}

proptest! {
    /// Every amount inside [min, max] is accepted.
    #[test]
    fn amounts_within_bounds_are_accepted(
        (min, max, amount) in (0i64..1_000_000, 0i64..1_000_000)
            .prop_flat_map(|(a, b)| {
                let (min, max) = if a <= b { (a, b) } else { (b, a) };
                (Just(min), Just(max), min..=max)
            })
    ) {
        let policy = bounded_policy(min, max);
        prop_assert!(policy.validate(MoneyAmount::new(amount).unwrap(), Currency::Cop).is_ok());
    }

    /// Below the minimum the rejection reports the minimum.
    #[test]
    fn amounts_below_min_report_min(min in 1i64..1_000_000, gap in 1i64..1_000_000) {
        let amount = (min - gap).max(0);
        prop_assume!(amount < min);
        let policy = bounded_policy(min, min + 1_000_000);
        let rejection = policy
            .validate(MoneyAmount::new(amount).unwrap(), Currency::Cop)
            .unwrap_err();
        match rejection {
            AmountRejection::BelowMinimum { min: reported, .. } => {
                prop_assert_eq!(reported.minor_units(), min)
            }
            other => prop_assert!(false, "unexpected rejection {other:?}"),
        }
    }

    /// Above the maximum the rejection reports the maximum.
    #[test]
    fn amounts_above_max_report_max(max in 0i64..1_000_000, over in 1i64..1_000_000) {
        let policy = bounded_policy(0, max);
        let rejection = policy
            .validate(MoneyAmount::new(max + over).unwrap(), Currency::Cop)
            .unwrap_err();
        match rejection {
            AmountRejection::AboveMaximum { max: reported, .. } => {
                prop_assert_eq!(reported.minor_units(), max)
            }
            other => prop_assert!(false, "unexpected rejection {other:?}"),
        }
    }

    /// Currencies without bounds are always rejected.
    #[test]
    fn unconfigured_currency_is_rejected(amount in 0i64..i64::MAX) {
        let policy = bounded_policy(0, i64::MAX);
        prop_assert_eq!(
            policy.validate(MoneyAmount::new(amount).unwrap(), Currency::Usd),
            Err(AmountRejection::UnsupportedCurrency(Currency::Usd))
        );
    }

    /// The mapping is a total function: same input, same output, and
    /// purchase status always agrees with transaction status.
    #[test]
    fn status_mapping_is_deterministic(status in arb_gateway_status()) {
        let tx = TransactionStatus::from_gateway(&status);
        prop_assert_eq!(tx, TransactionStatus::from_gateway(&status.clone()));
        prop_assert_eq!(PurchaseStatus::from_gateway(&status), PurchaseStatus::from(tx));
    }

    /// Applying the same mapped status repeatedly never regresses.
    #[test]
    fn reapplying_a_status_is_never_a_regression(status in arb_transaction_status()) {
        prop_assert!(!status.would_regress_to(status));
    }

    /// Nothing settled ever goes back to pending.
    #[test]
    fn settled_never_regresses_to_pending(status in arb_transaction_status()) {
        if status.rank() > 0 {
            prop_assert!(status.would_regress_to(TransactionStatus::Pending));
        }
    }

    /// as_str → try_from roundtrip is identity.
    #[test]
    fn transaction_status_roundtrip(status in arb_transaction_status()) {
        prop_assert_eq!(TransactionStatus::try_from(status.as_str()).unwrap(), status);
    }
}
