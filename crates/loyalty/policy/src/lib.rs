//! # loyalty-policy
//!
//! The earn policy: pure functions converting a purchase amount into loyalty
//! units under a restaurant's ratio configuration, plus the stamp-mode
//! daily-cap rule. No side effects; the ledger engine owns all state.

#![deny(unsafe_code)]

use loyalty_types::{LoyaltyConfig, LoyaltyError, LoyaltyMode, LoyaltyResult};

/// Units earned by one purchase, split by mode.
///
/// At most one field is nonzero; both are zero when the amount fell below one
/// ratio unit, which is still a valid earn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EarnedUnits {
    pub points: i64,
    pub stamps: i64,
}

impl EarnedUnits {
    /// Total units in the active mode.
    pub fn total(&self) -> i64 {
        self.points + self.stamps
    }
}

/// Convert a purchase amount into earned units.
///
/// `units = floor(amount / ratio_amount) * ratio_units` in the active mode.
/// A non-positive amount is rejected; a zero-unit result is not an error.
/// An amount so large that the conversion overflows `i64` is rejected as
/// `InvalidAmount` rather than wrapping.
pub fn compute_earned(amount_minor: i64, config: &LoyaltyConfig) -> LoyaltyResult<EarnedUnits> {
    if amount_minor <= 0 {
        return Err(LoyaltyError::InvalidAmount { amount_minor });
    }

    let (ratio_amount, ratio_units) = config.active_ratio();
    if ratio_amount <= 0 {
        return Err(LoyaltyError::InvalidConfig {
            message: format!("ratio amount must be positive, got {}", ratio_amount),
        });
    }

    let earned = (amount_minor / ratio_amount)
        .checked_mul(ratio_units)
        .ok_or(LoyaltyError::InvalidAmount { amount_minor })?;
    Ok(match config.loyalty_mode {
        LoyaltyMode::Points => EarnedUnits {
            points: earned,
            stamps: 0,
        },
        LoyaltyMode::Stamps => EarnedUnits {
            points: 0,
            stamps: earned,
        },
    })
}

/// Whether the daily cap permits another earn for this customer today.
///
/// Only stamp mode caps earning: with `allow_multiple_stamps_per_day` off,
/// any transaction already on the date blocks another one. The count is over
/// transactions of any status, matching the attempt-based reading of the cap
/// (a cancelled earn still consumed the day).
pub fn daily_cap_allows(config: &LoyaltyConfig, transactions_on_date: usize) -> bool {
    match config.loyalty_mode {
        LoyaltyMode::Points => true,
        LoyaltyMode::Stamps => {
            config.allow_multiple_stamps_per_day || transactions_on_date == 0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn points_config(ratio_amount: i64, ratio_points: i64) -> LoyaltyConfig {
        LoyaltyConfig {
            loyalty_mode: LoyaltyMode::Points,
            points_ratio_amount_minor: ratio_amount,
            points_ratio_points: ratio_points,
            stamp_ratio_amount_minor: 50_000,
            stamp_ratio_stamps: 1,
            allow_multiple_stamps_per_day: true,
            max_redemptions_per_day: 3,
        }
    }

    fn stamp_config(allow_multiple: bool) -> LoyaltyConfig {
        LoyaltyConfig {
            loyalty_mode: LoyaltyMode::Stamps,
            points_ratio_amount_minor: 10_000,
            points_ratio_points: 1,
            stamp_ratio_amount_minor: 50_000,
            stamp_ratio_stamps: 1,
            allow_multiple_stamps_per_day: allow_multiple,
            max_redemptions_per_day: 3,
        }
    }

    #[test]
    fn exact_ratio_amount_earns_one_unit() {
        let config = points_config(10_000, 1);
        let earned = compute_earned(10_000, &config).unwrap();
        assert_eq!(earned.points, 1);
        assert_eq!(earned.stamps, 0);
    }

    #[test]
    fn one_minor_unit_below_ratio_earns_zero() {
        let config = points_config(10_000, 1);
        let earned = compute_earned(9_999, &config).unwrap();
        assert_eq!(earned.points, 0);
        assert_eq!(earned.total(), 0);
    }

    #[test]
    fn multi_unit_ratio_scales() {
        // Rp25,000 at Rp10,000 -> 1 point gives 2 points
        let config = points_config(10_000, 1);
        assert_eq!(compute_earned(25_000, &config).unwrap().points, 2);

        // 5 points per Rp10,000: Rp25,000 gives 10 points
        let config = points_config(10_000, 5);
        assert_eq!(compute_earned(25_000, &config).unwrap().points, 10);
    }

    #[test]
    fn stamp_mode_earns_stamps_not_points() {
        let config = stamp_config(true);
        let earned = compute_earned(120_000, &config).unwrap();
        assert_eq!(earned.points, 0);
        assert_eq!(earned.stamps, 2);
    }

    #[test]
    fn non_positive_amount_is_rejected() {
        let config = points_config(10_000, 1);
        assert!(matches!(
            compute_earned(0, &config),
            Err(LoyaltyError::InvalidAmount { amount_minor: 0 })
        ));
        assert!(matches!(
            compute_earned(-5, &config),
            Err(LoyaltyError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn overflowing_conversion_is_rejected() {
        // floor(i64::MAX / 1) * 1000 would wrap; the conversion must refuse.
        let config = points_config(1, 1_000);
        assert!(matches!(
            compute_earned(i64::MAX, &config),
            Err(LoyaltyError::InvalidAmount {
                amount_minor: i64::MAX
            })
        ));

        // The division alone cannot overflow a positive amount.
        let config = points_config(1, 1);
        assert_eq!(compute_earned(i64::MAX, &config).unwrap().points, i64::MAX);
    }

    #[test]
    fn points_mode_never_caps() {
        let config = points_config(10_000, 1);
        assert!(daily_cap_allows(&config, 0));
        assert!(daily_cap_allows(&config, 10));
    }

    #[test]
    fn stamp_mode_caps_when_single_stamp_per_day() {
        let config = stamp_config(false);
        assert!(daily_cap_allows(&config, 0));
        assert!(!daily_cap_allows(&config, 1));
        assert!(!daily_cap_allows(&config, 3));
    }

    #[test]
    fn stamp_mode_allows_when_flag_is_set() {
        let config = stamp_config(true);
        assert!(daily_cap_allows(&config, 5));
    }

    proptest! {
        #[test]
        fn earned_is_never_negative(
            amount in 1i64..1_000_000_000,
            ratio_amount in 1i64..10_000_000,
            ratio_points in 0i64..1_000,
        ) {
            let config = points_config(ratio_amount, ratio_points);
            let earned = compute_earned(amount, &config).unwrap();
            prop_assert!(earned.points >= 0);
            prop_assert_eq!(earned.stamps, 0);
        }

        #[test]
        fn earned_is_monotonic_in_amount(
            amount in 1i64..1_000_000_000,
            delta in 0i64..1_000_000,
            ratio_amount in 1i64..10_000_000,
        ) {
            let config = points_config(ratio_amount, 1);
            let lo = compute_earned(amount, &config).unwrap();
            let hi = compute_earned(amount + delta, &config).unwrap();
            prop_assert!(hi.points >= lo.points);
        }

        #[test]
        fn earned_respects_the_ratio_bound(
            amount in 1i64..1_000_000_000,
            ratio_amount in 1i64..10_000_000,
            ratio_points in 1i64..1_000,
        ) {
            let config = points_config(ratio_amount, ratio_points);
            let earned = compute_earned(amount, &config).unwrap();
            // floor(amount / ratio_amount) full units, each worth ratio_points
            prop_assert!(earned.points <= (amount / ratio_amount) * ratio_points);
            prop_assert!(earned.points % ratio_points == 0);
        }
    }
}
