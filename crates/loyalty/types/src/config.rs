use serde::{Deserialize, Serialize};

use crate::error::{LoyaltyError, LoyaltyResult};

/// Which loyalty currency a restaurant runs on.
///
/// A restaurant is in exactly one mode; every earn and spend record carries
/// units of that mode only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoyaltyMode {
    Points,
    Stamps,
}

impl std::fmt::Display for LoyaltyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoyaltyMode::Points => write!(f, "points"),
            LoyaltyMode::Stamps => write!(f, "stamps"),
        }
    }
}

/// Per-restaurant loyalty configuration.
///
/// Ratios convert a purchase amount (minor currency units) into loyalty
/// units: `floor(amount / ratio_amount_minor) * ratio_units`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoyaltyConfig {
    pub loyalty_mode: LoyaltyMode,
    /// Minor currency units per point grant (points mode).
    pub points_ratio_amount_minor: i64,
    /// Points granted per ratio amount (points mode).
    pub points_ratio_points: i64,
    /// Minor currency units per stamp grant (stamp mode).
    pub stamp_ratio_amount_minor: i64,
    /// Stamps granted per ratio amount (stamp mode).
    pub stamp_ratio_stamps: i64,
    /// When false, a stamp-mode customer may earn at most once per day.
    pub allow_multiple_stamps_per_day: bool,
    /// Redemptions a customer may create per day.
    pub max_redemptions_per_day: u32,
}

impl LoyaltyConfig {
    /// The ratio pair for the active mode: (amount_minor, units).
    pub fn active_ratio(&self) -> (i64, i64) {
        match self.loyalty_mode {
            LoyaltyMode::Points => (self.points_ratio_amount_minor, self.points_ratio_points),
            LoyaltyMode::Stamps => (self.stamp_ratio_amount_minor, self.stamp_ratio_stamps),
        }
    }

    /// Reject ratios and limits that would make the ledger misbehave.
    pub fn validate(&self) -> LoyaltyResult<()> {
        let (ratio_amount, ratio_units) = self.active_ratio();
        if ratio_amount <= 0 {
            return Err(LoyaltyError::InvalidConfig {
                message: format!(
                    "{} ratio amount must be positive, got {}",
                    self.loyalty_mode, ratio_amount
                ),
            });
        }
        if ratio_units < 0 {
            return Err(LoyaltyError::InvalidConfig {
                message: format!(
                    "{} ratio units must not be negative, got {}",
                    self.loyalty_mode, ratio_units
                ),
            });
        }
        if self.max_redemptions_per_day == 0 {
            return Err(LoyaltyError::InvalidConfig {
                message: "max_redemptions_per_day must be at least 1".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points_config() -> LoyaltyConfig {
        LoyaltyConfig {
            loyalty_mode: LoyaltyMode::Points,
            points_ratio_amount_minor: 10_000,
            points_ratio_points: 1,
            stamp_ratio_amount_minor: 50_000,
            stamp_ratio_stamps: 1,
            allow_multiple_stamps_per_day: true,
            max_redemptions_per_day: 3,
        }
    }

    #[test]
    fn active_ratio_follows_mode() {
        let mut config = points_config();
        assert_eq!(config.active_ratio(), (10_000, 1));

        config.loyalty_mode = LoyaltyMode::Stamps;
        assert_eq!(config.active_ratio(), (50_000, 1));
    }

    #[test]
    fn validate_rejects_zero_ratio_amount() {
        let mut config = points_config();
        config.points_ratio_amount_minor = 0;
        assert!(matches!(
            config.validate(),
            Err(LoyaltyError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn validate_rejects_zero_redemption_limit() {
        let mut config = points_config();
        config.max_redemptions_per_day = 0;
        assert!(matches!(
            config.validate(),
            Err(LoyaltyError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn config_errors_name_the_offending_field() {
        let mut config = points_config();
        config.max_redemptions_per_day = 0;
        let message = config.validate().unwrap_err().to_string();
        assert!(message.contains("max_redemptions_per_day"));
    }

    #[test]
    fn mode_serializes_snake_case() {
        let json = serde_json::to_string(&LoyaltyMode::Stamps).unwrap();
        assert_eq!(json, "\"stamps\"");
    }
}
