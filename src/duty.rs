//! Tier to duty-cycle mapping.

use log::warn;

use crate::{
    error::{FanControlError, Result},
    tier::Tier,
};

/// Duty-cycle percentages indexed by tier.
///
/// Entry 0 is the floor duty; entry `i` applies from tier `i` upward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatioTable(Vec<u8>);

impl RatioTable {
    /// Builds a table from configured percentages.
    ///
    /// Fractional percentages are truncated to whole duties. Empty tables and
    /// values outside 0-100 are rejected.
    pub fn new(ratios: &[f64]) -> Result<Self> {
        if ratios.is_empty() {
            return Err(FanControlError::config("rpm_ratio cannot be empty"));
        }
        if let Some(bad) = ratios
            .iter()
            .find(|r| !r.is_finite() || !(0.0..=100.0).contains(*r))
        {
            return Err(FanControlError::config(format!(
                "rpm_ratio value {bad} is outside 0-100"
            )));
        }

        // Range checked above, so the cast only drops the fraction.
        let duties: Vec<u8> = ratios.iter().map(|r| r.trunc() as u8).collect();
        if duties.windows(2).any(|w| w[0] > w[1]) {
            warn!("rpm_ratio {duties:?} decreases as temperature rises");
        }
        Ok(Self(duties))
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }
}

/// Looks up the duty for `tier`; out-of-range tiers are a configuration error.
pub fn map_duty(table: &RatioTable, tier: Tier) -> Result<u8> {
    table.0.get(tier).copied().ok_or_else(|| {
        FanControlError::config(format!(
            "tier {tier} has no entry in rpm_ratio of length {}",
            table.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table() -> RatioTable {
        RatioTable::new(&[30.0, 45.0, 60.0, 75.0, 100.0]).unwrap()
    }

    #[test]
    fn maps_each_tier() {
        let t = table();
        let duties: Vec<u8> = (0..t.len()).map(|tier| map_duty(&t, tier).unwrap()).collect();
        assert_eq!(duties, vec![30, 45, 60, 75, 100]);
    }

    #[test]
    fn out_of_range_tier_is_error_not_clamped() {
        let err = map_duty(&table(), 5).unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");
    }

    #[test]
    fn rejects_values_above_hundred() {
        assert!(RatioTable::new(&[30.0, 120.0]).is_err());
    }

    #[test]
    fn rejects_negative_and_nan() {
        assert!(RatioTable::new(&[-1.0, 50.0]).is_err());
        assert!(RatioTable::new(&[30.0, f64::NAN]).is_err());
    }

    #[test]
    fn fractional_ratios_truncate() {
        let t = RatioTable::new(&[30.0, 62.9, 100.0]).unwrap();
        assert_eq!(map_duty(&t, 1).unwrap(), 62);
        assert_eq!(map_duty(&t, 2).unwrap(), 100);
    }

    #[test]
    fn rejects_empty_table() {
        assert!(RatioTable::new(&[]).is_err());
    }

    #[test]
    fn decreasing_table_still_accepted() {
        assert!(RatioTable::new(&[60.0, 40.0]).is_ok());
    }
}
