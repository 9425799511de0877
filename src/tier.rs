//! Tier evaluation for temperature watch rules.
//!
//! A watch rule pairs a sensor-name matcher with an ascending threshold
//! list. A reading's tier is the number of thresholds at or below its value,
//! so a rule with `N` thresholds yields tiers `0..=N`. The hottest matching
//! sensor decides the rule's tier and the hottest rule decides the group's.

use log::{debug, warn};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::{
    error::{FanControlError, Result},
    sensors::SensorReading,
};

/// Discrete fan-speed bracket; `0` is below every threshold.
pub type Tier = usize;

/// What a group does when a watch rule matches no sensor in the snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedPolicy {
    /// The rule contributes tier 0 (fans stay at the floor duty).
    #[default]
    Ignore,
    /// The rule contributes its highest tier.
    MaxTier,
    /// The group's tick fails with [`FanControlError::UnmatchedSensor`].
    Error,
}

/// Sensor-name matcher compiled once at configuration load.
///
/// Matching is case-insensitive and anchored at the start of the name.
/// Patterns without regex metacharacters skip the regex engine.
#[derive(Debug, Clone)]
pub enum SensorMatcher {
    Literal { pattern: String, folded: String },
    Pattern(Regex),
}

impl SensorMatcher {
    pub fn compile(pattern: &str) -> Result<Self> {
        if regex::escape(pattern) == pattern {
            return Ok(Self::Literal {
                pattern: pattern.to_string(),
                folded: pattern.to_lowercase(),
            });
        }

        RegexBuilder::new(&format!("^(?:{pattern})"))
            .case_insensitive(true)
            .build()
            .map(Self::Pattern)
            .map_err(|e| FanControlError::config(format!("invalid sensor pattern '{pattern}': {e}")))
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Literal { folded, .. } => name.to_lowercase().starts_with(folded.as_str()),
            Self::Pattern(re) => re.is_match(name),
        }
    }

    /// The pattern as written in the configuration.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Literal { pattern, .. } => pattern,
            // Strip the `^(?:` prefix and `)` suffix added by `compile`.
            Self::Pattern(re) => {
                let s = re.as_str();
                &s[4..s.len() - 1]
            }
        }
    }
}

/// A sensor matcher paired with its ascending temperature thresholds.
#[derive(Debug, Clone)]
pub struct WatchRule {
    matcher: SensorMatcher,
    thresholds: Vec<f64>,
}

impl WatchRule {
    /// Builds a rule, rejecting invalid patterns and unordered thresholds.
    pub fn new(pattern: &str, thresholds: Vec<f64>) -> Result<Self> {
        if thresholds.iter().any(|t| !t.is_finite()) {
            return Err(FanControlError::config(format!(
                "thresholds for '{pattern}' must be finite numbers"
            )));
        }
        if thresholds.windows(2).any(|w| w[0] > w[1]) {
            return Err(FanControlError::config(format!(
                "thresholds for '{pattern}' must be in ascending order: {thresholds:?}"
            )));
        }

        Ok(Self {
            matcher: SensorMatcher::compile(pattern)?,
            thresholds,
        })
    }

    pub fn pattern(&self) -> &str {
        self.matcher.as_str()
    }

    /// Highest tier this rule can produce.
    pub fn max_tier(&self) -> Tier {
        self.thresholds.len()
    }

    /// Tier of a single value: the count of thresholds `<= value`.
    pub fn tier_of(&self, value: f64) -> Tier {
        self.thresholds.partition_point(|t| *t <= value)
    }

    /// Hottest matching reading and its tier, or `None` when nothing matches.
    pub fn hottest<'a>(&self, snapshot: &'a [SensorReading]) -> Option<(Tier, &'a SensorReading)> {
        snapshot
            .iter()
            .filter(|r| self.matcher.matches(&r.name))
            .map(|r| (self.tier_of(r.value), r))
            .fold(None, |best, (tier, reading)| match best {
                Some((best_tier, _)) if best_tier >= tier => best,
                _ => Some((tier, reading)),
            })
    }
}

/// Tier of one rule for a snapshot; `0` if no sensor matches.
pub fn evaluate_rule(rule: &WatchRule, snapshot: &[SensorReading]) -> Tier {
    rule.hottest(snapshot).map_or(0, |(tier, _)| tier)
}

/// Worst-case tier across all rules of a group.
///
/// Rules that match nothing are resolved through `policy`. An empty rule
/// list yields tier 0.
pub fn evaluate_group(
    rules: &[WatchRule],
    snapshot: &[SensorReading],
    policy: UnmatchedPolicy,
) -> Result<Tier> {
    let mut group_tier = 0;

    for rule in rules {
        let tier = match rule.hottest(snapshot) {
            Some((tier, reading)) => {
                debug!(
                    "Rule '{}': sensor {} at {:.1} -> tier {tier}",
                    rule.pattern(),
                    reading.name,
                    reading.value
                );
                tier
            }
            None => match policy {
                UnmatchedPolicy::Ignore => {
                    debug!("Rule '{}' matched no sensor", rule.pattern());
                    0
                }
                UnmatchedPolicy::MaxTier => {
                    warn!(
                        "Rule '{}' matched no sensor, assuming tier {}",
                        rule.pattern(),
                        rule.max_tier()
                    );
                    rule.max_tier()
                }
                UnmatchedPolicy::Error => {
                    return Err(FanControlError::UnmatchedSensor {
                        pattern: rule.pattern().to_string(),
                    });
                }
            },
        };
        group_tier = group_tier.max(tier);
    }

    Ok(group_tier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn cpu_rule() -> WatchRule {
        WatchRule::new("CPU.*Temp", vec![40.0, 46.0, 52.0, 58.0]).unwrap()
    }

    fn snapshot(readings: &[(&str, f64)]) -> Vec<SensorReading> {
        readings
            .iter()
            .map(|(name, value)| SensorReading::new(*name, *value))
            .collect()
    }

    #[test]
    fn reading_between_thresholds() {
        let s = snapshot(&[("CPU Temp", 45.0)]);
        assert_eq!(evaluate_rule(&cpu_rule(), &s), 1);
    }

    #[test]
    fn boundary_counts_as_crossed() {
        let s = snapshot(&[("CPU Temp", 46.0)]);
        assert_eq!(evaluate_rule(&cpu_rule(), &s), 2);
    }

    #[test]
    fn hottest_matching_sensor_wins() {
        let s = snapshot(&[("CPU1 Temp", 44.0), ("CPU2 Temp", 53.0), ("PCH Temp", 90.0)]);
        let (tier, reading) = cpu_rule().hottest(&s).unwrap();
        assert_eq!(tier, 3);
        assert_eq!(reading.name, "CPU2 Temp");
    }

    #[test]
    fn no_match_is_tier_zero() {
        let s = snapshot(&[("System Temp", 70.0)]);
        assert_eq!(evaluate_rule(&cpu_rule(), &s), 0);
    }

    #[test]
    fn empty_thresholds_always_tier_zero() {
        let rule = WatchRule::new("CPU Temp", vec![]).unwrap();
        assert_eq!(evaluate_rule(&rule, &snapshot(&[("CPU Temp", 99.0)])), 0);
    }

    #[test]
    fn matching_is_case_insensitive_and_anchored() {
        let rule = WatchRule::new("cpu", vec![10.0]).unwrap();
        assert_eq!(evaluate_rule(&rule, &snapshot(&[("CPU Temp", 20.0)])), 1);
        assert_eq!(evaluate_rule(&rule, &snapshot(&[("Peripheral CPU", 20.0)])), 0);

        let regex_rule = WatchRule::new("p[12]-dimm", vec![10.0]).unwrap();
        assert_eq!(
            evaluate_rule(&regex_rule, &snapshot(&[("P1-DIMMA1 Temp", 20.0)])),
            1
        );
    }

    #[test]
    fn literal_pattern_skips_regex() {
        let matcher = SensorMatcher::compile("PCH Temp").unwrap();
        assert!(matches!(matcher, SensorMatcher::Literal { .. }));
        assert_eq!(matcher.as_str(), "PCH Temp");

        let matcher = SensorMatcher::compile("CPU\\d Temp").unwrap();
        assert!(matches!(matcher, SensorMatcher::Pattern(_)));
        assert_eq!(matcher.as_str(), "CPU\\d Temp");
    }

    #[test]
    fn invalid_pattern_is_configuration_error() {
        let err = WatchRule::new("CPU(", vec![40.0]).unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");
    }

    #[test]
    fn descending_thresholds_rejected() {
        let err = WatchRule::new("CPU", vec![50.0, 40.0]).unwrap_err();
        assert!(err.to_string().contains("ascending"));
    }

    #[test]
    fn group_takes_worst_rule() {
        let rules = vec![
            cpu_rule(),
            WatchRule::new("PCH", vec![60.0, 70.0]).unwrap(),
        ];
        let s = snapshot(&[("CPU Temp", 41.0), ("PCH Temp", 75.0)]);
        assert_eq!(evaluate_group(&rules, &s, UnmatchedPolicy::Ignore).unwrap(), 2);
    }

    #[test]
    fn empty_watch_list_is_tier_zero() {
        let s = snapshot(&[("CPU Temp", 80.0)]);
        assert_eq!(evaluate_group(&[], &s, UnmatchedPolicy::Error).unwrap(), 0);
    }

    #[test]
    fn unmatched_policies() {
        let rules = vec![cpu_rule()];
        let s = snapshot(&[("System Temp", 30.0)]);

        assert_eq!(evaluate_group(&rules, &s, UnmatchedPolicy::Ignore).unwrap(), 0);
        assert_eq!(evaluate_group(&rules, &s, UnmatchedPolicy::MaxTier).unwrap(), 4);
        assert_eq!(
            evaluate_group(&rules, &s, UnmatchedPolicy::Error).unwrap_err(),
            FanControlError::UnmatchedSensor {
                pattern: "CPU.*Temp".into()
            }
        );
    }

    fn sorted_thresholds() -> impl Strategy<Value = Vec<f64>> {
        prop::collection::vec(0.0f64..120.0, 0..8).prop_map(|mut v| {
            v.sort_by(|a, b| a.partial_cmp(b).unwrap());
            v
        })
    }

    proptest! {
        #[test]
        fn tier_within_bounds(thresholds in sorted_thresholds(), value in -50.0f64..200.0) {
            let rule = WatchRule::new("CPU", thresholds.clone()).unwrap();
            let tier = evaluate_rule(&rule, &[SensorReading::new("CPU Temp", value)]);
            prop_assert!(tier <= thresholds.len());
        }

        #[test]
        fn tier_monotonic_in_value(
            thresholds in sorted_thresholds(),
            a in -50.0f64..200.0,
            b in -50.0f64..200.0,
        ) {
            let rule = WatchRule::new("CPU", thresholds).unwrap();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(rule.tier_of(lo) <= rule.tier_of(hi));
        }

        #[test]
        fn group_is_max_of_rules(
            t1 in sorted_thresholds(),
            t2 in sorted_thresholds(),
            cpu in 0.0f64..120.0,
            pch in 0.0f64..120.0,
        ) {
            let rules = vec![
                WatchRule::new("CPU", t1).unwrap(),
                WatchRule::new("PCH", t2).unwrap(),
            ];
            let s = vec![SensorReading::new("CPU Temp", cpu), SensorReading::new("PCH Temp", pch)];
            let expected = evaluate_rule(&rules[0], &s).max(evaluate_rule(&rules[1], &s));
            prop_assert_eq!(evaluate_group(&rules, &s, UnmatchedPolicy::Ignore).unwrap(), expected);
        }
    }
}
