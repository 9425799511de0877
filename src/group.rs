//! Per-group fan control.
//!
//! A [`GroupController`] owns one fan group's compiled watch rules and ratio
//! table. Each tick it turns the shared sensor snapshot into a duty and sends
//! it, without remembering anything from the previous tick.

use log::{debug, info};

use crate::{
    config::FanGroupCfg,
    duty::{RatioTable, map_duty},
    error::{FanControlError, Result},
    fan_controller::FanClient,
    sensors::SensorReading,
    tier::{Tier, UnmatchedPolicy, WatchRule, evaluate_group},
};

#[derive(Debug, Clone)]
pub struct GroupController {
    name: String,
    enabled: bool,
    rules: Vec<WatchRule>,
    ratio: RatioTable,
    fans: Vec<String>,
    on_unmatched: UnmatchedPolicy,
}

impl GroupController {
    /// Compiles a group configuration.
    ///
    /// Every rule must have exactly one threshold fewer than the ratio table
    /// has entries, so that any tier it yields indexes the table.
    pub fn from_cfg(name: &str, cfg: &FanGroupCfg) -> Result<Self> {
        let ratio = RatioTable::new(&cfg.rpm_ratio)
            .map_err(|e| FanControlError::config(format!("{name} group: {e}")))?;

        let rules = cfg
            .temp_watch_list
            .iter()
            .map(|watch| {
                if watch.temp_threshold.len() + 1 != ratio.len() {
                    return Err(FanControlError::config(format!(
                        "{name} group: '{}' has {} thresholds but rpm_ratio has {} entries (expected {})",
                        watch.sensor_regex,
                        watch.temp_threshold.len(),
                        ratio.len(),
                        watch.temp_threshold.len() + 1
                    )));
                }
                WatchRule::new(&watch.sensor_regex, watch.temp_threshold.clone())
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: name.to_string(),
            enabled: cfg.enable,
            rules,
            ratio,
            fans: cfg.fan_list.clone(),
            on_unmatched: cfg.on_unmatched,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn fans(&self) -> &[String] {
        &self.fans
    }

    /// Worst-case tier of this group for `snapshot`.
    pub fn evaluate(&self, snapshot: &[SensorReading]) -> Result<Tier> {
        evaluate_group(&self.rules, snapshot, self.on_unmatched)
    }

    /// Duty this group wants for `snapshot`.
    pub fn target_duty(&self, snapshot: &[SensorReading]) -> Result<u8> {
        let tier = self.evaluate(snapshot)?;
        let duty = map_duty(&self.ratio, tier)?;
        debug!("{} group: tier {tier} -> {duty}%", self.name);
        Ok(duty)
    }

    /// Runs one tick for this group.
    ///
    /// Returns the duty sent, or `None` when the group is disabled and left
    /// to the controller's own fan management.
    pub async fn tick<F>(&self, snapshot: &[SensorReading], fans: &F) -> Result<Option<u8>>
    where
        F: FanClient + ?Sized,
    {
        if !self.enabled {
            return Ok(None);
        }

        let duty = self.target_duty(snapshot)?;
        fans.set_fan_duty(&self.name, duty).await?;
        info!("{} group fan duty set to {duty}%", self.name);
        Ok(Some(duty))
    }
}
