use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::geo::Region;

/// Per-region configuration overrides. Optional per-region settings that fall
/// back to the global config when not set.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RegionConfig {
    pub max_ping: Option<f64>,
    pub delta_ping_initial: Option<f64>,
    pub delta_ping_rate: Option<f64>,
    pub skill_similarity_initial: Option<f64>,
    pub skill_similarity_rate: Option<f64>,
}

/// Retention model configuration: P(continue) = sigma(theta^T z_i) over the
/// per-match experience vector (delta ping, search time, blowout, win, performance).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Coefficient for delta ping (typically negative: high ping reduces retention)
    pub theta_ping: f64,
    /// Coefficient for search time (typically negative: long waits reduce retention)
    pub theta_search_time: f64,
    /// Coefficient for blowout rate (typically negative: blowouts reduce retention)
    pub theta_blowout: f64,
    /// Coefficient for win rate (typically positive: winning increases retention)
    pub theta_win_rate: f64,
    /// Coefficient for performance (typically positive: good performance increases retention)
    pub theta_performance: f64,
    /// Base logit before experience terms
    pub base_continue_prob: f64,
    /// How many recent matches to include in the experience window
    pub experience_window_size: usize,
    /// Hard floor on the computed continuation probability, so a bad run of
    /// matches never pushes a player's odds of returning to zero.
    pub retention_floor: f64,
}

/// Matchmaking configuration parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchmakingConfig {
    /// Maximum acceptable ping (ms)
    pub max_ping: f64,

    /// Delta ping backoff curve parameters
    pub delta_ping_initial: f64,
    pub delta_ping_rate: f64,
    pub delta_ping_max: f64,

    /// Skill backoff curve parameters
    pub skill_similarity_initial: f64,
    pub skill_similarity_rate: f64,
    pub skill_similarity_max: f64,

    /// Maximum skill disparity curve parameters
    pub max_skill_disparity_initial: f64,
    pub max_skill_disparity_rate: f64,
    pub max_skill_disparity_max: f64,

    /// Distance metric weights
    pub weight_geo: f64,
    pub weight_skill: f64,
    pub weight_input: f64,
    pub weight_platform: f64,

    /// Quality score weights
    pub quality_weight_ping: f64,
    pub quality_weight_skill_balance: f64,
    pub quality_weight_wait_time: f64,

    /// Fraction of players that participate in parties (0.0 - 1.0)
    pub party_player_fraction: f64,

    /// Matchmaking tick interval (seconds)
    pub tick_interval: f64,

    /// Number of skill buckets
    pub num_skill_buckets: usize,

    /// Top K candidates to consider per seed
    pub top_k_candidates: usize,

    /// Enable expensive exact balancing for small modes (6v6)
    pub use_exact_team_balancing: bool,

    /// Logistic coefficient for win probability calculation
    pub gamma: f64,

    /// Blowout classification coefficients and thresholds
    pub blowout_skill_coefficient: f64,
    pub blowout_imbalance_coefficient: f64,
    pub blowout_mild_threshold: f64,
    pub blowout_moderate_threshold: f64,
    pub blowout_severe_threshold: f64,

    /// Skill learning rate (alpha in: s_i+ = s_i- + alpha * (y_hat_i - E[Y_i]))
    pub skill_learning_rate: f64,
    /// Performance noise standard deviation
    pub performance_noise_std: f64,
    /// Enable skill evolution (false = static skill, true = evolving skill)
    pub enable_skill_evolution: bool,
    /// Update skill percentiles every N matches (batch size)
    pub skill_update_batch_size: usize,

    /// Per-region configuration overrides
    pub region_configs: HashMap<Region, RegionConfig>,

    /// Retention model configuration
    pub retention_config: RetentionConfig,
}

impl Default for MatchmakingConfig {
    fn default() -> Self {
        Self {
            max_ping: 200.0,
            delta_ping_initial: 10.0,
            delta_ping_rate: 2.0,
            delta_ping_max: 100.0,
            skill_similarity_initial: 0.05,
            skill_similarity_rate: 0.01,
            skill_similarity_max: 0.5,
            max_skill_disparity_initial: 0.1,
            max_skill_disparity_rate: 0.02,
            max_skill_disparity_max: 0.8,
            weight_geo: 0.3,
            weight_skill: 0.4,
            weight_input: 0.15,
            weight_platform: 0.15,
            quality_weight_ping: 0.4,
            quality_weight_skill_balance: 0.4,
            quality_weight_wait_time: 0.2,
            // By default, target roughly 50% of players being in parties,
            // with party sizes drawn between 2-4 members.
            party_player_fraction: 0.5,
            tick_interval: 5.0,
            num_skill_buckets: 10,
            top_k_candidates: 50,
            use_exact_team_balancing: true,
            gamma: 2.0,
            blowout_skill_coefficient: 0.4,
            blowout_imbalance_coefficient: 0.3,
            blowout_mild_threshold: 0.15,
            blowout_moderate_threshold: 0.35,
            blowout_severe_threshold: 0.6,
            skill_learning_rate: 0.01,
            performance_noise_std: 0.15,
            enable_skill_evolution: true,
            skill_update_batch_size: 10,
            region_configs: HashMap::new(),
            retention_config: RetentionConfig {
                theta_ping: -0.02,
                theta_search_time: -0.015,
                theta_blowout: -0.5,
                theta_win_rate: 0.8,
                theta_performance: 0.6,
                base_continue_prob: 0.0,
                experience_window_size: 5,
                retention_floor: 0.3,
            },
        }
    }
}

impl MatchmakingConfig {
    /// Rejects configs that would silently misbehave rather than panic mid-tick:
    /// non-positive time scales, zero-weighted distance metrics, inverted backoff
    /// ceilings, and out-of-range probabilities.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval <= 0.0 {
            return Err(ConfigError::InvalidTickInterval(self.tick_interval));
        }
        if self.num_skill_buckets == 0 {
            return Err(ConfigError::InvalidSkillBuckets(self.num_skill_buckets));
        }
        if self.top_k_candidates == 0 {
            return Err(ConfigError::InvalidTopK(self.top_k_candidates));
        }

        for (field, value) in [
            ("max_ping", self.max_ping),
            ("delta_ping_initial", self.delta_ping_initial),
            ("delta_ping_rate", self.delta_ping_rate),
            ("delta_ping_max", self.delta_ping_max),
            ("skill_similarity_initial", self.skill_similarity_initial),
            ("skill_similarity_rate", self.skill_similarity_rate),
            ("skill_similarity_max", self.skill_similarity_max),
            ("max_skill_disparity_initial", self.max_skill_disparity_initial),
            ("max_skill_disparity_rate", self.max_skill_disparity_rate),
            ("max_skill_disparity_max", self.max_skill_disparity_max),
            ("weight_geo", self.weight_geo),
            ("weight_skill", self.weight_skill),
            ("weight_input", self.weight_input),
            ("weight_platform", self.weight_platform),
            ("performance_noise_std", self.performance_noise_std),
        ] {
            if value < 0.0 {
                return Err(ConfigError::NegativeParameter { field, value });
            }
        }

        if self.weight_geo == 0.0
            && self.weight_skill == 0.0
            && self.weight_input == 0.0
            && self.weight_platform == 0.0
        {
            return Err(ConfigError::AllDistanceWeightsZero);
        }

        if self.delta_ping_max < self.delta_ping_initial {
            return Err(ConfigError::BackoffCeilingBelowFloor {
                field: "delta_ping",
                initial: self.delta_ping_initial,
                max: self.delta_ping_max,
            });
        }
        if self.skill_similarity_max < self.skill_similarity_initial {
            return Err(ConfigError::BackoffCeilingBelowFloor {
                field: "skill_similarity",
                initial: self.skill_similarity_initial,
                max: self.skill_similarity_max,
            });
        }
        if self.max_skill_disparity_max < self.max_skill_disparity_initial {
            return Err(ConfigError::BackoffCeilingBelowFloor {
                field: "max_skill_disparity",
                initial: self.max_skill_disparity_initial,
                max: self.max_skill_disparity_max,
            });
        }

        if !(0.0..=1.0).contains(&self.party_player_fraction) {
            return Err(ConfigError::InvalidPartyFraction(self.party_player_fraction));
        }

        if self.gamma <= 0.0 {
            return Err(ConfigError::InvalidGamma(self.gamma));
        }

        if !(self.blowout_mild_threshold < self.blowout_moderate_threshold
            && self.blowout_moderate_threshold < self.blowout_severe_threshold)
        {
            return Err(ConfigError::InvalidBlowoutThresholds {
                mild: self.blowout_mild_threshold,
                moderate: self.blowout_moderate_threshold,
                severe: self.blowout_severe_threshold,
            });
        }

        if self.enable_skill_evolution && self.skill_update_batch_size == 0 {
            return Err(ConfigError::InvalidSkillUpdateBatch);
        }

        if !(0.0..=1.0).contains(&self.retention_config.retention_floor) {
            return Err(ConfigError::InvalidRetentionFloor(self.retention_config.retention_floor));
        }

        Ok(())
    }

    /// Allowed delta ping given how long the player has waited.
    pub fn delta_ping_backoff(&self, wait_time: f64) -> f64 {
        (self.delta_ping_initial + self.delta_ping_rate * wait_time).min(self.delta_ping_max)
    }

    /// Skill similarity tolerance given how long the player has waited.
    pub fn skill_similarity_backoff(&self, wait_time: f64) -> f64 {
        (self.skill_similarity_initial + self.skill_similarity_rate * wait_time)
            .min(self.skill_similarity_max)
    }

    /// Max skill disparity given how long the player has waited.
    pub fn skill_disparity_backoff(&self, wait_time: f64) -> f64 {
        (self.max_skill_disparity_initial + self.max_skill_disparity_rate * wait_time)
            .min(self.max_skill_disparity_max)
    }

    pub fn get_region_max_ping(&self, region: Region) -> f64 {
        self.region_configs
            .get(&region)
            .and_then(|rc| rc.max_ping)
            .unwrap_or(self.max_ping)
    }

    pub fn get_region_delta_ping_initial(&self, region: Region) -> f64 {
        self.region_configs
            .get(&region)
            .and_then(|rc| rc.delta_ping_initial)
            .unwrap_or(self.delta_ping_initial)
    }

    pub fn get_region_delta_ping_rate(&self, region: Region) -> f64 {
        self.region_configs
            .get(&region)
            .and_then(|rc| rc.delta_ping_rate)
            .unwrap_or(self.delta_ping_rate)
    }

    pub fn get_region_skill_similarity_initial(&self, region: Region) -> f64 {
        self.region_configs
            .get(&region)
            .and_then(|rc| rc.skill_similarity_initial)
            .unwrap_or(self.skill_similarity_initial)
    }

    pub fn get_region_skill_similarity_rate(&self, region: Region) -> f64 {
        self.region_configs
            .get(&region)
            .and_then(|rc| rc.skill_similarity_rate)
            .unwrap_or(self.skill_similarity_rate)
    }

    pub fn region_delta_ping_backoff(&self, region: Region, wait_time: f64) -> f64 {
        let initial = self.get_region_delta_ping_initial(region);
        let rate = self.get_region_delta_ping_rate(region);
        (initial + rate * wait_time).min(self.delta_ping_max)
    }

    pub fn region_skill_similarity_backoff(&self, region: Region, wait_time: f64) -> f64 {
        let initial = self.get_region_skill_similarity_initial(region);
        let rate = self.get_region_skill_similarity_rate(region);
        (initial + rate * wait_time).min(self.skill_similarity_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(MatchmakingConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_tick_interval() {
        let mut config = MatchmakingConfig::default();
        config.tick_interval = 0.0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidTickInterval(0.0))
        );
    }

    #[test]
    fn rejects_all_zero_distance_weights() {
        let mut config = MatchmakingConfig::default();
        config.weight_geo = 0.0;
        config.weight_skill = 0.0;
        config.weight_input = 0.0;
        config.weight_platform = 0.0;
        assert_eq!(config.validate(), Err(ConfigError::AllDistanceWeightsZero));
    }

    #[test]
    fn rejects_inverted_backoff_ceiling() {
        let mut config = MatchmakingConfig::default();
        config.delta_ping_max = 1.0;
        config.delta_ping_initial = 10.0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::BackoffCeilingBelowFloor {
                field: "delta_ping",
                initial: 10.0,
                max: 1.0,
            })
        );
    }

    #[test]
    fn rejects_out_of_order_blowout_thresholds() {
        let mut config = MatchmakingConfig::default();
        config.blowout_moderate_threshold = 0.1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBlowoutThresholds { .. })
        ));
    }

    #[test]
    fn backoff_is_monotonic_in_wait_time_until_ceiling() {
        let config = MatchmakingConfig::default();
        let early = config.delta_ping_backoff(0.0);
        let later = config.delta_ping_backoff(10.0);
        assert!(later >= early);
        assert!(config.delta_ping_backoff(1_000_000.0) <= config.delta_ping_max);
    }

    #[test]
    fn region_override_falls_back_to_global() {
        let config = MatchmakingConfig::default();
        assert_eq!(
            config.get_region_max_ping(Region::NorthAmerica),
            config.max_ping
        );
    }

    #[test]
    fn region_override_wins_when_set() {
        let mut config = MatchmakingConfig::default();
        config.region_configs.insert(
            Region::Europe,
            RegionConfig {
                max_ping: Some(80.0),
                ..Default::default()
            },
        );
        assert_eq!(config.get_region_max_ping(Region::Europe), 80.0);
        assert_eq!(config.get_region_max_ping(Region::NorthAmerica), config.max_ping);
    }
}
