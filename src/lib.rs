mod config;
mod datacenter;
mod error;
pub mod experiment;
mod geo;
mod match_state;
mod matchmaker;
mod outcome;
mod player;
mod playlist;
mod population;
mod rng;
mod search;
mod stats;
mod team_balance;

pub mod engine;

pub use config::{MatchmakingConfig, RegionConfig, RetentionConfig};
pub use engine::Engine;
pub use error::{ConfigError, EngineError, PartyError};
pub use geo::{Location, Region};
pub use player::{InputDevice, Platform, Player, PlayerState};
pub use playlist::Playlist;
pub use stats::SimulationStats;

use wasm_bindgen::prelude::*;

/// Initialize panic hook for better error messages
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// WASM-exposed engine wrapper. Thin JSON-in/JSON-out facade over `Engine`;
/// the dashboard this serves lives outside this crate.
#[wasm_bindgen]
pub struct SimulationEngine {
    engine: Engine,
}

#[wasm_bindgen]
impl SimulationEngine {
    /// Create a new simulation with default config
    #[wasm_bindgen(constructor)]
    pub fn new(seed: u64) -> Result<SimulationEngine, JsValue> {
        let engine = Engine::new(seed, MatchmakingConfig::default())
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(SimulationEngine { engine })
    }

    /// Create with custom config
    pub fn new_with_config(seed: u64, config_json: &str) -> Result<SimulationEngine, JsValue> {
        let config: MatchmakingConfig = serde_json::from_str(config_json)
            .map_err(|e| JsValue::from_str(&format!("Config parse error: {}", e)))?;
        let engine = Engine::new(seed, config).map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(SimulationEngine { engine })
    }

    /// Generate player population
    pub fn generate_population(&mut self, count: usize) {
        self.engine.generate_population(count);
    }

    /// Run single tick
    pub fn tick(&mut self) -> Result<(), JsValue> {
        self.engine.tick().map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Run multiple ticks
    pub fn run(&mut self, ticks: u64) -> Result<(), JsValue> {
        self.engine.run(ticks).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Get current time
    pub fn get_time(&self) -> u64 {
        self.engine.get_time()
    }

    /// Get total players
    pub fn get_total_players(&self) -> usize {
        self.engine.get_total_players()
    }

    /// Get players by state
    pub fn get_player_counts(&self) -> String {
        let (offline, in_lobby, searching, in_match) = self.engine.get_player_counts();
        serde_json::json!({
            "offline": offline,
            "in_lobby": in_lobby,
            "searching": searching,
            "in_match": in_match,
        })
        .to_string()
    }

    /// Get statistics JSON
    pub fn get_stats(&self) -> String {
        serde_json::to_string(self.engine.get_stats()).unwrap_or_default()
    }

    /// Get skill distribution histogram as JSON
    pub fn get_skill_distribution(&self, num_bins: usize) -> String {
        serde_json::to_string(&self.engine.get_skill_distribution(num_bins)).unwrap_or_default()
    }

    /// Set arrival rate
    pub fn set_arrival_rate(&mut self, rate: f64) {
        self.engine.set_arrival_rate(rate);
    }

    /// Update matchmaking config
    pub fn update_config(&mut self, config_json: &str) -> Result<(), JsValue> {
        let config: MatchmakingConfig = serde_json::from_str(config_json)
            .map_err(|e| JsValue::from_str(&format!("Config parse error: {}", e)))?;
        self.engine.update_config(config).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Get default config as JSON
    pub fn get_default_config() -> String {
        serde_json::to_string(&MatchmakingConfig::default()).unwrap_or_default()
    }

    /// Get search time histogram (for visualization)
    pub fn get_search_time_histogram(&self, num_bins: usize) -> String {
        serde_json::to_string(&self.engine.get_search_time_histogram(num_bins)).unwrap_or_default()
    }

    /// Get delta ping histogram
    pub fn get_delta_ping_histogram(&self, num_bins: usize) -> String {
        serde_json::to_string(&self.engine.get_delta_ping_histogram(num_bins)).unwrap_or_default()
    }

    /// Get bucket stats as JSON
    pub fn get_bucket_stats(&self) -> String {
        serde_json::to_string(self.engine.get_bucket_stats()).unwrap_or_default()
    }

    /// Get time series snapshots as JSON
    pub fn get_time_series(&self) -> String {
        serde_json::to_string(self.engine.get_time_series()).unwrap_or_default()
    }

    /// Get data center info
    pub fn get_data_centers(&self) -> String {
        serde_json::to_string(self.engine.get_data_centers()).unwrap_or_default()
    }

    /// Create a party from player IDs
    pub fn create_party(&mut self, player_ids_json: &str) -> Result<String, JsValue> {
        let player_ids: Vec<usize> = serde_json::from_str(player_ids_json)
            .map_err(|e| JsValue::from_str(&format!("Player IDs parse error: {}", e)))?;

        self.engine
            .create_party(&player_ids)
            .map(|party_id| serde_json::json!({ "party_id": party_id }).to_string())
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Join a player to a party
    pub fn join_party(&mut self, party_id: usize, player_id: usize) -> Result<(), JsValue> {
        self.engine.join_party(party_id, player_id).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Leave the current party
    pub fn leave_party(&mut self, player_id: usize) -> Result<(), JsValue> {
        self.engine.leave_party(player_id).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Disband a party
    pub fn disband_party(&mut self, party_id: usize) -> Result<(), JsValue> {
        self.engine.disband_party(party_id).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Get party members
    pub fn get_party_members(&self, party_id: usize) -> Result<String, JsValue> {
        self.engine
            .get_party_members(party_id)
            .map(|members| serde_json::to_string(&members).unwrap_or_default())
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }
}

/// Runs a single-parameter sweep over `base_config` and returns one
/// statistics snapshot per value as a JSON array.
#[wasm_bindgen]
pub fn run_experiment(
    base_config_json: &str,
    parameter: &str,
    values_json: &str,
    population: usize,
    ticks_per_run: u64,
    seed: u64,
) -> Result<String, JsValue> {
    let base_config: MatchmakingConfig = serde_json::from_str(base_config_json)
        .map_err(|e| JsValue::from_str(&format!("Config parse error: {}", e)))?;

    let values: Vec<f64> = serde_json::from_str(values_json)
        .map_err(|e| JsValue::from_str(&format!("Values parse error: {}", e)))?;

    let mut results = Vec::new();

    for (i, &value) in values.iter().enumerate() {
        let config = experiment::with_parameter_override(&base_config, parameter, value)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;

        let mut engine = Engine::new(seed.wrapping_add(i as u64), config)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        engine.generate_population(population);
        engine.run(ticks_per_run).map_err(|e| JsValue::from_str(&e.to_string()))?;

        let stats = engine.get_stats();
        results.push(serde_json::json!({
            "parameter_value": value,
            "avg_search_time": stats.avg_search_time,
            "search_time_p90": stats.search_time_p90,
            "avg_delta_ping": stats.avg_delta_ping,
            "delta_ping_p90": stats.delta_ping_p90,
            "avg_skill_disparity": stats.avg_skill_disparity,
            "blowout_rate": stats.blowout_rate,
            "total_matches": stats.total_matches,
        }));
    }

    serde_json::to_string(&results).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Runs two configs head-to-head over the same seed/population/tick budget
/// and returns both full statistics snapshots as JSON.
#[wasm_bindgen]
pub fn compare_configs(
    config_a_json: &str,
    config_b_json: &str,
    population: usize,
    ticks: u64,
    seed: u64,
) -> Result<String, JsValue> {
    let config_a: MatchmakingConfig = serde_json::from_str(config_a_json)
        .map_err(|e| JsValue::from_str(&format!("Config A parse error: {}", e)))?;
    let config_b: MatchmakingConfig = serde_json::from_str(config_b_json)
        .map_err(|e| JsValue::from_str(&format!("Config B parse error: {}", e)))?;

    let mut engine_a = Engine::new(seed, config_a).map_err(|e| JsValue::from_str(&e.to_string()))?;
    engine_a.generate_population(population);
    engine_a.run(ticks).map_err(|e| JsValue::from_str(&e.to_string()))?;

    let mut engine_b = Engine::new(seed, config_b).map_err(|e| JsValue::from_str(&e.to_string()))?;
    engine_b.generate_population(population);
    engine_b.run(ticks).map_err(|e| JsValue::from_str(&e.to_string()))?;

    let comparison = serde_json::json!({
        "config_a": {
            "stats": engine_a.get_stats(),
            "bucket_stats": engine_a.get_bucket_stats(),
        },
        "config_b": {
            "stats": engine_b.get_stats(),
            "bucket_stats": engine_b.get_bucket_stats(),
        }
    });

    serde_json::to_string(&comparison).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}
