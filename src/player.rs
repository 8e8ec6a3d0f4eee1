use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::config::MatchmakingConfig;
use crate::datacenter::DataCenter;
use crate::geo::{Location, Region};
use crate::playlist::Playlist;
use crate::search::SearchObject;

/// Platform types
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    PC,
    PlayStation,
    Xbox,
}

/// Input device types
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputDevice {
    Controller,
    MouseKeyboard,
}

/// Player activity state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerState {
    Offline,
    InLobby,
    Searching,
    InMatch,
}

/// Per-match experience terms feeding the retention model: z_i = (delta ping,
/// search time, blowout flag, win flag, performance).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExperienceVector {
    /// Average delta ping in this match (ms)
    pub avg_delta_ping: f64,
    /// Search time for this match (seconds)
    pub avg_search_time: f64,
    /// Whether this match was a blowout
    pub was_blowout: bool,
    /// Whether the player won this match
    pub won: bool,
    /// Performance index from the match (0-1 scale)
    pub performance: f64,
}

/// Player statistics and state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Player {
    pub id: usize,
    pub location: Location,
    pub region: Region,
    pub platform: Platform,
    pub input_device: InputDevice,
    pub voice_chat_enabled: bool,

    /// Raw skill value in [-1, 1]
    pub skill: f64,
    /// Skill percentile in [0, 1]
    pub skill_percentile: f64,
    /// Skill bucket (1 to B)
    pub skill_bucket: usize,

    pub state: PlayerState,
    pub current_match: Option<usize>,
    pub party_id: Option<usize>,

    pub preferred_playlists: HashSet<Playlist>,

    /// Ping to each data center (DC id -> ping in ms)
    pub dc_pings: HashMap<usize, f64>,
    pub best_dc: Option<usize>,
    pub best_ping: f64,

    /// Search start time (simulation ticks)
    pub search_start_time: Option<u64>,

    pub matches_played: usize,
    pub total_kills: usize,
    pub total_deaths: usize,
    pub wins: usize,
    pub losses: usize,

    /// Recent experience metrics kept for diagnostics; the retention model
    /// itself reads `recent_experience`.
    pub recent_delta_pings: Vec<f64>,
    pub recent_search_times: Vec<f64>,
    pub recent_blowouts: Vec<bool>,
    pub recent_performance: Vec<f64>,

    /// Last computed continuation probability, for diagnostics.
    pub continuation_prob: f64,

    /// Recent experience vectors (last N matches) consumed by the retention model.
    pub recent_experience: Vec<ExperienceVector>,

    /// When the current session started (tick), if online.
    pub session_start_time: Option<u64>,
    /// Matches played in the current session.
    pub matches_in_session: usize,

    /// Experience from the last completed session, kept for the return-probability model.
    pub last_session_experience: Vec<ExperienceVector>,
    /// When the player last went offline (tick).
    pub last_session_end_time: Option<u64>,
}

impl Player {
    pub fn new(id: usize, location: Location, skill: f64) -> Self {
        let mut preferred = HashSet::new();
        preferred.insert(Playlist::TeamDeathmatch);

        Self {
            id,
            location,
            region: Region::nearest_to(&location),
            platform: Platform::PC,
            input_device: InputDevice::Controller,
            voice_chat_enabled: true,
            skill,
            skill_percentile: 0.5,
            skill_bucket: 5,
            state: PlayerState::Offline,
            current_match: None,
            party_id: None,
            preferred_playlists: preferred,
            dc_pings: HashMap::new(),
            best_dc: None,
            best_ping: 1000.0,
            search_start_time: None,
            matches_played: 0,
            total_kills: 0,
            total_deaths: 0,
            wins: 0,
            losses: 0,
            recent_delta_pings: Vec::new(),
            recent_search_times: Vec::new(),
            recent_blowouts: Vec::new(),
            recent_performance: Vec::new(),
            continuation_prob: 0.85,
            recent_experience: Vec::new(),
            session_start_time: None,
            matches_in_session: 0,
            last_session_experience: Vec::new(),
            last_session_end_time: None,
        }
    }

    /// Acceptable data centers given how long the player has waited, with
    /// region-aware backoff:
    /// - short wait (< 10s): only the player's own region
    /// - medium wait (10-30s): own region plus adjacent regions
    /// - long wait (>= 30s): all regions
    pub fn acceptable_dcs(
        &self,
        wait_time: f64,
        config: &MatchmakingConfig,
        player_region: Region,
        data_centers: &[DataCenter],
    ) -> Vec<usize> {
        let delta_ping_allowed = config.region_delta_ping_backoff(player_region, wait_time);
        let max_ping = config.get_region_max_ping(player_region);

        let acceptable_regions: Vec<Region> = if wait_time < 10.0 {
            vec![player_region]
        } else if wait_time < 30.0 {
            let mut regions = vec![player_region];
            regions.extend(player_region.adjacent_regions());
            regions
        } else {
            Region::all().to_vec()
        };

        let acceptable_region_set: HashSet<Region> = acceptable_regions.into_iter().collect();

        self.dc_pings
            .iter()
            .filter(|(&dc_id, &ping)| {
                let ping_ok = ping <= self.best_ping + delta_ping_allowed && ping <= max_ping;
                let region_ok = data_centers
                    .iter()
                    .find(|dc| dc.id == dc_id)
                    .map(|dc| acceptable_region_set.contains(&dc.region))
                    .unwrap_or(false);
                ping_ok && region_ok
            })
            .map(|(&dc_id, _)| dc_id)
            .collect()
    }

    pub fn update_skill_bucket(&mut self, num_buckets: usize) {
        self.skill_bucket = ((self.skill_percentile * num_buckets as f64).floor() as usize)
            .clamp(1, num_buckets);
    }
}

/// A party of players searching together.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Party {
    pub id: usize,
    pub player_ids: Vec<usize>,
    pub leader_id: usize,
    pub avg_skill: f64,
    pub skill_disparity: f64,
    pub avg_skill_percentile: f64,
    pub skill_percentile_disparity: f64,
    pub preferred_playlists: HashSet<Playlist>,
    pub platforms: HashMap<Platform, usize>,
    pub input_devices: HashMap<InputDevice, usize>,
    pub avg_location: Location,
}

fn min_max(values: &[f64]) -> (f64, f64) {
    let min = values.iter().fold(f64::MAX, |a, &b| a.min(b));
    let max = values.iter().fold(f64::MIN, |a, &b| a.max(b));
    (min, max)
}

impl Party {
    pub fn size(&self) -> usize {
        self.player_ids.len()
    }

    /// Builds a party from its member players, computing every aggregate
    /// (skill, percentile, platform/input mix, centroid location) in one pass.
    /// Panics if `players` is empty: callers are expected to reject empty
    /// party requests via `PartyError::EmptyParty` before reaching here.
    pub fn from_players(id: usize, players: &[&Player]) -> Self {
        assert!(!players.is_empty(), "cannot build a party from zero players");

        let player_ids: Vec<usize> = players.iter().map(|p| p.id).collect();
        let leader_id = players[0].id;

        let skills: Vec<f64> = players.iter().map(|p| p.skill).collect();
        let avg_skill = skills.iter().sum::<f64>() / skills.len() as f64;
        let (min_skill, max_skill) = min_max(&skills);
        let skill_disparity = max_skill - min_skill;

        let percentiles: Vec<f64> = players.iter().map(|p| p.skill_percentile).collect();
        let avg_skill_percentile = percentiles.iter().sum::<f64>() / percentiles.len() as f64;
        let (min_percentile, max_percentile) = min_max(&percentiles);
        let skill_percentile_disparity = max_percentile - min_percentile;

        let mut preferred_playlists = players[0].preferred_playlists.clone();
        for player in players.iter().skip(1) {
            preferred_playlists = preferred_playlists
                .intersection(&player.preferred_playlists)
                .copied()
                .collect();
        }

        let mut platforms = HashMap::new();
        let mut input_devices = HashMap::new();
        for player in players {
            *platforms.entry(player.platform).or_insert(0) += 1;
            *input_devices.entry(player.input_device).or_insert(0) += 1;
        }

        let total_lat: f64 = players.iter().map(|p| p.location.lat).sum();
        let total_lon: f64 = players.iter().map(|p| p.location.lon).sum();
        let count = players.len() as f64;
        let avg_location = Location::new(total_lat / count, total_lon / count);

        Self {
            id,
            player_ids,
            leader_id,
            avg_skill,
            skill_disparity,
            avg_skill_percentile,
            skill_percentile_disparity,
            preferred_playlists,
            platforms,
            input_devices,
            avg_location,
        }
    }

    /// Recomputes every aggregate after membership changes (join/leave).
    pub fn update_aggregates(&mut self, players: &HashMap<usize, Player>) {
        let party_players: Vec<&Player> = self
            .player_ids
            .iter()
            .filter_map(|id| players.get(id))
            .collect();

        if party_players.is_empty() {
            return;
        }

        let skills: Vec<f64> = party_players.iter().map(|p| p.skill).collect();
        self.avg_skill = skills.iter().sum::<f64>() / skills.len() as f64;
        let (min_skill, max_skill) = min_max(&skills);
        self.skill_disparity = max_skill - min_skill;

        let percentiles: Vec<f64> = party_players.iter().map(|p| p.skill_percentile).collect();
        self.avg_skill_percentile = percentiles.iter().sum::<f64>() / percentiles.len() as f64;
        let (min_percentile, max_percentile) = min_max(&percentiles);
        self.skill_percentile_disparity = max_percentile - min_percentile;

        if let Some(first_player) = party_players.first() {
            self.preferred_playlists = first_player.preferred_playlists.clone();
            for player in party_players.iter().skip(1) {
                self.preferred_playlists = self
                    .preferred_playlists
                    .intersection(&player.preferred_playlists)
                    .copied()
                    .collect();
            }
        }

        self.platforms.clear();
        self.input_devices.clear();
        for player in &party_players {
            *self.platforms.entry(player.platform).or_insert(0) += 1;
            *self.input_devices.entry(player.input_device).or_insert(0) += 1;
        }

        let total_lat: f64 = party_players.iter().map(|p| p.location.lat).sum();
        let total_lon: f64 = party_players.iter().map(|p| p.location.lon).sum();
        let count = party_players.len() as f64;
        self.avg_location = Location::new(total_lat / count, total_lon / count);
    }

    /// Converts the party into a `SearchObject`, intersecting every member's
    /// individually-acceptable data centers.
    pub fn to_search_object(
        &self,
        search_id: usize,
        search_start_time: u64,
        players: &HashMap<usize, Player>,
        config: &MatchmakingConfig,
        data_centers: &[DataCenter],
    ) -> SearchObject {
        let party_players: Vec<&Player> = self
            .player_ids
            .iter()
            .filter_map(|id| players.get(id))
            .collect();

        let wait_time = 0.0;
        let mut acceptable_dcs: Option<HashSet<usize>> = None;

        for player in &party_players {
            let player_dcs: HashSet<usize> = player
                .acceptable_dcs(wait_time, config, player.region, data_centers)
                .into_iter()
                .collect();

            acceptable_dcs = Some(match acceptable_dcs {
                None => player_dcs,
                Some(existing) => existing.intersection(&player_dcs).copied().collect(),
            });
        }

        SearchObject {
            id: search_id,
            player_ids: self.player_ids.clone(),
            avg_skill_percentile: self.avg_skill_percentile,
            skill_disparity: self.skill_percentile_disparity,
            avg_location: self.avg_location,
            platforms: self.platforms.clone(),
            input_devices: self.input_devices.clone(),
            acceptable_playlists: self.preferred_playlists.clone(),
            search_start_time,
            acceptable_dcs: acceptable_dcs.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_player(id: usize, skill: f64, location: Location) -> Player {
        Player::new(id, location, skill)
    }

    #[test]
    fn new_player_is_tagged_with_nearest_region() {
        let player = make_player(0, 0.0, Location::new(50.0, 10.0));
        assert_eq!(player.region, Region::Europe);
    }

    #[test]
    fn party_from_players_computes_skill_disparity() {
        let a = make_player(0, -0.5, Location::new(39.0, -95.0));
        let b = make_player(1, 0.5, Location::new(39.0, -95.0));
        let party = Party::from_players(0, &[&a, &b]);
        assert!((party.skill_disparity - 1.0).abs() < 1e-9);
        assert!((party.avg_skill - 0.0).abs() < 1e-9);
    }

    #[test]
    fn party_preferred_playlists_is_intersection() {
        let mut a = make_player(0, 0.0, Location::new(39.0, -95.0));
        let mut b = make_player(1, 0.0, Location::new(39.0, -95.0));
        a.preferred_playlists = [Playlist::TeamDeathmatch, Playlist::Domination]
            .into_iter()
            .collect();
        b.preferred_playlists = [Playlist::Domination, Playlist::GroundWar]
            .into_iter()
            .collect();
        let party = Party::from_players(0, &[&a, &b]);
        assert_eq!(party.preferred_playlists.len(), 1);
        assert!(party.preferred_playlists.contains(&Playlist::Domination));
    }

    #[test]
    fn short_wait_only_accepts_own_region() {
        let config = MatchmakingConfig::default();
        let dcs = DataCenter::default_footprint();
        let mut player = make_player(0, 0.0, Location::new(39.0, -95.0));
        for dc in &dcs {
            player.dc_pings.insert(dc.id, if dc.region == player.region { 20.0 } else { 150.0 });
        }
        player.best_ping = 20.0;
        let acceptable = player.acceptable_dcs(0.0, &config, player.region, &dcs);
        assert!(!acceptable.is_empty());
        for dc_id in acceptable {
            let dc = dcs.iter().find(|d| d.id == dc_id).unwrap();
            assert_eq!(dc.region, player.region);
        }
    }
}
