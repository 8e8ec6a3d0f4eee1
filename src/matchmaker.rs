use std::collections::{HashMap, HashSet};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::MatchmakingConfig;
use crate::datacenter::DataCenter;
use crate::geo::Region;
use crate::player::{InputDevice, Party, Player};
use crate::playlist::Playlist;
use crate::search::SearchObject;
use crate::team_balance::balance_teams;

/// The matchmaking engine: distance metric, lobby feasibility, and per-tick
/// seed+greedy lobby construction.
pub struct Matchmaker {
    config: MatchmakingConfig,
}

impl Matchmaker {
    pub fn new(config: MatchmakingConfig) -> Self {
        Self { config }
    }

    /// Weighted distance between two searches: geographic distance (normalized
    /// by a 20,000km span), skill-percentile distance, and the true mismatch
    /// fractions for input device and platform across the two groups' players.
    pub fn calculate_distance(&self, search_a: &SearchObject, search_b: &SearchObject) -> f64 {
        let geo_dist = search_a.avg_location.distance_km(&search_b.avg_location) / 20000.0;
        let skill_dist = (search_a.avg_skill_percentile - search_b.avg_skill_percentile).abs();
        let input_dist = self.input_device_distance(search_a, search_b);
        let platform_dist = self.platform_distance(search_a, search_b);

        self.config.weight_geo * geo_dist
            + self.config.weight_skill * skill_dist
            + self.config.weight_input * input_dist
            + self.config.weight_platform * platform_dist
    }

    /// Fraction of cross-device player pairs that would result from merging
    /// the two groups (e.g. all mouse/keyboard vs all controller gives 1.0;
    /// a 50/50 mix on either side gives something in between).
    fn input_device_distance(&self, a: &SearchObject, b: &SearchObject) -> f64 {
        let a_mkb = a.input_devices.get(&InputDevice::MouseKeyboard).copied().unwrap_or(0) as f64;
        let a_ctrl = a.input_devices.get(&InputDevice::Controller).copied().unwrap_or(0) as f64;
        let b_mkb = b.input_devices.get(&InputDevice::MouseKeyboard).copied().unwrap_or(0) as f64;
        let b_ctrl = b.input_devices.get(&InputDevice::Controller).copied().unwrap_or(0) as f64;

        let total = (a_mkb + a_ctrl) * (b_mkb + b_ctrl);
        if total <= 0.0 {
            return 0.0;
        }
        let mismatched = a_mkb * b_ctrl + a_ctrl * b_mkb;
        mismatched / total
    }

    /// Fraction of cross-platform player pairs from merging the two groups.
    fn platform_distance(&self, a: &SearchObject, b: &SearchObject) -> f64 {
        let a_total: usize = a.platforms.values().sum();
        let b_total: usize = b.platforms.values().sum();
        let total = (a_total * b_total) as f64;
        if total <= 0.0 {
            return 0.0;
        }

        let mut mismatched = 0.0;
        for (&plat_a, &count_a) in &a.platforms {
            for (&plat_b, &count_b) in &b.platforms {
                if plat_a != plat_b {
                    mismatched += (count_a * count_b) as f64;
                }
            }
        }
        mismatched / total
    }

    /// Checks whether a candidate lobby satisfies playlist compatibility, size,
    /// skill-similarity/disparity backoff, and has a reachable data center with
    /// an available server. Returns the chosen data center and lobby skill
    /// disparity on success.
    pub fn check_feasibility(
        &self,
        searches: &[&SearchObject],
        playlist: Playlist,
        current_time: u64,
        data_centers: &[DataCenter],
        players: &HashMap<usize, Player>,
    ) -> Option<FeasibilityResult> {
        for search in searches {
            if !search.acceptable_playlists.contains(&playlist) {
                log::trace!(
                    "feasibility failed: playlist mismatch for search {} (playlist {:?})",
                    search.id,
                    playlist
                );
                return None;
            }
        }

        let total_size: usize = searches.iter().map(|s| s.size()).sum();
        if total_size > playlist.required_players() {
            log::trace!(
                "feasibility failed: total size {} exceeds required {} for playlist {:?}",
                total_size,
                playlist.required_players(),
                playlist
            );
            return None;
        }

        // [pi_min(M), pi_max(M)] must sit inside every search's own acceptable range.
        let pi_min = searches.iter().map(|s| s.avg_skill_percentile).fold(f64::MAX, f64::min);
        let pi_max = searches.iter().map(|s| s.avg_skill_percentile).fold(f64::MIN, f64::max);

        for search in searches {
            let wait_time = search.wait_time(current_time, self.config.tick_interval);
            let f_skill = self.config.skill_similarity_backoff(wait_time);

            let ell_j = search.avg_skill_percentile - f_skill;
            let u_j = search.avg_skill_percentile + f_skill;

            if pi_min < ell_j || pi_max > u_j {
                log::trace!(
                    "feasibility failed: skill similarity check failed for search {} (pi_min={:.3}, pi_max={:.3}, ell_j={:.3}, u_j={:.3})",
                    search.id,
                    pi_min,
                    pi_max,
                    ell_j,
                    u_j
                );
                return None;
            }
        }

        let delta_pi_m = pi_max - pi_min;
        let max_disparity_allowed = searches
            .iter()
            .map(|s| {
                let wait_time = s.wait_time(current_time, self.config.tick_interval);
                self.config.skill_disparity_backoff(wait_time)
            })
            .fold(f64::MAX, f64::min);

        if delta_pi_m > max_disparity_allowed {
            log::trace!(
                "feasibility failed: skill disparity {} exceeds max allowed {} for searches {:?}",
                delta_pi_m,
                max_disparity_allowed,
                searches.iter().map(|s| s.id).collect::<Vec<_>>()
            );
            return None;
        }

        let common_dcs: HashSet<usize> = searches
            .iter()
            .map(|s| &s.acceptable_dcs)
            .fold(None::<HashSet<usize>>, |acc, dcs| {
                Some(match acc {
                    None => dcs.clone(),
                    Some(common) => common.intersection(dcs).copied().collect(),
                })
            })
            .unwrap_or_default();

        if common_dcs.is_empty() {
            log::trace!(
                "feasibility failed: no common acceptable data centers for searches {:?}",
                searches.iter().map(|s| s.id).collect::<Vec<_>>()
            );
            return None;
        }

        // Prioritize the lobby's primary region, then its adjacent regions, then the rest.
        let mut region_counts: HashMap<Region, usize> = HashMap::new();
        for search in searches {
            for &player_id in &search.player_ids {
                if let Some(player) = players.get(&player_id) {
                    *region_counts.entry(player.region).or_insert(0) += 1;
                }
            }
        }

        let primary_region = region_counts
            .iter()
            .max_by_key(|(_, &count)| count)
            .map(|(region, _)| *region)
            .unwrap_or(Region::Other);

        let adjacent_regions: HashSet<Region> = primary_region.adjacent_regions().into_iter().collect();

        let mut prioritized_dcs: Vec<usize> = Vec::new();
        let mut adjacent_dcs: Vec<usize> = Vec::new();
        let mut other_dcs: Vec<usize> = Vec::new();

        for &dc_id in &common_dcs {
            if let Some(dc) = data_centers.iter().find(|dc| dc.id == dc_id) {
                if dc.region == primary_region {
                    prioritized_dcs.push(dc_id);
                } else if adjacent_regions.contains(&dc.region) {
                    adjacent_dcs.push(dc_id);
                } else {
                    other_dcs.push(dc_id);
                }
            }
        }

        prioritized_dcs.extend(adjacent_dcs);
        prioritized_dcs.extend(other_dcs);

        let available_dc = prioritized_dcs.iter().find(|&&dc_id| {
            data_centers
                .iter()
                .find(|dc| dc.id == dc_id)
                .map(|dc| dc.available_servers(&playlist) > 0)
                .unwrap_or(false)
        });

        if available_dc.is_none() {
            log::trace!(
                "feasibility failed: no available servers in common DCs {:?} for playlist {:?}",
                common_dcs,
                playlist
            );
        }

        available_dc.map(|&dc_id| FeasibilityResult {
            data_center_id: dc_id,
            skill_disparity: delta_pi_m,
        })
    }

    /// Composite quality score for a feasible lobby: ping quality, skill
    /// balance across the searches, and a wait-time fairness bonus.
    pub fn calculate_quality(
        &self,
        searches: &[&SearchObject],
        players: &HashMap<usize, Player>,
        dc_id: usize,
        current_time: u64,
    ) -> f64 {
        let mut total_delta_ping = 0.0;
        let mut player_count = 0;

        for search in searches {
            for &player_id in &search.player_ids {
                if let Some(player) = players.get(&player_id) {
                    if let Some(&ping) = player.dc_pings.get(&dc_id) {
                        total_delta_ping += ping - player.best_ping;
                        player_count += 1;
                    }
                }
            }
        }

        let avg_delta_ping = if player_count > 0 {
            total_delta_ping / player_count as f64
        } else {
            0.0
        };
        let ping_quality = 1.0 - (avg_delta_ping / self.config.max_ping).min(1.0);

        let skills: Vec<f64> = searches.iter().map(|s| s.avg_skill_percentile).collect();
        let skill_variance = if skills.len() > 1 {
            let mean = skills.iter().sum::<f64>() / skills.len() as f64;
            skills.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / skills.len() as f64
        } else {
            0.0
        };
        let skill_balance_quality = 1.0 - (skill_variance * 4.0).min(1.0);

        let avg_wait = searches
            .iter()
            .map(|s| s.wait_time(current_time, self.config.tick_interval))
            .sum::<f64>()
            / searches.len() as f64;
        let wait_quality = (avg_wait / 60.0).min(1.0);

        self.config.quality_weight_ping * ping_quality
            + self.config.quality_weight_skill_balance * skill_balance_quality
            + self.config.quality_weight_wait_time * wait_quality
    }

    /// Runs one matchmaking tick: refreshes every search's acceptable DCs,
    /// then processes each playlist independently with longest-waiting
    /// searches used first as lobby seeds.
    pub fn run_tick(
        &self,
        searches: &mut Vec<SearchObject>,
        players: &mut HashMap<usize, Player>,
        data_centers: &mut [DataCenter],
        parties: &HashMap<usize, Party>,
        current_time: u64,
        _rng: &mut impl Rng,
    ) -> Vec<MatchResult> {
        let mut results = Vec::new();
        let mut matched_search_ids: HashSet<usize> = HashSet::new();

        for search in searches.iter_mut() {
            let wait_time = search.wait_time(current_time, self.config.tick_interval);
            let mut acceptable = HashSet::new();

            for &player_id in &search.player_ids {
                if let Some(player) = players.get(&player_id) {
                    let player_dcs: HashSet<_> = player
                        .acceptable_dcs(wait_time, &self.config, player.region, data_centers)
                        .into_iter()
                        .collect();

                    if acceptable.is_empty() {
                        acceptable = player_dcs;
                    } else {
                        acceptable = acceptable.intersection(&player_dcs).copied().collect();
                    }
                }
            }
            search.acceptable_dcs = acceptable;
        }

        let mut search_order: Vec<usize> = (0..searches.len()).collect();
        search_order.sort_by(|&a, &b| {
            let wait_a = searches[a].wait_time(current_time, self.config.tick_interval);
            let wait_b = searches[b].wait_time(current_time, self.config.tick_interval);
            wait_b.partial_cmp(&wait_a).unwrap()
        });

        for playlist in Playlist::ALL {
            let required_size = playlist.required_players();

            let playlist_searches: Vec<usize> = search_order
                .iter()
                .copied()
                .filter(|&idx| {
                    !matched_search_ids.contains(&searches[idx].id)
                        && searches[idx].acceptable_playlists.contains(&playlist)
                })
                .collect();

            if playlist_searches.is_empty() {
                continue;
            }

            for &seed_idx in &playlist_searches {
                if matched_search_ids.contains(&searches[seed_idx].id) {
                    continue;
                }

                let seed = &searches[seed_idx];

                let mut candidates: Vec<(usize, f64)> = playlist_searches
                    .iter()
                    .filter(|&&idx| idx != seed_idx && !matched_search_ids.contains(&searches[idx].id))
                    .map(|&idx| {
                        let dist = self.calculate_distance(seed, &searches[idx]);
                        (idx, dist)
                    })
                    .collect();

                candidates.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
                candidates.truncate(self.config.top_k_candidates);

                let mut lobby_indices = vec![seed_idx];
                let mut lobby_size = seed.size();

                for (cand_idx, _) in candidates {
                    if lobby_size >= required_size {
                        break;
                    }

                    let candidate = &searches[cand_idx];
                    if lobby_size + candidate.size() > required_size {
                        continue;
                    }

                    let lobby_searches: Vec<_> = lobby_indices
                        .iter()
                        .map(|&i| &searches[i])
                        .chain(std::iter::once(candidate))
                        .collect();

                    if self
                        .check_feasibility(&lobby_searches, playlist, current_time, data_centers, players)
                        .is_some()
                    {
                        lobby_indices.push(cand_idx);
                        lobby_size += candidate.size();
                    }
                }

                if lobby_size == required_size {
                    let lobby_searches: Vec<_> = lobby_indices.iter().map(|&i| &searches[i]).collect();

                    if let Some(feasibility) =
                        self.check_feasibility(&lobby_searches, playlist, current_time, data_centers, players)
                    {
                        let quality = self.calculate_quality(
                            &lobby_searches,
                            players,
                            feasibility.data_center_id,
                            current_time,
                        );

                        let all_players: Vec<usize> = lobby_searches
                            .iter()
                            .flat_map(|s| s.player_ids.iter().copied())
                            .collect();

                        let avg_delta_ping = all_players
                            .iter()
                            .filter_map(|&pid| {
                                players.get(&pid).and_then(|p| {
                                    p.dc_pings
                                        .get(&feasibility.data_center_id)
                                        .map(|ping| ping - p.best_ping)
                                })
                            })
                            .sum::<f64>()
                            / all_players.len() as f64;

                        let search_times: Vec<f64> = lobby_searches
                            .iter()
                            .map(|s| s.wait_time(current_time, self.config.tick_interval))
                            .collect();

                        let mut regions_in_match: HashSet<Region> = HashSet::new();
                        for &player_id in &all_players {
                            if let Some(player) = players.get(&player_id) {
                                regions_in_match.insert(player.region);
                            }
                        }
                        let is_cross_region = regions_in_match.len() > 1;

                        let teams = balance_teams(
                            self.config.use_exact_team_balancing,
                            &all_players,
                            players,
                            parties,
                            playlist,
                        );

                        for &idx in &lobby_indices {
                            matched_search_ids.insert(searches[idx].id);
                        }

                        if let Some(dc) = data_centers.iter_mut().find(|dc| dc.id == feasibility.data_center_id) {
                            dc.reserve(playlist);
                        }

                        log::debug!(
                            "created {:?} match at dc={} quality={:.3} players={}",
                            playlist,
                            feasibility.data_center_id,
                            quality,
                            all_players.len()
                        );

                        results.push(MatchResult {
                            player_ids: all_players,
                            teams,
                            playlist,
                            data_center_id: feasibility.data_center_id,
                            quality_score: quality,
                            skill_disparity: feasibility.skill_disparity,
                            avg_delta_ping,
                            search_times,
                            is_cross_region,
                        });
                    }
                }
            }
        }

        searches.retain(|s| !matched_search_ids.contains(&s.id));

        results
    }
}

#[derive(Debug)]
pub struct FeasibilityResult {
    pub data_center_id: usize,
    pub skill_disparity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub player_ids: Vec<usize>,
    pub teams: Vec<Vec<usize>>,
    pub playlist: Playlist,
    pub data_center_id: usize,
    pub quality_score: f64,
    pub skill_disparity: f64,
    pub avg_delta_ping: f64,
    pub search_times: Vec<f64>,
    pub is_cross_region: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Location;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn playlist_search(id: usize, player_id: usize, percentile: f64, dc: usize) -> SearchObject {
        let mut acceptable_playlists = HashSet::new();
        acceptable_playlists.insert(Playlist::TeamDeathmatch);
        let mut acceptable_dcs = HashSet::new();
        acceptable_dcs.insert(dc);

        SearchObject {
            id,
            player_ids: vec![player_id],
            avg_skill_percentile: percentile,
            skill_disparity: 0.0,
            avg_location: Location::new(0.0, 0.0),
            platforms: HashMap::new(),
            input_devices: HashMap::new(),
            acceptable_playlists,
            search_start_time: 0,
            acceptable_dcs,
        }
    }

    #[test]
    fn skill_range_outside_tolerance_fails_feasibility() {
        let config = MatchmakingConfig::default();
        let matchmaker = Matchmaker::new(config);

        let search1 = playlist_search(1, 1, 0.4, 0);
        let search2 = playlist_search(2, 2, 0.6, 0);
        let searches = vec![&search1, &search2];

        let mut data_center = DataCenter::new(0, "Test", Location::new(0.0, 0.0), Region::Other);
        data_center.busy_servers.insert(Playlist::TeamDeathmatch, 0);
        let data_centers = vec![data_center];

        let mut players = HashMap::new();
        let mut player1 = Player::new(1, Location::new(0.0, 0.0), 0.0);
        player1.region = Region::Other;
        player1.skill_percentile = 0.4;
        players.insert(1, player1);
        let mut player2 = Player::new(2, Location::new(0.0, 0.0), 0.0);
        player2.region = Region::Other;
        player2.skill_percentile = 0.6;
        players.insert(2, player2);

        let result =
            matchmaker.check_feasibility(&searches, Playlist::TeamDeathmatch, 0, &data_centers, &players);
        assert!(result.is_none(), "should fail skill similarity check");
    }

    #[test]
    fn input_device_distance_is_zero_for_identical_pools() {
        let config = MatchmakingConfig::default();
        let matchmaker = Matchmaker::new(config);
        let mut search1 = playlist_search(1, 1, 0.5, 0);
        let mut search2 = playlist_search(2, 2, 0.5, 0);
        search1.input_devices.insert(InputDevice::MouseKeyboard, 4);
        search2.input_devices.insert(InputDevice::MouseKeyboard, 4);
        assert_eq!(matchmaker.input_device_distance(&search1, &search2), 0.0);
    }

    #[test]
    fn input_device_distance_is_full_for_disjoint_pools() {
        let config = MatchmakingConfig::default();
        let matchmaker = Matchmaker::new(config);
        let mut search1 = playlist_search(1, 1, 0.5, 0);
        let mut search2 = playlist_search(2, 2, 0.5, 0);
        search1.input_devices.insert(InputDevice::MouseKeyboard, 4);
        search2.input_devices.insert(InputDevice::Controller, 4);
        assert_eq!(matchmaker.input_device_distance(&search1, &search2), 1.0);
    }

    #[test]
    fn run_tick_matches_full_lobby_when_available() {
        let config = MatchmakingConfig::default();
        let matchmaker = Matchmaker::new(config);
        let mut rng = StdRng::seed_from_u64(1);

        let mut data_center = DataCenter::new(0, "Test", Location::new(0.0, 0.0), Region::Other);
        for playlist in Playlist::ALL {
            data_center.busy_servers.insert(playlist, 0);
        }
        let mut data_centers = vec![data_center];

        let mut players = HashMap::new();
        let mut searches = Vec::new();
        for id in 0..12usize {
            let mut player = Player::new(id, Location::new(0.0, 0.0), 0.0);
            player.region = Region::Other;
            player.skill_percentile = 0.5;
            player.dc_pings.insert(0, 20.0);
            player.best_ping = 20.0;
            players.insert(id, player);

            let mut acceptable_playlists = HashSet::new();
            acceptable_playlists.insert(Playlist::TeamDeathmatch);
            let mut acceptable_dcs = HashSet::new();
            acceptable_dcs.insert(0);

            searches.push(SearchObject {
                id,
                player_ids: vec![id],
                avg_skill_percentile: 0.5,
                skill_disparity: 0.0,
                avg_location: Location::new(0.0, 0.0),
                platforms: HashMap::new(),
                input_devices: HashMap::new(),
                acceptable_playlists,
                search_start_time: 0,
                acceptable_dcs,
            });
        }

        let parties = HashMap::new();
        let results =
            matchmaker.run_tick(&mut searches, &mut players, &mut data_centers, &parties, 10, &mut rng);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].player_ids.len(), 12);
        assert!(searches.is_empty());
    }
}
