use std::collections::{HashMap, HashSet};

use crate::config::MatchmakingConfig;
use crate::datacenter::DataCenter;
use crate::error::{EngineError, PartyError};
use crate::geo::Region;
use crate::match_state::{expected_score_differential, jittered_duration_ticks, Match};
use crate::matchmaker::Matchmaker;
use crate::outcome;
use crate::player::{ExperienceVector, Party, Platform, Player, PlayerState};
use crate::playlist::Playlist;
use crate::population::{self, default_region_weights};
use crate::rng::SimRng;
use crate::search::SearchObject;
use crate::stats::{self, BucketStats, HistBin, RegionStats, SimulationStats, TickSnapshot};

const MAX_PARTY_SIZE: usize = 6;
const HISTORY_RING_CAP: usize = 10;
const SAMPLE_RING_CAP: usize = 1000;

/// Owns the entire mutable world and advances it one tick at a time. The only
/// public mutating operations are `tick()` and the party-management methods;
/// everything else is a read-only accessor over the current state.
pub struct Engine {
    config: MatchmakingConfig,
    matchmaker: Matchmaker,
    seed: u64,
    current_tick: u64,

    arrival_rate: f64,
    arrival_rate_overridden: bool,
    population_generated: bool,

    players: HashMap<usize, Player>,
    parties: HashMap<usize, Party>,
    searches: Vec<SearchObject>,
    matches: HashMap<usize, Match>,
    data_centers: Vec<DataCenter>,

    next_party_id: usize,
    next_search_id: usize,
    next_match_id: usize,

    matches_since_skill_update: usize,

    stats: SimulationStats,
}

impl Engine {
    /// Builds an engine from a validated config and a fixed seed. The
    /// population is empty until `generate_population` is called.
    pub fn new(seed: u64, config: MatchmakingConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let matchmaker = Matchmaker::new(config.clone());

        Ok(Self {
            config,
            matchmaker,
            seed,
            current_tick: 0,
            arrival_rate: 0.0,
            arrival_rate_overridden: false,
            population_generated: false,
            players: HashMap::new(),
            parties: HashMap::new(),
            searches: Vec::new(),
            matches: HashMap::new(),
            data_centers: DataCenter::default_footprint(),
            next_party_id: 0,
            next_search_id: 0,
            next_match_id: 0,
            matches_since_skill_update: 0,
            stats: SimulationStats::default(),
        })
    }

    /// Replaces the population with `count` freshly generated players, drawn
    /// deterministically from the engine's seed. Idempotent: calling this
    /// again regenerates the exact same population rather than appending to
    /// the existing one, since the draw always restarts from `self.seed`.
    pub fn generate_population(&mut self, count: usize) {
        let mut rng = SimRng::from_seed(self.seed);

        let mut players =
            population::generate_population(count, 0, &default_region_weights(), &self.data_centers, &mut rng);

        assign_percentiles(&mut players, self.config.num_skill_buckets);

        let parties = auto_generate_parties(&mut players, self.config.party_player_fraction, &mut rng);

        self.players = players.into_iter().map(|p| (p.id, p)).collect();
        self.parties = parties;
        self.next_party_id = self.parties.keys().copied().max().map(|m| m + 1).unwrap_or(0);

        self.searches.clear();
        self.matches.clear();
        self.next_search_id = 0;
        self.next_match_id = 0;
        self.matches_since_skill_update = 0;
        self.current_tick = 0;
        self.stats = SimulationStats::default();

        for dc in &mut self.data_centers {
            for playlist in Playlist::ALL {
                dc.busy_servers.insert(playlist, 0);
            }
        }

        if !self.arrival_rate_overridden {
            self.arrival_rate = count as f64 * 0.002;
        }

        self.population_generated = true;
    }

    /// Advances the world by one tick: arrivals, search starts, matchmaking,
    /// match completions, then a statistics snapshot, in that fixed order.
    pub fn tick(&mut self) -> Result<(), EngineError> {
        if !self.population_generated {
            return Err(EngineError::PopulationNotGenerated);
        }

        let mut rng = SimRng::for_tick(self.seed, self.current_tick);

        self.phase_arrivals(&mut rng);
        self.phase_search_starts(&mut rng);
        self.phase_matchmaking(&mut rng);
        self.phase_match_completions(&mut rng);
        self.phase_statistics();

        self.current_tick += 1;
        Ok(())
    }

    pub fn run(&mut self, ticks: u64) -> Result<(), EngineError> {
        for _ in 0..ticks {
            self.tick()?;
        }
        Ok(())
    }

    // ---- Phase A: arrivals ----------------------------------------------

    fn phase_arrivals(&mut self, rng: &mut SimRng) {
        let k = rng.poisson(self.arrival_rate);

        let mut offline_ids: Vec<usize> = self
            .players
            .values()
            .filter(|p| p.state == PlayerState::Offline)
            .map(|p| p.id)
            .collect();
        offline_ids.sort_unstable();
        rng.shuffle(&mut offline_ids);

        let n = k.min(offline_ids.len());
        for &id in &offline_ids[..n] {
            if let Some(player) = self.players.get_mut(&id) {
                player.state = PlayerState::InLobby;
                player.session_start_time = Some(self.current_tick);
                player.matches_in_session = 0;
            }
        }

        log::trace!("tick {}: {} players arrived (k={})", self.current_tick, n, k);
    }

    // ---- Phase B: search starts -------------------------------------------

    fn phase_search_starts(&mut self, rng: &mut SimRng) {
        let mut in_lobby: Vec<usize> = self
            .players
            .values()
            .filter(|p| p.state == PlayerState::InLobby)
            .map(|p| p.id)
            .collect();
        in_lobby.sort_unstable();

        let mut starting_solo: Vec<usize> = Vec::new();
        let mut starting_parties: Vec<usize> = Vec::new();

        for &player_id in &in_lobby {
            let player = &self.players[&player_id];
            match player.party_id {
                None => {
                    if rng.gen_bool(0.3) {
                        starting_solo.push(player_id);
                    }
                }
                Some(party_id) => {
                    // Only the party leader's presence in the lobby rolls the
                    // party's search start; other members' turns are no-ops.
                    let Some(party) = self.parties.get(&party_id) else { continue };
                    if party.leader_id != player_id {
                        continue;
                    }
                    let all_in_lobby = party
                        .player_ids
                        .iter()
                        .all(|id| self.players.get(id).map(|p| p.state == PlayerState::InLobby).unwrap_or(false));
                    if all_in_lobby && rng.gen_bool(0.3) {
                        starting_parties.push(party_id);
                    }
                }
            }
        }

        for party_id in starting_parties {
            let party = self.parties[&party_id].clone();
            let search_id = self.next_search_id;
            self.next_search_id += 1;
            let search = party.to_search_object(search_id, self.current_tick, &self.players, &self.config, &self.data_centers);
            for &pid in &search.player_ids {
                if let Some(player) = self.players.get_mut(&pid) {
                    player.state = PlayerState::Searching;
                    player.search_start_time = Some(self.current_tick);
                }
            }
            self.searches.push(search);
        }

        for player_id in starting_solo {
            let search_id = self.next_search_id;
            self.next_search_id += 1;
            let search = solo_search_object(search_id, &self.players[&player_id], self.current_tick, &self.config, &self.data_centers);
            if let Some(player) = self.players.get_mut(&player_id) {
                player.state = PlayerState::Searching;
                player.search_start_time = Some(self.current_tick);
            }
            self.searches.push(search);
        }
    }

    // ---- Phase C: matchmaking ---------------------------------------------

    fn phase_matchmaking(&mut self, rng: &mut SimRng) {
        let results = self.matchmaker.run_tick(
            &mut self.searches,
            &mut self.players,
            &mut self.data_centers,
            &self.parties,
            self.current_tick,
            rng.as_rng(),
        );

        for result in results {
            let duration_ticks = jittered_duration_ticks(result.playlist, self.config.tick_interval, rng);

            let team_skills: Vec<f64> = result
                .teams
                .iter()
                .map(|team| {
                    let sum: f64 = team.iter().filter_map(|id| self.players.get(id)).map(|p| p.skill).sum();
                    sum / team.len().max(1) as f64
                })
                .collect();

            let win_probability_imbalance = if team_skills.len() >= 2 {
                let skill_diff = team_skills[0] - team_skills[1];
                let win_prob = outcome::win_probability(skill_diff, self.config.gamma);
                (win_prob - 0.5).abs() * 2.0
            } else {
                0.0
            };

            let avg_search_time = if result.search_times.is_empty() {
                0.0
            } else {
                result.search_times.iter().sum::<f64>() / result.search_times.len() as f64
            };

            let match_id = self.next_match_id;
            self.next_match_id += 1;

            let new_match = Match {
                id: match_id,
                playlist: result.playlist,
                data_center_id: result.data_center_id,
                teams: result.teams.clone(),
                team_skills,
                start_tick: self.current_tick,
                duration_ticks,
                skill_disparity: result.skill_disparity,
                avg_delta_ping: result.avg_delta_ping,
                avg_search_time,
                is_cross_region: result.is_cross_region,
                quality_score: result.quality_score,
                expected_score_differential: expected_score_differential(result.playlist, win_probability_imbalance),
                win_probability_imbalance,
                blowout_severity: None,
                performance_indices: HashMap::new(),
            };

            for &pid in &result.player_ids {
                if let Some(player) = self.players.get_mut(&pid) {
                    player.state = PlayerState::InMatch;
                    player.current_match = Some(match_id);
                }
            }

            let is_party_match = result.player_ids.iter().any(|id| self.players.get(id).and_then(|p| p.party_id).is_some());
            if is_party_match {
                self.stats.party_match_count += 1;
                for &st in &result.search_times {
                    stats::bounded_push(&mut self.stats.party_search_times, st, SAMPLE_RING_CAP);
                }
            } else {
                self.stats.solo_match_count += 1;
                for &st in &result.search_times {
                    stats::bounded_push(&mut self.stats.solo_search_times, st, SAMPLE_RING_CAP);
                }
            }

            for &st in &result.search_times {
                stats::bounded_push(&mut self.stats.search_time_samples, st, SAMPLE_RING_CAP);
            }
            stats::bounded_push(&mut self.stats.delta_ping_samples, result.avg_delta_ping, SAMPLE_RING_CAP);
            stats::bounded_push(&mut self.stats.skill_disparity_samples, result.skill_disparity, SAMPLE_RING_CAP);
            stats::bounded_push(&mut self.stats.cross_region_match_samples, result.is_cross_region, SAMPLE_RING_CAP);

            self.stats.total_matches += 1;
            *self.stats.per_playlist_match_counts.entry(result.playlist).or_insert(0) += 1;

            log::debug!(
                "tick {}: formed {:?} match {} at dc={}",
                self.current_tick,
                new_match.playlist,
                match_id,
                new_match.data_center_id
            );

            self.matches.insert(match_id, new_match);
        }
    }

    // ---- Phase D: match completions ---------------------------------------

    fn phase_match_completions(&mut self, rng: &mut SimRng) {
        let completed_ids: Vec<usize> = self
            .matches
            .values()
            .filter(|m| m.is_complete(self.current_tick))
            .map(|m| m.id)
            .collect();

        for match_id in completed_ids {
            let Some(mut completed) = self.matches.remove(&match_id) else { continue };

            if let Some(dc) = self.data_centers.iter_mut().find(|dc| dc.id == completed.data_center_id) {
                dc.release(completed.playlist);
            }

            let (winning_team, is_blowout, blowout_severity) = if completed.teams.len() == 2 {
                let outcome = outcome::determine_outcome(
                    &completed.team_skills,
                    self.config.gamma,
                    self.config.blowout_skill_coefficient,
                    self.config.blowout_imbalance_coefficient,
                    self.config.blowout_mild_threshold,
                    self.config.blowout_moderate_threshold,
                    self.config.blowout_severe_threshold,
                    rng.as_rng(),
                );
                (outcome.winning_team, outcome.is_blowout, outcome.blowout_severity)
            } else {
                let winner = outcome::determine_ffa_winner(&completed.team_skills, 0.05, rng.as_rng());
                (winner, false, None)
            };
            completed.blowout_severity = blowout_severity;

            if is_blowout {
                self.stats.blowout_count += 1;
                *self.stats.per_playlist_blowout_counts.entry(completed.playlist).or_insert(0) += 1;
                if let Some(severity) = blowout_severity {
                    *self.stats.blowout_severity_counts.entry(severity).or_insert(0) += 1;
                }
            }

            let lobby_avg_skill = if completed.team_skills.is_empty() {
                0.0
            } else {
                completed.team_skills.iter().sum::<f64>() / completed.team_skills.len() as f64
            };

            for (team_idx, team) in completed.teams.iter().enumerate() {
                let won = team_idx == winning_team;
                for &player_id in team {
                    let player_skill = self.players.get(&player_id).map(|p| p.skill).unwrap_or(0.0);
                    let expected = outcome::expected_performance(player_skill, lobby_avg_skill);
                    let noise = rng.gen_range_f64(-self.config.performance_noise_std, self.config.performance_noise_std);
                    let performance = (expected + noise).clamp(0.0, 1.0);
                    completed.performance_indices.insert(player_id, performance);
                    stats::bounded_push(&mut self.stats.performance_samples, performance, SAMPLE_RING_CAP);

                    if self.config.enable_skill_evolution {
                        if let Some(player) = self.players.get_mut(&player_id) {
                            player.skill =
                                (player.skill + self.config.skill_learning_rate * (performance - expected)).clamp(-1.0, 1.0);
                        }
                    }

                    self.resolve_player_post_match(player_id, &completed, won, performance, rng);
                }
            }

            self.matches_since_skill_update += 1;
            if self.config.enable_skill_evolution
                && self.matches_since_skill_update >= self.config.skill_update_batch_size
            {
                self.matches_since_skill_update = 0;
                self.recompute_skill_percentiles();
                self.stats.total_skill_updates += 1;
                self.record_skill_distribution_snapshot();
            }
        }
    }

    fn resolve_player_post_match(
        &mut self,
        player_id: usize,
        completed: &Match,
        won: bool,
        performance: f64,
        rng: &mut SimRng,
    ) {
        let experience = ExperienceVector {
            avg_delta_ping: completed.avg_delta_ping,
            avg_search_time: completed.avg_search_time,
            was_blowout: completed.blowout_severity.is_some(),
            won,
            performance,
        };

        let Some(player) = self.players.get_mut(&player_id) else { return };

        player.matches_played += 1;
        player.matches_in_session += 1;
        if won {
            player.wins += 1;
        } else {
            player.losses += 1;
        }

        stats::bounded_push(&mut player.recent_delta_pings, completed.avg_delta_ping, HISTORY_RING_CAP);
        stats::bounded_push(&mut player.recent_search_times, completed.avg_search_time, HISTORY_RING_CAP);
        stats::bounded_push(&mut player.recent_blowouts, experience.was_blowout, HISTORY_RING_CAP);
        stats::bounded_push(&mut player.recent_performance, performance, HISTORY_RING_CAP);
        stats::bounded_push(&mut player.recent_experience, experience, HISTORY_RING_CAP);

        player.current_match = None;

        let continue_prob = outcome::continuation_probability(&player.recent_experience, &self.config.retention_config);
        player.continuation_prob = continue_prob;

        self.stats.total_return_attempts += 1;
        self.stats.avg_computed_continue_prob = running_average(
            self.stats.avg_computed_continue_prob,
            continue_prob,
            self.stats.total_return_attempts,
        );

        if rng.gen_bool(continue_prob) {
            player.state = PlayerState::InLobby;
            self.stats.total_returns += 1;
        } else {
            player.state = PlayerState::Offline;
            let session_len = self.current_tick.saturating_sub(player.session_start_time.unwrap_or(self.current_tick));
            stats::bounded_push(&mut self.stats.session_length_distribution, session_len as usize, SAMPLE_RING_CAP);
            player.last_session_experience = player.recent_experience.clone();
            player.last_session_end_time = Some(self.current_tick);
            player.session_start_time = None;
            self.stats.total_sessions_completed += 1;
        }
    }

    fn recompute_skill_percentiles(&mut self) {
        let mut players: Vec<&mut Player> = self.players.values_mut().collect();
        players.sort_by(|a, b| a.skill.partial_cmp(&b.skill).unwrap());
        let n = players.len().max(1) as f64;
        let num_buckets = self.config.num_skill_buckets;
        for (i, player) in players.iter_mut().enumerate() {
            player.skill_percentile = (i as f64 + 0.5) / n;
            player.update_skill_bucket(num_buckets);
        }
    }

    fn record_skill_distribution_snapshot(&mut self) {
        let mut bucket_skill_sums: HashMap<usize, (f64, usize)> = HashMap::new();
        for player in self.players.values() {
            let entry = bucket_skill_sums.entry(player.skill_bucket).or_insert((0.0, 0));
            entry.0 += player.skill;
            entry.1 += 1;
        }
        let mut snapshot: Vec<(usize, f64)> = bucket_skill_sums
            .into_iter()
            .map(|(bucket, (sum, count))| (bucket, sum / count.max(1) as f64))
            .collect();
        snapshot.sort_by_key(|(bucket, _)| *bucket);

        stats::bounded_push(
            &mut self.stats.skill_distribution_over_time,
            (self.current_tick, snapshot),
            stats::TIME_SERIES_CAP,
        );
    }

    // ---- Phase E: statistics -----------------------------------------------

    fn phase_statistics(&mut self) {
        self.stats.ticks = self.current_tick + 1;
        self.stats.time_elapsed = (self.current_tick + 1) as f64 * self.config.tick_interval;
        self.stats.skill_evolution_enabled = self.config.enable_skill_evolution;
        self.stats.churn_threshold_ticks = self.stats.churn_threshold_ticks.max(200);

        let (mut offline, mut in_lobby, mut searching, mut in_match) = (0usize, 0usize, 0usize, 0usize);
        for player in self.players.values() {
            match player.state {
                PlayerState::Offline => offline += 1,
                PlayerState::InLobby => in_lobby += 1,
                PlayerState::Searching => searching += 1,
                PlayerState::InMatch => in_match += 1,
            }
        }
        self.stats.players_offline = offline;
        self.stats.players_in_lobby = in_lobby;
        self.stats.players_searching = searching;
        self.stats.players_in_match = in_match;
        self.stats.active_matches = self.matches.len();

        let (p50, p90, p99) = stats::percentiles(&self.stats.search_time_samples);
        self.stats.search_time_p50 = p50;
        self.stats.search_time_p90 = p90;
        self.stats.search_time_p99 = p99;
        self.stats.avg_search_time = mean(&self.stats.search_time_samples);

        let (ping_p50, ping_p90, _) = stats::percentiles(&self.stats.delta_ping_samples);
        self.stats.delta_ping_p50 = ping_p50;
        self.stats.delta_ping_p90 = ping_p90;
        self.stats.avg_delta_ping = mean(&self.stats.delta_ping_samples);

        self.stats.avg_skill_disparity = mean(&self.stats.skill_disparity_samples);
        self.stats.avg_match_quality = mean(&self.stats.performance_samples);

        self.stats.blowout_rate = if self.stats.total_matches > 0 {
            self.stats.blowout_count as f64 / self.stats.total_matches as f64
        } else {
            0.0
        };
        for (&playlist, &count) in &self.stats.per_playlist_match_counts {
            let blowouts = self.stats.per_playlist_blowout_counts.get(&playlist).copied().unwrap_or(0);
            let rate = if count > 0 { blowouts as f64 / count as f64 } else { 0.0 };
            self.stats.per_playlist_blowout_rate.insert(playlist, rate);
        }

        self.stats.bucket_stats = stats::compute_bucket_stats(&self.players, self.config.num_skill_buckets);

        self.stats.party_count = self.parties.len();
        self.stats.avg_party_size = if self.parties.is_empty() {
            0.0
        } else {
            self.parties.values().map(|p| p.size() as f64).sum::<f64>() / self.parties.len() as f64
        };

        self.update_region_stats();

        let total_players = self.players.len();
        self.stats.population_change_rate = match self.stats.population_history.last() {
            Some(&(_, previous)) if previous > 0 => (total_players as f64 - previous as f64) / previous as f64,
            _ => 0.0,
        };
        stats::bounded_push(&mut self.stats.population_history, (self.current_tick, total_players), stats::TIME_SERIES_CAP);

        let churned = self
            .players
            .values()
            .filter(|p| {
                p.state == PlayerState::Offline
                    && p.last_session_end_time
                        .map(|t| self.current_tick.saturating_sub(t) >= self.stats.churn_threshold_ticks)
                        .unwrap_or(false)
            })
            .count();
        self.stats.churn_rate = if total_players > 0 { churned as f64 / total_players as f64 } else { 0.0 };

        let snapshot = TickSnapshot {
            time_seconds: self.stats.time_elapsed,
            players_offline: offline,
            players_in_lobby: in_lobby,
            players_searching: searching,
            players_in_match: in_match,
            active_matches: self.matches.len(),
            rolling_avg_search_time: self.stats.avg_search_time,
            rolling_avg_delta_ping: self.stats.avg_delta_ping,
        };
        stats::bounded_push(&mut self.stats.time_series, snapshot, stats::TIME_SERIES_CAP);
    }

    fn update_region_stats(&mut self) {
        let mut region_stats: HashMap<Region, RegionStats> = HashMap::new();

        for region in Region::all() {
            let region_players: Vec<&Player> = self.players.values().filter(|p| p.region == region).collect();
            if region_players.is_empty() {
                continue;
            }
            let player_count = region_players.len();
            let avg_search_time = region_players
                .iter()
                .filter(|p| !p.recent_search_times.is_empty())
                .map(|p| p.recent_search_times.iter().sum::<f64>() / p.recent_search_times.len() as f64)
                .sum::<f64>()
                / player_count as f64;
            let avg_delta_ping = region_players
                .iter()
                .filter(|p| !p.recent_delta_pings.is_empty())
                .map(|p| p.recent_delta_pings.iter().sum::<f64>() / p.recent_delta_pings.len() as f64)
                .sum::<f64>()
                / player_count as f64;
            let blowouts: usize = region_players.iter().map(|p| p.recent_blowouts.iter().filter(|&&b| b).count()).sum();
            let total_recent: usize = region_players.iter().map(|p| p.recent_blowouts.len()).sum();
            let blowout_rate = if total_recent > 0 { blowouts as f64 / total_recent as f64 } else { 0.0 };
            let active_matches = self
                .matches
                .values()
                .filter(|m| self.data_centers.iter().any(|dc| dc.id == m.data_center_id && dc.region == region))
                .count();

            region_stats.insert(
                region,
                RegionStats {
                    player_count,
                    avg_search_time,
                    avg_delta_ping,
                    blowout_rate,
                    active_matches,
                    cross_region_match_rate: mean_bool(&self.stats.cross_region_match_samples),
                },
            );
        }

        self.stats.region_stats = region_stats;
    }

    // ---- Party management ---------------------------------------------------

    pub fn create_party(&mut self, player_ids: &[usize]) -> Result<usize, PartyError> {
        if player_ids.is_empty() {
            return Err(PartyError::EmptyParty);
        }
        if player_ids.len() > MAX_PARTY_SIZE {
            return Err(PartyError::PartyTooLarge { max: MAX_PARTY_SIZE });
        }

        let mut members = Vec::with_capacity(player_ids.len());
        for &id in player_ids {
            let player = self.players.get(&id).ok_or(PartyError::UnknownPlayer(id))?;
            if player.party_id.is_some() {
                return Err(PartyError::AlreadyInParty(id));
            }
            if player.state == PlayerState::InMatch || player.state == PlayerState::Searching {
                return Err(PartyError::InvalidPlayerState(id));
            }
            members.push(player);
        }

        let party_id = self.next_party_id;
        self.next_party_id += 1;
        let party = Party::from_players(party_id, &members);

        for &id in player_ids {
            if let Some(player) = self.players.get_mut(&id) {
                player.party_id = Some(party_id);
            }
        }

        self.parties.insert(party_id, party);
        Ok(party_id)
    }

    pub fn join_party(&mut self, party_id: usize, player_id: usize) -> Result<(), PartyError> {
        let player = self.players.get(&player_id).ok_or(PartyError::UnknownPlayer(player_id))?;
        if player.party_id.is_some() {
            return Err(PartyError::AlreadyInParty(player_id));
        }
        if player.state == PlayerState::InMatch || player.state == PlayerState::Searching {
            return Err(PartyError::InvalidPlayerState(player_id));
        }

        let current_size = self.parties.get(&party_id).ok_or(PartyError::UnknownParty(party_id))?.size();
        if current_size >= MAX_PARTY_SIZE {
            return Err(PartyError::PartyFull(party_id));
        }

        if let Some(party) = self.parties.get_mut(&party_id) {
            party.player_ids.push(player_id);
        }
        if let Some(player) = self.players.get_mut(&player_id) {
            player.party_id = Some(party_id);
        }
        if let Some(party) = self.parties.get_mut(&party_id) {
            party.update_aggregates(&self.players);
        }
        Ok(())
    }

    pub fn leave_party(&mut self, player_id: usize) -> Result<(), PartyError> {
        let player = self.players.get(&player_id).ok_or(PartyError::UnknownPlayer(player_id))?;
        let party_id = player.party_id.ok_or(PartyError::NotAMember { player: player_id, party: 0 })?;

        let party = self.parties.get_mut(&party_id).ok_or(PartyError::UnknownParty(party_id))?;
        if !party.player_ids.contains(&player_id) {
            return Err(PartyError::NotAMember { player: player_id, party: party_id });
        }
        party.player_ids.retain(|&id| id != player_id);
        let remaining = party.player_ids.clone();

        if let Some(player) = self.players.get_mut(&player_id) {
            player.party_id = None;
        }

        if remaining.is_empty() {
            self.parties.remove(&party_id);
        } else if remaining.len() == 1 {
            if let Some(player) = self.players.get_mut(&remaining[0]) {
                player.party_id = None;
            }
            self.parties.remove(&party_id);
        } else if let Some(party) = self.parties.get_mut(&party_id) {
            party.update_aggregates(&self.players);
        }

        Ok(())
    }

    pub fn disband_party(&mut self, party_id: usize) -> Result<(), PartyError> {
        let party = self.parties.remove(&party_id).ok_or(PartyError::UnknownParty(party_id))?;
        for id in party.player_ids {
            if let Some(player) = self.players.get_mut(&id) {
                player.party_id = None;
            }
        }
        Ok(())
    }

    pub fn get_party_members(&self, party_id: usize) -> Result<Vec<usize>, PartyError> {
        self.parties.get(&party_id).map(|p| p.player_ids.clone()).ok_or(PartyError::UnknownParty(party_id))
    }

    // ---- Accessors ----------------------------------------------------------

    pub fn get_time(&self) -> u64 {
        self.current_tick
    }

    pub fn get_total_players(&self) -> usize {
        self.players.len()
    }

    pub fn get_player_counts(&self) -> (usize, usize, usize, usize) {
        (
            self.stats.players_offline,
            self.stats.players_in_lobby,
            self.stats.players_searching,
            self.stats.players_in_match,
        )
    }

    pub fn get_stats(&self) -> &SimulationStats {
        &self.stats
    }

    pub fn get_bucket_stats(&self) -> &HashMap<usize, BucketStats> {
        &self.stats.bucket_stats
    }

    pub fn get_time_series(&self) -> &[TickSnapshot] {
        &self.stats.time_series
    }

    pub fn get_data_centers(&self) -> &[DataCenter] {
        &self.data_centers
    }

    pub fn get_skill_distribution(&self, num_bins: usize) -> Vec<HistBin> {
        let skills: Vec<f64> = self.players.values().map(|p| p.skill).collect();
        stats::compute_histogram(&skills, -1.0, 1.0, num_bins)
    }

    pub fn get_search_time_histogram(&self, num_bins: usize) -> Vec<HistBin> {
        let max = self.stats.search_time_samples.iter().cloned().fold(0.0_f64, f64::max).max(1.0);
        stats::compute_histogram(&self.stats.search_time_samples, 0.0, max, num_bins)
    }

    pub fn get_delta_ping_histogram(&self, num_bins: usize) -> Vec<HistBin> {
        let max = self.stats.delta_ping_samples.iter().cloned().fold(0.0_f64, f64::max).max(1.0);
        stats::compute_histogram(&self.stats.delta_ping_samples, 0.0, max, num_bins)
    }

    pub fn set_arrival_rate(&mut self, rate: f64) {
        self.arrival_rate = rate.max(0.0);
        self.arrival_rate_overridden = true;
    }

    pub fn update_config(&mut self, config: MatchmakingConfig) -> Result<(), EngineError> {
        config.validate()?;
        self.matchmaker = Matchmaker::new(config.clone());
        self.config = config;
        Ok(())
    }

    pub fn config(&self) -> &MatchmakingConfig {
        &self.config
    }
}

fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        0.0
    } else {
        samples.iter().sum::<f64>() / samples.len() as f64
    }
}

fn mean_bool(samples: &[bool]) -> f64 {
    if samples.is_empty() {
        0.0
    } else {
        samples.iter().filter(|&&b| b).count() as f64 / samples.len() as f64
    }
}

fn running_average(current: f64, new_value: f64, count: usize) -> f64 {
    if count <= 1 {
        new_value
    } else {
        current + (new_value - current) / count as f64
    }
}

/// Assigns global percentile ranks by sorted skill order (rank i -> (i+0.5)/N)
/// and derives each player's bucket from the result.
fn assign_percentiles(players: &mut [Player], num_buckets: usize) {
    let mut order: Vec<usize> = (0..players.len()).collect();
    order.sort_by(|&a, &b| players[a].skill.partial_cmp(&players[b].skill).unwrap());

    let n = players.len().max(1) as f64;
    for (rank, &idx) in order.iter().enumerate() {
        players[idx].skill_percentile = (rank as f64 + 0.5) / n;
        players[idx].update_skill_bucket(num_buckets);
    }
}

/// Folds `fraction` of the population into randomly-sized (2-4) parties,
/// seeded from the same RNG stream used for population generation. Players
/// left over when the shuffled prefix doesn't divide evenly are left solo.
fn auto_generate_parties(players: &mut [Player], fraction: f64, rng: &mut SimRng) -> HashMap<usize, Party> {
    let mut parties = HashMap::new();
    if fraction <= 0.0 || players.is_empty() {
        return parties;
    }

    let mut order: Vec<usize> = (0..players.len()).collect();
    rng.shuffle(&mut order);

    let party_player_count = ((players.len() as f64) * fraction).round() as usize;
    let mut cursor = 0;
    let mut next_party_id = 0;

    while cursor < party_player_count.min(order.len()) {
        let remaining = party_player_count.min(order.len()) - cursor;
        if remaining < 2 {
            break;
        }
        let size = rng.gen_range_usize(2, 5).min(remaining);
        let member_indices = &order[cursor..cursor + size];

        let party_id = next_party_id;
        next_party_id += 1;

        let refs: Vec<&Player> = member_indices.iter().map(|&idx| &players[idx]).collect();
        let party = Party::from_players(party_id, &refs);
        for &idx in member_indices {
            players[idx].party_id = Some(party_id);
        }
        parties.insert(party_id, party);

        cursor += size;
    }

    parties
}

fn solo_search_object(
    search_id: usize,
    player: &Player,
    current_tick: u64,
    config: &MatchmakingConfig,
    data_centers: &[DataCenter],
) -> SearchObject {
    let acceptable_dcs: HashSet<usize> =
        player.acceptable_dcs(0.0, config, player.region, data_centers).into_iter().collect();

    let mut platforms: HashMap<Platform, usize> = HashMap::new();
    platforms.insert(player.platform, 1);
    let mut input_devices = HashMap::new();
    input_devices.insert(player.input_device, 1);

    SearchObject {
        id: search_id,
        player_ids: vec![player.id],
        avg_skill_percentile: player.skill_percentile,
        skill_disparity: 0.0,
        avg_location: player.location,
        platforms,
        input_devices,
        acceptable_playlists: player.preferred_playlists.clone(),
        search_start_time: current_tick,
        acceptable_dcs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with_population(seed: u64, count: usize) -> Engine {
        let config = MatchmakingConfig::default();
        let mut engine = Engine::new(seed, config).unwrap();
        engine.generate_population(count);
        engine
    }

    #[test]
    fn tick_before_population_is_an_error() {
        let mut engine = Engine::new(1, MatchmakingConfig::default()).unwrap();
        assert_eq!(engine.tick(), Err(EngineError::PopulationNotGenerated));
    }

    #[test]
    fn population_invariant_player_counts_sum_to_total() {
        let mut engine = engine_with_population(0xC0D, 500);
        engine.run(50).unwrap();
        let (offline, lobby, searching, in_match) = engine.get_player_counts();
        assert_eq!(offline + lobby + searching + in_match, 500);
    }

    #[test]
    fn bootstrap_scenario_produces_matches_and_ordered_percentiles() {
        let mut engine = engine_with_population(0xC0D, 5000);
        engine.run(100).unwrap();
        let stats = engine.get_stats();
        assert!(stats.total_matches > 0);
        assert!(stats.search_time_p50 <= stats.search_time_p90);
        assert!(stats.search_time_p90 <= stats.search_time_p99);
    }

    #[test]
    fn zero_arrival_rate_means_no_new_arrivals_after_first_tick() {
        let mut engine = engine_with_population(1, 500);
        engine.set_arrival_rate(0.0);
        engine.run(1).unwrap();
        let offline_after_first = engine.get_player_counts().0;
        engine.run(199).unwrap();
        assert_eq!(engine.get_player_counts().0, offline_after_first);
    }

    #[test]
    fn determinism_same_seed_same_stats() {
        let mut a = engine_with_population(42, 300);
        let mut b = engine_with_population(42, 300);
        a.run(30).unwrap();
        b.run(30).unwrap();
        assert_eq!(a.get_stats().total_matches, b.get_stats().total_matches);
        assert_eq!(a.get_player_counts(), b.get_player_counts());
    }

    #[test]
    fn create_party_rejects_empty_request() {
        let mut engine = engine_with_population(1, 10);
        assert_eq!(engine.create_party(&[]), Err(PartyError::EmptyParty));
    }

    #[test]
    fn create_and_disband_party_round_trips() {
        let mut engine = engine_with_population(1, 10);
        let ids: Vec<usize> = engine.players.keys().take(2).copied().collect();
        let party_id = engine.create_party(&ids).unwrap();
        assert_eq!(engine.get_party_members(party_id).unwrap().len(), 2);
        engine.disband_party(party_id).unwrap();
        assert!(engine.get_party_members(party_id).is_err());
    }

    #[test]
    fn generate_population_is_idempotent() {
        let mut engine = Engine::new(7, MatchmakingConfig::default()).unwrap();
        engine.generate_population(200);
        let first_skills: Vec<f64> = {
            let mut v: Vec<_> = engine.players.values().map(|p| (p.id, p.skill)).collect();
            v.sort_by_key(|&(id, _)| id);
            v.into_iter().map(|(_, s)| s).collect()
        };
        engine.generate_population(200);
        let second_skills: Vec<f64> = {
            let mut v: Vec<_> = engine.players.values().map(|p| (p.id, p.skill)).collect();
            v.sort_by_key(|&(id, _)| id);
            v.into_iter().map(|(_, s)| s).collect()
        };
        assert_eq!(first_skills, second_skills);
    }
}
