use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::geo::Region;
use crate::outcome::BlowoutSeverity;
use crate::player::Player;
use crate::playlist::Playlist;

/// How many entries a bounded time-series is allowed to accumulate before its
/// oldest entry is evicted.
pub const TIME_SERIES_CAP: usize = 200;

/// Pushes onto a `Vec` used as a ring buffer, dropping the oldest entry once
/// `cap` is exceeded.
pub fn bounded_push<T>(buffer: &mut Vec<T>, item: T, cap: usize) {
    buffer.push(item);
    if buffer.len() > cap {
        buffer.remove(0);
    }
}

/// P50/P90/P99 over a copy-sorted sample set. Returns zeros for an empty slice.
pub fn percentiles(samples: &[f64]) -> (f64, f64, f64) {
    if samples.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = sorted.len();
    let p50 = sorted[n / 2];
    let p90 = sorted[((n as f64) * 0.9) as usize];
    let p99 = sorted[(((n as f64) * 0.99) as usize).min(n - 1)];
    (p50, p90, p99)
}

/// One bin of a histogram over a bounded sample set.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HistBin {
    pub bin_start: f64,
    pub bin_end: f64,
    pub count: usize,
}

/// Buckets `samples` into `num_bins` equal-width bins spanning `[min, max]`.
/// Values outside the span clamp into the first/last bin. Returns an empty
/// vec if `num_bins` is zero or `samples` is empty.
pub fn compute_histogram(samples: &[f64], min: f64, max: f64, num_bins: usize) -> Vec<HistBin> {
    if num_bins == 0 || samples.is_empty() || max <= min {
        return Vec::new();
    }

    let width = (max - min) / num_bins as f64;
    let mut bins: Vec<HistBin> = (0..num_bins)
        .map(|i| HistBin {
            bin_start: min + width * i as f64,
            bin_end: min + width * (i + 1) as f64,
            count: 0,
        })
        .collect();

    for &sample in samples {
        let idx = (((sample - min) / width) as isize).clamp(0, num_bins as isize - 1) as usize;
        bins[idx].count += 1;
    }

    bins
}

/// Per skill-bucket aggregate statistics.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BucketStats {
    pub bucket_id: usize,
    pub player_count: usize,
    pub avg_search_time: f64,
    pub avg_delta_ping: f64,
    pub win_rate: f64,
    pub avg_kd: f64,
    pub matches_played: usize,
}

/// Recomputes every skill bucket's aggregate from the current player set.
pub fn compute_bucket_stats(players: &HashMap<usize, Player>, num_buckets: usize) -> HashMap<usize, BucketStats> {
    let mut result = HashMap::new();

    for bucket in 1..=num_buckets {
        let bucket_players: Vec<&Player> = players.values().filter(|p| p.skill_bucket == bucket).collect();
        if bucket_players.is_empty() {
            continue;
        }

        let player_count = bucket_players.len();

        let avg_search_time = bucket_players
            .iter()
            .filter_map(|p| {
                if p.recent_search_times.is_empty() {
                    None
                } else {
                    Some(p.recent_search_times.iter().sum::<f64>() / p.recent_search_times.len() as f64)
                }
            })
            .sum::<f64>()
            / player_count as f64;

        let avg_delta_ping = bucket_players
            .iter()
            .filter_map(|p| {
                if p.recent_delta_pings.is_empty() {
                    None
                } else {
                    Some(p.recent_delta_pings.iter().sum::<f64>() / p.recent_delta_pings.len() as f64)
                }
            })
            .sum::<f64>()
            / player_count as f64;

        let total_wins: usize = bucket_players.iter().map(|p| p.wins).sum();
        let total_matches: usize = bucket_players.iter().map(|p| p.matches_played).sum();
        let win_rate = if total_matches > 0 {
            total_wins as f64 / total_matches as f64
        } else {
            0.0
        };

        let total_kills: usize = bucket_players.iter().map(|p| p.total_kills).sum();
        let total_deaths: usize = bucket_players.iter().map(|p| p.total_deaths).sum();
        let avg_kd = if total_deaths > 0 {
            total_kills as f64 / total_deaths as f64
        } else {
            1.0
        };

        result.insert(
            bucket,
            BucketStats {
                bucket_id: bucket,
                player_count,
                avg_search_time,
                avg_delta_ping,
                win_rate,
                avg_kd,
                matches_played: total_matches,
            },
        );
    }

    result
}

/// One tick's worth of headline numbers, kept in a bounded ring for charting
/// trends over a run without holding every tick's full statistics snapshot.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TickSnapshot {
    pub time_seconds: f64,
    pub players_offline: usize,
    pub players_in_lobby: usize,
    pub players_searching: usize,
    pub players_in_match: usize,
    pub active_matches: usize,
    pub rolling_avg_search_time: f64,
    pub rolling_avg_delta_ping: f64,
}

/// Regional statistics snapshot.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RegionStats {
    pub player_count: usize,
    pub avg_search_time: f64,
    pub avg_delta_ping: f64,
    pub blowout_rate: f64,
    pub active_matches: usize,
    pub cross_region_match_rate: f64,
}

/// Running simulation statistics, updated once per tick.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SimulationStats {
    pub time_elapsed: f64,
    pub ticks: u64,

    pub total_matches: usize,
    pub active_matches: usize,

    pub players_offline: usize,
    pub players_in_lobby: usize,
    pub players_searching: usize,
    pub players_in_match: usize,

    pub avg_search_time: f64,
    pub search_time_p50: f64,
    pub search_time_p90: f64,
    pub search_time_p99: f64,
    pub search_time_samples: Vec<f64>,

    pub avg_delta_ping: f64,
    pub delta_ping_p50: f64,
    pub delta_ping_p90: f64,
    pub delta_ping_samples: Vec<f64>,

    pub avg_skill_disparity: f64,
    pub skill_disparity_samples: Vec<f64>,

    pub avg_match_quality: f64,

    pub blowout_rate: f64,
    pub blowout_count: usize,
    pub blowout_severity_counts: HashMap<BlowoutSeverity, usize>,
    pub per_playlist_blowout_rate: HashMap<Playlist, f64>,
    pub per_playlist_blowout_counts: HashMap<Playlist, usize>,
    pub per_playlist_match_counts: HashMap<Playlist, usize>,
    pub team_skill_difference_samples: Vec<f64>,

    pub bucket_stats: HashMap<usize, BucketStats>,

    pub party_count: usize,
    pub avg_party_size: f64,
    pub party_match_count: usize,
    pub solo_match_count: usize,
    pub party_search_times: Vec<f64>,
    pub solo_search_times: Vec<f64>,

    /// Time series of skill distribution: (tick, [(bucket_id, mean_skill), ...])
    pub skill_distribution_over_time: Vec<(u64, Vec<(usize, f64)>)>,
    pub skill_evolution_enabled: bool,
    pub total_skill_updates: usize,
    pub performance_samples: Vec<f64>,

    pub per_bucket_continue_rate: HashMap<usize, f64>,
    pub avg_computed_continue_prob: f64,
    pub avg_matches_per_session: f64,
    pub session_length_distribution: Vec<usize>,
    pub active_sessions: usize,
    pub total_sessions_completed: usize,

    pub churn_rate: f64,
    pub per_bucket_return_rate: HashMap<usize, f64>,
    pub total_return_attempts: usize,
    pub total_returns: usize,
    pub churn_threshold_ticks: u64,
    pub players_leaving_rate: f64,
    pub recent_quits: Vec<(u64, usize)>,
    pub population_change_rate: f64,
    pub population_history: Vec<(u64, usize)>,

    pub region_stats: HashMap<Region, RegionStats>,
    pub cross_region_match_samples: Vec<bool>,

    /// Bounded ring (cap `TIME_SERIES_CAP`) of per-tick headline snapshots.
    pub time_series: Vec<TickSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentiles_of_empty_slice_are_zero() {
        assert_eq!(percentiles(&[]), (0.0, 0.0, 0.0));
    }

    #[test]
    fn percentiles_are_monotonic() {
        let samples: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let (p50, p90, p99) = percentiles(&samples);
        assert!(p50 <= p90);
        assert!(p90 <= p99);
    }

    #[test]
    fn bounded_push_evicts_oldest() {
        let mut buffer = Vec::new();
        for i in 0..5 {
            bounded_push(&mut buffer, i, 3);
        }
        assert_eq!(buffer, vec![2, 3, 4]);
    }

    #[test]
    fn histogram_counts_sum_to_sample_count() {
        let samples = vec![0.1, 0.4, 0.4, 0.9, -0.5];
        let bins = compute_histogram(&samples, -1.0, 1.0, 10);
        let total: usize = bins.iter().map(|b| b.count).sum();
        assert_eq!(total, samples.len());
    }

    #[test]
    fn histogram_is_empty_for_zero_bins() {
        assert!(compute_histogram(&[1.0, 2.0], 0.0, 10.0, 0).is_empty());
    }
}
