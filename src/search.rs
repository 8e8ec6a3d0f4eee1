use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::geo::Location;
use crate::playlist::Playlist;
use crate::player::{InputDevice, Platform};

/// A search object: a solo player or party currently waiting in the matchmaking queue.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchObject {
    pub id: usize,
    pub player_ids: Vec<usize>,
    pub avg_skill_percentile: f64,
    pub skill_disparity: f64,
    pub avg_location: Location,
    pub platforms: HashMap<Platform, usize>,
    pub input_devices: HashMap<InputDevice, usize>,
    pub acceptable_playlists: HashSet<Playlist>,
    pub search_start_time: u64,
    pub acceptable_dcs: HashSet<usize>,
}

impl SearchObject {
    pub fn size(&self) -> usize {
        self.player_ids.len()
    }

    pub fn wait_time(&self, current_time: u64, tick_interval: f64) -> f64 {
        ((current_time - self.search_start_time) as f64) * tick_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_search(start: u64) -> SearchObject {
        SearchObject {
            id: 0,
            player_ids: vec![1],
            avg_skill_percentile: 0.5,
            skill_disparity: 0.0,
            avg_location: Location::new(0.0, 0.0),
            platforms: HashMap::new(),
            input_devices: HashMap::new(),
            acceptable_playlists: HashSet::new(),
            search_start_time: start,
            acceptable_dcs: HashSet::new(),
        }
    }

    #[test]
    fn wait_time_scales_with_tick_interval() {
        let search = empty_search(10);
        assert_eq!(search.wait_time(12, 5.0), 10.0);
        assert_eq!(search.wait_time(10, 5.0), 0.0);
    }

    #[test]
    fn size_reflects_player_count() {
        assert_eq!(empty_search(0).size(), 1);
    }
}
