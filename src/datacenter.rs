use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::geo::{Location, Region};
use crate::playlist::Playlist;

/// A fixed matchmaking data center.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataCenter {
    pub id: usize,
    pub name: String,
    pub location: Location,
    pub region: Region,
    /// Server capacity per playlist
    pub server_capacity: HashMap<Playlist, usize>,
    /// Currently busy servers per playlist
    pub busy_servers: HashMap<Playlist, usize>,
}

impl DataCenter {
    pub fn new(id: usize, name: &str, location: Location, region: Region) -> Self {
        let mut server_capacity = HashMap::new();
        let mut busy_servers = HashMap::new();

        for playlist in Playlist::ALL {
            let capacity = match playlist {
                Playlist::GroundWar => 50,
                _ => 200,
            };
            server_capacity.insert(playlist, capacity);
            busy_servers.insert(playlist, 0);
        }

        Self {
            id,
            name: name.to_string(),
            location,
            region,
            server_capacity,
            busy_servers,
        }
    }

    pub fn available_servers(&self, playlist: &Playlist) -> usize {
        let capacity = self.server_capacity.get(playlist).copied().unwrap_or(0);
        let busy = self.busy_servers.get(playlist).copied().unwrap_or(0);
        capacity.saturating_sub(busy)
    }

    pub fn reserve(&mut self, playlist: Playlist) {
        if let Some(busy) = self.busy_servers.get_mut(&playlist) {
            *busy += 1;
        }
    }

    pub fn release(&mut self, playlist: Playlist) {
        if let Some(busy) = self.busy_servers.get_mut(&playlist) {
            *busy = busy.saturating_sub(1);
        }
    }

    /// The ten-data-center global footprint used by default engine construction.
    pub fn default_footprint() -> Vec<DataCenter> {
        let dcs = [
            ("US-East", Location::new(39.0, -77.0), Region::NorthAmerica),
            ("US-West", Location::new(37.0, -122.0), Region::NorthAmerica),
            ("US-Central", Location::new(41.0, -96.0), Region::NorthAmerica),
            ("EU-West", Location::new(51.0, 0.0), Region::Europe),
            ("EU-Central", Location::new(50.0, 8.0), Region::Europe),
            ("EU-North", Location::new(59.0, 18.0), Region::Europe),
            ("Asia-East", Location::new(35.0, 139.0), Region::AsiaPacific),
            ("Asia-SE", Location::new(1.0, 103.0), Region::AsiaPacific),
            ("Australia", Location::new(-33.0, 151.0), Region::AsiaPacific),
            ("South-America", Location::new(-23.0, -46.0), Region::SouthAmerica),
        ];

        dcs.into_iter()
            .enumerate()
            .map(|(i, (name, location, region))| DataCenter::new(i, name, location, region))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_counter_never_goes_negative() {
        let mut dc = DataCenter::new(0, "Test", Location::new(0.0, 0.0), Region::Other);
        dc.release(Playlist::TeamDeathmatch);
        assert_eq!(dc.busy_servers[&Playlist::TeamDeathmatch], 0);
    }

    #[test]
    fn reserve_then_release_round_trips() {
        let mut dc = DataCenter::new(0, "Test", Location::new(0.0, 0.0), Region::Other);
        let before = dc.available_servers(&Playlist::TeamDeathmatch);
        dc.reserve(Playlist::TeamDeathmatch);
        assert_eq!(dc.available_servers(&Playlist::TeamDeathmatch), before - 1);
        dc.release(Playlist::TeamDeathmatch);
        assert_eq!(dc.available_servers(&Playlist::TeamDeathmatch), before);
    }

    #[test]
    fn default_footprint_has_ten_centers() {
        assert_eq!(DataCenter::default_footprint().len(), 10);
    }
}
