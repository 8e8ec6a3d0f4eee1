use serde::{Deserialize, Serialize};

/// Available playlists/game modes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Playlist {
    TeamDeathmatch,   // 6v6
    SearchAndDestroy, // 6v6
    Domination,       // 6v6
    GroundWar,        // 32v32
    FreeForAll,       // 12 players, every player their own team
}

impl Playlist {
    pub const ALL: [Playlist; 5] = [
        Playlist::TeamDeathmatch,
        Playlist::SearchAndDestroy,
        Playlist::Domination,
        Playlist::GroundWar,
        Playlist::FreeForAll,
    ];

    pub fn required_players(&self) -> usize {
        match self {
            Playlist::TeamDeathmatch => 12,
            Playlist::SearchAndDestroy => 12,
            Playlist::Domination => 12,
            Playlist::GroundWar => 64,
            Playlist::FreeForAll => 12,
        }
    }

    pub fn team_count(&self) -> usize {
        match self {
            Playlist::FreeForAll => 12,
            _ => 2,
        }
    }

    pub fn avg_match_duration_seconds(&self) -> f64 {
        match self {
            Playlist::TeamDeathmatch => 600.0,   // 10 min
            Playlist::SearchAndDestroy => 900.0, // 15 min
            Playlist::Domination => 600.0,       // 10 min
            Playlist::GroundWar => 1200.0,       // 20 min
            Playlist::FreeForAll => 600.0,       // 10 min
        }
    }
}
