use std::collections::HashSet;

use crate::datacenter::DataCenter;
use crate::geo::Location;
use crate::player::{InputDevice, Platform, Player, PlayerState};
use crate::playlist::Playlist;
use crate::rng::SimRng;

/// Default regional weighting used when no explicit weights are supplied:
/// roughly matches the real-world distribution of a North-America-launched
/// online shooter's player base.
pub fn default_region_weights() -> Vec<(Location, f64)> {
    vec![
        (Location::new(39.0, -95.0), 0.35), // North America
        (Location::new(50.0, 10.0), 0.30),  // Europe
        (Location::new(35.0, 105.0), 0.20), // Asia
        (Location::new(-25.0, 135.0), 0.08), // Australia (folds into Other)
        (Location::new(-15.0, -55.0), 0.07), // South America
    ]
}

fn sample_location(region_weights: &[(Location, f64)], rng: &mut SimRng) -> Location {
    let r = rng.gen_unit();
    let mut cumulative = 0.0;
    let mut region_loc = region_weights[0].0;
    for &(loc, weight) in region_weights {
        cumulative += weight;
        if r < cumulative {
            region_loc = loc;
            break;
        }
    }

    Location::new(
        region_loc.lat + rng.gen_range_f64(-10.0, 10.0),
        region_loc.lon + rng.gen_range_f64(-15.0, 15.0),
    )
}

fn sample_platform_and_input(rng: &mut SimRng) -> (Platform, InputDevice) {
    let platform = match rng.gen_range_usize(0, 3) {
        0 => Platform::PC,
        1 => Platform::PlayStation,
        _ => Platform::Xbox,
    };

    // PC players lean mouse/keyboard (0.7); console players lean controller (0.9).
    let input_device = if platform == Platform::PC {
        if rng.gen_bool(0.7) {
            InputDevice::MouseKeyboard
        } else {
            InputDevice::Controller
        }
    } else if rng.gen_bool(0.9) {
        InputDevice::Controller
    } else {
        InputDevice::MouseKeyboard
    };

    (platform, input_device)
}

fn sample_preferred_playlists(rng: &mut SimRng) -> HashSet<Playlist> {
    let mut preferred = HashSet::new();
    preferred.insert(Playlist::TeamDeathmatch);
    if rng.gen_bool(0.4) {
        preferred.insert(Playlist::Domination);
    }
    if rng.gen_bool(0.2) {
        preferred.insert(Playlist::SearchAndDestroy);
    }
    if rng.gen_bool(0.15) {
        preferred.insert(Playlist::GroundWar);
    }
    if rng.gen_bool(0.1) {
        preferred.insert(Playlist::FreeForAll);
    }
    preferred
}

/// Samples ping to every data center: roughly 1ms per 100km plus a 15ms base
/// latency and +/-5-10ms jitter, floored at 10ms.
fn sample_pings(location: &Location, data_centers: &[DataCenter], rng: &mut SimRng) -> Vec<(usize, f64)> {
    data_centers
        .iter()
        .map(|dc| {
            let base_distance = location.distance_km(&dc.location);
            let base_ping = base_distance / 100.0 + 15.0;
            let jitter = rng.gen_range_f64(-5.0, 10.0);
            let ping = (base_ping + jitter).max(10.0);
            (dc.id, ping)
        })
        .collect()
}

/// Generates `count` players starting at id `next_id`, each with a
/// region-weighted location, a skill drawn from an approximate normal
/// distribution, a platform/input-device pairing, measured ping to every
/// data center, and a preferred-playlist set. Players start `Offline`.
pub fn generate_population(
    count: usize,
    next_id: usize,
    region_weights: &[(Location, f64)],
    data_centers: &[DataCenter],
    rng: &mut SimRng,
) -> Vec<Player> {
    (0..count)
        .map(|i| {
            let id = next_id + i;
            let location = sample_location(region_weights, rng);
            let skill = rng.approx_standard_normal();

            let mut player = Player::new(id, location, skill);

            let (platform, input_device) = sample_platform_and_input(rng);
            player.platform = platform;
            player.input_device = input_device;

            for (dc_id, ping) in sample_pings(&location, data_centers, rng) {
                player.dc_pings.insert(dc_id, ping);
            }

            if let Some((&best_dc, &best_ping)) = player
                .dc_pings
                .iter()
                .min_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            {
                player.best_dc = Some(best_dc);
                player.best_ping = best_ping;
            }

            player.preferred_playlists = sample_preferred_playlists(rng);
            player.state = PlayerState::Offline;

            player
        })
        .collect()
}
