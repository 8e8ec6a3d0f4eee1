use serde::{Deserialize, Serialize};

/// Geographic coordinates (latitude, longitude)
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Haversine distance in kilometers
    pub fn distance_km(&self, other: &Location) -> f64 {
        let r = 6371.0; // Earth radius in km
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();
        r * c
    }
}

/// Geographic regions for matchmaking
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    NorthAmerica,
    Europe,
    AsiaPacific,
    SouthAmerica,
    Other,
}

impl Region {
    /// Defines the region adjacency graph used by the medium-wait backoff tier:
    /// - NA <-> EU (transatlantic)
    /// - NA <-> SA (Americas)
    /// - EU <-> APAC (via Middle East/Asia)
    /// - APAC <-> SA (Pacific connection)
    /// - Other is adjacent to all (catch-all)
    pub fn adjacent_regions(&self) -> Vec<Region> {
        match self {
            Region::NorthAmerica => vec![Region::Europe, Region::SouthAmerica],
            Region::Europe => vec![Region::NorthAmerica, Region::AsiaPacific],
            Region::AsiaPacific => vec![Region::Europe, Region::SouthAmerica],
            Region::SouthAmerica => vec![Region::NorthAmerica, Region::AsiaPacific],
            Region::Other => vec![
                Region::NorthAmerica,
                Region::Europe,
                Region::AsiaPacific,
                Region::SouthAmerica,
            ],
        }
    }

    pub fn all() -> [Region; 5] {
        [
            Region::NorthAmerica,
            Region::Europe,
            Region::AsiaPacific,
            Region::SouthAmerica,
            Region::Other,
        ]
    }

    /// Nearest of the five weighted regional centers used at population generation,
    /// by raw lat/lon distance (not haversine - this is a coarse labeling pass, not
    /// a ping calculation).
    pub fn nearest_to(location: &Location) -> Region {
        const CENTERS: [(Region, f64, f64); 5] = [
            (Region::NorthAmerica, 39.0, -95.0),
            (Region::Europe, 50.0, 10.0),
            (Region::AsiaPacific, 35.0, 105.0),
            (Region::Other, -25.0, 135.0), // Oceania folds into "Other"
            (Region::SouthAmerica, -15.0, -55.0),
        ];

        CENTERS
            .iter()
            .min_by(|(_, lat_a, lon_a), (_, lat_b, lon_b)| {
                let d_a = (location.lat - lat_a).powi(2) + (location.lon - lon_a).powi(2);
                let d_b = (location.lat - lat_b).powi(2) + (location.lon - lon_b).powi(2);
                d_a.partial_cmp(&d_b).unwrap()
            })
            .map(|(region, _, _)| *region)
            .unwrap_or(Region::Other)
    }
}
