use super::types::Coordinates;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub name: &'static str,
    pub district: &'static str,
    pub lat: f64,
    pub lon: f64,
}

impl Region {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lon)
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RegionInfo {
    pub name: String,
    pub district: String,
    pub lat: f64,
    pub lon: f64,
}

impl From<&Region> for RegionInfo {
    fn from(region: &Region) -> Self {
        Self {
            name: region.name.to_string(),
            district: region.district.to_string(),
            lat: region.lat,
            lon: region.lon,
        }
    }
}

pub const REGIONS: &[Region] = &[
    Region { name: "Gaborone", district: "South-East", lat: -24.6282, lon: 25.9231 },
    Region { name: "Francistown", district: "North-East", lat: -21.1700, lon: 27.5078 },
    Region { name: "Maun", district: "North-West", lat: -19.9833, lon: 23.4167 },
    Region { name: "Kasane", district: "Chobe", lat: -17.8167, lon: 25.1500 },
    Region { name: "Serowe", district: "Central", lat: -22.3875, lon: 26.7108 },
    Region { name: "Palapye", district: "Central", lat: -22.5500, lon: 27.1333 },
    Region { name: "Mahalapye", district: "Central", lat: -23.1041, lon: 26.8142 },
    Region { name: "Selebi-Phikwe", district: "Central", lat: -21.9789, lon: 27.8431 },
    Region { name: "Letlhakane", district: "Central", lat: -21.4167, lon: 25.5833 },
    Region { name: "Ghanzi", district: "Ghanzi", lat: -21.6981, lon: 21.6458 },
    Region { name: "Tsabong", district: "Kgalagadi", lat: -26.0500, lon: 22.4500 },
    Region { name: "Molepolole", district: "Kweneng", lat: -24.4066, lon: 25.4951 },
    Region { name: "Kanye", district: "Southern", lat: -24.9667, lon: 25.3333 },
    Region { name: "Lobatse", district: "South-East", lat: -25.2243, lon: 25.6797 },
];

/// Case-insensitive lookup that ignores spaces, hyphens and underscores,
/// so "selebi phikwe" and "SELEBI_PHIKWE" both match.
pub fn find_region(name: &str) -> Option<&'static Region> {
    let wanted = normalize(name);
    if wanted.is_empty() {
        return None;
    }
    REGIONS.iter().find(|r| normalize(r.name) == wanted)
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}
