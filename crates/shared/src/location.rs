//! Heuristics for deciding whether a picked location is precise enough to
//! meet at.

use serde::{Deserialize, Serialize};

use crate::models::Coordinates;

const GENERAL_AREA_TERMS: [&str; 10] = [
    "district",
    "county",
    "state",
    "province",
    "region",
    "area",
    "zone",
    "borough",
    "municipality",
    "township",
];

const STREET_TERMS: [&str; 6] = ["street", "avenue", "road", "drive", "lane", "way"];

/// A geocoded location as returned by the autocomplete collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PickedLocation {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Street,
    Neighborhood,
    District,
    City,
    General,
    Unknown,
}

fn address_of(location: &PickedLocation) -> Option<&str> {
    location
        .address
        .as_deref()
        .filter(|address| !address.trim().is_empty())
}

/// Coordinates with no more than four decimals are treated as an
/// approximate city centre rather than a picked address.
fn looks_like_city_centre(coordinates: Option<Coordinates>) -> bool {
    let Some(Coordinates { lat, lng }) = coordinates else {
        return false;
    };
    if !lat.is_finite() || !lng.is_finite() {
        return false;
    }
    let rounded = |v: f64| (v.abs() * 10_000.0).round() / 10_000.0;
    lat.abs() == rounded(lat) && lng.abs() == rounded(lng)
}

pub fn is_too_general(location: &PickedLocation) -> bool {
    let Some(address) = address_of(location) else {
        return true;
    };
    let lowered = address.to_lowercase();

    let has_general_terms = GENERAL_AREA_TERMS.iter().any(|term| lowered.contains(term));
    let has_specific_details = address.split(',').map(str::trim).count() >= 3;

    has_general_terms || !has_specific_details || looks_like_city_centre(location.coordinates)
}

pub fn precision(location: &PickedLocation) -> Precision {
    let Some(address) = address_of(location) else {
        return Precision::Unknown;
    };
    let lowered = address.to_lowercase();
    let mentions = |terms: &[&str]| terms.iter().any(|term| lowered.contains(term));

    if mentions(&STREET_TERMS) {
        Precision::Street
    } else if mentions(&["neighborhood", "area"]) {
        Precision::Neighborhood
    } else if mentions(&["district", "county"]) {
        Precision::District
    } else if mentions(&["city", "town"]) {
        Precision::City
    } else {
        Precision::General
    }
}

pub fn suggestion(location: &PickedLocation) -> Option<&'static str> {
    match precision(location) {
        Precision::Street => None,
        Precision::Neighborhood => Some(
            "Consider selecting a more specific location on the map for better pickup coordination.",
        ),
        Precision::District | Precision::City => Some(
            "This location covers a large area. Please select an exact location on the map or use your current location.",
        ),
        Precision::General | Precision::Unknown => {
            Some("Please select a specific location for better ride coordination.")
        }
    }
}
