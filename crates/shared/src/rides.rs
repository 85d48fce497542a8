//! Ride search queries and publish payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::models::{Coordinates, GeoPoint, NewRide, Place, Stop, VehicleInfo, VehicleType};

/// Search radius, in metres, around a known origin or destination.
pub const SEARCH_RADIUS_M: u32 = 50_000;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VehicleFilter {
    #[default]
    All,
    Car,
    Bike,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    #[default]
    Departure,
    Price,
    Duration,
    Rating,
}

/// A location picked in the search form: display name plus optional coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPoint {
    pub name: String,
    pub coordinates: Option<Coordinates>,
}

impl SearchPoint {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            coordinates: None,
        }
    }

    pub fn at(name: impl Into<String>, coordinates: Coordinates) -> Self {
        Self {
            name: name.into(),
            coordinates: Some(coordinates),
        }
    }

    fn is_blank(&self) -> bool {
        self.name.trim().is_empty() && self.coordinates.is_none()
    }
}

/// Parameters for `GET /Ride/search`.
#[derive(Debug, Clone, PartialEq)]
pub struct RideSearch {
    pub from: SearchPoint,
    pub to: SearchPoint,
    /// `YYYY-MM-DD`, as typed in the form.
    pub date: Option<String>,
    pub passengers: u32,
    pub vehicle_type: VehicleFilter,
    pub sort_by: SortBy,
    pub max_price: Option<f64>,
}

impl Default for RideSearch {
    fn default() -> Self {
        Self {
            from: SearchPoint::default(),
            to: SearchPoint::default(),
            date: None,
            passengers: 1,
            vehicle_type: VehicleFilter::All,
            sort_by: SortBy::Departure,
            max_price: None,
        }
    }
}

fn wire_name<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(name)) => name,
        _ => String::new(),
    }
}

impl RideSearch {
    /// Build the query string pairs. Fails when neither origin nor
    /// destination was given.
    pub fn to_query(&self) -> Result<Vec<(String, String)>, ValidationError> {
        if self.from.is_blank() && self.to.is_blank() {
            return Err(ValidationError::new(
                "from",
                "Please enter at least origin or destination",
            ));
        }

        let mut query = vec![
            ("from".to_string(), self.from.name.trim().to_string()),
            ("to".to_string(), self.to.name.trim().to_string()),
            ("date".to_string(), self.date.clone().unwrap_or_default()),
            ("passengers".to_string(), self.passengers.max(1).to_string()),
            ("vehicleType".to_string(), wire_name(&self.vehicle_type)),
            ("sortBy".to_string(), wire_name(&self.sort_by)),
        ];

        if let Some(max_price) = self.max_price {
            query.push(("maxPrice".to_string(), max_price.to_string()));
        }

        if let Some(origin) = self.from.coordinates {
            query.push(("lat".to_string(), origin.lat.to_string()));
            query.push(("lng".to_string(), origin.lng.to_string()));
            query.push(("maxDistance".to_string(), SEARCH_RADIUS_M.to_string()));
        }

        if let Some(destination) = self.to.coordinates {
            query.push(("destLat".to_string(), destination.lat.to_string()));
            query.push(("destLng".to_string(), destination.lng.to_string()));
            query.push(("destMaxDistance".to_string(), SEARCH_RADIUS_M.to_string()));
        }

        Ok(query)
    }
}

/// A ride as entered in the publish form, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RideDraft {
    pub from: SearchPoint,
    pub to: SearchPoint,
    pub stops: Vec<SearchPoint>,
    pub departs_at: DateTime<Utc>,
    pub available_seats: u32,
    pub price_per_seat: f64,
    pub description: Option<String>,
    pub vehicle: VehicleInfo,
    pub vehicle_type: VehicleType,
}

fn require_place(point: &SearchPoint, field: &str, label: &str) -> Result<Place, ValidationError> {
    match point.coordinates {
        Some(coordinates) if !point.name.trim().is_empty() => Ok(Place {
            name: point.name.trim().to_string(),
            location: GeoPoint::new(coordinates),
        }),
        _ => Err(ValidationError::new(
            field,
            format!("Please select a valid {label} location with coordinates."),
        )),
    }
}

impl RideDraft {
    /// Validate the draft and produce the `POST /Ride/Ride` body.
    ///
    /// Stops missing a name or coordinates are dropped; the rest are numbered
    /// along the route starting at 1.
    pub fn into_request(self) -> Result<NewRide, ValidationError> {
        let origin = require_place(&self.from, "from", "departure")?;
        let destination = require_place(&self.to, "to", "destination")?;

        if self.available_seats == 0 {
            return Err(ValidationError::new("availableSeats", "At least one seat must be offered"));
        }
        if self.price_per_seat.is_nan() || self.price_per_seat <= 0.0 {
            return Err(ValidationError::new("pricePerSeat", "Price per seat must be greater than zero"));
        }

        let vehicle = &self.vehicle;
        let missing = [
            ("make", vehicle.make.as_str()),
            ("model", vehicle.model.as_str()),
            ("plateNumber", vehicle.plate_number.as_str()),
            ("color", vehicle.color.as_str()),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty());
        if let Some((field, _)) = missing {
            return Err(ValidationError::new(
                format!("vehicleInfo.{field}"),
                "Vehicle details are incomplete",
            ));
        }
        if vehicle.year.is_none() {
            return Err(ValidationError::new("vehicleInfo.year", "Vehicle details are incomplete"));
        }

        let stops = self
            .stops
            .iter()
            .filter(|stop| !stop.name.trim().is_empty())
            .filter_map(|stop| stop.coordinates.map(|c| (stop.name.trim(), c)))
            .zip(1u32..)
            .map(|((name, coordinates), route_index)| Stop {
                name: name.to_string(),
                location: GeoPoint::new(coordinates),
                route_index,
            })
            .collect();

        let mut vehicle_info = self.vehicle;
        vehicle_info.vehicle_type = Some(self.vehicle_type);

        Ok(NewRide {
            origin,
            destination,
            stops,
            date_time: self.departs_at,
            available_seats: self.available_seats,
            price_per_seat: self.price_per_seat,
            description: self
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            vehicle_info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn pune() -> Coordinates {
        Coordinates { lat: 18.5204, lng: 73.8567 }
    }

    fn mumbai() -> Coordinates {
        Coordinates { lat: 19.076, lng: 72.8777 }
    }

    fn draft() -> RideDraft {
        RideDraft {
            from: SearchPoint::at("Pune", pune()),
            to: SearchPoint::at("Mumbai", mumbai()),
            stops: vec![
                SearchPoint::at("Lonavala", Coordinates { lat: 18.7537, lng: 73.4068 }),
                SearchPoint::named("Somewhere"),
                SearchPoint::at("Panvel", Coordinates { lat: 18.9894, lng: 73.1175 }),
            ],
            departs_at: Utc.with_ymd_and_hms(2025, 3, 2, 6, 30, 0).unwrap(),
            available_seats: 3,
            price_per_seat: 450.0,
            description: Some("  ".into()),
            vehicle: VehicleInfo {
                make: "Maruti".into(),
                model: "Swift".into(),
                plate_number: "MH12AB1234".into(),
                year: Some(2019),
                color: "white".into(),
                vehicle_type: None,
            },
            vehicle_type: VehicleType::Car,
        }
    }

    #[test]
    fn search_requires_origin_or_destination() {
        let err = RideSearch::default().to_query().unwrap_err();
        assert_eq!(err.field, "from");

        let only_to = RideSearch {
            to: SearchPoint::named("Mumbai"),
            ..Default::default()
        };
        assert!(only_to.to_query().is_ok());
    }

    #[test]
    fn search_adds_radius_for_known_coordinates() {
        let search = RideSearch {
            from: SearchPoint::at("Pune", pune()),
            to: SearchPoint::named("Mumbai"),
            ..Default::default()
        };
        let query = search.to_query().unwrap();
        let get = |key: &str| query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str());

        assert_eq!(get("lat"), Some("18.5204"));
        assert_eq!(get("maxDistance"), Some("50000"));
        assert_eq!(get("destLat"), None);
        assert_eq!(get("vehicleType"), Some("all"));
        assert_eq!(get("sortBy"), Some("departure"));
    }

    #[test]
    fn draft_numbers_valid_stops_and_uses_lng_lat_order() {
        let ride = draft().into_request().unwrap();
        assert_eq!(ride.stops.len(), 2);
        assert_eq!(ride.stops[0].name, "Lonavala");
        assert_eq!(ride.stops[0].route_index, 1);
        assert_eq!(ride.stops[1].name, "Panvel");
        assert_eq!(ride.stops[1].route_index, 2);
        assert_eq!(ride.origin.location.coordinates, [73.8567, 18.5204]);
        assert_eq!(ride.description, None);
        assert_eq!(ride.vehicle_info.vehicle_type, Some(VehicleType::Car));
    }

    #[test]
    fn draft_rejects_missing_coordinates_and_bad_numbers() {
        let mut no_coords = draft();
        no_coords.to = SearchPoint::named("Mumbai");
        assert_eq!(no_coords.into_request().unwrap_err().field, "to");

        let mut free = draft();
        free.price_per_seat = 0.0;
        assert_eq!(free.into_request().unwrap_err().field, "pricePerSeat");

        let mut no_seats = draft();
        no_seats.available_seats = 0;
        assert_eq!(no_seats.into_request().unwrap_err().field, "availableSeats");

        let mut no_plate = draft();
        no_plate.vehicle.plate_number.clear();
        assert_eq!(no_plate.into_request().unwrap_err().field, "vehicleInfo.plateNumber");
    }
}
