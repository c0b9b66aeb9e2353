//! Core data models for goodtooth
//!
//! These models flow through every stage of the pipeline: raw listing
//! records come in, resolved and scored records go out.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A latitude/longitude pair in floating point degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Render as the `lat,lng` form used in routing queries.
    pub fn to_query(&self) -> String {
        format!("{:.6},{:.6}", self.lat, self.lng)
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lng)
    }
}

/// A clinic record as yielded by the listing source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawClinic {
    pub id: String,
    pub name: String,
    #[serde(rename = "telphone", alias = "phone", default)]
    pub phone: String,
    pub address: String,
}

/// A school record as yielded by the listing source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSchool {
    pub name: String,
    pub address: String,
}

/// A dental clinic.
///
/// Coordinates are `None` until geocoded, and stay `None` if the address
/// could not be resolved. An unresolved clinic serializes with null
/// coordinates and `"resolved": false`, never with a zeroed pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clinic {
    pub id: String,
    pub name: String,
    #[serde(rename = "telphone", alias = "phone", default)]
    pub phone: String,
    pub address: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<Vec<String>>,
    #[serde(default = "default_resolved", skip_serializing_if = "is_resolved")]
    pub resolved: bool,
}

fn default_resolved() -> bool {
    true
}

fn is_resolved(resolved: &bool) -> bool {
    *resolved
}

impl Clinic {
    /// Build a clinic from a listing record with the geocoding outcome.
    pub fn from_raw(raw: RawClinic, coordinates: Option<Coordinates>) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
            phone: raw.phone,
            address: raw.address,
            lat: coordinates.map(|c| c.lat),
            lng: coordinates.map(|c| c.lng),
            score: None,
            note: None,
            resolved: coordinates.is_some(),
        }
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.resolved, self.lat, self.lng) {
            (true, Some(lat), Some(lng)) => Some(Coordinates::new(lat, lng)),
            _ => None,
        }
    }

    /// Return a copy carrying the given score and notes.
    pub fn scored(&self, score: u32, note: Vec<String>) -> Self {
        Self {
            score: Some(score),
            note: Some(note),
            ..self.clone()
        }
    }

    /// Drop any score and note, as in the separate-matrices artifact.
    pub fn unscored(&self) -> Self {
        Self {
            score: None,
            note: None,
            ..self.clone()
        }
    }
}

/// A school, or any other unscored point of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct School {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default = "default_resolved", skip_serializing_if = "is_resolved")]
    pub resolved: bool,
}

impl School {
    pub fn from_raw(raw: RawSchool, coordinates: Option<Coordinates>) -> Self {
        Self {
            name: raw.name,
            address: raw.address,
            lat: coordinates.map(|c| c.lat),
            lng: coordinates.map(|c| c.lng),
            resolved: coordinates.is_some(),
        }
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.resolved, self.lat, self.lng) {
            (true, Some(lat), Some(lng)) => Some(Coordinates::new(lat, lng)),
            _ => None,
        }
    }
}

/// A fixed destination every clinic is measured against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Station {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
}

impl Station {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }
}

impl Default for Station {
    /// MRT Shilin station, the reference point of the original dataset.
    fn default() -> Self {
        Self {
            name: "MRT Shilin".to_string(),
            lat: 25.100800,
            lng: 121.522310,
        }
    }
}
