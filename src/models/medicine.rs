//! Typed view of the structured reply the model is asked to produce.
//!
//! The service forwards the model's JSON as-is; these types are used to
//! inspect that JSON (logging, tests), never to reject it.

use serde::{ Serialize, Deserialize };

/// Age-banded dosage with the fixed life-stage bands.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgeDosage {
    pub children: String,
    pub adults: String,
    pub elderly: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicineRecord {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub explanation: String,
    pub purpose: String,
    pub side_effects: String,
    pub restrictions: String,
    pub age_dosage: AgeDosage,
    /// Times of day as `HH:mm`.
    pub schedule: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prescription {
    pub medicines: Vec<MedicineRecord>,
}
