//! JSON payloads of the Olho Vivo API.
//!
//! Field names follow the wire format (`l`, `vs`, `py`, ...) through serde
//! renames. Arrays that arrive as `null` or are missing decode as empty.

use anyhow::Result;
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer};

/// `GET /Posicao`
#[derive(Debug, Default, Deserialize)]
pub struct PositionsPayload {
    /// Reference time of the snapshot (`HH:MM`).
    #[serde(rename = "hr", default)]
    pub reference_time: Option<String>,
    #[serde(rename = "l", default, deserialize_with = "null_as_empty")]
    pub lines: Vec<LinePositions>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LinePositions {
    /// Line code, e.g. `"8000-10"`.
    #[serde(rename = "c")]
    pub code: String,
    #[serde(rename = "cl", default)]
    pub line_id: Option<i64>,
    #[serde(rename = "vs", default, deserialize_with = "null_as_empty")]
    pub vehicles: Vec<VehiclePosition>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VehiclePosition {
    #[serde(rename = "p", deserialize_with = "number_or_string")]
    pub prefix: i64,
    #[serde(rename = "a", default)]
    pub accessible: Option<bool>,
    /// UTC timestamp of the reading, e.g. `"2017-05-12T14:30:37Z"`.
    #[serde(rename = "ta", default)]
    pub observed_at: Option<String>,
    #[serde(rename = "py")]
    pub latitude: f64,
    #[serde(rename = "px")]
    pub longitude: f64,
}

/// `GET /Previsao/Linha?codigoLinha=..`
#[derive(Debug, Default, Deserialize)]
pub struct LinePredictionsPayload {
    #[serde(rename = "hr", default)]
    pub reference_time: Option<String>,
    #[serde(rename = "ps", default, deserialize_with = "null_as_empty")]
    pub stops: Vec<StopPredictions>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StopPredictions {
    #[serde(rename = "cp", default)]
    pub stop_id: Option<i64>,
    #[serde(rename = "np", default)]
    pub stop_name: Option<String>,
    #[serde(rename = "vs", default, deserialize_with = "null_as_empty")]
    pub vehicles: Vec<VehiclePrediction>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VehiclePrediction {
    #[serde(rename = "p", deserialize_with = "number_or_string")]
    pub prefix: i64,
    /// Predicted arrival as a bare time of day (`"23:51"`).
    #[serde(rename = "t", default)]
    pub predicted_time: Option<String>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Vehicle prefixes are numbers in `/Posicao` but strings in some `/Previsao` responses.
fn number_or_string<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Prefix {
        Number(i64),
        Text(String),
    }

    match Prefix::deserialize(deserializer)? {
        Prefix::Number(n) => Ok(n),
        Prefix::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Decodes a `/Posicao` response body.
pub fn parse_positions(bytes: &[u8]) -> Result<PositionsPayload> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Decodes a `/Previsao/Linha` response body.
pub fn parse_line_predictions(bytes: &[u8]) -> Result<LinePredictionsPayload> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Parses the `ta` field into a naive UTC timestamp.
pub fn parse_observed_at(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S"))
        .ok()
}
