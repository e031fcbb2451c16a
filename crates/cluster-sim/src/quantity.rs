//! Kubernetes resource quantity parsing
//!
//! CPU is tracked in millicores and memory in bytes. Quantities arrive
//! either as plain numbers (cores for CPU, bytes for memory) or in the
//! usual suffixed notation (`500m`, `1.5`, `512Mi`, `2G`).

use crate::error::{SimulationError, SimulationResult};
use serde::{Deserialize, Deserializer, Serializer};

const BINARY_SUFFIXES: &[(&str, u64)] = &[
    ("Ki", 1 << 10),
    ("Mi", 1 << 20),
    ("Gi", 1 << 30),
    ("Ti", 1 << 40),
    ("Pi", 1 << 50),
    ("Ei", 1 << 60),
];

const DECIMAL_SUFFIXES: &[(&str, u64)] = &[
    ("k", 1_000),
    ("M", 1_000_000),
    ("G", 1_000_000_000),
    ("T", 1_000_000_000_000),
    ("P", 1_000_000_000_000_000),
    ("E", 1_000_000_000_000_000_000),
];

fn parse_number(raw: &str, input: &str) -> SimulationResult<f64> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| SimulationError::InvalidQuantity(input.to_string()))?;
    if !value.is_finite() || value < 0.0 {
        return Err(SimulationError::InvalidQuantity(input.to_string()));
    }
    Ok(value)
}

/// Parse a CPU quantity into millicores
pub fn parse_cpu(input: &str) -> SimulationResult<u64> {
    let trimmed = input.trim();
    if let Some(millis) = trimmed.strip_suffix('m') {
        return Ok(parse_number(millis, input)?.round() as u64);
    }
    Ok((parse_number(trimmed, input)? * 1000.0).round() as u64)
}

/// Parse a memory quantity into bytes
pub fn parse_memory(input: &str) -> SimulationResult<u64> {
    let trimmed = input.trim();
    // Binary suffixes first so "Mi" is not read as "M" followed by junk
    for (suffix, multiplier) in BINARY_SUFFIXES.iter().chain(DECIMAL_SUFFIXES) {
        if let Some(number) = trimmed.strip_suffix(suffix) {
            return Ok((parse_number(number, input)? * *multiplier as f64).round() as u64);
        }
    }
    Ok(parse_number(trimmed, input)?.round() as u64)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawQuantity {
    Int(u64),
    Float(f64),
    Text(String),
}

/// Serde adapter for an optional CPU quantity stored as millicores
pub mod cpu {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(millis) => serializer.serialize_str(&format!("{}m", millis)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
        let raw = Option::<RawQuantity>::deserialize(deserializer)?;
        raw.map(|raw| match raw {
            RawQuantity::Int(cores) => Ok(cores.saturating_mul(1000)),
            RawQuantity::Float(cores) => parse_cpu(&cores.to_string()),
            RawQuantity::Text(text) => parse_cpu(&text),
        })
        .transpose()
        .map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for an optional memory quantity stored as bytes
pub mod memory {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_u64(*bytes),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
        let raw = Option::<RawQuantity>::deserialize(deserializer)?;
        raw.map(|raw| match raw {
            RawQuantity::Int(bytes) => Ok(bytes),
            RawQuantity::Float(bytes) => parse_memory(&bytes.to_string()),
            RawQuantity::Text(text) => parse_memory(&text),
        })
        .transpose()
        .map_err(serde::de::Error::custom)
    }
}
