//! The immutable station registry.
//!
//! The registry is built once from declarative definitions (usually the
//! `stations` array of the orchestrator configuration), validated as a whole,
//! and then shared read-only by the resolver and the engine.

mod builder;
mod definition;

pub use builder::RegistryBuilder;
pub use definition::{ComplexityTier, OutputBounds, Station, StationDefinition};

use crate::errors::{ConfigurationError, StationflowError};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Registry source document: `{ "stations": [...] }`.
#[derive(Debug, Deserialize)]
struct RegistrySource {
    stations: Vec<StationDefinition>,
}

/// An immutable, validated set of stations.
#[derive(Debug, Clone)]
pub struct StationRegistry {
    stations: HashMap<String, Station>,
    order: Vec<String>,
}

impl StationRegistry {
    pub(crate) fn new(stations: HashMap<String, Station>, order: Vec<String>) -> Self {
        Self { stations, order }
    }

    /// Builds a registry from definitions.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error found.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = StationDefinition>,
    ) -> Result<Self, ConfigurationError> {
        let mut builder = RegistryBuilder::new();
        for definition in definitions {
            builder.add_definition(definition)?;
        }
        builder.build()
    }

    /// Parses and validates a JSON registry document.
    ///
    /// # Errors
    ///
    /// Returns a serialization error for malformed JSON or a configuration
    /// error for an invalid registry.
    pub fn from_json_str(json: &str) -> Result<Self, StationflowError> {
        let source: RegistrySource = serde_json::from_str(json)?;
        Ok(Self::from_definitions(source.stations)?)
    }

    /// Reads, parses and validates a JSON registry file.
    ///
    /// # Errors
    ///
    /// Returns an IO, serialization or configuration error.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, StationflowError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Returns a station by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Station> {
        self.stations.get(id)
    }

    /// Returns true if the station exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.stations.contains_key(id)
    }

    /// Station ids in declaration order.
    #[must_use]
    pub fn ids(&self) -> &[String] {
        &self.order
    }

    /// Iterates stations in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Station> {
        self.order.iter().filter_map(|id| self.stations.get(id))
    }

    /// Returns the number of stations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stations.len()
    }

    /// Returns true if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}
