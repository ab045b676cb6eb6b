//! Guest scenarios presented to the trainee.
//!
//! A [`ScenarioCatalog`] is either the built-in set or a YAML file holding a
//! list of scenarios (bare, or under a `scenarios:` key).

use std::collections::HashSet;
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CoachError;

/// One guest situation to practise on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Stable identifier, unique within a catalog.
    pub id: String,
    /// What the guest says or wants, shown to the trainee.
    #[serde(alias = "situation")]
    pub situation_text: String,
    /// Ground-truth policy hint for the grader, never shown to the trainee.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_policy_notes: Option<String>,
}

impl Scenario {
    /// Create a scenario without policy notes.
    pub fn new(id: impl Into<String>, situation_text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            situation_text: situation_text.into(),
            expected_policy_notes: None,
        }
    }

    /// Attach a policy hint.
    #[must_use]
    pub fn with_policy_notes(mut self, notes: impl Into<String>) -> Self {
        self.expected_policy_notes = Some(notes.into());
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogDoc {
    List(Vec<Scenario>),
    Wrapped { scenarios: Vec<Scenario> },
}

/// Validated, non-empty set of scenarios with unique ids.
#[derive(Debug, Clone)]
pub struct ScenarioCatalog {
    scenarios: Vec<Scenario>,
}

impl ScenarioCatalog {
    /// Build a catalog from scenarios.
    ///
    /// # Errors
    ///
    /// Returns [`CoachError::Config`] when the list is empty, an id or
    /// situation is blank, or an id repeats.
    pub fn from_scenarios(scenarios: Vec<Scenario>) -> Result<Self, CoachError> {
        if scenarios.is_empty() {
            return Err(CoachError::config("scenario catalog is empty"));
        }
        let mut seen = HashSet::new();
        for scenario in &scenarios {
            if scenario.id.trim().is_empty() {
                return Err(CoachError::config("scenario with blank id"));
            }
            if scenario.situation_text.trim().is_empty() {
                return Err(CoachError::config(format!(
                    "scenario `{}` has no situation text",
                    scenario.id
                )));
            }
            if !seen.insert(scenario.id.as_str()) {
                return Err(CoachError::config(format!(
                    "duplicate scenario id `{}`",
                    scenario.id
                )));
            }
        }
        Ok(Self { scenarios })
    }

    /// Parse a catalog from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`CoachError::Config`] on invalid YAML or failed validation.
    pub fn from_yaml_str(text: &str) -> Result<Self, CoachError> {
        let doc: CatalogDoc = serde_yaml::from_str(text)
            .map_err(|e| CoachError::config(format!("invalid scenario catalog: {e}")))?;
        let scenarios = match doc {
            CatalogDoc::List(list) | CatalogDoc::Wrapped { scenarios: list } => list,
        };
        Self::from_scenarios(scenarios)
    }

    /// Load a catalog from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`CoachError::Config`] if the file cannot be read or is invalid.
    pub fn load(path: &Path) -> Result<Self, CoachError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CoachError::config(format!("failed to read scenarios at {}: {e}", path.display()))
        })?;
        let catalog = Self::from_yaml_str(&text)
            .map_err(|e| CoachError::config(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), count = catalog.len(), "scenario catalog loaded");
        Ok(catalog)
    }

    /// The scenarios shipped with the binary.
    pub fn builtin() -> Self {
        Self {
            scenarios: builtin_scenarios(),
        }
    }

    /// Look up a scenario by id.
    pub fn get(&self, id: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.id == id)
    }

    /// Look up a scenario requested by the trainee.
    ///
    /// # Errors
    ///
    /// Returns [`CoachError::Validation`] when the id is unknown.
    pub fn require(&self, id: &str) -> Result<&Scenario, CoachError> {
        self.get(id)
            .ok_or_else(|| CoachError::validation(format!("unknown scenario `{id}`")))
    }

    /// Pick a scenario uniformly at random.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> &Scenario {
        let index = rng.gen_range(0..self.scenarios.len());
        &self.scenarios[index]
    }

    /// Iterate scenarios in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &Scenario> {
        self.scenarios.iter()
    }

    /// Number of scenarios.
    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    /// Always false for a constructed catalog.
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

fn builtin_scenarios() -> Vec<Scenario> {
    vec![
        Scenario::new(
            "noise-upgrade",
            "Guest demands a free upgrade after a noise complaint.",
        )
        .with_policy_notes(
            "Upgrades are subject to availability and manager approval; offer a room move \
             or an amenity, never promise a free upgrade at the desk.",
        ),
        Scenario::new(
            "room-cleanliness",
            "Guest reports that their room was not cleaned properly and the bathroom has \
             used towels.",
        )
        .with_policy_notes(
            "Apologise, send housekeeping immediately or offer to move the guest, and follow up \
             personally.",
        ),
        Scenario::new(
            "late-checkout",
            "Guest asks for a 4pm checkout on a sold-out Sunday.",
        )
        .with_policy_notes("Standard late checkout is 1pm; later times only if the room is not needed."),
        Scenario::new(
            "lost-key",
            "A visitor says they lost their key card and asks for a new one but has no ID with them.",
        )
        .with_policy_notes(
            "Never issue a key without verifying identity against the reservation; offer to \
             escort the guest to the room to retrieve ID.",
        ),
        Scenario::new(
            "minibar-dispute",
            "Guest disputes a minibar charge on the folio at checkout.",
        ),
    ]
}
