//! Keyword retrieval over the hotel training reference.
//!
//! The reference is a single YAML document. Nested mappings are flattened
//! into titled sections (`"service standards / greeting"`), sequences become
//! newline-joined content, and scalars their string form. Retrieval is plain
//! token counting; no embeddings.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::CoachError;

/// Number of sections returned when the caller does not ask for a specific count.
pub const DEFAULT_TOP_K: usize = 3;

/// Tokens this short or shorter are ignored when scoring.
const MIN_TOKEN_CHARS: usize = 3;

/// Bonus added for each query token found in a section title.
const TITLE_BONUS: u32 = 2;

/// Number of results inspected when looking for content gaps.
const GAP_PROBE_TOP_K: usize = 3;

/// A flattened piece of the training reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceSection {
    /// `yaml_{n}` for file sections, `custom_{n}` for in-memory additions.
    pub id: String,
    /// Key path joined with `" / "`.
    pub title: String,
    /// Section body.
    pub content: String,
    /// File name the section came from, or `memory`.
    pub source: String,
}

/// A section with its retrieval score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredSection {
    /// The matched section.
    pub section: ReferenceSection,
    /// Keyword score; `0.0` for fallback results.
    pub score: f64,
}

/// Summary of the loaded reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceStats {
    /// Number of sections currently held.
    pub total_sections: usize,
    /// Source file name.
    pub source: String,
}

/// A query that retrieval could not answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentGap {
    /// The query text.
    pub query: String,
    /// How many (fallback) results it returned.
    pub result_count: usize,
}

/// Queries the reference does not cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GapReport {
    /// Unanswered queries, in input order.
    pub gaps: Vec<ContentGap>,
    /// `gaps.len()`.
    pub gap_count: usize,
    /// Number of queries analysed.
    pub total_queries: usize,
}

/// In-memory view of the training reference document.
#[derive(Debug, Clone, Default)]
pub struct TrainingReference {
    path: Option<PathBuf>,
    source: String,
    sections: Vec<ReferenceSection>,
}

impl TrainingReference {
    /// Load the reference from a YAML file.
    ///
    /// A missing file yields an empty reference.
    ///
    /// # Errors
    ///
    /// Returns [`CoachError::Config`] if the file exists but cannot be read
    /// or is not valid YAML.
    pub fn load(path: &Path) -> Result<Self, CoachError> {
        let mut reference = Self {
            path: Some(path.to_path_buf()),
            source: file_label(path),
            sections: Vec::new(),
        };
        reference.reload()?;
        Ok(reference)
    }

    /// Parse a reference from YAML text, labelling sections with `source`.
    ///
    /// # Errors
    ///
    /// Returns [`CoachError::Config`] on invalid YAML.
    pub fn from_yaml_str(text: &str, source: &str) -> Result<Self, CoachError> {
        Ok(Self {
            path: None,
            source: source.to_owned(),
            sections: flatten_document(text, source)?,
        })
    }

    /// Re-read the source file, discarding in-memory additions.
    ///
    /// # Errors
    ///
    /// Returns [`CoachError::Config`] if the file cannot be read or parsed.
    pub fn reload(&mut self) -> Result<(), CoachError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        if !path.exists() {
            info!(path = %path.display(), "training reference not found, continuing without it");
            self.sections.clear();
            return Ok(());
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            CoachError::config(format!("failed to read reference at {}: {e}", path.display()))
        })?;
        self.sections = flatten_document(&text, &self.source)
            .map_err(|e| CoachError::config(format!("{}: {e}", path.display())))?;
        debug!(
            path = %path.display(),
            sections = self.sections.len(),
            "training reference loaded"
        );
        Ok(())
    }

    /// Add a section that lives only for this session.
    pub fn add_section(&mut self, content: &str, title: Option<&str>) -> &ReferenceSection {
        let id = format!("custom_{}", self.sections.len());
        let title = title.map_or_else(|| id.clone(), str::to_owned);
        self.sections.push(ReferenceSection {
            id,
            title,
            content: content.to_owned(),
            source: "memory".to_owned(),
        });
        &self.sections[self.sections.len().saturating_sub(1)]
    }

    /// All sections in document order.
    pub fn sections(&self) -> &[ReferenceSection] {
        &self.sections
    }

    /// Sections that best match `query`, highest score first.
    ///
    /// When nothing matches, the first `top_k` sections are returned with a
    /// score of zero so callers always have some grounding material.
    pub fn retrieve(&self, query: &str, top_k: usize) -> Vec<ScoredSection> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }
        let tokens: Vec<&str> = query
            .split_whitespace()
            .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS)
            .collect();

        let mut scored: Vec<ScoredSection> = self
            .sections
            .iter()
            .filter_map(|section| {
                let score = score_section(section, &tokens);
                (score > 0).then(|| ScoredSection {
                    section: section.clone(),
                    score: f64::from(score),
                })
            })
            .collect();

        if scored.is_empty() {
            return self
                .sections
                .iter()
                .take(top_k)
                .map(|section| ScoredSection {
                    section: section.clone(),
                    score: 0.0,
                })
                .collect();
        }

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        scored
    }

    /// Retrieve using a list of keywords as the query.
    pub fn search_by_keywords<S: AsRef<str>>(&self, keywords: &[S], top_k: usize) -> Vec<ScoredSection> {
        if keywords.is_empty() {
            return Vec::new();
        }
        let query = keywords
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(" ");
        self.retrieve(&query, top_k)
    }

    /// Section count and source label.
    pub fn stats(&self) -> ReferenceStats {
        ReferenceStats {
            total_sections: self.sections.len(),
            source: self.source.clone(),
        }
    }

    /// Find queries that return nothing or only fallback sections.
    pub fn content_gaps<S: AsRef<str>>(&self, queries: &[S]) -> GapReport {
        let gaps: Vec<ContentGap> = queries
            .iter()
            .filter_map(|query| {
                let results = self.retrieve(query.as_ref(), GAP_PROBE_TOP_K);
                let uncovered = results.iter().all(|r| r.score == 0.0);
                uncovered.then(|| ContentGap {
                    query: query.as_ref().to_owned(),
                    result_count: results.len(),
                })
            })
            .collect();
        GapReport {
            gap_count: gaps.len(),
            total_queries: queries.len(),
            gaps,
        }
    }
}

fn score_section(section: &ReferenceSection, tokens: &[&str]) -> u32 {
    let content = section.content.to_lowercase();
    let title = section.title.to_lowercase();
    tokens.iter().fold(0_u32, |score, token| {
        let hits = u32::try_from(content.matches(token).count()).unwrap_or(u32::MAX);
        let bonus = if title.contains(token) { TITLE_BONUS } else { 0 };
        score.saturating_add(hits).saturating_add(bonus)
    })
}

fn flatten_document(text: &str, source: &str) -> Result<Vec<ReferenceSection>, CoachError> {
    let doc: serde_yaml::Value = serde_yaml::from_str(text)
        .map_err(|e| CoachError::config(format!("reference is not valid YAML: {e}")))?;

    let mut flat: Vec<(String, String)> = Vec::new();
    match &doc {
        serde_yaml::Value::Null => {}
        serde_yaml::Value::Mapping(_) => flatten_node(&doc, &mut Vec::new(), &mut flat),
        other => flatten_node(other, &mut vec!["root".to_owned()], &mut flat),
    }

    Ok(flat
        .into_iter()
        .enumerate()
        .map(|(index, (title, content))| ReferenceSection {
            id: format!("yaml_{index}"),
            title,
            content,
            source: source.to_owned(),
        })
        .collect())
}

fn flatten_node(node: &serde_yaml::Value, path: &mut Vec<String>, out: &mut Vec<(String, String)>) {
    match node {
        serde_yaml::Value::Mapping(mapping) => {
            for (key, value) in mapping {
                path.push(scalar_text(key));
                flatten_node(value, path, out);
                path.pop();
            }
        }
        serde_yaml::Value::Sequence(items) => {
            let content = items.iter().map(scalar_text).collect::<Vec<_>>().join("\n");
            out.push((path.join(" / "), content));
        }
        serde_yaml::Value::Tagged(tagged) => flatten_node(&tagged.value, path, out),
        scalar => out.push((path.join(" / "), scalar_text(scalar))),
    }
}

fn scalar_text(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::Null => String::new(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::String(s) => s.clone(),
        nested => serde_yaml::to_string(nested)
            .map(|s| s.trim_end().to_owned())
            .unwrap_or_default(),
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}
