use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::config::ConfigurationError;
use crate::models::CanonicalModel;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("device {device}: no model mapping matches raw model '{raw_model}'")]
pub struct UnknownModelError {
    pub device: String,
    pub raw_model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("device {device}: raw model '{raw_model}' matches equally specific patterns {candidates:?}")]
pub struct AmbiguousMappingError {
    pub device: String,
    pub raw_model: String,
    /// "pattern -> canonical" for every tied entry
    pub candidates: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelMappingError {
    #[error(transparent)]
    Unknown(#[from] UnknownModelError),
    #[error(transparent)]
    Ambiguous(#[from] AmbiguousMappingError),
}

/// How a mapping key is compared with a raw model string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchKind {
    Prefix,
    Contains,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ModelPattern {
    key: String,
    needle: String,
    kind: MatchKind,
    canonical: CanonicalModel,
}

impl ModelPattern {
    fn matches(&self, raw_upper: &str) -> bool {
        match self.kind {
            MatchKind::Prefix => raw_upper.starts_with(&self.needle),
            MatchKind::Contains => raw_upper.contains(&self.needle),
        }
    }

    fn specificity(&self) -> usize {
        self.needle.chars().count()
    }
}

/// ModelMapping maps raw LLD model strings to canonical hardware families.
///
/// Keys are case-insensitive prefixes ("CE68" matches "CE6881-48S6CQ");
/// a key starting with `*` matches anywhere in the raw string. The longest
/// matching pattern wins. Equally long matches that disagree on the
/// canonical code are reported as ambiguous instead of picking one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct ModelMapping {
    patterns: Vec<ModelPattern>,
}

impl TryFrom<BTreeMap<String, String>> for ModelMapping {
    type Error = ConfigurationError;

    fn try_from(table: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        let mut patterns = Vec::with_capacity(table.len());
        for (key, canonical) in table {
            let (needle, kind) = match key.strip_prefix('*') {
                Some(rest) => (rest, MatchKind::Contains),
                None => (key.as_str(), MatchKind::Prefix),
            };
            let needle = needle.trim().to_uppercase();
            if needle.is_empty() || canonical.trim().is_empty() {
                return Err(ConfigurationError::EmptyMappingEntry {
                    table: "model_mapping".to_string(),
                    key,
                });
            }
            patterns.push(ModelPattern {
                needle,
                kind,
                canonical: CanonicalModel::new(canonical.trim()),
                key,
            });
        }
        Ok(Self { patterns })
    }
}

impl From<ModelMapping> for BTreeMap<String, String> {
    fn from(mapping: ModelMapping) -> Self {
        mapping
            .patterns
            .into_iter()
            .map(|p| (p.key, p.canonical.as_str().to_string()))
            .collect()
    }
}

impl ModelMapping {
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Resolve `raw_model` for `device` to exactly one canonical model
    pub fn map(&self, device: &str, raw_model: &str) -> Result<CanonicalModel, ModelMappingError> {
        let raw_upper = raw_model.trim().to_uppercase();

        let matching: Vec<&ModelPattern> = if raw_upper.is_empty() {
            Vec::new()
        } else {
            self.patterns.iter().filter(|p| p.matches(&raw_upper)).collect()
        };

        let Some(best) = matching.iter().map(|p| p.specificity()).max() else {
            return Err(UnknownModelError {
                device: device.to_string(),
                raw_model: raw_model.to_string(),
            }
            .into());
        };

        let top: Vec<&ModelPattern> = matching
            .into_iter()
            .filter(|p| p.specificity() == best)
            .collect();

        let canonical = &top[0].canonical;
        if top.iter().any(|p| &p.canonical != canonical) {
            return Err(AmbiguousMappingError {
                device: device.to_string(),
                raw_model: raw_model.to_string(),
                candidates: top
                    .iter()
                    .map(|p| format!("{} -> {}", p.key, p.canonical))
                    .collect(),
            }
            .into());
        }

        tracing::debug!(
            "Device {}: raw model {} -> {} (pattern {})",
            device,
            raw_model,
            canonical,
            top[0].key
        );
        Ok(canonical.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(entries: &[(&str, &str)]) -> ModelMapping {
        let table: BTreeMap<String, String> = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ModelMapping::try_from(table).unwrap()
    }

    fn standard() -> ModelMapping {
        mapping(&[("CE168", "CE168XX"), ("CE68", "CE68XX"), ("S57", "S57XX")])
    }

    #[test]
    fn test_maps_every_table_entry() {
        let m = standard();
        assert_eq!(m.map("d1", "CE16808").unwrap().as_str(), "CE168XX");
        assert_eq!(m.map("d2", "CE6881-48S6CQ").unwrap().as_str(), "CE68XX");
        assert_eq!(m.map("d3", "S5731-H48T4XC").unwrap().as_str(), "S57XX");
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(standard().map("d", "ce6881").unwrap().as_str(), "CE68XX");
    }

    #[test]
    fn test_unknown_model_names_device_and_raw() {
        let err = standard().map("LEAF-09", "N9K-C93180").unwrap_err();
        assert_eq!(
            err,
            ModelMappingError::Unknown(UnknownModelError {
                device: "LEAF-09".into(),
                raw_model: "N9K-C93180".into(),
            })
        );
        assert!(err.to_string().contains("N9K-C93180"));
        assert!(err.to_string().contains("LEAF-09"));
    }

    #[test]
    fn test_empty_raw_model_is_unknown() {
        assert!(matches!(
            standard().map("d", "  "),
            Err(ModelMappingError::Unknown(_))
        ));
    }

    #[test]
    fn test_longest_prefix_wins() {
        let m = mapping(&[("CE", "GENERIC"), ("CE68", "CE68XX"), ("CE688", "CE688X")]);
        assert_eq!(m.map("d", "CE6881").unwrap().as_str(), "CE688X");
        assert_eq!(m.map("d", "CE6857").unwrap().as_str(), "CE68XX");
        assert_eq!(m.map("d", "CE12808").unwrap().as_str(), "GENERIC");
    }

    #[test]
    fn test_substring_pattern() {
        let m = mapping(&[("*6881", "CE68XX"), ("S", "SXX")]);
        assert_eq!(m.map("d", "HW-CE6881").unwrap().as_str(), "CE68XX");
    }

    #[test]
    fn test_tie_is_ambiguous() {
        let m = mapping(&[("CE68", "CE68XX"), ("*CE68", "OTHER")]);
        match m.map("LEAF-01", "CE6881") {
            Err(ModelMappingError::Ambiguous(e)) => {
                assert_eq!(e.device, "LEAF-01");
                assert_eq!(e.candidates.len(), 2);
            }
            other => panic!("expected ambiguity, got {:?}", other),
        }
    }

    #[test]
    fn test_tie_with_same_canonical_is_not_ambiguous() {
        let m = mapping(&[("CE68", "CE68XX"), ("*CE68", "CE68XX")]);
        assert_eq!(m.map("d", "CE6881").unwrap().as_str(), "CE68XX");
    }

    #[test]
    fn test_empty_key_rejected() {
        let table: BTreeMap<String, String> = [("*".to_string(), "X".to_string())].into();
        assert!(matches!(
            ModelMapping::try_from(table),
            Err(ConfigurationError::EmptyMappingEntry { .. })
        ));
    }
}
