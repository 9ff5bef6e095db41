use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::ConfigurationError;
use crate::models::{CanonicalModel, TemplateRef};
use crate::render::TemplateStore;

/// Key of the mandatory fallback entry in `template_mapping`
pub const DEFAULT_TEMPLATE_KEY: &str = "default";

/// TemplateMapping picks a template per canonical model.
/// The `default` entry is required and checked when settings are loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct TemplateMapping {
    default: TemplateRef,
    by_model: BTreeMap<CanonicalModel, TemplateRef>,
}

impl TryFrom<BTreeMap<String, String>> for TemplateMapping {
    type Error = ConfigurationError;

    fn try_from(mut table: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        let default = table
            .remove(DEFAULT_TEMPLATE_KEY)
            .ok_or(ConfigurationError::MissingDefaultTemplate)?;
        if default.trim().is_empty() {
            return Err(ConfigurationError::MissingDefaultTemplate);
        }

        let mut by_model = BTreeMap::new();
        for (model, template) in table {
            if model.trim().is_empty() || template.trim().is_empty() {
                return Err(ConfigurationError::EmptyMappingEntry {
                    table: "template_mapping".to_string(),
                    key: model,
                });
            }
            by_model.insert(
                CanonicalModel::new(model.trim()),
                TemplateRef::new(template.trim()),
            );
        }

        Ok(Self {
            default: TemplateRef::new(default.trim()),
            by_model,
        })
    }
}

impl From<TemplateMapping> for BTreeMap<String, String> {
    fn from(mapping: TemplateMapping) -> Self {
        let mut table: BTreeMap<String, String> = mapping
            .by_model
            .into_iter()
            .map(|(model, template)| (model.as_str().to_string(), template.as_str().to_string()))
            .collect();
        table.insert(DEFAULT_TEMPLATE_KEY.to_string(), mapping.default.as_str().to_string());
        table
    }
}

impl TemplateMapping {
    pub fn default_template(&self) -> &TemplateRef {
        &self.default
    }

    /// Template for a canonical model; unmapped models get the default
    pub fn resolve(&self, model: &CanonicalModel) -> &TemplateRef {
        match self.by_model.get(model) {
            Some(template) => template,
            None => {
                tracing::debug!("No template mapped for {}, using default {}", model, self.default);
                &self.default
            }
        }
    }

    /// Every template this mapping can select, default included
    pub fn templates(&self) -> impl Iterator<Item = &TemplateRef> {
        std::iter::once(&self.default).chain(self.by_model.values())
    }

    /// Fail before any device is processed if a mapped template is not in the store
    pub fn verify_against(&self, store: &dyn TemplateStore) -> Result<(), ConfigurationError> {
        for template in self.templates() {
            if !store.contains(template) {
                return Err(ConfigurationError::MissingTemplateFile {
                    template: template.as_str().to_string(),
                    location: store.location(),
                });
            }
        }
        Ok(())
    }
}
