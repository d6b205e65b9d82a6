use std::collections::BTreeMap;
use std::collections::HashMap;

use cmst_conf::TagSpecDef;
use serde::Deserialize;
use thiserror::Error;

const BUILTINS: &str = include_str!("../tagspecs/builtins.toml");

#[derive(Debug, Error)]
pub enum TagSpecError {
    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Tag spec '{name}' has an empty end tag")]
    EmptyEndTag { name: String },
}

#[derive(Deserialize)]
struct SpecFile {
    #[serde(default)]
    tagspecs: BTreeMap<String, TagSpecDef>,
}

/// Which tags are containers, and what closes or splits them.
#[derive(Clone, Debug, Default)]
pub struct TagSpecs(HashMap<String, TagSpec>);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagSpec {
    pub end: Option<String>,
    pub intermediates: Vec<String>,
}

impl TagSpecs {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&TagSpec> {
        self.0.get(key)
    }

    /// Load specs from the `tagspecs` table of a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, TagSpecError> {
        let file: SpecFile = toml::from_str(content)?;
        Self::from_defs(&file.tagspecs)
    }

    pub fn from_defs(defs: &BTreeMap<String, TagSpecDef>) -> Result<Self, TagSpecError> {
        let mut specs = HashMap::with_capacity(defs.len());
        for (name, def) in defs {
            let end = match &def.end {
                Some(end) if end.tag.trim().is_empty() => {
                    return Err(TagSpecError::EmptyEndTag { name: name.clone() });
                }
                Some(end) => Some(end.tag.trim().to_string()),
                None => None,
            };
            specs.insert(
                name.clone(),
                TagSpec {
                    end,
                    intermediates: def.intermediates.clone(),
                },
            );
        }
        Ok(TagSpecs(specs))
    }

    /// The specs shipped with the crate.
    pub fn builtins() -> Result<Self, TagSpecError> {
        Self::from_toml(BUILTINS)
    }

    /// Merge another `TagSpecs` into this one, with the other taking precedence
    pub fn merge(&mut self, other: TagSpecs) -> &mut Self {
        self.0.extend(other.0);
        self
    }

    /// Built-in specs overridden by the user's `tagspecs` settings.
    pub fn load(user: &BTreeMap<String, TagSpecDef>) -> Result<Self, TagSpecError> {
        let mut specs = Self::builtins()?;
        specs.merge(Self::from_defs(user)?);
        Ok(specs)
    }

    /// Whether `name` closes or splits some container.
    ///
    /// Such a tag is only valid directly inside its own container.
    #[must_use]
    pub fn is_closer(&self, name: &str) -> bool {
        self.0.values().any(|spec| {
            spec.end.as_deref() == Some(name) || spec.intermediates.iter().any(|i| i == name)
        })
    }
}

impl TagSpec {
    /// The end tag and intermediates, in the order Django lists them in errors.
    #[must_use]
    pub fn expected(&self) -> Vec<String> {
        let mut expected = self.intermediates.clone();
        expected.extend(self.end.clone());
        expected
    }
}
