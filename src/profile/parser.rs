//! Parser for the OCI CLI config file.
//!
//! The format is INI-like:
//!
//! ```text
//! # comment
//! [DEFAULT]
//! tenancy=ocid1.tenancy.oc1..aaa
//! region=us-phoenix-1
//! ```
//!
//! Section names are matched exactly; keys are case-insensitive and stored
//! lower-cased. A key present with an empty value (`tenancy=`) is kept as
//! `""` rather than treated as missing. Values are not inherited from
//! `DEFAULT`.

use std::collections::HashMap;

use thiserror::Error;

/// Errors from parsing a profile file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfileParseError {
    #[error("line {line}: key/value pair found before any [profile] header")]
    OrphanValue { line: usize },

    #[error("line {line}: empty profile name")]
    EmptySection { line: usize },

    #[error("line {line}: expected `key=value` or `[profile]`, found `{content}`")]
    Malformed { line: usize, content: String },
}

/// A single named section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    name: String,
    values: HashMap<String, String>,
}

impl Profile {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw value for `key`, which may be empty. `None` only when the key
    /// is not in the section.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Parsed contents of a profile file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileFile {
    profiles: HashMap<String, Profile>,
}

impl ProfileFile {
    /// Parse a profile file. Repeated sections merge, later keys win.
    pub fn parse(content: &str) -> Result<Self, ProfileParseError> {
        let mut profiles: HashMap<String, Profile> = HashMap::new();
        let mut current: Option<String> = None;

        for (idx, raw) in content.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(header) = line.strip_prefix('[') {
                let Some(name) = header.strip_suffix(']') else {
                    return Err(ProfileParseError::Malformed {
                        line: line_no,
                        content: line.to_string(),
                    });
                };
                let name = name.trim();
                if name.is_empty() {
                    return Err(ProfileParseError::EmptySection { line: line_no });
                }
                profiles.entry(name.to_string()).or_insert_with(|| Profile {
                    name: name.to_string(),
                    values: HashMap::new(),
                });
                current = Some(name.to_string());
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(ProfileParseError::Malformed {
                    line: line_no,
                    content: line.to_string(),
                });
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(ProfileParseError::Malformed {
                    line: line_no,
                    content: line.to_string(),
                });
            }

            let Some(section) = current.as_ref().and_then(|name| profiles.get_mut(name)) else {
                return Err(ProfileParseError::OrphanValue { line: line_no });
            };
            section
                .values
                .insert(key.to_ascii_lowercase(), value.trim().to_string());
        }

        Ok(Self { profiles })
    }

    /// Look up a profile by exact name.
    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    /// Sorted profile names, for diagnostics.
    pub fn profile_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
