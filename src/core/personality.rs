//! Personality presets: named system-prompt templates stored in a JSON side
//! file. A personality's content is either free text or a JSON-encoded
//! structured profile; both are opaque text for prompting purposes.

use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

/// One selectable preset. `name` is the unique display key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Personality {
    pub name: String,
    pub content: String,
}

impl Personality {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Short description for listings: the profile summary when the content
    /// is a structured profile, otherwise the first line of the text.
    pub fn preview(&self) -> String {
        if let Some(profile) = PersonalityProfile::from_content(&self.content) {
            if !profile.summary.is_empty() {
                return profile.summary;
            }
            if !profile.identity.who.is_empty() {
                return profile.identity.who;
            }
        }
        let first_line = self.content.lines().next().unwrap_or("").trim();
        const MAX: usize = 72;
        if first_line.chars().count() > MAX {
            let truncated: String = first_line.chars().take(MAX).collect();
            format!("{truncated}…")
        } else {
            first_line.to_string()
        }
    }
}

/// Structured profile schema produced by the personality editor. Stored
/// JSON-encoded inside [`Personality::content`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalityProfile {
    pub name: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub identity: Identity,
    #[serde(default)]
    pub style: Style,
    #[serde(default)]
    pub traits: Traits,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(default)]
    pub who: String,
    #[serde(default)]
    pub values: String,
    #[serde(default)]
    pub goals: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Style {
    #[serde(default)]
    pub tone: String,
    /// 0 = deadpan, 100 = clown show.
    #[serde(default)]
    pub humor: u8,
    #[serde(default)]
    pub verbosity: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Traits {
    #[serde(default)]
    pub specialties: String,
    #[serde(default)]
    pub hates: String,
    #[serde(default)]
    pub example_phrases: String,
}

impl PersonalityProfile {
    /// Parse a content string as a structured profile. Returns `None` for
    /// free-text content; profiles must at least carry a name.
    pub fn from_content(content: &str) -> Option<Self> {
        let profile: PersonalityProfile = serde_json::from_str(content).ok()?;
        if profile.name.is_empty() {
            return None;
        }
        Some(profile)
    }

    /// Encode the profile into the opaque content string the store keeps.
    pub fn to_content(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

#[derive(Debug)]
pub enum StoreError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    Duplicate {
        name: String,
    },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Read { path, source } => write!(
                f,
                "Failed to read personality store {}: {}",
                path.display(),
                source
            ),
            StoreError::Parse { path, source } => write!(
                f,
                "Personality store {} is not a valid list: {}",
                path.display(),
                source
            ),
            StoreError::Write { path, source } => write!(
                f,
                "Failed to write personality store {}: {}",
                path.display(),
                source
            ),
            StoreError::Duplicate { name } => {
                write!(f, "A personality named '{}' already exists", name)
            }
        }
    }
}

impl StdError for StoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            StoreError::Read { source, .. } => Some(source),
            StoreError::Parse { source, .. } => Some(source),
            StoreError::Write { source, .. } => Some(source),
            StoreError::Duplicate { .. } => None,
        }
    }
}

/// Flat ordered collection of personalities, persisted as a JSON list of
/// `{name, content}` objects.
pub struct PersonalityStore {
    path: PathBuf,
    personalities: Vec<Personality>,
}

impl PersonalityStore {
    /// Load the store. A missing file is an empty store, not an error.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Ok(Self::empty(path.to_path_buf()));
        }
        let contents = fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let personalities: Vec<Personality> =
            serde_json::from_str(&contents).map_err(|source| StoreError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            personalities,
        })
    }

    pub fn empty(path: PathBuf) -> Self {
        Self {
            path,
            personalities: Vec::new(),
        }
    }

    pub fn save(&self) -> Result<(), StoreError> {
        let write_err = |source: std::io::Error| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        let contents =
            serde_json::to_string_pretty(&self.personalities).map_err(|source| {
                StoreError::Write {
                    path: self.path.clone(),
                    source: std::io::Error::other(source),
                }
            })?;

        let parent = self.path.parent().filter(|dir| !dir.as_os_str().is_empty());
        if let Some(dir) = parent {
            fs::create_dir_all(dir).map_err(write_err)?;
        }
        let mut temp_file = match parent {
            Some(dir) => NamedTempFile::new_in(dir).map_err(write_err)?,
            None => NamedTempFile::new().map_err(write_err)?,
        };
        temp_file.write_all(contents.as_bytes()).map_err(write_err)?;
        temp_file.write_all(b"\n").map_err(write_err)?;
        temp_file.as_file_mut().sync_all().map_err(write_err)?;
        temp_file
            .persist(&self.path)
            .map_err(|err| write_err(err.error))?;
        Ok(())
    }

    pub fn list(&self) -> &[Personality] {
        &self.personalities
    }

    pub fn is_empty(&self) -> bool {
        self.personalities.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn find(&self, name: &str) -> Option<&Personality> {
        self.personalities
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Add a personality. Names are the unique key; duplicates are rejected.
    pub fn add(&mut self, personality: Personality) -> Result<(), StoreError> {
        if self.find(&personality.name).is_some() {
            return Err(StoreError::Duplicate {
                name: personality.name,
            });
        }
        self.personalities.push(personality);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.personalities.len();
        self.personalities
            .retain(|p| !p.name.eq_ignore_ascii_case(name));
        self.personalities.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_profile() -> PersonalityProfile {
        PersonalityProfile {
            name: "Archivist".to_string(),
            summary: "A meticulous librarian of lost knowledge.".to_string(),
            identity: Identity {
                who: "Keeper of a vast underground archive.".to_string(),
                values: "Accuracy above speed.".to_string(),
                goals: "Catalogue everything.".to_string(),
            },
            style: Style {
                tone: "Dry, precise".to_string(),
                humor: 15,
                verbosity: "Concise".to_string(),
            },
            traits: Traits {
                specialties: "Etymology, archival practice".to_string(),
                hates: "Dog-eared pages".to_string(),
                example_phrases: "\"Let me check the index.\"".to_string(),
            },
        }
    }

    #[test]
    fn store_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("personalities.json");

        let mut store = PersonalityStore::load(&path).unwrap();
        assert!(store.is_empty());

        store
            .add(Personality::new("Pirate", "You are a pirate."))
            .unwrap();
        store
            .add(Personality::new(
                "Archivist",
                sample_profile().to_content(),
            ))
            .unwrap();
        store.save().unwrap();

        let reloaded = PersonalityStore::load(&path).unwrap();
        assert_eq!(reloaded.list(), store.list());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let dir = TempDir::new().unwrap();
        let mut store = PersonalityStore::empty(dir.path().join("p.json"));
        store.add(Personality::new("Pirate", "a")).unwrap();

        match store.add(Personality::new("pirate", "b")) {
            Err(StoreError::Duplicate { name }) => assert_eq!(name, "pirate"),
            other => panic!("expected duplicate error, got {:?}", other),
        }
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let mut store = PersonalityStore::empty(dir.path().join("p.json"));
        store.add(Personality::new("Pirate", "arr")).unwrap();

        assert!(store.find("PIRATE").is_some());
        assert!(store.find("landlubber").is_none());
        assert!(store.remove("pirate"));
        assert!(!store.remove("pirate"));
    }

    #[test]
    fn profile_content_is_recognized() {
        let profile = sample_profile();
        let content = profile.to_content();
        let parsed = PersonalityProfile::from_content(&content).unwrap();
        assert_eq!(parsed, profile);

        assert!(PersonalityProfile::from_content("You are a pirate.").is_none());
        // JSON that is not a profile stays opaque text.
        assert!(PersonalityProfile::from_content(r#"{"foo":"bar"}"#).is_none());
    }

    #[test]
    fn preview_prefers_profile_summary() {
        let structured = Personality::new("Archivist", sample_profile().to_content());
        assert_eq!(
            structured.preview(),
            "A meticulous librarian of lost knowledge."
        );

        let plain = Personality::new("Pirate", "You are a pirate.\nAlways say arr.");
        assert_eq!(plain.preview(), "You are a pirate.");

        let long = Personality::new("Long", "x".repeat(100));
        assert!(long.preview().ends_with('…'));
    }

    #[test]
    fn corrupt_store_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("p.json");
        fs::write(&path, "{not a list").unwrap();

        match PersonalityStore::load(&path) {
            Err(StoreError::Parse { .. }) => {}
            other => panic!("expected parse error, got {:?}", other.map(|_| ())),
        }
    }
}
