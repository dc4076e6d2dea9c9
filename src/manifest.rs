//! Episode manifest: the JSON document describing how every episode should be tagged.
//!
//! ```json
//! {
//!   "meta": {
//!     "languages": { "eng": { "name": "English" } },
//!     "video": { "language": "eng" },
//!     "audio": [{ "language": "eng", "default": true }],
//!     "subtitles": [],
//!     "renameFiles": true
//!   },
//!   "episodes": { "S01E01": "The Pilot" }
//! }
//! ```
//!
//! The whole document is validated before any file is touched. Every missing or
//! malformed field is reported at once in a single [`Error::Config`].

use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Desired language and display name of the video track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRule {
    pub language: String,
    pub display_name: String,
}

/// Desired display name and default flag for the first audio or subtitle
/// track carrying `language`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRule {
    pub language: String,
    pub display_name: String,
    pub default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meta {
    pub languages: BTreeMap<String, String>,
    pub video: VideoRule,
    pub audio: Vec<TrackRule>,
    pub subtitles: Vec<TrackRule>,
    pub rename_files: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Episode {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub meta: Meta,
    /// Episodes in document order
    pub episodes: Vec<Episode>,
}

#[derive(Debug, Default, Deserialize)]
struct RawManifest {
    meta: Option<RawMeta>,
    episodes: Option<JsonMap<String, JsonValue>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMeta {
    languages: Option<BTreeMap<String, RawLanguage>>,
    video: Option<RawVideo>,
    audio: Option<Vec<RawTrackRule>>,
    subtitles: Option<Vec<RawTrackRule>>,
    rename_files: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct RawLanguage {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawVideo {
    language: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTrackRule {
    language: Option<String>,
    default: Option<bool>,
}

impl Manifest {
    /// Read and validate the manifest at `path`
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|error| Error::config(path, format!("cannot read file: {error}")))?;
        let manifest = Self::from_json(path, &content)?;
        info!(
            file = %path.display(),
            episodes = manifest.episodes.len(),
            rename_files = manifest.meta.rename_files,
            "Loaded configuration"
        );
        Ok(manifest)
    }

    /// Parse and validate manifest text. `path` is only used for error reporting.
    pub fn from_json(path: &Path, content: &str) -> Result<Self> {
        let raw: RawManifest = serde_json::from_str(content)
            .map_err(|error| Error::config(path, format!("malformed JSON: {error}")))?;

        let mut problems = Vec::new();
        let manifest = raw.validate(&mut problems);
        match manifest {
            Some(manifest) if problems.is_empty() => Ok(manifest),
            _ => {
                debug!(?problems, "Configuration validation failed");
                Err(Error::config(path, problems.join("; ")))
            }
        }
    }
}

impl RawManifest {
    fn validate(self, problems: &mut Vec<String>) -> Option<Manifest> {
        let meta = match self.meta {
            Some(meta) => meta.validate(problems),
            None => {
                problems.push("missing `meta`".to_string());
                None
            }
        };

        let mut episodes = Vec::new();
        match self.episodes {
            Some(entries) => {
                for (id, name) in entries {
                    match name {
                        JsonValue::String(name) => episodes.push(Episode { id, name }),
                        _ => problems.push(format!("`episodes.{id}` must be a string")),
                    }
                }
            }
            None => problems.push("missing `episodes`".to_string()),
        }

        Some(Manifest {
            meta: meta?,
            episodes,
        })
    }
}

impl RawMeta {
    fn validate(self, problems: &mut Vec<String>) -> Option<Meta> {
        let mut languages = BTreeMap::new();
        match self.languages {
            Some(entries) => {
                for (code, language) in entries {
                    match language.name {
                        Some(name) => {
                            languages.insert(code, name);
                        }
                        None => problems.push(format!("missing `meta.languages.{code}.name`")),
                    }
                }
            }
            None => problems.push("missing `meta.languages`".to_string()),
        }

        let video = match self.video.and_then(|video| video.language) {
            Some(language) => resolve_name(&languages, &language, "meta.video", problems)
                .map(|display_name| VideoRule {
                    language,
                    display_name,
                }),
            None => {
                problems.push("missing `meta.video.language`".to_string());
                None
            }
        };

        let audio = validate_rules(self.audio, &languages, "meta.audio", problems);
        let subtitles = validate_rules(self.subtitles, &languages, "meta.subtitles", problems);

        let rename_files = self.rename_files;
        if rename_files.is_none() {
            problems.push("missing `meta.renameFiles`".to_string());
        }

        Some(Meta {
            languages,
            video: video?,
            audio: audio?,
            subtitles: subtitles?,
            rename_files: rename_files?,
        })
    }
}

fn validate_rules(
    rules: Option<Vec<RawTrackRule>>,
    languages: &BTreeMap<String, String>,
    field: &str,
    problems: &mut Vec<String>,
) -> Option<Vec<TrackRule>> {
    let Some(rules) = rules else {
        problems.push(format!("missing `{field}`"));
        return None;
    };

    let mut valid = Vec::with_capacity(rules.len());
    for (index, rule) in rules.into_iter().enumerate() {
        let entry = format!("{field}[{index}]");
        if rule.default.is_none() {
            problems.push(format!("missing `{entry}.default`"));
        }
        let Some(language) = rule.language else {
            problems.push(format!("missing `{entry}.language`"));
            continue;
        };
        let display_name = resolve_name(languages, &language, &entry, problems);
        if let (Some(display_name), Some(default)) = (display_name, rule.default) {
            valid.push(TrackRule {
                language,
                display_name,
                default,
            });
        }
    }
    Some(valid)
}

fn resolve_name(
    languages: &BTreeMap<String, String>,
    code: &str,
    field: &str,
    problems: &mut Vec<String>,
) -> Option<String> {
    let name = languages.get(code).cloned();
    if name.is_none() {
        problems.push(format!(
            "`{field}` refers to language `{code}` which has no `meta.languages.{code}.name`"
        ));
    }
    name
}
