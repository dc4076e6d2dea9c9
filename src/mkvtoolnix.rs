//! Reading and writing Matroska metadata through the MKVToolNix command line tools.
//!
//! Reads use `mkvmerge -J <file>`, which prints a JSON identification document.
//! Writes use `mkvpropedit -v <file> --edit <section> --set <property>=<value>`.
//! Both are started with an argument vector, never through a shell, so file
//! names and values are passed through untouched.

use crate::config::Config;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::ffi::OsString;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
    Subtitles,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub kind: TrackKind,
    /// Track number as used by `mkvpropedit --edit track:<number>`
    pub number: u64,
    pub name: Option<String>,
    pub language: Option<String>,
    pub default_track: Option<bool>,
}

/// Metadata of one file at the moment it was read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub title: Option<String>,
    pub tracks: Vec<Track>,
}

impl Snapshot {
    /// Parse the output of `mkvmerge -J`
    pub fn from_identification(json: &[u8]) -> serde_json::Result<Self> {
        let identification: Identification = serde_json::from_slice(json)?;
        Ok(Self {
            title: identification.container.properties.title,
            tracks: identification
                .tracks
                .into_iter()
                .map(|track| Track {
                    kind: track.kind,
                    number: track.properties.number,
                    name: track.properties.track_name,
                    language: track.properties.language,
                    default_track: track.properties.default_track,
                })
                .collect(),
        })
    }

    /// First track of `kind`, optionally restricted to a language
    pub fn first_track(&self, kind: TrackKind, language: Option<&str>) -> Option<&Track> {
        self.tracks.iter().find(|track| {
            track.kind == kind && language.is_none_or(|l| track.language.as_deref() == Some(l))
        })
    }

    pub fn count(&self, kind: TrackKind) -> usize {
        self.tracks.iter().filter(|track| track.kind == kind).count()
    }
}

#[derive(Debug, Deserialize)]
struct Identification {
    #[serde(default)]
    container: ContainerInfo,
    #[serde(default)]
    tracks: Vec<TrackInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct ContainerInfo {
    #[serde(default)]
    properties: ContainerProperties,
}

#[derive(Debug, Default, Deserialize)]
struct ContainerProperties {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrackInfo {
    #[serde(rename = "type")]
    kind: TrackKind,
    properties: TrackProperties,
}

#[derive(Debug, Deserialize)]
struct TrackProperties {
    number: u64,
    track_name: Option<String>,
    language: Option<String>,
    default_track: Option<bool>,
}

/// Part of the file an edit applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    /// Segment information, where the container title lives
    Info,
    Track(u64),
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Section::Info => write!(f, "info"),
            Section::Track(number) => write!(f, "track:{number}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    Title,
    Name,
    Language,
    DefaultFlag,
}

impl Property {
    pub fn as_str(&self) -> &'static str {
        match self {
            Property::Title => "title",
            Property::Name => "name",
            Property::Language => "language",
            Property::DefaultFlag => "flag-default",
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single property change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub section: Section,
    pub property: Property,
    pub value: String,
}

impl Edit {
    pub fn new(section: Section, property: Property, value: impl Into<String>) -> Self {
        Self {
            section,
            property,
            value: value.into(),
        }
    }
}

impl fmt::Display for Edit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}={}", self.section, self.property, self.value)
    }
}

/// Reads and writes container metadata
pub trait MetadataTool: Send + Sync + 'static {
    fn identify(&self, path: &Path) -> impl Future<Output = Result<Snapshot>> + Send;

    fn set_property(&self, path: &Path, edit: &Edit) -> impl Future<Output = Result<()>> + Send;
}

/// [`MetadataTool`] backed by the `mkvmerge` and `mkvpropedit` executables.
///
/// Every process start waits for a permit, so at most `permits` tool
/// processes run at the same time no matter how many episodes are in flight.
#[derive(Debug, Clone)]
pub struct MkvToolnix {
    mkvmerge: String,
    mkvpropedit: String,
    semaphore: Arc<Semaphore>,
}

impl MkvToolnix {
    pub fn new(
        mkvmerge: impl Into<String>,
        mkvpropedit: impl Into<String>,
        permits: usize,
    ) -> Self {
        Self {
            mkvmerge: mkvmerge.into(),
            mkvpropedit: mkvpropedit.into(),
            semaphore: Arc::new(Semaphore::new(permits)),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.mkvmerge, &config.mkvpropedit, config.jobs)
    }

    async fn run(&self, program: &str, args: Vec<OsString>, path: &Path) -> Result<Vec<u8>> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|error| Error::subprocess(program, path, error.to_string()))?;

        debug!(program, ?args, "Running command");
        let output = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|error| {
                Error::subprocess(program, path, format!("failed to start: {error}"))
            })?;

        if !output.status.success() {
            // mkvtoolnix reports most errors on stdout
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let message = if stderr.trim().is_empty() {
                stdout.trim()
            } else {
                stderr.trim()
            };
            debug!(program, status = %output.status, message, "Command failed");
            return Err(Error::subprocess(
                program,
                path,
                format!("{}: {message}", output.status),
            ));
        }

        trace!(program, bytes = output.stdout.len(), "Command finished");
        Ok(output.stdout)
    }
}

impl MetadataTool for MkvToolnix {
    async fn identify(&self, path: &Path) -> Result<Snapshot> {
        let args = vec![OsString::from("-J"), path.as_os_str().to_owned()];
        let stdout = self.run(&self.mkvmerge, args, path).await?;
        Snapshot::from_identification(&stdout).map_err(|error| {
            Error::subprocess(&self.mkvmerge, path, format!("unexpected output: {error}"))
        })
    }

    async fn set_property(&self, path: &Path, edit: &Edit) -> Result<()> {
        debug!(file = %path.display(), %edit, "Updating property");
        self.run(&self.mkvpropedit, propedit_args(path, edit), path)
            .await
            .map(drop)
    }
}

/// `mkvpropedit` arguments applying `edit` to `path`
pub fn propedit_args(path: &Path, edit: &Edit) -> Vec<OsString> {
    vec![
        OsString::from("-v"),
        path.as_os_str().to_owned(),
        OsString::from("--edit"),
        OsString::from(edit.section.to_string()),
        OsString::from("--set"),
        OsString::from(format!("{}={}", edit.property, edit.value)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENTIFICATION: &str = r#"{
        "container": {
            "properties": { "title": "old", "duration": 1320000000000 },
            "recognized": true,
            "type": "Matroska"
        },
        "tracks": [
            { "id": 0, "type": "video", "codec": "AVC",
              "properties": { "number": 1, "language": "jpn", "track_name": "x", "default_track": true } },
            { "id": 1, "type": "audio", "codec": "AAC",
              "properties": { "number": 2, "language": "eng", "track_name": "y", "default_track": false } },
            { "id": 2, "type": "subtitles", "codec": "SubRip/SRT",
              "properties": { "number": 3, "language": "spa" } },
            { "id": 3, "type": "buttons", "codec": "HDMV PGS",
              "properties": { "number": 4 } }
        ]
    }"#;

    #[test]
    fn test_parse_identification() {
        let snapshot = Snapshot::from_identification(IDENTIFICATION.as_bytes()).unwrap();

        assert_eq!(snapshot.title.as_deref(), Some("old"));
        assert_eq!(snapshot.tracks.len(), 4);
        assert_eq!(
            snapshot.tracks[1],
            Track {
                kind: TrackKind::Audio,
                number: 2,
                name: Some("y".to_string()),
                language: Some("eng".to_string()),
                default_track: Some(false),
            }
        );
        assert_eq!(snapshot.tracks[2].name, None);
        assert_eq!(snapshot.tracks[2].default_track, None);
        assert_eq!(snapshot.tracks[3].kind, TrackKind::Other);
    }

    #[test]
    fn test_parse_without_title_or_tracks() {
        let snapshot = Snapshot::from_identification(br#"{"container": {}}"#).unwrap();
        assert_eq!(snapshot, Snapshot::default());
    }

    #[test]
    fn test_reject_non_json_output() {
        assert!(Snapshot::from_identification(b"Error: not a Matroska file").is_err());
    }

    #[test]
    fn test_first_track_matches_kind_and_language() {
        let snapshot = Snapshot::from_identification(IDENTIFICATION.as_bytes()).unwrap();

        assert_eq!(snapshot.first_track(TrackKind::Video, None).unwrap().number, 1);
        assert_eq!(
            snapshot
                .first_track(TrackKind::Audio, Some("eng"))
                .unwrap()
                .number,
            2
        );
        assert!(snapshot.first_track(TrackKind::Audio, Some("spa")).is_none());
        assert_eq!(snapshot.count(TrackKind::Subtitles), 1);
        assert_eq!(snapshot.count(TrackKind::Audio), 1);
    }

    #[test]
    fn test_propedit_args_keep_quotes_intact() {
        let path = Path::new("/media/Friends \"S01\"/ep 1.mkv");
        let edit = Edit::new(Section::Track(3), Property::Name, "Director's \"cut\" $(rm)");

        let args = propedit_args(path, &edit);
        assert_eq!(
            args,
            [
                "-v",
                "/media/Friends \"S01\"/ep 1.mkv",
                "--edit",
                "track:3",
                "--set",
                "name=Director's \"cut\" $(rm)",
            ]
            .map(OsString::from)
        );
    }

    #[test]
    fn test_edit_display() {
        let edit = Edit::new(Section::Info, Property::Title, "Friends - S01E01 - The Pilot");
        assert_eq!(edit.to_string(), "info title=Friends - S01E01 - The Pilot");
        assert_eq!(Property::DefaultFlag.to_string(), "flag-default");
    }

    #[tokio::test]
    async fn test_missing_executable_is_a_subprocess_error() {
        let tool = MkvToolnix::new("/nonexistent/mkvmerge", "/nonexistent/mkvpropedit", 1);
        let error = tool.identify(Path::new("episode.mkv")).await.unwrap_err();
        assert!(matches!(error, Error::Subprocess { .. }));
    }
}
