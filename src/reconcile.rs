use crate::error::Result;
use crate::manifest::{Episode, Meta, TrackRule};
use crate::mkvtoolnix::{Edit, MetadataTool, Property, Section, Snapshot, TrackKind};
use crate::report::{Anomaly, Reporter};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const SERIES: &str = "Friends";

/// `"<Series> - <episode id> - <episode name>"`
pub fn canonical_name(id: &str, name: &str) -> String {
    format!("{SERIES} - {id} - {name}")
}

/// First file whose path contains the episode id.
///
/// Plain substring matching: `S01E01` also matches `S01E010`, so the first
/// file in traversal order wins.
pub fn find_episode_file<'a>(files: &'a [PathBuf], id: &str) -> Option<&'a Path> {
    files
        .iter()
        .find(|file| file.to_string_lossy().contains(id))
        .map(PathBuf::as_path)
}

/// Edits needed to bring `snapshot` in line with `meta`, in the order they should be applied
pub fn plan_edits(meta: &Meta, canonical: &str, snapshot: &Snapshot) -> Vec<Edit> {
    let mut edits = Vec::new();

    if snapshot.title.as_deref() != Some(canonical) {
        edits.push(Edit::new(Section::Info, Property::Title, canonical));
    }

    if let Some(track) = snapshot.first_track(TrackKind::Video, None) {
        let section = Section::Track(track.number);
        if track.name.as_deref() != Some(meta.video.display_name.as_str()) {
            edits.push(Edit::new(section, Property::Name, &meta.video.display_name));
        }
        if track.language.as_deref() != Some(meta.video.language.as_str()) {
            edits.push(Edit::new(section, Property::Language, &meta.video.language));
        }
    }

    plan_track_rules(&meta.audio, TrackKind::Audio, snapshot, &mut edits);
    plan_track_rules(&meta.subtitles, TrackKind::Subtitles, snapshot, &mut edits);

    edits
}

fn plan_track_rules(
    rules: &[TrackRule],
    kind: TrackKind,
    snapshot: &Snapshot,
    edits: &mut Vec<Edit>,
) {
    for rule in rules {
        // Only the first track with this language is considered
        let Some(track) = snapshot.first_track(kind, Some(rule.language.as_str())) else {
            continue;
        };
        let section = Section::Track(track.number);
        if track.name.as_deref() != Some(rule.display_name.as_str()) {
            edits.push(Edit::new(section, Property::Name, &rule.display_name));
        }
        if track.default_track != Some(rule.default) {
            let flag = if rule.default { "yes" } else { "no" };
            edits.push(Edit::new(section, Property::DefaultFlag, flag));
        }
    }
}

/// New path for `file` if its name (extension and case ignored) differs from `canonical`
pub fn rename_target(file: &Path, canonical: &str) -> Option<PathBuf> {
    let stem = file.file_stem()?.to_string_lossy();
    if stem.to_uppercase() == canonical.to_uppercase() {
        return None;
    }

    let mut file_name = OsString::from(canonical);
    if let Some(extension) = file.extension() {
        file_name.push(".");
        file_name.push(extension);
    }
    Some(file.with_file_name(file_name))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// No file matched the episode id
    Skipped,
    Reconciled {
        file: PathBuf,
        edits: Vec<Edit>,
        renamed_to: Option<PathBuf>,
    },
}

/// Bring the file of one episode in line with the manifest.
///
/// Edits are applied one after the other; nothing is rolled back if one of
/// them fails.
pub async fn reconcile_episode<T: MetadataTool>(
    tool: &T,
    meta: &Meta,
    files: &[PathBuf],
    episode: &Episode,
    reporter: &Reporter,
) -> Result<Outcome> {
    let canonical = canonical_name(&episode.id, &episode.name);
    let Some(file) = find_episode_file(files, &episode.id) else {
        debug!(episode = %episode.id, "No file matches episode, skipping");
        info!(episode = %episode.id, edits = 0, "Edits for {} finished", episode.id);
        return Ok(Outcome::Skipped);
    };

    debug!(episode = %episode.id, file = %file.display(), "Reading metadata");
    let snapshot = tool.identify(file).await?;

    let edits = plan_edits(meta, &canonical, &snapshot);
    for edit in &edits {
        tool.set_property(file, edit).await?;
    }

    let mut renamed_to = None;
    if meta.rename_files
        && let Some(target) = rename_target(file, &canonical)
    {
        tokio::fs::rename(file, &target).await?;
        info!(
            episode = %episode.id,
            from = %file.display(),
            to = %target.display(),
            "Renamed file"
        );
        renamed_to = Some(target);
    }

    if snapshot.count(TrackKind::Audio) == 0 {
        reporter.record(Anomaly::no_audio(&canonical));
    }

    info!(episode = %episode.id, edits = edits.len(), "Edits for {} finished", episode.id);

    Ok(Outcome::Reconciled {
        file: file.to_path_buf(),
        edits,
        renamed_to,
    })
}
