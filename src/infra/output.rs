//! Date-stamped output layout for a pipeline run.
//!
//! ```text
//! <root>/fingerprints/fingerprints_<date>.json
//! <root>/actors/{pgp,btc,email}_map_<date>.json
//! <root>/grouped_titles/grouped_titles_<date>.json   (absent when the run has no clusters)
//! ```

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

use crate::core::actors::ArtifactKind;
use crate::core::pipeline::{PipelineError, PipelineOutput};
use crate::infra::io::{StagedJson, stage_json};

pub const FINGERPRINTS_DIR: &str = "fingerprints";
pub const ACTORS_DIR: &str = "actors";
pub const GROUPED_TITLES_DIR: &str = "grouped_titles";

/// Where one run's files go
#[derive(Debug, Clone)]
pub struct OutputLayout
{
    root: PathBuf,
    stamp: String,
}

impl OutputLayout
{
    pub fn new(
        root: impl Into<PathBuf>,
        date: NaiveDate,
    ) -> Self
    {
        Self {
            root: root.into(),
            stamp: date
                .format("%Y-%m-%d")
                .to_string(),
        }
    }

    /// Layout stamped with today's local date
    pub fn today(root: impl Into<PathBuf>) -> Self
    {
        Self::new(
            root,
            chrono::Local::now().date_naive(),
        )
    }

    pub fn root(&self) -> &Path
    {
        &self.root
    }

    pub fn fingerprints(&self) -> PathBuf
    {
        self.root
            .join(FINGERPRINTS_DIR)
            .join(format!("fingerprints_{}.json", self.stamp))
    }

    pub fn actor_map(
        &self,
        kind: ArtifactKind,
    ) -> PathBuf
    {
        self.root
            .join(ACTORS_DIR)
            .join(format!("{}_{}.json", kind.file_stem(), self.stamp))
    }

    pub fn grouped_titles(&self) -> PathBuf
    {
        self.root
            .join(GROUPED_TITLES_DIR)
            .join(format!("grouped_titles_{}.json", self.stamp))
    }
}

/// Paths actually written
#[derive(Debug, Clone, Serialize)]
pub struct WrittenOutputs
{
    pub fingerprints: PathBuf,
    pub actor_maps: Vec<PathBuf>,
    pub grouped_titles: Option<PathBuf>,
}

/// Persist a finished run.
///
/// Every file is serialized to a temp file first; the dated names are only
/// replaced once all of them serialized cleanly. A run without clusters
/// removes a grouped-titles file left by an earlier run on the same day.
pub fn write_outputs(
    layout: &OutputLayout,
    output: &PipelineOutput,
) -> Result<WrittenOutputs, PipelineError>
{
    let fingerprints = stage_json(&layout.fingerprints(), &output.index)?;

    let actor_maps = ArtifactKind::ALL
        .iter()
        .map(|kind| {
            stage_json(
                &layout.actor_map(*kind),
                output
                    .actors
                    .get(*kind),
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    let grouped_titles = if output
        .clusters
        .is_empty()
    {
        None
    }
    else
    {
        Some(stage_json(&layout.grouped_titles(), &output.clusters)?)
    };

    debug!(files = 4 + usize::from(grouped_titles.is_some()), "outputs staged");

    let fingerprints = fingerprints.commit()?;
    let actor_maps = actor_maps
        .into_iter()
        .map(StagedJson::commit)
        .collect::<Result<Vec<_>, _>>()?;
    let grouped_titles = match grouped_titles
    {
        Some(staged) => Some(staged.commit()?),
        None =>
        {
            remove_stale(&layout.grouped_titles())?;
            None
        }
    };

    info!(root = %layout.root().display(), "outputs written");
    Ok(WrittenOutputs { fingerprints, actor_maps, grouped_titles })
}

fn remove_stale(path: &Path) -> Result<(), PipelineError>
{
    match std::fs::remove_file(path)
    {
        Ok(()) =>
        {
            info!(path = %path.display(), "removed grouped titles from an earlier run");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(PipelineError::Output { path: path.to_path_buf(), source }),
    }
}
