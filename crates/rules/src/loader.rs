//! YAML target definition loader.
//!
//! Reads a directory of `*.yml`/`*.yaml` files, each holding one
//! [`TargetDefinition`], and turns them into [`SlaTarget`]s for seeding a
//! target store at startup. Files that fail to parse or validate are
//! reported per-file and never abort the rest of the directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use casewatch_core::{ReferenceModule, SlaTarget, TriggerRules};

use crate::validation::validate_target;

/// Errors from target definition loading.
#[derive(Debug, thiserror::Error)]
pub enum TargetDefError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// The authoring shape of a target: what a YAML file or a create request
/// carries. Identity and timestamps are assigned when the definition is
/// turned into an [`SlaTarget`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetDefinition {
    pub key: String,
    pub name: String,
    pub goal_ms: i64,
    pub reference_module: ReferenceModule,
    #[serde(default)]
    pub business_line_id: Option<Uuid>,
    #[serde(default)]
    pub rules: TriggerRules,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl TargetDefinition {
    pub fn into_target(self) -> SlaTarget {
        let mut target = SlaTarget::new(
            self.key,
            self.name,
            self.goal_ms,
            self.reference_module,
            self.business_line_id,
            self.rules,
        );
        target.is_active = self.is_active;
        target
    }
}

/// Outcome of loading a single definition file.
#[derive(Debug)]
pub struct LoadResult {
    pub path: PathBuf,
    pub status: LoadStatus,
}

/// Status of a single file load attempt.
#[derive(Debug)]
pub enum LoadStatus {
    Loaded { key: String },
    Skipped { reason: String },
    Failed { error: String },
}

/// Load all target definitions from a directory.
///
/// Returns the successfully loaded targets plus a per-file result list.
/// Non-YAML files and dotfiles are skipped; parse failures, validation
/// failures, and duplicate keys are reported as `Failed` without aborting
/// the directory.
pub fn load_dir(dir: &Path) -> Result<(Vec<SlaTarget>, Vec<LoadResult>), TargetDefError> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    entries.sort();

    let mut targets: Vec<SlaTarget> = Vec::new();
    let mut results = Vec::new();

    for path in entries {
        let status = match load_file(&path, &targets) {
            FileOutcome::Loaded(target) => {
                info!(path = %path.display(), key = %target.key, "loaded target definition");
                let key = target.key.clone();
                targets.push(target);
                LoadStatus::Loaded { key }
            }
            FileOutcome::Skipped(reason) => LoadStatus::Skipped { reason },
            FileOutcome::Failed(error) => {
                warn!(path = %path.display(), error = %error, "failed to load target definition");
                LoadStatus::Failed { error }
            }
        };
        results.push(LoadResult { path, status });
    }

    Ok((targets, results))
}

enum FileOutcome {
    Loaded(SlaTarget),
    Skipped(String),
    Failed(String),
}

fn load_file(path: &Path, loaded: &[SlaTarget]) -> FileOutcome {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    if file_name.starts_with('.') {
        return FileOutcome::Skipped("dotfile".to_string());
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some("yml") | Some("yaml") => {}
        _ => return FileOutcome::Skipped("not a YAML file".to_string()),
    }

    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => return FileOutcome::Failed(e.to_string()),
    };
    let definition: TargetDefinition = match serde_yaml::from_str(&content) {
        Ok(d) => d,
        Err(e) => return FileOutcome::Failed(e.to_string()),
    };

    if loaded.iter().any(|t| t.key == definition.key) {
        return FileOutcome::Failed(format!("duplicate target key '{}'", definition.key));
    }

    let target = definition.into_target();
    let validation = validate_target(&target);
    if !validation.valid {
        return FileOutcome::Failed(validation.error_summary());
    }

    FileOutcome::Loaded(target)
}
