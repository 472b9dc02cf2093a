use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{PreviewError, Result};
use crate::script::shot::{MAX_SHOT_SECS, MIN_SHOT_SECS};
use crate::script::{ParsedShot, ShotId};

/// Called with `(shot id, seconds)` after every adjustment so the host can
/// persist it next to the script block.
pub type DurationListener = Box<dyn FnMut(&ShotId, f64) + Send>;

/// 用户对分镜时长的调整，不修改剧本文本
#[derive(Default)]
pub struct DurationModel {
    overrides: BTreeMap<ShotId, f64>,
    listener: Option<DurationListener>,
}

impl fmt::Debug for DurationModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DurationModel")
            .field("overrides", &self.overrides)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

impl DurationModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overrides(overrides: BTreeMap<ShotId, f64>) -> Self {
        Self {
            overrides: sanitize(overrides),
            listener: None,
        }
    }

    pub fn on_update(mut self, listener: DurationListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn overrides(&self) -> &BTreeMap<ShotId, f64> {
        &self.overrides
    }

    /// Write the effective duration of every shot.
    pub fn apply(&self, shots: &mut [ParsedShot]) {
        for shot in shots.iter_mut() {
            shot.apply_override(self.overrides.get(&shot.id).copied());
        }
    }

    /// Lengthen or shorten a shot by `delta_secs`, kept between one second
    /// and one day.
    /// Out-of-range indices are ignored. Returns the new duration in seconds.
    pub fn adjust(&mut self, shots: &mut [ParsedShot], index: usize, delta_secs: f64) -> Option<f64> {
        if !delta_secs.is_finite() {
            return None;
        }
        let shot = shots.get_mut(index)?;
        let secs = (shot.duration_secs() + delta_secs).clamp(MIN_SHOT_SECS, MAX_SHOT_SECS);

        self.overrides.insert(shot.id.clone(), secs);
        shot.apply_override(Some(secs));
        info!("Shot {} ({}) duration set to {:.1}s", index, shot.id, secs);

        if let Some(listener) = self.listener.as_mut() {
            listener(&shot.id, secs);
        }
        Some(secs)
    }

    /// 清空全部调整，恢复剧本时长
    pub fn reset(&mut self, shots: &mut [ParsedShot]) {
        self.overrides.clear();
        self.apply(shots);
        info!("Duration overrides cleared");
    }
}

fn sanitize(overrides: BTreeMap<ShotId, f64>) -> BTreeMap<ShotId, f64> {
    overrides
        .into_iter()
        .filter_map(|(id, secs)| {
            if !secs.is_finite() {
                warn!("Dropping invalid duration override for {}", id);
                return None;
            }
            Some((id, secs.clamp(MIN_SHOT_SECS, MAX_SHOT_SECS)))
        })
        .collect()
}

/// JSON sidecar holding `{ shotId: seconds }` for one script block.
#[derive(Debug, Clone)]
pub struct OverrideStore {
    path: PathBuf,
}

impl OverrideStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<script>.durations.json` next to the script file.
    pub fn beside(script_path: &Path) -> Self {
        let mut name = script_path
            .file_stem()
            .map(|s| s.to_os_string())
            .unwrap_or_default();
        name.push(".durations.json");
        Self::new(script_path.with_file_name(name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty map.
    pub fn load(&self) -> Result<BTreeMap<ShotId, f64>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        let map: BTreeMap<ShotId, f64> = serde_json::from_str(&raw).map_err(|e| {
            PreviewError::ConfigError(format!(
                "Failed to parse duration overrides {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(sanitize(map))
    }

    pub fn save(&self, overrides: &BTreeMap<ShotId, f64>) -> Result<()> {
        let json = serde_json::to_string_pretty(overrides)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    /// Listener that merges each adjustment into the sidecar. An unreadable
    /// sidecar is left untouched.
    pub fn listener(self) -> DurationListener {
        Box::new(move |id: &ShotId, secs: f64| {
            let mut saved = match self.load() {
                Ok(saved) => saved,
                Err(e) => {
                    warn!("Not saving duration override {}: {}", id, e);
                    return;
                }
            };
            saved.insert(id.clone(), secs);
            match self.save(&saved) {
                Ok(()) => info!("Saved duration override {} = {:.1}s", id, secs),
                Err(e) => warn!("Failed to save duration overrides: {}", e),
            }
        })
    }
}
