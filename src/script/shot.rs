use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::assets::{match_character, match_scene_image};
use super::parser::parse_script;
use super::{CharacterAsset, ScriptBlock};

/// Smallest duration a shot can be adjusted down to.
pub const MIN_SHOT_SECS: f64 = 1.0;
/// Longest a single shot may run (24 h).
pub const MAX_SHOT_SECS: f64 = 86_400.0;

/// 分镜标识，仅在一次解析内唯一
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShotId(String);

impl ShotId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How shot ids are derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyScheme {
    /// Hash of the shot description plus its occurrence count, so edits to
    /// other shots leave the id (and any duration override) in place.
    #[default]
    Stable,
    /// Source line index of the `[Shot:]` tag. Inserting a line above a shot
    /// re-keys it.
    Legacy,
}

impl KeyScheme {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "stable" => Some(Self::Stable),
            "legacy" | "line" => Some(Self::Legacy),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioKind {
    Dialogue,
    SoundEffect,
}

/// 分镜中的一句台词或一个音效
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioLine {
    pub kind: AudioKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character: Option<CharacterAsset>,
}

impl AudioLine {
    pub fn dialogue(speaker: &str, text: &str) -> Self {
        Self {
            kind: AudioKind::Dialogue,
            speaker: Some(speaker.to_string()),
            text: text.to_string(),
            character: None,
        }
    }

    pub fn sound_effect(text: &str) -> Self {
        Self {
            kind: AudioKind::SoundEffect,
            speaker: None,
            text: text.to_string(),
            character: None,
        }
    }
}

/// 解析后的分镜，每次剧本或时长覆盖变化时重新计算
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedShot {
    pub id: ShotId,
    /// 在本次解析结果中的位置
    pub index: usize,
    pub line: usize,
    pub description: String,
    /// 剧本中写明（或默认）的时长，秒
    pub base_duration_secs: u32,
    /// 生效时长，毫秒
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bgm: Option<String>,
    pub audio: Vec<AudioLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default)]
    pub is_generating_video: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_error: Option<String>,
}

impl ParsedShot {
    pub fn duration_secs(&self) -> f64 {
        self.duration_ms as f64 / 1000.0
    }

    /// Recompute `duration_ms` from the base duration and an optional
    /// override in seconds.
    pub fn apply_override(&mut self, override_secs: Option<f64>) {
        self.duration_ms = match override_secs {
            Some(secs) => (secs.clamp(MIN_SHOT_SECS, MAX_SHOT_SECS) * 1000.0).round() as u64,
            None => u64::from(self.base_duration_secs).min(MAX_SHOT_SECS as u64) * 1000,
        };
    }
}

/// Parse a block and resolve scene/character assets and duration overrides.
/// Same inputs always yield the same shots.
pub fn build_shots(
    block: &ScriptBlock,
    characters: &[CharacterAsset],
    overrides: &BTreeMap<ShotId, f64>,
    scheme: KeyScheme,
) -> Vec<ParsedShot> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let drafts = parse_script(&block.content);
    let mut shots = Vec::with_capacity(drafts.len());

    for (index, draft) in drafts.iter().enumerate() {
        let occurrence = seen.entry(draft.description.as_str()).or_insert(0);
        let id = match scheme {
            KeyScheme::Stable => stable_id(&draft.description, *occurrence),
            KeyScheme::Legacy => ShotId(format!("line-{}", draft.line)),
        };
        *occurrence += 1;

        let mut audio = draft.audio.clone();
        for line in audio.iter_mut() {
            if let Some(speaker) = line.speaker.as_deref() {
                line.character = match_character(speaker, characters).cloned();
            }
        }

        let scene = match_scene_image(&draft.description, &block.scene_images);
        let mut shot = ParsedShot {
            id,
            index,
            line: draft.line,
            description: draft.description.clone(),
            base_duration_secs: draft.duration_secs,
            duration_ms: 0,
            bgm: draft.bgm.clone(),
            audio,
            image_url: scene.map(|s| s.image_url.clone()).filter(|url| !url.is_empty()),
            video_url: scene.and_then(|s| s.video_url.clone()),
            is_generating_video: scene.is_some_and(|s| s.is_generating_video),
            video_error: scene.and_then(|s| s.video_error.clone()),
        };
        shot.apply_override(overrides.get(&shot.id).copied());
        shots.push(shot);
    }

    debug!(block = %block.id, shots = shots.len(), "Built shot list");
    shots
}

fn stable_id(description: &str, occurrence: usize) -> ShotId {
    let mut hasher = Sha256::new();
    hasher.update(description.as_bytes());
    hasher.update(occurrence.to_le_bytes());
    let digest = hasher.finalize();
    let hex: String = digest[..8].iter().map(|b| format!("{:02x}", b)).collect();
    ShotId(format!("shot-{}", hex))
}
