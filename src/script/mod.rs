pub mod assets;
pub mod parser;
pub mod shot;

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PreviewError, Result};

pub use assets::{match_character, match_scene_image};
pub use parser::{parse_script, ShotDraft};
pub use shot::{build_shots, AudioKind, AudioLine, KeyScheme, ParsedShot, ShotId};

/// 一集剧本（由 AI 生成的分镜脚本文本）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptBlock {
    pub id: String,
    #[serde(default)]
    pub episode: String,
    pub content: String,
    /// 已生成的分镜图片/视频
    #[serde(default)]
    pub scene_images: Vec<SceneImage>,
}

impl ScriptBlock {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            episode: String::new(),
            content: content.into(),
            scene_images: Vec::new(),
        }
    }
}

/// 分镜对应的生成素材
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneImage {
    pub shot_description: String,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default)]
    pub is_generating_video: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_error: Option<String>,
}

/// 角色形象与音色
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterAsset {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub voice_id: String,
}

/// Load a script block. `.json` files hold a full [`ScriptBlock`]; anything
/// else is raw script text and the file stem becomes the block id.
pub fn load_block(path: &Path) -> Result<ScriptBlock> {
    let raw = std::fs::read_to_string(path)?;

    let block = if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str::<ScriptBlock>(&raw).map_err(|e| {
            PreviewError::ScriptError(format!(
                "Failed to parse script block {}: {}",
                path.display(),
                e
            ))
        })?
    } else {
        let id = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "script".to_string());
        ScriptBlock::new(id, raw)
    };

    info!(
        "Loaded script block {} ({} characters, {} scene assets)",
        block.id,
        block.content.len(),
        block.scene_images.len()
    );
    Ok(block)
}

pub fn load_characters(path: &Path) -> Result<Vec<CharacterAsset>> {
    let raw = std::fs::read_to_string(path)?;
    let characters: Vec<CharacterAsset> = serde_json::from_str(&raw).map_err(|e| {
        PreviewError::AssetError(format!(
            "Failed to parse characters {}: {}",
            path.display(),
            e
        ))
    })?;

    info!("Loaded {} character assets", characters.len());
    Ok(characters)
}
