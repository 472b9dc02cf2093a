use super::{CharacterAsset, SceneImage};

/// Number of leading characters of a shot description used to look up its
/// generated scene asset.
pub const MATCH_PREFIX_CHARS: usize = 20;

/// Find the generated scene asset for a shot. Matching is loose: the first
/// asset whose description contains the shot's lowercased prefix wins.
pub fn match_scene_image<'a>(description: &str, images: &'a [SceneImage]) -> Option<&'a SceneImage> {
    let prefix: String = description
        .trim()
        .to_lowercase()
        .chars()
        .take(MATCH_PREFIX_CHARS)
        .collect();
    // 空描述会匹配所有素材，直接跳过
    if prefix.is_empty() {
        return None;
    }

    images
        .iter()
        .find(|image| image.shot_description.to_lowercase().contains(&prefix))
}

/// 按名称（忽略大小写）匹配角色
pub fn match_character<'a>(speaker: &str, characters: &'a [CharacterAsset]) -> Option<&'a CharacterAsset> {
    let speaker = speaker.trim().to_lowercase();
    characters
        .iter()
        .find(|c| c.name.trim().to_lowercase() == speaker)
}
