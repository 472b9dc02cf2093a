use crate::error::{PreviewError, Result};
use crate::script::KeyScheme;
use crate::timeline::PX_PER_SECOND;

pub const ENV_PX_PER_SECOND: &str = "ANIME_PREVIEW_PX_PER_SECOND";
pub const ENV_KEY_SCHEME: &str = "ANIME_PREVIEW_KEY_SCHEME";
pub const ENV_VIDEO_PLAYER: &str = "ANIME_PREVIEW_VIDEO_PLAYER";

const DEFAULT_VIDEO_PLAYER: &str = "ffplay";

/// Options given on the command line. Unset fields fall back to the
/// environment, then to defaults.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub px_per_second: Option<u32>,
    pub key_scheme: Option<String>,
    pub video_player: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreviewConfig {
    pub px_per_second: u32,
    pub key_scheme: KeyScheme,
    /// 外部播放器命令，`None` 表示不播放视频
    pub video_player: Option<String>,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            px_per_second: PX_PER_SECOND,
            key_scheme: KeyScheme::Stable,
            video_player: Some(DEFAULT_VIDEO_PLAYER.to_string()),
        }
    }
}

impl PreviewConfig {
    pub fn from_env(cli: ConfigOverrides) -> Result<Self> {
        Self::resolve(cli, |key| std::env::var(key).ok())
    }

    /// CLI wins over env, env wins over defaults.
    pub fn resolve(cli: ConfigOverrides, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let px_per_second = match cli.px_per_second {
            Some(px) => px,
            None => match env(ENV_PX_PER_SECOND) {
                Some(raw) => raw.trim().parse::<u32>().map_err(|_| {
                    PreviewError::ConfigError(format!("{} must be a positive integer, got {:?}", ENV_PX_PER_SECOND, raw))
                })?,
                None => defaults.px_per_second,
            },
        };
        if px_per_second == 0 {
            return Err(PreviewError::ConfigError("pixels per second must be at least 1".to_string()));
        }

        let key_scheme = match cli.key_scheme.or_else(|| env(ENV_KEY_SCHEME)) {
            Some(raw) => KeyScheme::parse(&raw).ok_or_else(|| {
                PreviewError::ConfigError(format!("Unknown key scheme {:?} (expected stable or legacy)", raw))
            })?,
            None => defaults.key_scheme,
        };

        let video_player = match cli.video_player.or_else(|| env(ENV_VIDEO_PLAYER)) {
            Some(raw) if raw.trim().is_empty() || raw.trim().eq_ignore_ascii_case("none") => None,
            Some(raw) => Some(raw.trim().to_string()),
            None => defaults.video_player,
        };

        Ok(Self {
            px_per_second,
            key_scheme,
            video_player,
        })
    }
}
