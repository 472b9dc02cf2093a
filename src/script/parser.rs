//! Line-oriented parser for the bracket-tag shot format produced by the
//! storyboard generation step.
//!
//! ```text
//! [Shot:Rooftop at dusk][Duration:4]
//! [BGM:Quiet strings]
//! [角色:Alice]台词:We're late.
//! [音效:Wind gusts]
//! ```

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::shot::AudioLine;

/// Duration used when a shot has no usable `[Duration:]` tag.
pub const DEFAULT_SHOT_SECS: u32 = 3;

static SHOT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[Shot[:：]([^\]]*)\]").expect("valid regex"));
static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[Duration[:：]([^\]]*)\]").expect("valid regex"));
static BGM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[BGM[:：]([^\]]*)\]").expect("valid regex"));
static SPEAKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[角色[:：]([^\]]*)\]").expect("valid regex"));
static SPEECH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"台词[:：]([^\]]*)").expect("valid regex"));
static SFX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[音效[:：]([^\]]*)\]").expect("valid regex"));

/// 解析出的分镜草稿（尚未匹配素材、未应用时长覆盖）
#[derive(Debug, Clone, PartialEq)]
pub struct ShotDraft {
    /// `[Shot:]` 所在行号（从 0 开始）
    pub line: usize,
    pub description: String,
    pub duration_secs: u32,
    pub bgm: Option<String>,
    pub audio: Vec<AudioLine>,
}

impl ShotDraft {
    fn open(line: usize, description: String) -> Self {
        Self {
            line,
            description,
            duration_secs: DEFAULT_SHOT_SECS,
            bgm: None,
            audio: Vec::new(),
        }
    }
}

/// Split script text into shot drafts, in source order.
///
/// Unrecognised lines are skipped, and tags that show up before the first
/// `[Shot:]` have nothing to attach to and are dropped.
pub fn parse_script(content: &str) -> Vec<ShotDraft> {
    let mut shots = Vec::new();
    let mut current: Option<ShotDraft> = None;

    for (line_no, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(caps) = SHOT_RE.captures(line) {
            if let Some(done) = current.take() {
                shots.push(done);
            }
            let mut shot = ShotDraft::open(line_no, caps[1].trim().to_string());
            apply_duration(&mut shot, line);
            current = Some(shot);
            continue;
        }

        let Some(shot) = current.as_mut() else {
            debug!(line = line_no, "Dropping line outside of any shot");
            continue;
        };

        // 时长标签可以和其他标签写在同一行
        let rest = if apply_duration(shot, line) {
            DURATION_RE.replace_all(line, "")
        } else {
            Cow::Borrowed(line)
        };
        let line = rest.trim();

        if let Some(caps) = BGM_RE.captures(line) {
            shot.bgm = Some(caps[1].trim().to_string());
        } else if let Some(caps) = SPEAKER_RE.captures(line) {
            // 角色与台词必须在同一行
            match SPEECH_RE.captures(line) {
                Some(speech) => shot.audio.push(AudioLine::dialogue(
                    caps[1].trim(),
                    speech[1].trim(),
                )),
                None => debug!(line = line_no, "Speaker tag without 台词 marker"),
            }
        } else if let Some(caps) = SFX_RE.captures(line) {
            shot.audio.push(AudioLine::sound_effect(caps[1].trim()));
        }
    }

    if let Some(done) = current {
        shots.push(done);
    }
    shots
}

/// Returns true when the line carried a `[Duration:]` tag. A malformed value
/// resets the shot to the default length.
fn apply_duration(shot: &mut ShotDraft, line: &str) -> bool {
    let Some(caps) = DURATION_RE.captures(line) else {
        return false;
    };
    shot.duration_secs = caps[1]
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_SHOT_SECS);
    true
}
