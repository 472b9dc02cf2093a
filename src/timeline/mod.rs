pub mod duration;

use crate::script::{ParsedShot, ShotId};

pub use duration::{DurationListener, DurationModel, OverrideStore};

/// Default timeline scale.
pub const PX_PER_SECOND: u32 = 20;

/// 时间轴上的一段（对应一个分镜）
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub index: usize,
    pub id: ShotId,
    pub start_ms: u64,
    pub duration_ms: u64,
    pub offset_px: u32,
    pub width_px: u32,
}

/// Horizontal, duration-proportional layout of a shot list.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    segments: Vec<Segment>,
    px_per_second: u32,
}

impl Timeline {
    pub fn layout(shots: &[ParsedShot], px_per_second: u32) -> Self {
        let mut segments = Vec::with_capacity(shots.len());
        let mut start_ms = 0;
        let mut offset_px = 0;

        for shot in shots {
            let width_px =
                u32::try_from(shot.duration_ms.saturating_mul(u64::from(px_per_second)) / 1000).unwrap_or(u32::MAX);
            segments.push(Segment {
                index: shot.index,
                id: shot.id.clone(),
                start_ms,
                duration_ms: shot.duration_ms,
                offset_px,
                width_px,
            });
            start_ms = start_ms.saturating_add(shot.duration_ms);
            offset_px = offset_px.saturating_add(width_px);
        }

        Self {
            segments,
            px_per_second,
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn px_per_second(&self) -> u32 {
        self.px_per_second
    }

    pub fn total_ms(&self) -> u64 {
        self.segments
            .last()
            .map_or(0, |s| s.start_ms.saturating_add(s.duration_ms))
    }

    pub fn width_px(&self) -> u32 {
        self.segments
            .last()
            .map_or(0, |s| s.offset_px.saturating_add(s.width_px))
    }

    /// Shot under a click at `x` pixels from the start of the timeline.
    pub fn hit_test(&self, x: u32) -> Option<usize> {
        self.segments
            .iter()
            .find(|s| x >= s.offset_px && x < s.offset_px.saturating_add(s.width_px))
            .map(|s| s.index)
    }

    /// Render as one character per `px_per_char` pixels, marking the current
    /// shot with `#` and the rest with alternating `=`/`-`.
    pub fn render_ascii(&self, current: Option<usize>, px_per_char: u32) -> String {
        let px_per_char = px_per_char.max(1);
        let mut out = String::from("|");
        for segment in &self.segments {
            let cells = (segment.width_px / px_per_char).max(1);
            let fill = if Some(segment.index) == current {
                '#'
            } else if segment.index % 2 == 0 {
                '='
            } else {
                '-'
            };
            out.extend(std::iter::repeat(fill).take(cells as usize));
            out.push('|');
        }
        out
    }
}
