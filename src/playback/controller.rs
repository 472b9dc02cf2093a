use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::script::{ParsedShot, ShotId};
use crate::timeline::DurationModel;
use crate::video::VideoSurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Stopped,
    Playing,
}

/// What the host renders for the current moment.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    pub state: PlayState,
    pub current_index: usize,
    pub shots: Vec<ParsedShot>,
}

impl PlaybackSnapshot {
    pub fn current(&self) -> Option<&ParsedShot> {
        self.shots.get(self.current_index)
    }
}

/// 分镜预览播放状态机
///
/// Owns the shot list, the play state and the current index, the single
/// pending advance deadline, and the one engaged video. Time is passed in by
/// the caller so the machine itself never sleeps.
pub struct PlaybackController<V: VideoSurface> {
    shots: Vec<ParsedShot>,
    durations: DurationModel,
    video: V,
    state: PlayState,
    current: usize,
    shot_started: Option<Instant>,
    deadline: Option<Instant>,
    video_engaged: bool,
}

impl<V: VideoSurface> PlaybackController<V> {
    pub fn new(mut shots: Vec<ParsedShot>, durations: DurationModel, video: V) -> Self {
        durations.apply(&mut shots);
        Self {
            shots,
            durations,
            video,
            state: PlayState::Stopped,
            current: 0,
            shot_started: None,
            deadline: None,
            video_engaged: false,
        }
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn shots(&self) -> &[ParsedShot] {
        &self.shots
    }

    pub fn current_shot(&self) -> Option<&ParsedShot> {
        self.shots.get(self.current)
    }

    pub fn durations(&self) -> &DurationModel {
        &self.durations
    }

    /// The one pending auto-advance, if playing.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            state: self.state,
            current_index: self.current,
            shots: self.shots.clone(),
        }
    }

    pub fn play(&mut self, now: Instant) {
        if self.state == PlayState::Playing {
            return;
        }
        if self.shots.is_empty() {
            debug!("Nothing to play");
            return;
        }
        self.state = PlayState::Playing;
        info!("Playback started at shot {}", self.current);
        self.enter_shot(now);
    }

    pub fn pause(&mut self) {
        if self.state == PlayState::Stopped {
            return;
        }
        self.halt();
        info!("Playback paused at shot {}", self.current);
    }

    pub fn toggle(&mut self, now: Instant) {
        match self.state {
            PlayState::Playing => self.pause(),
            PlayState::Stopped => self.play(now),
        }
    }

    /// Jump to a shot, clamped into range. While playing the new shot gets
    /// a fresh timer.
    pub fn seek(&mut self, index: usize, now: Instant) {
        if self.shots.is_empty() {
            return;
        }
        self.current = index.min(self.shots.len() - 1);
        debug!("Seek to shot {}", self.current);

        match self.state {
            PlayState::Playing => self.enter_shot(now),
            PlayState::Stopped => self.release_video(),
        }
    }

    pub fn next(&mut self, now: Instant) {
        self.seek(self.current.saturating_add(1), now);
    }

    pub fn prev(&mut self, now: Instant) {
        self.seek(self.current.saturating_sub(1), now);
    }

    /// Advance after the current shot's time is up. Past the last shot the
    /// player stops and rewinds to the first.
    pub fn on_deadline(&mut self, now: Instant) {
        if self.state != PlayState::Playing {
            return;
        }
        if self.current + 1 < self.shots.len() {
            self.current += 1;
            self.enter_shot(now);
        } else {
            self.halt();
            self.current = 0;
            info!("Reached end of storyboard, rewinding");
        }
    }

    /// Change a shot's length. If it is the shot playing right now, its
    /// pending advance moves to match.
    pub fn adjust_duration(&mut self, index: usize, delta_secs: f64, now: Instant) -> Option<(ShotId, f64)> {
        let secs = self.durations.adjust(&mut self.shots, index, delta_secs)?;
        let id = self.shots[index].id.clone();

        if index == self.current && self.state == PlayState::Playing {
            if let Some(started) = self.shot_started {
                let deadline = started + self.current_duration();
                self.deadline = Some(deadline.max(now));
            }
        }
        Some((id, secs))
    }

    pub fn reset_durations(&mut self, now: Instant) {
        self.durations.reset(&mut self.shots);
        if self.state == PlayState::Playing {
            if let Some(started) = self.shot_started {
                self.deadline = Some((started + self.current_duration()).max(now));
            }
        }
    }

    /// Swap in a fresh parse of the block, e.g. after the script text was
    /// edited. Overrides are re-applied by id.
    pub fn replace_shots(&mut self, mut shots: Vec<ParsedShot>, now: Instant) {
        self.durations.apply(&mut shots);
        self.shots = shots;
        info!("Shot list replaced ({} shots)", self.shots.len());

        if self.shots.is_empty() {
            self.halt();
            self.current = 0;
            return;
        }
        self.current = self.current.min(self.shots.len() - 1);
        match self.state {
            PlayState::Playing => self.enter_shot(now),
            PlayState::Stopped => self.release_video(),
        }
    }

    /// Cancel the timer and stop video. Used on pause and teardown.
    pub fn shutdown(&mut self) {
        self.halt();
    }

    fn current_duration(&self) -> Duration {
        self.current_shot()
            .map(|shot| Duration::from_millis(shot.duration_ms))
            .unwrap_or_default()
    }

    fn enter_shot(&mut self, now: Instant) {
        self.release_video();
        self.shot_started = Some(now);
        self.deadline = Some(now + self.current_duration());

        let Some(url) = self.current_shot().and_then(|s| s.video_url.clone()) else {
            return;
        };
        // 视频启动失败不影响分镜计时
        match self.video.start(&url) {
            Ok(()) => self.video_engaged = true,
            Err(e) => warn!("Failed to start video for shot {}: {}", self.current, e),
        }
    }

    fn halt(&mut self) {
        self.state = PlayState::Stopped;
        self.deadline = None;
        self.shot_started = None;
        self.release_video();
    }

    fn release_video(&mut self) {
        if self.video_engaged {
            self.video.stop();
            self.video_engaged = false;
        }
    }
}

impl<V: VideoSurface> Drop for PlaybackController<V> {
    fn drop(&mut self) {
        self.halt();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::error::{PreviewError, Result};
    use crate::script::{build_shots, KeyScheme, ScriptBlock, SceneImage};

    #[derive(Clone, Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl Recorder {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl VideoSurface for Recorder {
        fn start(&mut self, url: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("start {}", url));
            if self.fail {
                return Err(PreviewError::VideoError("decoder unavailable".into()));
            }
            Ok(())
        }

        fn stop(&mut self) {
            self.calls.lock().unwrap().push("stop".into());
        }
    }

    fn three_shots() -> Vec<ParsedShot> {
        let content = "[Shot:One][Duration:1]\n[Shot:Two][Duration:2]\n[Shot:Three][Duration:3]";
        build_shots(&ScriptBlock::new("ep", content), &[], &BTreeMap::new(), KeyScheme::Stable)
    }

    fn with_videos() -> Vec<ParsedShot> {
        let mut block = ScriptBlock::new("ep", "[Shot:One]\n[Shot:Two]\n[Shot:Three]");
        for name in ["One", "Three"] {
            block.scene_images.push(SceneImage {
                shot_description: name.into(),
                image_url: format!("{}.png", name),
                video_url: Some(format!("{}.mp4", name)),
                ..Default::default()
            });
        }
        build_shots(&block, &[], &BTreeMap::new(), KeyScheme::Stable)
    }

    fn controller(shots: Vec<ParsedShot>) -> (PlaybackController<Recorder>, Recorder) {
        let video = Recorder::default();
        (PlaybackController::new(shots, DurationModel::new(), video.clone()), video)
    }

    fn run_to_end(player: &mut PlaybackController<Recorder>) {
        while let Some(deadline) = player.deadline() {
            player.on_deadline(deadline);
        }
    }

    #[test]
    fn starts_stopped_at_first_shot() {
        let (player, _) = controller(three_shots());
        assert_eq!(player.state(), PlayState::Stopped);
        assert_eq!(player.current_index(), 0);
        assert!(player.deadline().is_none());
    }

    #[test]
    fn natural_playback_stops_and_rewinds() {
        let (mut player, _) = controller(three_shots());
        let t0 = Instant::now();
        player.play(t0);
        assert_eq!(player.deadline(), Some(t0 + Duration::from_secs(1)));

        player.on_deadline(t0 + Duration::from_secs(1));
        assert_eq!(player.current_index(), 1);
        assert_eq!(player.deadline(), Some(t0 + Duration::from_secs(3)));

        run_to_end(&mut player);
        assert_eq!(player.state(), PlayState::Stopped);
        assert_eq!(player.current_index(), 0);
    }

    #[test]
    fn pause_keeps_position_and_cancels_timer() {
        let (mut player, _) = controller(three_shots());
        let t0 = Instant::now();
        player.play(t0);
        player.on_deadline(t0 + Duration::from_secs(1));
        player.pause();

        assert_eq!(player.state(), PlayState::Stopped);
        assert_eq!(player.current_index(), 1);
        assert!(player.deadline().is_none());

        // a late timer after pause does nothing
        player.on_deadline(t0 + Duration::from_secs(10));
        assert_eq!(player.current_index(), 1);
    }

    #[test]
    fn seek_clamps_and_restarts_timer_while_playing() {
        let (mut player, _) = controller(three_shots());
        let t0 = Instant::now();
        player.seek(99, t0);
        assert_eq!(player.current_index(), 2);
        assert!(player.deadline().is_none());

        player.seek(0, t0);
        player.play(t0);
        let t1 = t0 + Duration::from_millis(500);
        player.seek(1, t1);
        assert_eq!(player.state(), PlayState::Playing);
        assert_eq!(player.deadline(), Some(t1 + Duration::from_secs(2)));
    }

    #[test]
    fn prev_and_next_stay_in_range() {
        let (mut player, _) = controller(three_shots());
        let now = Instant::now();
        player.prev(now);
        assert_eq!(player.current_index(), 0);
        player.next(now);
        player.next(now);
        player.next(now);
        assert_eq!(player.current_index(), 2);
    }

    #[test]
    fn empty_storyboard_never_plays() {
        let (mut player, _) = controller(Vec::new());
        let now = Instant::now();
        player.play(now);
        player.seek(3, now);
        assert_eq!(player.state(), PlayState::Stopped);
        assert_eq!(player.current_index(), 0);
        assert!(player.adjust_duration(0, 1.0, now).is_none());
    }

    #[test]
    fn adjusting_active_shot_moves_deadline() {
        let (mut player, _) = controller(three_shots());
        let t0 = Instant::now();
        player.play(t0);
        player.on_deadline(t0 + Duration::from_secs(1));

        let t1 = t0 + Duration::from_millis(1500);
        let (_, secs) = player.adjust_duration(1, 3.0, t1).unwrap();
        assert_eq!(secs, 5.0);
        assert_eq!(player.deadline(), Some(t0 + Duration::from_secs(6)));

        // shrinking below elapsed time fires right away
        let t2 = t0 + Duration::from_secs(4);
        player.adjust_duration(1, -100.0, t2);
        assert_eq!(player.deadline(), Some(t2));
        assert_eq!(player.shots()[1].duration_ms, 1000);
    }

    #[test]
    fn adjusting_other_shot_leaves_deadline() {
        let (mut player, _) = controller(three_shots());
        let t0 = Instant::now();
        player.play(t0);
        player.adjust_duration(2, 4.0, t0);
        assert_eq!(player.deadline(), Some(t0 + Duration::from_secs(1)));
        assert_eq!(player.state(), PlayState::Playing);
        assert!(player.adjust_duration(7, 1.0, t0).is_none());
    }

    #[test]
    fn video_follows_current_shot() {
        let (mut player, video) = controller(with_videos());
        let t0 = Instant::now();
        player.play(t0);
        player.on_deadline(t0 + Duration::from_secs(3));
        player.on_deadline(t0 + Duration::from_secs(6));
        player.pause();

        assert_eq!(
            video.calls(),
            vec!["start One.mp4", "stop", "start Three.mp4", "stop"]
        );
    }

    #[test]
    fn seek_while_stopped_releases_video() {
        let (mut player, video) = controller(with_videos());
        let t0 = Instant::now();
        player.play(t0);
        player.pause();
        player.seek(2, t0);
        assert_eq!(video.calls(), vec!["start One.mp4", "stop"]);
    }

    #[test]
    fn video_failure_does_not_stop_the_timer() {
        let video = Recorder {
            fail: true,
            ..Default::default()
        };
        let mut player = PlaybackController::new(with_videos(), DurationModel::new(), video.clone());
        let t0 = Instant::now();
        player.play(t0);
        assert_eq!(player.state(), PlayState::Playing);
        assert!(player.deadline().is_some());

        player.on_deadline(t0 + Duration::from_secs(3));
        assert_eq!(player.current_index(), 1);
        // failed start is never paired with a stop
        assert_eq!(video.calls(), vec!["start One.mp4"]);
    }

    #[test]
    fn replacing_shots_clamps_index_and_keeps_overrides() {
        let (mut player, _) = controller(three_shots());
        let t0 = Instant::now();
        player.adjust_duration(0, 4.0, t0);
        player.seek(2, t0);

        let fewer = build_shots(
            &ScriptBlock::new("ep", "[Shot:One][Duration:1]\n[Shot:Two][Duration:2]"),
            &[],
            &BTreeMap::new(),
            KeyScheme::Stable,
        );
        player.replace_shots(fewer, t0);
        assert_eq!(player.current_index(), 1);
        assert_eq!(player.shots()[0].duration_ms, 5000);

        player.replace_shots(Vec::new(), t0);
        assert_eq!(player.current_index(), 0);
        assert_eq!(player.state(), PlayState::Stopped);
    }

    #[test]
    fn drop_stops_engaged_video() {
        let (mut player, video) = controller(with_videos());
        player.play(Instant::now());
        drop(player);
        assert_eq!(video.calls(), vec!["start One.mp4", "stop"]);
    }
}
