use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anime_preview::playback::{
    spawn_player, PlayState, PlaybackController, PlaybackSnapshot, PlayerCommand, PlayerHandle,
};
use anime_preview::script::{build_shots, KeyScheme, ParsedShot, SceneImage, ScriptBlock};
use anime_preview::timeline::DurationModel;
use anime_preview::video::{NullVideo, VideoSurface};
use anime_preview::Result;
use tokio::time::{sleep, Instant};

const STORYBOARD: &str = "\
[Shot:Harbor at dawn][Duration:1]
[BGM:Gulls]
[Shot:Alice runs down the pier][Duration:2]
[角色:Alice]台词:Wait for me!
[Shot:The ferry pulls away][Duration:3]
[音效:Horn]
";

fn block() -> ScriptBlock {
    ScriptBlock::new("ep1", STORYBOARD)
}

fn shots() -> Vec<ParsedShot> {
    build_shots(&block(), &[], &BTreeMap::new(), KeyScheme::Stable)
}

/// Sleep on the paused clock until `at` from `start`, then read the state.
async fn state_at(player: &PlayerHandle, start: Instant, at: Duration) -> PlaybackSnapshot {
    tokio::time::sleep_until(start + at).await;
    tokio::task::yield_now().await;
    player.snapshot()
}

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl VideoSurface for Recorder {
    fn start(&mut self, url: &str) -> Result<()> {
        self.0.lock().unwrap().push(format!("start {}", url));
        Ok(())
    }

    fn stop(&mut self) {
        self.0.lock().unwrap().push("stop".to_string());
    }
}

#[tokio::test(start_paused = true)]
async fn natural_playback_stops_and_rewinds() {
    let (player, _task) = spawn_player(PlaybackController::new(shots(), DurationModel::new(), NullVideo::default()));
    let mut updates = player.subscribe();
    let started = Instant::now();

    assert!(player.send(PlayerCommand::Play).await);

    let mut visited = Vec::new();
    let last = loop {
        updates.changed().await.unwrap();
        let snapshot = updates.borrow_and_update().clone();
        if snapshot.state == PlayState::Stopped {
            break snapshot;
        }
        if visited.last() != Some(&snapshot.current_index) {
            visited.push(snapshot.current_index);
        }
    };

    assert_eq!(visited, vec![0, 1, 2]);
    assert_eq!(last.current_index, 0);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(6) && elapsed < Duration::from_secs(7));
}

#[tokio::test(start_paused = true)]
async fn pause_keeps_the_current_shot() {
    let (player, _task) = spawn_player(PlaybackController::new(shots(), DurationModel::new(), NullVideo::default()));
    let start = Instant::now();
    player.send(PlayerCommand::Play).await;

    let mid = state_at(&player, start, Duration::from_millis(1500)).await;
    assert_eq!(mid.state, PlayState::Playing);
    assert_eq!(mid.current_index, 1);

    player.send(PlayerCommand::Pause).await;
    let later = state_at(&player, start, Duration::from_secs(20)).await;
    assert_eq!(later.state, PlayState::Stopped);
    assert_eq!(later.current_index, 1);
}

#[tokio::test(start_paused = true)]
async fn late_wakeup_keeps_the_schedule() {
    let (player, _task) = spawn_player(PlaybackController::new(shots(), DurationModel::new(), NullVideo::default()));
    let start = Instant::now();
    player.send(PlayerCommand::Play).await;
    while player.snapshot().state != PlayState::Playing {
        tokio::task::yield_now().await;
    }

    // the player only wakes half a second after the first shot ends
    tokio::time::advance(Duration::from_millis(1500)).await;

    // shot 1 still ends at 1s + 2s
    let snap = state_at(&player, start, Duration::from_millis(3200)).await;
    assert_eq!(snap.current_index, 2);
}

#[tokio::test(start_paused = true)]
async fn seek_while_playing_restarts_the_shot_timer() {
    let (player, _task) = spawn_player(PlaybackController::new(shots(), DurationModel::new(), NullVideo::default()));
    let start = Instant::now();
    player.send(PlayerCommand::Play).await;

    sleep(Duration::from_millis(500)).await;
    player.send(PlayerCommand::Seek(2)).await;

    // the last shot is 3s long from the moment of the seek
    let before = state_at(&player, start, Duration::from_millis(3400)).await;
    assert_eq!(before.state, PlayState::Playing);
    assert_eq!(before.current_index, 2);

    let after = state_at(&player, start, Duration::from_millis(3600)).await;
    assert_eq!(after.state, PlayState::Stopped);
    assert_eq!(after.current_index, 0);
}

#[tokio::test(start_paused = true)]
async fn lengthening_the_active_shot_delays_the_advance() {
    let (player, _task) = spawn_player(PlaybackController::new(shots(), DurationModel::new(), NullVideo::default()));
    let start = Instant::now();
    player.send(PlayerCommand::Play).await;

    sleep(Duration::from_millis(500)).await;
    player
        .send(PlayerCommand::AdjustDuration {
            index: 0,
            delta_secs: 2.0,
        })
        .await;

    let held = state_at(&player, start, Duration::from_millis(2900)).await;
    assert_eq!(held.current_index, 0);
    assert_eq!(held.shots[0].duration_ms, 3000);

    let moved = state_at(&player, start, Duration::from_millis(3100)).await;
    assert_eq!(moved.current_index, 1);
}

#[tokio::test(start_paused = true)]
async fn close_stops_video_and_returns_controller() {
    let mut block = block();
    block.scene_images.push(SceneImage {
        shot_description: "Harbor at dawn, seagulls".to_string(),
        image_url: "harbor.png".to_string(),
        video_url: Some("harbor.mp4".to_string()),
        ..Default::default()
    });
    let shots = build_shots(&block, &[], &BTreeMap::new(), KeyScheme::Stable);
    let video = Recorder::default();

    let (player, task) = spawn_player(PlaybackController::new(shots, DurationModel::new(), video.clone()));
    player.send(PlayerCommand::Play).await;
    player.send(PlayerCommand::Close).await;

    let controller = task.await.unwrap();
    assert_eq!(controller.state(), PlayState::Stopped);
    assert!(controller.deadline().is_none());
    assert_eq!(video.calls(), vec!["start harbor.mp4", "stop"]);

    let closed = player.snapshot();
    assert_eq!(closed.state, PlayState::Stopped);
    assert!(!player.send(PlayerCommand::Play).await);
}

#[tokio::test(start_paused = true)]
async fn dropping_every_handle_ends_the_player() {
    let (player, task) = spawn_player(PlaybackController::new(shots(), DurationModel::new(), NullVideo::default()));
    player.send(PlayerCommand::Play).await;
    drop(player);

    let controller = task.await.unwrap();
    assert_eq!(controller.state(), PlayState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn reload_keeps_overrides_by_shot_id() {
    let (player, _task) = spawn_player(PlaybackController::new(shots(), DurationModel::new(), NullVideo::default()));
    player
        .send(PlayerCommand::AdjustDuration {
            index: 1,
            delta_secs: 3.0,
        })
        .await;

    // a new shot inserted at the top shifts every index
    let edited = format!("[Shot:Title card]\n{}", STORYBOARD);
    let reparsed = build_shots(&ScriptBlock::new("ep1", edited), &[], &BTreeMap::new(), KeyScheme::Stable);
    player.send(PlayerCommand::Reload(reparsed)).await;

    let snapshot = state_at(&player, Instant::now(), Duration::from_millis(10)).await;
    assert_eq!(snapshot.shots.len(), 4);
    assert_eq!(snapshot.shots[2].description, "Alice runs down the pier");
    assert_eq!(snapshot.shots[2].duration_ms, 5000);
    assert_eq!(snapshot.shots[0].duration_ms, 3000);
}
