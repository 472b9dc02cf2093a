use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use super::controller::{PlaybackController, PlaybackSnapshot};
use crate::script::ParsedShot;
use crate::video::VideoSurface;

#[derive(Debug)]
pub enum PlayerCommand {
    Play,
    Pause,
    Toggle,
    Seek(usize),
    Next,
    Prev,
    AdjustDuration { index: usize, delta_secs: f64 },
    ResetDurations,
    Reload(Vec<ParsedShot>),
    Close,
}

/// Host-side handle to a running player task.
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    commands: mpsc::Sender<PlayerCommand>,
    snapshots: watch::Receiver<PlaybackSnapshot>,
}

impl PlayerHandle {
    /// Returns false once the player has shut down.
    pub async fn send(&self, command: PlayerCommand) -> bool {
        self.commands.send(command).await.is_ok()
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.snapshots.clone()
    }
}

/// Move the controller onto its own task. The task is the only thing that
/// touches controller state: commands and the advance timer are served from
/// one `select!`, so at most one advance is ever pending.
///
/// The join handle yields the controller back after `Close` or once every
/// handle is dropped, with its timer cancelled and video stopped.
pub fn spawn_player<V>(controller: PlaybackController<V>) -> (PlayerHandle, JoinHandle<PlaybackController<V>>)
where
    V: VideoSurface + 'static,
{
    let (command_tx, command_rx) = mpsc::channel(32);
    let (snapshot_tx, snapshot_rx) = watch::channel(controller.snapshot());

    let task = tokio::spawn(run(controller, command_rx, snapshot_tx));
    let handle = PlayerHandle {
        commands: command_tx,
        snapshots: snapshot_rx,
    };
    (handle, task)
}

async fn run<V: VideoSurface>(
    mut controller: PlaybackController<V>,
    mut commands: mpsc::Receiver<PlayerCommand>,
    snapshots: watch::Sender<PlaybackSnapshot>,
) -> PlaybackController<V> {
    loop {
        let deadline = controller.deadline();

        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    debug!("All player handles dropped");
                    break;
                };
                if !apply(&mut controller, command) {
                    break;
                }
            }
            _ = wait_for(deadline) => {
                // 以计划时间推进，避免唤醒延迟累积
                if let Some(fired) = deadline {
                    controller.on_deadline(fired);
                }
            }
        }

        snapshots.send_replace(controller.snapshot());
    }

    controller.shutdown();
    snapshots.send_replace(controller.snapshot());
    info!("Player closed");
    controller
}

fn apply<V: VideoSurface>(controller: &mut PlaybackController<V>, command: PlayerCommand) -> bool {
    let now = Instant::now();
    match command {
        PlayerCommand::Play => controller.play(now),
        PlayerCommand::Pause => controller.pause(),
        PlayerCommand::Toggle => controller.toggle(now),
        PlayerCommand::Seek(index) => controller.seek(index, now),
        PlayerCommand::Next => controller.next(now),
        PlayerCommand::Prev => controller.prev(now),
        PlayerCommand::AdjustDuration { index, delta_secs } => {
            controller.adjust_duration(index, delta_secs, now);
        }
        PlayerCommand::ResetDurations => controller.reset_durations(now),
        PlayerCommand::Reload(shots) => controller.replace_shots(shots, now),
        PlayerCommand::Close => return false,
    }
    true
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
