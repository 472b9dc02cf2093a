mod controller;
mod player;

pub use controller::{PlayState, PlaybackController, PlaybackSnapshot};
pub use player::{spawn_player, PlayerCommand, PlayerHandle};
