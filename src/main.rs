use std::collections::BTreeMap;
use std::path::PathBuf;

use anime_preview::config::{ConfigOverrides, PreviewConfig};
use anime_preview::playback::{
    spawn_player, PlayState, PlaybackController, PlaybackSnapshot, PlayerCommand, PlayerHandle,
};
use anime_preview::script::{self, build_shots, CharacterAsset, ParsedShot, ScriptBlock};
use anime_preview::timeline::{DurationModel, OverrideStore, Timeline};
use anime_preview::video::{NullVideo, ProcessVideo, VideoSurface};
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "anime-preview")]
#[command(about = "Storyboard shot parser and timeline player", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the parsed shots as JSON
    Parse(ScriptArgs),
    /// Print the timeline layout
    Timeline(ScriptArgs),
    /// Interactive playback
    Preview {
        #[command(flatten)]
        script: ScriptArgs,

        /// External video player command, or "none"
        #[arg(long)]
        video_player: Option<String>,
    },
}

#[derive(Args, Debug)]
struct ScriptArgs {
    /// Script file: raw shot text, or a .json script block
    #[arg(short, long)]
    script: PathBuf,

    /// Character assets JSON file
    #[arg(short, long)]
    characters: Option<PathBuf>,

    /// Duration overrides file (default: <script>.durations.json)
    #[arg(short, long)]
    overrides: Option<PathBuf>,

    /// Timeline scale
    #[arg(long)]
    px_per_second: Option<u32>,

    /// Shot id scheme: stable or legacy
    #[arg(long)]
    key_scheme: Option<String>,
}

/// 一次加载得到的剧本与素材
struct Workspace {
    block: ScriptBlock,
    characters: Vec<CharacterAsset>,
    store: OverrideStore,
    config: PreviewConfig,
}

impl Workspace {
    fn load(args: &ScriptArgs, video_player: Option<String>) -> anyhow::Result<Self> {
        let config = PreviewConfig::from_env(ConfigOverrides {
            px_per_second: args.px_per_second,
            key_scheme: args.key_scheme.clone(),
            video_player,
        })?;

        let block = script::load_block(&args.script)
            .with_context(|| format!("Failed to read script: {}", args.script.display()))?;
        let characters = match &args.characters {
            Some(path) => script::load_characters(path)
                .with_context(|| format!("Failed to read characters: {}", path.display()))?,
            None => Vec::new(),
        };
        let store = match &args.overrides {
            Some(path) => OverrideStore::new(path),
            None => OverrideStore::beside(&args.script),
        };

        Ok(Self {
            block,
            characters,
            store,
            config,
        })
    }

    fn shots(&self, overrides: &BTreeMap<script::ShotId, f64>) -> Vec<ParsedShot> {
        build_shots(&self.block, &self.characters, overrides, self.config.key_scheme)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志（输出到 stderr，stdout 留给预览画面）
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .init();

    // 加载环境变量
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Parse(args) => run_parse(&args),
        Command::Timeline(args) => run_timeline(&args),
        Command::Preview {
            script,
            video_player,
        } => run_preview(&script, video_player).await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run_parse(args: &ScriptArgs) -> anyhow::Result<()> {
    let workspace = Workspace::load(args, None)?;
    let overrides = workspace.store.load()?;
    let shots = workspace.shots(&overrides);

    println!("{}", serde_json::to_string_pretty(&shots)?);
    Ok(())
}

fn run_timeline(args: &ScriptArgs) -> anyhow::Result<()> {
    let workspace = Workspace::load(args, None)?;
    let overrides = workspace.store.load()?;
    let shots = workspace.shots(&overrides);
    let timeline = Timeline::layout(&shots, workspace.config.px_per_second);

    for (shot, segment) in shots.iter().zip(timeline.segments()) {
        println!(
            "{:>3}  {:>7}  {:>5.1}s  {:>4}px  {}",
            shot.index + 1,
            format_ms(segment.start_ms),
            shot.duration_secs(),
            segment.width_px,
            shot.description
        );
    }
    println!("{}", timeline.render_ascii(None, 10));
    println!(
        "{} shots, {} total, {}px",
        shots.len(),
        format_ms(timeline.total_ms()),
        timeline.width_px()
    );
    Ok(())
}

async fn run_preview(args: &ScriptArgs, video_player: Option<String>) -> anyhow::Result<()> {
    let workspace = Workspace::load(args, video_player)?;
    let overrides = workspace.store.load()?;
    let shots = workspace.shots(&overrides);
    info!("Previewing {} shots from {}", shots.len(), workspace.block.id);

    // 每次调整时长后写回 sidecar 文件
    let durations = DurationModel::with_overrides(overrides).on_update(workspace.store.clone().listener());
    let video: Box<dyn VideoSurface> = match &workspace.config.video_player {
        Some(program) => Box::new(ProcessVideo::new(program.clone())),
        None => Box::new(NullVideo::default()),
    };
    let (player, task) = spawn_player(PlaybackController::new(shots, durations, video));

    let px_per_second = workspace.config.px_per_second;
    let mut updates = player.subscribe();
    let printer = tokio::spawn(async move {
        print_status(&updates.borrow_and_update(), px_per_second);
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            print_status(&snapshot, px_per_second);
        }
    });

    println!("p play/pause  n next  b prev  g N go to shot  c PX click timeline  +/- [secs] adjust  x reset  r reload  t timeline  q quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "q" {
            break;
        }
        if let Some(command) = interpret(input, &player, &workspace, args)? {
            if !player.send(command).await {
                break;
            }
        }
    }

    player.send(PlayerCommand::Close).await;
    drop(player);
    task.await.context("Player task failed")?;
    printer.await.ok();
    Ok(())
}

fn interpret(
    input: &str,
    player: &PlayerHandle,
    workspace: &Workspace,
    args: &ScriptArgs,
) -> anyhow::Result<Option<PlayerCommand>> {
    let mut parts = input.split_whitespace();
    let verb = parts.next().unwrap_or_default();
    let arg = parts.next();
    let snapshot = player.snapshot();

    let command = match verb {
        "p" => PlayerCommand::Toggle,
        "n" => PlayerCommand::Next,
        "b" => PlayerCommand::Prev,
        "g" => match arg.and_then(|a| a.parse::<usize>().ok()) {
            // 用户看到的序号从 1 开始
            Some(n) => PlayerCommand::Seek(n.saturating_sub(1)),
            None => {
                println!("usage: g <shot number>");
                return Ok(None);
            }
        },
        "c" => {
            let timeline = Timeline::layout(&snapshot.shots, workspace.config.px_per_second);
            match arg.and_then(|a| a.parse::<u32>().ok()).and_then(|x| timeline.hit_test(x)) {
                Some(index) => PlayerCommand::Seek(index),
                None => return Ok(None),
            }
        }
        "+" | "-" => {
            let secs = arg.and_then(|a| a.parse::<f64>().ok()).unwrap_or(1.0);
            let delta_secs = if verb == "-" { -secs } else { secs };
            PlayerCommand::AdjustDuration {
                index: snapshot.current_index,
                delta_secs,
            }
        }
        "x" => {
            workspace.store.save(&BTreeMap::new())?;
            PlayerCommand::ResetDurations
        }
        "r" => {
            let fresh = Workspace::load(args, workspace.config.video_player.clone())?;
            let overrides = fresh.store.load()?;
            PlayerCommand::Reload(fresh.shots(&overrides))
        }
        "t" => {
            let timeline = Timeline::layout(&snapshot.shots, workspace.config.px_per_second);
            println!("{}", timeline.render_ascii(Some(snapshot.current_index), 10));
            return Ok(None);
        }
        other => {
            println!("unknown command: {}", other);
            return Ok(None);
        }
    };
    Ok(Some(command))
}

fn print_status(snapshot: &PlaybackSnapshot, px_per_second: u32) {
    let Some(shot) = snapshot.current() else {
        println!("(no shots)");
        return;
    };
    let marker = match snapshot.state {
        PlayState::Playing => '>',
        PlayState::Stopped => '|',
    };

    println!(
        "[{} {}/{}] {:.1}s  {}",
        marker,
        snapshot.current_index + 1,
        snapshot.shots.len(),
        shot.duration_secs(),
        shot.description
    );
    if let Some(bgm) = &shot.bgm {
        println!("    BGM: {}", bgm);
    }
    for line in &shot.audio {
        match (&line.speaker, &line.character) {
            (Some(name), Some(character)) => {
                println!("    {} ({}): {}", name, character.voice_id, line.text)
            }
            (Some(name), None) => println!("    {}: {}", name, line.text),
            (None, _) => println!("    ~ {}", line.text),
        }
    }
    if let Some(url) = shot.video_url.as_ref().or(shot.image_url.as_ref()) {
        println!("    {}", url);
    }
    let timeline = Timeline::layout(&snapshot.shots, px_per_second);
    println!("    {}", timeline.render_ascii(Some(snapshot.current_index), 10));
}

fn format_ms(ms: u64) -> String {
    format!("{:02}:{:04.1}", ms / 60_000, (ms % 60_000) as f64 / 1000.0)
}
