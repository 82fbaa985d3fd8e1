//! tapedeck - 单文件音频播放器

mod state;
mod ui;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use eframe::egui;
use env_logger::Env;
use tapedeck_player::{
    read_tags, spawn_player, AudioDecoder, DecoderError, PlayerConfig, PlayerError, PlayerHandle,
};

use state::AppState;
use ui::{DeckTheme, ScrubSlider, TrackInfoPanel, TransportRow};

/// 命令行参数
#[derive(Debug, Parser)]
#[command(name = "tapedeck", version, about = "Play a single audio file")]
struct Cli {
    /// 要播放的音频文件
    file: PathBuf,

    /// 初始音量 (0.0 - 1.0)
    #[arg(long, default_value_t = 1.0, value_parser = parse_volume)]
    volume: f32,

    /// 启动后不自动播放
    #[arg(long)]
    paused: bool,

    /// 进度刷新间隔（毫秒）
    #[arg(long = "tick-ms", default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..=1000))]
    tick_ms: u64,

    /// 以 JSON 输出标签后退出
    #[arg(long)]
    print_tags: bool,
}

impl Cli {
    fn player_config(&self) -> PlayerConfig {
        PlayerConfig {
            volume: self.volume,
            autoplay: !self.paused,
            position_interval: Duration::from_millis(self.tick_ms),
        }
    }
}

fn parse_volume(s: &str) -> Result<f32, String> {
    let volume: f32 = s.parse().map_err(|e| format!("{}", e))?;
    if (0.0..=1.0).contains(&volume) {
        Ok(volume)
    } else {
        Err(format!("volume must be within 0.0..=1.0, got {}", volume))
    }
}

/// 启动错误，均为致命错误
#[derive(thiserror::Error, Debug)]
enum AppError {
    #[error("Cannot decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: DecoderError,
    },
    #[error("Cannot start playback: {0}")]
    Player(#[from] PlayerError),
    #[error("No readable tags in {0}")]
    NoTags(PathBuf),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("GUI error: {0}")]
    Gui(#[from] eframe::Error),
}

fn main() -> ExitCode {
    // 参数错误由 clap 直接以非零状态退出，此时尚未创建任何窗口
    let cli = Cli::parse();

    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .try_init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), AppError> {
    if cli.print_tags {
        let tags = read_tags(&cli.file).ok_or_else(|| AppError::NoTags(cli.file.clone()))?;
        println!("{}", serde_json::to_string_pretty(&tags)?);
        return Ok(());
    }

    let tags = read_tags(&cli.file).unwrap_or_default();

    let decoder = AudioDecoder::open(&cli.file).map_err(|source| AppError::Decode {
        path: cli.file.clone(),
        source,
    })?;
    let player = spawn_player(decoder, cli.player_config())?;

    log::info!(
        "playing {} ({}, {} Hz, {} ch)",
        cli.file.display(),
        player.info.codec,
        player.info.sample_rate,
        player.info.channels
    );

    let title = format!("tapedeck ({})", cli.file.display());
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([480.0, 300.0])
            .with_min_inner_size([320.0, 200.0])
            .with_title(&title),
        centered: true,
        ..Default::default()
    };

    let path = cli.file;
    let volume = cli.volume;
    eframe::run_native(
        "tapedeck",
        options,
        Box::new(move |cc| {
            DeckTheme::apply(&cc.egui_ctx);

            // 引擎发出事件时唤醒 UI
            let ctx = cc.egui_ctx.clone();
            player.set_notifier(move || ctx.request_repaint());

            let state = AppState::new(
                player.cmd_tx.clone(),
                player.evt_rx.clone(),
                path,
                tags,
                volume,
            );
            Ok(Box::new(TapedeckApp { state, player }))
        }),
    )?;

    Ok(())
}

struct TapedeckApp {
    state: AppState,
    player: PlayerHandle,
}

impl eframe::App for TapedeckApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // 关闭窗口即停止播放并释放引擎
        if ctx.input(|i| i.viewport().close_requested()) {
            self.player.shutdown();
        }

        self.state.poll_events();

        egui::CentralPanel::default().show(ctx, |ui| {
            TrackInfoPanel::show(ui, &self.state);
            ui.add_space(8.0);
            TransportRow::show(ui, &mut self.state);
            ui.add_space(8.0);

            let mut position = self.state.position;
            if let Some(value) = ScrubSlider::new(&mut position, 0.0..=self.state.duration).show(ui) {
                self.state.seek(value);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_argument_is_rejected() {
        let err = Cli::try_parse_from(["tapedeck"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
        assert_ne!(err.exit_code(), 0);
    }

    #[test]
    fn test_defaults_autoplay_at_full_volume() {
        let cli = Cli::try_parse_from(["tapedeck", "song.flac"]).unwrap();
        let config = cli.player_config();

        assert_eq!(cli.file, PathBuf::from("song.flac"));
        assert_eq!(config.volume, 1.0);
        assert!(config.autoplay);
        assert_eq!(config.position_interval, Duration::from_millis(10));
        assert!(!cli.print_tags);
    }

    #[test]
    fn test_flags_map_onto_player_config() {
        let cli = Cli::try_parse_from([
            "tapedeck",
            "--paused",
            "--volume",
            "0.5",
            "--tick-ms",
            "40",
            "song.ogg",
        ])
        .unwrap();
        let config = cli.player_config();

        assert_eq!(config.volume, 0.5);
        assert!(!config.autoplay);
        assert_eq!(config.position_interval, Duration::from_millis(40));
    }

    #[test]
    fn test_out_of_range_volume_is_rejected() {
        assert!(Cli::try_parse_from(["tapedeck", "--volume", "1.5", "a.wav"]).is_err());
        assert!(Cli::try_parse_from(["tapedeck", "--tick-ms", "0", "a.wav"]).is_err());
        assert!(parse_volume("loud").is_err());
    }

    #[test]
    fn test_undecodable_file_fails_before_window() {
        let path = std::env::temp_dir().join(format!("tapedeck-garbage-{}.mp3", std::process::id()));
        std::fs::write(&path, b"this is not an audio stream".repeat(32)).unwrap();

        let cli = Cli::try_parse_from([std::ffi::OsStr::new("tapedeck"), path.as_os_str()]).unwrap();
        let result = run(cli);
        std::fs::remove_file(&path).unwrap();

        match result {
            Err(AppError::Decode { path: failed, .. }) => assert_eq!(failed, path),
            other => panic!("expected a decode error, got {:?}", other.err()),
        }
    }
}
