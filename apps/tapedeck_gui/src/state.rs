//! 应用状态

use std::path::PathBuf;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use tapedeck_player::{PlayerCommand, PlayerEvent, TrackTags};

/// 引擎回报的跳转位置与目标之间允许的误差
const SEEK_ECHO_TOLERANCE: Duration = Duration::from_millis(1);

/// 应用状态
pub struct AppState {
    // 曲目
    pub path: PathBuf,
    pub tags: TrackTags,

    // 播放状态（来自引擎事件）
    pub is_playing: bool,
    pub position: f64,
    pub duration: f64,
    /// 已发出但引擎尚未确认的跳转目标
    pending_seek: Option<Duration>,

    /// 引擎当前音量
    pub volume: f32,
    /// 音量滑块上的值，拖动结束后才提交
    pub volume_draft: f32,
    volume_dragging: bool,

    pub last_error: Option<String>,

    // 播放引擎通信
    cmd_tx: Sender<PlayerCommand>,
    evt_rx: Receiver<PlayerEvent>,
}

impl AppState {
    pub fn new(
        cmd_tx: Sender<PlayerCommand>,
        evt_rx: Receiver<PlayerEvent>,
        path: PathBuf,
        tags: TrackTags,
        volume: f32,
    ) -> Self {
        Self {
            path,
            tags,
            is_playing: false,
            position: 0.0,
            duration: 0.0,
            pending_seek: None,
            volume,
            volume_draft: volume,
            volume_dragging: false,
            last_error: None,
            cmd_tx,
            evt_rx,
        }
    }

    /// 处理播放引擎事件
    pub fn poll_events(&mut self) {
        let events: Vec<_> = self.evt_rx.try_iter().collect();

        for event in events {
            match event {
                PlayerEvent::StateChanged(state) => {
                    self.is_playing = state.is_playing();
                }
                PlayerEvent::Position(pos) => {
                    // 跳转命令之前排队的进度已过时，等待引擎回报目标位置
                    if let Some(target) = self.pending_seek {
                        if pos.max(target) - pos.min(target) > SEEK_ECHO_TOLERANCE {
                            continue;
                        }
                        self.pending_seek = None;
                    }
                    self.position = pos.as_secs_f64();
                }
                PlayerEvent::Duration(dur) => {
                    self.duration = dur.as_secs_f64();
                }
                PlayerEvent::Volume(vol) => {
                    self.volume = vol;
                    if !self.volume_dragging {
                        self.volume_draft = vol;
                    }
                }
                PlayerEvent::TrackEnded => {
                    log::debug!("track ended: {}", self.path.display());
                }
                PlayerEvent::Error(e) => {
                    log::warn!("player error: {}", e);
                    self.pending_seek = None;
                    self.last_error = Some(e);
                }
            }
        }
    }

    /// 发送命令到播放引擎
    fn send_command(&self, cmd: PlayerCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            log::debug!("engine is gone, command dropped");
        }
    }

    pub fn toggle_play(&mut self) {
        if self.is_playing {
            self.send_command(PlayerCommand::Pause);
        } else {
            self.send_command(PlayerCommand::Play);
        }
    }

    pub fn stop(&mut self) {
        self.position = 0.0;
        self.pending_seek = Some(Duration::ZERO);
        self.send_command(PlayerCommand::Stop);
    }

    /// 立即显示目标位置，并忽略引擎确认前的旧进度
    pub fn seek(&mut self, position: f64) {
        let mut position = if position.is_finite() { position.max(0.0) } else { 0.0 };
        if self.duration > 0.0 {
            position = position.min(self.duration);
        }
        let target = Duration::from_secs_f64(position);
        self.position = position;
        self.pending_seek = Some(target);
        self.send_command(PlayerCommand::Seek(target));
    }

    /// 音量滑块变化；拖动中只更新草稿值
    pub fn edit_volume(&mut self, value: f32, dragging: bool) {
        self.volume_draft = value.clamp(0.0, 1.0);
        self.volume_dragging = dragging;
        if !dragging {
            self.commit_volume();
        }
    }

    /// 拖动结束，把草稿值提交给引擎
    pub fn commit_volume(&mut self) {
        self.volume_dragging = false;
        if self.volume_draft != self.volume {
            self.volume = self.volume_draft;
            self.send_command(PlayerCommand::SetVolume(self.volume));
        }
    }
}
