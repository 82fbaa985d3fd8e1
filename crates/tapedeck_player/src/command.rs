//! 播放命令和事件定义

use std::time::Duration;

/// 播放器命令（UI -> 引擎）
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    /// 播放（曲目结束后从头开始）
    Play,
    /// 暂停
    Pause,
    /// 停止并回到开头
    Stop,
    /// 跳转到指定位置
    Seek(Duration),
    /// 设置音量 (0.0 - 1.0)
    SetVolume(f32),
    /// 关闭引擎
    Shutdown,
}

/// 播放器事件（引擎 -> UI）
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// 状态变更
    StateChanged(PlaybackState),
    /// 播放进度更新
    Position(Duration),
    /// 总时长
    Duration(Duration),
    /// 音量已生效
    Volume(f32),
    /// 曲目播放结束
    TrackEnded,
    /// 错误
    Error(String),
}

/// 播放状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl PlaybackState {
    pub fn is_playing(self) -> bool {
        self == PlaybackState::Playing
    }
}

/// 引擎配置
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// 初始音量 (0.0 - 1.0)
    pub volume: f32,
    /// 启动后立即播放
    pub autoplay: bool,
    /// 进度事件间隔
    pub position_interval: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            volume: 1.0,
            autoplay: true,
            position_interval: Duration::from_millis(10),
        }
    }
}
