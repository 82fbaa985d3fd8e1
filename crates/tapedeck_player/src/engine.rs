//! 播放引擎
//!
//! 引擎线程独占解码器和输出流，UI 通过命令通道控制播放，
//! 通过事件通道接收状态与进度。每批事件发出后调用已注册的通知回调，
//! UI 借此在事件到达时重绘，而不是定时轮询。

use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use crate::{
    AudioDecoder, AudioInfo, AudioOutput, AudioSink, DecoderError, OutputConfig, OutputError,
    PlaybackState, PlayerCommand, PlayerConfig, PlayerEvent,
};

const COMMAND_CAPACITY: usize = 32;
const EVENT_CAPACITY: usize = 64;

/// 播放时两次填充缓冲之间的最长间隔
const FILL_TICK: Duration = Duration::from_millis(5);

/// 事件通知回调
pub type Notifier = Box<dyn Fn() + Send + Sync>;

/// 引擎错误
#[derive(thiserror::Error, Debug)]
pub enum PlayerError {
    #[error("Decoder error: {0}")]
    Decoder(#[from] DecoderError),
    #[error("Audio output error: {0}")]
    Output(#[from] OutputError),
    #[error("Failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("Engine thread exited during startup")]
    Startup,
}

/// 播放引擎句柄
///
/// 丢弃句柄会停止播放并等待引擎线程退出。
pub struct PlayerHandle {
    pub cmd_tx: Sender<PlayerCommand>,
    pub evt_rx: Receiver<PlayerEvent>,
    pub info: AudioInfo,
    notifier: Arc<OnceLock<Notifier>>,
    thread: Option<JoinHandle<()>>,
}

impl PlayerHandle {
    /// 发送命令；引擎已退出时忽略
    pub fn send(&self, cmd: PlayerCommand) {
        let _ = self.cmd_tx.send(cmd);
    }

    /// 注册事件通知回调，只能注册一次
    pub fn set_notifier(&self, notifier: impl Fn() + Send + Sync + 'static) -> bool {
        self.notifier.set(Box::new(notifier)).is_ok()
    }

    /// 停止播放并等待引擎线程结束
    pub fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.cmd_tx.send(PlayerCommand::Shutdown);
            if thread.join().is_err() {
                log::error!("engine thread panicked");
            }
        }
    }
}

impl Drop for PlayerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// 在默认输出设备上启动播放引擎
///
/// 输出设备在引擎线程内打开，打开失败会在此处返回错误。
pub fn spawn_player(decoder: AudioDecoder, config: PlayerConfig) -> Result<PlayerHandle, PlayerError> {
    spawn_with_sink(decoder, config, |info| {
        AudioOutput::new(OutputConfig {
            sample_rate: info.sample_rate,
            channels: info.channels as u16,
        })
    })
}

/// 使用自定义输出启动播放引擎
pub fn spawn_with_sink<S, F>(
    decoder: AudioDecoder,
    config: PlayerConfig,
    make_sink: F,
) -> Result<PlayerHandle, PlayerError>
where
    S: AudioSink + 'static,
    F: FnOnce(&AudioInfo) -> Result<S, OutputError> + Send + 'static,
{
    let (cmd_tx, cmd_rx) = bounded(COMMAND_CAPACITY);
    let (evt_tx, evt_rx) = bounded(EVENT_CAPACITY);
    let (ready_tx, ready_rx) = bounded::<Result<(), OutputError>>(1);

    let notifier: Arc<OnceLock<Notifier>> = Arc::new(OnceLock::new());
    let events = EventSink::new(evt_tx, notifier.clone());
    let info = decoder.info.clone();

    let thread = thread::Builder::new()
        .name("tapedeck-engine".into())
        .spawn(move || {
            let sink = match make_sink(&decoder.info) {
                Ok(sink) => {
                    let _ = ready_tx.send(Ok(()));
                    sink
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            let state = EngineState::new(decoder, sink, config, events);
            run_engine(state, cmd_rx);
        })?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(PlayerHandle {
            cmd_tx,
            evt_rx,
            info,
            notifier,
            thread: Some(thread),
        }),
        Ok(Err(e)) => {
            let _ = thread.join();
            Err(e.into())
        }
        Err(_) => {
            let _ = thread.join();
            Err(PlayerError::Startup)
        }
    }
}

fn run_engine<S: AudioSink>(mut state: EngineState<S>, cmd_rx: Receiver<PlayerCommand>) {
    state.announce();
    state.events.notify();

    loop {
        // 非播放状态下没有需要推进的东西，阻塞等待命令即可
        let received = if state.playback_state.is_playing() {
            cmd_rx.recv_timeout(FILL_TICK.min(state.config.position_interval))
        } else {
            cmd_rx.recv().map_err(|_| RecvTimeoutError::Disconnected)
        };

        match received {
            Ok(cmd) => {
                if !state.handle_command(cmd) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if state.playback_state.is_playing() {
            state.fill_buffer();
            state.update_position();
        }

        state.events.notify();
    }

    state.sink.set_playing(false);
    log::debug!("engine thread exiting");
}

/// 事件发送端，记录是否有待通知的事件
struct EventSink {
    tx: Sender<PlayerEvent>,
    notifier: Arc<OnceLock<Notifier>>,
    pending: bool,
}

impl EventSink {
    fn new(tx: Sender<PlayerEvent>, notifier: Arc<OnceLock<Notifier>>) -> Self {
        Self {
            tx,
            notifier,
            pending: false,
        }
    }

    fn emit(&mut self, event: PlayerEvent) {
        if self.tx.send(event).is_ok() {
            self.pending = true;
        }
    }

    /// 进度事件可丢弃：队列过半时跳过，给状态事件留出空间
    fn emit_position(&mut self, position: Duration) {
        if self.tx.len() >= EVENT_CAPACITY / 2 {
            return;
        }
        if self.tx.try_send(PlayerEvent::Position(position)).is_ok() {
            self.pending = true;
        }
    }

    fn notify(&mut self) {
        if !std::mem::take(&mut self.pending) {
            return;
        }
        if let Some(notifier) = self.notifier.get() {
            notifier();
        }
    }
}

struct EngineState<S: AudioSink> {
    decoder: AudioDecoder,
    sink: S,
    config: PlayerConfig,
    events: EventSink,
    playback_state: PlaybackState,
    duration: Duration,
    volume: f32,
    position_base: Duration,
    /// 解码器已读到流末尾
    drained: bool,
    last_position_update: Instant,
}

impl<S: AudioSink> EngineState<S> {
    fn new(decoder: AudioDecoder, sink: S, config: PlayerConfig, events: EventSink) -> Self {
        let duration = decoder.duration();
        let volume = config.volume.clamp(0.0, 1.0);
        sink.set_volume(volume);
        Self {
            decoder,
            sink,
            config,
            events,
            playback_state: PlaybackState::Stopped,
            duration,
            volume,
            position_base: Duration::ZERO,
            drained: false,
            last_position_update: Instant::now(),
        }
    }

    /// 发送初始状态，按配置自动播放
    fn announce(&mut self) {
        self.events.emit(PlayerEvent::Duration(self.duration));
        self.events.emit(PlayerEvent::Volume(self.volume));
        self.events
            .emit(PlayerEvent::StateChanged(self.playback_state));
        if self.config.autoplay {
            self.play();
        }
    }

    fn handle_command(&mut self, cmd: PlayerCommand) -> bool {
        log::trace!("engine command: {:?}", cmd);
        match cmd {
            PlayerCommand::Play => self.play(),
            PlayerCommand::Pause => self.pause(),
            PlayerCommand::Stop => self.stop(),
            PlayerCommand::Seek(pos) => self.seek(pos),
            PlayerCommand::SetVolume(vol) => self.set_volume(vol),
            PlayerCommand::Shutdown => return false,
        }
        true
    }

    fn play(&mut self) {
        if self.playback_state.is_playing() {
            return;
        }
        self.sink.set_playing(true);
        self.set_state(PlaybackState::Playing);
        self.fill_buffer();
    }

    fn pause(&mut self) {
        if self.playback_state.is_playing() {
            self.sink.set_playing(false);
            self.set_state(PlaybackState::Paused);
            let pos = self.position();
            self.events.emit(PlayerEvent::Position(pos));
        }
    }

    fn stop(&mut self) {
        self.sink.set_playing(false);
        self.rewind();
        self.set_state(PlaybackState::Stopped);
    }

    fn seek(&mut self, pos: Duration) {
        let pos = clamp_to_duration(pos, self.duration);
        if let Err(e) = self.decoder.seek(pos) {
            log::warn!("seek to {:?} failed: {}", pos, e);
            self.events
                .emit(PlayerEvent::Error(format!("Seek error: {}", e)));
            return;
        }
        self.sink.flush();
        self.position_base = pos;
        self.drained = false;
        self.events.emit(PlayerEvent::Position(pos));
    }

    /// 回到开头；解码器跳转失败时位置仍归零
    fn rewind(&mut self) {
        if let Err(e) = self.decoder.seek(Duration::ZERO) {
            log::warn!("rewind failed: {}", e);
            self.events
                .emit(PlayerEvent::Error(format!("Seek error: {}", e)));
        }
        self.sink.flush();
        self.position_base = Duration::ZERO;
        self.drained = false;
        self.events.emit(PlayerEvent::Position(Duration::ZERO));
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.sink.set_volume(self.volume);
        self.events.emit(PlayerEvent::Volume(self.volume));
    }

    /// 解码直到输出缓冲达到水位；流结束且缓冲耗尽时结束曲目
    ///
    /// 仅在播放状态下填充，停止后缓冲保持为空。
    fn fill_buffer(&mut self) {
        if !self.playback_state.is_playing() {
            return;
        }

        while !self.drained && self.sink.buffered() < self.sink.capacity() {
            match self.decoder.decode_next() {
                Ok(Some(samples)) => {
                    self.sink.write(&samples);
                }
                Ok(None) => {
                    self.drained = true;
                }
                Err(e) => {
                    log::error!("decode failed: {}", e);
                    self.events
                        .emit(PlayerEvent::Error(format!("Decode error: {}", e)));
                    self.drained = true;
                }
            }
        }

        if self.drained && self.sink.buffered() == 0 {
            self.finish_track();
        }
    }

    fn finish_track(&mut self) {
        log::debug!("track ended");
        self.sink.set_playing(false);
        self.events.emit(PlayerEvent::TrackEnded);
        self.rewind();
        self.set_state(PlaybackState::Stopped);
    }

    fn update_position(&mut self) {
        if self.last_position_update.elapsed() >= self.config.position_interval {
            let pos = self.position();
            self.events.emit_position(pos);
            self.last_position_update = Instant::now();
        }
    }

    fn position(&self) -> Duration {
        clamp_to_duration(self.position_base + self.sink.position(), self.duration)
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.playback_state != state {
            self.playback_state = state;
            self.events.emit(PlayerEvent::StateChanged(state));
        }
    }
}

/// 时长未知（为零）时不限制
fn clamp_to_duration(pos: Duration, duration: Duration) -> Duration {
    if duration.is_zero() {
        pos
    } else {
        pos.min(duration)
    }
}
