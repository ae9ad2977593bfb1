use std::sync::Mutex;
use tokio::sync::broadcast;
use verdant_speech::{AudioOutput, AudioUri, OutputError, OutputEvent, OutputResult};

/// Device operations observed by [`RecordingOutput`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputCall {
    Load(AudioUri),
    Play,
    Pause,
    ResetPosition,
}

#[derive(Default)]
struct DeviceState {
    calls: Vec<OutputCall>,
    loaded: Option<AudioUri>,
    playing: bool,
    fail_load: Option<OutputError>,
}

/// In-memory output device that records every call.
///
/// Playback never ends on its own; call [`finish`](Self::finish) or
/// [`fail`](Self::fail) to emit device events.
pub struct RecordingOutput {
    state: Mutex<DeviceState>,
    events: broadcast::Sender<OutputEvent>,
}

impl Default for RecordingOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingOutput {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            state: Mutex::new(DeviceState::default()),
            events,
        }
    }

    /// Make every subsequent `load` fail with `error`.
    pub fn failing_load(error: OutputError) -> Self {
        let output = Self::new();
        output.lock().fail_load = Some(error);
        output
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn calls(&self) -> Vec<OutputCall> {
        self.lock().calls.clone()
    }

    pub fn count(&self, call: &OutputCall) -> usize {
        self.lock().calls.iter().filter(|c| *c == call).count()
    }

    pub fn loaded(&self) -> Option<AudioUri> {
        self.lock().loaded.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.lock().playing
    }

    /// Simulate the loaded audio running out.
    pub fn finish(&self) {
        self.lock().playing = false;
        let _ = self.events.send(OutputEvent::Ended);
    }

    /// Simulate a device error mid-playback.
    pub fn fail(&self, message: &str) {
        self.lock().playing = false;
        let _ = self.events.send(OutputEvent::Error(message.to_string()));
    }
}

impl AudioOutput for RecordingOutput {
    fn load(&self, audio: &AudioUri) -> OutputResult<()> {
        let mut state = self.lock();
        state.calls.push(OutputCall::Load(audio.clone()));
        if let Some(error) = state.fail_load.clone() {
            return Err(error);
        }
        audio.decode()?;
        state.loaded = Some(audio.clone());
        state.playing = false;
        Ok(())
    }

    fn play(&self) -> OutputResult<()> {
        let mut state = self.lock();
        state.calls.push(OutputCall::Play);
        if state.loaded.is_none() {
            return Err(OutputError::NothingLoaded);
        }
        state.playing = true;
        drop(state);
        let _ = self.events.send(OutputEvent::Started);
        Ok(())
    }

    fn pause(&self) {
        let mut state = self.lock();
        state.calls.push(OutputCall::Pause);
        state.playing = false;
    }

    fn reset_position(&self) {
        self.lock().calls.push(OutputCall::ResetPosition);
    }

    fn subscribe(&self) -> broadcast::Receiver<OutputEvent> {
        self.events.subscribe()
    }
}
