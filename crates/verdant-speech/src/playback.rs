use crate::{AudioOutput, AudioUri, OutputError, OutputEvent, OutputResult};
use log::{debug, warn};
use rodio::{Decoder, OutputStreamBuilder, Sink};
use std::io::Cursor;
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::broadcast;

const EVENT_BUFFER: usize = 16;

/// Settings for [`RodioOutput`]
#[derive(Debug, Clone)]
pub struct RodioOutputConfig {
    /// How often the device thread checks whether the sink drained
    pub poll_interval: Duration,
}

impl Default for RodioOutputConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
        }
    }
}

enum Command {
    Load {
        bytes: Vec<u8>,
        reply: mpsc::Sender<OutputResult<()>>,
    },
    Play {
        reply: mpsc::Sender<OutputResult<()>>,
    },
    Pause {
        reply: mpsc::Sender<OutputResult<()>>,
    },
    Reset {
        reply: mpsc::Sender<OutputResult<()>>,
    },
    Shutdown,
}

/// Audio output backed by the default rodio device.
///
/// The rodio stream is not `Send`, so it lives on a dedicated thread and is
/// driven through a command channel.
pub struct RodioOutput {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<OutputEvent>,
    thread: Option<JoinHandle<()>>,
}

impl RodioOutput {
    /// Open the default output device.
    /// Returns an error if no audio device is available
    pub fn try_new(config: RodioOutputConfig) -> OutputResult<Self> {
        let (commands, command_rx) = mpsc::channel();
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let (init_tx, init_rx) = mpsc::channel();

        let thread_events = events.clone();
        let thread = std::thread::Builder::new()
            .name("verdant-audio-output".to_string())
            .spawn(move || {
                let stream = match OutputStreamBuilder::open_default_stream() {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = init_tx.send(Err(OutputError::InitFailed(e.to_string())));
                        return;
                    }
                };
                let sink = Sink::connect_new(stream.mixer());
                let _ = init_tx.send(Ok(()));
                run_device(sink, command_rx, thread_events, config.poll_interval);
                drop(stream);
            })
            .map_err(|e| OutputError::InitFailed(e.to_string()))?;

        match init_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                commands,
                events,
                thread: Some(thread),
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(OutputError::InitFailed(
                "audio thread exited during startup".to_string(),
            )),
        }
    }

    fn call(&self, build: impl FnOnce(mpsc::Sender<OutputResult<()>>) -> Command) -> OutputResult<()> {
        let (reply, reply_rx) = mpsc::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| OutputError::DeviceUnavailable)?;
        reply_rx.recv().map_err(|_| OutputError::DeviceUnavailable)?
    }

    /// Like `call` for commands that cannot fail on a live device.
    fn call_quietly(
        &self,
        what: &str,
        build: impl FnOnce(mpsc::Sender<OutputResult<()>>) -> Command,
    ) {
        if let Err(e) = self.call(build) {
            debug!("Audio output {what} skipped: {e}");
        }
    }
}

impl AudioOutput for RodioOutput {
    fn load(&self, audio: &AudioUri) -> OutputResult<()> {
        let decoded = audio.decode()?;
        debug!(
            "Loading {} bytes of {} audio",
            decoded.bytes.len(),
            decoded.mime_type
        );
        self.call(|reply| Command::Load {
            bytes: decoded.bytes,
            reply,
        })
    }

    fn play(&self) -> OutputResult<()> {
        self.call(|reply| Command::Play { reply })
    }

    fn pause(&self) {
        self.call_quietly("pause", |reply| Command::Pause { reply });
    }

    fn reset_position(&self) {
        self.call_quietly("reset", |reply| Command::Reset { reply });
    }

    fn subscribe(&self) -> broadcast::Receiver<OutputEvent> {
        self.events.subscribe()
    }
}

impl Drop for RodioOutput {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn run_device(
    sink: Sink,
    commands: mpsc::Receiver<Command>,
    events: broadcast::Sender<OutputEvent>,
    poll_interval: Duration,
) {
    let mut loaded: Option<Vec<u8>> = None;
    let mut playing = false;

    loop {
        match commands.recv_timeout(poll_interval) {
            Ok(Command::Load { bytes, reply }) => {
                sink.clear();
                playing = false;
                let result = Decoder::new(Cursor::new(bytes.clone()))
                    .map(|_| ())
                    .map_err(|e| OutputError::Decode(e.to_string()));
                loaded = result.is_ok().then_some(bytes);
                let _ = reply.send(result);
            }
            Ok(Command::Play { reply }) => {
                let result = start(&sink, loaded.as_deref());
                if result.is_ok() {
                    playing = true;
                    let _ = events.send(OutputEvent::Started);
                }
                let _ = reply.send(result);
            }
            Ok(Command::Pause { reply }) => {
                sink.pause();
                playing = false;
                let _ = reply.send(Ok(()));
            }
            Ok(Command::Reset { reply }) => {
                sink.clear();
                playing = false;
                let _ = reply.send(Ok(()));
            }
            Ok(Command::Shutdown) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }

        if playing && sink.empty() {
            playing = false;
            let _ = events.send(OutputEvent::Ended);
        }
    }
}

fn start(sink: &Sink, loaded: Option<&[u8]>) -> OutputResult<()> {
    let bytes = loaded.ok_or(OutputError::NothingLoaded)?;
    if sink.empty() {
        let source = Decoder::new(Cursor::new(bytes.to_vec())).map_err(|e| {
            warn!("Loaded audio failed to decode on play: {e}");
            OutputError::Decode(e.to_string())
        })?;
        sink.append(source);
    }
    sink.play();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Output whose command thread is a stand-in for the rodio device loop.
    fn scripted_output(handled: Arc<AtomicUsize>) -> RodioOutput {
        let (commands, command_rx) = mpsc::channel();
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let thread = std::thread::spawn(move || {
            while let Ok(command) = command_rx.recv() {
                match command {
                    Command::Pause { reply } | Command::Reset { reply } => {
                        std::thread::sleep(Duration::from_millis(50));
                        handled.fetch_add(1, Ordering::SeqCst);
                        let _ = reply.send(Ok(()));
                    }
                    Command::Load { reply, .. } | Command::Play { reply } => {
                        let _ = reply.send(Err(OutputError::NothingLoaded));
                    }
                    Command::Shutdown => break,
                }
            }
        });
        RodioOutput {
            commands,
            events,
            thread: Some(thread),
        }
    }

    #[test]
    fn test_pause_and_reset_complete_before_returning() {
        let handled = Arc::new(AtomicUsize::new(0));
        let output = scripted_output(handled.clone());

        output.pause();
        assert_eq!(handled.load(Ordering::SeqCst), 1);
        output.reset_position();
        assert_eq!(handled.load(Ordering::SeqCst), 2);
        assert_eq!(output.play(), Err(OutputError::NothingLoaded));
    }

    #[test]
    fn test_dead_device_thread() {
        let (commands, command_rx) = mpsc::channel();
        drop(command_rx);
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let output = RodioOutput {
            commands,
            events,
            thread: None,
        };

        output.pause();
        output.reset_position();
        assert_eq!(output.play(), Err(OutputError::DeviceUnavailable));
    }
}
