use crate::config::CoordinatorConfig;
use crate::error::{PlaybackError, PlaybackResult};
use crate::events::{BoxEventStream, EventFanout, PlaybackEvent, StopReason};
use crate::notification::{LogNotifier, Notification, Notifier};
use crate::state::{
    ActiveSession, Generation, GlobalPlaybackState, PlaybackSnapshot, PlaybackStatus, lock,
};
use crate::subscriber::{PlaybackSubscriber, SubscriberRegistry, Subscription};
use futures::FutureExt;
use log::{debug, error, warn};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use verdant_speech::{
    AudioOutput, OutputError, OutputEvent, SynthesisClient, SynthesisError, SynthesisRequest,
};

/// How a playback request ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Audio was bound to the device and is playing
    Started,
    /// A newer request or an explicit stop took over first; the result was discarded
    Superseded,
}

/// Builder for [`PlaybackCoordinator`]
pub struct PlaybackCoordinatorBuilder {
    synthesizer: Arc<dyn SynthesisClient>,
    output: Arc<dyn AudioOutput>,
    notifier: Option<Arc<dyn Notifier>>,
    config: CoordinatorConfig,
}

impl PlaybackCoordinatorBuilder {
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> PlaybackCoordinator {
        PlaybackCoordinator {
            inner: Arc::new(Inner {
                synthesizer: self.synthesizer,
                output: self.output,
                notifier: self.notifier.unwrap_or_else(|| Arc::new(LogNotifier)),
                events: EventFanout::new(self.config.event_buffer),
                config: self.config,
                state: Mutex::new(GlobalPlaybackState::default()),
                device: tokio::sync::Mutex::new(()),
                subscribers: Arc::new(Mutex::new(SubscriberRegistry::default())),
            }),
        }
    }
}

/// Arbitrates the single audio output device among any number of keyed requesters.
///
/// At most one key is active (loading or playing) at a time. A new request
/// tears down the previous session before it starts; results arriving for a
/// superseded session are discarded. Clones share the same state, so build
/// one coordinator at startup and hand clones to every UI unit.
///
/// Requires a tokio runtime: synthesis continuations and device watchers are
/// spawned tasks.
#[derive(Clone)]
pub struct PlaybackCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    synthesizer: Arc<dyn SynthesisClient>,
    output: Arc<dyn AudioOutput>,
    notifier: Arc<dyn Notifier>,
    config: CoordinatorConfig,
    state: Mutex<GlobalPlaybackState>,
    /// Serializes load-and-play so two sessions never interleave on the device
    device: tokio::sync::Mutex<()>,
    subscribers: Arc<Mutex<SubscriberRegistry>>,
    events: EventFanout,
}

struct PendingSession {
    key: String,
    text: String,
    generation: Generation,
}

impl PlaybackCoordinator {
    pub fn builder(
        synthesizer: Arc<dyn SynthesisClient>,
        output: Arc<dyn AudioOutput>,
    ) -> PlaybackCoordinatorBuilder {
        PlaybackCoordinatorBuilder {
            synthesizer,
            output,
            notifier: None,
            config: CoordinatorConfig::default(),
        }
    }

    /// Coordinator with default configuration that reports failures through `log`.
    pub fn new(synthesizer: Arc<dyn SynthesisClient>, output: Arc<dyn AudioOutput>) -> Self {
        Self::builder(synthesizer, output).build()
    }

    /// Start playback for `key`, superseding whatever is active.
    ///
    /// The previous session is torn down and `key` is marked loading before
    /// this returns; synthesis and binding continue on a spawned task whose
    /// handle callers may ignore.
    pub fn request(
        &self,
        key: impl Into<String>,
        text: impl Into<String>,
    ) -> JoinHandle<PlaybackResult<PlaybackOutcome>> {
        match self.inner.begin(key.into(), text.into()) {
            Ok(pending) => {
                let inner = self.inner.clone();
                tokio::spawn(async move {
                    let generation = pending.generation;
                    match AssertUnwindSafe(inner.clone().complete(pending))
                        .catch_unwind()
                        .await
                    {
                        Ok(result) => result,
                        Err(panic) => {
                            let message = panic_message(&*panic);
                            error!("Playback task for generation {generation} panicked: {message}");
                            inner.fail(generation, PlaybackError::Aborted(message))
                        }
                    }
                })
            }
            Err(e) => tokio::spawn(async move { Err(e) }),
        }
    }

    /// Like [`request`](Self::request), awaiting the outcome.
    pub async fn play(
        &self,
        key: impl Into<String>,
        text: impl Into<String>,
    ) -> PlaybackResult<PlaybackOutcome> {
        self.request(key, text)
            .await
            .map_err(|e| PlaybackError::Aborted(e.to_string()))?
    }

    /// Stop `key` if it is active, otherwise request it.
    pub fn toggle(
        &self,
        key: impl Into<String>,
        text: impl Into<String>,
    ) -> Option<JoinHandle<PlaybackResult<PlaybackOutcome>>> {
        let key = key.into();
        if self.status(&key).is_active() {
            self.stop(&key);
            None
        } else {
            Some(self.request(key, text))
        }
    }

    /// Stop `key`. Returns `false` (and does nothing) when `key` is not active.
    pub fn stop(&self, key: &str) -> bool {
        let session = {
            let mut state = lock(&self.inner.state);
            let session = state.take_if_key(key);
            if session.is_some() {
                self.inner.release_output();
            }
            session
        };
        match session {
            Some(session) => {
                self.inner.stopped(session, StopReason::Requested);
                true
            }
            None => false,
        }
    }

    /// Stop whatever is active and return its key.
    pub fn stop_active(&self) -> Option<String> {
        let session = {
            let mut state = lock(&self.inner.state);
            let session = state.take_active();
            if session.is_some() {
                self.inner.release_output();
            }
            session
        };
        session.map(|session| {
            let key = session.key.clone();
            self.inner.stopped(session, StopReason::Requested);
            key
        })
    }

    /// Register `callback` for status changes of `key`.
    ///
    /// The callback runs once immediately with the current status, then after
    /// every state change. Updates never go backwards: changes that arrive
    /// while the callback is still running are delivered, newest only, once
    /// it returns. It must not block.
    pub fn subscribe<F>(&self, key: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(PlaybackStatus) + Send + Sync + 'static,
    {
        let key = key.into();
        let (id, listener) =
            lock(&self.inner.subscribers).insert(key.clone(), Arc::new(callback));
        let snapshot = self.snapshot();
        listener.deliver(snapshot.revision, snapshot.status_of(&key));
        Subscription::new(id, key, Arc::downgrade(&self.inner.subscribers))
    }

    /// Per-UI-unit handle for `key`.
    pub fn attach(&self, key: impl Into<String>) -> PlaybackSubscriber {
        PlaybackSubscriber::attach(self.clone(), key.into())
    }

    /// Stream of every transition from now on.
    pub fn events(&self) -> BoxEventStream<PlaybackEvent> {
        self.inner.events.subscribe()
    }

    pub fn status(&self, key: &str) -> PlaybackStatus {
        lock(&self.inner.state).status_of(key)
    }

    pub fn active_key(&self) -> Option<String> {
        lock(&self.inner.state).active_key().map(str::to_string)
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        lock(&self.inner.state).snapshot()
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.subscribers).len()
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }
}

impl Inner {
    /// Synchronous half of a request: validate, supersede, mark loading.
    fn begin(&self, key: String, text: String) -> PlaybackResult<PendingSession> {
        if key.trim().is_empty() {
            return Err(PlaybackError::InvalidRequest("key must not be empty".to_string()));
        }
        if text.trim().is_empty() {
            return Err(PlaybackError::InvalidRequest(format!(
                "no text to read for '{key}'"
            )));
        }

        let (previous, generation) = {
            let mut state = lock(&self.state);
            let previous = state.take_active();
            if previous.is_some() {
                self.release_output();
            }
            let generation = state.next_generation();
            state.activate(ActiveSession {
                key: key.clone(),
                generation,
                status: PlaybackStatus::Loading,
                watcher: None,
            });
            (previous, generation)
        };

        if let Some(previous) = previous {
            let (previous_key, previous_generation) = previous.detach();
            debug!("'{previous_key}' (generation {previous_generation}) superseded by '{key}'");
            self.events.publish(PlaybackEvent::Stopped {
                key: previous_key,
                generation: previous_generation,
                reason: StopReason::Superseded,
            });
        }

        debug!("'{key}' loading (generation {generation})");
        self.events.publish(PlaybackEvent::Loading {
            key: key.clone(),
            generation,
        });
        self.notify_subscribers();

        Ok(PendingSession {
            key,
            text,
            generation,
        })
    }

    /// Asynchronous half: synthesize, then bind to the device if still current.
    async fn complete(self: Arc<Self>, pending: PendingSession) -> PlaybackResult<PlaybackOutcome> {
        let PendingSession {
            key,
            text,
            generation,
        } = pending;

        let request = SynthesisRequest::new(key.clone(), text);
        let result = match self.config.synthesis_timeout() {
            Some(limit) => tokio::time::timeout(limit, self.synthesizer.synthesize(request))
                .await
                .unwrap_or(Err(SynthesisError::Timeout(limit.as_secs()))),
            None => self.synthesizer.synthesize(request).await,
        };

        let response = match result {
            Ok(response) => response,
            Err(e) => return self.fail(generation, PlaybackError::Synthesis(e)),
        };

        let _device = self.device.lock().await;
        if !lock(&self.state).is_current(generation) {
            debug!("Discarding audio for superseded '{key}' (generation {generation})");
            return Ok(PlaybackOutcome::Superseded);
        }

        // Decoding can be slow, so it runs off the runtime and without the state lock.
        let output = self.output.clone();
        let audio = response.audio;
        match tokio::task::spawn_blocking(move || output.load(&audio)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return self.fail(generation, PlaybackError::Output(e)),
            Err(e) => return self.fail(generation, PlaybackError::Aborted(e.to_string())),
        }

        let bound = {
            let mut state = lock(&self.state);
            if !state.is_current(generation) {
                debug!("'{key}' superseded while loading (generation {generation})");
                return Ok(PlaybackOutcome::Superseded);
            }

            let device_events = self.output.subscribe();
            match self.output.play() {
                Ok(()) => {
                    let watcher =
                        tokio::spawn(watch_device(Arc::downgrade(&self), generation, device_events));
                    if let Some(session) = state.current_mut(generation) {
                        session.status = PlaybackStatus::Playing;
                        session.watcher = Some(watcher);
                    }
                    state.touch();
                    Ok(())
                }
                Err(e) => Err(e),
            }
        };

        if let Err(e) = bound {
            return self.fail(generation, PlaybackError::Output(e));
        }

        debug!("'{key}' playing (generation {generation})");
        self.events.publish(PlaybackEvent::Started { key, generation });
        self.notify_subscribers();
        Ok(PlaybackOutcome::Started)
    }

    /// Tear down `generation` after an error and report it once.
    fn fail(&self, generation: Generation, error: PlaybackError) -> PlaybackResult<PlaybackOutcome> {
        let session = {
            let mut state = lock(&self.state);
            let session = state.take_if_current(generation);
            if session.is_some() {
                self.release_output();
            }
            session
        };

        let Some(session) = session else {
            debug!("Ignoring failure of superseded generation {generation}: {error}");
            return Ok(PlaybackOutcome::Superseded);
        };

        let (key, generation) = session.detach();
        warn!("Playback of '{key}' failed: {error}");
        self.events.publish(PlaybackEvent::Failed {
            key: key.clone(),
            generation,
            message: error.to_string(),
        });
        self.notify_subscribers();
        self.notifier.notify(Notification::for_error(&key, &error));
        Err(error)
    }

    /// The device drained the audio of `generation`.
    fn finish(&self, generation: Generation) {
        let session = {
            let mut state = lock(&self.state);
            let session = state.take_if_current(generation);
            if session.is_some() {
                self.output.reset_position();
            }
            session
        };

        if let Some(session) = session {
            let (key, generation) = session.detach();
            debug!("'{key}' finished (generation {generation})");
            self.events
                .publish(PlaybackEvent::Finished { key, generation });
            self.notify_subscribers();
        }
    }

    fn stopped(&self, session: ActiveSession, reason: StopReason) {
        let (key, generation) = session.detach();
        debug!("'{key}' stopped (generation {generation})");
        self.events.publish(PlaybackEvent::Stopped {
            key,
            generation,
            reason,
        });
        self.notify_subscribers();
    }

    /// Pause and rewind the device. Called with the state lock held.
    fn release_output(&self) {
        self.output.pause();
        self.output.reset_position();
    }

    /// Push the derived status to every subscriber. No locks are held while
    /// callbacks run, so they may call back into the coordinator.
    fn notify_subscribers(&self) {
        let snapshot = lock(&self.state).snapshot();
        let listeners = lock(&self.subscribers).listeners();
        for listener in listeners {
            listener.deliver(snapshot.revision, snapshot.status_of(listener.key()));
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "playback task panicked".to_string()
    }
}

/// Relay device events for one generation until it ends.
async fn watch_device(
    inner: Weak<Inner>,
    generation: Generation,
    mut events: broadcast::Receiver<OutputEvent>,
) {
    loop {
        match events.recv().await {
            Ok(OutputEvent::Started) => {
                debug!("Device started generation {generation}");
            }
            Ok(OutputEvent::Ended) => {
                if let Some(inner) = inner.upgrade() {
                    inner.finish(generation);
                }
                break;
            }
            Ok(OutputEvent::Error(message)) => {
                if let Some(inner) = inner.upgrade() {
                    let _ = inner.fail(
                        generation,
                        PlaybackError::Output(OutputError::Playback(message)),
                    );
                }
                break;
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("Device watcher for generation {generation} skipped {skipped} events");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use verdant_speech::{AudioUri, OutputResult, SynthesisResponse, SynthesisResult};

    struct InstantSynthesis {
        fail: bool,
    }

    #[async_trait]
    impl SynthesisClient for InstantSynthesis {
        async fn synthesize(
            &self,
            request: SynthesisRequest,
        ) -> SynthesisResult<SynthesisResponse> {
            if self.fail {
                Err(SynthesisError::ProviderError(format!("no audio for {}", request.key)))
            } else {
                Ok(SynthesisResponse {
                    audio: AudioUri::from_bytes("audio/wav", request.text.as_bytes()),
                })
            }
        }
    }

    struct SilentOutput {
        events: broadcast::Sender<OutputEvent>,
        pauses: AtomicUsize,
    }

    impl SilentOutput {
        fn new() -> Self {
            let (events, _) = broadcast::channel(8);
            Self {
                events,
                pauses: AtomicUsize::new(0),
            }
        }
    }

    impl AudioOutput for SilentOutput {
        fn load(&self, audio: &AudioUri) -> OutputResult<()> {
            audio.decode().map(|_| ())
        }

        fn play(&self) -> OutputResult<()> {
            let _ = self.events.send(OutputEvent::Started);
            Ok(())
        }

        fn pause(&self) {
            self.pauses.fetch_add(1, Ordering::SeqCst);
        }

        fn reset_position(&self) {}

        fn subscribe(&self) -> broadcast::Receiver<OutputEvent> {
            self.events.subscribe()
        }
    }

    fn coordinator(fail: bool) -> (PlaybackCoordinator, Arc<SilentOutput>) {
        let output = Arc::new(SilentOutput::new());
        let coordinator =
            PlaybackCoordinator::new(Arc::new(InstantSynthesis { fail }), output.clone());
        (coordinator, output)
    }

    #[tokio::test]
    async fn test_play_reaches_playing() {
        let (coordinator, _) = coordinator(false);
        let outcome = coordinator.play("tulsi", "Holy basil").await.unwrap();
        assert_eq!(outcome, PlaybackOutcome::Started);
        assert_eq!(coordinator.status("tulsi"), PlaybackStatus::Playing);
        assert_eq!(coordinator.active_key().as_deref(), Some("tulsi"));
    }

    #[tokio::test]
    async fn test_request_marks_loading_before_returning() {
        let (coordinator, _) = coordinator(false);
        let handle = coordinator.request("tulsi", "Holy basil");
        assert_eq!(coordinator.status("tulsi"), PlaybackStatus::Loading);
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_invalid_requests_leave_state_untouched() {
        let (coordinator, _) = coordinator(false);
        coordinator.play("tulsi", "Holy basil").await.unwrap();

        let err = coordinator.play("", "text").await.unwrap_err();
        assert!(matches!(err, PlaybackError::InvalidRequest(_)));
        let err = coordinator.play("neem", "   ").await.unwrap_err();
        assert!(matches!(err, PlaybackError::InvalidRequest(_)));

        assert_eq!(coordinator.status("tulsi"), PlaybackStatus::Playing);
        assert_eq!(coordinator.snapshot().generation, 1);
    }

    #[tokio::test]
    async fn test_synthesis_failure_returns_to_idle() {
        let (coordinator, _) = coordinator(true);
        let err = coordinator.play("tulsi", "Holy basil").await.unwrap_err();
        assert!(matches!(err, PlaybackError::Synthesis(_)));
        assert_eq!(coordinator.status("tulsi"), PlaybackStatus::Idle);
        assert_eq!(coordinator.active_key(), None);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (coordinator, output) = coordinator(false);
        assert!(!coordinator.stop("tulsi"));

        coordinator.play("tulsi", "Holy basil").await.unwrap();
        assert!(coordinator.stop("tulsi"));
        assert!(!coordinator.stop("tulsi"));
        assert_eq!(coordinator.status("tulsi"), PlaybackStatus::Idle);
        assert_eq!(output.pauses.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_active() {
        let (coordinator, _) = coordinator(false);
        assert_eq!(coordinator.stop_active(), None);
        coordinator.play("neem", "Neem").await.unwrap();
        assert_eq!(coordinator.stop_active().as_deref(), Some("neem"));
        assert_eq!(coordinator.active_key(), None);
    }

    #[tokio::test]
    async fn test_toggle() {
        let (coordinator, _) = coordinator(false);
        let handle = coordinator.toggle("tulsi", "Holy basil").unwrap();
        handle.await.unwrap().unwrap();
        assert!(coordinator.status("tulsi").is_playing());

        assert!(coordinator.toggle("tulsi", "Holy basil").is_none());
        assert_eq!(coordinator.status("tulsi"), PlaybackStatus::Idle);
    }

    #[tokio::test]
    async fn test_subscribe_reports_current_status_immediately() {
        let (coordinator, _) = coordinator(false);
        coordinator.play("tulsi", "Holy basil").await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let subscription = coordinator.subscribe("tulsi", move |status| {
            sink.lock().unwrap().push(status);
        });
        assert_eq!(*seen.lock().unwrap(), vec![PlaybackStatus::Playing]);
        assert_eq!(coordinator.subscriber_count(), 1);

        drop(subscription);
        assert_eq!(coordinator.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_callbacks_may_reenter() {
        let (coordinator, _) = coordinator(false);
        let reentrant = coordinator.clone();
        let _subscription = coordinator.subscribe("neem", move |_| {
            let _ = reentrant.status("neem");
            reentrant.stop("neem");
        });
        let outcome = coordinator.play("neem", "Neem").await.unwrap();
        // The loading notification already stopped it.
        assert_eq!(outcome, PlaybackOutcome::Superseded);
        assert_eq!(coordinator.active_key(), None);
    }
}
