use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::{oneshot, watch};
use verdant_speech::{
    AudioUri, SynthesisClient, SynthesisError, SynthesisRequest, SynthesisResponse,
    SynthesisResult,
};

/// A small, valid-looking WAV data URI labelled with `label`.
pub fn sample_audio_uri(label: &str) -> AudioUri {
    let mut bytes = b"RIFF\0\0\0\0WAVE".to_vec();
    bytes.extend_from_slice(label.as_bytes());
    AudioUri::from_bytes("audio/wav", &bytes)
}

pub fn sample_response(label: &str) -> SynthesisResponse {
    SynthesisResponse {
        audio: sample_audio_uri(label),
    }
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

type Gate = oneshot::Sender<SynthesisResult<SynthesisResponse>>;

/// Synthesis client whose calls stay pending until the test releases them.
pub struct GatedSynthesisClient {
    pending: Mutex<Vec<(String, Gate)>>,
    calls: Mutex<Vec<SynthesisRequest>>,
    count: watch::Sender<usize>,
}

impl Default for GatedSynthesisClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GatedSynthesisClient {
    pub fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self {
            pending: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            count,
        }
    }

    /// Every request received so far, in arrival order.
    pub fn calls(&self) -> Vec<SynthesisRequest> {
        guard(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        *self.count.borrow()
    }

    pub fn pending_count(&self) -> usize {
        guard(&self.pending).len()
    }

    /// Wait until at least `n` calls have arrived.
    pub async fn wait_for_calls(&self, n: usize) {
        let mut rx = self.count.subscribe();
        let _ = rx.wait_for(|count| *count >= n).await;
    }

    /// Complete the oldest pending call for `key`. Returns `false` if none is pending.
    pub fn resolve(&self, key: &str, result: SynthesisResult<SynthesisResponse>) -> bool {
        let gate = {
            let mut pending = guard(&self.pending);
            pending
                .iter()
                .position(|(k, _)| k == key)
                .map(|index| pending.remove(index).1)
        };
        match gate {
            Some(gate) => gate.send(result).is_ok(),
            None => false,
        }
    }

    pub fn succeed(&self, key: &str) -> bool {
        self.resolve(key, Ok(sample_response(key)))
    }

    pub fn reject(&self, key: &str, error: SynthesisError) -> bool {
        self.resolve(key, Err(error))
    }
}

#[async_trait]
impl SynthesisClient for GatedSynthesisClient {
    async fn synthesize(&self, request: SynthesisRequest) -> SynthesisResult<SynthesisResponse> {
        let (tx, rx) = oneshot::channel();
        guard(&self.pending).push((request.key.clone(), tx));
        guard(&self.calls).push(request);
        self.count.send_modify(|count| *count += 1);

        rx.await
            .unwrap_or_else(|_| Err(SynthesisError::Other("gate dropped".to_string())))
    }

    fn provider_name(&self) -> &str {
        "gated"
    }
}

/// Synthesis client answering every call with the same result.
pub struct StaticSynthesisClient {
    result: SynthesisResult<SynthesisResponse>,
    calls: Mutex<Vec<SynthesisRequest>>,
}

impl StaticSynthesisClient {
    pub fn ok(audio: AudioUri) -> Self {
        Self {
            result: Ok(SynthesisResponse { audio }),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: SynthesisError) -> Self {
        Self {
            result: Err(error),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<SynthesisRequest> {
        guard(&self.calls).clone()
    }
}

#[async_trait]
impl SynthesisClient for StaticSynthesisClient {
    async fn synthesize(&self, request: SynthesisRequest) -> SynthesisResult<SynthesisResponse> {
        guard(&self.calls).push(request);
        self.result.clone()
    }

    fn provider_name(&self) -> &str {
        "static"
    }
}
