use std::sync::Arc;
use verdant::prelude::*;
use verdant_test_utils::{RecordingOutput, StaticSynthesisClient, sample_audio_uri};

#[tokio::test]
async fn test_prelude_wires_a_coordinator() {
    init_logging();

    let synthesizer: Arc<dyn SynthesisClient> =
        Arc::new(StaticSynthesisClient::ok(sample_audio_uri("tulsi")));
    let output: Arc<dyn AudioOutput> = Arc::new(RecordingOutput::new());
    let coordinator = PlaybackCoordinator::builder(synthesizer, output)
        .notifier(Arc::new(LogNotifier))
        .config(CoordinatorConfig::default())
        .build();

    let outcome = coordinator.play("tulsi", "Holy basil").await.unwrap();
    assert_eq!(outcome, PlaybackOutcome::Started);
    assert_eq!(coordinator.status("tulsi"), PlaybackStatus::Playing);
}
