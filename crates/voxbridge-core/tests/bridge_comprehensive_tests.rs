//! Comprehensive bridge tests over the scripted mock engine
//!
//! Tests cover:
//! - Input validation (nothing invalid reaches the engine)
//! - Parameter normalization as observed at the engine boundary
//! - Readiness gate queueing, replay, staleness, and init failure
//! - Flush/add session semantics and terminal-event guarantees
//! - Pause/resume arbitration with in-band denial reasons
//! - Voice catalog caching, filtering, and fallback warnings
//! - Voice preview semantics
//! - Completion watchdog recovery
//! - Audio interruption and app lifecycle handling

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};

use voxbridge_core::clock::TestClock;
use voxbridge_core::{
    BridgeConfig, GateState, GetVoicesRequest, PreviewVoiceRequest, QueueMode, SpeakRequest,
    SpeechEvent, SpeechEventKind, TtsBridge, DEFAULT_PREVIEW_TEXT,
};
use voxbridge_engine::{
    EngineSignal, MockCall, MockConfig, MockEngine, MockHandle, Readiness, VoiceSelection,
};

fn test_config() -> BridgeConfig {
    BridgeConfig {
        watchdog_poll_ms: 20,
        ..BridgeConfig::default()
    }
}

fn build_bridge(mock: MockConfig, config: BridgeConfig) -> (TtsBridge, MockHandle) {
    let engine = MockEngine::new(mock);
    let handle = engine.handle();
    let bridge = TtsBridge::new(Box::new(engine), config);
    (bridge, handle)
}

fn build_bridge_with_clock(
    mock: MockConfig,
    config: BridgeConfig,
    clock: Arc<TestClock>,
) -> (TtsBridge, MockHandle) {
    let engine = MockEngine::new(mock);
    let handle = engine.handle();
    let bridge = TtsBridge::with_clock(Box::new(engine), config, clock);
    (bridge, handle)
}

async fn wait_ready(bridge: &TtsBridge) {
    for _ in 0..200 {
        if bridge.readiness().await == GateState::Ready {
            return;
        }
        sleep(Duration::from_millis(5)).await;
    }
    panic!("bridge never became ready");
}

async fn wait_initialized(handle: &MockHandle) {
    for _ in 0..200 {
        if handle.call_count(MockCall::Initialize) > 0 {
            return;
        }
        sleep(Duration::from_millis(5)).await;
    }
    panic!("engine initialize was never called");
}

async fn ready_bridge(mock: MockConfig) -> (TtsBridge, MockHandle) {
    let (bridge, handle) = build_bridge(mock, test_config());
    wait_ready(&bridge).await;
    (bridge, handle)
}

async fn next_event(rx: &mut broadcast::Receiver<SpeechEvent>) -> SpeechEvent {
    timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for speech event")
        .expect("event channel closed")
}

async fn assert_no_event(rx: &mut broadcast::Receiver<SpeechEvent>) {
    let result = timeout(Duration::from_millis(80), rx.recv()).await;
    assert!(result.is_err(), "unexpected event: {:?}", result);
}

// ─── Input Validation ────────────────────────────────────────────────

#[tokio::test]
async fn empty_text_rejected_before_engine() {
    let (bridge, handle) = ready_bridge(MockConfig::default()).await;

    let err = bridge.speak(SpeakRequest::plain("")).await.unwrap_err();
    assert_eq!(err.code(), "EMPTY_TEXT");
    assert_eq!(handle.call_count(MockCall::Speak), 0);
}

#[tokio::test]
async fn text_length_boundary_enforced() {
    let (bridge, handle) = ready_bridge(MockConfig::default()).await;

    let err = bridge
        .speak(SpeakRequest::plain("a".repeat(10_001)))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "TEXT_TOO_LONG");
    assert_eq!(handle.call_count(MockCall::Speak), 0);

    let response = bridge
        .speak(SpeakRequest::plain("a".repeat(10_000)))
        .await
        .unwrap();
    assert!(response.success);
}

#[tokio::test]
async fn malformed_voice_id_rejected_before_engine() {
    let (bridge, handle) = ready_bridge(MockConfig::default()).await;

    let mut request = SpeakRequest::plain("hello");
    request.voice_id = Some("voice;rm -rf /".to_string());
    let err = bridge.speak(request).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_VOICE_ID");
    assert_eq!(handle.call_count(MockCall::Speak), 0);
    assert_eq!(handle.call_count(MockCall::Voices), 0);
}

#[tokio::test]
async fn oversized_voice_id_and_language_rejected() {
    let (bridge, _handle) = ready_bridge(MockConfig::default()).await;

    let mut request = SpeakRequest::plain("hello");
    request.voice_id = Some("v".repeat(257));
    assert_eq!(bridge.speak(request).await.unwrap_err().code(), "VOICE_ID_TOO_LONG");

    let mut request = SpeakRequest::plain("hello");
    request.language = Some("l".repeat(36));
    assert_eq!(bridge.speak(request).await.unwrap_err().code(), "LANGUAGE_TOO_LONG");

    // 35 characters is the inclusive limit.
    let mut request = SpeakRequest::plain("hello");
    request.language = Some("l".repeat(35));
    assert!(bridge.speak(request).await.is_ok());
}

// ─── Parameter Normalization ─────────────────────────────────────────

#[tokio::test]
async fn neutral_parameters_reach_engine_as_noop_plan() {
    let (bridge, handle) = ready_bridge(MockConfig::default()).await;

    let mut request = SpeakRequest::plain("hello");
    request.rate = Some(1.0);
    request.pitch = Some(1.0);
    request.volume = Some(1.0);
    bridge.speak(request).await.unwrap();

    let utterance = handle.last_utterance().unwrap();
    assert!(utterance.params.is_noop());
}

#[tokio::test]
async fn absent_parameters_are_never_set() {
    let (bridge, handle) = ready_bridge(MockConfig::default()).await;

    bridge.speak(SpeakRequest::plain("hello")).await.unwrap();
    assert!(handle.last_utterance().unwrap().params.is_noop());
}

#[tokio::test]
async fn out_of_range_parameters_clamp_at_engine_boundary() {
    let (bridge, handle) = ready_bridge(MockConfig::default()).await;

    let mut request = SpeakRequest::plain("hello");
    request.rate = Some(99.0);
    request.pitch = Some(0.1);
    request.volume = Some(0.25);
    bridge.speak(request).await.unwrap();

    let params = handle.last_utterance().unwrap().params;
    assert_eq!(params.rate, Some(4.0));
    assert_eq!(params.pitch, Some(0.5));
    assert_eq!(params.volume, Some(0.25));
}

#[tokio::test]
async fn volume_clamping_to_neutral_is_skipped() {
    let (bridge, handle) = ready_bridge(MockConfig::default()).await;

    let mut request = SpeakRequest::plain("hello");
    request.volume = Some(2.0);
    request.rate = Some(2.0);
    bridge.speak(request).await.unwrap();

    let params = handle.last_utterance().unwrap().params;
    assert_eq!(params.rate, Some(2.0));
    assert!(params.volume.is_none());
}

// ─── Readiness Gate ──────────────────────────────────────────────────

#[tokio::test]
async fn speak_before_ready_parks_and_replays() {
    let (bridge, handle) = build_bridge(
        MockConfig {
            readiness: Readiness::Manual,
            ..MockConfig::default()
        },
        test_config(),
    );
    wait_initialized(&handle).await;
    let bridge = Arc::new(bridge);

    let speaker = {
        let bridge = Arc::clone(&bridge);
        tokio::spawn(async move { bridge.speak(SpeakRequest::plain("parked")).await })
    };
    sleep(Duration::from_millis(30)).await;
    assert_eq!(handle.call_count(MockCall::Speak), 0);

    handle.make_ready();
    let response = speaker.await.unwrap().unwrap();
    assert!(response.success);
    assert_eq!(handle.call_count(MockCall::Speak), 1);
    assert_eq!(handle.last_utterance().unwrap().text, "parked");
}

#[tokio::test]
async fn parked_requests_replay_in_arrival_order() {
    let (bridge, handle) = build_bridge(
        MockConfig {
            readiness: Readiness::Manual,
            ..MockConfig::default()
        },
        test_config(),
    );
    wait_initialized(&handle).await;
    let bridge = Arc::new(bridge);

    let mut speakers = Vec::new();
    for text in ["first", "second", "third"] {
        let bridge = Arc::clone(&bridge);
        speakers.push(tokio::spawn(async move {
            bridge.speak(SpeakRequest::plain(text)).await
        }));
        // Give each call time to park before issuing the next.
        sleep(Duration::from_millis(20)).await;
    }

    handle.make_ready();
    for speaker in speakers {
        assert!(speaker.await.unwrap().unwrap().success);
    }

    // Replay preserves arrival order. Flush semantics mean later requests
    // cancel earlier ones, but all three must have been issued in order.
    let texts: Vec<String> = handle.utterances().iter().map(|u| u.text.clone()).collect();
    assert_eq!(texts, ["first", "second", "third"]);
}

#[tokio::test]
async fn pending_queue_capacity_rejects_overflow() {
    let (bridge, handle) = build_bridge(
        MockConfig {
            readiness: Readiness::Manual,
            ..MockConfig::default()
        },
        BridgeConfig {
            queue_capacity: 3,
            ..test_config()
        },
    );
    wait_initialized(&handle).await;
    let bridge = Arc::new(bridge);

    let mut speakers = Vec::new();
    for i in 0..3 {
        let bridge = Arc::clone(&bridge);
        speakers.push(tokio::spawn(async move {
            bridge.speak(SpeakRequest::plain(format!("queued {i}"))).await
        }));
    }
    sleep(Duration::from_millis(50)).await;

    // The queue holds 3; the 4th is rejected immediately, not parked.
    let err = bridge.speak(SpeakRequest::plain("overflow")).await.unwrap_err();
    assert_eq!(err.code(), "QUEUE_FULL");

    handle.make_ready();
    for speaker in speakers {
        assert!(speaker.await.unwrap().is_ok());
    }
    assert_eq!(handle.call_count(MockCall::Speak), 3);
}

#[tokio::test]
async fn stale_parked_request_rejected_at_drain_time() {
    let clock = Arc::new(TestClock::new());
    let (bridge, handle) = build_bridge_with_clock(
        MockConfig {
            readiness: Readiness::Manual,
            ..MockConfig::default()
        },
        test_config(),
        clock.clone(),
    );
    wait_initialized(&handle).await;
    let bridge = Arc::new(bridge);

    let speaker = {
        let bridge = Arc::clone(&bridge);
        tokio::spawn(async move { bridge.speak(SpeakRequest::plain("too late")).await })
    };
    sleep(Duration::from_millis(30)).await;

    clock.advance(Duration::from_secs(31));
    handle.make_ready();

    let err = speaker.await.unwrap().unwrap_err();
    assert_eq!(err.code(), "NOT_READY_TIMEOUT");
    assert_eq!(handle.call_count(MockCall::Speak), 0);
}

#[tokio::test]
async fn fresh_parked_request_survives_long_init() {
    let clock = Arc::new(TestClock::new());
    let (bridge, handle) = build_bridge_with_clock(
        MockConfig {
            readiness: Readiness::Manual,
            ..MockConfig::default()
        },
        test_config(),
        clock.clone(),
    );
    wait_initialized(&handle).await;
    let bridge = Arc::new(bridge);

    let speaker = {
        let bridge = Arc::clone(&bridge);
        tokio::spawn(async move { bridge.speak(SpeakRequest::plain("just in time")).await })
    };
    sleep(Duration::from_millis(30)).await;

    clock.advance(Duration::from_secs(29));
    handle.make_ready();
    assert!(speaker.await.unwrap().unwrap().success);
}

#[tokio::test]
async fn init_failure_rejects_parked_and_future_requests() {
    let (bridge, handle) = build_bridge(
        MockConfig {
            readiness: Readiness::Manual,
            ..MockConfig::default()
        },
        test_config(),
    );
    wait_initialized(&handle).await;
    let bridge = Arc::new(bridge);

    let speaker = {
        let bridge = Arc::clone(&bridge);
        tokio::spawn(async move { bridge.speak(SpeakRequest::plain("doomed")).await })
    };
    sleep(Duration::from_millis(30)).await;

    handle.make_init_failed("speech service unavailable");
    let err = speaker.await.unwrap().unwrap_err();
    assert_eq!(err.code(), "INIT_FAILED");

    // Failed is terminal: later requests reject immediately.
    let err = bridge.speak(SpeakRequest::plain("after")).await.unwrap_err();
    assert_eq!(err.code(), "INIT_FAILED");
    assert!(matches!(bridge.readiness().await, GateState::Failed { .. }));
}

#[tokio::test]
async fn synchronous_init_error_becomes_failed_state() {
    let (bridge, _handle) = build_bridge(
        MockConfig {
            readiness: Readiness::Failed("no speech service".to_string()),
            ..MockConfig::default()
        },
        test_config(),
    );

    for _ in 0..200 {
        if matches!(bridge.readiness().await, GateState::Failed { .. }) {
            break;
        }
        sleep(Duration::from_millis(5)).await;
    }
    let GateState::Failed { message } = bridge.readiness().await else {
        panic!("expected failed readiness");
    };
    assert!(message.contains("no speech service"));

    let err = bridge.speak(SpeakRequest::plain("hello")).await.unwrap_err();
    assert_eq!(err.code(), "INIT_FAILED");
}

#[tokio::test]
async fn non_speak_commands_answer_safely_while_not_ready() {
    let (bridge, handle) = build_bridge(
        MockConfig {
            readiness: Readiness::Manual,
            ..MockConfig::default()
        },
        test_config(),
    );
    wait_initialized(&handle).await;

    assert!(bridge.stop().await.success);

    let pause = bridge.pause_speaking().await;
    assert!(!pause.success);
    assert_eq!(pause.reason.as_deref(), Some("Engine not initialized"));

    let resume = bridge.resume_speaking().await;
    assert!(!resume.success);

    let voices = bridge.get_voices(GetVoicesRequest::default()).await;
    assert!(voices.voices.is_empty());
    assert_eq!(voices.initialized, Some(false));

    assert!(!bridge.is_speaking().await.speaking);

    let init = bridge.is_initialized().await;
    assert!(!init.initialized);
    assert_eq!(init.voice_count, 0);

    let err = bridge
        .preview_voice(PreviewVoiceRequest {
            voice_id: "en-US-1".to_string(),
            text: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_INITIALIZED");

    // None of those parked anything: nothing replays after readiness.
    handle.make_ready();
    sleep(Duration::from_millis(50)).await;
    assert_eq!(handle.call_count(MockCall::Speak), 0);
}

#[tokio::test]
async fn readiness_transitions_are_observable() {
    let (bridge, handle) = build_bridge(
        MockConfig {
            readiness: Readiness::Manual,
            ..MockConfig::default()
        },
        test_config(),
    );
    wait_initialized(&handle).await;
    let rx = bridge.subscribe_readiness().await;

    handle.make_ready();
    wait_ready(&bridge).await;
    assert_eq!(rx.try_recv().unwrap(), GateState::Ready);
}

// ─── Speech Session: Flush and Add ───────────────────────────────────

#[tokio::test]
async fn flush_cancels_current_before_speaking() {
    let (bridge, handle) = ready_bridge(MockConfig::default()).await;
    let mut events = bridge.subscribe();

    let first = bridge.speak(SpeakRequest::plain("first")).await.unwrap();
    let first_id = first.utterance_id.unwrap();
    let event = next_event(&mut events).await;
    assert_eq!(event.kind, SpeechEventKind::Start);
    assert_eq!(event.id, Some(first_id));

    let second = bridge.speak(SpeakRequest::plain("second")).await.unwrap();
    let second_id = second.utterance_id.unwrap();
    assert!(second_id > first_id);

    let cancel = next_event(&mut events).await;
    assert_eq!(cancel.kind, SpeechEventKind::Cancel);
    assert_eq!(cancel.id, Some(first_id));
    assert_eq!(cancel.interrupted, Some(false));

    let start = next_event(&mut events).await;
    assert_eq!(start.kind, SpeechEventKind::Start);
    assert_eq!(start.id, Some(second_id));

    assert_eq!(handle.call_count(MockCall::Stop), 1);
    assert!(bridge.is_speaking().await.speaking);
}

#[tokio::test]
async fn add_mode_queues_behind_current() {
    let (bridge, handle) = ready_bridge(MockConfig::default()).await;
    let mut events = bridge.subscribe();

    let first = bridge.speak(SpeakRequest::plain("first")).await.unwrap();
    let first_id = first.utterance_id.unwrap();

    let mut request = SpeakRequest::plain("second");
    request.queue_mode = QueueMode::Add;
    let second = bridge.speak(request).await.unwrap();
    let second_id = second.utterance_id.unwrap();

    // No cancellation: the engine keeps both.
    assert_eq!(handle.call_count(MockCall::Stop), 0);
    assert_eq!(handle.current(), Some(first_id));
    assert_eq!(handle.queued(), vec![second_id]);

    assert_eq!(next_event(&mut events).await.kind, SpeechEventKind::Start);

    handle.finish_current();
    let finish = next_event(&mut events).await;
    assert_eq!(finish.kind, SpeechEventKind::Finish);
    assert_eq!(finish.id, Some(first_id));

    let start = next_event(&mut events).await;
    assert_eq!(start.kind, SpeechEventKind::Start);
    assert_eq!(start.id, Some(second_id));
}

#[tokio::test]
async fn flush_cancels_queued_utterances_too() {
    let (bridge, handle) = ready_bridge(MockConfig::default()).await;
    let mut events = bridge.subscribe();

    let first = bridge.speak(SpeakRequest::plain("first")).await.unwrap();
    let mut request = SpeakRequest::plain("second");
    request.queue_mode = QueueMode::Add;
    let second = bridge.speak(request).await.unwrap();
    assert_eq!(next_event(&mut events).await.kind, SpeechEventKind::Start);

    let third = bridge.speak(SpeakRequest::plain("third")).await.unwrap();

    // One cancel each for the current and the queued utterance, in order.
    let cancel_a = next_event(&mut events).await;
    assert_eq!(cancel_a.kind, SpeechEventKind::Cancel);
    assert_eq!(cancel_a.id, first.utterance_id);
    let cancel_b = next_event(&mut events).await;
    assert_eq!(cancel_b.kind, SpeechEventKind::Cancel);
    assert_eq!(cancel_b.id, second.utterance_id);

    let start = next_event(&mut events).await;
    assert_eq!(start.kind, SpeechEventKind::Start);
    assert_eq!(start.id, third.utterance_id);

    assert_eq!(handle.call_count(MockCall::Stop), 1);
    assert_eq!(handle.current(), third.utterance_id);
    // The engine's own late cancellation signals must not double-report.
    assert_no_event(&mut events).await;
}

#[tokio::test]
async fn stop_cancels_everything_live() {
    let (bridge, handle) = ready_bridge(MockConfig::default()).await;
    let mut events = bridge.subscribe();

    let first = bridge.speak(SpeakRequest::plain("first")).await.unwrap();
    let mut request = SpeakRequest::plain("second");
    request.queue_mode = QueueMode::Add;
    let second = bridge.speak(request).await.unwrap();
    assert_eq!(next_event(&mut events).await.kind, SpeechEventKind::Start);

    assert!(bridge.stop().await.success);

    let cancel_a = next_event(&mut events).await;
    assert_eq!(cancel_a.kind, SpeechEventKind::Cancel);
    assert_eq!(cancel_a.id, first.utterance_id);
    let cancel_b = next_event(&mut events).await;
    assert_eq!(cancel_b.kind, SpeechEventKind::Cancel);
    assert_eq!(cancel_b.id, second.utterance_id);

    assert!(!bridge.is_speaking().await.speaking);
    assert!(handle.call_count(MockCall::DeactivateOutput) >= 1);
    assert_no_event(&mut events).await;
}

#[tokio::test]
async fn stop_when_idle_is_a_silent_success() {
    let (bridge, _handle) = ready_bridge(MockConfig::default()).await;
    let mut events = bridge.subscribe();

    assert!(bridge.stop().await.success);
    assert!(bridge.stop().await.success);
    assert_no_event(&mut events).await;
}

#[tokio::test]
async fn each_terminal_is_delivered_exactly_once() {
    let (bridge, handle) = ready_bridge(MockConfig::default()).await;
    let mut events = bridge.subscribe();

    let response = bridge.speak(SpeakRequest::plain("hello")).await.unwrap();
    let id = response.utterance_id.unwrap();
    assert_eq!(next_event(&mut events).await.kind, SpeechEventKind::Start);

    handle.finish_current();
    let finish = next_event(&mut events).await;
    assert_eq!(finish.kind, SpeechEventKind::Finish);
    assert_eq!(finish.id, Some(id));

    // A stray late signal for the finished id must not produce a second
    // terminal.
    handle.signal(EngineSignal::Finished { id });
    handle.signal(EngineSignal::Cancelled { id });
    assert_no_event(&mut events).await;

    // Neither must a stop after the fact.
    bridge.stop().await;
    assert_no_event(&mut events).await;
}

#[tokio::test]
async fn engine_rejection_surfaces_as_engine_error() {
    let (bridge, _handle) = ready_bridge(MockConfig {
        fail_speak: Some("synthesizer exploded".to_string()),
        ..MockConfig::default()
    })
    .await;

    let err = bridge.speak(SpeakRequest::plain("hello")).await.unwrap_err();
    assert_eq!(err.code(), "ENGINE_ERROR");
    assert!(!bridge.is_speaking().await.speaking);
}

#[tokio::test]
async fn per_utterance_engine_failure_emits_error_event() {
    let (bridge, handle) = ready_bridge(MockConfig::default()).await;
    let mut events = bridge.subscribe();

    let response = bridge.speak(SpeakRequest::plain("hello")).await.unwrap();
    let id = response.utterance_id.unwrap();
    assert_eq!(next_event(&mut events).await.kind, SpeechEventKind::Start);

    handle.error_current("render failed");
    let error = next_event(&mut events).await;
    assert_eq!(error.kind, SpeechEventKind::Error);
    assert_eq!(error.id, Some(id));
    assert_eq!(error.error.as_deref(), Some("render failed"));
    assert!(!bridge.is_speaking().await.speaking);
}

// ─── Pause and Resume ────────────────────────────────────────────────

#[tokio::test]
async fn pause_resume_happy_path() {
    let (bridge, handle) = ready_bridge(MockConfig::default()).await;
    let mut events = bridge.subscribe();

    let response = bridge.speak(SpeakRequest::plain("hello")).await.unwrap();
    let id = response.utterance_id.unwrap();
    assert_eq!(next_event(&mut events).await.kind, SpeechEventKind::Start);

    let pause = bridge.pause_speaking().await;
    assert!(pause.success);
    assert!(handle.is_paused());
    let event = next_event(&mut events).await;
    assert_eq!(event.kind, SpeechEventKind::Pause);
    assert_eq!(event.id, Some(id));

    // Paused speech still counts as a live session.
    assert!(bridge.is_speaking().await.speaking);

    let resume = bridge.resume_speaking().await;
    assert!(resume.success);
    assert!(!handle.is_paused());
    let event = next_event(&mut events).await;
    assert_eq!(event.kind, SpeechEventKind::Resume);
    assert_eq!(event.id, Some(id));
}

#[tokio::test]
async fn pause_denials_carry_reasons() {
    let (bridge, _handle) = ready_bridge(MockConfig::default()).await;

    let denied = bridge.pause_speaking().await;
    assert!(!denied.success);
    assert_eq!(denied.reason.as_deref(), Some("Not speaking"));

    bridge.speak(SpeakRequest::plain("hello")).await.unwrap();
    assert!(bridge.pause_speaking().await.success);

    let denied = bridge.pause_speaking().await;
    assert!(!denied.success);
    assert_eq!(denied.reason.as_deref(), Some("Already paused"));
}

#[tokio::test]
async fn resume_without_pause_is_denied() {
    let (bridge, _handle) = ready_bridge(MockConfig::default()).await;

    let denied = bridge.resume_speaking().await;
    assert_eq!(denied.reason.as_deref(), Some("Not paused"));

    bridge.speak(SpeakRequest::plain("hello")).await.unwrap();
    let denied = bridge.resume_speaking().await;
    assert!(!denied.success);
    assert_eq!(denied.reason.as_deref(), Some("Not paused"));
}

#[tokio::test]
async fn unsupported_pause_denied_without_engine_call() {
    let (bridge, handle) = ready_bridge(MockConfig {
        pause_supported: false,
        ..MockConfig::default()
    })
    .await;

    bridge.speak(SpeakRequest::plain("hello")).await.unwrap();
    let denied = bridge.pause_speaking().await;
    assert!(!denied.success);
    assert_eq!(
        denied.reason.as_deref(),
        Some("Pause is not supported by this engine")
    );
    assert_eq!(handle.call_count(MockCall::Pause), 0);
}

// ─── Voice Catalog ───────────────────────────────────────────────────

#[tokio::test]
async fn get_voices_lists_and_filters_by_language() {
    let (bridge, _handle) = ready_bridge(MockConfig::default()).await;

    let all = bridge.get_voices(GetVoicesRequest::default()).await;
    assert_eq!(all.voices.len(), 3);
    assert!(all.initialized.is_none());

    let en = bridge
        .get_voices(GetVoicesRequest {
            language: Some("EN".to_string()),
        })
        .await;
    assert_eq!(en.voices.len(), 2);

    let none = bridge
        .get_voices(GetVoicesRequest {
            language: Some("zz".to_string()),
        })
        .await;
    assert!(none.voices.is_empty());
}

#[tokio::test]
async fn voice_list_is_cached_until_ttl_expires() {
    let clock = Arc::new(TestClock::new());
    let (bridge, handle) =
        build_bridge_with_clock(MockConfig::default(), test_config(), clock.clone());
    wait_ready(&bridge).await;

    bridge.get_voices(GetVoicesRequest::default()).await;
    bridge.get_voices(GetVoicesRequest::default()).await;
    assert_eq!(handle.call_count(MockCall::Voices), 1);

    clock.advance(Duration::from_secs(61));
    bridge.get_voices(GetVoicesRequest::default()).await;
    assert_eq!(handle.call_count(MockCall::Voices), 2);
}

#[tokio::test]
async fn voice_enumeration_outage_degrades_to_empty() {
    let (bridge, _handle) = ready_bridge(MockConfig {
        fail_voices_after: Some(0),
        ..MockConfig::default()
    })
    .await;

    let response = bridge.get_voices(GetVoicesRequest::default()).await;
    assert!(response.voices.is_empty());
    assert!(response.initialized.is_none());

    let init = bridge.is_initialized().await;
    assert!(init.initialized);
    assert_eq!(init.voice_count, 0);
}

#[tokio::test]
async fn is_initialized_reports_voice_count() {
    let (bridge, _handle) = ready_bridge(MockConfig::default()).await;

    let init = bridge.is_initialized().await;
    assert!(init.initialized);
    assert_eq!(init.voice_count, 3);
}

#[tokio::test]
async fn requested_voice_id_is_selected_exactly() {
    let (bridge, handle) = ready_bridge(MockConfig::default()).await;

    let mut request = SpeakRequest::plain("hello");
    request.voice_id = Some("en-GB-1".to_string());
    let response = bridge.speak(request).await.unwrap();
    assert!(response.warning.is_none());

    match handle.last_utterance().unwrap().selection {
        VoiceSelection::Voice(voice) => assert_eq!(voice.id, "en-GB-1"),
        other => panic!("expected explicit voice selection, got {:?}", other),
    }
}

#[tokio::test]
async fn unknown_voice_id_falls_back_with_warning() {
    let (bridge, handle) = ready_bridge(MockConfig::default()).await;

    let mut request = SpeakRequest::plain("hello");
    request.voice_id = Some("nonexistent".to_string());
    let response = bridge.speak(request).await.unwrap();

    assert!(response.success);
    assert_eq!(
        response.warning.as_deref(),
        Some("Voice 'nonexistent' not found, using default voice")
    );
    assert!(matches!(
        handle.last_utterance().unwrap().selection,
        VoiceSelection::EngineDefault
    ));
}

#[tokio::test]
async fn language_preference_selects_first_matching_voice() {
    let (bridge, handle) = ready_bridge(MockConfig::default()).await;

    let mut request = SpeakRequest::plain("ola");
    request.language = Some("pt".to_string());
    let response = bridge.speak(request).await.unwrap();
    assert!(response.warning.is_none());

    match handle.last_utterance().unwrap().selection {
        VoiceSelection::Voice(voice) => assert_eq!(voice.language, "pt-BR"),
        other => panic!("expected voice selection, got {:?}", other),
    }
}

#[tokio::test]
async fn unavailable_language_warns_and_uses_default() {
    let (bridge, handle) = ready_bridge(MockConfig::default()).await;

    let mut request = SpeakRequest::plain("bonjour");
    request.language = Some("fr".to_string());
    let response = bridge.speak(request).await.unwrap();

    assert!(response.success);
    assert_eq!(
        response.warning.as_deref(),
        Some("Language 'fr' not available, using default voice")
    );
    assert!(matches!(
        handle.last_utterance().unwrap().selection,
        VoiceSelection::EngineDefault
    ));
}

// ─── Voice Preview ───────────────────────────────────────────────────

#[tokio::test]
async fn preview_speaks_sample_text_with_requested_voice() {
    let (bridge, handle) = ready_bridge(MockConfig::default()).await;

    let response = bridge
        .preview_voice(PreviewVoiceRequest {
            voice_id: "en-US-1".to_string(),
            text: None,
        })
        .await
        .unwrap();
    assert!(response.success);
    assert!(response.utterance_id.is_some());

    let utterance = handle.last_utterance().unwrap();
    assert_eq!(utterance.text, DEFAULT_PREVIEW_TEXT);
    match utterance.selection {
        VoiceSelection::Voice(voice) => assert_eq!(voice.id, "en-US-1"),
        other => panic!("expected voice selection, got {:?}", other),
    }
}

#[tokio::test]
async fn preview_unknown_voice_fails_in_band() {
    let (bridge, handle) = ready_bridge(MockConfig::default()).await;

    let response = bridge
        .preview_voice(PreviewVoiceRequest {
            voice_id: "nonexistent".to_string(),
            text: None,
        })
        .await
        .unwrap();

    assert!(!response.success);
    assert_eq!(response.warning.as_deref(), Some("Voice 'nonexistent' not found"));
    assert!(response.utterance_id.is_none());
    assert_eq!(handle.call_count(MockCall::Speak), 0);
}

#[tokio::test]
async fn preview_honors_custom_and_configured_text() {
    let (bridge, handle) = ready_bridge(MockConfig::default()).await;
    bridge
        .preview_voice(PreviewVoiceRequest {
            voice_id: "en-US-1".to_string(),
            text: Some("Custom sample".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(handle.last_utterance().unwrap().text, "Custom sample");

    let (bridge, handle) = build_bridge(
        MockConfig::default(),
        BridgeConfig {
            preview_text: Some("Bom dia!".to_string()),
            ..test_config()
        },
    );
    wait_ready(&bridge).await;
    bridge
        .preview_voice(PreviewVoiceRequest {
            voice_id: "pt-BR-1".to_string(),
            text: None,
        })
        .await
        .unwrap();
    assert_eq!(handle.last_utterance().unwrap().text, "Bom dia!");
}

#[tokio::test]
async fn preview_validates_voice_id_format() {
    let (bridge, _handle) = ready_bridge(MockConfig::default()).await;

    let err = bridge
        .preview_voice(PreviewVoiceRequest {
            voice_id: "bad voice!".to_string(),
            text: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_VOICE_ID");
}

#[tokio::test]
async fn preview_flushes_current_speech() {
    let (bridge, _handle) = ready_bridge(MockConfig::default()).await;
    let mut events = bridge.subscribe();

    let first = bridge.speak(SpeakRequest::plain("long speech")).await.unwrap();
    assert_eq!(next_event(&mut events).await.kind, SpeechEventKind::Start);

    bridge
        .preview_voice(PreviewVoiceRequest {
            voice_id: "en-US-1".to_string(),
            text: None,
        })
        .await
        .unwrap();

    let cancel = next_event(&mut events).await;
    assert_eq!(cancel.kind, SpeechEventKind::Cancel);
    assert_eq!(cancel.id, first.utterance_id);
    assert_eq!(next_event(&mut events).await.kind, SpeechEventKind::Start);
}

// ─── Completion Watchdog ─────────────────────────────────────────────

#[tokio::test]
async fn watchdog_fails_a_callback_less_session() {
    let clock = Arc::new(TestClock::new());
    let (bridge, handle) = build_bridge_with_clock(
        MockConfig {
            suppress_callbacks: true,
            ..MockConfig::default()
        },
        test_config(),
        clock.clone(),
    );
    wait_ready(&bridge).await;
    let mut events = bridge.subscribe();

    let response = bridge.speak(SpeakRequest::plain("hi")).await.unwrap();
    let id = response.utterance_id.unwrap();
    assert!(bridge.is_speaking().await.speaking);

    // Past the base budget plus the per-character allowance.
    clock.advance(Duration::from_secs(60));
    sleep(Duration::from_millis(100)).await;

    let error = next_event(&mut events).await;
    assert_eq!(error.kind, SpeechEventKind::Error);
    assert_eq!(error.id, Some(id));
    assert_eq!(
        error.error.as_deref(),
        Some("Engine produced no completion callback")
    );
    assert!(!bridge.is_speaking().await.speaking);
    assert!(handle.call_count(MockCall::DeactivateOutput) >= 1);
}

#[tokio::test]
async fn watchdog_stays_quiet_for_completed_speech() {
    let clock = Arc::new(TestClock::new());
    let (bridge, handle) =
        build_bridge_with_clock(MockConfig::default(), test_config(), clock.clone());
    wait_ready(&bridge).await;
    let mut events = bridge.subscribe();

    bridge.speak(SpeakRequest::plain("hi")).await.unwrap();
    assert_eq!(next_event(&mut events).await.kind, SpeechEventKind::Start);
    handle.finish_current();
    assert_eq!(next_event(&mut events).await.kind, SpeechEventKind::Finish);

    clock.advance(Duration::from_secs(3600));
    sleep(Duration::from_millis(100)).await;
    assert_no_event(&mut events).await;
}

#[tokio::test]
async fn watchdog_is_disarmed_while_paused() {
    let clock = Arc::new(TestClock::new());
    let (bridge, _handle) =
        build_bridge_with_clock(MockConfig::default(), test_config(), clock.clone());
    wait_ready(&bridge).await;
    let mut events = bridge.subscribe();

    bridge.speak(SpeakRequest::plain("hi")).await.unwrap();
    assert_eq!(next_event(&mut events).await.kind, SpeechEventKind::Start);
    assert!(bridge.pause_speaking().await.success);
    assert_eq!(next_event(&mut events).await.kind, SpeechEventKind::Pause);

    // However long the pause lasts, the watchdog must not fire.
    clock.advance(Duration::from_secs(3600));
    sleep(Duration::from_millis(100)).await;
    assert_no_event(&mut events).await;
    assert!(bridge.is_speaking().await.speaking);
}

// ─── Interruption and App Lifecycle ──────────────────────────────────

#[tokio::test]
async fn interruption_pauses_and_conditionally_resumes() {
    let (bridge, handle) = ready_bridge(MockConfig::default()).await;
    let mut events = bridge.subscribe();

    let response = bridge.speak(SpeakRequest::plain("hello")).await.unwrap();
    let id = response.utterance_id.unwrap();
    assert_eq!(next_event(&mut events).await.kind, SpeechEventKind::Start);

    bridge.interruption_began().await;
    let event = next_event(&mut events).await;
    assert_eq!(event.kind, SpeechEventKind::Interrupted);
    assert_eq!(event.id, Some(id));
    assert_eq!(event.interrupted, Some(true));
    assert!(handle.is_paused());

    bridge.interruption_ended(true).await;
    let event = next_event(&mut events).await;
    assert_eq!(event.kind, SpeechEventKind::Resume);
    assert!(!handle.is_paused());
}

#[tokio::test]
async fn interruption_without_resume_hint_stays_paused() {
    let (bridge, handle) = ready_bridge(MockConfig::default()).await;
    let mut events = bridge.subscribe();

    bridge.speak(SpeakRequest::plain("hello")).await.unwrap();
    assert_eq!(next_event(&mut events).await.kind, SpeechEventKind::Start);

    bridge.interruption_began().await;
    assert_eq!(next_event(&mut events).await.kind, SpeechEventKind::Interrupted);

    bridge.interruption_ended(false).await;
    assert_no_event(&mut events).await;
    assert!(handle.is_paused());

    // The caller may still resume manually.
    assert!(bridge.resume_speaking().await.success);
    assert_eq!(next_event(&mut events).await.kind, SpeechEventKind::Resume);
}

#[tokio::test]
async fn stop_during_interruption_marks_cancellation_interrupted() {
    let (bridge, _handle) = ready_bridge(MockConfig::default()).await;
    let mut events = bridge.subscribe();

    let response = bridge.speak(SpeakRequest::plain("hello")).await.unwrap();
    assert_eq!(next_event(&mut events).await.kind, SpeechEventKind::Start);

    bridge.interruption_began().await;
    assert_eq!(next_event(&mut events).await.kind, SpeechEventKind::Interrupted);

    bridge.stop().await;
    let cancel = next_event(&mut events).await;
    assert_eq!(cancel.kind, SpeechEventKind::Cancel);
    assert_eq!(cancel.id, response.utterance_id);
    assert_eq!(cancel.interrupted, Some(true));
}

#[tokio::test]
async fn interruption_while_idle_is_a_noop() {
    let (bridge, handle) = ready_bridge(MockConfig::default()).await;
    let mut events = bridge.subscribe();

    bridge.interruption_began().await;
    bridge.interruption_ended(true).await;
    assert_no_event(&mut events).await;
    assert_eq!(handle.call_count(MockCall::Pause), 0);
    assert_eq!(handle.call_count(MockCall::Resume), 0);
}

#[tokio::test]
async fn interruption_with_unsupported_pause_lets_speech_continue() {
    let (bridge, handle) = ready_bridge(MockConfig {
        pause_supported: false,
        ..MockConfig::default()
    })
    .await;
    let mut events = bridge.subscribe();

    bridge.speak(SpeakRequest::plain("hello")).await.unwrap();
    assert_eq!(next_event(&mut events).await.kind, SpeechEventKind::Start);

    bridge.interruption_began().await;
    assert_no_event(&mut events).await;
    assert_eq!(handle.call_count(MockCall::Pause), 0);
    assert!(bridge.is_speaking().await.speaking);
}

#[tokio::test]
async fn backgrounding_pauses_without_auto_resume() {
    let (bridge, handle) = ready_bridge(MockConfig::default()).await;
    let mut events = bridge.subscribe();

    let response = bridge.speak(SpeakRequest::plain("hello")).await.unwrap();
    assert_eq!(next_event(&mut events).await.kind, SpeechEventKind::Start);

    bridge.app_backgrounded().await;
    let event = next_event(&mut events).await;
    assert_eq!(event.kind, SpeechEventKind::BackgroundPause);
    assert_eq!(event.id, response.utterance_id);
    assert!(handle.is_paused());

    // Foregrounding is the caller's business; only an explicit resume
    // continues playback.
    assert!(bridge.resume_speaking().await.success);
    assert_eq!(next_event(&mut events).await.kind, SpeechEventKind::Resume);
}

#[tokio::test]
async fn termination_stops_speech_without_events() {
    let (bridge, handle) = ready_bridge(MockConfig::default()).await;
    let mut events = bridge.subscribe();

    bridge.speak(SpeakRequest::plain("hello")).await.unwrap();
    assert_eq!(next_event(&mut events).await.kind, SpeechEventKind::Start);

    bridge.app_terminating().await;
    assert!(!bridge.is_speaking().await.speaking);
    assert!(handle.call_count(MockCall::Stop) >= 1);
    assert_no_event(&mut events).await;
}

#[tokio::test]
async fn shutdown_reaches_the_engine() {
    let (bridge, handle) = ready_bridge(MockConfig::default()).await;

    bridge.speak(SpeakRequest::plain("hello")).await.unwrap();
    bridge.shutdown().await;
    assert_eq!(handle.call_count(MockCall::Shutdown), 1);
    assert!(!bridge.is_speaking().await.speaking);
}

// ─── Full Lifecycle Ordering ─────────────────────────────────────────

#[tokio::test]
async fn auto_finished_utterance_orders_start_then_finish() {
    let (bridge, _handle) = ready_bridge(MockConfig {
        auto_finish_after_ms: Some(30),
        ..MockConfig::default()
    })
    .await;
    let mut events = bridge.subscribe();

    let response = bridge.speak(SpeakRequest::plain("hello")).await.unwrap();
    let id = response.utterance_id.unwrap();

    let start = next_event(&mut events).await;
    assert_eq!((start.kind, start.id), (SpeechEventKind::Start, Some(id)));
    let finish = next_event(&mut events).await;
    assert_eq!((finish.kind, finish.id), (SpeechEventKind::Finish, Some(id)));
    assert!(!bridge.is_speaking().await.speaking);
}

#[tokio::test]
async fn paused_lifecycle_orders_start_pause_resume_finish() {
    let (bridge, handle) = ready_bridge(MockConfig::default()).await;
    let mut events = bridge.subscribe();

    bridge.speak(SpeakRequest::plain("hello")).await.unwrap();
    assert_eq!(next_event(&mut events).await.kind, SpeechEventKind::Start);

    bridge.pause_speaking().await;
    assert_eq!(next_event(&mut events).await.kind, SpeechEventKind::Pause);

    bridge.resume_speaking().await;
    assert_eq!(next_event(&mut events).await.kind, SpeechEventKind::Resume);

    handle.finish_current();
    assert_eq!(next_event(&mut events).await.kind, SpeechEventKind::Finish);
    assert!(!bridge.is_speaking().await.speaking);
}
