//! End-to-end call scenarios exercised through `CallSupervisor`/`TaskPipeline`
//! and the connection manager directly, without a live socket.

use std::sync::Arc;
use std::time::Duration;

use voice_cache::{LlmCache, MemoryCacheBackend};
use voice_domain::config::{AgentConfig, Config, RoleConfig};
use voice_domain::resilience::{RateLimitManager, Tier, TokenBucketRateLimiter};
use voice_domain::stream::PipelineEvent;
use voice_providers::LlmRouter;
use voice_sessions::SessionRegistry;

use voice_gateway::connection::ConnectionRegistry;
use voice_gateway::providers::build_provider_registry;
use voice_gateway::runtime::CancelMap;
use voice_gateway::state::AppState;
use voice_gateway::supervisor::CallSupervisor;

fn test_config(barge_in_enabled: bool) -> Config {
    let mut config = Config::default();
    config.llm.roles.insert(
        "executor".into(),
        RoleConfig { primary: "default/echo-1".into(), fallbacks: vec![] },
    );
    config.agents.insert(
        "front_desk".into(),
        AgentConfig { llm_role: "executor".into(), barge_in_enabled, ..AgentConfig::default() },
    );
    config
}

fn test_state(config: Config) -> AppState {
    let config = Arc::new(config);
    let providers = Arc::new(build_provider_registry(&config));
    let llm_router = Arc::new(LlmRouter::new(
        build_provider_registry(&config),
        config.llm.roles.clone(),
        config.llm.default_timeout_ms,
    ));
    let cache_backend = Arc::new(MemoryCacheBackend::new(config.cache.llm_cache_max_size));
    let llm_cache = Arc::new(LlmCache::new(cache_backend, config.cache.llm_cache_ttl_seconds, config.cache.enable_normalization));
    let sessions = Arc::new(SessionRegistry::new());
    let connections = Arc::new(ConnectionRegistry::new(
        config.server.max_connections,
        Duration::from_secs(config.server.heartbeat_interval_seconds),
        Duration::from_secs(config.server.stale_timeout_seconds),
    ));
    let cancel_map = Arc::new(CancelMap::new());

    let mut rate_limit_manager = RateLimitManager::new();
    rate_limit_manager.add_tier(
        "connection",
        Tier::TokenBucket(TokenBucketRateLimiter::new(
            config.resilience.rate_limit_capacity,
            config.resilience.rate_limit_refill_per_sec,
        )),
    );
    let rate_limits = Arc::new(rate_limit_manager);

    AppState { config, providers, llm_router, llm_cache, sessions, connections, cancel_map, rate_limits }
}

async fn recv_within(rx: &mut tokio::sync::mpsc::Receiver<PipelineEvent>, millis: u64) -> Option<PipelineEvent> {
    tokio::time::timeout(Duration::from_millis(millis), rx.recv()).await.ok().flatten()
}

/// S1-shaped: a full turn over a fixed STT transcript produces the
/// started/transcription/llm_response/audio/llm_response(final) sequence
/// and a non-empty usage record.
#[tokio::test]
async fn happy_path_turn_produces_expected_event_sequence_and_usage() {
    let state = test_state(test_config(true));
    let agent = state.config.agents.get("front_desk").cloned().unwrap();

    let (supervisor, mut out_rx) =
        CallSupervisor::start(&state, "sess-1".into(), "org-1".into(), None, "front_desk".into(), &agent, "pstn_json")
            .await
            .expect("supervisor starts");

    // FixedSttProvider emits its transcript after the third audio frame.
    for _ in 0..3 {
        supervisor.send_audio(vec![0i16; 160]).await.unwrap();
    }

    let started = recv_within(&mut out_rx, 500).await.expect("started event");
    assert!(matches!(started, PipelineEvent::Started { task_index: 1 }));

    let transcription = recv_within(&mut out_rx, 500).await.expect("transcription event");
    match transcription {
        PipelineEvent::Transcription { text, is_final } => {
            assert_eq!(text, "hello from the reference speech recognizer");
            assert!(is_final);
        }
        other => panic!("expected transcription, got {other:?}"),
    }

    let llm_partial = recv_within(&mut out_rx, 500).await.expect("llm_response event");
    assert!(matches!(llm_partial, PipelineEvent::LlmResponse { is_final: false, .. }));

    let audio = recv_within(&mut out_rx, 500).await.expect("audio event");
    match audio {
        PipelineEvent::Audio { data, format } => {
            assert!(!data.is_empty());
            assert_eq!(format, "pcm16");
        }
        other => panic!("expected audio, got {other:?}"),
    }

    let llm_final = recv_within(&mut out_rx, 500).await.expect("final llm_response event");
    assert!(matches!(llm_final, PipelineEvent::LlmResponse { is_final: true, .. }));

    let usage = supervisor.finish(&state).expect("usage record");
    assert!(usage.stt_seconds > 0.0);
    assert!(usage.llm_input_tokens > 0);
    assert!(usage.llm_output_tokens > 0);
    assert!(usage.tts_chars > 0);
    assert!(usage.sealed);
}

/// S6-shaped: cancelling mid-call stops the execution loop from starting a
/// new turn and leaves no further events on the wire.
#[tokio::test]
async fn cancelling_session_stops_pipeline_from_emitting_further_events() {
    let state = test_state(test_config(true));
    let agent = state.config.agents.get("front_desk").cloned().unwrap();

    let (supervisor, mut out_rx) =
        CallSupervisor::start(&state, "sess-2".into(), "org-1".into(), None, "front_desk".into(), &agent, "pstn_json")
            .await
            .expect("supervisor starts");

    state.cancel_map.cancel("sess-2");

    for _ in 0..3 {
        supervisor.send_audio(vec![0i16; 160]).await.unwrap();
    }

    assert!(recv_within(&mut out_rx, 300).await.is_none(), "no events should be emitted after cancellation");

    let usage = supervisor.finish(&state);
    assert!(usage.is_some());
}

/// Barge-in disabled: an agent configured with `barge_in_enabled = false`
/// still completes turns normally (VAD/interrupt wiring doesn't block the
/// pipeline when barge-in is off).
#[tokio::test]
async fn barge_in_disabled_agent_still_completes_turns() {
    let state = test_state(test_config(false));
    let agent = state.config.agents.get("front_desk").cloned().unwrap();
    assert!(!agent.barge_in_enabled);

    let (supervisor, mut out_rx) =
        CallSupervisor::start(&state, "sess-3".into(), "org-1".into(), None, "front_desk".into(), &agent, "pstn_json")
            .await
            .expect("supervisor starts");

    for _ in 0..3 {
        supervisor.send_audio(vec![0i16; 160]).await.unwrap();
    }

    let mut saw_final_response = false;
    for _ in 0..6 {
        if let Some(PipelineEvent::LlmResponse { is_final: true, .. }) = recv_within(&mut out_rx, 500).await {
            saw_final_response = true;
            break;
        }
    }
    assert!(saw_final_response, "turn should complete even with barge-in disabled");

    supervisor.finish(&state);
}

/// S4-shaped: a second call asking the same prompt against the same role
/// hits the shared LLM cache instead of generating again.
#[tokio::test]
async fn repeat_prompt_across_sessions_hits_llm_cache() {
    let state = test_state(test_config(true));
    let agent = state.config.agents.get("front_desk").cloned().unwrap();

    let (supervisor, mut out_rx) =
        CallSupervisor::start(&state, "sess-4a".into(), "org-1".into(), None, "front_desk".into(), &agent, "pstn_json")
            .await
            .expect("supervisor starts");
    for _ in 0..3 {
        supervisor.send_audio(vec![0i16; 160]).await.unwrap();
    }
    loop {
        match recv_within(&mut out_rx, 500).await.expect("turn 1 event") {
            PipelineEvent::LlmResponse { is_final: true, .. } => break,
            _ => continue,
        }
    }
    supervisor.finish(&state);

    assert_eq!(state.llm_cache.misses(), 1);
    assert_eq!(state.llm_cache.hits(), 0);

    let (supervisor, mut out_rx) =
        CallSupervisor::start(&state, "sess-4b".into(), "org-1".into(), None, "front_desk".into(), &agent, "pstn_json")
            .await
            .expect("supervisor starts");
    for _ in 0..3 {
        supervisor.send_audio(vec![0i16; 160]).await.unwrap();
    }
    let mut saw_cached_response = false;
    loop {
        match recv_within(&mut out_rx, 500).await.expect("turn 2 event") {
            PipelineEvent::LlmResponse { is_final: true, text } => {
                assert_eq!(text, "You said: hello from the reference speech recognizer");
                saw_cached_response = true;
                break;
            }
            _ => continue,
        }
    }
    assert!(saw_cached_response);

    let usage = supervisor.finish(&state).expect("usage record");
    assert_eq!(state.llm_cache.hits(), 1, "second identical turn should hit the cache");
    assert_eq!(usage.llm_input_tokens, 0, "cache hits must not record a fresh LLM call's usage");
    assert_eq!(usage.llm_output_tokens, 0);
    assert!(usage.tts_chars > 0, "TTS still runs on a cache hit, only the LLM call is skipped");
}

/// S5-shaped: a connection that never calls `touch` is evicted by the
/// heartbeat loop once it crosses the stale timeout; a connection that
/// keeps touching stays registered.
#[tokio::test]
async fn heartbeat_evicts_stale_connections_but_not_active_ones() {
    let registry = Arc::new(ConnectionRegistry::new(10, Duration::from_millis(30), Duration::from_millis(100)));
    registry.register("stale-conn".into(), None, None, None).unwrap();
    registry.register("active-conn".into(), None, None, None).unwrap();

    let evicted = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let evicted_clone = evicted.clone();
    let heartbeat_registry = registry.clone();
    let handle = tokio::spawn(async move {
        heartbeat_registry
            .run_heartbeat(move |id| evicted_clone.lock().push(id.to_string()))
            .await;
    });

    for _ in 0..8 {
        tokio::time::sleep(Duration::from_millis(30)).await;
        registry.touch("active-conn");
    }

    registry.stop();
    let _ = tokio::time::timeout(Duration::from_millis(500), handle).await;

    assert!(evicted.lock().contains(&"stale-conn".to_string()));
    assert!(registry.get("stale-conn").is_none());
}
