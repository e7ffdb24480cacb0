// End-to-end job behaviour against the recording engine

use crate::common::fakes::{MemoryRegistry, RecordingEngine};
use crate::common::fixtures::{ALL_ELEMENTS, aac_preset, audio_only, media, settings, webm_preset};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};
use transcast::engine::{
    BusMessage, CapabilityBound, CapsStructure, EngineEvent, GraphBuilder, JobStatus, Locator,
    Notification, Preset, TranscodeError, TranscodeOptions, Transcoder,
};

type TestTranscoder = Transcoder<RecordingEngine, MemoryRegistry>;

fn transcoder(preset: &Preset, registry: MemoryRegistry) -> (TestTranscoder, RecordingEngine, Receiver<Notification>) {
    let engine = RecordingEngine::new();
    let (tx, rx) = mpsc::channel();
    let transcoder = Transcoder::new(
        engine.clone(),
        registry,
        preset,
        TranscodeOptions::new("/videos/movie.mkv", "/tmp/movie.webm"),
        settings(),
        tx,
    )
    .unwrap();
    (transcoder, engine, rx)
}

#[test]
fn test_wide_source_is_scaled_to_max_width() {
    let (mut t, engine, _rx) = transcoder(&webm_preset(), MemoryRegistry::with(ALL_ELEMENTS));
    t.discovered(media(1920, 800)).unwrap();

    let spec = engine.latest_spec().to_string();
    assert!(
        spec.contains("video/x-raw,width=1280,height=534"),
        "unexpected pipeline: {}",
        spec
    );
    assert!(!engine.latest_spec().has_factory("videobox"));
}

#[test]
fn test_two_video_passes_one_audio_pass() {
    let (mut t, engine, rx) = transcoder(&webm_preset(), MemoryRegistry::with(ALL_ELEMENTS));
    t.discovered(media(1280, 720)).unwrap();
    assert_eq!(t.pass_state().total_passes, 2);
    assert_eq!(t.status_kind(), &JobStatus::Running);

    let first = engine.spec(0);
    assert!(first.has_factory("vp8enc"));
    assert!(!first.has_factory("vorbisenc"));
    let vp8 = first.elements().find(|e| e.factory == "vp8enc").unwrap();
    assert_eq!(vp8.properties.get("multipass-mode"), Some("first-pass"));
    assert_eq!(vp8.properties.get("threads"), Some("4"));

    engine.post_latest(EngineEvent::EndOfStream);
    assert!(!t.pump().unwrap());
    assert_eq!(t.pass_state().current_pass, 1);

    let second = engine.spec(1);
    assert!(second.has_factory("vp8enc"));
    assert!(second.has_factory("vorbisenc"));

    engine.post_latest(EngineEvent::EndOfStream);
    assert!(t.pump().unwrap());
    assert_eq!(t.status_kind(), &JobStatus::Complete);

    let notifications: Vec<Notification> = rx.try_iter().collect();
    let completes: Vec<usize> = notifications
        .iter()
        .filter_map(|n| match n {
            Notification::PassComplete { pass, .. } => Some(*pass),
            _ => None,
        })
        .collect();
    assert_eq!(completes, vec![0, 1]);
    assert_eq!(notifications.last(), Some(&Notification::Message(EngineEvent::EndOfStream)));
    let complete_at = notifications.iter().position(|n| *n == Notification::Complete).unwrap();
    let last_pass_at = notifications
        .iter()
        .rposition(|n| matches!(n, Notification::PassComplete { .. }))
        .unwrap();
    assert!(complete_at > last_pass_at);
}

#[test]
fn test_missing_legacy_aac_falls_back() {
    let registry = MemoryRegistry::with(ALL_ELEMENTS).remove("faac");
    let mut preset = aac_preset();
    let info = audio_only();
    let options = TranscodeOptions::new("/music/song.flac", "/tmp/song.mp4");
    let locator = Locator::parse(&options.input).unwrap();

    let spec = GraphBuilder::new(&registry, 2)
        .build(&info, &mut preset, &options, &locator, 0)
        .unwrap();

    assert_eq!(preset.acodec.name, "avenc_aac");
    assert_eq!(preset.acodec.container, "mp4mux");
    assert!(preset.acodec.passes.iter().all(|p| !p.contains("profile")));
    assert_eq!(preset.acodec.passes, vec!["bitrate=128000 compliance=experimental"]);

    assert!(spec.has_factory("mp4mux"));
    assert!(spec.has_factory("avenc_aac"));
    assert!(!spec.has_factory("faac"));
}

#[test]
fn test_fallback_stays_in_the_job_copy() {
    let registry = MemoryRegistry::with(ALL_ELEMENTS).remove("faac");
    let preset = aac_preset();
    let (mut t, _engine, _rx) = transcoder(&preset, registry);
    t.discovered(media(720, 480)).unwrap();

    assert_eq!(t.preset().acodec.name, "avenc_aac");
    assert_eq!(preset.acodec.name, "faac");
}

#[test]
fn test_missing_audio_encoder_without_fallback_fails() {
    let registry = MemoryRegistry::with(ALL_ELEMENTS).remove("vorbisenc");
    let (mut t, engine, rx) = transcoder(&webm_preset(), registry);

    let err = t.discovered(audio_only()).unwrap_err();
    assert!(matches!(err, TranscodeError::PipelineConstruction(_)));
    assert_eq!(engine.launched(), 0);
    assert!(matches!(t.status_kind(), JobStatus::Failed(_)));

    let errors = rx.try_iter().filter(|n| matches!(n, Notification::Error(_))).count();
    assert_eq!(errors, 1);
}

#[test]
fn test_stalled_pass_gets_one_eos_request() {
    let (mut t, engine, _rx) = transcoder(&webm_preset(), MemoryRegistry::with(ALL_ELEMENTS));
    t.discovered(media(1280, 720)).unwrap();
    engine.set_position(Duration::from_secs(42));

    let now = Instant::now();
    let status = t.status_at(now).unwrap();
    assert!((status.fraction - 0.42).abs() < 1e-9);
    assert_eq!(engine.eos_requests(), 0);

    let status = t.status_at(now + Duration::from_secs(6)).unwrap();
    assert!((status.fraction - 0.42).abs() < 1e-9);
    assert_eq!(engine.eos_requests(), 1);

    t.status_at(now + Duration::from_secs(7)).unwrap();
    assert_eq!(engine.eos_requests(), 1);
}

#[test]
fn test_paused_job_is_not_finished_by_stall_check() {
    let (mut t, engine, _rx) = transcoder(&webm_preset(), MemoryRegistry::with(ALL_ELEMENTS));
    t.discovered(media(1280, 720)).unwrap();
    engine.set_position(Duration::from_secs(42));

    let now = Instant::now();
    t.status_at(now).unwrap();
    t.pause().unwrap();

    let status = t.status_at(now + Duration::from_secs(60)).unwrap();
    assert!((status.fraction - 0.42).abs() < 1e-9);
    assert_eq!(t.status_kind(), &JobStatus::Paused);
    assert_eq!(engine.eos_requests(), 0);

    // The paused minute does not count once the job runs again
    t.start().unwrap();
    t.status_at(now + Duration::from_secs(61)).unwrap();
    assert_eq!(engine.eos_requests(), 0);

    t.status_at(now + Duration::from_secs(67)).unwrap();
    assert_eq!(engine.eos_requests(), 1);
}

#[test]
fn test_status_unavailable_before_position() {
    let (mut t, _engine, _rx) = transcoder(&webm_preset(), MemoryRegistry::with(ALL_ELEMENTS));
    t.discovered(media(1280, 720)).unwrap();
    assert!(matches!(t.status(), Err(TranscodeError::StatusUnavailable(_))));
}

#[test]
fn test_events_from_old_generation_are_ignored() {
    let (mut t, engine, rx) = transcoder(&webm_preset(), MemoryRegistry::with(ALL_ELEMENTS));
    t.discovered(media(1280, 720)).unwrap();
    engine.post(0, EngineEvent::EndOfStream);
    t.pump().unwrap();
    assert_eq!(t.pass_state().current_pass, 1);

    // A late end-of-stream from pass 0 must not finish pass 1
    engine.post(0, EngineEvent::EndOfStream);
    engine.post(0, EngineEvent::Error("late".into()));
    t.pump().unwrap();
    assert_eq!(t.pass_state().current_pass, 1);
    assert_eq!(t.status_kind(), &JobStatus::Running);
    assert_eq!(engine.launched(), 2);
    assert!(!rx.try_iter().any(|n| matches!(n, Notification::Error(_))));
}

#[test]
fn test_handle_message_checks_generation() {
    let (mut t, engine, _rx) = transcoder(&webm_preset(), MemoryRegistry::with(ALL_ELEMENTS));
    t.discovered(media(1280, 720)).unwrap();

    t.handle_message(BusMessage {
        generation: 99,
        event: EngineEvent::EndOfStream,
    })
    .unwrap();
    assert_eq!(t.pass_state().current_pass, 0);
    assert_eq!(engine.launched(), 1);
}

#[test]
fn test_engine_error_is_reported_once() {
    let (mut t, engine, rx) = transcoder(&webm_preset(), MemoryRegistry::with(ALL_ELEMENTS));
    t.discovered(media(1280, 720)).unwrap();

    engine.post_latest(EngineEvent::Error("decoder exploded".into()));
    engine.post_latest(EngineEvent::Error("and again".into()));
    let err = t.pump().unwrap_err();
    assert!(matches!(err, TranscodeError::EngineRuntime(ref r) if r == "decoder exploded"));
    assert_eq!(t.status_kind(), &JobStatus::Failed("decoder exploded".into()));

    // Anything still queued is stale once the job failed
    let _ = t.pump();

    let errors: Vec<String> = rx
        .try_iter()
        .filter_map(|n| match n {
            Notification::Error(reason) => Some(reason),
            _ => None,
        })
        .collect();
    assert_eq!(errors, vec!["decoder exploded".to_string()]);
    assert!(engine.calls().contains(&"shutdown 0".to_string()));
}

#[test]
fn test_stop_then_restart_runs_from_first_pass() {
    let (mut t, engine, _rx) = transcoder(&webm_preset(), MemoryRegistry::with(ALL_ELEMENTS));
    t.discovered(media(1280, 720)).unwrap();
    engine.post_latest(EngineEvent::EndOfStream);
    t.pump().unwrap();
    assert_eq!(t.pass_state().current_pass, 1);

    t.stop();
    assert_eq!(t.status_kind(), &JobStatus::Stopped);
    assert!(engine.calls().contains(&"shutdown 1".to_string()));

    // Stopped jobs ignore the pipeline they left behind
    engine.post(1, EngineEvent::EndOfStream);
    t.pump().unwrap();
    assert_eq!(t.status_kind(), &JobStatus::Stopped);

    t.restart().unwrap();
    assert_eq!(t.pass_state().current_pass, 0);
    assert_eq!(t.status_kind(), &JobStatus::Running);
    assert_eq!(engine.launched(), 3);
    assert!(!engine.spec(2).has_factory("vorbisenc"));
}

#[test]
fn test_pause_and_resume() {
    let (mut t, engine, _rx) = transcoder(&webm_preset(), MemoryRegistry::with(ALL_ELEMENTS));
    t.discovered(media(1280, 720)).unwrap();

    t.pause().unwrap();
    assert_eq!(t.status_kind(), &JobStatus::Paused);
    t.start().unwrap();
    assert_eq!(t.status_kind(), &JobStatus::Running);
    assert_eq!(engine.calls(), vec!["launch 0", "play 0", "pause 0", "play 0"]);
}

#[test]
fn test_unusable_input_fails_without_pipeline() {
    let (mut t, engine, rx) = transcoder(&webm_preset(), MemoryRegistry::with(ALL_ELEMENTS));
    let mut info = media(1280, 720);
    info.video = None;
    info.audio = None;

    assert!(t.discovered(info).is_err());
    assert_eq!(engine.launched(), 0);
    let notifications: Vec<Notification> = rx.try_iter().collect();
    assert!(matches!(
        notifications.first(),
        Some(Notification::Discovered { is_media: false, .. })
    ));
    assert_eq!(
        notifications.iter().filter(|n| matches!(n, Notification::Error(_))).count(),
        1
    );
}

#[test]
fn test_run_drives_job_to_completion() {
    let engine = RecordingEngine::finishing();
    let (tx, rx) = mpsc::channel();
    let mut t = Transcoder::new(
        engine.clone(),
        MemoryRegistry::with(ALL_ELEMENTS),
        &webm_preset(),
        TranscodeOptions::new("/videos/movie.mkv", "/tmp/movie.webm"),
        settings(),
        tx,
    )
    .unwrap();
    t.discovered(media(640, 360)).unwrap();

    let status = t.run(Duration::from_millis(10), |_| {}).unwrap();
    assert_eq!(status, JobStatus::Complete);
    assert_eq!(engine.launched(), 2);
    assert!(rx.try_iter().any(|n| n == Notification::Complete));
}

#[test]
fn test_encoder_caps_clamp_frame_size() {
    let registry = MemoryRegistry::with(ALL_ELEMENTS).with_caps(
        "vp8enc",
        vec![
            CapsStructure::new("video/x-raw")
                .with_field("width", CapabilityBound::range(16, 1024))
                .with_field("height", CapabilityBound::range(16, 576)),
        ],
    );
    let (mut t, engine, _rx) = transcoder(&webm_preset(), registry);
    t.discovered(media(1920, 1080)).unwrap();

    let spec = engine.latest_spec().to_string();
    assert!(spec.contains("video/x-raw,width=1024,height=576"), "unexpected pipeline: {}", spec);
    assert_eq!(t.preset().vcodec.width.max, 1024);
    assert_eq!(t.preset().vcodec.height.max, 576);
    assert_eq!(webm_preset().vcodec.width.max, 1280);
}

#[test]
fn test_encoder_caps_widen_audio_channels() {
    let mut surround = audio_only();
    if let Some(audio) = surround.audio.as_mut() {
        audio.channels = 6;
    }

    let registry = MemoryRegistry::with(ALL_ELEMENTS).with_caps(
        "vorbisenc",
        vec![
            CapsStructure::new("audio/x-raw")
                .with_field("channels", CapabilityBound::range(1, 8))
                .with_field("rate", CapabilityBound::range(1, 200000)),
        ],
    );
    let (mut t, engine, _rx) = transcoder(&webm_preset(), registry);
    t.discovered(surround.clone()).unwrap();
    assert!(engine.latest_spec().to_string().contains("audio/x-raw,channels=6,rate=48000"));
    assert_eq!(t.preset().acodec.channels, CapabilityBound::range(1, 8));

    // Without reported caps the declared bound stands
    let (mut t, engine, _rx) = transcoder(&webm_preset(), MemoryRegistry::with(ALL_ELEMENTS));
    t.discovered(surround).unwrap();
    assert!(engine.latest_spec().to_string().contains("audio/x-raw,channels=2,rate=48000"));
}
