// Rendered pipeline descriptions, one chain per line

use crate::common::fakes::MemoryRegistry;
use crate::common::fixtures::{ALL_ELEMENTS, aac_preset, audio_only, media, webm_preset};
use insta::assert_snapshot;
use std::path::PathBuf;
use transcast::engine::{
    AudioCodec, CapabilityBound, Crop, Locator, PipelineSpec, PixelAspectRatio, Preset,
    TranscodeError, TranscodeOptions,
};

fn render(spec: &PipelineSpec) -> String {
    spec.chains
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn test_final_webm_pass() {
    let registry = MemoryRegistry::with(ALL_ELEMENTS);
    let mut preset = webm_preset();
    let options = TranscodeOptions::new("/videos/movie.mkv", "/tmp/movie.webm");
    let locator = Locator::parse(&options.input).unwrap();

    let spec = transcast::engine::GraphBuilder::new(&registry, 4)
        .build(&media(1280, 720), &mut preset, &options, &locator, 1)
        .unwrap();

    assert_snapshot!(render(&spec), @r#"
    uridecodebin name=dmux uri="file:///videos/movie.mkv"
    webmmux name=mux ! queue ! filesink name=sink location="/tmp/movie.webm"
    dmux. ! queue ! progressreport name=progress update-freq=1 ! videoconvert ! videorate ! videoscale ! video/x-raw,width=1280,height=720 ! vp8enc multipass-mode=last-pass threads=4 ! queue ! mux.video_%u
    dmux. ! queue ! audioconvert ! audiorate tolerance=100000000 ! audioresample ! audio/x-raw,channels=2,rate=48000 ! vorbisenc quality=0.4 ! mux.audio_%u
    "#);
}

#[test]
fn test_audio_only_aac_fallback() {
    let registry = MemoryRegistry::with(ALL_ELEMENTS).remove("faac");
    let mut preset = aac_preset();
    let options = TranscodeOptions::new("/music/song.flac", "/tmp/song.mp4");
    let locator = Locator::parse(&options.input).unwrap();

    let spec = transcast::engine::GraphBuilder::new(&registry, 4)
        .build(&audio_only(), &mut preset, &options, &locator, 0)
        .unwrap();

    assert_snapshot!(render(&spec), @r#"
    uridecodebin name=dmux uri="file:///music/song.flac"
    mp4mux name=mux ! queue ! filesink name=sink location="/tmp/song.mp4"
    dmux. ! queue ! progressreport name=progress update-freq=1 ! audioconvert ! audiorate tolerance=100000000 ! audioresample ! audio/x-raw,channels=2,rate=48000 ! avenc_aac bitrate=128000 compliance=experimental ! mux.audio_%u
    "#);
}

#[test]
fn test_disc_first_pass_with_subtitles() {
    let registry = MemoryRegistry::with(ALL_ELEMENTS);
    let mut preset = aac_preset();
    let mut options = TranscodeOptions::new("dvd:///dev/sr0@3:2:a", "/tmp/disc.mp4");
    options.crop = Some(Crop::new(0, 8, 0, 8));
    options.subtitle_file = Some(PathBuf::from("/subs/movie.srt"));
    options.subtitle_charset = Some("UTF-8".to_string());
    let locator = Locator::parse(&options.input).unwrap();

    let mut info = media(720, 576);
    if let Some(video) = info.video.as_mut() {
        video.pixel_aspect_ratio = PixelAspectRatio::new(16, 15);
        video.interlaced = None;
    }

    let spec = transcast::engine::GraphBuilder::new(&registry, 2)
        .build(&info, &mut preset, &options, &locator, 0)
        .unwrap();

    assert_snapshot!(render(&spec), @r#"
    dvdreadsrc device="/dev/sr0" title=3 chapter=2 ! decodebin name=dmux
    qtmux name=mux ! queue ! filesink name=sink location="/tmp/disc.mp4"
    dmux. ! queue ! progressreport name=progress update-freq=1 ! videoconvert ! videorate ! avdeinterlace ! videocrop top=0 right=8 bottom=0 left=8 ! textoverlay name=txt font-desc="Sans Bold 16" ! videoscale ! video/x-raw,width=354,height=272 ! x264enc pass=pass1 threads=2 ! queue ! mux.video_%u
    filesrc location="/subs/movie.srt" ! subparse subtitle-encoding="UTF-8" ! txt.
    "#);
}

#[test]
fn test_description_splits_into_launch_arguments() {
    let registry = MemoryRegistry::with(ALL_ELEMENTS);
    let mut preset = webm_preset();
    let options = TranscodeOptions::new("/videos/my movie.mkv", "/tmp/my movie.webm");
    let locator = Locator::parse(&options.input).unwrap();

    let spec = transcast::engine::GraphBuilder::new(&registry, 4)
        .build(&media(1280, 720), &mut preset, &options, &locator, 0)
        .unwrap();
    let args = spec.to_args().unwrap();

    assert!(args.contains(&"uri=file:///videos/my movie.mkv".to_string()));
    assert!(args.contains(&"location=/tmp/my movie.webm".to_string()));
    assert_eq!(args.iter().filter(|a| *a == "!").count(), 11);
}

#[test]
fn test_audio_only_without_container_feeds_sink() {
    let registry = MemoryRegistry::with(ALL_ELEMENTS).add("lamemp3enc");
    let mut preset = Preset {
        name: "MP3".to_string(),
        extension: "mp3".to_string(),
        acodec: AudioCodec {
            name: "lamemp3enc".to_string(),
            rate: CapabilityBound::range(8000, 48000),
            channels: CapabilityBound::range(1, 2),
            passes: vec!["target=bitrate bitrate=192".to_string()],
            ..AudioCodec::default()
        },
        ..Preset::default()
    };
    let options = TranscodeOptions::new("/music/song.flac", "/tmp/song.mp3");
    let locator = Locator::parse(&options.input).unwrap();

    let spec = transcast::engine::GraphBuilder::new(&registry, 4)
        .build(&audio_only(), &mut preset, &options, &locator, 0)
        .unwrap();

    assert!(spec.element("mux").is_none());
    assert_snapshot!(render(&spec), @r#"
    uridecodebin name=dmux uri="file:///music/song.flac"
    filesink name=sink location="/tmp/song.mp3"
    dmux. ! queue ! progressreport name=progress update-freq=1 ! audioconvert ! audiorate tolerance=100000000 ! audioresample ! audio/x-raw,channels=2,rate=48000 ! lamemp3enc target=bitrate bitrate=192 ! sink.
    "#);
}

#[test]
fn test_embedded_ssa_subtitles() {
    let registry = MemoryRegistry::with(ALL_ELEMENTS);
    let mut preset = webm_preset();
    let mut options = TranscodeOptions::new("/videos/movie.mkv", "/tmp/movie.webm");
    options.ssa = true;
    let locator = Locator::parse(&options.input).unwrap();

    let spec = transcast::engine::GraphBuilder::new(&registry, 4)
        .build(&media(1280, 720), &mut preset, &options, &locator, 0)
        .unwrap();

    assert_snapshot!(render(&spec), @r#"
    uridecodebin name=dmux uri="file:///videos/movie.mkv"
    webmmux name=mux ! queue ! filesink name=sink location="/tmp/movie.webm"
    dmux. ! queue ! progressreport name=progress update-freq=1 ! videoconvert ! videorate ! textoverlay name=txt font-desc="Sans Bold 16" ! videoscale ! video/x-raw,width=1280,height=720 ! vp8enc multipass-mode=first-pass threads=4 ! queue ! mux.video_%u
    filesrc location="/videos/movie.mkv" ! matroskademux name=demux ! ssaparse ! txt.
    "#);
}

#[test]
fn test_embedded_ssa_needs_local_file() {
    let registry = MemoryRegistry::with(ALL_ELEMENTS);
    let mut preset = webm_preset();
    let mut options = TranscodeOptions::new("http://example.com/movie.mkv", "/tmp/movie.webm");
    options.ssa = true;
    let locator = Locator::parse(&options.input).unwrap();

    let err = transcast::engine::GraphBuilder::new(&registry, 4)
        .build(&media(1280, 720), &mut preset, &options, &locator, 0)
        .unwrap_err();
    assert!(
        matches!(err, TranscodeError::PipelineConstruction(ref m) if m.contains("local Matroska file")),
        "got: {}",
        err
    );
}
