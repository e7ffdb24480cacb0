//! Media descriptions and presets shared by the integration tests

use std::time::Duration;
use transcast::engine::{
    AudioCodec, AudioStreamInfo, CapabilityBound, DimensionBound, MediaInfo, PixelAspectRatio,
    Preset, TranscoderSettings, VideoCodec, VideoStreamInfo,
};

pub fn video_stream(width: u32, height: u32) -> VideoStreamInfo {
    VideoStreamInfo {
        width,
        height,
        pixel_aspect_ratio: PixelAspectRatio::SQUARE,
        interlaced: Some(false),
    }
}

pub fn stereo_audio() -> AudioStreamInfo {
    AudioStreamInfo {
        channels: 2,
        depth: 16,
        sample_rate: 48000,
    }
}

pub fn media(width: u32, height: u32) -> MediaInfo {
    MediaInfo {
        locator: "file:///videos/movie.mkv".to_string(),
        duration: Some(Duration::from_secs(100)),
        video: Some(video_stream(width, height)),
        audio: Some(stereo_audio()),
    }
}

pub fn audio_only() -> MediaInfo {
    MediaInfo {
        locator: "file:///music/song.flac".to_string(),
        duration: Some(Duration::from_secs(240)),
        video: None,
        audio: Some(stereo_audio()),
    }
}

/// Two video passes, one audio pass, WebM output
pub fn webm_preset() -> Preset {
    Preset {
        name: "WebM".to_string(),
        container: "webmmux".to_string(),
        extension: "webm".to_string(),
        acodec: AudioCodec {
            name: "vorbisenc".to_string(),
            container: "oggmux".to_string(),
            rate: CapabilityBound::range(8000, 48000),
            passes: vec!["quality=0.4".to_string()],
            channels: CapabilityBound::range(1, 2),
            ..AudioCodec::default()
        },
        vcodec: VideoCodec {
            name: "vp8enc".to_string(),
            container: "webmmux".to_string(),
            passes: vec![
                "multipass-mode=first-pass threads=%(threads)s".to_string(),
                "multipass-mode=last-pass threads=%(threads)s".to_string(),
            ],
            width: DimensionBound::new(320, 1280),
            height: DimensionBound::new(240, 720),
            ..VideoCodec::default()
        },
        ..Preset::default()
    }
}

/// Legacy AAC audio in MP4
pub fn aac_preset() -> Preset {
    Preset {
        name: "Normal".to_string(),
        container: "qtmux".to_string(),
        extension: "mp4".to_string(),
        acodec: AudioCodec {
            name: "faac".to_string(),
            container: "qtmux".to_string(),
            passes: vec!["bitrate=128000 profile=2".to_string()],
            ..AudioCodec::default()
        },
        vcodec: VideoCodec {
            name: "x264enc".to_string(),
            container: "qtmux".to_string(),
            passes: vec![
                "pass=pass1 threads=%(threads)s".to_string(),
                "pass=pass2 threads=%(threads)s".to_string(),
            ],
            width: DimensionBound::new(320, 480),
            height: DimensionBound::new(240, 272),
            ..VideoCodec::default()
        },
        ..Preset::default()
    }
}

pub fn settings() -> TranscoderSettings {
    TranscoderSettings {
        threads: 4,
        stall_timeout: Duration::from_secs(5),
        pipeline_log: false,
    }
}

/// Every element the fixture presets and the graph builder use
pub const ALL_ELEMENTS: &[&str] = &[
    "webmmux", "oggmux", "qtmux", "mp4mux", "vorbisenc", "vp8enc", "x264enc", "avenc_aac",
    "faac", "uridecodebin", "decodebin", "dvdreadsrc", "queue", "filesink", "videoconvert",
    "videorate", "videoscale", "videobox", "audioconvert", "audiorate", "audioresample",
];
