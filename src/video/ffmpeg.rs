//! Video decoding through the `ffprobe`/`ffmpeg` executables on `PATH`.

use std::{
    io::{ErrorKind, Read},
    path::{Path, PathBuf},
    process::{Child, ChildStdout, Command, Stdio},
    sync::{Arc, Mutex, PoisonError},
    thread::JoinHandle,
};

use image::RgbaImage;
use log::{debug, info, warn};

use crate::{
    resources::asset_path,
    settings::VideoSettings,
    video::{FrameSource, VideoError, VideoFeed, VideoResult},
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps_num: u32,
    pub fps_den: u32,
}

/// A looping video decoded by a child `ffmpeg` process.
///
/// [`FrameSource::play`] only starts a `video-decode` thread; locating,
/// probing and spawning the decoder all happen there. Frames arrive as raw
/// RGBA on the child's stdout and are pushed into the feed. The child is
/// killed when this value is dropped.
#[derive(Debug)]
pub struct FfmpegVideo {
    settings: VideoSettings,
    feed: VideoFeed,
    probe: fn(&Path) -> VideoResult<VideoInfo>,
    decoder: Arc<Mutex<Decoder>>,
    reader: Option<JoinHandle<()>>,
}

#[derive(Debug, Default)]
struct Decoder {
    stopped: bool,
    child: Option<Child>,
}

impl FfmpegVideo {
    pub fn new(settings: VideoSettings) -> Self {
        Self {
            settings,
            feed: VideoFeed::new(),
            probe: probe_video,
            decoder: Arc::default(),
            reader: None,
        }
    }
}

fn spawn_decoder(settings: &VideoSettings, path: &Path) -> VideoResult<Child> {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-hide_banner", "-loglevel", "error", "-nostdin"]);
    if settings.looping {
        cmd.args(["-stream_loop", "-1"]);
    }
    // Pace output at the native frame rate instead of decoding flat out.
    cmd.arg("-re").arg("-i").arg(path);
    if settings.muted {
        cmd.arg("-an");
    }
    cmd.args(["-f", "rawvideo", "-pix_fmt", "rgba", "pipe:1"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());
    cmd.spawn().map_err(VideoError::DecoderSpawn)
}

/// Body of the `video-decode` thread. Returns early, without a decoder, when
/// the video was dropped while probing.
fn decode(
    settings: VideoSettings,
    probe: fn(&Path) -> VideoResult<VideoInfo>,
    decoder: &Mutex<Decoder>,
    feed: VideoFeed,
) -> VideoResult<()> {
    let path = asset_path(settings.source)?;
    let info = probe(&path)?;

    let stdout = {
        let mut decoder = decoder.lock().unwrap_or_else(PoisonError::into_inner);
        if decoder.stopped {
            return Ok(());
        }
        let mut child = spawn_decoder(&settings, &path)?;
        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            return Err(VideoError::DecoderSpawn(std::io::Error::other(
                "ffmpeg stdout was not captured",
            )));
        };
        decoder.child = Some(child);
        stdout
    };
    info!(
        "Playing {} ({}x{} @ {}/{} fps).",
        path.display(),
        info.width,
        info.height,
        info.fps_num,
        info.fps_den
    );
    read_frames(stdout, info, feed);
    Ok(())
}

impl FrameSource for FfmpegVideo {
    fn play(&mut self) -> VideoResult<()> {
        if self.reader.is_some() {
            return Ok(());
        }
        let settings = self.settings;
        let probe = self.probe;
        let decoder = self.decoder.clone();
        let feed = self.feed.clone();
        let reader = std::thread::Builder::new()
            .name("video-decode".into())
            .spawn(move || {
                if let Err(e) = decode(settings, probe, &decoder, feed) {
                    warn!("Emitter video could not start, the screen stays blank: {e}");
                }
            })
            .map_err(VideoError::DecoderSpawn)?;
        self.reader = Some(reader);
        Ok(())
    }

    fn feed(&self) -> VideoFeed {
        self.feed.clone()
    }
}

impl Drop for FfmpegVideo {
    fn drop(&mut self) {
        let child = {
            let mut decoder = self.decoder.lock().unwrap_or_else(PoisonError::into_inner);
            decoder.stopped = true;
            decoder.child.take()
        };
        let Some(mut child) = child else {
            // Still probing; the thread sees `stopped` and exits on its own.
            return;
        };
        if let Err(e) = child.kill() {
            debug!("ffmpeg already exited: {e}");
        }
        let _ = child.wait();
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                warn!("Video reader thread panicked.");
            }
        }
    }
}

fn read_frames(mut stdout: ChildStdout, info: VideoInfo, feed: VideoFeed) {
    let frame_len = info.width as usize * info.height as usize * 4;
    let mut buf = vec![0u8; frame_len];
    loop {
        match stdout.read_exact(&mut buf) {
            Ok(()) => match RgbaImage::from_raw(info.width, info.height, buf.clone()) {
                Some(frame) => feed.push(frame),
                None => {
                    warn!("Decoded frame does not match {}x{}.", info.width, info.height);
                    return;
                }
            },
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                debug!("Video stream ended.");
                return;
            }
            Err(e) => {
                warn!("Video stream read failed: {e}");
                return;
            }
        }
    }
}

pub fn probe_video(source_path: &Path) -> VideoResult<VideoInfo> {
    let out = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(source_path)
        .output()
        .map_err(VideoError::ProbeSpawn)?;
    if !out.status.success() {
        return Err(VideoError::ProbeFailed {
            path: PathBuf::from(source_path),
            stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
        });
    }
    parse_probe(&out.stdout)
}

pub(crate) fn parse_probe(json: &[u8]) -> VideoResult<VideoInfo> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        r_frame_rate: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
    }

    let parsed: ProbeOut = serde_json::from_slice(json)?;
    let stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or(VideoError::NoVideoStream)?;
    let width = stream
        .width
        .filter(|w| *w > 0)
        .ok_or(VideoError::MissingDimension("width"))?;
    let height = stream
        .height
        .filter(|h| *h > 0)
        .ok_or(VideoError::MissingDimension("height"))?;
    // Pacing is left to ffmpeg, so an unreadable rate is only informational.
    let (fps_num, fps_den) = stream
        .r_frame_rate
        .as_deref()
        .and_then(parse_ff_ratio)
        .unwrap_or((0, 1));

    Ok(VideoInfo {
        width,
        height,
        fps_num,
        fps_den,
    })
}

fn parse_ff_ratio(s: &str) -> Option<(u32, u32)> {
    let (a, b) = s.split_once('/')?;
    let a = a.parse::<u32>().ok()?;
    let b = b.parse::<u32>().ok()?;
    if b == 0 {
        return None;
    }
    Some((a, b))
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    #[test]
    fn probe_picks_the_video_stream() {
        let json = br#"{
            "streams": [
                {"codec_type": "audio"},
                {"codec_type": "video", "width": 1280, "height": 720, "r_frame_rate": "30000/1001"}
            ],
            "format": {"duration": "12.5"}
        }"#;

        let info = parse_probe(json).unwrap();

        assert_eq!(
            info,
            VideoInfo {
                width: 1280,
                height: 720,
                fps_num: 30000,
                fps_den: 1001
            }
        );
    }

    #[test]
    fn probe_without_video_is_an_error() {
        let json = br#"{"streams": [{"codec_type": "audio"}]}"#;
        assert!(matches!(parse_probe(json), Err(VideoError::NoVideoStream)));
        assert!(matches!(
            parse_probe(b"not json"),
            Err(VideoError::ProbeOutput(_))
        ));
    }

    #[test]
    fn zero_sized_stream_is_rejected() {
        let json = br#"{"streams": [{"codec_type": "video", "width": 0, "height": 4}]}"#;
        assert!(matches!(
            parse_probe(json),
            Err(VideoError::MissingDimension("width"))
        ));
    }

    #[test]
    fn ratios_reject_zero_denominators() {
        assert_eq!(parse_ff_ratio("25/1"), Some((25, 1)));
        assert_eq!(parse_ff_ratio("25/0"), None);
        assert_eq!(parse_ff_ratio("25"), None);
    }

    #[test]
    fn missing_asset_leaves_the_feed_blank() {
        let mut video = FfmpegVideo::new(VideoSettings {
            source: "does-not-exist.mp4",
            looping: true,
            muted: true,
        });

        assert!(video.play().is_ok());
        let reader = video.reader.take().unwrap();
        reader.join().unwrap();
        assert_eq!(video.feed().generation(), 0);
        assert!(video.decoder.lock().unwrap().child.is_none());
    }

    #[test]
    fn play_does_not_wait_for_the_probe() {
        fn slow_probe(_: &Path) -> VideoResult<VideoInfo> {
            std::thread::sleep(Duration::from_secs(2));
            Err(VideoError::NoVideoStream)
        }
        let mut video = FfmpegVideo::new(VideoSettings {
            source: "README.md",
            looping: true,
            muted: true,
        });
        video.probe = slow_probe;

        let started = Instant::now();
        video.play().unwrap();
        assert!(started.elapsed() < Duration::from_millis(500));

        // Dropping while the probe is still running does not block either.
        let started = Instant::now();
        drop(video);
        assert!(started.elapsed() < Duration::from_millis(500));
    }
}
