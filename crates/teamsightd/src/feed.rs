//! Replay frame source and detector.
//!
//! Reads a JSON-lines manifest, one frame per line:
//!
//! ```text
//! {"image": "frames/0001.png", "detections": [{"confidence": 0.9, "left": 0.3, "top": 0.1, "right": 0.6, "bottom": 0.4}]}
//! {"width": 640, "height": 480, "fill": [20, 40, 200], "detections": []}
//! ```
//!
//! Image paths are relative to the manifest. Lines without an image
//! synthesize a solid frame.

use chrono::{DateTime, Utc};
use image::RgbImage;
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use teamsight_core::frame::FrameError;
use teamsight_core::{Detection, Detector, Frame, FrameSource};
use thiserror::Error;

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("cannot read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("manifest line {line}: {source}")]
    Json {
        line: usize,
        source: serde_json::Error,
    },
    #[error("cannot load frame image {path}: {source}")]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },
}

#[derive(Debug, Deserialize)]
struct ManifestLine {
    image: Option<PathBuf>,
    width: Option<u32>,
    height: Option<u32>,
    fill: Option<[u8; 3]>,
    timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    detections: Vec<Detection>,
}

/// How to produce the pixels of one frame.
#[derive(Debug, Clone)]
enum FrameContent {
    File(PathBuf),
    Solid {
        width: u32,
        height: u32,
        fill: [u8; 3],
    },
}

#[derive(Debug, Clone)]
struct PendingFrame {
    content: FrameContent,
    timestamp: Option<DateTime<Utc>>,
}

/// Frames from a replay manifest, in file order.
pub struct ReplaySource {
    frames: VecDeque<PendingFrame>,
    next_sequence: u64,
}

/// Detections recorded alongside each replayed frame.
pub struct ReplayDetector {
    detections: HashMap<u64, Vec<Detection>>,
}

/// Load a manifest file into a matched source/detector pair.
pub fn load_manifest(path: &Path) -> Result<(ReplaySource, ReplayDetector), FeedError> {
    let text = std::fs::read_to_string(path).map_err(|source| FeedError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let feed = parse_manifest(&text, base)?;
    tracing::info!(
        path = %path.display(),
        frames = feed.0.frames.len(),
        "replay manifest loaded"
    );
    Ok(feed)
}

/// Parse manifest text; relative image paths resolve against `base`.
pub fn parse_manifest(text: &str, base: &Path) -> Result<(ReplaySource, ReplayDetector), FeedError> {
    let mut frames = VecDeque::new();
    let mut detections = HashMap::new();

    let lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());
    for (sequence, (index, line)) in lines.enumerate() {
        let entry: ManifestLine = serde_json::from_str(line).map_err(|source| FeedError::Json {
            line: index + 1,
            source,
        })?;

        let content = match entry.image {
            Some(image) => FrameContent::File(base.join(image)),
            None => FrameContent::Solid {
                width: entry.width.unwrap_or(DEFAULT_WIDTH),
                height: entry.height.unwrap_or(DEFAULT_HEIGHT),
                fill: entry.fill.unwrap_or([0, 0, 0]),
            },
        };
        frames.push_back(PendingFrame {
            content,
            timestamp: entry.timestamp,
        });
        detections.insert(sequence as u64, entry.detections);
    }

    Ok((
        ReplaySource {
            frames,
            next_sequence: 0,
        },
        ReplayDetector { detections },
    ))
}

impl FrameContent {
    fn render(&self) -> Result<RgbImage, FeedError> {
        match self {
            FrameContent::File(path) => image::open(path)
                .map(|img| img.to_rgb8())
                .map_err(|source| FeedError::Image {
                    path: path.clone(),
                    source,
                }),
            FrameContent::Solid { width, height, fill } => {
                Ok(RgbImage::from_pixel(*width, *height, image::Rgb(*fill)))
            }
        }
    }
}

impl FrameSource for ReplaySource {
    fn next_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        let Some(pending) = self.frames.pop_front() else {
            return Ok(None);
        };
        let image = pending
            .content
            .render()
            .map_err(|e| FrameError::Source(e.to_string()))?;

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        Ok(Some(Frame {
            image,
            sequence,
            captured_at: pending.timestamp.unwrap_or_else(Utc::now),
        }))
    }
}

impl Detector for ReplayDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, FrameError> {
        Ok(self.detections.remove(&frame.sequence).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
{"width": 32, "height": 24, "fill": [20, 30, 210], "timestamp": "2024-02-01T10:00:00Z", "detections": [{"confidence": 0.9, "left": 0.1, "top": 0.1, "right": 0.5, "bottom": 0.5}]}

{"width": 32, "height": 24}
"#;

    #[test]
    fn test_parse_and_replay() {
        let (mut source, mut detector) = parse_manifest(MANIFEST, Path::new(".")).unwrap();

        let first = source.next_frame().unwrap().unwrap();
        assert_eq!(first.sequence, 0);
        assert_eq!((first.width(), first.height()), (32, 24));
        assert_eq!(first.image.get_pixel(5, 5).0, [20, 30, 210]);
        assert_eq!(first.captured_at.to_rfc3339(), "2024-02-01T10:00:00+00:00");
        let dets = detector.detect(&first).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].confidence, 0.9);

        let second = source.next_frame().unwrap().unwrap();
        assert_eq!(second.sequence, 1);
        assert_eq!(second.image.get_pixel(0, 0).0, [0, 0, 0]);
        assert!(detector.detect(&second).unwrap().is_empty());

        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_default_frame_size() {
        let (mut source, _) = parse_manifest("{}", Path::new(".")).unwrap();
        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!((frame.width(), frame.height()), (640, 480));
    }

    #[test]
    fn test_bad_line_reports_line_number() {
        let text = "{}\n{\"detections\": 5}\n";
        match parse_manifest(text, Path::new(".")) {
            Err(FeedError::Json { line, .. }) => assert_eq!(line, 2),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected parse failure"),
        }
    }

    #[test]
    fn test_image_frames_resolve_relative_to_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let img = RgbImage::from_pixel(8, 6, image::Rgb([200, 10, 10]));
        img.save(dir.path().join("f0.png")).unwrap();
        let manifest = dir.path().join("frames.jsonl");
        std::fs::write(&manifest, "{\"image\": \"f0.png\"}\n").unwrap();

        let (mut source, _) = load_manifest(&manifest).unwrap();
        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!((frame.width(), frame.height()), (8, 6));
        assert_eq!(frame.image.get_pixel(3, 3).0, [200, 10, 10]);
    }

    #[test]
    fn test_missing_image_is_source_error() {
        let (mut source, _) =
            parse_manifest("{\"image\": \"nope.png\"}", Path::new("/nonexistent")).unwrap();
        assert!(matches!(source.next_frame(), Err(FrameError::Source(_))));
    }

    #[test]
    fn test_missing_manifest() {
        let err = load_manifest(Path::new("/nonexistent/frames.jsonl")).err().unwrap();
        assert!(matches!(err, FeedError::Io { .. }));
    }
}
