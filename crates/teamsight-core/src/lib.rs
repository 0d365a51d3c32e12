//! teamsight-core: Presence sessions from per-frame person detections.
//!
//! Normalizes detector boxes, classifies the dominant shirt colors below
//! each face, infers a team label from them, and debounces the per-frame
//! "anyone here?" signal into session arrivals and departures.

pub mod color;
pub mod frame;
pub mod geometry;
pub mod presence;
pub mod quantizer;
pub mod sync;
pub mod team;
pub mod types;

pub use frame::{Detector, Frame, FrameAnalyzer, FrameObservation, FrameSource};
pub use presence::{PresenceEvent, PresenceState, Step};
pub use quantizer::{ColorQuantizer, KmeansQuantizer};
pub use sync::{Notifier, SessionStore, SessionSynchronizer};
pub use types::{BoundingBox, ColorName, Detection, Rgb, Session, SessionUpdate, ShirtColor};
