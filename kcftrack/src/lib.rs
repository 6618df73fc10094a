//! Pure Rust kernelized correlation filter (KCF) tracking library
//!
//! Tracks a single object through a video given its bounding box in the
//! first frame. Translation is estimated with a Gaussian-kernel correlation
//! filter over FHOG (optionally FHOG + colour-cluster) or raw intensity
//! features; an optional 1-D scale filter tracks size changes over a
//! geometric scale pyramid.
//!
//! ```rust,ignore
//! use kcftrack::{BoundingBox, Frame, KcfTracker, TrackerConfig};
//!
//! let mut tracker = KcfTracker::new(TrackerConfig::default())?;
//! tracker.init(BoundingBox::new(120.0, 80.0, 40.0, 60.0), &Frame::open("0001.jpg")?);
//!
//! for path in frames {
//!     let roi = tracker.update(&Frame::open(path)?);
//!     println!("{}", roi);
//! }
//! ```

pub mod appearance;
pub mod bbox;
pub mod config;
pub mod error;
pub mod features;
pub mod fft;
pub mod image;
pub mod scale;
pub mod tracker;
pub mod window;

pub use bbox::BoundingBox;
pub use config::{FeatureKind, ScaleConfig, TrackerConfig, TrackerFlags};
pub use error::{KcfError, Result};
pub use crate::image::Frame;
pub use tracker::KcfTracker;
