//! Tracking loop over a loaded sequence

use crate::error::Result;
use crate::sequence::Sequence;
use kcftrack::{BoundingBox, KcfTracker, TrackerConfig};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant};

/// Tracked boxes for every frame plus timing
#[derive(Debug, Clone)]
pub struct RunReport {
    /// One box per frame; the first is the initial region
    pub boxes: Vec<BoundingBox>,
    /// Time spent in `init` and `update`, excluding image decoding
    pub elapsed: Duration,
    pub frames: usize,
}

impl RunReport {
    pub fn fps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            0.0
        }
    }
}

/// Initialise on the first frame and track through the rest
pub fn run_sequence(sequence: &Sequence, config: TrackerConfig) -> Result<RunReport> {
    let mut tracker = KcfTracker::new(config)?;
    let mut boxes = Vec::with_capacity(sequence.len());
    let mut elapsed = Duration::ZERO;

    for index in 0..sequence.len() {
        let frame = sequence.frame(index)?;
        let start = Instant::now();
        let roi = if index == 0 {
            tracker.init(sequence.region, &frame);
            sequence.region
        } else {
            tracker.update(&frame)
        };
        elapsed += start.elapsed();

        log::debug!("Frame {}: {}", index, roi);
        boxes.push(roi);
    }

    let report = RunReport {
        frames: boxes.len(),
        boxes,
        elapsed,
    };
    log::info!(
        "Tracked {} frames in {:.2?} ({:.1} fps)",
        report.frames,
        report.elapsed,
        report.fps()
    );
    Ok(report)
}

/// Write one `x,y,w,h` line per box
pub fn write_results<P: AsRef<Path>>(path: P, boxes: &[BoundingBox]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for b in boxes {
        writeln!(writer, "{},{},{},{}", b.x, b.y, b.width, b.height)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::parse_region;
    use image::{GrayImage, Luma};
    use kcftrack::TrackerFlags;

    fn write_sequence(dir: &Path, frames: usize) {
        for i in 0..frames {
            let offset = 2 * i as u32;
            let img = GrayImage::from_fn(80, 80, |x, y| {
                let inside = x >= 30 + offset && x < 46 + offset && y >= 30 && y < 46;
                let checker = ((x + 80 - offset) / 4 + y / 4) % 2 == 0;
                Luma([match (inside, checker) {
                    (true, true) => 240,
                    (true, false) => 20,
                    _ => 120,
                }])
            });
            img.save(dir.join(format!("{:04}.png", i + 1))).unwrap();
        }
        std::fs::write(dir.join("region.txt"), "30,30,16,16").unwrap();
    }

    #[test]
    fn test_run_sequence_reports_every_frame() {
        let dir = tempfile::tempdir().unwrap();
        write_sequence(dir.path(), 4);
        let sequence = Sequence::load(dir.path()).unwrap();

        let config = TrackerConfig::from_flags(TrackerFlags {
            gradient_features: false,
            fixed_window: false,
            multiscale: false,
            color_features: false,
        });
        let report = run_sequence(&sequence, config).unwrap();

        assert_eq!(report.frames, 4);
        assert_eq!(report.boxes.len(), 4);
        assert_eq!(report.boxes[0], sequence.region);
        assert!((report.boxes[3].x - 36.0).abs() <= 1.5, "tracked {}", report.boxes[3]);
        assert!(report.fps() >= 0.0);
    }

    #[test]
    fn test_invalid_config_surfaces_as_tracker_error() {
        let dir = tempfile::tempdir().unwrap();
        write_sequence(dir.path(), 1);
        let sequence = Sequence::load(dir.path()).unwrap();

        let mut config = TrackerConfig::default();
        config.sigma = f32::NAN;
        assert!(matches!(
            run_sequence(&sequence, config),
            Err(crate::RunnerError::Tracker(_))
        ));
    }

    #[test]
    fn test_write_results_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let boxes = [
            BoundingBox::new(1.0, 2.0, 3.0, 4.0),
            BoundingBox::new(1.5, -2.0, 3.25, 4.0),
        ];
        write_results(&path, &boxes).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines, ["1,2,3,4", "1.5,-2,3.25,4"]);
        assert_eq!(parse_region(lines[1]).unwrap(), boxes[1]);
    }
}
