//! Image sequence loading

use crate::error::{Result, RunnerError};
use kcftrack::{BoundingBox, Frame};
use std::fs;
use std::path::{Path, PathBuf};

const FRAME_LIST: &str = "images.txt";
const REGION_FILE: &str = "region.txt";
const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Ordered frame paths plus the target region in the first frame
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    pub frames: Vec<PathBuf>,
    pub region: BoundingBox,
}

impl Sequence {
    /// Load a sequence directory.
    ///
    /// Frames come from `images.txt` (one path per line, relative to `dir`)
    /// or, without it, from the image files in `dir` sorted by name. The
    /// initial region is read from `region.txt`.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let frames = match fs::read_to_string(dir.join(FRAME_LIST)) {
            Ok(list) => list
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(|line| dir.join(line))
                .collect(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => list_images(dir)?,
            Err(err) => return Err(err.into()),
        };

        if frames.is_empty() {
            return Err(RunnerError::EmptySequence(dir.display().to_string()));
        }

        let region = parse_region(&fs::read_to_string(dir.join(REGION_FILE))?)?;
        log::info!(
            "Loaded sequence {} with {} frames, initial region {}",
            dir.display(),
            frames.len(),
            region
        );

        Ok(Self { frames, region })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Decode frame `index`
    pub fn frame(&self, index: usize) -> Result<Frame> {
        let path = &self.frames[index];
        log::trace!("Reading frame {}", path.display());
        Ok(Frame::open(path)?)
    }
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut frames: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    frames.sort();
    Ok(frames)
}

/// Parse `x,y,w,h` or an 8-number polygon (reduced to its bounding box).
/// Numbers may be separated by commas and/or whitespace.
pub fn parse_region(text: &str) -> Result<BoundingBox> {
    let first = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| RunnerError::region("region file is empty"))?;

    let values = first
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<f32>()
                .map_err(|_| RunnerError::region(format!("not a number: {:?}", token)))
        })
        .collect::<Result<Vec<f32>>>()?;

    match values.as_slice() {
        &[x, y, w, h] => {
            if w < 0.0 || h < 0.0 {
                return Err(RunnerError::region(format!("negative size {}x{}", w, h)));
            }
            Ok(BoundingBox::new(x, y, w, h))
        }
        polygon if polygon.len() == 8 => {
            let xs = polygon.iter().step_by(2);
            let ys = polygon.iter().skip(1).step_by(2);
            let (min_x, max_x) = xs.fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
            let (min_y, max_y) = ys.fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
            Ok(BoundingBox::from_corners((min_x, min_y), (max_x, max_y)))
        }
        other => Err(RunnerError::region(format!(
            "expected 4 or 8 numbers, got {}",
            other.len()
        ))),
    }
}
