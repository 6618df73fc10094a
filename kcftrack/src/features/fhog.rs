//! Felzenszwalb HOG features
//!
//! Pipeline: per-pixel gradients (strongest colour channel), bilinear voting
//! into 9 contrast-insensitive and 18 contrast-sensitive orientation bins per
//! cell, normalisation against the four neighbouring 2x2 cell blocks with
//! truncation, and finally the 31-channel projection (18 + 9 summed bins plus
//! 4 texture energies). The outermost ring of cells is consumed by the block
//! normalisation, so a `W x H` patch yields `(H/cell - 2) x (W/cell - 2)`
//! feature locations.

use super::FeatureExtractor;
use crate::image::Frame;
use ndarray::{Array2, Array3};
use std::f32::consts::PI;

const NUM_SECTOR: usize = 9;
const CELL_BINS: usize = 3 * NUM_SECTOR;
const NORM_BINS: usize = 12 * NUM_SECTOR;
const TRUNCATION: f32 = 0.2;

/// Channels produced by [`Fhog`]
pub const FHOG_CHANNELS: usize = 3 * NUM_SECTOR + 4;

#[derive(Debug, Clone, Copy)]
pub struct Fhog {
    cell_size: usize,
}

impl Fhog {
    pub fn new(cell_size: usize) -> Self {
        assert!(cell_size > 0, "FHOG cell size must be positive");
        Self { cell_size }
    }

    /// Gradient magnitude plus unsigned/signed orientation bin of each pixel.
    /// Border pixels keep zero magnitude.
    fn gradients(&self, patch: &Frame) -> (Array2<f32>, Array2<[u8; 2]>) {
        let width = patch.width() as usize;
        let height = patch.height() as usize;
        let mut magnitude = Array2::<f32>::zeros((height, width));
        let mut bins = Array2::<[u8; 2]>::from_elem((height, width), [0, 0]);

        let boundary: Vec<(f32, f32)> = (0..NUM_SECTOR)
            .map(|s| {
                let angle = s as f32 * PI / NUM_SECTOR as f32;
                (angle.cos(), angle.sin())
            })
            .collect();

        for y in 1..height.saturating_sub(1) {
            for x in 1..width.saturating_sub(1) {
                let (xu, yu) = (x as u32, y as u32);
                let mut best = (0.0f32, 0.0f32, -1.0f32);
                for c in 0..patch.channels() {
                    let dx = patch.value(xu + 1, yu, c) - patch.value(xu - 1, yu, c);
                    let dy = patch.value(xu, yu + 1, c) - patch.value(xu, yu - 1, c);
                    let energy = dx * dx + dy * dy;
                    if energy > best.2 {
                        best = (dx, dy, energy);
                    }
                }
                let (dx, dy, energy) = best;

                let mut max_dot = boundary[0].0 * dx + boundary[0].1 * dy;
                let mut sector = 0usize;
                for (s, &(bx, by)) in boundary.iter().enumerate() {
                    let dot = bx * dx + by * dy;
                    if dot > max_dot {
                        max_dot = dot;
                        sector = s;
                    } else if -dot > max_dot {
                        max_dot = -dot;
                        sector = s + NUM_SECTOR;
                    }
                }

                magnitude[(y, x)] = energy.sqrt();
                bins[(y, x)] = [(sector % NUM_SECTOR) as u8, sector as u8];
            }
        }

        (magnitude, bins)
    }

    /// Orientation histograms per cell, shaped `(cell_rows, cell_cols, 27)`
    fn cell_histograms(&self, patch: &Frame) -> Array3<f32> {
        let k = self.cell_size;
        let width = patch.width() as usize;
        let height = patch.height() as usize;
        let size_x = width / k;
        let size_y = height / k;
        let mut map = Array3::<f32>::zeros((size_y, size_x, CELL_BINS));
        if size_x == 0 || size_y == 0 {
            return map;
        }

        let (magnitude, bins) = self.gradients(patch);

        // Bilinear weights towards the own cell (even slot) and the nearest
        // neighbouring cell (odd slot)
        let half = k / 2;
        let mut nearest = vec![0i64; k];
        let mut weights = vec![0f32; 2 * k];
        for j in 0..k {
            nearest[j] = if j < half { -1 } else { 1 };
            let (a, b) = if j < half {
                (half as f32 - j as f32 - 0.5, half as f32 + j as f32 + 0.5)
            } else {
                (j as f32 - half as f32 + 0.5, k as f32 + half as f32 - j as f32 - 0.5)
            };
            weights[2 * j] = b / (a + b);
            weights[2 * j + 1] = a / (a + b);
        }

        for i in 0..size_y {
            for j in 0..size_x {
                for ii in 0..k {
                    for jj in 0..k {
                        let py = i * k + ii;
                        let px = j * k + jj;
                        if py == 0 || py >= height - 1 || px == 0 || px >= width - 1 {
                            continue;
                        }

                        let r = magnitude[(py, px)];
                        let [unsigned, signed] = bins[(py, px)];
                        let unsigned = unsigned as usize;
                        let signed = signed as usize + NUM_SECTOR;

                        let mut vote = |cy: usize, cx: usize, w: f32| {
                            map[(cy, cx, unsigned)] += r * w;
                            map[(cy, cx, signed)] += r * w;
                        };

                        vote(i, j, weights[2 * ii] * weights[2 * jj]);

                        let ni = i as i64 + nearest[ii];
                        let nj = j as i64 + nearest[jj];
                        let row_ok = ni >= 0 && ni < size_y as i64;
                        let col_ok = nj >= 0 && nj < size_x as i64;

                        if row_ok {
                            vote(ni as usize, j, weights[2 * ii + 1] * weights[2 * jj]);
                        }
                        if col_ok {
                            vote(i, nj as usize, weights[2 * ii] * weights[2 * jj + 1]);
                        }
                        if row_ok && col_ok {
                            vote(ni as usize, nj as usize, weights[2 * ii + 1] * weights[2 * jj + 1]);
                        }
                    }
                }
            }
        }

        map
    }
}

/// Normalise each interior cell by its four 2x2 block energies and truncate.
/// Output is `(rows - 2, cols - 2, 108)`.
fn normalize_and_truncate(map: &Array3<f32>, truncation: f32) -> Array3<f32> {
    let (size_y, size_x, _) = map.dim();
    let out_y = size_y.saturating_sub(2);
    let out_x = size_x.saturating_sub(2);
    let mut out = Array3::<f32>::zeros((out_y, out_x, NORM_BINS));
    if out_y == 0 || out_x == 0 {
        return out;
    }

    let energy = Array2::from_shape_fn((size_y, size_x), |(i, j)| {
        (0..NUM_SECTOR).map(|b| map[(i, j, b)] * map[(i, j, b)]).sum::<f32>()
    });

    for i in 1..=out_y {
        for j in 1..=out_x {
            let block = |di: isize, dj: isize| {
                let ri = (i as isize + di) as usize;
                let cj = (j as isize + dj) as usize;
                (energy[(i, j)] + energy[(i, cj)] + energy[(ri, j)] + energy[(ri, cj)]).sqrt()
                    + f32::EPSILON
            };
            let norms = [block(1, 1), block(-1, 1), block(1, -1), block(-1, -1)];

            for (n, norm) in norms.iter().enumerate() {
                for b in 0..NUM_SECTOR {
                    out[(i - 1, j - 1, n * NUM_SECTOR + b)] = map[(i, j, b)] / norm;
                }
                for b in 0..2 * NUM_SECTOR {
                    out[(i - 1, j - 1, 4 * NUM_SECTOR + n * 2 * NUM_SECTOR + b)] =
                        map[(i, j, NUM_SECTOR + b)] / norm;
                }
            }
        }
    }

    out.mapv_inplace(|v| v.min(truncation));
    out
}

/// Collapse the 108 normalised bins to 31 channels, channel-major output
fn project(normalized: &Array3<f32>) -> Array3<f32> {
    let (rows, cols, _) = normalized.dim();
    let mut out = Array3::<f32>::zeros((FHOG_CHANNELS, rows, cols));
    let block_weight = 0.5; // 1 / sqrt(4 blocks)
    let texture_weight = 1.0 / ((2 * NUM_SECTOR) as f32).sqrt();
    let signed_base = 4 * NUM_SECTOR;

    for i in 0..rows {
        for j in 0..cols {
            let cell = |b: usize| normalized[(i, j, b)];

            for b in 0..2 * NUM_SECTOR {
                let sum: f32 = (0..4).map(|n| cell(signed_base + n * 2 * NUM_SECTOR + b)).sum();
                out[(b, i, j)] = sum * block_weight;
            }
            for b in 0..NUM_SECTOR {
                let sum: f32 = (0..4).map(|n| cell(n * NUM_SECTOR + b)).sum();
                out[(2 * NUM_SECTOR + b, i, j)] = sum * block_weight;
            }
            for n in 0..4 {
                let sum: f32 = (0..2 * NUM_SECTOR)
                    .map(|b| cell(signed_base + n * 2 * NUM_SECTOR + b))
                    .sum();
                out[(CELL_BINS + n, i, j)] = sum * texture_weight;
            }
        }
    }

    out
}

impl FeatureExtractor for Fhog {
    fn extract(&self, patch: &Frame) -> Array3<f32> {
        let cells = self.cell_histograms(patch);
        let normalized = normalize_and_truncate(&cells, TRUNCATION);
        project(&normalized)
    }

    fn cell_size(&self) -> usize {
        self.cell_size
    }

    fn name(&self) -> &str {
        "fhog"
    }
}
