//! Frequency-domain primitives on `ndarray` containers
//!
//! Forward transforms are unnormalised, inverse transforms divide by the
//! number of samples, so `inverse(forward(x)) == x`.

use ndarray::{Array1, Array2, ArrayView2, Axis, Zip};
use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use std::fmt;
use std::sync::Arc;

/// Planned 2-D transform for a fixed `rows x cols` shape
#[derive(Clone)]
pub struct Fft2d {
    rows: usize,
    cols: usize,
    row_forward: Arc<dyn Fft<f32>>,
    row_inverse: Arc<dyn Fft<f32>>,
    col_forward: Arc<dyn Fft<f32>>,
    col_inverse: Arc<dyn Fft<f32>>,
}

impl fmt::Debug for Fft2d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fft2d")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .finish()
    }
}

impl Fft2d {
    pub fn new(planner: &mut FftPlanner<f32>, rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            row_forward: planner.plan_fft_forward(cols),
            row_inverse: planner.plan_fft_inverse(cols),
            col_forward: planner.plan_fft_forward(rows),
            col_inverse: planner.plan_fft_inverse(rows),
        }
    }

    /// Spectrum of a real-valued plane
    pub fn forward_real(&self, input: ArrayView2<f32>) -> Array2<Complex32> {
        let mut spectrum = input.mapv(|v| Complex32::new(v, 0.0));
        self.forward(&mut spectrum);
        spectrum
    }

    pub fn forward(&self, data: &mut Array2<Complex32>) {
        self.check_shape(data);
        transform_lanes(data, Axis(1), self.row_forward.as_ref());
        transform_lanes(data, Axis(0), self.col_forward.as_ref());
    }

    pub fn inverse(&self, data: &mut Array2<Complex32>) {
        self.check_shape(data);
        transform_lanes(data, Axis(1), self.row_inverse.as_ref());
        transform_lanes(data, Axis(0), self.col_inverse.as_ref());
        let scale = 1.0 / (self.rows * self.cols) as f32;
        data.mapv_inplace(|v| v * scale);
    }

    /// Real part of the inverse transform
    pub fn inverse_real(&self, mut data: Array2<Complex32>) -> Array2<f32> {
        self.inverse(&mut data);
        real_part(&data)
    }

    fn check_shape(&self, data: &Array2<Complex32>) {
        assert_eq!(
            data.dim(),
            (self.rows, self.cols),
            "spectrum shape does not match the planned transform"
        );
    }
}

/// Planned 1-D transform of length `len`, applied along the columns axis
#[derive(Clone)]
pub struct Fft1d {
    len: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

impl fmt::Debug for Fft1d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fft1d").field("len", &self.len).finish()
    }
}

impl Fft1d {
    pub fn new(planner: &mut FftPlanner<f32>, len: usize) -> Self {
        Self {
            len,
            forward: planner.plan_fft_forward(len),
            inverse: planner.plan_fft_inverse(len),
        }
    }

    /// Transform every row of `data` independently
    pub fn forward_rows(&self, data: &mut Array2<Complex32>) {
        assert_eq!(data.ncols(), self.len, "row length does not match the planned transform");
        transform_lanes(data, Axis(1), self.forward.as_ref());
    }

    pub fn forward_real(&self, input: &Array1<f32>) -> Array1<Complex32> {
        assert_eq!(input.len(), self.len, "signal length does not match the planned transform");
        let mut buffer: Vec<Complex32> = input.iter().map(|&v| Complex32::new(v, 0.0)).collect();
        self.forward.process(&mut buffer);
        Array1::from(buffer)
    }

    /// Real part of the scaled inverse transform
    pub fn inverse_real(&self, input: &Array1<Complex32>) -> Array1<f32> {
        assert_eq!(input.len(), self.len, "spectrum length does not match the planned transform");
        let mut buffer = input.to_vec();
        self.inverse.process(&mut buffer);
        let scale = 1.0 / self.len as f32;
        buffer.iter().map(|v| v.re * scale).collect()
    }
}

fn transform_lanes(data: &mut Array2<Complex32>, axis: Axis, fft: &dyn Fft<f32>) {
    let mut buffer = vec![Complex32::default(); data.len_of(axis)];
    let mut scratch = vec![Complex32::default(); fft.get_inplace_scratch_len()];

    for mut lane in data.lanes_mut(axis) {
        for (dst, src) in buffer.iter_mut().zip(lane.iter()) {
            *dst = *src;
        }
        fft.process_with_scratch(&mut buffer, &mut scratch);
        for (dst, src) in lane.iter_mut().zip(buffer.iter()) {
            *dst = *src;
        }
    }
}

pub fn real_part(data: &Array2<Complex32>) -> Array2<f32> {
    data.mapv(|v| v.re)
}

/// Move the zero-shift sample of a correlation surface to `(rows/2, cols/2)`
pub fn rearrange<T: Copy>(data: &Array2<T>) -> Array2<T> {
    let (rows, cols) = data.dim();
    let (half_rows, half_cols) = (rows / 2, cols / 2);
    Array2::from_shape_fn((rows, cols), |(i, j)| {
        data[((i + rows - half_rows) % rows, (j + cols - half_cols) % cols)]
    })
}

/// Elementwise `a * b`
pub fn complex_mul(a: &Array2<Complex32>, b: &Array2<Complex32>) -> Array2<Complex32> {
    Zip::from(a).and(b).map_collect(|&x, &y| x * y)
}

/// Elementwise `a * conj(b)`
pub fn complex_mul_conj(a: &Array2<Complex32>, b: &Array2<Complex32>) -> Array2<Complex32> {
    Zip::from(a).and(b).map_collect(|&x, &y| x * y.conj())
}

/// Elementwise `a / (b + offset)` with the offset added to the real part
pub fn complex_div_offset(
    a: &Array2<Complex32>,
    b: &Array2<Complex32>,
    offset: f32,
) -> Array2<Complex32> {
    Zip::from(a)
        .and(b)
        .map_collect(|&x, &y| x / (y + Complex32::new(offset, 0.0)))
}
