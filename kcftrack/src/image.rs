//! Frame container and the patch operations the tracker needs
//!
//! Frames are 8-bit gray or RGB buffers from the `image` crate. The tracker
//! only ever reads from them: it cuts sub-windows (replicating the border
//! when the window leaves the frame), clipped crops for the scale pyramid,
//! and resizes patches to the model size.

use crate::error::{KcfError, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageBuffer, Pixel, RgbImage};

/// A single video frame
#[derive(Debug, Clone)]
pub enum Frame {
    Gray(GrayImage),
    Rgb(RgbImage),
}

impl Frame {
    /// Wrap a raw interleaved buffer with 1 (gray) or 3 (RGB) channels
    pub fn from_raw(data: Vec<u8>, width: u32, height: u32, channels: usize) -> Result<Self> {
        let expected = width as usize * height as usize * channels;
        let actual = data.len();
        let invalid = || KcfError::InvalidFrame {
            width,
            height,
            channels,
            expected,
            actual,
        };

        if actual != expected {
            return Err(invalid());
        }

        match channels {
            1 => GrayImage::from_raw(width, height, data)
                .map(Frame::Gray)
                .ok_or_else(invalid),
            3 => RgbImage::from_raw(width, height, data)
                .map(Frame::Rgb)
                .ok_or_else(invalid),
            other => Err(KcfError::UnsupportedChannels(other)),
        }
    }

    /// Load a frame from disk, keeping gray images single-channel
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        Ok(Self::from(image::open(path)?))
    }

    pub fn width(&self) -> u32 {
        match self {
            Frame::Gray(img) => img.width(),
            Frame::Rgb(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Frame::Gray(img) => img.height(),
            Frame::Rgb(img) => img.height(),
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            Frame::Gray(_) => 1,
            Frame::Rgb(_) => 3,
        }
    }

    /// Channel `c` of pixel `(x, y)` as a float in `[0, 255]`
    #[inline]
    pub fn value(&self, x: u32, y: u32, c: usize) -> f32 {
        match self {
            Frame::Gray(img) => img.get_pixel(x, y)[0] as f32,
            Frame::Rgb(img) => img.get_pixel(x, y)[c] as f32,
        }
    }

    /// Pixel `(x, y)` as RGB; gray frames replicate the intensity
    #[inline]
    pub fn rgb(&self, x: u32, y: u32) -> [u8; 3] {
        match self {
            Frame::Gray(img) => {
                let v = img.get_pixel(x, y)[0];
                [v, v, v]
            }
            Frame::Rgb(img) => img.get_pixel(x, y).0,
        }
    }

    /// `width x height` window whose top-left corner is `(x, y)`.
    ///
    /// Parts of the window outside the frame replicate the nearest border pixel.
    pub fn subwindow(&self, x: i64, y: i64, width: u32, height: u32) -> Frame {
        match self {
            Frame::Gray(img) => Frame::Gray(replicate_window(img, x, y, width, height)),
            Frame::Rgb(img) => Frame::Rgb(replicate_window(img, x, y, width, height)),
        }
    }

    /// Crop of roughly `width x height` pixels centred at `(cx, cy)`, clipped
    /// to the frame. Returns `None` when nothing of the crop lies inside.
    pub fn crop_centered(&self, cx: f32, cy: f32, width: f32, height: f32) -> Option<Frame> {
        let cols = self.width() as f32;
        let rows = self.height() as f32;

        let x_start = (cx.floor() - (width / 2.0).floor()).max(0.0);
        let x_end = ((cx + width - 1.0).floor() - (width / 2.0).floor()).min(cols - 1.0);
        let y_start = (cy.floor() - (height / 2.0).floor()).max(0.0);
        let y_end = ((cy + height - 1.0).floor() - (height / 2.0).floor()).min(rows - 1.0);

        let crop_w = x_end - x_start;
        let crop_h = y_end - y_start;
        if !(crop_w >= 1.0 && crop_h >= 1.0) {
            return None;
        }

        let (x, y, w, h) = (x_start as u32, y_start as u32, crop_w as u32, crop_h as u32);
        Some(match self {
            Frame::Gray(img) => Frame::Gray(imageops::crop_imm(img, x, y, w, h).to_image()),
            Frame::Rgb(img) => Frame::Rgb(imageops::crop_imm(img, x, y, w, h).to_image()),
        })
    }

    /// Bilinear resize; a no-op copy when the size already matches
    pub fn resize(&self, width: u32, height: u32) -> Frame {
        let width = width.max(1);
        let height = height.max(1);
        if width == self.width() && height == self.height() {
            return self.clone();
        }
        match self {
            Frame::Gray(img) => Frame::Gray(imageops::resize(img, width, height, FilterType::Triangle)),
            Frame::Rgb(img) => Frame::Rgb(imageops::resize(img, width, height, FilterType::Triangle)),
        }
    }

    /// Luma view of the frame
    pub fn to_gray(&self) -> GrayImage {
        match self {
            Frame::Gray(img) => img.clone(),
            Frame::Rgb(img) => imageops::grayscale(img),
        }
    }
}

impl From<GrayImage> for Frame {
    fn from(img: GrayImage) -> Self {
        Frame::Gray(img)
    }
}

impl From<RgbImage> for Frame {
    fn from(img: RgbImage) -> Self {
        Frame::Rgb(img)
    }
}

impl From<DynamicImage> for Frame {
    fn from(img: DynamicImage) -> Self {
        match img {
            DynamicImage::ImageLuma8(gray) => Frame::Gray(gray),
            other => Frame::Rgb(other.to_rgb8()),
        }
    }
}

fn replicate_window<P>(
    img: &ImageBuffer<P, Vec<P::Subpixel>>,
    x: i64,
    y: i64,
    width: u32,
    height: u32,
) -> ImageBuffer<P, Vec<P::Subpixel>>
where
    P: Pixel,
{
    let max_x = img.width() as i64 - 1;
    let max_y = img.height() as i64 - 1;

    ImageBuffer::from_fn(width.max(1), height.max(1), |i, j| {
        let sx = (x + i as i64).clamp(0, max_x) as u32;
        let sy = (y + j as i64).clamp(0, max_y) as u32;
        *img.get_pixel(sx, sy)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    fn ramp(width: u32, height: u32) -> Frame {
        Frame::Gray(GrayImage::from_fn(width, height, |x, y| Luma([(x + 10 * y) as u8])))
    }

    #[test]
    fn test_from_raw_validates_length() {
        assert!(Frame::from_raw(vec![0; 12], 2, 2, 3).is_ok());
        assert!(matches!(
            Frame::from_raw(vec![0; 11], 2, 2, 3),
            Err(KcfError::InvalidFrame { expected: 12, actual: 11, .. })
        ));
        assert!(matches!(
            Frame::from_raw(vec![0; 16], 2, 2, 4),
            Err(KcfError::UnsupportedChannels(4))
        ));
    }

    #[test]
    fn test_subwindow_replicates_border() {
        let frame = ramp(5, 5);
        let window = frame.subwindow(-2, 3, 4, 4);
        assert_eq!(window.width(), 4);
        assert_eq!(window.height(), 4);
        // Columns left of the frame repeat column 0; rows below repeat row 4
        assert_eq!(window.value(0, 0, 0), 30.0);
        assert_eq!(window.value(2, 0, 0), 30.0);
        assert_eq!(window.value(3, 0, 0), 31.0);
        assert_eq!(window.value(3, 3, 0), 41.0);
    }

    #[test]
    fn test_crop_centered_clips_and_rejects() {
        let frame = ramp(20, 20);
        let inside = frame.crop_centered(10.0, 10.0, 6.0, 4.0).unwrap();
        assert_eq!((inside.width(), inside.height()), (5, 3));
        assert_eq!(inside.value(0, 0, 0), (7 + 10 * 8) as f32);

        let clipped = frame.crop_centered(1.0, 1.0, 8.0, 8.0).unwrap();
        assert_eq!((clipped.width(), clipped.height()), (4, 4));

        assert!(frame.crop_centered(-30.0, 10.0, 8.0, 8.0).is_none());
        assert!(frame.crop_centered(10.0, 10.0, 0.5, 8.0).is_none());
    }

    #[test]
    fn test_resize_and_gray() {
        let frame = Frame::Rgb(RgbImage::from_pixel(8, 6, Rgb([200, 200, 200])));
        let small = frame.resize(4, 3);
        assert_eq!((small.width(), small.height()), (4, 3));
        assert_eq!(small.channels(), 3);
        assert_eq!(small.to_gray().get_pixel(1, 1)[0], 200);
        assert_eq!(frame.rgb(0, 0), [200, 200, 200]);
    }
}
