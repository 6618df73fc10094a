use image::{GrayImage, Luma};
use kcftrack::{BoundingBox, Frame, KcfTracker, TrackerConfig, TrackerFlags};

/// Textured square drifting right and growing slowly
fn render(frame: u32) -> (BoundingBox, Frame) {
    let size = 30.0 + frame as f32 * 0.5;
    let truth = BoundingBox::from_center(60.0 + frame as f32 * 2.0, 80.0, size, size);

    let image = GrayImage::from_fn(240, 160, |x, y| {
        let (fx, fy) = (x as f32, y as f32);
        let inside = fx >= truth.x
            && fy >= truth.y
            && fx < truth.x + truth.width
            && fy < truth.y + truth.height;
        if inside {
            let u = ((fx - truth.x) / truth.width * 4.0) as u32;
            let v = ((fy - truth.y) / truth.height * 4.0) as u32;
            Luma([if (u + v) % 2 == 0 { 230 } else { 30 }])
        } else {
            Luma([100 + ((x / 16 + y / 16) % 3) as u8 * 10])
        }
    });
    (truth, Frame::Gray(image))
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = TrackerConfig::from_flags(TrackerFlags {
        color_features: false,
        ..TrackerFlags::default()
    });
    println!("Tracking with {:?} features, multiscale {}", config.feature_kind, config.multiscale);

    let mut tracker = KcfTracker::new(config)?;
    let (first, frame) = render(0);
    tracker.init(first, &frame);

    for i in 1..30 {
        let (truth, frame) = render(i);
        let roi = tracker.update(&frame);
        let (tx, ty) = truth.center();
        let (rx, ry) = roi.center();
        println!(
            "Frame {:2}: tracked {} | truth {} | center error {:.2} px | scale {:.3}",
            i,
            roi,
            truth,
            ((tx - rx).powi(2) + (ty - ry).powi(2)).sqrt(),
            tracker.current_scale()
        );
    }

    Ok(())
}
