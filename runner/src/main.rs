use clap::Parser;
use kcf_runner::{run_sequence, write_results, RunnerSettings, Sequence};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about = "Track the initial region through an image sequence", long_about = None)]
struct Args {
    /// Directory with the frames and region.txt
    sequence: PathBuf,

    /// JSON settings file (tracker flags and tunable overrides)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write one x,y,w,h line per frame to this file
    #[arg(long)]
    output: Option<PathBuf>,

    /// Use raw intensity instead of FHOG features
    #[arg(long, default_value_t = false)]
    raw: bool,

    /// Disable the colour-cluster features
    #[arg(long, default_value_t = false)]
    no_color: bool,

    /// Disable the scale filter
    #[arg(long, default_value_t = false)]
    single_scale: bool,

    /// Let the template follow the ROI size instead of a fixed window
    #[arg(long, default_value_t = false)]
    roi_window: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => RunnerSettings::from_json_file(path)?,
        None => RunnerSettings::default(),
    };
    if args.raw {
        settings.flags.gradient_features = false;
    }
    if args.no_color {
        settings.flags.color_features = false;
    }
    if args.single_scale {
        settings.flags.multiscale = false;
    }
    if args.roi_window {
        settings.flags.fixed_window = false;
    }

    let config = settings.into_config();
    log::info!("Tracker configuration: {:?}", config);

    let sequence = Sequence::load(&args.sequence)?;
    let report = run_sequence(&sequence, config)?;

    match &args.output {
        Some(path) => {
            write_results(path, &report.boxes)?;
            log::info!("Results written to {}", path.display());
        }
        None => {
            for b in &report.boxes {
                println!("{},{},{},{}", b.x, b.y, b.width, b.height);
            }
        }
    }

    Ok(())
}
