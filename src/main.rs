use anyhow::Result;
use clap::Parser;
use dicom_isoclip::{app::App, config::ViewerConfig, pipeline::Pipeline};
use winit::event_loop::EventLoop;

fn main() -> Result<()> {
    // Default to "info" if RUST_LOG is unset.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if std::env::args_os().len() < 2 {
        let program = std::env::args().next().unwrap_or_else(|| "dicom-isoclip".to_string());
        eprintln!("Usage: {program} [DicomDirectory  [outputFileName  [seriesName]]]");
        eprintln!("If DicomDirectory is not specified, current directory is used");
    }
    let config = ViewerConfig::parse();

    let pipeline = Pipeline::load(&config)?;

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config, pipeline);
    event_loop.run_app(&mut app)?;
    app.into_result()?;
    Ok(())
}
