use anyhow::Result;
use clap::{Parser, Subcommand};
use rollcall_core::{Gallery, SeetaDetector};
use rollcall_hw::Camera;
use rollcall_store::Store;

mod config;
mod session;

use config::Config;
use session::{CommandPoller, LogSink};

#[derive(Parser)]
#[command(name = "rollcall", about = "Facial-recognition attendance recorder")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run live attendance capture
    Run,
    /// Build the reference gallery once and report what loaded
    Gallery,
    /// Show today's attendance records
    Today {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Run camera diagnostics
    Test,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Run => run(&config),
        Commands::Gallery => gallery(&config),
        Commands::Today { json } => today(&config, json),
        Commands::Test => camera_test(&config),
    }
}

/// Live capture: gallery and camera must both come up before the loop starts.
fn run(config: &Config) -> Result<()> {
    let store = Store::open(&config.db_path)?;
    let mut detector = SeetaDetector::load(&config.detector_model_path(), config.detector)?;

    let enrollments = store.active_enrollments()?;
    let gallery = Gallery::build(&enrollments, &mut detector, config.canvas_size);
    if gallery.is_empty() {
        anyhow::bail!(
            "no reference faces loaded; seed the roster with enrollment photos before starting capture"
        );
    }
    tracing::info!(identities = gallery.len(), "system ready");

    let camera = Camera::open(config.camera_index, config.frame_width, config.frame_height)?;
    let commands = CommandPoller::spawn_stdin();
    let mut sink = LogSink;

    session::run_loop(
        &camera,
        &mut detector,
        &store,
        gallery,
        &commands,
        &mut sink,
        config,
    )
}

fn gallery(config: &Config) -> Result<()> {
    let store = Store::open(&config.db_path)?;
    let mut detector = SeetaDetector::load(&config.detector_model_path(), config.detector)?;

    let enrollments = store.active_enrollments()?;
    let gallery = Gallery::build(&enrollments, &mut detector, config.canvas_size);

    for entry in gallery.entries() {
        println!("{}  {}", entry.identity_id, entry.display_name);
    }
    println!(
        "{} of {} active enrollments loaded",
        gallery.len(),
        enrollments.len()
    );
    Ok(())
}

fn today(config: &Config, json: bool) -> Result<()> {
    let store = Store::open(&config.db_path)?;
    let date = chrono::Local::now().date_naive();
    let records = store.recorded_on(date)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("no attendance records for {date}");
        return Ok(());
    }

    println!("attendance for {date}:");
    for record in &records {
        let name = record.display_name.as_deref().unwrap_or("(not in roster)");
        let confidence = record
            .confidence
            .map(|c| format!("{c:.2}"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {}  {}  {}  {}",
            record.identity_id,
            name,
            record.check_in_time.format("%H:%M:%S"),
            record.status.as_str(),
            confidence
        );
    }
    Ok(())
}

fn camera_test(config: &Config) -> Result<()> {
    let devices = Camera::list_devices();
    if devices.is_empty() {
        println!("no video capture devices found");
        return Ok(());
    }
    for device in &devices {
        println!("{}  {} ({})", device.path, device.name, device.driver);
    }

    let camera = Camera::open(config.camera_index, config.frame_width, config.frame_height)?;
    println!(
        "opened {} at {}x{} ({:?})",
        camera.device_path, camera.width, camera.height, camera.fourcc
    );

    let frame = camera.read_frame()?;
    println!(
        "captured frame seq={} mean brightness {:.1}",
        frame.sequence,
        frame.avg_brightness()
    );
    Ok(())
}
