use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tally_hw::Camera;

// `#[zbus::proxy]` generates `TallyProxy` (async) from this trait.
#[zbus::proxy(
    interface = "org.sovren.Tally1",
    default_service = "org.sovren.Tally1",
    default_path = "/org/sovren/Tally1"
)]
trait Tally {
    async fn status(&self) -> zbus::Result<String>;
    async fn resume(&self) -> zbus::Result<bool>;
    async fn reset(&self) -> zbus::Result<String>;
    async fn stop_camera(&self) -> zbus::Result<bool>;
    async fn close_session(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "tally", about = "Tally attendance capture CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show agent status
    Status,
    /// Resume scanning after a completion stop
    Resume,
    /// Reset the scan (clears server and local accumulation)
    Reset,
    /// Stop the camera (terminal for this scan)
    Stop,
    /// Close the attendance sheet and finalize the session
    Close,
    /// List available capture devices (bypasses the agent)
    Devices,
    /// Capture one frame and report its properties (bypasses the agent)
    Test {
        /// V4L2 device path
        #[arg(short, long, default_value = "/dev/video0")]
        device: String,
    },
}

async fn proxy() -> Result<TallyProxy<'static>> {
    let conn = zbus::Connection::session()
        .await
        .context("failed to connect to the session bus")?;
    TallyProxy::new(&conn)
        .await
        .context("tallyd is not running (no org.sovren.Tally1 on the bus)")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Status => {
            let raw = proxy().await?.status().await?;
            // Re-indent the agent's JSON for the terminal.
            match serde_json::from_str::<serde_json::Value>(&raw) {
                Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                Err(_) => println!("{raw}"),
            }
        }
        Commands::Resume => {
            if proxy().await?.resume().await? {
                println!("Scanning resumed");
            } else {
                println!("Cannot resume: camera has been stopped");
            }
        }
        Commands::Reset => {
            println!("{}", proxy().await?.reset().await?);
        }
        Commands::Stop => {
            if proxy().await?.stop_camera().await? {
                println!("Camera stopped. This scan cannot be resumed.");
            } else {
                println!("Camera was already stopped");
            }
        }
        Commands::Close => {
            println!("{}", proxy().await?.close_session().await?);
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No capture devices found");
            } else {
                for d in devices {
                    println!("{}  {} ({})", d.path, d.name, d.driver);
                }
            }
        }
        Commands::Test { device } => {
            println!("Opening {device}...");
            let camera = Camera::open(&device)?;
            println!(
                "Negotiated {}x{} {:?}",
                camera.width, camera.height, camera.fourcc
            );
            let frame = camera.capture_frame()?;
            println!(
                "Captured frame #{}: {}x{}, avg luma {:.1}{}",
                frame.sequence,
                frame.width,
                frame.height,
                frame.avg_luma(),
                if frame.is_dark(0.95) { " (dark)" } else { "" }
            );
        }
    }

    Ok(())
}
