use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use clap::Parser;
use gridsnap_win::app::controller::request_quit;
use gridsnap_win::app::{AppController, AppError};
use gridsnap_win::config::{JsonSettingsStore, Settings};
use gridsnap_win::platform::dpi::enable_process_per_monitor_awareness;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use windows::Win32::Foundation::{BOOL, FALSE, TRUE};
use windows::Win32::System::Console::{
    CTRL_BREAK_EVENT, CTRL_C_EVENT, CTRL_CLOSE_EVENT, SetConsoleCtrlHandler,
};

/// Thread running the UI message loop, for the console control handler
static UI_THREAD_ID: AtomicU32 = AtomicU32::new(0);

/// GridSnap - snap dragged windows to a per-monitor grid
#[derive(Parser, Debug)]
#[command(name = "gridsnap", version, about = "Right-click while dragging a window to snap it to a grid", long_about = None)]
struct Cli {
    /// Path to the settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `gridsnap_win=trace`; RUST_LOG wins when set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

unsafe extern "system" fn console_ctrl_handler(ctrl_type: u32) -> BOOL {
    match ctrl_type {
        CTRL_C_EVENT | CTRL_BREAK_EVENT | CTRL_CLOSE_EVENT => {
            let thread_id = UI_THREAD_ID.load(Ordering::Acquire);
            if thread_id != 0 && request_quit(thread_id) {
                return TRUE;
            }
            FALSE
        }
        _ => FALSE,
    }
}

fn init_logging(cli: &Cli) -> Result<(), AppError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let file_layer = match &cli.log_file {
        Some(path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(File::create(path)?)),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(file_layer)
        .with(filter)
        .init();
    Ok(())
}

fn run(cli: Cli) -> Result<(), AppError> {
    init_logging(&cli)?;

    if !enable_process_per_monitor_awareness() {
        tracing::warn!("Process DPI awareness was already set; placement relies on per-thread scopes");
    }

    let path = match cli.config {
        Some(path) => path,
        None => Settings::default_path()?,
    };
    let store = JsonSettingsStore::open(&path);
    tracing::info!(path = %path.display(), "Settings loaded");

    let mut controller = AppController::new(store);
    UI_THREAD_ID.store(controller.ui_thread_id(), Ordering::Release);
    if let Err(e) = unsafe { SetConsoleCtrlHandler(Some(console_ctrl_handler), true) } {
        tracing::warn!("Ctrl-C handler not installed: {e}");
    }

    tracing::info!("GridSnap running; right-click while dragging a window");
    controller.run()
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("gridsnap: {e}");
            ExitCode::FAILURE
        }
    }
}
