// Lectern - main.rs
//
// Headless driver for the platform layer. Handles:
// 1. CLI argument parsing
// 2. Config loading and logging initialisation (debug mode support)
// 3. Resource layout detection and icon listing
// 4. Optional screensaver suppression for the session
// 5. Watching the document and reporting debounced reloads until Ctrl-C

use clap::Parser;
use lectern::app::watcher::FileWatcher;
use lectern::platform::config::{self, AppConfig, PlatformPaths};
use lectern::platform::host::HostOs;
use lectern::platform::launcher;
use lectern::platform::process::SystemRunner;
use lectern::platform::resources::ResourceLocator;
use lectern::platform::screensaver::ScreensaverController;
use lectern::util::{self, constants, error::LecternError};
use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lectern - presentation platform helper.
///
/// Watches a presentation document and reports each time it changes on disk,
/// optionally keeping the screensaver off while you present.
#[derive(Parser, Debug)]
#[command(name = "lectern", version, about)]
struct Cli {
    /// Presentation document to watch.
    document: Option<PathBuf>,

    /// Suppress the screensaver and DPMS blanking until exit.
    #[arg(short = 'p', long = "present")]
    present: bool,

    /// Native window id passed to xdg-screensaver (decimal or 0x-hex).
    #[arg(long = "window-id", value_parser = parse_window_id)]
    window_id: Option<u64>,

    /// Open the document with the default application first.
    #[arg(short = 'o', long = "open")]
    open: bool,

    /// List the bundled icons and exit.
    #[arg(long = "list-icons")]
    list_icons: bool,

    /// Directory containing `share/`; overrides layout detection.
    #[arg(short = 'r', long = "resource-dir")]
    resource_dir: Option<PathBuf>,

    /// Quiet period before a change is reported (ms).
    #[arg(long = "debounce-ms")]
    debounce_ms: Option<u64>,

    /// Config file to use instead of the platform default.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

fn parse_window_id(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid window id '{s}': {e}"))
}

fn main() {
    let cli = Cli::parse();

    let (app_config, config_warnings) = match &cli.config {
        Some(path) => match config::load_config_file(path) {
            Ok(loaded) => loaded,
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(2);
            }
        },
        None => config::load_config(&PlatformPaths::resolve().config_dir),
    };

    util::logging::init(
        cli.debug,
        app_config.log_level.as_deref(),
        app_config.log_file.as_deref(),
    );

    tracing::info!(
        version = constants::APP_VERSION,
        debug = cli.debug,
        "Lectern starting"
    );
    for warning in &config_warnings {
        tracing::warn!(warning = %warning, "Config warning");
    }

    if let Err(e) = run(&cli, &app_config) {
        tracing::error!(error = %e, "Lectern failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli, app_config: &AppConfig) -> Result<(), LecternError> {
    let resource_dir = cli
        .resource_dir
        .as_deref()
        .or(app_config.resource_dir.as_deref());
    let resources = ResourceLocator::detect(resource_dir);

    if cli.list_icons {
        return list_icons(&resources);
    }

    match resources.css_path() {
        Ok(css) => tracing::debug!(css = %css.display(), "Stylesheet located"),
        Err(e) => tracing::warn!(error = %e, "Stylesheet missing; default styling applies"),
    }

    let Some(document) = cli.document.as_deref() else {
        eprintln!("No document given. Run with --help for usage.");
        return Ok(());
    };

    if cli.open {
        // Logged by the launcher; the presentation goes on without it.
        let _ = launcher::open_with_default(document);
    }

    let debounce = effective_debounce(cli.debounce_ms, app_config.watch_debounce_ms);
    let mut screensaver =
        ScreensaverController::for_host(HostOs::detect(), Arc::new(SystemRunner));
    let running = interrupt_flag();

    let reloads = present(
        document,
        debounce,
        cli.present && app_config.suppress_screensaver,
        cli.window_id,
        &mut screensaver,
        &running,
    );
    tracing::info!(reloads, "Lectern stopped");
    Ok(())
}

fn list_icons(resources: &ResourceLocator) -> Result<(), LecternError> {
    println!(
        "Resources: {} ({})",
        resources.base().display(),
        resources.mode()
    );
    for icon in resources.load_icons()? {
        println!("  {:<24} {}x{}", icon.name, icon.width, icon.height);
    }
    Ok(())
}

/// Debounce from `--debounce-ms` if given and in range, else the config value.
fn effective_debounce(cli_ms: Option<u64>, config_ms: u64) -> Duration {
    let ms = match cli_ms.map(|ms| config::check_debounce_ms("--debounce-ms", ms)) {
        Some(Ok(ms)) => ms,
        Some(Err(problem)) => {
            tracing::warn!("{problem}. Using configured value ({config_ms}).");
            config_ms
        }
        None => config_ms,
    };
    Duration::from_millis(ms)
}

/// Flag cleared by Ctrl-C.
fn interrupt_flag() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = Arc::clone(&running);
    if let Err(e) = ctrlc::set_handler(move || handler_flag.store(false, Ordering::SeqCst)) {
        tracing::warn!(error = %e, "Could not install Ctrl-C handler");
    }
    running
}

/// One presentation session: suppress the screensaver if asked, report
/// document reloads until `running` clears, then restore the screensaver.
/// Returns the number of reloads.
fn present(
    document: &Path,
    debounce: Duration,
    suppress: bool,
    window: Option<u64>,
    screensaver: &mut ScreensaverController,
    running: &AtomicBool,
) -> u64 {
    if suppress {
        // Failures are logged by the controller; presenting goes on regardless.
        let _ = screensaver.disable(window);
    }
    let reloads = watch_until_stopped(document, debounce, running);
    let _ = screensaver.enable();
    reloads
}

/// Report debounced changes to `document` until `running` clears.
///
/// A document that cannot be watched is reported once and the session keeps
/// running without reloads.
fn watch_until_stopped(document: &Path, debounce: Duration, running: &AtomicBool) -> u64 {
    let reloads = Rc::new(Cell::new(0u64));
    let counter = Rc::clone(&reloads);
    let mut watcher: FileWatcher<PathBuf> = FileWatcher::new(debounce);
    let watched = watcher.watch(
        document,
        move |path: &PathBuf| {
            counter.set(counter.get() + 1);
            println!(
                "[{}] {} changed (reload #{})",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                path.display(),
                counter.get()
            );
        },
        document.to_path_buf(),
    );

    match watched {
        Ok(()) => println!(
            "Watching {} (debounce {} ms). Press Ctrl-C to stop.",
            document.display(),
            debounce.as_millis()
        ),
        // Logged by the watcher at WARN.
        Err(e) => println!(
            "Not watching {}: {e}. Changes will not be reloaded. Press Ctrl-C to stop.",
            document.display()
        ),
    }

    let frame = Duration::from_millis(constants::CLI_POLL_INTERVAL_MS);
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        watcher.poll(now);
        let sleep = watcher
            .time_until_due(now)
            .map_or(frame, |due| due.min(frame));
        std::thread::sleep(sleep);
    }

    watcher.stop(true);
    reloads.get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern::platform::screensaver::{ScreensaverBackend, ScreensaverState};
    use lectern::util::error::ScreensaverError;
    use std::sync::Mutex;

    /// Backend that records calls instead of touching the OS.
    #[derive(Debug, Default, Clone)]
    struct RecordingBackend {
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl ScreensaverBackend for RecordingBackend {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn suppress(&mut self, _window: Option<u64>) -> Result<(), ScreensaverError> {
            self.calls.lock().unwrap().push("suppress");
            Ok(())
        }

        fn restore(&mut self) -> Result<(), ScreensaverError> {
            self.calls.lock().unwrap().push("restore");
            Ok(())
        }
    }

    #[test]
    fn test_parse_window_id_accepts_decimal_and_hex() {
        assert_eq!(parse_window_id("60817415"), Ok(60817415));
        assert_eq!(parse_window_id("0x3a00007"), Ok(0x3a00007));
        assert_eq!(parse_window_id("0X3A00007"), Ok(0x3a00007));
        assert!(parse_window_id("window").is_err());
    }

    #[test]
    fn test_cli_parses_presentation_flags() {
        let cli = Cli::parse_from([
            "lectern",
            "talk.pdf",
            "--present",
            "--window-id",
            "0x10",
            "--debounce-ms",
            "300",
        ]);
        assert_eq!(cli.document, Some(PathBuf::from("talk.pdf")));
        assert!(cli.present);
        assert_eq!(cli.window_id, Some(16));
        assert_eq!(cli.debounce_ms, Some(300));
        assert!(!cli.open);
    }

    #[test]
    fn test_unwatchable_document_still_presents_and_restores() {
        let dir = tempfile::TempDir::new().expect("tmpdir");
        let missing = dir.path().join("gone").join("talk.pdf");
        let backend = RecordingBackend::default();
        let mut screensaver = ScreensaverController::with_backend(Box::new(backend.clone()));
        let running = AtomicBool::new(false);

        let reloads = present(
            &missing,
            Duration::from_millis(50),
            true,
            None,
            &mut screensaver,
            &running,
        );

        assert_eq!(reloads, 0);
        assert_eq!(*backend.calls.lock().unwrap(), vec!["suppress", "restore"]);
        assert_eq!(screensaver.state(), ScreensaverState::Active);
    }

    #[test]
    fn test_present_without_suppression_leaves_screensaver_alone() {
        let dir = tempfile::TempDir::new().expect("tmpdir");
        let doc = dir.path().join("talk.pdf");
        std::fs::write(&doc, b"v0").expect("write");
        let backend = RecordingBackend::default();
        let mut screensaver = ScreensaverController::with_backend(Box::new(backend.clone()));

        let reloads = present(
            &doc,
            Duration::from_millis(50),
            false,
            None,
            &mut screensaver,
            &AtomicBool::new(false),
        );

        assert_eq!(reloads, 0);
        assert!(backend.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_cli_debounce_is_range_checked() {
        assert_eq!(effective_debounce(None, 200), Duration::from_millis(200));
        assert_eq!(effective_debounce(Some(300), 200), Duration::from_millis(300));
        assert_eq!(
            effective_debounce(Some(constants::MAX_WATCH_DEBOUNCE_MS + 1), 250),
            Duration::from_millis(250)
        );
        assert_eq!(effective_debounce(Some(0), 250), Duration::from_millis(250));
    }
}
