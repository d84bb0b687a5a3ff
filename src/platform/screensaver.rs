// Lectern - platform/screensaver.rs
//
// Screensaver and display power management suppression for the duration of a
// presentation.
//
// Architecture:
//   - `ScreensaverController` is a two-state machine (Active / Suppressed)
//     driven by explicit `disable` / `enable` calls.
//   - One `ScreensaverBackend` is picked from the host OS at construction:
//       X11/POSIX  xdg-screensaver + xset DPMS toggling
//       macOS      caffeinate child process bound to our PID
//       Windows    HKCU\Control Panel\Desktop\ScreenSaveActive via reg.exe
//       other      unsupported; every call reports UnsupportedPlatform
//   - Backends record the OS configuration they found before changing it and
//     restore exactly that on `restore`.
//   - All subprocesses go through `CommandRunner`.
//
// Failures are logged and returned, never fatal: a presentation must still
// run when the screensaver cannot be suppressed.

use crate::platform::host::HostOs;
use crate::platform::process::{display_command, BackgroundProcess, CommandRunner};
use crate::util::constants;
use crate::util::error::ScreensaverError;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

// =============================================================================
// Backend trait
// =============================================================================

/// One platform strategy for suppressing the screensaver.
pub trait ScreensaverBackend: Send + fmt::Debug {
    /// Short name for log fields.
    fn name(&self) -> &'static str;

    /// Record the current OS configuration, then force suppression.
    ///
    /// `window` is the native id of the presentation window, used by
    /// backends that suspend per window (X11).
    fn suppress(&mut self, window: Option<u64>) -> Result<(), ScreensaverError>;

    /// Put back exactly what `suppress` recorded. Does nothing when
    /// nothing was recorded.
    fn restore(&mut self) -> Result<(), ScreensaverError>;
}

/// Run a command and turn a non-zero exit into `CommandFailed`.
fn run_checked(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[&str],
) -> Result<String, ScreensaverError> {
    let command = display_command(program, args);
    let output = runner
        .run(program, args)
        .map_err(|source| ScreensaverError::Io {
            command: command.clone(),
            source,
        })?;
    if output.success() {
        Ok(output.stdout)
    } else {
        Err(ScreensaverError::CommandFailed {
            command,
            status: output.status,
        })
    }
}

/// Keep the first error, log the rest.
fn keep_first(slot: &mut Option<ScreensaverError>, result: Result<(), ScreensaverError>) {
    if let Err(e) = result {
        match slot {
            None => *slot = Some(e),
            Some(_) => tracing::warn!(error = %e, "Additional screensaver failure"),
        }
    }
}

// =============================================================================
// X11 / POSIX: xdg-screensaver + DPMS
// =============================================================================

/// Suspends the screensaver with `xdg-screensaver` (works with xscreensaver,
/// gnome-screensaver, KDE and friends) and turns off DPMS screen blanking with
/// `xset`.
#[derive(Debug)]
pub struct XdgBackend {
    runner: Arc<dyn CommandRunner>,
    /// Window passed to `xdg-screensaver suspend`, needed again for `resume`.
    window: Option<u64>,
    /// DPMS state found by `suppress`; `None` until then.
    dpms_was_enabled: Option<bool>,
}

impl XdgBackend {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            window: None,
            dpms_was_enabled: None,
        }
    }

    /// Query DPMS. An unreadable state counts as disabled so we never turn
    /// on blanking the user did not have.
    fn query_dpms(&self) -> bool {
        match run_checked(self.runner.as_ref(), "xset", &["q"]) {
            Ok(stdout) => parse_dpms_enabled(&stdout),
            Err(e) => {
                tracing::warn!(error = %e, "Could not query DPMS status; assuming disabled");
                false
            }
        }
    }

    fn xdg_screensaver(&self, verb: &str, window: u64) -> Result<(), ScreensaverError> {
        let xid = window.to_string();
        run_checked(self.runner.as_ref(), "xdg-screensaver", &[verb, &xid]).map(|_| ())
    }
}

/// `true` when `xset q` output reports `DPMS is Enabled`.
pub fn parse_dpms_enabled(xset_output: &str) -> bool {
    xset_output
        .lines()
        .find(|line| line.contains(constants::XSET_DPMS_MARKER))
        .and_then(|line| line.split_whitespace().last())
        .is_some_and(|state| state == "Enabled")
}

impl ScreensaverBackend for XdgBackend {
    fn name(&self) -> &'static str {
        "xdg-screensaver"
    }

    fn suppress(&mut self, window: Option<u64>) -> Result<(), ScreensaverError> {
        let mut first_error = None;

        match window {
            Some(xid) => {
                let result = self.xdg_screensaver("suspend", xid);
                if result.is_ok() {
                    self.window = Some(xid);
                }
                keep_first(&mut first_error, result);
            }
            None => tracing::debug!("No window id; skipping xdg-screensaver suspend"),
        }

        let enabled = self.query_dpms();
        self.dpms_was_enabled = Some(enabled);
        if enabled {
            keep_first(
                &mut first_error,
                run_checked(self.runner.as_ref(), "xset", &["-dpms"]).map(|_| ()),
            );
        }
        tracing::debug!(dpms_was_enabled = enabled, "DPMS state recorded");

        first_error.map_or(Ok(()), Err)
    }

    fn restore(&mut self) -> Result<(), ScreensaverError> {
        let mut first_error = None;

        if let Some(xid) = self.window.take() {
            keep_first(&mut first_error, self.xdg_screensaver("resume", xid));
        }

        if self.dpms_was_enabled.take() == Some(true) {
            keep_first(
                &mut first_error,
                run_checked(self.runner.as_ref(), "xset", &["+dpms"]).map(|_| ()),
            );
        }

        first_error.map_or(Ok(()), Err)
    }
}

// =============================================================================
// macOS: caffeinate
// =============================================================================

/// Keeps the display awake with `caffeinate -d -w <pid>`. The `-w` flag ties
/// the inhibitor to our process, so it also ends if we crash.
#[derive(Debug)]
pub struct CaffeinateBackend {
    runner: Arc<dyn CommandRunner>,
    pid: u32,
    inhibitor: Option<Box<dyn BackgroundProcess>>,
}

impl CaffeinateBackend {
    pub fn new(runner: Arc<dyn CommandRunner>, pid: u32) -> Self {
        Self {
            runner,
            pid,
            inhibitor: None,
        }
    }
}

impl ScreensaverBackend for CaffeinateBackend {
    fn name(&self) -> &'static str {
        "caffeinate"
    }

    fn suppress(&mut self, _window: Option<u64>) -> Result<(), ScreensaverError> {
        if let Some(process) = self.inhibitor.as_mut() {
            if process.is_running() {
                return Ok(());
            }
        }

        let pid = self.pid.to_string();
        let args = ["-d", "-w", pid.as_str()];
        let process =
            self.runner
                .spawn("caffeinate", &args)
                .map_err(|source| ScreensaverError::Io {
                    command: display_command("caffeinate", &args),
                    source,
                })?;
        self.inhibitor = Some(process);
        Ok(())
    }

    fn restore(&mut self) -> Result<(), ScreensaverError> {
        if let Some(mut process) = self.inhibitor.take() {
            if process.is_running() {
                process.terminate();
            }
        }
        Ok(())
    }
}

// =============================================================================
// Windows: registry
// =============================================================================

/// Toggles `HKCU\Control Panel\Desktop\ScreenSaveActive` through `reg.exe`.
#[derive(Debug)]
pub struct RegistryBackend {
    runner: Arc<dyn CommandRunner>,
    /// Value found by `suppress`; `None` until then.
    previous: Option<String>,
}

impl RegistryBackend {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            previous: None,
        }
    }

    fn query(&self) -> Result<String, ScreensaverError> {
        let args = [
            "query",
            constants::SCREENSAVER_REGISTRY_KEY,
            "/v",
            constants::SCREENSAVER_REGISTRY_VALUE,
        ];
        let command = display_command("reg", &args);
        let output = self
            .runner
            .run("reg", &args)
            .map_err(|source| ScreensaverError::Io {
                command: command.clone(),
                source,
            })?;
        if !output.success() {
            return Err(classify_reg_failure(command, output.status, &output.stderr));
        }
        parse_registry_value(&output.stdout).map_err(|reason| ScreensaverError::UnexpectedOutput {
            command,
            reason,
        })
    }

    fn set(&self, value: &str) -> Result<(), ScreensaverError> {
        let args = [
            "add",
            constants::SCREENSAVER_REGISTRY_KEY,
            "/v",
            constants::SCREENSAVER_REGISTRY_VALUE,
            "/t",
            "REG_SZ",
            "/d",
            value,
            "/f",
        ];
        let command = display_command("reg", &args);
        let output = self
            .runner
            .run("reg", &args)
            .map_err(|source| ScreensaverError::Io {
                command: command.clone(),
                source,
            })?;
        if output.success() {
            Ok(())
        } else {
            Err(classify_reg_failure(command, output.status, &output.stderr))
        }
    }
}

fn classify_reg_failure(command: String, status: Option<i32>, stderr: &str) -> ScreensaverError {
    if stderr.to_lowercase().contains("access is denied") {
        ScreensaverError::PermissionDenied {
            detail: stderr.trim().to_string(),
        }
    } else {
        ScreensaverError::CommandFailed { command, status }
    }
}

/// Extract the `ScreenSaveActive` string from `reg query` output.
///
/// The value must be `REG_SZ`; any other type means the key was written by
/// something we do not understand, and we refuse to touch it.
pub fn parse_registry_value(reg_output: &str) -> Result<String, String> {
    let pattern = format!(
        r"(?m)^\s*{}\s+(REG_[A-Z_]+)[ \t]*(\S*)\s*$",
        regex::escape(constants::SCREENSAVER_REGISTRY_VALUE)
    );
    let re = Regex::new(&pattern).map_err(|e| e.to_string())?;
    let caps = re
        .captures(reg_output)
        .ok_or_else(|| format!("no {} line", constants::SCREENSAVER_REGISTRY_VALUE))?;
    let kind = &caps[1];
    if kind != "REG_SZ" {
        return Err(format!("expected REG_SZ, found {kind}"));
    }
    Ok(caps[2].to_string())
}

impl ScreensaverBackend for RegistryBackend {
    fn name(&self) -> &'static str {
        "registry"
    }

    fn suppress(&mut self, _window: Option<u64>) -> Result<(), ScreensaverError> {
        let value = self.query()?;
        let was_active = value == "1";
        self.previous = Some(value);
        if was_active {
            self.set("0")?;
        }
        Ok(())
    }

    fn restore(&mut self) -> Result<(), ScreensaverError> {
        match self.previous.take() {
            Some(value) if value == "1" => self.set(&value),
            _ => Ok(()),
        }
    }
}

// =============================================================================
// Unsupported
// =============================================================================

/// Placeholder for hosts with no known screensaver control.
#[derive(Debug)]
pub struct UnsupportedBackend {
    os: &'static str,
}

impl ScreensaverBackend for UnsupportedBackend {
    fn name(&self) -> &'static str {
        "unsupported"
    }

    fn suppress(&mut self, _window: Option<u64>) -> Result<(), ScreensaverError> {
        Err(ScreensaverError::UnsupportedPlatform { os: self.os })
    }

    fn restore(&mut self) -> Result<(), ScreensaverError> {
        Err(ScreensaverError::UnsupportedPlatform { os: self.os })
    }
}

// =============================================================================
// Controller
// =============================================================================

/// Whether the screensaver is currently being held off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreensaverState {
    Active,
    Suppressed,
}

/// Suppresses the screensaver while a presentation runs and restores the
/// user's settings afterwards. Restores on drop if still suppressed.
#[derive(Debug)]
pub struct ScreensaverController {
    backend: Box<dyn ScreensaverBackend>,
    state: ScreensaverState,
}

impl ScreensaverController {
    /// Pick the backend for `host`.
    pub fn for_host(host: HostOs, runner: Arc<dyn CommandRunner>) -> Self {
        let backend: Box<dyn ScreensaverBackend> = match host {
            HostOs::MacOs => Box::new(CaffeinateBackend::new(runner, std::process::id())),
            HostOs::Posix => Box::new(XdgBackend::new(runner)),
            HostOs::Windows => Box::new(RegistryBackend::new(runner)),
            HostOs::Other => Box::new(UnsupportedBackend { os: host.name() }),
        };
        tracing::debug!(host = %host, backend = backend.name(), "Screensaver backend selected");
        Self::with_backend(backend)
    }

    /// Use an explicit backend.
    pub fn with_backend(backend: Box<dyn ScreensaverBackend>) -> Self {
        Self {
            backend,
            state: ScreensaverState::Active,
        }
    }

    pub fn state(&self) -> ScreensaverState {
        self.state
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Suppress the screensaver. No-op when already suppressed.
    ///
    /// The state moves to `Suppressed` even on partial failure, because the
    /// backend may have changed some settings that `enable` must put back.
    /// Only an unsupported platform leaves the state `Active`.
    pub fn disable(&mut self, window: Option<u64>) -> Result<(), ScreensaverError> {
        if self.state == ScreensaverState::Suppressed {
            tracing::debug!("Screensaver already suppressed");
            return Ok(());
        }

        let result = self.backend.suppress(window);
        match &result {
            Err(ScreensaverError::UnsupportedPlatform { .. }) => {}
            _ => self.state = ScreensaverState::Suppressed,
        }
        match &result {
            Ok(()) => tracing::info!(backend = self.backend.name(), "Screensaver suppressed"),
            Err(e) => log_failure(e, "suppress"),
        }
        result
    }

    /// Restore the configuration recorded by `disable`. No-op, with no OS
    /// calls, when the screensaver is not suppressed.
    pub fn enable(&mut self) -> Result<(), ScreensaverError> {
        if self.state == ScreensaverState::Active {
            return Ok(());
        }

        self.state = ScreensaverState::Active;
        let result = self.backend.restore();
        match &result {
            Ok(()) => tracing::info!(backend = self.backend.name(), "Screensaver restored"),
            Err(e) => log_failure(e, "restore"),
        }
        result
    }
}

impl Drop for ScreensaverController {
    fn drop(&mut self) {
        // Already logged inside `enable`.
        let _ = self.enable();
    }
}

fn log_failure(e: &ScreensaverError, action: &'static str) {
    match e {
        ScreensaverError::PermissionDenied { .. } => {
            tracing::error!(error = %e, action, "Access denied to screen saver settings")
        }
        ScreensaverError::UnsupportedPlatform { .. } => {
            tracing::warn!(error = %e, action, "Screensaver control unavailable")
        }
        _ => tracing::warn!(error = %e, action, "Could not set screensaver status"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::process::testing::{Call, RecordingRunner};

    const XSET_ENABLED: &str = "Keyboard Control:\n  auto repeat:  on\n\
        DPMS (Energy Star):\n  Standby: 600    Suspend: 600    Off: 600\n  DPMS is Enabled\n";
    const XSET_DISABLED: &str = "DPMS (Energy Star):\n  DPMS is Disabled\n";

    const REG_QUERY: &str = r"reg query HKCU\Control Panel\Desktop /v ScreenSaveActive";
    const REG_SET_0: &str =
        r"reg add HKCU\Control Panel\Desktop /v ScreenSaveActive /t REG_SZ /d 0 /f";
    const REG_SET_1: &str =
        r"reg add HKCU\Control Panel\Desktop /v ScreenSaveActive /t REG_SZ /d 1 /f";

    fn reg_output(kind: &str, value: &str) -> String {
        format!(
            "\r\nHKEY_CURRENT_USER\\Control Panel\\Desktop\r\n    ScreenSaveActive    {kind}    {value}\r\n\r\n"
        )
    }

    fn controller(host: HostOs, runner: &RecordingRunner) -> ScreensaverController {
        ScreensaverController::for_host(host, Arc::new(runner.clone()))
    }

    // -- parsing --------------------------------------------------------------

    #[test]
    fn test_parse_dpms_enabled() {
        assert!(parse_dpms_enabled(XSET_ENABLED));
        assert!(!parse_dpms_enabled(XSET_DISABLED));
        assert!(!parse_dpms_enabled("Server does not have the DPMS Extension\n"));
        assert!(!parse_dpms_enabled(""));
    }

    #[test]
    fn test_parse_registry_value() {
        assert_eq!(parse_registry_value(&reg_output("REG_SZ", "1")).unwrap(), "1");
        assert_eq!(parse_registry_value(&reg_output("REG_SZ", "0")).unwrap(), "0");
        assert!(parse_registry_value(&reg_output("REG_DWORD", "0x1"))
            .unwrap_err()
            .contains("REG_DWORD"));
        assert!(parse_registry_value("ERROR: nothing here").is_err());
    }

    // -- state machine --------------------------------------------------------

    #[test]
    fn test_enable_without_disable_is_noop() {
        for host in [HostOs::Posix, HostOs::MacOs, HostOs::Windows] {
            let runner = RecordingRunner::new();
            let mut ctl = controller(host, &runner);
            assert!(ctl.enable().is_ok());
            assert_eq!(ctl.state(), ScreensaverState::Active);
            assert!(runner.calls().is_empty(), "{host}: {:?}", runner.calls());
        }
    }

    #[test]
    fn test_double_disable_suppresses_once() {
        let runner = RecordingRunner::new();
        runner.respond("xset q", 0, XSET_ENABLED);
        let mut ctl = controller(HostOs::Posix, &runner);

        ctl.disable(None).unwrap();
        ctl.disable(None).unwrap();
        assert_eq!(runner.runs(), vec!["xset q", "xset -dpms"]);
    }

    #[test]
    fn test_drop_restores_suppressed_state() {
        let runner = RecordingRunner::new();
        runner.respond("xset q", 0, XSET_ENABLED);
        {
            let mut ctl = controller(HostOs::Posix, &runner);
            ctl.disable(None).unwrap();
        }
        assert_eq!(runner.runs(), vec!["xset q", "xset -dpms", "xset +dpms"]);
    }

    #[test]
    fn test_unsupported_platform_stays_active() {
        let runner = RecordingRunner::new();
        let mut ctl = controller(HostOs::Other, &runner);
        let err = ctl.disable(None).unwrap_err();
        assert!(matches!(err, ScreensaverError::UnsupportedPlatform { .. }));
        assert_eq!(ctl.state(), ScreensaverState::Active);
        assert!(ctl.enable().is_ok());
        assert!(runner.calls().is_empty());
    }

    // -- X11 ------------------------------------------------------------------

    #[test]
    fn test_xdg_disable_then_enable_restores_dpms() {
        let runner = RecordingRunner::new();
        runner.respond("xset q", 0, XSET_ENABLED);
        let mut ctl = controller(HostOs::Posix, &runner);

        ctl.disable(Some(0x3a00007)).unwrap();
        assert_eq!(ctl.state(), ScreensaverState::Suppressed);
        ctl.enable().unwrap();

        assert_eq!(
            runner.runs(),
            vec![
                "xdg-screensaver suspend 60817415",
                "xset q",
                "xset -dpms",
                "xdg-screensaver resume 60817415",
                "xset +dpms",
            ]
        );
    }

    #[test]
    fn test_xdg_leaves_disabled_dpms_alone() {
        let runner = RecordingRunner::new();
        runner.respond("xset q", 0, XSET_DISABLED);
        let mut ctl = controller(HostOs::Posix, &runner);

        ctl.disable(None).unwrap();
        ctl.enable().unwrap();
        assert_eq!(runner.runs(), vec!["xset q"]);
    }

    #[test]
    fn test_xdg_missing_xset_is_not_fatal() {
        let runner = RecordingRunner::new();
        runner.fail("xset q");
        let mut ctl = controller(HostOs::Posix, &runner);

        assert!(ctl.disable(None).is_ok());
        ctl.enable().unwrap();
        assert_eq!(runner.runs(), vec!["xset q"]);
    }

    #[test]
    fn test_xdg_failed_suspend_still_handles_dpms() {
        let runner = RecordingRunner::new();
        runner.respond("xdg-screensaver suspend 7", 4, "");
        runner.respond("xset q", 0, XSET_ENABLED);
        let mut ctl = controller(HostOs::Posix, &runner);

        let err = ctl.disable(Some(7)).unwrap_err();
        assert!(matches!(
            err,
            ScreensaverError::CommandFailed { status: Some(4), .. }
        ));
        assert_eq!(ctl.state(), ScreensaverState::Suppressed);

        ctl.enable().unwrap();
        // Resume is skipped because suspend never took effect.
        assert_eq!(
            runner.runs(),
            vec!["xdg-screensaver suspend 7", "xset q", "xset -dpms", "xset +dpms"]
        );
    }

    // -- macOS ----------------------------------------------------------------

    #[test]
    fn test_caffeinate_spawned_once_and_terminated() {
        let runner = RecordingRunner::new();
        let backend = CaffeinateBackend::new(Arc::new(runner.clone()), 4242);
        let mut ctl = ScreensaverController::with_backend(Box::new(backend));

        ctl.disable(None).unwrap();
        ctl.disable(None).unwrap();
        ctl.enable().unwrap();

        assert_eq!(
            runner.calls(),
            vec![
                Call::Spawn("caffeinate -d -w 4242".to_string()),
                Call::Terminate("caffeinate -d -w 4242".to_string()),
            ]
        );
    }

    #[test]
    fn test_caffeinate_backend_respawns_after_restore() {
        let runner = RecordingRunner::new();
        let mut backend = CaffeinateBackend::new(Arc::new(runner.clone()), 1);
        backend.suppress(None).unwrap();
        backend.restore().unwrap();
        backend.suppress(None).unwrap();
        let spawns = runner
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Spawn(_)))
            .count();
        assert_eq!(spawns, 2);
    }

    #[test]
    fn test_caffeinate_missing_binary_reports_io() {
        let runner = RecordingRunner::new();
        runner.fail_spawns();
        let mut ctl = controller(HostOs::MacOs, &runner);
        let err = ctl.disable(None).unwrap_err();
        assert!(matches!(err, ScreensaverError::Io { .. }));
        assert!(ctl.enable().is_ok());
    }

    // -- Windows --------------------------------------------------------------

    #[test]
    fn test_registry_restores_exact_prior_value() {
        let runner = RecordingRunner::new();
        runner.respond(REG_QUERY, 0, &reg_output("REG_SZ", "1"));
        let mut ctl = controller(HostOs::Windows, &runner);

        ctl.disable(None).unwrap();
        ctl.enable().unwrap();
        assert_eq!(runner.runs(), vec![REG_QUERY, REG_SET_0, REG_SET_1]);
    }

    #[test]
    fn test_registry_inactive_screensaver_is_left_alone() {
        let runner = RecordingRunner::new();
        runner.respond(REG_QUERY, 0, &reg_output("REG_SZ", "0"));
        let mut ctl = controller(HostOs::Windows, &runner);

        ctl.disable(None).unwrap();
        ctl.enable().unwrap();
        assert_eq!(runner.runs(), vec![REG_QUERY]);
    }

    #[test]
    fn test_registry_access_denied_is_permission_error() {
        let runner = RecordingRunner::new();
        runner.respond_stderr(REG_QUERY, 1, "ERROR: Access is denied.\r\n");
        let mut ctl = controller(HostOs::Windows, &runner);

        let err = ctl.disable(None).unwrap_err();
        assert!(matches!(err, ScreensaverError::PermissionDenied { .. }), "{err:?}");
        ctl.enable().unwrap();
        assert_eq!(runner.runs(), vec![REG_QUERY]);
    }

    #[test]
    fn test_registry_unexpected_type_is_refused() {
        let runner = RecordingRunner::new();
        runner.respond(REG_QUERY, 0, &reg_output("REG_DWORD", "0x1"));
        let mut ctl = controller(HostOs::Windows, &runner);

        let err = ctl.disable(None).unwrap_err();
        assert!(matches!(err, ScreensaverError::UnexpectedOutput { .. }));
        ctl.enable().unwrap();
        assert_eq!(runner.runs(), vec![REG_QUERY]);
    }
}
