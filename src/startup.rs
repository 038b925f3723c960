//! Start-on-login registration through a user LaunchAgent.
//!
//! Registration state is nothing more than the presence of the plist in
//! `~/Library/LaunchAgents`. launchd is told about changes on a best-effort
//! basis: the file is what launchd reads at the next login anyway.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::LAUNCH_AGENT_LABEL;
use crate::error::{Result, VigiloError};

/// Placeholder in the plist template replaced by the executable path.
pub const EXEC_PLACEHOLDER: &str = "%EXEC_LOCATION%";
/// Placeholder replaced by the agent log, which receives launchd's stdout/stderr.
pub const LOG_PLACEHOLDER: &str = "%LOG_LOCATION%";

/// Set by launchd to the label of the job a process was started for.
const JOB_NAME_ENV: &str = "XPC_SERVICE_NAME";

/// LaunchAgent template shipped with the binary.
pub const PLIST_TEMPLATE: &str = include_str!("../resources/vigilo.plist");

/// Whether Vigilo starts at login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupRegistration {
    Registered,
    Unregistered,
}

impl StartupRegistration {
    pub fn is_registered(self) -> bool {
        self == Self::Registered
    }
}

/// Activation of LaunchAgent plists with the OS service manager.
pub trait ServiceManager {
    /// Make the service manager pick up a freshly written plist.
    fn load(&self, plist: &Path) -> Result<()>;

    /// Remove a plist's job from the service manager.
    fn unload(&self, plist: &Path) -> Result<()>;
}

/// `launchctl` driver for the per-user GUI domain.
#[derive(Debug, Clone)]
pub struct Launchctl {
    label: String,
    current_job: Option<String>,
}

impl Launchctl {
    /// Driver for `label`, noting which launchd job started this process.
    pub fn new(label: impl Into<String>) -> Self {
        Self::for_job(label, std::env::var(JOB_NAME_ENV).ok())
    }

    fn for_job(label: impl Into<String>, current_job: Option<String>) -> Self {
        Self {
            label: label.into(),
            current_job,
        }
    }

    /// Whether launchd started this very process as the Vigilo job.
    pub fn is_current_job(&self) -> bool {
        self.current_job.as_deref() == Some(self.label.as_str())
    }

    fn domain_target() -> String {
        format!("gui/{}", nix::unistd::getuid())
    }

    fn run(args: &[&str]) -> Result<std::process::Output> {
        Command::new("launchctl")
            .args(args)
            .output()
            .map_err(|e| VigiloError::ServiceManager(format!("Failed to execute launchctl: {}", e)))
    }
}

impl Default for Launchctl {
    fn default() -> Self {
        Self::new(LAUNCH_AGENT_LABEL)
    }
}

impl ServiceManager for Launchctl {
    fn load(&self, plist: &Path) -> Result<()> {
        let plist = plist.to_string_lossy();
        let domain = Self::domain_target();

        if let Ok(out) = Self::run(&["bootstrap", domain.as_str(), plist.as_ref()]) {
            let stderr = String::from_utf8_lossy(&out.stderr);
            if out.status.success() || stderr.contains("already loaded") {
                tracing::info!("Loaded LaunchAgent: {}", self.label);
                return Ok(());
            }
            tracing::debug!("launchctl bootstrap failed, trying legacy load: {}", stderr.trim());
        }

        // Older macOS only understands `load`
        let out = Self::run(&["load", "-w", plist.as_ref()])?;
        let stderr = String::from_utf8_lossy(&out.stderr);
        if out.status.success() || stderr.contains("already loaded") {
            tracing::info!("Loaded LaunchAgent (legacy): {}", self.label);
            Ok(())
        } else {
            Err(VigiloError::ServiceManager(format!(
                "Failed to load LaunchAgent: {}",
                stderr.trim()
            )))
        }
    }

    fn unload(&self, plist: &Path) -> Result<()> {
        // bootout and unload both SIGTERM the job's process, which is us
        if self.is_current_job() {
            tracing::info!(
                "Running as LaunchAgent {}, job stays loaded until logout",
                self.label
            );
            return Ok(());
        }

        let service = format!("{}/{}", Self::domain_target(), self.label);

        if let Ok(out) = Self::run(&["bootout", service.as_str()]) {
            if out.status.success() {
                tracing::info!("Unloaded LaunchAgent: {}", self.label);
                return Ok(());
            }
        }

        let plist = plist.to_string_lossy();
        let out = Self::run(&["unload", "-w", plist.as_ref()])?;
        let stderr = String::from_utf8_lossy(&out.stderr);
        if out.status.success() || stderr.contains("not loaded") || stderr.contains("Could not find") {
            Ok(())
        } else {
            Err(VigiloError::ServiceManager(format!(
                "Failed to unload LaunchAgent: {}",
                stderr.trim()
            )))
        }
    }
}

/// Installs and removes the LaunchAgent plist.
pub struct LoginRegistrar<S: ServiceManager = Launchctl> {
    plist_path: PathBuf,
    executable: PathBuf,
    log_file: PathBuf,
    template: String,
    service: S,
}

impl LoginRegistrar<Launchctl> {
    /// Registrar for the running executable, driving `launchctl`.
    pub fn for_current_exe(plist_path: impl Into<PathBuf>, log_file: impl Into<PathBuf>) -> Result<Self> {
        let executable = std::env::current_exe().map_err(|e| VigiloError::filesystem("current_exe", e))?;
        Ok(Self::new(plist_path, executable, log_file, Launchctl::default()))
    }
}

impl<S: ServiceManager> LoginRegistrar<S> {
    pub fn new(
        plist_path: impl Into<PathBuf>,
        executable: impl Into<PathBuf>,
        log_file: impl Into<PathBuf>,
        service: S,
    ) -> Self {
        Self {
            plist_path: plist_path.into(),
            executable: executable.into(),
            log_file: log_file.into(),
            template: PLIST_TEMPLATE.to_string(),
            service,
        }
    }

    #[cfg(test)]
    fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn plist_path(&self) -> &Path {
        &self.plist_path
    }

    pub fn is_registered(&self) -> bool {
        self.plist_path.exists()
    }

    pub fn registration(&self) -> StartupRegistration {
        if self.is_registered() {
            StartupRegistration::Registered
        } else {
            StartupRegistration::Unregistered
        }
    }

    /// Flip the registration and return the new state.
    pub fn toggle(&mut self) -> Result<StartupRegistration> {
        if self.is_registered() {
            self.unregister()
        } else {
            self.register()
        }
    }

    /// Write the plist and ask launchd to load it.
    pub fn register(&mut self) -> Result<StartupRegistration> {
        let content = render_plist(&self.template, &self.executable, &self.log_file);

        if let Some(parent) = self.plist_path.parent() {
            fs::create_dir_all(parent).map_err(|e| VigiloError::filesystem(parent, e))?;
        }
        fs::write(&self.plist_path, content)
            .map_err(|e| VigiloError::filesystem(&self.plist_path, e))?;
        tracing::info!("Created LaunchAgent plist at: {}", self.plist_path.display());

        if let Err(e) = self.service.load(&self.plist_path) {
            tracing::warn!("{}", e);
        }
        Ok(StartupRegistration::Registered)
    }

    /// Ask launchd to drop the job, then delete the plist.
    pub fn unregister(&mut self) -> Result<StartupRegistration> {
        if let Err(e) = self.service.unload(&self.plist_path) {
            tracing::warn!("{}", e);
        }

        match fs::remove_file(&self.plist_path) {
            Ok(()) => tracing::info!("Removed LaunchAgent plist: {}", self.plist_path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(VigiloError::filesystem(&self.plist_path, e)),
        }
        Ok(StartupRegistration::Unregistered)
    }
}

/// Substitute the XML-escaped executable and log paths into the template.
pub fn render_plist(template: &str, executable: &Path, log_file: &Path) -> String {
    let exec = escape_xml(&executable.to_string_lossy());
    let log = escape_xml(&log_file.to_string_lossy());
    template
        .replace(EXEC_PLACEHOLDER, &exec)
        .replace(LOG_PLACEHOLDER, &log)
}

/// Escape special characters for XML.
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Records calls instead of running launchctl.
    #[derive(Default)]
    struct RecordingService {
        calls: RefCell<Vec<String>>,
        fail: bool,
    }

    impl ServiceManager for RecordingService {
        fn load(&self, plist: &Path) -> Result<()> {
            self.calls
                .borrow_mut()
                .push(format!("load {}", plist.display()));
            if self.fail {
                return Err(VigiloError::ServiceManager("launchctl missing".to_string()));
            }
            Ok(())
        }

        fn unload(&self, plist: &Path) -> Result<()> {
            // The file must still be there when launchd is asked to drop it
            assert!(plist.exists());
            self.calls
                .borrow_mut()
                .push(format!("unload {}", plist.display()));
            if self.fail {
                return Err(VigiloError::ServiceManager("launchctl missing".to_string()));
            }
            Ok(())
        }
    }

    fn registrar(dir: &TempDir) -> LoginRegistrar<RecordingService> {
        let plist = dir
            .path()
            .join("Library")
            .join("LaunchAgents")
            .join("com.angluster.vigilo.plist");
        LoginRegistrar::new(
            plist,
            "/Applications/Vigilo.app/Contents/MacOS/vigilo",
            "/Users/me/Library/Application Support/com.angluster.Vigilo/vigilo.log",
            RecordingService::default(),
        )
    }

    #[test]
    fn test_starts_unregistered() {
        let dir = TempDir::new().unwrap();
        let registrar = registrar(&dir);
        assert!(!registrar.is_registered());
        assert_eq!(registrar.registration(), StartupRegistration::Unregistered);
    }

    #[test]
    fn test_register_writes_rendered_plist() {
        let dir = TempDir::new().unwrap();
        let mut registrar = registrar(&dir);

        assert_eq!(registrar.toggle().unwrap(), StartupRegistration::Registered);

        let content = fs::read_to_string(registrar.plist_path()).unwrap();
        assert!(!content.contains(EXEC_PLACEHOLDER));
        assert!(content.contains("<string>/Applications/Vigilo.app/Contents/MacOS/vigilo</string>"));
        assert!(content.contains("<string>com.angluster.vigilo</string>"));
        assert!(content.contains("<key>VIGILO_ROLE</key>"));
        assert!(!content.contains(LOG_PLACEHOLDER));
        assert_eq!(
            content
                .matches("<string>/Users/me/Library/Application Support/com.angluster.Vigilo/vigilo.log</string>")
                .count(),
            2
        );
        assert_eq!(
            *registrar.service.calls.borrow(),
            vec![format!("load {}", registrar.plist_path().display())]
        );
    }

    #[test]
    fn test_toggle_alternates() {
        let dir = TempDir::new().unwrap();
        let mut registrar = registrar(&dir);

        for round in 1..=5 {
            let state = registrar.toggle().unwrap();
            let odd = round % 2 == 1;
            assert_eq!(state.is_registered(), odd);
            assert_eq!(registrar.is_registered(), odd);
        }
        assert!(registrar.is_registered());

        registrar.toggle().unwrap();
        assert!(!registrar.is_registered());
    }

    #[test]
    fn test_unregister_unloads_before_delete() {
        let dir = TempDir::new().unwrap();
        let mut registrar = registrar(&dir);
        registrar.register().unwrap();

        assert_eq!(registrar.toggle().unwrap(), StartupRegistration::Unregistered);
        assert!(!registrar.plist_path().exists());
        let calls = registrar.service.calls.borrow();
        assert_eq!(calls.len(), 2);
        assert!(calls[1].starts_with("unload "));
    }

    #[test]
    fn test_service_failure_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let mut registrar = registrar(&dir);
        registrar.service.fail = true;

        assert_eq!(registrar.toggle().unwrap(), StartupRegistration::Registered);
        assert!(registrar.is_registered());
        assert_eq!(registrar.toggle().unwrap(), StartupRegistration::Unregistered);
        assert!(!registrar.is_registered());
    }

    #[test]
    fn test_write_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        // A file where the LaunchAgents directory should be
        let blocker = dir.path().join("LaunchAgents");
        fs::write(&blocker, "").unwrap();
        let mut registrar = LoginRegistrar::new(
            blocker.join("com.angluster.vigilo.plist"),
            "/usr/local/bin/vigilo",
            "/tmp/vigilo.log",
            RecordingService::default(),
        );

        let err = registrar.toggle().unwrap_err();
        assert!(matches!(err, VigiloError::Filesystem { .. }));
        assert!(!registrar.is_registered());
        assert!(registrar.service.calls.borrow().is_empty());
    }

    #[test]
    fn test_render_escapes_path() {
        let rendered = render_plist(
            "<string>%EXEC_LOCATION%</string><string>%LOG_LOCATION%</string>",
            Path::new("/Users/a&b/<vigilo>"),
            Path::new("/Users/a&b/vigilo.log"),
        );
        assert_eq!(
            rendered,
            "<string>/Users/a&amp;b/&lt;vigilo&gt;</string><string>/Users/a&amp;b/vigilo.log</string>"
        );
    }

    #[test]
    fn test_custom_template() {
        let dir = TempDir::new().unwrap();
        let mut registrar = registrar(&dir).with_template("exec=%EXEC_LOCATION%\nagain=%EXEC_LOCATION%");
        registrar.register().unwrap();

        let content = fs::read_to_string(registrar.plist_path()).unwrap();
        assert_eq!(
            content,
            "exec=/Applications/Vigilo.app/Contents/MacOS/vigilo\nagain=/Applications/Vigilo.app/Contents/MacOS/vigilo"
        );
    }

    #[test]
    fn test_launchctl_recognises_own_job() {
        assert!(Launchctl::for_job(LAUNCH_AGENT_LABEL, Some(LAUNCH_AGENT_LABEL.to_string())).is_current_job());
        assert!(!Launchctl::for_job(LAUNCH_AGENT_LABEL, Some("application.com.apple.Terminal".to_string())).is_current_job());
        assert!(!Launchctl::for_job(LAUNCH_AGENT_LABEL, None).is_current_job());
    }

    #[test]
    fn test_unregister_from_own_job_leaves_it_running() {
        // launchctl is never invoked, so this succeeds with or without it installed
        let dir = TempDir::new().unwrap();
        let plist = dir.path().join("com.angluster.vigilo.plist");
        let service = Launchctl::for_job(LAUNCH_AGENT_LABEL, Some(LAUNCH_AGENT_LABEL.to_string()));
        assert!(service.unload(&plist).is_ok());

        fs::write(&plist, PLIST_TEMPLATE).unwrap();
        let mut registrar = LoginRegistrar::new(&plist, "/usr/local/bin/vigilo", "/tmp/vigilo.log", service);
        assert!(registrar.is_registered());
        assert_eq!(registrar.toggle().unwrap(), StartupRegistration::Unregistered);
        assert!(!plist.exists());
    }
}
