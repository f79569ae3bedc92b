//! Browser session bootstrap settings.

use crate::result::{TestError, TestResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info};

/// How a browser session is launched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrowserSettings {
    /// UI language, e.g. `en-US`
    pub language: String,
    /// Default download directory
    pub download_dir: Option<PathBuf>,
    /// GPU acceleration
    pub gpu: bool,
    /// Trust invalid TLS certificates
    pub accept_invalid_certs: bool,
    /// Run without a visible window
    pub headless: bool,
    /// Initial window width
    pub viewport_width: u32,
    /// Initial window height
    pub viewport_height: u32,
    /// Chromium binary (None = auto-detect)
    pub executable: Option<PathBuf>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
    /// Command run once before launching to check the browser is installed
    pub driver_check: Option<Vec<String>>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            download_dir: None,
            gpu: false,
            accept_invalid_certs: false,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            executable: None,
            sandbox: true,
            driver_check: None,
        }
    }
}

impl BrowserSettings {
    /// Create default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the UI language
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set the download directory
    #[must_use]
    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = Some(dir.into());
        self
    }

    /// Toggle GPU acceleration
    #[must_use]
    pub const fn with_gpu(mut self, enabled: bool) -> Self {
        self.gpu = enabled;
        self
    }

    /// Trust invalid TLS certificates
    #[must_use]
    pub const fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set the chromium binary
    #[must_use]
    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }

    /// Check the browser binary with `command args...` before launching
    #[must_use]
    pub fn with_driver_check<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.driver_check = Some(command.into_iter().map(Into::into).collect());
        self
    }

    /// Command-line switches derived from these settings
    #[must_use]
    pub fn browser_args(&self) -> Vec<String> {
        let mut args = vec![format!("--lang={}", self.language)];
        if !self.gpu {
            args.push("--disable-gpu".to_string());
        }
        if self.accept_invalid_certs {
            args.push("--ignore-certificate-errors".to_string());
        }
        args
    }

    /// Run the configured driver check, if any
    ///
    /// # Errors
    ///
    /// Returns [`TestError::DriverNotFound`] if the check fails
    pub async fn run_driver_check(&self) -> TestResult<()> {
        match self.driver_check.as_deref() {
            Some([command, args @ ..]) => {
                let args: Vec<&str> = args.iter().map(String::as_str).collect();
                verify_driver_binary(command, &args).await.map(|_| ())
            }
            Some([]) => Err(TestError::configuration("driver_check command is empty")),
            None => Ok(()),
        }
    }
}

/// Run `command args...` once and return its stdout.
///
/// # Errors
///
/// Returns [`TestError::DriverNotFound`] when the command cannot be spawned or
/// exits unsuccessfully; the message carries stderr (or stdout when stderr is
/// empty).
pub async fn verify_driver_binary(command: &str, args: &[&str]) -> TestResult<String> {
    debug!(command, ?args, "checking browser driver");
    let output = Command::new(command)
        .args(args)
        .output()
        .await
        .map_err(|e| TestError::DriverNotFound {
            command: command.to_string(),
            message: e.to_string(),
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(TestError::DriverNotFound {
            command: command.to_string(),
            message: if stderr.is_empty() { stdout } else { stderr },
        });
    }
    info!(command, version = %stdout, "browser driver found");
    Ok(stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let args = BrowserSettings::new().browser_args();
        assert_eq!(args, ["--lang=en-US", "--disable-gpu"]);
    }

    #[test]
    fn test_builder_args() {
        let settings = BrowserSettings::new()
            .with_language("es-ES")
            .with_gpu(true)
            .with_accept_invalid_certs(true)
            .with_viewport(800, 600);
        assert_eq!(settings.browser_args(), ["--lang=es-ES", "--ignore-certificate-errors"]);
        assert_eq!(settings.viewport_width, 800);
    }

    #[test]
    fn test_yaml_settings() {
        let settings: BrowserSettings =
            serde_yaml_ng::from_str("language: fr-FR\nheadless: false\ndownload_dir: /tmp/dl\n").unwrap();
        assert_eq!(settings.language, "fr-FR");
        assert!(!settings.headless);
        assert_eq!(settings.download_dir, Some(PathBuf::from("/tmp/dl")));
    }

    #[tokio::test]
    async fn test_verify_returns_stdout() {
        let out = verify_driver_binary("sh", &["-c", "echo chromium 120"]).await.unwrap();
        assert_eq!(out, "chromium 120");
    }

    #[tokio::test]
    async fn test_verify_missing_binary() {
        let err = verify_driver_binary("definitely-not-a-browser-driver", &[]).await.unwrap_err();
        assert!(matches!(err, TestError::DriverNotFound { .. }));
        assert!(err.to_string().contains("definitely-not-a-browser-driver"));
    }

    #[tokio::test]
    async fn test_verify_failing_command_carries_stderr() {
        let err = verify_driver_binary("sh", &["-c", "echo not installed >&2; exit 3"])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not installed"));
    }

    #[tokio::test]
    async fn test_run_driver_check() {
        assert!(BrowserSettings::new().run_driver_check().await.is_ok());
        let settings = BrowserSettings::new().with_driver_check(["sh", "-c", "exit 1"]);
        assert!(settings.run_driver_check().await.is_err());
    }
}
