use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::process::{Child, Command};

use super::process::run_with_timeout;
use super::{ensure_output, Converter};
use crate::bill::GeneratorError;

pub const DEFAULT_DISPLAY_BASE: u32 = 99;
pub const DEFAULT_DISPLAY_SPAN: u32 = 100;
pub const DEFAULT_STARTUP_DELAY: Duration = Duration::from_millis(500);

static NEXT_DISPLAY: AtomicU32 = AtomicU32::new(0);

/// An `Xvfb` server owned by a single conversion.
///
/// Call [`VirtualDisplay::shutdown`] to kill and reap it; dropping it without
/// shutdown still sends the kill signal.
#[derive(Debug)]
pub struct VirtualDisplay {
    name: String,
    child: Option<Child>,
}

impl VirtualDisplay {
    /// Start `binary` on display `:number` and wait `settle` for it to come up.
    pub async fn start(
        binary: &str,
        number: u32,
        settle: Duration,
    ) -> Result<Self, GeneratorError> {
        let name = format!(":{}", number);
        let child = Command::new(binary)
            .arg(&name)
            .args(["-screen", "0", "1280x1024x24", "-nolisten", "tcp"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| GeneratorError::DisplayStart {
                display: name.clone(),
                reason: format!("could not run {}: {}", binary, e),
            })?;

        let mut display = Self {
            name,
            child: Some(child),
        };
        tokio::time::sleep(settle).await;

        let exited = match display.child.as_mut().map(Child::try_wait) {
            Some(Ok(Some(status))) => Some(format!("exited early with {}", status)),
            Some(Err(e)) => Some(e.to_string()),
            _ => None,
        };
        if let Some(reason) = exited {
            display.child = None;
            return Err(GeneratorError::DisplayStart {
                display: display.name.clone(),
                reason,
            });
        }

        log::debug!("Virtual display {} started", display.name);
        Ok(display)
    }

    /// Value for the `DISPLAY` environment variable.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kill the display server and wait for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                log::warn!("Failed to stop virtual display {}: {}", self.name, e);
            } else {
                log::debug!("Virtual display {} stopped", self.name);
            }
        }
    }
}

impl Drop for VirtualDisplay {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            let _ = child.start_kill();
        }
    }
}

/// Converts through `unoconv` with the office suite attached to a private
/// `Xvfb` display. Concurrent conversions use distinct display numbers and
/// distinct UNO pipe names.
#[derive(Debug, Clone)]
pub struct HeadlessOfficeConverter {
    xvfb_binary: String,
    bridge_binary: String,
    timeout: Duration,
    display_base: u32,
    display_span: u32,
    startup_delay: Duration,
}

impl HeadlessOfficeConverter {
    pub fn new(
        xvfb_binary: impl Into<String>,
        bridge_binary: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            xvfb_binary: xvfb_binary.into(),
            bridge_binary: bridge_binary.into(),
            timeout,
            display_base: DEFAULT_DISPLAY_BASE,
            display_span: DEFAULT_DISPLAY_SPAN,
            startup_delay: DEFAULT_STARTUP_DELAY,
        }
    }

    pub fn with_displays(mut self, base: u32, span: u32) -> Self {
        self.display_base = base;
        self.display_span = span.max(1);
        self
    }

    pub fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    /// Next display number in `base..base + span`, round robin.
    pub fn allocate_display(&self) -> u32 {
        let n = NEXT_DISPLAY.fetch_add(1, Ordering::Relaxed);
        self.display_base + n % self.display_span
    }

    fn bridge_command(
        &self,
        display: &VirtualDisplay,
        number: u32,
        source: &Path,
        target: &Path,
    ) -> Command {
        let mut command = Command::new(&self.bridge_binary);
        command
            .env("DISPLAY", display.name())
            .arg("--pipe")
            .arg(format!("rentbill_{}", number))
            .arg("--format")
            .arg("pdf")
            .arg("--output")
            .arg(target)
            .arg(source);
        command
    }
}

#[async_trait]
impl Converter for HeadlessOfficeConverter {
    fn name(&self) -> &'static str {
        "headless-office"
    }

    async fn convert(&self, source: &Path, target: &Path) -> Result<(), GeneratorError> {
        let number = self.allocate_display();
        let display = VirtualDisplay::start(&self.xvfb_binary, number, self.startup_delay).await?;

        log::debug!(
            "Converting {} with {} on display {}",
            source.display(),
            self.bridge_binary,
            display.name()
        );
        let command = self.bridge_command(&display, number, source, target);
        let result = run_with_timeout(command, &self.bridge_binary, self.timeout).await;

        display.shutdown().await;
        result?;
        ensure_output(target).await
    }
}
