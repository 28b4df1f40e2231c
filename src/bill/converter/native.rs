use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

use super::process::run_with_timeout;
use super::{ensure_output, Converter};
use crate::bill::GeneratorError;

const PROFILE_DIR: &str = ".office-profile";

/// Bytes escaped in the path of a `file://` URL.
const PATH_ESCAPES: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// `file://` URL for a local directory, as LibreOffice expects for
/// `-env:UserInstallation`.
fn file_url(path: &Path) -> String {
    let path = path.to_string_lossy();
    let encoded = utf8_percent_encode(&path, PATH_ESCAPES);
    if path.starts_with('/') {
        format!("file://{}", encoded)
    } else {
        format!("file:///{}", encoded)
    }
}

/// Converts with a direct `soffice --headless --convert-to pdf` call.
///
/// Each conversion gets its own LibreOffice profile next to the target so
/// concurrent requests do not contend for the user installation lock.
#[derive(Debug, Clone)]
pub struct NativeConverter {
    binary: String,
    timeout: Duration,
}

impl NativeConverter {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    fn command(&self, source: &Path, out_dir: &Path) -> Command {
        let profile = out_dir.join(PROFILE_DIR);
        let mut command = Command::new(&self.binary);
        command
            .arg("--headless")
            .arg("--norestore")
            .arg("--nologo")
            .arg(format!("-env:UserInstallation={}", file_url(&profile)))
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(out_dir)
            .arg(source);
        command
    }
}

#[async_trait]
impl Converter for NativeConverter {
    fn name(&self) -> &'static str {
        "native"
    }

    async fn convert(&self, source: &Path, target: &Path) -> Result<(), GeneratorError> {
        let out_dir = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        log::debug!("Converting {} with {}", source.display(), self.binary);
        run_with_timeout(self.command(source, &out_dir), &self.binary, self.timeout).await?;

        // soffice names its output after the source file.
        let produced = source
            .file_stem()
            .map(|stem| out_dir.join(stem).with_extension("pdf"))
            .ok_or_else(|| GeneratorError::NoOutput(target.to_path_buf()))?;
        if produced != target && tokio::fs::metadata(&produced).await.is_ok() {
            tokio::fs::rename(&produced, target)
                .await
                .map_err(|_| GeneratorError::NoOutput(target.to_path_buf()))?;
        }

        ensure_output(target).await
    }
}
