use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::bill::GeneratorError;

/// Kills every process in a child's process group when dropped.
struct ProcessGroup {
    leader: Option<u32>,
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if let Some(leader) = self.leader {
            kill_group(leader);
        }
    }
}

#[cfg(unix)]
fn kill_group(leader: u32) {
    if let Ok(pgid) = libc::pid_t::try_from(leader) {
        // SAFETY: killpg only sends a signal; an empty group yields ESRCH.
        unsafe {
            libc::killpg(pgid, libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_leader: u32) {}

/// Run `command` to completion, bounded by `timeout`.
///
/// The child runs in its own process group. The whole group, including
/// anything the child forked, is killed when this returns, whether it
/// finished, failed, timed out or was dropped.
pub(crate) async fn run_with_timeout(
    mut command: Command,
    program: &str,
    timeout: Duration,
) -> Result<(), GeneratorError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let child = command
        .spawn()
        .map_err(|source| GeneratorError::ConverterSpawn {
            program: program.to_string(),
            source,
        })?;
    let _group = ProcessGroup {
        leader: child.id(),
    };

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|source| GeneratorError::ConverterSpawn {
            program: program.to_string(),
            source,
        })?,
        Err(_) => {
            return Err(GeneratorError::ConverterTimeout {
                program: program.to_string(),
                seconds: timeout.as_secs(),
            })
        }
    };

    if !output.status.success() {
        let code = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(GeneratorError::ConverterExit {
            program: program.to_string(),
            code,
            stderr,
        });
    }

    log::debug!(
        "{} finished: {}",
        program,
        String::from_utf8_lossy(&output.stdout).trim()
    );
    Ok(())
}

/// True once `pid` is gone or a zombie. Waits up to two seconds for the
/// kill to land.
#[cfg(all(test, target_os = "linux"))]
pub(crate) async fn process_exited(pid: &str) -> bool {
    let stat = std::path::Path::new("/proc").join(pid.trim()).join("stat");
    for _ in 0..40 {
        let Ok(line) = std::fs::read_to_string(&stat) else {
            return true;
        };
        // Field three, after the parenthesised command name, is the state.
        let state = line.rsplit(')').next().unwrap_or_default().trim_start();
        if state.starts_with('Z') {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}
