//! `ps`-based process locator for hosts without procfs.

use super::{matches_name, LocateError, ProcessHandle, ProcessLocator};
use crate::bounded::IoBounds;
use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::debug;

/// One parsed row of `ps -o pid=,args=` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PsRow {
    pub pid: u32,
    pub args: Vec<String>,
}

/// Locates processes by running `ps`.
///
/// `ps` joins the argument vector with spaces, so arguments that contained
/// whitespace are split; flag values of node processes never do.
#[derive(Debug, Clone)]
pub struct PsLocator {
    bounds: IoBounds,
}

impl PsLocator {
    pub fn new(bounds: IoBounds) -> Self {
        Self { bounds }
    }

    fn run_ps(&self) -> Result<String, LocateError> {
        let mut child = Command::new("ps")
            .args(["-axww", "-o", "pid=", "-o", "args="])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| LocateError::Command(e.to_string()))?;

        let pid = child.id();
        let timeout = self.bounds.timeout();
        // Set under the lock before `wait()`, so the watchdog only ever
        // signals a child that has not been reaped yet.
        let finished = Arc::new(Mutex::new(false));
        let timed_out = Arc::new(AtomicBool::new(false));

        {
            let finished = finished.clone();
            let timed_out = timed_out.clone();
            thread::spawn(move || {
                thread::sleep(timeout);
                let finished = finished.lock().unwrap_or_else(|p| p.into_inner());
                if !*finished {
                    timed_out.store(true, Ordering::Relaxed);
                    debug!(pid, "ps timed out, killing it");
                    #[cfg(unix)]
                    // SAFETY: `pid` is our own unreaped child; the lock held
                    // here keeps `wait()` from reaping it until we return.
                    unsafe {
                        libc::kill(pid as i32, libc::SIGKILL);
                    }
                }
            });
        }

        let mut output = String::new();
        let read = match child.stdout.take() {
            Some(mut stdout) => stdout.read_to_string(&mut output).map(|_| ()),
            None => Ok(()),
        };
        *finished.lock().unwrap_or_else(|p| p.into_inner()) = true;
        let status = child.wait();
        read.map_err(|e| LocateError::Command(e.to_string()))?;
        let status = status.map_err(|e| LocateError::Command(e.to_string()))?;

        if timed_out.load(Ordering::Relaxed) {
            return Err(LocateError::Timeout(timeout));
        }
        if !status.success() {
            return Err(LocateError::Command(format!("ps exited with {}", status)));
        }
        Ok(output)
    }
}

impl ProcessLocator for PsLocator {
    fn locate(&self, name: &str) -> Result<Option<ProcessHandle>, LocateError> {
        let output = self.run_ps()?;
        Ok(find_in_ps_output(&output, name))
    }
}

/// Parse `ps -o pid=,args=` output. Malformed rows are skipped.
pub fn parse_ps_output(output: &str) -> Vec<PsRow> {
    let mut rows: Vec<PsRow> = output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let pid = fields.next()?.parse().ok()?;
            let args: Vec<String> = fields.map(str::to_string).collect();
            if args.is_empty() {
                return None;
            }
            Some(PsRow { pid, args })
        })
        .collect();
    rows.sort_by_key(|r| r.pid);
    rows
}

/// Lowest-pid process in `ps` output whose argv0 basename is `name`.
pub fn find_in_ps_output(output: &str, name: &str) -> Option<ProcessHandle> {
    parse_ps_output(output)
        .into_iter()
        .find(|row| matches_name(name, &row.args[0], None))
        .map(|row| ProcessHandle::new(name, row.pid, row.args))
}
