use std::path::PathBuf;

use crossbeam::channel::{Receiver, bounded};
use tracing::warn;

/// Outcome of the background version check, handed to the UI thread through
/// a channel and consumed on a main tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    UpToDate,
    UpdateAvailable { latest: String },
    CheckFailed { reason: String },
}

/// Spawns the version check on its own thread. The fetcher is injected so
/// the check stays testable offline; the thread touches nothing but the
/// returned channel.
pub fn spawn<F>(current_version: &str, fetch: F) -> Receiver<UpdateStatus>
where
    F: FnOnce() -> Result<String, String> + Send + 'static,
{
    let (tx, rx) = bounded(1);
    let current = current_version.to_string();
    std::thread::spawn(move || {
        let status = match fetch() {
            Ok(latest) => {
                if is_newer(&latest, &current) {
                    UpdateStatus::UpdateAvailable { latest }
                } else {
                    UpdateStatus::UpToDate
                }
            }
            Err(reason) => {
                warn!(%reason, "update check failed");
                UpdateStatus::CheckFailed { reason }
            }
        };
        let _ = tx.send(status);
    });
    rx
}

/// Fetcher reading a release manifest dropped next to the installation: a
/// single line holding the latest published version.
pub fn manifest_fetcher(path: PathBuf) -> impl FnOnce() -> Result<String, String> {
    move || {
        std::fs::read_to_string(&path)
            .map(|text| text.trim().to_string())
            .map_err(|err| format!("{}: {err}", path.display()))
    }
}

/// Dotted-numeric version comparison; non-numeric parts compare as zero.
fn is_newer(latest: &str, current: &str) -> bool {
    let parse = |v: &str| -> Vec<u64> {
        v.trim_start_matches('v')
            .split('.')
            .map(|part| part.parse().unwrap_or(0))
            .collect()
    };
    let latest = parse(latest);
    let current = parse(current);
    for i in 0..latest.len().max(current.len()) {
        let l = latest.get(i).copied().unwrap_or(0);
        let c = current.get(i).copied().unwrap_or(0);
        if l != c {
            return l > c;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn version_ordering() {
        assert!(is_newer("0.2.0", "0.1.0"));
        assert!(is_newer("1.0", "0.9.9"));
        assert!(is_newer("v0.1.1", "0.1.0"));
        assert!(!is_newer("0.1.0", "0.1.0"));
        assert!(!is_newer("0.1.0", "0.2.0"));
    }

    #[test]
    fn reports_available_update_through_channel() {
        let rx = spawn("0.1.0", || Ok("0.3.0".to_string()));
        let status = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(
            status,
            UpdateStatus::UpdateAvailable {
                latest: "0.3.0".to_string()
            }
        );
    }

    #[test]
    fn reports_failure_without_panicking() {
        let rx = spawn("0.1.0", || Err("offline".to_string()));
        let status = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(status, UpdateStatus::CheckFailed { .. }));
    }

    #[test]
    fn manifest_fetcher_reads_version_line() {
        let path = std::env::temp_dir().join("clavio-manifest-test.txt");
        std::fs::write(&path, "0.9.1\n").unwrap();
        let fetch = manifest_fetcher(path.clone());
        assert_eq!(fetch().unwrap(), "0.9.1");
        let _ = std::fs::remove_file(&path);
    }
}
