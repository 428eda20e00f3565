//! Exits the process when the config file changes on disk, so an external
//! supervisor (systemd, a container orchestrator) restarts it with the new
//! configuration picked up fresh. This is deliberately crude: the core
//! never reloads config live (§1's out-of-scope list).

use notify::{RecursiveMode, Watcher};
use std::path::Path;
use tracing::{error, warn};

pub fn watch_config_for_exit(path: &Path) {
    let path = path.to_owned();
    let (tx, rx) = std::sync::mpsc::channel();

    let mut watcher = match notify::recommended_watcher(tx) {
        Ok(w) => w,
        Err(e) => {
            error!(error = %e, "failed to start config file watcher");
            return;
        }
    };
    if let Err(e) = watcher.watch(&path, RecursiveMode::NonRecursive) {
        error!(error = %e, path = %path.display(), "failed to watch config file");
        return;
    }

    std::thread::spawn(move || {
        // Keep the watcher alive for the lifetime of this thread.
        let _watcher = watcher;
        for event in rx {
            match event {
                Ok(event) if matches!(event.kind, notify::EventKind::Modify(_) | notify::EventKind::Remove(_)) => {
                    warn!(path = %path.display(), "config file changed on disk, exiting for restart");
                    std::process::exit(0);
                }
                Ok(_) => continue,
                Err(e) => {
                    error!(error = %e, "config watcher error");
                }
            }
        }
    });
}
