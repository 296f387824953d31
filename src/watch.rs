use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info, log, warn, Level};
use notify::{Event, RecursiveMode, Watcher};

use crate::config::InjectConfig;
use crate::error::InjectError;
use crate::inject;

const POLL: Duration = Duration::from_millis(100);

/// Absolute form of `path` with its longest existing prefix canonicalized,
/// so files in directories that do not exist yet still get a stable name.
fn resolve(path: &Path) -> io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut existing = absolute.as_path();
    let mut missing: Vec<OsString> = Vec::new();
    loop {
        if let Ok(mut resolved) = existing.canonicalize() {
            resolved.extend(missing.iter().rev());
            return Ok(resolved);
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return Ok(absolute),
        }
    }
}

/// A watched file.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    path: PathBuf,
}

impl Target {
    fn new(path: &Path) -> Result<Self> {
        path.file_name()
            .with_context(|| format!("'{}' has no file name", path.display()))?;
        let path = resolve(path).with_context(|| format!("cannot resolve '{}'", path.display()))?;
        Ok(Self { path })
    }

    fn matches(&self, path: &Path) -> bool {
        if path.file_name() != self.path.file_name() {
            return false;
        }
        path == self.path || resolve(path).map(|p| p == self.path).unwrap_or(false)
    }

    /// The directory to watch for this file: its parent, or the closest
    /// ancestor that exists while the parent is still missing.
    fn watch_dir(&self) -> Option<PathBuf> {
        self.path
            .parent()?
            .ancestors()
            .find(|dir| dir.is_dir())
            .map(Path::to_path_buf)
    }
}

fn is_relevant(event: &Event, targets: &[Target]) -> bool {
    (event.kind.is_modify() || event.kind.is_create())
        && event
            .paths
            .iter()
            .any(|p| targets.iter().any(|t| t.matches(p)))
}

/// Directories currently under watch. Re-armed as the directories holding
/// the targets appear, disappear, or get recreated.
#[derive(Debug, Default)]
struct Watches {
    dirs: Vec<PathBuf>,
}

impl Watches {
    /// Bring the watched set in line with the targets. Returns true when a
    /// directory was newly watched, since its contents may have changed
    /// unobserved.
    fn reconcile<W: Watcher>(&mut self, watcher: &mut W, targets: &[Target]) -> bool {
        let mut wanted: Vec<PathBuf> = Vec::new();
        for dir in targets.iter().filter_map(Target::watch_dir) {
            if !wanted.contains(&dir) {
                wanted.push(dir);
            }
        }

        for dir in self.dirs.iter().filter(|d| !wanted.contains(*d)) {
            let _ = watcher.unwatch(dir);
            debug!("stopped watching {}", dir.display());
        }
        self.dirs.retain(|d| wanted.contains(d));

        let mut armed = false;
        for dir in wanted {
            if self.dirs.contains(&dir) {
                continue;
            }
            match watcher.watch(&dir, RecursiveMode::NonRecursive) {
                Ok(()) => {
                    debug!("watching {}", dir.display());
                    self.dirs.push(dir);
                    armed = true;
                }
                Err(e) => warn!("cannot watch '{}': {e}", dir.display()),
            }
        }
        armed
    }

    /// Drop a watched directory that was removed, so a recreated one gets a
    /// fresh watch.
    fn forget<W: Watcher>(&mut self, watcher: &mut W, path: &Path) {
        if let Some(i) = self.dirs.iter().position(|d| d == path) {
            let dir = self.dirs.swap_remove(i);
            let _ = watcher.unwatch(&dir);
            debug!("{} removed", dir.display());
        }
    }
}

/// Missing inputs and placeholder problems are expected while the CSS build
/// is catching up; anything else is a real failure.
fn failure_level(e: &InjectError) -> Level {
    if e.is_build_misconfiguration() {
        Level::Warn
    } else {
        Level::Error
    }
}

fn rebuild(config: &InjectConfig) {
    if let Err(e) = inject::run(config) {
        log!(failure_level(&e), "{e}");
    }
}

/// Inject once, then again whenever the stylesheet or template changes.
/// Blocks until the watcher shuts down.
pub fn watch(config: &InjectConfig) -> Result<()> {
    let (_keep_alive, stop) = mpsc::channel();
    watch_until(config, &stop)
}

/// Like [`watch`], returning once `stop` receives a message or its sender
/// is dropped.
pub fn watch_until(config: &InjectConfig, stop: &Receiver<()>) -> Result<()> {
    let targets = vec![Target::new(&config.stylesheet)?, Target::new(&config.template)?];

    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let _ = tx.send(res);
    })?;
    let mut watches = Watches::default();
    watches.reconcile(&mut watcher, &targets);

    info!("style-inject watch");
    info!("  stylesheet: {}", config.stylesheet.display());
    info!("  template:   {}", config.template.display());
    info!("  output:     {}", config.output_path().display());
    info!("  watching for changes...");

    rebuild(config);

    loop {
        match stop.try_recv() {
            Err(TryRecvError::Empty) => {}
            Ok(()) | Err(TryRecvError::Disconnected) => break,
        }

        let first = match rx.recv_timeout(POLL) {
            Ok(res) => res,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        // Coalesce a burst of events from one save into a single rebuild.
        let mut dirty = false;
        for res in std::iter::once(first).chain(rx.try_iter()) {
            match res {
                Ok(event) => {
                    if event.kind.is_remove() {
                        for path in &event.paths {
                            watches.forget(&mut watcher, path);
                        }
                    }
                    dirty |= is_relevant(&event, &targets);
                }
                Err(e) => warn!("watch error: {e}"),
            }
        }
        dirty |= watches.reconcile(&mut watcher, &targets);

        if dirty {
            rebuild(config);
        }
    }

    drop(watcher);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::thread;
    use std::time::Instant;

    use notify::event::{AccessKind, CreateKind, DataChange, EventKind, ModifyKind};

    const TEMPLATE: &str = "static styles = [css`/* TAILWIND_PLACEHOLDER */`];\n";

    fn modify(path: PathBuf) -> Event {
        Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content))).add_path(path)
    }

    fn wait_for(path: &Path, needle: &str) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if fs::read_to_string(path).map(|s| s.contains(needle)).unwrap_or(false) {
                return true;
            }
            thread::sleep(Duration::from_millis(50));
        }
        false
    }

    #[test]
    fn matches_only_watched_files() {
        let dir = tempfile::tempdir().unwrap();
        let css = dir.path().join("styles.css");
        let targets = vec![Target::new(&css).unwrap()];
        let canonical = dir.path().canonicalize().unwrap();

        assert!(is_relevant(&modify(canonical.join("styles.css")), &targets));
        assert!(!is_relevant(&modify(canonical.join("other.css")), &targets));
        assert!(!is_relevant(
            &modify(canonical.join("cw-navigation.compiled.ts")),
            &targets
        ));
    }

    #[test]
    fn create_counts_but_access_does_not() {
        let dir = tempfile::tempdir().unwrap();
        let ts = dir.path().join("cw-navigation.ts");
        let targets = vec![Target::new(&ts).unwrap()];
        let path = dir.path().canonicalize().unwrap().join("cw-navigation.ts");

        let created = Event::new(EventKind::Create(CreateKind::File)).add_path(path.clone());
        assert!(is_relevant(&created, &targets));

        let accessed = Event::new(EventKind::Access(AccessKind::Any)).add_path(path);
        assert!(!is_relevant(&accessed, &targets));
    }

    #[test]
    fn missing_directory_falls_back_to_existing_ancestor() {
        let dir = tempfile::tempdir().unwrap();
        let canonical = dir.path().canonicalize().unwrap();
        let target = Target::new(&dir.path().join("dist/css/styles.css")).unwrap();

        assert_eq!(target.path, canonical.join("dist/css/styles.css"));
        assert_eq!(target.watch_dir(), Some(canonical.clone()));
        assert!(is_relevant(&modify(canonical.join("dist/css/styles.css")), &[target.clone()]));

        fs::create_dir_all(dir.path().join("dist/css")).unwrap();
        assert_eq!(target.watch_dir(), Some(canonical.join("dist/css")));
    }

    #[test]
    fn stale_inputs_log_as_warnings() {
        let missing = InjectError::MissingInput {
            path: PathBuf::from("dist/styles.css"),
        };
        assert_eq!(failure_level(&missing), Level::Warn);

        let denied = InjectError::write(
            "cw-navigation.compiled.ts",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(failure_level(&denied), Level::Error);
    }

    #[test]
    fn reinjects_when_stylesheet_directory_appears_and_is_recreated() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("cw-navigation.ts"), TEMPLATE).unwrap();
        let config = InjectConfig::default().rooted_at(dir.path());
        let output = config.output_path();
        let dist = dir.path().join("dist");

        let (stop_tx, stop_rx) = mpsc::channel();
        let handle = thread::spawn({
            let config = config.clone();
            move || watch_until(&config, &stop_rx)
        });

        thread::sleep(Duration::from_millis(300));
        assert!(!output.exists(), "nothing to inject before the CSS build runs");

        fs::create_dir_all(&dist).unwrap();
        fs::write(dist.join("styles.css"), ".first{}").unwrap();
        let first = wait_for(&output, "css`.first{}`");

        fs::remove_dir_all(&dist).unwrap();
        fs::create_dir_all(&dist).unwrap();
        fs::write(dist.join("styles.css"), ".second{}").unwrap();
        let second = wait_for(&output, "css`.second{}`");

        stop_tx.send(()).unwrap();
        handle.join().unwrap().unwrap();

        assert!(first, "stylesheet created after start was not injected");
        assert!(second, "stylesheet in a recreated directory was not injected");
    }
}
