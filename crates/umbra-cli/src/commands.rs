//! Command handlers.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};
use umbra::native::{FileStorage, NativePlatform};
use umbra::{PreferenceStore, ThemeConfig, ThemeEngine, ThemeSnapshot};

use crate::cli::{Cli, Command, SetArgs, WatchArgs};
use crate::render::{self, Report};

/// Runs the parsed command, writing its output to `out`.
pub fn run<W: Write>(cli: &Cli, out: &mut W) -> Result<()> {
    let session = Session::open(cli)?;
    match &cli.command {
        None | Some(Command::Show) => show(&session, cli.json, out),
        Some(Command::Set(args)) => set(&session, args, cli.json, out),
        Some(Command::Reset) => reset(&session, cli.json, out),
        Some(Command::Themes) => themes(&session, cli.json, out),
        Some(Command::Watch(args)) => watch(&session, args, cli.json, out),
    }
}

/// A configuration plus the native host it is mounted on.
struct Session {
    config: ThemeConfig,
    host: NativePlatform,
}

impl Session {
    fn open(cli: &Cli) -> Result<Self> {
        let config = match &cli.config {
            Some(path) => ThemeConfig::from_file(path)
                .with_context(|| format!("loading theme config {}", path.display()))?,
            None => ThemeConfig::new(),
        };
        let storage = match &cli.store {
            Some(path) => FileStorage::new(path),
            None => FileStorage::open_default()?,
        };
        debug!(path = %storage.path().display(), "using preference file");
        Ok(Self {
            config,
            host: NativePlatform::new(storage),
        })
    }

    /// Mounts an engine and lets the deferred style cleanup run.
    fn mount(&self) -> ThemeEngine {
        let engine = ThemeEngine::mount(self.config.clone(), self.host.platform());
        self.host.scheduler.run_pending();
        engine
    }

    fn report(&self, engine: &ThemeEngine) -> Report {
        Report::new(engine.snapshot(), &self.config, &self.host.document)
    }

    fn stored(&self) -> Result<Option<String>> {
        let key = self.config.storage_key();
        let path = self.host.storage.path();
        self.host
            .storage
            .get(key)
            .with_context(|| format!("reading '{}' from {}", key, path.display()))
    }
}

fn show<W: Write>(session: &Session, json: bool, out: &mut W) -> Result<()> {
    let engine = session.mount();
    render::report(out, &session.report(&engine), json)
}

fn set<W: Write>(session: &Session, args: &SetArgs, json: bool, out: &mut W) -> Result<()> {
    let engine = session.mount();
    if !engine.themes().contains(&args.theme) {
        warn!(theme = %args.theme, available = ?engine.themes(), "theme is not configured");
    }
    engine.set_theme(args.theme.as_str());
    session.host.scheduler.run_pending();

    // The engine ignores write failures; `set` reports them.
    if session.stored()?.as_deref() != Some(args.theme.as_str()) {
        bail!(
            "could not persist theme '{}' to {}",
            args.theme,
            session.host.storage.path().display()
        );
    }
    info!(theme = %args.theme, "theme saved");
    render::report(out, &session.report(&engine), json)
}

fn reset<W: Write>(session: &Session, json: bool, out: &mut W) -> Result<()> {
    let key = session.config.storage_key();
    let path = session.host.storage.path();
    session
        .host
        .storage
        .remove(key)
        .with_context(|| format!("removing '{}' from {}", key, path.display()))?;
    info!(key, "stored theme removed");

    let engine = session.mount();
    if !json {
        render::notice(
            out,
            &format!("Stored theme cleared; using default '{}'", session.config.default_theme()),
        )?;
    }
    render::report(out, &session.report(&engine), json)
}

fn themes<W: Write>(session: &Session, json: bool, out: &mut W) -> Result<()> {
    let engine = session.mount();
    render::themes(out, &engine.themes(), &engine.theme(), json)
}

fn watch<W: Write>(session: &Session, args: &WatchArgs, json: bool, out: &mut W) -> Result<()> {
    let engine = session.mount();
    render::event(out, &engine.snapshot(), json)?;
    out.flush()?;

    let changes: Rc<RefCell<Vec<ThemeSnapshot>>> = Rc::default();
    let sink = Rc::clone(&changes);
    let _subscription = engine.subscribe(move |snapshot| sink.borrow_mut().push(snapshot.clone()));

    let interval = Duration::from_millis(args.interval_ms);
    info!(
        interval_ms = args.interval_ms,
        path = %session.host.storage.path().display(),
        "watching for theme changes"
    );

    let mut seen = 0;
    loop {
        thread::sleep(interval);
        let outcome = session.host.poll();
        if outcome.any() {
            debug!(?outcome, "poll observed changes");
        }

        let batch: Vec<ThemeSnapshot> = changes.borrow_mut().drain(..).collect();
        for snapshot in &batch {
            render::event(out, snapshot, json)?;
            seen += 1;
            if args.count.is_some_and(|limit| seen >= limit) {
                out.flush()?;
                return Ok(());
            }
        }
        out.flush()?;
    }
}
