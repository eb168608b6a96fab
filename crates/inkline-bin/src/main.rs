//! Inkline headless driver.
//!
//! Loads a document into an `EditorModel`, replays an edit script against it,
//! lets background highlighting converge and prints the rendered rows.
mod script;

use anyhow::{Context, Result};
use clap::Parser;
use core_config::{EditorOptions, load_from};
use core_events::{Clock, SystemClock};
use core_model::{DisplayPatch, EditorModel};
use core_syntax::ModeRegistry;
use script::{Command, Step, parse_script};
use std::io::Write;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Once;
use tracing::{debug, error, info};
use tracing_appender::non_blocking::WorkerGuard;

const LOG_FILE: &str = "inkline.log";

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "inkline", version, about = "Inkline editing engine driver")]
struct Args {
    /// Document to load (UTF-8). An empty document is used when omitted.
    pub path: Option<PathBuf>,
    /// Configuration file (overrides discovery of `inkline.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Mode name, overriding the configured one.
    #[arg(long = "mode")]
    pub mode: Option<String>,
    /// Edit script to replay after loading.
    #[arg(long = "script")]
    pub script: Option<PathBuf>,
    /// Visible lines as START:END.
    #[arg(long = "viewport", value_parser = parse_viewport, default_value = "0:40")]
    pub viewport: Range<usize>,
}

fn parse_viewport(s: &str) -> Result<Range<usize>, String> {
    let (start, end) = s.split_once(':').ok_or("expected START:END")?;
    let start: usize = start.parse().map_err(|_| format!("bad start `{start}`"))?;
    let end: usize = end.parse().map_err(|_| format!("bad end `{end}`"))?;
    if end < start {
        return Err(format!("end {end} before start {start}"));
    }
    Ok(start..end)
}

fn configure_logging() -> Option<WorkerGuard> {
    let log_dir = Path::new(".");
    let log_path = log_dir.join(LOG_FILE);
    if log_path.exists() {
        let _ = std::fs::remove_file(&log_path);
    }

    let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE);
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(nb_writer)
        .with_ansi(false)
        .try_init()
        .ok()
        .map(|_| guard)
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}

fn read_document(path: Option<&Path>) -> String {
    let Some(path) = path else {
        return String::new();
    };
    match std::fs::read_to_string(path) {
        Ok(content) => {
            debug!(target: "io", file = %path.display(), size_bytes = content.len(), "file_read_ok");
            content
        }
        Err(e) => {
            error!(target: "io", file = %path.display(), ?e, "file_open_error");
            String::new()
        }
    }
}

/// Owns the model and feeds it script commands and timer ticks.
struct Driver {
    model: EditorModel,
    ticks: usize,
}

impl Driver {
    fn new(text: &str, options: EditorOptions, clock: Rc<dyn Clock>, viewport: Range<usize>) -> Result<Self> {
        let mut model = EditorModel::new(text, options, ModeRegistry::with_builtins(), clock)?;
        model.set_viewport(viewport)?;
        Ok(Self { model, ticks: 0 })
    }

    async fn run_script(&mut self, steps: &[Step]) -> Result<()> {
        for step in steps {
            self.apply(&step.command)
                .await
                .with_context(|| format!("script line {}", step.line))?;
            let patches = self.model.take_display_patches();
            debug!(
                target: "runtime",
                line = step.line,
                patches = patches.len(),
                full = patches.iter().any(|p| matches!(p, DisplayPatch::Full { .. })),
                "script_step"
            );
        }
        Ok(())
    }

    async fn apply(&mut self, command: &Command) -> Result<()> {
        let model = &mut self.model;
        match command {
            Command::Insert { at, text } => model.insert_text(*at, text)?,
            Command::Delete { from, to } => model.delete_range(*from, *to)?,
            Command::Select { anchor, head, extend } => model.set_selection(*anchor, *head, *extend)?,
            Command::Undo => model.undo()?,
            Command::Redo => model.redo()?,
            Command::Scroll { start, end } => model.set_viewport(*start..*end)?,
            Command::Wait(delay) => {
                tokio::time::sleep(*delay).await;
                self.tick()?;
            }
        }
        Ok(())
    }

    fn tick(&mut self) -> Result<()> {
        let report = self.model.tick()?;
        self.ticks += 1;
        debug!(
            target: "runtime",
            passes = report.passes,
            lines = report.lines_tokenized,
            idle = report.idle,
            "tick"
        );
        Ok(())
    }

    /// Sleep until each timer deadline and tick until no timer is left.
    async fn settle(&mut self) -> Result<()> {
        while let Some(deadline) = self.model.next_deadline() {
            tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
            self.tick()?;
        }
        self.model.take_display_patches();
        Ok(())
    }

    fn print_rows(&self, out: &mut impl Write) -> Result<()> {
        let showing = self.model.showing();
        let visible = self.model.viewport();
        for (n, row) in showing.zip(self.model.rows()) {
            if visible.contains(&n) {
                writeln!(out, "{n:>5} {row}")?;
            }
        }
        Ok(())
    }
}

async fn run(args: Args) -> Result<()> {
    let config = load_from(args.config.clone())?;
    let mut options = config.options();
    if let Some(mode) = args.mode.clone() {
        options.mode = mode;
    }
    let steps = match &args.script {
        Some(path) => {
            let source =
                std::fs::read_to_string(path).with_context(|| format!("reading script {}", path.display()))?;
            parse_script(&source).with_context(|| format!("parsing script {}", path.display()))?
        }
        None => Vec::new(),
    };
    let text = read_document(args.path.as_deref());
    info!(
        target: "runtime.startup",
        path = args.path.as_ref().map(|p| p.display().to_string()).as_deref(),
        config = config.path.as_ref().map(|p| p.display().to_string()).as_deref(),
        mode = options.mode.as_str(),
        steps = steps.len(),
        "bootstrap_complete"
    );

    let mut driver = Driver::new(&text, options, Rc::new(SystemClock), args.viewport.clone())?;
    driver.run_script(&steps).await?;
    driver.settle().await?;
    info!(target: "runtime", ticks = driver.ticks, lines = driver.model.line_count(), "shutdown");

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    driver.print_rows(&mut out).context("writing rows")?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let _log_guard = configure_logging();
    install_panic_hook();
    info!(target: "runtime", "startup");
    let args = Args::parse();
    run(args).await.inspect_err(|e| error!(target: "runtime", error = %format!("{e:#}"), "fatal"))
}
