//! Configuration loading and parsing.
//!
//! Parses `inkline.toml` (or an override path provided by the binary) into a
//! `ConfigFile` and resolves it into the `EditorOptions` the editor model is
//! built from. Every key is optional; absent keys take the documented default
//! and unknown keys are ignored so older binaries tolerate newer files.
//!
//! ```toml
//! [editor]
//! tab_size = 4
//! indent_unit = 2
//! indent_with_tabs = false
//! mode = "clike"
//! undo_depth = 40
//! read_only = false
//! electric_chars = true
//!
//! [highlight]
//! time_budget_ms = 100
//! resume_delay_ms = 200
//! line_ceiling = 5000
//! lookback = 40
//!
//! [history]
//! coalesce_ms = 400
//!
//! [render]
//! overscan = 3
//! full_repaint_ratio = 0.3
//! full_repaint_margin = 100
//! ```
//!
//! A missing file yields defaults. A file that fails to parse also yields
//! defaults, with a warning. Out-of-range values are clamped in
//! `Config::options` and each clamp is logged at `info` under the `config`
//! target.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use std::{fs, io, path::PathBuf};
use tracing::{debug, info, warn};

pub const CONFIG_FILE_NAME: &str = "inkline.toml";

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct EditorSection {
    pub tab_size: usize,
    pub indent_unit: usize,
    pub indent_with_tabs: bool,
    pub mode: String,
    pub undo_depth: usize,
    pub read_only: bool,
    pub electric_chars: bool,
}

impl Default for EditorSection {
    fn default() -> Self {
        Self {
            tab_size: 4,
            indent_unit: 2,
            indent_with_tabs: false,
            mode: "plain".to_string(),
            undo_depth: 40,
            read_only: false,
            electric_chars: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct HighlightSection {
    pub time_budget_ms: u64,
    pub resume_delay_ms: u64,
    pub line_ceiling: usize,
    pub lookback: usize,
}

impl Default for HighlightSection {
    fn default() -> Self {
        Self {
            time_budget_ms: 100,
            resume_delay_ms: 200,
            line_ceiling: 5000,
            lookback: 40,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct HistorySection {
    pub coalesce_ms: u64,
}

impl Default for HistorySection {
    fn default() -> Self {
        Self { coalesce_ms: 400 }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RenderSection {
    pub overscan: usize,
    pub full_repaint_ratio: f64,
    pub full_repaint_margin: usize,
}

impl Default for RenderSection {
    fn default() -> Self {
        Self {
            overscan: 3,
            full_repaint_ratio: 0.3,
            full_repaint_margin: 100,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct ConfigFile {
    #[serde(default)]
    pub editor: EditorSection,
    #[serde(default)]
    pub highlight: HighlightSection,
    #[serde(default)]
    pub history: HistorySection,
    #[serde(default)]
    pub render: RenderSection,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub path: Option<PathBuf>, // file the values came from, if any
    pub raw: Option<String>,   // original file string (optional)
    pub file: ConfigFile,      // parsed (or default) data
}

/// Resolved, clamped settings for one editor instance.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorOptions {
    pub tab_size: usize,
    pub indent_unit: usize,
    pub indent_with_tabs: bool,
    pub mode: String,
    pub undo_depth: usize,
    pub read_only: bool,
    pub electric_chars: bool,
    pub time_budget: Duration,
    pub resume_delay: Duration,
    pub line_ceiling: usize,
    pub lookback: usize,
    pub coalesce_window: Duration,
    pub overscan: usize,
    pub full_repaint_ratio: f64,
    pub full_repaint_margin: usize,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Config::default().options()
    }
}

/// Best-effort config path: `inkline.toml` in the working directory, then the
/// platform config dir (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("inkline").join(CONFIG_FILE_NAME);
    }
    local
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(target: "config", path = %path.display(), "config_file_missing");
            return Ok(Config::default());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("reading config file {}", path.display()));
        }
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => {
            debug!(target: "config", path = %path.display(), "config_loaded");
            Ok(Config {
                path: Some(path),
                raw: Some(content),
                file,
            })
        }
        Err(e) => {
            warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed_using_defaults");
            Ok(Config::default())
        }
    }
}

fn at_least(key: &'static str, raw: usize, min: usize) -> usize {
    if raw < min {
        info!(target: "config", key, raw, clamped = min, "config_value_clamped");
        return min;
    }
    raw
}

impl Config {
    /// Resolve the parsed file into editor options, clamping out-of-range values.
    pub fn options(&self) -> EditorOptions {
        let ConfigFile {
            editor,
            highlight,
            history,
            render,
        } = &self.file;

        let raw_ratio = render.full_repaint_ratio;
        let full_repaint_ratio = if !raw_ratio.is_finite() || raw_ratio <= 0.0 {
            RenderSection::default().full_repaint_ratio
        } else {
            raw_ratio.min(1.0)
        };
        if full_repaint_ratio != raw_ratio {
            info!(
                target: "config",
                key = "render.full_repaint_ratio",
                raw = raw_ratio,
                clamped = full_repaint_ratio,
                "config_value_clamped"
            );
        }

        EditorOptions {
            tab_size: at_least("editor.tab_size", editor.tab_size, 1),
            indent_unit: at_least("editor.indent_unit", editor.indent_unit, 1),
            indent_with_tabs: editor.indent_with_tabs,
            mode: editor.mode.clone(),
            undo_depth: editor.undo_depth,
            read_only: editor.read_only,
            electric_chars: editor.electric_chars,
            time_budget: Duration::from_millis(
                at_least("highlight.time_budget_ms", highlight.time_budget_ms as usize, 1) as u64,
            ),
            resume_delay: Duration::from_millis(highlight.resume_delay_ms),
            line_ceiling: at_least("highlight.line_ceiling", highlight.line_ceiling, 1),
            lookback: highlight.lookback,
            coalesce_window: Duration::from_millis(history.coalesce_ms),
            overscan: render.overscan,
            full_repaint_ratio,
            full_repaint_margin: render.full_repaint_margin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex, MutexGuard};
    use tracing::Level;
    use tracing::subscriber::with_default;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone)]
    struct BufferWriter {
        inner: Arc<Mutex<Vec<u8>>>,
    }

    impl BufferWriter {
        fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
            let buf = Arc::new(Mutex::new(Vec::new()));
            (Self { inner: buf.clone() }, buf)
        }
    }

    struct LockedWriter<'a> {
        guard: MutexGuard<'a, Vec<u8>>,
    }

    impl<'a> Write for LockedWriter<'a> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.guard.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for BufferWriter {
        type Writer = LockedWriter<'a>;

        fn make_writer(&'a self) -> Self::Writer {
            LockedWriter {
                guard: self.inner.lock().expect("log buffer poisoned"),
            }
        }
    }

    fn capture<F: FnOnce()>(level: Level, f: F) -> String {
        let (writer, buffer) = BufferWriter::new();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(true)
            .with_ansi(false)
            .without_time()
            .with_writer(writer)
            .finish();
        with_default(subscriber, f);
        let out = buffer.lock().unwrap().clone();
        String::from_utf8(out).unwrap()
    }

    fn load_str(content: &str) -> Config {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), content).unwrap();
        load_from(Some(tmp.path().to_path_buf())).unwrap()
    }

    #[test]
    fn default_config_when_missing_file() {
        let cfg = load_from(Some(PathBuf::from("__nonexistent_hopefully__.toml"))).unwrap();
        assert!(cfg.raw.is_none());
        let opts = cfg.options();
        assert_eq!(opts.tab_size, 4);
        assert_eq!(opts.indent_unit, 2);
        assert_eq!(opts.mode, "plain");
        assert_eq!(opts.undo_depth, 40);
        assert_eq!(opts.time_budget, Duration::from_millis(100));
        assert_eq!(opts.resume_delay, Duration::from_millis(200));
        assert_eq!(opts.coalesce_window, Duration::from_millis(400));
        assert_eq!(opts.overscan, 3);
        assert_eq!(opts.full_repaint_margin, 100);
        assert_eq!(opts, EditorOptions::default());
    }

    #[test]
    fn parses_sections_and_keeps_unset_defaults() {
        let cfg = load_str(
            "[editor]\nmode = \"clike\"\ntab_size = 8\nread_only = true\n\
             [highlight]\nresume_delay_ms = 50\n[history]\ncoalesce_ms = 0\n\
             [render]\noverscan = 10\n",
        );
        let opts = cfg.options();
        assert_eq!(opts.mode, "clike");
        assert_eq!(opts.tab_size, 8);
        assert!(opts.read_only);
        assert_eq!(opts.indent_unit, 2);
        assert_eq!(opts.resume_delay, Duration::from_millis(50));
        assert_eq!(opts.time_budget, Duration::from_millis(100));
        assert_eq!(opts.coalesce_window, Duration::ZERO);
        assert_eq!(opts.overscan, 10);
        assert!(opts.electric_chars);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let cfg = load_str("[editor]\nfuture_knob = 1\n[plugins]\nx = true\n");
        assert_eq!(cfg.file, ConfigFile::default());
        assert!(cfg.raw.is_some());
    }

    #[test]
    fn parse_error_falls_back_with_warning() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[editor\ntab_size = ").unwrap();
        let mut cfg = None;
        let log = capture(Level::WARN, || {
            cfg = Some(load_from(Some(tmp.path().to_path_buf())).unwrap());
        });
        assert_eq!(cfg.unwrap().file, ConfigFile::default());
        assert!(log.contains("WARN config:"));
        assert!(log.contains("config_parse_failed_using_defaults"));
    }

    #[test]
    fn clamps_out_of_range_values() {
        let cfg = load_str(
            "[editor]\ntab_size = 0\nindent_unit = 0\n[render]\nfull_repaint_ratio = 4.5\n",
        );
        let opts = cfg.options();
        assert_eq!(opts.tab_size, 1);
        assert_eq!(opts.indent_unit, 1);
        assert_eq!(opts.full_repaint_ratio, 1.0);

        let cfg = load_str("[render]\nfull_repaint_ratio = -1.0\n");
        assert_eq!(cfg.options().full_repaint_ratio, 0.3);
    }

    #[test]
    fn clamp_logging_uses_config_target() {
        let cfg = load_str("[editor]\ntab_size = 0\n");
        let log = capture(Level::INFO, || {
            cfg.options();
        });
        assert!(log.contains("INFO config:"));
        assert!(log.contains("config_value_clamped"));
        assert!(log.contains("editor.tab_size"));
    }
}
