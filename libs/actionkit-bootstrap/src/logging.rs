//! Console + rotating JSON file logging driven by [`LoggingConfig`].
//!
//! Each config key is a target prefix (`actionkit`, `home::model`, ...) with
//! its own console level and optional log file; `default` covers the rest.
//! `RUST_LOG`, when set, caps everything.

use std::collections::BTreeMap;
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use file_rotate::compression::Compression;
use file_rotate::suffix::{AppendTimestamp, FileLimit};
use file_rotate::{ContentLimit, FileRotate};
use parking_lot::Mutex;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::{LoggingConfig, Section};

const DEFAULT_KEY: &str = "default";
const DEFAULT_MAX_SIZE_MB: u64 = 100;

// Keeps the non-blocking console worker alive for the life of the process.
static CONSOLE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// `None` means the sink is switched off for that target.
fn parse_level(s: &str) -> Option<LevelFilter> {
    match s.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(LevelFilter::TRACE),
        "debug" => Some(LevelFilter::DEBUG),
        "info" | "" => Some(LevelFilter::INFO),
        "warn" | "warning" => Some(LevelFilter::WARN),
        "error" => Some(LevelFilter::ERROR),
        "off" | "none" => None,
        _ => Some(LevelFilter::INFO),
    }
}

fn target_matches(target: &str, prefix: &str) -> bool {
    target == prefix
        || target
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with("::"))
}

// ---------- rotating file writers ----------

type Rotating = Arc<Mutex<FileRotate<AppendTimestamp>>>;

/// Write handle that drops output when no file is configured for a target.
struct FileHandle(Option<Rotating>);

impl Write for FileHandle {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &self.0 {
            Some(file) => file.lock().write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &self.0 {
            Some(file) => file.lock().flush(),
            None => Ok(()),
        }
    }
}

/// Picks the log file for a record by its target; longest prefix wins.
#[derive(Clone, Default)]
struct FileSinks {
    default: Option<Rotating>,
    by_target: Vec<(String, Rotating)>,
}

impl FileSinks {
    fn is_empty(&self) -> bool {
        self.default.is_none() && self.by_target.is_empty()
    }

    fn for_target(&self, target: &str) -> Option<Rotating> {
        self.by_target
            .iter()
            .find(|(prefix, _)| target_matches(target, prefix))
            .map(|(_, file)| Arc::clone(file))
            .or_else(|| self.default.clone())
    }
}

impl<'a> MakeWriter<'a> for FileSinks {
    type Writer = FileHandle;

    fn make_writer(&'a self) -> Self::Writer {
        FileHandle(self.default.clone())
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        FileHandle(self.for_target(meta.target()))
    }
}

fn open_rotating(section: &Section, base_dir: &Path) -> std::io::Result<Rotating> {
    let path = resolve_log_path(&section.file, base_dir);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Backup count wins over age when both are set.
    let limit = match (section.max_backups, section.max_age_days) {
        (Some(n), _) => FileLimit::MaxFiles(n),
        (None, days) => FileLimit::Age(chrono::Duration::days(i64::from(days.unwrap_or(1)))),
    };
    let max_bytes = section.max_size_mb.unwrap_or(DEFAULT_MAX_SIZE_MB) as usize * 1024 * 1024;

    let rot = FileRotate::new(
        &path,
        AppendTimestamp::default(limit),
        ContentLimit::BytesSurpassed(max_bytes),
        Compression::None,
        None,
    );
    Ok(Arc::new(Mutex::new(rot)))
}

fn resolve_log_path(file: &str, base_dir: &Path) -> PathBuf {
    let p = Path::new(file);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

// ---------- filters ----------

struct Plan {
    console: Targets,
    file: Targets,
    sinks: FileSinks,
}

fn build_plan(cfg: &LoggingConfig, base_dir: &Path) -> Plan {
    // Sorted by descending prefix length so `home::model` beats `home`.
    let mut sections: Vec<(&String, &Section)> =
        cfg.iter().filter(|(k, _)| k.as_str() != DEFAULT_KEY).collect();
    sections.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(b.0)));
    let default = cfg.get(DEFAULT_KEY);

    let mut sinks = FileSinks::default();
    let mut opened: BTreeMap<PathBuf, Rotating> = BTreeMap::new();
    let mut open = |section: &Section| -> Option<Rotating> {
        if section.file.trim().is_empty() {
            return None;
        }
        let key = resolve_log_path(&section.file, base_dir);
        if let Some(existing) = opened.get(&key) {
            return Some(Arc::clone(existing));
        }
        match open_rotating(section, base_dir) {
            Ok(file) => {
                opened.insert(key, Arc::clone(&file));
                Some(file)
            }
            Err(e) => {
                eprintln!("failed to open log file '{}': {e}", key.display());
                None
            }
        }
    };

    sinks.default = default.and_then(&mut open);
    for (target, section) in &sections {
        if let Some(file) = open(*section) {
            sinks.by_target.push(((*target).clone(), file));
        }
    }

    let console_default = default
        .map(|s| parse_level(&s.console_level).unwrap_or(LevelFilter::OFF))
        .unwrap_or(LevelFilter::INFO);
    let mut console = Targets::new().with_default(console_default);

    let file_default = match default {
        Some(s) if sinks.default.is_some() => {
            parse_level(&s.file_level).unwrap_or(LevelFilter::OFF)
        }
        _ => LevelFilter::OFF,
    };
    let mut file = Targets::new().with_default(file_default);

    for (target, section) in &sections {
        let console_level = parse_level(&section.console_level).unwrap_or(LevelFilter::OFF);
        console = console.with_target(target.as_str(), console_level);
        if !section.file.trim().is_empty() {
            let file_level = parse_level(&section.file_level).unwrap_or(LevelFilter::OFF);
            file = file.with_target(target.as_str(), file_level);
        }
    }

    Plan {
        console,
        file,
        sinks,
    }
}

// ---------- install ----------

/// Install the global subscriber from `cfg`; relative log paths resolve under `base_dir`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging(cfg: &LoggingConfig, base_dir: &Path) {
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("log bridge not installed: {e}");
    }

    if cfg.is_empty() {
        init_minimal();
        return;
    }

    let Plan {
        console,
        file,
        sinks,
    } = build_plan(cfg, base_dir);

    let (stderr, guard) = tracing_appender::non_blocking(std::io::stderr());
    let _ = CONSOLE_GUARD.set(guard);

    let console_layer = fmt::layer()
        .with_writer(stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_filter(console);

    let file_layer = (!sinks.is_empty()).then(|| {
        fmt::layer()
            .json()
            .with_ansi(false)
            .with_target(true)
            .with_current_span(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(sinks)
            .with_filter(file)
    });

    let _ = Registry::default()
        .with(EnvFilter::try_from_default_env().ok())
        .with(console_layer)
        .with(file_layer)
        .try_init();
}

/// Console-only subscriber at `info` (or `RUST_LOG`).
pub fn init_minimal() {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = Registry::default()
        .with(env)
        .with(
            fmt::layer()
                .with_target(true)
                .with_timer(fmt::time::UtcTime::rfc_3339()),
        )
        .try_init();
}
