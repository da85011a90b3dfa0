//! `tracing` subscriber assembled from the `logging` configuration.
//!
//! Every section other than `default` names a crate (target prefix). A crate gets its own
//! console level and, optionally, its own JSON log file; `default` covers all other targets.

use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    ContentLimit, FileRotate,
};
use parking_lot::Mutex;
use tracing::level_filters::LevelFilter;
use tracing::{Level, Metadata};
use tracing_subscriber::filter::{FilterFn, Targets};
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, Registry};

use crate::config::{LoggingConfig, Section};

const DEFAULT_SECTION: &str = "default";
const DEFAULT_MAX_SIZE_MB: u64 = 100;

/// `None` means the sink is switched off; unknown names fall back to `info`.
fn parse_level(s: &str) -> Option<Level> {
    match s.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" | "" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        "off" | "none" => None,
        _ => Some(Level::INFO),
    }
}

/// `target` is `crate_name` itself or a module below it.
fn matches_crate(target: &str, crate_name: &str) -> bool {
    target
        .strip_prefix(crate_name)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

fn resolve_log_path(file: &str, base_dir: &Path) -> PathBuf {
    let path = Path::new(file);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

type SharedFile = Arc<Mutex<FileRotate<AppendTimestamp>>>;

fn open_log_file(section: &Section, base_dir: &Path) -> Result<SharedFile> {
    let path = resolve_log_path(&section.file, base_dir);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let limit = match (section.max_backups, section.max_age_days) {
        (Some(files), _) => FileLimit::MaxFiles(files),
        (None, Some(days)) => FileLimit::Age(chrono::Duration::days(i64::from(days))),
        (None, None) => FileLimit::Unlimited,
    };
    let max_bytes = section.max_size_mb.unwrap_or(DEFAULT_MAX_SIZE_MB) * 1024 * 1024;
    let rotate = FileRotate::new(
        &path,
        AppendTimestamp::default(limit),
        ContentLimit::BytesSurpassed(usize::try_from(max_bytes).unwrap_or(usize::MAX)),
        Compression::None,
        #[cfg(unix)]
        None,
    );
    Ok(Arc::new(Mutex::new(rotate)))
}

/// Writer for one record: the file of its crate, the default file, or nowhere.
struct FileHandle(Option<SharedFile>);

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

/// Routes records to per-crate files by target.
#[derive(Clone, Default)]
struct FileRouter {
    default: Option<SharedFile>,
    by_crate: Vec<(String, SharedFile)>,
}

impl FileRouter {
    fn is_empty(&self) -> bool {
        self.default.is_none() && self.by_crate.is_empty()
    }

    fn file_for(&self, target: &str) -> Option<SharedFile> {
        self.by_crate
            .iter()
            .find(|(name, _)| matches_crate(target, name))
            .map(|(_, file)| file.clone())
            .or_else(|| self.default.clone())
    }
}

impl<'a> MakeWriter<'a> for FileRouter {
    type Writer = FileHandle;

    fn make_writer(&'a self) -> Self::Writer {
        FileHandle(self.default.clone())
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        FileHandle(self.file_for(meta.target()))
    }
}

/// Levels per sink, derived from the sections.
struct Plan<'a> {
    default: Option<&'a Section>,
    crates: Vec<(&'a str, &'a Section)>,
}

impl<'a> Plan<'a> {
    fn new(cfg: &'a LoggingConfig) -> Self {
        let mut crates: Vec<(&str, &Section)> = cfg
            .iter()
            .filter(|(name, _)| name.as_str() != DEFAULT_SECTION)
            .map(|(name, section)| (name.as_str(), section))
            .collect();
        // longest prefix first, so `a::b` wins over `a`
        crates.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(b.0)));
        Self {
            default: cfg.get(DEFAULT_SECTION),
            crates,
        }
    }

    fn crate_names(&self) -> Vec<String> {
        self.crates.iter().map(|(name, _)| name.to_string()).collect()
    }

    /// Levels of the explicit crates plus, for everything else, the default level.
    fn filter(&self, level_of: impl Fn(&Section) -> Option<Level>) -> CrateFilter {
        let mut targets = Targets::new().with_default(LevelFilter::OFF);
        for (name, section) in &self.crates {
            let level = level_of(section).map_or(LevelFilter::OFF, LevelFilter::from_level);
            targets = targets.with_target(*name, level);
        }
        let fallback = self
            .default
            .and_then(&level_of)
            .map_or(LevelFilter::OFF, LevelFilter::from_level);
        let crates = self.crate_names();
        CrateFilter {
            explicit: targets,
            crates,
            fallback,
        }
    }

    fn file_router(&self, base_dir: &Path) -> FileRouter {
        let mut router = FileRouter::default();
        if let Some(section) = self.default.filter(|s| !s.file.trim().is_empty()) {
            router.default = open_or_warn(DEFAULT_SECTION, section, base_dir);
        }
        for (name, section) in &self.crates {
            if section.file.trim().is_empty() {
                continue;
            }
            if let Some(file) = open_or_warn(name, section, base_dir) {
                router.by_crate.push((name.to_string(), file));
            }
        }
        router
    }
}

fn open_or_warn(name: &str, section: &Section, base_dir: &Path) -> Option<SharedFile> {
    match open_log_file(section, base_dir) {
        Ok(file) => Some(file),
        Err(err) => {
            // the subscriber does not exist yet
            eprintln!("logging: cannot open file for `{name}`: {err:#}");
            None
        }
    }
}

/// Explicit crate levels, or the default level for targets outside every listed crate.
#[derive(Clone)]
struct CrateFilter {
    explicit: Targets,
    crates: Vec<String>,
    fallback: LevelFilter,
}

impl CrateFilter {
    fn enabled(&self, meta: &Metadata<'_>) -> bool {
        if self.crates.iter().any(|c| matches_crate(meta.target(), c)) {
            self.explicit.would_enable(meta.target(), meta.level())
        } else {
            self.fallback >= *meta.level()
        }
    }

    fn into_filter(self) -> FilterFn<impl Fn(&Metadata<'_>) -> bool> {
        FilterFn::new(move |meta| self.enabled(meta))
    }
}

/// Install the global subscriber. `base_dir` anchors relative log file paths.
///
/// Calling it again (or after another subscriber was installed) is a no-op.
pub fn init_logging_from_config(cfg: &LoggingConfig, base_dir: &Path) {
    // `log` records from dependencies go through tracing too
    let _ = tracing_log::LogTracer::init();

    if cfg.is_empty() {
        let _ = tracing_subscriber::fmt()
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .try_init();
        return;
    }

    let plan = Plan::new(cfg);
    let console = fmt::layer()
        .with_ansi(std::io::stdout().is_terminal())
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_filter(plan.filter(|s| parse_level(&s.console_level)).into_filter());

    let router = plan.file_router(base_dir);
    let files = (!router.is_empty()).then(|| {
        fmt::layer()
            .json()
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(router)
            .with_filter(
                plan.filter(|s| {
                    if s.file.trim().is_empty() {
                        None
                    } else {
                        parse_level(&s.file_level)
                    }
                })
                .into_filter(),
            )
    });

    let _ = Registry::default().with(console).with(files).try_init();
}

/// Defaults used when the configuration has no `logging` section.
pub fn init_default_logging(base_dir: &Path) {
    init_logging_from_config(&crate::config::default_logging_config(), base_dir);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_logging_config;
    use tempfile::tempdir;

    fn section(console: &str, file: &str, file_level: &str) -> Section {
        Section {
            console_level: console.into(),
            file: file.into(),
            file_level: file_level.into(),
            max_age_days: None,
            max_backups: Some(2),
            max_size_mb: Some(1),
        }
    }

    #[test]
    fn levels_parse_case_insensitively() {
        assert_eq!(parse_level("trace"), Some(Level::TRACE));
        assert_eq!(parse_level("DEBUG"), Some(Level::DEBUG));
        assert_eq!(parse_level("Warn"), Some(Level::WARN));
        assert_eq!(parse_level("off"), None);
        assert_eq!(parse_level("none"), None);
        assert_eq!(parse_level("bogus"), Some(Level::INFO));
        assert_eq!(parse_level(""), Some(Level::INFO));
    }

    #[test]
    fn crate_prefix_requires_module_boundary() {
        assert!(matches_crate("jsonapi_kit", "jsonapi_kit"));
        assert!(matches_crate("jsonapi_kit::app", "jsonapi_kit"));
        assert!(!matches_crate("jsonapi_kitchen", "jsonapi_kit"));
        assert!(!matches_crate("accounts", "jsonapi_kit"));
    }

    #[test]
    fn plan_orders_longest_crate_first() {
        let mut cfg = default_logging_config();
        cfg.insert("a".into(), section("info", "", ""));
        cfg.insert("a::b".into(), section("debug", "", ""));
        let plan = Plan::new(&cfg);
        assert!(plan.default.is_some());
        assert_eq!(plan.crate_names(), vec!["a::b".to_string(), "a".to_string()]);
    }

    #[test]
    fn file_router_prefers_crate_file() {
        let tmp = tempdir().unwrap();
        let mut cfg = LoggingConfig::new();
        cfg.insert("default".into(), section("info", "logs/all.log", "debug"));
        cfg.insert("api_ingress".into(), section("debug", "logs/api.log", "warn"));
        cfg.insert("accounts".into(), section("debug", "", ""));

        let router = Plan::new(&cfg).file_router(tmp.path());
        assert_eq!(router.by_crate.len(), 1);
        assert!(tmp.path().join("logs").is_dir());

        let api = router.file_for("api_ingress::web").unwrap();
        let other = router.file_for("accounts").unwrap();
        assert!(!Arc::ptr_eq(&api, &other));
        assert!(Arc::ptr_eq(&other, router.default.as_ref().unwrap()));
    }

    #[test]
    fn relative_paths_resolve_against_base_dir() {
        let tmp = tempdir().unwrap();
        let resolved = resolve_log_path("logs/test.log", tmp.path());
        assert!(resolved.starts_with(tmp.path()));
        assert!(resolved.ends_with("logs/test.log"));

        let absolute = tmp.path().join("abs.log");
        let resolved = resolve_log_path(&absolute.to_string_lossy(), Path::new("/ignored"));
        assert_eq!(resolved, absolute);
    }

    #[test]
    fn opening_a_file_creates_its_directory() {
        let tmp = tempdir().unwrap();
        let file = open_log_file(&section("info", "nested/dir/app.log", "info"), tmp.path());
        assert!(file.is_ok());
        assert!(tmp.path().join("nested/dir").is_dir());
    }
}
