use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Config;

/// Address the HTTP server binds to when nothing else is configured.
pub const DEFAULT_BIND: &str = "0.0.0.0:8080";

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub server: Option<ServerConfig>,
    pub pdf: Option<PdfConfig>,
    pub text: Option<TextConfig>,
    pub fetch: Option<FetchConfig>,
    pub extractor: Option<ExtractorConfig>,
    pub json: Option<JsonConfig>,
    pub concurrency: Option<ConcurrencyConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PdfConfig {
    pub memory_threshold_mebibytes: Option<u64>,
    pub pipe_capacity: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextConfig {
    pub dehyphenate: Option<bool>,
    /// `space` or `newline`.
    pub separator: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchConfig {
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractorConfig {
    pub program: Option<String>,
    pub args: Option<Vec<String>>,
    /// `strict` or `best-effort`.
    pub exit_policy: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonConfig {
    pub content_key: Option<String>,
    /// `content-wins` or `reject`.
    pub on_key_collision: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    pub num_workers: Option<usize>,
}

/// Platform config directory path: `<config_dir>/pdftext/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pdftext").join("config.toml"))
}

/// Load config by cascading CWD `.pdftext.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".pdftext.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => {
            tracing::debug!(path = %path.display(), "loaded config file");
            Some(config)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparseable config file");
            None
        }
    }
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    fn pick<S, T>(
        base: &Option<S>,
        overlay: &Option<S>,
        field: impl Fn(&S) -> Option<T>,
    ) -> Option<T> {
        overlay
            .as_ref()
            .and_then(&field)
            .or_else(|| base.as_ref().and_then(&field))
    }

    ConfigFile {
        server: Some(ServerConfig {
            bind: pick(&base.server, &overlay.server, |s| s.bind.clone()),
        }),
        pdf: Some(PdfConfig {
            memory_threshold_mebibytes: pick(&base.pdf, &overlay.pdf, |p| {
                p.memory_threshold_mebibytes
            }),
            pipe_capacity: pick(&base.pdf, &overlay.pdf, |p| p.pipe_capacity),
        }),
        text: Some(TextConfig {
            dehyphenate: pick(&base.text, &overlay.text, |t| t.dehyphenate),
            separator: pick(&base.text, &overlay.text, |t| t.separator.clone()),
        }),
        fetch: Some(FetchConfig {
            timeout_secs: pick(&base.fetch, &overlay.fetch, |f| f.timeout_secs),
        }),
        extractor: Some(ExtractorConfig {
            program: pick(&base.extractor, &overlay.extractor, |e| e.program.clone()),
            args: pick(&base.extractor, &overlay.extractor, |e| e.args.clone()),
            exit_policy: pick(&base.extractor, &overlay.extractor, |e| {
                e.exit_policy.clone()
            }),
        }),
        json: Some(JsonConfig {
            content_key: pick(&base.json, &overlay.json, |j| j.content_key.clone()),
            on_key_collision: pick(&base.json, &overlay.json, |j| {
                j.on_key_collision.clone()
            }),
        }),
        concurrency: Some(ConcurrencyConfig {
            num_workers: pick(&base.concurrency, &overlay.concurrency, |c| c.num_workers),
        }),
    }
}

impl ConfigFile {
    /// Copy every value present in the file onto `config`.
    ///
    /// Unrecognised policy names are logged and leave the current value in
    /// place.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(pdf) = &self.pdf {
            if let Some(mib) = pdf.memory_threshold_mebibytes {
                config.memory_threshold_mebibytes = mib;
            }
            if let Some(capacity) = pdf.pipe_capacity {
                config.pipe_capacity = capacity.max(1);
            }
        }
        if let Some(text) = &self.text {
            if let Some(dehyphenate) = text.dehyphenate {
                config.dehyphenate = dehyphenate;
            }
            if let Some(separator) = &text.separator {
                set_parsed(&mut config.separator, "text.separator", separator);
            }
        }
        if let Some(fetch) = &self.fetch {
            if fetch.timeout_secs.is_some() {
                config.fetch_timeout_secs = fetch.timeout_secs.filter(|&secs| secs > 0);
            }
        }
        if let Some(extractor) = &self.extractor {
            if let Some(program) = &extractor.program {
                config.external_program = program.clone();
            }
            if let Some(args) = &extractor.args {
                config.external_args = args.clone();
            }
            if let Some(policy) = &extractor.exit_policy {
                set_parsed(&mut config.exit_policy, "extractor.exit_policy", policy);
            }
        }
        if let Some(json) = &self.json {
            if let Some(key) = &json.content_key {
                config.content_key = key.clone();
            }
            if let Some(policy) = &json.on_key_collision {
                set_parsed(&mut config.collision_policy, "json.on_key_collision", policy);
            }
        }
        if let Some(workers) = self.concurrency.as_ref().and_then(|c| c.num_workers) {
            config.num_workers = workers.max(1);
        }
    }

    /// Configured bind address, if any.
    pub fn bind(&self) -> Option<&str> {
        self.server.as_ref().and_then(|s| s.bind.as_deref())
    }
}

/// Apply `PDFTEXT_*` environment variables on top of `config`.
pub fn apply_env_overrides(config: &mut Config) {
    apply_overrides_from(config, |name| std::env::var(name).ok());
}

/// Apply overrides looked up through `lookup`; empty values are ignored.
pub fn apply_overrides_from(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(v) = var("PDFTEXT_MAX_MEMORY_MEBIBYTES") {
        set_parsed(&mut config.memory_threshold_mebibytes, "PDFTEXT_MAX_MEMORY_MEBIBYTES", &v);
    }
    if let Some(v) = var("PDFTEXT_PIPE_CAPACITY") {
        set_parsed(&mut config.pipe_capacity, "PDFTEXT_PIPE_CAPACITY", &v);
        config.pipe_capacity = config.pipe_capacity.max(1);
    }
    if let Some(v) = var("PDFTEXT_DEHYPHENATE") {
        match parse_bool(&v) {
            Some(b) => config.dehyphenate = b,
            None => tracing::warn!(value = %v, "invalid PDFTEXT_DEHYPHENATE, ignored"),
        }
    }
    if let Some(v) = var("PDFTEXT_SEPARATOR") {
        set_parsed(&mut config.separator, "PDFTEXT_SEPARATOR", &v);
    }
    if let Some(v) = var("PDFTEXT_FETCH_TIMEOUT_SECS") {
        let mut secs = config.fetch_timeout_secs.unwrap_or(0);
        set_parsed(&mut secs, "PDFTEXT_FETCH_TIMEOUT_SECS", &v);
        config.fetch_timeout_secs = Some(secs).filter(|&s| s > 0);
    }
    if let Some(v) = var("PDFTEXT_EXTERNAL_PROGRAM") {
        config.external_program = v;
    }
    if let Some(v) = var("PDFTEXT_EXIT_POLICY") {
        set_parsed(&mut config.exit_policy, "PDFTEXT_EXIT_POLICY", &v);
    }
    if let Some(v) = var("PDFTEXT_NUM_WORKERS") {
        set_parsed(&mut config.num_workers, "PDFTEXT_NUM_WORKERS", &v);
        config.num_workers = config.num_workers.max(1);
    }
}

/// Bind address: `PDFTEXT_BIND`, then the config file, then [`DEFAULT_BIND`].
pub fn resolve_bind(file: &ConfigFile) -> String {
    std::env::var("PDFTEXT_BIND")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| file.bind().map(str::to_string))
        .unwrap_or_else(|| DEFAULT_BIND.to_string())
}

/// Defaults, then config files, then environment.
pub fn load_effective_config() -> (Config, ConfigFile) {
    let file = load_config();
    let mut config = Config::default();
    file.apply_to(&mut config);
    apply_env_overrides(&mut config);
    (config, file)
}

fn set_parsed<T>(slot: &mut T, name: &str, value: &str)
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value.trim().parse() {
        Ok(parsed) => *slot = parsed,
        Err(e) => tracing::warn!(setting = name, value, error = %e, "invalid setting, ignored"),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
