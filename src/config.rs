use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::format::FormatRegistry;
use crate::writer::SignatureWriter;

pub const JIMAGE_ENV: &str = "APISIG_JIMAGE";
pub const DEFAULT_EXTRACT_TIMEOUT: Duration = Duration::from_secs(300);

#[cfg(windows)]
pub const DEFAULT_PATH_SEPARATOR: char = ';';
#[cfg(not(windows))]
pub const DEFAULT_PATH_SEPARATOR: char = ':';

/// Per-run settings shared by the codec and the classpath layer.
#[derive(Debug, Clone)]
pub struct Config {
    pub registry: FormatRegistry,
    /// Module-image extraction tool; see [`Config::jimage_path`].
    pub jimage: Option<PathBuf>,
    /// `None` waits for the extraction tool indefinitely.
    pub extract_timeout: Option<Duration>,
    /// Parent directory for extracted module images; the system temp dir
    /// when unset.
    pub temp_root: Option<PathBuf>,
    pub path_separator: char,
    pub copyright: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry: FormatRegistry::standard(),
            jimage: None,
            extract_timeout: Some(DEFAULT_EXTRACT_TIMEOUT),
            temp_root: None,
            path_separator: DEFAULT_PATH_SEPARATOR,
            copyright: None,
        }
    }
}

impl Config {
    /// Defaults with the extraction tool resolved from the environment.
    pub fn from_env() -> Self {
        Self {
            jimage: Some(resolve_jimage_path(None)),
            ..Self::default()
        }
    }

    pub fn jimage_path(&self) -> PathBuf {
        resolve_jimage_path(self.jimage.as_deref())
    }

    pub fn with_jimage(mut self, path: impl Into<PathBuf>) -> Self {
        self.jimage = Some(path.into());
        self
    }

    pub fn with_temp_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(path.into());
        self
    }

    pub fn with_extract_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.extract_timeout = timeout;
        self
    }

    pub fn with_path_separator(mut self, separator: char) -> Self {
        self.path_separator = separator;
        self
    }

    pub fn with_copyright(mut self, text: impl Into<String>) -> Self {
        self.copyright = Some(text.into());
        self
    }

    /// A writer for the newest registered format, carrying the configured
    /// copyright text.
    pub fn writer<W: std::io::Write>(&self, out: W) -> SignatureWriter<W> {
        let mut writer = self.registry.latest().writer(out);
        if let Some(text) = &self.copyright {
            writer.set_copyright(text.clone());
        }
        writer
    }
}

/// Explicit path, then `$APISIG_JIMAGE`, then `$JAVA_HOME/bin/jimage`,
/// then plain `jimage` looked up on `PATH`.
pub fn resolve_jimage_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }

    if let Ok(p) = env::var(JIMAGE_ENV)
        && !p.is_empty()
    {
        return PathBuf::from(p);
    }

    if let Ok(home) = env::var("JAVA_HOME") {
        let exe = if cfg!(windows) { "jimage.exe" } else { "jimage" };
        let candidate = Path::new(&home).join("bin").join(exe);
        if candidate.exists() {
            return candidate;
        }
    }

    PathBuf::from("jimage")
}
