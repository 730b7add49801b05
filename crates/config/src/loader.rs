use crate::Config;
use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Environment variables starting with this are configuration.
pub const ENV_PREFIX: &str = "BODEGA_";
const FILE_STEM: &str = "bodega";

/// Builds a [`Config`] from layered sources.
///
/// # Examples
///
/// ```no_run
/// use bodega_config::Loader;
/// use std::path::Path;
///
/// # fn example() -> bodega_config::error::Result<()> {
/// let config = Loader::new(Some(Path::new("/etc/bodega/bodega.toml")))?
///     .env()
///     .load()?;
/// println!("listening on {}", config.listen);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Loader {
    figment: Figment,
}

impl Loader {
    /// Defaults only.
    pub fn defaults() -> Self {
        Self { figment: Figment::from(Serialized::defaults(Config::default())) }
    }

    /// Defaults plus a config file: `explicit` if given (it must exist),
    /// otherwise whichever of `bodega.{toml,yaml,yml,json}` exist in the
    /// platform config directory.
    pub fn new(explicit: Option<&Path>) -> Result<Self> {
        let loader = Self::defaults();
        match explicit {
            Some(path) => loader.file(path),
            None => Ok(platform_files().into_iter().fold(loader, |loader, path| loader.merge_file(&path))),
        }
    }

    /// Layer one config file, picking the format from its extension.
    pub fn file(self, path: &Path) -> Result<Self> {
        if !path.is_file() {
            exn::bail!(ErrorKind::NotFound(path.display().to_string()));
        }
        if format_of(path).is_none() {
            exn::bail!(ErrorKind::UnsupportedFormat(path.display().to_string()));
        }
        Ok(self.merge_file(path))
    }

    /// Layer `BODEGA_*` environment variables.
    pub fn env(mut self) -> Self {
        self.figment = self.figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        self
    }

    /// Layer values from anything serializable, typically parsed CLI flags.
    /// Fields that serialize to nothing (skipped `None`s) leave lower layers
    /// alone.
    pub fn overrides<T: Serialize>(mut self, overrides: T) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(overrides));
        self
    }

    /// Extract and validate.
    pub fn load(self) -> Result<Config> {
        let config: Config = self.figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    fn merge_file(mut self, path: &Path) -> Self {
        tracing::debug!(path = %path.display(), "Loading config file");
        self.figment = match format_of(path) {
            Some(FileFormat::Toml) => self.figment.merge(Toml::file(path)),
            Some(FileFormat::Yaml) => self.figment.merge(Yaml::file(path)),
            Some(FileFormat::Json) => self.figment.merge(Json::file(path)),
            None => self.figment,
        };
        self
    }
}

enum FileFormat {
    Toml,
    Yaml,
    Json,
}

fn format_of(path: &Path) -> Option<FileFormat> {
    match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
        "toml" => Some(FileFormat::Toml),
        "yaml" | "yml" => Some(FileFormat::Yaml),
        "json" => Some(FileFormat::Json),
        _ => None,
    }
}

fn platform_files() -> Vec<PathBuf> {
    let Some(dirs) = ProjectDirs::from("", "", FILE_STEM) else {
        return Vec::new();
    };
    ["toml", "yaml", "yml", "json"]
        .into_iter()
        .map(|ext| dirs.config_dir().join(format!("{FILE_STEM}.{ext}")))
        .filter(|path| path.is_file())
        .collect()
}
