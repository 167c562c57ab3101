//! Configuration file loader with multi-source merging

use super::file_config::FileConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

const PROJECT_FILES: [&str; 2] = ["council.toml", ".council.toml"];

/// Environment variable prefix; `__` separates nested keys
/// (`COUNCIL_COORDINATION__STRATEGY=parallel`).
pub const ENV_PREFIX: &str = "COUNCIL_";

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. `COUNCIL_*` environment variables
    /// 2. Explicit config path (if provided)
    /// 3. Project root: `./council.toml` or `./.council.toml`
    /// 4. Global: `$XDG_CONFIG_HOME/care-council/config.toml`
    /// 5. Default values
    pub fn load(config_path: Option<&PathBuf>) -> Result<FileConfig, Box<figment::Error>> {
        Self::figment(config_path, Path::new("."))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)
    }

    /// File sources only, with project files searched in `project_dir`.
    fn figment(config_path: Option<&PathBuf>, project_dir: &Path) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            figment = figment.merge(Toml::file(&global_path));
        }

        if let Some(path) = Self::find_project_file(project_dir) {
            figment = figment.merge(Toml::file(&path));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    /// Get the global config file path
    ///
    /// Returns XDG_CONFIG_HOME/care-council/config.toml if set,
    /// otherwise the platform config dir equivalent
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("care-council").join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path() -> Option<PathBuf> {
        Self::find_project_file(Path::new("."))
    }

    fn find_project_file(dir: &Path) -> Option<PathBuf> {
        PROJECT_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
    }

    /// Print the config file locations being used (for debugging)
    pub fn print_config_sources() {
        println!("Configuration sources (in priority order):");
        println!("  [     ] Env:     {}* variables", ENV_PREFIX);

        if let Some(path) = Self::project_config_path() {
            println!("  [FOUND] Project: {}", path.display());
        } else {
            println!("  [     ] Project: ./council.toml or ./.council.toml");
        }

        if let Some(path) = Self::global_config_path() {
            if path.exists() {
                println!("  [FOUND] Global:  {}", path.display());
            } else {
                println!("  [     ] Global:  {}", path.display());
            }
        }

        println!("  [     ] Default: built-in defaults");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn extract(config_path: Option<&PathBuf>, project_dir: &Path) -> FileConfig {
        // Skip the global file so the host's config cannot leak into tests
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));
        if let Some(path) = ConfigLoader::find_project_file(project_dir) {
            figment = figment.merge(Toml::file(path));
        }
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }
        figment.extract().unwrap()
    }

    #[test]
    fn test_load_defaults() {
        let config = ConfigLoader::load_defaults();
        assert!(config.coordination.strategy.is_none());
        assert!(config.output.color);
    }

    #[test]
    fn test_global_config_path_returns_some() {
        let path = ConfigLoader::global_config_path();
        assert!(path.is_some());
        assert!(path.unwrap().to_string_lossy().contains("care-council"));
    }

    #[test]
    fn test_project_file_is_found() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(".council.toml"),
            "[coordination]\nstrategy = \"consensus\"\n",
        )
        .unwrap();

        let config = extract(None, dir.path());
        assert_eq!(config.coordination.strategy.as_deref(), Some("consensus"));
    }

    #[test]
    fn test_explicit_file_overrides_project_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("council.toml"),
            "[coordination]\nstrategy = \"consensus\"\n\n[runtime]\ncall_timeout_secs = 5\n",
        )
        .unwrap();
        let explicit = dir.path().join("override.toml");
        fs::write(&explicit, "[coordination]\nstrategy = \"parallel\"\n").unwrap();

        let config = extract(Some(&explicit), dir.path());
        assert_eq!(config.coordination.strategy.as_deref(), Some("parallel"));
        // Untouched keys from the project file survive the merge
        assert_eq!(config.runtime.call_timeout_secs, 5);
    }

    #[test]
    fn test_invalid_value_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("bad.toml");
        fs::write(&explicit, "[runtime]\ncall_timeout_secs = \"soon\"\n").unwrap();

        let result = ConfigLoader::figment(Some(&explicit), dir.path()).extract::<FileConfig>();
        assert!(result.is_err());
    }
}
