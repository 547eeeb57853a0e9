//! Configuration file management for modplan.
//!
//! Provides a TOML-based config file at `~/.config/modplan/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use modplan_core::revalidate::DEFAULT_QUIET_WINDOW;

pub const DEFAULT_CATALOG: &str = "catalog.toml";
pub const DEFAULT_REQUIREMENTS: &str = "requirements.toml";
pub const DEFAULT_MAX_CREDITS: i64 = 20;

/// Courses most incoming students are exempted from.
pub const DEFAULT_EXEMPTED: &[&str] = &["MA1301", "ES1103", "ES1000"];

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub data: DataSection,
    #[serde(default)]
    pub planning: PlanningSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DataSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlanningSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_credits: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exempted: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiet_window_ms: Option<u64>,
}

impl Default for PlanningSection {
    fn default() -> Self {
        Self {
            max_credits: Some(Decimal::from(DEFAULT_MAX_CREDITS)),
            exempted: Some(DEFAULT_EXEMPTED.iter().map(|c| c.to_string()).collect()),
            quiet_window_ms: Some(
                u64::try_from(DEFAULT_QUIET_WINDOW.as_millis()).unwrap_or(u64::MAX),
            ),
        }
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the modplan config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/modplan` or `~/.config/modplan`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("modplan");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("modplan")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct ModplanConfig {
    pub catalog_path: PathBuf,
    pub requirements_path: PathBuf,
    pub max_credits: Decimal,
    pub exempted: Vec<String>,
    pub quiet_window: Duration,
}

impl ModplanConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - Catalog: `cli_catalog` > `MODPLAN_CATALOG` > `data.catalog` > `catalog.toml`
    /// - Requirements: `cli_requirements` > `MODPLAN_REQUIREMENTS` > `data.requirements` > `requirements.toml`
    /// - Max credits: `cli_max_credits` > `MODPLAN_MAX_CREDITS` > `planning.max_credits` > 20
    /// - Exemptions and quiet window: config file > default
    pub fn resolve(
        cli_catalog: Option<&Path>,
        cli_requirements: Option<&Path>,
        cli_max_credits: Option<Decimal>,
    ) -> Result<Self> {
        let file_config = match load_config() {
            Ok(cfg) => Some(cfg),
            Err(e) => {
                if config_path().exists() {
                    tracing::warn!(error = %format!("{e:#}"), "ignoring unreadable config file");
                }
                None
            }
        };
        let data = file_config.as_ref().map(|c| &c.data);
        let planning = file_config.as_ref().map(|c| &c.planning);

        let catalog_path = resolve_path(
            cli_catalog,
            "MODPLAN_CATALOG",
            data.and_then(|d| d.catalog.as_deref()),
            DEFAULT_CATALOG,
        );
        let requirements_path = resolve_path(
            cli_requirements,
            "MODPLAN_REQUIREMENTS",
            data.and_then(|d| d.requirements.as_deref()),
            DEFAULT_REQUIREMENTS,
        );

        let max_credits = if let Some(max) = cli_max_credits {
            max
        } else if let Ok(raw) = std::env::var("MODPLAN_MAX_CREDITS") {
            Decimal::from_str(raw.trim())
                .with_context(|| format!("MODPLAN_MAX_CREDITS is not a number: {raw:?}"))?
        } else if let Some(max) = planning.and_then(|p| p.max_credits) {
            max
        } else {
            Decimal::from(DEFAULT_MAX_CREDITS)
        };
        if max_credits <= Decimal::ZERO {
            bail!("max credits per semester must be positive, got {max_credits}");
        }

        let exempted = planning
            .and_then(|p| p.exempted.clone())
            .unwrap_or_else(|| DEFAULT_EXEMPTED.iter().map(|c| c.to_string()).collect());

        let quiet_window = planning
            .and_then(|p| p.quiet_window_ms)
            .map_or(DEFAULT_QUIET_WINDOW, Duration::from_millis);

        Ok(Self {
            catalog_path,
            requirements_path,
            max_credits,
            exempted,
            quiet_window,
        })
    }
}

fn resolve_path(cli: Option<&Path>, env: &str, file: Option<&Path>, default: &str) -> PathBuf {
    if let Some(path) = cli {
        path.to_path_buf()
    } else if let Ok(path) = std::env::var(env) {
        PathBuf::from(path)
    } else if let Some(path) = file {
        path.to_path_buf()
    } else {
        PathBuf::from(default)
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        crate::test_util::lock_env()
    }

    /// Point the config directory at an empty temp dir for the duration of
    /// `f`, with the modplan env vars cleared.
    fn with_isolated_config<T>(f: impl FnOnce(&Path) -> T) -> T {
        let tmp = tempfile::TempDir::new().unwrap();
        let orig_xdg = std::env::var("XDG_CONFIG_HOME").ok();
        unsafe { std::env::set_var("XDG_CONFIG_HOME", tmp.path()) };
        for var in ["MODPLAN_CATALOG", "MODPLAN_REQUIREMENTS", "MODPLAN_MAX_CREDITS"] {
            unsafe { std::env::remove_var(var) };
        }

        let result = f(tmp.path());

        match orig_xdg {
            Some(x) => unsafe { std::env::set_var("XDG_CONFIG_HOME", x) },
            None => unsafe { std::env::remove_var("XDG_CONFIG_HOME") },
        }
        result
    }

    #[test]
    fn defaults_when_nothing_set() {
        let _lock = lock_env();
        let config = with_isolated_config(|_| ModplanConfig::resolve(None, None, None)).unwrap();

        assert_eq!(config.catalog_path, PathBuf::from(DEFAULT_CATALOG));
        assert_eq!(config.requirements_path, PathBuf::from(DEFAULT_REQUIREMENTS));
        assert_eq!(config.max_credits, Decimal::from(20));
        assert_eq!(config.exempted, ["MA1301", "ES1103", "ES1000"]);
        assert_eq!(config.quiet_window, DEFAULT_QUIET_WINDOW);
    }

    #[test]
    fn config_file_overrides_defaults() {
        let _lock = lock_env();
        let config = with_isolated_config(|_| {
            let cfg = ConfigFile {
                data: DataSection {
                    catalog: Some(PathBuf::from("/data/catalog.toml")),
                    requirements: None,
                },
                planning: PlanningSection {
                    max_credits: Some(Decimal::from(24)),
                    exempted: Some(Vec::new()),
                    quiet_window_ms: Some(100),
                },
            };
            save_config(&cfg).unwrap();
            ModplanConfig::resolve(None, None, None)
        })
        .unwrap();

        assert_eq!(config.catalog_path, PathBuf::from("/data/catalog.toml"));
        assert_eq!(config.requirements_path, PathBuf::from(DEFAULT_REQUIREMENTS));
        assert_eq!(config.max_credits, Decimal::from(24));
        assert!(config.exempted.is_empty());
        assert_eq!(config.quiet_window, Duration::from_millis(100));
    }

    #[test]
    fn env_var_overrides_config_file_and_cli_overrides_env() {
        let _lock = lock_env();
        let (from_env, from_cli) = with_isolated_config(|_| {
            let cfg = ConfigFile {
                data: DataSection {
                    catalog: Some(PathBuf::from("/file/catalog.toml")),
                    requirements: None,
                },
                planning: PlanningSection::default(),
            };
            save_config(&cfg).unwrap();
            unsafe { std::env::set_var("MODPLAN_CATALOG", "/env/catalog.toml") };
            unsafe { std::env::set_var("MODPLAN_MAX_CREDITS", "16") };

            let from_env = ModplanConfig::resolve(None, None, None);
            let from_cli = ModplanConfig::resolve(
                Some(Path::new("/cli/catalog.toml")),
                None,
                Some(Decimal::from(12)),
            );

            unsafe { std::env::remove_var("MODPLAN_CATALOG") };
            unsafe { std::env::remove_var("MODPLAN_MAX_CREDITS") };
            (from_env, from_cli)
        });

        let from_env = from_env.unwrap();
        assert_eq!(from_env.catalog_path, PathBuf::from("/env/catalog.toml"));
        assert_eq!(from_env.max_credits, Decimal::from(16));

        let from_cli = from_cli.unwrap();
        assert_eq!(from_cli.catalog_path, PathBuf::from("/cli/catalog.toml"));
        assert_eq!(from_cli.max_credits, Decimal::from(12));
    }

    #[test]
    fn rejects_bad_max_credits() {
        let _lock = lock_env();
        let (garbage, zero) = with_isolated_config(|_| {
            unsafe { std::env::set_var("MODPLAN_MAX_CREDITS", "lots") };
            let garbage = ModplanConfig::resolve(None, None, None);
            unsafe { std::env::remove_var("MODPLAN_MAX_CREDITS") };
            let zero = ModplanConfig::resolve(None, None, Some(Decimal::ZERO));
            (garbage, zero)
        });

        let msg = garbage.unwrap_err().to_string();
        assert!(msg.contains("MODPLAN_MAX_CREDITS"), "unexpected error: {msg}");
        assert!(zero.is_err());
    }

    #[cfg(unix)]
    #[test]
    fn save_config_sets_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let _lock = lock_env();
        let mode = with_isolated_config(|_| {
            save_config(&ConfigFile::default()).unwrap();
            std::fs::metadata(config_path()).unwrap().permissions().mode()
        });
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn default_config_file_round_trips() {
        let text = toml::to_string_pretty(&ConfigFile::default()).unwrap();
        let parsed: ConfigFile = toml::from_str(&text).unwrap();
        assert_eq!(parsed.planning.max_credits, Some(Decimal::from(20)));
        assert_eq!(parsed.planning.exempted.unwrap().len(), 3);
        assert_eq!(parsed.planning.quiet_window_ms, Some(800));
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let path = config_path();
        assert!(
            path.ends_with("modplan/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
