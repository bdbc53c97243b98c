use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub remote: RemoteConfig,
    pub storage: StorageConfig,
    pub debug: DebugConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RemoteConfig {
    pub enabled: bool,
    pub url: String,
    pub api_token: String,
    pub poll_interval_secs: u64,
    pub timeout_seconds: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StorageConfig {
    pub data_dir: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DebugConfig {
    pub debug_mode: bool,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "https://habitgrid.app".to_string(),
            api_token: "".to_string(),
            poll_interval_secs: 5,
            timeout_seconds: 10,
        }
    }
}

thread_local! {
    static TEST_CONFIG_PATH: RefCell<Option<PathBuf>> = const { RefCell::new(None) };
}

#[cfg(test)]
pub fn set_test_config_path(path: PathBuf) {
    TEST_CONFIG_PATH.with(|p| *p.borrow_mut() = Some(path));
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        #[cfg(test)]
        {
            if let Some(path) = TEST_CONFIG_PATH.with(|p| p.borrow().clone()) {
                return Ok(path);
            }
        }

        Ok(dirs::home_dir()
            .context("Could not find home directory")?
            .join(".habitgrid.toml"))
    }

    pub fn load() -> Result<Option<Config>> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;

        Ok(Some(config))
    }

    pub fn save(&self, silent: bool) -> Result<()> {
        let config_path = Self::config_path()?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, content).context("Failed to write config file")?;

        if !silent {
            println!("✅ Configuration saved to: {}", config_path.display());
        }

        Ok(())
    }

    /// Directory holding the local store.
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.storage.data_dir {
            Some(dir) if !dir.trim().is_empty() => Ok(PathBuf::from(dir)),
            _ => Ok(dirs::data_dir()
                .context("Could not find data directory")?
                .join("habitgrid")),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.remote.api_token.is_empty() && !self.remote.url.is_empty()
    }

    /// Remote storage is used only when switched on and fully configured.
    pub fn use_remote(&self) -> bool {
        self.remote.enabled && self.is_configured()
    }
}

// CLI helper functions
pub fn create_default_config(overwrite: bool) -> Result<()> {
    let config = Config::default();
    if !std::fs::exists(Config::config_path()?)? || overwrite {
        config.save(true)?;

        println!("📝 Created default configuration file.");
        println!("📍 To sync habits across devices, set your API token:");
        println!("   habitgrid config set api-token ...");
        println!("   habitgrid config set use-remote true");
        println!("or edit");
        println!("   {}", Config::config_path()?.display());
    } else {
        println!("Configuration already exists.  Pass `--overwrite` to overwrite.");
    }

    Ok(())
}

pub fn show_config() -> Result<()> {
    match Config::load()? {
        Some(config) => {
            println!("🔧 Current configuration:");
            println!("   Remote Sync: {}", config.remote.enabled);
            println!("   Remote URL: {}", config.remote.url);
            println!(
                "   API Token: {}",
                if config.remote.api_token.is_empty() {
                    "Not set"
                } else {
                    "Set"
                }
            );
            println!("   Poll Interval: {}s", config.remote.poll_interval_secs);
            println!("   Timeout: {}s", config.remote.timeout_seconds);
            println!("   Data Directory: {}", config.data_dir()?.display());
            println!("   Debug Mode: {}", config.debug.debug_mode);
        }
        None => {
            println!("❌ No configuration file found.");
            println!("   Run 'habitgrid config init' to create one.");
        }
    }
    Ok(())
}

fn parse_bool(value: &str) -> Result<bool> {
    value
        .parse::<bool>()
        .context("Invalid boolean value. Use 'true' or 'false'")
}

pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let mut config = Config::load()?.unwrap_or_default();

    match key {
        "remote-url" => config.remote.url = value.trim_end_matches('/').to_string(),
        "api-token" => config.remote.api_token = value.to_string(),
        "use-remote" => config.remote.enabled = parse_bool(value)?,
        "poll-interval" => {
            let secs = value.parse::<u64>().context("Invalid number value")?;
            if secs == 0 {
                anyhow::bail!("Poll interval must be at least 1 second");
            }
            config.remote.poll_interval_secs = secs;
        }
        "timeout" => {
            config.remote.timeout_seconds = value.parse::<u64>().context("Invalid number value")?;
        }
        "data-dir" => {
            config.storage.data_dir = if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            };
        }
        "debug-mode" => config.debug.debug_mode = parse_bool(value)?,
        _ => anyhow::bail!("Unknown config key: {}", key),
    }

    config.save(false)?;
    Ok(())
}
