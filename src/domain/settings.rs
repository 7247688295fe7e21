use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_true")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_true(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_true(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "robot_remote".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

/// Which transport backs the serial link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LinkBackend {
    /// In-process simulated robot
    #[default]
    Loopback,
    /// BLE UART (needs the `ble` cargo feature)
    Ble,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub log_settings: LogSettings,

    #[serde(default)]
    pub link_backend: LinkBackend,

    // Session timing
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub scan_timeout_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,

    // Joystick
    #[serde(default = "default_command_threshold")]
    pub command_threshold: f64,
    #[serde(default = "default_background_size")]
    pub joystick_background_size: f64,
    #[serde(default = "default_handle_size")]
    pub joystick_handle_size: f64,

    #[serde(default = "default_console_max_chars")]
    pub console_max_chars: usize,

    // HM-10 style UART service
    #[serde(default = "default_service_uuid")]
    pub ble_service_uuid: String,
    #[serde(default = "default_char_uuid")]
    pub ble_char_uuid: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_settings: LogSettings::default(),
            link_backend: LinkBackend::default(),
            tick_interval_ms: default_tick_interval_ms(),
            scan_timeout_ms: default_timeout_ms(),
            connect_timeout_ms: default_timeout_ms(),
            command_threshold: default_command_threshold(),
            joystick_background_size: default_background_size(),
            joystick_handle_size: default_handle_size(),
            console_max_chars: default_console_max_chars(),
            ble_service_uuid: default_service_uuid(),
            ble_char_uuid: default_char_uuid(),
        }
    }
}

impl Settings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

fn default_tick_interval_ms() -> u64 {
    100
}
fn default_timeout_ms() -> u64 {
    10_000
}
fn default_command_threshold() -> f64 {
    30.0
}
fn default_background_size() -> f64 {
    200.0
}
fn default_handle_size() -> f64 {
    60.0
}
fn default_console_max_chars() -> usize {
    16 * 1024
}
fn default_service_uuid() -> String {
    "0000ffe0-0000-1000-8000-00805f9b34fb".to_string()
}
fn default_char_uuid() -> String {
    "0000ffe1-0000-1000-8000-00805f9b34fb".to_string()
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    /// Loads settings from the user config directory, writing defaults on first run.
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::load_or_create(settings_path))
    }

    fn load_or_create(settings_path: PathBuf) -> Self {
        match Self::load_from_file(&settings_path) {
            Ok(settings) => Self {
                settings,
                settings_path,
            },
            Err(e) => {
                if settings_path.exists() {
                    warn!(
                        "Ignoring unreadable settings {}: {}",
                        settings_path.display(),
                        e
                    );
                }
                let service = Self {
                    settings: Settings::default(),
                    settings_path,
                };
                if let Err(e) = service.save() {
                    warn!("Could not write default settings: {}", e);
                }
                service
            }
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("RobotRemote");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: Settings = serde_json::from_str(r#"{ "link_backend": "ble" }"#).unwrap();
        assert_eq!(settings.link_backend, LinkBackend::Ble);
        assert_eq!(settings.tick_interval(), Duration::from_millis(100));
        assert_eq!(settings.scan_timeout(), Duration::from_secs(10));
        assert_eq!(settings.connect_timeout(), Duration::from_secs(10));
        assert_eq!(settings.command_threshold, 30.0);
        assert_eq!(settings.log_settings.file_name_prefix, "robot_remote");
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = std::env::temp_dir().join(format!("robot_remote_test_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.json");
        let _ = fs::remove_file(&path);

        let service = SettingsService::load_or_create(path.clone());
        assert_eq!(service.get().link_backend, LinkBackend::Loopback);
        assert!(path.exists());

        let reloaded = SettingsService::load_from_file(&path).unwrap();
        assert_eq!(reloaded.ble_char_uuid, default_char_uuid());

        let _ = fs::remove_dir_all(&dir);
    }
}
