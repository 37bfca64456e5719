//! Settings storage with dotted-key access
//!
//! Columns consult option keys like `file.column.indent.chars` while
//! drawing, so settings are held as a TOML table and resolved by key
//! path at call time rather than deserialized into one fixed struct.
//! Missing keys fall back to the caller's default; a key holding a
//! value of the wrong type is a configuration error.

use crate::error::{CoreError, CoreResult};
use crate::event::{Event, EventBus};
use parking_lot::RwLock;
use std::fs;
use std::path::PathBuf;
use toml::Value;

/// Shared settings handle
///
/// Cheap to share behind an `Arc`; reads take a short lock so columns
/// can consult options synchronously during a render pass.
///
/// # Example
///
/// ```
/// use arbor_core::settings::Settings;
///
/// let settings = Settings::from_toml("[file.column.size]\nhuman = true").unwrap();
/// assert_eq!(settings.get_bool("file.column.size.human", false).unwrap(), true);
/// assert_eq!(settings.get_str("file.template", "indent filename").unwrap(), "indent filename");
/// ```
#[derive(Debug)]
pub struct Settings {
    table: RwLock<Value>,
    bus: EventBus,
}

impl Settings {
    /// Loads settings from the user config file, or defaults when absent
    ///
    /// The file lives at `<config dir>/arbor/config.toml`. A missing
    /// file yields empty settings; a file that fails to parse is an
    /// error so the user sees it once instead of silently losing
    /// their configuration.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Io` if the file exists but cannot be read,
    /// or `CoreError::SettingsParse` if it is not valid TOML.
    pub fn load(bus: EventBus) -> CoreResult<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(&path)?;
                let table = contents
                    .parse::<Value>()
                    .map_err(|source| CoreError::SettingsParse { path, source })?;
                Ok(Settings {
                    table: RwLock::new(table),
                    bus,
                })
            }
            _ => Ok(Settings {
                table: RwLock::new(Value::Table(Default::default())),
                bus,
            }),
        }
    }

    /// Parses settings from a TOML string
    ///
    /// # Errors
    ///
    /// Returns `CoreError::SettingsParse` if the string is not valid TOML.
    pub fn from_toml(contents: &str) -> CoreResult<Self> {
        let table = contents
            .parse::<Value>()
            .map_err(|source| CoreError::SettingsParse {
                path: PathBuf::from("<inline>"),
                source,
            })?;
        Ok(Settings {
            table: RwLock::new(table),
            bus: EventBus::default(),
        })
    }

    /// Empty settings; every lookup falls back to its default
    pub fn empty() -> Self {
        Settings {
            table: RwLock::new(Value::Table(Default::default())),
            bus: EventBus::default(),
        }
    }

    /// Path of the user config file, when a config directory exists
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("arbor").join("config.toml"))
    }

    /// Re-reads the config file and publishes [`Event::SettingsChanged`]
    ///
    /// Subscribers re-parse templates and hidden rules on this event.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Settings::load`]; on error the previous
    /// settings stay in effect.
    pub fn reload(&self) -> CoreResult<()> {
        if let Some(path) = Self::config_path() {
            if path.exists() {
                let contents = fs::read_to_string(&path)?;
                let table = contents
                    .parse::<Value>()
                    .map_err(|source| CoreError::SettingsParse { path, source })?;
                *self.table.write() = table;
            }
        }
        self.bus.publish(Event::SettingsChanged);
        Ok(())
    }

    /// Looks up a string value by dotted key
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidSetting` if the key exists but holds
    /// a non-string value.
    pub fn get_str(&self, key: &str, default: &str) -> CoreResult<String> {
        match self.lookup(key) {
            None => Ok(default.to_string()),
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(Self::type_error(key, "string", &other)),
        }
    }

    /// Looks up a boolean value by dotted key
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidSetting` if the key exists but holds
    /// a non-boolean value.
    pub fn get_bool(&self, key: &str, default: bool) -> CoreResult<bool> {
        match self.lookup(key) {
            None => Ok(default),
            Some(Value::Boolean(b)) => Ok(b),
            Some(other) => Err(Self::type_error(key, "boolean", &other)),
        }
    }

    /// Looks up a non-negative integer value by dotted key
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidSetting` if the key exists but holds
    /// anything other than a non-negative integer.
    pub fn get_usize(&self, key: &str, default: usize) -> CoreResult<usize> {
        match self.lookup(key) {
            None => Ok(default),
            Some(Value::Integer(n)) if n >= 0 => Ok(n as usize),
            Some(other) => Err(Self::type_error(key, "non-negative integer", &other)),
        }
    }

    /// Looks up a list of strings by dotted key
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidSetting` if the key exists but holds
    /// anything other than an array of strings.
    pub fn get_str_list(&self, key: &str, default: &[&str]) -> CoreResult<Vec<String>> {
        match self.lookup(key) {
            None => Ok(default.iter().map(|s| s.to_string()).collect()),
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s),
                    other => Err(Self::type_error(key, "array of strings", &other)),
                })
                .collect(),
            Some(other) => Err(Self::type_error(key, "array of strings", &other)),
        }
    }

    /// Looks up a value constrained to an enumerated set of choices
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidSetting` if the stored value is not
    /// one of `choices`.
    pub fn get_enum(&self, key: &str, choices: &[&str], default: &str) -> CoreResult<String> {
        let value = self.get_str(key, default)?;
        if choices.contains(&value.as_str()) {
            Ok(value)
        } else {
            Err(CoreError::InvalidSetting {
                key: key.to_string(),
                message: format!("expected one of {:?}, got {:?}", choices, value),
            })
        }
    }

    /// Sets a value by dotted key, creating intermediate tables
    ///
    /// Used by tests and by runtime toggles that persist for the
    /// session only.
    pub fn set(&self, key: &str, value: Value) {
        let mut table = self.table.write();
        let parts: Vec<&str> = key.split('.').collect();
        if let Some(map) = table.as_table_mut() {
            Self::insert_at(map, &parts, value);
        }
    }

    fn insert_at(map: &mut toml::map::Map<String, Value>, parts: &[&str], value: Value) {
        match parts {
            [] => {}
            [last] => {
                map.insert(last.to_string(), value);
            }
            [head, rest @ ..] => {
                let entry = map
                    .entry(head.to_string())
                    .or_insert_with(|| Value::Table(Default::default()));
                if !entry.is_table() {
                    *entry = Value::Table(Default::default());
                }
                if let Some(child) = entry.as_table_mut() {
                    Self::insert_at(child, rest, value);
                }
            }
        }
    }

    fn lookup(&self, key: &str) -> Option<Value> {
        let table = self.table.read();
        let mut current = &*table;
        for part in key.split('.') {
            current = current.as_table()?.get(part)?;
        }
        Some(current.clone())
    }

    fn type_error(key: &str, expected: &str, got: &Value) -> CoreError {
        CoreError::InvalidSetting {
            key: key.to_string(),
            message: format!("expected {}, got {}", expected, got.type_str()),
        }
    }
}
