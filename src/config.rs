//! Layered, environment-aware JSON configuration.
//!
//! Settings are read once from `appsettings.json` and then from
//! `appsettings.{environment}.json` in a base directory. Nested objects are
//! flattened into `Parent:Child` keys and every value is kept as text;
//! typed access converts on read.
//!
//! ```rust,no_run
//! use shaper::config::{Configuration, ConfigurationExt, JsonConfiguration};
//!
//! # fn main() -> Result<(), shaper::config::ConfigError> {
//! let config = JsonConfiguration::load("./config")?;
//! let site: String = config.get_value("AppSettings:SiteName");
//! let pool: u32 = config.get_value("Database:PoolSize");
//! let db = config.get_connection_string("DefaultConnection");
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::de::value::{Error as SettingError, StrDeserializer};
use serde::de::{self, DeserializeOwned, Error as _, IntoDeserializer, Visitor};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error, warn};

/// Process variable naming the active environment.
pub const DEFAULT_ENVIRONMENT_VARIABLE: &str = "NETFX_ENVIRONMENT";

/// Environment used when nothing else names one.
pub const DEFAULT_ENVIRONMENT: &str = "Development";

const BASE_FILE: &str = "appsettings.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configured base directory does not exist
    #[error("configuration base path not found: {}", .0.display())]
    BaseDirectoryNotFound(PathBuf),
}

/// Where and how [`JsonConfiguration`] looks for its files.
#[derive(Debug, Clone)]
pub struct ConfigurationOptions {
    base_path: PathBuf,
    environment_variable: String,
    fallback_environment: Option<String>,
    default_environment: String,
}

impl ConfigurationOptions {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            environment_variable: DEFAULT_ENVIRONMENT_VARIABLE.to_string(),
            fallback_environment: None,
            default_environment: DEFAULT_ENVIRONMENT.to_string(),
        }
    }

    /// Reads the environment name from `name` instead of `NETFX_ENVIRONMENT`.
    pub fn environment_variable(mut self, name: impl Into<String>) -> Self {
        self.environment_variable = name.into();
        self
    }

    /// Application-level environment setting, consulted when the process
    /// variable is unset or empty.
    pub fn fallback_environment(mut self, environment: impl Into<String>) -> Self {
        self.fallback_environment = Some(environment.into());
        self
    }

    pub fn default_environment(mut self, environment: impl Into<String>) -> Self {
        self.default_environment = environment.into();
        self
    }

    fn resolve_environment(&self) -> String {
        env::var(&self.environment_variable)
            .ok()
            .filter(|name| !name.is_empty())
            .or_else(|| self.fallback_environment.clone().filter(|name| !name.is_empty()))
            .unwrap_or_else(|| self.default_environment.clone())
    }
}

/// Read access to flattened settings.
///
/// Object safe, so the store can be registered as a trait service:
///
/// ```rust
/// use shaper::config::{Configuration, JsonConfiguration};
/// use shaper::{Resolver, ServiceCollection};
/// use std::collections::HashMap;
/// use std::sync::Arc;
///
/// let settings = HashMap::from([(
///     "ConnectionStrings:Main".to_string(),
///     "Server=.;Database=app".to_string(),
/// )]);
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton_trait::<dyn Configuration>(Arc::new(JsonConfiguration::from_settings(settings)));
///
/// let provider = services.build();
/// let config = provider.get_required_trait::<dyn Configuration>().unwrap();
/// assert_eq!(config.get_connection_string("Main"), Some("Server=.;Database=app"));
/// ```
pub trait Configuration: Send + Sync {
    /// Raw text of `key`, or `None` when absent.
    fn get_str(&self, key: &str) -> Option<&str>;

    /// Every loaded setting.
    fn settings(&self) -> &HashMap<String, String>;

    /// Name of the active environment.
    fn environment(&self) -> &str;

    /// Shorthand for `get_str("ConnectionStrings:{name}")`.
    fn get_connection_string(&self, name: &str) -> Option<&str> {
        self.get_str(&format!("ConnectionStrings:{name}"))
    }
}

/// Typed reads on top of [`Configuration`].
pub trait ConfigurationExt: Configuration {
    /// Converts `key` to `T`.
    ///
    /// A missing key yields `T::default()`. A value that does not convert
    /// is logged and also yields `T::default()`.
    fn get_value<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        let Some(raw) = self.get_str(key) else {
            return T::default();
        };
        match parse_setting::<T>(raw) {
            Ok(value) => value,
            Err(err) => {
                error!(
                    key,
                    value = raw,
                    target_type = std::any::type_name::<T>(),
                    error = %err,
                    "cannot convert configuration value"
                );
                T::default()
            }
        }
    }

    /// Converts `key` to `T`, or `None` when it is absent or does not
    /// convert.
    fn try_get_value<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_str(key)?;
        match parse_setting::<T>(raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(
                    key,
                    value = raw,
                    target_type = std::any::type_name::<T>(),
                    error = %err,
                    "cannot convert configuration value"
                );
                None
            }
        }
    }
}

impl<C: Configuration + ?Sized> ConfigurationExt for C {}

/// Configuration loaded from layered JSON files.
#[derive(Debug, Clone)]
pub struct JsonConfiguration {
    settings: HashMap<String, String>,
    environment: String,
    base_path: Option<PathBuf>,
}

impl JsonConfiguration {
    /// Loads `appsettings.json` and the environment file from `base_path`.
    pub fn load(base_path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        Self::load_with(ConfigurationOptions::new(base_path))
    }

    pub fn load_with(options: ConfigurationOptions) -> Result<Self, ConfigError> {
        if !options.base_path.is_dir() {
            error!(path = %options.base_path.display(), "configuration base path not found");
            return Err(ConfigError::BaseDirectoryNotFound(options.base_path));
        }

        let environment = options.resolve_environment();
        let mut settings = HashMap::new();

        load_file(&options.base_path.join(BASE_FILE), &mut settings);
        if !environment.is_empty() {
            let env_file = options.base_path.join(format!("appsettings.{environment}.json"));
            load_file(&env_file, &mut settings);
        }

        debug!(
            environment = %environment,
            settings = settings.len(),
            path = %options.base_path.display(),
            "configuration loaded"
        );

        Ok(Self {
            settings,
            environment,
            base_path: Some(options.base_path),
        })
    }

    /// Wraps already flattened settings, mostly for tests and embedding.
    pub fn from_settings(settings: HashMap<String, String>) -> Self {
        Self {
            settings,
            environment: DEFAULT_ENVIRONMENT.to_string(),
            base_path: None,
        }
    }

    /// Directory the settings were read from.
    pub fn base_path(&self) -> Option<&Path> {
        self.base_path.as_deref()
    }
}

impl Configuration for JsonConfiguration {
    fn get_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    fn settings(&self) -> &HashMap<String, String> {
        &self.settings
    }

    fn environment(&self) -> &str {
        &self.environment
    }
}

fn load_file(path: &Path, settings: &mut HashMap<String, String>) {
    if !path.is_file() {
        debug!(path = %path.display(), "configuration file not found, skipping");
        return;
    }

    let parsed = fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|text| serde_json::from_str::<Value>(&text).map_err(|e| e.to_string()));

    match parsed {
        Ok(Value::Object(root)) => flatten_into(None, &root, settings),
        Ok(_) => warn!(path = %path.display(), "configuration root is not a JSON object, skipping"),
        Err(err) => error!(path = %path.display(), error = %err, "failed to load configuration file"),
    }
}

/// Flattens a JSON object into `Parent:Child` keys.
///
/// Strings are stored unquoted, arrays as compact JSON, `null` as the empty
/// string and other scalars as their JSON text.
///
/// ```rust
/// use serde_json::json;
/// use shaper::config::flatten_json;
///
/// let value = json!({ "A": { "B": 2 }, "C": [1, 2] });
/// let flat = flatten_json(value.as_object().unwrap());
/// assert_eq!(flat["A:B"], "2");
/// assert_eq!(flat["C"], "[1,2]");
/// ```
pub fn flatten_json(object: &Map<String, Value>) -> HashMap<String, String> {
    let mut out = HashMap::new();
    flatten_into(None, object, &mut out);
    out
}

fn flatten_into(prefix: Option<&str>, object: &Map<String, Value>, out: &mut HashMap<String, String>) {
    for (name, value) in object {
        let key = match prefix {
            Some(prefix) => format!("{prefix}:{name}"),
            None => name.clone(),
        };
        match value {
            Value::Object(nested) => flatten_into(Some(&key), nested, out),
            Value::String(text) => {
                out.insert(key, text.clone());
            }
            Value::Null => {
                out.insert(key, String::new());
            }
            other => {
                out.insert(key, other.to_string());
            }
        }
    }
}

/// Converts one setting's text into `T`.
///
/// Scalars parse from the trimmed text, booleans and unit enum variants
/// match case-insensitively, `Option` is `None` for empty text and
/// sequences, maps and structs are read as JSON.
pub fn parse_setting<T: DeserializeOwned>(raw: &str) -> Result<T, SettingError> {
    T::deserialize(SettingDeserializer { raw })
}

struct SettingDeserializer<'de> {
    raw: &'de str,
}

impl<'de> SettingDeserializer<'de> {
    fn parse<T>(&self, kind: &str) -> Result<T, SettingError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.raw
            .trim()
            .parse::<T>()
            .map_err(|e| SettingError::custom(format!("invalid {kind} `{}`: {e}", self.raw)))
    }

    fn via_json<V>(
        self,
        read: impl FnOnce(&mut serde_json::Deserializer<serde_json::de::StrRead<'de>>) -> Result<V, serde_json::Error>,
    ) -> Result<V, SettingError> {
        let mut json = serde_json::Deserializer::from_str(self.raw);
        let value = read(&mut json).map_err(SettingError::custom)?;
        json.end().map_err(SettingError::custom)?;
        Ok(value)
    }
}

macro_rules! parse_scalar {
    ($($method:ident => $visit:ident: $ty:ty),* $(,)?) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
                visitor.$visit(self.parse::<$ty>(stringify!($ty))?)
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for SettingDeserializer<'de> {
    type Error = SettingError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_borrowed_str(self.raw)
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        let text = self.raw.trim();
        if text.eq_ignore_ascii_case("true") {
            visitor.visit_bool(true)
        } else if text.eq_ignore_ascii_case("false") {
            visitor.visit_bool(false)
        } else {
            Err(SettingError::custom(format!("invalid bool `{}`", self.raw)))
        }
    }

    parse_scalar! {
        deserialize_i8 => visit_i8: i8,
        deserialize_i16 => visit_i16: i16,
        deserialize_i32 => visit_i32: i32,
        deserialize_i64 => visit_i64: i64,
        deserialize_u8 => visit_u8: u8,
        deserialize_u16 => visit_u16: u16,
        deserialize_u32 => visit_u32: u32,
        deserialize_u64 => visit_u64: u64,
        deserialize_f32 => visit_f32: f32,
        deserialize_f64 => visit_f64: f64,
        deserialize_char => visit_char: char,
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_borrowed_str(self.raw)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_borrowed_str(self.raw)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_borrowed_bytes(self.raw.as_bytes())
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_borrowed_bytes(self.raw.as_bytes())
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        let text = self.raw.trim();
        if text.is_empty() || text == "null" {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.via_json(|json| de::Deserializer::deserialize_seq(json, visitor))
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, len: usize, visitor: V) -> Result<V::Value, Self::Error> {
        self.via_json(|json| de::Deserializer::deserialize_tuple(json, len, visitor))
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.via_json(|json| de::Deserializer::deserialize_tuple_struct(json, name, len, visitor))
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.via_json(|json| de::Deserializer::deserialize_map(json, visitor))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.via_json(|json| de::Deserializer::deserialize_struct(json, name, fields, visitor))
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        let text = self.raw.trim();
        if text.starts_with('{') || text.starts_with('"') {
            return self.via_json(|json| de::Deserializer::deserialize_enum(json, name, variants, visitor));
        }
        match variants.iter().find(|variant| variant.eq_ignore_ascii_case(text)) {
            Some(variant) => {
                let access: StrDeserializer<'_, SettingError> = (*variant).into_deserializer();
                visitor.visit_enum(access)
            }
            None => Err(SettingError::unknown_variant(text, variants)),
        }
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_borrowed_str(self.raw)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }
}
