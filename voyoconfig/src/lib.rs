//! # voyoconfig - Configuration de Voyo
//!
//! Ce module gère la configuration du service de résolution et de diffusion :
//! - Chargement depuis un fichier YAML (`config.yaml`)
//! - Fusion avec la configuration par défaut intégrée (`voyo.yaml`)
//! - Surcharges par variables d'environnement (`VOYO_CONFIG__SECTION__CLE=valeur`)
//! - Accesseurs typés avec valeurs par défaut
//! - Accès global via un singleton thread-safe
//!
//! Les autres crates du workspace étendent [`Config`] avec leurs propres
//! traits `*ConfigExt` (garde anti-abus, extraction, caches, miroir local).
//!
//! ## Utilisation
//!
//! ```no_run
//! use voyoconfig::get_config;
//!
//! let config = get_config();
//! let port = config.get_http_port();
//! let mirror_dir = config.get_managed_dir(&["mirror", "directory"], "mirror")?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Result, anyhow};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tracing::info;

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("voyo.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> =
        Arc::new(Config::load_config("").expect("Failed to load Voyo configuration"));
}

const ENV_CONFIG_DIR: &str = "VOYO_CONFIG";
const ENV_PREFIX: &str = "VOYO_CONFIG__";

const DEFAULT_HTTP_PORT: u16 = 8080;
const DEFAULT_BASE_URL: &str = "localhost";
const DEFAULT_LOG_BUFFER_CAPACITY: usize = 1000;
const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";
const DEFAULT_LOG_ENABLE_CONSOLE: bool = true;

/// Génère un getter/setter `usize` avec valeur par défaut
macro_rules! impl_usize_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> usize {
            self.get_usize($path, $default)
        }

        pub fn $setter(&self, size: usize) -> Result<()> {
            self.set_value($path, Value::Number(Number::from(size)))
        }
    };
}

/// Génère un getter/setter `bool` avec valeur par défaut
macro_rules! impl_bool_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> bool {
            self.get_bool($path, $default)
        }

        pub fn $setter(&self, value: bool) -> Result<()> {
            self.set_value($path, Value::Bool(value))
        }
    };
}

/// Gestionnaire de configuration
///
/// L'arbre YAML fusionné est conservé en mémoire derrière un `Mutex` et
/// réécrit sur disque à chaque modification.
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: String,
    data: Mutex<Value>,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        let data = self.data().clone();
        Self {
            config_dir: self.config_dir.clone(),
            path: self.path.clone(),
            data: Mutex::new(data),
        }
    }
}

impl Config {
    fn data(&self) -> MutexGuard<'_, Value> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cherche le répertoire de configuration
    ///
    /// Ordre : argument explicite, variable `VOYO_CONFIG`, `./.voyo`, `~/.voyo`.
    fn find_config_dir(directory: &str) -> String {
        if !directory.is_empty() {
            return directory.to_string();
        }

        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Trying to load config from env");
            return env_path;
        }

        if Path::new(".voyo").exists() {
            return ".voyo".to_string();
        }

        if let Some(home) = home_dir() {
            let home_config = home.join(".voyo");
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        ".voyo".to_string()
    }

    /// Crée le répertoire si besoin et vérifie les droits de lecture/écriture
    fn validate_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(anyhow!("{} is not a directory", path.display()));
        }

        let test_file = path.join(".write_test");
        fs::write(&test_file, b"test")?;
        fs::remove_file(&test_file)?;
        fs::read_dir(path)?;

        Ok(())
    }

    /// Charge la configuration depuis le répertoire indiqué
    ///
    /// 1. Détermine le répertoire de configuration
    /// 2. Charge la configuration intégrée
    /// 3. Fusionne le fichier `config.yaml` s'il existe
    /// 4. Applique les surcharges d'environnement
    /// 5. Sauvegarde le résultat fusionné
    ///
    /// # Arguments
    ///
    /// * `directory` - Répertoire contenant `config.yaml`, ou vide pour la recherche par défaut
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::find_config_dir(directory);
        Self::validate_config_dir(Path::new(&config_dir))?;
        info!(config_dir = %config_dir, "Using config directory");

        let config_file_path = Path::new(&config_dir).join("config.yaml");
        let path = config_file_path.to_string_lossy().to_string();

        let mut merged: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        match fs::read(&path) {
            Ok(data) => {
                info!(config_file = %path, "Loaded config file");
                let external: Value = serde_yaml::from_slice(&data)?;
                merge_yaml(&mut merged, &Self::lower_keys_value(external));
            }
            Err(_) => {
                info!(config_file = %path, "Config file not found, using embedded defaults");
            }
        }

        let mut config_value = Self::lower_keys_value(merged);
        Self::apply_env_overrides(&mut config_value);

        let config = Config {
            config_dir,
            path,
            data: Mutex::new(config_value),
        };

        config.save()?;
        Ok(config)
    }

    /// Sauvegarde la configuration courante dans `config.yaml`
    pub fn save(&self) -> Result<()> {
        let yaml = serde_yaml::to_string(&*self.data())?;
        fs::write(&self.path, yaml)?;
        Ok(())
    }

    /// Répertoire de configuration effectivement utilisé
    pub fn config_dir(&self) -> &str {
        &self.config_dir
    }

    /// Définit une valeur au chemin indiqué et sauvegarde
    ///
    /// # Arguments
    ///
    /// * `path` - Chemin de clés (ex: `&["guard", "window_secs"]`)
    /// * `value` - Valeur YAML à écrire
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        {
            let mut data = self.data();
            Self::set_value_internal(&mut data, path, value)?;
        }
        self.save()
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        if path.is_empty() {
            *data = value;
            return Ok(());
        }
        if let Value::Mapping(map) = data {
            let key_value = Value::String(path[0].to_lowercase());
            if path.len() == 1 {
                map.insert(key_value, value);
            } else {
                let entry = map
                    .entry(key_value)
                    .or_insert(Value::Mapping(Mapping::new()));
                Self::set_value_internal(entry, &path[1..], value)?;
            }
            Ok(())
        } else {
            Err(anyhow!("Current node is not a map"))
        }
    }

    /// Lit la valeur au chemin indiqué
    ///
    /// Retourne une erreur si le chemin n'existe pas.
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.data();
        Self::get_value_internal(&data, path)
    }

    fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
        let mut current = data;
        for (i, key) in path.iter().enumerate() {
            if let Value::Mapping(map) = current {
                match map.get(Value::String(key.to_lowercase())) {
                    Some(next) => current = next,
                    None => {
                        return Err(anyhow!("Path {} does not exist", path[..=i].join(".")));
                    }
                }
            } else {
                return Err(anyhow!("Path {} is not a mapping", path[..i].join(".")));
            }
        }
        Ok(current.clone())
    }

    fn apply_env_overrides(config: &mut Value) {
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                let key_path = stripped.split("__").collect::<Vec<_>>();
                let yaml_value = Self::convert_env_value(&value);
                if let Err(e) = Self::set_value_internal(config, &key_path, yaml_value) {
                    tracing::warn!("Ignoring env override {}: {}", key, e);
                }
            }
        }
    }

    fn convert_env_value(value: &str) -> Value {
        serde_yaml::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()))
    }

    fn lower_keys_value(value: Value) -> Value {
        match value {
            Value::Mapping(map) => {
                let mut new_map = Mapping::new();
                for (k, v) in map {
                    let key = match k {
                        Value::String(s) => Value::String(s.to_lowercase()),
                        other => other,
                    };
                    new_map.insert(key, Self::lower_keys_value(v));
                }
                Value::Mapping(new_map)
            }
            Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Self::lower_keys_value).collect())
            }
            _ => value,
        }
    }

    // ============ Accesseurs typés ============

    /// Lit un entier non signé, `default` si absent ou mal typé
    pub fn get_usize(&self, path: &[&str], default: usize) -> usize {
        match self.get_value(path) {
            Ok(Value::Number(n)) => n.as_u64().map(|v| v as usize).unwrap_or(default),
            Ok(Value::String(s)) => s.parse().unwrap_or(default),
            _ => default,
        }
    }

    /// Lit un booléen, `default` si absent ou mal typé
    pub fn get_bool(&self, path: &[&str], default: bool) -> bool {
        match self.get_value(path) {
            Ok(Value::Bool(b)) => b,
            _ => default,
        }
    }

    /// Lit une chaîne, `default` si absente ou vide
    pub fn get_string(&self, path: &[&str], default: &str) -> String {
        match self.get_value(path) {
            Ok(Value::String(s)) if !s.is_empty() => s,
            _ => default.to_string(),
        }
    }

    /// Lit une liste de chaînes (les éléments non textuels sont ignorés)
    pub fn get_string_list(&self, path: &[&str]) -> Vec<String> {
        match self.get_value(path) {
            Ok(Value::Sequence(seq)) => seq
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) if !s.is_empty() => Some(s),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Lit une durée exprimée en secondes
    pub fn get_secs(&self, path: &[&str], default: Duration) -> Duration {
        match self.get_value(path) {
            Ok(Value::Number(n)) => n.as_u64().map(Duration::from_secs).unwrap_or(default),
            _ => default,
        }
    }

    /// Résout un chemin relatif au répertoire de configuration et le crée si nécessaire
    fn resolve_and_create_dir(&self, dir_path: &str) -> Result<String> {
        let path = Path::new(dir_path);
        let absolute_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            Path::new(&self.config_dir).join(path)
        };

        if !absolute_path.exists() {
            fs::create_dir_all(&absolute_path)?;
            info!(directory = %absolute_path.display(), "Created managed directory");
        }

        Ok(absolute_path.to_string_lossy().to_string())
    }

    /// Récupère un répertoire géré par la configuration
    ///
    /// Le chemin configuré peut être absolu ou relatif au répertoire de
    /// configuration ; il est créé s'il n'existe pas. Si la clé est absente,
    /// `default` est enregistré puis utilisé.
    pub fn get_managed_dir(&self, path: &[&str], default: &str) -> Result<String> {
        let dir_path = match self.get_value(path) {
            Ok(Value::String(s)) if !s.is_empty() => s,
            _ => {
                self.set_value(path, Value::String(default.to_string()))?;
                default.to_string()
            }
        };
        self.resolve_and_create_dir(&dir_path)
    }

    /// URL de base publique du serveur HTTP
    pub fn get_base_url(&self) -> String {
        self.get_string(&["host", "base_url"], DEFAULT_BASE_URL)
    }

    /// Port HTTP d'écoute (8080 par défaut)
    pub fn get_http_port(&self) -> u16 {
        match self.get_value(&["host", "http_port"]) {
            Ok(Value::Number(n)) => match n.as_u64().and_then(|p| u16::try_from(p).ok()) {
                Some(port) => port,
                None => {
                    tracing::warn!("Invalid HTTP port {}, using default {}", n, DEFAULT_HTTP_PORT);
                    DEFAULT_HTTP_PORT
                }
            },
            Ok(Value::String(s)) => s.parse::<u16>().unwrap_or_else(|_| {
                tracing::warn!("Invalid HTTP port '{}', using default {}", s, DEFAULT_HTTP_PORT);
                DEFAULT_HTTP_PORT
            }),
            _ => DEFAULT_HTTP_PORT,
        }
    }

    pub fn set_http_port(&self, port: u16) -> Result<()> {
        self.set_value(&["host", "http_port"], Value::Number(Number::from(port)))
    }

    impl_usize_config!(
        get_log_cache_size,
        set_log_cache_size,
        &["host", "logger", "buffer_capacity"],
        DEFAULT_LOG_BUFFER_CAPACITY
    );

    impl_bool_config!(
        get_log_enable_console,
        set_log_enable_console,
        &["host", "logger", "enable_console"],
        DEFAULT_LOG_ENABLE_CONSOLE
    );

    /// Niveau de log minimum (`INFO` par défaut)
    pub fn get_log_min_level(&self) -> String {
        self.get_string(&["host", "logger", "min_level"], DEFAULT_LOG_MIN_LEVEL)
    }

    pub fn set_log_min_level(&self, level: String) -> Result<()> {
        self.set_value(&["host", "logger", "min_level"], Value::String(level))
    }
}

/// Retourne l'instance globale de configuration (chargée au premier accès)
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

/// Fusionne récursivement `external` dans `default`
///
/// Les mappings sont fusionnés clé par clé ; scalaires et séquences sont remplacés.
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}
