use crate::error::ConfigurationError;
use crate::util;
use std::env;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

fn default_database_path() -> PathBuf {
    PathBuf::from(env::var("PROFILE_DB_PATH").unwrap_or("./database/profiles.json".to_string()))
}

fn default_public_content() -> PathBuf {
    PathBuf::from(env::var("PUBLIC_CONTENT_PATH").unwrap_or("./frontend".to_string()))
}

fn default_port() -> u16 {
    env::var("PORT")
        .ok()
        .and_then(|it| it.parse().ok())
        .unwrap_or(3000)
}

fn default_admin_backdoor() -> bool {
    util::env_flag("ADMIN_BACKDOOR", true)
}

fn default_server_defaults() -> bool {
    util::env_flag("SERVER_DEFAULTS", false)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip)]
    file_path: PathBuf,

    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    #[serde(default = "default_public_content")]
    pub public_content: PathBuf,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Accept `admin`/`admin` as a login without a stored record.
    #[serde(default = "default_admin_backdoor")]
    pub admin_backdoor: bool,

    /// Fill missing counters and maps of new profiles on the server.
    #[serde(default = "default_server_defaults")]
    pub server_defaults: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            file_path: config_dir().join("settings.yml"),
            database_path: default_database_path(),
            public_content: default_public_content(),
            port: default_port(),
            admin_backdoor: default_admin_backdoor(),
            server_defaults: default_server_defaults(),
        }
    }
}

#[inline]
fn config_dir() -> PathBuf {
    PathBuf::from(env::var("CONFIG_DIR").unwrap_or("./config".to_string()))
}

impl Config {
    pub fn load() -> Result<Config, ConfigurationError> {
        Config::load_from(config_dir())
    }

    pub fn load_from(dir: impl AsRef<Path>) -> Result<Config, ConfigurationError> {
        let config_file = util::find_first_subpath(
            dir.as_ref(),
            &["settings.yml", "settings.yaml"],
            Path::exists,
        )
        .ok_or_else(|| ConfigurationError::NotFound(dir.as_ref().to_path_buf()))?;

        let file = File::open(&config_file)?;
        let mut config: Config = serde_yaml::from_reader(BufReader::new(file))?;
        config.file_path = config_file;

        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigurationError> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&self.file_path)?;
        let mut out = BufWriter::new(file);
        serde_yaml::to_writer(&mut out, self)?;
        out.flush()?;
        Ok(())
    }

    /// Configuration for a store at `database_path`, with nothing read from disk.
    pub fn with_database(database_path: impl Into<PathBuf>) -> Config {
        Config {
            database_path: database_path.into(),
            ..Default::default()
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_config_loads_back() {
        let dir = util::temp_path("config");
        let mut config = Config::with_database("/tmp/profiles.json");
        config.file_path = dir.join("settings.yml");
        config.port = 8123;
        config.admin_backdoor = false;
        config.save().expect("unable to save config");

        let loaded = Config::load_from(&dir).expect("unable to load config");
        assert_eq!(loaded.file_path(), dir.join("settings.yml"));
        assert_eq!(loaded.database_path, PathBuf::from("/tmp/profiles.json"));
        assert_eq!(loaded.port, 8123);
        assert!(!loaded.admin_backdoor);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let dir = util::temp_path("config");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("settings.yaml"), "port: 4000\n").unwrap();

        let loaded = Config::load_from(&dir).expect("unable to load config");
        assert_eq!(loaded.port, 4000);
        assert_eq!(loaded.database_path, default_database_path());
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = util::temp_path("config");
        match Config::load_from(&dir) {
            Err(ConfigurationError::NotFound(path)) => assert_eq!(path, dir),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }
}
