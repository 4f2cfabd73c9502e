//! INI file configuration adapter.

use crate::domain::error::RollstitchError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RollstitchError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        if !path.exists() {
            return Err(RollstitchError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("config file not found: {}", path.display()),
            )));
        }
        config.load(path).map_err(|reason| RollstitchError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[broker]
base_url = https://api.topstepx.com
username = trader

[collector]
symbol = MGCZ25
bars = 500
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("broker", "base_url"),
            Some("https://api.topstepx.com".to_string())
        );
        assert_eq!(
            adapter.get_string("collector", "symbol"),
            Some("MGCZ25".to_string())
        );
        assert_eq!(adapter.get_int("collector", "bars", 0), 500);
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[stitch]\nmin_year = 20\n").unwrap();
        assert_eq!(adapter.get_string("stitch", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn get_int_returns_default_for_missing_or_non_numeric() {
        let adapter = FileConfigAdapter::from_string("[stitch]\nmin_year = abc\n").unwrap();
        assert_eq!(adapter.get_int("stitch", "min_year", 20), 20);
        assert_eq!(adapter.get_int("stitch", "days_back", 240), 240);
    }

    #[test]
    fn get_double_returns_value_or_default() {
        let adapter =
            FileConfigAdapter::from_string("[stitch]\nwarn_threshold = 0.75\n").unwrap();
        assert_eq!(adapter.get_double("stitch", "warn_threshold", 0.9), 0.75);
        assert_eq!(adapter.get_double("stitch", "missing", 0.9), 0.9);
    }

    #[test]
    fn get_bool_accepts_common_spellings() {
        let adapter = FileConfigAdapter::from_string(
            "[collector]\na = true\nb = yes\nc = 1\nd = off\ne = maybe\n",
        )
        .unwrap();
        assert!(adapter.get_bool("collector", "a", false));
        assert!(adapter.get_bool("collector", "b", false));
        assert!(adapter.get_bool("collector", "c", false));
        assert!(!adapter.get_bool("collector", "d", true));
        assert!(adapter.get_bool("collector", "e", true));
    }

    #[test]
    fn get_list_splits_and_trims() {
        let adapter = FileConfigAdapter::from_string(
            "[stitch]\ntimeframes = 1min, 5min ,,1hour\n",
        )
        .unwrap();
        assert_eq!(
            adapter.get_list("stitch", "timeframes"),
            Some(vec!["1min".to_string(), "5min".to_string(), "1hour".to_string()])
        );
        assert_eq!(adapter.get_list("stitch", "missing"), None);
    }

    #[test]
    fn dotted_target_keys_are_readable() {
        let adapter =
            FileConfigAdapter::from_string("[stitch]\ntarget_bars.1hour = 4000\n").unwrap();
        assert_eq!(adapter.get_int("stitch", "target_bars.1hour", 0), 4000);
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[status]\npath = /tmp/status.json\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("status", "path"),
            Some("/tmp/status.json".to_string())
        );
    }

    #[test]
    fn from_file_returns_error_for_missing_file() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        assert!(matches!(result, Err(RollstitchError::Io(_))));
    }
}
