// ⚙️ Engine configuration - JSON file and/or ACADEMIC_RECORDS_* env vars
//
// Precedence: defaults < config file (ACADEMIC_RECORDS_CONFIG) < individual env vars.

use crate::catalog::{CourseRegistry, StudentRegistry};
use crate::clock::SystemClock;
use crate::db::Database;
use crate::engine::RecordsEngine;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const ENV_CONFIG: &str = "ACADEMIC_RECORDS_CONFIG";
pub const ENV_DB: &str = "ACADEMIC_RECORDS_DB";
pub const ENV_CATALOG: &str = "ACADEMIC_RECORDS_CATALOG";
pub const ENV_STUDENTS: &str = "ACADEMIC_RECORDS_STUDENTS";
pub const ENV_ADDR: &str = "ACADEMIC_RECORDS_ADDR";
pub const ENV_BUSY_TIMEOUT_MS: &str = "ACADEMIC_RECORDS_BUSY_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub database_path: PathBuf,

    /// How long a writer waits on a locked database before failing
    pub busy_timeout_ms: u64,

    /// courses.csv (id,code,title,credits,prerequisites)
    pub catalog_csv: Option<PathBuf>,

    /// students.csv (id,name)
    pub students_csv: Option<PathBuf>,

    pub server_addr: String,

    /// Actor recorded when the caller does not name one
    pub default_actor: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            database_path: PathBuf::from("academic_records.db"),
            busy_timeout_ms: 5_000,
            catalog_csv: None,
            students_csv: None,
            server_addr: "0.0.0.0:3000".to_string(),
            default_actor: "registrar".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file; missing keys fall back to defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Resolve configuration through an arbitrary variable lookup
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match lookup(ENV_CONFIG) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        if let Some(db) = lookup(ENV_DB) {
            config.database_path = PathBuf::from(db);
        }
        if let Some(catalog) = lookup(ENV_CATALOG) {
            config.catalog_csv = Some(PathBuf::from(catalog));
        }
        if let Some(students) = lookup(ENV_STUDENTS) {
            config.students_csv = Some(PathBuf::from(students));
        }
        if let Some(addr) = lookup(ENV_ADDR) {
            config.server_addr = addr;
        }
        if let Some(ms) = lookup(ENV_BUSY_TIMEOUT_MS) {
            config.busy_timeout_ms = ms
                .trim()
                .parse()
                .with_context(|| {
                    format!("{} must be milliseconds, got {:?}", ENV_BUSY_TIMEOUT_MS, ms)
                })?;
        }

        Ok(config)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn open_database(&self) -> Result<Database> {
        Database::open(&self.database_path, self.busy_timeout())
            .with_context(|| format!("Failed to open database: {:?}", self.database_path))
    }

    pub fn load_catalog(&self) -> Result<CourseRegistry> {
        match &self.catalog_csv {
            Some(path) => CourseRegistry::load_csv(path),
            None => {
                tracing::warn!("no course catalog configured, catalog is empty");
                Ok(CourseRegistry::new())
            }
        }
    }

    pub fn load_students(&self) -> Result<StudentRegistry> {
        match &self.students_csv {
            Some(path) => StudentRegistry::load_csv(path),
            None => {
                tracing::warn!("no student directory configured, directory is empty");
                Ok(StudentRegistry::new())
            }
        }
    }

    /// Database + CSV collaborators + wall clock, wired into one engine
    pub fn build_engine(&self) -> Result<RecordsEngine> {
        let db = self.open_database()?;
        let catalog = self.load_catalog()?;
        let students = self.load_students()?;

        tracing::info!(
            db = %self.database_path.display(),
            courses = catalog.count(),
            students = students.count(),
            "records engine ready"
        );

        Ok(RecordsEngine::new(
            db,
            Arc::new(catalog),
            Arc::new(students),
            Arc::new(SystemClock),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = EngineConfig::from_vars(vars(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.busy_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_env_overrides() {
        let config = EngineConfig::from_vars(vars(&[
            (ENV_DB, "/var/lib/records.db"),
            (ENV_CATALOG, "courses.csv"),
            (ENV_ADDR, "127.0.0.1:8080"),
            (ENV_BUSY_TIMEOUT_MS, "250"),
        ]))
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/var/lib/records.db"));
        assert_eq!(config.catalog_csv, Some(PathBuf::from("courses.csv")));
        assert_eq!(config.students_csv, None);
        assert_eq!(config.server_addr, "127.0.0.1:8080");
        assert_eq!(config.busy_timeout_ms, 250);
    }

    #[test]
    fn test_bad_timeout_is_rejected() {
        let result = EngineConfig::from_vars(vars(&[(ENV_BUSY_TIMEOUT_MS, "soon")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_file_then_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"database_path": "from_file.db", "default_actor": "admissions"}}"#
        )
        .unwrap();
        let path = file.path().to_string_lossy().to_string();

        let config = EngineConfig::from_vars(vars(&[(ENV_CONFIG, path.as_str())])).unwrap();
        assert_eq!(config.database_path, PathBuf::from("from_file.db"));
        assert_eq!(config.default_actor, "admissions");
        assert_eq!(config.busy_timeout_ms, 5_000);

        let config = EngineConfig::from_vars(vars(&[
            (ENV_CONFIG, path.as_str()),
            (ENV_DB, "override.db"),
        ]))
        .unwrap();
        assert_eq!(config.database_path, PathBuf::from("override.db"));
        assert_eq!(config.default_actor, "admissions");
    }

    #[test]
    fn test_missing_config_file() {
        let err = EngineConfig::from_file("/nonexistent/records.json").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_build_engine_from_csv() {
        let dir = tempfile::tempdir().unwrap();
        let courses = dir.path().join("courses.csv");
        let students = dir.path().join("students.csv");
        fs::write(
            &courses,
            "id,code,title,credits,prerequisites\n\
             CS101,CS101,Intro,3,\n\
             CS201,CS201,Data Structures,4,CS101\n",
        )
        .unwrap();
        fs::write(&students, "id,name\nS1,Ada Lovelace\n").unwrap();

        let config = EngineConfig {
            database_path: dir.path().join("records.db"),
            catalog_csv: Some(courses),
            students_csv: Some(students),
            ..EngineConfig::default()
        };
        let engine = config.build_engine().unwrap();

        let check = engine.validate_prerequisites("S1", "CS201").unwrap();
        assert_eq!(check.missing, vec!["CS101".to_string()]);
    }
}
