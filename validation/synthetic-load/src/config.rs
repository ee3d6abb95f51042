//! Configuration loading and management.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LoadError, LoadResult};
use crate::targets::{TargetPlan, DEFAULT_ENDPOINTS, DEFAULT_SERVERS};

/// Main test configuration loaded from YAML.
///
/// Every field except `name` has a default, so an empty scenario reproduces
/// the plain sweep over the three local replicas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_servers")]
    pub servers: Vec<String>,
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,
    #[serde(default = "default_virtual_users")]
    pub virtual_users: u32,
    /// Stop starting new iterations after this many seconds.
    #[serde(default)]
    pub duration_secs: Option<u64>,
    /// Iterations per virtual user.
    #[serde(default)]
    pub iterations: Option<u64>,
    /// Pause after each sweep iteration.
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub user: UserConfig,
    #[serde(default)]
    pub seed: Option<u64>, // Optional RNG seed for reproducible weighted runs
}

/// Which user script each virtual user runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserConfig {
    /// Every endpoint on every server, then a fixed pause.
    #[default]
    Sweep,
    /// One weighted-random endpoint per iteration, then a random wait.
    Weighted {
        #[serde(default = "default_weighted_tasks")]
        tasks: Vec<WeightedTask>,
        /// Server to hit; defaults to the first entry of `servers`.
        #[serde(default)]
        base_server: Option<String>,
        #[serde(default = "default_wait_min_ms")]
        wait_min_ms: u64,
        #[serde(default = "default_wait_max_ms")]
        wait_max_ms: u64,
    },
}

/// Endpoint with a relative selection weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedTask {
    pub endpoint: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl WeightedTask {
    pub fn new(endpoint: impl Into<String>, weight: f64) -> Self {
        Self {
            endpoint: endpoint.into(),
            weight,
        }
    }
}

fn default_servers() -> Vec<String> {
    DEFAULT_SERVERS.iter().map(|s| s.to_string()).collect()
}

fn default_endpoints() -> Vec<String> {
    DEFAULT_ENDPOINTS.iter().map(|s| s.to_string()).collect()
}

fn default_virtual_users() -> u32 {
    1
}

fn default_pause_ms() -> u64 {
    500
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_wait_min_ms() -> u64 {
    1_000
}

fn default_wait_max_ms() -> u64 {
    5_000
}

fn default_weight() -> f64 {
    1.0
}

/// Task mix of the browsing user that runs against a single replica.
pub fn default_weighted_tasks() -> Vec<WeightedTask> {
    vec![
        WeightedTask::new("/", 10.0),
        WeightedTask::new("/io_task", 5.0),
        WeightedTask::new("/cpu_task", 5.0),
        WeightedTask::new("/random_sleep", 3.0),
        WeightedTask::new("/random_status", 10.0),
        WeightedTask::new("/chain", 3.0),
        WeightedTask::new("/error_test", 1.0),
    ]
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            name: "sweep".to_string(),
            description: "Every endpoint on every local replica".to_string(),
            servers: default_servers(),
            endpoints: default_endpoints(),
            virtual_users: default_virtual_users(),
            duration_secs: None,
            iterations: None,
            pause_ms: default_pause_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            user: UserConfig::Sweep,
            seed: None,
        }
    }
}

impl TestConfig {
    /// Load configuration from YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> LoadResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| LoadError::ScenarioRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| LoadError::ScenarioParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validate configuration.
    pub fn validate(&self) -> LoadResult<()> {
        if self.servers.is_empty() {
            return Err(LoadError::invalid("servers", "at least one server must be specified"));
        }
        for server in &self.servers {
            validate_server("servers", server)?;
        }
        if self.endpoints.is_empty() {
            return Err(LoadError::invalid("endpoints", "at least one endpoint must be specified"));
        }
        for endpoint in &self.endpoints {
            validate_endpoint("endpoints", endpoint)?;
        }
        if self.virtual_users == 0 {
            return Err(LoadError::invalid("virtual_users", "must be > 0"));
        }
        if self.duration_secs == Some(0) {
            return Err(LoadError::invalid("duration_secs", "must be > 0"));
        }
        if self.iterations == Some(0) {
            return Err(LoadError::invalid("iterations", "must be > 0"));
        }
        if self.request_timeout_secs == 0 {
            return Err(LoadError::invalid("request_timeout_secs", "must be > 0"));
        }

        if let UserConfig::Weighted {
            tasks,
            base_server,
            wait_min_ms,
            wait_max_ms,
        } = &self.user
        {
            if tasks.is_empty() {
                return Err(LoadError::invalid("user.tasks", "at least one task must be specified"));
            }
            for task in tasks {
                validate_endpoint("user.tasks", &task.endpoint)?;
                if !task.weight.is_finite() || task.weight < 0.0 {
                    return Err(LoadError::invalid(
                        "user.tasks",
                        format!("weight for '{}' must be a non-negative number", task.endpoint),
                    ));
                }
            }
            if tasks.iter().map(|t| t.weight).sum::<f64>() <= 0.0 {
                return Err(LoadError::invalid("user.tasks", "weights must not all be zero"));
            }
            if let Some(server) = base_server {
                validate_server("user.base_server", server)?;
            }
            if wait_min_ms > wait_max_ms {
                return Err(LoadError::invalid(
                    "user.wait_min_ms",
                    format!("{} exceeds wait_max_ms {}", wait_min_ms, wait_max_ms),
                ));
            }
        }

        Ok(())
    }

    /// Iterations per virtual user; one when neither bound is configured.
    pub fn iteration_budget(&self) -> Option<u64> {
        match (self.iterations, self.duration_secs) {
            (None, None) => Some(1),
            (iterations, _) => iterations,
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration_secs.map(Duration::from_secs)
    }

    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Sweep targets for this configuration.
    pub fn plan(&self) -> TargetPlan {
        TargetPlan::new(&self.servers, &self.endpoints)
    }
}

fn validate_server(field: &'static str, server: &str) -> LoadResult<()> {
    if server.trim().is_empty() {
        return Err(LoadError::invalid(field, "server must not be empty"));
    }
    if server.contains("://") || server.contains('/') {
        return Err(LoadError::invalid(
            field,
            format!("'{}' must be host:port without scheme or path", server),
        ));
    }
    Ok(())
}

fn validate_endpoint(field: &'static str, endpoint: &str) -> LoadResult<()> {
    if !endpoint.starts_with('/') {
        return Err(LoadError::invalid(
            field,
            format!("'{}' must start with '/'", endpoint),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid_sweep() {
        let config = TestConfig::default();
        config.validate().unwrap();
        assert!(matches!(config.user, UserConfig::Sweep));
        assert_eq!(config.pause(), Duration::from_millis(500));
        assert_eq!(config.plan().len(), 21);
        assert_eq!(config.iteration_budget(), Some(1));
    }

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let config: TestConfig = serde_yaml::from_str("name: minimal\n").unwrap();
        assert_eq!(config.servers, default_servers());
        assert_eq!(config.endpoints, default_endpoints());
        assert_eq!(config.virtual_users, 1);
        assert_eq!(config.pause_ms, 500);
        config.validate().unwrap();
    }

    #[test]
    fn test_weighted_yaml() {
        let yaml = r#"
name: browse
virtual_users: 10
duration_secs: 60
user:
  type: weighted
  base_server: localhost:8001
"#;
        let config: TestConfig = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.iteration_budget(), None);
        match config.user {
            UserConfig::Weighted {
                tasks,
                base_server,
                wait_min_ms,
                wait_max_ms,
            } => {
                assert_eq!(tasks, default_weighted_tasks());
                assert_eq!(base_server.as_deref(), Some("localhost:8001"));
                assert_eq!((wait_min_ms, wait_max_ms), (1_000, 5_000));
            }
            UserConfig::Sweep => panic!("expected weighted user"),
        }
    }

    #[test]
    fn test_validate_rejects_bad_lists() {
        let mut config = TestConfig::default();
        config.servers.clear();
        assert!(matches!(
            config.validate(),
            Err(LoadError::InvalidConfig { field: "servers", .. })
        ));

        let mut config = TestConfig::default();
        config.servers = vec!["http://localhost:8000".into()];
        assert!(config.validate().is_err());

        let mut config = TestConfig::default();
        config.endpoints = vec!["io_task".into()];
        assert!(matches!(
            config.validate(),
            Err(LoadError::InvalidConfig { field: "endpoints", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_budgets() {
        let mut config = TestConfig::default();
        config.virtual_users = 0;
        assert!(config.validate().is_err());

        let mut config = TestConfig::default();
        config.iterations = Some(0);
        assert!(config.validate().is_err());

        let mut config = TestConfig::default();
        config.duration_secs = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_weights() {
        let mut config = TestConfig::default();
        config.user = UserConfig::Weighted {
            tasks: vec![WeightedTask::new("/", 0.0)],
            base_server: None,
            wait_min_ms: 0,
            wait_max_ms: 0,
        };
        assert!(config.validate().is_err());

        config.user = UserConfig::Weighted {
            tasks: vec![WeightedTask::new("/", 1.0)],
            base_server: None,
            wait_min_ms: 10,
            wait_max_ms: 5,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_errors_name_the_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name: [unterminated").unwrap();

        let err = TestConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, LoadError::ScenarioParse { .. }));
        assert!(err.to_string().contains(&file.path().display().to_string()));

        let err = TestConfig::from_file("/nonexistent/scenario.yaml").unwrap_err();
        assert!(matches!(err, LoadError::ScenarioRead { .. }));
    }
}
