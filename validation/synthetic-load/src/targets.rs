//! Request targets: the server instances and endpoint paths to exercise.

use std::fmt;

/// Local multi-instance deployment, one entry per API replica.
pub const DEFAULT_SERVERS: [&str; 3] = ["localhost:8000", "localhost:8001", "localhost:8002"];

/// One path per synthetic workload type exposed by each replica.
pub const DEFAULT_ENDPOINTS: [&str; 7] = [
    "/",
    "/io_task",
    "/cpu_task",
    "/random_sleep",
    "/random_status",
    "/chain",
    "/error_test",
];

/// A single (server, endpoint) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub server: String,
    pub endpoint: String,
}

impl Target {
    pub fn new(server: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            endpoint: endpoint.into(),
        }
    }

    /// Plain HTTP URL for this target, no query string.
    pub fn url(&self) -> String {
        format!("http://{}{}", self.server, self.endpoint)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "http://{}{}", self.server, self.endpoint)
    }
}

/// Ordered list of targets visited by one sweep iteration.
///
/// Server-major: every endpoint of the first server, then every endpoint of
/// the second, and so on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPlan {
    targets: Vec<Target>,
}

impl TargetPlan {
    /// Build the Cartesian product of `servers` x `endpoints`.
    pub fn new<S, E>(servers: &[S], endpoints: &[E]) -> Self
    where
        S: AsRef<str>,
        E: AsRef<str>,
    {
        let targets = servers
            .iter()
            .flat_map(|server| {
                endpoints
                    .iter()
                    .map(move |endpoint| Target::new(server.as_ref(), endpoint.as_ref()))
            })
            .collect();

        Self { targets }
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn urls(&self) -> impl Iterator<Item = String> + '_ {
        self.targets.iter().map(Target::url)
    }
}

impl Default for TargetPlan {
    fn default() -> Self {
        Self::new(&DEFAULT_SERVERS, &DEFAULT_ENDPOINTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_plan_size() {
        let plan = TargetPlan::default();
        assert_eq!(plan.len(), DEFAULT_SERVERS.len() * DEFAULT_ENDPOINTS.len());
        assert_eq!(plan.len(), 21);
    }

    #[test]
    fn test_default_plan_bounds() {
        let urls: Vec<String> = TargetPlan::default().urls().collect();
        assert_eq!(urls.first().map(String::as_str), Some("http://localhost:8000/"));
        assert_eq!(
            urls.last().map(String::as_str),
            Some("http://localhost:8002/error_test")
        );
    }

    #[test]
    fn test_plan_is_server_major() {
        let plan = TargetPlan::default();
        for (i, target) in plan.targets().iter().enumerate() {
            assert_eq!(target.server, DEFAULT_SERVERS[i / DEFAULT_ENDPOINTS.len()]);
            assert_eq!(target.endpoint, DEFAULT_ENDPOINTS[i % DEFAULT_ENDPOINTS.len()]);
        }
    }

    #[test]
    fn test_target_display_matches_url() {
        let target = Target::new("localhost:8001", "/chain");
        assert_eq!(target.url(), "http://localhost:8001/chain");
        assert_eq!(target.to_string(), target.url());
    }

    #[test]
    fn test_custom_plan() {
        let plan = TargetPlan::new(&["a:1"], &["/x", "/y"]);
        let urls: Vec<String> = plan.urls().collect();
        assert_eq!(urls, vec!["http://a:1/x", "http://a:1/y"]);
    }

    #[test]
    fn test_empty_lists_give_empty_plan() {
        let plan = TargetPlan::new::<&str, &str>(&[], &DEFAULT_ENDPOINTS);
        assert!(plan.is_empty());
    }
}
