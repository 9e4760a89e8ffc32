//! Logical endpoint names and their default relative paths.
//!
//! Paths are relative so they resolve against the client's target with
//! standard URL joining. A target of `http://host:6800/scrapyd/` resolves
//! `listjobs.json` to `http://host:6800/scrapyd/listjobs.json`, while
//! `http://host:6800/scrapyd` (no trailing slash) resolves it to
//! `http://host:6800/listjobs.json`.

use std::collections::HashMap;

pub const ADD_VERSION_ENDPOINT: &str = "add_version";
pub const CANCEL_ENDPOINT: &str = "cancel";
pub const DELETE_PROJECT_ENDPOINT: &str = "delete_project";
pub const DELETE_VERSION_ENDPOINT: &str = "delete_version";
pub const LIST_JOBS_ENDPOINT: &str = "list_jobs";
pub const LIST_PROJECTS_ENDPOINT: &str = "list_projects";
pub const LIST_SPIDERS_ENDPOINT: &str = "list_spiders";
pub const LIST_VERSIONS_ENDPOINT: &str = "list_versions";
pub const SCHEDULE_ENDPOINT: &str = "schedule";
pub const DAEMON_STATUS_ENDPOINT: &str = "daemon_status";

const DEFAULT_PATHS: [(&str, &str); 10] = [
    (ADD_VERSION_ENDPOINT, "addversion.json"),
    (CANCEL_ENDPOINT, "cancel.json"),
    (DELETE_PROJECT_ENDPOINT, "delproject.json"),
    (DELETE_VERSION_ENDPOINT, "delversion.json"),
    (LIST_JOBS_ENDPOINT, "listjobs.json"),
    (LIST_PROJECTS_ENDPOINT, "listprojects.json"),
    (LIST_SPIDERS_ENDPOINT, "listspiders.json"),
    (LIST_VERSIONS_ENDPOINT, "listversions.json"),
    (SCHEDULE_ENDPOINT, "schedule.json"),
    (DAEMON_STATUS_ENDPOINT, "daemonstatus.json"),
];

/// Build a fresh, owned copy of the default endpoint map.
pub fn default_endpoints() -> HashMap<String, String> {
    DEFAULT_PATHS
        .iter()
        .map(|(name, path)| (name.to_string(), path.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_operation() {
        let endpoints = default_endpoints();
        assert_eq!(endpoints.len(), 10);
        assert_eq!(endpoints[LIST_JOBS_ENDPOINT], "listjobs.json");
        assert_eq!(endpoints[DELETE_PROJECT_ENDPOINT], "delproject.json");
        assert_eq!(endpoints[DAEMON_STATUS_ENDPOINT], "daemonstatus.json");
    }

    #[test]
    fn each_call_returns_an_independent_map() {
        let mut first = default_endpoints();
        first.insert(SCHEDULE_ENDPOINT.to_string(), "other.json".to_string());
        first.remove(CANCEL_ENDPOINT);

        let second = default_endpoints();
        assert_eq!(second[SCHEDULE_ENDPOINT], "schedule.json");
        assert_eq!(second[CANCEL_ENDPOINT], "cancel.json");
    }
}
