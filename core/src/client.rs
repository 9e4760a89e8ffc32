//! The Scrapyd API façade.
//!
//! # Design
//! `ScrapydApi` holds a target base URL, a private endpoint map and an
//! `HttpDelegate`. Every operation follows the same three steps: resolve the
//! URL for its endpoint, make exactly one call through the delegate, and
//! pull a single field (or derived boolean) out of the decoded response.
//! There is no retry, caching or per-call state; the endpoint map is only
//! changed through `endpoints_mut`.

use std::collections::HashMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::delegate::UreqDelegate;
use crate::endpoints::{
    default_endpoints, ADD_VERSION_ENDPOINT, CANCEL_ENDPOINT, DAEMON_STATUS_ENDPOINT,
    DELETE_PROJECT_ENDPOINT, DELETE_VERSION_ENDPOINT, LIST_JOBS_ENDPOINT, LIST_PROJECTS_ENDPOINT,
    LIST_SPIDERS_ENDPOINT, LIST_VERSIONS_ENDPOINT, SCHEDULE_ENDPOINT,
};
use crate::error::{Result, ScrapydError};
use crate::http::{FilePart, FormData, HttpDelegate};
use crate::types::{Credentials, DaemonStatus, JobState};

pub const DEFAULT_TARGET: &str = "http://localhost:6800";

/// Client for a single Scrapyd service.
///
/// Construct it once per target and reuse it; it is as shareable as its
/// delegate.
#[derive(Debug, Clone)]
pub struct ScrapydApi<D = UreqDelegate> {
    target: String,
    endpoints: HashMap<String, String>,
    client: D,
}

impl ScrapydApi {
    /// Client for `target` using the default `ureq` delegate without auth.
    pub fn new(target: &str) -> Self {
        ScrapydApiBuilder::new().target(target).build()
    }

    pub fn builder() -> ScrapydApiBuilder {
        ScrapydApiBuilder::new()
    }
}

impl Default for ScrapydApi {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET)
    }
}

impl<D: HttpDelegate> ScrapydApi<D> {
    /// Client for `target` that sends every request through `client`.
    pub fn with_client(target: &str, client: D) -> Self {
        ScrapydApiBuilder::new().target(target).build_with(client)
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn endpoints(&self) -> &HashMap<String, String> {
        &self.endpoints
    }

    pub fn endpoints_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.endpoints
    }

    pub fn client(&self) -> &D {
        &self.client
    }

    /// Join the path registered for `endpoint` onto the target.
    fn build_url(&self, endpoint: &str) -> Result<String> {
        let path = self
            .endpoints
            .get(endpoint)
            .ok_or_else(|| ScrapydError::UnknownEndpoint(endpoint.to_string()))?;
        let url = Url::parse(&self.target)?.join(path)?;
        Ok(url.into())
    }

    /// Upload an egg as `version` of `project`. Returns the spiders found in
    /// the egg.
    pub fn add_version(&self, project: &str, version: &str, egg: &[u8]) -> Result<Vec<String>> {
        let url = self.build_url(ADD_VERSION_ENDPOINT)?;
        let mut form = FormData::new();
        form.set("project", project);
        form.set("version", version);
        let files = [FilePart::new("egg", "egg", egg.to_vec())];

        let json = self.client.post(&url, &form, &files)?;
        field(json, "spiders")
    }

    /// Cancel `job`. Returns `true` only if the job was running when the
    /// service received the request.
    pub fn cancel(&self, project: &str, job: &str) -> Result<bool> {
        let url = self.build_url(CANCEL_ENDPOINT)?;
        let mut form = FormData::new();
        form.set("project", project);
        form.set("job", job);

        let json = self.client.post(&url, &form, &[])?;
        let prevstate = take(json, "prevstate")?;
        let was_running = prevstate.as_str() == Some(JobState::Running.as_str());
        log::debug!("cancelled job {job} in {project} (prevstate {prevstate})");
        Ok(was_running)
    }

    /// Delete every version of `project`.
    pub fn delete_project(&self, project: &str) -> Result<bool> {
        let url = self.build_url(DELETE_PROJECT_ENDPOINT)?;
        let mut form = FormData::new();
        form.set("project", project);

        self.client.post(&url, &form, &[])?;
        Ok(true)
    }

    pub fn delete_version(&self, project: &str, version: &str) -> Result<bool> {
        let url = self.build_url(DELETE_VERSION_ENDPOINT)?;
        let mut form = FormData::new();
        form.set("project", project);
        form.set("version", version);

        self.client.post(&url, &form, &[])?;
        Ok(true)
    }

    /// The job listing for `project`, exactly as the delegate decoded it.
    pub fn list_jobs(&self, project: &str) -> Result<Value> {
        let url = self.build_url(LIST_JOBS_ENDPOINT)?;
        self.client.get(&url, &project_param(project))
    }

    pub fn list_projects(&self) -> Result<Vec<String>> {
        let url = self.build_url(LIST_PROJECTS_ENDPOINT)?;
        let json = self.client.get(&url, &[])?;
        field(json, "projects")
    }

    /// Spiders in the latest version of `project`.
    pub fn list_spiders(&self, project: &str) -> Result<Vec<String>> {
        let url = self.build_url(LIST_SPIDERS_ENDPOINT)?;
        let json = self.client.get(&url, &project_param(project))?;
        field(json, "spiders")
    }

    pub fn list_versions(&self, project: &str) -> Result<Vec<String>> {
        let url = self.build_url(LIST_VERSIONS_ENDPOINT)?;
        let json = self.client.get(&url, &project_param(project))?;
        field(json, "versions")
    }

    /// Schedule a run of `spider` and return its job id.
    ///
    /// `settings` are sent as repeated `setting=NAME=VALUE` fields. `extra`
    /// holds arbitrary additional form fields (spider arguments, `priority`,
    /// `jobid`, ...) forwarded verbatim; they overwrite same-named fields,
    /// `project` and `spider` included. A non-empty `settings` map takes
    /// precedence over any `setting` key in `extra`.
    pub fn schedule(
        &self,
        project: &str,
        spider: &str,
        settings: Option<&HashMap<String, String>>,
        extra: Option<&HashMap<String, String>>,
    ) -> Result<String> {
        let url = self.build_url(SCHEDULE_ENDPOINT)?;
        let mut form = FormData::new();
        form.set("project", project);
        form.set("spider", spider);
        for (key, value) in extra.into_iter().flatten() {
            form.set(key.as_str(), value.as_str());
        }
        if let Some(settings) = settings.filter(|s| !s.is_empty()) {
            form.remove("setting");
            for (name, value) in settings {
                form.append("setting", format!("{name}={value}"));
            }
        }

        let json = self.client.post(&url, &form, &[])?;
        let jobid: String = field(json, "jobid")?;
        log::debug!("scheduled {spider} in {project} as job {jobid}");
        Ok(jobid)
    }

    /// Look `job` up in the `list_jobs` output of `project`. `None` means
    /// the job is in none of the listings.
    pub fn job_status(&self, project: &str, job: &str) -> Result<Option<JobState>> {
        let listing = self.list_jobs(project)?;
        let state = JobState::ALL.into_iter().find(|state| {
            listing
                .get(state.as_str())
                .and_then(Value::as_array)
                .is_some_and(|jobs| {
                    jobs.iter()
                        .any(|entry| entry.get("id").and_then(Value::as_str) == Some(job))
                })
        });
        Ok(state)
    }

    pub fn daemon_status(&self) -> Result<DaemonStatus> {
        let url = self.build_url(DAEMON_STATUS_ENDPOINT)?;
        let json = self.client.get(&url, &[])?;
        Ok(serde_json::from_value(json)?)
    }
}

fn project_param(project: &str) -> [(String, String); 1] {
    [("project".to_string(), project.to_string())]
}

fn take(mut json: Value, name: &'static str) -> Result<Value> {
    json.get_mut(name)
        .map(Value::take)
        .ok_or(ScrapydError::MissingField(name))
}

fn field<T: DeserializeOwned>(json: Value, name: &'static str) -> Result<T> {
    serde_json::from_value(take(json, name)?)
        .map_err(|source| ScrapydError::UnexpectedField { field: name, source })
}

/// Builder for `ScrapydApi`.
///
/// Credentials and timeout configure the default delegate only; they are
/// ignored by `build_with`, since an injected delegate owns its own
/// transport settings.
#[derive(Debug, Clone, Default)]
pub struct ScrapydApiBuilder {
    target: Option<String>,
    credentials: Option<Credentials>,
    endpoints: HashMap<String, String>,
    timeout: Option<Duration>,
}

impl ScrapydApiBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the builder from `SCRAPYD_URL`, `SCRAPYD_USERNAME` and
    /// `SCRAPYD_PASSWORD`. Credentials are only set when both are present.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut builder = Self::new();
        if let Some(url) = lookup("SCRAPYD_URL") {
            builder = builder.target(&url);
        }
        if let (Some(username), Some(password)) =
            (lookup("SCRAPYD_USERNAME"), lookup("SCRAPYD_PASSWORD"))
        {
            builder = builder.auth(username, password);
        }
        builder
    }

    pub fn target(mut self, target: &str) -> Self {
        self.target = Some(target.to_string());
        self
    }

    pub fn auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    /// Override (or add) the path used for one endpoint name.
    pub fn endpoint(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.endpoints.insert(name.into(), path.into());
        self
    }

    pub fn endpoints<I, K, V>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.endpoints
            .extend(overrides.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build a client using the default `ureq` delegate.
    pub fn build(self) -> ScrapydApi<UreqDelegate> {
        let client = UreqDelegate::with_options(self.credentials.as_ref(), self.timeout);
        self.build_with(client)
    }

    /// Build a client around a caller-provided delegate.
    pub fn build_with<D: HttpDelegate>(self, client: D) -> ScrapydApi<D> {
        let mut endpoints = default_endpoints();
        endpoints.extend(self.endpoints);
        ScrapydApi {
            target: self.target.unwrap_or_else(|| DEFAULT_TARGET.to_string()),
            endpoints,
            client,
        }
    }
}
