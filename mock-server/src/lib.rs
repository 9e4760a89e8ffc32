//! In-memory stand-in for a Scrapyd daemon.
//!
//! Serves the JSON endpoints the client talks to, backed by a shared
//! `Scrapyd` value instead of real eggs and processes. Egg uploads are read
//! as newline-separated spider names. Jobs never start on their own; tests
//! move them between states through `Db`.

use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{Multipart, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub use axum::Router;

pub const NODE_NAME: &str = "mock-scrapyd";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub name: String,
    pub spiders: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Finished,
}

impl JobState {
    fn as_str(self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Finished => "finished",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub project: String,
    pub spider: String,
    /// Raw `NAME=VALUE` strings from repeated `setting` fields.
    pub settings: Vec<String>,
    /// Every other form field sent to `schedule.json`.
    pub args: BTreeMap<String, String>,
    pub state: JobState,
}

#[derive(Debug, Default)]
pub struct Scrapyd {
    /// Project name to versions, oldest first.
    pub projects: BTreeMap<String, Vec<Version>>,
    pub jobs: Vec<Job>,
}

impl Scrapyd {
    pub fn job_mut(&mut self, id: &str) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|job| job.id == id)
    }

    fn count(&self, state: JobState) -> usize {
        self.jobs.iter().filter(|job| job.state == state).count()
    }
}

pub type Db = Arc<RwLock<Scrapyd>>;

pub fn router(db: Db) -> Router {
    Router::new()
        .route("/addversion.json", post(add_version))
        .route("/schedule.json", post(schedule))
        .route("/cancel.json", post(cancel))
        .route("/delproject.json", post(delete_project))
        .route("/delversion.json", post(delete_version))
        .route("/listjobs.json", get(list_jobs))
        .route("/listprojects.json", get(list_projects))
        .route("/listspiders.json", get(list_spiders))
        .route("/listversions.json", get(list_versions))
        .route("/daemonstatus.json", get(daemon_status))
        .with_state(db)
}

pub fn app() -> Router {
    router(Db::default())
}

/// Wrap `router` so every request must carry matching basic-auth credentials.
pub fn with_basic_auth(router: Router, username: &str, password: &str) -> Router {
    let expected = Arc::new(format!(
        "Basic {}",
        STANDARD.encode(format!("{username}:{password}"))
    ));
    router.layer(middleware::from_fn_with_state(expected, require_basic_auth))
}

pub async fn serve(listener: TcpListener, router: Router) -> Result<(), std::io::Error> {
    axum::serve(listener, router).await
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    serve(listener, app()).await
}

async fn require_basic_auth(
    State(expected): State<Arc<String>>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == expected.as_str());
    if authorized {
        next.run(request).await
    } else {
        (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
    }
}

fn ok(mut body: Value) -> Json<Value> {
    body["status"] = json!("ok");
    body["node_name"] = json!(NODE_NAME);
    Json(body)
}

fn error(message: impl Into<String>) -> Json<Value> {
    Json(json!({
        "status": "error",
        "message": message.into(),
        "node_name": NODE_NAME,
    }))
}

fn require<'a>(
    fields: &'a [(String, String)],
    name: &str,
) -> Result<&'a str, Json<Value>> {
    fields
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
        .ok_or_else(|| error(format!("'{name}' parameter is required")))
}

#[derive(Deserialize)]
struct ProjectQuery {
    project: Option<String>,
}

impl ProjectQuery {
    fn required(self) -> Result<String, Json<Value>> {
        self.project
            .ok_or_else(|| error("'project' parameter is required"))
    }
}

async fn add_version(State(db): State<Db>, mut multipart: Multipart) -> Json<Value> {
    let mut project = None;
    let mut version = None;
    let mut egg = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "project" => project = field.text().await.ok(),
            "version" => version = field.text().await.ok(),
            "egg" => egg = field.bytes().await.ok(),
            _ => {}
        }
    }
    let (Some(project), Some(version), Some(egg)) = (project, version, egg) else {
        return error("'project', 'version' and 'egg' are required");
    };

    let spiders: Vec<String> = String::from_utf8_lossy(&egg)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    let mut state = db.write().await;
    let versions = state.projects.entry(project.clone()).or_default();
    versions.retain(|v| v.name != version);
    versions.push(Version {
        name: version.clone(),
        spiders: spiders.clone(),
    });
    log::info!("added {project} version {version} with {} spiders", spiders.len());

    ok(json!({ "project": project, "version": version, "spiders": spiders }))
}

async fn schedule(State(db): State<Db>, Form(fields): Form<Vec<(String, String)>>) -> Json<Value> {
    let (project, spider) = match (require(&fields, "project"), require(&fields, "spider")) {
        (Ok(project), Ok(spider)) => (project.to_string(), spider.to_string()),
        (Err(e), _) | (_, Err(e)) => return e,
    };

    let mut state = db.write().await;
    let known = state
        .projects
        .get(&project)
        .and_then(|versions| versions.last())
        .is_some_and(|latest| latest.spiders.contains(&spider));
    if !known {
        return error(format!("spider '{spider}' not found"));
    }

    let mut settings = Vec::new();
    let mut args = BTreeMap::new();
    for (key, value) in fields {
        match key.as_str() {
            "project" | "spider" => {}
            "setting" => settings.push(value),
            _ => {
                args.insert(key, value);
            }
        }
    }
    let id = args
        .get("jobid")
        .cloned()
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

    log::info!("scheduled {project}/{spider} as {id}");
    state.jobs.push(Job {
        id: id.clone(),
        project,
        spider,
        settings,
        args,
        state: JobState::Pending,
    });
    ok(json!({ "jobid": id }))
}

async fn cancel(State(db): State<Db>, Form(fields): Form<Vec<(String, String)>>) -> Json<Value> {
    let (project, job) = match (require(&fields, "project"), require(&fields, "job")) {
        (Ok(project), Ok(job)) => (project, job),
        (Err(e), _) | (_, Err(e)) => return e,
    };

    let mut state = db.write().await;
    let prevstate = match state
        .jobs
        .iter_mut()
        .find(|j| j.id == job && j.project == project)
    {
        Some(found) => {
            let previous = found.state;
            found.state = JobState::Finished;
            json!(previous.as_str())
        }
        None => Value::Null,
    };
    ok(json!({ "prevstate": prevstate }))
}

async fn delete_project(
    State(db): State<Db>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Json<Value> {
    let project = match require(&fields, "project") {
        Ok(project) => project,
        Err(e) => return e,
    };
    let mut state = db.write().await;
    if state.projects.remove(project).is_none() {
        return error(format!("project '{project}' not found"));
    }
    ok(json!({}))
}

async fn delete_version(
    State(db): State<Db>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Json<Value> {
    let (project, version) = match (require(&fields, "project"), require(&fields, "version")) {
        (Ok(project), Ok(version)) => (project, version),
        (Err(e), _) | (_, Err(e)) => return e,
    };
    let mut state = db.write().await;
    let Some(versions) = state.projects.get_mut(project) else {
        return error(format!("project '{project}' not found"));
    };
    let before = versions.len();
    versions.retain(|v| v.name != version);
    if versions.len() == before {
        return error(format!("version '{version}' of project '{project}' not found"));
    }
    if versions.is_empty() {
        state.projects.remove(project);
    }
    ok(json!({}))
}

async fn list_jobs(State(db): State<Db>, Query(query): Query<ProjectQuery>) -> Json<Value> {
    let project = match query.required() {
        Ok(project) => project,
        Err(e) => return e,
    };
    let state = db.read().await;
    let listing = |wanted: JobState| -> Vec<Value> {
        state
            .jobs
            .iter()
            .filter(|job| job.project == project && job.state == wanted)
            .map(|job| json!({ "id": job.id, "spider": job.spider }))
            .collect()
    };
    ok(json!({
        "pending": listing(JobState::Pending),
        "running": listing(JobState::Running),
        "finished": listing(JobState::Finished),
    }))
}

async fn list_projects(State(db): State<Db>) -> Json<Value> {
    let state = db.read().await;
    let projects: Vec<&String> = state.projects.keys().collect();
    ok(json!({ "projects": projects }))
}

async fn list_spiders(State(db): State<Db>, Query(query): Query<ProjectQuery>) -> Json<Value> {
    let project = match query.required() {
        Ok(project) => project,
        Err(e) => return e,
    };
    let state = db.read().await;
    match state.projects.get(&project).and_then(|versions| versions.last()) {
        Some(latest) => ok(json!({ "spiders": latest.spiders })),
        None => error(format!("project '{project}' not found")),
    }
}

async fn list_versions(State(db): State<Db>, Query(query): Query<ProjectQuery>) -> Json<Value> {
    let project = match query.required() {
        Ok(project) => project,
        Err(e) => return e,
    };
    let state = db.read().await;
    let versions: Vec<&str> = state
        .projects
        .get(&project)
        .map(|versions| versions.iter().map(|v| v.name.as_str()).collect())
        .unwrap_or_default();
    ok(json!({ "versions": versions }))
}

async fn daemon_status(State(db): State<Db>) -> Json<Value> {
    let state = db.read().await;
    ok(json!({
        "pending": state.count(JobState::Pending),
        "running": state.count(JobState::Running),
        "finished": state.count(JobState::Finished),
    }))
}
