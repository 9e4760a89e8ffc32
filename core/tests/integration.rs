//! Full project/job lifecycle against the live mock server.
//!
//! # Design
//! Starts the mock Scrapyd on a random port, then exercises every client
//! operation over real HTTP through the default `UreqDelegate`. Validates
//! URL joining, form and multipart encoding, and response decoding
//! end-to-end.

use std::collections::HashMap;
use std::net::SocketAddr;

use mock_scrapyd::{Db, Router};
use scrapyd_api::{JobState, ScrapydApi, ScrapydError};

/// Serve `router` on a background runtime and return its address.
fn spawn_server(router: Router) -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_scrapyd::serve(listener, router).await
        })
        .unwrap();
    });

    addr
}

#[test]
fn project_and_job_lifecycle() {
    // Step 1: start mock server on a random port, keeping a handle on its state.
    let db = Db::default();
    let addr = spawn_server(mock_scrapyd::router(db.clone()));
    let api = ScrapydApi::new(&format!("http://{addr}"));

    // Step 2: nothing deployed yet.
    assert!(api.list_projects().unwrap().is_empty());

    // Step 3: upload two versions.
    let spiders = api.add_version("books", "r1", b"catalog\nreviews\n").unwrap();
    assert_eq!(spiders, vec!["catalog", "reviews"]);
    api.add_version("books", "r2", b"catalog\nreviews\nauthors\n").unwrap();

    assert_eq!(api.list_projects().unwrap(), vec!["books"]);
    assert_eq!(api.list_versions("books").unwrap(), vec!["r1", "r2"]);
    assert_eq!(
        api.list_spiders("books").unwrap(),
        vec!["catalog", "reviews", "authors"]
    );

    // Step 4: schedule with settings and extra fields.
    let settings = HashMap::from([
        ("DOWNLOAD_DELAY".to_string(), "2".to_string()),
        ("USER_AGENT".to_string(), "books bot".to_string()),
    ]);
    let extra = HashMap::from([("priority".to_string(), "5".to_string())]);
    let jobid = api
        .schedule("books", "catalog", Some(&settings), Some(&extra))
        .unwrap();
    assert!(!jobid.is_empty());

    {
        let state = db.blocking_read();
        let job = state.jobs.iter().find(|j| j.id == jobid).unwrap();
        assert_eq!(job.spider, "catalog");
        let mut sent = job.settings.clone();
        sent.sort();
        assert_eq!(sent, vec!["DOWNLOAD_DELAY=2", "USER_AGENT=books bot"]);
        assert_eq!(job.args.get("priority").map(String::as_str), Some("5"));
    }

    // Step 5: the job shows up as pending.
    let jobs = api.list_jobs("books").unwrap();
    assert_eq!(jobs["pending"][0]["id"], jobid.as_str());
    assert!(jobs.get("status").is_none(), "status member is stripped");
    assert_eq!(
        api.job_status("books", &jobid).unwrap(),
        Some(JobState::Pending)
    );
    assert_eq!(api.job_status("books", "missing").unwrap(), None);

    let status = api.daemon_status().unwrap();
    assert_eq!(status.node_name, mock_scrapyd::NODE_NAME);
    assert_eq!(status.pending, 1);

    // Step 6: cancelling a pending job is not a running cancellation.
    assert!(!api.cancel("books", &jobid).unwrap());
    assert_eq!(
        api.job_status("books", &jobid).unwrap(),
        Some(JobState::Finished)
    );

    // Step 7: cancelling a running job reports true.
    let running = api.schedule("books", "reviews", None, None).unwrap();
    db.blocking_write().job_mut(&running).unwrap().state = mock_scrapyd::JobState::Running;
    assert_eq!(
        api.job_status("books", &running).unwrap(),
        Some(JobState::Running)
    );
    assert!(api.cancel("books", &running).unwrap());

    // Step 8: unknown spiders surface the service's error message.
    let err = api.schedule("books", "nope", None, None).unwrap_err();
    assert!(matches!(err, ScrapydError::Response(ref m) if m.contains("nope")));

    // Step 9: delete a version, then the project.
    assert!(api.delete_version("books", "r1").unwrap());
    assert_eq!(api.list_versions("books").unwrap(), vec!["r2"]);
    assert!(api.delete_project("books").unwrap());
    assert!(api.list_projects().unwrap().is_empty());

    // Step 10: deleting again is a service error, not a silent `true`.
    let err = api.delete_project("books").unwrap_err();
    assert!(matches!(err, ScrapydError::Response(_)));
}

#[test]
fn basic_auth_is_sent_by_default_delegate() {
    let addr = spawn_server(mock_scrapyd::with_basic_auth(
        mock_scrapyd::app(),
        "admin",
        "secret",
    ));
    let target = format!("http://{addr}/");

    let anonymous = ScrapydApi::new(&target);
    let err = anonymous.list_projects().unwrap_err();
    assert!(matches!(err, ScrapydError::Http { status: 401, .. }));

    let wrong = ScrapydApi::builder()
        .target(&target)
        .auth("admin", "guess")
        .build();
    assert!(matches!(
        wrong.list_projects().unwrap_err(),
        ScrapydError::Http { status: 401, .. }
    ));

    let authed = ScrapydApi::builder()
        .target(&target)
        .auth("admin", "secret")
        .build();
    assert!(authed.list_projects().unwrap().is_empty());
}

#[test]
fn endpoint_override_routes_to_other_path() {
    let addr = spawn_server(mock_scrapyd::app());
    let api = ScrapydApi::builder()
        .target(&format!("http://{addr}"))
        .endpoint("list_projects", "does-not-exist.json")
        .build();

    let err = api.list_projects().unwrap_err();
    assert!(matches!(err, ScrapydError::Http { status: 404, .. }));
    assert!(api.list_versions("anything").unwrap().is_empty());
}

#[test]
fn connection_refused_is_transport_error() {
    // Bind and drop to get a port with nothing listening.
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let api = ScrapydApi::new(&format!("http://{addr}"));

    let err = api.list_projects().unwrap_err();
    assert!(matches!(err, ScrapydError::Transport(_)));
}
