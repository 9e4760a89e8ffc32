use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "6800".to_string());
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;

    let mut router = mock_scrapyd::app();
    if let (Ok(username), Ok(password)) = (
        std::env::var("SCRAPYD_USERNAME"),
        std::env::var("SCRAPYD_PASSWORD"),
    ) {
        log::info!("requiring basic auth for {username}");
        router = mock_scrapyd::with_basic_auth(router, &username, &password);
    }

    log::info!("listening on {addr}");
    mock_scrapyd::serve(listener, router).await
}
