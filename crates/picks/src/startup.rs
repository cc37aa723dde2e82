use crate::{
    api::routes::{
        add_player, correct_event, get_event_wagers, get_events, get_leaderboard, get_pick_log,
        get_user_season_bets, get_user_wagers, health, place_pick, place_season_bet,
        settle_season_bets, trigger_sync,
    },
    config::{FeedSettings, SeasonSettings, Settings},
    domain::{EventLocks, PickBook, PicksStore, Reconciler, SeasonBook, SyncWatcher},
    infra::{
        db::{DBConnection, DatabasePoolConfig},
        feed::{EventFeed, NbaFeedClient},
    },
};

// Mock feed only available with e2e-testing feature or debug builds
#[cfg(any(feature = "e2e-testing", debug_assertions))]
use crate::infra::feed_mock::MockFeed;
use anyhow::anyhow;
use axum::{
    body::Body,
    extract::{connect_info::IntoMakeServiceWithConnectInfo, ConnectInfo, Request},
    http::{Extensions, HeaderValue},
    middleware::{self, AddExtension, Next},
    response::IntoResponse,
    routing::{get, post, put},
    serve::Serve,
    Router,
};
use hyper::{
    header::{ACCEPT, CONTENT_TYPE},
    Method,
};
use log::{error, info, warn};
use reqwest_middleware::{
    reqwest::{self, Client},
    ClientBuilder, ClientWithMiddleware, Middleware,
};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use std::{collections::HashMap, net::SocketAddr, str::FromStr};
use std::{sync::Arc, time::Duration};
use tokio::signal::unix::{signal, SignalKind};
use tokio::{net::TcpListener, select, task::JoinHandle};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tower_http::cors::{AllowOrigin, CorsLayer};

pub struct Application {
    server: Serve<
        TcpListener,
        IntoMakeServiceWithConnectInfo<Router, SocketAddr>,
        AddExtension<Router, ConnectInfo<SocketAddr>>,
    >,
    cancellation_token: CancellationToken,
    background_tasks: TaskTracker,
}

impl Application {
    pub async fn build(config: Settings) -> Result<Self, anyhow::Error> {
        let address = format!(
            "{}:{}",
            config.api_settings.domain, config.api_settings.port
        );
        let listener = SocketAddr::from_str(&address)?;
        let (app_state, background_tasks, cancellation_token) = build_app(config.clone()).await?;
        let server = build_server(listener, app_state, config.api_settings.origins).await?;
        Ok(Self {
            server,
            cancellation_token,
            background_tasks,
        })
    }

    pub async fn run_until_stopped(self) -> Result<(), anyhow::Error> {
        info!("Starting server...");
        match self.server.with_graceful_shutdown(shutdown_signal()).await {
            Ok(_) => {
                info!("Server shutdown initiated");
                self.cancellation_token.cancel();

                let timeout = tokio::time::sleep(Duration::from_secs(10));
                select! {
                    _ = self.background_tasks.wait() => {
                        info!("Background tasks completed gracefully");
                    }
                    _ = timeout => {
                        warn!("Background tasks timed out during shutdown");
                    }
                }

                info!("Shutdown complete");
                Ok(())
            }
            Err(e) => {
                error!("Server shutdown error: {}", e);
                self.cancellation_token.cancel();

                let _ =
                    tokio::time::timeout(Duration::from_secs(5), self.background_tasks.wait())
                        .await;

                Err(anyhow!("Error during server shutdown: {}", e))
            }
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<PicksStore>,
    pub book: Arc<PickBook>,
    pub reconciler: Arc<Reconciler>,
    pub seasons: Arc<SeasonBook>,
    pub background_threads: Arc<HashMap<String, JoinHandle<()>>>,
}

impl AppState {
    pub fn new(
        store: Arc<PicksStore>,
        feed: Arc<dyn EventFeed>,
        season_settings: SeasonSettings,
        background_threads: HashMap<String, JoinHandle<()>>,
    ) -> Self {
        // One lock table shared by scoring passes and pick writes
        let locks = Arc::new(EventLocks::new());
        let reconciler = Arc::new(Reconciler::new(store.clone(), feed, locks.clone()));
        Self {
            book: Arc::new(PickBook::new(store.clone(), locks)),
            seasons: Arc::new(SeasonBook::new(store.clone(), season_settings)),
            store,
            reconciler,
            background_threads: Arc::new(background_threads),
        }
    }
}

fn build_feed(
    settings: &FeedSettings,
    client: ClientWithMiddleware,
) -> Result<Arc<dyn EventFeed>, anyhow::Error> {
    if settings.mock_feed {
        #[cfg(any(feature = "e2e-testing", debug_assertions))]
        {
            info!("Mock event feed configured");
            return Ok(Arc::new(MockFeed::new()));
        }
        #[cfg(not(any(feature = "e2e-testing", debug_assertions)))]
        return Err(anyhow!(
            "Mock event feed requires e2e-testing feature or debug build"
        ));
    }

    let feed = NbaFeedClient::new(
        client,
        &settings.scoreboard_url,
        &settings.boxscore_url_template,
    )
    .map_err(|e| anyhow!("Failed to configure event feed: {}", e))?;
    info!("Event feed configured @ {}", settings.scoreboard_url);
    Ok(Arc::new(feed))
}

pub async fn build_app(
    config: Settings,
) -> Result<(AppState, TaskTracker, CancellationToken), anyhow::Error> {
    let reqwest_client = build_reqwest_client(Duration::from_secs(
        config.feed_settings.request_timeout_secs,
    ))?;
    let feed = build_feed(&config.feed_settings, reqwest_client)?;

    let pool_config: DatabasePoolConfig = config.db_settings.clone().into();
    let picks_db = DBConnection::new(&config.db_settings.data_folder, "picks", pool_config)
        .await
        .map_err(|e| anyhow!("Error setting up picks db: {}", e))?;
    let store = Arc::new(PicksStore::new(picks_db));
    info!("Picks store configured");

    let tracker = TaskTracker::new();
    let cancel_token = CancellationToken::new();

    // The watcher shares the reconciler and lock table handed to the routes
    info!(
        "Current season is {}",
        config.season_settings.current_season
    );
    let mut app_state = AppState::new(
        store,
        feed,
        config.season_settings.clone(),
        HashMap::new(),
    );
    let sync_watcher = SyncWatcher::new(
        app_state.reconciler.clone(),
        cancel_token.clone(),
        Duration::from_secs(config.reconciler_settings.sync_interval_secs),
    );
    let sync_watcher_task = tracker.spawn(async move {
        match sync_watcher.watch().await {
            Ok(_) => {
                info!("Successfully shutdown feed sync watcher")
            }
            Err(e) => {
                error!("Error in feed sync watcher: {}", e)
            }
        }
    });
    tracker.close();

    let mut threads = HashMap::new();
    threads.insert(String::from("feed_sync_watcher"), sync_watcher_task);
    app_state.background_threads = Arc::new(threads);

    Ok((app_state, tracker, cancel_token))
}

pub async fn build_server(
    socket_addr: SocketAddr,
    app_state: AppState,
    origins: Vec<String>,
) -> Result<
    Serve<
        TcpListener,
        IntoMakeServiceWithConnectInfo<Router, SocketAddr>,
        AddExtension<Router, ConnectInfo<SocketAddr>>,
    >,
    anyhow::Error,
> {
    let listener = TcpListener::bind(socket_addr).await?;

    info!("Setting up service");
    let app = app(app_state, origins);
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    );
    info!(
        "Service running @: http://{}:{}",
        socket_addr.ip(),
        socket_addr.port()
    );
    Ok(server)
}

pub fn app(app_state: AppState, origins: Vec<String>) -> Router {
    let origins: Vec<HeaderValue> = origins
        .into_iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([ACCEPT, CONTENT_TYPE])
        .allow_origin(AllowOrigin::list(origins));

    let admin_endpoints = Router::new()
        .route("/users", post(add_player))
        .route("/events/{event_id}", put(correct_event))
        .route("/events/{event_id}/pick_log", get(get_pick_log))
        .route("/seasons/{season}/settle", put(settle_season_bets))
        .route("/sync", post(trigger_sync));

    Router::new()
        .route("/api/v1/health_check", get(health))
        .route("/api/v1/events", get(get_events))
        .route("/api/v1/events/{event_id}/wagers", get(get_event_wagers))
        .route("/api/v1/users/{user_id}/wagers", get(get_user_wagers))
        .route(
            "/api/v1/users/{user_id}/season_bets",
            get(get_user_season_bets),
        )
        .route("/api/v1/wagers", post(place_pick))
        .route("/api/v1/season_bets", post(place_season_bet))
        .route("/api/v1/leaderboard", get(get_leaderboard))
        .nest("/api/v1/admin", admin_endpoints)
        .layer(middleware::from_fn(log_request))
        .with_state(Arc::new(app_state))
        .layer(cors)
}

async fn log_request(request: Request<Body>, next: Next) -> impl IntoResponse {
    let now = time::OffsetDateTime::now_utc();
    let path = request
        .uri()
        .path_and_query()
        .map(|p| p.as_str())
        .unwrap_or_default();
    info!(target: "http_request","new request, {} {}", request.method().as_str(), path);

    let response = next.run(request).await;
    let response_time = time::OffsetDateTime::now_utc() - now;
    info!(target: "http_response", "response, code: {}, time: {}", response.status().as_str(), response_time);

    response
}

pub fn build_reqwest_client(timeout: Duration) -> Result<ClientWithMiddleware, anyhow::Error> {
    let client = Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| anyhow!("Failed to build http client: {}", e))?;
    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
    Ok(ClientBuilder::new(client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .with(LoggingMiddleware)
        .build())
}

struct LoggingMiddleware;

#[async_trait::async_trait]
impl Middleware for LoggingMiddleware {
    async fn handle(
        &self,
        req: reqwest::Request,
        extensions: &mut Extensions,
        next: reqwest_middleware::Next<'_>,
    ) -> reqwest_middleware::Result<reqwest::Response> {
        let method = req.method().clone();
        let url = req.url().clone();

        info!("Making {} request to: {}", method, url);

        let result = next.run(req, extensions).await;

        match &result {
            Ok(response) => {
                info!("{} {} -> Status: {}", method, url, response.status());
            }
            Err(error) => {
                warn!("{} {} -> Error: {:?}", method, url, error);
            }
        }

        result
    }
}

async fn shutdown_signal() {
    let (mut sigint, mut sigterm) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) {
        (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
        (Err(e), _) | (_, Err(e)) => {
            error!("Failed to install signal handlers: {}", e);
            return std::future::pending().await;
        }
    };

    select! {
        _ = sigint.recv() => info!("Received SIGINT signal"),
        _ = sigterm.recv() => info!("Received SIGTERM signal"),
    }
}
