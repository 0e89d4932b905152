// Backend API server with embedded frontend
// USGS earthquake feed server with integrated web UI

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpResponse, HttpServer};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time;

mod loader;
mod usgs_api_models;

use loader::{bind_rows, EarthquakeLoader, RowBinder};
use usgs_api_models::{Earthquake, EarthquakeView, FeedParams, UsgsModels};

// Embed static files at compile time
const INDEX_HTML: &str = include_str!("../static/quakewatch.html");

const REFRESH_INTERVAL_SECS: u64 = 300;

#[derive(Clone)]
struct AppState {
    quakes: Arc<Mutex<Vec<Earthquake>>>,
    params: Arc<Mutex<FeedParams>>,
}

#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
    timestamp: i64,
    source: String,
}

impl<T: Serialize> ApiResponse<T> {
    fn success(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
            timestamp: UsgsModels::get_current_timestamp(),
            source: "USGS".to_string(),
        }
    }

    fn error(message: String) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message),
            timestamp: UsgsModels::get_current_timestamp(),
            source: "USGS".to_string(),
        }
    }
}

// ============================================================================
// Frontend Routes
// ============================================================================

async fn serve_index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(INDEX_HTML)
}

// ============================================================================
// API Endpoints
// ============================================================================

/// Binds one record to a JSON view row. The derived fields make fresh strings
/// every time, so a recycled handle has nothing worth keeping.
struct ViewRowBinder;

impl RowBinder for ViewRowBinder {
    type Handle = EarthquakeView;

    fn bind(
        &self,
        _position: usize,
        quake: &Earthquake,
        _recycled: Option<EarthquakeView>,
    ) -> EarthquakeView {
        UsgsModels::to_view(quake)
    }
}

async fn get_quakes(state: web::Data<AppState>) -> HttpResponse {
    match state.quakes.lock() {
        Ok(quakes) => {
            // Derived fields are computed here, at consumption time, never
            // during parsing.
            let views = bind_rows(&ViewRowBinder, quakes.as_slice(), Vec::new());
            println!("🌍 Quakes requested: {} records", views.len());
            HttpResponse::Ok().json(ApiResponse::success(views))
        }
        Err(e) => {
            eprintln!("❌ Failed to lock quake batch: {}", e);
            HttpResponse::InternalServerError().json(ApiResponse::<String>::error(
                "Failed to retrieve earthquakes".to_string(),
            ))
        }
    }
}

async fn get_quakes_raw(state: web::Data<AppState>) -> HttpResponse {
    match state.quakes.lock() {
        Ok(quakes) => {
            println!("📄 Raw quakes requested: {} records", quakes.len());
            HttpResponse::Ok().json(ApiResponse::success(&*quakes))
        }
        Err(e) => {
            eprintln!("❌ Failed to lock quake batch: {}", e);
            HttpResponse::InternalServerError().json(ApiResponse::<Vec<Earthquake>>::error(
                "Failed to retrieve earthquakes".to_string(),
            ))
        }
    }
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "USGS Earthquake Feed API",
        "version": "0.1.0",
        "source": "USGS",
        "timestamp": UsgsModels::get_current_timestamp(),
        "embedded_frontend": true
    }))
}

#[derive(Deserialize)]
struct RefreshQuery {
    minmag: Option<String>,
    orderby: Option<String>,
    limit: Option<String>,
}

async fn force_refresh(
    state: web::Data<AppState>,
    query: web::Query<RefreshQuery>,
) -> HttpResponse {
    println!("🔄 Manual refresh requested...");

    // Fold the caller's overrides into the current parameter set; values are
    // passed through to the URL builder unvalidated.
    let params = match state.params.lock() {
        Ok(mut params) => {
            if let Some(minmag) = &query.minmag {
                params.minmag = minmag.clone();
            }
            if let Some(orderby) = &query.orderby {
                params.orderby = orderby.clone();
            }
            if let Some(limit) = &query.limit {
                params.limit = limit.clone();
            }
            params.clone()
        }
        Err(e) => {
            eprintln!("❌ Failed to lock feed params: {}", e);
            return HttpResponse::InternalServerError().json(ApiResponse::<String>::error(
                "Failed to read feed parameters".to_string(),
            ));
        }
    };

    match tokio::task::spawn_blocking(move || fetch_batch(&params)).await {
        Ok(batch) => {
            let count = batch.len();
            match state.quakes.lock() {
                Ok(mut quakes) => {
                    *quakes = batch;
                    println!("✓ Manual refresh completed: {} records", count);
                    HttpResponse::Ok().json(ApiResponse::success(format!(
                        "Feed refreshed, {} earthquakes",
                        count
                    )))
                }
                Err(e) => {
                    eprintln!("❌ Failed to lock quake batch: {}", e);
                    HttpResponse::InternalServerError().json(ApiResponse::<String>::error(
                        "Failed to store refreshed feed".to_string(),
                    ))
                }
            }
        }
        Err(e) => {
            eprintln!("❌ Manual refresh task panicked: {}", e);
            HttpResponse::InternalServerError().json(ApiResponse::<String>::error(
                "Refresh task panicked".to_string(),
            ))
        }
    }
}

/// One fetch-parse cycle. Never fails; a dead network or a mangled feed
/// degrades to an empty batch, indistinguishable from a legitimately empty
/// feed.
fn fetch_batch(params: &FeedParams) -> Vec<Earthquake> {
    let mut loader = EarthquakeLoader::new(UsgsModels::USGS_URL);
    loader.start(params);
    let batch = loader.result().map(<[Earthquake]>::to_vec).unwrap_or_default();
    loader.reset();
    batch
}

// ============================================================================
// Background Task
// ============================================================================

async fn feed_refresh_task(state: AppState) {
    let mut interval = time::interval(Duration::from_secs(REFRESH_INTERVAL_SECS));

    loop {
        interval.tick().await;

        println!("\n🔄 Auto-refreshing earthquake feed...");

        let params = match state.params.lock() {
            Ok(params) => params.clone(),
            Err(e) => {
                eprintln!("⚠️  Failed to lock feed params: {}", e);
                continue;
            }
        };

        match tokio::task::spawn_blocking(move || fetch_batch(&params)).await {
            Ok(batch) => match state.quakes.lock() {
                Ok(mut quakes) => {
                    println!("✓ Auto-refresh completed: {} records", batch.len());
                    *quakes = batch;
                }
                Err(e) => {
                    eprintln!("⚠️  Failed to lock quake batch: {}", e);
                }
            },
            Err(e) => {
                eprintln!("❌ Auto-refresh task panicked: {}", e);
            }
        }
    }
}

// ============================================================================
// Server Setup
// ============================================================================

async fn run_server(initial: Vec<Earthquake>) -> std::io::Result<()> {
    let app_state = AppState {
        quakes: Arc::new(Mutex::new(initial)),
        params: Arc::new(Mutex::new(FeedParams::default())),
    };

    // Start background refresh task
    let refresh_state = app_state.clone();
    tokio::spawn(async move {
        feed_refresh_task(refresh_state).await;
    });

    println!("\n🌐 Server running on: http://0.0.0.0:8080");
    println!("📱 Web UI available at: http://localhost:8080");
    println!("📡 API available at: http://localhost:8080/api/quakes");
    println!("🔄 Auto-refresh: every {} seconds\n", REFRESH_INTERVAL_SECS);

    println!("📍 Available Routes:");
    println!("   GET  /                 - Web UI (embedded)");
    println!("   GET  /health           - Health check");
    println!("   GET  /api/quakes       - Earthquakes with derived display fields");
    println!("   GET  /api/quakes/raw   - Earthquakes as parsed from the feed");
    println!("   POST /api/refresh      - Force refresh (minmag/orderby/limit overrides)\n");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            // Frontend routes
            .route("/", web::get().to(serve_index))
            // Health check
            .route("/health", web::get().to(health_check))
            // API routes
            .service(
                web::scope("/api")
                    .route("/quakes", web::get().to(get_quakes))
                    .route("/quakes/raw", web::get().to(get_quakes_raw))
                    .route("/refresh", web::post().to(force_refresh)),
            )
    })
    .bind(("0.0.0.0", 8080))?
    .run()
    .await
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> std::io::Result<()> {
    println!("\n🌍 QuakeWatch Web Edition");
    println!("   USGS earthquake feed server with embedded UI\n");

    println!("📡 Fetching initial earthquake feed...");

    let initial = fetch_batch(&FeedParams::default());

    if initial.is_empty() {
        // A failed fetch and an empty feed look the same here; start anyway
        // and let the refresh cycle fill the batch in.
        println!("⚠️  Initial feed is empty (network failure or no matching events)");
    } else {
        println!("✓ Loaded {} earthquakes", initial.len());
    }

    actix_web::rt::System::new().block_on(run_server(initial))
}
