use axum::{
    routing::{get, get_service},
    Router,
};
use time::Duration;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use awadiko::{concepts, db, dictionary, domains, login, neo, register, review, terms};

#[tokio::main]
async fn main() {
    // Database configuration
    dotenv::dotenv().ok();
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://awadiko.db".into());

    let pool = match db::build_pool(&database_url) {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("Failed to create DB pool: {}", e);
            std::process::exit(1);
        }
    };

    {
        let mut conn = match pool.get() {
            Ok(conn) => conn,
            Err(e) => {
                eprintln!("Failed to get DB connection: {}", e);
                std::process::exit(1);
            }
        };
        if let Err(e) = db::run_migrations(&mut conn) {
            eprintln!("Failed to run migrations: {}", e);
            std::process::exit(1);
        }
    }

    // Sessions configuration
    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_expiry(Expiry::OnInactivity(Duration::days(1)))
        .with_secure(false);

    // Auth router
    let auth_router = Router::new()
        .merge(login::auth_router(pool.clone()))
        .merge(register::auth_router(pool.clone()));

    // Language lookup used by the client to resolve the English language id
    let language_router = Router::new()
        .route("/english", get(dictionary::get_english_language))
        .with_state(pool.clone());

    // Admin routers
    let admin_router = Router::new()
        .nest("/concepts", concepts::admin_router(pool.clone()))
        .nest("/domains", domains::admin_router(pool.clone()))
        .nest("/terms", terms::admin_router(pool.clone()));

    // Combined API router
    let api_router = Router::new()
        .nest("/dictionary", dictionary::dictionary_router(pool.clone()))
        .nest("/neo", neo::neo_router(pool.clone()))
        .nest("/review", review::review_router(pool.clone()))
        .nest("/admin", admin_router)
        .nest("/language", language_router);

    // Main application router
    let app = Router::new()
        .nest("/auth", auth_router)
        .nest("/api", api_router)
        // Static files (compiled frontend assets)
        .nest_service("/static", get_service(ServeDir::new("static")))
        .layer(session_layer);

    // Start server
    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:5000".into());
    let listener = match TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to address: {}", e);
            std::process::exit(1);
        }
    };

    println!("Server running on http://{}", bind_addr);

    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
