use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use symposium_service::config::AppConfig;
use symposium_service::database::MongoDB;
use symposium_service::services::{Notifier, SmtpNotifier, Store};
use symposium_service::state::AppState;
use symposium_service::{api, middleware, seeds};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // Configuração inválida é fatal
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("❌ {}", e);
            std::process::exit(1);
        }
    };

    log::info!("🚀 Starting Symposium Service...");

    // Initialize MongoDB connection
    let db = match MongoDB::start(&config.database_url).await {
        Ok(db) => db,
        Err(e) => {
            log::error!("❌ Failed to connect to MongoDB: {}", e);
            std::process::exit(1);
        }
    };
    log::info!("✅ MongoDB connected successfully");

    // 🌱 Seed default events
    seeds::events_seed::seed_default_events(&db).await;

    let notifier: Arc<dyn Notifier> = match SmtpNotifier::new(&config.smtp) {
        Ok(notifier) => Arc::new(notifier),
        Err(e) => {
            log::error!("❌ {}", e);
            std::process::exit(1);
        }
    };

    let store: Arc<dyn Store> = Arc::new(db.clone());
    let bind = (config.host.clone(), config.port);
    let frontend_url = config.frontend_url.clone();
    let state = web::Data::new(AppState::new(config, store, notifier));

    log::info!("🌐 Server starting on {}:{}", bind.0, bind.1);
    log::info!("📚 Swagger UI available at: http://{}:{}/swagger-ui/", bind.0, bind.1);
    log::info!("📄 OpenAPI spec at: http://{}:{}/api-docs/openapi.json", bind.0, bind.1);

    // Start HTTP server
    let result = HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_url)
            .allowed_methods(vec!["GET", "POST", "PATCH", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::CONTENT_TYPE,
                actix_web::http::header::ACCEPT,
            ])
            .expose_headers(vec![actix_web::http::header::CONTENT_TYPE])
            .supports_credentials()
            .max_age(3600);

        // Generate OpenAPI specification
        let openapi = api::swagger::ApiDoc::openapi();

        App::new()
            .app_data(state.clone())
            .wrap(cors)
            .wrap(middleware::SecurityHeaders)
            .wrap(Logger::default())
            .service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi))
            .configure(api::configure)
    })
    .bind(bind)?
    .run()
    .await;

    db.stop().await;
    log::info!("👋 Server stopped");
    result
}
