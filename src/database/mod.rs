use mongodb::bson::{doc, Document};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};
use std::time::Duration;

use crate::utils::AppError;

mod repositories;

pub const USERS: &str = "users";
pub const EVENTS: &str = "events";
pub const ENROLLMENTS: &str = "enrollments";
pub const COUNTERS: &str = "counters";

const DEFAULT_DATABASE: &str = "symposium";

/// Conexão com o MongoDB com ciclo de vida explícito (`start` / `stop`).
/// Clonar é barato: o `Client` compartilha o pool interno.
#[derive(Clone)]
pub struct MongoDB {
    client: Client,
    db: Database,
}

impl MongoDB {
    pub async fn start(uri: &str) -> Result<Self, AppError> {
        let mut client_options = ClientOptions::parse(uri).await?;

        // Pool limitado; o driver reconecta sozinho
        client_options.app_name = Some("symposium-service".to_string());
        client_options.max_pool_size = Some(20);
        client_options.min_pool_size = Some(2);
        client_options.max_idle_time = Some(Duration::from_secs(300));

        client_options.connect_timeout = Some(Duration::from_secs(30));
        client_options.server_selection_timeout = Some(Duration::from_secs(30));
        client_options.retry_writes = Some(true);
        client_options.retry_reads = Some(true);

        let db_name = client_options
            .default_database
            .clone()
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string());

        let client = Client::with_options(client_options)?;
        let db = client.database(&db_name);

        // Falha aqui é fatal para o processo
        db.run_command(doc! { "ping": 1 }).await?;
        log::info!("✅ Connected to MongoDB database: {}", db_name);

        let mongodb = Self { client, db };
        mongodb.ensure_indexes().await?;

        Ok(mongodb)
    }

    pub async fn stop(self) {
        log::info!("🔌 Closing MongoDB connections...");
        self.client.shutdown().await;
        log::info!("✅ MongoDB connections closed");
    }

    /// Creates the indexes the consistency rules rely on.
    async fn ensure_indexes(&self) -> Result<(), AppError> {
        log::info!("🔧 Creating database indexes...");

        let unique = || IndexOptions::builder().unique(true).build();

        let indexes: Vec<(&str, Document, Option<IndexOptions>)> = vec![
            (USERS, doc! { "email": 1 }, Some(unique())),
            (USERS, doc! { "participantId": 1 }, Some(unique())),
            (ENROLLMENTS, doc! { "user": 1, "event": 1 }, Some(unique())),
            (ENROLLMENTS, doc! { "registrationNumber": 1 }, Some(unique())),
            (ENROLLMENTS, doc! { "paymentStatus": 1 }, None),
            (ENROLLMENTS, doc! { "event": 1 }, None),
            (EVENTS, doc! { "category": 1, "isActive": 1 }, None),
        ];

        for (collection, keys, options) in indexes {
            let description = format!("{}({})", collection, keys.keys().cloned().collect::<Vec<_>>().join(", "));
            let model = IndexModel::builder().keys(keys).options(options).build();

            // Índice único em (user, event) é obrigatório; os demais só ajudam
            match self.collection::<Document>(collection).create_index(model).await {
                Ok(_) => log::info!("   ✅ Index ready: {}", description),
                Err(e) if collection == ENROLLMENTS => {
                    log::error!("   ❌ Failed to create index {}: {}", description, e);
                    return Err(e.into());
                }
                Err(e) => log::warn!("   ⚠️  Index {} not created: {}", description, e),
            }
        }

        log::info!("✅ Database indexes ready");
        Ok(())
    }

    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}
