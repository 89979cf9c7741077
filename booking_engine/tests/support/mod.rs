#![allow(dead_code)]
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
    Mutex,
};

use booking_engine::{
    db_types::{NewOrder, NewService, Order, Principal, Service},
    events::{EventHandlers, EventHooks, EventProducers},
    ledger::{InstallmentPolicy, PaymentMethodRegistry},
    traits::{BookingDatabase, DocumentPayload, DocumentRenderer, RenderError},
    DocumentApi,
    LedgerApi,
    MeetingApi,
    OrderFlowApi,
    SqliteDatabase,
    TrackingApi,
};
use chrono::NaiveDate;
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};
use studio_common::Rupiah;

pub const ADMIN_ID: &str = "admin";

pub fn admin() -> Principal {
    Principal::admin(ADMIN_ID)
}

pub fn random_db_path() -> String {
    let dir = std::env::temp_dir();
    format!("sqlite://{}/booking_test_{}.db", dir.display(), rand::random::<u64>())
}

pub async fn create_database(url: &str) {
    if let Err(e) = Sqlite::drop_database(url).await {
        trace!("🚀️ Nothing to drop at {url}: {e:?}");
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    debug!("🚀️ Created Sqlite database {url}");
}

/// A renderer that keeps everything in memory and can be told to fail, or to hand back an empty artifact reference.
#[derive(Clone, Default)]
pub struct MemoryRenderer {
    pub fail: Arc<AtomicBool>,
    pub blank: Arc<AtomicBool>,
    pub rendered: Arc<Mutex<Vec<DocumentPayload>>>,
}

impl MemoryRenderer {
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_blank(&self, blank: bool) {
        self.blank.store(blank, Ordering::SeqCst);
    }

    pub fn render_count(&self) -> usize {
        self.rendered.lock().unwrap().len()
    }
}

impl DocumentRenderer for MemoryRenderer {
    async fn render(&self, payload: &DocumentPayload) -> Result<String, RenderError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RenderError("printer on fire".into()));
        }
        let mut rendered = self.rendered.lock().unwrap();
        rendered.push(payload.clone());
        if self.blank.load(Ordering::SeqCst) {
            return Ok(String::new());
        }
        Ok(format!("memory://{}/{}", payload.order.booking_code.as_str(), payload.document_id))
    }
}

/// A fully wired engine on a throw-away database.
pub struct TestSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub orders: OrderFlowApi<SqliteDatabase>,
    pub ledger: LedgerApi<SqliteDatabase>,
    pub meetings: MeetingApi<SqliteDatabase>,
    pub documents: DocumentApi<SqliteDatabase, MemoryRenderer>,
    pub tracking: TrackingApi<SqliteDatabase>,
    pub renderer: MemoryRenderer,
    pub service: Service,
}

impl TestSystem {
    pub async fn new() -> Self {
        Self::build(EventProducers::default(), 1).await
    }

    /// A system whose pool hands out several connections, so that concurrent calls really do overlap in the database.
    pub async fn with_pool_size(max_connections: u32) -> Self {
        Self::build(EventProducers::default(), max_connections).await
    }

    /// Starts the event handlers for `hooks` and wires their producers into the APIs.
    pub async fn with_hooks(hooks: EventHooks) -> Self {
        let handlers = EventHandlers::new(16, hooks);
        let producers = handlers.producers();
        handlers.start_handlers().await;
        Self::build(producers, 1).await
    }

    async fn build(producers: EventProducers, max_connections: u32) -> Self {
        dotenvy::from_filename(".env.test").ok();
        let _ = env_logger::try_init();
        let url = random_db_path();
        create_database(&url).await;
        let db = SqliteDatabase::new_with_url(&url, max_connections).await.expect("Error creating connection to database");
        db.migrate().await.expect("Error running migrations");
        let service = db
            .insert_service(NewService::new("Wedding Photography", "photography", Rupiah::from(1_000_000)))
            .await
            .expect("Error creating service");
        let renderer = MemoryRenderer::default();
        Self {
            db_path: url,
            orders: OrderFlowApi::new(db.clone(), producers.clone()),
            ledger: LedgerApi::new(
                db.clone(),
                producers.clone(),
                InstallmentPolicy::default(),
                PaymentMethodRegistry::default(),
            ),
            meetings: MeetingApi::new(db.clone(), producers.clone()),
            documents: DocumentApi::new(db.clone(), renderer.clone(), producers),
            tracking: TrackingApi::new(db.clone()),
            renderer,
            service,
            db,
        }
    }

    pub fn new_order_request(&self, customer: &str, total: i64) -> NewOrder {
        let date = NaiveDate::from_ymd_opt(2026, 12, 12).expect("valid date");
        NewOrder::new(customer, self.service.id, "Garden wedding", date, Rupiah::from(total))
            .with_location("Ubud, Bali")
            .with_event_time("09:00")
    }

    pub async fn new_order(&self, customer: &str, total: i64) -> Order {
        let request = self.new_order_request(customer, total);
        self.orders.create_order(&Principal::customer(customer), request).await.expect("Error creating order")
    }

    pub async fn validated_order(&self, customer: &str, total: i64) -> Order {
        let order = self.new_order(customer, total).await;
        self.orders.validate(&admin(), &order.booking_code).await.expect("Error validating order")
    }

    pub async fn tear_down(self) {
        self.db.close().await;
        if let Err(e) = Sqlite::drop_database(&self.db_path).await {
            warn!("🚀️ Failed to drop database {}: {e}", self.db_path);
        }
    }
}
