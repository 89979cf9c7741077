use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use booking_engine::{
    events::EventProducers,
    ledger::{InstallmentPolicy, PaymentMethodRegistry},
    DocumentApi,
    LedgerApi,
    MeetingApi,
    OrderFlowApi,
    SqliteDatabase,
    TrackingApi,
};
use log::*;

use crate::{
    auth::AdminCredentials,
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    integrations::{json_renderer::JsonFileRenderer, notifications::create_notification_event_handlers},
    middleware::{HmacMiddlewareFactory, SIGNATURE_HEADER},
    routes::{
        health,
        AddServiceRoute,
        ArchiveOrderRoute,
        AvailableDocumentsRoute,
        CancelOrderRoute,
        CompleteMeetingRoute,
        CreateOrderRoute,
        DocumentsRoute,
        GenerateDocumentRoute,
        LedgerRoute,
        MeetingsRoute,
        ModifyTotalRoute,
        MyOrdersRoute,
        OrderRoute,
        OrdersSearchRoute,
        QuoteRoute,
        RecordPaymentRoute,
        ScheduleMeetingRoute,
        SchedulingWebhookRoute,
        ServicesRoute,
        TrackRoute,
        ValidateOrderRoute,
        VerifyPaymentRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    std::fs::create_dir_all(&config.document_dir)?;
    let handlers = create_notification_event_handlers();
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let srv = create_server_instance(config, db, producers)?;
    info!("🚀️ Booking server started");
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let policy = InstallmentPolicy::new(config.down_payment_percent)
        .map_err(|e| ServerError::ConfigurationError(e.to_string()))?;
    let methods = PaymentMethodRegistry::new(&config.payment_methods);
    let renderer = JsonFileRenderer::new(&config.document_dir);
    let claim_timeout = chrono::Duration::seconds(config.document_claim_timeout);
    let credentials = AdminCredentials::new(config.admin_api_key.clone());
    let options = ServerOptions::from_config(&config);
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone(), producers.clone());
        let ledger_api = LedgerApi::new(db.clone(), producers.clone(), policy.clone(), methods.clone());
        let meetings_api = MeetingApi::new(db.clone(), producers.clone());
        let documents_api =
            DocumentApi::new(db.clone(), renderer.clone(), producers.clone()).with_claim_timeout(claim_timeout);
        let tracking_api = TrackingApi::new(db.clone());
        let api_scope = web::scope("/api")
            .service(ServicesRoute::<SqliteDatabase>::new())
            .service(AddServiceRoute::<SqliteDatabase>::new())
            .service(CreateOrderRoute::<SqliteDatabase>::new())
            .service(MyOrdersRoute::<SqliteDatabase>::new())
            .service(OrdersSearchRoute::<SqliteDatabase>::new())
            .service(OrderRoute::<SqliteDatabase>::new())
            .service(ModifyTotalRoute::<SqliteDatabase>::new())
            .service(ValidateOrderRoute::<SqliteDatabase>::new())
            .service(CancelOrderRoute::<SqliteDatabase>::new())
            .service(ArchiveOrderRoute::<SqliteDatabase>::new())
            .service(QuoteRoute::<SqliteDatabase>::new())
            .service(LedgerRoute::<SqliteDatabase>::new())
            .service(RecordPaymentRoute::<SqliteDatabase>::new())
            .service(VerifyPaymentRoute::<SqliteDatabase>::new())
            .service(ScheduleMeetingRoute::<SqliteDatabase>::new())
            .service(MeetingsRoute::<SqliteDatabase>::new())
            .service(CompleteMeetingRoute::<SqliteDatabase>::new())
            .service(AvailableDocumentsRoute::<SqliteDatabase, JsonFileRenderer>::new())
            .service(DocumentsRoute::<SqliteDatabase, JsonFileRenderer>::new())
            .service(GenerateDocumentRoute::<SqliteDatabase, JsonFileRenderer>::new());
        let hmac_middleware = HmacMiddlewareFactory::new(
            SIGNATURE_HEADER,
            config.scheduling.hmac_secret.clone(),
            config.scheduling.hmac_checks,
        );
        let webhook_scope =
            web::scope("/webhooks").wrap(hmac_middleware).service(SchedulingWebhookRoute::<SqliteDatabase>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("bks::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(ledger_api))
            .app_data(web::Data::new(meetings_api))
            .app_data(web::Data::new(documents_api))
            .app_data(web::Data::new(tracking_api))
            .app_data(web::Data::new(credentials.clone()))
            .app_data(web::Data::new(options))
            .service(health)
            .service(TrackRoute::<SqliteDatabase>::new())
            .service(api_scope)
            .service(webhook_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
