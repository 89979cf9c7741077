//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every handler here awaits the engine, which awaits the database, so
//! none of them block.
//!
//! Route map:
//! * `GET /health` - public
//! * `GET /track/{tracking_code}` - public
//! * `/api/...` - needs an `X-Booking-Principal` header. Routes marked `requires [Role::Admin]` also need a valid
//!   `X-Booking-Admin-Key`.
//! * `POST /webhooks/scheduling` - needs a valid `X-Scheduling-Signature`
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use booking_engine::{
    db_types::{BookingCode, DocumentTarget, MeetingUpdate, Role},
    ledger::DEFAULT_PAYMENT_METHOD,
    order_objects::OrderQueryFilter,
    traits::{BookingDatabase, BookingError, BookingQueries, DocumentRenderer},
    DocumentApi,
    LedgerApi,
    MeetingApi,
    OrderFlowApi,
    TrackingApi,
};
use log::*;

use crate::{
    auth::AuthenticatedPrincipal,
    config::ServerOptions,
    data_objects::{
        JsonResponse,
        NewOrderRequest,
        NewServiceRequest,
        OrderSearchParams,
        RecordPaymentRequest,
        ScheduleMeetingRequest,
        SchedulingCallback,
        UpdatePriceParams,
        VerifyPaymentParams,
    },
    errors::ServerError,
    helpers::get_remote_ip,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro.
// Each bound becomes a type parameter of the route (`impl BookingDatabase` gives `TBookingDatabase`), in order.
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ident),+ where requires [$($roles:expr),+]) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ident),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Tracking  ----------------------------------------------------
route!(track => Get "/track/{tracking_code}" impl BookingQueries);
/// Public order lookup by tracking code. No principal is needed, and the response only carries the public summary.
///
/// Unknown and malformed codes both give a 404 with the same message.
pub async fn track<B: BookingQueries>(
    path: web::Path<String>,
    api: web::Data<TrackingApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let code = path.into_inner();
    trace!("💻️ GET track");
    let summary = api.lookup(&code).await?;
    Ok(HttpResponse::Ok().json(summary))
}

//----------------------------------------------   Services  ----------------------------------------------------
route!(services => Get "/services" impl BookingDatabase);
pub async fn services<B: BookingDatabase>(
    _principal: AuthenticatedPrincipal,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let services = api.services().await?;
    Ok(HttpResponse::Ok().json(services))
}

route!(add_service => Post "/services" impl BookingDatabase where requires [Role::Admin]);
pub async fn add_service<B: BookingDatabase>(
    principal: AuthenticatedPrincipal,
    body: web::Json<NewServiceRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let service = api.add_service(&principal, body.into_inner().into()).await?;
    debug!("💻️ Service #{} ({}) added by {}", service.id, service.name, *principal);
    Ok(HttpResponse::Created().json(service))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(create_order => Post "/orders" impl BookingDatabase);
/// Submits a booking. Customers book for themselves; admins may set `customer_id` to book on someone's behalf.
pub async fn create_order<B: BookingDatabase>(
    principal: AuthenticatedPrincipal,
    body: web::Json<NewOrderRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order = body.into_inner().into_new_order(&principal.id);
    debug!("💻️ POST new order for {} by {}", order.customer_id, *principal);
    let order = api.create_order(&principal, order).await?;
    Ok(HttpResponse::Created().json(order))
}

route!(my_orders => Get "/orders" impl BookingDatabase);
/// The caller's own orders.
pub async fn my_orders<B: BookingDatabase>(
    principal: AuthenticatedPrincipal,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET my_orders for {}", *principal);
    let orders = api.orders_for_customer(&principal, &principal.id).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(orders_search => Get "/search/orders" impl BookingDatabase);
/// Order search. Customers may use it too, but only ever get their own orders back.
pub async fn orders_search<B: BookingDatabase>(
    principal: AuthenticatedPrincipal,
    query: web::Query<OrderSearchParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let query = OrderQueryFilter::try_from(query.into_inner())?;
    debug!("💻️ GET orders search for [{query}]");
    let orders = api.search_orders(&principal, query).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(order => Get "/orders/{booking_code}" impl BookingDatabase);
/// Customers asking for someone else's order get the same 404 as for an order that doesn't exist.
pub async fn order<B: BookingDatabase>(
    principal: AuthenticatedPrincipal,
    path: web::Path<BookingCode>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let code = path.into_inner();
    debug!("💻️ GET order {code} for {}", *principal);
    let order = api.fetch_order(&principal, &code).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(modify_total => Patch "/orders/{booking_code}/total" impl BookingDatabase where requires [Role::Admin]);
pub async fn modify_total<B: BookingDatabase>(
    principal: AuthenticatedPrincipal,
    path: web::Path<BookingCode>,
    body: web::Json<UpdatePriceParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let code = path.into_inner();
    let total = body.into_inner().total_price;
    debug!("💻️ PATCH total of order {code} to {total}");
    let order = api.modify_total_price(&principal, &code, total).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(validate_order => Post "/orders/{booking_code}/validate" impl BookingDatabase where requires [Role::Admin]);
pub async fn validate_order<B: BookingDatabase>(
    principal: AuthenticatedPrincipal,
    path: web::Path<BookingCode>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let code = path.into_inner();
    debug!("💻️ POST validate order {code}");
    let order = api.validate(&principal, &code).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(cancel_order => Post "/orders/{booking_code}/cancel" impl BookingDatabase where requires [Role::Admin]);
pub async fn cancel_order<B: BookingDatabase>(
    principal: AuthenticatedPrincipal,
    path: web::Path<BookingCode>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let code = path.into_inner();
    debug!("💻️ POST cancel order {code}");
    let order = api.cancel(&principal, &code).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(archive_order => Post "/orders/{booking_code}/archive" impl BookingDatabase where requires [Role::Admin]);
pub async fn archive_order<B: BookingDatabase>(
    principal: AuthenticatedPrincipal,
    path: web::Path<BookingCode>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let code = path.into_inner();
    debug!("💻️ POST archive order {code}");
    let order = api.archive(&principal, &code).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Ledger  ----------------------------------------------------
route!(quote => Get "/orders/{booking_code}/quote" impl BookingDatabase);
pub async fn quote<B: BookingDatabase>(
    principal: AuthenticatedPrincipal,
    path: web::Path<BookingCode>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let quote = api.quote(&principal, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(quote))
}

route!(ledger => Get "/orders/{booking_code}/ledger" impl BookingDatabase);
/// The quote, the payments recorded so far and the remaining balance, in one go.
pub async fn ledger<B: BookingDatabase>(
    principal: AuthenticatedPrincipal,
    path: web::Path<BookingCode>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let code = path.into_inner();
    debug!("💻️ GET ledger for order {code}");
    let summary = api.ledger_summary(&principal, &code).await?;
    Ok(HttpResponse::Ok().json(summary))
}

route!(record_payment => Post "/orders/{booking_code}/payments" impl BookingDatabase where requires [Role::Admin]);
/// Records an installment attempt. The payment stays pending until it is verified at
/// `POST /api/payments/{payment_id}/verify`.
pub async fn record_payment<B: BookingDatabase>(
    principal: AuthenticatedPrincipal,
    path: web::Path<BookingCode>,
    body: web::Json<RecordPaymentRequest>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let code = path.into_inner();
    let default_method =
        api.payment_methods().methods().first().map(String::as_str).unwrap_or(DEFAULT_PAYMENT_METHOD).to_string();
    let payment = body.into_inner().into_new_payment(&default_method);
    debug!("💻️ POST {} payment of {} for order {code}", payment.kind, payment.amount);
    let payment = api.record_payment(&principal, &code, payment).await?;
    Ok(HttpResponse::Created().json(payment))
}

route!(verify_payment => Post "/payments/{payment_id}/verify" impl BookingDatabase where requires [Role::Admin]);
pub async fn verify_payment<B: BookingDatabase>(
    principal: AuthenticatedPrincipal,
    path: web::Path<i64>,
    body: web::Json<VerifyPaymentParams>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let payment_id = path.into_inner();
    let approve = body.into_inner().approve;
    debug!("💻️ POST verify payment #{payment_id} (approve: {approve})");
    let result = api.verify_payment(&principal, payment_id, approve).await?;
    Ok(HttpResponse::Ok().json(result))
}

//----------------------------------------------   Meetings  ----------------------------------------------------
route!(schedule_meeting => Post "/orders/{booking_code}/meetings" impl BookingDatabase where requires [Role::Admin]);
pub async fn schedule_meeting<B: BookingDatabase>(
    principal: AuthenticatedPrincipal,
    path: web::Path<BookingCode>,
    body: web::Json<ScheduleMeetingRequest>,
    api: web::Data<MeetingApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let code = path.into_inner();
    debug!("💻️ POST meeting for order {code}");
    let meeting = api.schedule_meeting(&principal, &code, body.into_inner().into()).await?;
    Ok(HttpResponse::Created().json(meeting))
}

route!(meetings => Get "/orders/{booking_code}/meetings" impl BookingDatabase);
pub async fn meetings<B: BookingDatabase>(
    principal: AuthenticatedPrincipal,
    path: web::Path<BookingCode>,
    api: web::Data<MeetingApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let meetings = api.meetings_for_order(&principal, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(meetings))
}

route!(complete_meeting => Post "/meetings/{meeting_id}/complete" impl BookingDatabase where requires [Role::Admin]);
pub async fn complete_meeting<B: BookingDatabase>(
    principal: AuthenticatedPrincipal,
    path: web::Path<i64>,
    api: web::Data<MeetingApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let meeting_id = path.into_inner();
    debug!("💻️ POST complete meeting #{meeting_id}");
    let meeting = api.complete_meeting(&principal, meeting_id).await?;
    Ok(HttpResponse::Ok().json(meeting))
}

//----------------------------------------------   Documents  ----------------------------------------------------
route!(available_documents => Get "/orders/{booking_code}/documents/available" impl BookingDatabase, DocumentRenderer);
pub async fn available_documents<B: BookingDatabase, R: DocumentRenderer>(
    principal: AuthenticatedPrincipal,
    path: web::Path<BookingCode>,
    api: web::Data<DocumentApi<B, R>>,
) -> Result<HttpResponse, ServerError> {
    let available = api.available_documents(&principal, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(available))
}

route!(documents => Get "/orders/{booking_code}/documents" impl BookingDatabase, DocumentRenderer);
pub async fn documents<B: BookingDatabase, R: DocumentRenderer>(
    principal: AuthenticatedPrincipal,
    path: web::Path<BookingCode>,
    api: web::Data<DocumentApi<B, R>>,
) -> Result<HttpResponse, ServerError> {
    let documents = api.documents_for_order(&principal, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(documents))
}

route!(generate_document => Post "/orders/{booking_code}/documents" impl BookingDatabase, DocumentRenderer where requires [Role::Admin]);
/// Generates one document. The body names it, e.g. `{"kind": "invoice"}` or `{"kind": "receipt", "payment_id": 3}`.
pub async fn generate_document<B: BookingDatabase, R: DocumentRenderer>(
    principal: AuthenticatedPrincipal,
    path: web::Path<BookingCode>,
    body: web::Json<DocumentTarget>,
    api: web::Data<DocumentApi<B, R>>,
) -> Result<HttpResponse, ServerError> {
    let code = path.into_inner();
    let target = body.into_inner();
    debug!("💻️ POST generate the {target} for order {code}");
    let document = api.generate_document(&principal, &code, target).await?;
    Ok(HttpResponse::Created().json(document))
}

//----------------------------------------------   Webhooks  ----------------------------------------------------
route!(scheduling_webhook => Post "/scheduling" impl BookingDatabase);
/// Status callbacks from the scheduling-link provider. The HMAC middleware on the `/webhooks` scope has already
/// checked the signature by the time this runs.
///
/// Callbacks are idempotent, and callbacks for links we don't know about are acknowledged and dropped, so that the
/// provider stops retrying them.
pub async fn scheduling_webhook<B: BookingDatabase>(
    req: HttpRequest,
    body: web::Json<SchedulingCallback>,
    options: web::Data<ServerOptions>,
    api: web::Data<MeetingApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let peer = get_remote_ip(&req, options.use_x_forwarded_for, options.use_forwarded);
    let SchedulingCallback { link_ref, update } = body.into_inner();
    let peer = peer.map(|ip| ip.to_string()).unwrap_or_else(|| "an unknown peer".into());
    info!("📬️ Scheduling callback ({}) for {link_ref} from {peer}", update_name(&update));
    match api.handle_scheduling_callback(&link_ref, update).await {
        Ok(meeting) => {
            debug!("📬️ Meeting #{} is now {}", meeting.id, meeting.status);
            Ok(HttpResponse::Ok().json(JsonResponse::success("Callback processed.")))
        },
        Err(BookingError::NotFound(e)) => {
            warn!("📬️ Scheduling callback for an unknown link. {e}");
            Ok(HttpResponse::Ok().json(JsonResponse::failure("Unknown link. Callback ignored.")))
        },
        Err(e) => Err(e.into()),
    }
}

fn update_name(update: &MeetingUpdate) -> &'static str {
    match update {
        MeetingUpdate::InviteeCreated { .. } => "invitee_created",
        MeetingUpdate::InviteeCanceled => "invitee_canceled",
        MeetingUpdate::Completed => "completed",
    }
}
