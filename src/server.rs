use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::io_struct::AskRequest;
use crate::rate_limit::RateLimiter;
use crate::relay_state::RelayState;
use actix_cors::Cors;
use actix_web::{Error, HttpRequest, HttpResponse, HttpServer, error, get, web};
use log::{error, info};
use std::io::Write;
use std::time::Duration;

#[get("/health")]
pub async fn health(_req: HttpRequest) -> HttpResponse {
    HttpResponse::Ok().body("Ok")
}

pub async fn ask(
    req: web::Json<AskRequest>,
    app_state: web::Data<RelayState>,
) -> Result<HttpResponse, RelayError> {
    let AskRequest { user_query } = req.into_inner();
    info!("Received query: {}", user_query);
    let response = app_state.ask(&user_query).await?;
    Ok(HttpResponse::Ok().json(response))
}

async fn sink_handler(_req: HttpRequest) -> HttpResponse {
    HttpResponse::NotFound().finish()
}

// Map JSON payload errors onto the relay's error body.
fn json_error_handler(err: error::JsonPayloadError, _req: &HttpRequest) -> Error {
    error!("JSON payload error: {:?}", err);
    match &err {
        error::JsonPayloadError::OverflowKnownLength { length, limit } => {
            RelayError::PayloadTooLarge(format!(
                "{} bytes exceeds limit of {} bytes",
                length, limit
            ))
            .into()
        }
        error::JsonPayloadError::Overflow { limit } => {
            RelayError::PayloadTooLarge(format!("Payload exceeds limit of {} bytes", limit)).into()
        }
        _ => RelayError::BadRequest(err.to_string()).into(),
    }
}

/// Routes shared by the server and the integration tests. Only `/ask` is rate-limited.
pub fn configure(cfg: &mut web::ServiceConfig, limiter: RateLimiter, max_payload_size: usize) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(max_payload_size)
            .error_handler(json_error_handler),
    )
    .service(health)
    .service(
        web::resource("/ask")
            .wrap(limiter)
            .route(web::post().to(ask)),
    );
}

pub fn init_logging(level: log::LevelFilter) {
    // RUST_LOG overrides the configured level
    let _ = env_logger::Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, level)
        .parse_default_env()
        .try_init();
}

pub async fn periodic_purge(limiter: RateLimiter, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;
        let purged = limiter.purge_expired();
        if purged > 0 {
            log::debug!(
                "Purged {} expired rate-limit windows, {} clients tracked",
                purged,
                limiter.tracked_clients()
            );
        }
    }
}

pub async fn startup(
    config: RelayConfig,
    relay_state: RelayState,
    limiter: RateLimiter,
) -> std::io::Result<()> {
    let app_state = web::Data::new(relay_state);

    info!("Starting query relay at {}:{}", config.host, config.port);
    info!("Completion endpoint: {} (model {})", config.llm_base_url, config.model);
    info!("OData base URL: {}", config.odata_base_url);
    info!("Rate limit on /ask: {}", limiter.describe());

    let max_payload_size = config.max_payload_size;
    HttpServer::new(move || {
        let limiter = limiter.clone();
        actix_web::App::new()
            .wrap(Cors::permissive())
            .wrap(actix_web::middleware::Logger::default())
            .app_data(app_state.clone())
            .configure(|cfg| configure(cfg, limiter, max_payload_size))
            .default_service(web::route().to(sink_handler))
    })
    .bind((config.host, config.port))?
    .run()
    .await
}
