use clap::Parser;
use query_relay_rs::config::{
    ConfigValidator, Credentials, DEFAULT_LLM_BASE_URL, DEFAULT_MODEL, DEFAULT_ODATA_BASE_URL,
    RelayConfig,
};
use query_relay_rs::rate_limit::RateLimiter;
use query_relay_rs::relay_state::RelayState;
use query_relay_rs::server::{init_logging, periodic_purge, startup};
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;

#[derive(Parser, Debug)]
#[command(name = "query-relay")]
#[command(about = "Translate natural-language questions into SAP OData reads")]
#[command(long_about = r#"
Query relay - natural-language questions in, SAP OData rows out

Credentials are read from the environment:
  OPENAI_API_KEY   API key for the chat completion service
  SAP_USER         user for the OData service (basic auth)
  SAP_PASS         password for the OData service

Examples:
  query-relay --port 5000
  query-relay --odata-base-url https://my-gateway/sap/opu/odata/IWBEP --model gpt-4o
"#)]
struct CliArgs {
    /// Host address to bind the relay server
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the relay server
    #[arg(long, default_value_t = 5000)]
    port: u16,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, default_value = DEFAULT_LLM_BASE_URL)]
    llm_base_url: String,

    /// Chat completion model
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Sampling temperature for the completion call
    #[arg(long, default_value_t = 0.2)]
    temperature: f32,

    /// Base URL of the OData services; /{view}/{entity}?{filter} is appended
    #[arg(long, default_value = DEFAULT_ODATA_BASE_URL)]
    odata_base_url: String,

    /// Timeout in seconds for upstream requests
    #[arg(long, default_value_t = 60)]
    request_timeout_secs: u64,

    /// Requests allowed per client address per window on /ask
    #[arg(long, default_value_t = 10)]
    rate_limit: u32,

    /// Rate limit window in seconds
    #[arg(long, default_value_t = 60)]
    rate_limit_window_secs: u64,

    /// Maximum request body size in bytes
    #[arg(long, default_value_t = 1024 * 1024)]
    max_payload_size: usize,

    /// Replace the built-in instruction template; must contain {query}
    #[arg(long)]
    prompt_template: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info", value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: String,
}

impl CliArgs {
    fn to_relay_config(&self, credentials: Credentials) -> RelayConfig {
        RelayConfig {
            host: self.host.clone(),
            port: self.port,
            llm_base_url: self.llm_base_url.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            odata_base_url: self.odata_base_url.clone(),
            request_timeout_secs: self.request_timeout_secs,
            rate_limit_quota: self.rate_limit,
            rate_limit_window_secs: self.rate_limit_window_secs,
            max_payload_size: self.max_payload_size,
            prompt_template_path: self.prompt_template.clone(),
            credentials,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let level = args.log_level.parse().unwrap_or(log::LevelFilter::Info);
    init_logging(level);

    let config = args.to_relay_config(Credentials::from_env());
    ConfigValidator::validate(&config)?;
    log::debug!("Relay config: {:?}", config);

    let relay_state = RelayState::new(&config)?;
    let window = Duration::from_secs(config.rate_limit_window_secs);
    let limiter = RateLimiter::new(config.rate_limit_quota, window);

    actix_web::rt::System::new().block_on(async move {
        tokio::select! {
            _ = periodic_purge(limiter.clone(), window) => {
                unreachable!()
            }
            res = startup(config, relay_state, limiter) => {
                res?;
            }
            _ = signal::ctrl_c() => {
                log::info!("Received Ctrl+C, shutting down");
            }
        }
        Ok::<(), anyhow::Error>(())
    })
}
