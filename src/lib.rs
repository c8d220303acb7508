pub mod aggregator;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod field_guide;
pub mod io_struct;
pub mod openai_api_types;
pub mod prompt;
pub mod rate_limit;
pub mod relay_state;
pub mod server;
pub mod translator;

pub use config::{ConfigValidator, Credentials, RelayConfig};
pub use error::RelayError;
pub use rate_limit::RateLimiter;
pub use relay_state::RelayState;
