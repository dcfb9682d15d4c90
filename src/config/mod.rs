pub mod schema;

pub use schema::{Config, Env, GatewayConfig, PasswordConfig, StorageConfig, CONFIG_PATH_ENV};
