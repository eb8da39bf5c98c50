use std::env;
use dotenvy::dotenv;

#[derive(Clone)]
pub struct Config {
    pub server_addr: String,
    /// External origin of this service, used to rebuild the request URL and in
    /// the usage hint shown on errors.
    pub public_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let server_addr = env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string());
        let public_url =
            env::var("PUBLIC_URL").unwrap_or_else(|_| "http://127.0.0.1:3000".to_string());

        Self {
            server_addr,
            public_url,
        }
    }
}
