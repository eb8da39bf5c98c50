use param_relay::{config::Config, logging, web};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging();

    let config = Config::from_env();
    web::run_server(config).await;

    Ok(())
}
