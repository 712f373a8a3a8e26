use verdict_server::{ServerBuilder, config, init_tracing, shutdown_tracing};

#[tokio::main]
async fn main() {
    let config = match config::loader::load_config(None) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging.level);

    match ServerBuilder::new(config).build() {
        Ok(server) => {
            if let Err(err) = server.run().await {
                eprintln!("server error: {err}");
            }
        }
        Err(err) => {
            eprintln!("startup error: {err}");
        }
    }

    shutdown_tracing();
}
