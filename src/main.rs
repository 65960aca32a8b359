use std::process;

use tokio::sync::oneshot;

use rudis::server::RedisServer;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let server = match RedisServer::new(std::env::args()) {
        Ok(server) => server,
        Err(error) => {
            eprintln!("Failed to parse command line arguments: {}", error);
            process::exit(1);
        }
    };

    let (_shutdown_sender, shutdown_receiver) = oneshot::channel();

    if let Err(error) = server.run(shutdown_receiver).await {
        eprintln!("Server error: {}", error);
        process::exit(1);
    }
}
