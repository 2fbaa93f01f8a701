//! A small site with a home page and a custom page-not-found handler.
//!
//! Listens on port 3040 unless `MICROROUTE_PORT` or `MICROROUTE_ADDR` says otherwise.

use std::env;

use microroute_rs::server::{ADDR_ENV, PORT_ENV};
use microroute_rs::{HttpRequest, HttpServer, Method, ResponseWriter, ServerConfig, StatusCode};
use log::info;

const DEFAULT_PORT: u16 = 3040;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize the logger
    env_logger::init();

    let mut config = ServerConfig::from_env()?;
    if env::var_os(PORT_ENV).is_none() && env::var_os(ADDR_ENV).is_none() {
        config = config.with_port(DEFAULT_PORT);
    }

    let server = HttpServer::new(config);

    server
        .route(Method::GET, "/home", |_req: HttpRequest, mut res: ResponseWriter| async move {
            res.header("Content-Type", "text/html").write("<h3>Home Page</h3>");
            res.end();
            Ok(())
        })
        .await;

    // Replaces the default "Cannot GET <path>" response for GET
    server
        .route(Method::GET, "*", |_req: HttpRequest, mut res: ResponseWriter| async move {
            res.status(StatusCode::NotFound)
                .header("Content-Type", "text/html")
                .write("<h3>Page Not Found</h3>");
            res.end();
            Ok(())
        })
        .await;

    info!("Starting server on http://{}", server.config.addr);
    server.start().await?;

    Ok(())
}
