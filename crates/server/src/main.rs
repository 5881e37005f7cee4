// SPDX-License-Identifier: MIT

use clap::Parser;
use tracing::error;

use cook_server::config::Config;

#[tokio::main]
async fn main() {
    let config = Config::parse();

    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    if let Err(e) = cook_server::run::run(config).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
