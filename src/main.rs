mod cli;
mod repl;

use std::sync::Arc;

use clap::Parser;
use log::{debug, LevelFilter};
use tracklist::backends::http_backend::HttpBackend;
use tracklist::config::{self, sanitize_config};

use crate::cli::Args;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config_path = match args.config.clone() {
        Some(path) => path,
        None => config::config_path()?,
    };
    let mut config = config::load_or_create(&config_path)?;
    if let Some(server) = args.server.as_deref() {
        config.backend.base_url = server.to_string();
        config = sanitize_config(config);
    }

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        config.logging.level.to_level_filter()
    };
    let mut clog = colog::default_builder();
    clog.filter(None, level);
    clog.init();

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));

    debug!(
        "Using config {} with server {}",
        config_path.display(),
        config.backend.base_url
    );
    let backend = Arc::new(HttpBackend::from_config(&config.backend));
    cli::run(args.command, &config, backend)
}
