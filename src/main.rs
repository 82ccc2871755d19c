use anyhow::Result;
use clap::Parser;
use log::{Metadata, Record};
use tinyserve::{config::Config, server::Server};

static CONSOLE_LOGGER: ConsoleLogger = ConsoleLogger;

struct ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

fn main() -> Result<()> {
    let config = Config::parse();

    log::set_logger(&CONSOLE_LOGGER)
        .map_err(|err| anyhow::anyhow!("Failed to set up console logger: {}", err))?;
    log::set_max_level(config.log_level);

    Server::bind(&config)?.run()
}
