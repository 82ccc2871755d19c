use std::{
    net::{Shutdown, SocketAddr, TcpListener, TcpStream},
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use log::{error, info, warn};
use threadpool::ThreadPool;

use crate::{
    config::{Config, ServeOptions},
    handle_connection,
};

pub struct Server {
    listener: TcpListener,
    pool: ThreadPool,
    options: Arc<ServeOptions>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

impl Server {
    pub fn bind(config: &Config) -> Result<Self> {
        let address = config.address();
        let listener =
            TcpListener::bind(&address).with_context(|| format!("Failed to bind {}", address))?;

        let mut server = Self::from_listener(
            listener,
            usize::from(config.workers),
            config.serve_options(),
        );
        server.read_timeout = config.read_timeout();
        server.write_timeout = config.write_timeout();
        Ok(server)
    }

    pub fn from_listener(listener: TcpListener, workers: usize, options: ServeOptions) -> Self {
        Self {
            listener,
            pool: ThreadPool::new(workers),
            options: Arc::new(options),
            read_timeout: None,
            write_timeout: None,
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections forever, handing each one to the worker pool.
    pub fn run(self) -> Result<()> {
        info!(
            "Serving {:?} on {} with {} workers",
            self.options.root,
            self.local_addr()?,
            self.pool.max_count()
        );

        for stream in self.listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(err) => {
                    warn!("Failed to accept connection: {}", err);
                    continue;
                }
            };

            let options = Arc::clone(&self.options);
            let (read_timeout, write_timeout) = (self.read_timeout, self.write_timeout);
            self.pool.execute(move || {
                if let Err(err) = serve_stream(stream, &options, read_timeout, write_timeout) {
                    error!("{:?}", err);
                }
            });
        }
        Ok(())
    }
}

fn serve_stream(
    mut stream: TcpStream,
    options: &ServeOptions,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
) -> Result<()> {
    let peer = stream.peer_addr().context("Failed to read peer address")?;
    info!("Handling connection from {}", peer);

    stream.set_read_timeout(read_timeout)?;
    stream.set_write_timeout(write_timeout)?;

    let result = handle_connection(&mut stream, options)
        .with_context(|| format!("Connection from {} failed", peer));
    let _ = stream.shutdown(Shutdown::Write);

    info!("Done handling connection from {}", peer);
    result
}
