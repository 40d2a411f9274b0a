//! TCP Server
//!
//! Accepts connections and dispatches them to a fixed pool of worker
//! threads over a bounded channel.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, TrySendError};
use parking_lot::Mutex;

use crate::config::Config;
use crate::engine::FlowDb;
use crate::error::Result;
use crate::protocol::{write_response, Response};

use super::Connection;

/// How long the accept loop sleeps when no connection is pending
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// TCP server for FlowDB
pub struct Server {
    config: Config,
    engine: Arc<FlowDb>,
    listener: TcpListener,
    shutdown: Arc<AtomicBool>,
    active_connections: Arc<AtomicUsize>,
    live: Arc<LiveConnections>,
}

/// Stops a running server from another thread
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Streams being served, so shutdown can end their blocking reads
#[derive(Default)]
struct LiveConnections {
    inner: Mutex<LiveInner>,
}

#[derive(Default)]
struct LiveInner {
    closing: bool,
    next_id: u64,
    streams: HashMap<u64, TcpStream>,
}

impl LiveConnections {
    /// Track a stream; `None` once shutdown has begun
    fn register(&self, stream: &TcpStream) -> Option<u64> {
        let mut inner = self.inner.lock();
        if inner.closing {
            return None;
        }
        let handle = stream.try_clone().ok()?;
        let id = inner.next_id;
        inner.next_id += 1;
        inner.streams.insert(id, handle);
        Some(id)
    }

    fn unregister(&self, id: u64) {
        self.inner.lock().streams.remove(&id);
    }

    /// Shut the read half of every tracked stream. A request already being
    /// executed still gets its response; the next read sees end of stream.
    fn close_all(&self) {
        let mut inner = self.inner.lock();
        inner.closing = true;
        for stream in inner.streams.values() {
            let _ = stream.shutdown(Shutdown::Read);
        }
    }
}

impl Server {
    /// Bind the listen address from the config
    pub fn bind(config: Config, engine: Arc<FlowDb>) -> Result<Self> {
        config.validate()?;
        let listener = TcpListener::bind(&config.listen_addr)?;
        listener.set_nonblocking(true)?;

        Ok(Self {
            config,
            engine,
            listener,
            shutdown: Arc::new(AtomicBool::new(false)),
            active_connections: Arc::new(AtomicUsize::new(0)),
            live: Arc::new(LiveConnections::default()),
        })
    }

    /// The bound address (useful when binding port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle that signals the server to shut down gracefully
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
        }
    }

    /// Number of connections currently queued or being served
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::SeqCst)
    }

    /// Start the server (blocking until shutdown)
    ///
    /// On shutdown the accept loop stops, idle connections are closed, and
    /// `run` returns once every worker has finished its current request.
    pub fn run(&self) -> Result<()> {
        let addr = self.local_addr()?;
        tracing::info!(
            %addr,
            workers = self.config.worker_pool_size,
            max_connections = self.config.max_connections,
            max_packet_size = self.config.max_packet_size,
            "Server listening"
        );

        let (tx, rx) = channel::bounded::<TcpStream>(self.config.max_worker_task_len.max(1));
        let mut workers = Vec::with_capacity(self.config.worker_pool_size);
        for id in 0..self.config.worker_pool_size {
            match self.spawn_worker(id, rx.clone()) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    drop(tx);
                    join_workers(workers);
                    return Err(e);
                }
            }
        }
        drop(rx);

        while !self.shutdown.load(Ordering::SeqCst) {
            let (stream, peer) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                    continue;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                    continue;
                }
            };

            if let Err(e) = stream.set_nonblocking(false) {
                tracing::warn!(%peer, error = %e, "Could not configure connection");
                continue;
            }

            if self.active_connections.load(Ordering::SeqCst) >= self.config.max_connections {
                tracing::warn!(%peer, "Connection limit reached, rejecting");
                reject(stream, "too many connections");
                continue;
            }

            self.active_connections.fetch_add(1, Ordering::SeqCst);
            match tx.try_send(stream) {
                Ok(()) => tracing::debug!(%peer, "Accepted connection"),
                Err(TrySendError::Full(stream)) => {
                    self.active_connections.fetch_sub(1, Ordering::SeqCst);
                    tracing::warn!(%peer, "Worker queue full, rejecting");
                    reject(stream, "server busy");
                }
                Err(TrySendError::Disconnected(_)) => {
                    self.active_connections.fetch_sub(1, Ordering::SeqCst);
                    tracing::error!("All workers have exited");
                    break;
                }
            }
        }

        tracing::info!(%addr, "Server stopped accepting connections");
        drop(tx);
        self.live.close_all();
        join_workers(workers);
        tracing::info!(%addr, "All workers finished");
        Ok(())
    }

    fn spawn_worker(&self, id: usize, rx: Receiver<TcpStream>) -> Result<JoinHandle<()>> {
        let engine = Arc::clone(&self.engine);
        let active = Arc::clone(&self.active_connections);
        let live = Arc::clone(&self.live);
        let max_packet_size = self.config.max_packet_size;
        let read_timeout_ms = self.config.read_timeout_ms;
        let write_timeout_ms = self.config.write_timeout_ms;

        let worker = thread::Builder::new()
            .name(format!("flowdb-worker-{}", id))
            .spawn(move || {
                for stream in rx.iter() {
                    match live.register(&stream) {
                        Some(conn_id) => {
                            let served =
                                Connection::new(stream, Arc::clone(&engine), max_packet_size)
                                    .and_then(|mut conn| {
                                        conn.set_timeouts(read_timeout_ms, write_timeout_ms)?;
                                        conn.handle()
                                    });
                            live.unregister(conn_id);
                            if let Err(e) = served {
                                tracing::debug!(worker = id, error = %e, "Connection ended with error");
                            }
                        }
                        None => reject(stream, "server shutting down"),
                    }
                    active.fetch_sub(1, Ordering::SeqCst);
                }
                tracing::debug!(worker = id, "Worker exiting");
            })?;
        Ok(worker)
    }
}

fn join_workers(workers: Vec<JoinHandle<()>>) {
    for worker in workers {
        if worker.join().is_err() {
            tracing::error!("Worker thread panicked");
        }
    }
}

/// Send a final error response and drop the stream
fn reject(mut stream: TcpStream, reason: &str) {
    let _ = write_response(&mut stream, &Response::error(reason));
}
