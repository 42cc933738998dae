//! Unix-socket daemon that owns one `Store`.
//!
//! Each connection is read line by line on its own task. Decoded requests are
//! queued to the daemon loop, which applies them one at a time in arrival
//! order, so two clients can never interleave a read-modify-write on the same
//! item. A line that does not decode gets an `invalid_input` error back and
//! the connection stays open.

use crate::config::Config;
use crate::error::CraftError;
use crate::protocol::{Request, Response};
use crate::storage::STORE_DIR;
use crate::store::Store;
use eyre::{Context, Result, eyre};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::interval;

const SOCKET_FILE: &str = "daemon.sock";
const PID_FILE: &str = "daemon.pid";

/// Requests waiting for the daemon loop before senders block.
const QUEUE_DEPTH: usize = 100;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Where the daemon listens and how often its loop wakes up.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Directory holding `.craftchain`
    pub root: PathBuf,

    /// Wake-up period of the daemon loop
    pub flush_interval: Duration,
}

impl DaemonConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::from_store_config(root, &Config::default())
    }

    /// Take the wake-up period from the store's `config.yaml`.
    pub fn from_store_config(root: impl Into<PathBuf>, config: &Config) -> Self {
        Self {
            root: root.into(),
            flush_interval: Duration::from_millis(config.flush_interval_ms),
        }
    }

    pub fn socket_path(&self) -> PathBuf {
        self.root.join(STORE_DIR).join(SOCKET_FILE)
    }

    pub fn pid_path(&self) -> PathBuf {
        self.root.join(STORE_DIR).join(PID_FILE)
    }
}

/// A decoded request and the slot its response goes back through.
struct Job {
    request: Request,
    reply: oneshot::Sender<Response>,
}

pub struct Daemon {
    config: DaemonConfig,
    store: Store,
    shutdown: Arc<AtomicBool>,
}

impl Daemon {
    pub fn new(config: DaemonConfig) -> Result<Self> {
        let store = Store::open(&config.root).context("Failed to open store")?;
        Ok(Self {
            config,
            store,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Flag that stops the daemon loop at its next wake-up once raised.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Serve requests until a shutdown is requested, then remove the socket
    /// and PID files.
    pub async fn run(&mut self) -> Result<()> {
        let socket_path = self.config.socket_path();
        if socket_path.exists() {
            fs::remove_file(&socket_path).context("Failed to remove stale socket")?;
        }
        let listener = UnixListener::bind(&socket_path).context("Failed to bind to Unix socket")?;
        fs::write(self.config.pid_path(), std::process::id().to_string()).context("Failed to write PID file")?;

        log::info!(
            "Daemon serving {} on {}",
            self.config.root.display(),
            socket_path.display()
        );

        let (jobs, mut queue) = mpsc::channel::<Job>(QUEUE_DEPTH);
        tokio::spawn(accept_loop(listener, jobs, Arc::clone(&self.shutdown)));

        let mut tick = interval(self.config.flush_interval);
        while !self.shutdown.load(Ordering::Relaxed) {
            tokio::select! {
                Some(job) = queue.recv() => {
                    let response = self.dispatch(job.request);
                    // The client may have hung up already
                    let _ = job.reply.send(response);
                }
                // Store writes are synced per request; the tick only lets the
                // loop notice a raised shutdown flag
                _ = tick.tick() => {}
            }
        }

        log::info!("Daemon shutting down");
        fs::remove_file(&socket_path).ok();
        fs::remove_file(self.config.pid_path()).ok();
        Ok(())
    }

    fn dispatch(&mut self, request: Request) -> Response {
        log::debug!("Request: {:?}", request);
        match request {
            Request::CreateItem { item } => reply(self.store.create_item(item), |item| Response::Item { item }),
            Request::AddDependency {
                project_id,
                parent_name,
                dependency_name,
                qty,
            } => reply(
                self.store.add_dependency(&project_id, &parent_name, &dependency_name, qty),
                |item| Response::Item { item },
            ),
            Request::BulkInsert { items } => reply(self.store.insert_many(items), |items| Response::Items { items }),
            Request::Get { id } => match self.store.get(&id) {
                Ok(Some(item)) => Response::Item { item },
                Ok(None) => Response::NotFound { id },
                Err(e) => Response::error(&e),
            },
            Request::Tree { id } => reply(self.store.tree(&id), |tree| Response::Tree { tree }),
            Request::ProjectItems { project_id } => {
                reply(self.store.project_items(&project_id), |items| Response::Items { items })
            }
            Request::Progress { project_id } => {
                reply(self.store.progress(&project_id), |progress| Response::Progress { progress })
            }
            Request::Craft {
                item_id,
                user_id,
                increment_by,
            } => reply(self.store.craft(&item_id, &user_id, increment_by), |item| {
                Response::Item { item }
            }),
            Request::Contribute { item_id, user_id, qty } => {
                reply(self.store.contribute(&item_id, &user_id, qty), |item| Response::Item { item })
            }
            Request::RemoveContribution {
                item_id,
                user_id,
                contribution_id,
            } => reply(
                self.store.remove_contribution(&item_id, &user_id, &contribution_id),
                |item| Response::Item { item },
            ),
            Request::Activity { project_id, limit } => {
                reply(self.store.activity(&project_id, limit), |records| Response::Activity { records })
            }
            // Nothing is buffered, so there is nothing to flush
            Request::Flush => Response::Ok,
            // The connection raises the shutdown flag after this reply is written
            Request::Shutdown => Response::Ok,
            Request::Ping => Response::Pong,
        }
    }
}

fn reply<T>(result: Result<T>, wrap: impl FnOnce(T) -> Response) -> Response {
    match result {
        Ok(value) => wrap(value),
        Err(e) => Response::error(&e),
    }
}

async fn accept_loop(listener: UnixListener, jobs: mpsc::Sender<Job>, shutdown: Arc<AtomicBool>) {
    while !shutdown.load(Ordering::Relaxed) {
        match listener.accept().await {
            Ok((stream, _)) => {
                tokio::spawn(serve_client(stream, jobs.clone(), Arc::clone(&shutdown)));
            }
            Err(e) => {
                log::error!("Failed to accept connection: {}", e);
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

async fn serve_client(stream: UnixStream, jobs: mpsc::Sender<Job>, shutdown: Arc<AtomicBool>) {
    if let Err(e) = serve_lines(stream, jobs, shutdown).await {
        log::warn!("Client connection dropped: {:#}", e);
    }
}

async fn serve_lines(stream: UnixStream, jobs: mpsc::Sender<Job>, shutdown: Arc<AtomicBool>) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    while let Some(line) = lines.next_line().await.context("Failed to read request")? {
        if line.trim().is_empty() {
            continue;
        }

        let (response, stop) = match decode_request(&line) {
            Ok(request) => {
                let stop = matches!(request, Request::Shutdown);
                (submit(&jobs, request).await?, stop)
            }
            Err(e) => (Response::error(&e), false),
        };

        let mut out = serde_json::to_string(&response).context("Failed to encode response")?;
        out.push('\n');
        write_half.write_all(out.as_bytes()).await?;
        write_half.flush().await?;

        if stop {
            shutdown.store(true, Ordering::Relaxed);
            break;
        }
    }
    Ok(())
}

fn decode_request(line: &str) -> Result<Request> {
    serde_json::from_str(line).map_err(|e| eyre!(CraftError::InvalidInput(format!("malformed request: {}", e))))
}

async fn submit(jobs: &mpsc::Sender<Job>, request: Request) -> Result<Response> {
    let (reply, response) = oneshot::channel();
    jobs.send(Job { request, reply })
        .await
        .map_err(|_| eyre!("Daemon stopped accepting requests"))?;
    response.await.map_err(|_| eyre!("Daemon dropped the request"))
}

/// True when the PID file names a live process. Leftovers from a daemon that
/// died without cleaning up are removed.
pub fn is_daemon_running(root: &Path) -> bool {
    let config = DaemonConfig::new(root);
    let socket_path = config.socket_path();
    if !socket_path.exists() {
        return false;
    }

    if read_pid(&config.pid_path()).is_some_and(process_alive) {
        return true;
    }

    fs::remove_file(&socket_path).ok();
    fs::remove_file(config.pid_path()).ok();
    false
}

fn read_pid(path: &Path) -> Option<i32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn process_alive(pid: i32) -> bool {
    // Signal 0 only checks that the process exists and may be signalled
    unsafe { libc::kill(pid, 0) == 0 }
}

/// Launch `craft daemon` for `root` as a detached child. The caller polls the
/// socket until it answers.
pub fn start_daemon(root: &Path) -> Result<()> {
    let exe = std::env::current_exe().context("Failed to get current executable")?;

    Command::new(exe)
        .arg("--dir")
        .arg(root)
        .arg("daemon")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .context("Failed to spawn daemon process")?;

    Ok(())
}
