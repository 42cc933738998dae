//! Client for connecting to the craftchain daemon.

use crate::batch::NewItem;
use crate::daemon::{DaemonConfig, is_daemon_running, start_daemon};
use crate::error::{ErrorKind, RemoteError};
use crate::protocol::{Request, Response};
use crate::tree::DependencyTree;
use crate::types::{ActivityRecord, Item, ItemProgress};
use eyre::{Context, Result, bail};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Client for communicating with the craftchain daemon.
pub struct Client {
    root: PathBuf,
    stream: UnixStream,
}

impl Client {
    /// Connect to the daemon, optionally auto-starting it if not running.
    pub fn connect(root: &Path, auto_start: bool) -> Result<Self> {
        let config = DaemonConfig::new(root);
        let socket_path = config.socket_path();

        let stream = match UnixStream::connect(&socket_path) {
            Ok(stream) => stream,
            Err(_) if auto_start => {
                if !is_daemon_running(root) {
                    start_daemon(root).context("Failed to auto-start daemon")?;

                    let mut attempts = 0;
                    loop {
                        if attempts > 20 {
                            bail!("Daemon failed to start in time");
                        }
                        std::thread::sleep(Duration::from_millis(50));
                        if let Ok(stream) = UnixStream::connect(&socket_path) {
                            break stream;
                        }
                        attempts += 1;
                    }
                } else {
                    UnixStream::connect(&socket_path).context("Failed to connect to daemon")?
                }
            }
            Err(e) => {
                bail!("Failed to connect to daemon: {}. Is it running?", e);
            }
        };

        stream
            .set_read_timeout(Some(Duration::from_secs(30)))
            .context("Failed to set read timeout")?;

        Ok(Self {
            root: root.to_path_buf(),
            stream,
        })
    }

    /// Get the store root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Send a request and receive a response.
    fn request(&mut self, request: Request) -> Result<Response> {
        let request_json = serde_json::to_string(&request)?;
        writeln!(self.stream, "{}", request_json)?;
        self.stream.flush()?;

        let mut reader = BufReader::new(&self.stream);
        let mut response_line = String::new();
        reader.read_line(&mut response_line)?;

        let response: Response = serde_json::from_str(&response_line)?;
        Ok(response)
    }

    fn expect_item(&mut self, request: Request) -> Result<Item> {
        match self.request(request)? {
            Response::Item { item } => Ok(item),
            other => Err(unexpected(other)),
        }
    }

    /// Create a new item.
    pub fn create_item(&mut self, item: NewItem) -> Result<Item> {
        self.expect_item(Request::CreateItem { item })
    }

    /// Add a dependency edge by names.
    pub fn add_dependency(
        &mut self,
        project_id: &str,
        parent_name: &str,
        dependency_name: &str,
        qty: i64,
    ) -> Result<Item> {
        self.expect_item(Request::AddDependency {
            project_id: project_id.to_string(),
            parent_name: parent_name.to_string(),
            dependency_name: dependency_name.to_string(),
            qty,
        })
    }

    /// Insert many items at once.
    pub fn insert_many(&mut self, items: Vec<NewItem>) -> Result<Vec<Item>> {
        match self.request(Request::BulkInsert { items })? {
            Response::Items { items } => Ok(items),
            other => Err(unexpected(other)),
        }
    }

    /// Get an item by ID.
    pub fn get(&mut self, id: &str) -> Result<Option<Item>> {
        match self.request(Request::Get { id: id.to_string() })? {
            Response::Item { item } => Ok(Some(item)),
            Response::NotFound { .. } => Ok(None),
            other => Err(unexpected(other)),
        }
    }

    /// Full dependency tree of an item.
    pub fn tree(&mut self, id: &str) -> Result<DependencyTree> {
        match self.request(Request::Tree { id: id.to_string() })? {
            Response::Tree { tree } => Ok(tree),
            other => Err(unexpected(other)),
        }
    }

    /// All items in a project.
    pub fn project_items(&mut self, project_id: &str) -> Result<Vec<Item>> {
        match self.request(Request::ProjectItems {
            project_id: project_id.to_string(),
        })? {
            Response::Items { items } => Ok(items),
            other => Err(unexpected(other)),
        }
    }

    /// Progress report for a project.
    pub fn progress(&mut self, project_id: &str) -> Result<Vec<ItemProgress>> {
        match self.request(Request::Progress {
            project_id: project_id.to_string(),
        })? {
            Response::Progress { progress } => Ok(progress),
            other => Err(unexpected(other)),
        }
    }

    /// Gated craft increment.
    pub fn craft(&mut self, item_id: &str, user_id: &str, increment_by: i64) -> Result<Item> {
        self.expect_item(Request::Craft {
            item_id: item_id.to_string(),
            user_id: user_id.to_string(),
            increment_by,
        })
    }

    /// Raw contribution.
    pub fn contribute(&mut self, item_id: &str, user_id: &str, qty: i64) -> Result<Item> {
        self.expect_item(Request::Contribute {
            item_id: item_id.to_string(),
            user_id: user_id.to_string(),
            qty,
        })
    }

    /// Remove a contribution.
    pub fn remove_contribution(&mut self, item_id: &str, user_id: &str, contribution_id: &str) -> Result<Item> {
        self.expect_item(Request::RemoveContribution {
            item_id: item_id.to_string(),
            user_id: user_id.to_string(),
            contribution_id: contribution_id.to_string(),
        })
    }

    /// Recent activity for a project.
    pub fn activity(&mut self, project_id: &str, limit: Option<usize>) -> Result<Vec<ActivityRecord>> {
        match self.request(Request::Activity {
            project_id: project_id.to_string(),
            limit,
        })? {
            Response::Activity { records } => Ok(records),
            other => Err(unexpected(other)),
        }
    }

    /// Flush pending writes to disk.
    pub fn flush(&mut self) -> Result<()> {
        match self.request(Request::Flush)? {
            Response::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Shutdown the daemon.
    pub fn shutdown(&mut self) -> Result<()> {
        match self.request(Request::Shutdown)? {
            Response::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Ping the daemon.
    pub fn ping(&mut self) -> Result<()> {
        match self.request(Request::Ping)? {
            Response::Pong => Ok(()),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(response: Response) -> eyre::Report {
    match response {
        Response::Error { kind, message } => eyre::Report::new(RemoteError { kind, message }),
        Response::NotFound { id } => eyre::Report::new(RemoteError {
            kind: ErrorKind::NotFound,
            message: format!("item not found: {}", id),
        }),
        other => eyre::eyre!("Unexpected response: {:?}", other),
    }
}
