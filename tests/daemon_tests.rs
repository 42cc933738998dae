//! Integration tests for the daemon and client.
//!
//! Runs a daemon on a background thread and drives it over the socket.

mod common;

use common::{PROJECT, USER};
use craftchain::{Client, Daemon, DaemonConfig, ErrorKind, NewItem, Store, is_daemon_running};
use std::path::Path;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn spawn_daemon(root: &Path) -> thread::JoinHandle<()> {
    let mut daemon = Daemon::new(DaemonConfig::new(root)).expect("Failed to create daemon");
    thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().expect("Failed to create runtime");
        rt.block_on(async { daemon.run().await }).expect("Daemon error");
    })
}

fn connect(root: &Path) -> Client {
    for _ in 0..100 {
        if let Ok(client) = Client::connect(root, false) {
            return client;
        }
        thread::sleep(Duration::from_millis(20));
    }
    panic!("Daemon never came up");
}

#[test]
fn test_daemon_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    Store::init(root).unwrap();

    let handle = spawn_daemon(root);
    let mut client = connect(root);
    client.ping().unwrap();
    assert!(is_daemon_running(root));

    let ore = client.create_item(NewItem::new(PROJECT, "Ore", 3)).unwrap();
    let ingot = client
        .create_item(NewItem::new(PROJECT, "Ingot", 1).with_dependency(&ore.id, 3))
        .unwrap();

    // Gate and error kinds survive the socket
    let err = client.craft(&ingot.id, USER, 1).unwrap_err();
    assert_eq!(ErrorKind::of(&err), ErrorKind::DependencyIncomplete);
    let err = client.add_dependency(PROJECT, "Ore", "Ingot", 1).unwrap_err();
    assert_eq!(ErrorKind::of(&err), ErrorKind::InvalidOperation);

    client.craft(&ore.id, USER, 5).unwrap();
    let ingot = client.craft(&ingot.id, USER, 1).unwrap();
    assert!(ingot.is_complete());

    let ingot = client.contribute(&ingot.id, "bob", 2).unwrap();
    let contribution_id = ingot.contributions[0].id.clone();
    let ingot = client.remove_contribution(&ingot.id, "bob", &contribution_id).unwrap();
    assert!(ingot.contributions.is_empty());

    let tree = client.tree(&ingot.id).unwrap();
    let root_node = tree.root().unwrap();
    assert_eq!(tree.expanded(&root_node.dependencies[0]).unwrap().id, ore.id);

    assert_eq!(client.project_items(PROJECT).unwrap().len(), 2);
    assert_eq!(client.progress(PROJECT).unwrap().len(), 2);
    assert_eq!(client.activity(PROJECT, None).unwrap().len(), 2);
    assert!(client.get("it-ffffffffff").unwrap().is_none());

    let imported = client
        .insert_many(vec![NewItem::new(PROJECT, "Coal", 8), NewItem::new(PROJECT, "Flux", 1)])
        .unwrap();
    assert_eq!(imported.len(), 2);

    client.flush().unwrap();
    client.shutdown().unwrap();
    handle.join().unwrap();

    // Everything the daemon wrote is visible to a direct store
    let store = Store::open(root).unwrap();
    assert_eq!(store.project_items(PROJECT).unwrap().len(), 4);
    assert!(!is_daemon_running(root));
}
