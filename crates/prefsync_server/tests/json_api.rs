//! End-to-end tests of the JSON surface over a durable store.

use chrono::TimeDelta;
use prefsync_core::{Clock, LogProfileStore, ManualClock, SyncConfig};
use prefsync_server::{ServerConfig, SyncServer};
use prefsync_testkit::start_time;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn open_server(dir: &std::path::Path, clock: Arc<ManualClock>) -> SyncServer {
    let store = LogProfileStore::open_dir(dir).unwrap();
    let config = ServerConfig::new(
        SyncConfig::default().with_retention_window(Duration::from_secs(30 * 24 * 3600)),
    )
    .with_scheduler(false);
    SyncServer::new(config, Arc::new(store), clock)
}

fn call(server: &SyncServer, request: &str) -> Value {
    serde_json::from_str(&server.handle_json(request)).unwrap()
}

#[test]
fn two_clients_converge_across_restart() {
    let dir = tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(start_time()));

    let id = {
        let server = open_server(dir.path(), clock.clone());
        let reply = call(&server, r#"{"op":"create"}"#);
        let id = reply["profile"]["id"].as_str().unwrap().to_owned();

        // client A edits
        let changed = clock.now().to_rfc3339();
        let push = format!(
            r#"{{"op":"push","id":"{id}","changed":"{changed}","preferences":"theme=dark"}}"#
        );
        assert_eq!(call(&server, &push)["result"], "accepted");
        id
    };

    clock.advance(TimeDelta::hours(1));
    let server = open_server(dir.path(), clock.clone());

    // client B has never synced and pulls the copy A pushed
    let pull = format!(r#"{{"op":"pull","id":"{id}","since":"1970-01-01T00:00:00Z"}}"#);
    let reply = call(&server, &pull);
    assert_eq!(reply["profile"]["preferences"], "theme=dark");

    // client B's stale edit is refused
    let stale = format!(
        r#"{{"op":"push","id":"{id}","changed":"{}","preferences":"theme=light"}}"#,
        start_time().to_rfc3339()
    );
    let reply = call(&server, &stale);
    assert_eq!(reply["error"], "client_copy_outdated");

    let reply = call(&server, &format!(r#"{{"op":"last_contact","id":"{id}"}}"#));
    assert_eq!(
        reply["at"],
        serde_json::to_value(clock.now()).unwrap(),
        "every request counts as contact"
    );
}

#[test]
fn deleted_profiles_disappear_after_sweep() {
    let dir = tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(start_time()));
    let server = open_server(dir.path(), clock.clone());

    let keep = call(&server, r#"{"op":"create"}"#)["profile"]["id"]
        .as_str()
        .unwrap()
        .to_owned();
    let gone = call(&server, r#"{"op":"create"}"#)["profile"]["id"]
        .as_str()
        .unwrap()
        .to_owned();

    let reply = call(
        &server,
        &format!(r#"{{"op":"delete","id":"{gone}","preferences":"final"}}"#),
    );
    assert_eq!(reply["result"], "deleted");

    let reply = call(&server, r#"{"op":"list_tombstoned"}"#);
    assert_eq!(reply["profiles"].as_array().unwrap().len(), 1);

    let reply = call(&server, r#"{"op":"sweep"}"#);
    assert_eq!(reply["report"]["deleted"], 1);

    let reply = call(&server, &format!(r#"{{"op":"get","id":"{gone}"}}"#));
    assert_eq!(reply["status"], 404);
    let reply = call(&server, &format!(r#"{{"op":"get","id":"{keep}"}}"#));
    assert_eq!(reply["result"], "profile");
}

#[test]
fn abandoned_profiles_expire() {
    let dir = tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(start_time()));
    let server = open_server(dir.path(), clock.clone());

    call(&server, r#"{"op":"create"}"#);
    clock.advance(TimeDelta::days(31));

    let reply = call(&server, r#"{"op":"sweep"}"#);
    assert_eq!(reply["report"]["deleted"], 1);

    let reply = call(&server, r#"{"op":"list_all"}"#);
    assert_eq!(reply["status"], 409);
    assert_eq!(reply["error"], "empty_store");
}
