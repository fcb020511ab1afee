//! Daemon Integration Tests
//!
//! Runs the socket server on a temporary path and talks to it the way a
//! client process would: one JSON object per line in each direction.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;

use limpha::models::session::SessionHandle;
use limpha::services::daemon::{DaemonContext, MemoryDaemon};
use limpha::services::memory::{MemoryEngine, ShardExporter};
use limpha::storage::database::Database;

// ============================================================================
// Helpers
// ============================================================================

struct Client {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(socket: &Path) -> Client {
        let stream = UnixStream::connect(socket).await.expect("connect to daemon");
        let (reader, writer) = stream.into_split();
        Client {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    async fn send_raw(&mut self, line: &str) -> Value {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        let reply = self.lines.next_line().await.unwrap().expect("daemon replied");
        serde_json::from_str(&reply).unwrap()
    }

    async fn send(&mut self, request: Value) -> Value {
        self.send_raw(&request.to_string()).await
    }
}

fn start_daemon(dir: &Path) -> (PathBuf, tokio::task::JoinHandle<limpha::AppResult<()>>) {
    let db = Database::open(&dir.join("limpha.db"), 4).expect("open database");
    let engine = MemoryEngine::open(db, SessionHandle::new("socket-test")).expect("open engine");
    let context = DaemonContext::new(engine, ShardExporter::new(dir.join("shards")));

    let socket = dir.join("limpha.sock");
    let daemon = MemoryDaemon::new(&socket, context);
    (socket, tokio::spawn(daemon.run()))
}

async fn wait_for_socket(socket: &Path) {
    for _ in 0..200 {
        if UnixStream::connect(socket).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("daemon did not start listening on {}", socket.display());
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_round_trip_over_socket() {
    let temp_dir = tempfile::tempdir().unwrap();
    let (socket, server) = start_daemon(temp_dir.path());
    wait_for_socket(&socket).await;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&socket).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    let mut client = Client::connect(&socket).await;

    assert_eq!(client.send(json!({"cmd": "ping"})).await, json!({"ok": true, "pong": true}));

    let stored = client
        .send(json!({
            "cmd": "store",
            "prompt": "Who are you?",
            "response": "I'm Yent. Not a name, more like an echo.",
            "state": {"temperature": 0.89, "destiny": 0.25}
        }))
        .await;
    assert_eq!(stored["ok"], true);
    let id = stored["id"].as_i64().unwrap();

    let search = client.send(json!({"cmd": "search", "query": "echo"})).await;
    assert_eq!(search["results"].as_array().unwrap().len(), 1);

    let recall = client.send(json!({"cmd": "recall", "id": id})).await;
    assert_eq!(recall["conversation"]["access_count"], 1);
    assert_eq!(recall["conversation"]["temperature"], 0.89);

    let recent = client.send(json!({"cmd": "recent", "limit": 5})).await;
    assert_eq!(recent["conversations"].as_array().unwrap().len(), 1);

    let state = client
        .send(json!({"cmd": "search_state", "state": {"temperature": 0.89, "destiny": 0.25}}))
        .await;
    assert!(state["results"][0]["distance"].as_f64().unwrap() < 1e-2);

    let candidates = client.send(json!({"cmd": "candidates"})).await;
    assert_eq!(candidates["candidates"], json!([]));

    let stats = client.send(json!({"cmd": "stats"})).await;
    assert_eq!(stats["total_conversations"], 1);
    assert_eq!(stats["current_session"], "socket-test");

    let shutdown = client.send(json!({"cmd": "shutdown"})).await;
    assert_eq!(shutdown["ok"], true);

    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("daemon stopped")
        .unwrap()
        .unwrap();
    assert!(!socket.exists());
}

#[tokio::test]
async fn test_errors_keep_connection_open() {
    let temp_dir = tempfile::tempdir().unwrap();
    let (socket, server) = start_daemon(temp_dir.path());
    wait_for_socket(&socket).await;
    let mut client = Client::connect(&socket).await;

    let invalid = client.send_raw("{this is not json").await;
    assert_eq!(invalid["ok"], false);
    assert!(invalid["error"].as_str().unwrap().starts_with("invalid JSON"));

    let unknown = client.send(json!({"cmd": "dance"})).await;
    assert_eq!(unknown, json!({"ok": false, "error": "unknown command: dance"}));

    let missing = client.send(json!({"cmd": "recall", "id": 12345})).await;
    assert_eq!(missing, json!({"ok": false, "error": "not found"}));

    // still serving after the errors
    assert_eq!(client.send(json!({"cmd": "ping"})).await["pong"], true);

    client.send(json!({"cmd": "shutdown"})).await;
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("daemon stopped")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_clients_share_one_engine() {
    let temp_dir = tempfile::tempdir().unwrap();
    let (socket, server) = start_daemon(temp_dir.path());
    wait_for_socket(&socket).await;

    let mut writer = Client::connect(&socket).await;
    let mut reader = Client::connect(&socket).await;

    writer
        .send(json!({"cmd": "store", "prompt": "lantern", "response": "a small glow"}))
        .await;
    let search = reader.send(json!({"cmd": "search", "query": "lantern"})).await;
    assert_eq!(search["results"].as_array().unwrap().len(), 1);

    let graduated = reader.send(json!({"cmd": "graduate", "id": 1, "reason": "manual"})).await;
    assert_eq!(graduated["ok"], true);
    let again = writer.send(json!({"cmd": "graduate", "id": 1})).await;
    assert_eq!(again, json!({"ok": true, "already_graduated": true}));

    let queue = writer.send(json!({"cmd": "queue"})).await;
    assert_eq!(queue["queue"].as_array().unwrap().len(), 1);

    reader.send(json!({"cmd": "shutdown"})).await;
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("daemon stopped")
        .unwrap()
        .unwrap();
}
