#![allow(dead_code)]

use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Debug, Clone, Default)]
pub struct StoredRecord {
    pub nodes: Vec<String>,
    pub published: bool,
    pub immutable: bool,
    /// Owner reported in metadata rows when it differs from the lookup key.
    pub row_owner: Option<String>,
}

#[derive(Debug, Default)]
pub struct LedgerState {
    pub records: BTreeMap<(String, String), StoredRecord>,
    pub actions: Vec<String>,
}

/// In-process stand-in for the ledger HTTP API, one request per connection.
pub struct FakeLedger {
    pub endpoint: String,
    state: Arc<Mutex<LedgerState>>,
}

impl FakeLedger {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake ledger");
        let addr = listener.local_addr().expect("local addr");
        let state = Arc::new(Mutex::new(LedgerState::default()));
        let shared = Arc::clone(&state);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                serve(stream, &shared);
            }
        });
        Self {
            endpoint: format!("http://{addr}"),
            state,
        }
    }

    pub fn seed(&self, owner: &str, filename: &str, nodes: usize) {
        let record = StoredRecord {
            nodes: (0..nodes).map(|i| hex::encode([i as u8; 4])).collect(),
            ..StoredRecord::default()
        };
        self.state
            .lock()
            .expect("ledger state")
            .records
            .insert((owner.to_string(), filename.to_string()), record);
    }

    /// An empty record under `owner` whose metadata names `row_owner`.
    pub fn seed_owned_by(&self, owner: &str, filename: &str, row_owner: &str) {
        let record = StoredRecord {
            row_owner: Some(row_owner.to_string()),
            ..StoredRecord::default()
        };
        self.state
            .lock()
            .expect("ledger state")
            .records
            .insert((owner.to_string(), filename.to_string()), record);
    }

    pub fn record(&self, owner: &str, filename: &str) -> Option<StoredRecord> {
        self.state
            .lock()
            .expect("ledger state")
            .records
            .get(&(owner.to_string(), filename.to_string()))
            .cloned()
    }

    pub fn actions(&self) -> Vec<String> {
        self.state.lock().expect("ledger state").actions.clone()
    }
}

fn serve(stream: TcpStream, state: &Mutex<LedgerState>) {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    let path = request_line
        .split_whitespace()
        .nth(1)
        .unwrap_or_default()
        .to_string();

    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }

    let mut body = vec![0u8; content_length];
    if reader.read_exact(&mut body).is_err() {
        return;
    }
    let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let (status, response) = {
        let mut guard = state.lock().expect("ledger state");
        route(&mut guard, &path, &request)
    };

    let payload = response.to_string();
    let reply = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
        payload.len()
    );
    let mut stream = reader.into_inner();
    let _ = stream.write_all(reply.as_bytes());
    let _ = stream.flush();
}

fn key_of(data: &Value) -> (String, String) {
    (
        data["owner"].as_str().unwrap_or_default().to_string(),
        data["filename"].as_str().unwrap_or_default().to_string(),
    )
}

fn refuse(message: &str) -> (&'static str, Value) {
    ("200 OK", json!({ "code": 1, "message": message }))
}

fn route(state: &mut LedgerState, path: &str, request: &Value) -> (&'static str, Value) {
    match path {
        "/v1/record/get_meta" => {
            let key = key_of(request);
            let rows = match state.records.get(&key) {
                Some(rec) => vec![json!({
                    "owner": rec.row_owner.clone().unwrap_or(key.0),
                    "filename": key.1,
                    "top": rec.nodes.len(),
                    "published": u8::from(rec.published),
                    "immutable": u8::from(rec.immutable),
                })],
                None => Vec::new(),
            };
            ("200 OK", json!({ "rows": rows, "more": false }))
        }
        "/v1/record/get_node" => {
            let key = key_of(request);
            let index = request["nodeid"].as_u64().unwrap_or(u64::MAX) as usize;
            let rows = match state.records.get(&key).and_then(|r| r.nodes.get(index)) {
                Some(data) => vec![json!({ "nodeid": index, "data": data })],
                None => Vec::new(),
            };
            ("200 OK", json!({ "rows": rows }))
        }
        "/v1/record/push_action" => apply_action(state, request),
        _ => ("404 Not Found", json!({ "error": "unknown path" })),
    }
}

fn apply_action(state: &mut LedgerState, request: &Value) -> (&'static str, Value) {
    let action = request["action"].as_str().unwrap_or_default().to_string();
    let actor = request["authorization"]["actor"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    let data = &request["data"];
    let key = key_of(data);
    state.actions.push(action.clone());

    if action == "create" {
        if state.records.contains_key(&key) {
            return refuse("record already exists");
        }
        if key.0 != actor {
            return refuse("missing authority of owner");
        }
        state.records.insert(key, StoredRecord::default());
        return ("200 OK", json!({ "code": 0 }));
    }

    let Some(record) = state.records.get_mut(&key) else {
        return refuse("record does not exist");
    };
    if record.immutable && action != "publish" {
        return refuse("record is immutable");
    }
    match action.as_str() {
        "append" => {
            let nodeid = data["nodeid"].as_u64().unwrap_or(u64::MAX) as usize;
            if nodeid != record.nodes.len() {
                return refuse("nodeid must equal top");
            }
            let payload = data["data"].as_str().unwrap_or_default().to_string();
            record.nodes.push(payload);
        }
        "pop" => {
            if record.nodes.pop().is_none() {
                return refuse("record has no nodes");
            }
        }
        "reset" => record.nodes.clear(),
        "remove" => {
            state.records.remove(&key);
        }
        "publish" => record.published = data["published"].as_u64() == Some(1),
        "freeze" => record.immutable = true,
        _ => return refuse("unknown action"),
    }
    ("200 OK", json!({ "code": 0 }))
}

/// Deterministic incompressible bytes.
pub fn noise(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed.max(1);
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 24) as u8
        })
        .collect()
}

pub fn write_site(root: &Path) {
    std::fs::create_dir_all(root.join("img")).expect("mkdir site");
    std::fs::write(root.join("index.html"), b"hello world\n").expect("write index");
    std::fs::write(root.join("img/logo.png"), noise(200_000, 7)).expect("write logo");
}

pub fn nodesite(home: &Path, endpoint: &str) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nodesite");
    cmd.current_dir(home)
        .env("NODESITE_HOME", home)
        .env("NODESITE_ENDPOINT", endpoint)
        .env_remove("NODESITE_WORK_DIR")
        .env_remove("NODESITE_LOGS_DIR")
        .env_remove("NODESITE_CONFIG_PATH")
        .env_remove("NODESITE_CONTRACT")
        .env_remove("NODESITE_ACCOUNT")
        .env_remove("NODESITE_PERMISSION")
        .env_remove("NODESITE_CHUNK_SIZE")
        .env_remove("NODESITE_BROTLI_QUALITY");
    cmd
}
