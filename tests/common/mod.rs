// tests/common/mod.rs
// Shared test utilities for integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

/// Canned response for one account id
#[derive(Debug, Clone)]
pub struct StubResponse {
    pub code: u16,
    pub reason: &'static str,
    pub body: String,
}

impl StubResponse {
    pub fn ok(body: &str) -> Self {
        Self {
            code: 200,
            reason: "OK",
            body: body.to_string(),
        }
    }

    pub fn status(status: &str, created_on: &str) -> Self {
        Self::ok(&format!(
            r#"{{"status":"{}","created_on":"{}"}}"#,
            status, created_on
        ))
    }

    pub fn error(code: u16, reason: &'static str, body: &str) -> Self {
        Self {
            code,
            reason,
            body: body.to_string(),
        }
    }
}

/// Minimal HTTP/1.1 server answering `GET /v1/accounts/{id}` from a fixed
/// table. Unknown ids get a 404 with an empty body.
pub struct StubServer {
    pub base_url: String,
}

impl StubServer {
    pub fn start(responses: HashMap<i64, StubResponse>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind stub server");
        let addr = listener.local_addr().expect("Failed to read stub address");

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                let responses = responses.clone();
                thread::spawn(move || handle_connection(stream, &responses));
            }
        });

        Self {
            base_url: format!("http://{}", addr),
        }
    }
}

fn handle_connection(mut stream: TcpStream, responses: &HashMap<i64, StubResponse>) {
    let mut reader = BufReader::new(stream.try_clone().expect("Failed to clone stream"));
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    // Drain headers; GET requests carry no body
    loop {
        let mut header = String::new();
        match reader.read_line(&mut header) {
            Ok(0) | Err(_) => break,
            Ok(_) if header == "\r\n" || header == "\n" => break,
            Ok(_) => {}
        }
    }

    let path = request_line.split_whitespace().nth(1).unwrap_or_default();
    let response = path
        .strip_prefix("/v1/accounts/")
        .and_then(|id| id.parse::<i64>().ok())
        .and_then(|id| responses.get(&id).cloned())
        .unwrap_or_else(|| StubResponse::error(404, "Not Found", ""));

    let reply = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.code,
        response.reason,
        response.body.len(),
        response.body
    );
    let _ = stream.write_all(reply.as_bytes());
    let _ = stream.flush();
}

/// Run the acctmerge binary in `dir` with an isolated config environment
pub fn run_acctmerge_in_dir(dir: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_acctmerge"))
        .current_dir(dir)
        .args(args)
        .env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join(".config"))
        .env_remove("RUST_LOG")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("Failed to execute acctmerge");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}
