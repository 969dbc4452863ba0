//! Mock monitoring backend for testing
//!
//! A simple mock backend that answers subscribe frames with synthetic
//! snapshot frames. Used for manual development and connection testing.
//!
//! Usage:
//!   mock_backend [PORT]
//!
//! The port can also be set via the MOCK_BACKEND_PORT environment variable.
//! Command line argument takes precedence over environment variable.
//! Default port is 7700.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};

fn main() {
    // Port priority: command line arg > environment variable > default (7700)
    let port = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .or_else(|| {
            std::env::var("MOCK_BACKEND_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
        })
        .unwrap_or(7700u16);

    let listener = match TcpListener::bind(format!("127.0.0.1:{}", port)) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to port {}: {}", port, e);
            std::process::exit(1);
        }
    };

    eprintln!("Mock backend listening on port {}", port);

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                if let Ok(addr) = stream.peer_addr() {
                    eprintln!("Connection from {}", addr);
                }
                std::thread::spawn(move || {
                    handle_client(stream);
                });
            }
            Err(e) => {
                eprintln!("Accept error: {}", e);
            }
        }
    }
}

fn handle_client(mut stream: TcpStream) {
    let reader = BufReader::new(match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to clone stream: {}", e);
            return;
        }
    });

    for line in reader.lines() {
        match line {
            Ok(request) => {
                if request.is_empty() {
                    continue;
                }

                eprintln!("Received: {}", request);

                let Some(response) = handle_frame(&request) else {
                    continue;
                };
                eprintln!("Sending: {}", response);

                if writeln!(stream, "{}", response).is_err() {
                    break;
                }
                if stream.flush().is_err() {
                    break;
                }
            }
            Err(_) => {
                break;
            }
        }
    }

    eprintln!("Client disconnected");
}

/// Answer a subscribe frame with a snapshot covering the requested servers
fn handle_frame(request: &str) -> Option<String> {
    let frame: serde_json::Value = match serde_json::from_str(request) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Ignoring malformed frame: {}", e);
            return None;
        }
    };

    match frame.get("type").and_then(|t| t.as_str()) {
        Some("subscribe") => {
            let servers: Vec<serde_json::Value> = frame
                .pointer("/payload/servers")
                .and_then(|s| s.as_array())
                .map(|list| {
                    list.iter()
                        .filter_map(|id| id.as_str())
                        .enumerate()
                        .map(|(i, id)| synthetic_server(id, i))
                        .collect()
                })
                .unwrap_or_default();

            Some(
                serde_json::json!({
                    "type": "snapshot",
                    "data": { "servers": servers }
                })
                .to_string(),
            )
        }
        Some("unsubscribe") => {
            eprintln!("Client unsubscribed");
            None
        }
        other => {
            eprintln!("Ignoring frame of type {:?}", other);
            None
        }
    }
}

fn synthetic_server(id: &str, index: usize) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "sections": {
            "main": {
                "ok": true,
                "status": 200,
                "lastErrorTime": null,
                "totalCameras": 4,
                "enabledCameras": 4,
                "enabledWithProblemStream": 0,
                "enabledAllStreamsOk": 4,
                "uptime": "1d 2h",
                "url": format!("{}.mock", id),
                "port": 8000 + index as u16,
                "name": format!("Mock {}", id)
            }
        }
    })
}
