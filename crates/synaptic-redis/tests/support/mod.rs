//! Minimal in-process RESP server for tests that need a Redis wire peer.
//!
//! Understands GET, SET (arguments after the value are recorded, not
//! applied), DEL and QUIT; every other command gets `+OK`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use synaptic_redis::ConnectionSettings;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

#[derive(Default)]
struct State {
    commands: Vec<Vec<String>>,
    store: HashMap<String, String>,
    accepted: usize,
    live: usize,
}

pub struct FakeRedis {
    port: u16,
    state: Arc<Mutex<State>>,
    epoch: Arc<watch::Sender<u64>>,
}

impl FakeRedis {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(State::default()));
        let (epoch, _) = watch::channel(0u64);
        let epoch = Arc::new(epoch);

        let accept_state = state.clone();
        let accept_epoch = epoch.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                {
                    let mut state = accept_state.lock().unwrap();
                    state.accepted += 1;
                    state.live += 1;
                }
                let state = accept_state.clone();
                let epoch = accept_epoch.subscribe();
                tokio::spawn(async move {
                    serve(stream, &state, epoch).await;
                    state.lock().unwrap().live -= 1;
                });
            }
        });

        Self { port, state, epoch }
    }

    pub fn settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            host: "127.0.0.1".to_string(),
            port: self.port,
            ..Default::default()
        }
    }

    pub fn url(&self) -> String {
        format!("redis://127.0.0.1:{}/", self.port)
    }

    /// Data commands received so far, in arrival order.
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.state
            .lock()
            .unwrap()
            .commands
            .iter()
            .filter(|c| {
                c.first()
                    .is_some_and(|name| matches!(name.as_str(), "GET" | "SET" | "DEL"))
            })
            .cloned()
            .collect()
    }

    pub fn accepted(&self) -> usize {
        self.state.lock().unwrap().accepted
    }

    /// Close every open client connection, as a server restart would, and
    /// wait until they are gone. The listener keeps accepting.
    pub async fn drop_connections(&self) {
        self.epoch.send_modify(|epoch| *epoch += 1);
        for _ in 0..200 {
            if self.state.lock().unwrap().live == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("connections still open");
    }
}

async fn serve(stream: TcpStream, state: &Mutex<State>, mut epoch: watch::Receiver<u64>) {
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);
    loop {
        let command = tokio::select! {
            command = read_command(&mut reader) => command,
            _ = epoch.changed() => return,
        };
        let Some(command) = command else {
            return;
        };
        let (reply, quit) = respond(state, command);
        if write.write_all(reply.as_bytes()).await.is_err() || quit {
            return;
        }
    }
}

async fn read_command<R: AsyncBufRead + Unpin>(reader: &mut R) -> Option<Vec<String>> {
    let mut line = String::new();
    if reader.read_line(&mut line).await.ok()? == 0 {
        return None;
    }
    let count: usize = line.trim_end().strip_prefix('*')?.parse().ok()?;

    let mut parts = Vec::with_capacity(count);
    for _ in 0..count {
        line.clear();
        reader.read_line(&mut line).await.ok()?;
        let len: usize = line.trim_end().strip_prefix('$')?.parse().ok()?;
        let mut buf = vec![0; len + 2];
        reader.read_exact(&mut buf).await.ok()?;
        buf.truncate(len);
        parts.push(String::from_utf8(buf).ok()?);
    }
    Some(parts)
}

fn respond(state: &Mutex<State>, command: Vec<String>) -> (String, bool) {
    let mut state = state.lock().unwrap();
    let name = command
        .first()
        .map(|c| c.to_ascii_uppercase())
        .unwrap_or_default();

    let reply = match (name.as_str(), command.as_slice()) {
        ("GET", [_, key]) => match state.store.get(key) {
            Some(value) => format!("${}\r\n{value}\r\n", value.len()),
            None => "$-1\r\n".to_string(),
        },
        ("SET", [_, key, value, ..]) => {
            state.store.insert(key.clone(), value.clone());
            "+OK\r\n".to_string()
        }
        ("DEL", [_, keys @ ..]) => {
            let removed = keys
                .iter()
                .filter(|key| state.store.remove(*key).is_some())
                .count();
            format!(":{removed}\r\n")
        }
        ("PING", _) => "+PONG\r\n".to_string(),
        ("HELLO", _) => "-ERR unknown command 'HELLO'\r\n".to_string(),
        _ => "+OK\r\n".to_string(),
    };

    state.commands.push(command);
    (reply, name == "QUIT")
}
