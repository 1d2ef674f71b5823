//! Scripted in-process server for client tests.

#![allow(dead_code)]

use iproto_client::{Client, ConnectionConfig, Session};
use iproto_protocol::{keys, Encoder, Greeting, IncomingRequest, RequestType, Response, Value};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

pub const GREETING_LINE: &str = "Tarantool 2.11.1 (Binary) 7c2a3b9e-1d4f-4a0e-9b7a-2f6c1e8d5a30";

pub const SALT: [u8; 32] = [
    0x1f, 0x8e, 0x47, 0x02, 0xc3, 0x5a, 0x99, 0x6d, 0x20, 0xe4, 0x71, 0x0b, 0xb8, 0x3c, 0x55,
    0xfa, 0x0e, 0x92, 0x61, 0xd7, 0x4a, 0x13, 0xcc, 0x88, 0x35, 0x6e, 0x07, 0xa9, 0xf1, 0x2d,
    0x50, 0xbe,
];

pub const ACTIVITIES_ID: u32 = 512;
pub const PRICE_INDEX_ID: u32 = 1;

/// What the server answers to one request.
pub enum Reply {
    /// Ok status with the given tuples as data.
    Data(Vec<Value>),
    /// Ok status with no body at all.
    Empty,
    /// Error status with the given code and message.
    Error(u32, String),
    /// Ok status echoing a different correlation id.
    WrongSync(Vec<Value>),
    /// Raw bytes written as is.
    Raw(Vec<u8>),
}

/// Requests seen by the server, in arrival order.
#[derive(Clone, Default)]
pub struct Recorded(Arc<Mutex<Vec<IncomingRequest>>>);

impl Recorded {
    pub fn all(&self) -> Vec<IncomingRequest> {
        self.0.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.0.lock().len()
    }

    pub fn count_of(&self, request_type: RequestType) -> usize {
        self.0
            .lock()
            .iter()
            .filter(|r| r.request_type() == Some(request_type))
            .count()
    }

    pub fn last(&self) -> IncomingRequest {
        self.0.lock().last().cloned().expect("no requests recorded")
    }
}

/// Spawns a server on one end of a duplex pipe and returns the other end.
///
/// The greeting is written first when `greet` is set; every decoded
/// request is recorded and answered by `handler`.
pub fn spawn_server<F>(greet: bool, mut handler: F) -> (DuplexStream, Recorded)
where
    F: FnMut(&IncomingRequest) -> Reply + Send + 'static,
{
    let (client, mut server) = tokio::io::duplex(64 * 1024);
    let recorded = Recorded::default();
    let log = recorded.clone();

    tokio::spawn(async move {
        if greet {
            let block = Greeting::build(GREETING_LINE, &SALT);
            if server.write_all(&block).await.is_err() {
                return;
            }
        }

        let mut decoder = iproto_protocol::Decoder::new();
        let mut buf = vec![0u8; 4096];
        loop {
            let n = match server.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            decoder.extend(&buf[..n]);

            while let Ok(Some(request)) = decoder.decode_request() {
                log.0.lock().push(request.clone());
                let bytes = match handler(&request) {
                    Reply::Data(tuples) => {
                        Encoder::encode_response(&Response::ok(request.sync, Value::Array(tuples)))
                            .unwrap()
                            .to_vec()
                    }
                    Reply::Empty => {
                        let header = Value::Map(vec![
                            (Value::from(keys::REQUEST_TYPE), Value::from(0u8)),
                            (Value::from(keys::SYNC), Value::from(request.sync)),
                        ]);
                        iproto_protocol::encode_frame(&header, None).unwrap().to_vec()
                    }
                    Reply::Error(code, message) => {
                        Encoder::encode_response(&Response::error(request.sync, code, message))
                            .unwrap()
                            .to_vec()
                    }
                    Reply::WrongSync(tuples) => Encoder::encode_response(&Response::ok(
                        request.sync + 1,
                        Value::Array(tuples),
                    ))
                    .unwrap()
                    .to_vec(),
                    Reply::Raw(bytes) => bytes,
                };
                if server.write_all(&bytes).await.is_err() {
                    return;
                }
            }
        }
    });

    (client, recorded)
}

/// Answers schema lookups for the `activities` space and its `price`
/// index, and defers everything else to `other`.
pub fn with_catalog<F>(mut other: F) -> impl FnMut(&IncomingRequest) -> Reply + Send + 'static
where
    F: FnMut(&IncomingRequest) -> Reply + Send + 'static,
{
    move |request| {
        if request.request_type() == Some(RequestType::Select) {
            let space = request.field(keys::SPACE_ID).and_then(Value::as_u64);
            let key = request
                .field(keys::KEY)
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            match space {
                Some(280) => {
                    return if key == vec![Value::from("activities")] {
                        Reply::Data(vec![Value::Array(vec![
                            Value::from(ACTIVITIES_ID),
                            Value::from(1),
                            Value::from("activities"),
                        ])])
                    } else {
                        Reply::Data(vec![])
                    };
                }
                Some(288) => {
                    return if key == vec![Value::from(ACTIVITIES_ID), Value::from("price")] {
                        Reply::Data(vec![Value::Array(vec![
                            Value::from(ACTIVITIES_ID),
                            Value::from(PRICE_INDEX_ID),
                            Value::from("price"),
                        ])])
                    } else {
                        Reply::Data(vec![])
                    };
                }
                _ => {}
            }
        }
        other(request)
    }
}

pub fn config() -> ConnectionConfig {
    ConnectionConfig::default().with_timeout(Duration::from_secs(2))
}

/// Builds a client attached to a fresh fake server.
pub async fn connect<F>(config: ConnectionConfig, handler: F) -> (Client<DuplexStream>, Recorded)
where
    F: FnMut(&IncomingRequest) -> Reply + Send + 'static,
{
    let timeout = config.timeout();
    let (stream, recorded) = spawn_server(true, handler);
    let mut client = Client::new(config);
    client
        .attach(Session::new(stream, timeout))
        .await
        .expect("handshake failed");
    (client, recorded)
}

pub fn ok_empty(_: &IncomingRequest) -> Reply {
    Reply::Data(vec![])
}
