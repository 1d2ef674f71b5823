//! Request engine benchmarks against an in-process server.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use iproto_client::{Client, ConnectionConfig, SelectOptions, Session};
use iproto_protocol::{Decoder, Encoder, Greeting, Response, Value};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::runtime::Runtime;

/// Answers every request with one small tuple.
async fn serve(mut stream: DuplexStream) {
    let greeting = Greeting::build("Tarantool 2.11.1 (Binary) bench", &[0x5au8; 32]);
    if stream.write_all(&greeting).await.is_err() {
        return;
    }

    let tuple = Value::Array(vec![Value::Array(vec![
        Value::from(1),
        Value::from("Roxette"),
    ])]);
    let mut decoder = Decoder::new();
    let mut buf = vec![0u8; 4096];
    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        decoder.extend(&buf[..n]);
        while let Ok(Some(request)) = decoder.decode_request() {
            let Ok(reply) = Encoder::encode_response(&Response::ok(request.sync, tuple.clone()))
            else {
                return;
            };
            if stream.write_all(&reply).await.is_err() {
                return;
            }
        }
    }
}

fn setup_client(rt: &Runtime) -> Client<DuplexStream> {
    rt.block_on(async {
        let (client_end, server_end) = tokio::io::duplex(64 * 1024);
        tokio::spawn(serve(server_end));

        let mut client = Client::new(ConnectionConfig::default());
        client
            .attach(Session::new(client_end, Duration::from_secs(5)))
            .await
            .unwrap();
        client
    })
}

fn bench_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut client = setup_client(&rt);

    let mut group = c.benchmark_group("round_trip");
    group.throughput(Throughput::Elements(1));

    group.bench_function("ping", |b| {
        b.iter(|| rt.block_on(async { black_box(client.ping().await.unwrap()) }));
    });

    group.bench_function("select_by_id", |b| {
        b.iter(|| {
            rt.block_on(async {
                black_box(
                    client
                        .select(512u32, 0u32, 1, SelectOptions::new())
                        .await
                        .unwrap(),
                )
            })
        });
    });

    group.finish();
}

criterion_group!(benches, bench_round_trip);
criterion_main!(benches);
