use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use vigia::core::TopologyHandle;
use vigia::{Vigia, VigiaConfig};

const POLL: Duration = Duration::from_millis(100);

/// Fake sentinel answering every query with whatever `reply` holds
struct FakeSentinel {
    addr: SocketAddr,
    reply: Arc<Mutex<Vec<u8>>>,
}

impl FakeSentinel {
    async fn start(initial: Vec<u8>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let reply = Arc::new(Mutex::new(initial));
        let shared = Arc::clone(&reply);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let shared = Arc::clone(&shared);
                tokio::spawn(async move {
                    let (reader, mut writer) = stream.into_split();
                    let mut query = String::new();
                    if BufReader::new(reader).read_line(&mut query).await.is_err() {
                        return;
                    }
                    let answer = shared.lock().unwrap().clone();
                    let _ = writer.write_all(&answer).await;
                });
            }
        });

        Self { addr, reply }
    }

    fn point_at(&self, primary: SocketAddr) {
        *self.reply.lock().unwrap() = sentinel_reply(primary);
    }

    fn answer_raw(&self, raw: &[u8]) {
        *self.reply.lock().unwrap() = raw.to_vec();
    }
}

fn sentinel_reply(primary: SocketAddr) -> Vec<u8> {
    let host = primary.ip().to_string();
    let port = primary.port().to_string();
    format!(
        "*2\r\n${}\r\n{}\r\n${}\r\n{}\r\n",
        host.len(),
        host,
        port.len(),
        port
    )
    .into_bytes()
}

/// Primary that greets every connection with `tag` and then echoes
async fn spawn_primary(tag: &'static [u8]) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                if stream.write_all(tag).await.is_err() {
                    return;
                }
                let (mut reader, mut writer) = stream.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });
    addr
}

async fn start_relay(sentinel: &FakeSentinel) -> (SocketAddr, TopologyHandle, CancellationToken) {
    let mut config = VigiaConfig::new(
        "127.0.0.1:0".to_string(),
        sentinel.addr.to_string(),
        "mymaster".to_string(),
    )
    .unwrap()
    .with_poll_interval(POLL);
    config.sentinel_timeout = Duration::from_millis(80);
    config.probe_timeout = Duration::from_millis(80);

    let vigia = Vigia::bind(config).await.unwrap();
    let addr = vigia.local_addr().unwrap();
    let topology = vigia.topology();
    let shutdown = vigia.shutdown_token();
    tokio::spawn(vigia.run());
    (addr, topology, shutdown)
}

async fn wait_for_primary(topology: &TopologyHandle, expected: SocketAddr) {
    let expected = expected.to_string();
    timeout(Duration::from_secs(3), async {
        loop {
            if let Some(current) = topology.snapshot().await {
                if current.primary.to_string() == expected {
                    return;
                }
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("primary was never published");
}

async fn connect_and_greet(relay: SocketAddr, tag_len: usize) -> (TcpStream, Vec<u8>) {
    let mut client = TcpStream::connect(relay).await.unwrap();
    let mut greeting = vec![0u8; tag_len];
    timeout(Duration::from_secs(2), client.read_exact(&mut greeting))
        .await
        .unwrap()
        .unwrap();
    (client, greeting)
}

async fn assert_closed(client: &mut TcpStream, within: Duration) {
    let mut buf = [0u8; 16];
    let n = timeout(within, client.read(&mut buf))
        .await
        .expect("connection was not closed in time")
        .unwrap_or(0);
    assert_eq!(n, 0);
}

#[tokio::test]
async fn test_failover_drops_old_sessions_and_routes_new_ones() {
    let primary_a = spawn_primary(b"AAAA").await;
    let primary_b = spawn_primary(b"BBBB").await;
    let sentinel = FakeSentinel::start(sentinel_reply(primary_a)).await;
    let (relay, topology, shutdown) = start_relay(&sentinel).await;

    wait_for_primary(&topology, primary_a).await;
    let (mut old_client, greeting) = connect_and_greet(relay, 4).await;
    assert_eq!(greeting, b"AAAA");

    sentinel.point_at(primary_b);
    wait_for_primary(&topology, primary_b).await;

    // The old session must not outlive its generation by more than a poll
    assert_closed(&mut old_client, POLL * 2).await;

    let (_new_client, greeting) = connect_and_greet(relay, 4).await;
    assert_eq!(greeting, b"BBBB");

    shutdown.cancel();
}

#[tokio::test]
async fn test_relay_is_transparent_end_to_end() {
    let primary = spawn_primary(b"OK").await;
    let sentinel = FakeSentinel::start(sentinel_reply(primary)).await;
    let (relay, topology, shutdown) = start_relay(&sentinel).await;
    wait_for_primary(&topology, primary).await;

    let (mut client, greeting) = connect_and_greet(relay, 2).await;
    assert_eq!(greeting, b"OK");

    // Every byte value, including CR/LF and NUL, comes back untouched
    let payload: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
    let (mut reader, mut writer) = client.split();
    let send = async {
        writer.write_all(&payload).await.unwrap();
    };
    let mut echoed = vec![0u8; payload.len()];
    let receive = async {
        reader.read_exact(&mut echoed).await.unwrap();
    };
    timeout(Duration::from_secs(5), async { tokio::join!(send, receive) })
        .await
        .unwrap();
    assert_eq!(echoed, payload);

    shutdown.cancel();
}

#[tokio::test]
async fn test_malformed_reply_keeps_current_primary() {
    let primary = spawn_primary(b"AAAA").await;
    let sentinel = FakeSentinel::start(sentinel_reply(primary)).await;
    let (relay, topology, shutdown) = start_relay(&sentinel).await;
    wait_for_primary(&topology, primary).await;
    let generation = topology.snapshot().await.unwrap().generation();

    let (mut client, _) = connect_and_greet(relay, 4).await;

    sentinel.answer_raw(b"*-1\r\n");
    sleep(POLL * 4).await;

    let current = topology.snapshot().await.unwrap();
    assert_eq!(current.generation(), generation);
    assert!(!current.epoch.is_closed());

    // Existing session is still relaying
    client.write_all(b"ping").await.unwrap();
    let mut buf = [0u8; 4];
    timeout(Duration::from_secs(2), client.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf, b"ping");

    // And new clients still land on the same primary
    let (_other, greeting) = connect_and_greet(relay, 4).await;
    assert_eq!(greeting, b"AAAA");

    shutdown.cancel();
}

#[tokio::test]
async fn test_unreachable_primary_closes_client() {
    let dead = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let sentinel = FakeSentinel::start(sentinel_reply(dead)).await;
    let (relay, topology, shutdown) = start_relay(&sentinel).await;

    // The probe fails, but the address is published anyway
    wait_for_primary(&topology, dead).await;

    let mut client = TcpStream::connect(relay).await.unwrap();
    assert_closed(&mut client, Duration::from_secs(2)).await;

    shutdown.cancel();
}

#[tokio::test]
async fn test_shutdown_closes_live_sessions() {
    let primary = spawn_primary(b"AAAA").await;
    let sentinel = FakeSentinel::start(sentinel_reply(primary)).await;
    let (relay, topology, shutdown) = start_relay(&sentinel).await;
    wait_for_primary(&topology, primary).await;

    let (mut client, _) = connect_and_greet(relay, 4).await;
    shutdown.cancel();

    assert_closed(&mut client, Duration::from_secs(2)).await;
}
