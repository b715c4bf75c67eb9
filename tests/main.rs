//! End-to-end tests: each test boots a real server on loopback and drives it
//! with a scripted FTP client over plain TCP.

use featherftp::{
    options::{Config, UserAccount},
    Server,
};
use pretty_assertions::assert_eq;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{
    tcp::{OwnedReadHalf, OwnedWriteHalf},
    TcpStream,
};

static TESTPORT: AtomicU16 = AtomicU16::new(21210);

struct Harness {
    root: PathBuf,
    _tempdir: tempfile::TempDir,
    addr: String,
}

async fn harness() -> Harness {
    harness_with(|_| {}).await
}

async fn harness_with<F>(customize: F) -> Harness
where
    F: FnOnce(&mut Config),
{
    let port = TESTPORT.fetch_add(1, Ordering::Relaxed);
    let addr = format!("127.0.0.1:{}", port);
    let tempdir = tempfile::TempDir::new().unwrap();
    let root = tempdir.path().to_path_buf();

    let mut config = Config::default();
    config.bind_addr = addr.parse().unwrap();
    config.passive_ports = 50100..=50199;
    config.users.push(UserAccount {
        name: "admin".to_string(),
        password: Some("admin123".to_string()),
        home: root.clone(),
        ownership_override: None,
        read_only: false,
    });
    customize(&mut config);

    tokio::spawn(Server::new(config).listen());
    while TcpStream::connect(&addr).await.is_err() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    // Let the probe connection's session die down before tests count sessions.
    tokio::time::sleep(Duration::from_millis(50)).await;

    Harness {
        root,
        _tempdir: tempdir,
        addr,
    }
}

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    /// Connect and consume the 220 greeting.
    async fn connect(addr: &str) -> Client {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, write_half) = stream.into_split();
        let mut client = Client {
            reader: BufReader::new(read_half),
            writer: write_half,
        };
        client.expect("220").await;
        client
    }

    /// Read one (possibly multi-line) reply and assert its code.
    async fn expect(&mut self, code: &str) -> String {
        let reply = self.read_reply().await.expect("connection closed while expecting a reply");
        assert!(
            reply.starts_with(code),
            "expected reply {} but got: {}",
            code,
            reply.trim_end()
        );
        reply
    }

    /// Read one reply, or `None` on a closed connection.
    async fn read_reply(&mut self) -> Option<String> {
        let mut reply = String::new();
        let mut code: Option<String> = None;
        loop {
            let mut line = String::new();
            let n = tokio::time::timeout(Duration::from_secs(5), self.reader.read_line(&mut line))
                .await
                .expect("timed out waiting for a reply")
                .unwrap();
            if n == 0 {
                return if reply.is_empty() { None } else { Some(reply) };
            }
            reply.push_str(&line);
            match &code {
                None => {
                    // First line: "xyz text" ends the reply, "xyz-text" opens
                    // a multi-line one terminated by "xyz text".
                    if line.len() < 4 || line.as_bytes()[3] != b'-' {
                        return Some(reply);
                    }
                    code = Some(line[..3].to_string());
                }
                Some(code) => {
                    if line.starts_with(code.as_str()) && line.as_bytes().get(3) == Some(&b' ') {
                        return Some(reply);
                    }
                }
            }
        }
    }

    async fn send(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\r\n").await.unwrap();
    }

    async fn cmd(&mut self, line: &str, code: &str) -> String {
        self.send(line).await;
        self.expect(code).await
    }

    async fn login(&mut self) {
        self.cmd("USER admin", "331").await;
        self.cmd("PASS admin123", "230").await;
    }

    /// Issue PASV and parse the advertised address.
    async fn pasv(&mut self) -> SocketAddr {
        let reply = self.cmd("PASV", "227").await;
        let open = reply.find('(').unwrap();
        let close = reply.find(')').unwrap();
        let numbers: Vec<u16> = reply[open + 1..close].split(',').map(|n| n.trim().parse().unwrap()).collect();
        assert_eq!(numbers.len(), 6);
        let port = numbers[4] * 256 + numbers[5];
        format!("{}.{}.{}.{}:{}", numbers[0], numbers[1], numbers[2], numbers[3], port)
            .parse()
            .unwrap()
    }

    /// Expect the server to close the connection without further replies.
    async fn expect_eof(&mut self) {
        let mut buf = [0u8; 64];
        let n = tokio::time::timeout(Duration::from_secs(5), self.reader.read(&mut buf))
            .await
            .expect("timed out waiting for close")
            .unwrap();
        assert_eq!(n, 0, "expected the server to close the connection");
    }
}

async fn read_all(data: &mut TcpStream) -> Vec<u8> {
    let mut out = Vec::new();
    data.read_to_end(&mut out).await.unwrap();
    out
}

#[tokio::test]
async fn greeting_and_login() {
    let harness = harness().await;
    let mut client = Client::connect(&harness.addr).await;
    client.cmd("USER admin", "331").await;
    client.cmd("PASS admin123", "230").await;
    client.cmd("QUIT", "221").await;
}

#[tokio::test]
async fn commands_require_login() {
    let harness = harness().await;
    let mut client = Client::connect(&harness.addr).await;
    client.cmd("PWD", "530").await;
    client.cmd("PASV", "530").await;
    // Session-level commands still work.
    client.cmd("NOOP", "200").await;
    client.cmd("SYST", "215").await;
}

#[tokio::test]
async fn pass_without_user_is_bad_sequence() {
    let harness = harness().await;
    let mut client = Client::connect(&harness.addr).await;
    client.cmd("PASS admin123", "503").await;
}

#[tokio::test]
async fn feat_lists_extensions() {
    let harness = harness().await;
    let mut client = Client::connect(&harness.addr).await;
    let reply = client.cmd("FEAT", "211").await;
    for feature in ["EPSV", "EPRT", "MLSD", "SIZE", "MDTM", "REST STREAM", "UTF8"] {
        assert!(reply.contains(feature), "FEAT reply misses {}: {}", feature, reply);
    }
}

#[tokio::test]
async fn navigation_and_mkd() {
    let harness = harness().await;
    let mut client = Client::connect(&harness.addr).await;
    client.login().await;
    let reply = client.cmd("PWD", "257").await;
    assert!(reply.contains("\"/\""));
    client.cmd("MKD reports", "257").await;
    client.cmd("CWD reports", "250").await;
    let reply = client.cmd("PWD", "257").await;
    assert!(reply.contains("\"/reports\""));
    client.cmd("CDUP", "250").await;
    let reply = client.cmd("PWD", "257").await;
    assert!(reply.contains("\"/\""));
    client.cmd("CWD nosuchdir", "550").await;
}

#[tokio::test]
async fn stor_then_retr_roundtrip_is_byte_identical() {
    let harness = harness().await;
    let mut client = Client::connect(&harness.addr).await;
    client.login().await;
    client.cmd("TYPE I", "200").await;

    let payload: Vec<u8> = (0..=255u8).cycle().take(70_000).chain(b"\r\nmixed\nendings\r".iter().copied()).collect();

    let data_addr = client.pasv().await;
    let mut data = TcpStream::connect(data_addr).await.unwrap();
    client.cmd("STOR blob.bin", "150").await;
    data.write_all(&payload).await.unwrap();
    data.shutdown().await.unwrap();
    drop(data);
    client.expect("226").await;

    let data_addr = client.pasv().await;
    let mut data = TcpStream::connect(data_addr).await.unwrap();
    client.cmd("RETR blob.bin", "150").await;
    let echoed = read_all(&mut data).await;
    client.expect("226").await;
    assert_eq!(echoed, payload);
}

#[tokio::test]
async fn rest_streams_the_tail_and_is_one_shot() {
    let harness = harness().await;
    std::fs::write(harness.root.join("hello.txt"), b"hello world").unwrap();
    let mut client = Client::connect(&harness.addr).await;
    client.login().await;
    client.cmd("TYPE I", "200").await;

    let data_addr = client.pasv().await;
    let mut data = TcpStream::connect(data_addr).await.unwrap();
    client.cmd("REST 6", "350").await;
    client.cmd("RETR hello.txt", "150").await;
    assert_eq!(read_all(&mut data).await, b"world");
    client.expect("226").await;

    // The offset was consumed: a bare RETR streams from byte zero.
    let data_addr = client.pasv().await;
    let mut data = TcpStream::connect(data_addr).await.unwrap();
    client.cmd("RETR hello.txt", "150").await;
    assert_eq!(read_all(&mut data).await, b"hello world");
    client.expect("226").await;
}

#[tokio::test]
async fn rest_is_cleared_by_unrelated_commands() {
    let harness = harness().await;
    std::fs::write(harness.root.join("hello.txt"), b"hello world").unwrap();
    let mut client = Client::connect(&harness.addr).await;
    client.login().await;

    let data_addr = client.pasv().await;
    let mut data = TcpStream::connect(data_addr).await.unwrap();
    client.cmd("REST 6", "350").await;
    client.cmd("NOOP", "200").await;
    client.cmd("RETR hello.txt", "150").await;
    assert_eq!(read_all(&mut data).await, b"hello world");
    client.expect("226").await;
}

#[tokio::test]
async fn size_mdtm_and_dele() {
    let harness = harness().await;
    std::fs::write(harness.root.join("hello.txt"), b"hello world").unwrap();
    let mut client = Client::connect(&harness.addr).await;
    client.login().await;
    let reply = client.cmd("SIZE hello.txt", "213").await;
    assert!(reply.contains("11"));
    let reply = client.cmd("MDTM hello.txt", "213").await;
    // 213 SP YYYYMMDDHHMMSS
    assert_eq!(reply.trim_end().len(), "213 ".len() + 14);
    client.cmd("DELE hello.txt", "250").await;
    client.cmd("SIZE hello.txt", "550").await;
}

#[tokio::test]
async fn path_escape_is_invisible() {
    let harness = harness().await;
    let mut client = Client::connect(&harness.addr).await;
    client.login().await;
    client.cmd("RETR ../../etc/passwd", "550").await;
    client.cmd("SIZE ../../../etc/passwd", "550").await;
}

#[tokio::test]
async fn rename_pair_and_interrupted_rename() {
    let harness = harness().await;
    std::fs::write(harness.root.join("old.txt"), b"x").unwrap();
    let mut client = Client::connect(&harness.addr).await;
    client.login().await;

    client.cmd("RNFR old.txt", "350").await;
    client.cmd("RNTO new.txt", "250").await;
    assert!(harness.root.join("new.txt").exists());
    assert!(!harness.root.join("old.txt").exists());

    // Anything between RNFR and RNTO disarms the rename.
    client.cmd("RNFR new.txt", "350").await;
    client.cmd("CWD /", "250").await;
    client.cmd("RNTO other.txt", "503").await;

    client.cmd("RNTO lonely.txt", "503").await;
    client.cmd("RNFR missing.txt", "550").await;
}

#[tokio::test]
async fn list_has_totals_line_and_entry() {
    let harness = harness().await;
    std::fs::write(harness.root.join("hello.txt"), b"hello world").unwrap();
    let mut client = Client::connect(&harness.addr).await;
    client.login().await;

    let data_addr = client.pasv().await;
    let mut data = TcpStream::connect(data_addr).await.unwrap();
    client.cmd("LIST", "150").await;
    let listing = String::from_utf8(read_all(&mut data).await).unwrap();
    client.expect("226").await;
    assert!(listing.starts_with("total "), "no totals line: {}", listing);
    let entry = listing
        .lines()
        .find(|l| l.ends_with("hello.txt"))
        .unwrap_or_else(|| panic!("no hello.txt entry in: {}", listing));
    assert!(entry.starts_with('-'));
    assert!(entry.contains(" 11 "));
}

#[tokio::test]
async fn nlst_returns_bare_names() {
    let harness = harness().await;
    std::fs::write(harness.root.join("hello.txt"), b"hello world").unwrap();
    let mut client = Client::connect(&harness.addr).await;
    client.login().await;

    let data_addr = client.pasv().await;
    let mut data = TcpStream::connect(data_addr).await.unwrap();
    client.cmd("NLST", "150").await;
    let listing = String::from_utf8(read_all(&mut data).await).unwrap();
    client.expect("226").await;
    assert_eq!(listing, "hello.txt\r\n");
}

#[tokio::test]
async fn mlsd_emits_machine_facts() {
    let harness = harness().await;
    std::fs::write(harness.root.join("hello.txt"), b"hello world").unwrap();
    let mut client = Client::connect(&harness.addr).await;
    client.login().await;

    let data_addr = client.pasv().await;
    let mut data = TcpStream::connect(data_addr).await.unwrap();
    client.cmd("MLSD", "150").await;
    let listing = String::from_utf8(read_all(&mut data).await).unwrap();
    client.expect("226").await;
    assert!(listing.contains("type=cdir;"));
    let entry = listing.lines().find(|l| l.ends_with(" hello.txt")).unwrap();
    assert!(entry.contains("type=file;size=11;modify="));
}

#[tokio::test]
async fn epsv_works_for_transfers() {
    let harness = harness().await;
    std::fs::write(harness.root.join("hello.txt"), b"hello world").unwrap();
    let mut client = Client::connect(&harness.addr).await;
    client.login().await;

    let reply = client.cmd("EPSV", "229").await;
    let open = reply.find("(|||").unwrap();
    let close = reply[open..].find("|)").unwrap() + open;
    let port: u16 = reply[open + 4..close].parse().unwrap();
    let mut data = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    client.cmd("RETR hello.txt", "150").await;
    assert_eq!(read_all(&mut data).await, b"hello world");
    client.expect("226").await;
}

#[tokio::test]
async fn ascii_mode_translates_line_endings() {
    let harness = harness().await;
    let mut client = Client::connect(&harness.addr).await;
    client.login().await;
    client.cmd("TYPE A", "200").await;

    let data_addr = client.pasv().await;
    let mut data = TcpStream::connect(data_addr).await.unwrap();
    client.cmd("STOR notes.txt", "150").await;
    data.write_all(b"one\r\ntwo\r\n").await.unwrap();
    data.shutdown().await.unwrap();
    drop(data);
    client.expect("226").await;
    assert_eq!(std::fs::read(harness.root.join("notes.txt")).unwrap(), b"one\ntwo\n");

    let data_addr = client.pasv().await;
    let mut data = TcpStream::connect(data_addr).await.unwrap();
    client.cmd("RETR notes.txt", "150").await;
    assert_eq!(read_all(&mut data).await, b"one\r\ntwo\r\n");
    client.expect("226").await;
}

#[tokio::test]
async fn stou_synthesizes_a_unique_name() {
    let harness = harness().await;
    let mut client = Client::connect(&harness.addr).await;
    client.login().await;

    let data_addr = client.pasv().await;
    let mut data = TcpStream::connect(data_addr).await.unwrap();
    let reply = client.cmd("STOU", "150").await;
    let name = reply.trim_end().rsplit(' ').next().unwrap().to_string();
    data.write_all(b"unique content").await.unwrap();
    data.shutdown().await.unwrap();
    drop(data);
    client.expect("226").await;
    assert_eq!(std::fs::read(harness.root.join(&name)).unwrap(), b"unique content");
}

#[tokio::test]
async fn abor_interrupts_a_stalled_upload() {
    let harness = harness().await;
    let mut client = Client::connect(&harness.addr).await;
    client.login().await;

    let data_addr = client.pasv().await;
    let mut data = TcpStream::connect(data_addr).await.unwrap();
    client.cmd("STOR stalled.bin", "150").await;
    data.write_all(b"partial").await.unwrap();
    // Keep the data connection open so the worker blocks in read.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let started = std::time::Instant::now();
    client.cmd("ABOR", "426").await;
    client.expect("226").await;
    assert!(started.elapsed() < Duration::from_secs(1), "ABOR took too long");
    drop(data);

    // The session is still usable.
    client.cmd("NOOP", "200").await;
}

#[tokio::test]
async fn abor_without_transfer_is_fine() {
    let harness = harness().await;
    let mut client = Client::connect(&harness.addr).await;
    client.login().await;
    client.cmd("ABOR", "226").await;
}

#[tokio::test]
async fn bruteforce_lockout_closes_and_blocks() {
    let harness = harness().await;
    let mut client = Client::connect(&harness.addr).await;
    client.cmd("USER admin", "331").await;
    client.cmd("PASS wrong1", "530").await;
    client.cmd("USER admin", "331").await;
    client.cmd("PASS wrong2", "530").await;
    client.cmd("USER admin", "331").await;
    // Third strike: 530, then the server hangs up.
    client.cmd("PASS wrong3", "530").await;
    client.expect_eof().await;

    // A fresh connection from the blocked address is dropped without a 220.
    let stream = TcpStream::connect(&harness.addr).await.unwrap();
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    let n = tokio::time::timeout(Duration::from_secs(5), reader.read_line(&mut line))
        .await
        .expect("timed out waiting for silent close")
        .unwrap();
    assert_eq!(n, 0, "blocked peer should get no greeting, got: {}", line);
}

#[tokio::test]
async fn per_ip_connection_cap_replies_421() {
    let harness = harness_with(|config| {
        config.max_sessions_per_ip = 1;
    })
    .await;
    let _first = Client::connect(&harness.addr).await;

    let stream = TcpStream::connect(&harness.addr).await.unwrap();
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    tokio::time::timeout(Duration::from_secs(5), reader.read_line(&mut line))
        .await
        .expect("timed out waiting for 421")
        .unwrap();
    assert!(line.starts_with("421"), "expected 421, got: {}", line);
}

#[tokio::test]
async fn read_only_users_cannot_mutate() {
    let harness = harness_with(|config| {
        for user in &mut config.users {
            user.read_only = true;
        }
    })
    .await;
    std::fs::write(harness.root.join("hello.txt"), b"hello world").unwrap();
    let mut client = Client::connect(&harness.addr).await;
    client.login().await;

    client.cmd("MKD sub", "550").await;
    client.cmd("DELE hello.txt", "550").await;
    client.cmd("RNFR hello.txt", "550").await;
    let data_addr = client.pasv().await;
    let _data = TcpStream::connect(data_addr).await.unwrap();
    client.cmd("STOR up.bin", "550").await;

    // Reading still works.
    let data_addr = client.pasv().await;
    let mut data = TcpStream::connect(data_addr).await.unwrap();
    client.cmd("RETR hello.txt", "150").await;
    assert_eq!(read_all(&mut data).await, b"hello world");
    client.expect("226").await;
}

#[tokio::test]
async fn oversize_command_line_closes_with_500() {
    let harness = harness().await;

    // Exactly at the cap: served normally (bad parameter, but alive).
    let mut client = Client::connect(&harness.addr).await;
    let mut line = String::from("NOOP ");
    line.push_str(&"x".repeat(4096 - line.len() - 2));
    client.cmd(&line, "501").await;
    client.cmd("NOOP", "200").await;

    // One byte over: 500 and hang up.
    let mut client = Client::connect(&harness.addr).await;
    let mut line = String::from("NOOP ");
    line.push_str(&"x".repeat(4096 - line.len() - 1));
    client.cmd(&line, "500").await;
    client.expect_eof().await;
}

#[tokio::test]
async fn idle_session_times_out_with_421() {
    let harness = harness_with(|config| {
        config.idle_timeout_secs = 1;
    })
    .await;
    let mut client = Client::connect(&harness.addr).await;
    client.expect("421").await;
    client.expect_eof().await;
}

#[tokio::test]
async fn transfer_commands_refused_while_transfer_runs() {
    let harness = harness().await;
    let mut client = Client::connect(&harness.addr).await;
    client.login().await;

    let data_addr = client.pasv().await;
    let mut data = TcpStream::connect(data_addr).await.unwrap();
    client.cmd("STOR busy.bin", "150").await;
    data.write_all(b"stall").await.unwrap();

    client.cmd("PASV", "425").await;
    client.cmd("NOOP", "200").await;

    data.shutdown().await.unwrap();
    drop(data);
    client.expect("226").await;
}
