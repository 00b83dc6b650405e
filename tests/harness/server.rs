//! Single-connection WebSocket server running on a std thread.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::BytesMut;
use rswc::protocol::compute_accept_key;
use rswc::{CloseCode, Frame, Limits, OpCode};

/// How long the server waits on a silent client before giving up.
const IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// What the server does with its one connection.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Accept the upgrade, echo data frames, answer pings and close frames.
    Echo,
    /// Like `Echo`, but never answer a close frame.
    EchoIgnoreClose,
    /// Like `Echo`, but answer a close frame by starting a 16-byte binary
    /// frame and then sending one payload byte per second.
    EchoTrickleOnClose,
    /// Accept the upgrade and send a text frame in the same write.
    Greet(&'static str),
    /// Send this raw response head, then wait for the client to hang up.
    Respond(String),
}

/// A frame as the server received it.
#[derive(Debug, Clone)]
pub struct Received {
    pub opcode: OpCode,
    pub masked: bool,
    pub status: Option<CloseCode>,
    pub payload: Vec<u8>,
}

/// Everything the server observed on its connection.
#[derive(Debug, Default)]
pub struct Report {
    /// The raw request head.
    pub request: String,
    /// Frames received, in order.
    pub frames: Vec<Received>,
    /// The client released the connection before the idle timeout.
    pub client_hung_up: bool,
}

impl Report {
    /// Value of request header `name`, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
        })
    }
}

pub struct TestServer {
    addr: SocketAddr,
    reports: Receiver<Report>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    /// Start a plain TCP server.
    pub fn spawn(behavior: Behavior) -> Self {
        Self::spawn_with(behavior, |tcp, behavior, tx| serve(tcp, behavior, tx))
    }

    /// Start a server whose accepted sockets are handed to `handler`.
    pub fn spawn_with<F>(behavior: Behavior, handler: F) -> Self
    where
        F: FnOnce(TcpStream, Behavior, Sender<Report>) + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server");
        let addr = listener.local_addr().expect("local addr");
        let (tx, reports) = mpsc::channel();

        let handle = thread::spawn(move || {
            if let Ok((tcp, _)) = listener.accept() {
                tcp.set_read_timeout(Some(IDLE_TIMEOUT)).ok();
                handler(tcp, behavior, tx);
            }
        });

        Self {
            addr,
            reports,
            handle: Some(handle),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// `scheme://127.0.0.1:port` followed by `path`.
    pub fn url(&self, scheme: &str, path: &str) -> String {
        format!("{scheme}://{}{path}", self.addr)
    }

    /// Wait for the server to finish and return its report.
    pub fn report(mut self) -> Report {
        let report = self
            .reports
            .recv_timeout(IDLE_TIMEOUT * 2)
            .expect("server report");
        if let Some(handle) = self.handle.take() {
            handle.join().expect("server thread panicked");
        }
        report
    }
}

/// Play `behavior` over an accepted stream and send the report to `tx`.
pub fn serve<S: Read + Write>(stream: S, behavior: Behavior, tx: Sender<Report>) {
    let mut report = Report::default();
    let mut reader = BufReader::new(stream);

    match read_request(&mut reader) {
        Some(request) => report.request = request,
        None => {
            tx.send(report).ok();
            return;
        }
    }
    let key = report.header("sec-websocket-key").unwrap_or_default().to_string();

    let on_close = match &behavior {
        Behavior::Respond(head) => {
            reader.get_mut().write_all(head.as_bytes()).ok();
            reader.get_mut().flush().ok();
            report.client_hung_up = wait_for_hangup(&mut reader);
            tx.send(report).ok();
            return;
        }
        Behavior::Greet(text) => {
            let mut out = switching_protocols(&key).into_bytes();
            let mut frame = BytesMut::new();
            Frame::text(text).encode(&mut frame, None);
            out.extend_from_slice(&frame);
            reader.get_mut().write_all(&out).ok();
            CloseReply::Answer
        }
        Behavior::Echo => {
            reader.get_mut().write_all(switching_protocols(&key).as_bytes()).ok();
            CloseReply::Answer
        }
        Behavior::EchoIgnoreClose => {
            reader.get_mut().write_all(switching_protocols(&key).as_bytes()).ok();
            CloseReply::Ignore
        }
        Behavior::EchoTrickleOnClose => {
            reader.get_mut().write_all(switching_protocols(&key).as_bytes()).ok();
            CloseReply::Trickle
        }
    };
    reader.get_mut().flush().ok();

    let limits = Limits::default();
    loop {
        let mut frame = Frame::default();
        if frame.read_from(&mut reader, &limits).is_err() {
            report.client_hung_up = true;
            break;
        }
        report.frames.push(Received {
            opcode: frame.opcode,
            masked: frame.is_masked(),
            status: frame.status(),
            payload: frame.payload().to_vec(),
        });

        let reply = match frame.opcode {
            OpCode::Close => {
                report.client_hung_up = match on_close {
                    CloseReply::Answer => {
                        send(&mut reader, &Frame::close(Some(CloseCode::Normal)));
                        wait_for_hangup(&mut reader)
                    }
                    CloseReply::Ignore => wait_for_hangup(&mut reader),
                    CloseReply::Trickle => trickle_frame(reader.get_mut(), 16),
                };
                break;
            }
            OpCode::Ping => Frame::pong(frame.payload()),
            OpCode::Pong => continue,
            opcode => Frame::new(true, opcode, frame.payload()),
        };
        send(&mut reader, &reply);
    }

    tx.send(report).ok();
}

enum CloseReply {
    Answer,
    Ignore,
    Trickle,
}

/// Send the header of a `len`-byte binary frame, then its payload one byte
/// per second. Returns `true` once a write fails because the client left.
fn trickle_frame<W: Write>(stream: &mut W, len: u8) -> bool {
    if stream.write_all(&[0x82, len]).and_then(|()| stream.flush()).is_err() {
        return true;
    }
    for _ in 0..len {
        thread::sleep(Duration::from_secs(1));
        if stream.write_all(&[0]).and_then(|()| stream.flush()).is_err() {
            return true;
        }
    }
    false
}

fn switching_protocols(key: &str) -> String {
    format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n\r\n",
        compute_accept_key(key)
    )
}

fn read_request<R: BufRead>(reader: &mut R) -> Option<String> {
    let mut head = String::new();
    loop {
        let n = reader.read_line(&mut head).ok()?;
        if n == 0 {
            return None;
        }
        if head.ends_with("\r\n\r\n") {
            return Some(head);
        }
    }
}

fn send<S: Read + Write>(reader: &mut BufReader<S>, frame: &Frame) {
    let mut buf = BytesMut::new();
    frame.encode(&mut buf, None);
    let stream = reader.get_mut();
    stream.write_all(&buf).ok();
    stream.flush().ok();
}

/// Block until the client releases the connection. `false` on idle timeout.
fn wait_for_hangup<R: Read>(reader: &mut R) -> bool {
    let mut sink = [0u8; 256];
    loop {
        match reader.read(&mut sink) {
            Ok(0) => return true,
            Ok(_) => continue,
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                return false;
            }
            // reset or TLS teardown without close_notify
            Err(_) => return true,
        }
    }
}
