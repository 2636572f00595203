#![cfg(unix)]

use std::io::Read;
use std::net::TcpStream;
use std::time::{Duration, Instant};

use wasock::Descriptor;
use wasock::poll::{self, ClockId, ClockSubscription, EventKind, Subscription};
use wasock::sys::{Host, UnixHost};
use wasock::sys::abi;
use wasock::{net, time};

fn socket_pair() -> (Descriptor, Descriptor) {
    let mut fds = [0; 2];
    let rc = unsafe { libc::socketpair(libc::AF_UNIX, libc::SOCK_STREAM, 0, fds.as_mut_ptr()) };
    assert_eq!(rc, 0, "socketpair failed");

    (Descriptor::new(fds[0] as u32), Descriptor::new(fds[1] as u32))
}

#[test]
fn send_and_receive_over_socket_pair() {
    let mut host = UnixHost;
    let (left, right) = socket_pair();

    assert_eq!(net::send_raw(&mut host, left, b"hello", 5), Ok(5));

    let (data, n) = net::receive(&mut host, right, 5).unwrap();
    assert_eq!(n, 5);
    assert_eq!(data, b"hello");

    net::close(&mut host, left).unwrap();
    let _ = net::close(&mut host, right);
}

#[test]
fn empty_shutdown_is_rejected() {
    let mut host = UnixHost;
    let (left, right) = socket_pair();

    let err = net::shutdown(&mut host, left, &[]).unwrap_err();
    assert_eq!(err.code(), abi::ERRNO_INVAL);

    // The hint after a send is rejected the same way without failing the send.
    assert_eq!(net::send(&mut host, left, "hint"), Ok(4));

    net::close(&mut host, left).unwrap();
    let _ = net::close(&mut host, right);
}

#[test]
fn poll_reports_readable_bytes() {
    let mut host = UnixHost;
    let (left, right) = socket_pair();

    net::send_raw(&mut host, left, b"abc", 3).unwrap();

    let events = poll::poll_oneoff(
        &mut host,
        &[
            Subscription::fd_read(11, right),
            Subscription::clock(12, ClockSubscription::relative(ClockId::Monotonic, 1_000_000_000)),
        ],
    )
    .unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].userdata, 11);
    match events[0].kind {
        EventKind::FdRead(readiness) => assert_eq!(readiness.nbytes, 3),
        other => panic!("expected a read event, got {other:?}"),
    }

    net::close(&mut host, left).unwrap();
    let _ = net::close(&mut host, right);
}

#[cfg(target_os = "linux")]
#[test]
fn poll_reports_hangup() {
    let mut host = UnixHost;
    let (left, right) = socket_pair();

    net::close(&mut host, left).unwrap();

    let events = poll::poll_oneoff(&mut host, &[Subscription::fd_read(1, right)]).unwrap();
    assert_eq!(events.len(), 1);
    assert!(events[0].is_hangup());

    let _ = net::close(&mut host, right);
}

#[test]
fn sleep_blocks_for_the_duration() {
    let mut host = UnixHost;
    let started = Instant::now();

    time::try_sleep(&mut host, 20).unwrap();

    assert!(started.elapsed() >= Duration::from_millis(20));
}

#[test]
fn listener_accepts_connections() {
    let mut host = UnixHost;
    let listener = UnixHost::listen("127.0.0.1:0").unwrap();
    let address = UnixHost::local_addr(listener).unwrap();

    let err = net::accept(&mut host, listener).unwrap_err();
    assert!(err.is_would_block());

    let mut peer = TcpStream::connect(address).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    let accepted = loop {
        match net::accept(&mut host, listener) {
            Ok(fd) => break fd,
            Err(err) if err.is_would_block() && Instant::now() < deadline => {
                time::sleep(&mut host, 1)
            }
            Err(err) => panic!("accept failed: {err}"),
        }
    };

    net::send_raw(&mut host, accepted, b"hi", 2).unwrap();

    let mut buffer = [0u8; 2];
    peer.read_exact(&mut buffer).unwrap();
    assert_eq!(&buffer, b"hi");

    // Accepted sockets are non-blocking.
    let err = net::receive(&mut host, accepted, 8).unwrap_err();
    assert!(err.is_would_block());

    net::close(&mut host, accepted).unwrap();

    // A listening socket is not connected, so only release it.
    assert_eq!(host.fd_close(listener.raw()), abi::ERRNO_SUCCESS);
}

#[test]
fn unknown_descriptor_is_bad() {
    let mut host = UnixHost;

    let err = net::flush(&mut host, Descriptor::new(i32::MAX as u32)).unwrap_err();
    assert_eq!(err.code(), abi::ERRNO_BADF);
}
