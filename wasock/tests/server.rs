mod common;

use common::{Call, MockHost};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::rc::Rc;
use wasock::sys::abi;
use wasock::{Client, Descriptor, Server, ServerBuilder};

type Log<T> = Rc<RefCell<Vec<T>>>;

fn client(fd: u32) -> Client {
    Client::new(Descriptor::new(fd))
}

fn server(host: MockHost) -> Server<MockHost> {
    ServerBuilder::new().build_with(host)
}

fn record_connections(server: &mut Server<MockHost>) -> Log<Client> {
    let log: Log<Client> = Rc::default();
    let sink = log.clone();
    server.on_connected(move |_, client| sink.borrow_mut().push(client));
    log
}

fn record_disconnections(server: &mut Server<MockHost>) -> Log<Client> {
    let log: Log<Client> = Rc::default();
    let sink = log.clone();
    server.on_disconnected(move |_, client| sink.borrow_mut().push(client));
    log
}

fn record_messages(server: &mut Server<MockHost>) -> Log<(Client, String)> {
    let log: Log<(Client, String)> = Rc::default();
    let sink = log.clone();
    server.on_receive(move |_, client, message| {
        sink.borrow_mut().push((client, message.to_owned()))
    });
    log
}

#[test]
fn listener_is_first_preopened_descriptor() {
    assert_eq!(server(MockHost::new()).listener(), Descriptor::new(3));

    let offset = ServerBuilder::new()
        .listen_offset(2)
        .build_with(MockHost::new());
    assert_eq!(offset.listener(), Descriptor::new(5));
}

#[test]
fn idle_when_not_listening() {
    let mut server = server(MockHost::new().accepting(7));
    let connected = record_connections(&mut server);

    server.accept_client();

    assert!(!server.is_listening());
    assert!(server.host().calls.is_empty());
    assert_eq!(server.client_count(), 0);
    assert!(connected.borrow().is_empty());
}

#[test]
fn stop_halts_accepting() {
    let mut server = server(MockHost::new().accepting(7));

    server.start();
    server.stop();
    server.accept_client();

    assert!(server.host().calls.is_empty());
}

#[test]
fn accept_registers_and_announces() {
    let mut server = server(MockHost::new().accepting(7));
    let connected = record_connections(&mut server);

    server.start();
    server.accept_client();

    assert_eq!(server.clients(), vec![client(7)]);
    assert_eq!(*connected.borrow(), vec![client(7)]);
    assert_eq!(server.host().calls[0], Call::Accept { fd: 3, flags: 4 });
}

#[test]
fn failed_accept_still_services_clients() {
    let mut host = MockHost::new().accepting(7).receiving(b"hi");
    host.accepts.push_back(Err(abi::ERRNO_CONNABORTED));

    let mut server = server(host);
    let messages = record_messages(&mut server);
    server.start();

    server.accept_client();
    assert_eq!(*messages.borrow(), vec![(client(7), "hi".to_owned())]);

    server.host_mut().receives.push_back(Ok(b"again".to_vec()));
    server.accept_client();

    assert_eq!(server.client_count(), 1);
    assert_eq!(messages.borrow().len(), 2);
    assert_eq!(messages.borrow()[1].1, "again");
}

#[test]
fn chunks_are_accumulated_into_one_message() {
    let host = MockHost::new()
        .accepting(7)
        .receiving(b"He")
        .receiving(b"llo")
        .failing_receive(abi::ERRNO_AGAIN);

    let mut server = server(host);
    let messages = record_messages(&mut server);
    server.start();

    server.accept_client();

    assert_eq!(*messages.borrow(), vec![(client(7), "Hello".to_owned())]);
}

#[test]
fn empty_read_ends_a_message() {
    let host = MockHost::new()
        .accepting(7)
        .receiving(b"abc")
        .receiving(b"")
        .receiving(b"def");

    let mut server = server(host);
    let messages = record_messages(&mut server);
    server.start();

    server.accept_client();
    assert_eq!(*messages.borrow(), vec![(client(7), "abc".to_owned())]);

    server.accept_client();
    assert_eq!(messages.borrow()[1].1, "def");
}

#[test]
fn reads_use_configured_chunk_size() {
    let host = MockHost::new().accepting(7);
    let mut server = ServerBuilder::new().chunk_size(16).build_with(host);
    server.start();

    server.accept_client();

    let capacities: Vec<usize> = server
        .host()
        .calls
        .iter()
        .filter_map(|call| match call {
            Call::Recv { capacity, .. } => Some(*capacity),
            _ => None,
        })
        .collect();

    assert_eq!(capacities, vec![16]);
}

#[test]
fn no_callback_without_data() {
    let mut server = server(MockHost::new().accepting(7));
    let messages = record_messages(&mut server);
    server.start();

    server.accept_client();

    assert!(messages.borrow().is_empty());
}

#[test]
fn invalid_utf8_is_replaced() {
    let host = MockHost::new().accepting(7).receiving(&[b'o', b'k', 0xff]);

    let mut server = server(host);
    let messages = record_messages(&mut server);
    server.start();

    server.accept_client();

    assert_eq!(messages.borrow()[0].1, "ok\u{fffd}");
}

#[test]
fn receive_errors_keep_the_client_by_default() {
    let host = MockHost::new()
        .accepting(7)
        .receiving(b"partial")
        .failing_receive(abi::ERRNO_CONNRESET);

    let mut server = server(host);
    let messages = record_messages(&mut server);
    let disconnected = record_disconnections(&mut server);
    server.start();

    server.accept_client();

    assert_eq!(*messages.borrow(), vec![(client(7), "partial".to_owned())]);
    assert!(disconnected.borrow().is_empty());
    assert!(server.is_registered(client(7)));
    assert!(server.host().closes().is_empty());
}

#[test]
fn receive_errors_disconnect_when_configured() {
    let host = MockHost::new()
        .accepting(7)
        .failing_receive(abi::ERRNO_CONNRESET);

    let mut server = ServerBuilder::new()
        .disconnect_on_error(true)
        .evict_on_disconnect(true)
        .build_with(host);
    let disconnected = record_disconnections(&mut server);
    server.start();

    server.accept_client();

    assert_eq!(*disconnected.borrow(), vec![client(7)]);
    assert_eq!(server.client_count(), 0);
    assert_eq!(server.host().closes(), vec![7]);
}

#[test]
fn failed_client_is_closed_once() {
    let host = MockHost::new()
        .accepting(7)
        .failing_receive(abi::ERRNO_CONNRESET)
        .failing_receive(abi::ERRNO_BADF)
        .failing_receive(abi::ERRNO_BADF);

    let mut server = ServerBuilder::new()
        .disconnect_on_error(true)
        .build_with(host);
    let disconnected = record_disconnections(&mut server);
    server.start();

    for _ in 0..3 {
        server.accept_client();
    }

    assert_eq!(server.host().closes(), vec![7]);
    assert_eq!(*disconnected.borrow(), vec![client(7)]);
    assert!(!server.is_registered(client(7)));
    assert_eq!(
        server.host().count(|call| matches!(call, Call::Recv { .. })),
        1
    );
}

#[test]
fn unbounded_max_clients_builds() {
    let host = MockHost::new().accepting(7);
    let mut server = ServerBuilder::new()
        .max_clients(usize::MAX)
        .build_with(host);
    server.start();

    server.accept_client();

    assert_eq!(server.config().max_clients(), usize::MAX);
    assert_eq!(server.clients(), vec![client(7)]);
}

#[test]
fn send_requires_registration() {
    let mut server = server(MockHost::new().accepting(7));
    server.start();
    server.accept_client();

    let calls = server.host().calls.len();
    assert!(!server.send(client(8), "nope"));
    assert!(!server.send_bytes(client(8), b"nope", 4));
    assert!(!server.flush_client(client(8)));
    assert_eq!(server.host().calls.len(), calls);

    assert!(server.send(client(7), "yes"));
    assert_eq!(server.host().sent(), vec![(7, b"yes".to_vec())]);
}

#[test]
fn send_reports_true_on_write_failure() {
    let mut server = server(MockHost::new().accepting(7));
    server.start();
    server.accept_client();
    server.host_mut().send_errno = abi::ERRNO_PIPE;

    assert!(server.send(client(7), "lost"));
    assert!(server.send_bytes(client(7), b"lost", 4));
}

#[test]
fn send_bytes_skips_the_hint() {
    let mut server = server(MockHost::new().accepting(7));
    server.start();
    server.accept_client();

    let hints = server.host().shutdowns().len();
    assert!(server.send_bytes(client(7), b"raw bytes", 3));

    assert_eq!(server.host().shutdowns().len(), hints);
    assert_eq!(server.host().sent(), vec![(7, b"raw".to_vec())]);
}

#[test]
fn disconnect_keeps_client_registered_by_default() {
    let mut server = server(MockHost::new().accepting(7));
    let disconnected = record_disconnections(&mut server);
    server.start();
    server.accept_client();
    server.host_mut().calls.clear();

    server.disconnect_client(client(7));

    assert_eq!(
        server.host().calls,
        vec![Call::Shutdown { fd: 7, how: 3 }, Call::Close { fd: 7 }]
    );
    assert_eq!(*disconnected.borrow(), vec![client(7)]);
    assert!(server.is_registered(client(7)));
}

#[test]
fn disconnect_evicts_when_configured() {
    let host = MockHost::new().accepting(7);
    let mut server = ServerBuilder::new()
        .evict_on_disconnect(true)
        .build_with(host);
    server.start();
    server.accept_client();

    server.disconnect_client(client(7));

    assert!(!server.is_registered(client(7)));
    assert!(!server.send(client(7), "gone"));
}

#[test]
fn remove_client_makes_no_host_call() {
    let mut server = server(MockHost::new().accepting(7));
    server.start();
    server.accept_client();
    let calls = server.host().calls.len();

    assert!(server.remove_client(client(7)));
    assert!(!server.remove_client(client(7)));
    assert_eq!(server.host().calls.len(), calls);
}

#[test]
fn clients_keep_connection_order() {
    let host = MockHost::new().accepting(9).accepting(4).accepting(6);
    let mut server = server(host);
    server.start();

    for _ in 0..3 {
        server.accept_client();
    }

    assert_eq!(server.clients(), vec![client(9), client(4), client(6)]);
}

#[test]
fn reaccepted_descriptor_is_not_duplicated() {
    let host = MockHost::new().accepting(7).accepting(7);
    let mut server = server(host);
    let connected = record_connections(&mut server);
    server.start();

    server.accept_client();
    server.accept_client();

    assert_eq!(server.client_count(), 1);
    assert_eq!(connected.borrow().len(), 2);
}

#[test]
fn callbacks_can_reply() {
    let host = MockHost::new().accepting(7).receiving(b"ping");
    let mut server = server(host);
    server.on_receive(|server, client, message| {
        assert_eq!(message, "ping");
        server.send(client, "pong");
    });
    server.start();

    server.accept_client();

    assert_eq!(server.host().sent(), vec![(7, b"pong".to_vec())]);
}

#[test]
fn last_registration_wins() {
    let mut server = server(MockHost::new().accepting(7));
    let first = record_connections(&mut server);
    let second = record_connections(&mut server);
    server.start();

    server.accept_client();

    assert!(first.borrow().is_empty());
    assert_eq!(*second.borrow(), vec![client(7)]);
}

#[test]
fn replacement_during_dispatch_is_kept() {
    let host = MockHost::new().accepting(7).accepting(8);
    let mut server = server(host);
    let log: Log<&'static str> = Rc::default();

    let sink = log.clone();
    server.on_connected(move |server, _| {
        sink.borrow_mut().push("first");

        let sink = sink.clone();
        server.on_connected(move |_, _| sink.borrow_mut().push("second"));
    });
    server.start();

    server.accept_client();
    server.accept_client();

    assert_eq!(*log.borrow(), vec!["first", "second"]);
}

#[test]
fn run_tick_accepts_then_sleeps() {
    let mut server = server(MockHost::new().accepting(7));
    server.start();

    server.run_tick(10);

    let calls = &server.host().calls;
    assert_eq!(calls[0], Call::Accept { fd: 3, flags: 4 });
    assert!(matches!(calls.last(), Some(Call::Poll { nsubscriptions: 1, .. })));
}

#[test]
fn end_to_end() {
    let mut server = server(MockHost::new().accepting(7));
    let connected = record_connections(&mut server);
    server.start();

    server.accept_client();

    assert_eq!(server.client_count(), 1);
    assert_eq!(*connected.borrow(), vec![client(7)]);

    assert!(server.send(client(7), "hello"));

    server.disconnect_client(client(7));

    let host = server.host();
    assert_eq!(host.shutdowns().iter().filter(|s| s.1 == 3).count(), 1);
    assert_eq!(host.closes(), vec![7]);

    let full = host
        .calls
        .iter()
        .position(|call| *call == Call::Shutdown { fd: 7, how: 3 });
    let close = host.calls.iter().position(|call| *call == Call::Close { fd: 7 });
    assert!(full < close);
}
