//! Example: tick-driven echo server with wasock
//!
//! Under a WASI runtime, preopen a listening socket as the first descriptor
//! after stdio (e.g. `wasmtime run --tcplisten 127.0.0.1:9000 ...`). Natively,
//! the example creates that socket itself.

use wasock::ServerBuilder;

fn main() {
    env_logger::init();

    // Place a listener where a WASI runtime would have preopened it.
    #[cfg(unix)]
    if let Err(err) = wasock::sys::UnixHost::preopen("127.0.0.1:9000", 0) {
        eprintln!("failed to listen on 127.0.0.1:9000: {err}");
        return;
    }

    let mut server = ServerBuilder::new().evict_on_disconnect(true).build();

    server.on_connected(|_, client| println!("Accepted {client}"));
    server.on_disconnected(|_, client| println!("Dropped {client}"));

    // Echo every message back; "quit" ends the session.
    server.on_receive(|server, client, message| {
        if message.trim() == "quit" {
            server.disconnect_client(client);
        } else {
            server.send_bytes(client, message.as_bytes(), message.len());
        }
    });

    server.start();
    println!("Echo server listening on {}", server.listener());

    loop {
        server.run_tick(10);
    }
}
