use super::registry::Registry;
use super::{Client, ServerConfig};
use crate::fd::Descriptor;
use crate::sys::Host;
use crate::{net, time};

use log::{debug, trace, warn};

use std::collections::HashSet;

type ClientCallback<H> = Box<dyn FnMut(&mut Server<H>, Client)>;
type ReceiveCallback<H> = Box<dyn FnMut(&mut Server<H>, Client, &str)>;

/// A single-threaded connection server.
///
/// `Server` is responsible for:
/// - accepting connections on its preopened listening descriptor,
/// - keeping connected clients in connection order,
/// - draining each client's input and handing complete messages to the
///   receive callback,
/// - sending to and disconnecting clients on request.
///
/// Nothing happens between calls: progress is made only inside
/// [`accept_client`](Self::accept_client) and the methods the embedding
/// program calls directly.
///
/// Each callback kind has a single slot; registering a callback replaces the
/// previous one. Callbacks receive the server itself so they can reply or
/// disconnect.
pub struct Server<H: Host> {
    /// Backend every host call goes through.
    host: H,

    config: ServerConfig,

    /// Preopened listening socket, `3 + listen_offset`.
    listener: Descriptor,

    /// Whether `accept_client` does anything.
    listening: bool,

    registry: Registry,

    /// Registered clients whose descriptor has already been closed.
    closed: HashSet<Descriptor>,

    on_connected: Option<ClientCallback<H>>,
    on_disconnected: Option<ClientCallback<H>>,
    on_receive: Option<ReceiveCallback<H>>,
}

impl<H: Host> Server<H> {
    pub(crate) fn new(host: H, config: ServerConfig) -> Self {
        Self {
            host,
            config,
            listener: Descriptor::preopened(config.listen_offset()),
            listening: false,
            registry: Registry::with_capacity(config.max_clients()),
            closed: HashSet::new(),
            on_connected: None,
            on_disconnected: None,
            on_receive: None,
        }
    }

    /// Starts accepting connections.
    pub fn start(&mut self) {
        self.listening = true;
    }

    /// Stops accepting connections. Registered clients are kept.
    pub fn stop(&mut self) {
        self.listening = false;
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Returns the listening descriptor.
    pub fn listener(&self) -> Descriptor {
        self.listener
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Returns the registered clients in connection order.
    pub fn clients(&self) -> Vec<Client> {
        self.registry.snapshot()
    }

    pub fn client_count(&self) -> usize {
        self.registry.len()
    }

    pub fn is_registered(&self, client: Client) -> bool {
        self.registry.contains(client.fd())
    }

    /// Sets the callback fired when a connection is accepted.
    pub fn on_connected<F>(&mut self, callback: F)
    where
        F: FnMut(&mut Server<H>, Client) + 'static,
    {
        self.on_connected = Some(Box::new(callback));
    }

    /// Sets the callback fired when a client is disconnected.
    pub fn on_disconnected<F>(&mut self, callback: F)
    where
        F: FnMut(&mut Server<H>, Client) + 'static,
    {
        self.on_disconnected = Some(Box::new(callback));
    }

    /// Sets the callback fired with each message drained from a client.
    ///
    /// The message is everything the client sent since the last time it
    /// was serviced, decoded as UTF-8 with invalid sequences replaced.
    pub fn on_receive<F>(&mut self, callback: F)
    where
        F: FnMut(&mut Server<H>, Client, &str) + 'static,
    {
        self.on_receive = Some(Box::new(callback));
    }

    /// Runs one step of the server.
    ///
    /// If the server is listening, a single non-blocking accept is attempted;
    /// a new connection is registered and announced to the connect callback.
    /// A failed accept, including would-block, is not an error. Then every
    /// registered client is serviced once.
    ///
    /// Does nothing when the server is not listening.
    pub fn accept_client(&mut self) {
        if !self.listening {
            return;
        }

        match net::accept(&mut self.host, self.listener) {
            Ok(fd) => {
                let client = Client::new(fd);
                self.closed.remove(&fd);

                if self.registry.insert(client) {
                    debug!("registered {client} ({} connected)", self.registry.len());
                } else {
                    debug!("{client} accepted again while still registered");
                }

                self.fire_connected(client);
            }
            Err(err) => trace!("no connection accepted on {}: {err}", self.listener),
        }

        for client in self.registry.snapshot() {
            // An earlier callback may have evicted it.
            if self.registry.contains(client.fd()) {
                self.service(client);
            }
        }
    }

    /// Runs one step of the server, then sleeps for `idle_ms`.
    ///
    /// # Panics
    ///
    /// Panics if the host cannot sleep.
    pub fn run_tick(&mut self, idle_ms: u64) {
        self.accept_client();
        time::sleep(&mut self.host, idle_ms);
    }

    /// Sends `message` to a registered client.
    ///
    /// Returns `false` without touching the host if `client` is not
    /// registered, and `true` otherwise; a failed write is only logged.
    pub fn send(&mut self, client: Client, message: &str) -> bool {
        if !self.is_registered(client) {
            return false;
        }

        if let Err(err) = net::send(&mut self.host, client.fd(), message) {
            warn!("send to {client} failed: {err}");
        }

        true
    }

    /// Sends the first `length` bytes of `bytes` to a registered client.
    ///
    /// Same contract as [`send`](Self::send), without the shutdown hint.
    pub fn send_bytes(&mut self, client: Client, bytes: &[u8], length: usize) -> bool {
        if !self.is_registered(client) {
            return false;
        }

        if let Err(err) = net::send_raw(&mut self.host, client.fd(), bytes, length) {
            warn!("raw send to {client} failed: {err}");
        }

        true
    }

    /// Flushes pending writes of a registered client.
    ///
    /// Returns `false` if `client` is not registered.
    pub fn flush_client(&mut self, client: Client) -> bool {
        if !self.is_registered(client) {
            return false;
        }

        if let Err(err) = net::flush(&mut self.host, client.fd()) {
            warn!("flush of {client} failed: {err}");
        }

        true
    }

    /// Shuts down and closes the client's connection, then fires the
    /// disconnect callback.
    ///
    /// The client stays registered unless the server was built with
    /// [`evict_on_disconnect`](super::ServerBuilder::evict_on_disconnect).
    pub fn disconnect_client(&mut self, client: Client) {
        self.teardown(client, self.config.evict_on_disconnect());
    }

    /// Removes a client from the registry without any host call.
    ///
    /// Returns `true` if the client was registered.
    pub fn remove_client(&mut self, client: Client) -> bool {
        self.closed.remove(&client.fd());
        self.registry.remove(client.fd()).is_some()
    }

    /// Closes the client's descriptor, optionally evicts it, then fires the
    /// disconnect callback.
    fn teardown(&mut self, client: Client, evict: bool) {
        if let Err(err) = net::close(&mut self.host, client.fd()) {
            warn!("closing {client} failed: {err}");
        }

        if evict {
            self.closed.remove(&client.fd());

            if self.registry.remove(client.fd()).is_some() {
                debug!("evicted {client} ({} connected)", self.registry.len());
            }
        } else if self.registry.contains(client.fd()) {
            self.closed.insert(client.fd());
        }

        self.fire_disconnected(client);
    }

    /// Drains the client's pending input and delivers it as one message.
    fn service(&mut self, client: Client) {
        let mut message = Vec::new();
        let mut failed = false;

        loop {
            match net::receive(&mut self.host, client.fd(), self.config.chunk_size()) {
                Ok((_, 0)) => break,
                Ok((chunk, _)) => message.extend_from_slice(&chunk),
                Err(err) if err.is_would_block() => break,
                Err(err) => {
                    if self.closed.contains(&client.fd()) {
                        debug!("receive from closed {client} failed: {err}");
                    } else {
                        warn!("receive from {client} failed: {err}");
                    }

                    failed = true;
                    break;
                }
            }
        }

        if !message.is_empty() {
            trace!("{client} sent {} bytes", message.len());

            let text = String::from_utf8_lossy(&message);
            self.fire_receive(client, &text);
        }

        // A client dropped for a read error never stays registered, so its
        // descriptor is closed exactly once.
        if failed && self.config.disconnect_on_error() && self.is_registered(client) {
            self.teardown(client, true);
        }
    }

    // Slots are taken out for the duration of a dispatch so the callback can
    // borrow the server mutably. A replacement registered meanwhile wins.

    fn fire_connected(&mut self, client: Client) {
        if let Some(mut callback) = self.on_connected.take() {
            callback(self, client);

            if self.on_connected.is_none() {
                self.on_connected = Some(callback);
            }
        }
    }

    fn fire_disconnected(&mut self, client: Client) {
        if let Some(mut callback) = self.on_disconnected.take() {
            callback(self, client);

            if self.on_disconnected.is_none() {
                self.on_disconnected = Some(callback);
            }
        }
    }

    fn fire_receive(&mut self, client: Client, message: &str) {
        if let Some(mut callback) = self.on_receive.take() {
            callback(self, client, message);

            if self.on_receive.is_none() {
                self.on_receive = Some(callback);
            }
        }
    }
}
