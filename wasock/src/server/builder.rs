use super::Server;
use crate::fd::RawFd;
use crate::sys::Host;

/// Size of each read issued while draining a client.
const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Number of clients the registry is sized for up front.
const DEFAULT_MAX_CLIENTS: usize = 128;

/// Settings a [`Server`] was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    listen_offset: RawFd,
    chunk_size: usize,
    max_clients: usize,
    disconnect_on_error: bool,
    evict_on_disconnect: bool,
}

impl ServerConfig {
    /// Offset of the listening socket among the preopened descriptors.
    pub fn listen_offset(&self) -> RawFd {
        self.listen_offset
    }

    /// Maximum number of bytes requested by each read.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Advertised client capacity. Not enforced.
    pub fn max_clients(&self) -> usize {
        self.max_clients
    }

    /// Whether a failed read other than would-block disconnects the client.
    pub fn disconnect_on_error(&self) -> bool {
        self.disconnect_on_error
    }

    /// Whether disconnecting a client also removes it from the registry.
    pub fn evict_on_disconnect(&self) -> bool {
        self.evict_on_disconnect
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_offset: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_clients: DEFAULT_MAX_CLIENTS,
            disconnect_on_error: false,
            evict_on_disconnect: false,
        }
    }
}

/// Builder for configuring and creating a server.
///
/// By default the server listens on the first preopened descriptor (`3`),
/// reads in 1024-byte chunks, keeps clients whose reads fail and keeps
/// disconnected clients registered.
///
/// # Examples
///
/// ```rust,ignore
/// let mut server = ServerBuilder::new()
///     .listen_offset(1)
///     .chunk_size(4096)
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct ServerBuilder {
    config: ServerConfig,
}

impl ServerBuilder {
    /// Creates a new `ServerBuilder` with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the listening socket as the `offset`-th preopened descriptor,
    /// i.e. descriptor `3 + offset`.
    pub fn listen_offset(mut self, offset: RawFd) -> Self {
        self.config.listen_offset = offset;
        self
    }

    /// Sets the maximum number of bytes requested by each read.
    ///
    /// # Panics
    ///
    /// Panics if `size == 0`.
    pub fn chunk_size(mut self, size: usize) -> Self {
        assert!(size > 0, "chunk_size must be > 0");

        self.config.chunk_size = size;
        self
    }

    /// Sets the advertised client capacity.
    ///
    /// The registry reserves room for this many clients, up to 1024, and
    /// keeps accepting connections beyond it.
    pub fn max_clients(mut self, n: usize) -> Self {
        self.config.max_clients = n;
        self
    }

    /// Disconnects a client when one of its reads fails with anything other
    /// than would-block.
    ///
    /// A client dropped this way is always removed from the registry, even
    /// without [`evict_on_disconnect`](Self::evict_on_disconnect), so its
    /// descriptor is closed once.
    pub fn disconnect_on_error(mut self, enabled: bool) -> Self {
        self.config.disconnect_on_error = enabled;
        self
    }

    /// Removes clients from the registry when they are disconnected.
    pub fn evict_on_disconnect(mut self, enabled: bool) -> Self {
        self.config.evict_on_disconnect = enabled;
        self
    }

    /// Builds the server on the platform's default host.
    #[cfg(any(unix, target_os = "wasi"))]
    pub fn build(self) -> Server<crate::sys::DefaultHost> {
        self.build_with(crate::sys::DefaultHost::default())
    }

    /// Builds the server on a caller-provided host.
    pub fn build_with<H: Host>(self, host: H) -> Server<H> {
        Server::new(host, self.config)
    }
}
