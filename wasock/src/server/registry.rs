use super::Client;
use crate::fd::Descriptor;
use crate::utils::Slab;

use std::collections::HashMap;

/// Upper bound on the room reserved up front, whatever capacity is asked for.
const MAX_PREALLOCATED: usize = 1024;

/// Insertion-ordered set of connected clients.
///
/// Clients live in a [`Slab`]; `order` lists their slots in the order they
/// connected and `slots` finds a client's slot from its descriptor.
pub(crate) struct Registry {
    clients: Slab<Client>,
    order: Vec<usize>,
    slots: HashMap<Descriptor, usize>,
}

impl Registry {
    /// Creates an empty registry with room for `capacity` clients.
    ///
    /// The capacity is a hint; the registry grows past it. At most
    /// [`MAX_PREALLOCATED`] slots are reserved up front.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.min(MAX_PREALLOCATED);

        Self {
            clients: Slab::new(capacity),
            order: Vec::with_capacity(capacity),
            slots: HashMap::with_capacity(capacity),
        }
    }

    /// Appends `client` unless its descriptor is already registered.
    ///
    /// Returns `true` if the client was added.
    pub(crate) fn insert(&mut self, client: Client) -> bool {
        if self.slots.contains_key(&client.fd()) {
            return false;
        }

        let slot = self.clients.insert(client);
        self.order.push(slot);
        self.slots.insert(client.fd(), slot);

        true
    }

    pub(crate) fn contains(&self, fd: Descriptor) -> bool {
        self.slots.contains_key(&fd)
    }

    /// Removes the client registered on `fd`.
    pub(crate) fn remove(&mut self, fd: Descriptor) -> Option<Client> {
        let slot = self.slots.remove(&fd)?;
        self.order.retain(|&s| s != slot);

        self.clients.remove(slot)
    }

    /// Iterates over clients in connection order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = Client> + '_ {
        self.order
            .iter()
            .filter_map(|&slot| self.clients.get(slot).copied())
    }

    /// Returns the clients registered right now, in connection order.
    pub(crate) fn snapshot(&self) -> Vec<Client> {
        self.iter().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.clients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(fd: u32) -> Client {
        Client::new(Descriptor::new(fd))
    }

    #[test]
    fn test_insert_keeps_connection_order() {
        let mut registry = Registry::with_capacity(2);

        assert!(registry.insert(client(9)));
        assert!(registry.insert(client(4)));
        assert!(registry.insert(client(7)));

        assert_eq!(registry.snapshot(), vec![client(9), client(4), client(7)]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_huge_capacity_is_clamped() {
        let mut registry = Registry::with_capacity(usize::MAX);

        assert!(registry.insert(client(3)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_insert_duplicate_descriptor() {
        let mut registry = Registry::with_capacity(4);

        assert!(registry.insert(client(5)));
        assert!(!registry.insert(client(5)));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.snapshot(), vec![client(5)]);
    }

    #[test]
    fn test_remove_and_reuse_slot() {
        let mut registry = Registry::with_capacity(4);

        registry.insert(client(5));
        registry.insert(client(6));

        assert_eq!(registry.remove(Descriptor::new(5)), Some(client(5)));
        assert_eq!(registry.remove(Descriptor::new(5)), None);
        assert!(!registry.contains(Descriptor::new(5)));

        // The freed slot is reused, but the newcomer still goes last.
        registry.insert(client(8));
        assert_eq!(registry.snapshot(), vec![client(6), client(8)]);
    }
}
