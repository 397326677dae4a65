//! Client connection management and input relay for the game server
//!
//! This module handles the server-side bookkeeping of connected participants:
//! - Client connection lifecycle (connect, disconnect, timeout)
//! - Latest-wins input buffering: only the newest sequenced input is kept
//! - Connection health monitoring and automatic cleanup
//! - Client capacity management and address tracking
//!
//! Inputs buffered here are intent only. The game session decides what,
//! if anything, they do to the world.

use log::{debug, info};
use shared::{InputState, PlayerId};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Represents a connected client and their relayed input
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server
    pub id: PlayerId,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
    /// Highest input sequence number accepted so far
    pub last_input_sequence: Option<u32>,
    /// Newest input not yet handed to the simulation
    pub latest_input: Option<InputState>,
}

impl Client {
    /// Creates a new client with the given ID and network address
    ///
    /// The client starts with no accepted inputs and is marked as
    /// recently active.
    pub fn new(id: PlayerId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            last_input_sequence: None,
            latest_input: None,
        }
    }

    /// Records activity without any payload
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Replaces the buffered input if this one is newer
    ///
    /// UDP may reorder packets, so an input whose sequence is not newer
    /// than the last accepted one is dropped. Returns whether the input
    /// was kept.
    pub fn add_input(&mut self, input: InputState) -> bool {
        self.touch();
        if let Some(last) = self.last_input_sequence {
            if input.sequence <= last {
                return false;
            }
        }
        self.last_input_sequence = Some(input.sequence);
        self.latest_input = Some(input);
        true
    }

    /// Checks if the client has exceeded the connection timeout
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients and their relayed inputs
///
/// The ClientManager enforces the server capacity limit, maps addresses to
/// client ids and hands the newest input of each client to the session once
/// per tick.
pub struct ClientManager {
    /// Connected clients indexed by their unique ID
    clients: HashMap<PlayerId, Client>,
    /// Next available client ID for new connections
    next_client_id: PlayerId,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
    /// Silence after which a client is considered gone
    timeout: Duration,
}

impl ClientManager {
    /// Creates a new client manager with the specified capacity limit
    ///
    /// Client IDs start from 1 and increment for each new connection.
    pub fn new(max_clients: usize, timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
            timeout,
        }
    }

    /// Attempts to add a new client connection
    ///
    /// Returns Some(client_id) if successful, None if server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<PlayerId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, Client::new(client_id, addr));

        Some(client_id)
    }

    /// Removes a client from the server
    ///
    /// Returns true if the client was found and removed, false if they were
    /// already gone. Handles both explicit disconnections and timeouts.
    pub fn remove_client(&mut self, client_id: &PlayerId) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    /// Finds a client ID by their network address
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<PlayerId> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    pub fn touch(&mut self, client_id: PlayerId) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.touch();
        }
    }

    /// Buffers an input for a specific client
    ///
    /// Returns false if the client ID is unknown or the input is stale.
    pub fn add_input(&mut self, client_id: PlayerId, input: InputState) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                let accepted = client.add_input(input);
                if !accepted {
                    debug!(
                        "Dropped stale input {} from client {}",
                        input.sequence, client_id
                    );
                }
                accepted
            }
            None => false,
        }
    }

    /// Drains the newest buffered input of every client
    ///
    /// Each client contributes at most one input per call. The result is
    /// ordered by client id so the simulation sees a stable order.
    pub fn take_latest_inputs(&mut self) -> Vec<(PlayerId, InputState)> {
        let mut inputs: Vec<(PlayerId, InputState)> = self
            .clients
            .iter_mut()
            .filter_map(|(id, client)| client.latest_input.take().map(|input| (*id, input)))
            .collect();
        inputs.sort_by_key(|(id, _)| *id);
        inputs
    }

    /// Checks for and removes timed-out clients
    ///
    /// Returns the removed client IDs so the game session can drop them
    /// through the same path as an explicit disconnect.
    pub fn check_timeouts(&mut self) -> Vec<PlayerId> {
        let timeout = self.timeout;
        let timed_out: Vec<PlayerId> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            self.remove_client(client_id);
        }

        timed_out
    }

    /// Gets all client IDs and their network addresses for broadcasting
    pub fn get_client_addrs(&self) -> Vec<(PlayerId, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Vec2;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    fn manager(max_clients: usize) -> ClientManager {
        ClientManager::new(max_clients, Duration::from_secs(5))
    }

    fn input(sequence: u32, x: f32) -> InputState {
        InputState {
            sequence,
            move_vector: Vec2::new(x, 0.0),
            jump_velocity: 0.0,
        }
    }

    #[test]
    fn test_client_creation() {
        let addr = test_addr();
        let client = Client::new(1, addr);

        assert_eq!(client.id, 1);
        assert_eq!(client.addr, addr);
        assert_eq!(client.last_input_sequence, None);
        assert!(client.latest_input.is_none());
    }

    #[test]
    fn test_client_keeps_latest_input() {
        let mut client = Client::new(1, test_addr());

        assert!(client.add_input(input(1, 0.5)));
        assert!(client.add_input(input(3, 1.0)));
        assert!(!client.add_input(input(2, -1.0)));

        assert_eq!(client.latest_input, Some(input(3, 1.0)));
        assert_eq!(client.last_input_sequence, Some(3));
    }

    #[test]
    fn test_duplicate_sequence_dropped() {
        let mut client = Client::new(1, test_addr());
        assert!(client.add_input(input(0, 0.5)));
        assert!(!client.add_input(input(0, 1.0)));
    }

    #[test]
    fn test_client_timeout() {
        let mut client = Client::new(1, test_addr());

        assert!(!client.is_timed_out(Duration::from_secs(1)));

        client.last_seen = Instant::now() - Duration::from_secs(2);

        assert!(client.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_client_manager_creation() {
        let manager = manager(5);
        assert_eq!(manager.max_clients, 5);
        assert!(manager.is_empty());
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn test_add_multiple_clients() {
        let mut manager = manager(3);

        let client_id1 = manager.add_client(test_addr()).unwrap();
        let client_id2 = manager.add_client(test_addr2()).unwrap();

        assert_eq!(client_id1, 1);
        assert_eq!(client_id2, 2);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = manager(1);

        assert!(manager.add_client(test_addr()).is_some());
        assert!(manager.add_client(test_addr2()).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove_client() {
        let mut manager = manager(2);
        let client_id = manager.add_client(test_addr()).unwrap();

        assert!(manager.remove_client(&client_id));
        assert!(manager.is_empty());
        assert!(!manager.remove_client(&client_id));
    }

    #[test]
    fn test_find_client_by_addr() {
        let mut manager = manager(2);
        let client_id1 = manager.add_client(test_addr()).unwrap();
        let _client_id2 = manager.add_client(test_addr2()).unwrap();

        assert_eq!(manager.find_client_by_addr(test_addr()), Some(client_id1));

        let unknown_addr: SocketAddr = "192.168.1.1:9999".parse().unwrap();
        assert_eq!(manager.find_client_by_addr(unknown_addr), None);
    }

    #[test]
    fn test_add_input_to_nonexistent_client() {
        let mut manager = manager(2);
        assert!(!manager.add_input(999, input(1, 1.0)));
    }

    #[test]
    fn test_take_latest_inputs_drains_once() {
        let mut manager = manager(3);
        let client_id1 = manager.add_client(test_addr()).unwrap();
        let client_id2 = manager.add_client(test_addr2()).unwrap();

        manager.add_input(client_id2, input(1, -1.0));
        manager.add_input(client_id1, input(1, 0.25));
        manager.add_input(client_id1, input(2, 0.75));

        let inputs = manager.take_latest_inputs();
        assert_eq!(
            inputs,
            vec![(client_id1, input(2, 0.75)), (client_id2, input(1, -1.0))]
        );
        assert!(manager.take_latest_inputs().is_empty());
    }

    #[test]
    fn test_check_timeouts_removes_silent_clients() {
        let mut manager = ClientManager::new(2, Duration::from_millis(50));
        let client_id = manager.add_client(test_addr()).unwrap();
        manager
            .clients
            .get_mut(&client_id)
            .unwrap()
            .last_seen = Instant::now() - Duration::from_secs(1);

        assert_eq!(manager.check_timeouts(), vec![client_id]);
        assert!(manager.is_empty());
    }
}
