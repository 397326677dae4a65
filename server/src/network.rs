//! Server network layer handling UDP communications and game loop coordination

use crate::client_manager::ClientManager;
use crate::error::Result;
use crate::game::{GameSession, JoinRole};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, PlayerId, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client_id: PlayerId },
}

/// Messages sent from game loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
        exclude: Option<PlayerId>,
    },
}

/// Transport-level tuning for [`Server`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkSettings {
    pub tick_duration: Duration,
    pub max_clients: usize,
    pub client_timeout: Duration,
    /// Ticks between full snapshot broadcasts; 0 disables them.
    pub snapshot_interval: u32,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            tick_duration: Duration::from_secs_f64(1.0 / shared::DEFAULT_TICK_RATE as f64),
            max_clients: 16,
            client_timeout: Duration::from_secs(5),
            snapshot_interval: 120,
        }
    }
}

/// Main server coordinating networking and game simulation
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    session: GameSession,
    settings: NetworkSettings,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(addr: &str, settings: NetworkSettings, session: GameSession) -> Result<Self> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(
                settings.max_clients,
                settings.client_timeout,
            ))),
            session,
            settings,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; MAX_PACKET_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match deserialize::<Packet>(&buffer[0..len]) {
                        Ok(packet) => {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!("Failed to deserialize packet from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, exclude } => {
                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_client_addrs()
                        };

                        for (client_id, addr) in client_addrs {
                            if Some(client_id) == exclude {
                                continue;
                            }

                            if let Err(e) = send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: Packet, exclude: Option<PlayerId>) {
        if let Err(e) = self
            .game_tx
            .send(GameMessage::BroadcastPacket { packet, exclude })
        {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    async fn client_at(&self, addr: SocketAddr) -> Option<PlayerId> {
        let clients = self.clients.read().await;
        clients.find_client_by_addr(addr)
    }

    /// Processes incoming packets
    ///
    /// Only intent is accepted from participants. Packet kinds the authority
    /// alone may send are dropped with a warning.
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        if packet.is_authority_only() {
            warn!("Rejected server-only packet {:?} from {}", packet, addr);
            return;
        }

        match packet {
            Packet::Connect { client_version } => {
                info!(
                    "Client connecting from {} (version: {})",
                    addr, client_version
                );

                if client_version != PROTOCOL_VERSION {
                    self.send_packet(
                        Packet::Disconnected {
                            reason: format!(
                                "Protocol version {} not supported, expected {}",
                                client_version, PROTOCOL_VERSION
                            ),
                        },
                        addr,
                    );
                    return;
                }

                // Remove existing connection if present
                if let Some(existing_id) = self.client_at(addr).await {
                    info!("Removing existing client {} from {}", existing_id, addr);
                    self.drop_client(existing_id).await;
                }

                let client_id = {
                    let mut clients = self.clients.write().await;
                    clients.add_client(addr)
                };

                match client_id {
                    Some(client_id) => {
                        let role = self.session.add_player(client_id);
                        self.send_packet(
                            Packet::Connected {
                                client_id,
                                spectator: role == JoinRole::Spectator,
                                spell_slots: self.session.spell_slots().to_vec(),
                            },
                            addr,
                        );
                        self.send_packet(Packet::Snapshot(self.session.snapshot()), addr);
                    }
                    None => {
                        self.send_packet(
                            Packet::Disconnected {
                                reason: "Server full".to_string(),
                            },
                            addr,
                        );
                    }
                }
            }

            Packet::Input(input) => {
                if let Some(client_id) = self.client_at(addr).await {
                    let mut clients = self.clients.write().await;
                    clients.add_input(client_id, input);
                } else {
                    debug!("Input from unknown address {}", addr);
                }
            }

            Packet::CastSpell { spell_id, slot } => {
                if let Some(client_id) = self.client_at(addr).await {
                    self.clients.write().await.touch(client_id);
                    self.session.submit_cast(client_id, spell_id, slot);
                } else {
                    debug!("Cast from unknown address {}", addr);
                }
            }

            Packet::Disconnect => {
                if let Some(client_id) = self.client_at(addr).await {
                    self.drop_client(client_id).await;
                }
            }

            other => {
                warn!("Unexpected packet {:?} from client at {}", other, addr);
            }
        }
    }

    async fn drop_client(&mut self, client_id: PlayerId) {
        {
            let mut clients = self.clients.write().await;
            clients.remove_client(&client_id);
        }
        self.session.remove_player(client_id);
    }

    /// Relays buffered inputs, advances the session and broadcasts the result
    async fn run_tick(&mut self, dt: f32) {
        let inputs = {
            let mut clients = self.clients.write().await;
            clients.take_latest_inputs()
        };
        for (client_id, input) in inputs {
            self.session.submit_input(client_id, input);
        }

        let output = self.session.tick(dt);

        for event in output.events {
            self.broadcast_packet(event.into(), None);
        }
        if !output.delta.is_empty() {
            self.broadcast_packet(Packet::Delta(output.delta), None);
        }

        let tick = self.session.current_tick();
        if self.settings.snapshot_interval > 0 && tick % self.settings.snapshot_interval == 0 {
            self.broadcast_packet(Packet::Snapshot(self.session.snapshot()), None);
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<()> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut tick_interval = interval(self.settings.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let dt = self.settings.tick_duration.as_secs_f32();

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            info!("Client {} timed out", client_id);
                            self.session.remove_player(client_id);
                        },
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    self.run_tick(dt).await;

                    let tick = self.session.current_tick();
                    if tick % 600 == 0 {
                        let client_count = self.clients.read().await.len();
                        if client_count > 0 {
                            debug!("Tick {}: {} clients, state {:?}",
                                   tick, client_count, self.session.state());
                        }
                    }
                },
            }
        }

        Ok(())
    }
}

async fn send_packet_impl(socket: &UdpSocket, packet: &Packet, addr: SocketAddr) -> Result<()> {
    let data = serialize(packet)?;
    socket.send_to(&data, addr).await?;
    Ok(())
}
