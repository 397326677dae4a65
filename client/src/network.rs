use crate::input::{BotInput, InputRelay};
use crate::mirror::ObserverMirror;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, PlayerId, SpellId, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep_until};

/// How the headless client behaves
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Bot decisions per second
    pub input_rate: u32,
    /// Stop after this long; runs until disconnected when None
    pub duration: Option<Duration>,
    /// Seed for the bot, for reproducible runs
    pub seed: Option<u64>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            input_rate: 30,
            duration: None,
            seed: None,
        }
    }
}

/// What the client saw during a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientStats {
    pub client_id: Option<PlayerId>,
    pub spectator: bool,
    pub snapshots: u32,
    pub deltas: u32,
    pub phase_events: u32,
    pub inputs_sent: u32,
    pub casts_sent: u32,
}

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    client_id: Option<PlayerId>,
    connected: bool,
    spell_slots: Vec<SpellId>,

    mirror: ObserverMirror,
    bot: BotInput,
    relay: InputRelay,

    settings: ClientSettings,
    stats: ClientStats,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        settings: ClientSettings,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            client_id: None,
            connected: false,
            spell_slots: Vec::new(),
            mirror: ObserverMirror::new(),
            bot: BotInput::new(settings.seed),
            relay: InputRelay::new(),
            settings,
            stats: ClientStats::default(),
        })
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to server at {}...", self.server_addr);

        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
        };
        self.send_packet(&packet).await?;

        Ok(())
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Connected {
                client_id,
                spectator,
                spell_slots,
            } => {
                info!(
                    "Connected! Client ID: {}{}",
                    client_id,
                    if spectator { " (spectating)" } else { "" }
                );
                self.client_id = Some(client_id);
                self.connected = true;
                self.spell_slots = spell_slots;
                self.stats.client_id = Some(client_id);
                self.stats.spectator = spectator;
            }

            Packet::Snapshot(snapshot) => {
                if self.mirror.apply_snapshot(snapshot) {
                    self.stats.snapshots += 1;
                }
            }

            Packet::Delta(delta) => {
                if self.mirror.apply_delta(delta) {
                    self.stats.deltas += 1;
                }
                for effect in self.mirror.take_effects() {
                    debug!("Play '{}' at {:?}", effect.prefab, effect.position);
                }
            }

            Packet::PhaseStarted {
                phase,
                qualifying_players,
                participants,
            } => {
                self.stats.phase_events += 1;
                self.mirror
                    .on_phase_started(phase, qualifying_players, participants);
            }

            Packet::PhaseEnded {
                phase,
                qualified,
                eliminated,
            } => {
                self.stats.phase_events += 1;
                self.mirror.on_phase_ended(phase, qualified, eliminated);
            }

            Packet::GameEnded { winner } => {
                self.stats.phase_events += 1;
                self.mirror.on_game_ended(winner);
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                self.client_id = None;
            }

            _ => {
                warn!("Unexpected packet type");
            }
        }
    }

    async fn send_bot_input(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if !self.connected || self.client_id.is_none() {
            return Ok(());
        }

        let command = self.bot.next_command(self.spell_slots.len());
        if let Some(input) = self.relay.relay(&command, Instant::now()) {
            self.send_packet(&Packet::Input(input)).await?;
            self.stats.inputs_sent += 1;
        }

        if let Some(slot) = command.cast_slot {
            if let Some(&spell_id) = self.spell_slots.get(slot as usize) {
                self.send_packet(&Packet::CastSpell { spell_id, slot }).await?;
                self.stats.casts_sent += 1;
            }
        }

        Ok(())
    }

    pub fn mirror(&self) -> &ObserverMirror {
        &self.mirror
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Connects, plays as a bot and returns what was observed
    ///
    /// The loop ends when the configured duration elapses or the server
    /// disconnects us after we had connected.
    pub async fn run(&mut self) -> Result<ClientStats, Box<dyn std::error::Error>> {
        self.connect().await?;

        let input_rate = self.settings.input_rate.max(1);
        let input_period = Duration::from_secs_f64(1.0 / input_rate as f64);
        let mut input_interval = interval(input_period);
        let deadline = self
            .settings
            .duration
            .map(|duration| tokio::time::Instant::now() + duration);

        let mut buffer = [0u8; MAX_PACKET_SIZE];
        let mut was_connected = false;

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => match deserialize::<Packet>(&buffer[0..len]) {
                            Ok(packet) => self.handle_packet(packet),
                            Err(e) => warn!("Undecodable packet from server: {}", e),
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = input_interval.tick() => {
                    self.mirror.advance(input_period.as_secs_f32());
                    if let Err(e) = self.send_bot_input().await {
                        error!("Error sending input: {}", e);
                    }
                },

                _ = async {
                    match deadline {
                        Some(deadline) => sleep_until(deadline).await,
                        None => std::future::pending::<()>().await,
                    }
                } => {
                    info!("Run time elapsed");
                    break;
                },
            }

            if self.connected {
                was_connected = true;
            } else if was_connected {
                break;
            }
        }

        if self.connected {
            let _ = self.send_packet(&Packet::Disconnect).await;
            self.connected = false;
        }

        Ok(self.stats.clone())
    }
}
