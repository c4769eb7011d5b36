use crate::player::{offline_uuid, ChunkManager, EntityMap, Player, TrackedEntity};
use blockwire_data::BlockDictionary;
use blockwire_events::HandlerRegistry;
use blockwire_protocol_core::{CodecError, Connection, ConnectionState, InternalPacket, ProtocolAdapter};
use blockwire_protocol_v1_21::{encode_chunk_batch_received, V1_21Adapter};
use blockwire_world::Chunk;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("encode requested for a packet whose encoder is not implemented: {0}")]
    UnsupportedEncode(String),
    #[error("session disconnected: {0}")]
    Disconnected(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Drives a single TCP connection to a server through HANDSHAKING → LOGIN →
/// CONFIGURATION → PLAY. Decode, framing, and state transitions all happen
/// here on the connection's owning task; application PLAY handlers are
/// dispatched through `registry` and may do their own work off this task.
pub struct Session {
    connection: Connection,
    adapter: V1_21Adapter,
    state: ConnectionState,
    pub player: Player,
    pub entities: EntityMap,
    pub chunks: ChunkManager,
    pub dictionary: Option<Arc<BlockDictionary>>,
    pub registry: Arc<HandlerRegistry<InternalPacket>>,
    chunk_batch_start: Option<Instant>,
    locale: String,
    view_distance: i8,
}

impl Session {
    /// Connect to `host:port`, emit the handshake and login start, and
    /// return a session sitting in LOGIN state awaiting the server's reply.
    pub async fn connect(
        host: &str,
        port: u16,
        player_name: &str,
        locale: &str,
        view_distance: i8,
        data_dir: &std::path::Path,
        registry: Arc<HandlerRegistry<InternalPacket>>,
    ) -> Result<Self, SessionError> {
        let dictionary = match BlockDictionary::load(data_dir) {
            Ok(dict) => Some(Arc::new(dict)),
            Err(e) => {
                warn!(
                    "couldn't load block dictionary from {}: {}, block/item lookups will be unavailable",
                    data_dir.display(),
                    e
                );
                None
            }
        };

        let stream = TcpStream::connect((host, port)).await?;
        let mut connection = Connection::new(stream);
        let adapter = V1_21Adapter::new();

        let handshake = InternalPacket::Handshake {
            protocol_version: adapter.protocol_version(),
            server_address: host.to_string(),
            server_port: port,
            next_state: 2, // LOGIN
        };
        Self::send_raw(&mut connection, &adapter, ConnectionState::Handshaking, &handshake)
            .await?;

        let mut player = Player::new(player_name);
        player.offline_uuid = offline_uuid(player_name);
        let login_start = InternalPacket::LoginStart {
            name: player_name.to_string(),
            uuid: player.offline_uuid,
        };
        Self::send_raw(&mut connection, &adapter, ConnectionState::Login, &login_start).await?;

        Ok(Self {
            connection,
            adapter,
            state: ConnectionState::Login,
            player,
            entities: EntityMap::new(),
            chunks: ChunkManager::new(),
            dictionary,
            registry,
            chunk_batch_start: None,
            locale: locale.to_string(),
            view_distance,
        })
    }

    async fn send_raw(
        connection: &mut Connection,
        adapter: &V1_21Adapter,
        state: ConnectionState,
        packet: &InternalPacket,
    ) -> Result<(), SessionError> {
        let payload = adapter
            .encode_packet(state, packet)
            .map_err(|e| SessionError::UnsupportedEncode(e.to_string()))?;
        // `encode_packet` already wrote the packet ID as the first VarInt of
        // the payload, so split it back out for `write_packet`.
        let mut buf = payload;
        let id = blockwire_protocol_core::read_varint(&mut buf)?;
        connection.write_packet(id, &buf).await?;
        Ok(())
    }

    async fn send(&mut self, packet: &InternalPacket) -> Result<(), SessionError> {
        Self::send_raw(&mut self.connection, &self.adapter, self.state, packet).await
    }

    /// Run the receive loop until disconnect. Each decoded packet is
    /// dispatched per §4.4: LOGIN/CONFIGURATION transitions are handled
    /// inline, PLAY packets get the core's mandatory handling and then go
    /// to the application's handler registry.
    pub async fn run(&mut self) -> Result<(), SessionError> {
        loop {
            let (id, mut data) = self.connection.read_packet().await?;
            let packet = match self.adapter.decode_packet(self.state, id, &mut data) {
                Ok(p) => p,
                Err(e) => {
                    warn!("failed to decode packet id=0x{:02X} in {:?}: {}", id, self.state, e);
                    continue;
                }
            };

            match self.state {
                ConnectionState::Login => self.handle_login(packet).await?,
                ConnectionState::Configuration => self.handle_configuration(packet).await?,
                ConnectionState::Play => self.handle_play(packet).await?,
                _ => {}
            }

            if matches!(self.state, ConnectionState::Play) && self.should_stop() {
                return Ok(());
            }
        }
    }

    fn should_stop(&self) -> bool {
        false
    }

    async fn handle_login(&mut self, packet: InternalPacket) -> Result<(), SessionError> {
        match packet {
            InternalPacket::SetCompression { threshold } => {
                self.connection.enable_compression(threshold);
                debug!(threshold, "compression enabled");
            }
            InternalPacket::LoginSuccess { profile } => {
                self.player.server_uuid = Some(profile.uuid);
                info!(uuid = %profile.uuid, name = %profile.name, "login succeeded");
                self.send(&InternalPacket::LoginAcknowledged).await?;
                self.state = ConnectionState::Configuration;
                self.send(&InternalPacket::ClientInformation {
                    locale: self.locale.clone(),
                    view_distance: self.view_distance,
                    chat_mode: 0,
                    chat_colors: true,
                    skin_parts: 0x7F,
                    main_hand: 1,
                    text_filtering: false,
                    allow_listing: true,
                })
                .await?;
            }
            InternalPacket::Disconnect { reason } => {
                return Err(SessionError::Disconnected(format!("{:?}", reason)));
            }
            InternalPacket::EncryptionRequest { .. } => {
                return Err(SessionError::Disconnected(
                    "encrypted/online-mode login is out of scope".into(),
                ));
            }
            other => {
                debug!(packet = other.type_name(), "ignored in LOGIN state");
            }
        }
        Ok(())
    }

    async fn handle_configuration(&mut self, packet: InternalPacket) -> Result<(), SessionError> {
        match packet {
            InternalPacket::PluginMessage { channel, data } => {
                self.send(&InternalPacket::PluginMessage { channel, data }).await?;
            }
            InternalPacket::KnownPacksRequest { packs } => {
                self.send(&InternalPacket::KnownPacksResponse { packs }).await?;
            }
            InternalPacket::RegistryData { .. } => {
                // Accepted and ignored: the client validates the shape via
                // decode but does not act on registry contents yet.
            }
            InternalPacket::FinishConfiguration => {
                self.send(&InternalPacket::FinishConfigurationAck).await?;
                self.state = ConnectionState::Play;
                info!("entered PLAY state");
            }
            InternalPacket::KeepAliveClientbound { id } => {
                self.send(&InternalPacket::KeepAliveServerbound { id }).await?;
            }
            InternalPacket::Disconnect { reason } => {
                return Err(SessionError::Disconnected(format!("{:?}", reason)));
            }
            other => {
                debug!(packet = other.type_name(), "ignored in CONFIGURATION state");
            }
        }
        Ok(())
    }

    async fn handle_play(&mut self, packet: InternalPacket) -> Result<(), SessionError> {
        match &packet {
            InternalPacket::KeepAliveClientbound { id } => {
                self.send(&InternalPacket::KeepAliveServerbound { id: *id }).await?;
            }
            InternalPacket::ChunkBatchStart => {
                self.chunk_batch_start = Some(Instant::now());
            }
            InternalPacket::ChunkBatchFinished { batch_size } => {
                let chunks_per_tick = match self.chunk_batch_start.take() {
                    Some(start) => {
                        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
                        (25.0 / (elapsed_ms / *batch_size as f64)) as f32
                    }
                    None => 1.0,
                };
                let mut ack = encode_chunk_batch_received(chunks_per_tick);
                let ack_id = blockwire_protocol_core::read_varint(&mut ack)?;
                self.connection.write_packet(ack_id, &ack).await?;
            }
            InternalPacket::ChunkDataAndUpdateLight { chunk_x, chunk_z, data, .. } => {
                self.apply_chunk_data(*chunk_x, *chunk_z, data)?;
            }
            InternalPacket::UnloadChunk { chunk_x, chunk_z } => {
                self.chunks.remove(self.dimension_index(), *chunk_x, *chunk_z);
            }
            InternalPacket::BlockUpdate { position, block_id } => {
                self.apply_block_update(*position, *block_id);
            }
            InternalPacket::SynchronizePlayerPosition {
                position,
                yaw,
                pitch,
                flags,
                teleport_id,
            } => {
                self.apply_synchronize_position(*position, *yaw, *pitch, *flags);
                self.send(&InternalPacket::ConfirmTeleportation {
                    teleport_id: *teleport_id,
                })
                .await?;
            }
            InternalPacket::JoinGame {
                entity_id,
                dimension_name,
                ..
            } => {
                self.player.entity_id = *entity_id;
                self.player.dimension = dimension_name.clone();
            }
            InternalPacket::Respawn { dimension_name, .. } => {
                self.player.dimension = dimension_name.clone();
                self.chunks.clear();
            }
            InternalPacket::CombatDeath { .. } => {
                self.send(&InternalPacket::ClientStatus { action_id: 0 }).await?;
            }
            InternalPacket::SpawnEntity {
                entity_id,
                entity_uuid,
                entity_type,
                x,
                y,
                z,
                yaw,
                pitch,
                ..
            } => {
                self.entities.insert(TrackedEntity {
                    entity_id: *entity_id,
                    entity_type: *entity_type,
                    uuid: *entity_uuid,
                    x: *x,
                    y: *y,
                    z: *z,
                    yaw: *yaw,
                    pitch: *pitch,
                });
            }
            InternalPacket::RemoveEntities { entity_ids } => {
                for id in entity_ids {
                    self.entities.remove(*id);
                }
            }
            InternalPacket::UpdateEntityPosition {
                entity_id,
                delta_x,
                delta_y,
                delta_z,
                ..
            } => {
                self.entities.apply_delta(*entity_id, *delta_x, *delta_y, *delta_z);
            }
            InternalPacket::UpdateEntityPositionAndRotation {
                entity_id,
                delta_x,
                delta_y,
                delta_z,
                yaw,
                pitch,
                ..
            } => {
                self.entities.apply_delta(*entity_id, *delta_x, *delta_y, *delta_z);
                self.entities.set_rotation(*entity_id, *yaw, *pitch);
            }
            InternalPacket::UpdateEntityRotation {
                entity_id,
                yaw,
                pitch,
                ..
            } => {
                self.entities.set_rotation(*entity_id, *yaw, *pitch);
            }
            InternalPacket::Disconnect { reason } => {
                self.registry.dispatch(packet.type_name(), &packet);
                return Err(SessionError::Disconnected(format!("{:?}", reason)));
            }
            _ => {}
        }

        self.registry.dispatch(packet.type_name(), &packet);
        Ok(())
    }

    fn apply_chunk_data(&mut self, chunk_x: i32, chunk_z: i32, data: &[u8]) -> Result<(), SessionError> {
        let dimension = self.dimension_index();
        match Chunk::decode(data, dimension) {
            Ok(chunk) => self.chunks.insert(dimension, chunk_x, chunk_z, chunk),
            Err(e) => warn!(chunk_x, chunk_z, "failed to decode chunk: {}", e),
        }
        Ok(())
    }

    fn dimension_index(&self) -> u8 {
        if self.player.dimension.ends_with("overworld") {
            0
        } else {
            1
        }
    }

    fn apply_block_update(&mut self, position: blockwire_types::BlockPos, block_id: i32) {
        let chunk_x = position.x.div_euclid(16);
        let chunk_z = position.z.div_euclid(16);
        let local_x = position.x.rem_euclid(16) as usize;
        let local_z = position.z.rem_euclid(16) as usize;
        match self.chunks.get_mut(self.dimension_index(), chunk_x, chunk_z) {
            Some(chunk) => chunk.set_block(local_x, position.y, local_z, block_id),
            None => debug!(chunk_x, chunk_z, "block update for unloaded chunk"),
        }
    }

    /// Apply a teleport's position deltas per the packet's flags bitmask:
    /// bit N set means axis N is relative to the current position, clear
    /// means absolute. Bits: 0x01 X, 0x02 Y, 0x04 Z, 0x08 Y-rot, 0x10 X-rot.
    fn apply_synchronize_position(
        &mut self,
        position: blockwire_types::Vec3d,
        yaw: f32,
        pitch: f32,
        flags: u8,
    ) {
        let current = self.player.position;
        let x = if flags & 0x01 != 0 { current.x + position.x } else { position.x };
        let y = if flags & 0x02 != 0 { current.y + position.y } else { position.y };
        let z = if flags & 0x04 != 0 { current.z + position.z } else { position.z };
        self.player.position = blockwire_types::Vec3d::new(x, y, z);
        self.player.yaw = if flags & 0x08 != 0 { self.player.yaw + yaw } else { yaw };
        self.player.pitch = if flags & 0x10 != 0 { self.player.pitch + pitch } else { pitch };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockwire_types::Vec3d;

    fn dummy_session() -> Session {
        Session {
            connection: Connection::new_dummy(),
            adapter: V1_21Adapter::new(),
            state: ConnectionState::Play,
            player: Player::new("tester"),
            entities: EntityMap::new(),
            chunks: ChunkManager::new(),
            dictionary: None,
            registry: Arc::new(HandlerRegistry::new()),
            chunk_batch_start: None,
            locale: "en_US".into(),
            view_distance: 10,
        }
    }

    #[test]
    fn test_synchronize_position_relative_y() {
        let mut session = dummy_session();
        session.player.position = Vec3d::new(1.0, 2.0, 3.0);
        session.apply_synchronize_position(Vec3d::new(10.0, 3.0, -4.0), 0.0, 0.0, 0b00010);
        assert_eq!(session.player.position.x, 10.0);
        assert_eq!(session.player.position.y, 5.0);
        assert_eq!(session.player.position.z, -4.0);
    }

    #[test]
    fn test_synchronize_position_all_absolute() {
        let mut session = dummy_session();
        session.player.position = Vec3d::new(1.0, 2.0, 3.0);
        session.apply_synchronize_position(Vec3d::new(10.0, 20.0, 30.0), 90.0, 45.0, 0);
        assert_eq!(session.player.position, Vec3d::new(10.0, 20.0, 30.0));
        assert_eq!(session.player.yaw, 90.0);
        assert_eq!(session.player.pitch, 45.0);
    }
}
