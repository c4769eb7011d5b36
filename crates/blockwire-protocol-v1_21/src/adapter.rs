use anyhow::{bail, Result};
use bytes::{Buf, BufMut, BytesMut};
use blockwire_nbt::NbtValue;
use blockwire_protocol_core::*;
use blockwire_types::{BlockPos, GameMode, GameProfile, ProfileProperty, Vec3d};

/// Client-side adapter for protocol 769 (Minecraft 1.21.4).
///
/// Decodes packets the server sends (clientbound) and encodes packets this
/// client sends back (serverbound). There is no server-side encode/decode
/// here — a client never builds the packets a server builds.
pub struct V1_21Adapter;

impl V1_21Adapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for V1_21Adapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolAdapter for V1_21Adapter {
    fn protocol_version(&self) -> i32 {
        769
    }

    fn decode_packet(
        &self,
        state: ConnectionState,
        id: i32,
        data: &mut BytesMut,
    ) -> Result<InternalPacket> {
        match state {
            ConnectionState::Handshaking => decode_handshaking(id, data),
            ConnectionState::Status => decode_status(id, data),
            ConnectionState::Login => decode_login(id, data),
            ConnectionState::Configuration => decode_configuration(id, data),
            ConnectionState::Play => decode_play(id, data),
        }
    }

    fn encode_packet(&self, state: ConnectionState, packet: &InternalPacket) -> Result<BytesMut> {
        match state {
            ConnectionState::Handshaking => encode_handshaking(packet),
            ConnectionState::Status => encode_status(packet),
            ConnectionState::Login => encode_login(packet),
            ConnectionState::Configuration => encode_configuration(packet),
            ConnectionState::Play => encode_play(packet),
        }
    }

    fn registry_data(&self) -> Vec<InternalPacket> {
        // A client never builds registry data to send — it only ever
        // receives and stores it.
        Vec::new()
    }
}

// === Packet ID constants (protocol 769 / 1.21.4) ===

// Login clientbound
const LOGIN_DISCONNECT: i32 = 0x00;
const LOGIN_ENCRYPTION_REQUEST: i32 = 0x01;
const LOGIN_SUCCESS: i32 = 0x02;
const LOGIN_SET_COMPRESSION: i32 = 0x03;

// Login serverbound
const LOGIN_START: i32 = 0x00;
const LOGIN_ENCRYPTION_RESPONSE: i32 = 0x01;
const LOGIN_ACKNOWLEDGED: i32 = 0x03;

// Status
const STATUS_RESPONSE: i32 = 0x00;
const STATUS_PONG: i32 = 0x01;
const STATUS_REQUEST: i32 = 0x00;
const STATUS_PING: i32 = 0x01;

// Configuration clientbound
const CONFIG_PLUGIN_MESSAGE: i32 = 0x01;
const CONFIG_DISCONNECT: i32 = 0x02;
const CONFIG_FINISH: i32 = 0x03;
const CONFIG_REGISTRY_DATA: i32 = 0x07;
const CONFIG_KNOWN_PACKS: i32 = 0x0E;

// Configuration serverbound
const CONFIG_CLIENT_INFORMATION: i32 = 0x00;
const CONFIG_SB_PLUGIN_MESSAGE: i32 = 0x02;
const CONFIG_FINISH_ACK: i32 = 0x03;
const CONFIG_SB_KNOWN_PACKS: i32 = 0x07;

// Play clientbound
const PLAY_SPAWN_ENTITY: i32 = 0x01;
const PLAY_ACK_BLOCK_CHANGE: i32 = 0x05;
const PLAY_SET_BLOCK_DESTROY_STAGE: i32 = 0x06;
const PLAY_COMBAT_DEATH: i32 = 0x3E;
const PLAY_RESPAWN: i32 = 0x4C;
const PLAY_BLOCK_UPDATE: i32 = 0x09;
const PLAY_CHUNK_BATCH_FINISHED: i32 = 0x0C;
const PLAY_CHUNK_BATCH_START: i32 = 0x0D;
const PLAY_DECLARE_COMMANDS: i32 = 0x11;
const PLAY_SET_CONTAINER_CONTENT: i32 = 0x13;
const PLAY_SET_CONTAINER_SLOT: i32 = 0x15;
const PLAY_DISCONNECT: i32 = 0x1D;
const PLAY_TELEPORT_ENTITY: i32 = 0x20;
const PLAY_UNLOAD_CHUNK: i32 = 0x22;
const PLAY_GAME_EVENT: i32 = 0x23;
const PLAY_KEEP_ALIVE: i32 = 0x27;
const PLAY_CHUNK_DATA: i32 = 0x28;
const PLAY_LOGIN: i32 = 0x2C;
const PLAY_UPDATE_ENTITY_POSITION: i32 = 0x2F;
const PLAY_UPDATE_ENTITY_POSITION_AND_ROTATION: i32 = 0x30;
const PLAY_UPDATE_ENTITY_ROTATION: i32 = 0x32;
const PLAY_PLAYER_INFO_REMOVE: i32 = 0x3F;
const PLAY_PLAYER_INFO_UPDATE: i32 = 0x40;
const PLAY_SYNC_PLAYER_POS: i32 = 0x42;
const PLAY_REMOVE_ENTITIES: i32 = 0x47;
const PLAY_SET_HEAD_ROTATION: i32 = 0x4D;
const PLAY_SET_CENTER_CHUNK: i32 = 0x58;
const PLAY_SET_DEFAULT_SPAWN: i32 = 0x5B;
const PLAY_SET_ENTITY_METADATA: i32 = 0x5D;
const PLAY_SET_ENTITY_VELOCITY: i32 = 0x5F;
const PLAY_SET_HELD_ITEM_CB: i32 = 0x63;
const PLAY_UPDATE_TIME: i32 = 0x6B;
const PLAY_SYSTEM_CHAT: i32 = 0x73;

// Play serverbound
const PLAY_CONFIRM_TELEPORT: i32 = 0x00;
const PLAY_CHAT_COMMAND: i32 = 0x05;
const PLAY_CHAT_MESSAGE: i32 = 0x07;
const PLAY_CHUNK_BATCH_RECEIVED: i32 = 0x09;
const PLAY_CLIENT_STATUS: i32 = 0x0A;
const PLAY_CLIENT_INFORMATION: i32 = 0x0C;
const PLAY_SB_KEEP_ALIVE: i32 = 0x1A;
const PLAY_SET_PLAYER_POSITION: i32 = 0x1C;
const PLAY_SET_PLAYER_POSITION_AND_ROTATION: i32 = 0x1D;
const PLAY_SET_PLAYER_ROTATION: i32 = 0x1E;
const PLAY_SET_PLAYER_MOVEMENT_FLAGS: i32 = 0x1F;
const PLAY_PLAYER_ACTION: i32 = 0x27;
const PLAY_SET_HELD_ITEM_SB: i32 = 0x33;
const PLAY_SET_CREATIVE_MODE_SLOT: i32 = 0x36;
const PLAY_USE_ITEM_ON: i32 = 0x3C;

// === Decode functions (reading packets the server sends us) ===

fn decode_handshaking(id: i32, data: &mut BytesMut) -> Result<InternalPacket> {
    match id {
        0x00 => {
            let protocol_version = read_varint(data)?;
            let server_address = read_string(data, 255)?;
            let server_port = data.get_u16();
            let next_state = read_varint(data)?;
            Ok(InternalPacket::Handshake {
                protocol_version,
                server_address,
                server_port,
                next_state,
            })
        }
        _ => unknown(id, data),
    }
}

fn decode_status(id: i32, data: &mut BytesMut) -> Result<InternalPacket> {
    match id {
        x if x == STATUS_RESPONSE => {
            let json = read_string(data, 32767)?;
            Ok(InternalPacket::StatusResponse { json })
        }
        x if x == STATUS_PONG => Ok(InternalPacket::PongResponse {
            payload: data.get_i64(),
        }),
        _ => unknown(id, data),
    }
}

fn decode_login(id: i32, data: &mut BytesMut) -> Result<InternalPacket> {
    match id {
        x if x == LOGIN_DISCONNECT => {
            let reason = read_text_component(data)?;
            Ok(InternalPacket::Disconnect { reason })
        }
        x if x == LOGIN_ENCRYPTION_REQUEST => {
            let server_id = read_string(data, 20)?;
            let public_key = read_byte_array(data)?;
            let verify_token = read_byte_array(data)?;
            Ok(InternalPacket::EncryptionRequest {
                server_id,
                public_key,
                verify_token,
            })
        }
        x if x == LOGIN_SUCCESS => {
            let uuid = read_uuid(data)?;
            let name = read_string(data, 16)?;
            let prop_count = read_varint(data)? as usize;
            let mut properties = Vec::with_capacity(prop_count);
            for _ in 0..prop_count {
                let name = read_string(data, 32767)?;
                let value = read_string(data, 32767)?;
                let has_sig = data.get_u8() != 0;
                let signature = if has_sig {
                    Some(read_string(data, 32767)?)
                } else {
                    None
                };
                properties.push(ProfileProperty {
                    name,
                    value,
                    signature,
                });
            }
            Ok(InternalPacket::LoginSuccess {
                profile: GameProfile {
                    uuid,
                    name,
                    properties,
                },
            })
        }
        x if x == LOGIN_SET_COMPRESSION => Ok(InternalPacket::SetCompression {
            threshold: read_varint(data)?,
        }),
        _ => unknown(id, data),
    }
}

fn decode_configuration(id: i32, data: &mut BytesMut) -> Result<InternalPacket> {
    match id {
        x if x == CONFIG_PLUGIN_MESSAGE => {
            let channel = read_string(data, 32767)?;
            let remaining = data.to_vec();
            data.advance(remaining.len());
            Ok(InternalPacket::PluginMessage {
                channel,
                data: remaining,
            })
        }
        x if x == CONFIG_DISCONNECT => {
            let reason = read_text_component(data)?;
            Ok(InternalPacket::Disconnect { reason })
        }
        x if x == CONFIG_FINISH => Ok(InternalPacket::FinishConfiguration),
        x if x == CONFIG_REGISTRY_DATA => {
            let registry_id = read_string(data, 32767)?;
            let count = read_varint(data)? as usize;
            let mut entries = Vec::with_capacity(count);
            for _ in 0..count {
                let entry_id = read_string(data, 32767)?;
                let has_data = data.get_u8() != 0;
                let entry_data = if has_data {
                    Some(NbtValue::read_root_network(data).unwrap_or(NbtValue::Compound(Vec::new())))
                } else {
                    None
                };
                entries.push(RegistryEntry {
                    id: entry_id,
                    data: entry_data,
                });
            }
            Ok(InternalPacket::RegistryData {
                registry_id,
                entries,
            })
        }
        x if x == CONFIG_KNOWN_PACKS => {
            let count = read_varint(data)? as usize;
            let mut packs = Vec::with_capacity(count);
            for _ in 0..count {
                packs.push(KnownPack {
                    namespace: read_string(data, 32767)?,
                    id: read_string(data, 32767)?,
                    version: read_string(data, 32767)?,
                });
            }
            Ok(InternalPacket::KnownPacksRequest { packs })
        }
        _ => unknown(id, data),
    }
}

fn decode_play(id: i32, data: &mut BytesMut) -> Result<InternalPacket> {
    match id {
        x if x == PLAY_SPAWN_ENTITY => {
            let entity_id = read_varint(data)?;
            let entity_uuid = read_uuid(data)?;
            let entity_type = read_varint(data)?;
            let x_pos = data.get_f64();
            let y_pos = data.get_f64();
            let z_pos = data.get_f64();
            let pitch = data.get_u8();
            let yaw = data.get_u8();
            let head_yaw = data.get_u8();
            let data_field = read_varint(data)?;
            let velocity_x = data.get_i16();
            let velocity_y = data.get_i16();
            let velocity_z = data.get_i16();
            Ok(InternalPacket::SpawnEntity {
                entity_id,
                entity_uuid,
                entity_type,
                x: x_pos,
                y: y_pos,
                z: z_pos,
                pitch,
                yaw,
                head_yaw,
                data: data_field,
                velocity_x,
                velocity_y,
                velocity_z,
            })
        }
        x if x == PLAY_ACK_BLOCK_CHANGE => Ok(InternalPacket::AcknowledgeBlockChange {
            sequence: read_varint(data)?,
        }),
        x if x == PLAY_SET_BLOCK_DESTROY_STAGE => {
            let entity_id = read_varint(data)?;
            let position = BlockPos::decode(data.get_u64());
            let destroy_stage = data.get_i8();
            Ok(InternalPacket::SetBlockDestroyStage {
                entity_id,
                position,
                destroy_stage,
            })
        }
        x if x == PLAY_BLOCK_UPDATE => {
            let position = BlockPos::decode(data.get_u64());
            let block_id = read_varint(data)?;
            Ok(InternalPacket::BlockUpdate { position, block_id })
        }
        x if x == PLAY_CHUNK_BATCH_FINISHED => Ok(InternalPacket::ChunkBatchFinished {
            batch_size: read_varint(data)?,
        }),
        x if x == PLAY_CHUNK_BATCH_START => Ok(InternalPacket::ChunkBatchStart),
        x if x == PLAY_DECLARE_COMMANDS => {
            let node_count = read_varint(data)? as usize;
            let mut nodes = Vec::with_capacity(node_count);
            for _ in 0..node_count {
                let n = CommandGraphNode::decode(data)?;
                nodes.push(CommandNode {
                    flags: n.flags,
                    children: n.children,
                    name: n.name,
                    parser: n.parser_id.map(|p| p.to_string()),
                    parser_properties: None,
                });
            }
            let root_index = read_varint(data)?;
            Ok(InternalPacket::DeclareCommands { nodes, root_index })
        }
        x if x == PLAY_SET_CONTAINER_CONTENT => {
            let window_id = data.get_u8();
            let state_id = read_varint(data)?;
            let count = read_varint(data)? as usize;
            let mut slots = Vec::with_capacity(count);
            for _ in 0..count {
                slots.push(read_slot(data)?);
            }
            let carried_item = read_slot(data)?;
            Ok(InternalPacket::SetContainerContent {
                window_id,
                state_id,
                slots,
                carried_item,
            })
        }
        x if x == PLAY_SET_CONTAINER_SLOT => {
            let window_id = data.get_i8();
            let state_id = read_varint(data)?;
            let slot = data.get_i16();
            let item = read_slot(data)?;
            Ok(InternalPacket::SetContainerSlot {
                window_id,
                state_id,
                slot,
                item,
            })
        }
        x if x == PLAY_DISCONNECT => {
            let reason = read_text_component(data)?;
            Ok(InternalPacket::Disconnect { reason })
        }
        x if x == PLAY_TELEPORT_ENTITY => {
            let entity_id = read_varint(data)?;
            let x_pos = data.get_f64();
            let y_pos = data.get_f64();
            let z_pos = data.get_f64();
            let _vel = (data.get_f64(), data.get_f64(), data.get_f64());
            let yaw = data.get_f32();
            let pitch = data.get_f32();
            let on_ground = data.get_u8() != 0;
            Ok(InternalPacket::TeleportEntity {
                entity_id,
                x: x_pos,
                y: y_pos,
                z: z_pos,
                yaw,
                pitch,
                on_ground,
            })
        }
        x if x == PLAY_UNLOAD_CHUNK => {
            let chunk_z = data.get_i32();
            let chunk_x = data.get_i32();
            Ok(InternalPacket::UnloadChunk { chunk_x, chunk_z })
        }
        x if x == PLAY_GAME_EVENT => Ok(InternalPacket::GameEvent {
            event: data.get_u8(),
            value: data.get_f32(),
        }),
        x if x == PLAY_KEEP_ALIVE => Ok(InternalPacket::KeepAliveClientbound {
            id: data.get_i64(),
        }),
        x if x == PLAY_CHUNK_DATA => {
            let chunk_x = data.get_i32();
            let chunk_z = data.get_i32();
            let heightmaps = NbtValue::read_root_network(data)
                .unwrap_or(NbtValue::Compound(Vec::new()));
            let chunk_data = read_byte_array(data)?;
            let block_entity_count = read_varint(data)? as usize;
            let mut block_entities = Vec::with_capacity(block_entity_count);
            for _ in 0..block_entity_count {
                let packed_xz = data.get_u8();
                let y = data.get_i16();
                let entity_type = read_varint(data)?;
                let nbt = NbtValue::read_root_network(data)
                    .unwrap_or(NbtValue::Compound(Vec::new()));
                block_entities.push(BlockEntity {
                    packed_xz,
                    y,
                    entity_type,
                    data: nbt,
                });
            }
            let light_data = decode_light_data(data)?;
            Ok(InternalPacket::ChunkDataAndUpdateLight {
                chunk_x,
                chunk_z,
                heightmaps,
                data: chunk_data,
                block_entities,
                light_data,
            })
        }
        x if x == PLAY_LOGIN => {
            let entity_id = data.get_i32();
            let is_hardcore = data.get_u8() != 0;
            let dim_count = read_varint(data)? as usize;
            let mut dimension_names = Vec::with_capacity(dim_count);
            for _ in 0..dim_count {
                dimension_names.push(read_string(data, 32767)?);
            }
            let max_players = read_varint(data)?;
            let view_distance = read_varint(data)?;
            let simulation_distance = read_varint(data)?;
            let reduced_debug_info = data.get_u8() != 0;
            let enable_respawn_screen = data.get_u8() != 0;
            let do_limited_crafting = data.get_u8() != 0;
            let dimension_type = read_varint(data)?;
            let dimension_name = read_string(data, 32767)?;
            let hashed_seed = data.get_i64();
            let game_mode = match data.get_u8() {
                1 => GameMode::Creative,
                2 => GameMode::Adventure,
                3 => GameMode::Spectator,
                _ => GameMode::Survival,
            };
            let previous_game_mode = data.get_i8();
            let is_debug = data.get_u8() != 0;
            let is_flat = data.get_u8() != 0;
            let has_death_location = data.get_u8() != 0;
            if has_death_location {
                read_string(data, 32767)?;
                data.get_u64();
            }
            let portal_cooldown = read_varint(data)?;
            data.get_u8(); // sea_level, not modelled here
            let enforces_secure_chat = data.get_u8() != 0;
            Ok(InternalPacket::JoinGame {
                entity_id,
                is_hardcore,
                dimension_names,
                max_players,
                view_distance,
                simulation_distance,
                reduced_debug_info,
                enable_respawn_screen,
                do_limited_crafting,
                dimension_type,
                dimension_name,
                hashed_seed,
                game_mode,
                previous_game_mode,
                is_debug,
                is_flat,
                portal_cooldown,
                enforces_secure_chat,
            })
        }
        x if x == PLAY_UPDATE_ENTITY_POSITION => {
            let entity_id = read_varint(data)?;
            let delta_x = data.get_i16();
            let delta_y = data.get_i16();
            let delta_z = data.get_i16();
            let on_ground = data.get_u8() != 0;
            Ok(InternalPacket::UpdateEntityPosition {
                entity_id,
                delta_x,
                delta_y,
                delta_z,
                on_ground,
            })
        }
        x if x == PLAY_UPDATE_ENTITY_POSITION_AND_ROTATION => {
            let entity_id = read_varint(data)?;
            let delta_x = data.get_i16();
            let delta_y = data.get_i16();
            let delta_z = data.get_i16();
            let yaw = read_angle(data)? as u8;
            let pitch = read_angle(data)? as u8;
            let on_ground = data.get_u8() != 0;
            Ok(InternalPacket::UpdateEntityPositionAndRotation {
                entity_id,
                delta_x,
                delta_y,
                delta_z,
                yaw,
                pitch,
                on_ground,
            })
        }
        x if x == PLAY_UPDATE_ENTITY_ROTATION => {
            let entity_id = read_varint(data)?;
            let yaw = read_angle(data)? as u8;
            let pitch = read_angle(data)? as u8;
            let on_ground = data.get_u8() != 0;
            Ok(InternalPacket::UpdateEntityRotation {
                entity_id,
                yaw,
                pitch,
                on_ground,
            })
        }
        x if x == PLAY_PLAYER_INFO_REMOVE => {
            let count = read_varint(data)? as usize;
            let mut uuids = Vec::with_capacity(count);
            for _ in 0..count {
                uuids.push(read_uuid(data)?);
            }
            Ok(InternalPacket::PlayerInfoRemove { uuids })
        }
        x if x == PLAY_PLAYER_INFO_UPDATE => decode_player_info_update(data),
        x if x == PLAY_SYNC_PLAYER_POS => {
            let x_pos = data.get_f64();
            let y_pos = data.get_f64();
            let z_pos = data.get_f64();
            let yaw = data.get_f32();
            let pitch = data.get_f32();
            let flags = data.get_u8();
            let teleport_id = read_varint(data)?;
            Ok(InternalPacket::SynchronizePlayerPosition {
                position: Vec3d::new(x_pos, y_pos, z_pos),
                yaw,
                pitch,
                flags,
                teleport_id,
            })
        }
        x if x == PLAY_REMOVE_ENTITIES => {
            let count = read_varint(data)? as usize;
            let mut entity_ids = Vec::with_capacity(count);
            for _ in 0..count {
                entity_ids.push(read_varint(data)?);
            }
            Ok(InternalPacket::RemoveEntities { entity_ids })
        }
        x if x == PLAY_SET_HEAD_ROTATION => {
            let entity_id = read_varint(data)?;
            let head_yaw = read_angle(data)? as u8;
            Ok(InternalPacket::SetHeadRotation {
                entity_id,
                head_yaw,
            })
        }
        x if x == PLAY_SET_CENTER_CHUNK => {
            let chunk_x = read_varint(data)?;
            let chunk_z = read_varint(data)?;
            Ok(InternalPacket::SetCenterChunk { chunk_x, chunk_z })
        }
        x if x == PLAY_SET_DEFAULT_SPAWN => {
            let position = BlockPos::decode(data.get_u64());
            let angle = data.get_f32();
            Ok(InternalPacket::SetDefaultSpawnPosition { position, angle })
        }
        x if x == PLAY_SET_ENTITY_METADATA => {
            let entity_id = read_varint(data)?;
            let fields = EntityMetadataField::decode_all(data)?;
            let metadata = fields
                .into_iter()
                .map(|f| EntityMetadataEntry {
                    index: f.index,
                    type_id: f.type_id,
                    value: f.value,
                })
                .collect();
            Ok(InternalPacket::SetEntityMetadata {
                entity_id,
                metadata,
            })
        }
        x if x == PLAY_SET_ENTITY_VELOCITY => {
            let entity_id = read_varint(data)?;
            let velocity_x = data.get_i16();
            let velocity_y = data.get_i16();
            let velocity_z = data.get_i16();
            Ok(InternalPacket::SetEntityVelocity {
                entity_id,
                velocity_x,
                velocity_y,
                velocity_z,
            })
        }
        x if x == PLAY_SET_HELD_ITEM_CB => Ok(InternalPacket::SetHeldItem {
            slot: data.get_i8(),
        }),
        x if x == PLAY_UPDATE_TIME => {
            let world_age = data.get_i64();
            let time_of_day = data.get_i64();
            Ok(InternalPacket::UpdateTime {
                world_age,
                time_of_day,
            })
        }
        x if x == PLAY_SYSTEM_CHAT => {
            let content = read_text_component(data)?;
            let overlay = data.get_u8() != 0;
            Ok(InternalPacket::SystemChatMessage { content, overlay })
        }
        x if x == PLAY_COMBAT_DEATH => {
            let player_id = read_varint(data)?;
            let message = read_text_component(data)?;
            Ok(InternalPacket::CombatDeath { player_id, message })
        }
        x if x == PLAY_RESPAWN => {
            let dimension_type = read_varint(data)?;
            let dimension_name = read_string(data, 32767)?;
            let hashed_seed = data.get_i64();
            let game_mode = match data.get_u8() {
                1 => GameMode::Creative,
                2 => GameMode::Adventure,
                3 => GameMode::Spectator,
                _ => GameMode::Survival,
            };
            let previous_game_mode = data.get_i8();
            let is_debug = data.get_u8() != 0;
            let is_flat = data.get_u8() != 0;
            let has_death_location = data.get_u8() != 0;
            let death_location = if has_death_location {
                let dim = read_string(data, 32767)?;
                let pos = BlockPos::decode(data.get_u64());
                Some((dim, pos))
            } else {
                None
            };
            let portal_cooldown = read_varint(data)?;
            let sea_level = read_varint(data)?;
            let flags = data.get_u8();
            Ok(InternalPacket::Respawn {
                dimension_type,
                dimension_name,
                hashed_seed,
                game_mode,
                previous_game_mode,
                is_debug,
                is_flat,
                death_location,
                portal_cooldown,
                sea_level,
                flags,
            })
        }
        _ => unknown(id, data),
    }
}

fn decode_player_info_update(data: &mut BytesMut) -> Result<InternalPacket> {
    let actions = data.get_u8();
    let count = read_varint(data)? as usize;
    let mut players = Vec::with_capacity(count);
    for _ in 0..count {
        let uuid = read_uuid(data)?;
        let mut name = None;
        let mut properties = Vec::new();
        let mut game_mode = None;
        let mut listed = None;
        let mut ping = None;
        let mut display_name = None;

        if actions & player_info_actions::ADD_PLAYER != 0 {
            name = Some(read_string(data, 16)?);
            let prop_count = read_varint(data)? as usize;
            for _ in 0..prop_count {
                let pname = read_string(data, 32767)?;
                let pvalue = read_string(data, 32767)?;
                let has_sig = data.get_u8() != 0;
                let sig = if has_sig {
                    Some(read_string(data, 32767)?)
                } else {
                    None
                };
                properties.push((pname, pvalue, sig));
            }
        }
        if actions & player_info_actions::INITIALIZE_CHAT != 0 {
            let has_sig_data = data.get_u8() != 0;
            if has_sig_data {
                read_uuid(data)?;
                let _public_key_expiry_time = data.get_i64();
                let key_len = read_varint(data)? as usize;
                data.advance(key_len);
                let sig_len = read_varint(data)? as usize;
                data.advance(sig_len);
            }
        }
        if actions & player_info_actions::UPDATE_GAME_MODE != 0 {
            game_mode = Some(read_varint(data)?);
        }
        if actions & player_info_actions::UPDATE_LISTED != 0 {
            listed = Some(data.get_u8() != 0);
        }
        if actions & player_info_actions::UPDATE_LATENCY != 0 {
            ping = Some(read_varint(data)?);
        }
        if actions & player_info_actions::UPDATE_DISPLAY_NAME != 0 {
            let has_display = data.get_u8() != 0;
            if has_display {
                display_name = Some(read_text_component(data)?);
            }
        }
        let mut list_priority = None;
        if actions & player_info_actions::UPDATE_LIST_PRIORITY != 0 {
            list_priority = Some(read_varint(data)?);
        }
        let mut show_hat = None;
        if actions & player_info_actions::UPDATE_HAT != 0 {
            show_hat = Some(data.get_u8() != 0);
        }
        players.push(PlayerInfoEntry {
            uuid,
            name,
            properties,
            game_mode,
            listed,
            ping,
            display_name,
            list_priority,
            show_hat,
        });
    }
    Ok(InternalPacket::PlayerInfoUpdate { actions, players })
}

fn decode_light_data(data: &mut BytesMut) -> Result<ChunkLightData> {
    let sky_light_mask = read_bitset(data)?.into_iter().map(|v| v as i64).collect();
    let block_light_mask = read_bitset(data)?.into_iter().map(|v| v as i64).collect();
    let empty_sky_light_mask = read_bitset(data)?.into_iter().map(|v| v as i64).collect();
    let empty_block_light_mask = read_bitset(data)?.into_iter().map(|v| v as i64).collect();

    let sky_count = read_varint(data)? as usize;
    let mut sky_light_arrays = Vec::with_capacity(sky_count);
    for _ in 0..sky_count {
        sky_light_arrays.push(read_byte_array(data)?);
    }
    let block_count = read_varint(data)? as usize;
    let mut block_light_arrays = Vec::with_capacity(block_count);
    for _ in 0..block_count {
        block_light_arrays.push(read_byte_array(data)?);
    }

    Ok(ChunkLightData {
        sky_light_mask,
        block_light_mask,
        empty_sky_light_mask,
        empty_block_light_mask,
        sky_light_arrays,
        block_light_arrays,
    })
}

fn unknown(id: i32, data: &mut BytesMut) -> Result<InternalPacket> {
    Ok(InternalPacket::Unknown {
        packet_id: id,
        data: data.to_vec(),
    })
}

// === Encode functions (writing packets this client sends) ===

fn encode_handshaking(packet: &InternalPacket) -> Result<BytesMut> {
    let mut buf = BytesMut::new();
    match packet {
        InternalPacket::Handshake {
            protocol_version,
            server_address,
            server_port,
            next_state,
        } => {
            write_varint(&mut buf, 0x00);
            write_varint(&mut buf, *protocol_version);
            write_string(&mut buf, server_address);
            buf.put_u16(*server_port);
            write_varint(&mut buf, *next_state);
        }
        _ => bail!("cannot encode {:?} in Handshaking state", std::mem::discriminant(packet)),
    }
    Ok(buf)
}

fn encode_status(packet: &InternalPacket) -> Result<BytesMut> {
    let mut buf = BytesMut::new();
    match packet {
        InternalPacket::StatusRequest => write_varint(&mut buf, STATUS_REQUEST),
        InternalPacket::PingRequest { payload } => {
            write_varint(&mut buf, STATUS_PING);
            buf.put_i64(*payload);
        }
        _ => bail!("cannot encode {:?} in Status state", std::mem::discriminant(packet)),
    }
    Ok(buf)
}

fn encode_login(packet: &InternalPacket) -> Result<BytesMut> {
    let mut buf = BytesMut::new();
    match packet {
        InternalPacket::LoginStart { name, uuid } => {
            write_varint(&mut buf, LOGIN_START);
            write_string(&mut buf, name);
            write_uuid(&mut buf, uuid);
        }
        InternalPacket::EncryptionResponse {
            shared_secret,
            verify_token,
        } => {
            write_varint(&mut buf, LOGIN_ENCRYPTION_RESPONSE);
            write_byte_array(&mut buf, shared_secret);
            write_byte_array(&mut buf, verify_token);
        }
        InternalPacket::LoginAcknowledged => write_varint(&mut buf, LOGIN_ACKNOWLEDGED),
        _ => bail!("cannot encode {:?} in Login state", std::mem::discriminant(packet)),
    }
    Ok(buf)
}

fn encode_configuration(packet: &InternalPacket) -> Result<BytesMut> {
    let mut buf = BytesMut::new();
    match packet {
        InternalPacket::ClientInformation {
            locale,
            view_distance,
            chat_mode,
            chat_colors,
            skin_parts,
            main_hand,
            text_filtering,
            allow_listing,
        } => {
            write_varint(&mut buf, CONFIG_CLIENT_INFORMATION);
            write_string(&mut buf, locale);
            buf.put_i8(*view_distance);
            write_varint(&mut buf, *chat_mode);
            buf.put_u8(*chat_colors as u8);
            buf.put_u8(*skin_parts);
            write_varint(&mut buf, *main_hand);
            buf.put_u8(*text_filtering as u8);
            buf.put_u8(*allow_listing as u8);
        }
        InternalPacket::PluginMessage { channel, data } => {
            write_varint(&mut buf, CONFIG_SB_PLUGIN_MESSAGE);
            write_string(&mut buf, channel);
            buf.extend_from_slice(data);
        }
        InternalPacket::FinishConfigurationAck => write_varint(&mut buf, CONFIG_FINISH_ACK),
        InternalPacket::KnownPacksResponse { packs } => {
            write_varint(&mut buf, CONFIG_SB_KNOWN_PACKS);
            write_varint(&mut buf, packs.len() as i32);
            for pack in packs {
                write_string(&mut buf, &pack.namespace);
                write_string(&mut buf, &pack.id);
                write_string(&mut buf, &pack.version);
            }
        }
        _ => bail!(
            "cannot encode {:?} in Configuration state",
            std::mem::discriminant(packet)
        ),
    }
    Ok(buf)
}

fn encode_play(packet: &InternalPacket) -> Result<BytesMut> {
    let mut buf = BytesMut::new();
    match packet {
        InternalPacket::ConfirmTeleportation { teleport_id } => {
            write_varint(&mut buf, PLAY_CONFIRM_TELEPORT);
            write_varint(&mut buf, *teleport_id);
        }
        InternalPacket::ChatCommand { command } => {
            write_varint(&mut buf, PLAY_CHAT_COMMAND);
            write_string(&mut buf, command);
        }
        InternalPacket::ChatMessage {
            message,
            timestamp,
            salt,
            has_signature,
            signature,
            offset,
            acknowledged,
        } => {
            write_varint(&mut buf, PLAY_CHAT_MESSAGE);
            write_string(&mut buf, message);
            buf.put_i64(*timestamp);
            buf.put_i64(*salt);
            buf.put_u8(*has_signature as u8);
            if let Some(sig) = signature {
                buf.extend_from_slice(sig);
            }
            write_varint(&mut buf, *offset);
            buf.extend_from_slice(acknowledged);
        }
        InternalPacket::PluginMessage { channel, data } => {
            write_varint(&mut buf, 0x14); // ServerboundPluginMessage
            write_string(&mut buf, channel);
            buf.extend_from_slice(data);
        }
        InternalPacket::ClientInformation {
            locale,
            view_distance,
            chat_mode,
            chat_colors,
            skin_parts,
            main_hand,
            text_filtering,
            allow_listing,
        } => {
            write_varint(&mut buf, PLAY_CLIENT_INFORMATION);
            write_string(&mut buf, locale);
            buf.put_i8(*view_distance);
            write_varint(&mut buf, *chat_mode);
            buf.put_u8(*chat_colors as u8);
            buf.put_u8(*skin_parts);
            write_varint(&mut buf, *main_hand);
            buf.put_u8(*text_filtering as u8);
            buf.put_u8(*allow_listing as u8);
        }
        InternalPacket::KeepAliveServerbound { id } => {
            write_varint(&mut buf, PLAY_SB_KEEP_ALIVE);
            buf.put_i64(*id);
        }
        InternalPacket::PlayerPosition { x, y, z, on_ground } => {
            write_varint(&mut buf, PLAY_SET_PLAYER_POSITION);
            buf.put_f64(*x);
            buf.put_f64(*y);
            buf.put_f64(*z);
            buf.put_u8(*on_ground as u8);
        }
        InternalPacket::PlayerPositionAndRotation {
            x,
            y,
            z,
            yaw,
            pitch,
            on_ground,
        } => {
            write_varint(&mut buf, PLAY_SET_PLAYER_POSITION_AND_ROTATION);
            buf.put_f64(*x);
            buf.put_f64(*y);
            buf.put_f64(*z);
            buf.put_f32(*yaw);
            buf.put_f32(*pitch);
            buf.put_u8(*on_ground as u8);
        }
        InternalPacket::PlayerRotation {
            yaw,
            pitch,
            on_ground,
        } => {
            write_varint(&mut buf, PLAY_SET_PLAYER_ROTATION);
            buf.put_f32(*yaw);
            buf.put_f32(*pitch);
            buf.put_u8(*on_ground as u8);
        }
        InternalPacket::PlayerOnGround { on_ground } => {
            write_varint(&mut buf, PLAY_SET_PLAYER_MOVEMENT_FLAGS);
            buf.put_u8(*on_ground as u8);
        }
        InternalPacket::BlockDig {
            status,
            position,
            face,
            sequence,
        } => {
            write_varint(&mut buf, PLAY_PLAYER_ACTION);
            write_varint(&mut buf, *status);
            buf.put_u64(position.encode());
            buf.put_u8(*face);
            write_varint(&mut buf, *sequence);
        }
        InternalPacket::HeldItemChange { slot } => {
            write_varint(&mut buf, PLAY_SET_HELD_ITEM_SB);
            buf.put_i16(*slot);
        }
        InternalPacket::CreativeInventoryAction { slot, item } => {
            write_varint(&mut buf, PLAY_SET_CREATIVE_MODE_SLOT);
            buf.put_i16(*slot);
            write_slot(&mut buf, item);
        }
        InternalPacket::BlockPlace {
            hand,
            position,
            face,
            cursor_x,
            cursor_y,
            cursor_z,
            inside_block,
            sequence,
        } => {
            write_varint(&mut buf, PLAY_USE_ITEM_ON);
            write_varint(&mut buf, *hand);
            buf.put_u64(position.encode());
            write_varint(&mut buf, *face as i32);
            buf.put_f32(*cursor_x);
            buf.put_f32(*cursor_y);
            buf.put_f32(*cursor_z);
            buf.put_u8(*inside_block as u8);
            write_varint(&mut buf, *sequence);
        }
        InternalPacket::ClientStatus { action_id } => {
            write_varint(&mut buf, PLAY_CLIENT_STATUS);
            write_varint(&mut buf, *action_id);
        }
        InternalPacket::Unknown { .. } => {
            // A chunk-batch-received acknowledgement (0x09) carries only
            // the float the server told us via ChunkBatchFinished — callers
            // construct it directly rather than routing it through Unknown.
            bail!("cannot re-encode an Unknown placeholder packet");
        }
        _ => bail!("cannot encode {:?} in Play state", std::mem::discriminant(packet)),
    }
    Ok(buf)
}

/// Build the Chunk Batch Received acknowledgement (0x09), which carries a
/// single float and has no InternalPacket variant of its own.
pub fn encode_chunk_batch_received(chunks_per_tick: f32) -> BytesMut {
    let mut buf = BytesMut::new();
    write_varint(&mut buf, PLAY_CHUNK_BATCH_RECEIVED);
    buf.put_f32(chunks_per_tick);
    buf
}
