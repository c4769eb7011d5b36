use blockwire_types::{GameMode, Vec3d};
use blockwire_world::Chunk;
use std::collections::HashMap;
use uuid::Uuid;

/// Derive the offline-mode UUID a vanilla server expects for a given player
/// name: MD5 of `"OfflinePlayer:<name>"`, with the version (3) and RFC4122
/// variant bits forced per the same scheme the Notchian server uses.
pub fn offline_uuid(name: &str) -> Uuid {
    let digest = md5::compute(format!("OfflinePlayer:{}", name));
    let mut bytes = *digest;
    bytes[6] = (bytes[6] & 0x0F) | 0x30; // version 3
    bytes[8] = (bytes[8] & 0x3F) | 0x80; // RFC4122 variant
    Uuid::from_bytes(bytes)
}

/// This client's own view of itself: identity, last known position, and
/// vitals as reported by the server.
#[derive(Debug, Clone)]
pub struct Player {
    pub name: String,
    pub offline_uuid: Uuid,
    pub server_uuid: Option<Uuid>,
    pub entity_id: i32,
    pub dimension: String,
    pub position: Vec3d,
    pub yaw: f32,
    pub pitch: f32,
    pub on_ground: bool,
    pub health: f32,
    pub food: i32,
    pub game_mode: GameMode,
}

impl Player {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let offline_uuid = offline_uuid(&name);
        Self {
            name,
            offline_uuid,
            server_uuid: None,
            entity_id: 0,
            dimension: String::new(),
            position: Vec3d::new(0.0, 0.0, 0.0),
            yaw: 0.0,
            pitch: 0.0,
            on_ground: false,
            health: 20.0,
            food: 20,
            game_mode: GameMode::Survival,
        }
    }
}

/// Minimal tracked state for another entity in view.
#[derive(Debug, Clone)]
pub struct TrackedEntity {
    pub entity_id: i32,
    pub entity_type: i32,
    pub uuid: Uuid,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: u8,
    pub pitch: u8,
}

/// All entities currently in view, keyed by entity ID. Entities are added
/// on spawn and removed on RemoveEntities; applying a move packet for an
/// entity ID that was never spawned (or already removed) is a no-op —
/// servers occasionally send late position updates for an entity whose
/// despawn already arrived.
#[derive(Debug, Default)]
pub struct EntityMap {
    entities: HashMap<i32, TrackedEntity>,
}

impl EntityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: TrackedEntity) {
        self.entities.insert(entity.entity_id, entity);
    }

    pub fn remove(&mut self, entity_id: i32) {
        self.entities.remove(&entity_id);
    }

    pub fn get(&self, entity_id: i32) -> Option<&TrackedEntity> {
        self.entities.get(&entity_id)
    }

    /// Apply a relative move in 1/4096ths-of-a-block fixed point, as carried
    /// by UpdateEntityPosition(AndRotation).
    pub fn apply_delta(&mut self, entity_id: i32, delta_x: i16, delta_y: i16, delta_z: i16) {
        if let Some(entity) = self.entities.get_mut(&entity_id) {
            entity.x += delta_x as f64 / 4096.0;
            entity.y += delta_y as f64 / 4096.0;
            entity.z += delta_z as f64 / 4096.0;
        }
    }

    pub fn set_rotation(&mut self, entity_id: i32, yaw: u8, pitch: u8) {
        if let Some(entity) = self.entities.get_mut(&entity_id) {
            entity.yaw = yaw;
            entity.pitch = pitch;
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Loaded chunks, keyed by (dimension, x, z) so chunks from a dimension the
/// client has left (but not explicitly cleared) can never alias chunks at
/// the same coordinates in the current one.
/// Insertion is idempotent (a re-sent chunk just replaces the old one);
/// deletion of a chunk that was never loaded is tolerated.
#[derive(Debug, Default)]
pub struct ChunkManager {
    chunks: HashMap<(u8, i32, i32), Chunk>,
}

impl ChunkManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, dimension: u8, x: i32, z: i32, chunk: Chunk) {
        self.chunks.insert((dimension, x, z), chunk);
    }

    pub fn remove(&mut self, dimension: u8, x: i32, z: i32) {
        self.chunks.remove(&(dimension, x, z));
    }

    pub fn get(&self, dimension: u8, x: i32, z: i32) -> Option<&Chunk> {
        self.chunks.get(&(dimension, x, z))
    }

    pub fn get_mut(&mut self, dimension: u8, x: i32, z: i32) -> Option<&mut Chunk> {
        self.chunks.get_mut(&(dimension, x, z))
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_uuid_is_version_3() {
        let uuid = offline_uuid("Notch");
        let bytes = uuid.as_bytes();
        assert_eq!(bytes[6] & 0xF0, 0x30);
        assert_eq!(bytes[8] & 0xC0, 0x80);
    }

    #[test]
    fn test_offline_uuid_deterministic() {
        assert_eq!(offline_uuid("Steve"), offline_uuid("Steve"));
        assert_ne!(offline_uuid("Steve"), offline_uuid("Alex"));
    }

    #[test]
    fn test_entity_map_delta_and_remove() {
        let mut map = EntityMap::new();
        map.insert(TrackedEntity {
            entity_id: 7,
            entity_type: 1,
            uuid: Uuid::nil(),
            x: 0.0,
            y: 0.0,
            z: 0.0,
            yaw: 0,
            pitch: 0,
        });
        map.apply_delta(7, 4096, -8192, 0);
        assert_eq!(map.get(7).unwrap().x, 1.0);
        assert_eq!(map.get(7).unwrap().y, -2.0);

        map.remove(7);
        assert!(map.get(7).is_none());
        // Removing twice, or deltaing a gone entity, is a no-op.
        map.remove(7);
        map.apply_delta(7, 1, 1, 1);
    }

    #[test]
    fn test_chunk_manager_idempotent_insert() {
        let mut mgr = ChunkManager::new();
        mgr.insert(0, 3, -2, Chunk::new());
        mgr.insert(0, 3, -2, Chunk::new());
        assert_eq!(mgr.len(), 1);
        mgr.remove(0, 99, 99);
        assert_eq!(mgr.len(), 1);
        mgr.insert(1, 3, -2, Chunk::new());
        assert_eq!(mgr.len(), 2, "same (x, z) in a different dimension is a distinct chunk");
    }
}
