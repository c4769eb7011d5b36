//! Runtime block/item registry lookup.
//!
//! The wire protocol only ever carries numeric block-state and item IDs —
//! turning those into names (and back) is delegated to a PrismarineJS-style
//! `blocks.json`/`items.json` data set, loaded at startup rather than baked
//! in at compile time. This lets the dictionary track new game versions
//! without a rebuild.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read {0}: {1}")]
    Io(std::path::PathBuf, std::io::Error),
    #[error("invalid JSON in {0}: {1}")]
    Json(std::path::PathBuf, serde_json::Error),
}

type DataResult<T> = Result<T, DataError>;

#[derive(Debug, Clone, Deserialize)]
struct RawBlock {
    id: i32,
    name: String,
    #[serde(rename = "minStateId")]
    min_state_id: i32,
    #[serde(rename = "maxStateId")]
    max_state_id: i32,
    #[serde(rename = "defaultState")]
    default_state: i32,
    #[serde(default)]
    hardness: f64,
    #[serde(default = "default_true")]
    diggable: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
struct RawItem {
    id: i32,
    name: String,
    #[serde(rename = "stackSize", default = "default_stack_size")]
    stack_size: i32,
}

fn default_stack_size() -> i32 {
    64
}

/// A block state entry, one per state ID in `[min_state_id, max_state_id]`.
#[derive(Debug, Clone)]
pub struct BlockStateInfo {
    pub name: String,
    pub block_id: i32,
    pub hardness: f64,
    pub diggable: bool,
    /// Offset of this state within the block's own state range.
    pub state_index: i32,
}

#[derive(Debug, Clone)]
pub struct ItemInfo {
    pub id: i32,
    pub name: String,
    pub stack_size: i32,
}

/// Flattened, query-by-ID view over a loaded block/item data set.
#[derive(Debug, Clone, Default)]
pub struct BlockDictionary {
    states_by_id: HashMap<i32, BlockStateInfo>,
    default_state_by_name: HashMap<String, i32>,
    items_by_id: HashMap<i32, ItemInfo>,
    item_id_by_name: HashMap<String, i32>,
}

impl BlockDictionary {
    /// Load `blocks.json` and `items.json` from the given directory.
    /// Each file is a JSON array in PrismarineJS's `minecraft-data` shape.
    pub fn load(dir: &Path) -> DataResult<Self> {
        let blocks = read_json_array::<RawBlock>(&dir.join("blocks.json"))?;
        let items = read_json_array::<RawItem>(&dir.join("items.json"))?;

        let mut states_by_id = HashMap::new();
        let mut default_state_by_name = HashMap::new();
        for block in &blocks {
            default_state_by_name.insert(block.name.clone(), block.default_state);
            for state_id in block.min_state_id..=block.max_state_id {
                states_by_id.insert(
                    state_id,
                    BlockStateInfo {
                        name: block.name.clone(),
                        block_id: block.id,
                        hardness: block.hardness,
                        diggable: block.diggable,
                        state_index: state_id - block.min_state_id,
                    },
                );
            }
        }

        let mut items_by_id = HashMap::new();
        let mut item_id_by_name = HashMap::new();
        for item in items {
            item_id_by_name.insert(item.name.clone(), item.id);
            items_by_id.insert(
                item.id,
                ItemInfo {
                    id: item.id,
                    name: item.name,
                    stack_size: item.stack_size,
                },
            );
        }

        tracing::info!(
            states = states_by_id.len(),
            items = items_by_id.len(),
            "loaded block dictionary"
        );

        Ok(Self {
            states_by_id,
            default_state_by_name,
            items_by_id,
            item_id_by_name,
        })
    }

    pub fn state(&self, state_id: i32) -> Option<&BlockStateInfo> {
        self.states_by_id.get(&state_id)
    }

    pub fn default_state_for(&self, block_name: &str) -> Option<i32> {
        self.default_state_by_name.get(block_name).copied()
    }

    pub fn item(&self, item_id: i32) -> Option<&ItemInfo> {
        self.items_by_id.get(&item_id)
    }

    pub fn item_id_for(&self, name: &str) -> Option<i32> {
        self.item_id_by_name.get(name).copied()
    }

    pub fn is_air(&self, state_id: i32) -> bool {
        matches!(
            self.state(state_id).map(|s| s.name.as_str()),
            Some("air") | Some("cave_air") | Some("void_air")
        )
    }
}

fn read_json_array<T: serde::de::DeserializeOwned>(path: &Path) -> DataResult<Vec<T>> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| DataError::Io(path.to_path_buf(), e))?;
    serde_json::from_str(&contents).map_err(|e| DataError::Json(path.to_path_buf(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(dir: &Path, name: &str, contents: &str) {
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn test_load_and_lookup() {
        let dir = std::env::temp_dir().join(format!("blockwire-data-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        write_temp(
            &dir,
            "blocks.json",
            r#"[{"id":1,"name":"stone","minStateId":1,"maxStateId":1,"defaultState":1,"hardness":1.5,"diggable":true},
                {"id":10,"name":"oak_log","minStateId":10,"maxStateId":13,"defaultState":10,"hardness":2.0,"diggable":true}]"#,
        );
        write_temp(
            &dir,
            "items.json",
            r#"[{"id":1,"name":"stone","stackSize":64}]"#,
        );

        let dict = BlockDictionary::load(&dir).unwrap();
        assert_eq!(dict.state(1).unwrap().name, "stone");
        assert_eq!(dict.state(12).unwrap().state_index, 2);
        assert_eq!(dict.default_state_for("oak_log"), Some(10));
        assert_eq!(dict.item_id_for("stone"), Some(1));

        std::fs::remove_dir_all(&dir).ok();
    }
}
