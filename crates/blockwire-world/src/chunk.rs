use bytes::{Buf, BufMut, BytesMut};
use blockwire_nbt::{nbt_compound, NbtValue};
use blockwire_protocol_core::{read_varint, write_varint, CodecError, ChunkLightData, InternalPacket};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChunkDecodeError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("unsupported bits-per-entry {0} for {1}")]
    UnsupportedBitsPerEntry(u8, &'static str),
}

type ChunkResult<T> = Result<T, ChunkDecodeError>;

/// Number of sections for a dimension: 24 for the overworld (y in [-64, 320)),
/// 16 for any other dimension.
pub fn section_count_for_dimension(dimension: u8) -> usize {
    if dimension == 0 {
        24
    } else {
        16
    }
}

/// Total number of sections in a chunk (from y=-64 to y=320, 384 blocks / 16 = 24 sections).
pub const SECTION_COUNT: usize = 24;
/// Minimum Y coordinate.
pub const MIN_Y: i32 = -64;

/// A 16x16x16 chunk section.
#[derive(Clone)]
pub struct ChunkSection {
    /// Block count (non-air) for the section.
    pub block_count: i16,
    /// Block state palette. Index 0 is always the default (air = 0).
    pub palette: Vec<i32>,
    /// If palette has 1 entry: single-valued (no data array needed).
    /// If palette has >1 entry: indices into palette, packed into longs.
    pub block_data: Option<Vec<i64>>,
    /// Bits per entry for the block data.
    pub bits_per_entry: u8,
}

impl ChunkSection {
    /// Create an empty (all air) section.
    pub fn empty() -> Self {
        Self {
            block_count: 0,
            palette: vec![0], // air
            block_data: None,
            bits_per_entry: 0,
        }
    }

    /// Create a single-value section (all blocks are the same state ID).
    pub fn single_value(state_id: i32) -> Self {
        Self {
            block_count: if state_id == 0 { 0 } else { 4096 },
            palette: vec![state_id],
            block_data: None,
            bits_per_entry: 0,
        }
    }

    /// Create a section with a mixed palette. blocks is [y][z][x] = 16*16*16 = 4096 entries.
    pub fn from_blocks(blocks: &[i32; 4096]) -> Self {
        let mut palette = Vec::new();
        let mut palette_map = std::collections::HashMap::new();
        let mut indices = [0u16; 4096];
        let mut block_count: i16 = 0;

        for (i, &state_id) in blocks.iter().enumerate() {
            if state_id != 0 {
                block_count += 1;
            }
            let idx = *palette_map.entry(state_id).or_insert_with(|| {
                let idx = palette.len();
                palette.push(state_id);
                idx
            });
            indices[i] = idx as u16;
        }

        if palette.len() == 1 {
            return Self::single_value(palette[0]);
        }

        let bits_per_entry = std::cmp::max(4, (palette.len() as f64).log2().ceil() as u8);
        let entries_per_long = 64 / bits_per_entry as usize;
        let longs_needed = (4096 + entries_per_long - 1) / entries_per_long;
        let mask = (1u64 << bits_per_entry) - 1;

        let mut data = vec![0i64; longs_needed];
        for (i, &idx) in indices.iter().enumerate() {
            let long_index = i / entries_per_long;
            let bit_index = (i % entries_per_long) * bits_per_entry as usize;
            data[long_index] |= ((idx as u64 & mask) << bit_index) as i64;
        }

        Self {
            block_count,
            palette,
            block_data: Some(data),
            bits_per_entry,
        }
    }

    /// Serialize this section for the chunk data packet.
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_i16(self.block_count);

        // Block states — paletted container
        buf.put_u8(self.bits_per_entry);

        if self.bits_per_entry == 0 {
            // Single-valued: write the single palette entry, then 0 longs
            write_varint(buf, self.palette[0]);
            write_varint(buf, 0); // data array length = 0
        } else {
            // Indirect palette
            write_varint(buf, self.palette.len() as i32);
            for &entry in &self.palette {
                write_varint(buf, entry);
            }
            if let Some(ref data) = self.block_data {
                write_varint(buf, data.len() as i32);
                for &long in data {
                    buf.put_i64(long);
                }
            }
        }

        // Biomes — single-valued (plains = 0)
        buf.put_u8(0); // bits per entry = 0 (single value)
        write_varint(buf, 0); // palette entry: biome ID 0 (plains)
        write_varint(buf, 0); // data array length = 0
    }

    /// Decode the block-states paletted container of a chunk section: one
    /// byte bits-per-entry, then single-valued (bpe==0), indirect-palette
    /// (4<=bpe<=8), or direct (bpe>=15) shape.
    pub fn decode(buf: &mut BytesMut) -> ChunkResult<Self> {
        if buf.remaining() < 2 {
            return Err(CodecError::NotEnoughData.into());
        }
        let block_count = buf.get_i16();
        let bits_per_entry = buf.get_u8();

        let (palette, direct) = match bits_per_entry {
            0 => {
                let value = read_varint(buf)?;
                let _data_len = read_varint(buf)?; // always 0
                (vec![value], false)
            }
            4..=8 => {
                let palette_len = read_varint(buf)? as usize;
                let mut palette = Vec::with_capacity(palette_len);
                for _ in 0..palette_len {
                    palette.push(read_varint(buf)?);
                }
                (palette, false)
            }
            bpe if bpe >= 15 => (Vec::new(), true),
            other => return Err(ChunkDecodeError::UnsupportedBitsPerEntry(other, "blocks")),
        };

        let data_len = read_varint(buf)? as usize;
        if buf.remaining() < data_len * 8 {
            return Err(CodecError::NotEnoughData.into());
        }
        let mut longs = Vec::with_capacity(data_len);
        for _ in 0..data_len {
            longs.push(buf.get_i64());
        }

        if bits_per_entry == 0 {
            return Ok(Self {
                block_count,
                palette,
                block_data: None,
                bits_per_entry: 0,
            });
        }

        let effective_bpe = if direct { 15 } else { bits_per_entry };
        let indices = unpack_indices(&longs, effective_bpe, 4096);
        let resolved_palette = if direct {
            Vec::new()
        } else {
            palette
        };

        Ok(Self {
            block_count,
            palette: resolved_palette,
            block_data: if direct {
                Some(indices.iter().map(|&i| i as i64).collect())
            } else {
                Some(longs)
            },
            bits_per_entry: if direct { 0xFF } else { bits_per_entry },
        })
    }

    /// Resolve block state ids for all 4096 entries of this section, the way
    /// `get_block_state` does for a single entry.
    pub fn block_states(&self) -> Vec<i32> {
        if self.palette.len() == 1 && self.bits_per_entry == 0 {
            return vec![self.palette[0]; 4096];
        }
        match (&self.block_data, self.bits_per_entry) {
            (Some(longs), 0xFF) => {
                // direct: block_data already holds resolved global ids
                longs.iter().map(|&v| v as i32).collect()
            }
            (Some(longs), bpe) if bpe > 0 => {
                unpack_indices(longs, bpe, 4096)
                    .into_iter()
                    .map(|idx| self.palette.get(idx as usize).copied().unwrap_or(0))
                    .collect()
            }
            _ => vec![self.palette.first().copied().unwrap_or(0); 4096],
        }
    }

    /// Overwrite a single block state within this section, given local
    /// coordinates in `0..16`. Promotes a single-valued section to an
    /// indirect palette, and grows the palette/bits-per-entry in place if
    /// `state_id` isn't already present — mirrors `from_blocks`'s packing.
    pub fn set_block(&mut self, x: usize, y: usize, z: usize, state_id: i32) {
        let index = y * 256 + z * 16 + x;

        if self.bits_per_entry == 0xFF {
            if let Some(ref mut data) = self.block_data {
                if index < data.len() {
                    data[index] = state_id as i64;
                }
            }
            self.recount();
            return;
        }

        // Expand to a full 4096-entry table, patch it, then repack — this
        // section is small and infrequently touched relative to a full
        // chunk load, so clarity wins over an in-place bit-twiddle.
        let mut blocks: [i32; 4096] = self
            .block_states()
            .try_into()
            .unwrap_or_else(|_| [0; 4096]);
        blocks[index] = state_id;
        *self = Self::from_blocks(&blocks);
    }

    fn recount(&mut self) {
        self.block_count = self.block_states().iter().filter(|&&s| s != 0).count() as i16;
    }

    /// Decode a biome paletted container: thresholds bpe==0 single, 1..=3
    /// indirect, bpe>=6 direct, over 64 (4x4x4) entries.
    pub fn decode_biomes(buf: &mut BytesMut) -> ChunkResult<Vec<i32>> {
        if !buf.has_remaining() {
            return Err(CodecError::NotEnoughData.into());
        }
        let bits_per_entry = buf.get_u8();
        let (palette, direct) = match bits_per_entry {
            0 => {
                let value = read_varint(buf)?;
                let _data_len = read_varint(buf)?;
                (vec![value], false)
            }
            1..=3 => {
                let palette_len = read_varint(buf)? as usize;
                let mut palette = Vec::with_capacity(palette_len);
                for _ in 0..palette_len {
                    palette.push(read_varint(buf)?);
                }
                (palette, false)
            }
            bpe if bpe >= 6 => (Vec::new(), true),
            other => return Err(ChunkDecodeError::UnsupportedBitsPerEntry(other, "biomes")),
        };

        let data_len = read_varint(buf)? as usize;
        if buf.remaining() < data_len * 8 {
            return Err(CodecError::NotEnoughData.into());
        }
        let mut longs = Vec::with_capacity(data_len);
        for _ in 0..data_len {
            longs.push(buf.get_i64());
        }

        if bits_per_entry == 0 {
            return Ok(vec![palette[0]; 64]);
        }

        let effective_bpe = if direct { 6 } else { bits_per_entry };
        let indices = unpack_indices(&longs, effective_bpe, 64);
        Ok(if direct {
            indices
        } else {
            indices
                .into_iter()
                .map(|idx| palette.get(idx as usize).copied().unwrap_or(0))
                .collect()
        })
    }
}

/// Unpack `count` fixed-width entries from a long array, least-significant
/// bits first within each word, entries never straddling a word boundary.
fn unpack_indices(longs: &[i64], bits_per_entry: u8, count: usize) -> Vec<i32> {
    let entries_per_long = 64 / bits_per_entry as usize;
    let mask = (1u64 << bits_per_entry) - 1;
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let long_index = i / entries_per_long;
        let bit_index = (i % entries_per_long) * bits_per_entry as usize;
        let word = longs.get(long_index).copied().unwrap_or(0) as u64;
        out.push(((word >> bit_index) & mask) as i32);
    }
    out
}

/// Unpack a 256-entry, 9-bits-per-entry heightmap long array.
pub fn decode_heightmap(longs: &[i64]) -> Vec<u16> {
    unpack_indices(longs, 9, 256)
        .into_iter()
        .map(|v| v as u16)
        .collect()
}

/// A full chunk column (24 sections).
pub struct Chunk {
    pub sections: Vec<ChunkSection>,
}

impl Chunk {
    pub fn new() -> Self {
        Self {
            sections: (0..SECTION_COUNT).map(|_| ChunkSection::empty()).collect(),
        }
    }

    /// Serialize all sections into the chunk data byte array.
    pub fn serialize_sections(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for section in &self.sections {
            section.write_to(&mut buf);
        }
        buf.to_vec()
    }

    /// Build a heightmap for MOTION_BLOCKING.
    /// Returns packed long array (256 entries, 9 bits each for 384 height range).
    pub fn compute_heightmap(&self) -> Vec<i64> {
        let mut heights = [0u16; 256]; // 16x16

        // Scan from top to bottom for each column
        for x in 0..16 {
            for z in 0..16 {
                let col_idx = z * 16 + x;
                'scan: for section_idx in (0..SECTION_COUNT).rev() {
                    for local_y in (0..16).rev() {
                        let section = &self.sections[section_idx];
                        let block_state = self.get_block_state(section, x, local_y, z);
                        if block_state != 0 {
                            // World Y = MIN_Y + section_idx * 16 + local_y
                            let world_y = MIN_Y + (section_idx as i32) * 16 + local_y as i32;
                            // Heightmap value = world_y - MIN_Y + 1 (1-indexed from bottom)
                            heights[col_idx] = (world_y - MIN_Y + 1) as u16;
                            break 'scan;
                        }
                    }
                }
            }
        }

        // Pack into longs: 9 bits per entry (for 384 range), 7 entries per long (7*9=63 bits)
        let bits_per_entry = 9;
        let entries_per_long = 64 / bits_per_entry;
        let longs_needed = (256 + entries_per_long - 1) / entries_per_long; // 37 longs
        let mask = (1u64 << bits_per_entry) - 1;

        let mut packed = vec![0i64; longs_needed];
        for (i, &h) in heights.iter().enumerate() {
            let long_index = i / entries_per_long;
            let bit_index = (i % entries_per_long) * bits_per_entry;
            packed[long_index] |= ((h as u64 & mask) << bit_index) as i64;
        }

        packed
    }

    fn get_block_state(&self, section: &ChunkSection, x: usize, y: usize, z: usize) -> i32 {
        let index = y * 256 + z * 16 + x;
        if section.bits_per_entry == 0xFF {
            // Direct: block_data already holds resolved global state ids.
            return section
                .block_data
                .as_ref()
                .and_then(|d| d.get(index))
                .map(|&v| v as i32)
                .unwrap_or(0);
        }
        if section.palette.len() == 1 {
            return section.palette[0];
        }
        if let Some(ref data) = section.block_data {
            let entries_per_long = 64 / section.bits_per_entry as usize;
            let long_index = index / entries_per_long;
            let bit_index = (index % entries_per_long) * section.bits_per_entry as usize;
            let mask = (1u64 << section.bits_per_entry) - 1;
            let palette_idx = ((data[long_index] as u64 >> bit_index) & mask) as usize;
            section.palette.get(palette_idx).copied().unwrap_or(0)
        } else {
            0
        }
    }

    /// Patch a single block in place given a world Y coordinate; `x`/`z` are
    /// local chunk coordinates in `0..16`. No-op if `world_y` falls outside
    /// this chunk's section range.
    pub fn set_block(&mut self, x: usize, world_y: i32, z: usize, state_id: i32) {
        if world_y < MIN_Y {
            return;
        }
        let offset = (world_y - MIN_Y) as usize;
        let section_idx = offset / 16;
        let local_y = offset % 16;
        if let Some(section) = self.sections.get_mut(section_idx) {
            section.set_block(x, local_y, z, state_id);
        }
    }

    /// Decode a chunk column's raw section bytes (the `data` field of a
    /// CHUNK_DATA_AND_UPDATE_LIGHT packet) into sections, skipping each
    /// section's biome container (read to stay aligned, value discarded).
    pub fn decode(data: &[u8], dimension: u8) -> ChunkResult<Self> {
        let section_count = section_count_for_dimension(dimension);
        let mut buf = BytesMut::from(data);
        let mut sections = Vec::with_capacity(section_count);
        for _ in 0..section_count {
            let section = ChunkSection::decode(&mut buf)?;
            ChunkSection::decode_biomes(&mut buf)?;
            sections.push(section);
        }
        Ok(Self { sections })
    }

    /// Flatten all sections into the `blocks[ySections*16*16*16]` array,
    /// indexed `(y_with_offset, z, x)` as spec'd: section 0 is the lowest
    /// section of the column (world y = MIN_Y for the overworld, 0 elsewhere).
    pub fn flat_blocks(&self) -> Vec<i32> {
        let mut out = Vec::with_capacity(self.sections.len() * 4096);
        for section in &self.sections {
            out.extend(section.block_states());
        }
        out
    }

    /// Decode the MOTION_BLOCKING heightmap out of a chunk's heightmaps NBT
    /// compound, if present.
    pub fn heightmap_motion_blocking(heightmaps: &NbtValue) -> Option<Vec<u16>> {
        let NbtValue::Compound(entries) = heightmaps else {
            return None;
        };
        for (name, value) in entries {
            if name == "MOTION_BLOCKING" {
                if let NbtValue::LongArray(longs) = value {
                    return Some(decode_heightmap(longs));
                }
            }
        }
        None
    }

    /// Build the full chunk data + light packet.
    pub fn to_packet(&self, chunk_x: i32, chunk_z: i32) -> InternalPacket {
        let data = self.serialize_sections();
        let heightmap_data = self.compute_heightmap();

        let heightmaps = nbt_compound! {
            "MOTION_BLOCKING" => NbtValue::LongArray(heightmap_data)
        };

        InternalPacket::ChunkDataAndUpdateLight {
            chunk_x,
            chunk_z,
            heightmaps,
            data,
            block_entities: Vec::new(),
            light_data: ChunkLightData::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_section_serialize() {
        let section = ChunkSection::empty();
        let mut buf = BytesMut::new();
        section.write_to(&mut buf);
        // Should have block_count(2) + bits_per_entry(1) + palette_varint + data_len_varint + biome data
        assert!(buf.len() > 0);
    }

    #[test]
    fn test_single_value_section() {
        let section = ChunkSection::single_value(1); // stone
        assert_eq!(section.block_count, 4096);
        assert_eq!(section.bits_per_entry, 0);
    }

    #[test]
    fn test_decode_single_valued_section() {
        // bpe=0, single_valued palette entry 1, empty data array.
        let mut buf = BytesMut::new();
        buf.put_i16(4096); // block_count
        buf.put_u8(0); // bits_per_entry
        write_varint(&mut buf, 1); // palette value
        write_varint(&mut buf, 0); // data array length
        let section = ChunkSection::decode(&mut buf).unwrap();
        let states = section.block_states();
        assert_eq!(states.len(), 4096);
        assert!(states.iter().all(|&s| s == 1));
    }

    #[test]
    fn test_decode_indirect_palette_first_word() {
        // bpe=4, palette=[0,5,9], one word 0x0000000000002100 ->
        // first 16 entries = [0,0,1,2,0,0,0,0,0,0,0,0,0,0,0,0]
        let mut buf = BytesMut::new();
        buf.put_i16(0);
        buf.put_u8(4);
        write_varint(&mut buf, 3);
        write_varint(&mut buf, 0);
        write_varint(&mut buf, 5);
        write_varint(&mut buf, 9);
        write_varint(&mut buf, 256); // one word per 16 entries * 4096/16 = 256 words
        buf.put_i64(0x0000000000002100);
        for _ in 0..255 {
            buf.put_i64(0);
        }
        let section = ChunkSection::decode(&mut buf).unwrap();
        let indices = unpack_indices(
            section.block_data.as_ref().unwrap(),
            section.bits_per_entry,
            16,
        );
        assert_eq!(indices, vec![0, 0, 1, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        let states: Vec<i32> = indices
            .into_iter()
            .map(|i| section.palette[i as usize])
            .collect();
        assert_eq!(states, vec![0, 0, 5, 9, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_set_block_patches_single_valued_section() {
        let mut chunk = Chunk::new();
        chunk.sections[0] = ChunkSection::single_value(1); // all stone
        chunk.set_block(3, MIN_Y + 2, 5, 9); // swap one block for state 9
        let states = chunk.sections[0].block_states();
        let index = 2 * 256 + 5 * 16 + 3;
        assert_eq!(states[index], 9);
        assert_eq!(states[index + 1], 1);
        assert_eq!(chunk.sections[0].block_count, 4096);
    }

    #[test]
    fn test_set_block_out_of_range_is_noop() {
        let mut chunk = Chunk::new();
        chunk.set_block(0, MIN_Y - 1, 0, 9);
        assert!(chunk.sections[0].block_states().iter().all(|&s| s == 0));
    }

    #[test]
    fn test_heightmap_packing() {
        let mut chunk = Chunk::new();
        // Set section 4 (y=-64+64=0..15 → but we want the first non-empty)
        // Actually section index = (world_y - MIN_Y) / 16
        // For flat world: bedrock at y=-64 → section 0, local_y=0
        chunk.sections[0] = ChunkSection::single_value(1); // bedrock
        let heightmap = chunk.compute_heightmap();
        assert_eq!(heightmap.len(), 37); // ceil(256/7) = 37
    }
}
