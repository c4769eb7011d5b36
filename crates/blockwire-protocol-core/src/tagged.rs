//! Tagged-union wire types whose shape depends on a leading integer tag:
//! particles, entity metadata entries, Slot structured components, and
//! command-graph nodes.

use bytes::{Buf, BufMut, BytesMut};
use blockwire_nbt::NbtValue;
use blockwire_types::Identifier;
use uuid::Uuid;

use crate::codec::{
    read_angle, read_slot, read_string, read_text_component, read_uuid, read_varint,
    write_varint, CodecError, CodecResult,
};

/// A decoded particle: its registry id plus whatever trailing fields that
/// particle type carries (most particles carry none).
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub id: i32,
    pub data: Vec<ParticleField>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParticleField {
    Int(i32),
    Float(f32),
    VarInt(i32),
    BlockPos(u64),
}

impl Particle {
    pub fn decode(buf: &mut BytesMut) -> CodecResult<Self> {
        let id = read_varint(buf)?;
        let data = match id {
            1 | 2 | 28 => vec![ParticleField::VarInt(read_varint(buf)?)],
            13 => vec![
                ParticleField::Int(buf.get_i32()),
                ParticleField::Float(buf.get_f32()),
            ],
            14 => vec![
                ParticleField::Int(buf.get_i32()),
                ParticleField::Int(buf.get_i32()),
                ParticleField::Float(buf.get_f32()),
            ],
            20 => vec![ParticleField::Int(buf.get_i32())],
            35 => vec![ParticleField::Float(buf.get_f32())],
            45 => vec![
                ParticleField::VarInt(read_varint(buf)?),
                ParticleField::BlockPos(buf.get_u64()),
                ParticleField::VarInt(read_varint(buf)?),
                ParticleField::Float(buf.get_f32()),
                ParticleField::VarInt(read_varint(buf)?),
            ],
            99 => vec![ParticleField::VarInt(read_varint(buf)?)],
            105 => vec![ParticleField::VarInt(read_varint(buf)?)],
            _ => Vec::new(),
        };
        Ok(Self { id, data })
    }
}

/// One structured component of a Slot, as carried by the "added components"
/// array of the component-based item stack format. The registry has ~66
/// component ids, several nested several levels deep; rather than model
/// every one as a typed variant, each component's payload is walked
/// field-by-field per its known shape so the reader stays aligned with the
/// stream, and the consumed bytes are kept verbatim as an opaque,
/// round-trip-preserving placeholder rather than fully modeled.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotComponent {
    pub component_type: i32,
    pub data: Vec<u8>,
}

impl SlotComponent {
    pub fn decode(buf: &mut BytesMut) -> CodecResult<Self> {
        let component_type = read_varint(buf)?;
        let snapshot = buf.clone();
        skip_component_payload(component_type, buf)?;
        let consumed = snapshot.len() - buf.len();
        Ok(Self {
            component_type,
            data: snapshot[..consumed].to_vec(),
        })
    }
}

fn skip_bool(buf: &mut BytesMut) -> CodecResult<bool> {
    if !buf.has_remaining() {
        return Err(CodecError::NotEnoughData);
    }
    Ok(buf.get_u8() != 0)
}

fn skip_nbt(buf: &mut BytesMut) -> CodecResult<()> {
    NbtValue::read_root_network(buf).map_err(|_| CodecError::NotEnoughData)?;
    Ok(())
}

fn skip_identifier(buf: &mut BytesMut) -> CodecResult<()> {
    read_string(buf, 32767)?;
    Ok(())
}

fn skip_array(buf: &mut BytesMut, mut f: impl FnMut(&mut BytesMut) -> CodecResult<()>) -> CodecResult<()> {
    let n = read_varint(buf)? as usize;
    for _ in 0..n {
        f(buf)?;
    }
    Ok(())
}

/// `IDSet`: a registry tag reference (type 0) or an inline list of ids.
fn skip_id_set(buf: &mut BytesMut) -> CodecResult<()> {
    let kind = read_varint(buf)?;
    if kind == 0 {
        skip_identifier(buf)
    } else {
        for _ in 0..(kind - 1) {
            read_varint(buf)?;
        }
        Ok(())
    }
}

/// `SoundEvent`: identifier, then an optional fixed range float.
fn skip_sound_event(buf: &mut BytesMut) -> CodecResult<()> {
    skip_identifier(buf)?;
    if skip_bool(buf)? {
        buf.get_f32();
    }
    Ok(())
}

/// `IDOrSoundEvent`: registry id 0 means an inline `SoundEvent` follows.
fn skip_id_or_sound_event(buf: &mut BytesMut) -> CodecResult<()> {
    if read_varint(buf)? == 0 {
        skip_sound_event(buf)?;
    }
    Ok(())
}

fn skip_block_predicate(buf: &mut BytesMut) -> CodecResult<()> {
    if skip_bool(buf)? {
        skip_id_set(buf)?;
    }
    if skip_bool(buf)? {
        skip_array(buf, |buf| {
            read_string(buf, 32767)?; // property name
            if skip_bool(buf)? {
                read_string(buf, 32767)?; // exact_value
            } else {
                read_string(buf, 32767)?; // min_value
                read_string(buf, 32767)?; // max_value
            }
            Ok(())
        })?;
    }
    if skip_bool(buf)? {
        skip_nbt(buf)?;
    }
    Ok(())
}

fn skip_consume_effect(buf: &mut BytesMut) -> CodecResult<()> {
    match read_varint(buf)? {
        1 => skip_id_set(buf),
        3 => {
            buf.get_f32();
            Ok(())
        }
        4 => skip_sound_event(buf),
        _ => Ok(()),
    }
}

fn skip_rule(buf: &mut BytesMut) -> CodecResult<()> {
    skip_id_set(buf)?;
    if skip_bool(buf)? {
        buf.get_f32();
    }
    if skip_bool(buf)? {
        skip_bool(buf)?;
    }
    Ok(())
}

fn skip_equipped(buf: &mut BytesMut) -> CodecResult<()> {
    read_varint(buf)?; // slot
    skip_id_or_sound_event(buf)?;
    if skip_bool(buf)? {
        skip_identifier(buf)?; // model
    }
    if skip_bool(buf)? {
        skip_identifier(buf)?; // camera_overlay
    }
    if skip_bool(buf)? {
        skip_id_set(buf)?; // allowed_entities
    }
    skip_bool(buf)?; // dispensable
    skip_bool(buf)?; // swappable
    skip_bool(buf)?; // damage_on_hurt
    Ok(())
}

fn skip_potion_effect(buf: &mut BytesMut) -> CodecResult<()> {
    read_varint(buf)?; // type_id
    read_varint(buf)?; // amplifier
    read_varint(buf)?; // duration
    skip_bool(buf)?; // ambient
    skip_bool(buf)?; // show_particles
    skip_bool(buf)?; // show_icon
    if skip_bool(buf)? {
        skip_potion_effect(buf)?; // hidden_effect, recursive
    }
    Ok(())
}

fn skip_potion_contents(buf: &mut BytesMut) -> CodecResult<()> {
    if skip_bool(buf)? {
        read_varint(buf)?; // potion_id
    }
    if skip_bool(buf)? {
        buf.get_i32(); // custom_color
    }
    skip_array(buf, skip_potion_effect)?;
    read_string(buf, 32767)?; // custom_name
    Ok(())
}

fn skip_instrument(buf: &mut BytesMut) -> CodecResult<()> {
    skip_id_or_sound_event(buf)?;
    buf.get_f32(); // use_duration
    buf.get_f32(); // range
    read_text_component(buf)?;
    Ok(())
}

fn skip_id_or_instrument(buf: &mut BytesMut) -> CodecResult<()> {
    if read_varint(buf)? == 0 {
        skip_instrument(buf)?;
    }
    Ok(())
}

fn skip_jukebox_song(buf: &mut BytesMut) -> CodecResult<()> {
    skip_id_or_sound_event(buf)?;
    read_text_component(buf)?; // description
    buf.get_f32(); // duration
    read_varint(buf)?; // output
    Ok(())
}

fn skip_id_or_jukebox_song(buf: &mut BytesMut) -> CodecResult<()> {
    if read_varint(buf)? == 0 {
        skip_jukebox_song(buf)?;
    }
    Ok(())
}

fn skip_firework_explosion(buf: &mut BytesMut) -> CodecResult<()> {
    read_varint(buf)?; // shape
    skip_array(buf, |buf| {
        buf.get_i32();
        Ok(())
    })?; // colors
    skip_array(buf, |buf| {
        buf.get_i32();
        Ok(())
    })?; // fade_colors
    skip_bool(buf)?; // has_trail
    skip_bool(buf)?; // has_twinkler
    Ok(())
}

fn skip_banner_patterns(buf: &mut BytesMut) -> CodecResult<()> {
    skip_array(buf, |buf| {
        if read_varint(buf)? == 0 {
            skip_identifier(buf)?; // asset_id
            read_string(buf, 32767)?; // translation_key
        }
        read_varint(buf)?; // color
        Ok(())
    })
}

fn skip_trim_material(buf: &mut BytesMut) -> CodecResult<()> {
    read_string(buf, 32767)?; // asset_name
    read_varint(buf)?; // ingredient
    buf.get_f32(); // item_model_index
    skip_array(buf, |buf| {
        read_varint(buf)?;
        read_string(buf, 32767)?;
        Ok(())
    })?; // overrides
    read_text_component(buf)?; // description
    Ok(())
}

fn skip_trim_pattern(buf: &mut BytesMut) -> CodecResult<()> {
    read_string(buf, 32767)?; // asset_name
    read_varint(buf)?; // template_item
    read_text_component(buf)?; // description
    skip_bool(buf)?; // decal
    Ok(())
}

fn skip_id_or_trim_material(buf: &mut BytesMut) -> CodecResult<()> {
    if read_varint(buf)? == 0 {
        skip_trim_material(buf)?;
    }
    Ok(())
}

fn skip_id_or_trim_pattern(buf: &mut BytesMut) -> CodecResult<()> {
    if read_varint(buf)? == 0 {
        skip_trim_pattern(buf)?;
    }
    Ok(())
}

/// Walk one structured component's payload by its registry id. Component
/// ids 23 (use_remainder), 24 (cooldown group), 39 (charged projectiles),
/// 40 (bundle contents), and 62 (container) have no settled wire shape to
/// walk and are left unconsumed; a server sending one of those mid-stream
/// will desync the rest of the packet.
fn skip_component_payload(component_type: i32, buf: &mut BytesMut) -> CodecResult<()> {
    match component_type {
        0 => skip_nbt(buf),                                        // custom_data
        1 | 2 | 3 => {
            read_varint(buf)?;
            Ok(())
        } // max_stack_size / max_damage / damage
        4 => {
            skip_bool(buf)?;
            Ok(())
        } // unbreakable
        5 | 6 => {
            read_text_component(buf)?;
            Ok(())
        } // custom_name / item_name
        7 => skip_identifier(buf),                                 // item_model
        8 => skip_array(buf, |buf| {
            read_text_component(buf)?;
            Ok(())
        }), // lore
        9 => {
            read_varint(buf)?;
            Ok(())
        } // rarity
        10 | 33 => {
            skip_array(buf, |buf| {
                read_varint(buf)?;
                read_varint(buf)?;
                Ok(())
            })?;
            skip_bool(buf)?;
            Ok(())
        } // enchantments / stored_enchantments
        11 | 12 => {
            skip_array(buf, skip_block_predicate)?;
            skip_bool(buf)?;
            Ok(())
        } // can_place_on / can_break
        13 => {
            skip_array(buf, |buf| {
                read_varint(buf)?; // attribute id
                read_uuid(buf)?;
                read_string(buf, 32767)?; // name
                buf.get_f64(); // amount
                read_varint(buf)?; // operation
                read_varint(buf)?; // slot
                Ok(())
            })?;
            skip_bool(buf)?;
            Ok(())
        } // attribute_modifiers
        14 | 17 | 19 | 27 | 36 | 38 | 51 => {
            read_varint(buf)?;
            Ok(())
        } // custom_model_data / repair_cost / enchantment_glint_override /
          // enchantable / map_id / map_post_processing / ominous_bottle_amplifier
        15 | 16 | 18 | 20 | 30 => Ok(()), // zero-payload flags (hide_additional_tooltip,
        // hide_tooltip, creative_slot_lock, intangible_projectile, glider)
        21 => {
            read_varint(buf)?; // nutrition
            buf.get_f32(); // saturation
            skip_bool(buf)?; // can_always_eat
            Ok(())
        } // food
        22 => {
            buf.get_f32(); // consume_seconds
            read_varint(buf)?; // animation
            skip_id_or_sound_event(buf)?; // sound
            skip_bool(buf)?; // has_consume_particles
            skip_array(buf, skip_consume_effect)?;
            Ok(())
        } // consumable
        25 => skip_identifier(buf),                                // damage_resistant
        26 => {
            skip_array(buf, skip_rule)?;
            buf.get_f32(); // default_mining_speed
            read_varint(buf)?; // speed
            Ok(())
        } // tool
        28 => skip_equipped(buf),                                  // equippable
        29 => skip_id_set(buf),                                    // repairable
        31 => skip_identifier(buf),                                // tooltip_style
        32 => skip_array(buf, skip_consume_effect),                // death_protection
        34 => {
            buf.get_i32(); // rgb
            skip_bool(buf)?; // show_in_tooltip
            Ok(())
        } // dyed_color
        35 => {
            buf.get_i32();
            Ok(())
        } // map_color
        37 => skip_nbt(buf),                                       // map_decorations
        41 => skip_potion_contents(buf),                           // potion_contents
        42 => skip_array(buf, |buf| {
            read_varint(buf)?;
            read_varint(buf)?;
            Ok(())
        }), // suspicious_stew_effects
        43 => skip_array(buf, |buf| {
            read_string(buf, 32767)?;
            if skip_bool(buf)? {
                read_string(buf, 32767)?;
            }
            Ok(())
        }), // writable_book_content
        44 => {
            read_string(buf, 32767)?; // title
            if skip_bool(buf)? {
                read_string(buf, 32767)?;
            }
            read_string(buf, 32767)?; // author
            read_varint(buf)?; // generation
            skip_array(buf, |buf| {
                read_text_component(buf)?;
                if skip_bool(buf)? {
                    read_text_component(buf)?;
                }
                Ok(())
            })?;
            skip_bool(buf)?; // resolved
            Ok(())
        } // written_book_content
        45 => {
            skip_id_or_trim_material(buf)?;
            skip_id_or_trim_pattern(buf)?;
            skip_bool(buf)?; // show_in_tooltip
            Ok(())
        } // trim
        46 | 47 | 48 | 49 | 53 | 65 | 66 => skip_nbt(buf), // debug_stick_state /
        // entity_data / bucket_entity_data / block_entity_data /
        // recipes / lock / container_loot
        50 => skip_id_or_instrument(buf), // instrument
        52 => {
            if skip_bool(buf)? {
                skip_id_or_jukebox_song(buf)?;
            } else {
                skip_identifier(buf)?; // jukebox_song_name
            }
            skip_bool(buf)?; // show_in_tooltip
            Ok(())
        } // jukebox_playable
        54 => {
            if skip_bool(buf)? {
                skip_identifier(buf)?; // dimension
                buf.get_u64(); // position
            }
            skip_bool(buf)?; // tracked
            Ok(())
        } // lodestone_tracker
        56 => {
            read_varint(buf)?; // flight_duration
            skip_array(buf, skip_firework_explosion)
        } // fireworks
        55 => skip_firework_explosion(buf), // firework_explosion
        57 => {
            if skip_bool(buf)? {
                read_string(buf, 32767)?; // name
            }
            if skip_bool(buf)? {
                read_uuid(buf)?; // id
            }
            skip_array(buf, |buf| {
                read_string(buf, 32767)?;
                read_string(buf, 32767)?;
                if skip_bool(buf)? {
                    read_string(buf, 32767)?;
                }
                Ok(())
            })
        } // profile
        58 => skip_identifier(buf),                                // note_block_sound
        59 => skip_banner_patterns(buf),                           // banner_patterns
        60 => {
            read_varint(buf)?;
            Ok(())
        } // base_color
        61 => skip_array(buf, |buf| {
            read_varint(buf)?;
            Ok(())
        }), // pot_decorations
        63 => skip_array(buf, |buf| {
            read_string(buf, 32767)?;
            read_string(buf, 32767)?;
            Ok(())
        }), // block_state
        64 => skip_array(buf, |buf| {
            skip_nbt(buf)?;
            read_varint(buf)?;
            read_varint(buf)?;
            Ok(())
        }), // bees
        _ => Ok(()),
    }
}

/// One `(index, value)` entry of an entity-metadata stream, which terminates
/// on the sentinel index byte 0xFF.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityMetadataField {
    pub index: u8,
    pub type_id: i32,
    pub value: MetaValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    Byte(i8),
    VarInt(i32),
    VarLong(i64),
    Float(f32),
    String(String),
    TextComponent(Box<blockwire_types::TextComponent>),
    OptTextComponent(Option<Box<blockwire_types::TextComponent>>),
    Slot,
    Boolean(bool),
    Rotation(f32, f32, f32),
    Position(u64),
    OptPosition(Option<u64>),
    OptUuid(Option<Uuid>),
    Nbt(NbtValue),
    Particles(Vec<Particle>),
    VillagerData(i32, i32, i32),
    OptVarInt(i32),
    PoseOrEnum(i32),
    Identifier(Identifier),
    OptGlobalPos(Option<(Identifier, u64)>),
    Vector3(f32, f32, f32),
    Quaternion(f32, f32, f32, f32),
    Unknown,
}

impl EntityMetadataField {
    /// Decode a full metadata stream (a sequence of fields terminated by
    /// index byte 0xFF).
    pub fn decode_all(buf: &mut BytesMut) -> CodecResult<Vec<EntityMetadataField>> {
        let mut fields = Vec::new();
        loop {
            if !buf.has_remaining() {
                break;
            }
            let index = buf.get_u8();
            if index == 0xFF {
                break;
            }
            let type_id = read_varint(buf)?;
            let value = Self::decode_value(type_id, buf)?;
            fields.push(EntityMetadataField {
                index,
                type_id,
                value,
            });
        }
        Ok(fields)
    }

    fn decode_value(type_id: i32, buf: &mut BytesMut) -> CodecResult<MetaValue> {
        Ok(match type_id {
            0 => MetaValue::Byte(buf.get_i8()),
            1 => MetaValue::VarInt(read_varint(buf)?),
            2 => MetaValue::VarLong(crate::codec::read_varlong(buf)?),
            3 => MetaValue::Float(buf.get_f32()),
            4 => MetaValue::String(read_string(buf, 32767)?),
            5 => MetaValue::TextComponent(Box::new(read_text_component(buf)?)),
            6 => {
                let present = buf.get_u8() != 0;
                MetaValue::OptTextComponent(if present {
                    Some(Box::new(read_text_component(buf)?))
                } else {
                    None
                })
            }
            7 => {
                read_slot(buf)?;
                MetaValue::Slot
            }
            8 => MetaValue::Boolean(buf.get_u8() != 0),
            9 => MetaValue::Rotation(buf.get_f32(), buf.get_f32(), buf.get_f32()),
            10 => MetaValue::Position(buf.get_u64()),
            11 => {
                let present = buf.get_u8() != 0;
                MetaValue::OptPosition(if present { Some(buf.get_u64()) } else { None })
            }
            12 => MetaValue::VarInt(read_varint(buf)?), // direction
            13 => {
                let present = buf.get_u8() != 0;
                MetaValue::OptUuid(if present { Some(read_uuid(buf)?) } else { None })
            }
            14 => MetaValue::OptVarInt(read_varint(buf)?), // block id, 0 = absent
            15 => MetaValue::VarInt(read_varint(buf)?),
            16 => MetaValue::Nbt(NbtValue::read_root_network(buf).unwrap_or(NbtValue::Compound(Vec::new()))),
            17 => MetaValue::Unknown, // Particle (single) — not used by any vanilla entity
            18 => {
                let n = read_varint(buf)? as usize;
                let mut particles = Vec::with_capacity(n);
                for _ in 0..n {
                    particles.push(Particle::decode(buf)?);
                }
                MetaValue::Particles(particles)
            }
            19 => MetaValue::VillagerData(read_varint(buf)?, read_varint(buf)?, read_varint(buf)?),
            20 => MetaValue::OptVarInt(read_varint(buf)?),
            21 => MetaValue::PoseOrEnum(read_varint(buf)?),
            22 => MetaValue::VarInt(read_varint(buf)?),
            23 => MetaValue::Identifier(read_identifier(buf)?),
            24 => MetaValue::VarInt(read_varint(buf)?),
            25 => {
                let present = buf.get_u8() != 0;
                MetaValue::OptGlobalPos(if present {
                    Some((read_identifier(buf)?, buf.get_u64()))
                } else {
                    None
                })
            }
            26 => MetaValue::Identifier(read_identifier(buf)?),
            27 => MetaValue::VarInt(read_varint(buf)?),
            28 => MetaValue::VarInt(read_varint(buf)?),
            29 => MetaValue::Vector3(buf.get_f32(), buf.get_f32(), buf.get_f32()),
            30 => MetaValue::Quaternion(buf.get_f32(), buf.get_f32(), buf.get_f32(), buf.get_f32()),
            _ => MetaValue::Unknown,
        })
    }
}

fn read_identifier(buf: &mut BytesMut) -> CodecResult<Identifier> {
    let s = read_string(buf, 32767)?;
    Ok(s.parse().unwrap_or_else(|_: String| Identifier::minecraft(s)))
}

/// A node of the declared-commands command graph. `children`/`redirect_node`
/// are indices into the command graph's flat node array, never pointers.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandGraphNode {
    pub flags: u8,
    pub children: Vec<i32>,
    pub redirect_node: Option<i32>,
    pub name: Option<String>,
    pub parser_id: Option<i32>,
    pub suggestions_type: Option<Identifier>,
}

impl CommandGraphNode {
    const NODE_TYPE_MASK: u8 = 0x03;
    const FLAG_EXECUTABLE: u8 = 0x04;
    const FLAG_REDIRECT: u8 = 0x08;
    const FLAG_SUGGESTIONS: u8 = 0x10;

    pub fn is_executable(&self) -> bool {
        self.flags & Self::FLAG_EXECUTABLE != 0
    }

    pub fn decode(buf: &mut BytesMut) -> CodecResult<Self> {
        let flags = buf.get_u8();
        let node_type = flags & Self::NODE_TYPE_MASK;
        let has_redirect = flags & Self::FLAG_REDIRECT != 0;
        let has_suggestions = flags & Self::FLAG_SUGGESTIONS != 0;

        let child_count = read_varint(buf)? as usize;
        let mut children = Vec::with_capacity(child_count);
        for _ in 0..child_count {
            children.push(read_varint(buf)?);
        }

        let redirect_node = if has_redirect {
            Some(read_varint(buf)?)
        } else {
            None
        };

        let name = if node_type == 1 || node_type == 2 {
            Some(read_string(buf, 32767)?)
        } else {
            None
        };

        let parser_id = if node_type == 2 {
            let pid = read_varint(buf)?;
            // Per-parser property payloads beyond the common ones (bool,
            // string, identifier, angle) are not decoded here and are left
            // for a caller with parser-specific knowledge.
            match pid {
                0 => {
                    buf.get_u8();
                }
                28 => {
                    read_angle(buf)?;
                }
                32 => {
                    read_string(buf, 32767)?;
                }
                34 => {
                    read_identifier(buf)?;
                }
                _ => {}
            }
            Some(pid)
        } else {
            None
        };

        let suggestions_type = if has_suggestions {
            Some(read_identifier(buf)?)
        } else {
            None
        };

        Ok(Self {
            flags,
            children,
            redirect_node,
            name,
            parser_id,
            suggestions_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_particle_no_extra_fields() {
        let mut buf = BytesMut::new();
        write_varint(&mut buf, 20); // entity_effect
        buf.put_i32(0x11223344);
        let p = Particle::decode(&mut buf).unwrap();
        assert_eq!(p.id, 20);
        assert_eq!(p.data, vec![ParticleField::Int(0x11223344)]);
    }

    #[test]
    fn test_slot_component_unbreakable_is_one_byte() {
        let mut buf = BytesMut::new();
        write_varint(&mut buf, 4); // unbreakable
        buf.put_u8(1);
        buf.put_u8(0xAB); // next field in the enclosing array
        let component = SlotComponent::decode(&mut buf).unwrap();
        assert_eq!(component.component_type, 4);
        assert_eq!(component.data, vec![1]);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn test_slot_component_nested_equippable() {
        let mut buf = BytesMut::new();
        write_varint(&mut buf, 28); // equippable
        write_varint(&mut buf, 4); // slot: head
        write_varint(&mut buf, 1); // sound id != 0, inline SoundEvent skipped
        buf.put_u8(0); // has_model
        buf.put_u8(0); // has_camera_overlay
        buf.put_u8(0); // has_allowed_entities
        buf.put_u8(1); // dispensable
        buf.put_u8(0); // swappable
        buf.put_u8(1); // damage_on_hurt
        buf.put_u8(0xCD); // next field in the enclosing array
        let component = SlotComponent::decode(&mut buf).unwrap();
        assert_eq!(component.component_type, 28);
        assert_eq!(buf.len(), 1);
        assert_eq!(buf[0], 0xCD);
    }

    #[test]
    fn test_entity_metadata_sentinel_terminates() {
        let mut buf = BytesMut::new();
        buf.put_u8(0); // index 0
        write_varint(&mut buf, 0); // type: byte
        buf.put_i8(5);
        buf.put_u8(0xFF); // sentinel
        let fields = EntityMetadataField::decode_all(&mut buf).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].value, MetaValue::Byte(5));
    }

    #[test]
    fn test_command_node_literal_leaf() {
        let mut name_buf = BytesMut::new();
        crate::codec::write_string(&mut name_buf, "help");

        let mut buf = BytesMut::new();
        buf.put_u8(0x05); // node_type=1 (literal), executable flag set
        write_varint(&mut buf, 0); // no children
        buf.extend_from_slice(&name_buf);
        let node = CommandGraphNode::decode(&mut buf).unwrap();
        assert_eq!(node.name.as_deref(), Some("help"));
        assert!(node.is_executable());
        assert!(node.children.is_empty());
    }
}
