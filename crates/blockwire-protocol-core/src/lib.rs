pub mod codec;
pub mod state;
pub mod packets;
pub mod adapter;
pub mod connection;
pub mod tagged;

pub use codec::*;
pub use state::*;
pub use packets::*;
pub use adapter::*;
pub use connection::{Connection, ConnectionReader, ConnectionWriter};
pub use tagged::{
    CommandGraphNode, EntityMetadataField, MetaValue, Particle, ParticleField, SlotComponent,
};
