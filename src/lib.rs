//! Rotated-lattice, dual-sub-lattice cave biome map.
//!
//! A deterministic, seed-driven function assigning a biome identity to
//! every integer world coordinate, piecewise constant over cells of a
//! rotated 3D lattice so biome boundaries aren't axis-aligned, dual-layer
//! so queries can pick between two overlapping sub-lattices for natural
//! transitions, tetrahedrally interpolable for smooth scalar fields, and
//! backed by a bounded-memory, reference-counted fragment cache shared by
//! many concurrent queriers.
//!
//! Concrete biome generators, the surface/heightmap subsystem, and a
//! standalone noise implementation are external collaborators; this crate
//! only specifies the small interfaces it needs from them
//! ([`generator::Generator`], [`surface::SurfaceCollaborator`],
//! [`noise::NoiseSource`]).
//!
//! Entry points: build a [`biome::BiomeRegistry`] and a
//! [`generator::GeneratorRegistry`], hand both to
//! [`service::CaveBiomeService::init`], then construct a
//! [`view::CaveBiomeMapView`] per chunk query.

pub mod biome;
pub mod cache;
pub mod config;
pub mod coordinates;
pub mod error;
pub mod fragment;
pub mod generator;
pub mod grid;
pub mod hash;
pub mod interpolate;
pub mod noise;
pub mod registry;
pub mod rotation;
pub mod service;
pub mod surface;
pub mod view;

pub use biome::{BiomeDefinition, BiomeField, BiomeId, BiomeRegistry};
pub use coordinates::{FragmentPosition, Layer, CELL_SIZE, FRAG_SIZE};
pub use error::CaveBiomeError;
pub use fragment::BiomeFragment;
pub use generator::{Generator, GeneratorRegistry};
pub use service::CaveBiomeService;
pub use view::CaveBiomeMapView;
