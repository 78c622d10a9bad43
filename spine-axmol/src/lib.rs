//! Spine 3.8 skeleton runtime with draw batching for axmol-style scene-graph renderers.
//!
//! Skeletons are posed on the CPU and turned into triangles that share one frame arena
//! ([`SkeletonBatch`]); draws with the same texture, blend function and program are merged into
//! a single [`SkeletonCommand`]. GPU submission lives in separate crates (e.g.
//! `spine-axmol-wgpu`).

#![forbid(unsafe_code)]

mod adapter;
mod animation;
mod atlas;
mod attachment;
mod batch;
mod command;
mod effect;
mod error;
mod geometry;
mod model;
mod pose;
mod renderer;
mod texture;
mod timeline;
mod version;

#[cfg(feature = "json")]
pub mod json;

pub use adapter::DrawContext;
pub use animation::*;
pub use atlas::*;
pub use attachment::*;
pub use batch::*;
pub use command::*;
pub use effect::*;
pub use error::*;
pub use geometry::SkeletonClipper;
pub use model::*;
pub use pose::*;
pub use renderer::*;
pub use texture::*;
pub use timeline::*;
pub use version::*;



#[cfg(test)]
mod command_tests;

#[cfg(test)]
mod batch_tests;



#[cfg(test)]
mod render_tests;

#[cfg(all(test, feature = "json"))]
mod json_tests;
