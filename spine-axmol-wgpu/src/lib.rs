//! wgpu backend for `spine-axmol`: uploads a frame's skeleton batch and records its draws.

#![forbid(unsafe_code)]

mod renderer;

pub use renderer::*;
