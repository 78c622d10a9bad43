//! Bridges atlas pages to an engine texture cache.

use crate::{AtlasPage, Error, TextureFilter, TextureWrap};
use std::num::NonZeroU32;

/// Opaque engine texture id. Non-zero, so "no texture" is `Option<TextureHandle>`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(NonZeroU32);

impl TextureHandle {
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub enum SamplerFilter {
    Nearest,
    #[default]
    Linear,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub enum SamplerAddressMode {
    #[default]
    ClampToEdge,
    Repeat,
}

/// Sampler state applied to a loaded page texture. Pages are never mip-sampled.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub struct TexParams {
    pub min_filter: SamplerFilter,
    pub mag_filter: SamplerFilter,
    pub s_address_mode: SamplerAddressMode,
    pub t_address_mode: SamplerAddressMode,
}

impl TexParams {
    pub fn for_page(page: &AtlasPage) -> Self {
        Self {
            min_filter: filter(page.min_filter),
            mag_filter: filter(page.mag_filter),
            s_address_mode: wrap(page.u_wrap),
            t_address_mode: wrap(page.v_wrap),
        }
    }
}

/// Collapses an atlas filter to the engine's non-mipmapped filters.
pub fn filter(filter: TextureFilter) -> SamplerFilter {
    match filter {
        TextureFilter::Nearest
        | TextureFilter::MipMapNearestNearest
        | TextureFilter::MipMapLinearNearest => SamplerFilter::Nearest,
        TextureFilter::Unknown
        | TextureFilter::Linear
        | TextureFilter::MipMap
        | TextureFilter::MipMapNearestLinear
        | TextureFilter::MipMapLinearLinear => SamplerFilter::Linear,
    }
}

pub fn wrap(wrap: TextureWrap) -> SamplerAddressMode {
    match wrap {
        TextureWrap::ClampToEdge => SamplerAddressMode::ClampToEdge,
        TextureWrap::Repeat | TextureWrap::MirroredRepeat => SamplerAddressMode::Repeat,
    }
}

/// A texture as reported by the engine cache.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Texture {
    pub handle: TextureHandle,
    pub pixels_wide: u32,
    pub pixels_high: u32,
}

/// The engine texture cache, as seen by the atlas loader.
pub trait TextureCache {
    /// Loads (or returns the cached) texture for an image path.
    fn add_image(&mut self, path: &str) -> Option<Texture>;
    fn set_tex_parameters(&mut self, texture: TextureHandle, params: &TexParams);
    fn retain(&mut self, texture: TextureHandle);
    fn release(&mut self, texture: TextureHandle);
}

/// Binds atlas page textures.
pub trait TextureLoader {
    /// Loads the image at `path` and binds it (and its pixel size) to `page`.
    fn load(&mut self, page: &mut AtlasPage, path: &str) -> Result<(), Error>;
    fn unload(&mut self, texture: TextureHandle);
}

/// [`TextureLoader`] over an engine [`TextureCache`]: retains each page texture and applies the
/// page's filter and wrap modes.
#[derive(Debug, Default)]
pub struct EngineTextureLoader<C> {
    cache: C,
}

impl<C: TextureCache> EngineTextureLoader<C> {
    pub fn new(cache: C) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut C {
        &mut self.cache
    }

    pub fn into_inner(self) -> C {
        self.cache
    }
}

impl<C: TextureCache> TextureLoader for EngineTextureLoader<C> {
    fn load(&mut self, page: &mut AtlasPage, path: &str) -> Result<(), Error> {
        let Some(texture) = self.cache.add_image(path) else {
            log::warn!("texture '{path}' could not be loaded");
            return Err(Error::TextureNotFound {
                path: path.to_string(),
            });
        };
        self.cache.retain(texture.handle);
        self.cache
            .set_tex_parameters(texture.handle, &TexParams::for_page(page));
        page.texture = Some(texture.handle);
        page.width = texture.pixels_wide;
        page.height = texture.pixels_high;
        Ok(())
    }

    fn unload(&mut self, texture: TextureHandle) {
        self.cache.release(texture);
    }
}
