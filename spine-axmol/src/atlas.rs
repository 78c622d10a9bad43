use crate::{AttachmentLoader, Error, TextureHandle, TextureLoader, TextureRegion};
use std::path::Path;
use std::str::FromStr;

/// A parsed Spine texture atlas: pages (one texture each) and the regions packed into them.
#[derive(Clone, Debug, Default)]
pub struct Atlas {
    pub pages: Vec<AtlasPage>,
    pub regions: Vec<AtlasRegion>,
}

#[derive(Clone, Debug)]
pub struct AtlasPage {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub min_filter: TextureFilter,
    pub mag_filter: TextureFilter,
    pub u_wrap: TextureWrap,
    pub v_wrap: TextureWrap,
    pub pma: bool,
    /// Engine texture bound by a [`TextureLoader`].
    pub texture: Option<TextureHandle>,
}

impl AtlasPage {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            width: 0,
            height: 0,
            format: "RGBA8888".to_string(),
            min_filter: TextureFilter::Nearest,
            mag_filter: TextureFilter::Nearest,
            u_wrap: TextureWrap::ClampToEdge,
            v_wrap: TextureWrap::ClampToEdge,
            pma: false,
            texture: None,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum TextureFilter {
    #[default]
    Unknown,
    Nearest,
    Linear,
    MipMap,
    MipMapNearestNearest,
    MipMapLinearNearest,
    MipMapNearestLinear,
    MipMapLinearLinear,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum TextureWrap {
    MirroredRepeat,
    #[default]
    ClampToEdge,
    Repeat,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AtlasRegion {
    pub name: String,
    pub page: usize,
    pub index: i32,
    pub degrees: u16,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub offset_x: i32,
    pub offset_y: i32,
    pub original_width: u32,
    pub original_height: u32,
}

impl AtlasRegion {
    fn new(name: &str, page: usize) -> Self {
        Self {
            name: name.to_string(),
            page,
            index: -1,
            degrees: 0,
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            offset_x: 0,
            offset_y: 0,
            original_width: 0,
            original_height: 0,
        }
    }

    fn finish(mut self) -> Self {
        if self.original_width == 0 {
            self.original_width = self.width;
        }
        if self.original_height == 0 {
            self.original_height = self.height;
        }
        self
    }
}

impl Atlas {
    pub fn parse(input: &str) -> Result<Self, Error> {
        let mut atlas = Atlas::default();
        let mut region: Option<AtlasRegion> = None;
        let mut expect_page = true;

        for raw in input.lines() {
            let line = raw.trim();
            if line.is_empty() {
                atlas.regions.extend(region.take().map(AtlasRegion::finish));
                expect_page = true;
                continue;
            }
            if expect_page {
                atlas.pages.push(AtlasPage::new(line));
                expect_page = false;
                continue;
            }
            let page_index = atlas.pages.len() - 1;

            let Some((key, value)) = line.split_once(':') else {
                atlas.regions.extend(region.take().map(AtlasRegion::finish));
                region = Some(AtlasRegion::new(line, page_index));
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            match region.as_mut() {
                Some(region) => parse_region_entry(region, key, value)?,
                None => parse_page_entry(&mut atlas.pages[page_index], key, value)?,
            }
        }
        atlas.regions.extend(region.take().map(AtlasRegion::finish));

        if atlas.pages.is_empty() {
            return Err(Error::AtlasParse {
                message: "empty atlas".to_string(),
            });
        }
        Ok(atlas)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = read_text(path.as_ref())?;
        Self::parse(&text)
    }

    /// Parses an atlas file and loads its page textures from the file's directory.
    pub fn from_file_with_textures(
        path: impl AsRef<Path>,
        loader: &mut dyn TextureLoader,
    ) -> Result<Self, Error> {
        let path = path.as_ref();
        let mut atlas = Self::from_file(path)?;
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        atlas.load_textures(loader, dir)?;
        Ok(atlas)
    }

    /// Loads every page texture through `loader`, resolving page names against `dir`.
    ///
    /// All pages are attempted; the first failure is returned.
    pub fn load_textures(
        &mut self,
        loader: &mut dyn TextureLoader,
        dir: impl AsRef<Path>,
    ) -> Result<(), Error> {
        let dir = dir.as_ref();
        let mut first_error = None;
        for page in &mut self.pages {
            let path = dir.join(&page.name);
            if let Err(err) = loader.load(page, &path.to_string_lossy()) {
                log::warn!("atlas page '{}' has no texture: {err}", page.name);
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Releases every bound page texture.
    pub fn unload_textures(&mut self, loader: &mut dyn TextureLoader) {
        for page in &mut self.pages {
            if let Some(texture) = page.texture.take() {
                loader.unload(texture);
            }
        }
    }

    pub fn region(&self, name: &str) -> Option<&AtlasRegion> {
        self.regions.iter().find(|r| r.name == name)
    }

    pub fn page(&self, index: usize) -> Option<&AtlasPage> {
        self.pages.get(index)
    }

    /// Region data with page UVs resolved, as consumed by attachments.
    pub fn texture_region(&self, name: &str) -> Option<TextureRegion> {
        let region = self.region(name)?;
        let page = self.pages.get(region.page)?;
        let page_width = page.width as f32;
        let page_height = page.height as f32;
        let (packed_w, packed_h) = if region.degrees == 90 {
            (region.height, region.width)
        } else {
            (region.width, region.height)
        };
        let norm = |value: u32, size: f32| if size > 0.0 { value as f32 / size } else { 0.0 };

        Some(TextureRegion {
            texture: page.texture,
            page_width,
            page_height,
            u: norm(region.x, page_width),
            v: norm(region.y, page_height),
            u2: norm(region.x + packed_w, page_width),
            v2: norm(region.y + packed_h, page_height),
            degrees: region.degrees,
            offset_x: region.offset_x as f32,
            offset_y: region.offset_y as f32,
            width: region.width as f32,
            height: region.height as f32,
            original_width: region.original_width as f32,
            original_height: region.original_height as f32,
            premultiplied_alpha: page.pma,
        })
    }
}

impl FromStr for Atlas {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Atlas::parse(s)
    }
}

/// Resolves attachment paths to regions of an [`Atlas`].
#[derive(Clone, Copy, Debug)]
pub struct AtlasAttachmentLoader<'a> {
    atlas: &'a Atlas,
}

impl<'a> AtlasAttachmentLoader<'a> {
    pub fn new(atlas: &'a Atlas) -> Self {
        Self { atlas }
    }
}

impl AttachmentLoader for AtlasAttachmentLoader<'_> {
    fn texture_region(&self, path: &str) -> Option<TextureRegion> {
        let region = self.atlas.texture_region(path);
        if region.is_none() {
            log::warn!("region '{path}' not found in atlas");
        }
        region
    }
}

pub(crate) fn read_text(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            Error::ResourceNotFound {
                path: path.display().to_string(),
            }
        } else {
            Error::Io {
                path: path.display().to_string(),
                source,
            }
        }
    })
}

fn parse_page_entry(page: &mut AtlasPage, key: &str, value: &str) -> Result<(), Error> {
    match key {
        "size" => {
            let [w, h] = parse_ints::<u32, 2>(value, "page size")?;
            page.width = w;
            page.height = h;
        }
        "format" => page.format = value.to_string(),
        "filter" => {
            let (min, mag) = value.split_once(',').unwrap_or((value, value));
            page.min_filter = parse_filter(min.trim());
            page.mag_filter = parse_filter(mag.trim());
        }
        "repeat" => {
            let (u, v) = match value {
                "x" => (TextureWrap::Repeat, TextureWrap::ClampToEdge),
                "y" => (TextureWrap::ClampToEdge, TextureWrap::Repeat),
                "xy" => (TextureWrap::Repeat, TextureWrap::Repeat),
                _ => (TextureWrap::ClampToEdge, TextureWrap::ClampToEdge),
            };
            page.u_wrap = u;
            page.v_wrap = v;
        }
        "pma" => page.pma = value == "true",
        _ => {}
    }
    Ok(())
}

fn parse_region_entry(region: &mut AtlasRegion, key: &str, value: &str) -> Result<(), Error> {
    match key {
        "rotate" => region.degrees = parse_degrees(value),
        "xy" => [region.x, region.y] = parse_ints(value, "region xy")?,
        "size" => [region.width, region.height] = parse_ints(value, "region size")?,
        "bounds" => {
            [region.x, region.y, region.width, region.height] =
                parse_ints(value, "region bounds")?;
        }
        "orig" => {
            [region.original_width, region.original_height] = parse_ints(value, "region orig")?;
        }
        "offset" => [region.offset_x, region.offset_y] = parse_ints(value, "region offset")?,
        "offsets" => {
            let [x, y, w, h] = parse_ints::<i32, 4>(value, "region offsets")?;
            region.offset_x = x;
            region.offset_y = y;
            region.original_width = w.max(0) as u32;
            region.original_height = h.max(0) as u32;
        }
        "index" => [region.index] = parse_ints(value, "region index")?,
        _ => {}
    }
    Ok(())
}

fn parse_ints<T: FromStr + Copy + Default, const N: usize>(
    value: &str,
    context: &str,
) -> Result<[T; N], Error> {
    let invalid = || Error::AtlasParse {
        message: format!("invalid {context}: {value}"),
    };
    let mut out = [T::default(); N];
    let mut parts = value.split(',');
    for slot in &mut out {
        *slot = parts
            .next()
            .and_then(|p| p.trim().parse().ok())
            .ok_or_else(invalid)?;
    }
    Ok(out)
}

fn parse_degrees(value: &str) -> u16 {
    match value {
        "true" => 90,
        "false" => 0,
        other => other
            .parse::<i32>()
            .map(|d| d.rem_euclid(360) as u16)
            .unwrap_or(0),
    }
}

fn parse_filter(value: &str) -> TextureFilter {
    match value {
        "Nearest" => TextureFilter::Nearest,
        "Linear" => TextureFilter::Linear,
        "MipMap" => TextureFilter::MipMap,
        "MipMapNearestNearest" => TextureFilter::MipMapNearestNearest,
        "MipMapLinearNearest" => TextureFilter::MipMapLinearNearest,
        "MipMapNearestLinear" => TextureFilter::MipMapNearestLinear,
        "MipMapLinearLinear" => TextureFilter::MipMapLinearLinear,
        _ => TextureFilter::Unknown,
    }
}
