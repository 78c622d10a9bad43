use crate::{Bone, TextureHandle};
use std::sync::OnceLock;

/// Corner-vertex triangulation of a region quad (BR, BL, UL, UR).
pub const QUAD_TRIANGLES: [u16; 6] = [0, 1, 2, 2, 3, 0];

/// Atlas region data an attachment needs to compute UVs and bind a texture.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TextureRegion {
    pub texture: Option<TextureHandle>,
    pub page_width: f32,
    pub page_height: f32,
    pub u: f32,
    pub v: f32,
    pub u2: f32,
    pub v2: f32,
    pub degrees: u16,
    pub offset_x: f32,
    pub offset_y: f32,
    pub width: f32,
    pub height: f32,
    pub original_width: f32,
    pub original_height: f32,
    /// The page stores premultiplied alpha.
    pub premultiplied_alpha: bool,
}

impl TextureRegion {
    pub fn rotated(&self) -> bool {
        self.degrees == 90
    }
}

/// Render topology cached on an attachment: texture, UVs and triangle indices.
///
/// Built once on first draw; only positions and colors are recomputed per frame.
#[derive(Clone, Debug, PartialEq)]
pub struct AttachmentVertices {
    pub texture: TextureHandle,
    pub uvs: Vec<[f32; 2]>,
    pub triangles: Vec<u16>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VertexWeight {
    pub bone: usize,
    pub x: f32,
    pub y: f32,
    pub weight: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum VertexData {
    Unweighted(Vec<[f32; 2]>),
    Weighted(Vec<Vec<VertexWeight>>),
}

impl Default for VertexData {
    fn default() -> Self {
        VertexData::Unweighted(Vec::new())
    }
}

impl VertexData {
    pub fn vertex_count(&self) -> usize {
        match self {
            VertexData::Unweighted(v) => v.len(),
            VertexData::Weighted(v) => v.len(),
        }
    }

    pub fn is_weighted(&self) -> bool {
        matches!(self, VertexData::Weighted(_))
    }

    /// Number of floats a deform key holds for this vertex set: one pair per vertex when
    /// unweighted, one pair per bone influence when weighted.
    pub fn deform_length(&self) -> usize {
        match self {
            VertexData::Unweighted(v) => v.len() * 2,
            VertexData::Weighted(v) => v.iter().map(|w| w.len() * 2).sum(),
        }
    }

    /// Flattened setup positions, used as the base of unweighted deform keys.
    pub fn setup_positions(&self) -> Option<Vec<f32>> {
        match self {
            VertexData::Unweighted(v) => Some(v.iter().flat_map(|p| [p[0], p[1]]).collect()),
            VertexData::Weighted(_) => None,
        }
    }

    /// Writes world positions into `out` (cleared first).
    ///
    /// `deform` holds absolute local positions for unweighted data and per-influence offsets for
    /// weighted data; an empty slice means "no deform".
    pub fn compute_world_vertices(
        &self,
        bones: &[Bone],
        bone: &Bone,
        deform: &[f32],
        out: &mut Vec<[f32; 2]>,
    ) {
        out.clear();
        match self {
            VertexData::Unweighted(v) => {
                let use_deform = deform.len() >= v.len() * 2;
                out.extend(v.iter().enumerate().map(|(i, p)| {
                    let (vx, vy) = if use_deform {
                        (deform[i * 2], deform[i * 2 + 1])
                    } else {
                        (p[0], p[1])
                    };
                    bone.transform_point(vx, vy)
                }));
            }
            VertexData::Weighted(v) => {
                let mut f = 0usize;
                for influences in v {
                    let mut wx = 0.0f32;
                    let mut wy = 0.0f32;
                    for w in influences {
                        let dx = deform.get(f).copied().unwrap_or(0.0);
                        let dy = deform.get(f + 1).copied().unwrap_or(0.0);
                        f += 2;
                        let [x, y] = bones[w.bone].transform_point(w.x + dx, w.y + dy);
                        wx += x * w.weight;
                        wy += y * w.weight;
                    }
                    out.push([wx, wy]);
                }
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct RegionAttachment {
    pub name: String,
    pub path: String,
    pub color: [f32; 4],
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub width: f32,
    pub height: f32,
    pub region: Option<TextureRegion>,
    /// Local corner positions in BR, BL, UL, UR order.
    offset: [[f32; 2]; 4],
    uvs: [[f32; 2]; 4],
    renderer_object: OnceLock<Option<AttachmentVertices>>,
}

impl RegionAttachment {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path: name.clone(),
            name,
            color: [1.0; 4],
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            width: 0.0,
            height: 0.0,
            region: None,
            offset: [[0.0; 2]; 4],
            uvs: [[0.0; 2]; 4],
            renderer_object: OnceLock::new(),
        }
    }

    /// Binds a texture region and recomputes the local quad and its UVs.
    pub fn set_region(&mut self, region: TextureRegion) {
        self.region = Some(region);
        self.renderer_object = OnceLock::new();
        self.update_offset();
    }

    /// Recomputes the local corner offsets and UVs from the transform fields and region.
    pub fn update_offset(&mut self) {
        let (region_width, region_height, original_width, original_height, offset_x, offset_y) =
            match self.region.as_ref() {
                Some(r) => (
                    r.width,
                    r.height,
                    if r.original_width > 0.0 { r.original_width } else { r.width },
                    if r.original_height > 0.0 { r.original_height } else { r.height },
                    r.offset_x,
                    r.offset_y,
                ),
                None => (self.width, self.height, self.width, self.height, 0.0, 0.0),
            };

        let region_scale_x = if original_width != 0.0 {
            self.width / original_width * self.scale_x
        } else {
            0.0
        };
        let region_scale_y = if original_height != 0.0 {
            self.height / original_height * self.scale_y
        } else {
            0.0
        };
        let local_x = -self.width / 2.0 * self.scale_x + offset_x * region_scale_x;
        let local_y = -self.height / 2.0 * self.scale_y + offset_y * region_scale_y;
        let local_x2 = local_x + region_width * region_scale_x;
        let local_y2 = local_y + region_height * region_scale_y;

        let (sin, cos) = self.rotation.to_radians().sin_cos();
        let corner = |lx: f32, ly: f32| [lx * cos - ly * sin + self.x, lx * sin + ly * cos + self.y];
        self.offset = [
            corner(local_x2, local_y),
            corner(local_x, local_y),
            corner(local_x, local_y2),
            corner(local_x2, local_y2),
        ];

        if let Some(r) = self.region.as_ref() {
            self.uvs = if r.rotated() {
                [[r.u2, r.v], [r.u2, r.v2], [r.u, r.v2], [r.u, r.v]]
            } else {
                [[r.u2, r.v2], [r.u, r.v2], [r.u, r.v], [r.u2, r.v]]
            };
        }
    }

    pub fn uvs(&self) -> &[[f32; 2]; 4] {
        &self.uvs
    }

    /// World positions of the quad corners in BR, BL, UL, UR order.
    pub fn compute_world_vertices(&self, bone: &Bone) -> [[f32; 2]; 4] {
        self.offset.map(|[x, y]| bone.transform_point(x, y))
    }

    /// Cached render topology, or `None` when no texture is bound.
    pub fn attachment_vertices(&self) -> Option<&AttachmentVertices> {
        self.renderer_object
            .get_or_init(|| {
                let texture = self.region.as_ref()?.texture?;
                Some(AttachmentVertices {
                    texture,
                    uvs: self.uvs.to_vec(),
                    triangles: QUAD_TRIANGLES.to_vec(),
                })
            })
            .as_ref()
    }
}

/// Names a skin entry: the skin and the key the attachment is stored under.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct AttachmentRef {
    pub skin: String,
    pub name: String,
}

#[derive(Clone, Debug)]
pub struct MeshAttachment {
    pub name: String,
    pub path: String,
    pub color: [f32; 4],
    pub vertices: VertexData,
    /// Normalized region UVs as authored.
    pub region_uvs: Vec<[f32; 2]>,
    pub triangles: Vec<u16>,
    pub hull_length: usize,
    pub edges: Vec<u16>,
    pub width: f32,
    pub height: f32,
    pub region: Option<TextureRegion>,
    /// Entry whose deform keys drive this mesh; `None` means its own entry.
    pub deform_attachment: Option<AttachmentRef>,
    uvs: Vec<[f32; 2]>,
    renderer_object: OnceLock<Option<AttachmentVertices>>,
}

impl MeshAttachment {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path: name.clone(),
            name,
            color: [1.0; 4],
            vertices: VertexData::default(),
            region_uvs: Vec::new(),
            triangles: Vec::new(),
            hull_length: 0,
            edges: Vec::new(),
            width: 0.0,
            height: 0.0,
            region: None,
            deform_attachment: None,
            uvs: Vec::new(),
            renderer_object: OnceLock::new(),
        }
    }

    pub fn set_region(&mut self, region: TextureRegion) {
        self.region = Some(region);
        self.renderer_object = OnceLock::new();
        self.update_uvs();
    }

    /// Maps the authored region UVs into page UV space, honoring packing rotation and whitespace
    /// stripping.
    pub fn update_uvs(&mut self) {
        let Some(r) = self.region.as_ref() else {
            self.uvs = self.region_uvs.clone();
            return;
        };
        let original_width = if r.original_width > 0.0 { r.original_width } else { r.width };
        let original_height = if r.original_height > 0.0 { r.original_height } else { r.height };
        let page_w = r.page_width.max(1.0);
        let page_h = r.page_height.max(1.0);

        self.uvs = if r.rotated() {
            let u = r.u - (original_height - r.offset_y - r.height) / page_w;
            let v = r.v - (original_width - r.offset_x - r.width) / page_h;
            let width = original_height / page_w;
            let height = original_width / page_h;
            self.region_uvs
                .iter()
                .map(|[ru, rv]| [u + rv * width, v + (1.0 - ru) * height])
                .collect()
        } else {
            let u = r.u - r.offset_x / page_w;
            let v = r.v - (original_height - r.offset_y - r.height) / page_h;
            let width = original_width / page_w;
            let height = original_height / page_h;
            self.region_uvs
                .iter()
                .map(|[ru, rv]| [u + ru * width, v + rv * height])
                .collect()
        };
    }

    pub fn uvs(&self) -> &[[f32; 2]] {
        &self.uvs
    }

    pub fn attachment_vertices(&self) -> Option<&AttachmentVertices> {
        self.renderer_object
            .get_or_init(|| {
                let texture = self.region.as_ref()?.texture?;
                Some(AttachmentVertices {
                    texture,
                    uvs: self.uvs.clone(),
                    triangles: self.triangles.clone(),
                })
            })
            .as_ref()
    }
}

#[derive(Clone, Debug, Default)]
pub struct ClippingAttachment {
    pub name: String,
    pub vertices: VertexData,
    /// Slot after which clipping stops; `None` clips to the end of the draw order.
    pub end_slot: Option<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct PointAttachment {
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
}

impl PointAttachment {
    pub fn compute_world_position(&self, bone: &Bone) -> [f32; 2] {
        bone.transform_point(self.x, self.y)
    }

    pub fn compute_world_rotation(&self, bone: &Bone) -> f32 {
        bone.c.atan2(bone.a).to_degrees() + self.rotation
    }
}

#[derive(Clone, Debug, Default)]
pub struct PathAttachment {
    pub name: String,
    pub vertices: VertexData,
    pub lengths: Vec<f32>,
    pub closed: bool,
    pub constant_speed: bool,
}

#[derive(Clone, Debug)]
pub enum Attachment {
    Region(RegionAttachment),
    Mesh(MeshAttachment),
    Clipping(ClippingAttachment),
    Point(PointAttachment),
    Path(PathAttachment),
}

impl Attachment {
    pub fn name(&self) -> &str {
        match self {
            Attachment::Region(a) => a.name.as_str(),
            Attachment::Mesh(a) => a.name.as_str(),
            Attachment::Clipping(a) => a.name.as_str(),
            Attachment::Point(a) => a.name.as_str(),
            Attachment::Path(a) => a.name.as_str(),
        }
    }

    /// Entry a linked mesh shares deform keys with.
    pub fn deform_attachment(&self) -> Option<&AttachmentRef> {
        match self {
            Attachment::Mesh(a) => a.deform_attachment.as_ref(),
            _ => None,
        }
    }

    /// Vertex data for attachments that deform timelines can target.
    pub fn vertex_data(&self) -> Option<&VertexData> {
        match self {
            Attachment::Mesh(a) => Some(&a.vertices),
            Attachment::Clipping(a) => Some(&a.vertices),
            Attachment::Path(a) => Some(&a.vertices),
            Attachment::Region(_) | Attachment::Point(_) => None,
        }
    }
}

/// Resolves the texture region backing a region or mesh attachment while skeleton data loads.
pub trait AttachmentLoader {
    fn texture_region(&self, path: &str) -> Option<TextureRegion>;
}
