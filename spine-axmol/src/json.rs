//! Spine 3.8 JSON skeleton loader.

use crate::atlas::read_text;
use crate::version::{SPINE_EXPORT_MAJOR, SPINE_EXPORT_MINOR};
use crate::{
    Animation, Attachment, AttachmentFrame, AttachmentLoader, AttachmentRef, AttachmentTimeline,
    BlendMode, BoneData, ClippingAttachment, ColorTimeline, Curve, DeformFrame, DeformTimeline,
    DrawOrderFrame, DrawOrderTimeline, Error, Event, EventData, EventTimeline, Keyframe,
    MeshAttachment, PathAttachment, PointAttachment, RegionAttachment, RotateTimeline,
    ScaleTimeline, ShearTimeline, SkeletonData, Skin, SlotData, Timeline, TransformMode,
    TranslateTimeline, TwoColorTimeline, VertexData, VertexWeight,
};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

#[derive(Debug, Deserialize)]
struct Root {
    skeleton: Option<SkeletonHeader>,
    bones: Option<Vec<BoneDef>>,
    slots: Option<Vec<SlotDef>>,
    skins: Option<SkinsDef>,
    events: Option<BTreeMap<String, EventDef>>,
    animations: Option<BTreeMap<String, AnimationDef>>,
}

#[derive(Debug, Deserialize, Default)]
struct SkeletonHeader {
    #[serde(default)]
    hash: Option<String>,
    #[serde(default)]
    spine: Option<String>,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    width: f32,
    #[serde(default)]
    height: f32,
}

#[derive(Debug, Deserialize)]
struct BoneDef {
    name: String,
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    length: f32,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    rotation: f32,
    #[serde(default = "default_one", rename = "scaleX")]
    scale_x: f32,
    #[serde(default = "default_one", rename = "scaleY")]
    scale_y: f32,
    #[serde(default, rename = "shearX")]
    shear_x: f32,
    #[serde(default, rename = "shearY")]
    shear_y: f32,
    #[serde(default)]
    transform: Option<String>,
    #[serde(default)]
    color: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SlotDef {
    name: String,
    bone: String,
    #[serde(default)]
    attachment: Option<String>,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    dark: Option<String>,
    #[serde(default)]
    blend: Option<String>,
}

type SkinAttachmentsDef = BTreeMap<String, BTreeMap<String, AttachmentDef>>;

/// 3.8 exports skins as an array; older exports use a map keyed by skin name.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SkinsDef {
    Array(Vec<SkinDef>),
    Map(BTreeMap<String, SkinAttachmentsDef>),
}

#[derive(Debug, Deserialize)]
struct SkinDef {
    name: String,
    #[serde(default)]
    attachments: SkinAttachmentsDef,
}

#[derive(Debug, Deserialize)]
struct AttachmentDef {
    #[serde(default, rename = "type")]
    attachment_type: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    skin: Option<String>,
    #[serde(default = "default_true")]
    deform: bool,
    #[serde(default)]
    end: Option<String>,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    rotation: f32,
    #[serde(default = "default_one", rename = "scaleX")]
    scale_x: f32,
    #[serde(default = "default_one", rename = "scaleY")]
    scale_y: f32,
    #[serde(default)]
    width: f32,
    #[serde(default)]
    height: f32,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    uvs: Option<Vec<f32>>,
    #[serde(default)]
    vertices: Option<Vec<f32>>,
    #[serde(default)]
    triangles: Option<Vec<u32>>,
    #[serde(default)]
    hull: usize,
    #[serde(default)]
    edges: Option<Vec<u32>>,
    #[serde(default, rename = "vertexCount")]
    vertex_count: Option<usize>,
    #[serde(default)]
    lengths: Option<Vec<f32>>,
    #[serde(default)]
    closed: bool,
    #[serde(default = "default_true", rename = "constantSpeed")]
    constant_speed: bool,
}

#[derive(Debug, Deserialize, Default)]
struct EventDef {
    #[serde(default, rename = "int")]
    int_value: i32,
    #[serde(default, rename = "float")]
    float_value: f32,
    #[serde(default, rename = "string")]
    string_value: String,
    #[serde(default, rename = "audio")]
    audio_path: String,
    #[serde(default = "default_one")]
    volume: f32,
    #[serde(default)]
    balance: f32,
}

#[derive(Debug, Deserialize, Default)]
struct AnimationDef {
    #[serde(default)]
    bones: BTreeMap<String, BoneAnimDef>,
    #[serde(default)]
    slots: BTreeMap<String, SlotAnimDef>,
    #[serde(default, alias = "ffd")]
    deform: BTreeMap<String, BTreeMap<String, BTreeMap<String, Vec<DeformKey>>>>,
    #[serde(default, rename = "drawOrder", alias = "draworder")]
    draw_order: Option<Vec<DrawOrderKey>>,
    #[serde(default)]
    events: Option<Vec<EventKey>>,
}

#[derive(Debug, Deserialize, Default)]
struct BoneAnimDef {
    #[serde(default)]
    rotate: Option<Vec<RotateKey>>,
    #[serde(default)]
    translate: Option<Vec<PairKey>>,
    #[serde(default)]
    scale: Option<Vec<ScaleKey>>,
    #[serde(default)]
    shear: Option<Vec<PairKey>>,
}

#[derive(Debug, Deserialize, Default)]
struct SlotAnimDef {
    #[serde(default)]
    attachment: Option<Vec<AttachmentKey>>,
    #[serde(default)]
    color: Option<Vec<ColorKey>>,
    #[serde(default, rename = "twoColor")]
    two_color: Option<Vec<TwoColorKey>>,
}

/// Curve fields shared by every curved key.
///
/// `curve` is `"stepped"`, the first bezier control value (with `c2`..`c4` holding the rest), or a
/// four-number array in pre-3.8 exports.
#[derive(Debug, Deserialize, Default)]
struct CurveDef {
    #[serde(default)]
    curve: Option<serde_json::Value>,
    #[serde(default)]
    c2: Option<f32>,
    #[serde(default)]
    c3: Option<f32>,
    #[serde(default)]
    c4: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct RotateKey {
    #[serde(default)]
    time: f32,
    #[serde(default)]
    angle: f32,
    #[serde(flatten)]
    curve: CurveDef,
}

#[derive(Debug, Deserialize)]
struct PairKey {
    #[serde(default)]
    time: f32,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(flatten)]
    curve: CurveDef,
}

#[derive(Debug, Deserialize)]
struct ScaleKey {
    #[serde(default)]
    time: f32,
    #[serde(default = "default_one")]
    x: f32,
    #[serde(default = "default_one")]
    y: f32,
    #[serde(flatten)]
    curve: CurveDef,
}

#[derive(Debug, Deserialize)]
struct AttachmentKey {
    #[serde(default)]
    time: f32,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ColorKey {
    #[serde(default)]
    time: f32,
    color: String,
    #[serde(flatten)]
    curve: CurveDef,
}

#[derive(Debug, Deserialize)]
struct TwoColorKey {
    #[serde(default)]
    time: f32,
    light: String,
    dark: String,
    #[serde(flatten)]
    curve: CurveDef,
}

#[derive(Debug, Deserialize)]
struct DeformKey {
    #[serde(default)]
    time: f32,
    #[serde(default)]
    offset: usize,
    #[serde(default)]
    vertices: Option<Vec<f32>>,
    #[serde(flatten)]
    curve: CurveDef,
}

#[derive(Debug, Deserialize)]
struct DrawOrderKey {
    #[serde(default)]
    time: f32,
    #[serde(default)]
    offsets: Option<Vec<DrawOrderOffset>>,
}

#[derive(Debug, Deserialize)]
struct DrawOrderOffset {
    slot: String,
    offset: i32,
}

#[derive(Debug, Deserialize)]
struct EventKey {
    #[serde(default)]
    time: f32,
    name: String,
    #[serde(default, rename = "int")]
    int_value: Option<i32>,
    #[serde(default, rename = "float")]
    float_value: Option<f32>,
    #[serde(default, rename = "string")]
    string_value: Option<String>,
    #[serde(default)]
    volume: Option<f32>,
    #[serde(default)]
    balance: Option<f32>,
}

/// Reads Spine JSON exports into [`SkeletonData`], resolving attachment regions through an
/// [`AttachmentLoader`].
pub struct SkeletonJson<'a> {
    loader: &'a dyn AttachmentLoader,
    scale: f32,
}

impl std::fmt::Debug for SkeletonJson<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkeletonJson")
            .field("scale", &self.scale)
            .finish_non_exhaustive()
    }
}

struct LinkedMesh {
    skin: String,
    slot_index: usize,
    name: String,
    parent: String,
    parent_skin: String,
    inherit_deform: bool,
}

impl<'a> SkeletonJson<'a> {
    pub fn new(loader: &'a dyn AttachmentLoader) -> Self {
        Self { loader, scale: 1.0 }
    }

    /// Scales every positional value (bone offsets, attachment geometry, translate and deform
    /// keys) as it is read.
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn read_file(&self, path: impl AsRef<Path>) -> Result<SkeletonData, Error> {
        let text = read_text(path.as_ref())?;
        self.read_str(&text)
    }

    pub fn read_str(&self, json: &str) -> Result<SkeletonData, Error> {
        let root: Root = serde_json::from_str(json).map_err(|e| Error::JsonParse {
            message: e.to_string(),
        })?;

        let header = root.skeleton.unwrap_or_default();
        if let Some(version) = header.spine.as_deref() {
            validate_spine_version(version)?;
        }

        let mut data = SkeletonData {
            spine_version: header.spine,
            hash: header.hash,
            x: header.x,
            y: header.y,
            width: header.width,
            height: header.height,
            ..SkeletonData::default()
        };

        self.read_bones(&mut data, root.bones.unwrap_or_default())?;
        self.read_slots(&mut data, root.slots.unwrap_or_default())?;
        if let Some(skins) = root.skins {
            self.read_skins(&mut data, skins)?;
        }
        for (name, def) in root.events.unwrap_or_default() {
            let event = EventData {
                name: name.clone(),
                int_value: def.int_value,
                float_value: def.float_value,
                string: def.string_value,
                audio_path: def.audio_path,
                volume: def.volume,
                balance: def.balance,
            };
            data.events.insert(name, event);
        }
        for (name, def) in root.animations.unwrap_or_default() {
            let animation = self.read_animation(&data, &name, def)?;
            data.animations.push(animation);
        }

        log::debug!(
            "loaded skeleton: {} bones, {} slots, {} skins, {} animations",
            data.bones.len(),
            data.slots.len(),
            data.skins.len(),
            data.animations.len()
        );
        Ok(data)
    }

    fn read_bones(&self, data: &mut SkeletonData, bones: Vec<BoneDef>) -> Result<(), Error> {
        let mut index_by_name = HashMap::with_capacity(bones.len());
        for def in bones {
            let parent = match def.parent.as_deref() {
                None => None,
                Some(parent) => Some(index_by_name.get(parent).copied().ok_or_else(|| {
                    Error::JsonUnknownBoneParent {
                        bone: def.name.clone(),
                        parent: parent.to_string(),
                    }
                })?),
            };
            let mut bone = BoneData::new(def.name.clone(), parent);
            bone.length = def.length * self.scale;
            bone.x = def.x * self.scale;
            bone.y = def.y * self.scale;
            bone.rotation = def.rotation;
            bone.scale_x = def.scale_x;
            bone.scale_y = def.scale_y;
            bone.shear_x = def.shear_x;
            bone.shear_y = def.shear_y;
            bone.transform_mode = parse_transform_mode(def.transform.as_deref(), &def.name)?;
            if let Some(color) = def.color.as_deref() {
                bone.color = parse_hex_color_rgba(color, &format!("bone '{}'", def.name))?;
            }
            index_by_name.insert(def.name, data.bones.len());
            data.bones.push(bone);
        }
        Ok(())
    }

    fn read_slots(&self, data: &mut SkeletonData, slots: Vec<SlotDef>) -> Result<(), Error> {
        for def in slots {
            let bone = data
                .find_bone(&def.bone)
                .ok_or_else(|| Error::JsonUnknownSlotBone {
                    slot: def.name.clone(),
                    bone: def.bone.clone(),
                })?;
            let mut slot = SlotData::new(def.name.clone(), bone);
            let context = format!("slot '{}'", def.name);
            if let Some(color) = def.color.as_deref() {
                slot.color = parse_hex_color_rgba(color, &context)?;
            }
            if let Some(dark) = def.dark.as_deref() {
                slot.dark_color = Some(parse_hex_color_rgb(dark, &context)?);
            }
            slot.blend = parse_blend_mode(def.blend.as_deref(), &def.name)?;
            slot.attachment = def.attachment;
            data.slots.push(slot);
        }
        Ok(())
    }

    fn read_skins(&self, data: &mut SkeletonData, skins: SkinsDef) -> Result<(), Error> {
        let skins: Vec<(String, SkinAttachmentsDef)> = match skins {
            SkinsDef::Array(skins) => skins.into_iter().map(|s| (s.name, s.attachments)).collect(),
            SkinsDef::Map(skins) => skins.into_iter().collect(),
        };

        let mut linked_meshes = Vec::new();
        for (skin_name, slots) in skins {
            let mut skin = Skin::new(skin_name.clone());
            for (slot_name, attachments) in slots {
                let slot_index =
                    data.find_slot(&slot_name)
                        .ok_or_else(|| Error::JsonUnknownSkinSlot {
                            skin: skin_name.clone(),
                            slot: slot_name.clone(),
                        })?;
                for (key, def) in attachments {
                    let context = AttachmentContext {
                        skin: &skin_name,
                        slot: &slot_name,
                        attachment: &key,
                        scale: self.scale,
                        bone_count: data.bones.len(),
                    };
                    if def.attachment_type.as_deref() == Some("linkedmesh") {
                        linked_meshes.push(LinkedMesh {
                            skin: skin_name.clone(),
                            slot_index,
                            name: key.clone(),
                            parent: def.parent.clone().unwrap_or_default(),
                            parent_skin: def
                                .skin
                                .clone()
                                .unwrap_or_else(|| crate::DEFAULT_SKIN_NAME.to_string()),
                            inherit_deform: def.deform,
                        });
                    }
                    let attachment = self.read_attachment(data, &context, def)?;
                    if let Some(attachment) = attachment {
                        skin.set_attachment(slot_index, key, attachment);
                    }
                }
            }
            data.skins.insert(skin_name, skin);
        }

        for linked in linked_meshes {
            self.resolve_linked_mesh(data, &linked)?;
        }
        Ok(())
    }

    fn read_attachment(
        &self,
        data: &SkeletonData,
        context: &AttachmentContext<'_>,
        def: AttachmentDef,
    ) -> Result<Option<Attachment>, Error> {
        let name = def
            .name
            .clone()
            .unwrap_or_else(|| context.attachment.to_string());
        let path = def.path.clone().unwrap_or_else(|| name.clone());
        let color = match def.color.as_deref() {
            Some(color) => parse_hex_color_rgba(color, &context.describe())?,
            None => [1.0; 4],
        };
        let scale = self.scale;

        let attachment = match def.attachment_type.as_deref().unwrap_or("region") {
            "region" => {
                let mut region = RegionAttachment::new(name);
                region.path = path;
                region.color = color;
                region.x = def.x * scale;
                region.y = def.y * scale;
                region.rotation = def.rotation;
                region.scale_x = def.scale_x;
                region.scale_y = def.scale_y;
                region.width = def.width * scale;
                region.height = def.height * scale;
                match self.loader.texture_region(&region.path) {
                    Some(texture_region) => region.set_region(texture_region),
                    None => region.update_offset(),
                }
                Attachment::Region(region)
            }
            "mesh" | "linkedmesh" => {
                let mut mesh = MeshAttachment::new(name);
                mesh.path = path;
                mesh.color = color;
                mesh.width = def.width * scale;
                mesh.height = def.height * scale;
                if def.attachment_type.as_deref() == Some("mesh") {
                    let uvs = def.uvs.unwrap_or_default();
                    if uvs.len() % 2 != 0 {
                        return Err(context.mesh_error("uvs must hold x, y pairs"));
                    }
                    let vertex_count = uvs.len() / 2;
                    mesh.vertices = context.vertex_data(
                        &def.vertices.unwrap_or_default(),
                        vertex_count,
                    )?;
                    mesh.region_uvs = uvs.chunks_exact(2).map(|p| [p[0], p[1]]).collect();
                    mesh.triangles = context.indices(
                        def.triangles.unwrap_or_default(),
                        vertex_count,
                        "triangle",
                    )?;
                    if mesh.triangles.len() % 3 != 0 {
                        return Err(context.mesh_error("triangle index count is not a multiple of 3"));
                    }
                    mesh.hull_length = def.hull;
                    mesh.edges = context.indices(
                        def.edges.unwrap_or_default(),
                        vertex_count * 2,
                        "edge",
                    )?;
                }
                match self.loader.texture_region(&mesh.path) {
                    Some(texture_region) => mesh.set_region(texture_region),
                    None => mesh.update_uvs(),
                }
                Attachment::Mesh(mesh)
            }
            "clipping" => {
                let end_slot = match def.end.as_deref() {
                    None => None,
                    Some(end) => Some(data.find_slot(end).ok_or_else(|| {
                        context.mesh_error(format!("unknown clipping end slot '{end}'"))
                    })?),
                };
                let vertex_count = def.vertex_count.unwrap_or(0);
                Attachment::Clipping(ClippingAttachment {
                    name,
                    vertices: context.vertex_data(&def.vertices.unwrap_or_default(), vertex_count)?,
                    end_slot,
                })
            }
            "point" => Attachment::Point(PointAttachment {
                name,
                x: def.x * scale,
                y: def.y * scale,
                rotation: def.rotation,
            }),
            "path" => {
                let vertex_count = def.vertex_count.unwrap_or(0);
                Attachment::Path(PathAttachment {
                    name,
                    vertices: context.vertex_data(&def.vertices.unwrap_or_default(), vertex_count)?,
                    lengths: def
                        .lengths
                        .unwrap_or_default()
                        .into_iter()
                        .map(|l| l * scale)
                        .collect(),
                    closed: def.closed,
                    constant_speed: def.constant_speed,
                })
            }
            "boundingbox" => {
                log::trace!("skipping bounding box attachment {}", context.describe());
                return Ok(None);
            }
            other => {
                return Err(Error::InvalidValue {
                    message: format!("unknown attachment type '{other}' for {}", context.describe()),
                });
            }
        };
        Ok(Some(attachment))
    }

    /// Copies the parent mesh's topology into a linked mesh; the linked mesh keeps its own
    /// region and color.
    fn resolve_linked_mesh(&self, data: &mut SkeletonData, linked: &LinkedMesh) -> Result<(), Error> {
        let parent = data
            .skin(&linked.parent_skin)
            .and_then(|skin| skin.attachment(linked.slot_index, &linked.parent));
        let Some(Attachment::Mesh(parent)) = parent else {
            return Err(Error::JsonUnknownLinkedMeshParent {
                skin: linked.skin.clone(),
                attachment: linked.name.clone(),
                parent: linked.parent.clone(),
            });
        };
        let vertices = parent.vertices.clone();
        let region_uvs = parent.region_uvs.clone();
        let triangles = parent.triangles.clone();
        let edges = parent.edges.clone();
        let hull_length = parent.hull_length;
        let deform_attachment = linked.inherit_deform.then(|| {
            parent.deform_attachment.clone().unwrap_or_else(|| AttachmentRef {
                skin: linked.parent_skin.clone(),
                name: linked.parent.clone(),
            })
        });

        let mesh = data
            .skins
            .get_mut(&linked.skin)
            .and_then(|skin| skin.attachment_mut(linked.slot_index, &linked.name));
        if let Some(Attachment::Mesh(mesh)) = mesh {
            mesh.vertices = vertices;
            mesh.region_uvs = region_uvs;
            mesh.triangles = triangles;
            mesh.edges = edges;
            mesh.hull_length = hull_length;
            mesh.deform_attachment = deform_attachment;
            match mesh.region.clone() {
                Some(region) => mesh.set_region(region),
                None => mesh.update_uvs(),
            }
        }
        Ok(())
    }

    fn read_animation(
        &self,
        data: &SkeletonData,
        name: &str,
        def: AnimationDef,
    ) -> Result<Animation, Error> {
        let unknown = |kind: &'static str, target: &str| Error::JsonUnknownAnimationTarget {
            animation: name.to_string(),
            kind,
            name: target.to_string(),
        };
        let mut timelines = Vec::new();

        for (slot_name, slot_def) in def.slots {
            let slot_index = data
                .find_slot(&slot_name)
                .ok_or_else(|| unknown("slot", &slot_name))?;
            let context = format!("slot '{slot_name}' in animation '{name}'");

            if let Some(keys) = slot_def.attachment.filter(|k| !k.is_empty()) {
                timelines.push(Timeline::Attachment(AttachmentTimeline {
                    slot_index,
                    frames: keys
                        .into_iter()
                        .map(|k| AttachmentFrame {
                            time: k.time,
                            name: k.name,
                        })
                        .collect(),
                }));
            }
            if let Some(keys) = slot_def.color.filter(|k| !k.is_empty()) {
                let mut frames = Vec::with_capacity(keys.len());
                for key in keys {
                    let color = parse_hex_color_rgba(&key.color, &context)?;
                    let curve = parse_curve(&key.curve, &context)?;
                    frames.push(Keyframe::new(key.time, color).with_curve(curve));
                }
                timelines.push(Timeline::Color(ColorTimeline { slot_index, frames }));
            }
            if let Some(keys) = slot_def.two_color.filter(|k| !k.is_empty()) {
                let mut frames = Vec::with_capacity(keys.len());
                for key in keys {
                    let [r, g, b, a] = parse_hex_color_rgba(&key.light, &context)?;
                    let [r2, g2, b2] = parse_hex_color_rgb(&key.dark, &context)?;
                    let curve = parse_curve(&key.curve, &context)?;
                    frames.push(
                        Keyframe::new(key.time, [r, g, b, a, r2, g2, b2]).with_curve(curve),
                    );
                }
                timelines.push(Timeline::TwoColor(TwoColorTimeline { slot_index, frames }));
            }
        }

        for (bone_name, bone_def) in def.bones {
            let bone_index = data
                .find_bone(&bone_name)
                .ok_or_else(|| unknown("bone", &bone_name))?;
            let context = format!("bone '{bone_name}' in animation '{name}'");

            if let Some(keys) = bone_def.rotate.filter(|k| !k.is_empty()) {
                let frames = keys
                    .iter()
                    .map(|k| curved(k.time, [k.angle], &k.curve, &context))
                    .collect::<Result<_, _>>()?;
                timelines.push(Timeline::Rotate(RotateTimeline { bone_index, frames }));
            }
            if let Some(keys) = bone_def.translate.filter(|k| !k.is_empty()) {
                let frames = keys
                    .iter()
                    .map(|k| {
                        let values = [k.x * self.scale, k.y * self.scale];
                        curved(k.time, values, &k.curve, &context)
                    })
                    .collect::<Result<_, _>>()?;
                timelines.push(Timeline::Translate(TranslateTimeline { bone_index, frames }));
            }
            if let Some(keys) = bone_def.scale.filter(|k| !k.is_empty()) {
                let frames = keys
                    .iter()
                    .map(|k| curved(k.time, [k.x, k.y], &k.curve, &context))
                    .collect::<Result<_, _>>()?;
                timelines.push(Timeline::Scale(ScaleTimeline { bone_index, frames }));
            }
            if let Some(keys) = bone_def.shear.filter(|k| !k.is_empty()) {
                let frames = keys
                    .iter()
                    .map(|k| curved(k.time, [k.x, k.y], &k.curve, &context))
                    .collect::<Result<_, _>>()?;
                timelines.push(Timeline::Shear(ShearTimeline { bone_index, frames }));
            }
        }

        for (skin_name, slots) in def.deform {
            let skin = data
                .skin(&skin_name)
                .ok_or_else(|| unknown("skin", &skin_name))?;
            for (slot_name, attachments) in slots {
                let slot_index = data
                    .find_slot(&slot_name)
                    .ok_or_else(|| unknown("slot", &slot_name))?;
                for (attachment_name, keys) in attachments {
                    let vertex_data = skin
                        .attachment(slot_index, &attachment_name)
                        .and_then(Attachment::vertex_data)
                        .ok_or_else(|| unknown("attachment", &attachment_name))?;
                    let target = DeformTarget {
                        animation: name,
                        slot: &slot_name,
                        attachment: &attachment_name,
                        setup: vertex_data.setup_positions(),
                        length: vertex_data.deform_length(),
                        scale: self.scale,
                    };
                    let mut frames = Vec::with_capacity(keys.len());
                    for key in &keys {
                        frames.push(DeformFrame {
                            time: key.time,
                            vertices: target.key_vertices(key)?,
                            curve: parse_curve(&key.curve, &target.describe())?,
                        });
                    }
                    if frames.is_empty() {
                        continue;
                    }
                    let setup_vertices = target.setup;
                    timelines.push(Timeline::Deform(DeformTimeline {
                        slot_index,
                        attachment: AttachmentRef {
                            skin: skin_name.clone(),
                            name: attachment_name,
                        },
                        setup_vertices,
                        frames,
                    }));
                }
            }
        }

        if let Some(keys) = def.draw_order.filter(|k| !k.is_empty()) {
            let mut frames = Vec::with_capacity(keys.len());
            for key in keys {
                let draw_order = match key.offsets {
                    Some(offsets) => Some(build_draw_order(data, &offsets, name)?),
                    None => None,
                };
                frames.push(DrawOrderFrame {
                    time: key.time,
                    draw_order,
                });
            }
            timelines.push(Timeline::DrawOrder(DrawOrderTimeline { frames }));
        }

        if let Some(keys) = def.events.filter(|k| !k.is_empty()) {
            let mut events = Vec::with_capacity(keys.len());
            for key in keys {
                let event_data = data
                    .events
                    .get(&key.name)
                    .ok_or_else(|| unknown("event", &key.name))?;
                let mut event = Event::from_data(key.time, event_data);
                event.int_value = key.int_value.unwrap_or(event_data.int_value);
                event.float_value = key.float_value.unwrap_or(event_data.float_value);
                if let Some(string) = key.string_value {
                    event.string = string;
                }
                if !event.audio_path.is_empty() {
                    event.volume = key.volume.unwrap_or(1.0);
                    event.balance = key.balance.unwrap_or(0.0);
                }
                events.push(event);
            }
            timelines.push(Timeline::Event(EventTimeline { events }));
        }

        Ok(Animation::new(name, timelines))
    }
}

struct AttachmentContext<'a> {
    skin: &'a str,
    slot: &'a str,
    attachment: &'a str,
    scale: f32,
    bone_count: usize,
}

impl AttachmentContext<'_> {
    fn describe(&self) -> String {
        format!(
            "attachment '{}' (skin '{}', slot '{}')",
            self.attachment, self.skin, self.slot
        )
    }

    fn mesh_error(&self, message: impl Into<String>) -> Error {
        Error::JsonInvalidMeshData {
            skin: self.skin.to_string(),
            slot: self.slot.to_string(),
            attachment: self.attachment.to_string(),
            message: message.into(),
        }
    }

    /// Plain `x, y` pairs when the array holds exactly two floats per vertex, bone influences
    /// otherwise.
    fn vertex_data(&self, raw: &[f32], vertex_count: usize) -> Result<VertexData, Error> {
        if raw.len() == vertex_count * 2 {
            return Ok(VertexData::Unweighted(
                raw.chunks_exact(2)
                    .map(|p| [p[0] * self.scale, p[1] * self.scale])
                    .collect(),
            ));
        }
        parse_weighted_vertices(raw, vertex_count, self.bone_count, self.scale)
            .map(VertexData::Weighted)
            .map_err(|message| self.mesh_error(message))
    }

    fn indices(&self, raw: Vec<u32>, bound: usize, what: &str) -> Result<Vec<u16>, Error> {
        raw.into_iter()
            .map(|i| {
                if i as usize >= bound {
                    return Err(self.mesh_error(format!("{what} index {i} out of range")));
                }
                u16::try_from(i)
                    .map_err(|_| self.mesh_error(format!("{what} index {i} exceeds 16 bits")))
            })
            .collect()
    }
}

struct DeformTarget<'a> {
    animation: &'a str,
    slot: &'a str,
    attachment: &'a str,
    setup: Option<Vec<f32>>,
    length: usize,
    scale: f32,
}

impl DeformTarget<'_> {
    fn describe(&self) -> String {
        format!(
            "deform of '{}' on slot '{}' in animation '{}'",
            self.attachment, self.slot, self.animation
        )
    }

    /// Absolute positions for unweighted attachments, offsets for weighted ones.
    fn key_vertices(&self, key: &DeformKey) -> Result<Vec<f32>, Error> {
        let Some(values) = key.vertices.as_deref() else {
            return Ok(match self.setup.as_deref() {
                Some(setup) => setup.to_vec(),
                None => vec![0.0; self.length],
            });
        };
        if key.offset + values.len() > self.length {
            return Err(Error::JsonInvalidDeformData {
                animation: self.animation.to_string(),
                slot: self.slot.to_string(),
                attachment: self.attachment.to_string(),
                message: format!(
                    "offset {} with {} values exceeds {} vertex floats",
                    key.offset,
                    values.len(),
                    self.length
                ),
            });
        }

        let mut out = vec![0.0f32; self.length];
        for (o, v) in out[key.offset..].iter_mut().zip(values) {
            *o = v * self.scale;
        }
        if let Some(setup) = self.setup.as_deref() {
            for (o, s) in out.iter_mut().zip(setup) {
                *o += s;
            }
        }
        Ok(out)
    }
}

fn curved<const N: usize>(
    time: f32,
    values: [f32; N],
    curve: &CurveDef,
    context: &str,
) -> Result<Keyframe<N>, Error> {
    Ok(Keyframe::new(time, values).with_curve(parse_curve(curve, context)?))
}

fn parse_curve(def: &CurveDef, context: &str) -> Result<Curve, Error> {
    let invalid = |message: String| Error::JsonInvalidCurve {
        context: context.to_string(),
        message,
    };
    let Some(value) = def.curve.as_ref() else {
        return Ok(Curve::Linear);
    };

    if let Some(s) = value.as_str() {
        return match s {
            "stepped" => Ok(Curve::Stepped),
            "linear" => Ok(Curve::Linear),
            other => Err(invalid(format!("unknown curve '{other}'"))),
        };
    }
    if let Some(cx1) = value.as_f64() {
        return Ok(Curve::Bezier {
            cx1: cx1 as f32,
            cy1: def.c2.unwrap_or(0.0),
            cx2: def.c3.unwrap_or(1.0),
            cy2: def.c4.unwrap_or(1.0),
        });
    }
    let Some(arr) = value.as_array() else {
        return Err(invalid(format!("unexpected curve value {value}")));
    };
    if arr.len() != 4 {
        return Err(invalid(format!("expected 4 numbers, got {}", arr.len())));
    }
    let mut points = [0.0f32; 4];
    for (i, (p, v)) in points.iter_mut().zip(arr).enumerate() {
        *p = v
            .as_f64()
            .ok_or_else(|| invalid(format!("curve[{i}] must be a number")))? as f32;
    }
    let [cx1, cy1, cx2, cy2] = points;
    Ok(Curve::Bezier { cx1, cy1, cx2, cy2 })
}

/// Expands `drawOrder` offsets into the full slot order of the key.
fn build_draw_order(
    data: &SkeletonData,
    offsets: &[DrawOrderOffset],
    animation: &str,
) -> Result<Vec<usize>, Error> {
    let invalid = |message: String| Error::JsonInvalidDrawOrder {
        animation: animation.to_string(),
        message,
    };
    let slot_count = data.slots.len();
    let mut draw_order: Vec<Option<usize>> = vec![None; slot_count];
    let mut unchanged = Vec::with_capacity(slot_count.saturating_sub(offsets.len()));
    let mut original_index = 0usize;

    for offset in offsets {
        let slot_index = data
            .find_slot(&offset.slot)
            .ok_or_else(|| invalid(format!("unknown slot '{}'", offset.slot)))?;
        if slot_index < original_index {
            return Err(invalid(format!("offsets for slot '{}' are out of order", offset.slot)));
        }
        unchanged.extend(original_index..slot_index);
        original_index = slot_index;

        let target = original_index as i64 + i64::from(offset.offset);
        if target < 0 || target >= slot_count as i64 {
            return Err(invalid(format!(
                "offset {} for slot '{}' is out of range",
                offset.offset, offset.slot
            )));
        }
        let target = &mut draw_order[target as usize];
        if target.is_some() {
            return Err(invalid("two slots moved to the same position".to_string()));
        }
        *target = Some(original_index);
        original_index += 1;
    }
    unchanged.extend(original_index..slot_count);

    let mut out = vec![0usize; slot_count];
    for i in (0..slot_count).rev() {
        out[i] = match draw_order[i] {
            Some(slot) => slot,
            None => unchanged
                .pop()
                .ok_or_else(|| invalid("not enough unchanged slots".to_string()))?,
        };
    }
    Ok(out)
}

fn parse_weighted_vertices(
    raw: &[f32],
    vertex_count: usize,
    bone_count: usize,
    scale: f32,
) -> Result<Vec<Vec<VertexWeight>>, String> {
    fn expect_index(value: f32) -> Option<usize> {
        let rounded = value.round();
        (value.is_finite() && rounded >= 0.0 && (value - rounded).abs() <= 1.0e-4)
            .then_some(rounded as usize)
    }

    let mut cursor = 0usize;
    let mut out = Vec::with_capacity(vertex_count);
    for _ in 0..vertex_count {
        let count = raw
            .get(cursor)
            .copied()
            .and_then(expect_index)
            .ok_or("invalid bone count in weighted vertices")?;
        cursor += 1;

        let mut weights = Vec::with_capacity(count);
        for _ in 0..count {
            let entry = raw
                .get(cursor..cursor + 4)
                .ok_or("unexpected end of weighted vertices")?;
            cursor += 4;
            let bone = expect_index(entry[0])
                .filter(|&b| b < bone_count)
                .ok_or("bone index out of range in weighted vertices")?;
            weights.push(VertexWeight {
                bone,
                x: entry[1] * scale,
                y: entry[2] * scale,
                weight: entry[3],
            });
        }
        out.push(weights);
    }

    if cursor != raw.len() {
        return Err("unexpected extra data in weighted vertices".to_string());
    }
    Ok(out)
}

fn default_one() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

fn parse_hex_color_rgba(input: &str, context: &str) -> Result<[f32; 4], Error> {
    let invalid = || Error::JsonInvalidColor {
        context: context.to_string(),
        value: input.to_string(),
    };
    if !matches!(input.len(), 6 | 8) || !input.is_ascii() {
        return Err(invalid());
    }
    let channel = |i: usize| -> Result<f32, Error> {
        input
            .get(i * 2..i * 2 + 2)
            .and_then(|hex| u8::from_str_radix(hex, 16).ok())
            .map(|v| v as f32 / 255.0)
            .ok_or_else(invalid)
    };
    let alpha = if input.len() == 8 { channel(3)? } else { 1.0 };
    Ok([channel(0)?, channel(1)?, channel(2)?, alpha])
}

fn parse_hex_color_rgb(input: &str, context: &str) -> Result<[f32; 3], Error> {
    let [r, g, b, _] = parse_hex_color_rgba(input, context)?;
    Ok([r, g, b])
}

fn parse_blend_mode(value: Option<&str>, slot_name: &str) -> Result<BlendMode, Error> {
    match value.unwrap_or("normal") {
        "normal" => Ok(BlendMode::Normal),
        "additive" => Ok(BlendMode::Additive),
        "multiply" => Ok(BlendMode::Multiply),
        "screen" => Ok(BlendMode::Screen),
        other => Err(Error::JsonUnsupportedBlendMode {
            slot: slot_name.to_string(),
            value: other.to_string(),
        }),
    }
}

fn parse_transform_mode(value: Option<&str>, bone_name: &str) -> Result<TransformMode, Error> {
    match value.unwrap_or("normal") {
        "normal" => Ok(TransformMode::Normal),
        "onlyTranslation" => Ok(TransformMode::OnlyTranslation),
        "noRotationOrReflection" => Ok(TransformMode::NoRotationOrReflection),
        "noScale" => Ok(TransformMode::NoScale),
        "noScaleOrReflection" => Ok(TransformMode::NoScaleOrReflection),
        other => Err(Error::InvalidValue {
            message: format!("unknown transform mode '{other}' for bone '{bone_name}'"),
        }),
    }
}

/// Accepts any 3.x export; minors other than the targeted one load with a warning.
fn validate_spine_version(value: &str) -> Result<(), Error> {
    let invalid = || Error::JsonSpineVersion {
        value: value.to_string(),
    };
    let mut parts = value.split('.');
    let major: u32 = parts
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or_else(invalid)?;
    if major != SPINE_EXPORT_MAJOR {
        return Err(invalid());
    }
    let minor: Option<u32> = parts.next().and_then(|p| p.parse().ok());
    if minor != Some(SPINE_EXPORT_MINOR) {
        log::warn!(
            "skeleton exported with Spine {value}; expected {SPINE_EXPORT_MAJOR}.{SPINE_EXPORT_MINOR}"
        );
    }
    Ok(())
}
