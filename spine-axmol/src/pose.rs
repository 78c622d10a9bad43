use crate::{Attachment, AttachmentRef, Error, SkeletonData, TransformMode};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct Bone {
    data_index: usize,
    parent: Option<usize>,

    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub shear_x: f32,
    pub shear_y: f32,

    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub world_x: f32,
    pub world_y: f32,
}

impl Bone {
    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub fn parent_index(&self) -> Option<usize> {
        self.parent
    }

    /// Transforms a bone-local point to world space.
    pub fn transform_point(&self, x: f32, y: f32) -> [f32; 2] {
        [
            self.a * x + self.b * y + self.world_x,
            self.c * x + self.d * y + self.world_y,
        ]
    }

    pub fn world_rotation_x(&self) -> f32 {
        self.c.atan2(self.a).to_degrees()
    }

    pub fn world_scale_x(&self) -> f32 {
        (self.a * self.a + self.c * self.c).sqrt()
    }

    pub fn world_scale_y(&self) -> f32 {
        (self.b * self.b + self.d * self.d).sqrt()
    }
}

#[derive(Clone, Debug)]
pub struct Slot {
    data_index: usize,
    pub bone: usize,
    pub color: [f32; 4],
    pub dark_color: Option<[f32; 3]>,
    attachment: Option<String>,
    pub deform: Vec<f32>,
}

impl Slot {
    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub fn attachment_name(&self) -> Option<&str> {
        self.attachment.as_deref()
    }
}

#[derive(Clone, Copy, Debug)]
struct ParentTransform {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    world_x: f32,
    world_y: f32,
}

/// Mutable pose of one skeleton instance over shared, immutable [`SkeletonData`].
#[derive(Clone, Debug)]
pub struct Skeleton {
    pub data: Arc<SkeletonData>,
    pub bones: Vec<Bone>,
    pub slots: Vec<Slot>,
    /// Slot indices in draw order.
    pub draw_order: Vec<usize>,
    skin: Option<String>,
    pub color: [f32; 4],
    pub x: f32,
    pub y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    time: f32,
}

impl Skeleton {
    pub fn new(data: Arc<SkeletonData>) -> Self {
        let bones = data
            .bones
            .iter()
            .enumerate()
            .map(|(i, b)| Bone {
                data_index: i,
                parent: b.parent,
                x: b.x,
                y: b.y,
                rotation: b.rotation,
                scale_x: b.scale_x,
                scale_y: b.scale_y,
                shear_x: b.shear_x,
                shear_y: b.shear_y,
                a: 1.0,
                b: 0.0,
                c: 0.0,
                d: 1.0,
                world_x: 0.0,
                world_y: 0.0,
            })
            .collect();
        let slots = data
            .slots
            .iter()
            .enumerate()
            .map(|(i, s)| Slot {
                data_index: i,
                bone: s.bone,
                color: s.color,
                dark_color: s.dark_color,
                attachment: None,
                deform: Vec::new(),
            })
            .collect();

        let mut skeleton = Self {
            draw_order: (0..data.slots.len()).collect(),
            data,
            bones,
            slots,
            skin: None,
            color: [1.0; 4],
            x: 0.0,
            y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            time: 0.0,
        };
        skeleton.set_slots_to_setup_pose();
        skeleton
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn set_time(&mut self, time: f32) {
        self.time = time;
    }

    pub fn update(&mut self, delta: f32) {
        self.time += delta;
    }

    pub fn skin(&self) -> Option<&str> {
        self.skin.as_deref()
    }

    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.data.find_bone(name)
    }

    pub fn find_slot(&self, name: &str) -> Option<usize> {
        self.data.find_slot(name)
    }

    pub fn update_world_transform(&mut self) {
        let (sx, sy, x, y) = (self.scale_x, self.scale_y, self.x, self.y);
        for i in 0..self.bones.len() {
            let data = &self.data.bones[self.bones[i].data_index];
            let mode = data.transform_mode;
            let parent = self.bones[i].parent.map(|p| {
                let p = &self.bones[p];
                ParentTransform {
                    a: p.a,
                    b: p.b,
                    c: p.c,
                    d: p.d,
                    world_x: p.world_x,
                    world_y: p.world_y,
                }
            });
            let bone = &mut self.bones[i];
            match parent {
                None => update_world_transform_root(bone, x, y, sx, sy),
                Some(parent) => update_world_transform_child(bone, mode, sx, sy, &parent),
            }
        }
    }

    pub fn set_to_setup_pose(&mut self) {
        self.set_bones_to_setup_pose();
        self.set_slots_to_setup_pose();
    }

    pub fn set_bones_to_setup_pose(&mut self) {
        for bone in &mut self.bones {
            let data = &self.data.bones[bone.data_index];
            bone.x = data.x;
            bone.y = data.y;
            bone.rotation = data.rotation;
            bone.scale_x = data.scale_x;
            bone.scale_y = data.scale_y;
            bone.shear_x = data.shear_x;
            bone.shear_y = data.shear_y;
        }
    }

    pub fn set_slots_to_setup_pose(&mut self) {
        self.draw_order.clear();
        self.draw_order.extend(0..self.slots.len());
        for i in 0..self.slots.len() {
            self.set_slot_to_setup_pose(i);
        }
    }

    pub(crate) fn set_slot_to_setup_pose(&mut self, slot_index: usize) {
        let data = &self.data.slots[slot_index];
        let slot = &mut self.slots[slot_index];
        slot.color = data.color;
        slot.dark_color = data.dark_color;
        let setup = data.attachment.clone();
        let resolved = setup.filter(|name| {
            self.data
                .attachment(self.skin.as_deref(), slot_index, name)
                .is_some()
        });
        let slot = &mut self.slots[slot_index];
        slot.attachment = resolved;
        slot.deform.clear();
    }

    /// Changes the active skin.
    ///
    /// Switching from no skin attaches the new skin's setup attachments; switching between skins
    /// replaces each attached entry with the new skin's entry of the same name, when present.
    pub fn set_skin(&mut self, skin_name: Option<&str>) -> Result<(), Error> {
        if let Some(name) = skin_name {
            if self.data.skin(name).is_none() {
                return Err(Error::UnknownSkin {
                    name: name.to_string(),
                });
            }
        }
        let had_skin = self.skin.is_some();
        self.skin = skin_name.map(str::to_string);
        let Some(new_skin) = self.skin.as_deref().and_then(|n| self.data.skin(n)) else {
            return Ok(());
        };

        for (slot_index, slot) in self.slots.iter_mut().enumerate() {
            let candidate = if had_skin {
                slot.attachment.as_deref()
            } else {
                self.data.slots[slot_index].attachment.as_deref()
            };
            let Some(name) = candidate else {
                continue;
            };
            if new_skin.attachment(slot_index, name).is_some() {
                slot.attachment = Some(name.to_string());
                slot.deform.clear();
            }
        }
        Ok(())
    }

    /// Looks an attachment up in the active skin, then the default skin.
    pub fn attachment(&self, slot_index: usize, name: &str) -> Option<&Attachment> {
        self.data.attachment(self.skin.as_deref(), slot_index, name)
    }

    pub fn attachment_by_slot_name(&self, slot_name: &str, name: &str) -> Option<&Attachment> {
        let slot_index = self.find_slot(slot_name)?;
        self.attachment(slot_index, name)
    }

    /// Attachment currently shown by a slot.
    pub fn slot_attachment(&self, slot_index: usize) -> Option<&Attachment> {
        let name = self.slots[slot_index].attachment.as_deref()?;
        self.attachment(slot_index, name)
    }

    /// Skin entry whose deform keys drive the slot's current attachment.
    pub fn slot_deform_target(&self, slot_index: usize) -> Option<AttachmentRef> {
        let name = self.slots[slot_index].attachment.as_deref()?;
        let (skin, attachment) = self
            .data
            .resolve_attachment(self.skin.as_deref(), slot_index, name)?;
        attachment.vertex_data()?;
        Some(match attachment.deform_attachment() {
            Some(target) => target.clone(),
            None => AttachmentRef {
                skin: skin.name.clone(),
                name: name.to_string(),
            },
        })
    }

    /// Sets (or clears, with `None`) a slot's attachment by slot name.
    pub fn set_attachment(&mut self, slot_name: &str, name: Option<&str>) -> Result<(), Error> {
        let slot_index = self.find_slot(slot_name).ok_or_else(|| Error::UnknownSlot {
            name: slot_name.to_string(),
        })?;
        if let Some(name) = name {
            if self.attachment(slot_index, name).is_none() {
                return Err(Error::UnknownAttachment {
                    slot: slot_name.to_string(),
                    attachment: name.to_string(),
                });
            }
        }
        self.set_slot_attachment(slot_index, name);
        Ok(())
    }

    /// Sets a slot's attachment key without validation; deform is cleared when it changes.
    pub(crate) fn set_slot_attachment(&mut self, slot_index: usize, name: Option<&str>) {
        let resolved = name.filter(|n| self.attachment(slot_index, n).is_some());
        let slot = &mut self.slots[slot_index];
        if slot.attachment.as_deref() == resolved {
            return;
        }
        slot.attachment = resolved.map(str::to_string);
        slot.deform.clear();
    }
}

fn update_world_transform_root(bone: &mut Bone, x: f32, y: f32, scale_x: f32, scale_y: f32) {
    let rotation_x = (bone.rotation + bone.shear_x).to_radians();
    let rotation_y = (bone.rotation + 90.0 + bone.shear_y).to_radians();
    let la = rotation_x.cos() * bone.scale_x;
    let lb = rotation_y.cos() * bone.scale_y;
    let lc = rotation_x.sin() * bone.scale_x;
    let ld = rotation_y.sin() * bone.scale_y;

    bone.a = la * scale_x;
    bone.b = lb * scale_x;
    bone.c = lc * scale_y;
    bone.d = ld * scale_y;
    bone.world_x = bone.x * scale_x + x;
    bone.world_y = bone.y * scale_y + y;
}

fn update_world_transform_child(
    bone: &mut Bone,
    mode: TransformMode,
    skeleton_scale_x: f32,
    skeleton_scale_y: f32,
    parent: &ParentTransform,
) {
    let mut pa = parent.a;
    let mut pb = parent.b;
    let mut pc = parent.c;
    let mut pd = parent.d;

    bone.world_x = pa * bone.x + pb * bone.y + parent.world_x;
    bone.world_y = pc * bone.x + pd * bone.y + parent.world_y;

    match mode {
        TransformMode::Normal => {
            let rotation_x = (bone.rotation + bone.shear_x).to_radians();
            let rotation_y = (bone.rotation + 90.0 + bone.shear_y).to_radians();
            let la = rotation_x.cos() * bone.scale_x;
            let lb = rotation_y.cos() * bone.scale_y;
            let lc = rotation_x.sin() * bone.scale_x;
            let ld = rotation_y.sin() * bone.scale_y;

            bone.a = pa * la + pb * lc;
            bone.b = pa * lb + pb * ld;
            bone.c = pc * la + pd * lc;
            bone.d = pc * lb + pd * ld;
        }
        TransformMode::OnlyTranslation => {
            let rotation_x = (bone.rotation + bone.shear_x).to_radians();
            let rotation_y = (bone.rotation + 90.0 + bone.shear_y).to_radians();
            bone.a = rotation_x.cos() * bone.scale_x * skeleton_scale_x;
            bone.b = rotation_y.cos() * bone.scale_y * skeleton_scale_x;
            bone.c = rotation_x.sin() * bone.scale_x * skeleton_scale_y;
            bone.d = rotation_y.sin() * bone.scale_y * skeleton_scale_y;
        }
        TransformMode::NoRotationOrReflection => {
            let mut s = pa * pa + pc * pc;
            let prx;
            if s > 1.0e-4 {
                s = (pa * pd - pb * pc).abs() / s;
                pa /= skeleton_scale_x;
                pc /= skeleton_scale_y;
                pb = pc * s;
                pd = pa * s;
                prx = pc.atan2(pa).to_degrees();
            } else {
                pa = 0.0;
                pc = 0.0;
                prx = 90.0 - pd.atan2(pb).to_degrees();
            }

            let rotation_x = (bone.rotation + bone.shear_x - prx).to_radians();
            let rotation_y = (bone.rotation + bone.shear_y - prx + 90.0).to_radians();
            let la = rotation_x.cos() * bone.scale_x;
            let lb = rotation_y.cos() * bone.scale_y;
            let lc = rotation_x.sin() * bone.scale_x;
            let ld = rotation_y.sin() * bone.scale_y;

            bone.a = (pa * la - pb * lc) * skeleton_scale_x;
            bone.b = (pa * lb - pb * ld) * skeleton_scale_x;
            bone.c = (pc * la + pd * lc) * skeleton_scale_y;
            bone.d = (pc * lb + pd * ld) * skeleton_scale_y;
        }
        TransformMode::NoScale | TransformMode::NoScaleOrReflection => {
            let (sin, cos) = bone.rotation.to_radians().sin_cos();
            let mut za = (pa * cos + pb * sin) / skeleton_scale_x;
            let mut zc = (pc * cos + pd * sin) / skeleton_scale_y;
            let mut s = (za * za + zc * zc).sqrt();
            if s > 1.0e-5 {
                s = 1.0 / s;
            }
            za *= s;
            zc *= s;
            s = (za * za + zc * zc).sqrt();
            if mode == TransformMode::NoScale
                && (pa * pd - pb * pc < 0.0) != ((skeleton_scale_x < 0.0) != (skeleton_scale_y < 0.0))
            {
                s = -s;
            }

            let r = std::f32::consts::FRAC_PI_2 + zc.atan2(za);
            let zb = r.cos() * s;
            let zd = r.sin() * s;

            let shear_x = bone.shear_x.to_radians();
            let shear_y = (90.0 + bone.shear_y).to_radians();
            let la = shear_x.cos() * bone.scale_x;
            let lb = shear_y.cos() * bone.scale_y;
            let lc = shear_x.sin() * bone.scale_x;
            let ld = shear_y.sin() * bone.scale_y;

            bone.a = za * la + zb * lc;
            bone.b = za * lb + zb * ld;
            bone.c = zc * la + zd * lc;
            bone.d = zc * lb + zd * ld;
            bone.a *= skeleton_scale_x;
            bone.b *= skeleton_scale_x;
            bone.c *= skeleton_scale_y;
            bone.d *= skeleton_scale_y;
        }
    }
}
