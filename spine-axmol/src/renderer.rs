use crate::adapter::{RenderOptions, Scratch, emit_skeleton};
use crate::{
    AnimationPlayer, Attachment, BlendFunc, Bone, DrawContext, Error, Program, ProgramState,
    RenderQueue, Skeleton, SkeletonBatch, SkeletonData, Slot, VertexEffect,
};
use std::sync::Arc;

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// A scene-graph object that draws through a [`SkeletonBatch`].
pub trait Renderable {
    fn update(&mut self, delta: f32);
    /// Submits this frame's draw commands; returns how many were added to `queue`.
    fn emit_geometry(
        &mut self,
        batch: &mut SkeletonBatch,
        queue: &mut dyn RenderQueue,
        ctx: &DrawContext,
    ) -> usize;
    fn bounding_box(&self) -> Rect;
}

/// Line lists for debug overlays, in skeleton world space.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DebugGeometry {
    pub slot_lines: Vec<[[f32; 2]; 2]>,
    pub mesh_lines: Vec<[[f32; 2]; 2]>,
    pub bone_lines: Vec<[[f32; 2]; 2]>,
    pub bone_origins: Vec<[f32; 2]>,
}

/// Draws one skeleton instance and optionally drives its animation.
pub struct SkeletonRenderer {
    skeleton: Skeleton,
    player: Option<AnimationPlayer>,
    time_scale: f32,
    debug_slots: bool,
    debug_bones: bool,
    debug_meshes: bool,
    blend_func: BlendFunc,
    premultiplied_alpha: bool,
    two_color_tint: bool,
    program_state: Option<ProgramState>,
    effect: Option<Box<dyn VertexEffect>>,
    slots_range: Option<(usize, usize)>,
    scratch: Scratch,
}

impl std::fmt::Debug for SkeletonRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkeletonRenderer")
            .field("skeleton", &self.skeleton.data.name)
            .field("time_scale", &self.time_scale)
            .field("blend_func", &self.blend_func)
            .field("premultiplied_alpha", &self.premultiplied_alpha)
            .field("two_color_tint", &self.two_color_tint)
            .field("slots_range", &self.slots_range)
            .finish_non_exhaustive()
    }
}

impl SkeletonRenderer {
    pub fn with_skeleton(skeleton: Skeleton) -> Self {
        let mut renderer = Self {
            skeleton,
            player: None,
            time_scale: 1.0,
            debug_slots: false,
            debug_bones: false,
            debug_meshes: false,
            blend_func: BlendFunc::ALPHA_PREMULTIPLIED,
            premultiplied_alpha: true,
            two_color_tint: false,
            program_state: None,
            effect: None,
            slots_range: None,
            scratch: Scratch::default(),
        };
        renderer.skeleton.set_to_setup_pose();
        renderer.skeleton.update_world_transform();
        renderer
    }

    pub fn with_data(data: Arc<SkeletonData>) -> Self {
        Self::with_skeleton(Skeleton::new(data))
    }

    /// Loads Spine JSON from `path`, resolving regions in `atlas`.
    #[cfg(feature = "json")]
    pub fn from_json_file(
        path: impl AsRef<std::path::Path>,
        atlas: &crate::Atlas,
        scale: f32,
    ) -> Result<Self, Error> {
        let loader = crate::AtlasAttachmentLoader::new(atlas);
        let data = crate::json::SkeletonJson::new(&loader)
            .with_scale(scale)
            .read_file(path)?;
        Ok(Self::with_data(Arc::new(data)))
    }

    #[cfg(feature = "json")]
    pub fn from_json_str(json: &str, atlas: &crate::Atlas, scale: f32) -> Result<Self, Error> {
        let loader = crate::AtlasAttachmentLoader::new(atlas);
        let data = crate::json::SkeletonJson::new(&loader)
            .with_scale(scale)
            .read_str(json)?;
        Ok(Self::with_data(Arc::new(data)))
    }

    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    pub fn skeleton_mut(&mut self) -> &mut Skeleton {
        &mut self.skeleton
    }

    pub fn animation_player(&self) -> Option<&AnimationPlayer> {
        self.player.as_ref()
    }

    /// The animation player, created on first use.
    pub fn animation_player_mut(&mut self) -> &mut AnimationPlayer {
        let data = &self.skeleton.data;
        self.player
            .get_or_insert_with(|| AnimationPlayer::new(Arc::clone(data)))
    }

    pub fn set_animation(&mut self, name: &str, looped: bool) -> Result<(), Error> {
        self.animation_player_mut().set_animation(name, looped)
    }

    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale;
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    pub fn set_debug_slots_enabled(&mut self, enabled: bool) {
        self.debug_slots = enabled;
    }

    pub fn debug_slots_enabled(&self) -> bool {
        self.debug_slots
    }

    pub fn set_debug_bones_enabled(&mut self, enabled: bool) {
        self.debug_bones = enabled;
    }

    pub fn debug_bones_enabled(&self) -> bool {
        self.debug_bones
    }

    pub fn set_debug_meshes_enabled(&mut self, enabled: bool) {
        self.debug_meshes = enabled;
    }

    pub fn debug_meshes_enabled(&self) -> bool {
        self.debug_meshes
    }

    pub fn update_world_transform(&mut self) {
        self.skeleton.update_world_transform();
    }

    pub fn set_to_setup_pose(&mut self) {
        self.skeleton.set_to_setup_pose();
    }

    pub fn set_bones_to_setup_pose(&mut self) {
        self.skeleton.set_bones_to_setup_pose();
    }

    pub fn set_slots_to_setup_pose(&mut self) {
        self.skeleton.set_slots_to_setup_pose();
    }

    pub fn find_bone(&self, name: &str) -> Option<&Bone> {
        let index = self.skeleton.find_bone(name)?;
        self.skeleton.bones.get(index)
    }

    pub fn find_slot(&self, name: &str) -> Option<&Slot> {
        let index = self.skeleton.find_slot(name)?;
        self.skeleton.slots.get(index)
    }

    /// Switches skin; `None` removes the skin so only default-skin attachments resolve.
    pub fn set_skin(&mut self, name: Option<&str>) -> Result<(), Error> {
        self.skeleton.set_skin(name)
    }

    pub fn attachment(&self, slot_name: &str, name: &str) -> Option<&Attachment> {
        self.skeleton.attachment_by_slot_name(slot_name, name)
    }

    pub fn set_attachment(&mut self, slot_name: &str, name: Option<&str>) -> Result<(), Error> {
        self.skeleton.set_attachment(slot_name, name)
    }

    /// Draws with the two-color program, which may split batches with other skeletons.
    pub fn set_two_color_tint(&mut self, enabled: bool) {
        self.two_color_tint = enabled;
        self.program_state = enabled.then(|| ProgramState::new(Program::two_color()));
    }

    pub fn is_two_color_tint(&self) -> bool {
        self.two_color_tint
    }

    pub fn set_vertex_effect(&mut self, effect: Option<Box<dyn VertexEffect>>) {
        self.effect = effect;
    }

    /// Restricts drawing to the slots from `start` through `end`, in draw order.
    pub fn set_slots_range(&mut self, range: Option<(usize, usize)>) {
        self.slots_range = range;
    }

    pub fn set_blend_func(&mut self, blend_func: BlendFunc) {
        self.blend_func = blend_func;
    }

    pub fn blend_func(&self) -> BlendFunc {
        self.blend_func
    }

    /// Premultiplies vertex colors by alpha.
    pub fn set_opacity_modify_rgb(&mut self, value: bool) {
        self.premultiplied_alpha = value;
    }

    pub fn is_opacity_modify_rgb(&self) -> bool {
        self.premultiplied_alpha
    }

    pub fn destroy_scratch_buffers(&mut self) {
        self.scratch.release();
    }

    /// Debug overlay lines for whichever debug layers are enabled.
    pub fn debug_geometry(&self) -> DebugGeometry {
        let mut out = DebugGeometry::default();
        let skeleton = &self.skeleton;
        let mut world = Vec::new();

        if self.debug_slots || self.debug_meshes {
            for &slot_index in &skeleton.draw_order {
                let slot = &skeleton.slots[slot_index];
                let bone = &skeleton.bones[slot.bone];
                match skeleton.slot_attachment(slot_index) {
                    Some(Attachment::Region(region)) if self.debug_slots => {
                        let quad = region.compute_world_vertices(bone);
                        for i in 0..4 {
                            out.slot_lines.push([quad[i], quad[(i + 1) % 4]]);
                        }
                    }
                    Some(Attachment::Mesh(mesh)) if self.debug_meshes => {
                        mesh.vertices.compute_world_vertices(
                            &skeleton.bones,
                            bone,
                            &slot.deform,
                            &mut world,
                        );
                        for tri in mesh.triangles.chunks_exact(3) {
                            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| world[i as usize]);
                            out.mesh_lines.extend([[a, b], [b, c], [c, a]]);
                        }
                    }
                    _ => {}
                }
            }
        }

        if self.debug_bones {
            for bone in &skeleton.bones {
                let length = skeleton.data.bones[bone.data_index()].length;
                let origin = [bone.world_x, bone.world_y];
                let tip = [
                    length * bone.a + bone.world_x,
                    length * bone.c + bone.world_y,
                ];
                out.bone_lines.push([origin, tip]);
                out.bone_origins.push(origin);
            }
        }
        out
    }
}

impl Renderable for SkeletonRenderer {
    fn update(&mut self, delta: f32) {
        let delta = delta * self.time_scale;
        self.skeleton.update(delta);
        if let Some(player) = self.player.as_mut() {
            player.update(delta);
            player.apply(&mut self.skeleton);
        }
        self.skeleton.update_world_transform();
    }

    fn emit_geometry(
        &mut self,
        batch: &mut SkeletonBatch,
        queue: &mut dyn RenderQueue,
        ctx: &DrawContext,
    ) -> usize {
        let options = RenderOptions {
            premultiplied_alpha: self.premultiplied_alpha,
            blend_func: self.blend_func,
            program_state: self.program_state.as_ref(),
            slots_range: self.slots_range,
        };
        emit_skeleton(
            &self.skeleton,
            batch,
            queue,
            ctx,
            &options,
            &mut self.scratch,
            self.effect
                .as_mut()
                .map(|effect| &mut **effect as &mut dyn VertexEffect),
        )
    }

    /// Bounds of every region and mesh in world space; a zero rect when nothing is attached.
    fn bounding_box(&self) -> Rect {
        let skeleton = &self.skeleton;
        let mut min = [f32::MAX; 2];
        let mut max = [f32::MIN; 2];
        let mut world = Vec::new();
        let mut include = |p: [f32; 2]| {
            for i in 0..2 {
                min[i] = min[i].min(p[i]);
                max[i] = max[i].max(p[i]);
            }
        };

        for (slot_index, slot) in skeleton.slots.iter().enumerate() {
            let bone = &skeleton.bones[slot.bone];
            match skeleton.slot_attachment(slot_index) {
                Some(Attachment::Region(region)) => {
                    region.compute_world_vertices(bone).into_iter().for_each(&mut include);
                }
                Some(Attachment::Mesh(mesh)) => {
                    mesh.vertices.compute_world_vertices(
                        &skeleton.bones,
                        bone,
                        &slot.deform,
                        &mut world,
                    );
                    world.iter().copied().for_each(&mut include);
                }
                _ => {}
            }
        }

        if min[0] == f32::MAX {
            return Rect::default();
        }
        Rect {
            x: min[0],
            y: min[1],
            width: max[0] - min[0],
            height: max[1] - min[1],
        }
    }
}
