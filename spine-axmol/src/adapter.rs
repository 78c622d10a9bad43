//! Turns a posed skeleton into batch geometry and draw commands.

use crate::{
    Attachment, AttachmentVertices, BlendFunc, CommandId, CommandParams, ProgramState,
    RenderQueue, Skeleton, SkeletonBatch, SkeletonClipper, Slot, Triangles, Vertex,
    VertexEffect, blend_func_for,
};
use glam::{Mat4, Vec2, Vec4};

/// Per-draw state handed down by the host's scene graph.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawContext {
    pub projection: Mat4,
    pub model_view: Mat4,
    pub global_order: f32,
    pub flags: u32,
    /// Displayed color and opacity of the owning node.
    pub node_color: [f32; 4],
}

impl Default for DrawContext {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            model_view: Mat4::IDENTITY,
            global_order: 0.0,
            flags: 0,
            node_color: [1.0; 4],
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct RenderOptions<'a> {
    pub premultiplied_alpha: bool,
    pub blend_func: BlendFunc,
    pub program_state: Option<&'a ProgramState>,
    /// Inclusive `(start, end)` slot indices to draw; `None` draws every slot.
    pub slots_range: Option<(usize, usize)>,
}

/// World-vertex and clipping storage reused across draws.
#[derive(Debug, Default)]
pub(crate) struct Scratch {
    pub world: Vec<[f32; 2]>,
    pub clipper: SkeletonClipper,
}

impl Scratch {
    pub fn release(&mut self) {
        self.world = Vec::new();
        self.clipper.release();
    }
}

/// Emits every visible slot of `skeleton`, merging consecutive draws that share state.
///
/// Returns the number of commands submitted to `queue`.
pub(crate) fn emit_skeleton(
    skeleton: &Skeleton,
    batch: &mut SkeletonBatch,
    queue: &mut dyn RenderQueue,
    ctx: &DrawContext,
    options: &RenderOptions<'_>,
    scratch: &mut Scratch,
    mut effect: Option<&mut (dyn VertexEffect + '_)>,
) -> usize {
    if let Some(effect) = effect.as_deref_mut() {
        effect.begin(skeleton);
    }

    let mut submitted = 0;
    let mut last: Option<CommandId> = None;
    let mut in_range = options.slots_range.is_none();

    for &slot_index in &skeleton.draw_order {
        if let Some((start, end)) = options.slots_range {
            if start == slot_index {
                in_range = true;
            }
            if !in_range {
                scratch.clipper.clip_end_slot(slot_index);
                continue;
            }
            if end == slot_index {
                in_range = false;
            }
        }

        let slot = &skeleton.slots[slot_index];
        let Some(attachment) = skeleton.slot_attachment(slot_index) else {
            scratch.clipper.clip_end_slot(slot_index);
            continue;
        };
        if slot.color[3] == 0.0 {
            scratch.clipper.clip_end_slot(slot_index);
            continue;
        }

        let bone = &skeleton.bones[slot.bone];
        let (vertices, attachment_color, premultiplied) = match attachment {
            Attachment::Region(region) => {
                let Some(vertices) = region.attachment_vertices() else {
                    scratch.clipper.clip_end_slot(slot_index);
                    continue;
                };
                scratch.world.clear();
                scratch.world.extend(region.compute_world_vertices(bone));
                let pma = region.region.as_ref().is_some_and(|r| r.premultiplied_alpha);
                (vertices, region.color, pma)
            }
            Attachment::Mesh(mesh) => {
                let Some(vertices) = mesh.attachment_vertices() else {
                    scratch.clipper.clip_end_slot(slot_index);
                    continue;
                };
                mesh.vertices.compute_world_vertices(
                    &skeleton.bones,
                    bone,
                    &slot.deform,
                    &mut scratch.world,
                );
                let pma = mesh.region.as_ref().is_some_and(|r| r.premultiplied_alpha);
                (vertices, mesh.color, pma)
            }
            Attachment::Clipping(clip) => {
                clip.vertices.compute_world_vertices(
                    &skeleton.bones,
                    bone,
                    &slot.deform,
                    &mut scratch.world,
                );
                scratch.clipper.clip_start(clip.end_slot, &scratch.world);
                continue;
            }
            Attachment::Point(_) | Attachment::Path(_) => {
                scratch.clipper.clip_end_slot(slot_index);
                continue;
            }
        };

        let pma = options.premultiplied_alpha || premultiplied;
        let Some(colors) = vertex_colors(skeleton, slot, ctx.node_color, attachment_color, pma)
        else {
            scratch.clipper.clip_end_slot(slot_index);
            continue;
        };

        let triangles = write_geometry(batch, vertices, &scratch.world, colors, &mut scratch.clipper);
        if let Some(triangles) = triangles {
            if let Some(effect) = effect.as_deref_mut() {
                apply_effect(batch, triangles, effect);
            }

            let params = CommandParams {
                global_order: ctx.global_order,
                texture: vertices.texture,
                program_state: options.program_state,
                blend_func: blend_func_for(
                    skeleton.data.slots[slot.data_index()].blend,
                    pma,
                    options.blend_func,
                ),
                triangles,
                model_view: ctx.model_view,
                flags: ctx.flags,
            };
            let merged = last.is_some_and(|id| batch.try_merge(id, &params));
            if !merged {
                last = Some(batch.add_command(queue, ctx.projection, params));
                submitted += 1;
            }
        }

        scratch.clipper.clip_end_slot(slot_index);
    }

    scratch.clipper.clip_end();
    if let Some(effect) = effect {
        effect.end();
    }
    submitted
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct VertexColors {
    pub light: [u8; 4],
    pub dark: [u8; 4],
}

/// Light and dark vertex colors for a slot, or `None` when the result is fully transparent.
///
/// With premultiplied alpha the dark color is scaled by the light alpha and its alpha is one;
/// otherwise its alpha is zero, which the two-color shader reads as "not premultiplied".
pub(crate) fn vertex_colors(
    skeleton: &Skeleton,
    slot: &Slot,
    node_color: [f32; 4],
    attachment_color: [f32; 4],
    premultiplied_alpha: bool,
) -> Option<VertexColors> {
    let mut light = [0.0f32; 4];
    for (i, c) in light.iter_mut().enumerate() {
        *c = node_color[i] * skeleton.color[i] * slot.color[i] * attachment_color[i];
    }
    let alpha = light[3];
    if alpha <= 0.0 {
        return None;
    }
    if premultiplied_alpha {
        for c in &mut light[..3] {
            *c *= alpha;
        }
    }

    let dark = match slot.dark_color {
        None => [0.0, 0.0, 0.0, 1.0],
        Some([r, g, b]) if premultiplied_alpha => [r * alpha, g * alpha, b * alpha, 1.0],
        Some([r, g, b]) => [r, g, b, 0.0],
    };

    Some(VertexColors {
        light: light.map(to_byte),
        dark: dark.map(to_byte),
    })
}

fn to_byte(c: f32) -> u8 {
    (c.clamp(0.0, 1.0) * 255.0) as u8
}

/// Writes one attachment's geometry into the batch, clipped when a clip is active.
///
/// Ranges are sized for the unclipped topology first; when clipping, they are returned to the
/// batch and replaced by ranges sized for the clipped output.
fn write_geometry(
    batch: &mut SkeletonBatch,
    source: &AttachmentVertices,
    world: &[[f32; 2]],
    colors: VertexColors,
    clipper: &mut SkeletonClipper,
) -> Option<Triangles> {
    let count = world.len().min(source.uvs.len());
    if count == 0 || source.triangles.is_empty() {
        return None;
    }

    let mut vertices = batch.allocate_vertices(count);
    let mut indices = batch.allocate_indices(source.triangles.len());

    if clipper.is_clipping() {
        batch.deallocate_indices(indices.len());
        batch.deallocate_vertices(vertices.len());
        clipper.clip_triangles(&world[..count], &source.triangles, &source.uvs[..count]);
        let positions = clipper.clipped_positions();
        if positions.is_empty() || clipper.clipped_triangles().is_empty() {
            return None;
        }
        vertices = batch.allocate_vertices(positions.len());
        indices = batch.allocate_indices(clipper.clipped_triangles().len());
        fill(
            batch.vertices_mut(vertices),
            positions,
            clipper.clipped_uvs(),
            colors,
        );
        batch
            .indices_mut(indices)
            .copy_from_slice(clipper.clipped_triangles());
    } else {
        fill(
            batch.vertices_mut(vertices),
            &world[..count],
            &source.uvs[..count],
            colors,
        );
        batch.indices_mut(indices).copy_from_slice(&source.triangles);
    }

    Some(Triangles { vertices, indices })
}

fn fill(out: &mut [Vertex], positions: &[[f32; 2]], uvs: &[[f32; 2]], colors: VertexColors) {
    for ((vertex, [x, y]), uv) in out.iter_mut().zip(positions).zip(uvs) {
        *vertex = Vertex {
            position: [*x, *y, 0.0],
            color: colors.light,
            dark_color: colors.dark,
            uv: *uv,
        };
    }
}

fn apply_effect(batch: &mut SkeletonBatch, triangles: Triangles, effect: &mut dyn VertexEffect) {
    let to_vec4 = |c: [u8; 4]| Vec4::from_array(c.map(|v| v as f32 / 255.0));
    for vertex in batch.vertices_mut(triangles.vertices) {
        let mut position = Vec2::new(vertex.position[0], vertex.position[1]);
        let mut uv = Vec2::from_array(vertex.uv);
        let mut light = to_vec4(vertex.color);
        let mut dark = to_vec4(vertex.dark_color);
        effect.transform(&mut position, &mut uv, &mut light, &mut dark);
        vertex.position[0] = position.x;
        vertex.position[1] = position.y;
        vertex.uv = uv.to_array();
        vertex.color = light.to_array().map(to_byte);
        vertex.dark_color = dark.to_array().map(to_byte);
    }
}
