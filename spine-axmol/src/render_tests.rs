use crate::{
    Animation, Attachment, BlendFactor, BlendFunc, BlendMode, BoneData, ClippingAttachment,
    CommandQueue, DebugGeometry, DrawContext, FrameListener, Keyframe, ProgramKind, Rect, RegionAttachment,
    Renderable, SkeletonBatch, SkeletonCommand, SkeletonData, SkeletonRenderer, Skin, SlotData,
    TextureHandle, TextureRegion, Timeline, TranslateTimeline, Vertex, VertexData, VertexEffect,
};
use glam::{Mat4, Vec2, Vec4};
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-4,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

/// A 10x10 region centered on its bone, covering the whole texture.
fn region(name: &str, texture: u32) -> Attachment {
    let mut region = RegionAttachment::new(name);
    region.width = 10.0;
    region.height = 10.0;
    region.set_region(TextureRegion {
        texture: TextureHandle::new(texture),
        page_width: 64.0,
        page_height: 64.0,
        u2: 1.0,
        v2: 1.0,
        width: 10.0,
        height: 10.0,
        original_width: 10.0,
        original_height: 10.0,
        ..TextureRegion::default()
    });
    Attachment::Region(region)
}

struct SlotSetup {
    name: &'static str,
    attachment: Attachment,
    blend: BlendMode,
}

fn slot(name: &'static str, attachment: Attachment) -> SlotSetup {
    SlotSetup {
        name,
        attachment,
        blend: BlendMode::Normal,
    }
}

fn data(slots: Vec<SlotSetup>) -> SkeletonData {
    let mut data = SkeletonData::default();
    let mut root = BoneData::new("root", None);
    root.length = 4.0;
    data.bones.push(root);

    let mut skin = Skin::new("default");
    for (index, setup) in slots.into_iter().enumerate() {
        let mut slot = SlotData::new(setup.name, 0);
        slot.attachment = Some(setup.attachment.name().to_string());
        slot.blend = setup.blend;
        data.slots.push(slot);
        skin.set_attachment(index, setup.attachment.name().to_string(), setup.attachment);
    }
    data.skins.insert("default".to_string(), skin);
    data
}

fn renderer(slots: Vec<SlotSetup>) -> SkeletonRenderer {
    SkeletonRenderer::with_data(Arc::new(data(slots)))
}

struct Frame {
    batch: SkeletonBatch,
    queue: CommandQueue,
}

impl Frame {
    fn new() -> Self {
        Self {
            batch: SkeletonBatch::new(),
            queue: CommandQueue::new(),
        }
    }

    fn draw(&mut self, renderer: &mut SkeletonRenderer) -> usize {
        renderer.emit_geometry(&mut self.batch, &mut self.queue, &DrawContext::default())
    }

    fn commands(&mut self) -> Vec<SkeletonCommand> {
        self.queue
            .drain_sorted()
            .into_iter()
            .map(|id| self.batch.command(id).clone())
            .collect()
    }

    fn vertices(&self, command: &SkeletonCommand) -> &[Vertex] {
        self.batch.vertices(command.triangles.vertices)
    }

    fn indices(&self, command: &SkeletonCommand) -> &[u16] {
        self.batch.indices(command.triangles.indices)
    }
}

#[test]
fn single_region_emits_one_textured_quad() {
    let mut renderer = renderer(vec![slot("body", region("body", 1))]);
    let mut frame = Frame::new();
    assert_eq!(frame.draw(&mut renderer), 1);

    let commands = frame.commands();
    assert_eq!(commands.len(), 1);
    let command = &commands[0];
    assert_eq!(command.texture, TextureHandle::new(1));
    assert_eq!(command.blend_func, BlendFunc::ALPHA_PREMULTIPLIED);
    assert_eq!(frame.indices(command), &[0, 1, 2, 2, 3, 0]);

    let vertices = frame.vertices(command);
    let corners = [[5.0, -5.0], [-5.0, -5.0], [-5.0, 5.0], [5.0, 5.0]];
    assert_eq!(vertices.len(), 4);
    for (v, [x, y]) in vertices.iter().zip(corners) {
        assert_approx(v.position[0], x);
        assert_approx(v.position[1], y);
    }
    assert_eq!(vertices[0].uv, [1.0, 1.0]);
    assert!(vertices.iter().all(|v| v.color == [255; 4]));
    assert!(vertices.iter().all(|v| v.dark_color == [0, 0, 0, 255]));

    let stats = frame.batch.stats();
    assert_eq!(stats.used_vertices, 4);
    assert_eq!(stats.used_indices, 6);
    assert_eq!(stats.commands_in_use, 1);
}

#[test]
fn consecutive_slots_with_the_same_state_merge() {
    let mut renderer = renderer(vec![
        slot("back", region("back", 1)),
        slot("front", region("front", 1)),
    ]);
    let mut frame = Frame::new();
    assert_eq!(frame.draw(&mut renderer), 1);

    let commands = frame.commands();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].vertex_count(), 8);
    assert_eq!(
        frame.indices(&commands[0]),
        &[0, 1, 2, 2, 3, 0, 4, 5, 6, 6, 7, 4]
    );
}

#[test]
fn texture_or_blend_changes_split_commands() {
    let mut additive = slot("glow", region("glow", 1));
    additive.blend = BlendMode::Additive;
    let mut renderer = renderer(vec![
        slot("a", region("a", 1)),
        slot("b", region("b", 2)),
        additive,
    ]);
    let mut frame = Frame::new();
    assert_eq!(frame.draw(&mut renderer), 3);

    let commands = frame.commands();
    assert_eq!(commands[0].texture, TextureHandle::new(1));
    assert_eq!(commands[1].texture, TextureHandle::new(2));
    assert_eq!(
        commands[2].blend_func,
        BlendFunc::new(BlendFactor::One, BlendFactor::One)
    );
    assert_ne!(commands[0].material_id(), commands[2].material_id());
}

#[test]
fn slots_range_limits_drawn_slots() {
    let mut renderer = renderer(vec![
        slot("a", region("a", 1)),
        slot("b", region("b", 2)),
        slot("c", region("c", 3)),
    ]);
    renderer.set_slots_range(Some((1, 1)));
    let mut frame = Frame::new();
    assert_eq!(frame.draw(&mut renderer), 1);
    let commands = frame.commands();
    assert_eq!(commands[0].texture, TextureHandle::new(2));
    assert_eq!(frame.batch.stats().used_vertices, 4);
}

#[test]
fn transparent_and_empty_slots_are_skipped() {
    let mut renderer = renderer(vec![
        slot("hidden", region("hidden", 1)),
        slot("blank", region("blank", 1)),
    ]);
    renderer.skeleton_mut().slots[0].color[3] = 0.0;
    renderer.set_attachment("blank", None).unwrap();
    let mut frame = Frame::new();
    assert_eq!(frame.draw(&mut renderer), 0);
    assert!(frame.queue.is_empty());
    assert_eq!(frame.batch.stats().used_vertices, 0);
}

#[test]
fn clipping_applies_until_the_end_slot() {
    let clip = Attachment::Clipping(ClippingAttachment {
        name: "mask".to_string(),
        vertices: VertexData::Unweighted(vec![[-2.0, -2.0], [2.0, -2.0], [2.0, 2.0], [-2.0, 2.0]]),
        end_slot: Some(1),
    });
    let mut renderer = renderer(vec![
        slot("mask", clip),
        slot("inside", region("inside", 1)),
        slot("after", region("after", 1)),
    ]);
    let mut frame = Frame::new();
    frame.draw(&mut renderer);

    let commands = frame.commands();
    assert_eq!(commands.len(), 1);
    let vertices = frame.vertices(&commands[0]);
    let (clipped, tail) = vertices.split_at(vertices.len() - 4);
    assert!(!clipped.is_empty());
    for v in clipped {
        assert!(v.position[0].abs() <= 2.0 + 1.0e-4, "{v:?} escaped the clip");
        assert!(v.position[1].abs() <= 2.0 + 1.0e-4, "{v:?} escaped the clip");
    }
    for v in tail {
        assert_approx(v.position[0].abs(), 5.0);
    }
    assert_eq!(frame.indices(&commands[0]).len() % 3, 0);
}

#[test]
fn premultiplied_colors_scale_rgb_by_alpha() {
    let mut renderer = renderer(vec![slot("body", region("body", 1))]);
    {
        let slot = &mut renderer.skeleton_mut().slots[0];
        slot.color = [1.0, 0.5, 0.5, 0.5];
        slot.dark_color = Some([1.0, 0.0, 0.0]);
    }
    let mut frame = Frame::new();
    frame.draw(&mut renderer);
    let commands = frame.commands();
    let v = frame.vertices(&commands[0])[0];
    assert_eq!(v.color, [127, 63, 63, 127]);
    assert_eq!(v.dark_color, [127, 0, 0, 255]);

    renderer.set_opacity_modify_rgb(false);
    frame.batch.after_draw();
    frame.draw(&mut renderer);
    let commands = frame.commands();
    let v = frame.vertices(&commands[0])[0];
    assert_eq!(v.color, [255, 127, 127, 127]);
    assert_eq!(v.dark_color, [255, 0, 0, 0]);
    assert_eq!(commands[0].blend_func, BlendFunc::ALPHA_PREMULTIPLIED);
}

#[test]
fn node_color_tints_every_vertex() {
    let mut renderer = renderer(vec![slot("body", region("body", 1))]);
    let mut frame = Frame::new();
    let ctx = DrawContext {
        node_color: [1.0, 0.0, 1.0, 1.0],
        global_order: 3.0,
        ..DrawContext::default()
    };
    renderer.emit_geometry(&mut frame.batch, &mut frame.queue, &ctx);
    let commands = frame.commands();
    assert_eq!(commands[0].global_order, 3.0);
    assert!(frame.vertices(&commands[0]).iter().all(|v| v.color == [255, 0, 255, 255]));
}

#[test]
fn two_color_tint_switches_program() {
    let mut renderer = renderer(vec![slot("body", region("body", 1))]);
    renderer.set_two_color_tint(true);
    assert!(renderer.is_two_color_tint());
    let mut frame = Frame::new();
    frame.draw(&mut renderer);
    let commands = frame.commands();
    let pipeline = commands[0].pipeline().unwrap();
    assert_eq!(pipeline.program().kind, ProgramKind::TwoColor);
    assert_eq!(commands[0].projection(), Some(Mat4::IDENTITY));
}

#[derive(Default)]
struct Shift {
    calls: Rc<Cell<u32>>,
}

impl VertexEffect for Shift {
    fn begin(&mut self, _skeleton: &crate::Skeleton) {
        self.calls.set(self.calls.get() + 100);
    }

    fn transform(&mut self, position: &mut Vec2, _uv: &mut Vec2, light: &mut Vec4, _dark: &mut Vec4) {
        position.x += 1.0;
        light.w = 0.0;
        self.calls.set(self.calls.get() + 1);
    }

    fn end(&mut self) {
        self.calls.set(self.calls.get() + 1000);
    }
}

#[test]
fn vertex_effect_sees_every_vertex() {
    let mut renderer = renderer(vec![slot("body", region("body", 1))]);
    let shift = Shift::default();
    let calls = Rc::clone(&shift.calls);
    renderer.set_vertex_effect(Some(Box::new(shift)));
    let mut frame = Frame::new();
    frame.draw(&mut renderer);

    assert_eq!(calls.get(), 1104);
    let commands = frame.commands();
    let v = frame.vertices(&commands[0])[0];
    assert_approx(v.position[0], 6.0);
    assert_eq!(v.color[3], 0);
}

#[test]
fn bounding_box_covers_attachments() {
    let mut renderer = renderer(vec![slot("body", region("body", 1))]);
    renderer.skeleton_mut().x = 3.0;
    renderer.update_world_transform();
    let bounds = renderer.bounding_box();
    assert_approx(bounds.x, -2.0);
    assert_approx(bounds.y, -5.0);
    assert_approx(bounds.width, 10.0);
    assert_approx(bounds.height, 10.0);

    renderer.set_attachment("body", None).unwrap();
    assert_eq!(renderer.bounding_box(), Rect::default());
}

#[test]
fn debug_geometry_follows_enabled_layers() {
    let mut renderer = renderer(vec![slot("body", region("body", 1))]);
    assert_eq!(renderer.debug_geometry(), DebugGeometry::default());

    renderer.set_debug_slots_enabled(true);
    renderer.set_debug_bones_enabled(true);
    let debug = renderer.debug_geometry();
    assert_eq!(debug.slot_lines.len(), 4);
    assert_eq!(debug.bone_lines, [[[0.0, 0.0], [4.0, 0.0]]]);
    assert_eq!(debug.bone_origins, [[0.0, 0.0]]);
    assert!(debug.mesh_lines.is_empty());
}

#[test]
fn update_drives_the_animation_player() {
    let mut data = data(vec![slot("body", region("body", 1))]);
    data.animations.push(Animation::new(
        "slide",
        vec![Timeline::Translate(TranslateTimeline {
            bone_index: 0,
            frames: vec![
                Keyframe::new(0.0, [0.0, 0.0]),
                Keyframe::new(1.0, [10.0, 0.0]),
            ],
        })],
    ));
    let mut renderer = SkeletonRenderer::with_data(Arc::new(data));
    renderer.set_animation("slide", true).unwrap();
    renderer.set_time_scale(2.0);
    renderer.update(0.25);

    assert_approx(renderer.skeleton().bones[0].x, 5.0);
    assert_approx(renderer.skeleton().bones[0].world_x, 5.0);
    assert_approx(renderer.skeleton().time(), 0.5);
    assert!(renderer.set_animation("missing", true).is_err());
}

#[test]
fn batch_reset_rewinds_between_frames() {
    let mut renderer = renderer(vec![slot("body", region("body", 1))]);
    let mut frame = Frame::new();
    frame.draw(&mut renderer);
    frame.queue.clear();
    frame.batch.after_draw();
    assert_eq!(frame.batch.stats().used_vertices, 0);

    frame.draw(&mut renderer);
    let commands = frame.commands();
    assert_eq!(commands[0].triangles.vertices.offset(), 0);
    assert_eq!(frame.batch.stats().pipeline_rebuilds, 1);
}
