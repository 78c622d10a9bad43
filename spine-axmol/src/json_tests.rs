use crate::json::SkeletonJson;
use crate::{
    Atlas, Attachment, AttachmentLoader, AttachmentRef, BlendMode, Curve, Error, MixBlend,
    MixDirection, Skeleton, SkeletonData, SkeletonRenderer, TextureHandle, TextureRegion,
    Timeline, TransformMode, VertexData,
};
use std::sync::Arc;

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-4,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

/// Resolves `body` and `arm` to texture 1 and `arm-alt` to texture 2.
struct FakeLoader;

impl AttachmentLoader for FakeLoader {
    fn texture_region(&self, path: &str) -> Option<TextureRegion> {
        let texture = match path {
            "body" | "arm" => 1,
            "arm-alt" => 2,
            _ => return None,
        };
        Some(TextureRegion {
            texture: TextureHandle::new(texture),
            page_width: 64.0,
            page_height: 64.0,
            u2: 1.0,
            v2: 1.0,
            width: 10.0,
            height: 20.0,
            original_width: 10.0,
            original_height: 20.0,
            ..TextureRegion::default()
        })
    }
}

const HERO: &str = r#"{
  "skeleton": { "hash": "h4sh", "spine": "3.8.99", "x": -10, "y": -20, "width": 100, "height": 200 },
  "bones": [
    { "name": "root" },
    { "name": "arm", "parent": "root", "length": 20, "x": 5, "y": 6, "rotation": 30, "scaleX": 2,
      "transform": "noScale", "color": "ff000080" }
  ],
  "slots": [
    { "name": "body", "bone": "root", "attachment": "body", "color": "ff8000ff", "dark": "102030",
      "blend": "additive" },
    { "name": "arm", "bone": "arm", "attachment": "arm" },
    { "name": "mask", "bone": "root", "attachment": "mask" },
    { "name": "top", "bone": "root" }
  ],
  "skins": [
    {
      "name": "default",
      "attachments": {
        "body": { "body": { "x": 1, "width": 10, "height": 20 } },
        "arm": {
          "arm": { "type": "mesh", "uvs": [0, 0, 1, 0, 1, 1], "vertices": [0, 0, 10, 0, 10, 10],
                   "triangles": [0, 1, 2], "hull": 3, "width": 10, "height": 10 },
          "arm-weighted": { "type": "mesh", "uvs": [0, 0, 1, 0, 1, 1],
                            "vertices": [1, 0, 0, 0, 1, 2, 0, 10, 0, 0.5, 1, 10, 0, 0.5, 1, 1, 10, 10, 1],
                            "triangles": [0, 1, 2], "hull": 3 }
        },
        "mask": { "mask": { "type": "clipping", "end": "arm", "vertexCount": 3, "vertices": [0, 0, 5, 0, 0, 5] } },
        "top": {
          "tip": { "type": "point", "x": 2, "y": 3, "rotation": 45 },
          "box": { "type": "boundingbox", "vertexCount": 1, "vertices": [0, 0] }
        }
      }
    },
    {
      "name": "alt",
      "attachments": {
        "arm": { "arm": { "type": "linkedmesh", "parent": "arm", "skin": "default", "path": "arm-alt",
                          "width": 10, "height": 10 } }
      }
    }
  ],
  "events": { "hit": { "int": 3, "float": 0.5, "string": "pow" } },
  "animations": {
    "wave": {
      "bones": {
        "arm": {
          "rotate": [
            { "time": 0, "angle": 0, "curve": 0.25, "c2": 0, "c3": 0.75, "c4": 1 },
            { "time": 1, "angle": 90, "curve": "stepped" },
            { "time": 2, "angle": 45 }
          ],
          "translate": [ { "time": 0, "x": 1, "y": 2, "curve": [0.1, 0.2, 0.3, 0.4] } ]
        }
      },
      "slots": {
        "body": {
          "color": [ { "time": 0, "color": "ffffffff" }, { "time": 1, "color": "00000000" } ],
          "attachment": [ { "time": 0.5, "name": null } ]
        }
      },
      "deform": {
        "default": { "arm": { "arm": [ { "time": 0 }, { "time": 1, "offset": 2, "vertices": [1, 1] } ] } }
      },
      "drawOrder": [
        { "time": 0.5, "offsets": [ { "slot": "body", "offset": 2 } ] },
        { "time": 1 }
      ],
      "events": [
        { "time": 0.25, "name": "hit" },
        { "time": 0.75, "name": "hit", "int": 7, "string": "bam" }
      ]
    }
  }
}"#;

fn load(json: &str) -> Result<SkeletonData, Error> {
    SkeletonJson::new(&FakeLoader).read_str(json)
}

fn hero(scale: f32) -> SkeletonData {
    SkeletonJson::new(&FakeLoader)
        .with_scale(scale)
        .read_str(HERO)
        .unwrap()
}

fn mesh<'a>(data: &'a SkeletonData, skin: &str, slot: usize, name: &str) -> &'a crate::MeshAttachment {
    match data.skin(skin).and_then(|s| s.attachment(slot, name)) {
        Some(Attachment::Mesh(mesh)) => mesh,
        other => panic!("expected mesh '{name}', got {other:?}"),
    }
}

fn wave(data: &SkeletonData) -> &[Timeline] {
    &data.animation("wave").unwrap().1.timelines
}

/// Loads `json`, switches to `skin` and returns the `arm` slot's deform after `wave` at 1s.
fn arm_deform_after_wave(json: &str, skin: Option<&str>) -> Vec<f32> {
    let data = Arc::new(load(json).unwrap());
    let mut skeleton = Skeleton::new(Arc::clone(&data));
    skeleton.set_skin(skin).unwrap();
    let (_, wave) = data.animation("wave").unwrap();
    wave.apply(
        &mut skeleton,
        -1.0,
        1.0,
        false,
        None,
        1.0,
        MixBlend::Setup,
        MixDirection::In,
    );
    skeleton.slots[1].deform.clone()
}

const LINKED_ARM: &str =
    r#"{ "type": "linkedmesh", "parent": "arm", "skin": "default", "path": "arm-alt","#;

#[test]
fn reads_header_bones_and_slots() {
    let data = hero(1.0);
    assert_eq!(data.spine_version.as_deref(), Some("3.8.99"));
    assert_eq!(data.hash.as_deref(), Some("h4sh"));
    assert_eq!((data.x, data.y, data.width, data.height), (-10.0, -20.0, 100.0, 200.0));

    assert_eq!(data.bones.len(), 2);
    let arm = &data.bones[1];
    assert_eq!(arm.parent, Some(0));
    assert_eq!((arm.x, arm.y, arm.length), (5.0, 6.0, 20.0));
    assert_eq!((arm.rotation, arm.scale_x, arm.scale_y), (30.0, 2.0, 1.0));
    assert_eq!(arm.transform_mode, TransformMode::NoScale);
    assert_approx(arm.color[3], 128.0 / 255.0);

    let body = &data.slots[0];
    assert_eq!(body.attachment.as_deref(), Some("body"));
    assert_eq!(body.blend, BlendMode::Additive);
    assert_approx(body.color[1], 128.0 / 255.0);
    let dark = body.dark_color.unwrap();
    assert_approx(dark[0], 16.0 / 255.0);
    assert_approx(dark[2], 48.0 / 255.0);
    assert_eq!(data.slots[1].bone, 1);
    assert_eq!(data.slots[3].attachment, None);
}

#[test]
fn reads_region_point_and_clipping_attachments() {
    let data = hero(1.0);
    let skin = data.default_skin().unwrap();

    let Some(Attachment::Region(body)) = skin.attachment(0, "body") else {
        panic!("body is not a region");
    };
    assert_eq!(body.x, 1.0);
    assert_eq!(body.region.as_ref().unwrap().texture, TextureHandle::new(1));
    assert!(body.attachment_vertices().is_some());

    let Some(Attachment::Clipping(mask)) = skin.attachment(2, "mask") else {
        panic!("mask is not a clipping attachment");
    };
    assert_eq!(mask.end_slot, Some(1));
    assert_eq!(mask.vertices.vertex_count(), 3);

    let Some(Attachment::Point(tip)) = skin.attachment(3, "tip") else {
        panic!("tip is not a point");
    };
    assert_eq!((tip.x, tip.y, tip.rotation), (2.0, 3.0, 45.0));

    assert!(skin.attachment(3, "box").is_none());
}

#[test]
fn reads_unweighted_and_weighted_meshes() {
    let data = hero(1.0);
    let arm = mesh(&data, "default", 1, "arm");
    assert_eq!(
        arm.vertices,
        VertexData::Unweighted(vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0]])
    );
    assert_eq!(arm.triangles, [0, 1, 2]);
    assert_eq!(arm.hull_length, 3);
    assert_eq!(arm.uvs().len(), 3);

    let weighted = mesh(&data, "default", 1, "arm-weighted");
    let VertexData::Weighted(influences) = &weighted.vertices else {
        panic!("expected weighted vertices");
    };
    let counts: Vec<usize> = influences.iter().map(Vec::len).collect();
    assert_eq!(counts, [1, 2, 1]);
    assert_eq!(influences[1][1].bone, 1);
    assert_eq!(influences[1][1].weight, 0.5);
    assert_eq!(weighted.vertices.deform_length(), 8);
}

#[test]
fn linked_mesh_shares_parent_topology_with_its_own_region() {
    let data = hero(1.0);
    let linked = mesh(&data, "alt", 1, "arm");
    let parent = mesh(&data, "default", 1, "arm");
    assert_eq!(linked.vertices, parent.vertices);
    assert_eq!(linked.triangles, parent.triangles);
    assert_eq!(linked.region_uvs, parent.region_uvs);
    assert_eq!(linked.path, "arm-alt");
    let vertices = linked.attachment_vertices().unwrap();
    assert_eq!(vertices.texture, TextureHandle::new(2).unwrap());
    assert_eq!(vertices.triangles, [0, 1, 2]);
}

#[test]
fn pre_3_8_skin_maps_are_accepted() {
    let data = load(
        r#"{
          "bones": [ { "name": "root" } ],
          "slots": [ { "name": "body", "bone": "root", "attachment": "body" } ],
          "skins": { "default": { "body": { "body": { "width": 4, "height": 4 } } } }
        }"#,
    )
    .unwrap();
    assert!(data.attachment(None, 0, "body").is_some());
    assert_eq!(data.spine_version, None);
}

#[test]
fn scale_applies_to_positions_only() {
    let data = hero(2.0);
    let arm = &data.bones[1];
    assert_eq!((arm.x, arm.y, arm.length), (10.0, 12.0, 40.0));
    assert_eq!(arm.scale_x, 2.0);
    assert_eq!(arm.rotation, 30.0);

    let Some(Attachment::Region(body)) = data.attachment(None, 0, "body") else {
        panic!("body is not a region");
    };
    assert_eq!((body.width, body.height, body.x), (20.0, 40.0, 2.0));
    assert_eq!(
        mesh(&data, "default", 1, "arm").vertices,
        VertexData::Unweighted(vec![[0.0, 0.0], [20.0, 0.0], [20.0, 20.0]])
    );

    let translate = wave(&data)
        .iter()
        .find_map(|t| match t {
            Timeline::Translate(t) => Some(t),
            _ => None,
        })
        .unwrap();
    assert_eq!(translate.frames[0].values, [2.0, 4.0]);
}

#[test]
fn reads_bone_timelines_and_curves() {
    let data = hero(1.0);
    let (_, animation) = data.animation("wave").unwrap();
    assert_eq!(animation.duration, 2.0);

    let rotate = animation
        .timelines
        .iter()
        .find_map(|t| match t {
            Timeline::Rotate(t) => Some(t),
            _ => None,
        })
        .unwrap();
    assert_eq!(rotate.bone_index, 1);
    let curves: Vec<Curve> = rotate.frames.iter().map(|f| f.curve).collect();
    assert_eq!(
        curves,
        [
            Curve::Bezier {
                cx1: 0.25,
                cy1: 0.0,
                cx2: 0.75,
                cy2: 1.0
            },
            Curve::Stepped,
            Curve::Linear,
        ]
    );
    assert_eq!(rotate.frames[1].values, [90.0]);

    let translate = animation
        .timelines
        .iter()
        .find_map(|t| match t {
            Timeline::Translate(t) => Some(t),
            _ => None,
        })
        .unwrap();
    assert_eq!(
        translate.frames[0].curve,
        Curve::Bezier {
            cx1: 0.1,
            cy1: 0.2,
            cx2: 0.3,
            cy2: 0.4
        }
    );
}

#[test]
fn reads_slot_timelines() {
    let data = hero(1.0);
    let mut color = None;
    let mut attachment = None;
    for timeline in wave(&data) {
        match timeline {
            Timeline::Color(t) => color = Some(t),
            Timeline::Attachment(t) => attachment = Some(t),
            _ => {}
        }
    }
    let color = color.unwrap();
    assert_eq!(color.slot_index, 0);
    assert_eq!(color.frames[0].values, [1.0; 4]);
    assert_eq!(color.frames[1].values, [0.0; 4]);

    let attachment = attachment.unwrap();
    assert_eq!(attachment.frames.len(), 1);
    assert_eq!(attachment.frames[0].time, 0.5);
    assert_eq!(attachment.frames[0].name, None);
}

#[test]
fn deform_keys_become_absolute_positions() {
    let data = hero(2.0);
    let deform = wave(&data)
        .iter()
        .find_map(|t| match t {
            Timeline::Deform(t) => Some(t),
            _ => None,
        })
        .unwrap();
    assert_eq!(deform.slot_index, 1);
    assert_eq!(
        deform.attachment,
        AttachmentRef {
            skin: "default".to_string(),
            name: "arm".to_string(),
        }
    );
    assert_eq!(deform.frames[0].vertices, [0.0, 0.0, 20.0, 0.0, 20.0, 20.0]);
    assert_eq!(deform.frames[1].vertices, [0.0, 0.0, 22.0, 2.0, 20.0, 20.0]);
}

#[test]
fn deform_applies_to_the_default_skin_mesh() {
    assert_eq!(
        arm_deform_after_wave(HERO, None),
        [0.0, 0.0, 11.0, 1.0, 10.0, 10.0]
    );
}

#[test]
fn deform_matches_the_skin_key_not_the_attachment_name() {
    let json = HERO.replace(
        r#""arm": { "type": "mesh","#,
        r#""arm": { "name": "arm-mesh", "path": "arm", "type": "mesh","#,
    );
    let data = load(&json).unwrap();
    assert_eq!(mesh(&data, "default", 1, "arm").name, "arm-mesh");
    assert_eq!(
        arm_deform_after_wave(&json, None),
        [0.0, 0.0, 11.0, 1.0, 10.0, 10.0]
    );
}

#[test]
fn linked_mesh_inherits_parent_deform_unless_disabled() {
    let data = hero(1.0);
    assert_eq!(
        mesh(&data, "alt", 1, "arm").deform_attachment,
        Some(AttachmentRef {
            skin: "default".to_string(),
            name: "arm".to_string(),
        })
    );
    assert_eq!(
        arm_deform_after_wave(HERO, Some("alt")),
        [0.0, 0.0, 11.0, 1.0, 10.0, 10.0]
    );

    let json = HERO.replace(
        LINKED_ARM,
        r#"{ "type": "linkedmesh", "deform": false, "parent": "arm", "skin": "default", "path": "arm-alt","#,
    );
    let data = load(&json).unwrap();
    assert_eq!(mesh(&data, "alt", 1, "arm").deform_attachment, None);
    assert!(arm_deform_after_wave(&json, Some("alt")).is_empty());
}

#[test]
fn deform_keys_skip_a_same_named_mesh_in_another_skin() {
    let json = HERO.replace(
        LINKED_ARM,
        r#"{ "type": "mesh", "path": "arm-alt", "uvs": [0, 0, 1, 0, 1, 1, 0, 1],
             "vertices": [0, 0, 8, 0, 8, 8, 0, 8], "triangles": [0, 1, 2, 2, 3, 0], "hull": 4,"#,
    );
    let data = load(&json).unwrap();
    assert_eq!(mesh(&data, "alt", 1, "arm").triangles.len(), 6);
    assert!(arm_deform_after_wave(&json, Some("alt")).is_empty());
}

#[test]
fn draw_order_offsets_expand_to_full_orders() {
    let data = hero(1.0);
    let draw_order = wave(&data)
        .iter()
        .find_map(|t| match t {
            Timeline::DrawOrder(t) => Some(t),
            _ => None,
        })
        .unwrap();
    assert_eq!(draw_order.frames[0].draw_order.as_deref(), Some(&[1, 2, 0, 3][..]));
    assert_eq!(draw_order.frames[1].draw_order, None);
}

#[test]
fn event_keys_override_event_defaults() {
    let data = hero(1.0);
    let hit = &data.events["hit"];
    assert_eq!((hit.int_value, hit.float_value, hit.string.as_str()), (3, 0.5, "pow"));

    let events = wave(&data)
        .iter()
        .find_map(|t| match t {
            Timeline::Event(t) => Some(&t.events),
            _ => None,
        })
        .unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!((events[0].int_value, events[0].string.as_str()), (3, "pow"));
    assert_eq!(events[1].time, 0.75);
    assert_eq!((events[1].int_value, events[1].string.as_str()), (7, "bam"));
    assert_eq!(events[1].float_value, 0.5);
}

#[test]
fn other_3_x_versions_load_but_4_x_is_rejected() {
    assert!(load(r#"{ "skeleton": { "spine": "3.7.94" } }"#).is_ok());
    let err = load(r#"{ "skeleton": { "spine": "4.1.20" } }"#).unwrap_err();
    assert!(matches!(err, Error::JsonSpineVersion { value } if value == "4.1.20"));
}

#[test]
fn malformed_documents_are_reported() {
    assert!(matches!(load("{"), Err(Error::JsonParse { .. })));

    let err = load(r#"{ "bones": [ { "name": "arm", "parent": "root" } ] }"#).unwrap_err();
    assert!(matches!(err, Error::JsonUnknownBoneParent { parent, .. } if parent == "root"));

    let err = load(
        r#"{ "bones": [ { "name": "root" } ], "slots": [ { "name": "s", "bone": "root", "color": "zz0000" } ] }"#,
    )
    .unwrap_err();
    assert!(matches!(err, Error::JsonInvalidColor { value, .. } if value == "zz0000"));

    let err = load(
        r#"{ "bones": [ { "name": "root" } ], "slots": [ { "name": "s", "bone": "root", "blend": "darken" } ] }"#,
    )
    .unwrap_err();
    assert!(matches!(err, Error::JsonUnsupportedBlendMode { .. }));
}

#[test]
fn bad_mesh_and_linked_mesh_data_is_rejected() {
    let err = load(
        r#"{
          "bones": [ { "name": "root" } ],
          "slots": [ { "name": "s", "bone": "root" } ],
          "skins": [ { "name": "default", "attachments": { "s": {
            "m": { "type": "mesh", "uvs": [0, 0, 1, 0, 1, 1], "vertices": [0, 0, 1, 0, 1, 1], "triangles": [0, 1, 3] }
          } } } ]
        }"#,
    )
    .unwrap_err();
    assert!(matches!(err, Error::JsonInvalidMeshData { attachment, .. } if attachment == "m"));

    let err = load(
        r#"{
          "bones": [ { "name": "root" } ],
          "slots": [ { "name": "s", "bone": "root" } ],
          "skins": [ { "name": "default", "attachments": { "s": {
            "copy": { "type": "linkedmesh", "parent": "missing" }
          } } } ]
        }"#,
    )
    .unwrap_err();
    assert!(matches!(err, Error::JsonUnknownLinkedMeshParent { parent, .. } if parent == "missing"));
}

#[test]
fn animation_references_are_validated() {
    let err = load(
        r#"{ "bones": [ { "name": "root" } ],
             "animations": { "idle": { "bones": { "ghost": { "rotate": [ { "angle": 1 } ] } } } } }"#,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        Error::JsonUnknownAnimationTarget { kind: "bone", name, .. } if name == "ghost"
    ));

    let overflow = HERO.replace(r#""offset": 2, "vertices": [1, 1]"#, r#""offset": 5, "vertices": [1, 1]"#);
    let err = load(&overflow).unwrap_err();
    assert!(matches!(err, Error::JsonInvalidDeformData { .. }));

    let collision = HERO.replace(
        r#"[ { "slot": "body", "offset": 2 } ]"#,
        r#"[ { "slot": "body", "offset": 1 }, { "slot": "arm", "offset": 0 } ]"#,
    );
    let err = load(&collision).unwrap_err();
    assert!(matches!(err, Error::JsonInvalidDrawOrder { .. }));
}

#[test]
fn missing_file_is_reported() {
    let json = SkeletonJson::new(&FakeLoader).with_scale(0.5);
    assert_eq!(json.scale(), 0.5);
    let err = json.read_file("does/not/exist.json").unwrap_err();
    assert!(matches!(err, Error::ResourceNotFound { .. }));
}

#[test]
fn renderer_loads_from_json_and_atlas() {
    let atlas = Atlas::parse("hero.png\nsize: 64,64\nbody\n  xy: 0, 0\n  size: 10, 20\n").unwrap();
    let renderer = SkeletonRenderer::from_json_str(
        r#"{
          "skeleton": { "spine": "3.8.99" },
          "bones": [ { "name": "root" } ],
          "slots": [ { "name": "body", "bone": "root", "attachment": "body" } ],
          "skins": [ { "name": "default", "attachments": { "body": { "body": { "width": 10, "height": 20 } } } } ]
        }"#,
        &atlas,
        1.0,
    )
    .unwrap();

    assert!(renderer.find_bone("root").is_some());
    let Some(Attachment::Region(body)) = renderer.attachment("body", "body") else {
        panic!("body is not a region");
    };
    let region = body.region.as_ref().unwrap();
    assert_eq!((region.width, region.height), (10.0, 20.0));
    assert_approx(region.v2, 20.0 / 64.0);
}
