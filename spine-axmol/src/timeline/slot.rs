use super::curve::{Curve, Keyframe};
use super::{MixBlend, MixDirection};
use crate::{AttachmentRef, Skeleton};

#[derive(Clone, Debug)]
pub struct ColorTimeline {
    pub slot_index: usize,
    /// `[r, g, b, a]`.
    pub frames: Vec<Keyframe<4>>,
}

#[derive(Clone, Debug)]
pub struct TwoColorTimeline {
    pub slot_index: usize,
    /// `[r, g, b, a, r2, g2, b2]`: light color followed by dark color.
    pub frames: Vec<Keyframe<7>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AttachmentFrame {
    pub time: f32,
    pub name: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AttachmentTimeline {
    pub slot_index: usize,
    pub frames: Vec<AttachmentFrame>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DeformFrame {
    pub time: f32,
    pub vertices: Vec<f32>,
    pub curve: Curve,
}

/// Animates the vertices of one vertex attachment.
///
/// Keys hold absolute local positions for unweighted attachments and per-influence offsets for
/// weighted ones; `setup_vertices` is `Some` exactly for unweighted attachments.
#[derive(Clone, Debug)]
pub struct DeformTimeline {
    pub slot_index: usize,
    /// Skin entry the keys were authored for.
    pub attachment: AttachmentRef,
    pub setup_vertices: Option<Vec<f32>>,
    pub frames: Vec<DeformFrame>,
}

fn lerp<const N: usize>(from: [f32; N], to: [f32; N], alpha: f32) -> [f32; N] {
    let mut out = from;
    for (o, t) in out.iter_mut().zip(to) {
        *o += (t - *o) * alpha;
    }
    out
}

fn split_two_color(values: [f32; 7]) -> ([f32; 4], [f32; 3]) {
    (
        [values[0], values[1], values[2], values[3]],
        [values[4], values[5], values[6]],
    )
}

impl ColorTimeline {
    pub fn apply(&self, skeleton: &mut Skeleton, time: f32, alpha: f32, blend: MixBlend) {
        let setup = skeleton.data.slots[self.slot_index].color;
        let slot = &mut skeleton.slots[self.slot_index];
        let Some(first) = self.frames.first() else {
            return;
        };

        if time < first.time {
            match blend {
                MixBlend::Setup => slot.color = setup,
                MixBlend::First => slot.color = lerp(slot.color, setup, alpha),
                MixBlend::Replace | MixBlend::Add => {}
            }
            return;
        }

        let target = super::curve::sample(&self.frames, time);
        slot.color = if alpha >= 1.0 {
            target
        } else if blend == MixBlend::Setup {
            lerp(setup, target, alpha)
        } else {
            lerp(slot.color, target, alpha)
        };
    }
}

impl TwoColorTimeline {
    pub fn apply(&self, skeleton: &mut Skeleton, time: f32, alpha: f32, blend: MixBlend) {
        let data = &skeleton.data.slots[self.slot_index];
        let setup_light = data.color;
        let setup_dark = data.dark_color.unwrap_or([0.0; 3]);
        let slot = &mut skeleton.slots[self.slot_index];
        let Some(first) = self.frames.first() else {
            return;
        };
        let dark = slot.dark_color.unwrap_or([0.0; 3]);

        if time < first.time {
            match blend {
                MixBlend::Setup => {
                    slot.color = setup_light;
                    slot.dark_color = Some(setup_dark);
                }
                MixBlend::First => {
                    slot.color = lerp(slot.color, setup_light, alpha);
                    slot.dark_color = Some(lerp(dark, setup_dark, alpha));
                }
                MixBlend::Replace | MixBlend::Add => {}
            }
            return;
        }

        let (light, target_dark) = split_two_color(super::curve::sample(&self.frames, time));
        if alpha >= 1.0 {
            slot.color = light;
            slot.dark_color = Some(target_dark);
        } else if blend == MixBlend::Setup {
            slot.color = lerp(setup_light, light, alpha);
            slot.dark_color = Some(lerp(setup_dark, target_dark, alpha));
        } else {
            slot.color = lerp(slot.color, light, alpha);
            slot.dark_color = Some(lerp(dark, target_dark, alpha));
        }
    }
}

impl AttachmentTimeline {
    pub fn apply(
        &self,
        skeleton: &mut Skeleton,
        time: f32,
        blend: MixBlend,
        direction: MixDirection,
    ) {
        if direction == MixDirection::Out {
            if blend == MixBlend::Setup {
                self.set_to_setup(skeleton);
            }
            return;
        }
        let Some(first) = self.frames.first() else {
            return;
        };
        if time < first.time {
            if matches!(blend, MixBlend::Setup | MixBlend::First) {
                self.set_to_setup(skeleton);
            }
            return;
        }

        let index = self
            .frames
            .partition_point(|f| f.time <= time)
            .saturating_sub(1);
        skeleton.set_slot_attachment(self.slot_index, self.frames[index].name.as_deref());
    }

    fn set_to_setup(&self, skeleton: &mut Skeleton) {
        let setup = skeleton.data.slots[self.slot_index].attachment.clone();
        skeleton.set_slot_attachment(self.slot_index, setup.as_deref());
    }
}

impl DeformTimeline {
    pub fn apply(&self, skeleton: &mut Skeleton, time: f32, alpha: f32, blend: MixBlend) {
        if skeleton.slot_deform_target(self.slot_index).as_ref() != Some(&self.attachment) {
            return;
        }
        let Some(first) = self.frames.first() else {
            return;
        };

        let deform = &mut skeleton.slots[self.slot_index].deform;
        let setup = self.setup_vertices.as_deref();
        let blend = if deform.is_empty() {
            MixBlend::Setup
        } else {
            blend
        };
        let vertex_count = first.vertices.len();

        if time < first.time {
            match blend {
                MixBlend::Setup => deform.clear(),
                MixBlend::First => {
                    if alpha >= 1.0 {
                        deform.clear();
                        return;
                    }
                    deform.resize(vertex_count, 0.0);
                    match setup {
                        Some(setup) => {
                            for (d, s) in deform.iter_mut().zip(setup) {
                                *d += (s - *d) * alpha;
                            }
                        }
                        None => {
                            for d in deform.iter_mut() {
                                *d *= 1.0 - alpha;
                            }
                        }
                    }
                }
                MixBlend::Replace | MixBlend::Add => {}
            }
            return;
        }

        deform.resize(vertex_count, 0.0);
        let index = self.frames.partition_point(|f| f.time <= time);
        if index >= self.frames.len() {
            let last = &self.frames[self.frames.len() - 1].vertices;
            blend_deform(deform, setup, |i| last[i], alpha, blend);
            return;
        }

        let prev = &self.frames[index - 1];
        let next = &self.frames[index];
        let denom = next.time - prev.time;
        let percent = if denom.abs() <= 1.0e-12 {
            1.0
        } else {
            prev.curve.percent((time - prev.time) / denom)
        };
        blend_deform(
            deform,
            setup,
            |i| prev.vertices[i] + (next.vertices[i] - prev.vertices[i]) * percent,
            alpha,
            blend,
        );
    }
}

fn blend_deform(
    deform: &mut [f32],
    setup: Option<&[f32]>,
    value: impl Fn(usize) -> f32,
    alpha: f32,
    blend: MixBlend,
) {
    let setup_at = |i: usize| setup.map_or(0.0, |s| s[i]);

    if alpha >= 1.0 {
        for (i, d) in deform.iter_mut().enumerate() {
            *d = if blend == MixBlend::Add {
                *d + value(i) - setup_at(i)
            } else {
                value(i)
            };
        }
        return;
    }

    for (i, d) in deform.iter_mut().enumerate() {
        let v = value(i);
        match blend {
            MixBlend::Setup => match setup {
                Some(s) => *d = s[i] + (v - s[i]) * alpha,
                None => *d = v * alpha,
            },
            MixBlend::First | MixBlend::Replace => *d += (v - *d) * alpha,
            MixBlend::Add => *d += (v - setup_at(i)) * alpha,
        }
    }
}
