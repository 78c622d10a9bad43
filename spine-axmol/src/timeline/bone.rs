use super::curve::{Keyframe, Segment, segment};
use super::{MixBlend, MixDirection};
use crate::Skeleton;

#[derive(Clone, Debug)]
pub struct RotateTimeline {
    pub bone_index: usize,
    /// `[angle]` in degrees, relative to the setup rotation.
    pub frames: Vec<Keyframe<1>>,
}

#[derive(Clone, Debug)]
pub struct TranslateTimeline {
    pub bone_index: usize,
    /// `[x, y]`, relative to the setup position.
    pub frames: Vec<Keyframe<2>>,
}

#[derive(Clone, Debug)]
pub struct ScaleTimeline {
    pub bone_index: usize,
    /// `[x, y]` multipliers of the setup scale.
    pub frames: Vec<Keyframe<2>>,
}

#[derive(Clone, Debug)]
pub struct ShearTimeline {
    pub bone_index: usize,
    /// `[x, y]` in degrees, relative to the setup shear.
    pub frames: Vec<Keyframe<2>>,
}

/// Wraps a rotation delta into `(-180, 180]`.
pub(crate) fn wrap_rotation(degrees: f32) -> f32 {
    degrees - ((degrees / 360.0 - 0.5).ceil()) * 360.0
}

fn signum(v: f32) -> f32 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

fn sample_pair(frames: &[Keyframe<2>], time: f32) -> (f32, f32) {
    let [x, y] = super::curve::sample(frames, time);
    (x, y)
}

impl RotateTimeline {
    pub fn apply(&self, skeleton: &mut Skeleton, time: f32, alpha: f32, blend: MixBlend) {
        let setup = skeleton.data.bones[self.bone_index].rotation;
        let bone = &mut skeleton.bones[self.bone_index];
        let Some(first) = self.frames.first() else {
            return;
        };

        if time < first.time {
            match blend {
                MixBlend::Setup => bone.rotation = setup,
                MixBlend::First => bone.rotation += (setup - bone.rotation) * alpha,
                MixBlend::Replace | MixBlend::Add => {}
            }
            return;
        }

        // Keys interpolate along the shortest arc between neighbours. Past the last key the
        // authored angle is used as is for Setup and Add.
        let (r, clamped) = match segment(&self.frames, time) {
            Segment::Clamped(frame) => (frame.values[0], true),
            Segment::Between {
                prev,
                next,
                percent,
            } => {
                let from = prev.values[0];
                (from + wrap_rotation(next.values[0] - from) * percent, false)
            }
        };
        let offset = if clamped { r } else { wrap_rotation(r) };

        match blend {
            MixBlend::Setup => bone.rotation = setup + offset * alpha,
            MixBlend::First | MixBlend::Replace => {
                let delta = r + setup - bone.rotation;
                bone.rotation += wrap_rotation(delta) * alpha;
            }
            MixBlend::Add => bone.rotation += offset * alpha,
        }
    }
}

impl TranslateTimeline {
    pub fn apply(&self, skeleton: &mut Skeleton, time: f32, alpha: f32, blend: MixBlend) {
        let data = &skeleton.data.bones[self.bone_index];
        let (setup_x, setup_y) = (data.x, data.y);
        let bone = &mut skeleton.bones[self.bone_index];
        let Some(first) = self.frames.first() else {
            return;
        };

        if time < first.time {
            match blend {
                MixBlend::Setup => {
                    bone.x = setup_x;
                    bone.y = setup_y;
                }
                MixBlend::First => {
                    bone.x += (setup_x - bone.x) * alpha;
                    bone.y += (setup_y - bone.y) * alpha;
                }
                MixBlend::Replace | MixBlend::Add => {}
            }
            return;
        }

        let (x, y) = sample_pair(&self.frames, time);
        match blend {
            MixBlend::Setup => {
                bone.x = setup_x + x * alpha;
                bone.y = setup_y + y * alpha;
            }
            MixBlend::First | MixBlend::Replace => {
                bone.x += (setup_x + x - bone.x) * alpha;
                bone.y += (setup_y + y - bone.y) * alpha;
            }
            MixBlend::Add => {
                bone.x += x * alpha;
                bone.y += y * alpha;
            }
        }
    }
}

impl ScaleTimeline {
    pub fn apply(
        &self,
        skeleton: &mut Skeleton,
        time: f32,
        alpha: f32,
        blend: MixBlend,
        direction: MixDirection,
    ) {
        let data = &skeleton.data.bones[self.bone_index];
        let setup = (data.scale_x, data.scale_y);
        let bone = &mut skeleton.bones[self.bone_index];
        let Some(first) = self.frames.first() else {
            return;
        };

        if time < first.time {
            match blend {
                MixBlend::Setup => {
                    bone.scale_x = setup.0;
                    bone.scale_y = setup.1;
                }
                MixBlend::First => {
                    bone.scale_x += (setup.0 - bone.scale_x) * alpha;
                    bone.scale_y += (setup.1 - bone.scale_y) * alpha;
                }
                MixBlend::Replace | MixBlend::Add => {}
            }
            return;
        }

        let (mx, my) = sample_pair(&self.frames, time);
        let x = setup.0 * mx;
        let y = setup.1 * my;

        if alpha >= 1.0 {
            if blend == MixBlend::Add {
                bone.scale_x += x - setup.0;
                bone.scale_y += y - setup.1;
            } else {
                bone.scale_x = x;
                bone.scale_y = y;
            }
            return;
        }

        match (direction, blend) {
            (_, MixBlend::Add) => {
                bone.scale_x += (x - setup.0) * alpha;
                bone.scale_y += (y - setup.1) * alpha;
            }
            // Mixing out keeps the sign of the pose being mixed from.
            (MixDirection::Out, MixBlend::Setup) => {
                let (bx, by) = setup;
                bone.scale_x = bx + (x.abs() * signum(bx) - bx) * alpha;
                bone.scale_y = by + (y.abs() * signum(by) - by) * alpha;
            }
            (MixDirection::Out, MixBlend::First | MixBlend::Replace) => {
                let (bx, by) = (bone.scale_x, bone.scale_y);
                bone.scale_x = bx + (x.abs() * signum(bx) - bx) * alpha;
                bone.scale_y = by + (y.abs() * signum(by) - by) * alpha;
            }
            (MixDirection::In, MixBlend::Setup) => {
                let bx = setup.0.abs() * signum(x);
                let by = setup.1.abs() * signum(y);
                bone.scale_x = bx + (x - bx) * alpha;
                bone.scale_y = by + (y - by) * alpha;
            }
            (MixDirection::In, MixBlend::First | MixBlend::Replace) => {
                let bx = bone.scale_x.abs() * signum(x);
                let by = bone.scale_y.abs() * signum(y);
                bone.scale_x = bx + (x - bx) * alpha;
                bone.scale_y = by + (y - by) * alpha;
            }
        }
    }
}

impl ShearTimeline {
    pub fn apply(&self, skeleton: &mut Skeleton, time: f32, alpha: f32, blend: MixBlend) {
        let data = &skeleton.data.bones[self.bone_index];
        let (setup_x, setup_y) = (data.shear_x, data.shear_y);
        let bone = &mut skeleton.bones[self.bone_index];
        let Some(first) = self.frames.first() else {
            return;
        };

        if time < first.time {
            match blend {
                MixBlend::Setup => {
                    bone.shear_x = setup_x;
                    bone.shear_y = setup_y;
                }
                MixBlend::First => {
                    bone.shear_x += (setup_x - bone.shear_x) * alpha;
                    bone.shear_y += (setup_y - bone.shear_y) * alpha;
                }
                MixBlend::Replace | MixBlend::Add => {}
            }
            return;
        }

        let (x, y) = sample_pair(&self.frames, time);
        match blend {
            MixBlend::Setup => {
                bone.shear_x = setup_x + x * alpha;
                bone.shear_y = setup_y + y * alpha;
            }
            MixBlend::First | MixBlend::Replace => {
                bone.shear_x += (setup_x + x - bone.shear_x) * alpha;
                bone.shear_y += (setup_y + y - bone.shear_y) * alpha;
            }
            MixBlend::Add => {
                bone.shear_x += x * alpha;
                bone.shear_y += y * alpha;
            }
        }
    }
}
