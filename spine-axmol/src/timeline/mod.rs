//! Keyframed timelines and the blend model used to apply them to a [`Skeleton`].

mod bone;
mod curve;
mod draw_order;
mod event;
mod slot;

pub use bone::*;
pub use curve::{Curve, Keyframe, sample};
pub use draw_order::*;
pub use event::*;
pub use slot::*;

use crate::{Event, Skeleton};

/// How a timeline value combines with the current pose.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MixBlend {
    /// Blend from the setup pose; before the first key the setup value is restored.
    Setup,
    /// Blend from the current pose; before the first key the pose mixes toward setup.
    First,
    /// Blend from the current pose; before the first key nothing changes.
    Replace,
    /// Add the keyed value to the current pose.
    Add,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MixDirection {
    In,
    Out,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum TimelineKind {
    Rotate,
    Translate,
    Scale,
    Shear,
    Attachment,
    Color,
    Deform,
    Event,
    DrawOrder,
    TwoColor,
}

/// Identifies the property a timeline animates; two timelines with equal ids overlap.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct PropertyId {
    pub kind: TimelineKind,
    /// Bone or slot index; zero for skeleton-wide timelines.
    pub target: usize,
}

#[derive(Clone, Debug)]
pub enum Timeline {
    Rotate(RotateTimeline),
    Translate(TranslateTimeline),
    Scale(ScaleTimeline),
    Shear(ShearTimeline),
    Color(ColorTimeline),
    TwoColor(TwoColorTimeline),
    Deform(DeformTimeline),
    Attachment(AttachmentTimeline),
    DrawOrder(DrawOrderTimeline),
    Event(EventTimeline),
}

impl Timeline {
    /// Applies the timeline at `time` to the skeleton pose.
    ///
    /// `last_time` only matters to event timelines, which append events keyed in
    /// `(last_time, time]` to `events` when one is supplied.
    #[allow(clippy::too_many_arguments)]
    pub fn apply(
        &self,
        skeleton: &mut Skeleton,
        last_time: f32,
        time: f32,
        events: Option<&mut Vec<Event>>,
        alpha: f32,
        blend: MixBlend,
        direction: MixDirection,
    ) {
        match self {
            Timeline::Rotate(t) => t.apply(skeleton, time, alpha, blend),
            Timeline::Translate(t) => t.apply(skeleton, time, alpha, blend),
            Timeline::Scale(t) => t.apply(skeleton, time, alpha, blend, direction),
            Timeline::Shear(t) => t.apply(skeleton, time, alpha, blend),
            Timeline::Color(t) => t.apply(skeleton, time, alpha, blend),
            Timeline::TwoColor(t) => t.apply(skeleton, time, alpha, blend),
            Timeline::Deform(t) => t.apply(skeleton, time, alpha, blend),
            Timeline::Attachment(t) => t.apply(skeleton, time, blend, direction),
            Timeline::DrawOrder(t) => t.apply(skeleton, time, blend, direction),
            Timeline::Event(t) => {
                if let Some(events) = events {
                    t.apply(last_time, time, events);
                }
            }
        }
    }

    pub fn property_id(&self) -> PropertyId {
        let (kind, target) = match self {
            Timeline::Rotate(t) => (TimelineKind::Rotate, t.bone_index),
            Timeline::Translate(t) => (TimelineKind::Translate, t.bone_index),
            Timeline::Scale(t) => (TimelineKind::Scale, t.bone_index),
            Timeline::Shear(t) => (TimelineKind::Shear, t.bone_index),
            Timeline::Color(t) => (TimelineKind::Color, t.slot_index),
            Timeline::TwoColor(t) => (TimelineKind::TwoColor, t.slot_index),
            Timeline::Deform(t) => (TimelineKind::Deform, t.slot_index),
            Timeline::Attachment(t) => (TimelineKind::Attachment, t.slot_index),
            Timeline::DrawOrder(_) => (TimelineKind::DrawOrder, 0),
            Timeline::Event(_) => (TimelineKind::Event, 0),
        };
        PropertyId { kind, target }
    }

    /// Time of the last keyframe, or zero for an empty timeline.
    pub fn last_key_time(&self) -> f32 {
        fn last<T>(frames: &[T], time: impl Fn(&T) -> f32) -> f32 {
            frames.last().map(time).unwrap_or(0.0)
        }
        match self {
            Timeline::Rotate(t) => last(&t.frames, |f| f.time),
            Timeline::Translate(t) => last(&t.frames, |f| f.time),
            Timeline::Scale(t) => last(&t.frames, |f| f.time),
            Timeline::Shear(t) => last(&t.frames, |f| f.time),
            Timeline::Color(t) => last(&t.frames, |f| f.time),
            Timeline::TwoColor(t) => last(&t.frames, |f| f.time),
            Timeline::Deform(t) => last(&t.frames, |f| f.time),
            Timeline::Attachment(t) => last(&t.frames, |f| f.time),
            Timeline::DrawOrder(t) => last(&t.frames, |f| f.time),
            Timeline::Event(t) => last(&t.events, |e| e.time),
        }
    }
}
