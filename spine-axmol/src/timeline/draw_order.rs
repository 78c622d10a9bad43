use super::{MixBlend, MixDirection};
use crate::Skeleton;

#[derive(Clone, Debug, PartialEq)]
pub struct DrawOrderFrame {
    pub time: f32,
    /// Slot indices in draw order; `None` restores the setup order.
    pub draw_order: Option<Vec<usize>>,
}

#[derive(Clone, Debug, Default)]
pub struct DrawOrderTimeline {
    pub frames: Vec<DrawOrderFrame>,
}

fn reset_draw_order(skeleton: &mut Skeleton) {
    let count = skeleton.slots.len();
    skeleton.draw_order.clear();
    skeleton.draw_order.extend(0..count);
}

impl DrawOrderTimeline {
    pub fn apply(
        &self,
        skeleton: &mut Skeleton,
        time: f32,
        blend: MixBlend,
        direction: MixDirection,
    ) {
        if direction == MixDirection::Out {
            if blend == MixBlend::Setup {
                reset_draw_order(skeleton);
            }
            return;
        }
        let Some(first) = self.frames.first() else {
            return;
        };
        if time < first.time {
            if matches!(blend, MixBlend::Setup | MixBlend::First) {
                reset_draw_order(skeleton);
            }
            return;
        }

        let index = self
            .frames
            .partition_point(|f| f.time <= time)
            .saturating_sub(1);
        match self.frames[index].draw_order.as_ref() {
            Some(order) if order.len() == skeleton.slots.len() => {
                skeleton.draw_order.clone_from(order);
            }
            Some(_) => {}
            None => reset_draw_order(skeleton),
        }
    }
}
