/// Interpolation from one keyframe to the next.
///
/// Bezier control points live in the normalized `[0, 1]` percent space of the segment (Spine 3.8
/// export layout), so the same curve applies to every value channel of the keyframe.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub enum Curve {
    #[default]
    Linear,
    Stepped,
    Bezier {
        cx1: f32,
        cy1: f32,
        cx2: f32,
        cy2: f32,
    },
}

impl Curve {
    /// Maps the linear segment progress `t` (0..=1) to the curved progress.
    pub fn percent(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Curve::Linear => t,
            Curve::Stepped => 0.0,
            Curve::Bezier { cx1, cy1, cx2, cy2 } => bezier_percent(t, cx1, cy1, cx2, cy2),
        }
    }
}

/// A keyframe carrying `N` value channels and the curve leading to the next keyframe.
#[derive(Clone, Debug, PartialEq)]
pub struct Keyframe<const N: usize> {
    pub time: f32,
    pub values: [f32; N],
    pub curve: Curve,
}

impl<const N: usize> Keyframe<N> {
    pub fn new(time: f32, values: [f32; N]) -> Self {
        Self {
            time,
            values,
            curve: Curve::Linear,
        }
    }

    pub fn with_curve(mut self, curve: Curve) -> Self {
        self.curve = curve;
        self
    }
}

/// Samples a keyframe sequence at `time`, clamping to the first and last keyframes.
///
/// Panics when `frames` is empty.
pub fn sample<const N: usize>(frames: &[Keyframe<N>], time: f32) -> [f32; N] {
    match segment(frames, time) {
        Segment::Clamped(frame) => frame.values,
        Segment::Between { prev, next, percent } => {
            let mut out = prev.values;
            for (i, v) in out.iter_mut().enumerate() {
                *v += (next.values[i] - *v) * percent;
            }
            out
        }
    }
}

pub(crate) enum Segment<'a, const N: usize> {
    Clamped(&'a Keyframe<N>),
    Between {
        prev: &'a Keyframe<N>,
        next: &'a Keyframe<N>,
        percent: f32,
    },
}

pub(crate) fn segment<const N: usize>(frames: &[Keyframe<N>], time: f32) -> Segment<'_, N> {
    let index = frames.partition_point(|f| f.time <= time);
    if index == 0 {
        return Segment::Clamped(&frames[0]);
    }
    if index >= frames.len() {
        return Segment::Clamped(&frames[frames.len() - 1]);
    }
    let prev = &frames[index - 1];
    let next = &frames[index];
    let denom = next.time - prev.time;
    if denom.abs() <= 1.0e-12 {
        return Segment::Clamped(next);
    }
    Segment::Between {
        prev,
        next,
        percent: prev.curve.percent((time - prev.time) / denom),
    }
}

fn bezier_percent(t: f32, cx1: f32, cy1: f32, cx2: f32, cy2: f32) -> f32 {
    const BEZIER_SIZE: usize = 18;

    let tmpx = (-cx1 * 2.0 + cx2) * 0.03;
    let tmpy = (-cy1 * 2.0 + cy2) * 0.03;
    let dddx = ((cx1 - cx2) * 3.0 + 1.0) * 0.006;
    let dddy = ((cy1 - cy2) * 3.0 + 1.0) * 0.006;
    let mut ddx = tmpx * 2.0 + dddx;
    let mut ddy = tmpy * 2.0 + dddy;
    let mut dx = cx1 * 0.3 + tmpx + dddx * 0.16666667;
    let mut dy = cy1 * 0.3 + tmpy + dddy * 0.16666667;

    let mut x = dx;
    let mut y = dy;

    let mut points = [0.0f32; BEZIER_SIZE];
    for i in (0..BEZIER_SIZE).step_by(2) {
        points[i] = x;
        points[i + 1] = y;
        dx += ddx;
        dy += ddy;
        ddx += dddx;
        ddy += dddy;
        x += dx;
        y += dy;
    }

    if points[0] > t {
        if points[0] <= 1.0e-12 {
            return 0.0;
        }
        return t / points[0] * points[1];
    }

    for i in (2..BEZIER_SIZE).step_by(2) {
        if points[i] >= t {
            let x = points[i - 2];
            let y = points[i - 1];
            let denom = points[i] - x;
            if denom.abs() <= 1.0e-12 {
                return y;
            }
            return y + (t - x) / denom * (points[i + 1] - y);
        }
    }

    let x = points[BEZIER_SIZE - 2];
    let y = points[BEZIER_SIZE - 1];
    let denom = 1.0 - x;
    if denom.abs() <= 1.0e-12 {
        return y;
    }
    y + (t - x) / denom * (1.0 - y)
}
