use crate::{Error, Event, MixBlend, MixDirection, PropertyId, Skeleton, SkeletonData, Timeline};
use std::sync::Arc;

#[derive(Clone, Debug, Default)]
pub struct Animation {
    pub name: String,
    pub duration: f32,
    pub timelines: Vec<Timeline>,
}

impl Animation {
    pub fn new(name: impl Into<String>, timelines: Vec<Timeline>) -> Self {
        let duration = timelines
            .iter()
            .map(Timeline::last_key_time)
            .fold(0.0f32, f32::max);
        Self {
            name: name.into(),
            duration,
            timelines,
        }
    }

    pub fn has_timeline(&self, id: PropertyId) -> bool {
        self.timelines.iter().any(|t| t.property_id() == id)
    }

    /// Applies every timeline at `time`.
    ///
    /// When `looped` both times wrap by the duration (`last_time` only when positive), so event
    /// timelines see the wrap and fire across it.
    #[allow(clippy::too_many_arguments)]
    pub fn apply(
        &self,
        skeleton: &mut Skeleton,
        last_time: f32,
        time: f32,
        looped: bool,
        mut events: Option<&mut Vec<Event>>,
        alpha: f32,
        blend: MixBlend,
        direction: MixDirection,
    ) {
        let mut time = time;
        let mut last_time = last_time;
        if looped && self.duration > 0.0 {
            time %= self.duration;
            if last_time > 0.0 {
                last_time %= self.duration;
            }
        }

        for timeline in &self.timelines {
            timeline.apply(
                skeleton,
                last_time,
                time,
                events.as_deref_mut(),
                alpha,
                blend,
                direction,
            );
        }
    }
}

#[derive(Clone, Debug)]
struct Track {
    animation: usize,
    looped: bool,
    time: f32,
    last_time: f32,
}

impl Track {
    fn new(animation: usize, looped: bool) -> Self {
        Self {
            animation,
            looped,
            time: 0.0,
            last_time: -1.0,
        }
    }
}

/// Single-track animation playback with an optional crossfade between consecutive animations.
#[derive(Clone, Debug)]
pub struct AnimationPlayer {
    data: Arc<SkeletonData>,
    current: Option<Track>,
    previous: Option<Track>,
    mix_duration: f32,
    mix_time: f32,
    pub time_scale: f32,
    events: Vec<Event>,
}

impl AnimationPlayer {
    pub fn new(data: Arc<SkeletonData>) -> Self {
        Self {
            data,
            current: None,
            previous: None,
            mix_duration: 0.0,
            mix_time: 0.0,
            time_scale: 1.0,
            events: Vec::new(),
        }
    }

    /// Crossfade duration used when switching animations.
    pub fn set_mix(&mut self, duration: f32) {
        self.mix_duration = duration.max(0.0);
    }

    pub fn mix(&self) -> f32 {
        self.mix_duration
    }

    pub fn set_animation(&mut self, name: &str, looped: bool) -> Result<(), Error> {
        let (index, _) = self
            .data
            .animation(name)
            .ok_or_else(|| Error::UnknownAnimation {
                name: name.to_string(),
            })?;
        let previous = self.current.take();
        self.previous = previous.filter(|_| self.mix_duration > 0.0);
        self.mix_time = 0.0;
        self.current = Some(Track::new(index, looped));
        Ok(())
    }

    /// Stops playback without touching the pose.
    pub fn clear(&mut self) {
        self.current = None;
        self.previous = None;
    }

    pub fn current(&self) -> Option<&str> {
        let track = self.current.as_ref()?;
        Some(self.data.animations[track.animation].name.as_str())
    }

    pub fn track_time(&self) -> f32 {
        self.current.as_ref().map(|t| t.time).unwrap_or(0.0)
    }

    /// True when the current animation is non-looping and has played to its end.
    pub fn is_complete(&self) -> bool {
        self.current.as_ref().is_some_and(|t| {
            !t.looped && t.time >= self.data.animations[t.animation].duration
        })
    }

    pub fn is_mixing(&self) -> bool {
        self.previous.is_some()
    }

    pub fn update(&mut self, delta: f32) {
        let delta = delta * self.time_scale;
        for track in self.current.iter_mut().chain(self.previous.iter_mut()) {
            track.time += delta;
        }
        if self.previous.is_some() {
            self.mix_time += delta;
            if self.mix_time >= self.mix_duration {
                self.previous = None;
            }
        }
    }

    /// Poses the skeleton. Events fired by the current animation since the previous apply replace
    /// the queue read by [`events`](Self::events) and [`drain_events`](Self::drain_events).
    pub fn apply(&mut self, skeleton: &mut Skeleton) {
        self.events.clear();
        let Some(current) = self.current.as_mut() else {
            return;
        };

        let mut alpha = 1.0;
        if let Some(previous) = self.previous.as_mut() {
            let mix = if self.mix_duration > 0.0 {
                (self.mix_time / self.mix_duration).min(1.0)
            } else {
                1.0
            };
            self.data.animations[previous.animation].apply(
                skeleton,
                previous.last_time,
                previous.time,
                previous.looped,
                None,
                1.0 - mix,
                MixBlend::Setup,
                MixDirection::Out,
            );
            previous.last_time = previous.time;
            alpha = mix;
        }

        self.data.animations[current.animation].apply(
            skeleton,
            current.last_time,
            current.time,
            current.looped,
            Some(&mut self.events),
            alpha,
            MixBlend::First,
            MixDirection::In,
        );
        current.last_time = current.time;
    }

    /// Events fired by the latest [`apply`](Self::apply).
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}
