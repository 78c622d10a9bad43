use crate::Event;

/// Keyed events, sorted by time.
#[derive(Clone, Debug, Default)]
pub struct EventTimeline {
    pub events: Vec<Event>,
}

impl EventTimeline {
    /// Appends every event keyed in `(last_time, time]` to `fired`.
    ///
    /// When `last_time > time` the animation has looped: events after `last_time` fire first,
    /// then events from the start up to `time`.
    pub fn apply(&self, last_time: f32, time: f32, fired: &mut Vec<Event>) {
        let Some(last_key) = self.events.last() else {
            return;
        };

        let mut last_time = last_time;
        if last_time > time {
            self.apply(last_time, f32::MAX, fired);
            last_time = -1.0;
        } else if last_time >= last_key.time {
            return;
        }
        if time < self.events[0].time {
            return;
        }

        let start = self.events.partition_point(|e| e.time <= last_time);
        fired.extend(
            self.events[start..]
                .iter()
                .take_while(|e| e.time <= time)
                .cloned(),
        );
    }
}
