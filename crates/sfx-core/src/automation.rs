//! Parameter timelines with WebAudio `AudioParam` semantics.

use crate::error::GraphError;
use crate::graph::Param;

/// A single automation instruction with an absolute target time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamEvent {
    /// Jump to `value` at `time`.
    SetValueAt { value: f32, time: f64 },
    /// Ramp linearly from the previous event so `value` is reached at `time`.
    LinearRampTo { value: f32, time: f64 },
    /// Ramp exponentially from the previous event so `value` is reached at
    /// `time`. `value` must be strictly positive.
    ExponentialRampTo { value: f32, time: f64 },
}

impl ParamEvent {
    pub fn time(&self) -> f64 {
        match *self {
            ParamEvent::SetValueAt { time, .. }
            | ParamEvent::LinearRampTo { time, .. }
            | ParamEvent::ExponentialRampTo { time, .. } => time,
        }
    }

    pub fn value(&self) -> f32 {
        match *self {
            ParamEvent::SetValueAt { value, .. }
            | ParamEvent::LinearRampTo { value, .. }
            | ParamEvent::ExponentialRampTo { value, .. } => value,
        }
    }

    /// Reject events a WebAudio implementation would throw on.
    pub fn validate(&self, param: Param) -> Result<(), GraphError> {
        let value = self.value();
        let bad_exp = matches!(self, ParamEvent::ExponentialRampTo { .. }) && value <= 0.0;
        if !value.is_finite() || !self.time().is_finite() || self.time() < 0.0 || bad_exp {
            return Err(GraphError::InvalidParam { param, value });
        }
        Ok(())
    }
}

/// Intrinsic value plus a time-ordered list of [`ParamEvent`]s.
#[derive(Clone, Debug, Default)]
pub struct Automation {
    intrinsic: f32,
    events: Vec<ParamEvent>,
}

impl Automation {
    pub fn new(value: f32) -> Self {
        Self {
            intrinsic: value,
            events: Vec::new(),
        }
    }

    /// Set the value used before the first event (and when there are none).
    pub fn set_value(&mut self, value: f32) {
        self.intrinsic = value;
    }

    /// Insert an event, keeping the list ordered by time. Events sharing a
    /// time keep insertion order.
    pub fn push(&mut self, param: Param, event: ParamEvent) -> Result<(), GraphError> {
        event.validate(param)?;
        let at = self.events.partition_point(|e| e.time() <= event.time());
        self.events.insert(at, event);
        Ok(())
    }

    pub fn events(&self) -> &[ParamEvent] {
        &self.events
    }

    pub fn is_automated(&self) -> bool {
        !self.events.is_empty()
    }

    /// Evaluate the timeline at `t`.
    pub fn value_at(&self, t: f64) -> f32 {
        let idx = self.events.partition_point(|e| e.time() <= t);
        let (t0, v0) = match idx.checked_sub(1) {
            Some(i) => (self.events[i].time(), self.events[i].value()),
            None => (0.0, self.intrinsic),
        };
        match self.events.get(idx) {
            Some(ParamEvent::LinearRampTo { value, time }) => {
                let span = time - t0;
                if span <= 0.0 {
                    return *value;
                }
                let frac = ((t - t0) / span).clamp(0.0, 1.0) as f32;
                v0 + (value - v0) * frac
            }
            Some(ParamEvent::ExponentialRampTo { value, time }) => {
                let span = time - t0;
                if span <= 0.0 {
                    return *value;
                }
                // Undefined from zero or across a sign change: hold.
                if v0 <= 0.0 {
                    return v0;
                }
                let frac = ((t - t0) / span).clamp(0.0, 1.0) as f32;
                v0 * (value / v0).powf(frac)
            }
            _ => v0,
        }
    }
}
