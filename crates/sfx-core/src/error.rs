use thiserror::Error;

use crate::graph::Param;

/// Failures reported by an [`AudioGraph`](crate::graph::AudioGraph) backend.
///
/// None of these ever reach the host application: the engine logs them and
/// degrades to silence.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// The real-time audio output could not be acquired.
    #[error("audio subsystem unavailable: {0}")]
    Unavailable(String),

    /// The node was already stopped or disconnected, or the platform
    /// reclaimed it after it finished playing.
    #[error("node already released")]
    AlreadyReleased,

    /// The handle does not refer to a node owned by this graph.
    #[error("unknown node")]
    UnknownNode,

    /// The node has no such parameter, or the value is out of range for
    /// the requested automation (e.g. an exponential ramp to zero).
    #[error("invalid value {value} for {param:?}")]
    InvalidParam { param: Param, value: f32 },

    /// The operation is not valid in the node's current state, such as
    /// stopping a source that was never started.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// Opaque error raised by the platform audio API.
    #[error("backend error: {0}")]
    Backend(String),
}

impl GraphError {
    /// `true` for the outcome a teardown is expected to meet and discard.
    pub fn is_already_released(&self) -> bool {
        matches!(self, GraphError::AlreadyReleased)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_already_released_is_benign() {
        assert!(GraphError::AlreadyReleased.is_already_released());
        assert!(!GraphError::UnknownNode.is_already_released());
        assert!(!GraphError::Unavailable("no device".into()).is_already_released());
    }

    #[test]
    fn messages_name_the_parameter() {
        let e = GraphError::InvalidParam {
            param: Param::Gain,
            value: 0.0,
        };
        assert_eq!(e.to_string(), "invalid value 0 for Gain");
    }
}
