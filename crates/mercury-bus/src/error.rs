use mercury_types::Topic;

/// Errors raised by the event bus
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The payload does not belong to the topic it was published on
    #[error("topic mismatch: cannot publish {actual} payload on {topic}")]
    TopicMismatch { topic: Topic, actual: Topic },

    /// The delivery worker for a new subscriber could not be started
    #[error("failed to start subscriber worker: {0}")]
    Spawn(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_mismatch_display() {
        let err = BusError::TopicMismatch {
            topic: Topic::PlayerJoined,
            actual: Topic::PlayerLeft,
        };
        let msg = err.to_string();
        assert!(msg.contains("player_joined"));
        assert!(msg.contains("player_left"));
    }
}
