//! Structured topic keys.
//!
//! A topic is a base address plus an optional numeric lane. Requests travel
//! on the bare base; replies travel on `{base, lane}` where the lane is the
//! request's tag. The joined text form (`base.lane`) exists for display and
//! for parsing host-supplied strings; routing only ever compares the
//! structured key, so a base containing `.` never collides with a lane.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator used by the joined text form.
pub const LANE_SEPARATOR: char = '.';

/// Logical channel on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicKey {
    base: String,
    lane: Option<u32>,
}

impl TopicKey {
    /// Topic for the bare address.
    pub fn base(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            lane: None,
        }
    }

    /// Reply lane `lane` under `base`.
    pub fn lane(base: impl Into<String>, lane: u32) -> Self {
        Self {
            base: base.into(),
            lane: Some(lane),
        }
    }

    /// Base address.
    pub fn base_name(&self) -> &str {
        &self.base
    }

    /// Lane number, if this is a reply lane.
    pub fn lane_id(&self) -> Option<u32> {
        self.lane
    }

    /// Same base, on the given lane.
    pub fn with_lane(&self, lane: u32) -> Self {
        Self::lane(self.base.clone(), lane)
    }

    /// Parse the joined text form.
    ///
    /// A trailing `.<u32>` segment becomes the lane; anything else is taken
    /// whole as the base.
    pub fn parse(joined: &str) -> Self {
        if let Some((base, lane)) = joined.rsplit_once(LANE_SEPARATOR) {
            if !base.is_empty() {
                if let Ok(lane) = lane.parse::<u32>() {
                    return Self::lane(base, lane);
                }
            }
        }
        Self::base(joined)
    }
}

impl fmt::Display for TopicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.lane {
            Some(lane) => write!(f, "{}{}{}", self.base, LANE_SEPARATOR, lane),
            None => f.write_str(&self.base),
        }
    }
}

impl From<&str> for TopicKey {
    fn from(base: &str) -> Self {
        Self::base(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_join_rule() {
        assert_eq!(TopicKey::base("chat").to_string(), "chat");
        assert_eq!(TopicKey::lane("chat", 3).to_string(), "chat.3");
    }

    #[test]
    fn test_parse() {
        assert_eq!(TopicKey::parse("chat.3"), TopicKey::lane("chat", 3));
        assert_eq!(TopicKey::parse("chat"), TopicKey::base("chat"));
        assert_eq!(TopicKey::parse("mod.chat"), TopicKey::base("mod.chat"));
        assert_eq!(TopicKey::parse("mod.chat.7"), TopicKey::lane("mod.chat", 7));
        assert_eq!(TopicKey::parse(".7"), TopicKey::base(".7"));
    }

    #[test]
    fn test_structured_keys_do_not_collide() {
        // The joined forms are identical, the keys are not.
        let dotted_base = TopicKey::base("chat.3");
        let lane = TopicKey::lane("chat", 3);

        assert_eq!(dotted_base.to_string(), lane.to_string());
        assert_ne!(dotted_base, lane);
    }

    #[test]
    fn test_with_lane() {
        let topic = TopicKey::base("trade");
        let reply = topic.with_lane(9);

        assert_eq!(reply.base_name(), "trade");
        assert_eq!(reply.lane_id(), Some(9));
        assert_eq!(topic.lane_id(), None);
    }
}
