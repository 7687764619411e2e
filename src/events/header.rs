use crate::events::EventError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use uuid::Uuid;

//type tag carried by every event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    Bar,
    Signal,
    Order,
    Fill,
}

//named priority levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

impl Priority {
    pub const MIN_LEVEL: u8 = 1;
    pub const MAX_LEVEL: u8 = 15;

    //numeric level of the named priority
    pub fn level(self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Normal => 5,
            Priority::High => 10,
            Priority::Critical => 15,
        }
    }
}

//identity and routing metadata shared by all events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventHeader {
    id: Uuid,
    timestamp: DateTime<Utc>,
    event_type: EventType,
    source: String,
    priority: u8,
}

impl EventHeader {
    //creates a header with a fresh id and normal priority
    pub fn new(event_type: EventType, timestamp: DateTime<Utc>, source: impl Into<String>) -> Self {
        EventHeader {
            id: Uuid::new_v4(),
            timestamp,
            event_type,
            source: source.into(),
            priority: Priority::Normal.level(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority.level();
        self
    }

    //sets a raw priority level, which must lie in [1, 15]
    pub fn with_priority_level(mut self, level: u8) -> Result<Self, EventError> {
        if !(Priority::MIN_LEVEL..=Priority::MAX_LEVEL).contains(&level) {
            return Err(EventError::InvalidPriority(level));
        }
        self.priority = level;
        Ok(self)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }
}

//events are identified by id alone
impl PartialEq for EventHeader {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventHeader {}

impl Hash for EventHeader {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
