use chrono::{DateTime, Utc};

use crate::{AggregateId, EventEnvelope, Tag};

/// Filter for reading events across streams.
///
/// Results are always returned in commit order.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    /// Filter by stream.
    pub aggregate_id: Option<AggregateId>,

    /// Filter by aggregate type.
    pub aggregate_type: Option<String>,

    /// Filter by event types (any of these types).
    pub event_types: Option<Vec<String>>,

    /// Only events carrying this tag.
    pub tag: Option<Tag>,

    /// Filter by events after this timestamp (inclusive).
    pub from_timestamp: Option<DateTime<Utc>>,

    /// Filter by events before this timestamp (inclusive).
    pub to_timestamp: Option<DateTime<Utc>>,

    /// Maximum number of events to return.
    pub limit: Option<usize>,

    /// Number of events to skip.
    pub offset: Option<usize>,
}

impl EventQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for every event of one aggregate type carrying `tag`.
    pub fn tagged(aggregate_type: impl Into<String>, tag: Tag) -> Self {
        Self {
            aggregate_type: Some(aggregate_type.into()),
            tag: Some(tag),
            ..Default::default()
        }
    }

    pub fn aggregate_id(mut self, id: AggregateId) -> Self {
        self.aggregate_id = Some(id);
        self
    }

    pub fn aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_types = Some(vec![event_type.into()]);
        self
    }

    pub fn event_types(mut self, event_types: Vec<String>) -> Self {
        self.event_types = Some(event_types);
        self
    }

    pub fn tag(mut self, tag: Tag) -> Self {
        self.tag = Some(tag);
        self
    }

    pub fn from_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.from_timestamp = Some(timestamp);
        self
    }

    pub fn to_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.to_timestamp = Some(timestamp);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if the event satisfies every filter except limit/offset.
    pub fn matches(&self, event: &EventEnvelope) -> bool {
        if let Some(id) = self.aggregate_id
            && event.aggregate_id != id
        {
            return false;
        }
        if let Some(ref agg_type) = self.aggregate_type
            && &event.aggregate_type != agg_type
        {
            return false;
        }
        if let Some(ref types) = self.event_types
            && !types.contains(&event.event_type)
        {
            return false;
        }
        if let Some(ref tag) = self.tag
            && !event.has_tag(tag)
        {
            return false;
        }
        if let Some(from) = self.from_timestamp
            && event.timestamp < from
        {
            return false;
        }
        if let Some(to) = self.to_timestamp
            && event.timestamp > to
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Version;

    fn event(event_type: &str, tag: &str) -> EventEnvelope {
        EventEnvelope::builder()
            .event_type(event_type)
            .aggregate_id(AggregateId::new())
            .aggregate_type("Booking")
            .version(Version::first())
            .payload_raw(serde_json::json!({}))
            .tag(Tag::from_raw(tag))
            .build()
            .unwrap()
    }

    #[test]
    fn tagged_query_matches_type_and_tag() {
        let query = EventQuery::tagged("Booking", Tag::from_raw("service:1"));

        assert!(query.matches(&event("BookingCreated", "service:1")));
        assert!(!query.matches(&event("BookingCreated", "service:2")));
    }

    #[test]
    fn event_type_filter_is_exact() {
        let query = EventQuery::new().event_type("BookingCreated");

        assert!(query.matches(&event("BookingCreated", "x")));
        assert!(!query.matches(&event("StatusChanged", "x")));
    }

    #[test]
    fn builder_chain_sets_paging() {
        let id = AggregateId::new();
        let query = EventQuery::new().aggregate_id(id).limit(10).offset(5);

        assert_eq!(query.aggregate_id, Some(id));
        assert_eq!(query.limit, Some(10));
        assert_eq!(query.offset, Some(5));
    }
}
