use std::sync::Arc;

use chrono::{Local, NaiveDate};

use super::table::{Counter, Filter, Order, TableGateway};
use crate::{
    models::EventStatus,
    record::Record,
    schema::EVENTS,
    store::{Store, StoreResult},
};

const PARTICIPANTS: Counter = Counter {
    field: "currentParticipants",
    by: 1,
    ceiling: None,
    touch: true,
};

#[derive(Clone)]
pub struct EventGateway {
    table: TableGateway,
}

impl EventGateway {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            table: TableGateway::new(&EVENTS, store),
        }
    }

    pub fn table(&self) -> &TableGateway {
        &self.table
    }

    pub async fn list(&self, filter: Record, limit: Option<i64>) -> StoreResult<Vec<Record>> {
        self.table
            .find_all(filter, Order::desc("eventDate"), limit)
            .await
    }

    pub async fn find_by_id(&self, id: i32) -> StoreResult<Option<Record>> {
        self.table.find_by_id(id).await
    }

    pub async fn create(&self, event: Record) -> StoreResult<Record> {
        self.table.create(event).await
    }

    pub async fn update(&self, id: i32, changes: Record) -> StoreResult<Option<Record>> {
        self.table.update(id, changes).await
    }

    /// Upcoming events dated today or later, soonest first.
    pub async fn upcoming(&self, limit: i64) -> StoreResult<Vec<Record>> {
        self.upcoming_from(Local::now().date_naive(), limit).await
    }

    pub async fn upcoming_from(&self, today: NaiveDate, limit: i64) -> StoreResult<Vec<Record>> {
        let mut equals = Record::new();
        equals.insert("status".into(), EventStatus::Upcoming.into());
        self.table
            .select(
                Filter::equals(equals).on_or_after("eventDate", today),
                Order::asc("eventDate"),
                Some(limit),
            )
            .await
    }

    /// Adds one participant unconditionally and returns the updated event.
    pub async fn increment_participants(&self, id: i32) -> StoreResult<Option<Record>> {
        self.table.increment(id, PARTICIPANTS).await
    }

    /// Adds one participant unless that would exceed `maxParticipants`.
    /// `None` when the event is full or does not exist.
    pub async fn reserve_seat(&self, id: i32) -> StoreResult<Option<Record>> {
        self.table
            .increment(
                id,
                Counter {
                    ceiling: Some("maxParticipants"),
                    ..PARTICIPANTS
                },
            )
            .await
    }

    pub async fn release_seat(&self, id: i32) -> StoreResult<Option<Record>> {
        self.table
            .increment(id, Counter { by: -1, ..PARTICIPANTS })
            .await
    }
}
