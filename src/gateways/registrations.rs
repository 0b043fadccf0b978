use std::sync::Arc;

use chrono::Utc;
use nanoid::nanoid;
use serde_json::json;

use super::table::{Order, TableGateway};
use crate::{
    record::Record,
    schema::EVENT_REGISTRATIONS,
    store::{Store, StoreResult},
};

const SUFFIX_ALPHABET: [char; 36] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I',
    'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
];

/// `REG` + wall-clock milliseconds + 4 random characters. The suffix keeps
/// registrations made within the same millisecond apart; the UNIQUE column
/// catches whatever still collides.
pub fn registration_number() -> String {
    format!(
        "REG{}{}",
        Utc::now().timestamp_millis(),
        nanoid!(4, &SUFFIX_ALPHABET)
    )
}

#[derive(Clone)]
pub struct RegistrationGateway {
    table: TableGateway,
}

impl RegistrationGateway {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            table: TableGateway::new(&EVENT_REGISTRATIONS, store),
        }
    }

    pub async fn create_registration(&self, event_id: i32, mut participant: Record) -> StoreResult<Record> {
        participant.insert("eventId".into(), json!(event_id));
        participant.insert("registrationNumber".into(), json!(registration_number()));
        self.table.create(participant).await
    }

    pub async fn by_event(&self, event_id: i32) -> StoreResult<Vec<Record>> {
        let mut filter = Record::new();
        filter.insert("eventId".into(), json!(event_id));
        self.table
            .find_all(filter, Order::desc("registeredAt"), None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_numbers_carry_time_and_suffix() {
        let number = registration_number();
        assert!(number.starts_with("REG"));
        let (millis, suffix) = number[3..].split_at(number.len() - 3 - 4);
        assert!(millis.parse::<i64>().is_ok());
        assert!(suffix.chars().all(|c| SUFFIX_ALPHABET.contains(&c)));
        assert_ne!(registration_number(), registration_number());
    }
}
