//! Table-specific gateways. Each one owns a [`TableGateway`] and adds the
//! few reads and counter updates its table needs.

use std::sync::Arc;

use crate::store::Store;

pub mod contact;
pub mod events;
pub mod members;
pub mod news;
pub mod registrations;
pub mod scholarships;
pub mod table;

pub use contact::ContactGateway;
pub use events::EventGateway;
pub use members::{MemberGateway, MemberStats};
pub use news::NewsGateway;
pub use registrations::RegistrationGateway;
pub use scholarships::{ApplicationGateway, ScholarshipGateway, UploadedFiles};
pub use table::{Counter, Filter, Order, TableGateway};

/// Every gateway over one shared store. Cheap to clone.
#[derive(Clone)]
pub struct Gateways {
    pub members: MemberGateway,
    pub events: EventGateway,
    pub registrations: RegistrationGateway,
    pub news: NewsGateway,
    pub scholarships: ScholarshipGateway,
    pub applications: ApplicationGateway,
    pub contact: ContactGateway,
    store: Arc<dyn Store>,
}

impl Gateways {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            members: MemberGateway::new(store.clone()),
            events: EventGateway::new(store.clone()),
            registrations: RegistrationGateway::new(store.clone()),
            news: NewsGateway::new(store.clone()),
            scholarships: ScholarshipGateway::new(store.clone()),
            applications: ApplicationGateway::new(store.clone()),
            contact: ContactGateway::new(store.clone()),
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }
}
