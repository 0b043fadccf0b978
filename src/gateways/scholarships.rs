use std::sync::Arc;

use serde_json::json;

use super::table::{Order, TableGateway};
use crate::{
    models::{ApplicationStatus, ScholarshipStatus},
    record::Record,
    schema::{SCHOLARSHIPS, SCHOLARSHIP_APPLICATIONS},
    store::{Store, StoreResult},
};

#[derive(Clone)]
pub struct ScholarshipGateway {
    table: TableGateway,
}

impl ScholarshipGateway {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            table: TableGateway::new(&SCHOLARSHIPS, store),
        }
    }

    pub async fn list(&self, filter: Record) -> StoreResult<Vec<Record>> {
        self.table
            .find_all(filter, Order::desc("createdAt"), None)
            .await
    }

    pub async fn active(&self) -> StoreResult<Vec<Record>> {
        let mut filter = Record::new();
        filter.insert("status".into(), ScholarshipStatus::Open.into());
        self.list(filter).await
    }

    pub async fn find_by_id(&self, id: i32) -> StoreResult<Option<Record>> {
        self.table.find_by_id(id).await
    }

    pub async fn create(&self, scholarship: Record) -> StoreResult<Record> {
        self.table.create(scholarship).await
    }
}

/// Stored filenames of the documents attached to an application, as handed
/// over by the upload handler.
#[derive(Debug, Clone, Default)]
pub struct UploadedFiles {
    pub transcript: Option<String>,
    pub recommendation: Option<String>,
    pub income_proof: Option<String>,
}

#[derive(Clone)]
pub struct ApplicationGateway {
    table: TableGateway,
}

impl ApplicationGateway {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            table: TableGateway::new(&SCHOLARSHIP_APPLICATIONS, store),
        }
    }

    pub fn table(&self) -> &TableGateway {
        &self.table
    }

    pub async fn create_with_files(&self, mut application: Record, files: UploadedFiles) -> StoreResult<Record> {
        let attachments = [
            ("transcriptFile", files.transcript),
            ("recommendationFile", files.recommendation),
            ("incomeProofFile", files.income_proof),
        ];
        for (field, filename) in attachments {
            if let Some(filename) = filename {
                application.insert(field.into(), json!(filename));
            }
        }
        self.table.create(application).await
    }

    pub async fn find_by_id(&self, id: i32) -> StoreResult<Option<Record>> {
        self.table.find_by_id(id).await
    }

    pub async fn by_status(&self, status: ApplicationStatus) -> StoreResult<Vec<Record>> {
        let mut filter = Record::new();
        filter.insert("status".into(), status.into());
        self.table
            .find_all(filter, Order::desc("submittedAt"), None)
            .await
    }

    pub async fn update(&self, id: i32, changes: Record) -> StoreResult<Option<Record>> {
        self.table.update(id, changes).await
    }
}
