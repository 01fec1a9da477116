use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::types::RawRecord;

/// Opak spørring mot kilden (typisk en ark-URL). Brukes som cache-nøkkel,
/// eksakt strengmatch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryDescriptor(String);

impl QueryDescriptor {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Samme form som dashboardet alltid har brukt: `SELECT * FROM "<url>"`.
    pub fn select_all(sheet_url: &str) -> Self {
        Self(format!("SELECT * FROM \"{sheet_url}\""))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QueryDescriptor {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Leverandør av rårader (prod: SheetsClient, test: StaticRecordProvider).
pub trait RecordProvider: Send + Sync {
    fn fetch(&self, query: &QueryDescriptor) -> Result<Vec<RawRecord>, SourceError>;
}

impl<P: RecordProvider + ?Sized> RecordProvider for Box<P> {
    fn fetch(&self, query: &QueryDescriptor) -> Result<Vec<RawRecord>, SourceError> {
        (**self).fetch(query)
    }
}

impl<P: RecordProvider + ?Sized> RecordProvider for std::sync::Arc<P> {
    fn fetch(&self, query: &QueryDescriptor) -> Result<Vec<RawRecord>, SourceError> {
        (**self).fetch(query)
    }
}

/// Fast svar uansett spørring – for tester og offline-kjøring.
#[derive(Debug, Clone)]
pub struct StaticRecordProvider {
    pub result: Result<Vec<RawRecord>, SourceError>,
}

impl StaticRecordProvider {
    pub fn with_records(records: Vec<RawRecord>) -> Self {
        Self { result: Ok(records) }
    }

    pub fn failing(err: SourceError) -> Self {
        Self { result: Err(err) }
    }
}

impl RecordProvider for StaticRecordProvider {
    fn fetch(&self, _query: &QueryDescriptor) -> Result<Vec<RawRecord>, SourceError> {
        self.result.clone()
    }
}
