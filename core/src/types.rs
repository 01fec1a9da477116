use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::ShapeError;

/// Én rad fra arket (én logget aktivitet).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub date: NaiveDateTime,
    pub activity_type: String,   // f.eks. "Run", "Bike"
    pub distance: f64,           // miles
    pub speed: f64,              // mph
    #[serde(default)]
    pub avg_heart_rate: Option<u32>, // bpm, None når klokka ikke logget puls
}

impl RawRecord {
    pub fn new(
        date: NaiveDateTime,
        activity_type: impl Into<String>,
        distance: f64,
        speed: f64,
        avg_heart_rate: u32,
    ) -> Self {
        Self {
            date,
            activity_type: activity_type.into(),
            distance,
            speed,
            avg_heart_rate: Some(avg_heart_rate),
        }
    }
}

/// Rad klar for rendering: rådata + avledede kolonner + eventuelle flagg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapedRecord {
    pub date: NaiveDateTime,
    pub activity_type: String,
    pub distance: f64,
    pub speed: f64,
    pub avg_heart_rate: Option<u32>,
    /// distance / speed; None når raden er flagget for ugyldig fart/distanse
    pub duration_hours: Option<f64>,
    /// Cosinus-vektet rullende snitt; None til vinduet er fullt
    pub hr_smoothed: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<ShapeError>,
}

impl ShapedRecord {
    pub fn is_flagged(&self) -> bool {
        !self.flags.is_empty()
    }
}

/// Sortert (ikke-synkende på dato) datasett for grafer og tabell.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapedDataset {
    records: Vec<ShapedRecord>,
}

impl ShapedDataset {
    pub(crate) fn from_sorted(records: Vec<ShapedRecord>) -> Self {
        debug_assert!(records.windows(2).all(|w| w[0].date <= w[1].date));
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ShapedRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ShapedRecord> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<ShapedRecord> {
        self.records
    }

    // --- kolonnevisninger for grafene ---

    pub fn dates(&self) -> Vec<NaiveDateTime> {
        self.records.iter().map(|r| r.date).collect()
    }

    pub fn distances(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.distance).collect()
    }

    pub fn durations(&self) -> Vec<Option<f64>> {
        self.records.iter().map(|r| r.duration_hours).collect()
    }

    pub fn heart_rates(&self) -> Vec<Option<u32>> {
        self.records.iter().map(|r| r.avg_heart_rate).collect()
    }

    pub fn hr_smoothed(&self) -> Vec<Option<f64>> {
        self.records.iter().map(|r| r.hr_smoothed).collect()
    }

    /// Rader med minst ett flagg (vises typisk som advarsel under tabellen).
    pub fn flagged(&self) -> impl Iterator<Item = &ShapedRecord> {
        self.records.iter().filter(|r| r.is_flagged())
    }
}

impl<'a> IntoIterator for &'a ShapedDataset {
    type Item = &'a ShapedRecord;
    type IntoIter = std::slice::Iter<'a, ShapedRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
