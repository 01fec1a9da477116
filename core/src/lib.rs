pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod shaper;
pub mod sheets;
pub mod smoothing;
pub mod source;
pub mod types;

#[cfg(feature = "python")]
pub mod py;

pub use cache::{CachedSource, Clock, ManualClock, SystemClock, DEFAULT_TTL};
pub use config::{load_config, parse_config, save_config, PipelineConfig};
pub use error::{ConfigError, ShapeError, SourceError};
pub use metrics::Metrics;
pub use pipeline::ActivityPipeline;
pub use shaper::{shape, ActivityShaper};
pub use sheets::{parse_csv_records, SheetsClient};
pub use source::{QueryDescriptor, RecordProvider, StaticRecordProvider};
pub use types::{RawRecord, ShapedDataset, ShapedRecord};
