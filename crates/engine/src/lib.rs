//! `togglesheet-engine`: bit-toggle table engine.
//!
//! Pure engine crate: receives raw CSV rows, returns classified and derived
//! tables. No filesystem, chart, or spreadsheet dependencies.

pub mod config;
pub mod derive;
pub mod error;
pub mod model;
pub mod table;
pub mod totals;

pub use config::{PipelineConfig, SecondaryAxis, TotalsStrategy, PAIR_WIDTH_BITS};
pub use derive::{derive, AugmentedTable, PlotPoint, Summary};
pub use error::EngineError;
pub use model::{DataRow, Metadata, MetadataKey, RawRow, Row};
pub use table::Table;
pub use totals::{Totals, TotalsWarning};
