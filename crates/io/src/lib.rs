// File I/O operations: CSV in, PNG charts and one XLSX document out

pub mod chart;
pub mod csv;
pub mod xlsx;

pub use chart::ChartImage;
pub use xlsx::{ChartFrame, Document, SheetReport};
