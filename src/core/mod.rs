//! Core zonal statistics modules

pub mod date_parser;
pub mod variables;
pub mod stats;
pub mod overlay;
pub mod table;
pub mod records;
pub mod assemble;
pub mod export;
pub mod pipeline;

// Re-export main types
pub use date_parser::{DateToken, DateWindow};
pub use variables::{lookup, Layout, Stat, VariableSchema, VARIABLES};
pub use stats::ZonalStats;
pub use overlay::{OverlayEngine, ZonalRecord};
pub use table::write_csv;
pub use records::{build_image_table, empty_image_table, process_image};
pub use assemble::{assemble, TimeSeries};
pub use export::{prepare_output_dir, SiteExporter};
pub use pipeline::{RunReport, ZonalPipeline};
