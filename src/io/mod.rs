//! Reading feature tables and writing run results.

pub mod layer_reader;
pub mod table_writer;

pub use layer_reader::{parse_layer, read_layer, read_layers};
pub use table_writer::{write_interface_table, write_run, write_segments, RunOutputs, TableSchema};
