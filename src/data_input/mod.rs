// src/data_input/mod.rs

pub mod csv_reader;
pub mod header_params;
pub mod raw_table;
pub mod schema;

// src/data_input/mod.rs
