//! Bulk upload pipeline for physical flows: map uploaded rows onto canonical records,
//! validate them against the repository, classify the outcome, then review and export.
pub mod classifier;
pub mod column_mapper;
pub mod columns;
pub mod config;
pub mod csv_export;
pub mod env_loader;
pub mod excel_writer;
pub mod filter;
pub mod gateway;
pub mod models;
pub mod parser;
pub mod review;
pub mod source_data;
