pub mod aggregate;
pub mod classify;
pub mod config;
pub mod error;
pub mod models;
pub mod report;
pub mod roster;
pub mod sheet;
pub mod workbook;
