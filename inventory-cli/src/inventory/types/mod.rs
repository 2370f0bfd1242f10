//! Core types for the inventory engine

mod cell;
mod role;
mod tabular;
mod workbook;

pub use cell::*;
pub use role::*;
pub use tabular::*;
pub use workbook::*;
