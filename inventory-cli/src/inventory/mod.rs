//! Inventory reconciliation engine
//!
//! Column roles are inferred from whatever headers the spreadsheet of record
//! uses, identifiers are resolved through tiered lookup, and observation or
//! image slots grow as flat numbered columns so the exported document stays
//! a plain table.

pub mod identity;
pub mod mutator;
pub mod schema;
pub mod session;
pub mod store;
pub mod types;

pub use identity::{IdentityMatch, IdentityResolver, MatchTier, decode_identifier};
pub use schema::{RoleAliases, SchemaResolver, SheetSchema, resolve};
pub use session::{InventorySession, LookupOptions, ScanOutcome};
pub use store::{RecordPatch, RecordStore, StoreError};
