pub mod catalog;
pub mod schema;

pub use catalog::{Catalog, CatalogError, IndexInfo, IndexOid, TableInfo, TableOid};
pub use schema::{Column, DataType, Schema};
