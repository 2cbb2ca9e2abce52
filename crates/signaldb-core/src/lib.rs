#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod error;
pub mod record;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use types::{AssetFilter, DocId, Document, MetaValue, Metadata, Neighbor, RankedList, SearchHit, SourceKind, StructuredFilter};
