pub mod document;
pub mod error;
pub mod object_id;

pub use document::{Document, Filter, ID_FIELD, Query, Sort, SortDirection, Update};
pub use error::{Result, StoreError};
pub use object_id::ObjectId;
