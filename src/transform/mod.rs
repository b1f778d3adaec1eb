//! Record transforms applied per file after reading
//!
//! Raw records are flattened, normalized to canonical field names and keyed
//! with a deterministic identity hash.

pub mod canonical_key;
pub mod flatten;
pub mod normalize;

pub use canonical_key::{IDENTITY_FIELDS, SENTINEL_KEY, canonical_key};
pub use flatten::{DEFAULT_SEPARATOR, flatten};
pub use normalize::{
    FieldNormalizer, SYNONYMS, format_ingest_timestamp, normalize_field_name,
};
