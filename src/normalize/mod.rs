//! Label and code normalization shared by every stage.

pub mod column;
pub mod geocode;
pub mod slug;

pub use column::{normalize_column_name, DictionaryEntry, SynonymDictionary};
pub use geocode::{normalize_geocode, GeocodeValue, GEOCODE_WIDTH};
pub use slug::{
    build_indicator_id, safe_filename, slugify, unit_label_for_suffix, unit_label_for_variable,
    unit_to_suffix,
};
