//! Registry scraping
//!
//! This module contains everything that talks to the target registry:
//! - Building the HTTP client and posting the lookup form, with retries
//! - Normalizing noisy page text
//! - Locating labeled fields and resolving their values through an ordered
//!   list of extraction strategies

mod extractor;
mod fetcher;
mod labels;
mod record;
mod strategies;
mod text;

pub use extractor::{extract_record, extract_with};
pub use fetcher::{build_http_client, form_payload, FetchError, RegistryEndpoints, RegistryFetcher};
pub use labels::{FieldSpec, FIELDS, IDENTIFIER_FIELD};
pub use record::ExtractedRecord;
pub use strategies::{
    FollowingText, LabelMatch, NextSibling, TableRowCell, ValueStrategy, DEFAULT_STRATEGIES,
};
pub use text::{clean_text, normalize_text, strip_accents};
