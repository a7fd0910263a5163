//! `eventwatch-core`: the event record model and the contracts around it.
//!
//! No IO. Scrapers implement [`SourceAdapter`], storage backends implement
//! [`StoragePort`].

pub mod dates;
pub mod error;
pub mod identity;
pub mod model;
pub mod normalize;
pub mod ports;

pub use error::{FetchError, FetchErrorKind, StorageError, ValidationError};
pub use identity::{event_id, identity_key};
pub use model::{City, CitySet, EventRecord, EventStatus, RawEvent, DEFAULT_SUPPORTED_CITIES};
pub use normalize::{normalize, normalize_batch, NormalizeContext, Rejected};
pub use ports::{CommitGate, SourceAdapter, StoragePort};
