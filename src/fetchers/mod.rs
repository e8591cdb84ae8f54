//! Fetcher capability and the built-in fetcher kinds
//!
//! A fetcher performs the source-specific retrieval for one harvest type and
//! can export its progress at any suspension point. The deadline runner only
//! sees the [`Fetcher`] trait; every concrete kind here is built on
//! [`PagedFetcher`], which defines the snapshot contract for cursor-paged
//! sources.
//!
//! ## Key Components
//!
//! - [`Fetcher`] - begin-or-resume and snapshot export
//! - [`FetcherFactory`] - builds fetchers of one kind from requests
//! - [`FetcherRegistry`] - harvest type → factory lookup
//! - [`PagedFetcher`] / [`PageSource`] - cursor walking with per-page emission
//! - [`FeedSource`] (`json_feed`) and [`StaticPageSource`] (`static`)
//!
//! ## Example
//!
//! ```rust,ignore
//! use harvestrelay::fetchers::FetcherRegistry;
//!
//! let registry = FetcherRegistry::with_defaults(client, sink);
//! let mut fetcher = registry.get("json_feed").unwrap().build(&request)?;
//! fetcher.fetch().await?;
//! ```

mod feed;
mod fixture;
mod paged;
mod registry;
mod traits;

pub use feed::{FeedFetcherFactory, FeedSource, parse_page};
pub use fixture::{StaticFetcherFactory, StaticPageSource};
pub use paged::{COLLECTION_FIELD, PROGRESS_FIELD, Page, PageProgress, PageSource, PagedFetcher};
pub use registry::{FetcherRegistry, KNOWN_KINDS, RegisteredFetcher, RegistryError};
pub use traits::{FetchError, Fetcher, FetcherFactory};
