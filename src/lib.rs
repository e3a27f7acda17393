//! # trustlend
//!
//! Streaming discovery of lending paths through a social trust graph.
//!
//! A borrower finds chains of trust terminating in a party with spare
//! lending capacity: `[source, relayer…, borrower]`, each hop charging a
//! rate no lower than the one before it. The search is a depth-bounded BFS
//! where every frontier is qualified against live on-chain state in batched
//! reads, and every confirmed path streams to the consumer immediately.
//!
//! ## Architecture
//!
//! - **Data model** (`address`, `rate`, `model`): typed addresses, wad
//!   per-second rates, capacity snapshots with the 2% safety haircut
//! - **Source boundary** (`source`): async traits for the trust graph, the
//!   chain state reader, and the profile service; positional tuples are
//!   decoded into typed records here
//! - **Path finder** (`finder`): the depth-by-depth streaming search
//! - **Enricher** (`enrich`): background profile attachment, cached per
//!   search
//! - **Session** (`session`): dedup, enrichment merge, supersession of
//!   in-flight searches, event streaming
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use trustlend::address::Address;
//! use trustlend::fixture::FixtureNetwork;
//! use trustlend::session::{SearchEvent, SearchSession};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let net = Arc::new(FixtureNetwork::from_json("{}")?);
//! let session = SearchSession::new(net.clone(), net.clone(), net);
//! let borrower: Address = "0x0ee3b1a0544e1ea6b23ff1adb2b35df5278b3914".parse()?;
//!
//! let mut handle = session.start(borrower, 3);
//! while let Some(event) = handle.next_event().await {
//!     if let SearchEvent::Discovered(path) = event {
//!         println!("found: {}", path.path);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod enrich;
pub mod error;
pub mod finder;
pub mod fixture;
pub mod model;
pub mod rate;
pub mod session;
pub mod source;
