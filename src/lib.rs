//! Streaming JSON demultiplexer.
//!
//! `jmux` consumes a JSON object character by character and routes each
//! field's data to a per-field sink as soon as it becomes available, without
//! ever materializing the whole document. Consumers await single-shot sinks
//! ([`AwaitableValue`]) or iterate streaming sinks ([`StreamableValues`])
//! concurrently with the producer — the central use case is picking fields
//! out of a language-model response while generation is still in progress.
//!
//! Declare the shape of the document as a schema of sinks, then feed:
//!
//! ```
//! use std::rc::Rc;
//!
//! use jmux::{AwaitableValue, JsonDemux, StreamableValues};
//!
//! jmux::jmux_schema! {
//!     pub struct CityReport {
//!         pub city_name: StreamableValues<String>,
//!         pub population: AwaitableValue<i64>,
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> jmux::Result<()> {
//! let report = Rc::new(CityReport::default());
//! let mut demux = JsonDemux::new(Rc::clone(&report));
//!
//! let consumer = async {
//!     // `city_name` arrives character by character, ahead of the rest of
//!     // the document.
//!     let mut name = String::new();
//!     while let Some(chunk) = report.city_name.next().await {
//!         name.push_str(&chunk);
//!     }
//!     name
//! };
//! let producer = async { demux.feed_chunks(r#"{"city_name":"Paris","population":2148000}"#) };
//!
//! let (name, fed) = tokio::join!(consumer, producer);
//! fed?;
//! assert_eq!(name, "Paris");
//! assert_eq!(report.population.get().await, 2148000);
//! # Ok(())
//! # }
//! ```
//!
//! The accepted syntax is a strict subset of JSON: the top level must be an
//! object, arrays are one-dimensional, and every value must match the
//! declared element type of its field's sink. Any violation fails the parse
//! at the first offending character; see [`Error`].

/// Incremental decoding of JSON string literals.
pub mod decoder;
/// The character-fed state machine driving sinks.
pub mod demux;
/// Error taxonomy of the engine and its sinks.
pub mod error;
/// Push-down automaton of states and structural modes.
pub mod pda;
/// Schema binding: named, typed field maps.
pub mod schema;
/// Per-field sinks connecting the engine to consumers.
pub mod sink;
/// The value space and element-type model.
pub mod value;

pub use decoder::StringDecoder;
pub use demux::{DynDemux, JsonDemux};
pub use error::{Error, Result};
pub use pda::{Mode, PushDownAutomata, State};
pub use schema::{Field, JMux};
pub use sink::{AwaitableValue, RawSink, SinkKind, StreamableValues};
pub use value::{Element, ElementKind, ElementTypeSet, StreamElement, Value, ValueRejected};
