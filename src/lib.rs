pub use construct::{Construction, NodeDeserializer, TypeConverter};
pub use deferred::{Constructed, Deferred};
pub use document::{Document, NodeId, Stream};
pub use engine::{BuildContext, Engine, EngineBuilder};
pub use error::Error;
pub use events::{Event, EventKind, EventSource, ReplayEvents};
pub use location::{Location, Span};
pub use merge::MergingEvents;
pub use options::{DuplicateKeyPolicy, Options};
#[cfg(feature = "parser")]
pub use parser_events::ParserEvents;
pub use pipeline::{ComponentKey, Placement};
pub use types::{Local, Shared, TypeDescriptor, TypeRef};
pub use value::{Object, Value, ValueDeserializer, from_value, from_value_with_depth};

use serde::de::DeserializeOwned;

pub mod construct;
pub mod deferred;
pub mod document;
pub mod engine;
pub mod error;
pub mod events;
pub mod location;
pub mod merge;
pub mod options;
pub mod parse_scalars;
#[cfg(feature = "parser")]
mod parser_events;
pub mod pipeline;
pub mod recursion;
mod represent;
pub mod tags;
pub mod types;
pub mod value;
mod zmij_format;

/// Deserialize any `T: serde::de::DeserializeOwned` from a single YAML document.
///
/// The document is first constructed as an untyped [`Value`] (anchors, forward aliases
/// and YAML 1.1 scalars resolved), then handed to `T`'s `Deserialize` implementation.
///
/// ```rust
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize, PartialEq)]
/// struct Config {
///     name: String,
///     enabled: bool,
///     retries: i32,
/// }
///
/// let yaml = r#"
///     name: My Application
///     enabled: yes
///     retries: 0x05
/// "#;
///
/// let cfg: Config = saphyr_construct::from_str(yaml).unwrap();
/// assert_eq!(cfg.retries, 5);
/// ```
#[cfg(feature = "parser")]
pub fn from_str<T: DeserializeOwned>(input: &str) -> Result<T, Error> {
    from_str_with_options(input, Options::default())
}

/// Like [`from_str`] with explicit [`Options`].
///
/// ```rust
/// use std::collections::HashMap;
/// use saphyr_construct::{DuplicateKeyPolicy, Options};
///
/// let options = Options {
///     duplicate_keys: DuplicateKeyPolicy::LastWins,
///     ..Options::default()
/// };
/// let map: HashMap<String, i32> =
///     saphyr_construct::from_str_with_options("a: 1\na: 2\n", options).unwrap();
/// assert_eq!(map["a"], 2);
/// ```
#[cfg(feature = "parser")]
pub fn from_str_with_options<T: DeserializeOwned>(input: &str, options: Options) -> Result<T, Error> {
    let (max_depth, strict) = (options.max_recursion, options.strict_booleans);
    let engine = EngineBuilder::new().options(options).build_local()?;
    let value = engine.value_from_str(input, &TypeDescriptor::any())?;
    T::deserialize(ValueDeserializer::new(value, max_depth).strict_booleans(strict))
}
