use std::sync::Arc;

use crate::construct::{Construction, NodeDeserializer};
use crate::deferred::Constructed;
use crate::error::Error;
use crate::events::{Event, EventSource};
use crate::types::{TypeDescriptor, TypeRef};
use crate::value::Value;

/// Custom conversion between events and values for selected types.
///
/// Converters run before every built-in strategy and are also consulted when values are
/// represented, so a converter fully owns the YAML shape of the types it accepts.
pub trait TypeConverter: Send + Sync {
    fn accepts(&self, ty: &TypeDescriptor) -> bool;

    /// Consume the events of one node and build the value.
    fn read(
        &self,
        events: &mut dyn EventSource,
        ty: &TypeRef,
        ctx: &mut Construction<'_>,
    ) -> Result<Value, Error>;

    /// Append the events of one node representing `value`.
    fn write(&self, value: &Value, ty: &TypeRef, out: &mut Vec<Event>) -> Result<(), Error>;
}

/// Offers nodes to the registered converters, first match wins.
#[derive(Clone, Default)]
pub struct ConverterStrategy {
    converters: Arc<Vec<Arc<dyn TypeConverter>>>,
}

impl ConverterStrategy {
    pub fn new(converters: Arc<Vec<Arc<dyn TypeConverter>>>) -> Self {
        Self { converters }
    }
}

impl NodeDeserializer for ConverterStrategy {
    fn construct(
        &self,
        events: &mut dyn EventSource,
        ty: &TypeRef,
        ctx: &mut Construction<'_>,
    ) -> Result<Option<Constructed>, Error> {
        let target = ty.underlying();
        let Some(converter) = self.converters.iter().find(|c| c.accepts(target)) else {
            return Ok(None);
        };
        let span = events.last_span();
        let value = converter
            .read(events, target, ctx)
            .map_err(|e| Error::construction(target.name.clone(), e, span))?;
        Ok(Some(value.into()))
    }
}
