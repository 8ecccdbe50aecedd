//! Engine assembly and the public construction and representation operations.
//!
//! An [`EngineBuilder`] collects options, registered types, tag mappings, converters,
//! member overrides and the naming convention, and keeps three [`Pipeline`]s: the node
//! deserializer (strategy) chain, the type resolver chain and the type inspector chain.
//! [`EngineBuilder::build`] materializes every pipeline once; the resulting [`Engine`] is
//! immutable apart from its member cache.

use std::sync::Arc;

use ahash::AHashMap;
use tracing::debug;

use crate::construct::{
    ArrayStrategy, Construction, ConstructorStrategy, ConverterStrategy, ListStrategy, MapStrategy,
    NodeDeserializer, NullStrategy, ObjectStrategy, ScalarStrategy, Services, SetStrategy,
    TypeConverter,
};
use crate::document::{Document, Stream};
use crate::error::Error;
use crate::events::{Event, EventKind, EventSource};
use crate::options::{Cfg, DuplicateKeyPolicy, Options};
use crate::pipeline::{ComponentFactory, ComponentKey, Pipeline, Placement, WrapperFactory};
use crate::represent::Representer;
use crate::types::{
    Access, AnnotationsInspector, AttributeOverrides, CachedTypeInspector, DefaultContainerResolver,
    LockStrategy, Local, MemberAnnotations, MemberResolver, MemberSet, NamingConvention,
    NamingConventionInspector, NullNaming, OverridesInspector, ReflectionInspector, Shared,
    StaticTypeInspector, StaticTypeResolver, TagMappingResolver, TypeDescriptor, TypeInspector,
    TypeNameTagResolver, TypeRef, TypeRegistry, TypeResolver,
};
use crate::value::Value;

/// Arguments handed to every pipeline factory.
#[derive(Clone)]
pub struct BuildContext {
    pub options: Options,
    pub tag_mappings: Arc<AHashMap<String, TypeRef>>,
    pub registry: Arc<TypeRegistry>,
    pub naming: Arc<dyn NamingConvention>,
    pub overrides: Arc<AttributeOverrides>,
    pub converters: Arc<Vec<Arc<dyn TypeConverter>>>,
}

pub type StrategyFactory = ComponentFactory<BuildContext, Box<dyn NodeDeserializer>>;
pub type ResolverFactory = ComponentFactory<BuildContext, Box<dyn TypeResolver>>;
pub type InspectorFactory = WrapperFactory<BuildContext, Box<dyn TypeInspector>>;
type BaseInspector = dyn Fn(&BuildContext) -> Box<dyn TypeInspector> + Send + Sync;

fn strategy<C: NodeDeserializer + Default + 'static>() -> (ComponentKey, Arc<StrategyFactory>) {
    let factory: Arc<StrategyFactory> =
        Arc::new(|_: &BuildContext| Box::new(C::default()) as Box<dyn NodeDeserializer>);
    (ComponentKey::of::<C>(), factory)
}

fn resolver<F>(factory: F) -> Arc<ResolverFactory>
where
    F: Fn(&BuildContext) -> Box<dyn TypeResolver> + Send + Sync + 'static,
{
    Arc::new(factory)
}

fn inspector<F>(factory: F) -> Arc<InspectorFactory>
where
    F: Fn(&BuildContext, Box<dyn TypeInspector>) -> Box<dyn TypeInspector> + Send + Sync + 'static,
{
    Arc::new(factory)
}

/// Collects the configuration of an [`Engine`].
///
/// Pipeline edits that name a missing component, or register one twice, are remembered
/// and reported by [`EngineBuilder::build`].
pub struct EngineBuilder {
    options: Options,
    tag_mappings: AHashMap<String, TypeRef>,
    registry: TypeRegistry,
    naming: Arc<dyn NamingConvention>,
    overrides: AttributeOverrides,
    converters: Vec<Arc<dyn TypeConverter>>,
    base_inspector: Arc<BaseInspector>,
    strategies: Pipeline<StrategyFactory>,
    resolvers: Pipeline<ResolverFactory>,
    inspectors: Pipeline<InspectorFactory>,
    error: Option<Error>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        let mut strategies: Pipeline<StrategyFactory> = Pipeline::new();
        let converters: Arc<StrategyFactory> = Arc::new(|ctx: &BuildContext| {
            Box::new(ConverterStrategy::new(Arc::clone(&ctx.converters))) as Box<dyn NodeDeserializer>
        });
        let defaults = [
            (ComponentKey::of::<ConverterStrategy>(), converters),
            strategy::<NullStrategy>(),
            strategy::<ScalarStrategy>(),
            strategy::<ArrayStrategy>(),
            strategy::<ListStrategy>(),
            strategy::<MapStrategy>(),
            strategy::<SetStrategy>(),
            strategy::<ConstructorStrategy>(),
            strategy::<ObjectStrategy>(),
        ];
        let mut error = None;
        for (key, factory) in defaults {
            if let Err(e) = strategies.register(key, factory, Placement::OnBottom) {
                error.get_or_insert(e);
            }
        }

        let mut resolvers: Pipeline<ResolverFactory> = Pipeline::new();
        let resolver_defaults = [
            (
                ComponentKey::of::<TagMappingResolver>(),
                resolver(|ctx| Box::new(TagMappingResolver::new(Arc::clone(&ctx.tag_mappings)))),
            ),
            (
                ComponentKey::of::<TypeNameTagResolver>(),
                resolver(|ctx| Box::new(TypeNameTagResolver::new(Arc::clone(&ctx.registry)))),
            ),
            (
                ComponentKey::of::<DefaultContainerResolver>(),
                resolver(|_| Box::new(DefaultContainerResolver)),
            ),
            (
                ComponentKey::of::<StaticTypeResolver>(),
                resolver(|_| Box::new(StaticTypeResolver)),
            ),
        ];
        for (key, factory) in resolver_defaults {
            if let Err(e) = resolvers.register(key, factory, Placement::OnBottom) {
                error.get_or_insert(e);
            }
        }

        let mut inspectors: Pipeline<InspectorFactory> = Pipeline::new();
        let inspector_defaults = [
            (
                ComponentKey::of::<AnnotationsInspector>(),
                inspector(|_, inner| Box::new(AnnotationsInspector::new(inner))),
            ),
            (
                ComponentKey::of::<OverridesInspector>(),
                inspector(|ctx, inner| Box::new(OverridesInspector::new(inner, Arc::clone(&ctx.overrides)))),
            ),
            (
                ComponentKey::of::<NamingConventionInspector>(),
                inspector(|ctx, inner| {
                    Box::new(NamingConventionInspector::new(inner, Arc::clone(&ctx.naming)))
                }),
            ),
        ];
        for (key, factory) in inspector_defaults {
            if let Err(e) = inspectors.register(key, factory, Placement::OnBottom) {
                error.get_or_insert(e);
            }
        }

        Self {
            options: Options::default(),
            tag_mappings: AHashMap::new(),
            registry: TypeRegistry::new(),
            naming: Arc::new(NullNaming),
            overrides: AttributeOverrides::new(),
            converters: Vec::new(),
            base_inspector: Arc::new(|_: &BuildContext| Box::new(ReflectionInspector) as Box<dyn TypeInspector>),
            strategies,
            resolvers,
            inspectors,
            error,
        }
    }

    fn record(&mut self, result: Result<(), Error>) {
        if let Err(e) = result {
            self.error.get_or_insert(e);
        }
    }

    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn duplicate_keys(mut self, policy: DuplicateKeyPolicy) -> Self {
        self.options.duplicate_keys = policy;
        self
    }

    pub fn ignore_unmatched(mut self, ignore: bool) -> Self {
        self.options.ignore_unmatched = ignore;
        self
    }

    pub fn max_recursion(mut self, depth: usize) -> Self {
        self.options.max_recursion = depth;
        self
    }

    pub fn strict_booleans(mut self, strict: bool) -> Self {
        self.options.strict_booleans = strict;
        self
    }

    pub fn infer_scalar_types(mut self, infer: bool) -> Self {
        self.options.infer_scalar_types = infer;
        self
    }

    /// Expand `<<` merge keys in text parsed by the engine.
    pub fn merge_keys(mut self, merge: bool) -> Self {
        self.options.merge_keys = merge;
        self
    }

    /// Make `ty` known by name, for `!type:Name` tags and for representing its instances.
    pub fn register_type(mut self, ty: TypeRef) -> Self {
        self.registry.register(ty);
        self
    }

    /// Nodes carrying `tag` construct as `ty` where the expected type allows it.
    pub fn tag_mapping(mut self, tag: impl Into<String>, ty: TypeRef) -> Self {
        self.tag_mappings.insert(tag.into(), ty);
        self
    }

    pub fn naming_convention(mut self, convention: impl NamingConvention + 'static) -> Self {
        self.naming = Arc::new(convention);
        self
    }

    /// Patch the annotations of one member without touching its type descriptor.
    pub fn override_member<F>(mut self, type_name: impl Into<String>, field: impl Into<String>, patch: F) -> Self
    where
        F: Fn(&mut MemberAnnotations) + Send + Sync + 'static,
    {
        self.overrides.add(type_name, field, patch);
        self
    }

    pub fn converter(mut self, converter: impl TypeConverter + 'static) -> Self {
        self.converters.push(Arc::new(converter));
        self
    }

    /// Enumerate members from ahead-of-time tables instead of the type descriptors.
    pub fn static_members(mut self, tables: StaticTypeInspector) -> Self {
        let tables = Arc::new(tables);
        self.base_inspector = Arc::new(move |_: &BuildContext| {
            Box::new(StaticTypeInspector::clone(&tables)) as Box<dyn TypeInspector>
        });
        self
    }

    /// Register a construction strategy of type `C` at `placement`.
    pub fn with_node_deserializer<C, F>(mut self, factory: F, placement: Placement) -> Self
    where
        C: NodeDeserializer + 'static,
        F: Fn(&BuildContext) -> C + Send + Sync + 'static,
    {
        let factory: Arc<StrategyFactory> =
            Arc::new(move |ctx: &BuildContext| Box::new(factory(ctx)) as Box<dyn NodeDeserializer>);
        let result = self.strategies.register(ComponentKey::of::<C>(), factory, placement);
        self.record(result);
        self
    }

    pub fn without_node_deserializer<C: 'static>(mut self) -> Self {
        let result = self.strategies.remove(ComponentKey::of::<C>());
        self.record(result);
        self
    }

    /// Register a type resolver of type `C` at `placement`.
    pub fn with_type_resolver<C, F>(mut self, factory: F, placement: Placement) -> Self
    where
        C: TypeResolver + 'static,
        F: Fn(&BuildContext) -> C + Send + Sync + 'static,
    {
        let factory: Arc<ResolverFactory> =
            Arc::new(move |ctx: &BuildContext| Box::new(factory(ctx)) as Box<dyn TypeResolver>);
        let result = self.resolvers.register(ComponentKey::of::<C>(), factory, placement);
        self.record(result);
        self
    }

    pub fn without_type_resolver<C: 'static>(mut self) -> Self {
        let result = self.resolvers.remove(ComponentKey::of::<C>());
        self.record(result);
        self
    }

    /// Register an inspector of type `C` wrapping the inspector built before it.
    pub fn with_type_inspector<C, F>(mut self, factory: F, placement: Placement) -> Self
    where
        C: TypeInspector + 'static,
        F: Fn(&BuildContext, Box<dyn TypeInspector>) -> C + Send + Sync + 'static,
    {
        let factory: Arc<InspectorFactory> = Arc::new(move |ctx: &BuildContext, inner| {
            Box::new(factory(ctx, inner)) as Box<dyn TypeInspector>
        });
        let result = self.inspectors.register(ComponentKey::of::<C>(), factory, placement);
        self.record(result);
        self
    }

    pub fn without_type_inspector<C: 'static>(mut self) -> Self {
        let result = self.inspectors.remove(ComponentKey::of::<C>());
        self.record(result);
        self
    }

    /// Keys of the strategy chain in the order the engine will consult them.
    pub fn node_deserializer_keys(&self) -> Vec<ComponentKey> {
        self.strategies.keys().collect()
    }

    pub fn type_resolver_keys(&self) -> Vec<ComponentKey> {
        self.resolvers.keys().collect()
    }

    pub fn type_inspector_keys(&self) -> Vec<ComponentKey> {
        self.inspectors.keys().collect()
    }

    /// Thread-shareable engine.
    pub fn build(self) -> Result<Engine<Shared>, Error> {
        self.build_with()
    }

    /// Single-threaded engine; its member cache needs no lock.
    pub fn build_local(self) -> Result<Engine<Local>, Error> {
        self.build_with()
    }

    fn build_with<L: LockStrategy>(self) -> Result<Engine<L>, Error> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let ctx = BuildContext {
            options: self.options.clone(),
            tag_mappings: Arc::new(self.tag_mappings),
            registry: Arc::new(self.registry),
            naming: self.naming,
            overrides: Arc::new(self.overrides),
            converters: Arc::new(self.converters),
        };
        let strategies = self.strategies.build(&ctx);
        let resolvers = self.resolvers.build(&ctx);
        let inspector = self.inspectors.build_chain(&ctx, (self.base_inspector)(&ctx));
        debug!(
            strategies = strategies.len(),
            resolvers = resolvers.len(),
            inspectors = self.inspectors.len(),
            registered_types = ctx.registry.len(),
            "engine assembled"
        );
        Ok(Engine {
            cfg: Cfg::from_options(&ctx.options),
            strategies,
            resolvers,
            members: CachedTypeInspector::new(inspector),
            ctx,
        })
    }
}

/// Assembled construction and representation engine.
///
/// `Engine<Shared>` is `Send + Sync` and may serve concurrent calls; `Engine<Local>`
/// is for one thread. Every call is synchronous and either fully succeeds or fails.
pub struct Engine<L: LockStrategy = Shared> {
    cfg: Cfg,
    strategies: Vec<Box<dyn NodeDeserializer>>,
    resolvers: Vec<Box<dyn TypeResolver>>,
    members: CachedTypeInspector<L>,
    ctx: BuildContext,
}

impl<L: LockStrategy> Engine<L> {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn options(&self) -> &Options {
        &self.ctx.options
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.ctx.registry
    }

    /// Resolved members of `ty`, as construction and representation see them.
    pub fn member_set(&self, ty: &TypeDescriptor, access: Access) -> Result<Arc<MemberSet>, Error> {
        self.members.member_set(ty, access)
    }

    fn construction(&self) -> Construction<'_> {
        let services = Services {
            resolvers: &self.resolvers,
            strategies: &self.strategies,
            members: &self.members,
            naming: &*self.ctx.naming,
        };
        Construction::new(services, self.cfg)
    }

    /// Construct one document as `ty`.
    pub fn construct_value(&self, events: &mut dyn EventSource, ty: &TypeRef) -> Result<Value, Error> {
        debug!(type_name = %ty.name, "constructing value");
        self.construction().construct(events, ty)
    }

    /// Construct every document of the stream as `ty`. Anchors do not cross documents.
    pub fn construct_values(&self, events: &mut dyn EventSource, ty: &TypeRef) -> Result<Vec<Value>, Error> {
        events.try_consume(EventKind::StreamStart)?;
        let mut values = Vec::new();
        loop {
            match events.peek()? {
                None => break,
                Some(ev) if ev.kind() == EventKind::StreamEnd => {
                    events.next()?;
                    break;
                }
                Some(_) => values.push(self.construction().construct(events, ty)?),
            }
        }
        debug!(documents = values.len(), type_name = %ty.name, "stream constructed");
        Ok(values)
    }

    /// Load one document into the generic node model.
    pub fn construct_document(&self, events: &mut dyn EventSource) -> Result<Document, Error> {
        Document::load(events, self.cfg.max_recursion)
    }

    /// Load every document of the stream into the generic node model.
    pub fn construct_stream(&self, events: &mut dyn EventSource) -> Result<Stream, Error> {
        Stream::load(events, self.cfg.max_recursion)
    }

    /// Events of one document representing `value` as `ty`.
    pub fn represent(&self, value: &Value, ty: &TypeRef) -> Result<Vec<Event>, Error> {
        Representer::new(
            &self.members,
            &self.ctx.registry,
            &self.ctx.converters,
            self.cfg.max_recursion,
        )
        .document(value, ty)
    }

    pub fn represent_document(&self, doc: &Document) -> Result<Vec<Event>, Error> {
        doc.save(self.cfg.max_recursion)
    }

    pub fn represent_stream(&self, stream: &Stream) -> Result<Vec<Event>, Error> {
        stream.save(self.cfg.max_recursion)
    }
}

#[cfg(feature = "parser")]
impl<L: LockStrategy> Engine<L> {
    /// Run `f` over the events of `yaml`, with merge keys expanded when enabled.
    fn parsed<T>(
        &self,
        yaml: &str,
        f: impl FnOnce(&mut dyn EventSource) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut events = crate::parser_events::ParserEvents::new(yaml);
        if self.cfg.merge_keys {
            f(&mut crate::merge::MergingEvents::new(events, self.cfg.max_recursion))
        } else {
            f(&mut events)
        }
    }

    /// Parse YAML text and construct its single document as `ty`.
    pub fn value_from_str(&self, yaml: &str, ty: &TypeRef) -> Result<Value, Error> {
        self.parsed(yaml, |events| self.construct_value(events, ty))
    }

    /// Parse YAML text and construct every document as `ty`.
    pub fn values_from_str(&self, yaml: &str, ty: &TypeRef) -> Result<Vec<Value>, Error> {
        self.parsed(yaml, |events| self.construct_values(events, ty))
    }

    pub fn document_from_str(&self, yaml: &str) -> Result<Document, Error> {
        self.parsed(yaml, |events| self.construct_document(events))
    }

    pub fn stream_from_str(&self, yaml: &str) -> Result<Stream, Error> {
        self.parsed(yaml, |events| self.construct_stream(events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ReplayEvents;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn shared_engine_is_thread_safe() {
        assert_send_sync::<Engine<Shared>>();
    }

    #[test]
    fn default_chain_order() {
        let names: Vec<&str> = EngineBuilder::new()
            .node_deserializer_keys()
            .iter()
            .map(|k| k.name().rsplit("::").next().unwrap_or_default())
            .collect();
        assert_eq!(
            names,
            [
                "ConverterStrategy",
                "NullStrategy",
                "ScalarStrategy",
                "ArrayStrategy",
                "ListStrategy",
                "MapStrategy",
                "SetStrategy",
                "ConstructorStrategy",
                "ObjectStrategy"
            ]
        );
    }

    #[test]
    fn misplaced_registration_fails_at_build() {
        let err = EngineBuilder::new()
            .with_node_deserializer(|_| NullStrategy, Placement::OnTop)
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, Error::Configuration { .. }), "{err}");
    }

    #[test]
    fn removing_the_list_strategy_leaves_sequences_unclaimed() {
        let engine = EngineBuilder::new()
            .without_node_deserializer::<ListStrategy>()
            .build_local()
            .unwrap();
        let mut events = ReplayEvents::new(vec![Event::sequence_start(), Event::sequence_end()]);
        let err = engine
            .construct_value(&mut events, &TypeDescriptor::list(TypeDescriptor::i32()))
            .unwrap_err();
        assert!(matches!(err, Error::Shape { .. }), "{err}");
    }

    #[test]
    fn null_words_stay_text_for_strings() {
        let engine = EngineBuilder::new().build_local().unwrap();
        let string = TypeDescriptor::string();
        let maybe = TypeDescriptor::optional(TypeDescriptor::string());
        for word in ["~", "null", "NULL"] {
            let mut events = ReplayEvents::new(vec![Event::scalar(word)]);
            assert_eq!(engine.construct_value(&mut events, &string).unwrap(), Value::str(word));
            let mut events = ReplayEvents::new(vec![Event::scalar(word)]);
            assert_eq!(engine.construct_value(&mut events, &maybe).unwrap(), Value::Null);
        }
    }
}
