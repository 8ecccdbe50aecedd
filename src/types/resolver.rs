//! Type resolution: which concrete type to build for a node.
//!
//! The resolvers are consulted in order for every node; the first one that answers
//! wins. The default order is tag mapping, embedded type name, default container and
//! finally the statically expected type.

use std::sync::Arc;

use ahash::AHashMap;

use crate::events::EventKind;
use crate::tags::{self, CoreTag};
use crate::types::descriptor::{TypeDescriptor, TypeRef};

/// What is known about a node when its type is resolved.
#[derive(Clone, Copy, Debug)]
pub struct ResolveRequest<'a> {
    pub expected: &'a TypeRef,
    pub tag: Option<&'a str>,
    pub kind: EventKind,
}

pub trait TypeResolver: Send + Sync {
    fn resolve(&self, request: &ResolveRequest<'_>) -> Option<TypeRef>;
}

/// Types known by name, for `!type:Name` tags and for representation of objects.
#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    types: AHashMap<String, TypeRef>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `ty` under its own name, replacing an earlier type of the same name.
    pub fn register(&mut self, ty: TypeRef) {
        self.types.insert(ty.name.clone(), ty);
    }

    pub fn get(&self, name: &str) -> Option<&TypeRef> {
        self.types.get(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// A resolved type may replace the expected one only if the expected type is untyped or
/// names the same type.
fn assignable(expected: &TypeRef, resolved: &TypeRef) -> bool {
    let expected = expected.underlying();
    expected.is_any() || expected.name == resolved.name
}

/// Explicit tag → type mappings.
#[derive(Clone, Debug, Default)]
pub struct TagMappingResolver {
    mappings: Arc<AHashMap<String, TypeRef>>,
}

impl TagMappingResolver {
    pub fn new(mappings: Arc<AHashMap<String, TypeRef>>) -> Self {
        Self { mappings }
    }
}

impl TypeResolver for TagMappingResolver {
    fn resolve(&self, request: &ResolveRequest<'_>) -> Option<TypeRef> {
        let mapped = self.mappings.get(request.tag?)?;
        assignable(request.expected, mapped).then(|| Arc::clone(mapped))
    }
}

/// `!type:Name` tags naming a registered type.
#[derive(Clone, Debug, Default)]
pub struct TypeNameTagResolver {
    registry: Arc<TypeRegistry>,
}

impl TypeNameTagResolver {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self { registry }
    }
}

impl TypeResolver for TypeNameTagResolver {
    fn resolve(&self, request: &ResolveRequest<'_>) -> Option<TypeRef> {
        let name = tags::embedded_type_name(request.tag?)?;
        let ty = self.registry.get(name)?;
        assignable(request.expected, ty).then(|| Arc::clone(ty))
    }
}

/// Untyped mappings become maps (or sets under `!!set`), untyped sequences lists.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultContainerResolver;

impl TypeResolver for DefaultContainerResolver {
    fn resolve(&self, request: &ResolveRequest<'_>) -> Option<TypeRef> {
        if !request.expected.underlying().is_any() {
            return None;
        }
        match request.kind {
            EventKind::MappingStart => {
                if request.tag.and_then(tags::core_tag) == Some(CoreTag::Set) {
                    Some(TypeDescriptor::set(TypeDescriptor::any()))
                } else {
                    Some(TypeDescriptor::map(TypeDescriptor::any(), TypeDescriptor::any()))
                }
            }
            EventKind::SequenceStart => Some(TypeDescriptor::list(TypeDescriptor::any())),
            _ => None,
        }
    }
}

/// Trusts the statically expected type.
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticTypeResolver;

impl TypeResolver for StaticTypeResolver {
    fn resolve(&self, request: &ResolveRequest<'_>) -> Option<TypeRef> {
        Some(Arc::clone(request.expected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> TypeRef {
        TypeDescriptor::object("Point")
            .field("x", TypeDescriptor::i32())
            .build()
    }

    #[test]
    fn tag_mapping_only_for_compatible_targets() {
        let mut mappings = AHashMap::new();
        mappings.insert("!point".to_string(), point());
        let resolver = TagMappingResolver::new(Arc::new(mappings));
        let any = TypeDescriptor::any();
        let req = ResolveRequest {
            expected: &any,
            tag: Some("!point"),
            kind: EventKind::MappingStart,
        };
        assert_eq!(resolver.resolve(&req).map(|t| t.name.clone()).as_deref(), Some("Point"));

        let int = TypeDescriptor::i32();
        let req = ResolveRequest {
            expected: &int,
            ..req
        };
        assert!(resolver.resolve(&req).is_none());
    }

    #[test]
    fn embedded_type_names_use_the_registry() {
        let mut registry = TypeRegistry::new();
        registry.register(point());
        let resolver = TypeNameTagResolver::new(Arc::new(registry));
        let any = TypeDescriptor::optional(TypeDescriptor::any());
        let hit = ResolveRequest {
            expected: &any,
            tag: Some("!type:Point"),
            kind: EventKind::MappingStart,
        };
        assert!(resolver.resolve(&hit).is_some());
        let miss = ResolveRequest {
            tag: Some("!type:Line"),
            ..hit
        };
        assert!(resolver.resolve(&miss).is_none());
    }

    #[test]
    fn default_containers_for_untyped_nodes() {
        let any = TypeDescriptor::any();
        let mapping = ResolveRequest {
            expected: &any,
            tag: None,
            kind: EventKind::MappingStart,
        };
        let resolved = DefaultContainerResolver.resolve(&mapping).unwrap();
        assert_eq!(resolved.name, "Map<any, any>");
        let set = ResolveRequest {
            tag: Some("!!set"),
            ..mapping
        };
        assert_eq!(DefaultContainerResolver.resolve(&set).unwrap().name, "Set<any>");
        let seq = ResolveRequest {
            kind: EventKind::SequenceStart,
            ..mapping
        };
        assert_eq!(DefaultContainerResolver.resolve(&seq).unwrap().name, "Vec<any>");
        let scalar = ResolveRequest {
            kind: EventKind::Scalar,
            ..mapping
        };
        assert!(DefaultContainerResolver.resolve(&scalar).is_none());
    }
}
