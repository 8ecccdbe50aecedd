//! Type and member resolution services.

pub mod cache;
pub mod descriptor;
pub mod inspector;
pub mod naming;
pub mod resolver;

pub use cache::{Cache, LockStrategy, Local, Shared};
pub use descriptor::{
    ConstructorDescriptor, ConstructorParam, DefaultHandling, FloatWidth, IntWidth,
    MemberAnnotations, MemberDescriptor, ObjectBuilder, ObjectShape, TypeDescriptor, TypeKind,
    TypeRef,
};
pub use inspector::{
    Access, AnnotationsInspector, AttributeOverrides, CachedTypeInspector, MemberResolver,
    MemberSet, NamingConventionInspector, OverridesInspector, ReflectionInspector,
    StaticTypeInspector, TypeInspector,
};
pub use naming::{
    CamelCase, Hyphenated, LowerCase, NamingConvention, NullNaming, PascalCase, Underscored,
};
pub use resolver::{
    DefaultContainerResolver, ResolveRequest, StaticTypeResolver, TagMappingResolver,
    TypeNameTagResolver, TypeRegistry, TypeResolver,
};
