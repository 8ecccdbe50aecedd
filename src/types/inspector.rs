//! Member resolution: which members of an object type are exposed, and under what name.
//!
//! Inspectors form a chain, each one wrapping the previous: descriptor enumeration
//! (or a static table) → declarative annotations → caller overrides → naming
//! convention → cache. The cache produces a [`MemberSet`] with constant-time lookup.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use ahash::{AHashMap, AHasher};
use tracing::trace;

use crate::error::Error;
use crate::types::cache::{Cache, LockStrategy};
use crate::types::descriptor::{MemberAnnotations, MemberDescriptor, TypeDescriptor, TypeKind};
use crate::types::naming::NamingConvention;

/// Direction of member access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Access {
    /// Members are read from an instance (representation).
    Read,
    /// Members are written into an instance (construction).
    Write,
}

/// Enumerates the exposed members of a type.
pub trait TypeInspector: Send + Sync {
    fn members(&self, ty: &TypeDescriptor, access: Access) -> Result<Vec<MemberDescriptor>, Error>;
}

/// Resolved, deduplicated members of one type.
#[derive(Debug, Default)]
pub struct MemberSet {
    members: Vec<MemberDescriptor>,
    index: AHashMap<String, usize>,
}

impl MemberSet {
    /// Build a set; later members with an already used name are dropped.
    pub fn new(members: Vec<MemberDescriptor>) -> Self {
        let mut index = AHashMap::with_capacity(members.len());
        let mut kept = Vec::with_capacity(members.len());
        for member in members {
            if index.contains_key(&member.name) {
                continue;
            }
            index.insert(member.name.clone(), kept.len());
            kept.push(member);
        }
        Self {
            members: kept,
            index,
        }
    }

    pub fn get(&self, name: &str) -> Option<&MemberDescriptor> {
        self.index.get(name).map(|&i| &self.members[i])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MemberDescriptor> {
        self.members.iter()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Final stage of member resolution, as consumed by the constructors and the representer.
pub trait MemberResolver {
    fn member_set(&self, ty: &TypeDescriptor, access: Access) -> Result<Arc<MemberSet>, Error>;
}

/// Enumerates the members declared on the descriptor, filtered by capability.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReflectionInspector;

impl TypeInspector for ReflectionInspector {
    fn members(&self, ty: &TypeDescriptor, access: Access) -> Result<Vec<MemberDescriptor>, Error> {
        let Some(shape) = ty.object_shape() else {
            return Ok(Vec::new());
        };
        Ok(shape
            .members
            .iter()
            .filter(|m| match access {
                Access::Read => m.can_read,
                Access::Write => m.can_write,
            })
            .cloned()
            .collect())
    }
}

/// Ahead-of-time member tables keyed by type name, replacing descriptor enumeration.
#[derive(Clone, Debug, Default)]
pub struct StaticTypeInspector {
    tables: AHashMap<String, Vec<MemberDescriptor>>,
}

impl StaticTypeInspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_members(mut self, type_name: impl Into<String>, members: Vec<MemberDescriptor>) -> Self {
        self.tables.insert(type_name.into(), members);
        self
    }
}

impl TypeInspector for StaticTypeInspector {
    fn members(&self, ty: &TypeDescriptor, access: Access) -> Result<Vec<MemberDescriptor>, Error> {
        let Some(members) = self.tables.get(&ty.name) else {
            if ty.object_shape().is_none() {
                return Ok(Vec::new());
            }
            return Err(Error::configuration(format!(
                "no static member table for type `{}`",
                ty.name
            )));
        };
        Ok(members
            .iter()
            .filter(|m| match access {
                Access::Read => m.can_read,
                Access::Write => m.can_write,
            })
            .cloned()
            .collect())
    }
}

/// Drop ignored members, expose aliases and sort by order. Idempotent.
fn apply_annotations(members: Vec<MemberDescriptor>) -> Vec<MemberDescriptor> {
    let mut out: Vec<MemberDescriptor> = members
        .into_iter()
        .filter(|m| !m.annotations.ignore)
        .map(|mut m| {
            if let Some(alias) = &m.annotations.alias {
                m.name = alias.clone();
            }
            m
        })
        .collect();
    out.sort_by_key(|m| m.annotations.order.unwrap_or(0));
    out
}

/// Applies the declarative annotations carried by the member descriptors.
pub struct AnnotationsInspector {
    inner: Box<dyn TypeInspector>,
}

impl AnnotationsInspector {
    pub fn new(inner: Box<dyn TypeInspector>) -> Self {
        Self { inner }
    }
}

impl TypeInspector for AnnotationsInspector {
    fn members(&self, ty: &TypeDescriptor, access: Access) -> Result<Vec<MemberDescriptor>, Error> {
        Ok(apply_annotations(self.inner.members(ty, access)?))
    }
}

type AnnotationPatch = Arc<dyn Fn(&mut MemberAnnotations) + Send + Sync>;

/// Annotations supplied by the caller for types it does not own, keyed by type name and
/// field name.
#[derive(Clone, Default)]
pub struct AttributeOverrides {
    patches: AHashMap<(String, String), Vec<AnnotationPatch>>,
}

impl fmt::Debug for AttributeOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.patches.keys()).finish()
    }
}

impl AttributeOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Patch the annotations of `field` on `type_name`. Patches apply in insertion order.
    pub fn add<F>(&mut self, type_name: impl Into<String>, field: impl Into<String>, patch: F)
    where
        F: Fn(&mut MemberAnnotations) + Send + Sync + 'static,
    {
        self.patches
            .entry((type_name.into(), field.into()))
            .or_default()
            .push(Arc::new(patch));
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    fn patch(&self, type_name: &str, member: &mut MemberDescriptor) -> bool {
        let key = (type_name.to_owned(), member.field.clone());
        let Some(patches) = self.patches.get(&key) else {
            return false;
        };
        for patch in patches {
            patch(&mut member.annotations);
        }
        true
    }
}

/// Applies [`AttributeOverrides`] on top of the annotated members.
pub struct OverridesInspector {
    inner: Box<dyn TypeInspector>,
    overrides: Arc<AttributeOverrides>,
}

impl OverridesInspector {
    pub fn new(inner: Box<dyn TypeInspector>, overrides: Arc<AttributeOverrides>) -> Self {
        Self { inner, overrides }
    }
}

impl TypeInspector for OverridesInspector {
    fn members(&self, ty: &TypeDescriptor, access: Access) -> Result<Vec<MemberDescriptor>, Error> {
        let mut members = self.inner.members(ty, access)?;
        let mut patched = false;
        for member in &mut members {
            patched |= self.overrides.patch(&ty.name, member);
        }
        if !patched {
            return Ok(members);
        }
        Ok(apply_annotations(members))
    }
}

/// Renames members through a naming convention, keeping the first of any names that
/// collide afterwards. Explicit aliases and opted-out members keep their names.
pub struct NamingConventionInspector {
    inner: Box<dyn TypeInspector>,
    convention: Arc<dyn NamingConvention>,
}

impl NamingConventionInspector {
    pub fn new(inner: Box<dyn TypeInspector>, convention: Arc<dyn NamingConvention>) -> Self {
        Self { inner, convention }
    }
}

impl TypeInspector for NamingConventionInspector {
    fn members(&self, ty: &TypeDescriptor, access: Access) -> Result<Vec<MemberDescriptor>, Error> {
        let mut members = self.inner.members(ty, access)?;
        for member in &mut members {
            if member.annotations.alias.is_none() && member.annotations.apply_naming_convention {
                member.name = self.convention.apply(&member.name);
            }
        }
        let mut seen = ahash::AHashSet::with_capacity(members.len());
        members.retain(|m| seen.insert(m.name.clone()));
        Ok(members)
    }
}

/// Caches resolved member sets per type name, member shape and access direction.
pub struct CachedTypeInspector<L: LockStrategy> {
    inner: Box<dyn TypeInspector>,
    cache: Cache<(String, u64, Access), Arc<MemberSet>, L>,
}

/// Hash of what member resolution reads from an object type. Two descriptors with
/// the same name but different members get different cache entries.
fn shape_fingerprint(ty: &TypeDescriptor) -> u64 {
    let mut hasher = AHasher::default();
    if let TypeKind::Object(shape) = &ty.kind {
        for m in &shape.members {
            (&m.name, &m.field, &m.ty.name, m.can_read, m.can_write).hash(&mut hasher);
            let a = &m.annotations;
            (&a.alias, a.ignore, a.required, a.order, a.apply_naming_convention).hash(&mut hasher);
            m.setter.is_some().hash(&mut hasher);
        }
        if let Some(ctor) = &shape.constructor {
            for p in &ctor.params {
                (&p.name, &p.ty.name, p.required).hash(&mut hasher);
            }
        }
    }
    hasher.finish()
}

impl<L: LockStrategy> CachedTypeInspector<L> {
    pub fn new(inner: Box<dyn TypeInspector>) -> Self {
        Self {
            inner,
            cache: Cache::new(),
        }
    }

    /// Number of cached member sets.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

impl<L: LockStrategy> MemberResolver for CachedTypeInspector<L> {
    fn member_set(&self, ty: &TypeDescriptor, access: Access) -> Result<Arc<MemberSet>, Error> {
        self.cache
            .get_or_try_insert_with(&(ty.name.clone(), shape_fingerprint(ty), access), || {
                trace!(type_name = %ty.name, ?access, "resolving members");
                Ok(Arc::new(MemberSet::new(self.inner.members(ty, access)?)))
            })
    }
}

impl<L: LockStrategy> TypeInspector for CachedTypeInspector<L>
where
    CachedTypeInspector<L>: Send + Sync,
{
    fn members(&self, ty: &TypeDescriptor, access: Access) -> Result<Vec<MemberDescriptor>, Error> {
        Ok(self.member_set(ty, access)?.iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::cache::Local;
    use crate::types::descriptor::TypeDescriptor;
    use crate::types::naming::{CamelCase, Underscored};

    fn person() -> crate::types::descriptor::TypeRef {
        TypeDescriptor::object("Person")
            .member(MemberDescriptor::new("last_name", TypeDescriptor::string()).order(2))
            .member(MemberDescriptor::new("first_name", TypeDescriptor::string()).order(1))
            .member(MemberDescriptor::new("secret", TypeDescriptor::string()).ignore())
            .member(MemberDescriptor::new("computed", TypeDescriptor::i32()).read_only())
            .member(MemberDescriptor::new("id", TypeDescriptor::i64()).rename("ID").order(0))
            .build()
    }

    fn names(members: &[MemberDescriptor]) -> Vec<&str> {
        members.iter().map(|m| m.name.as_str()).collect()
    }

    #[test]
    fn reflection_filters_by_capability() {
        let ty = person();
        let write = ReflectionInspector.members(&ty, Access::Write).unwrap();
        assert!(!names(&write).contains(&"computed"));
        let read = ReflectionInspector.members(&ty, Access::Read).unwrap();
        assert!(names(&read).contains(&"computed"));
    }

    #[test]
    fn annotations_then_naming() {
        let ty = person();
        let chain = NamingConventionInspector::new(
            Box::new(AnnotationsInspector::new(Box::new(ReflectionInspector))),
            Arc::new(CamelCase),
        );
        let members = chain.members(&ty, Access::Write).unwrap();
        assert_eq!(names(&members), vec!["ID", "firstName", "lastName"]);
    }

    #[test]
    fn overrides_rename_and_hide() {
        let ty = person();
        let mut overrides = AttributeOverrides::new();
        overrides.add("Person", "first_name", |a| a.alias = Some("given".into()));
        overrides.add("Person", "last_name", |a| a.ignore = true);
        let chain = OverridesInspector::new(
            Box::new(AnnotationsInspector::new(Box::new(ReflectionInspector))),
            Arc::new(overrides),
        );
        let members = chain.members(&ty, Access::Write).unwrap();
        assert_eq!(names(&members), vec!["ID", "given"]);
    }

    #[test]
    fn naming_collisions_keep_first() {
        let ty = TypeDescriptor::object("Clash")
            .field("userName", TypeDescriptor::string())
            .field("user_name", TypeDescriptor::string())
            .build();
        let chain = NamingConventionInspector::new(Box::new(ReflectionInspector), Arc::new(Underscored));
        let members = chain.members(&ty, Access::Write).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].field, "userName");
    }

    #[test]
    fn cached_sets_offer_lookup() {
        let ty = person();
        let cached: CachedTypeInspector<Local> =
            CachedTypeInspector::new(Box::new(AnnotationsInspector::new(Box::new(ReflectionInspector))));
        let first = cached.member_set(&ty, Access::Write).unwrap();
        let second = cached.member_set(&ty, Access::Write).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.get("ID").map(|m| m.field.as_str()), Some("id"));
        assert!(first.get("id").is_none());
        cached.member_set(&ty, Access::Read).unwrap();
        assert_eq!(cached.cached(), 2);
    }

    #[test]
    fn same_named_types_with_other_members_are_cached_apart() {
        let cached: CachedTypeInspector<Local> =
            CachedTypeInspector::new(Box::new(AnnotationsInspector::new(Box::new(ReflectionInspector))));
        let v1 = TypeDescriptor::object("Settings").field("port", TypeDescriptor::u64()).build();
        let v2 = TypeDescriptor::object("Settings").field("host", TypeDescriptor::string()).build();
        let first = cached.member_set(&v1, Access::Write).unwrap();
        let second = cached.member_set(&v2, Access::Write).unwrap();
        assert!(first.get("port").is_some());
        assert!(second.get("host").is_some());
        assert!(second.get("port").is_none());
        assert_eq!(cached.cached(), 2);

        let again = TypeDescriptor::object("Settings").field("port", TypeDescriptor::u64()).build();
        assert!(Arc::ptr_eq(&first, &cached.member_set(&again, Access::Write).unwrap()));
    }

    #[test]
    fn static_tables_replace_reflection() {
        let ty = person();
        let table = StaticTypeInspector::new().with_members(
            "Person",
            vec![MemberDescriptor::new("nick", TypeDescriptor::string())],
        );
        let members = table.members(&ty, Access::Write).unwrap();
        assert_eq!(names(&members), vec!["nick"]);
        let other = TypeDescriptor::object("Other").build();
        assert!(table.members(&other, Access::Write).is_err());
        assert!(table.members(&TypeDescriptor::i32(), Access::Write).unwrap().is_empty());
    }
}
