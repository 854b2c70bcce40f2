use crate::{
    err,
    error::ErrorTree,
    manager::DataManager,
    types::{Cardinality, MemberRole, MemberShape, Primitive, TypeKey},
};
use serde::Serialize;
use std::{collections::BTreeMap, sync::Arc};

///
/// MemberDescriptor
/// One declared field/property of a storable type.
///

#[derive(Clone, Copy, Debug, Serialize)]
pub struct MemberDescriptor {
    pub ident: &'static str,
    pub shape: MemberShape,
    pub cardinality: Cardinality,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<MemberRole>,

    /// Collections marked direct-link are stored as a linking column on the
    /// owning table instead of a junction table.
    pub direct_link: bool,
}

impl MemberDescriptor {
    #[must_use]
    pub const fn new(ident: &'static str, shape: MemberShape) -> Self {
        Self {
            ident,
            shape,
            cardinality: Cardinality::One,
            role: None,
            direct_link: false,
        }
    }

    #[must_use]
    pub const fn primitive(ident: &'static str, primitive: Primitive) -> Self {
        Self::new(ident, MemberShape::Primitive(primitive))
    }

    #[must_use]
    pub const fn reference(ident: &'static str, target: TypeKey) -> Self {
        Self::new(ident, MemberShape::Reference(target))
    }

    #[must_use]
    pub const fn collection(ident: &'static str, target: TypeKey) -> Self {
        let mut member = Self::new(ident, MemberShape::Reference(target));
        member.cardinality = Cardinality::Many;
        member
    }

    #[must_use]
    pub const fn dictionary(ident: &'static str, key: Primitive, value: TypeKey) -> Self {
        let mut member = Self::new(ident, MemberShape::Dictionary { key, value });
        member.cardinality = Cardinality::Many;
        member
    }

    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.cardinality = Cardinality::Opt;
        self
    }

    #[must_use]
    pub const fn with_role(mut self, role: MemberRole) -> Self {
        self.role = Some(role);
        self
    }

    #[must_use]
    pub const fn direct_link(mut self) -> Self {
        self.direct_link = true;
        self
    }
}

///
/// TypeDescriptor
///
/// Normalized registration input for one storable type. This is the explicit
/// replacement for a reflection scan: the application (or a derive layer)
/// registers one descriptor per type, and the graph builder consumes only
/// this static shape.
///

#[derive(Clone, Debug)]
pub struct TypeDescriptor {
    pub ident: TypeKey,
    pub is_interface: bool,
    pub is_abstract: bool,
    pub is_generic: bool,
    pub force_inherit: bool,

    /// Declared base type, if any.
    pub base: Option<TypeKey>,
    /// Directly implemented interfaces, declaration order.
    pub interfaces: Vec<TypeKey>,
    /// Declared constraints on the first generic parameter.
    pub constraints: Vec<TypeKey>,
    /// Declared members, declaration order.
    pub members: Vec<MemberDescriptor>,
}

impl TypeDescriptor {
    fn empty(ident: TypeKey) -> Self {
        Self {
            ident,
            is_interface: false,
            is_abstract: false,
            is_generic: false,
            force_inherit: false,
            base: None,
            interfaces: Vec::new(),
            constraints: Vec::new(),
            members: Vec::new(),
        }
    }

    /// A concrete storable class.
    #[must_use]
    pub fn class(ident: TypeKey) -> Self {
        Self::empty(ident)
    }

    /// A storable interface.
    #[must_use]
    pub fn interface(ident: TypeKey) -> Self {
        Self {
            is_interface: true,
            is_abstract: true,
            ..Self::empty(ident)
        }
    }

    /// An abstract generic base class (keyed by its generic definition).
    #[must_use]
    pub fn generic_abstract(ident: TypeKey) -> Self {
        Self {
            is_abstract: true,
            is_generic: true,
            ..Self::empty(ident)
        }
    }

    /// A generic class that is not abstract. Always a build error; exists so
    /// the shape violation can be expressed and tested.
    #[must_use]
    pub fn generic_concrete(ident: TypeKey) -> Self {
        Self {
            is_generic: true,
            ..Self::empty(ident)
        }
    }

    /// An abstract non-generic class. Always rejected as a parent; exists so
    /// the shape violation can be expressed and tested.
    #[must_use]
    pub fn abstract_class(ident: TypeKey) -> Self {
        Self {
            is_abstract: true,
            ..Self::empty(ident)
        }
    }

    #[must_use]
    pub fn with_base(mut self, base: TypeKey) -> Self {
        self.base = Some(base);
        self
    }

    #[must_use]
    pub fn implements(mut self, interface: TypeKey) -> Self {
        self.interfaces.push(interface);
        self
    }

    #[must_use]
    pub fn constrained_by(mut self, constraint: TypeKey) -> Self {
        self.constraints.push(constraint);
        self
    }

    #[must_use]
    pub fn force_inherit(mut self) -> Self {
        self.force_inherit = true;
        self
    }

    #[must_use]
    pub fn with_member(mut self, member: MemberDescriptor) -> Self {
        self.members.push(member);
        self
    }
}

///
/// Registry
///
/// Explicit registration surface replacing the original's assembly scan.
/// Built once at start-up, consumed whole by the build pipeline.
///

#[derive(Clone, Default)]
pub struct Registry {
    types: BTreeMap<TypeKey, TypeDescriptor>,
    /// Registration order, used for deterministic analysis order.
    type_order: Vec<TypeKey>,
    managers: Vec<Arc<dyn DataManager>>,
    duplicates: Vec<TypeKey>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_type(&mut self, descriptor: TypeDescriptor) -> &mut Self {
        let ident = descriptor.ident;
        if self.types.insert(ident, descriptor).is_some() {
            self.duplicates.push(ident);
        } else {
            self.type_order.push(ident);
        }
        self
    }

    pub fn register_manager(&mut self, manager: Arc<dyn DataManager>) -> &mut Self {
        self.managers.push(manager);
        self
    }

    #[must_use]
    pub fn get(&self, key: TypeKey) -> Option<&TypeDescriptor> {
        self.types.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: TypeKey) -> bool {
        self.types.contains_key(key)
    }

    /// Registered type keys, registration order.
    #[must_use]
    pub fn type_keys(&self) -> &[TypeKey] {
        &self.type_order
    }

    #[must_use]
    pub fn managers(&self) -> &[Arc<dyn DataManager>] {
        &self.managers
    }

    /// Check registration-level consistency before the graph build starts.
    /// Collects every problem instead of failing on the first.
    pub fn validate(&self) -> Result<(), ErrorTree> {
        let mut errs = ErrorTree::new();

        for ident in &self.duplicates {
            err!(errs, "type '{}' registered more than once", ident);
        }

        let mut claims = BTreeMap::<TypeKey, &'static str>::new();
        let mut names = BTreeMap::<&'static str, usize>::new();
        for manager in &self.managers {
            if let Some(existing) = claims.insert(manager.main_type(), manager.name()) {
                err!(
                    errs,
                    "managers '{}' and '{}' both claim main type '{}'",
                    existing,
                    manager.name(),
                    manager.main_type()
                );
            }
            *names.entry(manager.name()).or_insert(0) += 1;
        }
        for (name, count) in names {
            if count > 1 {
                err!(errs, "manager name '{}' registered {} times", name, count);
            }
        }

        errs.result()
    }
}
