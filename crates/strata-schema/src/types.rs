use derive_more::Display;
use serde::Serialize;
use std::fmt;

/// Canonical identifier of a storable type. Generic types are keyed by their
/// generic definition, never by an instantiation.
pub type TypeKey = &'static str;

/// The universal root marker interface every storable type reaches through
/// parent/interface/constraint edges. Seeded first, ordered first.
pub const ROOT_TYPE: TypeKey = "Storable";

///
/// Cardinality
///

#[derive(Clone, Copy, Default, Debug, Display, Eq, PartialEq, Serialize)]
pub enum Cardinality {
    #[default]
    One,
    Opt,
    Many,
}

///
/// Primitive
///
/// Column-representable scalar kinds. Anything not expressible here is a
/// storable reference and becomes a dependency edge instead of a plain column.
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, Serialize)]
#[remain::sorted]
pub enum Primitive {
    Blob,
    Bool,
    Date,
    Decimal,
    Float32,
    Float64,
    Int16,
    Int32,
    Int64,
    Text,
    Timestamp,
}

///
/// DependencyTag
///
/// Reason a type needs another type to exist first.
///

#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum DependencyTag {
    /// Base-type edge (interface base or generic abstract base).
    Parent,
    /// Generic-parameter interface constraint.
    Constraint,
    /// Directly implemented interface.
    Interface,
    /// Declared by a manager's manual dependency list.
    Manual,
    /// Member of this name references the target type.
    Member(&'static str),
}

impl fmt::Display for DependencyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parent => write!(f, "parent"),
            Self::Constraint => write!(f, "constraint"),
            Self::Interface => write!(f, "interface"),
            Self::Manual => write!(f, "manual"),
            Self::Member(name) => write!(f, "member({name})"),
        }
    }
}

///
/// MemberShape
///
/// Value shape of one declared member. Combined with [`Cardinality`]:
/// `Reference` + `Many` is a collection, `Dictionary` is always keyed-many.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum MemberShape {
    Primitive(Primitive),
    Reference(TypeKey),
    Dictionary { key: Primitive, value: TypeKey },
}

impl MemberShape {
    /// Storable target of this shape, if it references one.
    #[must_use]
    pub const fn storable_target(self) -> Option<TypeKey> {
        match self {
            Self::Primitive(_) => None,
            Self::Reference(key) | Self::Dictionary { value: key, .. } => Some(key),
        }
    }
}

///
/// MemberRole
///
/// Housekeeping roles recognized by the schema builder.
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, Serialize)]
pub enum MemberRole {
    CreatedTimestamp,
    UpdatedTimestamp,
}
