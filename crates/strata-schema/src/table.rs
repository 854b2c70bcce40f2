//! Relational schema derivation: one table per non-force-inherit pyramid
//! node, with joined-table inheritance, discriminator synthesis, and link
//! tables for collection members.

use crate::{
    DISCRIMINATOR_COLUMN, PRIMARY_KEY_COLUMN,
    config::StorageConfig,
    descriptor::MemberDescriptor,
    pyramid::Pyramid,
    trace::{BuildTraceEvent, Tracer},
    types::{Cardinality, MemberShape, Primitive, TypeKey},
};
use convert_case::{Case, Casing};
use serde::Serialize;

///
/// ColumnKind
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub enum ColumnKind {
    PrimaryKey,
    /// Records which concrete type a row represents.
    Discriminator,
    Data(Primitive),
    ForeignKey,
    /// Collection stored as a linking column on the owning table.
    DirectLink,
}

///
/// ForeignKeyRef
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ForeignKeyRef {
    pub table: String,
    pub column: String,
}

///
/// ColumnDescriptor
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub kind: ColumnKind,
    pub nullable: bool,
    pub auto_increment: bool,
    pub updatable: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKeyRef>,
}

impl ColumnDescriptor {
    fn primary_key() -> Self {
        Self {
            name: PRIMARY_KEY_COLUMN.to_string(),
            kind: ColumnKind::PrimaryKey,
            nullable: false,
            auto_increment: true,
            updatable: true,
            foreign_key: None,
        }
    }

    /// Joined-table inheritance: the primary key doubles as a foreign key to
    /// the parent table and must never be generated or rewritten locally.
    fn joined_primary_key(parent_table: &str) -> Self {
        Self {
            name: PRIMARY_KEY_COLUMN.to_string(),
            kind: ColumnKind::PrimaryKey,
            nullable: false,
            auto_increment: false,
            updatable: false,
            foreign_key: Some(ForeignKeyRef {
                table: parent_table.to_string(),
                column: PRIMARY_KEY_COLUMN.to_string(),
            }),
        }
    }

    fn discriminator() -> Self {
        Self {
            name: DISCRIMINATOR_COLUMN.to_string(),
            kind: ColumnKind::Discriminator,
            nullable: false,
            auto_increment: false,
            updatable: false,
            foreign_key: None,
        }
    }

    fn data(name: &str, primitive: Primitive, nullable: bool) -> Self {
        Self {
            name: name.to_case(Case::Snake),
            kind: ColumnKind::Data(primitive),
            nullable,
            auto_increment: false,
            updatable: true,
            foreign_key: None,
        }
    }

    fn foreign_key(name: &str, target_table: String, nullable: bool) -> Self {
        Self {
            name: name.to_case(Case::Snake),
            kind: ColumnKind::ForeignKey,
            nullable,
            auto_increment: false,
            updatable: true,
            foreign_key: Some(ForeignKeyRef {
                table: target_table,
                column: PRIMARY_KEY_COLUMN.to_string(),
            }),
        }
    }

    fn direct_link(name: &str, target_table: String) -> Self {
        Self {
            name: name.to_case(Case::Snake),
            kind: ColumnKind::DirectLink,
            nullable: true,
            auto_increment: false,
            updatable: true,
            foreign_key: Some(ForeignKeyRef {
                table: target_table,
                column: PRIMARY_KEY_COLUMN.to_string(),
            }),
        }
    }
}

///
/// LinkTableDescriptor
/// Junction table implied by a collection/dictionary member.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct LinkTableDescriptor {
    pub name: String,
    pub left: ColumnDescriptor,
    pub right: ColumnDescriptor,

    /// Dictionary key column, when the member is a keyed collection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<ColumnDescriptor>,
}

///
/// TableDescriptor
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct TableDescriptor {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_table: Option<String>,
    pub child_tables: Vec<String>,

    /// Primary key first, then discriminator (if any), then member columns.
    pub columns: Vec<ColumnDescriptor>,
    pub link_tables: Vec<LinkTableDescriptor>,
}

#[must_use]
pub(crate) fn table_name(key: TypeKey) -> String {
    key.to_case(Case::Snake)
}

/// Emit table descriptors for one pyramid, depth-first.
pub(crate) fn build_tables(
    pyramid: &Pyramid,
    config: &StorageConfig,
    tracer: Tracer<'_>,
) -> Vec<TableDescriptor> {
    let mut builder = TableBuilder {
        pyramid,
        config,
        tracer,
        tables: Vec::new(),
    };

    for &root in pyramid.roots() {
        builder.walk(root, &[], None, false);
    }

    builder.tables
}

///
/// TableBuilder
///

struct TableBuilder<'a> {
    pyramid: &'a Pyramid,
    config: &'a StorageConfig,
    tracer: Tracer<'a>,
    tables: Vec<TableDescriptor>,
}

impl TableBuilder<'_> {
    fn walk(
        &mut self,
        node_index: usize,
        inherited: &[MemberDescriptor],
        parent_table: Option<usize>,
        discriminator_done: bool,
    ) {
        let node = self.pyramid.node(node_index);

        // force-inherit nodes never materialize; their members thread down
        // to the nearest non-force-inherit descendants
        if node.force_inherit {
            let mut merged = inherited.to_vec();
            merged.extend(node.members.iter().copied());
            for &child in &node.children {
                self.walk(child, &merged, parent_table, discriminator_done);
            }
            return;
        }

        let name = table_name(node.ident);
        let mut columns = Vec::new();

        match parent_table {
            Some(parent) => {
                columns.push(ColumnDescriptor::joined_primary_key(
                    &self.tables[parent].name,
                ));
            }
            None => columns.push(ColumnDescriptor::primary_key()),
        }

        let needs_discriminator = !discriminator_done && self.concrete_count(node_index) > 1;
        if needs_discriminator {
            columns.push(ColumnDescriptor::discriminator());
        }

        // flattened members first, own members after; flattened timestamp
        // members always end up last when the storage tracks them
        let mut link_tables = Vec::new();
        let (flattened, stamps) = self.split_timestamps(inherited);

        for member in flattened
            .iter()
            .chain(node.members.iter())
            .chain(stamps.iter())
        {
            self.push_member(&name, member, &mut columns, &mut link_tables);
        }

        let table_index = self.tables.len();
        self.tables.push(TableDescriptor {
            name: name.clone(),
            parent_table: parent_table.map(|parent| self.tables[parent].name.clone()),
            child_tables: Vec::new(),
            columns,
            link_tables,
        });
        if let Some(parent) = parent_table {
            self.tables[parent].child_tables.push(name.clone());
        }

        self.tracer.emit(BuildTraceEvent::TableEmitted {
            name,
            columns: self.tables[table_index].columns.len(),
        });

        for &child in &node.children {
            self.walk(
                child,
                &[],
                Some(table_index),
                discriminator_done || needs_discriminator,
            );
        }
    }

    /// Number of concrete types in a subtree. More than one means this node
    /// roots a real class hierarchy.
    fn concrete_count(&self, node_index: usize) -> usize {
        let node = self.pyramid.node(node_index);
        let own = usize::from(!node.is_abstract && !node.force_inherit);
        own + node
            .children
            .iter()
            .map(|&child| self.concrete_count(child))
            .sum::<usize>()
    }

    /// Partition flattened members into ordinary members and trailing
    /// created/updated timestamps.
    fn split_timestamps(
        &self,
        inherited: &[MemberDescriptor],
    ) -> (Vec<MemberDescriptor>, Vec<MemberDescriptor>) {
        if !self.config.track_timestamps {
            return (inherited.to_vec(), Vec::new());
        }

        inherited
            .iter()
            .copied()
            .partition(|member| member.role.is_none())
    }

    fn push_member(
        &self,
        table: &str,
        member: &MemberDescriptor,
        columns: &mut Vec<ColumnDescriptor>,
        link_tables: &mut Vec<LinkTableDescriptor>,
    ) {
        let nullable = member.cardinality == Cardinality::Opt;

        match member.shape {
            MemberShape::Primitive(primitive) => {
                columns.push(ColumnDescriptor::data(member.ident, primitive, nullable));
            }
            MemberShape::Reference(target) => {
                if member.cardinality == Cardinality::Many {
                    if member.direct_link {
                        columns.push(ColumnDescriptor::direct_link(
                            member.ident,
                            table_name(target),
                        ));
                    } else {
                        link_tables.push(self.link_table(table, target, None));
                    }
                } else {
                    columns.push(ColumnDescriptor::foreign_key(
                        member.ident,
                        table_name(target),
                        nullable,
                    ));
                }
            }
            MemberShape::Dictionary { key, value } => {
                link_tables.push(self.link_table(table, value, Some(key)));
            }
        }
    }

    /// Junction table named from both participating tables and their primary
    /// key column names.
    fn link_table(
        &self,
        table: &str,
        target: TypeKey,
        dictionary_key: Option<Primitive>,
    ) -> LinkTableDescriptor {
        let target_table = table_name(target);
        let left_column = format!("{table}_{PRIMARY_KEY_COLUMN}");
        let right_column = format!("{target_table}_{PRIMARY_KEY_COLUMN}");

        LinkTableDescriptor {
            name: format!("{left_column}_{right_column}"),
            left: ColumnDescriptor::foreign_key(&left_column, table.to_string(), false),
            right: ColumnDescriptor::foreign_key(&right_column, target_table, false),
            key: dictionary_key.map(|primitive| ColumnDescriptor::data("key", primitive, false)),
        }
    }
}
