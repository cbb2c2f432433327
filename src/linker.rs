//! Link phase: turns deferred relation declarations into association edges
//! once every table is registered.

use tracing::debug;

use crate::ast::{AssociationEdge, AssociationKind, ThroughSide, ThroughTable};
use crate::error::{CompileError, Diagnostic};
use crate::inflect;
use crate::marker::{Direction, RelationKey, RelationShape};
use crate::registry::{AssociationRegistry, TableRegistry};
use crate::walker::RelationSpec;

/// A relation target resolved against the table registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub table: String,
    /// Matched only after dropping an `Id` suffix: the key names a foreign
    /// key held by the enclosing table.
    pub via_foreign_key: bool,
}

/// Resolve a stripped relation name to a registered table. Candidates are
/// tried in order: capitalized, singular, then both again without a
/// trailing `Id`. Plural forms come last, so a nested `>posts` table is
/// still reachable from `>post` or `>postId`.
pub fn resolve_target(tables: &TableRegistry, name: &str) -> Option<Target> {
    let base = name.strip_suffix("Id").filter(|b| !b.is_empty());
    let mut candidates = vec![
        (inflect::capitalize(name), false),
        (inflect::singularize(name), false),
    ];
    if let Some(base) = base {
        candidates.push((inflect::capitalize(base), true));
        candidates.push((inflect::singularize(base), true));
    }
    candidates.push((inflect::pluralize(name), false));
    if let Some(base) = base {
        candidates.push((inflect::pluralize(base), true));
    }

    candidates
        .into_iter()
        .find(|(candidate, _)| tables.contains(candidate))
        .map(|(table, via_foreign_key)| Target {
            table,
            via_foreign_key,
        })
}

/// Link every relation into `associations`. Nothing is written unless all
/// relations resolve.
pub fn link(
    relations: &[RelationSpec],
    tables: &TableRegistry,
    associations: &mut AssociationRegistry,
) -> Result<Vec<Diagnostic>, CompileError> {
    let mut scratch = associations.clone();
    let mut diagnostics = Vec::new();
    for relation in relations {
        link_relation(relation, tables, &mut scratch, &mut diagnostics)?;
    }
    *associations = scratch;
    Ok(diagnostics)
}

fn unresolved(tables: &TableRegistry, from: &str, to: &str, key: &RelationKey) -> CompileError {
    CompileError::UnresolvedAssociationTarget {
        from: from.to_string(),
        to: to.to_string(),
        known: tables.names(),
        alias: key.alias.clone(),
        foreign_key: key.foreign_key.clone(),
    }
}

fn link_relation(
    relation: &RelationSpec,
    tables: &TableRegistry,
    registry: &mut AssociationRegistry,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<(), CompileError> {
    let key = &relation.key;
    let Some(target) = resolve_target(tables, &key.target) else {
        return Err(unresolved(tables, &relation.parent, &inflect::capitalize(&key.target), key));
    };
    if !tables.contains(&relation.parent) {
        return Err(unresolved(tables, &target.table, &relation.parent, key));
    }

    match key.shape {
        RelationShape::ManyToMany => {
            link_many_to_many(&relation.parent, &target.table, key, registry, diagnostics);
        }
        RelationShape::OneToMany(direction) => {
            let parent_is_owner = (direction == Direction::Forward) != target.via_foreign_key;
            let (owner, member) = if parent_is_owner {
                (relation.parent.as_str(), target.table.as_str())
            } else {
                (target.table.as_str(), relation.parent.as_str())
            };
            link_one_to_many(owner, member, key, registry, diagnostics);
        }
    }
    Ok(())
}

/// `owner` has many (or one, with a primary-key mount) `member`; `member`
/// holds the foreign key.
fn link_one_to_many(
    owner: &str,
    member: &str,
    key: &RelationKey,
    registry: &mut AssociationRegistry,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let foreign_key = key
        .foreign_key
        .clone()
        .unwrap_or_else(|| inflect::foreign_key(key.alias.as_deref().unwrap_or(owner)));
    let owner_kind = if key.primary_key {
        AssociationKind::HasOne
    } else {
        AssociationKind::HasMany
    };
    debug!(%owner, %member, %foreign_key, kind = ?owner_kind, "linking one-to-many");

    let edges = [
        AssociationEdge {
            from: owner.to_string(),
            to: member.to_string(),
            kind: owner_kind,
            alias: None,
            foreign_key: foreign_key.clone(),
            other_key: None,
            allow_null_fk: !key.not_null,
            mount_as_primary_key: key.primary_key,
            through: None,
        },
        AssociationEdge {
            from: member.to_string(),
            to: owner.to_string(),
            kind: AssociationKind::BelongsTo,
            alias: key.alias.clone(),
            foreign_key,
            other_key: None,
            allow_null_fk: !key.not_null,
            mount_as_primary_key: key.primary_key,
            through: None,
        },
    ];
    diagnostics.extend(edges.into_iter().filter_map(|edge| registry.push(edge)));
}

/// Through-table name for a many-to-many link declared on `parent`.
pub fn through_name(parent: &str, target: &str, alias: Option<&str>) -> String {
    match alias {
        Some(alias) => format!("{target}@{parent}#{alias}"),
        None => format!("{target}@{parent}"),
    }
}

fn link_many_to_many(
    parent: &str,
    target: &str,
    key: &RelationKey,
    registry: &mut AssociationRegistry,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let alias = key.alias.as_deref();
    if let Some(existing) = registry.through_for(parent, target, alias) {
        debug!(%parent, %target, through = %existing.name, "many-to-many already linked");
        return;
    }

    let name = through_name(parent, target, alias);
    let parent_key = key
        .foreign_key
        .clone()
        .unwrap_or_else(|| inflect::foreign_key(parent));
    let mut target_key = inflect::foreign_key(target);
    let self_reference = parent == target;
    if self_reference || target_key == parent_key {
        target_key = format!("Related{target_key}");
    }
    debug!(%parent, %target, through = %name, "linking many-to-many");

    let forward = AssociationEdge {
        from: parent.to_string(),
        to: target.to_string(),
        kind: AssociationKind::BelongsToMany,
        alias: key.alias.clone(),
        foreign_key: parent_key.clone(),
        other_key: Some(target_key.clone()),
        allow_null_fk: false,
        mount_as_primary_key: false,
        through: Some(name.clone()),
    };
    let backward_alias = if self_reference {
        Some(format!("Related{}", inflect::capitalize(&forward.mount_name())))
    } else {
        key.alias.clone()
    };
    let backward = AssociationEdge {
        from: target.to_string(),
        to: parent.to_string(),
        kind: AssociationKind::BelongsToMany,
        alias: backward_alias,
        foreign_key: target_key.clone(),
        other_key: Some(parent_key.clone()),
        allow_null_fk: false,
        mount_as_primary_key: false,
        through: Some(name.clone()),
    };

    registry.insert_through(ThroughTable {
        name,
        alias: key.alias.clone(),
        left: ThroughSide {
            table: parent.to_string(),
            foreign_key: parent_key,
        },
        right: ThroughSide {
            table: target.to_string(),
            foreign_key: target_key,
        },
    });
    diagnostics.extend([forward, backward].into_iter().filter_map(|edge| registry.push(edge)));
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::ast::TableDefinition;
    use crate::config::{CompileOptions, Redefinition};
    use crate::types::TypeResolver;
    use crate::walker::Walker;

    fn compile(document: Value) -> Result<AssociationRegistry, CompileError> {
        let options = CompileOptions::default();
        let resolver = TypeResolver::default();
        let walked = Walker::new(&options, &resolver).walk(&document)?;
        let mut registry = AssociationRegistry::new();
        link(&walked.relations, &walked.tables, &mut registry)?;
        Ok(registry)
    }

    fn edge<'a>(registry: &'a AssociationRegistry, from: &str, to: &str) -> &'a AssociationEdge {
        registry
            .edges()
            .iter()
            .find(|e| e.from == from && e.to == to)
            .unwrap()
    }

    #[test]
    fn test_many_to_many_shares_through() {
        let registry = compile(json!({
            "Tag": { "*id": "integer", "name": "string!" },
            "Post": { "*id": "integer", "><tags": {} },
        }))
        .unwrap();

        assert_eq!(registry.edges().len(), 2);
        assert_eq!(registry.through_tables().len(), 1);
        assert_eq!(registry.through_tables()[0].name, "Tag@Post");

        let forward = edge(&registry, "Post", "Tag");
        let backward = edge(&registry, "Tag", "Post");
        assert_eq!(forward.kind, AssociationKind::BelongsToMany);
        assert_eq!(backward.kind, AssociationKind::BelongsToMany);
        assert_eq!(forward.through.as_deref(), Some("Tag@Post"));
        assert_eq!(backward.through, forward.through);
        assert_eq!(forward.foreign_key, "PostId");
        assert_eq!(forward.other_key.as_deref(), Some("TagId"));
        assert_eq!(backward.foreign_key, "TagId");
        assert!(registry.mounted("Post", "Tags").is_some());
        assert!(registry.mounted("Tag", "Posts").is_some());
    }

    #[test]
    fn test_reciprocal_many_to_many_deduplicated() {
        let registry = compile(json!({
            "Tag": { "<>posts": {} },
            "Post": { "><tags": {} },
        }))
        .unwrap();
        assert_eq!(registry.edges().len(), 2);
        assert_eq!(registry.through_tables().len(), 1);
        assert_eq!(registry.through_tables()[0].name, "Post@Tag");
    }

    #[test]
    fn test_aliased_many_to_many_is_distinct() {
        let registry = compile(json!({
            "Tag": {},
            "Post": { "><tags": {}, "><tags@labels": {} },
        }))
        .unwrap();
        assert_eq!(registry.edges().len(), 4);
        let names: Vec<_> = registry.through_tables().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Tag@Post", "Tag@Post#labels"]);
        assert!(registry.mounted("Post", "labels").is_some());
    }

    #[test]
    fn test_reference_to_foreign_key_with_alias() {
        let registry = compile(json!({
            "Org": { "*id": "integer" },
            "User": { "*id": "integer", ">orgId=companyId@employer!": {} },
        }))
        .unwrap();

        let belongs = edge(&registry, "User", "Org");
        assert_eq!(belongs.kind, AssociationKind::BelongsTo);
        assert_eq!(belongs.alias.as_deref(), Some("employer"));
        assert_eq!(belongs.foreign_key, "companyId");
        assert!(!belongs.allow_null_fk);

        let has_many = edge(&registry, "Org", "User");
        assert_eq!(has_many.kind, AssociationKind::HasMany);
        assert_eq!(has_many.foreign_key, "companyId");
        assert!(registry.mounted("User", "employer").is_some());
        assert!(registry.mounted("Org", "Users").is_some());
    }

    #[test]
    fn test_nested_child_gets_parent_key() {
        let registry = compile(json!({
            "Post": { "*id": "integer", ">comments": { "body": "text" } },
        }))
        .unwrap();
        let has_many = edge(&registry, "Post", "Comments");
        assert_eq!(has_many.kind, AssociationKind::HasMany);
        assert_eq!(has_many.foreign_key, "PostId");
        assert!(has_many.allow_null_fk);
        let belongs = edge(&registry, "Comments", "Post");
        assert_eq!(belongs.kind, AssociationKind::BelongsTo);
        assert_eq!(belongs.foreign_key, "PostId");
    }

    #[test]
    fn test_backward_and_primary_key_mount() {
        let registry = compile(json!({
            "User": { "*id": "integer" },
            "Profile": { "<user@owner*": {} },
        }))
        .unwrap();
        let has_one = edge(&registry, "User", "Profile");
        assert_eq!(has_one.kind, AssociationKind::HasOne);
        assert!(has_one.mount_as_primary_key);
        let belongs = edge(&registry, "Profile", "User");
        assert_eq!(belongs.alias.as_deref(), Some("owner"));
        assert_eq!(belongs.foreign_key, "OwnerId");
    }

    #[test]
    fn test_forward_declaration_resolves() {
        let registry = compile(json!({
            "Post": { ">userId": {} },
            "User": { "*id": "integer" },
        }))
        .unwrap();
        assert_eq!(edge(&registry, "Post", "User").kind, AssociationKind::BelongsTo);
        assert_eq!(edge(&registry, "User", "Post").kind, AssociationKind::HasMany);
    }

    #[test]
    fn test_sibling_sub_tables_resolve_later_root() {
        let registry = compile(json!({
            "Blog": {
                "Post": { ">authorId": {} },
                "Category": { "<>posts": {} },
            },
            "Author": {},
        }))
        .unwrap();
        assert_eq!(registry.edges().len(), 4);

        let belongs = edge(&registry, "Post", "Author");
        assert_eq!(belongs.kind, AssociationKind::BelongsTo);
        assert_eq!(belongs.foreign_key, "AuthorId");
        let has_many = edge(&registry, "Author", "Post");
        assert_eq!(has_many.kind, AssociationKind::HasMany);
        assert!(registry.mounted("Author", "Posts").is_some());

        assert_eq!(edge(&registry, "Category", "Post").kind, AssociationKind::BelongsToMany);
        assert_eq!(edge(&registry, "Post", "Category").kind, AssociationKind::BelongsToMany);
        assert_eq!(registry.through_tables()[0].name, "Post@Category");
        assert!(registry.edges().iter().all(|e| e.from != "Blog" && e.to != "Blog"));
    }

    #[test]
    fn test_plural_table_reached_by_foreign_key() {
        let registry = compile(json!({
            "Blog": { "*id": "integer", ">posts": { "*id": "integer", "title": "string" } },
            "Comment": { "*id": "integer", ">postId": {} },
        }))
        .unwrap();
        let belongs = edge(&registry, "Comment", "Posts");
        assert_eq!(belongs.kind, AssociationKind::BelongsTo);
        assert_eq!(belongs.foreign_key, "PostId");
        assert_eq!(edge(&registry, "Posts", "Comment").kind, AssociationKind::HasMany);

        let mut tables = TableRegistry::new();
        tables
            .register(TableDefinition::new("Posts"), Redefinition::Reject)
            .unwrap();
        assert_eq!(
            resolve_target(&tables, "post"),
            Some(Target { table: "Posts".to_string(), via_foreign_key: false })
        );
        assert_eq!(resolve_target(&tables, "comment"), None);
    }

    #[test]
    fn test_example_author_key_needs_author_table() {
        let err = compile(json!({
            "User": { "*id": "integer", "name": "string^255!" },
            "Post": { "*id": "integer", "title": "string!", ">authorId=writerId@author": {} },
        }))
        .unwrap_err();
        assert!(matches!(err, CompileError::UnresolvedAssociationTarget { ref to, .. } if to == "AuthorId"));

        let registry = compile(json!({
            "User": { "*id": "integer", "name": "string^255!" },
            "Post": { "*id": "integer", "title": "string!", ">userId=writerId@author": {} },
        }))
        .unwrap();
        let belongs = edge(&registry, "Post", "User");
        assert_eq!(belongs.alias.as_deref(), Some("author"));
        assert_eq!(belongs.foreign_key, "writerId");
        assert_eq!(edge(&registry, "User", "Post").kind, AssociationKind::HasMany);
    }

    #[test]
    fn test_unresolved_target_leaves_registry_untouched() {
        let options = CompileOptions::default();
        let resolver = TypeResolver::default();
        let walked = Walker::new(&options, &resolver)
            .walk(&json!({
                "Tag": {},
                "Post": { "><tags": {}, ">ghosts": {} },
            }))
            .unwrap();
        let mut registry = AssociationRegistry::new();
        let err = link(&walked.relations, &walked.tables, &mut registry).unwrap_err();
        match err {
            CompileError::UnresolvedAssociationTarget { from, to, known, .. } => {
                assert_eq!(from, "Post");
                assert_eq!(to, "Ghosts");
                assert_eq!(known, vec!["Tag", "Post"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(registry.edges().is_empty());
        assert!(registry.through_tables().is_empty());
    }

    #[test]
    fn test_self_reference() {
        let registry = compile(json!({
            "User": { "*id": "integer", "><users@friends": {}, ">user@manager": {} },
        }))
        .unwrap();
        let through = &registry.through_tables()[0];
        assert_eq!(through.name, "User@User#friends");
        assert_eq!(through.left.foreign_key, "UserId");
        assert_eq!(through.right.foreign_key, "RelatedUserId");
        assert!(registry.mounted("User", "friends").is_some());
        assert!(registry.mounted("User", "RelatedFriends").is_some());
        assert!(registry.mounted("User", "manager").is_some());
        assert!(registry.mounted("User", "Users").is_some());
    }

    #[test]
    fn test_through_name_is_pure() {
        assert_eq!(through_name("Post", "Tag", None), "Tag@Post");
        assert_eq!(through_name("Post", "Tag", Some("labels")), "Tag@Post#labels");
        assert_eq!(through_name("Post", "Tag", None), through_name("Post", "Tag", None));
    }
}
