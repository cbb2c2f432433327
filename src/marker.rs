//! Marker grammar: structural tokens carried by schema keys and type values.
//!
//! Keys and values are never rejected here. Whatever the grammar does not
//! define is cut off and reported through the `ignored` fields so callers can
//! raise a diagnostic.

/// Characters that open a special key (`#options`, `$indexes`) or a relation.
const LEADING: [char; 4] = ['>', '<', '#', '$'];

/// Marker characters that may not survive inside a resolved name.
const MARKERS: [char; 7] = ['!', '~', '^', '#', '$', '>', '<'];

/// Strip every marker from a raw key and return the bare identifier.
///
/// `strip(strip(x)) == strip(x)` for any input.
pub fn strip(raw: &str) -> String {
    split_name(raw).0
}

/// Like [`strip`], also returning the portion that was cut off because it
/// contained characters the grammar does not define at that position.
pub fn split_name(raw: &str) -> (String, Option<String>) {
    let head = raw.split(['=', '@']).next().unwrap_or_default();
    let head: String = head.chars().filter(|&c| c != '*').collect();
    let head = head.trim_start_matches(|c: char| c.is_whitespace() || LEADING.contains(&c));

    match head.find(|c: char| MARKERS.contains(&c)) {
        Some(end) => (
            head[..end].trim_end().to_string(),
            Some(head[end..].to_string()),
        ),
        None => (head.trim_end().to_string(), None),
    }
}

/// `#name` keys hold an option bag merged into the enclosing table.
pub fn is_options_key(raw: &str) -> bool {
    raw.trim_start().starts_with('#')
}

/// `$name` keys hold a list of index definitions.
pub fn is_indexes_key(raw: &str) -> bool {
    raw.trim_start().starts_with('$')
}

/// A field key: `*id` is the primary key named `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldKey {
    pub name: String,
    pub primary_key: bool,
    pub ignored: Option<String>,
}

impl FieldKey {
    pub fn parse(raw: &str) -> Self {
        let (name, ignored) = split_name(raw);
        Self {
            name,
            primary_key: raw.trim_start().starts_with('*'),
            ignored,
        }
    }
}

/// A type value such as `string^255!~`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeToken {
    pub name: String,
    pub args: Vec<String>,
    pub not_null: bool,
    pub unique: bool,
}

impl TypeToken {
    pub fn parse(raw: &str) -> Self {
        let not_null = raw.contains('!');
        let unique = raw.contains('~');
        let cleaned: String = raw.chars().filter(|&c| c != '!' && c != '~').collect();

        let mut parts = cleaned.split('^');
        let name = parts.next().unwrap_or_default().trim().to_string();
        let args = parts
            .next()
            .map(|args| {
                args.split(',')
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name,
            args,
            not_null,
            unique,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IndexMethod {
    Btree,
    Hash,
}

/// One entry of a `$indexes` list: `name` (BTREE) or `#name` (HASH).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub field: String,
    pub method: IndexMethod,
}

impl IndexEntry {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.strip_prefix('#') {
            Some(field) => Self {
                field: field.trim().to_string(),
                method: IndexMethod::Hash,
            },
            None => Self {
                field: raw.to_string(),
                method: IndexMethod::Btree,
            },
        }
    }
}

/// Direction of a one-to-many relation key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `>name`: the enclosing table has many `name`.
    Forward,
    /// `<name`: `name` has many of the enclosing table.
    Backward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationShape {
    OneToMany(Direction),
    /// `><name` or `<>name`.
    ManyToMany,
}

/// A relation key such as `>orgId=companyId@employer!`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationKey {
    pub raw: String,
    pub shape: RelationShape,
    /// Referenced name with every marker stripped (not yet resolved).
    pub target: String,
    pub alias: Option<String>,
    pub foreign_key: Option<String>,
    /// `!` on the alias: the foreign key may not be null.
    pub not_null: bool,
    /// `*` on the alias (or right after the arrow): the foreign key is also
    /// the primary key.
    pub primary_key: bool,
    pub ignored: Vec<String>,
}

impl RelationKey {
    /// Returns `None` when `raw` carries no relation marker.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let (shape, rest) = if let Some(rest) = trimmed
            .strip_prefix("><")
            .or_else(|| trimmed.strip_prefix("<>"))
        {
            (RelationShape::ManyToMany, rest)
        } else if let Some(rest) = trimmed.strip_prefix('>') {
            (RelationShape::OneToMany(Direction::Forward), rest)
        } else if let Some(rest) = trimmed.strip_prefix('<') {
            (RelationShape::OneToMany(Direction::Backward), rest)
        } else {
            return None;
        };

        let mut key = Self {
            raw: raw.to_string(),
            shape,
            target: String::new(),
            alias: None,
            foreign_key: None,
            not_null: false,
            primary_key: rest.starts_with('*'),
            ignored: Vec::new(),
        };

        let base_end = rest.find(['=', '@']).unwrap_or(rest.len());
        let (target, ignored) = split_name(&rest[..base_end]);
        key.target = target;
        key.ignored.extend(ignored);

        let mut remaining = &rest[base_end..];
        while let Some(marker) = remaining.chars().next() {
            let body = &remaining[marker.len_utf8()..];
            let end = body.find(['=', '@']).unwrap_or(body.len());
            let segment = &body[..end];
            remaining = &body[end..];

            match marker {
                '=' => {
                    if let Some(previous) = key.foreign_key.take() {
                        key.ignored.push(format!("={previous}"));
                    }
                    let fk = segment.trim();
                    key.foreign_key = (!fk.is_empty()).then(|| fk.to_string());
                }
                _ => {
                    if let Some(previous) = key.alias.take() {
                        key.ignored.push(format!("@{previous}"));
                    }
                    key.apply_alias(segment);
                }
            }
        }

        Some(key)
    }

    fn apply_alias(&mut self, segment: &str) {
        let name = segment.trim_end_matches(|c: char| c == '!' || c == '*' || c.is_whitespace());
        let flags = &segment[name.len()..];
        self.not_null = segment.contains('!');
        self.primary_key |= flags.contains('*');

        let name: String = name.chars().filter(|&c| c != '!').collect();
        let name = name.trim();
        self.alias = (!name.is_empty()).then(|| name.to_string());
    }

    pub fn is_many_to_many(&self) -> bool {
        self.shape == RelationShape::ManyToMany
    }
}
