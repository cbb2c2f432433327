//! Shorthand type names to canonical field types.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::codec::CodecKind;
use crate::marker::TypeToken;

/// Physical column types understood by the persistence engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TypeTag {
    String,
    Char,
    Text,
    Citext,
    TinyInt,
    SmallInt,
    MediumInt,
    Integer,
    BigInt,
    Float,
    Real,
    Double,
    Decimal,
    Boolean,
    Time,
    Date,
    DateOnly,
    Timestamp,
    Uuid,
    UuidV1,
    UuidV4,
    Json,
    Jsonb,
    Blob,
    Inet,
    Cidr,
    Macaddr,
    Enum,
    Hstore,
}

impl TypeTag {
    pub const ALL: [TypeTag; 29] = [
        Self::String,
        Self::Char,
        Self::Text,
        Self::Citext,
        Self::TinyInt,
        Self::SmallInt,
        Self::MediumInt,
        Self::Integer,
        Self::BigInt,
        Self::Float,
        Self::Real,
        Self::Double,
        Self::Decimal,
        Self::Boolean,
        Self::Time,
        Self::Date,
        Self::DateOnly,
        Self::Timestamp,
        Self::Uuid,
        Self::UuidV1,
        Self::UuidV4,
        Self::Json,
        Self::Jsonb,
        Self::Blob,
        Self::Inet,
        Self::Cidr,
        Self::Macaddr,
        Self::Enum,
        Self::Hstore,
    ];

    pub fn keyword(self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Char => "CHAR",
            Self::Text => "TEXT",
            Self::Citext => "CITEXT",
            Self::TinyInt => "TINYINT",
            Self::SmallInt => "SMALLINT",
            Self::MediumInt => "MEDIUMINT",
            Self::Integer => "INTEGER",
            Self::BigInt => "BIGINT",
            Self::Float => "FLOAT",
            Self::Real => "REAL",
            Self::Double => "DOUBLE",
            Self::Decimal => "DECIMAL",
            Self::Boolean => "BOOLEAN",
            Self::Time => "TIME",
            Self::Date => "DATE",
            Self::DateOnly => "DATEONLY",
            Self::Timestamp => "TIMESTAMP",
            Self::Uuid => "UUID",
            Self::UuidV1 => "UUIDV1",
            Self::UuidV4 => "UUIDV4",
            Self::Json => "JSON",
            Self::Jsonb => "JSONB",
            Self::Blob => "BLOB",
            Self::Inet => "INET",
            Self::Cidr => "CIDR",
            Self::Macaddr => "MACADDR",
            Self::Enum => "ENUM",
            Self::Hstore => "HSTORE",
        }
    }

    /// Case-insensitive lookup of a shorthand name.
    pub fn from_keyword(name: &str) -> Option<Self> {
        let upper = name.trim().to_uppercase();
        Self::ALL.into_iter().find(|tag| tag.keyword() == upper)
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Self::TinyInt | Self::SmallInt | Self::MediumInt | Self::Integer | Self::BigInt
        )
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A resolved field type: physical tag plus positional constructor arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeDescriptor {
    pub tag: TypeTag,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Name of the logical type this descriptor came from, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logical: Option<String>,
}

impl TypeDescriptor {
    pub fn new(tag: TypeTag) -> Self {
        Self {
            tag,
            args: Vec::new(),
            logical: None,
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.logical {
            Some(logical) => write!(f, "{}<{}>", logical.to_uppercase(), self.tag)?,
            None => write!(f, "{}", self.tag)?,
        }
        if !self.args.is_empty() {
            write!(f, "({})", self.args.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LogicalType {
    storage: TypeTag,
    codec: CodecKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedType {
    pub descriptor: TypeDescriptor,
    pub codec: Option<CodecKind>,
}

/// Resolver instance owned by one compilation. Custom logical types are
/// registered on the instance; nothing is shared between compilations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeResolver {
    logical: HashMap<String, LogicalType>,
}

impl Default for TypeResolver {
    fn default() -> Self {
        let mut resolver = Self::empty();
        resolver.register("bignumber", TypeTag::Text, CodecKind::BigNumber);
        resolver
    }
}

impl TypeResolver {
    /// A resolver with no logical types registered.
    pub fn empty() -> Self {
        Self {
            logical: HashMap::new(),
        }
    }

    /// Register a logical type stored as `storage` and converted by `codec`.
    /// Logical names shadow physical ones.
    pub fn register(&mut self, name: &str, storage: TypeTag, codec: CodecKind) {
        self.logical
            .insert(name.trim().to_lowercase(), LogicalType { storage, codec });
    }

    pub fn resolve(&self, token: &TypeToken) -> Option<ResolvedType> {
        let key = token.name.to_lowercase();
        if let Some(logical) = self.logical.get(&key) {
            return Some(ResolvedType {
                descriptor: TypeDescriptor {
                    tag: logical.storage,
                    args: token.args.clone(),
                    logical: Some(key),
                },
                codec: Some(logical.codec),
            });
        }

        let tag = TypeTag::from_keyword(&token.name)?;
        let codec = (tag == TypeTag::Timestamp).then_some(CodecKind::Timestamp);
        Some(ResolvedType {
            descriptor: TypeDescriptor {
                tag,
                args: token.args.clone(),
                logical: None,
            },
            codec,
        })
    }
}
