//! Iceberg schema model.
//!
//! Types serialize the way the Iceberg table spec does: primitives as plain
//! strings (`"long"`, `"timestamptz"`, `"decimal(10, 2)"`), nested types as
//! objects tagged with `"type"`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{IcebergError, IcebergResult};

/// Maximum decimal precision supported by Iceberg.
pub const MAX_DECIMAL_PRECISION: u32 = 38;

/// Iceberg primitive types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PrimitiveType {
    /// Boolean type.
    Boolean,
    /// 32-bit signed integer.
    Int,
    /// 64-bit signed integer.
    Long,
    /// 32-bit IEEE 754 floating point.
    Float,
    /// 64-bit IEEE 754 floating point.
    Double,
    /// Fixed-point decimal.
    Decimal {
        /// Total number of digits.
        precision: u32,
        /// Number of fractional digits.
        scale: u32,
    },
    /// Calendar date without time.
    Date,
    /// Time of day without date.
    Time,
    /// Timestamp without timezone.
    Timestamp,
    /// Timestamp with timezone.
    Timestamptz,
    /// Arbitrary-length character sequences.
    String,
    /// Universally unique identifier.
    Uuid,
    /// Fixed-length byte array.
    Fixed(u64),
    /// Arbitrary-length byte array.
    Binary,
}

impl PrimitiveType {
    /// Creates a decimal type, validating precision and scale.
    ///
    /// # Errors
    ///
    /// Returns [`IcebergError::InvalidArgument`] if precision is outside
    /// `1..=38` or scale exceeds precision.
    pub fn decimal(precision: u32, scale: u32) -> IcebergResult<Self> {
        if precision == 0 || precision > MAX_DECIMAL_PRECISION {
            return Err(IcebergError::invalid_argument(format!(
                "decimal precision {precision} must be between 1 and {MAX_DECIMAL_PRECISION}"
            )));
        }
        if scale > precision {
            return Err(IcebergError::invalid_argument(format!(
                "decimal scale {scale} cannot exceed precision {precision}"
            )));
        }
        Ok(Self::Decimal { precision, scale })
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean => f.write_str("boolean"),
            Self::Int => f.write_str("int"),
            Self::Long => f.write_str("long"),
            Self::Float => f.write_str("float"),
            Self::Double => f.write_str("double"),
            Self::Decimal { precision, scale } => write!(f, "decimal({precision}, {scale})"),
            Self::Date => f.write_str("date"),
            Self::Time => f.write_str("time"),
            Self::Timestamp => f.write_str("timestamp"),
            Self::Timestamptz => f.write_str("timestamptz"),
            Self::String => f.write_str("string"),
            Self::Uuid => f.write_str("uuid"),
            Self::Fixed(len) => write!(f, "fixed[{len}]"),
            Self::Binary => f.write_str("binary"),
        }
    }
}

/// Parses the Iceberg JSON spelling of a primitive type.
impl FromStr for PrimitiveType {
    type Err = IcebergError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unsupported =
            || IcebergError::invalid_argument(format!("unsupported Iceberg type: {s}"));
        let value = s.trim();
        if value.starts_with("decimal") {
            let (precision, scale) = parse_decimal_args(value).ok_or_else(unsupported)?;
            return Self::decimal(precision, scale);
        }
        if let Some(len) = value
            .strip_prefix("fixed[")
            .and_then(|rest| rest.strip_suffix(']'))
        {
            return len.trim().parse().map(Self::Fixed).map_err(|_| unsupported());
        }
        match value {
            "boolean" => Ok(Self::Boolean),
            "int" => Ok(Self::Int),
            "long" => Ok(Self::Long),
            "float" => Ok(Self::Float),
            "double" => Ok(Self::Double),
            "date" => Ok(Self::Date),
            "time" => Ok(Self::Time),
            "timestamp" => Ok(Self::Timestamp),
            "timestamptz" => Ok(Self::Timestamptz),
            "string" => Ok(Self::String),
            "uuid" => Ok(Self::Uuid),
            "binary" => Ok(Self::Binary),
            _ => Err(unsupported()),
        }
    }
}

impl TryFrom<String> for PrimitiveType {
    type Error = IcebergError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PrimitiveType> for String {
    fn from(value: PrimitiveType) -> Self {
        value.to_string()
    }
}

/// Parses `decimal(<precision>,<scale>)` into its integer pair.
///
/// Whitespace around either integer is allowed; anything else (a missing
/// scale, trailing text, non-integers) yields `None`.
pub(crate) fn parse_decimal_args(spec: &str) -> Option<(u32, u32)> {
    let inner = spec
        .strip_prefix("decimal")?
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')?;
    let (precision, scale) = inner.split_once(',')?;
    Some((precision.trim().parse().ok()?, scale.trim().parse().ok()?))
}

/// An Iceberg type (primitive or nested).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TypeRepr", into = "TypeRepr")]
pub enum Type {
    /// A primitive type.
    Primitive(PrimitiveType),
    /// Nested structure with named fields.
    Struct(StructType),
    /// Ordered collection of elements.
    List(ListType),
    /// Key-value collection.
    Map(MapType),
}

impl Type {
    /// Returns the struct type, if this is one.
    #[must_use]
    pub fn as_struct(&self) -> Option<&StructType> {
        match self {
            Self::Struct(st) => Some(st),
            _ => None,
        }
    }

    fn as_struct_mut(&mut self) -> Option<&mut StructType> {
        match self {
            Self::Struct(st) => Some(st),
            _ => None,
        }
    }

    fn max_field_id(&self) -> i32 {
        match self {
            Self::Primitive(_) => 0,
            Self::Struct(st) => max_field_id(&st.fields),
            Self::List(list) => list.element_id.max(list.element.max_field_id()),
            Self::Map(map) => map
                .key_id
                .max(map.value_id)
                .max(map.key.max_field_id())
                .max(map.value.max_field_id()),
        }
    }

    fn reassign_ids(&mut self, next_id: &mut i32) {
        match self {
            Self::Primitive(_) => {}
            Self::Struct(st) => {
                for field in &mut st.fields {
                    *next_id += 1;
                    field.id = *next_id;
                    field.field_type.reassign_ids(next_id);
                }
            }
            Self::List(list) => {
                *next_id += 1;
                list.element_id = *next_id;
                list.element.reassign_ids(next_id);
            }
            Self::Map(map) => {
                *next_id += 1;
                map.key_id = *next_id;
                *next_id += 1;
                map.value_id = *next_id;
                map.key.reassign_ids(next_id);
                map.value.reassign_ids(next_id);
            }
        }
    }
}

impl From<PrimitiveType> for Type {
    fn from(value: PrimitiveType) -> Self {
        Self::Primitive(value)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(p) => write!(f, "{p}"),
            Self::Struct(st) => {
                f.write_str("struct<")?;
                for (i, field) in st.fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", field.name, field.field_type)?;
                }
                f.write_str(">")
            }
            Self::List(list) => write!(f, "list<{}>", list.element),
            Self::Map(map) => write!(f, "map<{}, {}>", map.key, map.value),
        }
    }
}

/// Struct type: an ordered list of fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructType {
    /// The nested fields.
    pub fields: Vec<NestedField>,
}

/// List type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListType {
    /// Field ID for the element.
    pub element_id: i32,
    /// Element type.
    pub element: Box<Type>,
    /// Whether elements are required.
    pub element_required: bool,
}

/// Map type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapType {
    /// Field ID for the key.
    pub key_id: i32,
    /// Key type.
    pub key: Box<Type>,
    /// Field ID for the value.
    pub value_id: i32,
    /// Value type.
    pub value: Box<Type>,
    /// Whether values are required.
    pub value_required: bool,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum TypeRepr {
    Primitive(PrimitiveType),
    Nested(NestedRepr),
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum NestedRepr {
    Struct {
        fields: Vec<NestedField>,
    },
    List {
        #[serde(rename = "element-id")]
        element_id: i32,
        element: Box<Type>,
        #[serde(rename = "element-required")]
        element_required: bool,
    },
    Map {
        #[serde(rename = "key-id")]
        key_id: i32,
        key: Box<Type>,
        #[serde(rename = "value-id")]
        value_id: i32,
        value: Box<Type>,
        #[serde(rename = "value-required")]
        value_required: bool,
    },
}

impl From<TypeRepr> for Type {
    fn from(repr: TypeRepr) -> Self {
        match repr {
            TypeRepr::Primitive(p) => Self::Primitive(p),
            TypeRepr::Nested(NestedRepr::Struct { fields }) => Self::Struct(StructType { fields }),
            TypeRepr::Nested(NestedRepr::List {
                element_id,
                element,
                element_required,
            }) => Self::List(ListType {
                element_id,
                element,
                element_required,
            }),
            TypeRepr::Nested(NestedRepr::Map {
                key_id,
                key,
                value_id,
                value,
                value_required,
            }) => Self::Map(MapType {
                key_id,
                key,
                value_id,
                value,
                value_required,
            }),
        }
    }
}

impl From<Type> for TypeRepr {
    fn from(value: Type) -> Self {
        match value {
            Type::Primitive(p) => Self::Primitive(p),
            Type::Struct(st) => Self::Nested(NestedRepr::Struct { fields: st.fields }),
            Type::List(list) => Self::Nested(NestedRepr::List {
                element_id: list.element_id,
                element: list.element,
                element_required: list.element_required,
            }),
            Type::Map(map) => Self::Nested(NestedRepr::Map {
                key_id: map.key_id,
                key: map.key,
                value_id: map.value_id,
                value: map.value,
                value_required: map.value_required,
            }),
        }
    }
}

/// A field in a schema or struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedField {
    /// Unique field ID within the schema.
    pub id: i32,
    /// Field name.
    pub name: String,
    /// Whether the field is required.
    pub required: bool,
    /// Field type.
    #[serde(rename = "type")]
    pub field_type: Type,
    /// Optional documentation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

impl NestedField {
    /// Creates an optional field.
    #[must_use]
    pub fn optional(id: i32, name: impl Into<String>, field_type: impl Into<Type>) -> Self {
        Self {
            id,
            name: name.into(),
            required: false,
            field_type: field_type.into(),
            doc: None,
        }
    }

    /// Creates a required field.
    #[must_use]
    pub fn required(id: i32, name: impl Into<String>, field_type: impl Into<Type>) -> Self {
        Self {
            required: true,
            ..Self::optional(id, name, field_type)
        }
    }

    /// Attaches documentation.
    #[must_use]
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }
}

/// An Iceberg table schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(rename = "type", default = "default_struct_type")]
    schema_type: String,
    #[serde(rename = "schema-id", default)]
    schema_id: i32,
    #[serde(default)]
    fields: Vec<NestedField>,
    #[serde(
        rename = "identifier-field-ids",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    identifier_field_ids: Vec<i32>,
}

fn default_struct_type() -> String {
    "struct".to_string()
}

/// A staged "add optional column" change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddColumn {
    /// Path of the parent struct; empty for a top-level column.
    pub parent: Vec<String>,
    /// Column name.
    pub name: String,
    /// Column type.
    pub field_type: Type,
    /// Optional documentation.
    pub doc: Option<String>,
}

impl AddColumn {
    /// Returns the dotted path of the column (`parent.name`).
    #[must_use]
    pub fn dotted_path(&self) -> String {
        dotted(&self.parent, &self.name)
    }
}

pub(crate) fn dotted(parent: &[String], name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{name}", parent.join("."))
    }
}

impl Schema {
    /// Creates a schema with id 0.
    #[must_use]
    pub fn new(fields: Vec<NestedField>) -> Self {
        Self {
            schema_type: default_struct_type(),
            schema_id: 0,
            fields,
            identifier_field_ids: Vec::new(),
        }
    }

    /// Sets the schema id.
    #[must_use]
    pub fn with_schema_id(mut self, schema_id: i32) -> Self {
        self.schema_id = schema_id;
        self
    }

    /// Schema id.
    #[must_use]
    pub fn schema_id(&self) -> i32 {
        self.schema_id
    }

    /// Top-level fields.
    #[must_use]
    pub fn fields(&self) -> &[NestedField] {
        &self.fields
    }

    /// Identifier (row key) field ids.
    #[must_use]
    pub fn identifier_field_ids(&self) -> &[i32] {
        &self.identifier_field_ids
    }

    /// Returns the highest field id used anywhere in the schema, or 0 when empty.
    #[must_use]
    pub fn highest_field_id(&self) -> i32 {
        max_field_id(&self.fields)
    }

    /// Finds a field by its dotted path (`parent.child`).
    #[must_use]
    pub fn find_field(&self, dotted_path: &str) -> Option<&NestedField> {
        find_in(&self.fields, "", dotted_path)
    }

    /// Returns a copy of this schema with `changes` applied.
    ///
    /// New fields are optional and receive ids starting at
    /// `last_column_id + 1`, in change order. The new schema id is one past
    /// this schema's id. Returns the new schema and the new last column id.
    ///
    /// # Errors
    ///
    /// Returns [`IcebergError::SchemaEvolution`] if a parent path does not
    /// name a struct or a column with the same path already exists.
    pub fn with_added_columns(
        &self,
        changes: &[AddColumn],
        last_column_id: i32,
    ) -> IcebergResult<(Self, i32)> {
        let mut fields = self.fields.clone();
        let mut next_id = last_column_id.max(self.highest_field_id());

        for change in changes {
            let siblings = struct_fields_mut(&mut fields, &change.parent).ok_or_else(|| {
                IcebergError::schema_evolution(format!(
                    "cannot add column '{}': parent '{}' is not a struct in the current schema",
                    change.dotted_path(),
                    change.parent.join(".")
                ))
            })?;
            if siblings.iter().any(|field| field.name == change.name) {
                return Err(IcebergError::schema_evolution(format!(
                    "cannot add column '{}': a column with that path already exists",
                    change.dotted_path()
                )));
            }

            next_id += 1;
            let id = next_id;
            let mut field_type = change.field_type.clone();
            field_type.reassign_ids(&mut next_id);
            let mut field = NestedField::optional(id, change.name.clone(), field_type);
            field.doc.clone_from(&change.doc);
            siblings.push(field);
        }

        let schema = Self {
            schema_type: self.schema_type.clone(),
            schema_id: self.schema_id + 1,
            fields,
            identifier_field_ids: self.identifier_field_ids.clone(),
        };
        Ok((schema, next_id))
    }
}

fn max_field_id(fields: &[NestedField]) -> i32 {
    fields
        .iter()
        .map(|field| field.id.max(field.field_type.max_field_id()))
        .max()
        .unwrap_or(0)
}

fn find_in<'a>(fields: &'a [NestedField], prefix: &str, target: &str) -> Option<&'a NestedField> {
    for field in fields {
        let full_name = if prefix.is_empty() {
            field.name.clone()
        } else {
            format!("{prefix}.{}", field.name)
        };
        if full_name == target {
            return Some(field);
        }
        if let Some(st) = field.field_type.as_struct() {
            let child_prefix = format!("{full_name}.");
            if target.starts_with(&child_prefix) {
                if let Some(found) = find_in(&st.fields, &full_name, target) {
                    return Some(found);
                }
            }
        }
    }
    None
}

pub(crate) fn struct_fields_mut<'a>(
    fields: &'a mut Vec<NestedField>,
    path: &[String],
) -> Option<&'a mut Vec<NestedField>> {
    let Some((head, rest)) = path.split_first() else {
        return Some(fields);
    };
    let field = fields.iter_mut().find(|field| &field.name == head)?;
    let st = field.field_type.as_struct_mut()?;
    struct_fields_mut(&mut st.fields, rest)
}
