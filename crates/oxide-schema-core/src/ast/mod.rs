//! Abstract syntax tree for schema declarations.
//!
//! A [`Schema`] is produced once per parse and never mutated afterwards. Attribute
//! arguments use the closed [`Value`] variant so every consumer matches
//! exhaustively.

use serde::Serialize;

use crate::lexer::Span;

/// Root of a parsed declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Schema {
    /// `datasource` blocks, in source order.
    pub datasources: Vec<ConfigBlock>,
    /// `generator` blocks, in source order.
    pub generators: Vec<ConfigBlock>,
    /// `model` blocks, in source order.
    pub models: Vec<Model>,
    /// `enum` blocks, in source order.
    pub enums: Vec<Enum>,
}

impl Schema {
    /// Looks up a model by name.
    #[must_use]
    pub fn model(&self, name: &str) -> Option<&Model> {
        self.models.iter().find(|m| m.name == name)
    }

    /// Looks up an enum by name.
    #[must_use]
    pub fn enum_def(&self, name: &str) -> Option<&Enum> {
        self.enums.iter().find(|e| e.name == name)
    }

    /// Returns the `provider` string of the first datasource, if any.
    #[must_use]
    pub fn datasource_provider(&self) -> Option<&str> {
        self.datasources
            .first()
            .and_then(|ds| ds.property("provider"))
            .and_then(Value::as_str)
    }

    /// Returns the `url` string of the first datasource, if it is a literal.
    #[must_use]
    pub fn datasource_url(&self) -> Option<&str> {
        self.datasources
            .first()
            .and_then(|ds| ds.property("url"))
            .and_then(Value::as_str)
    }
}

/// A `datasource` or `generator` block: a name and `key = value` properties.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigBlock {
    pub name: String,
    pub properties: Vec<Property>,
    pub span: Span,
}

impl ConfigBlock {
    /// Returns the value of the named property.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties
            .iter()
            .find(|p| p.key == key)
            .map(|p| &p.value)
    }
}

/// A single `key = value` line of a config block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    pub key: String,
    pub value: Value,
    pub span: Span,
}

/// A `model` block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Model {
    pub name: String,
    pub fields: Vec<Field>,
    /// Block-level `@@` attributes.
    pub attributes: Vec<Attribute>,
    pub span: Span,
}

impl Model {
    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns the first block attribute with the given name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Returns every block attribute with the given name.
    pub fn attributes_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Attribute> {
        self.attributes.iter().filter(move |a| a.name == name)
    }
}

/// A field declaration inside a model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
    pub attributes: Vec<Attribute>,
    pub span: Span,
}

impl Field {
    /// Returns the field attribute with the given name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Returns true if the field carries the given attribute.
    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }
}

/// The declared type of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldType {
    /// Base type name (`String`, `Int`, a model or enum name, `Unsupported`).
    pub name: String,
    /// `Type[]`
    pub is_list: bool,
    /// `Type?`
    pub is_optional: bool,
    /// Argument of `Unsupported("...")`.
    pub unsupported: Option<String>,
}

/// Built-in scalar types recognised by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ScalarType {
    String,
    Int,
    BigInt,
    Float,
    Decimal,
    Boolean,
    DateTime,
    Json,
    Bytes,
}

impl ScalarType {
    /// Recognises a built-in scalar type name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "String" => Self::String,
            "Int" => Self::Int,
            "BigInt" => Self::BigInt,
            "Float" => Self::Float,
            "Decimal" => Self::Decimal,
            "Boolean" => Self::Boolean,
            "DateTime" => Self::DateTime,
            "Json" => Self::Json,
            "Bytes" => Self::Bytes,
            _ => return None,
        })
    }

    /// Returns the declaration name of the type.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Int => "Int",
            Self::BigInt => "BigInt",
            Self::Float => "Float",
            Self::Decimal => "Decimal",
            Self::Boolean => "Boolean",
            Self::DateTime => "DateTime",
            Self::Json => "Json",
            Self::Bytes => "Bytes",
        }
    }
}

impl FieldType {
    /// Returns the scalar type if the base name is built in.
    #[must_use]
    pub fn scalar(&self) -> Option<ScalarType> {
        ScalarType::from_name(&self.name)
    }

    /// Returns true for `Unsupported("...")`.
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        self.unsupported.is_some()
    }
}

/// A `@name(args)` or `@@name(args)` attribute. Dotted names such as
/// `db.VarChar` are kept joined.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    pub name: String,
    pub arguments: Vec<Argument>,
    pub span: Span,
}

impl Attribute {
    /// Returns the first unnamed argument.
    #[must_use]
    pub fn positional(&self) -> Option<&Value> {
        self.arguments
            .iter()
            .find(|a| a.name.is_none())
            .map(|a| &a.value)
    }

    /// Returns the named argument.
    #[must_use]
    pub fn named(&self, name: &str) -> Option<&Value> {
        self.arguments
            .iter()
            .find(|a| a.name.as_deref() == Some(name))
            .map(|a| &a.value)
    }

    /// Returns the named argument, falling back to the first positional one.
    #[must_use]
    pub fn named_or_positional(&self, name: &str) -> Option<&Value> {
        self.named(name).or_else(|| self.positional())
    }
}

/// One attribute argument, positional when `name` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Argument {
    pub name: Option<String>,
    pub value: Value,
}

/// Attribute argument value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Value {
    Scalar(Scalar),
    List(Vec<Value>),
    FunctionCall { name: String, args: Vec<Argument> },
}

/// Leaf values.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Scalar {
    String(String),
    Number(String),
    Boolean(bool),
    /// Bare identifier: field references, enum values, sort orders.
    Identifier(String),
}

impl Value {
    /// Returns the text of a string literal.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Returns the text of a bare identifier.
    #[must_use]
    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            Self::Scalar(Scalar::Identifier(s)) => Some(s),
            _ => None,
        }
    }

    /// Returns the items of a list value.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the function name and arguments of a call value.
    #[must_use]
    pub fn as_function(&self) -> Option<(&str, &[Argument])> {
        match self {
            Self::FunctionCall { name, args } => Some((name, args)),
            _ => None,
        }
    }
}

/// An `enum` block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enum {
    pub name: String,
    /// Value names, in declaration order.
    pub values: Vec<String>,
    /// Block-level `@@` attributes.
    pub attributes: Vec<Attribute>,
    pub span: Span,
}
