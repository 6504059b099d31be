/// Typed operands and their wire encodings
///
/// A [`TypedOperand`] is a partially populated value of one declared schema
/// type. It is the payload of mutation frames and the right-hand side of
/// every comparison. Only fields that were explicitly set are stored: an
/// absent field means "not constrained" and is never turned into a zero.
///
/// [`OperandCodec`] holds the client-side view of declared types and
/// translates operands to and from the two wire forms:
/// - binary `google.protobuf.Any` for the gRPC transport
/// - the JSON envelope (`{"@type": ..., "field": value}`) for REST
use crate::error::OperandError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Buf;
use prost::encoding::{self, DecodeContext, WireType};
use rogue_proto::{Any, TYPE_URL_PREFIX};
use serde_json::{Map, Number, Value as JsonValue};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// JSON key carrying the type URL in the REST envelope
pub const JSON_TYPE_KEY: &str = "@type";

/// Scalar field type of a declared schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    Int32,
    Int64,
    UInt32,
    UInt64,
    Float,
    Double,
    String,
    Bytes,
}

impl ScalarKind {
    /// Protobuf spelling of the type
    pub fn name(&self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Int32 => "int32",
            ScalarKind::Int64 => "int64",
            ScalarKind::UInt32 => "uint32",
            ScalarKind::UInt64 => "uint64",
            ScalarKind::Float => "float",
            ScalarKind::Double => "double",
            ScalarKind::String => "string",
            ScalarKind::Bytes => "bytes",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Field value of an operand
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int32(i32),
    Int64(i64),
    UInt32(u32),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
}

impl Scalar {
    pub fn kind(&self) -> ScalarKind {
        match self {
            Scalar::Bool(_) => ScalarKind::Bool,
            Scalar::Int32(_) => ScalarKind::Int32,
            Scalar::Int64(_) => ScalarKind::Int64,
            Scalar::UInt32(_) => ScalarKind::UInt32,
            Scalar::UInt64(_) => ScalarKind::UInt64,
            Scalar::Float(_) => ScalarKind::Float,
            Scalar::Double(_) => ScalarKind::Double,
            Scalar::String(_) => ScalarKind::String,
            Scalar::Bytes(_) => ScalarKind::Bytes,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Signed integer view, for any integral kind that fits
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Int32(v) => Some(*v as i64),
            Scalar::Int64(v) => Some(*v),
            Scalar::UInt32(v) => Some(*v as i64),
            Scalar::UInt64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Unsigned integer view, for any integral kind that fits
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Scalar::Int32(v) => u64::try_from(*v).ok(),
            Scalar::Int64(v) => u64::try_from(*v).ok(),
            Scalar::UInt32(v) => Some(*v as u64),
            Scalar::UInt64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Float(v) => Some(*v as f64),
            Scalar::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Scalar::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Order two scalars
    ///
    /// Integral kinds compare with each other by value, floating kinds with
    /// any numeric kind. Other combinations are incomparable.
    pub fn compare(&self, other: &Scalar) -> Option<Ordering> {
        match (self, other) {
            (Scalar::Bool(a), Scalar::Bool(b)) => Some(a.cmp(b)),
            (Scalar::String(a), Scalar::String(b)) => Some(a.cmp(b)),
            (Scalar::Bytes(a), Scalar::Bytes(b)) => Some(a.cmp(b)),
            (a, b) => match (a.integral(), b.integral()) {
                (Some(x), Some(y)) => Some(x.cmp(&y)),
                _ => a.numeric()?.partial_cmp(&b.numeric()?),
            },
        }
    }

    fn integral(&self) -> Option<i128> {
        match self {
            Scalar::Int32(v) => Some(*v as i128),
            Scalar::Int64(v) => Some(*v as i128),
            Scalar::UInt32(v) => Some(*v as i128),
            Scalar::UInt64(v) => Some(*v as i128),
            _ => None,
        }
    }

    fn numeric(&self) -> Option<f64> {
        self.integral().map(|v| v as f64).or_else(|| self.as_f64())
    }

    fn encode(&self, tag: u32, buf: &mut Vec<u8>) {
        match self {
            Scalar::Bool(v) => encoding::bool::encode(tag, v, buf),
            Scalar::Int32(v) => encoding::int32::encode(tag, v, buf),
            Scalar::Int64(v) => encoding::int64::encode(tag, v, buf),
            Scalar::UInt32(v) => encoding::uint32::encode(tag, v, buf),
            Scalar::UInt64(v) => encoding::uint64::encode(tag, v, buf),
            Scalar::Float(v) => encoding::float::encode(tag, v, buf),
            Scalar::Double(v) => encoding::double::encode(tag, v, buf),
            Scalar::String(v) => encoding::string::encode(tag, v, buf),
            Scalar::Bytes(v) => encoding::bytes::encode(tag, v, buf),
        }
    }

    fn to_json(&self) -> JsonValue {
        match self {
            Scalar::Bool(v) => JsonValue::Bool(*v),
            Scalar::Int32(v) => JsonValue::from(*v),
            Scalar::Int64(v) => JsonValue::from(*v),
            Scalar::UInt32(v) => JsonValue::from(*v),
            Scalar::UInt64(v) => JsonValue::from(*v),
            Scalar::Float(v) => float_to_json(*v as f64),
            Scalar::Double(v) => float_to_json(*v),
            Scalar::String(v) => JsonValue::String(v.clone()),
            Scalar::Bytes(v) => JsonValue::String(BASE64.encode(v)),
        }
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Int32(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int64(v)
    }
}

impl From<u32> for Scalar {
    fn from(v: u32) -> Self {
        Scalar::UInt32(v)
    }
}

impl From<u64> for Scalar {
    fn from(v: u64) -> Self {
        Scalar::UInt64(v)
    }
}

impl From<f32> for Scalar {
    fn from(v: f32) -> Self {
        Scalar::Float(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Double(v)
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::String(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::String(v.to_string())
    }
}

impl From<Vec<u8>> for Scalar {
    fn from(v: Vec<u8>) -> Self {
        Scalar::Bytes(v)
    }
}

/// One declared field of a schema type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub number: u32,
    pub name: String,
    pub kind: ScalarKind,
}

/// Client-side description of one declared schema type
///
/// The first `index_len` declared fields, in declaration order, form the
/// type's natural composite index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    name: String,
    fields: Vec<FieldDescriptor>,
    index_len: usize,
}

impl TypeDescriptor {
    /// Describe a type by its fully-qualified name (e.g. `rogue.services.Test`)
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            index_len: 0,
        }
    }

    /// Declare the next field
    pub fn field(mut self, number: u32, name: impl Into<String>, kind: ScalarKind) -> Self {
        self.fields.push(FieldDescriptor {
            number,
            name: name.into(),
            kind,
        });
        self
    }

    /// Mark the first `count` declared fields as the composite index
    pub fn indexed_by(mut self, count: usize) -> Self {
        self.index_len = count;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_url(&self) -> String {
        format!("{}{}", TYPE_URL_PREFIX, self.name)
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn index_fields(&self) -> &[FieldDescriptor] {
        &self.fields[..self.index_len.min(self.fields.len())]
    }

    pub fn field_by_number(&self, number: u32) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.number == number)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A set field of an operand
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValue {
    pub name: String,
    pub value: Scalar,
}

/// Typed, partially populated value envelope
#[derive(Debug, Clone, PartialEq)]
pub struct TypedOperand {
    type_name: String,
    fields: BTreeMap<u32, FieldValue>,
}

impl TypedOperand {
    /// Create an operand of the given fully-qualified type with no fields set
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Set a field, builder style
    pub fn with(mut self, number: u32, name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.set(number, name, value);
        self
    }

    /// Set a field, replacing any previous value for the same number
    pub fn set(&mut self, number: u32, name: impl Into<String>, value: impl Into<Scalar>) {
        self.fields.insert(
            number,
            FieldValue {
                name: name.into(),
                value: value.into(),
            },
        );
    }

    /// Unset a field
    pub fn clear(&mut self, number: u32) -> Option<FieldValue> {
        self.fields.remove(&number)
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn type_url(&self) -> String {
        format!("{}{}", TYPE_URL_PREFIX, self.type_name)
    }

    pub fn get(&self, number: u32) -> Option<&Scalar> {
        self.fields.get(&number).map(|f| &f.value)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Scalar> {
        self.fields.values().find(|f| f.name == name).map(|f| &f.value)
    }

    pub fn contains(&self, number: u32) -> bool {
        self.fields.contains_key(&number)
    }

    /// Set field numbers, ascending
    pub fn field_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.fields.keys().copied()
    }

    /// Set fields, ascending by number
    pub fn fields(&self) -> impl Iterator<Item = (u32, &FieldValue)> + '_ {
        self.fields.iter().map(|(n, f)| (*n, f))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Pack into `google.protobuf.Any`
    ///
    /// Only set fields are written; an explicitly set zero value is written
    /// as well.
    pub fn to_any(&self) -> Any {
        let mut value = Vec::new();
        for (number, field) in &self.fields {
            field.value.encode(*number, &mut value);
        }
        Any {
            type_url: self.type_url(),
            value,
        }
    }

    /// Render the REST JSON envelope
    pub fn to_json(&self) -> JsonValue {
        let mut object = Map::new();
        object.insert(JSON_TYPE_KEY.to_string(), JsonValue::String(self.type_url()));
        for field in self.fields.values() {
            object.insert(field.name.clone(), field.value.to_json());
        }
        JsonValue::Object(object)
    }
}

/// Domain types that map onto a declared schema type
///
/// Implementations must leave unset optional fields out of the operand and
/// read absent fields back as absent.
pub trait Operand: Sized {
    fn descriptor() -> TypeDescriptor;

    fn to_operand(&self) -> TypedOperand;

    fn from_operand(operand: &TypedOperand) -> Result<Self, OperandError>;
}

/// An operand as it arrived from a transport, not yet decoded
#[derive(Debug, Clone, PartialEq)]
pub enum WireOperand {
    Binary(Any),
    Json(JsonValue),
}

/// Registry of declared types plus the operand translations that need it
#[derive(Debug, Clone, Default)]
pub struct OperandCodec {
    types: HashMap<String, TypeDescriptor>,
}

impl OperandCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a domain type, builder style
    pub fn with<T: Operand>(mut self) -> Self {
        self.register::<T>();
        self
    }

    pub fn register<T: Operand>(&mut self) -> &mut Self {
        self.register_descriptor(T::descriptor())
    }

    pub fn register_descriptor(&mut self, descriptor: TypeDescriptor) -> &mut Self {
        self.types.insert(descriptor.name.clone(), descriptor);
        self
    }

    pub fn descriptor(&self, type_name: &str) -> Option<&TypeDescriptor> {
        self.types.get(type_name)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.types.keys().map(String::as_str)
    }

    fn lookup(&self, type_name: &str) -> Result<&TypeDescriptor, OperandError> {
        self.types
            .get(type_name)
            .ok_or_else(|| OperandError::UnknownType(type_name.to_string()))
    }

    /// Check an operand against its declared type
    pub fn validate(&self, operand: &TypedOperand) -> Result<(), OperandError> {
        let descriptor = self.lookup(operand.type_name())?;
        for (number, field) in operand.fields() {
            let declared = descriptor
                .field_by_number(number)
                .filter(|d| d.name == field.name)
                .ok_or_else(|| OperandError::UnknownField {
                    type_name: descriptor.name.clone(),
                    field: format!("{} (#{})", field.name, number),
                })?;
            if declared.kind != field.value.kind() {
                return Err(OperandError::KindMismatch {
                    type_name: descriptor.name.clone(),
                    field: declared.name.clone(),
                    expected: declared.kind.name(),
                    found: field.value.kind().name(),
                });
            }
        }
        Ok(())
    }

    /// Translate a domain value into a validated operand
    pub fn encode<T: Operand>(&self, value: &T) -> Result<TypedOperand, OperandError> {
        let operand = value.to_operand();
        self.validate(&operand)?;
        Ok(operand)
    }

    /// Translate an operand back into a domain value
    pub fn decode<T: Operand>(&self, operand: &TypedOperand) -> Result<T, OperandError> {
        let expected = T::descriptor();
        if operand.type_name() != expected.name() {
            return Err(OperandError::TypeMismatch {
                expected: expected.name().to_string(),
                found: operand.type_name().to_string(),
            });
        }
        self.validate(operand)?;
        T::from_operand(operand)
    }

    /// Unpack `google.protobuf.Any`
    ///
    /// Fields the descriptor does not know are skipped.
    pub fn from_any(&self, any: &Any) -> Result<TypedOperand, OperandError> {
        let descriptor = self.lookup(any.type_name())?;
        let mut operand = TypedOperand::new(descriptor.name.clone());
        let mut buf = any.value.as_slice();

        while buf.has_remaining() {
            let (tag, wire_type) = encoding::decode_key(&mut buf)?;
            match descriptor.field_by_number(tag) {
                Some(field) => {
                    let value = merge_scalar(field.kind, wire_type, &mut buf)?;
                    operand.set(tag, field.name.clone(), value);
                }
                None => encoding::skip_field(wire_type, tag, &mut buf, DecodeContext::default())?,
            }
        }

        Ok(operand)
    }

    /// Parse the REST JSON envelope
    ///
    /// `null` members count as unset. Members the descriptor does not
    /// declare are skipped, like unknown fields in the binary form.
    pub fn from_json(&self, value: &JsonValue) -> Result<TypedOperand, OperandError> {
        let object = value
            .as_object()
            .ok_or_else(|| OperandError::Decode(format!("expected JSON object, found {}", json_kind(value))))?;
        let type_url = object
            .get(JSON_TYPE_KEY)
            .and_then(JsonValue::as_str)
            .ok_or_else(|| OperandError::MissingField {
                type_name: "<unknown>".to_string(),
                field: JSON_TYPE_KEY.to_string(),
            })?;
        let type_name = type_url.rsplit('/').next().unwrap_or(type_url);
        let descriptor = self.lookup(type_name)?;

        let mut operand = TypedOperand::new(descriptor.name.clone());
        for (key, member) in object {
            if key == JSON_TYPE_KEY || member.is_null() {
                continue;
            }
            let Some(field) = descriptor.field_by_name(key) else {
                continue;
            };
            let scalar = json_to_scalar(&descriptor.name, field, member)?;
            operand.set(field.number, field.name.clone(), scalar);
        }

        Ok(operand)
    }

    pub fn decode_wire(&self, wire: &WireOperand) -> Result<TypedOperand, OperandError> {
        match wire {
            WireOperand::Binary(any) => self.from_any(any),
            WireOperand::Json(json) => self.from_json(json),
        }
    }
}

fn merge_scalar(kind: ScalarKind, wire_type: WireType, buf: &mut impl Buf) -> Result<Scalar, OperandError> {
    let ctx = DecodeContext::default();
    let scalar = match kind {
        ScalarKind::Bool => {
            let mut v = false;
            encoding::bool::merge(wire_type, &mut v, buf, ctx)?;
            Scalar::Bool(v)
        }
        ScalarKind::Int32 => {
            let mut v = 0i32;
            encoding::int32::merge(wire_type, &mut v, buf, ctx)?;
            Scalar::Int32(v)
        }
        ScalarKind::Int64 => {
            let mut v = 0i64;
            encoding::int64::merge(wire_type, &mut v, buf, ctx)?;
            Scalar::Int64(v)
        }
        ScalarKind::UInt32 => {
            let mut v = 0u32;
            encoding::uint32::merge(wire_type, &mut v, buf, ctx)?;
            Scalar::UInt32(v)
        }
        ScalarKind::UInt64 => {
            let mut v = 0u64;
            encoding::uint64::merge(wire_type, &mut v, buf, ctx)?;
            Scalar::UInt64(v)
        }
        ScalarKind::Float => {
            let mut v = 0f32;
            encoding::float::merge(wire_type, &mut v, buf, ctx)?;
            Scalar::Float(v)
        }
        ScalarKind::Double => {
            let mut v = 0f64;
            encoding::double::merge(wire_type, &mut v, buf, ctx)?;
            Scalar::Double(v)
        }
        ScalarKind::String => {
            let mut v = String::new();
            encoding::string::merge(wire_type, &mut v, buf, ctx)?;
            Scalar::String(v)
        }
        ScalarKind::Bytes => {
            let mut v: Vec<u8> = Vec::new();
            encoding::bytes::merge(wire_type, &mut v, buf, ctx)?;
            Scalar::Bytes(v)
        }
    };
    Ok(scalar)
}

fn float_to_json(v: f64) -> JsonValue {
    match Number::from_f64(v) {
        Some(n) => JsonValue::Number(n),
        None if v.is_nan() => JsonValue::String("NaN".to_string()),
        None if v > 0.0 => JsonValue::String("Infinity".to_string()),
        None => JsonValue::String("-Infinity".to_string()),
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

fn json_to_scalar(type_name: &str, field: &FieldDescriptor, value: &JsonValue) -> Result<Scalar, OperandError> {
    let mismatch = || OperandError::KindMismatch {
        type_name: type_name.to_string(),
        field: field.name.clone(),
        expected: field.kind.name(),
        found: json_kind(value),
    };

    // proto3 JSON allows 64-bit integers and special floats as strings
    let scalar = match field.kind {
        ScalarKind::Bool => Scalar::Bool(value.as_bool().ok_or_else(mismatch)?),
        ScalarKind::Int32 => {
            let v = json_i64(value).ok_or_else(mismatch)?;
            Scalar::Int32(i32::try_from(v).map_err(|_| mismatch())?)
        }
        ScalarKind::Int64 => Scalar::Int64(json_i64(value).ok_or_else(mismatch)?),
        ScalarKind::UInt32 => {
            let v = json_u64(value).ok_or_else(mismatch)?;
            Scalar::UInt32(u32::try_from(v).map_err(|_| mismatch())?)
        }
        ScalarKind::UInt64 => Scalar::UInt64(json_u64(value).ok_or_else(mismatch)?),
        ScalarKind::Float => Scalar::Float(json_f64(value).ok_or_else(mismatch)? as f32),
        ScalarKind::Double => Scalar::Double(json_f64(value).ok_or_else(mismatch)?),
        ScalarKind::String => Scalar::String(value.as_str().ok_or_else(mismatch)?.to_string()),
        ScalarKind::Bytes => {
            let text = value.as_str().ok_or_else(mismatch)?;
            Scalar::Bytes(
                BASE64
                    .decode(text)
                    .map_err(|e| OperandError::Decode(format!("field {}: {}", field.name, e)))?,
            )
        }
    };
    Ok(scalar)
}

fn json_i64(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn json_u64(value: &JsonValue) -> Option<u64> {
    match value {
        JsonValue::Number(n) => n.as_u64(),
        JsonValue::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn json_f64(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Default, PartialEq)]
    struct Test {
        attribute1: Option<i64>,
        attribute2: Option<i64>,
        attribute3: Option<bool>,
    }

    impl Operand for Test {
        fn descriptor() -> TypeDescriptor {
            TypeDescriptor::new("rogue.services.Test")
                .field(1, "attribute1", ScalarKind::Int64)
                .field(2, "attribute2", ScalarKind::Int64)
                .field(3, "attribute3", ScalarKind::Bool)
                .indexed_by(3)
        }

        fn to_operand(&self) -> TypedOperand {
            let mut operand = TypedOperand::new("rogue.services.Test");
            if let Some(v) = self.attribute1 {
                operand.set(1, "attribute1", v);
            }
            if let Some(v) = self.attribute2 {
                operand.set(2, "attribute2", v);
            }
            if let Some(v) = self.attribute3 {
                operand.set(3, "attribute3", v);
            }
            operand
        }

        fn from_operand(operand: &TypedOperand) -> Result<Self, OperandError> {
            Ok(Self {
                attribute1: operand.get(1).and_then(Scalar::as_i64),
                attribute2: operand.get(2).and_then(Scalar::as_i64),
                attribute3: operand.get(3).and_then(Scalar::as_bool),
            })
        }
    }

    fn codec() -> OperandCodec {
        OperandCodec::new().with::<Test>()
    }

    #[test]
    fn test_any_round_trip_keeps_unset_fields_absent() {
        let codec = codec();
        let original = Test {
            attribute1: Some(10),
            attribute2: None,
            attribute3: Some(false),
        };

        let operand = codec.encode(&original).unwrap();
        let any = operand.to_any();
        assert_eq!(any.type_url, "type.googleapis.com/rogue.services.Test");

        let decoded = codec.from_any(&any).unwrap();
        assert_eq!(decoded, operand);
        assert!(!decoded.contains(2));
        // explicitly set false is kept, not dropped as a default
        assert_eq!(decoded.get(3), Some(&Scalar::Bool(false)));

        let back: Test = codec.decode(&decoded).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn test_json_envelope_shape() {
        let operand = TypedOperand::new("rogue.services.Test")
            .with(1, "attribute1", 10i64)
            .with(2, "attribute2", 5i64);

        assert_eq!(
            operand.to_json(),
            json!({
                "@type": "type.googleapis.com/rogue.services.Test",
                "attribute1": 10,
                "attribute2": 5,
            })
        );
    }

    #[test]
    fn test_json_accepts_string_integers_and_nulls() {
        let codec = codec();
        let decoded = codec
            .from_json(&json!({
                "@type": "type.googleapis.com/rogue.services.Test",
                "attribute1": "42",
                "attribute2": null,
                "attribute3": true,
            }))
            .unwrap();

        assert_eq!(decoded.get(1), Some(&Scalar::Int64(42)));
        assert!(!decoded.contains(2));
        assert_eq!(decoded.get_by_name("attribute3"), Some(&Scalar::Bool(true)));
    }

    #[test]
    fn test_json_kind_mismatch() {
        let err = codec()
            .from_json(&json!({
                "@type": "type.googleapis.com/rogue.services.Test",
                "attribute3": "yes",
            }))
            .unwrap_err();
        assert!(matches!(err, OperandError::KindMismatch { expected: "bool", found: "string", .. }));
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let any = TypedOperand::new("rogue.services.Missing").with(1, "id", 1u64).to_any();
        let err = codec().from_any(&any).unwrap_err();
        assert_eq!(err, OperandError::UnknownType("rogue.services.Missing".to_string()));
    }

    #[test]
    fn test_unknown_wire_fields_are_skipped() {
        let mut any = TypedOperand::new("rogue.services.Test")
            .with(1, "attribute1", 7i64)
            .to_any();
        encoding::string::encode(9, &"extra".to_string(), &mut any.value);

        let decoded = codec().from_any(&any).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded.get(1), Some(&Scalar::Int64(7)));
    }

    #[test]
    fn test_unknown_json_members_are_skipped() {
        let decoded = codec()
            .from_json(&json!({
                "@type": "type.googleapis.com/rogue.services.Test",
                "attribute1": 1,
                "attribute9": "x"
            }))
            .unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded.get(1), Some(&Scalar::Int64(1)));
    }

    #[test]
    fn test_truncated_payload_fails_to_decode() {
        let mut any = TypedOperand::new("rogue.services.Test")
            .with(1, "attribute1", 300i64)
            .to_any();
        any.value.truncate(any.value.len() - 1);

        assert!(matches!(codec().from_any(&any), Err(OperandError::Decode(_))));
    }

    #[test]
    fn test_validate_checks_kinds_and_fields() {
        let codec = codec();

        let wrong_kind = TypedOperand::new("rogue.services.Test").with(3, "attribute3", 1i64);
        assert!(matches!(
            codec.validate(&wrong_kind),
            Err(OperandError::KindMismatch { expected: "bool", found: "int64", .. })
        ));

        let undeclared = TypedOperand::new("rogue.services.Test").with(4, "attribute4", 1i64);
        assert!(matches!(codec.validate(&undeclared), Err(OperandError::UnknownField { .. })));
    }

    #[test]
    fn test_decode_rejects_other_types() {
        let mut codec = codec();
        codec.register_descriptor(TypeDescriptor::new("rogue.services.Other").field(1, "id", ScalarKind::UInt64));
        let other = TypedOperand::new("rogue.services.Other").with(1, "id", 1u64);

        let err = codec.decode::<Test>(&other).unwrap_err();
        assert!(matches!(err, OperandError::TypeMismatch { .. }));
    }

    #[test]
    fn test_scalar_compare_across_integral_kinds() {
        assert_eq!(Scalar::Int32(5).compare(&Scalar::UInt64(5)), Some(Ordering::Equal));
        assert_eq!(Scalar::Int64(-1).compare(&Scalar::UInt32(0)), Some(Ordering::Less));
        assert_eq!(Scalar::Double(1.5).compare(&Scalar::Int64(1)), Some(Ordering::Greater));
        assert_eq!(Scalar::Bool(true).compare(&Scalar::Int64(1)), None);
        assert_eq!(Scalar::Bool(false).compare(&Scalar::Bool(true)), Some(Ordering::Less));
    }

    #[test]
    fn test_index_fields_follow_declaration_order() {
        let descriptor = Test::descriptor();
        let names: Vec<_> = descriptor.index_fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["attribute1", "attribute2", "attribute3"]);

        let partial = Test::descriptor().indexed_by(1);
        assert_eq!(partial.index_fields().len(), 1);
    }
}
