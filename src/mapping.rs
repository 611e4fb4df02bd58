//! Serde mapping between typed values and nodes.
//!
//! Values are serialized straight into a node tree and deserialized straight
//! out of one, so every scalar a node can hold (including NaN and the
//! infinities) survives a `set`/`get` cycle.

use indexmap::IndexMap;
use serde::de::value::{BorrowedStrDeserializer, Error, MapDeserializer, SeqDeserializer};
use serde::de::{self, DeserializeSeed, EnumAccess, IntoDeserializer, VariantAccess, Visitor};
use serde::forward_to_deserialize_any;
use serde::ser::{self, Serialize};

use crate::node::ConfigNode;
use crate::value::{NodeValue, Scalar};

type MapResult<T> = std::result::Result<T, Error>;

fn leaf(value: impl Into<NodeValue>) -> ConfigNode {
    ConfigNode::from_value(value)
}

/// `{ variant: inner }`, the externally tagged form of an enum variant.
fn tagged(variant: &str, inner: ConfigNode) -> ConfigNode {
    let mut entries = IndexMap::new();
    entries.insert(variant.to_string(), inner);
    leaf(NodeValue::Map(entries))
}

/// Builds a detached node tree from any `Serialize` value.
pub(crate) struct NodeSerializer;

impl ser::Serializer for NodeSerializer {
    type Ok = ConfigNode;
    type Error = Error;
    type SerializeSeq = SeqBuilder;
    type SerializeTuple = SeqBuilder;
    type SerializeTupleStruct = SeqBuilder;
    type SerializeTupleVariant = SeqBuilder;
    type SerializeMap = MapBuilder;
    type SerializeStruct = MapBuilder;
    type SerializeStructVariant = MapBuilder;

    fn serialize_bool(self, v: bool) -> MapResult<ConfigNode> {
        Ok(leaf(v))
    }

    fn serialize_i8(self, v: i8) -> MapResult<ConfigNode> {
        Ok(leaf(i64::from(v)))
    }

    fn serialize_i16(self, v: i16) -> MapResult<ConfigNode> {
        Ok(leaf(i64::from(v)))
    }

    fn serialize_i32(self, v: i32) -> MapResult<ConfigNode> {
        Ok(leaf(i64::from(v)))
    }

    fn serialize_i64(self, v: i64) -> MapResult<ConfigNode> {
        Ok(leaf(v))
    }

    fn serialize_u8(self, v: u8) -> MapResult<ConfigNode> {
        Ok(leaf(i64::from(v)))
    }

    fn serialize_u16(self, v: u16) -> MapResult<ConfigNode> {
        Ok(leaf(i64::from(v)))
    }

    fn serialize_u32(self, v: u32) -> MapResult<ConfigNode> {
        Ok(leaf(i64::from(v)))
    }

    // Same rule as deserializing a node: too large for i64 becomes a float.
    fn serialize_u64(self, v: u64) -> MapResult<ConfigNode> {
        match i64::try_from(v) {
            Ok(i) => Ok(leaf(i)),
            Err(_) => Ok(leaf(v as f64)),
        }
    }

    fn serialize_f32(self, v: f32) -> MapResult<ConfigNode> {
        Ok(leaf(f64::from(v)))
    }

    fn serialize_f64(self, v: f64) -> MapResult<ConfigNode> {
        Ok(leaf(v))
    }

    fn serialize_char(self, v: char) -> MapResult<ConfigNode> {
        Ok(leaf(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> MapResult<ConfigNode> {
        Ok(leaf(v))
    }

    fn serialize_bytes(self, v: &[u8]) -> MapResult<ConfigNode> {
        let items = v.iter().map(|b| leaf(i64::from(*b))).collect();
        Ok(leaf(NodeValue::List(items)))
    }

    fn serialize_none(self) -> MapResult<ConfigNode> {
        Ok(ConfigNode::root())
    }

    fn serialize_some<T>(self, value: &T) -> MapResult<ConfigNode>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> MapResult<ConfigNode> {
        Ok(ConfigNode::root())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> MapResult<ConfigNode> {
        Ok(ConfigNode::root())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> MapResult<ConfigNode> {
        Ok(leaf(variant))
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> MapResult<ConfigNode>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> MapResult<ConfigNode>
    where
        T: ?Sized + Serialize,
    {
        Ok(tagged(variant, value.serialize(NodeSerializer)?))
    }

    fn serialize_seq(self, len: Option<usize>) -> MapResult<SeqBuilder> {
        Ok(SeqBuilder::new(len, None))
    }

    fn serialize_tuple(self, len: usize) -> MapResult<SeqBuilder> {
        Ok(SeqBuilder::new(Some(len), None))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> MapResult<SeqBuilder> {
        Ok(SeqBuilder::new(Some(len), None))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> MapResult<SeqBuilder> {
        Ok(SeqBuilder::new(Some(len), Some(variant)))
    }

    fn serialize_map(self, _len: Option<usize>) -> MapResult<MapBuilder> {
        Ok(MapBuilder::new(None))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> MapResult<MapBuilder> {
        Ok(MapBuilder::new(None))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> MapResult<MapBuilder> {
        Ok(MapBuilder::new(Some(variant)))
    }
}

pub(crate) struct SeqBuilder {
    items: Vec<ConfigNode>,
    variant: Option<&'static str>,
}

impl SeqBuilder {
    fn new(len: Option<usize>, variant: Option<&'static str>) -> Self {
        SeqBuilder {
            items: Vec::with_capacity(len.unwrap_or(0)),
            variant,
        }
    }

    fn push<T: ?Sized + Serialize>(&mut self, value: &T) -> MapResult<()> {
        self.items.push(value.serialize(NodeSerializer)?);
        Ok(())
    }

    fn finish(self) -> ConfigNode {
        let list = leaf(NodeValue::List(self.items));
        match self.variant {
            Some(variant) => tagged(variant, list),
            None => list,
        }
    }
}

impl ser::SerializeSeq for SeqBuilder {
    type Ok = ConfigNode;
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> MapResult<()> {
        self.push(value)
    }

    fn end(self) -> MapResult<ConfigNode> {
        Ok(self.finish())
    }
}

impl ser::SerializeTuple for SeqBuilder {
    type Ok = ConfigNode;
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> MapResult<()> {
        self.push(value)
    }

    fn end(self) -> MapResult<ConfigNode> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleStruct for SeqBuilder {
    type Ok = ConfigNode;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> MapResult<()> {
        self.push(value)
    }

    fn end(self) -> MapResult<ConfigNode> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleVariant for SeqBuilder {
    type Ok = ConfigNode;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> MapResult<()> {
        self.push(value)
    }

    fn end(self) -> MapResult<ConfigNode> {
        Ok(self.finish())
    }
}

pub(crate) struct MapBuilder {
    entries: IndexMap<String, ConfigNode>,
    next_key: Option<String>,
    variant: Option<&'static str>,
}

impl MapBuilder {
    fn new(variant: Option<&'static str>) -> Self {
        MapBuilder {
            entries: IndexMap::new(),
            next_key: None,
            variant,
        }
    }

    fn insert<T: ?Sized + Serialize>(&mut self, key: String, value: &T) -> MapResult<()> {
        self.entries.insert(key, value.serialize(NodeSerializer)?);
        Ok(())
    }

    fn finish(self) -> ConfigNode {
        let map = leaf(NodeValue::Map(self.entries));
        match self.variant {
            Some(variant) => tagged(variant, map),
            None => map,
        }
    }
}

/// Map keys are stored as strings; scalar keys are converted with `Display`.
fn key_string(key: ConfigNode) -> MapResult<String> {
    match key.value() {
        NodeValue::Scalar(Scalar::String(s)) => Ok(s.clone()),
        NodeValue::Scalar(scalar) => Ok(scalar.to_string()),
        other => Err(ser::Error::custom(format!(
            "map keys must be scalars, found {}",
            other.type_name()
        ))),
    }
}

impl ser::SerializeMap for MapBuilder {
    type Ok = ConfigNode;
    type Error = Error;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> MapResult<()> {
        self.next_key = Some(key_string(key.serialize(NodeSerializer)?)?);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> MapResult<()> {
        let key = self
            .next_key
            .take()
            .ok_or_else(|| <Error as ser::Error>::custom("map value serialized before its key"))?;
        self.insert(key, value)
    }

    fn end(self) -> MapResult<ConfigNode> {
        Ok(self.finish())
    }
}

impl ser::SerializeStruct for MapBuilder {
    type Ok = ConfigNode;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, key: &'static str, value: &T) -> MapResult<()> {
        self.insert(key.to_string(), value)
    }

    fn end(self) -> MapResult<ConfigNode> {
        Ok(self.finish())
    }
}

impl ser::SerializeStructVariant for MapBuilder {
    type Ok = ConfigNode;
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, key: &'static str, value: &T) -> MapResult<()> {
        self.insert(key.to_string(), value)
    }

    fn end(self) -> MapResult<ConfigNode> {
        Ok(self.finish())
    }
}

impl<'de> de::Deserializer<'de> for &'de ConfigNode {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> MapResult<V::Value> {
        match self.value() {
            NodeValue::Null => visitor.visit_unit(),
            NodeValue::Scalar(Scalar::String(s)) => visitor.visit_borrowed_str(s),
            NodeValue::Scalar(Scalar::Integer(i)) => visitor.visit_i64(*i),
            NodeValue::Scalar(Scalar::Float(f)) => visitor.visit_f64(*f),
            NodeValue::Scalar(Scalar::Boolean(b)) => visitor.visit_bool(*b),
            NodeValue::List(items) => {
                let mut seq: SeqDeserializer<_, Error> = SeqDeserializer::new(items.iter());
                let value = visitor.visit_seq(&mut seq)?;
                seq.end()?;
                Ok(value)
            }
            NodeValue::Map(children) => {
                let mut map: MapDeserializer<'de, _, Error> =
                    MapDeserializer::new(children.iter().map(|(key, child)| (key.as_str(), child)));
                let value = visitor.visit_map(&mut map)?;
                map.end()?;
                Ok(value)
            }
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> MapResult<V::Value> {
        if self.is_null() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(self, _name: &'static str, visitor: V) -> MapResult<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    /// A string names a unit variant; a single-entry map holds any other
    /// variant under its name.
    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> MapResult<V::Value> {
        let access = match self.value() {
            NodeValue::Scalar(Scalar::String(variant)) => VariantNode {
                variant: variant.as_str(),
                value: None,
            },
            NodeValue::Map(children) if children.len() == 1 => match children.iter().next() {
                Some((variant, value)) => VariantNode {
                    variant: variant.as_str(),
                    value: Some(value),
                },
                None => return Err(de::Error::custom("expected an enum variant")),
            },
            other => {
                return Err(de::Error::custom(format!(
                    "expected an enum variant, found {}",
                    other.type_name()
                )));
            }
        };
        visitor.visit_enum(access)
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple tuple_struct map struct
        identifier ignored_any
    }
}

impl<'de> IntoDeserializer<'de, Error> for &'de ConfigNode {
    type Deserializer = Self;

    fn into_deserializer(self) -> Self {
        self
    }
}

struct VariantNode<'de> {
    variant: &'de str,
    value: Option<&'de ConfigNode>,
}

impl<'de> VariantNode<'de> {
    fn value(&self) -> MapResult<&'de ConfigNode> {
        self.value
            .ok_or_else(|| de::Error::custom(format!("variant '{}' needs a value", self.variant)))
    }
}

impl<'de> EnumAccess<'de> for VariantNode<'de> {
    type Error = Error;
    type Variant = Self;

    fn variant_seed<V: DeserializeSeed<'de>>(self, seed: V) -> MapResult<(V::Value, Self)> {
        let name: BorrowedStrDeserializer<'de, Error> = BorrowedStrDeserializer::new(self.variant);
        let variant = seed.deserialize(name)?;
        Ok((variant, self))
    }
}

impl<'de> VariantAccess<'de> for VariantNode<'de> {
    type Error = Error;

    fn unit_variant(self) -> MapResult<()> {
        match self.value {
            Some(value) if !value.is_null() => Err(de::Error::custom(format!(
                "variant '{}' takes no value",
                self.variant
            ))),
            _ => Ok(()),
        }
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> MapResult<T::Value> {
        seed.deserialize(self.value()?)
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> MapResult<V::Value> {
        de::Deserializer::deserialize_any(self.value()?, visitor)
    }

    fn struct_variant<V: Visitor<'de>>(self, _fields: &'static [&'static str], visitor: V) -> MapResult<V::Value> {
        de::Deserializer::deserialize_any(self.value()?, visitor)
    }
}
