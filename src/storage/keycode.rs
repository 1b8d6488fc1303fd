//! Order-preserving key encoding.
//!
//! Logical keys are enums; their byte encoding must sort the same way the
//! logical values do, so that range and prefix scans over the engine see
//! keys in a meaningful order. The rules are:
//!
//! - enum variant: the variant index as a single byte, then the fields
//! - u64: fixed eight bytes, big-endian
//! - str and bytes: 0x00 bytes escaped as 0x00 0xff, terminated with
//!   0x00 0x00, so no encoded string is a byte prefix of a longer one
//!
//! Values are never stored in this format, only keys; values go through
//! bincode.

use serde::de::IntoDeserializer;
use serde::{de, ser};

use crate::error::{Error, Result};

pub fn serialize_key<T: serde::Serialize>(key: &T) -> Result<Vec<u8>> {
    let mut serializer = Serializer { output: Vec::new() };
    key.serialize(&mut serializer)?;
    Ok(serializer.output)
}

pub fn deserialize_key<'a, T: serde::Deserialize<'a>>(input: &'a [u8]) -> Result<T> {
    let mut deserializer = Deserializer { input };
    T::deserialize(&mut deserializer)
}

struct Serializer {
    output: Vec<u8>,
}

impl<'a> ser::Serializer for &'a mut Serializer {
    type Ok = ();
    type Error = Error;

    type SerializeSeq = ser::Impossible<Self::Ok, Self::Error>;
    type SerializeTuple = ser::Impossible<Self::Ok, Self::Error>;
    type SerializeTupleStruct = ser::Impossible<Self::Ok, Self::Error>;
    type SerializeTupleVariant = Self;
    type SerializeMap = ser::Impossible<Self::Ok, Self::Error>;
    type SerializeStruct = ser::Impossible<Self::Ok, Self::Error>;
    type SerializeStructVariant = ser::Impossible<Self::Ok, Self::Error>;

    fn serialize_bool(self, _v: bool) -> Result<Self::Ok> {
        Err(Error::Internal("unsupported type in key".to_string()))
    }

    fn serialize_i8(self, _v: i8) -> Result<Self::Ok> {
        Err(Error::Internal("unsupported type in key".to_string()))
    }

    fn serialize_i16(self, _v: i16) -> Result<Self::Ok> {
        Err(Error::Internal("unsupported type in key".to_string()))
    }

    fn serialize_i32(self, _v: i32) -> Result<Self::Ok> {
        Err(Error::Internal("unsupported type in key".to_string()))
    }

    fn serialize_i64(self, _v: i64) -> Result<Self::Ok> {
        Err(Error::Internal("unsupported type in key".to_string()))
    }

    fn serialize_u8(self, _v: u8) -> Result<Self::Ok> {
        Err(Error::Internal("unsupported type in key".to_string()))
    }

    fn serialize_u16(self, _v: u16) -> Result<Self::Ok> {
        Err(Error::Internal("unsupported type in key".to_string()))
    }

    fn serialize_u32(self, _v: u32) -> Result<Self::Ok> {
        Err(Error::Internal("unsupported type in key".to_string()))
    }

    /// Big-endian, so numeric order equals byte order
    fn serialize_u64(self, v: u64) -> Result<Self::Ok> {
        self.output.extend(v.to_be_bytes());
        Ok(())
    }

    fn serialize_f32(self, _v: f32) -> Result<Self::Ok> {
        Err(Error::Internal("unsupported type in key".to_string()))
    }

    fn serialize_f64(self, _v: f64) -> Result<Self::Ok> {
        Err(Error::Internal("unsupported type in key".to_string()))
    }

    fn serialize_char(self, _v: char) -> Result<Self::Ok> {
        Err(Error::Internal("unsupported type in key".to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Self::Ok> {
        self.serialize_bytes(v.as_bytes())
    }

    /// 0x00 escaped as 0x00 0xff, 0x00 0x00 terminates. The terminator
    /// sorts below any escaped content byte, which keeps shorter strings
    /// ahead of their extensions.
    fn serialize_bytes(self, v: &[u8]) -> Result<Self::Ok> {
        for &b in v {
            match b {
                0x00 => self.output.extend([0x00, 0xff]),
                b => self.output.push(b),
            }
        }
        self.output.extend([0x00, 0x00]);
        Ok(())
    }

    fn serialize_none(self) -> Result<Self::Ok> {
        Err(Error::Internal("unsupported type in key".to_string()))
    }

    fn serialize_some<T: serde::Serialize + ?Sized>(self, _value: &T) -> Result<Self::Ok> {
        Err(Error::Internal("unsupported type in key".to_string()))
    }

    fn serialize_unit(self) -> Result<Self::Ok> {
        Err(Error::Internal("unsupported type in key".to_string()))
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Self::Ok> {
        Err(Error::Internal("unsupported type in key".to_string()))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
    ) -> Result<Self::Ok> {
        // Key enums stay well under 256 variants
        self.output.push(variant_index as u8);
        Ok(())
    }

    fn serialize_newtype_struct<T: serde::Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Self::Ok> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: serde::Serialize + ?Sized>(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
        value: &T,
    ) -> Result<Self::Ok> {
        self.output.push(variant_index as u8);
        value.serialize(self)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        Err(Error::Internal("unsupported type in key".to_string()))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        Err(Error::Internal("unsupported type in key".to_string()))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Err(Error::Internal("unsupported type in key".to_string()))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        self.output.push(variant_index as u8);
        Ok(self)
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Err(Error::Internal("unsupported type in key".to_string()))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        Err(Error::Internal("unsupported type in key".to_string()))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(Error::Internal("unsupported type in key".to_string()))
    }
}

impl<'a> ser::SerializeTupleVariant for &'a mut Serializer {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: serde::Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

struct Deserializer<'de> {
    input: &'de [u8],
}

impl<'de> Deserializer<'de> {
    /// Consumes and returns the next byte of the input
    fn take_byte(&mut self) -> Result<u8> {
        Ok(self.take_bytes(1)?[0])
    }

    /// Consumes a fixed number of bytes from the input
    fn take_bytes(&mut self, len: usize) -> Result<&'de [u8]> {
        if self.input.len() < len {
            return Err(Error::Internal(format!(
                "key too short, want {} bytes, have {}",
                len,
                self.input.len()
            )));
        }
        let (taken, rest) = self.input.split_at(len);
        self.input = rest;
        Ok(taken)
    }

    /// Decodes an escaped, terminated byte string
    fn next_bytes(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut iter = self.input.iter().enumerate();
        let taken = loop {
            match iter.next() {
                Some((_, 0x00)) => match iter.next() {
                    Some((i, 0x00)) => break i + 1,
                    Some((_, 0xff)) => out.push(0x00),
                    _ => return Err(Error::Internal("invalid escape in key".to_string())),
                },
                Some((_, b)) => out.push(*b),
                None => return Err(Error::Internal("unterminated string in key".to_string())),
            }
        };
        self.input = &self.input[taken..];
        Ok(out)
    }
}

impl<'de, 'a> de::Deserializer<'de> for &'a mut Deserializer<'de> {
    type Error = Error;

    fn deserialize_any<V: de::Visitor<'de>>(self, _visitor: V) -> Result<V::Value> {
        Err(Error::Internal(
            "key decoding requires a known type".to_string(),
        ))
    }

    fn deserialize_u64<V: de::Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_u64(u64::from_be_bytes(self.take_bytes(8)?.try_into()?))
    }

    fn deserialize_str<V: de::Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_string(String::from_utf8(self.next_bytes()?)?)
    }

    fn deserialize_string<V: de::Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: de::Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_byte_buf(self.next_bytes()?)
    }

    fn deserialize_byte_buf<V: de::Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_enum<V: de::Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_enum(self)
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u128 f32 f64 char
        option unit unit_struct newtype_struct seq tuple tuple_struct
        map struct identifier ignored_any
    }
}

impl<'de, 'a> de::EnumAccess<'de> for &'a mut Deserializer<'de> {
    type Error = Error;
    type Variant = Self;

    fn variant_seed<V: de::DeserializeSeed<'de>>(self, seed: V) -> Result<(V::Value, Self::Variant)> {
        let index = self.take_byte()? as u32;
        let variant: Result<_> = seed.deserialize(index.into_deserializer());
        Ok((variant?, self))
    }
}

impl<'de, 'a> de::VariantAccess<'de> for &'a mut Deserializer<'de> {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        Ok(())
    }

    fn newtype_variant_seed<T: de::DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value> {
        seed.deserialize(&mut *self)
    }

    fn tuple_variant<V: de::Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value> {
        visitor.visit_seq(self)
    }

    fn struct_variant<V: de::Visitor<'de>>(
        self,
        _fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value> {
        Err(Error::Internal("unsupported type in key".to_string()))
    }
}

impl<'de, 'a> de::SeqAccess<'de> for &'a mut Deserializer<'de> {
    type Error = Error;

    fn next_element_seed<T: de::DeserializeSeed<'de>>(&mut self, seed: T) -> Result<Option<T::Value>> {
        if self.input.is_empty() {
            return Ok(None);
        }
        seed.deserialize(&mut **self).map(Some)
    }
}
