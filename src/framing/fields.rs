//! Schema-driven record codec
//!
//! Control frames are described declaratively: each record type carries
//! a static [`Schema`] listing its fields and their wire attributes
//! (bit width, length prefix, the byte-bounding `limit` marker, the
//! `zlib` compressed tail). A single interpreter encodes and decodes
//! every record from its schema, so the quirky parts of the wire format
//! (bit packing, bounded regions, dictionary compression, the omitted
//! empty tail) live in exactly one place.
//!
//! Schemas are validated once and the verdict is cached under a
//! reader/writer lock; validation is idempotent and rejects records
//! that are not byte-aligned, carry more than one `limit`, use `zlib`
//! anywhere but on a last array field backed by a `limit`, or recurse.

use super::bits::{BitReader, BitWriter};
use super::{Error, Result};
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::{OnceLock, RwLock};

/// Wire description of one record type.
#[derive(Debug)]
pub struct Schema {
    pub name: &'static str,
    pub fields: &'static [Field],
}

/// Wire description of one field.
#[derive(Debug)]
pub struct Field {
    pub name: &'static str,
    pub kind: Kind,
    /// The value of this field bounds the byte span of all fields
    /// after it. Valid on byte-sized `Uint` fields only.
    pub limit: bool,
}

#[derive(Debug)]
pub enum Kind {
    /// Fixed-width unsigned integer of 1..=32 bits.
    Uint { bits: u32 },
    /// Length-prefixed string; the prefix is `lenbits` bits wide.
    Str { lenbits: u32 },
    /// Length-prefixed array of sub-records. A `zlib` array is fed
    /// through the connection's persistent dictionary-primed stream
    /// and omitted entirely when empty.
    Array {
        lenbits: u32,
        elem: &'static Schema,
        zlib: bool,
    },
}

impl Field {
    pub const fn uint(name: &'static str, bits: u32) -> Field {
        Field {
            name,
            kind: Kind::Uint { bits },
            limit: false,
        }
    }

    pub const fn uint_limit(name: &'static str, bits: u32) -> Field {
        Field {
            name,
            kind: Kind::Uint { bits },
            limit: true,
        }
    }

    pub const fn string(name: &'static str, lenbits: u32) -> Field {
        Field {
            name,
            kind: Kind::Str { lenbits },
            limit: false,
        }
    }

    pub const fn array(name: &'static str, lenbits: u32, elem: &'static Schema) -> Field {
        Field {
            name,
            kind: Kind::Array {
                lenbits,
                elem,
                zlib: false,
            },
            limit: false,
        }
    }

    pub const fn zlib_array(name: &'static str, lenbits: u32, elem: &'static Schema) -> Field {
        Field {
            name,
            kind: Kind::Array {
                lenbits,
                elem,
                zlib: true,
            },
            limit: false,
        }
    }
}

/// A decoded field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Uint(u32),
    Str(String),
    /// One inner `Vec<Value>` per array element, in element order.
    Array(Vec<Vec<Value>>),
}

/// Cursor over the values of a decoded record, consumed in field order.
pub struct Values {
    iter: std::vec::IntoIter<Value>,
}

impl Values {
    pub fn new(values: Vec<Value>) -> Values {
        Values {
            iter: values.into_iter(),
        }
    }

    fn next(&mut self, record: &'static str) -> Result<Value> {
        self.iter
            .next()
            .ok_or(Error::SchemaMismatch { record })
    }

    pub fn uint(&mut self, record: &'static str) -> Result<u32> {
        match self.next(record)? {
            Value::Uint(v) => Ok(v),
            _ => Err(Error::SchemaMismatch { record }),
        }
    }

    pub fn string(&mut self, record: &'static str) -> Result<String> {
        match self.next(record)? {
            Value::Str(v) => Ok(v),
            _ => Err(Error::SchemaMismatch { record }),
        }
    }

    pub fn array(&mut self, record: &'static str) -> Result<Vec<Vec<Value>>> {
        match self.next(record)? {
            Value::Array(v) => Ok(v),
            _ => Err(Error::SchemaMismatch { record }),
        }
    }

    /// Discard one value (padding and limit fields).
    pub fn skip(&mut self, record: &'static str) -> Result<()> {
        self.next(record).map(|_| ())
    }
}

/// A record type that can travel through the schema codec.
pub trait Record: Sized {
    fn schema() -> &'static Schema;
    fn to_values(&self) -> Vec<Value>;
    fn from_values(values: Values) -> Result<Self>;
}

fn validated_schemas() -> &'static RwLock<HashMap<usize, std::result::Result<(), String>>> {
    static CACHE: OnceLock<RwLock<HashMap<usize, std::result::Result<(), String>>>> =
        OnceLock::new();
    CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Validate a schema, caching the verdict by schema address.
pub fn ensure_valid(schema: &'static Schema) -> Result<()> {
    let key = schema as *const Schema as usize;
    if let Some(verdict) = validated_schemas()
        .read()
        .expect("schema cache poisoned")
        .get(&key)
    {
        return verdict
            .clone()
            .map_err(|msg| Error::InvalidSchema { msg });
    }
    let verdict = validate(schema, &mut Vec::new()).map_err(|e| match e {
        Error::InvalidSchema { msg } => msg,
        other => other.to_string(),
    });
    validated_schemas()
        .write()
        .expect("schema cache poisoned")
        .insert(key, verdict.clone());
    verdict.map_err(|msg| Error::InvalidSchema { msg })
}

fn schema_err(msg: String) -> Error {
    Error::InvalidSchema { msg }
}

fn validate(schema: &'static Schema, route: &mut Vec<&'static str>) -> Result<()> {
    if route.iter().any(|&name| name == schema.name) {
        return Err(schema_err(format!(
            "recursive record type {} via {}",
            schema.name,
            route.join(" -> ")
        )));
    }
    route.push(schema.name);

    let mut bit_offset: u64 = 0;
    let mut limit_seen = false;
    let last = schema.fields.len().saturating_sub(1);
    for (i, field) in schema.fields.iter().enumerate() {
        match field.kind {
            Kind::Uint { bits } => {
                if bits == 0 || bits > 32 {
                    return Err(schema_err(format!(
                        "{}.{}: bits {} out of range",
                        schema.name, field.name, bits
                    )));
                }
                if field.limit {
                    if limit_seen {
                        return Err(schema_err(format!(
                            "{}: more than one limit field",
                            schema.name
                        )));
                    }
                    limit_seen = true;
                    if bits % 8 != 0 {
                        return Err(schema_err(format!(
                            "{}.{}: limit field is not byte-sized",
                            schema.name, field.name
                        )));
                    }
                    if bit_offset % 8 != 0 {
                        return Err(schema_err(format!(
                            "{}: not byte-aligned before limit field {}",
                            schema.name, field.name
                        )));
                    }
                }
                bit_offset += u64::from(bits);
            }
            Kind::Str { lenbits } => {
                if field.limit {
                    return Err(schema_err(format!(
                        "{}.{}: limit on a string field",
                        schema.name, field.name
                    )));
                }
                check_lenbits(schema, field, lenbits)?;
                check_aligned(schema, field, bit_offset)?;
                bit_offset += u64::from(lenbits);
            }
            Kind::Array {
                lenbits,
                elem,
                zlib,
            } => {
                if field.limit {
                    return Err(schema_err(format!(
                        "{}.{}: limit on an array field",
                        schema.name, field.name
                    )));
                }
                check_lenbits(schema, field, lenbits)?;
                check_aligned(schema, field, bit_offset)?;
                if zlib {
                    if i != last {
                        return Err(schema_err(format!(
                            "{}.{}: zlib is only valid on the last field",
                            schema.name, field.name
                        )));
                    }
                    if !limit_seen {
                        return Err(schema_err(format!(
                            "{}.{}: zlib requires a preceding limit field",
                            schema.name, field.name
                        )));
                    }
                }
                validate(elem, route)?;
                bit_offset += u64::from(lenbits);
            }
        }
    }
    if bit_offset % 8 != 0 {
        return Err(schema_err(format!(
            "{}: record is not byte-aligned",
            schema.name
        )));
    }
    route.pop();
    Ok(())
}

fn check_lenbits(schema: &Schema, field: &Field, lenbits: u32) -> Result<()> {
    if lenbits == 0 || lenbits > 32 || lenbits % 8 != 0 {
        return Err(schema_err(format!(
            "{}.{}: lenbits {} is not a multiple of 8 in 8..=32",
            schema.name, field.name, lenbits
        )));
    }
    Ok(())
}

fn check_aligned(schema: &Schema, field: &Field, bit_offset: u64) -> Result<()> {
    if bit_offset % 8 != 0 {
        return Err(schema_err(format!(
            "{}: not byte-aligned before field {}",
            schema.name, field.name
        )));
    }
    Ok(())
}

/// Decodes records from a byte stream.
///
/// Owns the connection's single zlib decompression stream; the
/// dictionary is installed once, at connection start.
pub struct Decoder<R> {
    bits: BitReader<R>,
    zlib: Option<Decompress>,
    dict: Vec<u8>,
}

impl<R: Read> Decoder<R> {
    pub fn new(inner: R) -> Decoder<R> {
        Decoder {
            bits: BitReader::new(inner),
            zlib: None,
            dict: Vec::new(),
        }
    }

    pub fn set_zlib_dict(&mut self, dict: &[u8]) {
        self.dict = dict.to_vec();
    }

    pub fn read_bits(&mut self, count: u32) -> Result<u32> {
        self.bits.read_bits(count)
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.bits.read_exact(buf)
    }

    pub fn is_aligned(&self) -> bool {
        self.bits.is_aligned()
    }

    /// Decode one record according to its schema.
    pub fn decode(&mut self, schema: &'static Schema) -> Result<Vec<Value>> {
        ensure_valid(schema)?;
        let mut values = Vec::with_capacity(schema.fields.len());
        for field in schema.fields {
            match field.kind {
                Kind::Uint { bits } => {
                    let v = self.bits.read_bits(bits)?;
                    if field.limit {
                        self.bits.set_limit(u64::from(v));
                    }
                    values.push(Value::Uint(v));
                }
                Kind::Str { lenbits } => {
                    let v = decode_string(&mut self.bits, lenbits)?;
                    values.push(Value::Str(v));
                }
                Kind::Array {
                    lenbits,
                    elem,
                    zlib,
                } => {
                    let v = if zlib {
                        self.decode_zlib_array(lenbits, elem)?
                    } else {
                        decode_array(&mut self.bits, lenbits, elem)?
                    };
                    values.push(Value::Array(v));
                }
            }
        }
        // Drain whatever the record left unread inside its bounded
        // region so the next frame starts at the right byte.
        if let Some(remaining) = self.bits.limit_remaining() {
            if remaining > 0 {
                let mut junk = Vec::new();
                self.bits.take_limited(&mut junk)?;
            }
            self.bits.clear_limit();
        }
        if !self.bits.is_aligned() {
            return Err(Error::NotByteAligned);
        }
        Ok(values)
    }

    fn decode_zlib_array(
        &mut self,
        lenbits: u32,
        elem: &'static Schema,
    ) -> Result<Vec<Vec<Value>>> {
        let mut compressed = Vec::new();
        self.bits.take_limited(&mut compressed)?;
        // An omitted tail decodes as an empty array.
        if compressed.is_empty() {
            return Ok(Vec::new());
        }
        let dict = &self.dict;
        let zlib = self.zlib.get_or_insert_with(|| Decompress::new(true));
        let plain = inflate_block(zlib, &compressed, dict)?;
        let mut bits = BitReader::new(&plain[..]);
        decode_array(&mut bits, lenbits, elem)
    }
}

fn decode_string<R: Read>(bits: &mut BitReader<R>, lenbits: u32) -> Result<String> {
    let len = bits.read_bits(lenbits)?;
    let mut buf = vec![0u8; len as usize];
    bits.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|_| Error::InvalidStringEncoding)
}

fn decode_array<R: Read>(
    bits: &mut BitReader<R>,
    lenbits: u32,
    elem: &'static Schema,
) -> Result<Vec<Vec<Value>>> {
    let len = bits.read_bits(lenbits)?;
    let mut items = Vec::with_capacity(len.min(1024) as usize);
    for _ in 0..len {
        items.push(decode_fields(bits, elem)?);
    }
    Ok(items)
}

/// Decode a nested record, which the schema validator guarantees has
/// neither a `limit` nor a `zlib` field.
fn decode_fields<R: Read>(bits: &mut BitReader<R>, schema: &'static Schema) -> Result<Vec<Value>> {
    let mut values = Vec::with_capacity(schema.fields.len());
    for field in schema.fields {
        match field.kind {
            Kind::Uint { bits: width } => values.push(Value::Uint(bits.read_bits(width)?)),
            Kind::Str { lenbits } => values.push(Value::Str(decode_string(bits, lenbits)?)),
            Kind::Array { lenbits, elem, .. } => {
                values.push(Value::Array(decode_array(bits, lenbits, elem)?))
            }
        }
    }
    Ok(values)
}

/// Encodes records onto a byte stream.
///
/// Owns the connection's single zlib compression stream; the
/// dictionary is installed once, at connection start.
pub struct Encoder<W> {
    bits: BitWriter<W>,
    zlib: Option<Compress>,
    dict: Vec<u8>,
}

/// Compression level for header blocks.
const ZLIB_LEVEL: u32 = 7;

impl<W: Write> Encoder<W> {
    pub fn new(inner: W) -> Encoder<W> {
        Encoder {
            bits: BitWriter::new(inner),
            zlib: None,
            dict: Vec::new(),
        }
    }

    pub fn set_zlib_dict(&mut self, dict: &[u8]) {
        self.dict = dict.to_vec();
    }

    pub fn write_bits(&mut self, count: u32, value: u32) -> Result<()> {
        self.bits.write_bits(count, value)
    }

    pub fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.bits.write_all(buf)
    }

    pub fn is_aligned(&self) -> bool {
        self.bits.is_aligned()
    }

    pub fn flush(&mut self) -> Result<()> {
        self.bits.flush()
    }

    pub fn into_inner(self) -> W {
        self.bits.into_inner()
    }

    /// Encode one record according to its schema. The value supplied
    /// for a `limit` field is ignored; the codec computes it.
    pub fn encode(&mut self, schema: &'static Schema, values: &[Value]) -> Result<()> {
        ensure_valid(schema)?;
        if values.len() != schema.fields.len() {
            return Err(Error::SchemaMismatch {
                record: schema.name,
            });
        }
        let limit_at = schema.fields.iter().position(|f| f.limit);

        // Everything after the limit field is staged into a scratch
        // buffer whose final length becomes the limit value.
        let mut tail = BitWriter::new(Vec::new());
        for (i, (field, value)) in schema.fields.iter().zip(values).enumerate() {
            let staged = matches!(limit_at, Some(at) if i > at);
            if field.limit {
                continue;
            }
            match (&field.kind, value) {
                (Kind::Uint { bits }, Value::Uint(v)) => {
                    if staged {
                        tail.write_bits(*bits, *v)?;
                    } else {
                        self.bits.write_bits(*bits, *v)?;
                    }
                }
                (Kind::Str { lenbits }, Value::Str(v)) => {
                    if staged {
                        encode_string(&mut tail, *lenbits, v)?;
                    } else {
                        encode_string(&mut self.bits, *lenbits, v)?;
                    }
                }
                (
                    Kind::Array {
                        lenbits,
                        elem,
                        zlib,
                    },
                    Value::Array(items),
                ) => {
                    if *zlib {
                        // Validation pins zlib arrays behind the limit.
                        self.encode_zlib_array(&mut tail, *lenbits, elem, items)?;
                    } else if staged {
                        encode_array(&mut tail, *lenbits, elem, items)?;
                    } else {
                        encode_array(&mut self.bits, *lenbits, elem, items)?;
                    }
                }
                _ => {
                    return Err(Error::SchemaMismatch {
                        record: schema.name,
                    })
                }
            }
        }

        if let Some(at) = limit_at {
            if !tail.is_aligned() {
                return Err(Error::NotByteAligned);
            }
            let staged = tail.into_inner();
            let limit_bits = match schema.fields[at].kind {
                Kind::Uint { bits } => bits,
                _ => unreachable!("limit fields are uints"),
            };
            self.bits.write_bits(limit_bits, staged.len() as u32)?;
            self.bits.write_all(&staged)?;
        }
        if !self.bits.is_aligned() {
            return Err(Error::NotByteAligned);
        }
        Ok(())
    }

    fn encode_zlib_array(
        &mut self,
        tail: &mut BitWriter<Vec<u8>>,
        lenbits: u32,
        elem: &'static Schema,
        items: &[Vec<Value>],
    ) -> Result<()> {
        // An empty tail is omitted outright: no length prefix, no
        // zlib block.
        if items.is_empty() {
            return Ok(());
        }
        let mut plain = BitWriter::new(Vec::new());
        encode_array(&mut plain, lenbits, elem, items)?;
        let plain = plain.into_inner();
        let dict = &self.dict;
        let zlib = self.zlib.get_or_insert_with(|| {
            let mut z = Compress::new(Compression::new(ZLIB_LEVEL), true);
            let _ = z.set_dictionary(dict);
            z
        });
        let compressed = deflate_block(zlib, &plain)?;
        tail.write_all(&compressed)
    }
}

fn encode_string<W: Write>(bits: &mut BitWriter<W>, lenbits: u32, value: &str) -> Result<()> {
    bits.write_bits(lenbits, value.len() as u32)?;
    bits.write_all(value.as_bytes())
}

fn encode_array<W: Write>(
    bits: &mut BitWriter<W>,
    lenbits: u32,
    elem: &'static Schema,
    items: &[Vec<Value>],
) -> Result<()> {
    bits.write_bits(lenbits, items.len() as u32)?;
    for item in items {
        encode_fields(bits, elem, item)?;
    }
    Ok(())
}

fn encode_fields<W: Write>(
    bits: &mut BitWriter<W>,
    schema: &'static Schema,
    values: &[Value],
) -> Result<()> {
    if values.len() != schema.fields.len() {
        return Err(Error::SchemaMismatch {
            record: schema.name,
        });
    }
    for (field, value) in schema.fields.iter().zip(values) {
        match (&field.kind, value) {
            (Kind::Uint { bits: width }, Value::Uint(v)) => bits.write_bits(*width, *v)?,
            (Kind::Str { lenbits }, Value::Str(v)) => encode_string(bits, *lenbits, v)?,
            (Kind::Array { lenbits, elem, .. }, Value::Array(items)) => {
                encode_array(bits, *lenbits, elem, items)?
            }
            _ => {
                return Err(Error::SchemaMismatch {
                    record: schema.name,
                })
            }
        }
    }
    Ok(())
}

/// Run `input` through the persistent compressor, flushing with
/// Z_SYNC_FLUSH so the block is complete on the wire while the stream
/// state carries over to the next header block.
fn deflate_block(zlib: &mut Compress, input: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len() / 2 + 64);
    let mut consumed = 0usize;
    loop {
        let before_in = zlib.total_in();
        let before_out = out.len();
        if out.capacity() == out.len() {
            out.reserve(256);
        }
        let status = zlib
            .compress_vec(&input[consumed..], &mut out, FlushCompress::Sync)
            .map_err(|e| Error::Compression(e.to_string()))?;
        consumed += (zlib.total_in() - before_in) as usize;
        let produced = out.len() - before_out;
        match status {
            Status::Ok | Status::BufError => {
                // Done once all input is in and the flush fit.
                if consumed == input.len() && out.len() < out.capacity() {
                    return Ok(out);
                }
                if produced == 0 && consumed == input.len() {
                    return Ok(out);
                }
            }
            Status::StreamEnd => return Ok(out),
        }
    }
}

/// Inverse of [`deflate_block`] over the persistent decompressor.
fn inflate_block(zlib: &mut Decompress, input: &[u8], dict: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len() * 4 + 64);
    let mut consumed = 0usize;
    loop {
        let before_in = zlib.total_in();
        let before_out = out.len();
        if out.capacity() == out.len() {
            out.reserve(1024);
        }
        let status = match zlib.decompress_vec(&input[consumed..], &mut out, FlushDecompress::Sync)
        {
            Ok(status) => status,
            Err(e) if e.needs_dictionary().is_some() => {
                consumed += (zlib.total_in() - before_in) as usize;
                zlib.set_dictionary(dict)
                    .map_err(|e| Error::Compression(e.to_string()))?;
                continue;
            }
            Err(e) => return Err(Error::Compression(e.to_string())),
        };
        consumed += (zlib.total_in() - before_in) as usize;
        let produced = out.len() - before_out;
        match status {
            Status::Ok | Status::BufError => {
                if consumed == input.len() && out.len() < out.capacity() {
                    return Ok(out);
                }
                if produced == 0 && consumed == input.len() {
                    return Ok(out);
                }
            }
            Status::StreamEnd => return Ok(out),
        }
    }
}
