use core::fmt::{self, Display, Formatter};
use std::io::{self, Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc::{Crc, CRC_16_IBM_3740};

/// Most fields a single record may carry.
pub const MAX_FIELDS: usize = 32;
/// Largest record the encoder buffer can hold.
pub const MAX_RECORD_BYTES: usize = 96;
pub const MAX_FIELD_NAME_LEN: usize = 16;

pub const SCHEMA_MAGIC: [u8; 4] = *b"FCLG";
pub const SCHEMA_VERSION: u8 = 1;

const HEADER_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

pub type FieldName = heapless::String<MAX_FIELD_NAME_LEN>;

/// Numeric encoding of a logged value.
///
/// The discriminant is the code written in a persisted schema header; its
/// remainder modulo 50 is the bit width of the field.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Uint8 = 8,
    Uint16 = 16,
    Uint32 = 32,
    Int8 = 108,
    Int16 = 116,
    Int32 = 132,
    /// Fixed point, one decimal.
    Float16 = 216,
    /// Fixed point, three decimals.
    Float16k = 166,
    Float32 = 232,
    /// Monotonic timestamp in microseconds. 32 bits wide, values past
    /// `u32::MAX` (about 71.6 minutes) saturate.
    Time = 82,
}

impl FieldKind {
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn bit_width(self) -> u32 {
        (self as u8 % 50) as u32
    }

    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            FieldKind::Int8
                | FieldKind::Int16
                | FieldKind::Int32
                | FieldKind::Float16
                | FieldKind::Float16k
        )
    }

    /// Multiplier applied before rounding into a fixed-point field.
    pub const fn scale(self) -> Option<f64> {
        match self {
            FieldKind::Float16 => Some(10.0),
            FieldKind::Float16k => Some(1000.0),
            _ => None,
        }
    }

    /// Decimal places used when a decoded value is printed.
    pub const fn decimals(self) -> usize {
        match self {
            FieldKind::Float16 => 1,
            FieldKind::Float16k | FieldKind::Float32 => 3,
            _ => 0,
        }
    }

    /// Raw field bits for `value`, right aligned.
    ///
    /// Integer kinds saturate at their range, fixed-point kinds round to
    /// nearest.
    pub fn encode(self, value: f64) -> u32 {
        match self {
            FieldKind::Uint8 => value as u8 as u32,
            FieldKind::Uint16 => value as u16 as u32,
            FieldKind::Uint32 | FieldKind::Time => value as u32,
            FieldKind::Int8 => value as i8 as u8 as u32,
            FieldKind::Int16 => value as i16 as u16 as u32,
            FieldKind::Int32 => value as i32 as u32,
            FieldKind::Float16 | FieldKind::Float16k => {
                let scale = self.scale().unwrap_or(1.0);
                (value * scale).round() as i16 as u16 as u32
            }
            FieldKind::Float32 => (value as f32).to_bits(),
        }
    }

    /// Inverse of [`FieldKind::encode`]; bits above the field width are ignored.
    pub fn decode(self, raw: u32) -> f64 {
        match self {
            FieldKind::Uint8 => (raw as u8) as f64,
            FieldKind::Uint16 => (raw as u16) as f64,
            FieldKind::Uint32 | FieldKind::Time => raw as f64,
            FieldKind::Int8 => (raw as u8 as i8) as f64,
            FieldKind::Int16 => (raw as u16 as i16) as f64,
            FieldKind::Int32 => (raw as i32) as f64,
            FieldKind::Float16 => (raw as u16 as i16) as f64 / 10.0,
            FieldKind::Float16k => (raw as u16 as i16) as f64 / 1000.0,
            FieldKind::Float32 => f32::from_bits(raw) as f64,
        }
    }
}

impl TryFrom<u8> for FieldKind {
    type Error = SchemaError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        let kind = match code {
            8 => FieldKind::Uint8,
            16 => FieldKind::Uint16,
            32 => FieldKind::Uint32,
            108 => FieldKind::Int8,
            116 => FieldKind::Int16,
            132 => FieldKind::Int32,
            216 => FieldKind::Float16,
            166 => FieldKind::Float16k,
            232 => FieldKind::Float32,
            82 => FieldKind::Time,
            other => return Err(SchemaError::UnknownKind(other)),
        };
        Ok(kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: FieldName,
    pub kind: FieldKind,
}

/// Ordered, immutable list of the fields making up one telemetry record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetrySchema {
    fields: heapless::Vec<FieldDescriptor, MAX_FIELDS>,
    record_bits: u32,
}

impl TelemetrySchema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn kind_at(&self, index: usize) -> Option<FieldKind> {
        self.fields.get(index).map(|field| field.kind)
    }

    pub fn record_bits(&self) -> u32 {
        self.record_bits
    }

    pub fn record_bytes(&self) -> usize {
        self.record_bits.div_ceil(8) as usize
    }

    /// Serializes the schema as a self-describing header.
    ///
    /// Layout: magic, version, field count, then `(kind code, name length,
    /// name)` per field, closed by a little endian CRC-16 of everything before.
    pub fn encode_header(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + self.fields.len() * (2 + MAX_FIELD_NAME_LEN));
        // Writes into a Vec cannot fail.
        let _ = self.write_header_body(&mut out);
        let checksum = HEADER_CRC.checksum(&out);
        let _ = out.write_u16::<LittleEndian>(checksum);
        out
    }

    fn write_header_body<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(&SCHEMA_MAGIC)?;
        out.write_u8(SCHEMA_VERSION)?;
        out.write_u8(self.fields.len() as u8)?;
        for field in &self.fields {
            out.write_u8(field.kind.code())?;
            out.write_u8(field.name.len() as u8)?;
            out.write_all(field.name.as_bytes())?;
        }
        Ok(())
    }

    /// Parses a header produced by [`TelemetrySchema::encode_header`].
    ///
    /// Returns the schema and the number of bytes consumed, records start
    /// right after.
    pub fn decode_header(bytes: &[u8]) -> Result<(Self, usize), SchemaError> {
        let mut cursor = Cursor::new(bytes);

        let mut magic = [0_u8; 4];
        cursor.read_exact(&mut magic).map_err(truncated)?;
        if magic != SCHEMA_MAGIC {
            return Err(SchemaError::BadMagic);
        }
        let version = cursor.read_u8().map_err(truncated)?;
        if version != SCHEMA_VERSION {
            return Err(SchemaError::UnsupportedVersion(version));
        }

        let count = cursor.read_u8().map_err(truncated)?;
        let mut builder = SchemaBuilder::new();
        for _ in 0..count {
            let kind = FieldKind::try_from(cursor.read_u8().map_err(truncated)?)?;
            let name_len = cursor.read_u8().map_err(truncated)? as usize;
            let mut name = [0_u8; 255];
            cursor
                .read_exact(&mut name[..name_len])
                .map_err(truncated)?;
            let name =
                core::str::from_utf8(&name[..name_len]).map_err(|_| SchemaError::InvalidName)?;
            builder = builder.field(name, kind);
        }

        let body_len = cursor.position() as usize;
        let found = cursor.read_u16::<LittleEndian>().map_err(truncated)?;
        let expected = HEADER_CRC.checksum(&bytes[..body_len]);
        if found != expected {
            return Err(SchemaError::ChecksumMismatch { expected, found });
        }

        Ok((builder.build()?, body_len + 2))
    }
}

fn truncated(_: io::Error) -> SchemaError {
    SchemaError::TruncatedHeader
}

/// Builds a [`TelemetrySchema`] field by field.
///
/// The first field must be the record timestamp. Errors are kept until
/// [`SchemaBuilder::build`] so calls can be chained.
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    fields: heapless::Vec<FieldDescriptor, MAX_FIELDS>,
    record_bits: u32,
    error: Option<SchemaError>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &str, kind: FieldKind) -> Self {
        if self.error.is_some() {
            return self;
        }
        if let Err(error) = self.push(name, kind) {
            self.error = Some(error);
        }
        self
    }

    fn push(&mut self, name: &str, kind: FieldKind) -> Result<(), SchemaError> {
        let name = FieldName::try_from(name).map_err(|_| SchemaError::NameTooLong {
            name: name.to_string(),
        })?;
        let record_bits = self.record_bits + kind.bit_width();
        if record_bits.div_ceil(8) as usize > MAX_RECORD_BYTES {
            return Err(SchemaError::RecordTooLarge { bits: record_bits });
        }
        self.fields
            .push(FieldDescriptor { name, kind })
            .map_err(|_| SchemaError::TooManyFields)?;
        self.record_bits = record_bits;
        Ok(())
    }

    pub fn build(self) -> Result<TelemetrySchema, SchemaError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        match self.fields.first() {
            None => Err(SchemaError::Empty),
            Some(first) if first.kind != FieldKind::Time => Err(SchemaError::MissingTimestamp),
            Some(_) => Ok(TelemetrySchema {
                fields: self.fields,
                record_bits: self.record_bits,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    Empty,
    MissingTimestamp,
    TooManyFields,
    NameTooLong { name: String },
    RecordTooLarge { bits: u32 },
    UnknownKind(u8),
    BadMagic,
    UnsupportedVersion(u8),
    InvalidName,
    TruncatedHeader,
    ChecksumMismatch { expected: u16, found: u16 },
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            SchemaError::Empty => write!(f, "telemetry schema has no fields"),
            SchemaError::MissingTimestamp => {
                write!(f, "first telemetry field must be a timestamp")
            }
            SchemaError::TooManyFields => {
                write!(f, "telemetry schema exceeds {} fields", MAX_FIELDS)
            }
            SchemaError::NameTooLong { name } => write!(
                f,
                "field name '{}' exceeds {} bytes",
                name, MAX_FIELD_NAME_LEN
            ),
            SchemaError::RecordTooLarge { bits } => write!(
                f,
                "record of {} bits exceeds {} bytes",
                bits, MAX_RECORD_BYTES
            ),
            SchemaError::UnknownKind(code) => write!(f, "unknown field kind code {}", code),
            SchemaError::BadMagic => write!(f, "not a telemetry schema header"),
            SchemaError::UnsupportedVersion(version) => {
                write!(f, "unsupported schema version {}", version)
            }
            SchemaError::InvalidName => write!(f, "field name is not valid utf-8"),
            SchemaError::TruncatedHeader => write!(f, "schema header is truncated"),
            SchemaError::ChecksumMismatch { expected, found } => write!(
                f,
                "schema header checksum mismatch: expected {:#06x}, found {:#06x}",
                expected, found
            ),
        }
    }
}

impl std::error::Error for SchemaError {}
