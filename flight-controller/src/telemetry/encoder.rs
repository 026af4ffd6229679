use core::fmt::{self, Display, Formatter, Write};

use shared_definitions::telemetry::{
    FieldKind, FieldName, SchemaError, TelemetrySchema, MAX_FIELDS, MAX_RECORD_BYTES,
};

use crate::util::error::AppError;

pub type RecordBytes = heapless::Vec<u8, MAX_RECORD_BYTES>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    KindMismatch {
        index: usize,
        expected: FieldKind,
        found: FieldKind,
    },
    TooManyValues,
    IncompleteRecord {
        expected: usize,
        found: usize,
    },
    Overflow,
    Schema(SchemaError),
}

impl Display for RecordError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            RecordError::KindMismatch {
                index,
                expected,
                found,
            } => write!(
                f,
                "field {} logged as {:?}, schema expects {:?}",
                index, found, expected
            ),
            RecordError::TooManyValues => write!(f, "record has more values than its schema"),
            RecordError::IncompleteRecord { expected, found } => write!(
                f,
                "record flushed with {} of {} values",
                found, expected
            ),
            RecordError::Overflow => write!(f, "record exceeds {} bytes", MAX_RECORD_BYTES),
            RecordError::Schema(error) => write!(f, "discovered schema rejected: {}", error),
        }
    }
}

impl std::error::Error for RecordError {}

impl From<SchemaError> for RecordError {
    fn from(error: SchemaError) -> Self {
        RecordError::Schema(error)
    }
}

impl From<RecordError> for AppError {
    fn from(error: RecordError) -> Self {
        AppError::telemetry(error.to_string())
    }
}

/// Packs logged values into fixed-width records, least significant bit
/// first.
///
/// Records are checked against the schema value by value. In discovery mode
/// the first flushed record fixes the schema and every later record is held
/// to it.
pub struct TelemetryEncoder {
    schema: Option<TelemetrySchema>,
    buffer: [u8; MAX_RECORD_BYTES],
    bit_position: usize,
    kinds: heapless::Vec<FieldKind, MAX_FIELDS>,
}

impl TelemetryEncoder {
    pub fn new(schema: TelemetrySchema) -> Self {
        Self::with_schema(Some(schema))
    }

    /// Encoder whose schema is taken from the first complete record.
    pub fn discovery() -> Self {
        Self::with_schema(None)
    }

    fn with_schema(schema: Option<TelemetrySchema>) -> Self {
        TelemetryEncoder {
            schema,
            buffer: [0; MAX_RECORD_BYTES],
            bit_position: 0,
            kinds: heapless::Vec::new(),
        }
    }

    pub fn schema(&self) -> Option<&TelemetrySchema> {
        self.schema.as_ref()
    }

    pub fn log_value(&mut self, value: f64, kind: FieldKind) -> Result<(), RecordError> {
        let index = self.kinds.len();
        if let Some(schema) = &self.schema {
            match schema.kind_at(index) {
                None => return Err(RecordError::TooManyValues),
                Some(expected) if expected != kind => {
                    return Err(RecordError::KindMismatch {
                        index,
                        expected,
                        found: kind,
                    })
                }
                Some(_) => {}
            }
        }

        let width = kind.bit_width() as usize;
        if self.bit_position + width > MAX_RECORD_BYTES * 8 {
            return Err(RecordError::Overflow);
        }
        self.kinds
            .push(kind)
            .map_err(|_| RecordError::TooManyValues)?;

        let raw = kind.encode(value);
        for bit in 0..width {
            if (raw >> bit) & 1 == 1 {
                let position = self.bit_position + bit;
                self.buffer[position / 8] |= 1 << (position % 8);
            }
        }
        self.bit_position += width;
        Ok(())
    }

    /// Logs a whole record in schema order and flushes it.
    pub fn write_record(&mut self, values: &[f64]) -> Result<RecordBytes, RecordError> {
        let schema = self.schema.as_ref().ok_or(RecordError::IncompleteRecord {
            expected: 0,
            found: values.len(),
        })?;
        let kinds: heapless::Vec<FieldKind, MAX_FIELDS> =
            schema.fields().iter().map(|field| field.kind).collect();
        if values.len() != kinds.len() {
            return Err(RecordError::IncompleteRecord {
                expected: kinds.len(),
                found: values.len(),
            });
        }
        for (value, kind) in values.iter().zip(kinds) {
            if let Err(error) = self.log_value(*value, kind) {
                self.discard_record();
                return Err(error);
            }
        }
        self.flush_record()
    }

    /// Emits the pending record and zeroes the buffer.
    pub fn flush_record(&mut self) -> Result<RecordBytes, RecordError> {
        match &self.schema {
            Some(schema) if schema.len() != self.kinds.len() => {
                return Err(RecordError::IncompleteRecord {
                    expected: schema.len(),
                    found: self.kinds.len(),
                })
            }
            Some(_) => {}
            None => {
                let schema = match self.discover() {
                    Ok(schema) => schema,
                    Err(error) => {
                        self.discard_record();
                        return Err(error);
                    }
                };
                log::info!(
                    "Telemetry schema discovered, {} fields, {} bytes per record",
                    schema.len(),
                    schema.record_bytes()
                );
                self.schema = Some(schema);
            }
        }

        let length = self.bit_position.div_ceil(8);
        let record = RecordBytes::from_slice(&self.buffer[..length])
            .map_err(|_| RecordError::Overflow)?;
        self.discard_record();
        Ok(record)
    }

    /// Drops any values logged since the last flush.
    pub fn discard_record(&mut self) {
        self.buffer = [0; MAX_RECORD_BYTES];
        self.bit_position = 0;
        self.kinds.clear();
    }

    fn discover(&self) -> Result<TelemetrySchema, RecordError> {
        let mut builder = TelemetrySchema::builder();
        for (index, kind) in self.kinds.iter().enumerate() {
            let mut name = FieldName::new();
            if *kind == FieldKind::Time && index == 0 {
                name.push_str("time").map_err(|_| RecordError::Overflow)?;
            } else {
                write!(name, "field{}", index).map_err(|_| RecordError::Overflow)?;
            }
            builder = builder.field(&name, *kind);
        }
        Ok(builder.build()?)
    }
}
