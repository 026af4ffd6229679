use std::io::{self, Write};

use shared_definitions::telemetry::{FieldKind, SchemaError, TelemetrySchema};

/// One decoded record. A time field contributes two values, the absolute
/// timestamp followed by its delta from the previous record.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRow {
    pub values: Vec<f64>,
}

fn read_bits(stream: &[u8], start: usize, width: usize) -> u32 {
    let mut raw = 0_u32;
    for bit in 0..width {
        let position = start + bit;
        if (stream[position / 8] >> (position % 8)) & 1 == 1 {
            raw |= 1 << bit;
        }
    }
    raw
}

/// Splits `stream` into records of `schema` and decodes every field.
///
/// A trailing partial record is dropped.
pub fn decode(schema: &TelemetrySchema, stream: &[u8]) -> Vec<DecodedRow> {
    let record_bytes = schema.record_bytes();
    if record_bytes == 0 {
        return Vec::new();
    }
    let trailing = stream.len() % record_bytes;
    if trailing != 0 {
        log::warn!(
            "Dropping {} trailing bytes of a partial telemetry record",
            trailing
        );
    }

    let mut previous_times = vec![0.0_f64; schema.len()];
    stream
        .chunks_exact(record_bytes)
        .map(|record| {
            let mut values = Vec::with_capacity(schema.len() + 1);
            let mut position = 0;
            for (index, field) in schema.fields().iter().enumerate() {
                let width = field.kind.bit_width() as usize;
                let value = field.kind.decode(read_bits(record, position, width));
                position += width;

                values.push(value);
                if field.kind == FieldKind::Time {
                    values.push(value - previous_times[index]);
                    previous_times[index] = value;
                }
            }
            DecodedRow { values }
        })
        .collect()
}

/// Decodes a stream that starts with a persisted schema header.
pub fn decode_with_header(
    stream: &[u8],
) -> Result<(TelemetrySchema, Vec<DecodedRow>), SchemaError> {
    let (schema, consumed) = TelemetrySchema::decode_header(stream)?;
    let rows = decode(&schema, &stream[consumed..]);
    Ok((schema, rows))
}

/// Writes a header row and one comma separated row per record.
pub fn write_csv<W: Write>(
    schema: &TelemetrySchema,
    rows: &[DecodedRow],
    writer: &mut W,
) -> io::Result<()> {
    let mut columns = Vec::with_capacity(schema.len() + 1);
    let mut decimals = Vec::with_capacity(schema.len() + 1);
    for field in schema.fields() {
        columns.push(field.name.to_string());
        decimals.push(field.kind.decimals());
        if field.kind == FieldKind::Time {
            columns.push(format!("{}_delta", field.name));
            decimals.push(field.kind.decimals());
        }
    }
    writeln!(writer, "{}", columns.join(","))?;

    for row in rows {
        let line: Vec<String> = row
            .values
            .iter()
            .zip(decimals.iter())
            .map(|(value, precision)| format!("{:.*}", *precision, value))
            .collect();
        writeln!(writer, "{}", line.join(","))?;
    }
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::encoder::TelemetryEncoder;

    fn schema() -> TelemetrySchema {
        TelemetrySchema::builder()
            .field("time", FieldKind::Time)
            .field("roll", FieldKind::Float16)
            .field("gain", FieldKind::Float16k)
            .field("m0", FieldKind::Uint16)
            .field("temp", FieldKind::Int8)
            .build()
            .unwrap()
    }

    fn stream(records: &[[f64; 5]]) -> Vec<u8> {
        let mut encoder = TelemetryEncoder::new(schema());
        records
            .iter()
            .flat_map(|record| encoder.write_record(record).unwrap())
            .collect()
    }

    #[test]
    fn decodes_values_within_kind_precision() {
        let rows = decode(&schema(), &stream(&[[1_000.0, -12.34, 1.2345, 700.0, -5.0]]));
        assert_eq!(rows.len(), 1);
        let values = &rows[0].values;
        assert_eq!(values[0], 1_000.0);
        assert!((values[2] + 12.3).abs() < 1e-9);
        assert!(values[3] == 1.234 || values[3] == 1.235);
        assert_eq!(values[4], 700.0);
        assert_eq!(values[5], -5.0);
    }

    #[test]
    fn timestamp_expands_into_absolute_and_delta() {
        let rows = decode(
            &schema(),
            &stream(&[
                [1_000.0, 0.0, 0.0, 0.0, 0.0],
                [6_000.0, 0.0, 0.0, 0.0, 0.0],
                [11_500.0, 0.0, 0.0, 0.0, 0.0],
            ]),
        );
        let times: Vec<(f64, f64)> = rows
            .iter()
            .map(|row| (row.values[0], row.values[1]))
            .collect();
        assert_eq!(
            times,
            vec![(1_000.0, 1_000.0), (6_000.0, 5_000.0), (11_500.0, 5_500.0)]
        );
    }

    #[test]
    fn partial_record_is_dropped() {
        let mut bytes = stream(&[[1.0, 0.0, 0.0, 0.0, 0.0], [2.0, 0.0, 0.0, 0.0, 0.0]]);
        bytes.truncate(bytes.len() - 1);
        assert_eq!(decode(&schema(), &bytes).len(), 1);
    }

    #[test]
    fn header_carries_schema_to_decoder() {
        let mut bytes = schema().encode_header();
        bytes.extend(stream(&[[42.0, 1.5, 0.0, 3.0, 0.0]]));

        let (decoded_schema, rows) = decode_with_header(&bytes).unwrap();
        assert_eq!(decoded_schema, schema());
        assert_eq!(rows[0].values[0], 42.0);
        assert_eq!(rows[0].values[2], 1.5);
    }

    #[test]
    fn csv_uses_kind_precision() {
        let rows = decode(&schema(), &stream(&[[5_000.0, 12.3, -0.5, 900.0, 7.0]]));
        let mut out = Vec::new();
        write_csv(&schema(), &rows, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("time,time_delta,roll,gain,m0,temp"));
        assert_eq!(lines.next(), Some("5000,5000,12.3,-0.500,900,7"));
        assert_eq!(lines.next(), None);
    }
}
