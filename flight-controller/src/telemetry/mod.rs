//! Flight data recording: bit packed records, their decoder and the log files
//! they are stored in.

pub mod decoder;
pub mod encoder;
pub mod storage;

use shared_definitions::telemetry::{FieldKind, SchemaError, TelemetrySchema};

use self::encoder::{RecordError, TelemetryEncoder};
use self::storage::RecordSink;
use crate::control::failsafe::LinkState;
use crate::shared_core_values::{TickContext, TickStage};
use crate::util::error::AppError;

const ATTITUDE_FIELDS: [&str; 6] = [
    "roll",
    "pitch",
    "yaw",
    "roll_rate",
    "pitch_rate",
    "yaw_rate",
];

/// Record layout of the flight loop for the given axes and motor count.
pub fn flight_schema(
    axis_names: &[&str],
    motor_count: usize,
) -> Result<TelemetrySchema, SchemaError> {
    let mut builder = TelemetrySchema::builder().field("time", FieldKind::Time);
    for name in ATTITUDE_FIELDS {
        builder = builder.field(name, FieldKind::Float16);
    }
    builder = builder.field("throttle", FieldKind::Float16k);
    for name in axis_names {
        builder = builder.field(&format!("out_{}", name), FieldKind::Float16k);
    }
    for motor in 0..motor_count {
        builder = builder.field(&format!("m{}", motor), FieldKind::Uint16);
    }
    builder = builder.field("link", FieldKind::Uint8);
    for stage in TickStage::ALL {
        builder = builder.field(stage.field_name(), FieldKind::Uint16);
    }
    builder.build()
}

fn link_code(state: LinkState) -> f64 {
    match state {
        LinkState::Linked => 0.0,
        LinkState::Degraded => 1.0,
        LinkState::Aborted => 2.0,
    }
}

/// Writes one record of [`flight_schema`] every `every_n_ticks` ticks.
///
/// Every record carries one value per axis and motor the recorder was built
/// for, whatever the tick published. Failures never reach the control loop.
/// They are counted and logged when recording starts or stops failing.
pub struct FlightRecorder {
    encoder: TelemetryEncoder,
    sink: Box<dyn RecordSink>,
    every_n_ticks: u32,
    axis_count: usize,
    motor_count: usize,
    start_us: Option<u64>,
    records_written: u64,
    failures: u64,
    failing: bool,
    time_saturated: bool,
}

impl FlightRecorder {
    pub fn new(
        axis_names: &[&str],
        motor_count: usize,
        sink: Box<dyn RecordSink>,
        every_n_ticks: u32,
    ) -> Result<Self, AppError> {
        if every_n_ticks == 0 {
            return Err(AppError::config("telemetry divider must be positive"));
        }
        let schema = flight_schema(axis_names, motor_count)?;
        Ok(FlightRecorder {
            encoder: TelemetryEncoder::new(schema),
            sink,
            every_n_ticks,
            axis_count: axis_names.len(),
            motor_count,
            start_us: None,
            records_written: 0,
            failures: 0,
            failing: false,
            time_saturated: false,
        })
    }

    pub fn record(&mut self, context: &TickContext) {
        if context.tick % u64::from(self.every_n_ticks) != 0 {
            return;
        }
        match self.write(context) {
            Ok(()) => {
                if self.failing {
                    log::info!("Telemetry recording resumed");
                    self.failing = false;
                }
                self.records_written += 1;
            }
            Err(error) => {
                self.failures += 1;
                if !self.failing {
                    log::error!("Telemetry record dropped: {}", error);
                    self.failing = true;
                }
            }
        }
    }

    fn write(&mut self, context: &TickContext) -> Result<(), AppError> {
        if let Err(error) = self.log_fields(context) {
            self.encoder.discard_record();
            return Err(error.into());
        }
        let record = self.encoder.flush_record()?;
        self.sink.write_record(&record)
    }

    fn log_fields(&mut self, context: &TickContext) -> Result<(), RecordError> {
        let start_us = *self.start_us.get_or_insert(context.now_us);
        let elapsed_us = context.now_us.saturating_sub(start_us);
        if elapsed_us > u64::from(u32::MAX) && !self.time_saturated {
            log::warn!("Telemetry time field saturated after {}us", u32::MAX);
            self.time_saturated = true;
        }
        let angles = context.attitude.angles;
        let rates = context.attitude.rates;

        self.encoder.log_value(elapsed_us as f64, FieldKind::Time)?;
        for value in [
            angles.roll,
            angles.pitch,
            angles.yaw,
            rates.roll,
            rates.pitch,
            rates.yaw,
        ] {
            self.encoder.log_value(f64::from(value), FieldKind::Float16)?;
        }
        self.encoder
            .log_value(f64::from(context.base_throttle), FieldKind::Float16k)?;
        for axis in 0..self.axis_count {
            let output = context.axis_outputs.get(axis).copied().unwrap_or(0.0);
            self.encoder.log_value(f64::from(output), FieldKind::Float16k)?;
        }
        for motor in 0..self.motor_count {
            let command = context.motor_commands.get(motor).copied().unwrap_or(0.0);
            self.encoder.log_value(f64::from(command), FieldKind::Uint16)?;
        }
        self.encoder.log_value(link_code(context.link), FieldKind::Uint8)?;
        for stage_us in context.stage_us {
            self.encoder.log_value(f64::from(stage_us), FieldKind::Uint16)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), AppError> {
        self.sink.flush()
    }

    pub fn schema(&self) -> Option<&TelemetrySchema> {
        self.encoder.schema()
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Whether the relative time has outgrown the 32-bit time field.
    pub fn time_saturated(&self) -> bool {
        self.time_saturated
    }
}
