use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use drone_flight_controller::communication_interfaces::controller::RemoteControl;
use drone_flight_controller::config::store::FlightConfig;
use drone_flight_controller::control::control_loops::FlightLoop;
use drone_flight_controller::control::failsafe::{AbortCause, LinkState};
use drone_flight_controller::control::inertial_measurement::imu_sensor_traits::{
    Accelerometer, Gyroscope, ImuSample, InertialSensor,
};
use drone_flight_controller::control::inertial_measurement::{start_estimator, ImuDevice};
use drone_flight_controller::control::yaw::YawMode;
use drone_flight_controller::output::motors_state_manager::MotorsStateManager;
use drone_flight_controller::telemetry::decoder::decode;
use drone_flight_controller::telemetry::storage::RecordSink;
use drone_flight_controller::telemetry::FlightRecorder;
use drone_flight_controller::util::error::{AppError, ErrorKind};
use drone_flight_controller::util::math::vectors::{AccelerationVector3D, RotationVector3D};
use drone_flight_controller::util::time::MonotonicClock;
use embedded_hal::delay::DelayNs;
use embedded_hal::pwm::{ErrorType, SetDutyCycle};
use shared_definitions::controller::ControllerPacket;

const TICK_US: u64 = 5_000;
const ABORT: u8 = 0b001;
const STANDBY: u8 = 0b010;
const LIGHT: u8 = 0b100;

#[derive(Clone, Default)]
struct Radio {
    queue: Rc<RefCell<VecDeque<ControllerPacket>>>,
}

impl Radio {
    fn send(&self, roll: u8, pitch: u8, throttle: u8, yaw: u8, flags: u8) {
        self.queue
            .borrow_mut()
            .push_back(ControllerPacket::from_bytes([
                roll, pitch, throttle, yaw, 127, 0, flags,
            ]));
    }

    fn centered(&self, flags: u8) {
        self.send(127, 127, 127, 127, flags);
    }
}

impl RemoteControl for Radio {
    fn read_packet(&mut self) -> Option<ControllerPacket> {
        self.queue.borrow_mut().pop_front()
    }
}

struct Pwm {
    duty: Rc<Cell<u16>>,
}

impl ErrorType for Pwm {
    type Error = core::convert::Infallible;
}

impl SetDutyCycle for Pwm {
    fn max_duty_cycle(&self) -> u16 {
        1_000
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.duty.set(duty);
        Ok(())
    }
}

struct LevelImu;

impl Accelerometer for LevelImu {
    fn get_acceleration_vector(&mut self) -> AccelerationVector3D {
        AccelerationVector3D {
            x: 0.0,
            y: 0.0,
            z: 1.0,
        }
    }
}

impl Gyroscope for LevelImu {
    fn get_rotation_rates(&mut self) -> RotationVector3D {
        RotationVector3D::default()
    }
}

impl InertialSensor for LevelImu {
    fn initialize(&mut self) -> Result<(), AppError> {
        Ok(())
    }

    fn data_ready(&mut self) -> bool {
        true
    }
}

fn level_sample() -> Option<ImuSample> {
    LevelImu.read_sample()
}

/// Fake time: the clock only moves when the loop sleeps.
#[derive(Clone, Default)]
struct SimulatedTime {
    now_us: Rc<Cell<u64>>,
}

impl MonotonicClock for SimulatedTime {
    fn now_us(&self) -> u64 {
        self.now_us.get()
    }
}

impl DelayNs for SimulatedTime {
    fn delay_ns(&mut self, ns: u32) {
        self.now_us.set(self.now_us.get() + u64::from(ns) / 1_000);
    }
}

#[derive(Clone, Default)]
struct SharedLog {
    bytes: Rc<RefCell<Vec<u8>>>,
}

impl RecordSink for SharedLog {
    fn write_record(&mut self, bytes: &[u8]) -> Result<(), AppError> {
        self.bytes.borrow_mut().extend_from_slice(bytes);
        Ok(())
    }
}

/// Clock that moves forward by a fixed step on every reading.
struct SteppingClock {
    now_us: Cell<u64>,
    step_us: u64,
}

impl MonotonicClock for SteppingClock {
    fn now_us(&self) -> u64 {
        let now_us = self.now_us.get();
        self.now_us.set(now_us + self.step_us);
        now_us
    }
}

struct Rig {
    flight: FlightLoop<Radio, Pwm>,
    radio: Radio,
    duties: Vec<Rc<Cell<u16>>>,
    log: SharedLog,
}

impl Rig {
    fn new() -> Self {
        Self::try_build(None).unwrap()
    }

    /// `layout` overrides the axis names and motor count the recorder is
    /// built for.
    fn try_build(layout: Option<(&[&str], usize)>) -> Result<Self, AppError> {
        let config = FlightConfig::default();
        let radio = Radio::default();
        let duties: Vec<Rc<Cell<u16>>> = (0..config.motor_count())
            .map(|_| Rc::new(Cell::new(0)))
            .collect();
        let motors = MotorsStateManager::new(
            duties.iter().map(|duty| Pwm { duty: duty.clone() }),
            &config.motors,
        )?;

        let mut imu = LevelImu;
        let mut time = SimulatedTime::default();
        let estimator =
            start_estimator(&config.estimator, ImuDevice::Inertial(&mut imu), &mut time)?;

        let axis_names: Vec<&str> = config.axes.iter().map(|axis| axis.name).collect();
        let (recorder_axes, recorder_motors) =
            layout.unwrap_or((axis_names.as_slice(), config.motor_count()));
        let log = SharedLog::default();
        let recorder = FlightRecorder::new(
            recorder_axes,
            recorder_motors,
            Box::new(log.clone()),
            config.telemetry.log_every_n_ticks,
        )?;

        let mut flight =
            FlightLoop::new(&config, radio.clone(), estimator, motors, Some(recorder))?;
        flight.arm(&mut time)?;

        Ok(Rig {
            flight,
            radio,
            duties,
            log,
        })
    }

    fn decoded_rows(&self) -> Vec<Vec<f64>> {
        let schema = self.flight.recorder().unwrap().schema().unwrap().clone();
        decode(&schema, &self.log.bytes.borrow())
            .into_iter()
            .map(|row| row.values)
            .collect()
    }

    /// Position of a field in a decoded row, the time delta column included.
    fn column(&self, name: &str) -> usize {
        let schema = self.flight.recorder().unwrap().schema().unwrap();
        let index = schema
            .fields()
            .iter()
            .position(|field| field.name.as_str() == name)
            .unwrap();
        index + 1
    }

    fn duties(&self) -> Vec<u16> {
        self.duties.iter().map(|duty| duty.get()).collect()
    }
}

#[test]
fn arming_leaves_motors_at_zero_duty() {
    let rig = Rig::new();
    assert_eq!(rig.duties(), vec![500; 4]);
}

#[test]
fn motors_stay_off_until_first_packet() {
    let mut rig = Rig::new();
    let outcome = rig.flight.tick(0, level_sample());
    assert!(outcome.standby);
    assert!(outcome.motor_commands.iter().all(|command| *command == 0.0));
}

#[test]
fn centered_sticks_hover_evenly() {
    let mut rig = Rig::new();
    let mut outcome = None;
    for tick in 0..20 {
        rig.radio.centered(0);
        outcome = Some(rig.flight.tick(tick * TICK_US, level_sample()));
    }
    let outcome = outcome.unwrap();

    assert_eq!(outcome.state, LinkState::Linked);
    assert_eq!(outcome.yaw_mode, Some(YawMode::RateHold));
    let first = outcome.motor_commands[0];
    assert!(first > 440.0 && first < 460.0, "{:?}", outcome);
    assert!(outcome.motor_commands.iter().all(|command| *command == first));
    let duties = rig.duties();
    assert!(duties.iter().all(|duty| *duty == duties[0] && *duty > 700));
}

#[test]
fn roll_stick_tilts_towards_the_command() {
    let mut rig = Rig::new();
    let mut outcome = None;
    for tick in 0..3 {
        rig.radio.send(254, 127, 127, 127, 0);
        outcome = Some(rig.flight.tick(tick * TICK_US, level_sample()));
    }
    let commands = outcome.unwrap().motor_commands;
    // Positive roll raises the left motors (slots 1 and 3).
    assert!(commands[1] > commands[0]);
    assert!(commands[3] > commands[2]);
}

#[test]
fn deflected_yaw_stick_takes_direct_control() {
    let mut rig = Rig::new();
    rig.radio.send(127, 127, 127, 200, 0);
    let outcome = rig.flight.tick(0, level_sample());
    assert_eq!(outcome.yaw_mode, Some(YawMode::StickControl));
}

#[test]
fn link_loss_aborts_and_zeroes_motors() {
    let mut rig = Rig::new();
    rig.radio.centered(0);
    rig.flight.tick(0, level_sample());
    assert!(rig.duties()[0] > 500);

    let mut now = 0;
    let mut state = LinkState::Linked;
    while state != LinkState::Aborted {
        now += TICK_US;
        assert!(now <= 1_000_000, "never aborted");
        state = rig.flight.tick(now, level_sample()).state;
    }

    assert!(now > 900_000);
    assert_eq!(rig.flight.failsafe().abort_cause(), Some(AbortCause::LinkSilence));
    assert_eq!(rig.duties(), vec![500; 4]);

    // A late packet does not bring the motors back.
    rig.radio.centered(0);
    let outcome = rig.flight.tick(now + TICK_US, level_sample());
    assert_eq!(outcome.state, LinkState::Aborted);
    assert_eq!(rig.duties(), vec![500; 4]);
}

#[test]
fn abort_flag_stops_immediately() {
    let mut rig = Rig::new();
    rig.radio.centered(0);
    rig.flight.tick(0, level_sample());
    rig.radio.send(200, 30, 254, 127, ABORT);
    let outcome = rig.flight.tick(TICK_US, level_sample());

    assert_eq!(outcome.state, LinkState::Aborted);
    assert_eq!(rig.flight.failsafe().abort_cause(), Some(AbortCause::AbortFlag));
    assert_eq!(rig.duties(), vec![500; 4]);
}

#[test]
fn standby_holds_motors_without_aborting() {
    let mut rig = Rig::new();
    for tick in 0..10 {
        rig.radio.centered(STANDBY | LIGHT);
        let outcome = rig.flight.tick(tick * TICK_US, level_sample());
        assert!(outcome.standby);
        assert!(outcome.light);
        assert_eq!(outcome.state, LinkState::Linked);
    }
    assert_eq!(rig.duties(), vec![500; 4]);

    rig.radio.centered(0);
    let outcome = rig.flight.tick(10 * TICK_US, level_sample());
    assert!(!outcome.standby);
    assert!(rig.duties()[0] > 500);
}

#[test]
fn every_fourth_tick_is_recorded() {
    let mut rig = Rig::new();
    for tick in 0..10 {
        rig.radio.centered(0);
        rig.flight.tick(tick * TICK_US, level_sample());
    }
    let recorder = rig.flight.recorder().unwrap();
    assert_eq!(recorder.records_written(), 3);
    assert_eq!(recorder.failures(), 0);

    let rows = rig.decoded_rows();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1][1], 4.0 * TICK_US as f64);
}

#[test]
fn standby_and_abort_ticks_are_recorded() {
    let mut rig = Rig::new();
    for tick in 0..8 {
        rig.radio.centered(STANDBY);
        rig.flight.tick(tick * TICK_US, level_sample());
    }
    rig.radio.centered(ABORT);
    let outcome = rig.flight.tick(8 * TICK_US, level_sample());
    assert_eq!(outcome.state, LinkState::Aborted);

    let recorder = rig.flight.recorder().unwrap();
    assert_eq!(recorder.records_written(), 3);
    assert_eq!(recorder.failures(), 0);

    let rows = rig.decoded_rows();
    assert_eq!(rows.len(), 3);
    let link = rig.column("link");
    assert_eq!(rows[0][link], 0.0);
    assert_eq!(rows[2][link], 2.0);
    for name in ["out_roll", "out_pitch", "out_yaw", "m0", "m3", "throttle"] {
        assert_eq!(rows[2][rig.column(name)], 0.0, "{}", name);
    }
}

#[test]
fn recorder_for_another_layout_is_rejected() {
    let axes: &[&str] = &["roll"];
    let result = Rig::try_build(Some((axes, 2)));
    let error = result.err().unwrap();
    assert_eq!(error.kind, ErrorKind::Config);
}

#[test]
fn timed_ticks_record_stage_durations() {
    let mut rig = Rig::new();
    let clock = SteppingClock {
        now_us: Cell::new(0),
        step_us: 7,
    };
    for _ in 0..5 {
        rig.radio.centered(0);
        rig.flight.tick_timed(&clock, level_sample());
    }
    assert_eq!(rig.flight.context().stage_us, [7, 7, 7, 7]);

    let rows = rig.decoded_rows();
    assert_eq!(rows.len(), 2);
    for name in ["t_link", "t_estimator", "t_control", "t_motors"] {
        assert_eq!(rows[1][rig.column(name)], 7.0, "{}", name);
    }
}

#[test]
fn run_loop_returns_on_link_silence() {
    let mut rig = Rig::new();
    let time = SimulatedTime::default();
    let mut delay = time.clone();
    rig.radio.centered(0);

    let cause = rig
        .flight
        .run_until_aborted(&time, &mut delay, level_sample);

    assert_eq!(cause, AbortCause::LinkSilence);
    let elapsed = time.now_us();
    assert!(elapsed > 900_000 && elapsed < 1_000_000, "{}", elapsed);
    assert_eq!(rig.duties(), vec![500; 4]);
}
