use embedded_hal::delay::DelayNs;
use embedded_hal::pwm::SetDutyCycle;

use super::failsafe::{AbortCause, FailsafeSupervisor, LinkState, PacketEvent};
use super::inertial_measurement::imu_sensor_traits::ImuSample;
use super::inertial_measurement::AttitudeEstimator;
use super::pid::AxisController;
use super::yaw::{YawMode, YawPolicy};
use crate::communication_interfaces::controller::RemoteControl;
use crate::communication_interfaces::link_channel::{LinkChannel, StickAxis};
use crate::config::constants::{MAX_AXES, MAX_INPUT_ROUTES, MAX_MOTORS};
use crate::config::store::FlightConfig;
use crate::output::mixer::{AxisRoute, InputRoute, InputTarget, MotorMixer, ThrottleCurve};
use crate::output::motors_state_manager::MotorsStateManager;
use crate::shared_core_values::{TickContext, TickStage};
use crate::telemetry::{flight_schema, FlightRecorder};
use crate::util::error::AppError;
use crate::util::time::{elapsed_seconds, MonotonicClock, StageTimer};

/// What one tick decided, for the board code around the loop.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub state: LinkState,
    pub motor_commands: heapless::Vec<f32, MAX_MOTORS>,
    pub light: bool,
    pub standby: bool,
    pub yaw_mode: Option<YawMode>,
}

struct AxisSlot {
    controller: AxisController,
    route: AxisRoute,
    yaw: Option<YawPolicy>,
}

fn zero_commands(count: usize) -> heapless::Vec<f32, MAX_MOTORS> {
    (0..count).map(|_| 0.0).collect()
}

/// The fixed-rate flight pipeline: link, attitude, failsafe, PID bank,
/// mixer, motors and telemetry, in that order every tick.
pub struct FlightLoop<R: RemoteControl, P: SetDutyCycle> {
    link: LinkChannel<R>,
    estimator: Box<dyn AttitudeEstimator>,
    failsafe: FailsafeSupervisor,
    axes: heapless::Vec<AxisSlot, MAX_AXES>,
    inputs: heapless::Vec<InputRoute, MAX_INPUT_ROUTES>,
    mixer: MotorMixer,
    throttle: ThrottleCurve,
    motors: MotorsStateManager<P>,
    recorder: Option<FlightRecorder>,
    loop_period_us: u32,
    context: TickContext,
    last_tick_us: Option<u64>,
    motors_killed: bool,
}

impl<R: RemoteControl, P: SetDutyCycle> FlightLoop<R, P> {
    pub fn new(
        config: &FlightConfig,
        remote: R,
        estimator: Box<dyn AttitudeEstimator>,
        motors: MotorsStateManager<P>,
        recorder: Option<FlightRecorder>,
    ) -> Result<Self, AppError> {
        config.validate()?;
        if motors.motor_count() != config.motor_count() {
            return Err(AppError::config(format!(
                "{} motor outputs given for a {} motor mixer",
                motors.motor_count(),
                config.motor_count()
            )));
        }

        if let Some(recorder) = &recorder {
            let axis_names: heapless::Vec<&str, MAX_AXES> =
                config.axes.iter().map(|axis| axis.name).collect();
            let expected = flight_schema(&axis_names, config.motor_count())?;
            if recorder.schema() != Some(&expected) {
                return Err(AppError::config(format!(
                    "flight recorder layout does not match {} axes and {} motors",
                    config.axes.len(),
                    config.motor_count()
                )));
            }
        }

        let axes = config
            .axes
            .iter()
            .map(|axis| AxisSlot {
                controller: AxisController::configure(
                    axis.gains,
                    axis.target,
                    axis.current,
                    axis.derivative,
                ),
                route: axis.route.clone(),
                yaw: axis.yaw,
            })
            .collect();

        Ok(FlightLoop {
            link: LinkChannel::new(remote, config.link.clone()),
            estimator,
            failsafe: FailsafeSupervisor::new(&config.failsafe),
            axes,
            inputs: config.mixer.inputs.clone(),
            mixer: MotorMixer::new(&config.mixer.trims, config.mixer.max_value)?,
            throttle: config.mixer.throttle,
            motors,
            recorder,
            loop_period_us: config.loop_period_us,
            context: TickContext::default(),
            last_tick_us: None,
            motors_killed: false,
        })
    }

    /// Arms the ESCs. Call once before the first tick.
    pub fn arm<D: DelayNs + ?Sized>(&mut self, delay: &mut D) -> Result<(), AppError> {
        self.motors.arm(delay)
    }

    /// Runs one tick at `now_us`. Stage durations are recorded as zero.
    pub fn tick(&mut self, now_us: u64, sample: Option<ImuSample>) -> TickOutcome {
        self.step(now_us, sample, None)
    }

    /// Runs one tick stamped and timed by `clock`.
    pub fn tick_timed(
        &mut self,
        clock: &dyn MonotonicClock,
        sample: Option<ImuSample>,
    ) -> TickOutcome {
        self.step(clock.now_us(), sample, Some(clock))
    }

    fn step(
        &mut self,
        now_us: u64,
        sample: Option<ImuSample>,
        clock: Option<&dyn MonotonicClock>,
    ) -> TickOutcome {
        let mut timer = StageTimer::start_at(clock, now_us);
        let dt_s = match self.last_tick_us {
            Some(previous_us) => elapsed_seconds(previous_us, now_us),
            None => 0.0,
        };
        self.last_tick_us = Some(now_us);

        let fresh_packet = self.link.poll();
        let stick = *self.link.stick();
        self.context.stage_us[TickStage::Link as usize] = timer.lap();

        let attitude = self.estimator.update(sample.as_ref(), dt_s);
        self.context.stage_us[TickStage::Estimator as usize] = timer.lap();

        let packet = fresh_packet.then(|| PacketEvent {
            abort_flag: self.link.abort_requested(),
        });
        let mut state = self.failsafe.update(now_us, packet);

        let context = &mut self.context;
        context.now_us = now_us;
        context.dt_s = dt_s;
        context.stick = stick;
        context.attitude = attitude;
        context.yaw_mode = None;

        // Nothing spins before the pilot has been heard from.
        let standby = stick.standby() || self.link.received_packets() == 0;
        let idle = standby || state == LinkState::Aborted;

        if idle {
            self.publish_idle_outputs();
        } else {
            self.run_controllers();
        }
        self.context.stage_us[TickStage::Controllers as usize] = timer.lap();

        if state == LinkState::Aborted {
            self.kill_once();
        } else {
            if !idle {
                self.mix();
            }
            let commands = self.context.motor_commands.clone();
            if let Err(error) = self.motors.set_motor_power(&commands) {
                if standby {
                    log::error!("Motor write failed in standby: {}", error);
                } else {
                    log::error!("Motor write failed: {}", error);
                    self.failsafe.abort(AbortCause::Fatal);
                    self.kill_once();
                    self.context.motor_commands = zero_commands(self.mixer.motor_count());
                    state = LinkState::Aborted;
                }
            }
        }
        self.context.stage_us[TickStage::Motors as usize] = timer.lap();
        self.context.link = state;

        if let Some(recorder) = self.recorder.as_mut() {
            recorder.record(&self.context);
        }
        self.context.tick += 1;

        TickOutcome {
            state,
            motor_commands: self.context.motor_commands.clone(),
            light: stick.light(),
            standby,
            yaw_mode: self.context.yaw_mode,
        }
    }

    /// Zero output for every axis and motor, published while the PID bank is
    /// not stepped.
    fn publish_idle_outputs(&mut self) {
        let context = &mut self.context;
        context.axis_outputs = self.axes.iter().map(|_| 0.0).collect();
        context.base_throttle = 0.0;
        context.motor_commands = zero_commands(self.mixer.motor_count());
    }

    fn run_controllers(&mut self) {
        let context = &mut self.context;
        context.axis_outputs.clear();
        self.mixer.begin_tick();

        for input in &self.inputs {
            let value = input.curve.apply(context.stick.normalized(input.stick));
            match &input.target {
                InputTarget::Motors(indices) => {
                    for index in indices {
                        self.mixer.add_motor_power(*index, value);
                    }
                }
                InputTarget::AxisOffset(axis) => {
                    if let Some(slot) = self.axes.get_mut(*axis) {
                        slot.controller.add_offset(value);
                    }
                }
            }
        }

        for slot in self.axes.iter_mut() {
            let stabilized = slot.controller.compute(context);
            let output = match slot.yaw {
                Some(policy) => {
                    let (mode, output) = policy.apply(&context.stick, stabilized);
                    context.yaw_mode = Some(mode);
                    output
                }
                None => stabilized,
            };
            // Same capacity as the axis bank.
            let _ = context.axis_outputs.push(output);
            self.mixer
                .add_axis_change(output, &slot.route.positive, &slot.route.negative);
        }
    }

    fn mix(&mut self) {
        let context = &mut self.context;
        context.base_throttle = self.throttle.base(
            context.stick.normalized(StickAxis::Throttle),
            context.stick.trim,
        );
        context.motor_commands = self.mixer.finalize(context.base_throttle);
    }

    fn kill_once(&mut self) {
        if self.motors_killed {
            return;
        }
        self.motors.kill_motors();
        self.axes
            .iter_mut()
            .for_each(|slot| slot.controller.reset());
        self.motors_killed = true;
    }

    /// Ticks at the configured period until the flight is aborted and returns
    /// the cause.
    pub fn run_until_aborted<C, D>(
        &mut self,
        clock: &C,
        delay: &mut D,
        mut read_imu: impl FnMut() -> Option<ImuSample>,
    ) -> AbortCause
    where
        C: MonotonicClock,
        D: DelayNs + ?Sized,
    {
        let period_us = u64::from(self.loop_period_us);
        loop {
            let started_us = clock.now_us();
            let outcome = self.tick_timed(clock, read_imu());
            if outcome.state == LinkState::Aborted {
                if let Some(recorder) = self.recorder.as_mut() {
                    if let Err(error) = recorder.flush() {
                        log::warn!("Telemetry flush failed: {}", error);
                    }
                }
                return self.failsafe.abort_cause().unwrap_or(AbortCause::Fatal);
            }

            let spent_us = clock.now_us().saturating_sub(started_us);
            if spent_us < period_us {
                delay.delay_us((period_us - spent_us) as u32);
            }
        }
    }

    pub fn context(&self) -> &TickContext {
        &self.context
    }

    pub fn failsafe(&self) -> &FailsafeSupervisor {
        &self.failsafe
    }

    pub fn motors(&self) -> &MotorsStateManager<P> {
        &self.motors
    }

    pub fn link(&self) -> &LinkChannel<R> {
        &self.link
    }

    pub fn recorder(&self) -> Option<&FlightRecorder> {
        self.recorder.as_ref()
    }
}
