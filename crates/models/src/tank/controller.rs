use hybrid_core::{Controller, TimeEvent};
use serde::{Deserialize, Serialize};
use uom::si::{
    f64::{Frequency, HeatTransfer, MassRate, Pressure, Time},
    frequency::hertz,
    heat_transfer::watt_per_square_meter_kelvin,
    mass_rate::kilogram_per_second,
    pressure::{bar, pascal},
    time::second,
};

/// Relative margin a threshold must be passed by before a state is left.
pub const RELATIVE_TOLERANCE: f64 = 1e-10;

/// Operating state of the tank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TankState {
    /// Idle until a scheduled event starts the next phase.
    Waiting,

    /// The pump fills the tank up to `p_max`.
    Fueling,

    /// Gas is drawn from the tank down to `p_min`.
    Extraction,
}

/// Time events understood by [`TankController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TankEvent {
    BeginRefueling,
    EndRefueling,
    BeginExtraction,
    EndExtraction,
}

/// Values assigned to the tank model on entry to a state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TankOutputs {
    pub pump_speed: Frequency,

    /// Convection coefficient between the gas and the tank wall.
    pub heat_transfer_coefficient: HeatTransfer,

    pub extraction_flow: MassRate,
}

/// Cycles a tank between fueling and extraction on pressure thresholds.
///
/// Fueling ends once the pressure reaches `p_max`, extraction ends once it
/// falls to `p_min`. With a dwell time configured the tank first enters
/// [`TankState::Waiting`] and a time event starts the next phase after the
/// dwell has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TankController {
    pub p_min: Pressure,
    pub p_max: Pressure,
    pub wait_before_extraction: Option<Time>,
    pub wait_before_refueling: Option<Time>,
    pub pump_speed: Frequency,
    pub extraction_flow: MassRate,
    pub h_waiting: HeatTransfer,
    pub h_fueling: HeatTransfer,
    pub h_extraction: HeatTransfer,
}

impl Default for TankController {
    fn default() -> Self {
        Self {
            p_min: Pressure::new::<bar>(20.0),
            p_max: Pressure::new::<bar>(300.0),
            wait_before_extraction: None,
            wait_before_refueling: None,
            pump_speed: Frequency::new::<hertz>(0.53 * 1.44),
            extraction_flow: MassRate::new::<kilogram_per_second>(30.0 / 3600.0),
            h_waiting: HeatTransfer::new::<watt_per_square_meter_kelvin>(10.0),
            h_fueling: HeatTransfer::new::<watt_per_square_meter_kelvin>(100.0),
            h_extraction: HeatTransfer::new::<watt_per_square_meter_kelvin>(15.0),
        }
    }
}

impl TankController {
    /// Sets both dwell times.
    #[must_use]
    pub fn with_waits(mut self, before_extraction: Time, before_refueling: Time) -> Self {
        self.wait_before_extraction = Some(before_extraction);
        self.wait_before_refueling = Some(before_refueling);
        self
    }

    fn after_fueling(&self) -> TankState {
        match dwell(self.wait_before_extraction) {
            Some(_) => TankState::Waiting,
            None => TankState::Extraction,
        }
    }

    fn after_extraction(&self) -> TankState {
        match dwell(self.wait_before_refueling) {
            Some(_) => TankState::Waiting,
            None => TankState::Fueling,
        }
    }
}

/// A wait of zero or less skips the waiting state.
fn dwell(wait: Option<Time>) -> Option<Time> {
    wait.filter(|wait| wait.get::<second>() > 0.0)
}

impl Controller for TankController {
    type State = TankState;
    type Inputs = Pressure;
    type Outputs = TankOutputs;
    type Event = TankEvent;

    fn outputs_on_entry(&self, state: TankState) -> TankOutputs {
        let idle = TankOutputs {
            pump_speed: Frequency::new::<hertz>(0.0),
            heat_transfer_coefficient: self.h_waiting,
            extraction_flow: MassRate::new::<kilogram_per_second>(0.0),
        };
        match state {
            TankState::Waiting => idle,
            TankState::Fueling => TankOutputs {
                pump_speed: self.pump_speed,
                heat_transfer_coefficient: self.h_fueling,
                ..idle
            },
            TankState::Extraction => TankOutputs {
                heat_transfer_coefficient: self.h_extraction,
                extraction_flow: self.extraction_flow,
                ..idle
            },
        }
    }

    fn indicator(&self, state: TankState, pressure: &Pressure) -> f64 {
        match state {
            TankState::Waiting => 1.0,
            TankState::Fueling => (self.p_max - *pressure).get::<pascal>(),
            TankState::Extraction => (*pressure - self.p_min).get::<pascal>(),
        }
    }

    fn next_state(&self, state: TankState, pressure: &Pressure) -> Option<TankState> {
        let p = pressure.get::<pascal>();
        match state {
            TankState::Fueling if p > (1.0 - RELATIVE_TOLERANCE) * self.p_max.get::<pascal>() => {
                Some(self.after_fueling())
            }
            TankState::Extraction
                if p < (1.0 + RELATIVE_TOLERANCE) * self.p_min.get::<pascal>() =>
            {
                Some(self.after_extraction())
            }
            _ => None,
        }
    }

    fn on_time_event(&self, state: TankState, event: &TankEvent) -> Option<TankState> {
        let next = match event {
            TankEvent::EndRefueling | TankEvent::BeginExtraction => TankState::Extraction,
            TankEvent::EndExtraction | TankEvent::BeginRefueling => TankState::Fueling,
        };
        (next != state).then_some(next)
    }

    fn on_exit(&self, from: TankState, to: TankState, t: f64) -> Vec<TimeEvent<TankEvent>> {
        let after = |wait: Option<Time>, event, description| {
            dwell(wait).map(|wait| TimeEvent::new(t + wait.get::<second>(), event, description))
        };
        let scheduled = match (from, to) {
            (TankState::Fueling, TankState::Waiting) => after(
                self.wait_before_extraction,
                TankEvent::BeginExtraction,
                "begin extraction",
            ),
            (TankState::Extraction, TankState::Waiting) => after(
                self.wait_before_refueling,
                TankEvent::BeginRefueling,
                "begin refueling",
            ),
            _ => None,
        };
        scheduled.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use hybrid_core::ControllerStateMachine;

    fn p_bar(p: f64) -> Pressure {
        Pressure::new::<bar>(p)
    }

    #[test]
    fn entry_outputs_follow_the_state() {
        let controller = TankController::default();

        let fueling = controller.outputs_on_entry(TankState::Fueling);
        assert_relative_eq!(fueling.pump_speed.get::<hertz>(), 0.53 * 1.44);
        assert_relative_eq!(
            fueling.heat_transfer_coefficient.get::<watt_per_square_meter_kelvin>(),
            100.0
        );
        assert_relative_eq!(fueling.extraction_flow.get::<kilogram_per_second>(), 0.0);

        let extraction = controller.outputs_on_entry(TankState::Extraction);
        assert_relative_eq!(extraction.pump_speed.get::<hertz>(), 0.0);
        assert_relative_eq!(
            extraction.extraction_flow.get::<kilogram_per_second>(),
            30.0 / 3600.0
        );

        let waiting = controller.outputs_on_entry(TankState::Waiting);
        assert_relative_eq!(
            waiting.heat_transfer_coefficient.get::<watt_per_square_meter_kelvin>(),
            10.0
        );
    }

    #[test]
    fn fueling_switches_to_extraction_at_max_pressure() {
        let mut machine = ControllerStateMachine::new(TankController::default(), TankState::Fueling);

        assert!(machine.observe(0.0, &p_bar(200.0)).is_none());
        assert!(machine.observe(1.0, &p_bar(299.0)).is_none());

        let transition = machine.observe(2.0, &p_bar(300.5)).unwrap();
        assert_eq!(transition.from, TankState::Fueling);
        assert_eq!(transition.to, TankState::Extraction);
        assert!(transition.scheduled.is_empty());
    }

    #[test]
    fn guard_holds_the_state_short_of_the_threshold() {
        let controller = TankController::default();
        let mut machine = ControllerStateMachine::new(controller, TankState::Extraction);

        // Just above p_min by more than the relative margin.
        assert!(machine.make_transition(0.0, &p_bar(20.001)).is_none());
        assert_eq!(machine.state(), TankState::Extraction);

        let transition = machine.make_transition(0.0, &p_bar(19.999)).unwrap();
        assert_eq!(transition.to, TankState::Fueling);
    }

    #[test]
    fn dwell_times_pass_through_waiting() {
        let controller = TankController::default()
            .with_waits(Time::new::<second>(150.0), Time::new::<second>(120.0));
        let mut machine = ControllerStateMachine::new(controller, TankState::Fueling);

        let transition = machine.make_transition(40.0, &p_bar(301.0)).unwrap();
        assert_eq!(transition.to, TankState::Waiting);
        assert_eq!(transition.scheduled.len(), 1);
        assert_relative_eq!(transition.scheduled[0].fires_at, 190.0);
        assert_eq!(transition.scheduled[0].payload, TankEvent::BeginExtraction);

        let forced = machine
            .process_time_event(190.0, &TankEvent::BeginExtraction)
            .unwrap();
        assert_eq!(forced.to, TankState::Extraction);

        let transition = machine.make_transition(500.0, &p_bar(19.0)).unwrap();
        assert_eq!(transition.to, TankState::Waiting);
        assert_eq!(transition.scheduled[0].payload, TankEvent::BeginRefueling);
        assert_relative_eq!(transition.scheduled[0].fires_at, 620.0);
    }

    #[test]
    fn zero_waits_switch_directly() {
        let zero = Time::new::<second>(0.0);
        let controller = TankController::default().with_waits(zero, zero);
        let mut machine = ControllerStateMachine::new(controller, TankState::Fueling);

        let transition = machine.make_transition(40.0, &p_bar(301.0)).unwrap();
        assert_eq!(transition.to, TankState::Extraction);
        assert!(transition.scheduled.is_empty());

        let transition = machine.make_transition(90.0, &p_bar(19.0)).unwrap();
        assert_eq!(transition.to, TankState::Fueling);
        assert!(transition.scheduled.is_empty());
    }

    #[test]
    fn time_events_force_the_mapped_state() {
        let controller = TankController::default();
        assert_eq!(
            controller.on_time_event(TankState::Fueling, &TankEvent::EndRefueling),
            Some(TankState::Extraction)
        );
        assert_eq!(
            controller.on_time_event(TankState::Extraction, &TankEvent::EndExtraction),
            Some(TankState::Fueling)
        );
        assert_eq!(
            controller.on_time_event(TankState::Waiting, &TankEvent::BeginRefueling),
            Some(TankState::Fueling)
        );
        assert_eq!(
            controller.on_time_event(TankState::Fueling, &TankEvent::BeginRefueling),
            None
        );
    }

    #[test]
    fn waiting_never_leaves_on_pressure() {
        let controller = TankController::default();
        assert!(controller.indicator(TankState::Waiting, &p_bar(1000.0)) > 0.0);
        assert_eq!(controller.next_state(TankState::Waiting, &p_bar(0.0)), None);
    }
}
