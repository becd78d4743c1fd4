use hybrid_core::{StateMut, StateRef, StateVariable, StateVector};
use hybrid_engine::{HybridModel, Past};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uom::si::{
    area::square_meter,
    f64::{
        Area, HeatTransfer, Mass, MassDensity, MassRate, Pressure, SpecificHeatCapacity,
        ThermodynamicTemperature, Volume,
    },
    heat_transfer::watt_per_square_meter_kelvin,
    mass::kilogram,
    mass_density::kilogram_per_cubic_meter,
    mass_rate::kilogram_per_second,
    pressure::pascal,
    specific_heat_capacity::joule_per_kilogram_kelvin,
    thermodynamic_temperature::kelvin,
    volume::cubic_meter,
};

use super::{TankController, TankOutputs};

/// Continuous state of the gas tank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TankVar {
    /// Gas mass in kg.
    Mass,

    /// Gas temperature in K.
    GasTemperature,

    /// Lumped wall temperature in K.
    WallTemperature,
}

impl StateVariable for TankVar {
    const ALL: &'static [Self] = &[Self::Mass, Self::GasTemperature, Self::WallTemperature];

    fn index(self) -> usize {
        self as usize
    }

    fn name(self) -> &'static str {
        match self {
            Self::Mass => "mass",
            Self::GasTemperature => "gas_temperature",
            Self::WallTemperature => "wall_temperature",
        }
    }
}

/// Geometry, gas, and environment of the tank.
///
/// The defaults describe a 115.5 L hydrogen tank with a 58 kg wall.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TankParameters {
    pub volume: Volume,
    pub wall_area: Area,
    pub wall_mass: Mass,
    pub wall_specific_heat: SpecificHeatCapacity,
    pub gas_constant: SpecificHeatCapacity,
    pub gas_cv: SpecificHeatCapacity,
    pub ambient_temperature: ThermodynamicTemperature,

    /// Convection coefficient between the wall and the ambient air.
    pub ambient_heat_transfer: HeatTransfer,

    /// Volume displaced per pump revolution.
    pub pump_displacement: Volume,

    /// Gas density at the pump inlet.
    pub inlet_density: MassDensity,
    pub inlet_temperature: ThermodynamicTemperature,
}

impl Default for TankParameters {
    fn default() -> Self {
        Self {
            volume: Volume::new::<cubic_meter>(0.1155),
            wall_area: Area::new::<square_meter>(1.8),
            wall_mass: Mass::new::<kilogram>(58.0),
            wall_specific_heat: SpecificHeatCapacity::new::<joule_per_kilogram_kelvin>(900.0),
            gas_constant: SpecificHeatCapacity::new::<joule_per_kilogram_kelvin>(4124.2),
            gas_cv: SpecificHeatCapacity::new::<joule_per_kilogram_kelvin>(10_183.0),
            ambient_temperature: ThermodynamicTemperature::new::<kelvin>(288.15),
            ambient_heat_transfer: HeatTransfer::new::<watt_per_square_meter_kelvin>(100.0),
            pump_displacement: Volume::new::<cubic_meter>(0.5e-3),
            inlet_density: MassDensity::new::<kilogram_per_cubic_meter>(20.0),
            inlet_temperature: ThermodynamicTemperature::new::<kelvin>(288.15),
        }
    }
}

/// Scheduled changes to the tank's surroundings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TankParameter {
    AmbientTemperature(ThermodynamicTemperature),
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum TankError {
    #[error("gas state left the physical domain: mass {mass} kg, temperature {temperature} K")]
    NonPhysical { mass: f64, temperature: f64 },
}

/// A lumped compressed gas tank.
///
/// The gas is an ideal gas exchanging heat with a single wall node, which in
/// turn exchanges heat with the ambient air. The pump adds gas at the inlet
/// state; extraction removes gas at the tank state.
#[derive(Debug, Clone, PartialEq)]
pub struct GasTank {
    pub parameters: TankParameters,
    pub controller: TankController,
}

impl GasTank {
    #[must_use]
    pub fn new(parameters: TankParameters, controller: TankController) -> Self {
        Self {
            parameters,
            controller,
        }
    }

    /// Ideal gas pressure `p = m R T / V`.
    #[must_use]
    pub fn pressure(&self, y: StateRef<'_, TankVar>) -> Pressure {
        let TankParameters {
            volume,
            gas_constant,
            ..
        } = self.parameters;
        let pressure = y[TankVar::Mass]
            * gas_constant.get::<joule_per_kilogram_kelvin>()
            * y[TankVar::GasTemperature]
            / volume.get::<cubic_meter>();
        Pressure::new::<pascal>(pressure)
    }

    /// State holding gas at `temperature` and `pressure`, with the wall at
    /// `wall_temperature`.
    #[must_use]
    pub fn initial_state(
        &self,
        temperature: ThermodynamicTemperature,
        pressure: Pressure,
        wall_temperature: ThermodynamicTemperature,
    ) -> StateVector<TankVar> {
        let t = temperature.get::<kelvin>();
        let mass = pressure.get::<pascal>() * self.parameters.volume.get::<cubic_meter>()
            / (self.parameters.gas_constant.get::<joule_per_kilogram_kelvin>() * t);
        StateVector::from_fn(|var| match var {
            TankVar::Mass => mass,
            TankVar::GasTemperature => t,
            TankVar::WallTemperature => wall_temperature.get::<kelvin>(),
        })
    }
}

impl HybridModel for GasTank {
    type Var = TankVar;
    type Controller = TankController;
    type Parameter = TankParameter;
    type Error = TankError;

    fn controller(&self) -> TankController {
        self.controller
    }

    fn controller_inputs(&self, _t: f64, y: StateRef<'_, TankVar>) -> Pressure {
        self.pressure(y)
    }

    fn rhs(
        &self,
        _t: f64,
        y: StateRef<'_, TankVar>,
        mode: &TankOutputs,
        _past: &Past<'_, TankVar>,
        mut dy: StateMut<'_, TankVar>,
    ) -> Result<(), TankError> {
        let mass = y[TankVar::Mass];
        let t_gas = y[TankVar::GasTemperature];
        let t_wall = y[TankVar::WallTemperature];
        if !(mass > 0.0 && t_gas > 0.0) {
            return Err(TankError::NonPhysical {
                mass,
                temperature: t_gas,
            });
        }

        let p = &self.parameters;
        let r = p.gas_constant.get::<joule_per_kilogram_kelvin>();
        let cv = p.gas_cv.get::<joule_per_kilogram_kelvin>();
        let cp = cv + r;
        let area = p.wall_area.get::<square_meter>();

        let inflow: MassRate = mode.pump_speed * p.pump_displacement * p.inlet_density;
        let inflow = inflow.get::<kilogram_per_second>();
        let outflow = mode.extraction_flow.get::<kilogram_per_second>();

        let h_gas = mode
            .heat_transfer_coefficient
            .get::<watt_per_square_meter_kelvin>();
        let h_ambient = p.ambient_heat_transfer.get::<watt_per_square_meter_kelvin>();
        let q_wall = h_gas * area * (t_wall - t_gas);
        let q_ambient = h_ambient * area * (p.ambient_temperature.get::<kelvin>() - t_wall);

        // Energy balance on u = cv T with enthalpy carried by the flows.
        let t_in = p.inlet_temperature.get::<kelvin>();
        dy[TankVar::Mass] = inflow - outflow;
        dy[TankVar::GasTemperature] =
            (inflow * (cp * t_in - cv * t_gas) - outflow * r * t_gas + q_wall) / (mass * cv);
        dy[TankVar::WallTemperature] = (q_ambient - q_wall)
            / (p.wall_mass.get::<kilogram>() * p.wall_specific_heat.get::<joule_per_kilogram_kelvin>());
        Ok(())
    }

    fn apply(&mut self, _t: f64, parameter: &TankParameter) {
        match *parameter {
            TankParameter::AmbientTemperature(temperature) => {
                self.parameters.ambient_temperature = temperature;
            }
        }
    }

    fn auxiliary_names(&self) -> Vec<&'static str> {
        vec!["pressure"]
    }

    fn auxiliary(&self, _t: f64, y: StateRef<'_, TankVar>, _mode: &TankOutputs) -> Vec<f64> {
        vec![self.pressure(y).get::<pascal>()]
    }
}
