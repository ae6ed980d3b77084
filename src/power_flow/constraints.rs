use serde::{Deserialize, Serialize};

/// Flows below this are treated as zero
pub const POWER_EPSILON_MW: f64 = 1e-4;

/// Physical limits of lines and storage
///
/// One in-game hour passes every 120 real seconds, so charging energy is
/// `draw × dt × hours_per_second`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConstraints {
    /// Safe-capacity boost per substation unit at either line end (MW)
    pub substation_boost_mw: f64,

    /// Hard capacity as a multiple of safe capacity
    pub hard_capacity_factor: f64,

    /// Energy held by one storage unit (MWh)
    pub storage_unit_capacity_mwh: f64,

    /// Maximum charging draw of one storage unit (MW)
    pub storage_unit_draw_mw: f64,

    /// In-game hours per simulated second
    pub hours_per_second: f64,
}

impl Default for GridConstraints {
    fn default() -> Self {
        Self {
            substation_boost_mw: 9.0,
            hard_capacity_factor: 1.15,
            storage_unit_capacity_mwh: 20.0,
            storage_unit_draw_mw: 20.0,
            hours_per_second: 1.0 / 120.0,
        }
    }
}

impl GridConstraints {
    pub fn storage_capacity_mwh(&self, units: u32) -> f64 {
        units as f64 * self.storage_unit_capacity_mwh
    }

    /// Charging draw a storage node requests this tick
    ///
    /// Limited by the per-unit rate and by the energy still missing.
    pub fn storage_charge_demand_mw(&self, units: u32, stored_mwh: f64, dt: f64) -> f64 {
        if units == 0 || dt <= 0.0 {
            return 0.0;
        }
        let capacity = self.storage_capacity_mwh(units);
        let remaining = (capacity - stored_mwh.clamp(0.0, capacity)).max(0.0);
        if remaining <= 1e-6 {
            return 0.0;
        }
        let by_rate = units as f64 * self.storage_unit_draw_mw;
        let by_capacity = remaining / (dt * self.hours_per_second);
        by_rate.min(by_capacity).max(0.0)
    }

    /// Stored energy after charging at `draw_mw` for `dt`, capped at capacity
    pub fn charge_storage(&self, units: u32, stored_mwh: f64, draw_mw: f64, dt: f64) -> f64 {
        let capacity = self.storage_capacity_mwh(units);
        if draw_mw <= 0.0 || dt <= 0.0 {
            return stored_mwh.clamp(0.0, capacity);
        }
        let added = draw_mw * dt * self.hours_per_second;
        (stored_mwh + added).clamp(0.0, capacity)
    }

    /// Safe capacity of a line given substation units at both ends
    pub fn safe_capacity(&self, base_capacity: f64, substations: u32, incident_multiplier: f64) -> f64 {
        (base_capacity + substations as f64 * self.substation_boost_mw) * incident_multiplier
    }
}
