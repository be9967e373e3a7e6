use crate::error::ServiceError;
use crate::models::appliance::{Appliance, ApplianceId, ConsumptionEstimates, IdInput};
use crate::services::appliances::ApplianceRepository;
use crate::utils::{plain_number, round_to};
use log::debug;
use serde::Serialize;

pub const HOURS_PER_DAY: f64 = 24.0;
pub const DAYS_PER_WEEK: f64 = 7.0;
/// Months are normalized to 30 days.
pub const DAYS_PER_MONTH: u32 = 30;

const KWH_PLACES: i32 = 1;
const COST_PLACES: i32 = 2;

/// Unrounded energy figures for one appliance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyProfile {
    pub active_kwh: f64,
    pub standby_kwh: f64,
    pub daily_kwh: f64,
    pub weekly_kwh: f64,
    pub monthly_kwh: f64,
    pub active_days: usize,
}

impl EnergyProfile {
    pub fn from_parts(power_watts: f64, daily_hours: f64, standby_watts: f64, active_days: usize) -> Self {
        let active_kwh = power_watts * daily_hours / 1000.0;
        let standby_hours = HOURS_PER_DAY - daily_hours;
        let standby_kwh = standby_watts * standby_hours / 1000.0;
        let daily_kwh = active_kwh + standby_kwh;
        let days = active_days as f64;
        EnergyProfile {
            active_kwh,
            standby_kwh,
            daily_kwh,
            weekly_kwh: daily_kwh * days,
            monthly_kwh: daily_kwh * (days / DAYS_PER_WEEK) * f64::from(DAYS_PER_MONTH),
            active_days,
        }
    }

    pub fn of(appliance: &Appliance) -> Self {
        Self::from_parts(
            appliance.power_watts,
            appliance.daily_hours,
            appliance.standby_watts,
            appliance.usage_days.len(),
        )
    }

    pub fn estimates(&self) -> ConsumptionEstimates {
        round_estimates(self.daily_kwh, self.weekly_kwh, self.monthly_kwh)
    }
}

pub fn round_kwh(kwh: f64) -> f64 {
    round_to(kwh, KWH_PLACES)
}

pub fn round_cost(amount: f64) -> f64 {
    round_to(amount, COST_PLACES)
}

pub fn round_estimates(daily_kwh: f64, weekly_kwh: f64, monthly_kwh: f64) -> ConsumptionEstimates {
    ConsumptionEstimates {
        daily_kwh: round_kwh(daily_kwh),
        weekly_kwh: round_kwh(weekly_kwh),
        monthly_kwh: round_kwh(monthly_kwh),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyCalculation {
    pub power_watts: f64,
    pub daily_hours: f64,
    pub standby_watts: f64,
    pub active_kwh: f64,
    pub standby_kwh: f64,
    pub formula: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyConsumption {
    pub appliance_id: ApplianceId,
    pub daily_kwh: f64,
    pub calculation: DailyCalculation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyCalculation {
    pub daily_kwh: f64,
    pub active_days: usize,
    pub days: Vec<&'static str>,
    pub formula: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyConsumption {
    pub appliance_id: ApplianceId,
    pub weekly_kwh: f64,
    pub usage_days: usize,
    pub calculation: WeeklyCalculation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyCalculation {
    pub daily_kwh: f64,
    pub active_days_per_week: usize,
    pub active_days_per_month: f64,
    pub weeks_per_month: f64,
    pub formula: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyConsumption {
    pub appliance_id: ApplianceId,
    pub monthly_kwh: f64,
    pub days_per_month: u32,
    pub calculation: MonthlyCalculation,
}

/// One appliance's line in the household summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyShare {
    pub id: ApplianceId,
    pub name: String,
    pub daily_kwh: f64,
    pub weekly_kwh: f64,
    pub usage_days: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalDailyConsumption {
    pub total_daily_kwh: f64,
    pub total_weekly_kwh: f64,
    pub total_monthly_kwh: f64,
    pub breakdown: Vec<DailyShare>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostOptions {
    pub rate_per_kwh: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostEstimate {
    pub appliance_id: ApplianceId,
    pub daily_cost: f64,
    pub weekly_cost: f64,
    pub monthly_cost: f64,
    pub rate_per_kwh: f64,
}

fn daily_formula(appliance: &Appliance, daily_kwh: f64) -> String {
    let active = format!(
        "{}W × {}h ÷ 1000",
        plain_number(appliance.power_watts),
        plain_number(appliance.daily_hours)
    );
    if appliance.standby_watts > 0.0 {
        format!(
            "{} + {}W × {}h ÷ 1000 = {:.1} kWh",
            active,
            plain_number(appliance.standby_watts),
            plain_number(HOURS_PER_DAY - appliance.daily_hours),
            daily_kwh
        )
    } else {
        format!("{} = {:.1} kWh", active, daily_kwh)
    }
}

/// Derives consumption and cost figures for appliances read through the
/// repository. Holds no state of its own.
pub struct ConsumptionEngine<'a> {
    repo: &'a mut ApplianceRepository,
}

impl<'a> ConsumptionEngine<'a> {
    pub fn new(repo: &'a mut ApplianceRepository) -> Self {
        ConsumptionEngine { repo }
    }

    fn load(&mut self, id: impl IdInput, failure: &str) -> Result<Appliance, ServiceError> {
        self.repo
            .get_by_id(id)
            .map(|found| found.appliance)
            .map_err(|e| if e.passes_through() { e } else { ServiceError::calculation(failure, &e) })
    }

    pub fn calculate_daily(&mut self, id: impl IdInput) -> Result<DailyConsumption, ServiceError> {
        let appliance = self.load(id, "Failed to calculate daily consumption")?;
        let profile = EnergyProfile::of(&appliance);
        debug!("Daily consumption for appliance {}: {:.3} kWh", appliance.id, profile.daily_kwh);
        Ok(DailyConsumption {
            appliance_id: appliance.id,
            daily_kwh: round_kwh(profile.daily_kwh),
            calculation: DailyCalculation {
                power_watts: appliance.power_watts,
                daily_hours: appliance.daily_hours,
                standby_watts: appliance.standby_watts,
                active_kwh: round_kwh(profile.active_kwh),
                standby_kwh: round_kwh(profile.standby_kwh),
                formula: daily_formula(&appliance, profile.daily_kwh),
            },
        })
    }

    pub fn calculate_weekly(&mut self, id: impl IdInput) -> Result<WeeklyConsumption, ServiceError> {
        let appliance = self.load(id, "Failed to calculate weekly consumption")?;
        let profile = EnergyProfile::of(&appliance);
        Ok(WeeklyConsumption {
            appliance_id: appliance.id,
            weekly_kwh: round_kwh(profile.weekly_kwh),
            usage_days: profile.active_days,
            calculation: WeeklyCalculation {
                daily_kwh: round_kwh(profile.daily_kwh),
                active_days: profile.active_days,
                days: appliance.usage_days.labels(),
                formula: format!(
                    "{:.1} kWh/day × {} days = {:.1} kWh",
                    profile.daily_kwh, profile.active_days, profile.weekly_kwh
                ),
            },
        })
    }

    pub fn calculate_monthly(&mut self, id: impl IdInput) -> Result<MonthlyConsumption, ServiceError> {
        let appliance = self.load(id, "Failed to calculate monthly consumption")?;
        let profile = EnergyProfile::of(&appliance);
        let days_per_month = f64::from(DAYS_PER_MONTH);
        let active_days_per_month = profile.active_days as f64 / DAYS_PER_WEEK * days_per_month;
        Ok(MonthlyConsumption {
            appliance_id: appliance.id,
            monthly_kwh: round_kwh(profile.monthly_kwh),
            days_per_month: DAYS_PER_MONTH,
            calculation: MonthlyCalculation {
                daily_kwh: round_kwh(profile.daily_kwh),
                active_days_per_week: profile.active_days,
                active_days_per_month: round_to(active_days_per_month, 2),
                weeks_per_month: round_to(days_per_month / DAYS_PER_WEEK, 2),
                formula: format!(
                    "{:.1} kWh/day × {}/7 × {} days = {:.1} kWh",
                    profile.daily_kwh, profile.active_days, DAYS_PER_MONTH, profile.monthly_kwh
                ),
            },
        })
    }

    /// Every appliance (newest first) with its unrounded profile.
    pub fn household(&mut self) -> Result<Vec<(Appliance, EnergyProfile)>, ServiceError> {
        let list = self
            .repo
            .get_all()
            .map_err(|e| ServiceError::calculation("Failed to calculate total daily consumption", &e))?;
        Ok(list
            .appliances
            .into_iter()
            .map(|entry| {
                let profile = EnergyProfile::of(&entry.appliance);
                (entry.appliance, profile)
            })
            .collect())
    }

    pub fn calculate_total_daily(&mut self) -> Result<TotalDailyConsumption, ServiceError> {
        let household = self.household()?;
        let (mut daily, mut weekly, mut monthly) = (0.0, 0.0, 0.0);
        let mut breakdown = Vec::with_capacity(household.len());
        for (appliance, profile) in household {
            daily += profile.daily_kwh;
            weekly += profile.weekly_kwh;
            monthly += profile.monthly_kwh;
            breakdown.push(DailyShare {
                id: appliance.id,
                name: appliance.name,
                daily_kwh: round_kwh(profile.daily_kwh),
                weekly_kwh: round_kwh(profile.weekly_kwh),
                usage_days: profile.active_days,
            });
        }
        debug!("Household total over {} appliance(s): {:.3} kWh/day", breakdown.len(), daily);
        Ok(TotalDailyConsumption {
            total_daily_kwh: round_kwh(daily),
            total_weekly_kwh: round_kwh(weekly),
            total_monthly_kwh: round_kwh(monthly),
            breakdown,
        })
    }

    /// Costs are the emitted (rounded) kWh figures times the rate.
    pub fn calculate_cost(&mut self, id: impl IdInput, options: CostOptions) -> Result<CostEstimate, ServiceError> {
        let rate = options.rate_per_kwh;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ServiceError::validation("rate_per_kwh", "Rate per kWh must be positive"));
        }
        let id = id.resolve()?;
        let daily = self.calculate_daily(id)?;
        let weekly = self.calculate_weekly(id)?;
        let monthly = self.calculate_monthly(id)?;
        Ok(CostEstimate {
            appliance_id: id,
            daily_cost: round_cost(daily.daily_kwh * rate),
            weekly_cost: round_cost(weekly.weekly_kwh * rate),
            monthly_cost: round_cost(monthly.monthly_kwh * rate),
            rate_per_kwh: rate,
        })
    }
}
