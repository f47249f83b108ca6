//! Per-region infection, cure and mortality.

use std::ops::AddAssign;

use tracing::debug;

use crate::{
    config::EpidemicParams,
    engine::{System, SystemContext},
    modifiers::Modifiers,
    rng::SystemRng,
    world::{ClimateClass, DensityClass, RegionCounts, World},
};

/// How many people changed state in one region during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transitions {
    pub spread: u64,
    pub cured: u64,
    pub died: u64,
}

impl AddAssign for Transitions {
    fn add_assign(&mut self, other: Self) {
        self.spread += other.spread;
        self.cured += other.cured;
        self.died += other.died;
    }
}

/// Computes a region's next-day counts. Stages run in a fixed order (spread,
/// cure, mortality) and each stage sees the previous stage's output. Regions
/// without infections are returned untouched.
pub fn advance(
    counts: RegionCounts,
    density: DensityClass,
    climate: ClimateClass,
    modifiers: &Modifiers,
    params: &EpidemicParams,
) -> (RegionCounts, Transitions) {
    if counts.infected == 0 || counts.population == 0 {
        return (counts, Transitions::default());
    }

    let mut next = counts;
    let mut transitions = Transitions::default();

    let susceptible_share = next.cured as f64 / next.population as f64;
    let spread = floor_count(
        next.infected as f64
            * params.base_spread_rate
            * density.spread_factor()
            * climate.spread_factor()
            * modifiers.infection_rate
            * susceptible_share,
    )
    .min(next.cured);
    next.cured -= spread;
    next.infected += spread;
    transitions.spread = spread;

    // Curing only kicks in once a policy or preset pushes cure speed past 1.0.
    if modifiers.cure_speed > 1.0 {
        let base = params
            .cure_floor
            .max(next.infected as f64 * params.cure_fraction);
        let cured = floor_count(base * modifiers.cure_speed).min(next.infected);
        next.infected -= cured;
        next.cured += cured;
        transitions.cured = cured;
    }

    let died = floor_count(
        next.infected as f64 * params.base_mortality_rate * modifiers.mortality_rate,
    )
    .min(next.infected);
    next.infected -= died;
    next.dead += died;
    transitions.died = died;

    (next, transitions)
}

fn floor_count(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.floor() as u64
    } else {
        0
    }
}

pub struct EpidemicSystem;

impl EpidemicSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EpidemicSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for EpidemicSystem {
    fn name(&self) -> &str {
        "epidemic"
    }

    fn run(&mut self, ctx: &SystemContext<'_>, world: &mut World, _rng: &mut SystemRng<'_>) {
        let mut total = Transitions::default();
        for region in world.regions_mut() {
            let (next, transitions) = advance(
                region.counts(),
                region.density,
                region.climate,
                ctx.modifiers,
                ctx.params,
            );
            region.set_counts(next);
            total += transitions;
        }
        debug!(
            day = ctx.day,
            spread = total.spread,
            cured = total.cured,
            died = total.died,
            "epidemic.transitions"
        );
        world.bookkeeping.transitions = total;
    }
}
