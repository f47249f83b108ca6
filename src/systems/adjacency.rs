use rand::Rng;
use tracing::info;

use crate::{
    config::EpidemicParams,
    engine::{System, SystemContext},
    modifiers::Modifiers,
    rng::SystemRng,
    world::{RegionId, World},
};

/// Seeds uninfected neighbors of heavily infected regions. Sources are fixed
/// before any seeding happens, so a region infected here cannot pass the
/// outbreak on until the next tick.
pub fn spread_across_borders<R: Rng + ?Sized>(
    world: &mut World,
    modifiers: &Modifiers,
    params: &EpidemicParams,
    rng: &mut R,
) -> Vec<RegionId> {
    let sources: Vec<usize> = world
        .regions()
        .iter()
        .enumerate()
        .filter(|(_, region)| region.infected > params.seeding_threshold)
        .map(|(position, _)| position)
        .collect();
    let chance = (params.base_spread_chance * modifiers.infection_rate).clamp(0.0, 1.0);

    let mut seeded = Vec::new();
    for source in sources {
        let neighbors = world.regions()[source].neighbors.clone();
        for neighbor_id in &neighbors {
            // Unresolvable links are skipped.
            let Some(position) = world.position_of(neighbor_id) else {
                continue;
            };
            if position == source {
                continue;
            }
            let neighbor = &mut world.regions_mut()[position];
            if neighbor.infected != 0 || neighbor.cured == 0 {
                continue;
            }
            if rng.gen::<f64>() < chance && neighbor.seed(params.neighbor_seed) > 0 {
                seeded.push(neighbor.id.clone());
            }
        }
    }
    seeded
}

pub struct AdjacencySpreadSystem;

impl AdjacencySpreadSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AdjacencySpreadSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for AdjacencySpreadSystem {
    fn name(&self) -> &str {
        "adjacency"
    }

    fn run(&mut self, ctx: &SystemContext<'_>, world: &mut World, rng: &mut SystemRng<'_>) {
        let seeded = spread_across_borders(world, ctx.modifiers, ctx.params, rng);
        for region in &seeded {
            info!(day = ctx.day, %region, "outbreak.crossed_border");
        }
        world.bookkeeping.seeded_this_tick.extend(seeded);
    }
}
