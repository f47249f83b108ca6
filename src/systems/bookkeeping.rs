use crate::{
    engine::{System, SystemContext},
    rng::SystemRng,
    world::World,
};

/// Re-derives the global sums from the regions and checks that no region has
/// gained or lost people.
pub struct BookkeepingSystem;

impl BookkeepingSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BookkeepingSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for BookkeepingSystem {
    fn name(&self) -> &str {
        "bookkeeping"
    }

    fn run(&mut self, _ctx: &SystemContext<'_>, world: &mut World, _rng: &mut SystemRng<'_>) {
        for region in world.regions() {
            region.assert_invariants();
        }
        world.recompute_totals();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EpidemicParams;
    use crate::modifiers::Modifiers;
    use crate::rng::RngManager;
    use crate::scenario::RegionDataset;
    use crate::world::RegionId;

    #[test]
    fn keeps_seeding_order_and_refreshes_totals() {
        let mut world = World::new(RegionDataset::world_sample().build_regions(), 0);
        for id in ["ZA", "BR"] {
            let region = world.region_mut(&RegionId::from(id)).unwrap();
            region.seed(50);
            world.bookkeeping.seeded_this_tick.push(RegionId::from(id));
        }

        let modifiers = Modifiers::default();
        let params = EpidemicParams::default();
        let ctx = SystemContext {
            day: 1,
            modifiers: &modifiers,
            params: &params,
        };
        let mut rngs = RngManager::new(3);
        BookkeepingSystem::new().run(&ctx, &mut world, &mut rngs.stream("bookkeeping"));

        assert_eq!(
            world.seeded_this_tick(),
            [RegionId::from("ZA"), RegionId::from("BR")]
        );
        assert_eq!(world.stats().total_infected, 100);
    }
}
