//! Shadow sampling.

use glam::{UVec2, Vec3};
use penumbra_core::{PageKey, PhysicalSlot};

use crate::clipmap::resolve;
use crate::config::VsmConfig;
use crate::page_table::PageTable;
use crate::physical_pool::PhysicalPagePool;
use crate::projection::LightProjection;

/// Where a world position lands in the virtual shadow map.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleLocation {
    pub key: PageKey,
    /// Texel offset inside the page.
    pub offset: UVec2,
    /// Backing slot, if the page is resident.
    pub slot: Option<PhysicalSlot>,
    /// Resident and visible in the rendered frame, so the slot holds depth
    /// painted with the sampler's projection.
    pub painted: bool,
    /// Light-space depth of the query.
    pub depth: f32,
}

/// Read-only view answering lit/shadowed queries.
///
/// No filtering and no bias: callers offset the query position themselves.
#[derive(Clone, Copy, Debug)]
pub struct ShadowSampler<'a> {
    pub(crate) config: &'a VsmConfig,
    pub(crate) table: &'a PageTable,
    pub(crate) pool: &'a PhysicalPagePool,
    pub(crate) projection: &'a LightProjection,
}

impl<'a> ShadowSampler<'a> {
    /// Bind a sampler to the current frame's resources.
    pub fn new(
        config: &'a VsmConfig,
        table: &'a PageTable,
        pool: &'a PhysicalPagePool,
        projection: &'a LightProjection,
    ) -> Self {
        Self {
            config,
            table,
            pool,
            projection,
        }
    }

    /// Resolve `world` to its page, in-page texel and backing.
    ///
    /// Returns `None` outside the coarsest cascade.
    pub fn locate(&self, world: Vec3) -> Option<SampleLocation> {
        let sample = resolve(
            world,
            self.projection.view_projection(),
            self.config.cascade_count,
        )?;
        let (key, offset) = sample.page_and_offset(self.config);
        let entry = self.table.lookup(key);
        Some(SampleLocation {
            key,
            offset,
            slot: entry.physical(),
            painted: entry.is_valid() && entry.is_visible(),
            depth: sample.depth,
        })
    }

    /// `0.0` if `world` is occluded from the light, `1.0` otherwise.
    ///
    /// Positions outside every cascade are lit, and so are positions on pages
    /// the rendered frame did not paint: those still hold depth from an older
    /// light projection, or none at all.
    pub fn sample_shadow_factor(&self, world: Vec3) -> f32 {
        let Some(location) = self.locate(world) else {
            return 1.0;
        };
        let (true, Some(slot)) = (location.painted, location.slot) else {
            return 1.0;
        };
        if location.depth > self.pool.depth(slot, location.offset) {
            0.0
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::{allocate_pages, AllocationState};
    use crate::config::EvictionPolicy;

    struct Fixture {
        config: VsmConfig,
        table: PageTable,
        pool: PhysicalPagePool,
        projection: LightProjection,
    }

    impl Fixture {
        fn new() -> Self {
            let config = VsmConfig::default().with_pages(8, 16).with_cascades(4).with_pool(4);
            let projection = LightProjection::new(Vec3::Y, Vec3::ZERO, &config).unwrap();
            Self {
                table: PageTable::new(config.page_table_resolution, config.cascade_count),
                pool: PhysicalPagePool::new(&config),
                config,
                projection,
            }
        }

        fn sampler(&self) -> ShadowSampler<'_> {
            ShadowSampler::new(&self.config, &self.table, &self.pool, &self.projection)
        }

        fn back(&mut self, world: Vec3) -> SampleLocation {
            let location = self.sampler().locate(world).unwrap();
            self.table.mark_visible(location.key);
            let mut state = AllocationState::default();
            allocate_pages(
                &mut self.table,
                &mut self.pool,
                &mut state,
                EvictionPolicy::LeastRecent,
                self.config.max_recency,
            );
            self.sampler().locate(world).unwrap()
        }
    }

    #[test]
    fn fresh_table_is_fully_lit() {
        let fixture = Fixture::new();
        let sampler = fixture.sampler();
        for x in -20..20 {
            for z in -20..20 {
                let p = Vec3::new(x as f32 * 0.37, 0.1 * x as f32, z as f32 * 0.41);
                assert_eq!(sampler.sample_shadow_factor(p), 1.0);
            }
        }
    }

    #[test]
    fn outside_coarsest_cascade_is_lit() {
        let fixture = Fixture::new();
        let far = Vec3::new(1e4, 0.0, 0.0);
        assert!(fixture.sampler().locate(far).is_none());
        assert_eq!(fixture.sampler().sample_shadow_factor(far), 1.0);
    }

    #[test]
    fn backed_page_compares_depth() {
        let mut fixture = Fixture::new();
        let p = Vec3::new(0.3, 0.0, -0.2);
        let location = fixture.back(p);
        let slot = location.slot.unwrap();

        // Freshly cleared pages never occlude.
        assert_eq!(fixture.sampler().sample_shadow_factor(p), 1.0);

        let occluder = location.depth - 0.01;
        fixture
            .pool
            .par_for_slots(&[(slot, occluder)], |_, d, texels| texels.fill(*d));
        assert_eq!(fixture.sampler().sample_shadow_factor(p), 0.0);

        let behind = location.depth + 0.01;
        fixture
            .pool
            .par_for_slots(&[(slot, behind)], |_, d, texels| texels.fill(*d));
        assert_eq!(fixture.sampler().sample_shadow_factor(p), 1.0);
    }

    #[test]
    fn idle_resident_page_is_not_compared() {
        let mut fixture = Fixture::new();
        let p = Vec3::new(0.3, 0.0, -0.2);
        let location = fixture.back(p);
        let slot = location.slot.unwrap();
        let occluder = location.depth - 0.01;
        fixture
            .pool
            .par_for_slots(&[(slot, occluder)], |_, d, texels| texels.fill(*d));
        assert_eq!(fixture.sampler().sample_shadow_factor(p), 0.0);

        // Still backed, but no longer painted for this projection.
        fixture.table.reset();
        let idle = fixture.sampler().locate(p).unwrap();
        assert_eq!(idle.slot, Some(slot));
        assert!(!idle.painted);
        assert_eq!(fixture.sampler().sample_shadow_factor(p), 1.0);
    }

    #[test]
    fn repeated_queries_are_stable() {
        let mut fixture = Fixture::new();
        let p = Vec3::new(-1.3, 0.4, 0.9);
        fixture.back(p);
        let sampler = fixture.sampler();
        let first = (sampler.locate(p), sampler.sample_shadow_factor(p));
        let second = (sampler.locate(p), sampler.sample_shadow_factor(p));
        assert_eq!(first, second);
    }
}
