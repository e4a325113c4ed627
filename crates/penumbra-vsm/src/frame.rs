//! Frame orchestration.
//!
//! [`VirtualShadowMap`] owns the page table, the physical pool and the
//! allocation counters across frames. Each frame runs the passes in a fixed
//! order; calling a pass early or twice returns [`VsmError::PassOrder`].

use glam::{IVec2, Vec3};
use hashbrown::HashSet;
use penumbra_core::constants::PHYSICAL_CLEAR_DEPTH;
use penumbra_core::{PageKey, PhysicalSlot};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::allocator::{allocate_pages, AllocationState};
use crate::caster::{PageRenderRequest, ShadowCaster};
use crate::clipmap::resolve;
use crate::config::VsmConfig;
use crate::depth::DepthView;
use crate::error::{Result, VsmError};
use crate::page_table::PageTable;
use crate::physical_pool::PhysicalPagePool;
use crate::projection::LightProjection;
use crate::sampling::ShadowSampler;

/// Position inside the per-frame pass sequence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FramePhase {
    /// Between frames.
    #[default]
    Idle,
    /// Light projection computed for this frame.
    LightResolved,
    /// Page table reset, allocation counters cleared.
    Reset,
    /// Visible pages marked from the depth buffer.
    Marked,
    /// Physical slots assigned.
    Allocated,
    /// Backed visible pages rendered; sampling is available.
    Rendered,
}

/// Per-frame inputs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameInputs {
    pub camera_position: Vec3,
    /// Direction towards the light; need not be normalized.
    pub light_direction: Vec3,
}

/// Summary of one completed frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frame: u64,
    pub allocation: AllocationState,
    pub visible_pages: u32,
    pub resident_pages: u32,
    pub rendered_pages: u32,
    pub free_slots: u32,
    pub page_offset: IVec2,
}

/// The virtual shadow map engine.
pub struct VirtualShadowMap {
    config: VsmConfig,
    table: PageTable,
    pool: PhysicalPagePool,
    state: AllocationState,
    phase: FramePhase,
    frame_index: u64,
    /// Projection of the frame in flight.
    projection: Option<LightProjection>,
    /// Projection the pool contents were last rendered with.
    rendered_projection: Option<LightProjection>,
    last_direction: Option<Vec3>,
    pending_invalidated: u32,
    visible_pages: u32,
    rendered_pages: u32,
    /// An abandoned frame already aged every page.
    skip_aging: bool,
    saturation_reported: bool,
}

impl VirtualShadowMap {
    /// Create the engine. Fails if the configuration is invalid.
    pub fn new(config: VsmConfig) -> Result<Self> {
        config.validate()?;
        info!(
            page_resolution = config.page_resolution,
            page_table_resolution = config.page_table_resolution,
            cascades = config.cascade_count,
            pool_slots = config.pool_capacity(),
            "Creating virtual shadow map"
        );
        Ok(Self {
            table: PageTable::new(config.page_table_resolution, config.cascade_count),
            pool: PhysicalPagePool::new(&config),
            config,
            state: AllocationState::default(),
            phase: FramePhase::Idle,
            frame_index: 0,
            projection: None,
            rendered_projection: None,
            last_direction: None,
            pending_invalidated: 0,
            visible_pages: 0,
            rendered_pages: 0,
            skip_aging: false,
            saturation_reported: false,
        })
    }

    #[inline]
    pub fn config(&self) -> &VsmConfig {
        &self.config
    }

    #[inline]
    pub fn page_table(&self) -> &PageTable {
        &self.table
    }

    #[inline]
    pub fn pool(&self) -> &PhysicalPagePool {
        &self.pool
    }

    #[inline]
    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    /// Number of completed frames.
    #[inline]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Light projection of the frame in flight.
    #[inline]
    pub fn projection(&self) -> Option<&LightProjection> {
        self.projection.as_ref()
    }

    /// Resolve the light projection for this frame.
    ///
    /// A light direction change beyond `light_change_epsilon` drops every page,
    /// since their depth was rendered along the old direction.
    pub fn begin_frame(&mut self, inputs: FrameInputs) -> Result<()> {
        self.require_phase(FramePhase::Idle)?;
        let _span = tracing::trace_span!("vsm.begin_frame").entered();

        let projection =
            LightProjection::new(inputs.light_direction, inputs.camera_position, &self.config)?;
        let direction = projection.direction();
        if let Some(previous) = self.last_direction {
            if 1.0 - previous.dot(direction) > self.config.light_change_epsilon {
                let dropped = self.drop_all_pages();
                debug!(dropped, "Light direction changed, invalidated pages");
                self.pending_invalidated += dropped;
            }
        }
        self.last_direction = Some(direction);
        self.projection = Some(projection);
        self.phase = FramePhase::LightResolved;
        Ok(())
    }

    /// Clear allocation counters, clear visibility and age every page.
    ///
    /// Pages are not aged again if the previous frame was abandoned after its
    /// own reset.
    pub fn reset_pass(&mut self) -> Result<()> {
        self.require_phase(FramePhase::LightResolved)?;
        let _span = tracing::trace_span!("vsm.reset").entered();

        self.state.clear();
        self.state.invalidated = std::mem::take(&mut self.pending_invalidated);
        if std::mem::take(&mut self.skip_aging) {
            self.table.clear_visibility();
        } else {
            self.table.reset();
        }
        // Visibility no longer describes the rendered pages.
        self.rendered_projection = None;
        self.visible_pages = 0;
        self.rendered_pages = 0;
        self.phase = FramePhase::Reset;
        Ok(())
    }

    /// Mark every page seen through the camera depth buffer.
    #[cfg_attr(feature = "profiling-tracy", tracing::instrument(level = "trace", skip_all))]
    pub fn mark_visible_pass(&mut self, depth: &DepthView<'_>) -> Result<()> {
        self.require_phase(FramePhase::Reset)?;
        let projection = self.current_projection()?;
        let _span = tracing::trace_span!("vsm.mark_visible").entered();

        let keys = visible_pages(depth, &projection, &self.config);
        for &key in &keys {
            self.table.mark_visible(key);
        }
        self.visible_pages = keys.len() as u32;
        self.phase = FramePhase::Marked;
        Ok(())
    }

    /// Reclaim expired pages and back newly visible ones.
    #[cfg_attr(feature = "profiling-tracy", tracing::instrument(level = "trace", skip_all))]
    pub fn allocate_pass(&mut self) -> Result<()> {
        self.require_phase(FramePhase::Marked)?;
        let _span = tracing::trace_span!("vsm.allocate").entered();

        allocate_pages(
            &mut self.table,
            &mut self.pool,
            &mut self.state,
            self.config.eviction,
            self.config.max_recency,
        );
        if self.state.starved > 0 {
            if !self.saturation_reported {
                warn!(
                    capacity = self.pool.capacity(),
                    starved = self.state.starved,
                    "Physical page pool saturated; pages stay unbacked until slots free up"
                );
                self.saturation_reported = true;
            }
            debug!(
                starved = self.state.starved,
                "Page requests left unbacked this frame"
            );
        }
        self.phase = FramePhase::Allocated;
        Ok(())
    }

    /// Clear every backed page that is visible this frame and render casters
    /// into it.
    #[cfg_attr(feature = "profiling-tracy", tracing::instrument(level = "trace", skip_all))]
    pub fn render_pass(&mut self, caster: &dyn ShadowCaster) -> Result<()> {
        self.require_phase(FramePhase::Allocated)?;
        let projection = self.current_projection()?;
        let _span = tracing::trace_span!("vsm.render").entered();

        let render_list = self.render_list(&projection);
        self.pool.par_for_slots(&render_list, |_, request, texels| {
            texels.fill(PHYSICAL_CLEAR_DEPTH);
            caster.render_page(request, texels);
        });
        self.rendered_pages = render_list.len() as u32;
        self.rendered_projection = Some(projection);
        self.phase = FramePhase::Rendered;
        Ok(())
    }

    /// Sampler over the most recently rendered pages.
    ///
    /// Available once a frame has been rendered, until the next frame resets
    /// the page table.
    pub fn sampler(&self) -> Result<ShadowSampler<'_>> {
        let rendered = match self.phase {
            FramePhase::Rendered | FramePhase::Idle => self.rendered_projection.as_ref(),
            _ => None,
        };
        let projection = rendered.ok_or(VsmError::PassOrder {
            expected: FramePhase::Rendered,
            found: self.phase,
        })?;
        Ok(ShadowSampler::new(
            &self.config,
            &self.table,
            &self.pool,
            projection,
        ))
    }

    /// Finish the frame and report its statistics.
    pub fn end_frame(&mut self) -> Result<FrameStats> {
        self.require_phase(FramePhase::Rendered)?;
        let stats = FrameStats {
            frame: self.frame_index,
            allocation: self.state,
            visible_pages: self.visible_pages,
            resident_pages: self.pool.used_count(),
            rendered_pages: self.rendered_pages,
            free_slots: self.pool.free_count(),
            page_offset: self
                .projection
                .as_ref()
                .map_or(IVec2::ZERO, LightProjection::page_offset),
        };
        debug!(
            frame = stats.frame,
            visible = stats.visible_pages,
            resident = stats.resident_pages,
            requested = stats.allocation.requested,
            allocated = stats.allocation.allocated,
            reclaimed = stats.allocation.reclaimed,
            evicted = stats.allocation.evicted,
            starved = stats.allocation.starved,
            "Virtual shadow map frame"
        );
        self.frame_index += 1;
        self.phase = FramePhase::Idle;
        Ok(stats)
    }

    /// Run every pass of one frame in order.
    pub fn run_frame(
        &mut self,
        inputs: FrameInputs,
        depth: &DepthView<'_>,
        caster: &dyn ShadowCaster,
    ) -> Result<FrameStats> {
        let _span = tracing::trace_span!("vsm.frame", frame = self.frame_index).entered();
        self.begin_frame(inputs)?;
        self.reset_pass()?;
        self.mark_visible_pass(depth)?;
        self.allocate_pass()?;
        self.render_pass(caster)?;
        self.end_frame()
    }

    /// Drop the frame in flight. Page table and pool stay consistent.
    ///
    /// If the frame already ran its reset pass, the next reset clears
    /// visibility without aging the pages a second time.
    pub fn abandon_frame(&mut self) {
        match self.phase {
            FramePhase::Idle => return,
            FramePhase::LightResolved => {}
            _ => self.skip_aging = true,
        }
        debug!(phase = ?self.phase, "Abandoning frame");
        self.phase = FramePhase::Idle;
    }

    /// Invalidate every page and free every slot.
    pub fn reinitialize(&mut self) {
        let dropped = self.drop_all_pages();
        info!(dropped, "Reinitializing virtual shadow map");
        self.state.clear();
        self.pending_invalidated = 0;
        self.last_direction = None;
        self.projection = None;
        self.rendered_projection = None;
        self.skip_aging = false;
        self.saturation_reported = false;
        self.phase = FramePhase::Idle;
    }

    fn drop_all_pages(&mut self) -> u32 {
        let released = self.table.invalidate_all();
        self.pool.release_all();
        released.len() as u32
    }

    fn render_list(&self, projection: &LightProjection) -> Vec<(PhysicalSlot, PageRenderRequest)> {
        self.table
            .iter()
            .filter(|(_, entry)| entry.is_visible())
            .filter_map(|(key, entry)| {
                let slot = entry.physical()?;
                Some((slot, PageRenderRequest::new(key, slot, projection, &self.config)))
            })
            .collect()
    }

    fn current_projection(&self) -> Result<LightProjection> {
        self.projection.ok_or(VsmError::PassOrder {
            expected: FramePhase::LightResolved,
            found: self.phase,
        })
    }

    fn require_phase(&self, expected: FramePhase) -> Result<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(VsmError::PassOrder {
                expected,
                found: self.phase,
            })
        }
    }
}

/// Set of pages covering every foreground texel of `depth`.
fn visible_pages(
    depth: &DepthView<'_>,
    projection: &LightProjection,
    config: &VsmConfig,
) -> HashSet<PageKey> {
    let light_view_projection = projection.view_projection();
    (0..depth.height())
        .into_par_iter()
        .fold(HashSet::new, |mut keys, y| {
            for (x, &d) in depth.row(y).iter().enumerate() {
                let Some(world) = depth.unproject(x as u32, y, d) else {
                    continue;
                };
                if let Some(sample) = resolve(world, light_view_projection, config.cascade_count) {
                    keys.insert(sample.page_and_offset(config).0);
                }
            }
            keys
        })
        .reduce(HashSet::new, |mut a, b| {
            a.extend(b);
            a
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvictionPolicy;
    use glam::Mat4;

    /// Writes a constant depth everywhere it is allowed to.
    struct FlatCaster(f32);

    impl ShadowCaster for FlatCaster {
        fn render_page(&self, request: &PageRenderRequest, target: &mut [f32]) {
            let page = request.page_resolution;
            for region in &request.regions {
                for y in region.clip.min.y..region.clip.max.y {
                    for x in region.clip.min.x..region.clip.max.x {
                        let texel = &mut target[(y * page + x) as usize];
                        *texel = texel.min(self.0);
                    }
                }
            }
        }
    }

    /// Writes the light depth of the ground plane y = 0.
    struct GroundCaster;

    impl ShadowCaster for GroundCaster {
        fn render_page(&self, request: &PageRenderRequest, target: &mut [f32]) {
            let ground = request.view_projection.project_point3(Vec3::ZERO).z;
            FlatCaster(ground).render_page(request, target);
        }
    }

    fn config() -> VsmConfig {
        VsmConfig::default()
            .with_pages(8, 16)
            .with_cascades(4)
            .with_pool(16)
    }

    fn inputs() -> FrameInputs {
        FrameInputs {
            camera_position: Vec3::new(0.0, 2.0, 3.0),
            light_direction: Vec3::Y,
        }
    }

    /// A camera looking down at the ground plane y = 0.
    fn ground_depth(width: u32, height: u32) -> (Vec<f32>, Mat4) {
        let eye = inputs().camera_position;
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
        let proj = Mat4::perspective_rh(1.0, 1.0, 0.1, 50.0);
        let vp = proj * view;
        let inv = vp.inverse();
        let mut depth = vec![1.0; (width * height) as usize];
        for y in 0..height {
            for x in 0..width {
                let ndc_x = (x as f32 + 0.5) / width as f32 * 2.0 - 1.0;
                let ndc_y = 1.0 - (y as f32 + 0.5) / height as f32 * 2.0;
                let near = inv.project_point3(Vec3::new(ndc_x, ndc_y, 0.0));
                let far = inv.project_point3(Vec3::new(ndc_x, ndc_y, 1.0));
                let dir = far - near;
                if dir.y < -1e-6 {
                    let t = -near.y / dir.y;
                    let hit = near + dir * t;
                    depth[(y * width + x) as usize] = vp.project_point3(hit).z;
                }
            }
        }
        (depth, inv)
    }

    #[test]
    fn invalid_config_fails_initialization() {
        let config = VsmConfig::default().with_cascades(0);
        assert!(matches!(
            VirtualShadowMap::new(config),
            Err(VsmError::InvalidConfig(_))
        ));
        // Would overflow the pool size computation if it got that far.
        let oversized = VsmConfig::default().with_pages(1 << 16, 1).with_pool(1);
        assert!(matches!(
            VirtualShadowMap::new(oversized),
            Err(VsmError::InvalidConfig(_))
        ));
    }

    #[test]
    fn passes_must_run_in_order() {
        let mut vsm = VirtualShadowMap::new(config()).unwrap();
        assert!(matches!(
            vsm.allocate_pass(),
            Err(VsmError::PassOrder {
                expected: FramePhase::Marked,
                found: FramePhase::Idle
            })
        ));
        assert!(vsm.sampler().is_err());

        vsm.begin_frame(inputs()).unwrap();
        assert!(vsm.begin_frame(inputs()).is_err());
        assert!(vsm.render_pass(&FlatCaster(0.0)).is_err());
        vsm.reset_pass().unwrap();
        assert_eq!(vsm.phase(), FramePhase::Reset);
    }

    #[test]
    fn full_frame_backs_visible_pages() {
        let mut vsm = VirtualShadowMap::new(config()).unwrap();
        let (depth, inv) = ground_depth(32, 32);
        let view = DepthView::new(32, 32, &depth, inv).unwrap();

        let stats = vsm.run_frame(inputs(), &view, &FlatCaster(0.0)).unwrap();
        assert!(stats.visible_pages > 0);
        assert_eq!(stats.allocation.requested, stats.visible_pages);
        assert_eq!(
            stats.allocation.allocated + stats.allocation.starved,
            stats.allocation.requested
        );
        assert_eq!(stats.rendered_pages, stats.allocation.allocated);
        assert_eq!(vsm.phase(), FramePhase::Idle);

        // Second frame: same view, nothing new requested, everything refreshed.
        let stats = vsm.run_frame(inputs(), &view, &FlatCaster(0.0)).unwrap();
        assert_eq!(stats.frame, 1);
        assert_eq!(stats.allocation.reclaimed, 0);
        assert_eq!(vsm.frame_index(), 2);
    }

    #[test]
    fn sampler_sees_rendered_depth() {
        let mut vsm = VirtualShadowMap::new(config()).unwrap();
        let (depth, inv) = ground_depth(16, 16);
        let view = DepthView::new(16, 16, &depth, inv).unwrap();
        // Depth 0.0 is nearest to the light: every backed texel occludes the ground.
        vsm.run_frame(inputs(), &view, &FlatCaster(0.0)).unwrap();

        let sampler = vsm.sampler().unwrap();
        let world = view.world_position(8, 8).unwrap();
        assert_eq!(sampler.sample_shadow_factor(world), 0.0);
    }

    /// Ground point seen by the centre pixel, snapped onto the plane.
    fn center_ground(view: &DepthView<'_>) -> Vec3 {
        let mut world = view.world_position(8, 8).unwrap();
        world.y = 0.0;
        world
    }

    #[test]
    fn pages_are_cleared_before_every_repaint() {
        let mut vsm = VirtualShadowMap::new(config()).unwrap();
        let (depth, inv) = ground_depth(16, 16);
        let view = DepthView::new(16, 16, &depth, inv).unwrap();
        let world = center_ground(&view);

        vsm.run_frame(inputs(), &view, &FlatCaster(0.0)).unwrap();
        assert_eq!(vsm.sampler().unwrap().sample_shadow_factor(world), 0.0);

        // The occluder is gone; nothing of the previous paint may remain.
        vsm.run_frame(inputs(), &view, &GroundCaster).unwrap();
        let sampler = vsm.sampler().unwrap();
        let location = sampler.locate(world).unwrap();
        let stored = vsm.pool().depth(location.slot.unwrap(), location.offset);
        assert_eq!(stored, location.depth);
        assert_eq!(sampler.sample_shadow_factor(world), 1.0);
    }

    #[test]
    fn camera_rise_leaves_open_ground_lit() {
        let mut vsm = VirtualShadowMap::new(config()).unwrap();
        let (depth, inv) = ground_depth(16, 16);
        let view = DepthView::new(16, 16, &depth, inv).unwrap();
        let world = center_ground(&view);

        vsm.run_frame(inputs(), &view, &GroundCaster).unwrap();
        assert_eq!(vsm.sampler().unwrap().sample_shadow_factor(world), 1.0);

        // The light's depth translation follows the camera up; the ground
        // pages stay resident but are out of view.
        let raised = FrameInputs {
            camera_position: inputs().camera_position + Vec3::Y * 10.0,
            ..inputs()
        };
        let sky = vec![1.0; 64];
        let empty = DepthView::new(8, 8, &sky, Mat4::IDENTITY).unwrap();
        vsm.run_frame(raised, &empty, &GroundCaster).unwrap();

        let sampler = vsm.sampler().unwrap();
        let location = sampler.locate(world).unwrap();
        assert!(location.slot.is_some());
        assert!(!location.painted);
        assert_eq!(sampler.sample_shadow_factor(world), 1.0);

        // Back in view, the page is repainted with the new projection.
        vsm.run_frame(raised, &view, &GroundCaster).unwrap();
        assert_eq!(vsm.sampler().unwrap().sample_shadow_factor(world), 1.0);
    }

    #[test]
    fn background_only_buffer_requests_nothing() {
        let mut vsm = VirtualShadowMap::new(config()).unwrap();
        let depth = vec![1.0; 64];
        let view = DepthView::new(8, 8, &depth, Mat4::IDENTITY).unwrap();
        let stats = vsm.run_frame(inputs(), &view, &FlatCaster(0.0)).unwrap();
        assert_eq!(stats.visible_pages, 0);
        assert_eq!(stats.resident_pages, 0);
    }

    #[test]
    fn light_change_invalidates_pages() {
        let mut vsm = VirtualShadowMap::new(config()).unwrap();
        let (depth, inv) = ground_depth(16, 16);
        let view = DepthView::new(16, 16, &depth, inv).unwrap();
        let first = vsm.run_frame(inputs(), &view, &FlatCaster(0.5)).unwrap();

        let mut tilted = inputs();
        tilted.light_direction = Vec3::new(0.5, 1.0, 0.0);
        let second = vsm.run_frame(tilted, &view, &FlatCaster(0.5)).unwrap();
        assert_eq!(second.allocation.invalidated, first.resident_pages);
        assert_eq!(second.allocation.refreshed, 0);

        // Same direction again: nothing dropped.
        let third = vsm.run_frame(tilted, &view, &FlatCaster(0.5)).unwrap();
        assert_eq!(third.allocation.invalidated, 0);
    }

    #[test]
    fn abandoned_frame_keeps_resources() {
        let mut vsm = VirtualShadowMap::new(config()).unwrap();
        let (depth, inv) = ground_depth(16, 16);
        let view = DepthView::new(16, 16, &depth, inv).unwrap();
        vsm.run_frame(inputs(), &view, &FlatCaster(0.5)).unwrap();
        let resident = vsm.pool().used_count();

        vsm.begin_frame(inputs()).unwrap();
        vsm.reset_pass().unwrap();
        vsm.abandon_frame();
        assert_eq!(vsm.phase(), FramePhase::Idle);
        assert_eq!(vsm.pool().used_count(), resident);
        assert_eq!(vsm.page_table().valid_count() as u32, resident);
        assert!(vsm.sampler().is_err());

        vsm.run_frame(inputs(), &view, &FlatCaster(0.5)).unwrap();
        assert!(vsm.sampler().is_ok());
    }

    #[test]
    fn abandoned_frame_ages_pages_once() {
        let mut vsm = VirtualShadowMap::new(config()).unwrap();
        let (depth, inv) = ground_depth(16, 16);
        let view = DepthView::new(16, 16, &depth, inv).unwrap();
        let sky = vec![1.0; 64];
        let empty = DepthView::new(8, 8, &sky, Mat4::IDENTITY).unwrap();
        let max = vsm.config().max_recency;

        vsm.run_frame(inputs(), &view, &FlatCaster(0.5)).unwrap();
        vsm.begin_frame(inputs()).unwrap();
        vsm.reset_pass().unwrap();
        vsm.abandon_frame();
        vsm.run_frame(inputs(), &empty, &FlatCaster(0.5)).unwrap();

        let recency: Vec<u8> = vsm
            .page_table()
            .iter()
            .filter(|(_, entry)| entry.is_valid())
            .map(|(_, entry)| entry.recency())
            .collect();
        assert!(!recency.is_empty());
        assert!(recency.iter().all(|&r| r == max - 1), "{recency:?}");

        // Aging resumes on the frame after.
        vsm.run_frame(inputs(), &empty, &FlatCaster(0.5)).unwrap();
        assert!(vsm
            .page_table()
            .iter()
            .filter(|(_, entry)| entry.is_valid())
            .all(|(_, entry)| entry.recency() == max - 2));
    }

    #[test]
    fn reinitialize_frees_everything() {
        let mut vsm = VirtualShadowMap::new(config()).unwrap();
        let (depth, inv) = ground_depth(16, 16);
        let view = DepthView::new(16, 16, &depth, inv).unwrap();
        vsm.run_frame(inputs(), &view, &FlatCaster(0.5)).unwrap();
        assert!(vsm.pool().used_count() > 0);

        vsm.reinitialize();
        assert_eq!(vsm.pool().used_count(), 0);
        assert_eq!(vsm.page_table().valid_count(), 0);
        assert!(vsm.sampler().is_err());
    }

    #[test]
    fn tiny_pool_starves_and_recovers_under_pressure_eviction() {
        let config = config().with_pool(1).with_eviction(EvictionPolicy::LeastRecent);
        let mut vsm = VirtualShadowMap::new(config).unwrap();
        let (depth, inv) = ground_depth(16, 16);
        let view = DepthView::new(16, 16, &depth, inv).unwrap();
        let stats = vsm.run_frame(inputs(), &view, &FlatCaster(0.5)).unwrap();
        assert_eq!(stats.resident_pages, 1);
        assert_eq!(stats.allocation.starved, stats.visible_pages - 1);
    }
}
