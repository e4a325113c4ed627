//! Engine configuration.

use penumbra_core::constants::{MAX_CASCADES, MAX_PACKED_COORD, MAX_PACKED_RECENCY};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VsmError};

/// Largest page edge length in texels.
const MAX_PAGE_RESOLUTION: u32 = 4096;

/// Texel coordinates stay exact in `f32` up to this cascade resolution.
const MAX_CASCADE_RESOLUTION: u32 = 1 << 24;

/// Depth texels the physical pool may hold (1 GiB of `f32`).
const MAX_POOL_TEXELS: u64 = 1 << 28;

/// How the allocator frees slots when demand exceeds the free list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvictionPolicy {
    /// Only pages whose recency ran out are reclaimed; excess requests wait.
    #[default]
    ExpiredOnly,
    /// Additionally evict idle (non-visible) pages, oldest first, while
    /// requests are still pending.
    LeastRecent,
}

/// Virtual shadow map configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VsmConfig {
    /// Edge length of a page in texels (power of two).
    pub page_resolution: u32,
    /// Pages per axis of every cascade's page table (power of two).
    pub page_table_resolution: u32,
    /// Number of clipmap cascades.
    pub cascade_count: u32,
    /// Physical page slots per axis of the pool atlas.
    pub physical_pages_per_axis: u32,
    /// Half-extent of cascade 0 in world units.
    pub cascade_size_0: f32,
    /// Half-depth of the light's orthographic projection in world units.
    pub depth_range: f32,
    /// Distance the shadow camera is pulled back towards the light.
    pub light_distance: f32,
    /// Recency assigned to visible pages; idle pages live this many frames.
    pub max_recency: u8,
    /// Allocation behaviour under pressure.
    pub eviction: EvictionPolicy,
    /// Light direction change (1 - cos angle) that invalidates every page.
    pub light_change_epsilon: f32,
}

impl Default for VsmConfig {
    fn default() -> Self {
        Self {
            page_resolution: 128,
            page_table_resolution: 64,
            cascade_count: 8,
            physical_pages_per_axis: 32,
            cascade_size_0: 2.0,
            depth_range: 50.0,
            light_distance: 5.0,
            max_recency: MAX_PACKED_RECENCY,
            eviction: EvictionPolicy::ExpiredOnly,
            light_change_epsilon: 1e-4,
        }
    }
}

impl VsmConfig {
    /// Set page resolution and page table resolution together.
    #[must_use]
    pub fn with_pages(mut self, page_resolution: u32, page_table_resolution: u32) -> Self {
        self.page_resolution = page_resolution;
        self.page_table_resolution = page_table_resolution;
        self
    }

    /// Set the number of cascades.
    #[must_use]
    pub fn with_cascades(mut self, cascade_count: u32) -> Self {
        self.cascade_count = cascade_count;
        self
    }

    /// Set the number of physical page slots per axis.
    #[must_use]
    pub fn with_pool(mut self, physical_pages_per_axis: u32) -> Self {
        self.physical_pages_per_axis = physical_pages_per_axis;
        self
    }

    /// Set the half-extent of cascade 0.
    #[must_use]
    pub fn with_cascade_size(mut self, cascade_size_0: f32) -> Self {
        self.cascade_size_0 = cascade_size_0;
        self
    }

    /// Set the eviction policy.
    #[must_use]
    pub fn with_eviction(mut self, eviction: EvictionPolicy) -> Self {
        self.eviction = eviction;
        self
    }

    /// Set the light projection depth range and pull-back distance.
    #[must_use]
    pub fn with_light_depth(mut self, depth_range: f32, light_distance: f32) -> Self {
        self.depth_range = depth_range;
        self.light_distance = light_distance;
        self
    }

    /// Texels per axis of one cascade's virtual texture.
    ///
    /// Only meaningful for a configuration that passed [`VsmConfig::validate`].
    #[inline]
    pub const fn cascade_resolution(&self) -> u32 {
        self.page_resolution * self.page_table_resolution
    }

    /// Page size in virtual UV units.
    #[inline]
    pub fn page_uv(&self) -> f32 {
        self.page_resolution as f32 / self.cascade_resolution() as f32
    }

    /// Page size in light NDC units.
    #[inline]
    pub fn page_ndc(&self) -> f32 {
        2.0 * self.page_uv()
    }

    /// World-space edge length of one virtual texel in `cascade`.
    #[inline]
    pub fn texel_world_size(&self, cascade: penumbra_core::CascadeIndex) -> f32 {
        2.0 * self.cascade_size_0 * cascade.scale() / self.cascade_resolution() as f32
    }

    /// Total number of physical page slots.
    #[inline]
    pub const fn pool_capacity(&self) -> u32 {
        self.physical_pages_per_axis * self.physical_pages_per_axis
    }

    /// Check every field; a failure here is an initialization failure of the engine.
    pub fn validate(&self) -> Result<()> {
        if !self.page_resolution.is_power_of_two() || self.page_resolution > MAX_PAGE_RESOLUTION {
            return Err(invalid(format!(
                "page_resolution {} is not a power of two up to {MAX_PAGE_RESOLUTION}",
                self.page_resolution
            )));
        }
        if !self.page_table_resolution.is_power_of_two()
            || self.page_table_resolution > u32::from(u16::MAX)
        {
            return Err(invalid(format!(
                "page_table_resolution {} is not a power of two in u16 range",
                self.page_table_resolution
            )));
        }
        let cascade_resolution = self
            .page_resolution
            .checked_mul(self.page_table_resolution)
            .filter(|&r| r <= MAX_CASCADE_RESOLUTION);
        if cascade_resolution.is_none() {
            return Err(invalid(format!(
                "cascade resolution {} x {} exceeds f32 texel precision",
                self.page_resolution, self.page_table_resolution
            )));
        }
        if self.cascade_count == 0 || self.cascade_count as usize > MAX_CASCADES {
            return Err(invalid(format!(
                "cascade_count {} outside 1..={MAX_CASCADES}",
                self.cascade_count
            )));
        }
        if self.physical_pages_per_axis == 0 || self.physical_pages_per_axis > MAX_PACKED_COORD + 1
        {
            return Err(invalid(format!(
                "physical_pages_per_axis {} outside 1..={}",
                self.physical_pages_per_axis,
                MAX_PACKED_COORD + 1
            )));
        }
        let pool_texels =
            u64::from(self.pool_capacity()) * u64::from(self.page_resolution).pow(2);
        if pool_texels > MAX_POOL_TEXELS {
            return Err(invalid(format!(
                "physical pool of {pool_texels} texels exceeds {MAX_POOL_TEXELS}"
            )));
        }
        if !(self.cascade_size_0.is_finite() && self.cascade_size_0 > 0.0) {
            return Err(invalid(format!(
                "cascade_size_0 {} must be positive",
                self.cascade_size_0
            )));
        }
        if !(self.depth_range.is_finite() && self.depth_range > 0.0) {
            return Err(invalid(format!(
                "depth_range {} must be positive",
                self.depth_range
            )));
        }
        if !self.light_distance.is_finite() || self.light_distance.abs() >= self.depth_range {
            return Err(invalid(format!(
                "light_distance {} must lie inside the depth range",
                self.light_distance
            )));
        }
        if self.max_recency == 0 || self.max_recency > MAX_PACKED_RECENCY {
            return Err(invalid(format!(
                "max_recency {} outside 1..={MAX_PACKED_RECENCY}",
                self.max_recency
            )));
        }
        if !(self.light_change_epsilon >= 0.0) {
            return Err(invalid("light_change_epsilon must be non-negative".to_string()));
        }
        Ok(())
    }
}

fn invalid(message: String) -> VsmError {
    VsmError::InvalidConfig(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn default_config_is_valid() {
        let config = VsmConfig::default();
        config.validate().unwrap();
        assert_eq!(config.eviction, EvictionPolicy::ExpiredOnly);
        assert_eq!(config.cascade_resolution(), 8192);
        assert_eq!(config.pool_capacity(), 1024);
        assert_relative_eq!(config.page_ndc(), 2.0 / 64.0);
        assert_relative_eq!(
            config.texel_world_size(penumbra_core::CascadeIndex(3)),
            8.0 * 4.0 / 8192.0
        );
    }

    #[test]
    fn rejects_non_power_of_two_pages() {
        let config = VsmConfig::default().with_pages(100, 64);
        assert!(matches!(
            config.validate(),
            Err(VsmError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_oversized_resolutions_without_overflow() {
        let huge_table = VsmConfig::default().with_pages(1 << 20, 1 << 12);
        assert!(matches!(
            huge_table.validate(),
            Err(VsmError::InvalidConfig(_))
        ));

        let huge_page = VsmConfig::default().with_pages(1 << 16, 1).with_pool(1);
        assert!(huge_page.validate().is_err());

        let precision = VsmConfig::default().with_pages(4096, 8192);
        assert!(precision.validate().is_err());
    }

    #[test]
    fn rejects_pool_beyond_texel_budget() {
        let config = VsmConfig::default()
            .with_pages(MAX_PAGE_RESOLUTION, 16)
            .with_pool(MAX_PACKED_COORD + 1);
        assert!(config.validate().is_err());

        // 2^14 slots of 2^14 texels sits exactly on the budget.
        let config = VsmConfig::default().with_pages(128, 64).with_pool(128);
        config.validate().unwrap();
    }

    #[test]
    fn rejects_unpackable_pool() {
        let config = VsmConfig::default().with_pool(MAX_PACKED_COORD + 2);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_recency_that_does_not_fit() {
        let mut config = VsmConfig::default();
        config.max_recency = 16;
        assert!(config.validate().is_err());
        config.max_recency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_light_outside_depth_range() {
        let config = VsmConfig::default().with_light_depth(4.0, 5.0);
        assert!(config.validate().is_err());
    }
}
