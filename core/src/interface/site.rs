use crate::estimation::pattern::AntennaPatternModel;
use crate::interface::calibration::SteeringVectorTable;
use crate::math::geometry::PlanarPoint;
use crate::prelude::{EstimationError, EstimationResult, SiteId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fixed receiving station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: SiteId,
    pub name: String,
    pub location: PlanarPoint,
}

impl Site {
    pub fn new(id: SiteId, name: impl Into<String>, location: PlanarPoint) -> Self {
        Self {
            id,
            name: name.into(),
            location,
        }
    }
}

/// Boundary to the externally populated calibration store.
pub trait CalibrationSource: Sync {
    fn site(&self, site_id: SiteId) -> EstimationResult<&Site>;

    fn pattern_for_site(&self, site_id: SiteId) -> EstimationResult<&AntennaPatternModel>;

    fn table_for_site(&self, site_id: SiteId) -> EstimationResult<&SteeringVectorTable> {
        Ok(self.pattern_for_site(site_id)?.table())
    }
}

struct SiteCalibration {
    site: Site,
    model: AntennaPatternModel,
}

/// In-memory calibration store: site location plus antenna pattern per site.
#[derive(Default)]
pub struct CalibrationStore {
    sites: BTreeMap<SiteId, SiteCalibration>,
}

impl CalibrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a site's calibration.
    pub fn insert(&mut self, site: Site, model: AntennaPatternModel) {
        self.sites.insert(site.id, SiteCalibration { site, model });
    }

    /// Parses calibration bytes for a site and registers it.
    pub fn load_site(&mut self, site: Site, bytes: &[u8]) -> EstimationResult<()> {
        let model = AntennaPatternModel::load(bytes)?;
        self.insert(site, model);
        Ok(())
    }

    pub fn site_ids(&self) -> Vec<SiteId> {
        self.sites.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

impl CalibrationSource for CalibrationStore {
    fn site(&self, site_id: SiteId) -> EstimationResult<&Site> {
        self.sites
            .get(&site_id)
            .map(|entry| &entry.site)
            .ok_or(EstimationError::UnknownSite(site_id))
    }

    fn pattern_for_site(&self, site_id: SiteId) -> EstimationResult<&AntennaPatternModel> {
        self.sites
            .get(&site_id)
            .map(|entry| &entry.model)
            .ok_or(EstimationError::UnknownSite(site_id))
    }
}
