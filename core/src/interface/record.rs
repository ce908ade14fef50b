use crate::math::complex::ComplexHelper;
use crate::prelude::{Complex32, EstimationResult, SiteId, TimeWindow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;

/// One multi-channel complex snapshot of a detected pulse at a site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub site_id: SiteId,
    pub timestamp: f64,
    pub channels: Vec<Complex32>,
    pub quality_score: f64,
    pub external_id: u64,
}

impl SignalRecord {
    pub fn new(
        site_id: SiteId,
        timestamp: f64,
        channels: Vec<Complex32>,
        quality_score: f64,
        external_id: u64,
    ) -> Self {
        Self {
            site_id,
            timestamp,
            channels,
            quality_score,
            external_id,
        }
    }

    /// Snapshot power `|s|^2`.
    pub fn power(&self) -> f64 {
        ComplexHelper::energy(&self.channels)
    }

    /// Inclusive threshold: a record scoring exactly `threshold` passes.
    pub fn passes(&self, threshold: Option<f64>) -> bool {
        match threshold {
            Some(threshold) => self.quality_score >= threshold,
            None => true,
        }
    }
}

/// Boundary to the externally populated signal record store.
///
/// Implementations return records ordered by ascending timestamp.
pub trait SignalRecordSource: Sync {
    fn records_for_site(
        &self,
        site_id: SiteId,
        window: &TimeWindow,
    ) -> EstimationResult<Vec<SignalRecord>>;
}

/// Record set held in memory, keyed by site and sorted by timestamp.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordSet {
    by_site: BTreeMap<SiteId, Vec<SignalRecord>>,
}

impl InMemoryRecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<I: IntoIterator<Item = SignalRecord>>(records: I) -> Self {
        let mut set = Self::new();
        set.extend(records);
        set
    }

    /// Reads a JSON array of records.
    pub fn from_json_reader<R: Read>(reader: R) -> serde_json::Result<Self> {
        let records: Vec<SignalRecord> = serde_json::from_reader(reader)?;
        Ok(Self::from_records(records))
    }

    pub fn to_json_string(&self) -> serde_json::Result<String> {
        let records: Vec<&SignalRecord> = self.by_site.values().flatten().collect();
        serde_json::to_string(&records)
    }

    pub fn insert(&mut self, record: SignalRecord) {
        let site = self.by_site.entry(record.site_id).or_default();
        let at = site.partition_point(|r| r.timestamp <= record.timestamp);
        site.insert(at, record);
    }

    pub fn extend<I: IntoIterator<Item = SignalRecord>>(&mut self, records: I) {
        for record in records {
            self.insert(record);
        }
    }

    pub fn site_ids(&self) -> Vec<SiteId> {
        self.by_site.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.by_site.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Earliest and latest timestamps across the given sites.
    pub fn time_span(&self, sites: &[SiteId]) -> Option<TimeWindow> {
        sites
            .iter()
            .filter_map(|site| self.by_site.get(site))
            .filter_map(|records| match (records.first(), records.last()) {
                (Some(first), Some(last)) => {
                    Some(TimeWindow::new(first.timestamp, last.timestamp))
                }
                _ => None,
            })
            .reduce(|acc, span| acc.union(&span))
    }
}

impl SignalRecordSource for InMemoryRecordSet {
    fn records_for_site(
        &self,
        site_id: SiteId,
        window: &TimeWindow,
    ) -> EstimationResult<Vec<SignalRecord>> {
        let Some(records) = self.by_site.get(&site_id) else {
            return Ok(Vec::new());
        };
        let start = records.partition_point(|r| r.timestamp < window.start);
        Ok(records[start..]
            .iter()
            .take_while(|r| r.timestamp <= window.end)
            .cloned()
            .collect())
    }
}
