use approx::assert_abs_diff_eq;
use std::collections::BTreeMap;
use trackcore::estimation::{AntennaPatternModel, SpectrumEstimator};
use trackcore::interface::{
    CalibrationStore, InMemoryRecordSet, SignalRecord, Site, SkipReason, SteeringVectorTable,
};
use trackcore::math::{PlanarPoint, StatsHelper};
use trackcore::prelude::{Complex32, EstimationConfig, EstimationError, EstimatorKind, TimeWindow};
use trackcore::session::TrackingSession;

const KINDS: [EstimatorKind; 2] = [EstimatorKind::Bartlett, EstimatorKind::MaximumLikelihood];

fn uca() -> SteeringVectorTable {
    SteeringVectorTable::circular_array(4, 0.35, 1.0).unwrap()
}

fn model() -> AntennaPatternModel {
    AntennaPatternModel::new(uca()).unwrap()
}

fn two_site_store() -> CalibrationStore {
    let mut store = CalibrationStore::new();
    store.insert(Site::new(1, "west", PlanarPoint::new(0.0, 0.0)), model());
    store.insert(Site::new(2, "east", PlanarPoint::new(1000.0, 0.0)), model());
    store
}

#[test]
fn calibration_round_trip_is_byte_identical() {
    let table = uca();
    let bytes = table.to_bytes().unwrap();
    let restored = SteeringVectorTable::from_bytes(&bytes).unwrap();
    assert_eq!(restored, table);
    assert_eq!(restored.to_bytes().unwrap(), bytes);

    let model = AntennaPatternModel::load(&bytes).unwrap();
    assert_eq!(model.save().unwrap(), bytes);
}

#[test]
fn truncated_calibration_is_malformed() {
    let bytes = uca().to_bytes().unwrap();
    let err = SteeringVectorTable::from_bytes(&bytes[..bytes.len() - 3]).unwrap_err();
    assert!(matches!(err, EstimationError::MalformedCalibration(_)));
}

#[test]
fn calibrated_snapshot_lands_on_its_angle() {
    let model = model();
    for angle in [0usize, 37, 180, 359] {
        let snapshot = model.table().response(angle).to_vec();
        for kind in KINDS {
            let spectrum = kind.estimate(&snapshot, &model).unwrap();
            assert_eq!(
                StatsHelper::arg_best(&spectrum, kind.orientation(), &[]),
                Some(angle),
                "{:?} at {}",
                kind,
                angle
            );
        }
    }
}

#[test]
fn metrics_ignore_scale_and_global_phase() {
    let model = model();
    let reference = model.table().response(120).to_vec();
    let rotated: Vec<Complex32> = reference
        .iter()
        .map(|v| *v * Complex32::from_polar(3.0, 1.1))
        .collect();

    for kind in KINDS {
        let base = kind.estimate(&reference, &model).unwrap();
        let moved = kind.estimate(&rotated, &model).unwrap();
        for (a, b) in base.iter().zip(&moved) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-5);
        }
    }
}

#[test]
fn per_channel_phase_changes_metrics() {
    let model = model();
    let reference = model.table().response(120).to_vec();
    let mut perturbed = reference.clone();
    perturbed[1] *= Complex32::from_polar(1.0, 0.8);

    for kind in KINDS {
        let base = kind.estimate(&reference, &model).unwrap();
        let moved = kind.estimate(&perturbed, &model).unwrap();
        let largest = base
            .iter()
            .zip(&moved)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        assert!(largest > 1e-3, "{:?} unchanged", kind);
    }
}

#[test]
fn two_sites_triangulate_emitter() {
    let store = two_site_store();
    let table = uca();
    // Emitter at (500, 500): 45 deg from the west site, 315 deg from the east site.
    let records = InMemoryRecordSet::from_records(vec![
        SignalRecord::new(1, 0.5, table.response(45).to_vec(), 1.0, 1),
        SignalRecord::new(2, 0.5, table.response(315).to_vec(), 1.0, 2),
    ]);
    let windows = BTreeMap::from([(1, TimeWindow::new(0.0, 1.0)), (2, TimeWindow::new(0.0, 1.0))]);

    for kind in KINDS {
        let config = EstimationConfig {
            estimator: kind,
            ..Default::default()
        };
        let session = TrackingSession::new(&store, &records, config);
        let outcome = session.estimate_position(&windows, None).unwrap();
        let fix = outcome.fix.unwrap();
        assert!(fix.estimate.distance(&PlanarPoint::new(500.0, 500.0)) < 10.0);
        assert!(fix.contributing_sites.contains(&1) && fix.contributing_sites.contains(&2));
    }
}

#[test]
fn one_contributing_site_is_insufficient() {
    let store = two_site_store();
    let records = InMemoryRecordSet::from_records(vec![SignalRecord::new(
        1,
        0.5,
        uca().response(10).to_vec(),
        1.0,
        1,
    )]);
    let session = TrackingSession::new(&store, &records, EstimationConfig::default());
    // Site 2 has no records in the window, leaving one contributor.
    let windows = BTreeMap::from([(1, TimeWindow::new(0.0, 1.0)), (2, TimeWindow::new(0.0, 1.0))]);
    let outcome = session.estimate_position(&windows, None).unwrap();
    assert_eq!(outcome.skip_reason(2), Some(SkipReason::NoEligibleRecords));
    assert_eq!(outcome.fix.unwrap_err(), EstimationError::InsufficientSites { found: 1 });
}

#[test]
fn quality_threshold_is_inclusive() {
    let store = two_site_store();
    let table = uca();
    let records = InMemoryRecordSet::from_records(
        [0.1, 0.5, 0.9]
            .iter()
            .enumerate()
            .map(|(i, &q)| SignalRecord::new(1, i as f64 * 0.1, table.response(90).to_vec(), q, i as u64)),
    );
    let session = TrackingSession::new(&store, &records, EstimationConfig::default());
    let batch = session
        .estimate_bearings(1, TimeWindow::new(0.0, 1.0), Some(0.5))
        .unwrap();
    let kept: Vec<f64> = batch.estimates.iter().map(|e| e.timestamp).collect();
    assert_eq!(kept, vec![0.1, 0.2]);
    assert_eq!(batch.filtered, 1);
}

#[test]
fn empty_record_set_yields_no_spectra() {
    let store = two_site_store();
    let records = InMemoryRecordSet::new();
    let session = TrackingSession::new(&store, &records, EstimationConfig::default());
    let batch = session
        .estimate_bearings(1, TimeWindow::new(0.0, 1.0), None)
        .unwrap();
    assert!(batch.is_empty());
    assert_eq!(batch.spectra().count(), 0);
}
