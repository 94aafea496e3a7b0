//! End-to-end workflow scenarios: split, calibrate, evaluate, and predict
//! against hand-computed fixtures.
use crate::conformal::calibrate::{QuantileCalibrator, QuantileMethod};
use crate::conformal::classifier::{ConformalClassifier, LabeledImage};
use crate::conformal::config::ConformalConfig;
use crate::conformal::regressor::ConformalRegressor;
use crate::data::Sample;
use crate::inference::{InferenceMode, TiledInferenceEngine};
use crate::model::PredictiveModel;
use crate::raster::{MemoryRaster, RasterSink, RasterWindow};
use crate::{GeoConformalError, PixelTable};
use std::sync::{Arc, Mutex};

#[test]
fn test_scenario_known_score_ramp() {
    // 100 calibration scores [0, 1, ..., 99] / 99 with alpha = 0.1:
    // qLevel = 100 - ceil(101 * 0.9) / 100 * 100 = 9, qHat = 8.91 / 99.
    let scores: Vec<f64> = (0..100).map(|v| v as f64 / 99.0).collect();
    let result = QuantileCalibrator::new(0.1).unwrap().calibrate(&scores).unwrap();
    assert!((result.q_level - 9.0).abs() < 1e-12);
    assert!((result.q_hat - 0.09).abs() < 1e-4);
    assert!((result.q_hat - 8.91 / 99.0).abs() < 1e-12);
}

#[test]
fn test_scenario_regression_interval() {
    // Residuals [1..5], alpha = 0.2, legacy level: qHat = 4.2, and a
    // prediction of 10 yields [5.8, 14.2] with width 8.4.
    let calibration: Vec<Sample> = (1..=5)
        .map(|i| Sample::regression(i as u64, 10.0 + i as f64, 10.0))
        .collect();
    let regressor = ConformalRegressor::new(0.2)
        .unwrap()
        .set_method(QuantileMethod::Legacy);
    let result = regressor.calibrate(&calibration).unwrap();
    let interval = regressor.predict(10.0, &result);
    assert!((interval.lower - 5.8).abs() < 1e-12);
    assert!((interval.upper - 14.2).abs() < 1e-12);
    assert!((interval.width - 8.4).abs() < 1e-12);
}

#[test]
fn test_scenario_image_workflow() {
    // Two labeled probability images, image-level calibration, evaluation
    // on the held-out image, pixel-batch prediction.
    let bands = vec!["low".to_string(), "high".to_string()];
    let config = ConformalConfig::new(bands.clone(), "label", 0.2, 0.5).set_seed(3);
    let classifier = ConformalClassifier::new(config).unwrap();

    let make_image = |offset: f64| {
        let n = 16usize;
        let mut low = Vec::with_capacity(n);
        let mut high = Vec::with_capacity(n);
        let mut labels = Vec::with_capacity(n);
        for i in 0..n {
            let p = (0.3 + offset + 0.6 * i as f64 / n as f64).min(0.99);
            low.push(1.0 - p);
            high.push(p);
            labels.push(1.0);
        }
        let mut data = low;
        data.extend(high);
        LabeledImage {
            probabilities: PixelTable::new(data, n, bands.clone()).unwrap(),
            labels,
        }
    };
    let images: Vec<LabeledImage> = (0..20).map(|i| make_image(i as f64 * 0.003)).collect();

    let (split, result) = classifier.calibrate_images(&images).unwrap();
    assert!(!split.calibration.is_empty());
    assert!(result.q_hat > 0.0);

    if !split.test.is_empty() {
        let summary = classifier.evaluate_images(&images, &split, &result).unwrap();
        assert!(summary.coverage >= 0.0 && summary.coverage <= 1.0);
        assert!(summary.n_test > 0);
    }

    let sets = classifier
        .predict_pixels(&images[0].probabilities, &result)
        .unwrap();
    assert_eq!(sets.masks.len(), 2);
    assert_eq!(sets.n_pixels, 16);
}

/// Model whose class-0 probability is the first band value.
struct BandModel;

impl PredictiveModel for BandModel {
    fn n_classes(&self) -> usize {
        2
    }

    fn predict(&self, table: &PixelTable) -> Result<Vec<f64>, GeoConformalError> {
        Ok(table.get_col(0).iter().map(|v| f64::from(*v >= 0.5)).collect())
    }

    fn predict_proba(&self, table: &PixelTable) -> Result<Vec<f64>, GeoConformalError> {
        let mut proba = Vec::with_capacity(table.rows * 2);
        for v in table.get_col(0) {
            let p = v.clamp(0.0, 1.0);
            proba.push(p);
            proba.push(1.0 - p);
        }
        Ok(proba)
    }
}

#[derive(Clone)]
struct SharedSink(Arc<Mutex<MemoryRaster>>);

impl RasterSink for SharedSink {
    fn bands(&self) -> usize {
        self.0.lock().unwrap().bands()
    }

    fn write_window(&mut self, window: &RasterWindow, data: &[f64]) -> Result<(), GeoConformalError> {
        self.0
            .lock()
            .map_err(|_| GeoConformalError::Collaborator("poisoned sink".to_string()))?
            .write_window(window, data)
    }
}

#[test]
fn test_scenario_calibrate_then_tiled_sets() {
    // Calibrate on a feature collection, then push the threshold through
    // the tiled engine in set mode over a 10x10 raster.
    let bands = vec!["c0".to_string(), "c1".to_string()];
    let config = ConformalConfig::new(bands.clone(), "label", 0.1, 0.5).set_seed(42);
    let classifier = ConformalClassifier::new(config).unwrap();

    let samples: Vec<Sample> = (0..200)
        .map(|i| {
            let p = 0.6 + 0.35 * (i as f64 / 200.0);
            let class = i % 2;
            let probs = if class == 0 { vec![p, 1.0 - p] } else { vec![1.0 - p, p] };
            Sample::classification(i as u64, class, probs)
        })
        .collect();
    let (_, result) = classifier.calibrate(&samples).unwrap();

    let feature: Vec<f64> = (0..100).map(|i| i as f64 / 99.0).collect();
    let source = MemoryRaster::from_data(10, 10, vec!["feature".to_string()], feature).unwrap();
    let sink = MemoryRaster::filled(
        10,
        10,
        vec!["c0".to_string(), "c1".to_string(), "setLength".to_string()],
        f64::NAN,
    );
    let shared = SharedSink(Arc::new(Mutex::new(sink)));

    let engine = TiledInferenceEngine::new(4, 2).unwrap();
    let mode = InferenceMode::PredictSets {
        result: result.clone(),
        dict: classifier.class_dictionary().clone(),
    };
    let report = engine.run(source, shared.clone(), &BandModel, &mode).unwrap();
    assert_eq!(report.windows, 9);
    assert_eq!(report.pixels, 100);

    let raster = shared.0.lock().unwrap().clone();
    for y in 0..10 {
        for x in 0..10 {
            let m0 = raster.get(0, x, y);
            let m1 = raster.get(1, x, y);
            assert_eq!(raster.get(2, x, y), m0 + m1);
            // The class-0 probability is the feature value itself, so the
            // mask must agree with a direct threshold comparison.
            let p0 = (y * 10 + x) as f64 / 99.0;
            assert_eq!(m0 == 1.0, p0 >= result.q_hat);
        }
    }
}
