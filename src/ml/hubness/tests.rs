use crate::data::TrainingSet;
use crate::metric::Euclidean;
use crate::ml::classifier::{Classifier, NeighborhoodSize};
use crate::ml::hubness::weighting::distance_weight;
use crate::ml::hubness::{
    AntiHubScheme, HubnessConfig, ModelTrainer, OccurrenceModel, DWHFNN, HFNN, HIKNN,
};
use approx::assert_relative_eq;

fn line() -> TrainingSet {
    TrainingSet::new(
        vec![
            vec![0.0],
            vec![1.0],
            vec![2.0],
            vec![10.0],
            vec![11.0],
            vec![12.0],
        ],
        vec![0, 0, 0, 1, 1, 1],
    )
    .unwrap()
}

/// Two well separated clusters of eight points each.
fn separable() -> TrainingSet {
    let mut features = Vec::new();
    let mut labels = Vec::new();
    for i in 0..8 {
        let (x, y) = ((i % 4) as f64 * 0.3, (i / 4) as f64 * 0.4);
        features.push(vec![x, y]);
        labels.push(0);
        features.push(vec![25.0 + y, 25.0 - x]);
        labels.push(1);
    }
    TrainingSet::new(features, labels).unwrap()
}

#[test]
fn test_six_point_scenario_by_hand() {
    let config = HubnessConfig::new(NeighborhoodSize::Fixed(3))
        .with_laplace_estimator(0.001)
        .with_distance_exponent(2.0)
        .with_anti_hub_cutoff(0);
    let mut dwh = DWHFNN::with_config(config, Euclidean);
    dwh.train(&line()).unwrap();

    // Neighbors of 1.5 are points 1, 2, 0 at 0.5, 0.5, 1.5. Points 0 and 1
    // only occur around class 0; point 2 occurs three times for each class.
    let w = [4.0, 4.0, 1.0 / 2.25];
    let sum: f64 = w.iter().sum();
    let expected = (w[0] * 3.001 / 3.002 + w[1] * 3.001 / 6.002 + w[2] * 3.001 / 3.002) / sum;

    let probs = dwh.classify_probabilistically(&[1.5]).unwrap();
    assert_relative_eq!(probs[0], expected, epsilon = 1e-12);
    assert_relative_eq!(probs[1], 1.0 - expected, epsilon = 1e-12);
    assert_eq!(dwh.classify(&[1.5]).unwrap(), 0);
}

#[test]
fn test_coincident_duplicate_dominates() {
    // Point 3 (class 1) sits among class 0 points; the query coincides
    // with it.
    let data = TrainingSet::new(
        vec![
            vec![0.0],
            vec![0.5],
            vec![-0.5],
            vec![1.0],
            vec![20.0],
            vec![21.0],
            vec![22.0],
        ],
        vec![0, 0, 0, 1, 1, 1, 1],
    )
    .unwrap();
    assert_eq!(distance_weight(0.0, 2.0), 10000.0);

    let config = HubnessConfig::new(NeighborhoodSize::Fixed(3))
        .with_anti_hub_cutoff(100)
        .with_scheme(AntiHubScheme::Label);
    let mut dwh = DWHFNN::with_config(config, Euclidean);
    dwh.train(&data).unwrap();

    // Two of the three neighbors are class 0, but their weights are 4 and 1.
    let probs = dwh.classify_probabilistically(&[1.0]).unwrap();
    let own = 1.001 / 1.002;
    let other = 0.001 / 1.002;
    let expected = (10000.0 * own + 5.0 * other) / 10005.0;
    assert_relative_eq!(probs[1], expected, epsilon = 1e-12);
    assert!(probs[1] > 0.99);
    assert_eq!(dwh.classify(&[1.0]).unwrap(), 1);
}

#[test]
fn test_search_finds_perfect_k_for_every_variant() {
    let data = separable();
    let auto = NeighborhoodSize::Auto { min: 1, max: 5 };

    let mut hfnn = HFNN::new(auto);
    hfnn.train(&data).unwrap();
    let mut dwh = DWHFNN::new(auto);
    dwh.train(&data).unwrap();
    let mut hiknn = HIKNN::new(auto);
    hiknn.train(&data).unwrap();

    for choice in [hfnn.choice(), dwh.choice(), hiknn.choice()] {
        let choice = choice.unwrap();
        assert!((1..=5).contains(&choice.k));
        assert_eq!(choice.accuracy, Some(1.0));
    }
    // HIKNN keeps its configured scheme and exponent.
    let choice = hiknn.choice().unwrap();
    assert_eq!(choice.scheme, AntiHubScheme::Label);
    assert_eq!(choice.distance_exponent, 2.0);

    assert_eq!(hfnn.classify(&[0.1, 0.2]).unwrap(), 0);
    assert_eq!(dwh.classify(&[24.0, 26.0]).unwrap(), 1);
    assert_eq!(hiknn.classify(&[25.5, 24.5]).unwrap(), 1);
}

#[test]
fn test_probabilities_sum_to_one_or_equal_priors() {
    let data = TrainingSet::new(
        vec![
            vec![0.0],
            vec![1.0],
            vec![2.0],
            vec![10.0],
            vec![11.0],
            vec![12.0],
            vec![13.0],
        ],
        vec![0, 0, 0, 1, 1, 1, 1],
    )
    .unwrap();
    let queries = [-3.0, 0.0, 1.5, 5.9, 6.0, 11.5, 40.0];

    let mut hfnn = HFNN::new(NeighborhoodSize::Fixed(3));
    hfnn.train(&data).unwrap();
    let mut dwh = DWHFNN::new(NeighborhoodSize::Fixed(4));
    dwh.train(&data).unwrap();
    let mut hiknn = HIKNN::new(NeighborhoodSize::Fixed(2));
    hiknn.train(&data).unwrap();
    for &q in &queries {
        for probs in [
            hfnn.classify_probabilistically(&[q]).unwrap(),
            dwh.classify_probabilistically(&[q]).unwrap(),
            hiknn.classify_probabilistically(&[q]).unwrap(),
        ] {
            assert_relative_eq!(probs.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        }
    }

    // With 2/(m-1) = 200 every distance above 1 underflows to weight zero.
    let config = HubnessConfig::new(NeighborhoodSize::Fixed(3)).with_distance_exponent(1.01);
    let mut steep = DWHFNN::with_config(config, Euclidean);
    steep.train(&data).unwrap();
    let probs = steep.classify_probabilistically(&[1.0e6]).unwrap();
    assert_eq!(probs, data.class_priors());
    assert_eq!(probs, vec![3.0 / 7.0, 4.0 / 7.0]);
}

#[test]
fn test_schemes_agree_when_no_neighbor_is_an_anti_hub() {
    // At k = 3 every point of the line occurs at least twice.
    let queries = [0.3, 1.5, 4.0, 6.0, 10.2, 12.9];
    let mut reference = Vec::new();
    for (i, scheme) in AntiHubScheme::ALL.into_iter().enumerate() {
        let config = HubnessConfig::new(NeighborhoodSize::Fixed(3))
            .with_anti_hub_cutoff(1)
            .with_scheme(scheme);
        let mut dwh = DWHFNN::with_config(config, Euclidean);
        dwh.train(&line()).unwrap();
        let probs: Vec<Vec<f64>> = queries
            .iter()
            .map(|&q| dwh.classify_probabilistically(&[q]).unwrap())
            .collect();
        if i == 0 {
            reference = probs;
        } else {
            assert_eq!(probs, reference, "{scheme}");
        }
    }
}

#[test]
fn test_label_fallback_ignores_k_and_graph() {
    let mut out = [0.0; 2];
    for data in [line(), separable()] {
        for k in 1..=4 {
            let model = ModelTrainer::new(&data, &Euclidean)
                .with_anti_hub_cutoff(u32::MAX)
                .train(k)
                .unwrap();
            for p in 0..data.len() {
                model.anti_hub_profile(AntiHubScheme::Label, p, &mut out);
                let own = data.label(p);
                assert_relative_eq!(out[own], 1.001 / 1.002, epsilon = 1e-15);
                assert_relative_eq!(out[1 - own], 0.001 / 1.002, epsilon = 1e-15);
            }
        }
    }
}

#[test]
fn test_retraining_is_bit_identical() {
    let data = separable();
    let trainer = ModelTrainer::new(&data, &Euclidean).with_anti_hub_cutoff(2);
    let first = trainer.train(4).unwrap();
    let second = trainer.train(4).unwrap();
    assert_eq!(first.class_relation(), second.class_relation());
    assert_eq!(first.class_to_class_priors(), second.class_to_class_priors());
    assert_eq!(first, second);

    let mut a = HFNN::new(NeighborhoodSize::Auto { min: 1, max: 4 });
    let mut b = HFNN::new(NeighborhoodSize::Auto { min: 1, max: 4 });
    a.train(&data).unwrap();
    b.train(&data).unwrap();
    assert_eq!(a.choice(), b.choice());
    assert_eq!(a.model(), b.model());
}
