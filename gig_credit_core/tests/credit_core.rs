use approx::assert_relative_eq;
use gig_credit_core::*;

fn small_model_cfg() -> ModelCfg {
    ModelCfg {
        forest: ForestCfg {
            n_trees: 10,
            max_depth: Some(10),
            ..ForestCfg::default()
        },
        logistic: LogisticCfg::default(),
    }
}

fn fitted_model() -> EnsembleModel {
    let data = synthesize(&SynthCfg::default()).unwrap();
    let mut model = EnsembleModel::new();
    model.fit(&data, &small_model_cfg()).unwrap();
    model
}

fn reference_profile() -> SignalVector {
    SignalVector::from_pairs([
        ("total_earnings", 75000.0),
        ("wallet_balance", 15000.0),
        ("completed_gigs", 20.0),
        ("avg_rating", 4.5),
        ("days_active", 180.0),
        ("payment_delays", 1.0),
        ("sacco_contributions", 8000.0),
        ("loan_repayments", 3.0),
    ])
}

#[test]
fn vectorizer_ignores_unknown_and_defaults_missing() {
    let v = SignalVector::from_pairs([
        ("completed_gigs", 12.0),
        ("favourite_colour", 7.0),
        ("avg_rating", f64::NAN),
    ]);
    assert_eq!(v.get(Signal::CompletedGigs), 12.0);
    assert_eq!(v.get(Signal::AvgRating), 0.0);
    assert_eq!(v.get(Signal::TotalEarnings), 0.0);
    assert_eq!(v.as_array().len(), SIGNAL_COUNT);
}

#[test]
fn vector_order_matches_signal_order() {
    let v = reference_profile();
    assert_eq!(v.as_array(), &[75000.0, 15000.0, 20.0, 4.5, 180.0, 1.0, 8000.0, 3.0]);
    assert_eq!(v.state(), [75000.0, 15000.0, 20.0, 4.5]);
}

#[test]
fn reference_profile_factors_are_exact() {
    let model = fitted_model();
    let table = AdjustmentTable::new();
    let result = score(&model, &table, &reference_profile(), &BlendCfg::default()).unwrap();

    assert_eq!(result.factors.gig_consistency, 100.0);
    assert_eq!(result.factors.payment_history, 90.0);
    assert_eq!(result.factors.financial_health, 30.0);
}

#[test]
fn factors_do_not_need_a_model() {
    let f = Factors::from_signals(&reference_profile());
    assert_eq!(
        f,
        Factors {
            gig_consistency: 100.0,
            payment_history: 90.0,
            financial_health: 30.0,
        }
    );
}

#[test]
fn td_update_on_empty_table() {
    let mut table = AdjustmentTable::new();
    let out = table
        .update(&[1.0, 2.0, 3.0, 4.0], "score_boost", 10.0, &[5.0, 6.0, 7.0, 8.0], &LearningCfg::default())
        .unwrap();

    assert_eq!(out.previous, None);
    let key = StateKey::from_state(&[1.0, 2.0, 3.0, 4.0]);
    assert_eq!(key.as_str(), "(1.0, 2.0, 3.0, 4.0)");
    assert_relative_eq!(table.lookup(&key, "score_boost"), 1.0, epsilon = 1e-12);
    assert_eq!(table.len(), 1);
}

#[test]
fn td_update_uses_successor_max() {
    let cfg = LearningCfg::default();
    let mut table = AdjustmentTable::new();
    let s = [1.0, 1.0, 1.0, 1.0];
    let next = [2.0, 2.0, 2.0, 2.0];

    table.update(&next, "hold", 10.0, &[9.0; 4], &cfg).unwrap(); // 1.0
    table.update(&next, "score_boost", 30.0, &[9.0; 4], &cfg).unwrap(); // 3.0
    table.update(&s, "score_boost", 0.0, &next, &cfg).unwrap();

    // 0 + 0.1 * (0 + 0.9 * 3.0 - 0)
    assert_relative_eq!(table.lookup(&StateKey::from_state(&s), "score_boost"), 0.27, epsilon = 1e-12);
}

#[test]
fn self_transition_counts_the_new_entry_in_the_max() {
    let cfg = LearningCfg::default();
    let mut table = AdjustmentTable::new();
    let s = [1.0, 2.0, 3.0, 4.0];
    let key = StateKey::from_state(&s);

    table.update(&s, "penalty", -100.0, &[9.0; 4], &cfg).unwrap(); // -10.0
    let out = table.update(&s, "score_boost", 10.0, &s, &cfg).unwrap();

    // 0 + 0.1 * (10 + 0.9 * max(-10, 0) - 0)
    assert_relative_eq!(out.value, 1.0, epsilon = 1e-12);
    assert_relative_eq!(table.lookup(&key, "score_boost"), 1.0, epsilon = 1e-12);

    // A seen entry contributes its stored value, not 0.
    table.update(&s, "penalty", 0.0, &s, &cfg).unwrap();
    // -10 + 0.1 * (0 + 0.9 * 1.0 + 10)
    assert_relative_eq!(table.lookup(&key, "penalty"), -8.91, epsilon = 1e-12);

    table.revert(&out);
    assert_eq!(table.lookup(&key, "score_boost"), 0.0);
    assert_eq!(table.entry_count(), 1);
}

#[test]
fn predict_before_fit_is_an_error() {
    let model = EnsembleModel::new();
    let err = model.predict(&reference_profile()).unwrap_err();
    assert!(matches!(err, CreditError::UnfitModel));

    let err = score(&model, &AdjustmentTable::new(), &reference_profile(), &BlendCfg::default()).unwrap_err();
    assert!(matches!(err, CreditError::UnfitModel));
}

#[test]
fn fit_on_empty_set_is_an_error() {
    let mut model = EnsembleModel::new();
    let err = model.fit(&[], &small_model_cfg()).unwrap_err();
    assert!(matches!(err, CreditError::EmptyTrainingSet));
    assert!(!model.is_fitted());
}

#[test]
fn synthesizer_is_reproducible() {
    let cfg = SynthCfg::default();
    let a = serde_json::to_vec(&synthesize(&cfg).unwrap()).unwrap();
    let b = serde_json::to_vec(&synthesize(&cfg).unwrap()).unwrap();
    assert_eq!(a, b);

    let other = synthesize(&SynthCfg { seed: 7, ..cfg }).unwrap();
    assert_ne!(serde_json::to_vec(&other).unwrap(), a);
}

#[test]
fn synthetic_labels_follow_the_rule() {
    for ex in synthesize(&SynthCfg::default()).unwrap() {
        assert!((300.0..=850.0).contains(&ex.score));
        assert_eq!(ex.score, label_score(&ex.signals));
        assert_eq!(ex.category, RiskCategory::from_score(ex.score));
    }
}

#[test]
fn regressor_tracks_training_labels() {
    let data = synthesize(&SynthCfg::default()).unwrap();
    let mut model = EnsembleModel::new();
    model.fit(&data, &small_model_cfg()).unwrap();

    let mae: f64 = data
        .iter()
        .map(|ex| (model.predict(&ex.signals).unwrap().regressor_value - ex.score).abs())
        .sum::<f64>()
        / data.len() as f64;
    // Documented tolerance: in-sample mean absolute error under 25 points.
    assert!(mae < 25.0, "mean absolute error {mae}");
}

#[test]
fn holdout_report_is_populated() {
    let data = synthesize(&SynthCfg::default()).unwrap();
    let mut model = EnsembleModel::new();
    let report = model.fit_with_holdout(&data, &small_model_cfg(), 0.2, 42).unwrap();

    assert_eq!(report.train_rows, 800);
    assert_eq!(report.holdout_rows, 200);
    assert!(report.holdout_mae.unwrap() < 60.0);
    assert!(report.holdout_accuracy.unwrap() > 0.5);
}

#[test]
fn classifier_probabilities_sum_to_one() {
    let model = fitted_model();
    let p = model.predict(&reference_profile()).unwrap();
    assert_relative_eq!(p.classifier_probs.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
    assert!(p.classifier_probs.iter().all(|&x| (0.0..=1.0).contains(&x)));
}

#[test]
fn scoring_is_deterministic() {
    let model = fitted_model();
    let table = AdjustmentTable::new();
    let cfg = BlendCfg::default();
    let a = score(&model, &table, &reference_profile(), &cfg).unwrap();
    let b = score(&model, &table, &reference_profile(), &cfg).unwrap();
    assert_eq!(a, b);

    let again = fitted_model();
    assert_eq!(score(&again, &table, &reference_profile(), &cfg).unwrap(), a);
}

#[test]
fn score_boost_shifts_the_score() {
    let model = fitted_model();
    let cfg = BlendCfg::default();
    let profile = reference_profile();
    let base = score(&model, &AdjustmentTable::new(), &profile, &cfg).unwrap();

    let mut table = AdjustmentTable::new();
    // 0.1 * 50 = 5.0
    table
        .update(&profile.state(), "score_boost", 50.0, &[0.0; 4], &LearningCfg::default())
        .unwrap();
    // other actions are inert for scoring
    table
        .update(&profile.state(), "penalty", -500.0, &[0.0; 4], &LearningCfg::default())
        .unwrap();

    let boosted = score(&model, &table, &profile, &cfg).unwrap();
    assert_eq!(boosted.raw, base.raw);
    assert_eq!(boosted.score, (base.score + 5).min(850));
}

#[test]
fn blend_formula_and_clipping() {
    let cfg = BlendCfg::default();
    let p = Prediction {
        regressor_value: 600.0,
        classifier_probs: [0.0, 0.0, 1.0, 0.0],
    };
    // 0.7 * 600 + 0.3 * 700 = 630
    assert_eq!(blend_score(&p, 0.0, &cfg), 630);
    assert_eq!(blend_score(&p, 0.9, &cfg), 630);
    assert_eq!(blend_score(&p, 1e6, &cfg), 850);
    assert_eq!(blend_score(&p, -1e6, &cfg), 300);
    assert_eq!(blend_score(&p, f64::NAN, &cfg), 300);
}

#[test]
fn invalid_updates_leave_the_table_alone() {
    let cfg = LearningCfg::default();
    let mut table = AdjustmentTable::new();

    let err = table.update(&[1.0; 4], "score_boost", f64::NAN, &[2.0; 4], &cfg).unwrap_err();
    assert!(matches!(err, CreditError::InvalidUpdate { .. }));
    let err = table
        .update(&[1.0, f64::INFINITY, 0.0, 0.0], "score_boost", 1.0, &[2.0; 4], &cfg)
        .unwrap_err();
    assert!(matches!(err, CreditError::InvalidUpdate { .. }));
    let err = table.update(&[1.0; 4], "", 1.0, &[2.0; 4], &cfg).unwrap_err();
    assert!(matches!(err, CreditError::InvalidUpdate { .. }));

    assert!(table.is_empty());
}

#[test]
fn revert_restores_previous_state() {
    let cfg = LearningCfg::default();
    let mut table = AdjustmentTable::new();
    table.update(&[1.0; 4], "score_boost", 10.0, &[2.0; 4], &cfg).unwrap();
    let snapshot = table.clone();

    let second = table.update(&[1.0; 4], "score_boost", 10.0, &[2.0; 4], &cfg).unwrap();
    assert_eq!(second.previous, Some(1.0));
    table.revert(&second);
    assert_eq!(table, snapshot);

    let fresh = table.update(&[3.0; 4], "score_boost", 10.0, &[2.0; 4], &cfg).unwrap();
    table.revert(&fresh);
    assert_eq!(table, snapshot);
}

#[test]
fn restore_and_merge_count_entries() {
    let cfg = LearningCfg::default();
    let mut a = AdjustmentTable::new();
    a.update(&[1.0; 4], "score_boost", 10.0, &[0.0; 4], &cfg).unwrap();
    a.update(&[2.0; 4], "score_boost", 10.0, &[0.0; 4], &cfg).unwrap();

    let mut b = AdjustmentTable::new();
    b.update(&[2.0; 4], "score_boost", 20.0, &[0.0; 4], &cfg).unwrap();
    b.update(&[3.0; 4], "hold", 1.0, &[0.0; 4], &cfg).unwrap();

    let mut merged = a.clone();
    let stats = merged.restore_merge(b.clone());
    assert_eq!(stats, RestoreStats { applied: 2, overwritten: 1 });
    assert_eq!(merged.len(), 3);
    assert_relative_eq!(merged.lookup(&StateKey::from_state(&[2.0; 4]), "score_boost"), 2.0);

    let mut replaced = a;
    let stats = replaced.restore(b.clone());
    assert_eq!(stats.applied, 2);
    assert_eq!(replaced, b);
}

#[test]
fn table_round_trips_as_mapping_of_mappings() {
    let mut table = AdjustmentTable::new();
    table
        .update(&[1.0, 2.0, 3.0, 4.0], "score_boost", 10.0, &[0.0; 4], &LearningCfg::default())
        .unwrap();
    let json = serde_json::to_value(&table).unwrap();
    assert_eq!(json, serde_json::json!({ "(1.0, 2.0, 3.0, 4.0)": { "score_boost": 1.0 } }));
}

#[test]
fn config_defaults_match_documented_constants() {
    let cfg = EngineCfg::default();
    assert_eq!(cfg.blend.regressor_weight, 0.7);
    assert_eq!(cfg.blend.classifier_weight, 0.3);
    assert_eq!(cfg.learning.alpha, 0.1);
    assert_eq!(cfg.learning.gamma, 0.9);
    assert_eq!(cfg.synth.n_samples, 1000);

    let partial: EngineCfg = serde_json::from_str(r#"{ "learning": { "alpha": 0.5 } }"#).unwrap();
    assert_eq!(partial.learning.alpha, 0.5);
    assert_eq!(partial.learning.gamma, 0.9);
    assert_eq!(partial.blend, BlendCfg::default());
}
