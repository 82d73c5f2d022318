//! Property tests for the scoring invariants:
//! - final score always inside [300, 850]
//! - factors always inside [0, 100]
//! - repeated TD updates with no successor value converge to the reward

use std::sync::OnceLock;

use gig_credit_core::*;
use proptest::prelude::*;

fn shared_model() -> &'static EnsembleModel {
    static MODEL: OnceLock<EnsembleModel> = OnceLock::new();
    MODEL.get_or_init(|| {
        let data = synthesize(&SynthCfg {
            n_samples: 300,
            ..SynthCfg::default()
        })
        .expect("synthesize training data");
        let cfg = ModelCfg {
            forest: ForestCfg {
                n_trees: 5,
                max_depth: Some(8),
                ..ForestCfg::default()
            },
            logistic: LogisticCfg::default(),
        };
        let mut model = EnsembleModel::new();
        model.fit(&data, &cfg).expect("fit synthetic data");
        model
    })
}

fn any_signal() -> impl Strategy<Value = f64> {
    prop_oneof![
        -1e9..1e9_f64,
        Just(0.0),
        Just(1e308),
        Just(-1e308),
        Just(f64::MAX),
        Just(f64::NAN),
        Just(f64::INFINITY),
        Just(f64::NEG_INFINITY),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_score_is_clipped(
        values in proptest::array::uniform8(any_signal()),
        boost_reward in -1e12..1e12_f64,
    ) {
        let signals = SignalVector::new(values);
        let mut table = AdjustmentTable::new();
        table.update(&signals.state(), "score_boost", boost_reward, &[0.0; 4], &LearningCfg::default()).unwrap();

        let result = score(shared_model(), &table, &signals, &BlendCfg::default()).unwrap();
        prop_assert!((300..=850).contains(&result.score), "score {} out of range", result.score);

        let probs = result.raw.classifier_probs;
        prop_assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)), "probs {:?}", probs);
        prop_assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9, "probs {:?}", probs);
    }

    #[test]
    fn prop_blend_is_clipped(
        regressor_value in -1e12..1e12_f64,
        raw_probs in proptest::array::uniform4(0.0..1.0_f64),
        adjustment in -1e12..1e12_f64,
    ) {
        let sum: f64 = raw_probs.iter().sum::<f64>().max(1e-9);
        let prediction = Prediction {
            regressor_value,
            classifier_probs: raw_probs.map(|p| p / sum),
        };
        let s = blend_score(&prediction, adjustment, &BlendCfg::default());
        prop_assert!((300..=850).contains(&s));
    }

    #[test]
    fn prop_factors_are_percentages(values in proptest::array::uniform8(any_signal())) {
        let f = Factors::from_signals(&SignalVector::new(values));
        for v in [f.gig_consistency, f.payment_history, f.financial_health] {
            prop_assert!((0.0..=100.0).contains(&v));
        }
    }

    #[test]
    fn prop_lookup_is_idempotent(
        state in proptest::array::uniform4(-1e6..1e6_f64),
        reward in -1e3..1e3_f64,
    ) {
        let mut table = AdjustmentTable::new();
        table.update(&state, "score_boost", reward, &[0.0; 4], &LearningCfg::default()).unwrap();
        let key = StateKey::from_state(&state);
        let first = table.lookup(&key, "score_boost");
        for _ in 0..5 {
            prop_assert_eq!(table.lookup(&key, "score_boost"), first);
        }
    }

    #[test]
    fn prop_td_converges_to_reward(reward in -1e3..1e3_f64) {
        let cfg = LearningCfg::default();
        let mut table = AdjustmentTable::new();
        let state = [1.0, 2.0, 3.0, 4.0];
        // successor never receives an entry, so its max stays 0
        let next = [5.0, 6.0, 7.0, 8.0];
        let key = StateKey::from_state(&state);

        let mut prev_gap = reward.abs();
        for _ in 0..300 {
            table.update(&state, "score_boost", reward, &next, &cfg).unwrap();
            let gap = (table.lookup(&key, "score_boost") - reward).abs();
            // geometric: the gap shrinks by (1 - alpha) each step
            prop_assert!(gap <= prev_gap * (1.0 - cfg.alpha) + 1e-9);
            prev_gap = gap;
        }
        prop_assert!(prev_gap <= reward.abs() * 1e-9 + 1e-9);
    }
}
