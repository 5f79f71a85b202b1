//! Serialisation of configs, Gramians, and weighting traces.
//!
//! Run with: `cargo test --features serde`

#[cfg(feature = "serde")]
mod tests {
    use pcgrad_core::{
        ComputePrecision, FixedPermutations, Gramian, PcGradWeighting, WeightingConfig,
        WeightingTrace,
    };

    // ── Helpers ──────────────────────────────────────────────────────────────

    fn three_task_gramian() -> Gramian<f64> {
        Gramian::from_rows(&[
            [1.0, -1.0, 0.0],
            [-1.0, 2.0, -1.0],
            [0.0, -1.0, 1.0],
        ])
        .unwrap()
    }

    fn traced_run() -> (Vec<f64>, WeightingTrace) {
        let mut orders =
            FixedPermutations::new(vec![vec![1, 2, 0], vec![0, 2, 1], vec![0, 1, 2]]).unwrap();
        PcGradWeighting::new()
            .compute_weights_traced(&three_task_gramian(), &mut orders)
            .unwrap()
    }

    // ── Tests ─────────────────────────────────────────────────────────────────

    #[test]
    fn trace_round_trips_through_json() {
        let (_, trace) = traced_run();
        let json = serde_json::to_string(&trace).expect("serialise");
        let restored: WeightingTrace = serde_json::from_str(&json).expect("deserialise");
        assert_eq!(restored, trace);
    }

    #[test]
    fn trace_json_names_corrections() {
        let (_, trace) = traced_run();
        let value = serde_json::to_value(&trace).unwrap();
        let first = &value["steps"][0];
        assert_eq!(first["index"], 0);
        assert_eq!(first["permutation"], serde_json::json!([1, 2, 0]));
        assert_eq!(first["corrections"][0]["against"], 1);
        assert_eq!(first["corrections"][0]["inner_product"], -1.0);
        assert_eq!(first["corrections"][0]["delta"], 0.5);
    }

    #[test]
    fn config_round_trips() {
        let config = WeightingConfig::default()
            .with_degenerate_epsilon(1e-8)
            .with_precision(ComputePrecision::Double);
        let json = serde_json::to_string(&config).unwrap();
        let restored: WeightingConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn gramian_round_trips() {
        let g = three_task_gramian();
        let json = serde_json::to_string(&g).unwrap();
        let restored: Gramian<f64> = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, g);
    }

    #[test]
    fn invalid_gramian_is_rejected_on_deserialise() {
        let json = r#"{"dim":2,"data":[1.0,0.5,0.4,1.0]}"#;
        let err = serde_json::from_str::<Gramian<f64>>(json).unwrap_err();
        assert!(err.to_string().contains("not symmetric"), "{}", err);
    }

    #[test]
    fn matrix_length_is_checked_on_deserialise() {
        let json = r#"{"rows":2,"cols":2,"data":[1.0,2.0,3.0]}"#;
        assert!(serde_json::from_str::<pcgrad_core::Matrix<f64>>(json).is_err());
    }
}
