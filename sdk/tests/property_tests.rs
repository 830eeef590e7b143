use proptest::prelude::*;
use sdk::errors::{BridgeErrorExt, EngineError};

// Error user hints must always be present and must never leak the raw
// internal message into the user-facing hint.
proptest! {
    #[test]
    fn test_error_user_hint_completeness(error_str in "\\PC{1,64}") {
        let errs = vec![
            EngineError::Config(error_str.clone()),
            EngineError::Catalog(error_str.clone()),
            EngineError::Planning(error_str.clone()),
            EngineError::PlanInvalid(error_str.clone()),
            EngineError::LlmProvider(error_str.clone()),
            EngineError::Network(error_str.clone()),
            EngineError::UnknownOperation(error_str.clone()),
            EngineError::Serialization(error_str.clone()),
        ];

        for err in errs {
            let hint = err.user_hint();
            prop_assert!(!hint.is_empty());
            // Hints are static strings: short, templated, payload-free.
            prop_assert!(hint.len() < 200);
        }
    }

    #[test]
    fn test_recoverability_is_stable(error_str in "\\PC{0,32}") {
        // Recoverability depends only on the variant, not the payload.
        prop_assert!(!EngineError::Config(error_str.clone()).is_recoverable());
        prop_assert!(EngineError::Planning(error_str.clone()).is_recoverable());
        prop_assert!(EngineError::Network(error_str).is_recoverable());
    }
}
