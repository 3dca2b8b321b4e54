use ingest_core::orchestration::StepStatus;
use proptest::prelude::*;

/// Object keys shaped like landing-zone files
pub fn object_key_strategy() -> impl Strategy<Value = String> {
    "raw/20[0-9]{2}/[01][0-9]/[0-3][0-9]/[a-z0-9_]{1,12}\\.(csv|json|parquet)"
}

pub fn listing_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(object_key_strategy(), 0..8)
}

pub fn terminal_status_strategy() -> impl Strategy<Value = StepStatus> {
    prop_oneof![
        Just(StepStatus::Completed),
        Just(StepStatus::Failed),
        Just(StepStatus::Cancelled),
        Just(StepStatus::Interrupted),
    ]
}
