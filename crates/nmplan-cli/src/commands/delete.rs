use super::EXIT_SUCCESS;
use nmplan_core::DeleteOutcome;
use tracing::info;

pub fn report(outcome: &DeleteOutcome) -> u8 {
    info!(
        "deleted '{}', {} layer file(s) changed",
        outcome.id, outcome.files_changed
    );
    EXIT_SUCCESS
}
