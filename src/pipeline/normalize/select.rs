use std::collections::HashMap;

use crate::models::FieldKind;
use crate::pipeline::extraction::RawDetection;

/// Pick the canonical detection per semantic kind.
///
/// Highest confidence wins; ties go to the detection reported later in
/// the source order (the service lists refinements after first guesses).
/// Detections with unrecognized labels do not participate.
pub fn select_canonical(detections: &[RawDetection]) -> HashMap<FieldKind, RawDetection> {
    let mut canonical: HashMap<FieldKind, RawDetection> = HashMap::new();

    for detection in detections {
        let Some(kind) = FieldKind::from_label(&detection.label) else {
            continue;
        };
        match canonical.get(&kind) {
            Some(current) if detection.confidence < current.confidence => {}
            _ => {
                canonical.insert(kind, detection.clone());
            }
        }
    }

    canonical
}
