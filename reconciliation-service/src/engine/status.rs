use crate::models::NormalizedStatus;

/// Fold a raw provider status into the closed taxonomy.
///
/// Cancellations count as failures: either way no money moved.
pub fn normalize_status(raw: &str) -> NormalizedStatus {
    match raw.trim().to_lowercase().as_str() {
        "success" | "completed" => NormalizedStatus::Success,
        "failed" | "error" | "canceled" | "cancelled" => NormalizedStatus::Failed,
        "pending" | "processing" | "in progress" | "in_progress" => NormalizedStatus::Pending,
        _ => NormalizedStatus::Unknown,
    }
}

/// Whether a raw status is an explicit cancellation.
pub fn is_cancellation(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "canceled" | "cancelled")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_spellings() {
        assert_eq!(normalize_status("Completed"), NormalizedStatus::Success);
        assert_eq!(normalize_status("SUCCESS"), NormalizedStatus::Success);
        assert_eq!(normalize_status("  success \t"), NormalizedStatus::Success);
    }

    #[test]
    fn test_cancellations_fold_into_failed() {
        assert_eq!(normalize_status("Cancelled"), NormalizedStatus::Failed);
        assert_eq!(normalize_status("canceled"), NormalizedStatus::Failed);
        assert_eq!(normalize_status("Error"), NormalizedStatus::Failed);
        assert!(is_cancellation(" CANCELLED "));
        assert!(!is_cancellation("failed"));
    }

    #[test]
    fn test_pending_spellings() {
        for raw in ["Pending", "processing", "In Progress", "IN_PROGRESS"] {
            assert_eq!(normalize_status(raw), NormalizedStatus::Pending, "{raw}");
        }
    }

    #[test]
    fn test_everything_else_is_unknown() {
        for raw in ["", "   ", "refunded", "succes", "in-progress"] {
            assert_eq!(normalize_status(raw), NormalizedStatus::Unknown, "{raw:?}");
        }
    }

    fn alternating_case(raw: &str) -> String {
        raw.chars()
            .enumerate()
            .map(|(i, c)| {
                if i % 2 == 0 {
                    c.to_ascii_uppercase()
                } else {
                    c.to_ascii_lowercase()
                }
            })
            .collect()
    }

    #[test]
    fn test_table_is_case_and_whitespace_insensitive() {
        let table = [
            ("success", NormalizedStatus::Success),
            ("completed", NormalizedStatus::Success),
            ("failed", NormalizedStatus::Failed),
            ("error", NormalizedStatus::Failed),
            ("canceled", NormalizedStatus::Failed),
            ("cancelled", NormalizedStatus::Failed),
            ("pending", NormalizedStatus::Pending),
            ("processing", NormalizedStatus::Pending),
            ("in progress", NormalizedStatus::Pending),
            ("in_progress", NormalizedStatus::Pending),
        ];
        for (raw, expected) in table {
            let variants = [
                raw.to_string(),
                raw.to_uppercase(),
                alternating_case(raw),
                format!("  {}  ", raw),
                format!("\t{}\n", raw.to_uppercase()),
            ];
            for variant in variants {
                assert_eq!(normalize_status(&variant), expected, "{variant:?}");
            }
        }
    }

    #[test]
    fn test_any_input_lands_in_the_taxonomy() {
        let inputs = [
            "succeeded", "fail", "pend", "done", "0", "-", "null", "N/A", "in  progress",
            "success!", "completed.", "Ünknown", "\u{feff}success", "😀",
        ];
        for raw in inputs {
            let status = normalize_status(raw);
            assert_eq!(status, NormalizedStatus::Unknown, "{raw:?}");
            assert_eq!(normalize_status(&alternating_case(raw)), status, "{raw:?}");
        }
    }
}
