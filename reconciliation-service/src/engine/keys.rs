use crate::models::RawRow;

/// First non-empty value among `candidates`, in list order.
///
/// List order is the tie-break: an earlier candidate wins even when a later
/// one is also populated.
pub fn first_present<'a, S: AsRef<str>>(row: &'a RawRow, candidates: &[S]) -> Option<&'a str> {
    candidates.iter().find_map(|candidate| {
        row.get(candidate.as_ref())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    })
}

/// Resolve a record identifier.
///
/// Tries the ordered candidate columns first, then falls back to the first
/// column (in source order) whose label contains one of `keywords`,
/// case-insensitively, and holds a non-empty value.
pub fn resolve_key<'a, S: AsRef<str>>(
    row: &'a RawRow,
    candidates: &[S],
    keywords: &[S],
) -> Option<&'a str> {
    if let Some(value) = first_present(row, candidates) {
        return Some(value);
    }

    let keywords: Vec<String> = keywords
        .iter()
        .map(|k| k.as_ref().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();

    row.iter().find_map(|(label, value)| {
        let label = label.to_lowercase();
        let value = value.trim();
        (!value.is_empty() && keywords.iter().any(|k| label.contains(k.as_str())))
            .then_some(value)
    })
}
