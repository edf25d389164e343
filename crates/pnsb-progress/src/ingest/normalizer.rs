/// Collapse whitespace, drop zero-width characters and case-fold a label.
pub fn normalize_label(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}'], "");
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.to_lowercase()
}

/// Normalized label with Portuguese diacritics removed, so `"Itajaí"` and
/// `"itajai"` compare equal.
pub fn fold_label(value: &str) -> String {
    normalize_label(value)
        .chars()
        .map(|ch| match ch {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

/// True when two municipality names refer to the same place.
pub fn same_municipality(left: &str, right: &str) -> bool {
    let left = fold_label(left);
    !left.is_empty() && left == fold_label(right)
}
