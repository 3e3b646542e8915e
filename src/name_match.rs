/// Comparison key for a display name: lower-case, ASCII letters and single
/// spaces only. Accented letters are dropped, not folded.
pub fn normalize_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let kept = lowered
        .chars()
        .filter(|ch| ch.is_ascii_lowercase() || ch.is_whitespace())
        .collect::<String>();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Unit-cost Levenshtein distance over characters.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a = a.chars().collect::<Vec<_>>();
    let b = b.chars().collect::<Vec<_>>();

    // matrix[j][i]: distance between b[..j] and a[..i]
    let mut matrix = vec![vec![0usize; a.len() + 1]; b.len() + 1];
    for (i, cell) in matrix[0].iter_mut().enumerate() {
        *cell = i;
    }
    for (j, row) in matrix.iter_mut().enumerate() {
        row[0] = j;
    }

    for j in 1..=b.len() {
        for i in 1..=a.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            matrix[j][i] = (matrix[j - 1][i] + 1)
                .min(matrix[j][i - 1] + 1)
                .min(matrix[j - 1][i - 1] + cost);
        }
    }

    matrix[b.len()][a.len()]
}

/// `(longer - distance) / longer`, with two empty strings scoring 1.0.
pub fn similarity(a: &str, b: &str) -> f64 {
    let longer = a.chars().count().max(b.chars().count());
    if longer == 0 {
        return 1.0;
    }
    let distance = levenshtein_distance(a, b);
    (longer - distance) as f64 / longer as f64
}

pub fn name_similarity(a: &str, b: &str) -> f64 {
    similarity(&normalize_name(a), &normalize_name(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_name_strips_punctuation_and_spacing() {
        assert_eq!(normalize_name("O'Brien"), "obrien");
        assert_eq!(normalize_name("  A   B  "), "a b");
        assert_eq!(normalize_name("Jr. Neymar 10"), "jr neymar");
        assert_eq!(normalize_name(""), "");
    }

    #[test]
    fn normalize_name_drops_accents() {
        assert_eq!(normalize_name("Éder Militão"), "der milito");
        assert_eq!(normalize_name("Muñoz"), "muoz");
    }

    #[test]
    fn normalize_name_is_idempotent() {
        for raw in ["O'Brien", "  A   B  ", "Vinícius Júnior", "N'Golo\tKanté", "x"] {
            let once = normalize_name(raw);
            assert_eq!(normalize_name(&once), once);
        }
    }

    #[test]
    fn levenshtein_known_values() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("abc", ""), 3);
        assert_eq!(levenshtein_distance("flaw", "lawn"), 2);
        assert_eq!(levenshtein_distance("same", "same"), 0);
    }

    #[test]
    fn similarity_kitten_sitting() {
        let s = similarity("kitten", "sitting");
        assert!((s - 4.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn similarity_bounds_and_identity() {
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("joao silva", "joao silva"), 1.0);
        assert_eq!(similarity("abc", ""), 0.0);
        let pairs = [
            ("joao silva", "joao silvaa"),
            ("a", "zzzzzz"),
            ("luka modric", "luca modric"),
            ("", "x"),
        ];
        for (a, b) in pairs {
            let s = similarity(a, b);
            assert!((0.0..=1.0).contains(&s));
            assert_eq!(s, similarity(b, a));
        }
    }

    #[test]
    fn near_duplicate_names_clear_thresholds() {
        assert!(name_similarity("Joao Silva", "Joao Silvaa") > 0.8);
        assert!(name_similarity("Joao Silva", "Joao Silvaa") > 0.9);
        assert!(name_similarity("Joao Silva", "Pedro Silva") < 0.8);
    }
}
