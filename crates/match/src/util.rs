/// Insertion/deletion edit distance (a substitution costs 2) over chars, using the
/// two-row O(min(m,n)) space algorithm.
pub fn indel_distance(s1: &str, s2: &str) -> usize {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();
    let (m, n) = (a.len(), b.len());

    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    // Keep the shorter string in the inner loop to minimise allocation.
    let (a, b, m, n) = if m <= n { (b, a, n, m) } else { (a, b, m, n) };

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0usize; n + 1];

    for i in 1..=m {
        curr[0] = i;
        for j in 1..=n {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 2 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

/// `1 - indel / (len1 + len2)`, in [0.0, 1.0]. Two empty strings are identical.
pub fn indel_ratio(s1: &str, s2: &str) -> f64 {
    let total = s1.chars().count() + s2.chars().count();
    if total == 0 {
        return 1.0;
    }
    1.0 - indel_distance(s1, s2) as f64 / total as f64
}
