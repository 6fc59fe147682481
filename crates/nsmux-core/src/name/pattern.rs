//! Wildcard matching for domains, key-property values and grant rules
//!
//! `*` matches any run of characters (including none), `?` matches exactly one.

/// Match `text` against a wildcard `pattern`
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    // Handle simple cases
    if pattern == "*" || pattern == text {
        return true;
    }

    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0usize, 0usize);
    // Position of the last '*' seen and the text index it was tried at
    let mut star: Option<usize> = None;
    let mut mark = 0usize;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            mark = ti;
            pi += 1;
        } else if let Some(s) = star {
            // Let the last '*' swallow one more character and retry
            pi = s + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

/// Whether `text` contains wildcard characters
pub fn has_wildcard(text: &str) -> bool {
    text.contains('*') || text.contains('?')
}
