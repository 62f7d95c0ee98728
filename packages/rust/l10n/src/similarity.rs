//! Gestalt (Ratcliff/Obershelp) similarity over character sequences.
//!
//! `ratio` is `2·M / (|a| + |b|)` where `M` counts the characters in the
//! longest common blocks found recursively left and right of each match.
//! Sequences `b` of 200+ characters ignore "popular" characters (more than
//! `len/100 + 1` occurrences) when seeding matches; matches may still grow
//! across them.
//!
//! [`real_quick_ratio`] and [`quick_ratio`] are cheap upper bounds of
//! [`ratio`], used to prune catalog candidates before the full computation.

use std::collections::HashMap;

/// Minimum length of `b` before popular characters are ignored.
const AUTOJUNK_MIN_LEN: usize = 200;

/// Character counts of a sequence, used by [`quick_ratio`].
pub type CharCounts = HashMap<char, usize>;

/// Count each character in `chars`.
pub fn char_counts(chars: &[char]) -> CharCounts {
    let mut counts = CharCounts::new();
    for c in chars {
        *counts.entry(*c).or_default() += 1;
    }
    counts
}

fn calculate_ratio(matches: usize, length: usize) -> f64 {
    if length == 0 {
        1.0
    } else {
        2.0 * matches as f64 / length as f64
    }
}

/// Upper bound from lengths alone.
pub fn real_quick_ratio(len_a: usize, len_b: usize) -> f64 {
    calculate_ratio(len_a.min(len_b), len_a + len_b)
}

/// Upper bound from the multiset intersection of characters.
pub fn quick_ratio(a: &[char], b_counts: &CharCounts, len_b: usize) -> f64 {
    let mut avail: HashMap<char, isize> = HashMap::new();
    let mut matches = 0;
    for c in a {
        let n = match avail.get(c) {
            Some(n) => *n,
            None => b_counts.get(c).copied().unwrap_or(0) as isize,
        };
        avail.insert(*c, n - 1);
        if n > 0 {
            matches += 1;
        }
    }
    calculate_ratio(matches, a.len() + len_b)
}

/// Full similarity ratio between `a` and `b`, in `[0, 1]`.
pub fn ratio(a: &[char], b: &[char]) -> f64 {
    let matcher = Matcher::new(a, b);
    calculate_ratio(matcher.matching_chars(), a.len() + b.len())
}

struct Matcher<'a> {
    a: &'a [char],
    b: &'a [char],
    b2j: HashMap<char, Vec<usize>>,
}

impl<'a> Matcher<'a> {
    fn new(a: &'a [char], b: &'a [char]) -> Self {
        let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
        for (j, c) in b.iter().enumerate() {
            b2j.entry(*c).or_default().push(j);
        }

        if b.len() >= AUTOJUNK_MIN_LEN {
            let ntest = b.len() / 100 + 1;
            b2j.retain(|_, positions| positions.len() <= ntest);
        }

        Self { a, b, b2j }
    }

    /// Longest common block inside `a[alo..ahi]` and `b[blo..bhi]` as
    /// `(i, j, size)`. Earliest `i`, then earliest `j`, wins ties.
    fn find_longest_match(
        &self,
        alo: usize,
        ahi: usize,
        blo: usize,
        bhi: usize,
    ) -> (usize, usize, usize) {
        let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
        let mut j2len: HashMap<usize, usize> = HashMap::new();

        for i in alo..ahi {
            let mut next_j2len: HashMap<usize, usize> = HashMap::new();
            if let Some(positions) = self.b2j.get(&self.a[i]) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = j
                        .checked_sub(1)
                        .and_then(|prev| j2len.get(&prev))
                        .copied()
                        .unwrap_or(0)
                        + 1;
                    next_j2len.insert(j, k);
                    if k > best_size {
                        best_i = i + 1 - k;
                        best_j = j + 1 - k;
                        best_size = k;
                    }
                }
            }
            j2len = next_j2len;
        }

        // Grow the block over characters excluded from b2j.
        while best_i > alo && best_j > blo && self.a[best_i - 1] == self.b[best_j - 1] {
            best_i -= 1;
            best_j -= 1;
            best_size += 1;
        }
        while best_i + best_size < ahi
            && best_j + best_size < bhi
            && self.a[best_i + best_size] == self.b[best_j + best_size]
        {
            best_size += 1;
        }

        (best_i, best_j, best_size)
    }

    /// Total size of all matching blocks.
    fn matching_chars(&self) -> usize {
        let mut total = 0;
        let mut queue = vec![(0, self.a.len(), 0, self.b.len())];

        while let Some((alo, ahi, blo, bhi)) = queue.pop() {
            let (i, j, k) = self.find_longest_match(alo, ahi, blo, bhi);
            if k == 0 {
                continue;
            }
            total += k;
            if alo < i && blo < j {
                queue.push((alo, i, blo, j));
            }
            if i + k < ahi && j + k < bhi {
                queue.push((i + k, ahi, j + k, bhi));
            }
        }

        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn r(a: &str, b: &str) -> f64 {
        ratio(&chars(a), &chars(b))
    }

    #[test]
    fn identical_strings_score_one() {
        assert_eq!(r("Adds a child node.", "Adds a child node."), 1.0);
        assert_eq!(r("", ""), 1.0);
    }

    #[test]
    fn disjoint_strings_score_zero() {
        assert_eq!(r("abc", "xyz"), 0.0);
        assert_eq!(r("abc", ""), 0.0);
    }

    #[test]
    fn known_gestalt_values() {
        // abcd / bcde share "bcd": 2*3/8
        assert_eq!(r("abcd", "bcde"), 0.75);
        // "abxcd" / "abcd": blocks "ab" + "cd" -> 2*4/9
        assert!((r("abxcd", "abcd") - 8.0 / 9.0).abs() < 1e-12);
        // Not symmetric in general; this pair is a classic example.
        assert!((r("private Thread currentThread;", "private volatile Thread currentThread;") - 0.8656716417910447).abs() < 1e-12);
    }

    #[test]
    fn bounds_never_below_ratio() {
        let pairs = [
            ("Returns the child count.", "Returns the number of children."),
            ("Emitted when the node enters the tree.", "Emitted when the node exits the tree."),
            ("a", "ab"),
        ];
        for (a, b) in pairs {
            let (ca, cb) = (chars(a), chars(b));
            let full = ratio(&ca, &cb);
            let quick = quick_ratio(&ca, &char_counts(&cb), cb.len());
            let real_quick = real_quick_ratio(ca.len(), cb.len());
            assert!(quick >= full, "{a} / {b}");
            assert!(real_quick >= quick, "{a} / {b}");
        }
    }

    #[test]
    fn long_sequences_ignore_popular_chars_when_seeding() {
        // 'a' is popular in b (>3 occurrences in 250 chars) so it only counts
        // when adjacent to a non-popular match.
        let b: String = "a".repeat(250);
        let a = "baaaa";
        assert_eq!(r(a, &b), 0.0);

        let b = format!("x{}", "a".repeat(249));
        let a = "xaaa";
        // 'x' seeds a match that then extends over the popular 'a's.
        assert!((r(a, &b) - 2.0 * 4.0 / 254.0).abs() < 1e-12);
    }

    #[test]
    fn handles_multibyte_characters() {
        assert_eq!(r("节点", "节点"), 1.0);
        assert_eq!(r("节点树", "节点"), 0.8);
    }
}
