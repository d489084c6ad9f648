//! String metrics backing the similarity index.

/// Score floor for a recognized abbreviation.
pub const ABBREVIATION_BASE: f64 = 0.70;

/// Share of the score earned by how much of the expansion the abbreviation spells out.
pub const ABBREVIATION_SPAN: f64 = 0.25;

/// Shortest string treated as an abbreviation.
pub const MIN_ABBREVIATION_LEN: usize = 3;

/// Indel similarity ratio in [0, 1].
///
/// `2 * LCS(a, b) / (|a| + |b|)`, i.e. one minus the insertion/deletion edit
/// distance normalized by total length. Two empty strings are identical.
pub fn indel_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    let lcs = longest_common_subsequence(&a, &b);
    (2 * lcs) as f64 / total as f64
}

fn longest_common_subsequence(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Score `short` as an abbreviation of the word sequence `long_tokens`.
///
/// Recognized when `short` spells, in order, the first letter of every token
/// plus optional further letters of each token (`lfc` for `lifecycle`, `usr`
/// for `user`, `custord` for `customer order`). Returns 0.0 when it is not an
/// abbreviation, otherwise `ABBREVIATION_BASE + ABBREVIATION_SPAN * coverage`
/// where coverage is the fraction of the expansion's letters spelled out.
pub fn abbreviation_score(short: &str, long_tokens: &[String]) -> f64 {
    let short: Vec<char> = short.chars().collect();
    let long_len: usize = long_tokens.iter().map(|t| t.chars().count()).sum();

    if short.len() < MIN_ABBREVIATION_LEN || short.len() >= long_len {
        return 0.0;
    }

    let tokens: Vec<Vec<char>> = long_tokens
        .iter()
        .filter(|t| !t.is_empty())
        .map(|t| t.chars().collect())
        .collect();
    let mut memo = vec![None; (short.len() + 1) * (tokens.len() + 1)];
    if !spells_tokens(&short, 0, &tokens, 0, &mut memo) {
        return 0.0;
    }

    ABBREVIATION_BASE + ABBREVIATION_SPAN * (short.len() as f64 / long_len as f64)
}

/// Can `short[pos..]` spell `tokens[ti..]`, each token starting with its first letter?
fn spells_tokens(
    short: &[char],
    pos: usize,
    tokens: &[Vec<char>],
    ti: usize,
    memo: &mut [Option<bool>],
) -> bool {
    if ti == tokens.len() {
        return pos == short.len();
    }
    let slot = pos * (tokens.len() + 1) + ti;
    if let Some(known) = memo[slot] {
        return known;
    }

    let token = &tokens[ti];
    let mut result = false;
    if short.get(pos) == Some(&token[0]) {
        // Letters after the first are matched as a subsequence of the token's tail;
        // try every split point so later tokens can claim their own letters.
        let mut end = pos + 1;
        let mut tail = token[1..].iter();
        loop {
            if spells_tokens(short, end, tokens, ti + 1, memo) {
                result = true;
                break;
            }
            let Some(&next) = short.get(end) else {
                break;
            };
            if !tail.any(|&c| c == next) {
                break;
            }
            end += 1;
        }
    }

    memo[slot] = Some(result);
    result
}
