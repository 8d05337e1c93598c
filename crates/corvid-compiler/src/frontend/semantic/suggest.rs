//! # 候補の提案
//!
//! 未定義の名前に対して「もしかして」の候補を提示するための
//! 編集距離（レーベンシュタイン距離）による曖昧検索です。

/// 提案する候補の最大数
pub const MAX_SUGGESTIONS: usize = 6;

/// 2つの文字列の編集距離
///
/// 挿入・削除・置換それぞれ1回を距離1として数えます。
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            current[j + 1] = (previous[j + 1] + 1).min(current[j] + 1).min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// 対象に近い候補を距離の近い順に最大 [`MAX_SUGGESTIONS`] 件返す
///
/// 許容する距離は名前の長さの3分の1（最低1）です。距離が同じ候補は
/// 与えられた順序を保ちます。`%` で始まる内部名と対象自身は除外します。
pub fn similar_names<'a, I>(target: &str, candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let max_distance = (target.chars().count() / 3).max(1);
    let mut seen = std::collections::HashSet::new();
    let mut matches: Vec<(usize, &str)> = candidates
        .into_iter()
        .filter(|name| !name.starts_with('%') && *name != target)
        .filter(|name| seen.insert(*name))
        .filter_map(|name| {
            let distance = edit_distance(target, name);
            (distance <= max_distance).then_some((distance, name))
        })
        .collect();
    matches.sort_by_key(|(distance, _)| *distance);
    matches
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(_, name)| name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("cout", "count"), 1);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("same", "same"), 0);
    }

    #[test]
    fn test_single_suggestion() {
        let names = ["count", "main", "int", "string"];
        assert_eq!(similar_names("cout", names), vec!["count".to_string()]);
    }

    #[test]
    fn test_internal_names_excluded() {
        let names = ["%block0", "%block1"];
        assert!(similar_names("block0", names).is_empty());
    }

    #[test]
    fn test_ties_keep_insertion_order_and_cap() {
        let names = ["ab", "ac", "ad", "ae", "af", "ag", "ah", "aa"];
        let found = similar_names("a", names);
        assert_eq!(found.len(), MAX_SUGGESTIONS);
        assert_eq!(found[0], "ab");
        assert_eq!(found[5], "ag");
    }
}
