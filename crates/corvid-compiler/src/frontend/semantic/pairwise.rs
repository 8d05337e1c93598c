//! # ペアワイズ検査
//!
//! オーバーロード集合の宣言曖昧性と、継承メンバーの互換性は
//! 「すべての組について独立した純粋な検査を行い、エラーを集める」形をしています。
//! 集合が閾値より大きい場合は rayon で並列に、それ以外は逐次に実行します。
//! どちらの戦略でも結果は組の順序（i, j）で並び、同じになります。

use parking_lot::Mutex;
use rayon::prelude::*;

use crate::frontend::error::CompilerError;

/// 逐次検査を行う集合サイズの上限の既定値
pub const MAX_FUN_CHECK_SEQ: usize = 5;

/// 検査の実行戦略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStrategy {
    /// 二重ループで逐次に検査
    Sequential,
    /// rayonで並列に検査し、ロックで保護したコレクタに集約
    Parallel,
}

impl CheckStrategy {
    /// 集合サイズから戦略を選択
    pub fn for_size(len: usize, threshold: usize) -> Self {
        if len > threshold {
            CheckStrategy::Parallel
        } else {
            CheckStrategy::Sequential
        }
    }
}

/// すべての順序なし組 (i < j) を検査してエラーを集める
pub fn check_pairs<T, F>(items: &[T], strategy: CheckStrategy, check: F) -> Vec<CompilerError>
where
    T: Sync,
    F: Fn(&T, &T) -> Option<CompilerError> + Sync,
{
    match strategy {
        CheckStrategy::Sequential => {
            let mut errors = Vec::new();
            for i in 0..items.len() {
                for j in i + 1..items.len() {
                    if let Some(error) = check(&items[i], &items[j]) {
                        errors.push(error);
                    }
                }
            }
            errors
        }
        CheckStrategy::Parallel => {
            let collected: Mutex<Vec<(usize, usize, CompilerError)>> = Mutex::new(Vec::new());
            (0..items.len()).into_par_iter().for_each(|i| {
                for j in i + 1..items.len() {
                    if let Some(error) = check(&items[i], &items[j]) {
                        collected.lock().push((i, j, error));
                    }
                }
            });
            let mut collected = collected.into_inner();
            collected.sort_by_key(|(i, j, _)| (*i, *j));
            collected.into_iter().map(|(_, _, error)| error).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::error::ErrorKind;

    fn duplicates(items: &[i32], strategy: CheckStrategy) -> Vec<String> {
        check_pairs(items, strategy, |a, b| {
            (a == b).then(|| CompilerError::new(ErrorKind::AmbiguousDeclaration, format!("{}", a), None))
        })
        .into_iter()
        .map(|e| e.message)
        .collect()
    }

    #[test]
    fn test_strategy_selection() {
        assert_eq!(CheckStrategy::for_size(5, MAX_FUN_CHECK_SEQ), CheckStrategy::Sequential);
        assert_eq!(CheckStrategy::for_size(6, MAX_FUN_CHECK_SEQ), CheckStrategy::Parallel);
    }

    #[test]
    fn test_strategies_agree() {
        let items = [1, 2, 3, 2, 5, 1, 7, 3];
        let sequential = duplicates(&items, CheckStrategy::Sequential);
        let parallel = duplicates(&items, CheckStrategy::Parallel);
        assert_eq!(sequential, vec!["1", "2", "3"]);
        assert_eq!(sequential, parallel);
    }
}
