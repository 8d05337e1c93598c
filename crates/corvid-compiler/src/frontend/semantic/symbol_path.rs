//! # シンボルパス
//!
//! `a.B.f(int,string)` のようなドット区切りの修飾名を表す不変の値です。
//! マップのキーとしても、診断メッセージの修飾名表示にも使用します。

use std::fmt;
use std::ops::{Add, Div};

/// ドット区切りのシンボルパス
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolPath {
    segments: Vec<String>,
}

impl SymbolPath {
    /// 空のパスを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 単一セグメントのパスを作成
    pub fn from_segment(segment: impl Into<String>) -> Self {
        Self {
            segments: vec![segment.into()],
        }
    }

    /// セグメント列
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// 最後のセグメント
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// 空かどうか
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// 最後のセグメントを置き換えたパス
    pub fn with_last(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.pop();
        segments.push(segment.into());
        Self { segments }
    }
}

/// `path / "seg"` でセグメントを追加
impl Div<&str> for &SymbolPath {
    type Output = SymbolPath;

    fn div(self, segment: &str) -> SymbolPath {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        SymbolPath { segments }
    }
}

impl Div<&str> for SymbolPath {
    type Output = SymbolPath;

    fn div(mut self, segment: &str) -> SymbolPath {
        self.segments.push(segment.to_string());
        self
    }
}

/// `path + "(int)"` で最後のセグメントに文字列を追加
impl Add<&str> for SymbolPath {
    type Output = SymbolPath;

    fn add(mut self, text: &str) -> SymbolPath {
        match self.segments.last_mut() {
            Some(last) => last.push_str(text),
            None => self.segments.push(text.to_string()),
        }
        self
    }
}

impl fmt::Display for SymbolPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_segment_and_text() {
        let path = SymbolPath::from_segment("app") / "Point";
        let path = (&path / "norm") + "(int,string)";
        assert_eq!(path.to_string(), "app.Point.norm(int,string)");
        assert_eq!(path.segments().len(), 3);
        assert_eq!(path.last(), Some("norm(int,string)"));
    }

    #[test]
    fn test_structural_equality() {
        let a = SymbolPath::from_segment("m") / "f";
        let b = SymbolPath::from_segment("m") / "f";
        assert_eq!(a, b);
        assert_ne!(a, b.with_last("g"));
    }
}
