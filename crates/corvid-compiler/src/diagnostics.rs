//! 診断情報モジュール
//!
//! 解析中に発生した警告を即座に収集するエミッタを提供します。
//! 警告は解析を中断せず、発生した時点でログにも出力されます。

use crate::frontend::error::{CompilerError, ErrorSeverity};

/// 診断情報エミッタ
#[derive(Debug, Default)]
pub struct DiagnosticEmitter {
    /// 収集した警告
    warnings: Vec<CompilerError>,
}

impl DiagnosticEmitter {
    /// 新しい診断エミッタを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 警告を発行
    pub fn warn(&mut self, warning: CompilerError) {
        let warning = warning.with_severity(ErrorSeverity::Warning);
        log::warn!("{}", warning);
        self.warnings.push(warning);
    }

    /// 収集した警告
    pub fn warnings(&self) -> &[CompilerError] {
        &self.warnings
    }

    /// 警告が存在するかどうか
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// 収集した警告を取り出す
    pub fn take(&mut self) -> Vec<CompilerError> {
        std::mem::take(&mut self.warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::error::ErrorKind;

    #[test]
    fn test_warn_forces_warning_severity() {
        let mut emitter = DiagnosticEmitter::new();
        emitter.warn(CompilerError::new(ErrorKind::Unused, "未使用", None));
        assert!(emitter.has_warnings());
        assert!(emitter.warnings()[0].is_warning());
        assert_eq!(emitter.take().len(), 1);
        assert!(!emitter.has_warnings());
    }
}
