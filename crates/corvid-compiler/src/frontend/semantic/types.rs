//! # 型・式モデル
//!
//! 意味解析が式や宣言に割り当てる型情報を定義します。
//!
//! - [`TypeInfo`]: 名前付き型（[`BasicType`]）か関数型（[`FunctionType`]）
//! - [`ExprInfo`]: 式が何を表すか（値・型そのもの・モジュール・オーバーロード集合）
//! - [`ValueInfo`]: 値の性質（左辺値、const、null、self）
//!
//! これらは短命な値で、スコープツリーのフィールドには明示的に代入された
//! 時点でのみコピーされます。

use std::fmt::Write as _;

use super::scope::ScopeId;
use super::symbol_table::ScopeTree;

/// 名前付き型への参照
#[derive(Debug, Clone, PartialEq)]
pub struct BasicType {
    /// 参照する複合型（Noneは「型」リテラルの擬似型）
    pub compound: Option<ScopeId>,
    /// 型引数
    pub args: Vec<TypeInfo>,
    /// nullを許容するか
    pub nullable: bool,
}

/// パラメータ情報
#[derive(Debug, Clone, PartialEq)]
pub struct ParamInfo {
    /// 名前（名前なしの関数型パラメータは空）
    pub name: String,
    /// 型
    pub ty: TypeInfo,
    /// constパラメータか
    pub is_const: bool,
    /// 可変長パラメータか
    pub is_variadic: bool,
    /// デフォルト値を持つか
    pub is_default: bool,
    /// キーワード専用か
    pub is_keyword_only: bool,
}

impl ParamInfo {
    /// 省略可能なパラメータか（デフォルト値あり、または可変長）
    pub fn is_optional(&self) -> bool {
        self.is_default || self.is_variadic
    }
}

/// 関数シグネチャ型
#[derive(Debug, Clone)]
pub struct FunctionType {
    /// 戻り値の型
    pub ret: Box<TypeInfo>,
    /// 位置専用パラメータ
    pub positional: Vec<ParamInfo>,
    /// 位置・キーワード兼用パラメータ
    pub regular: Vec<ParamInfo>,
    /// キーワード専用パラメータ
    pub keyword: Vec<ParamInfo>,
    /// nullを許容するか
    pub nullable: bool,
}

impl FunctionType {
    /// すべてのパラメータ
    pub fn params(&self) -> impl Iterator<Item = &ParamInfo> {
        self.positional.iter().chain(self.regular.iter()).chain(self.keyword.iter())
    }

    /// 同じ呼び出し方を受け付けるシグネチャか（null許容性は無視）
    pub fn same_signature(&self, other: &FunctionType) -> bool {
        fn same_list(a: &[ParamInfo], b: &[ParamInfo], by_name: bool) -> bool {
            a.len() == b.len()
                && a.iter().zip(b).all(|(x, y)| {
                    x.ty == y.ty && x.is_variadic == y.is_variadic && (!by_name || x.name == y.name)
                })
        }
        same_list(&self.positional, &other.positional, false)
            && same_list(&self.regular, &other.regular, false)
            && same_list(&self.keyword, &other.keyword, true)
    }
}

impl PartialEq for FunctionType {
    fn eq(&self, other: &Self) -> bool {
        self.nullable == other.nullable && self.ret == other.ret && self.same_signature(other)
    }
}

/// 型情報
#[derive(Debug, Clone, PartialEq)]
pub enum TypeInfo {
    /// 名前付き型
    Basic(BasicType),
    /// 関数型
    Function(FunctionType),
}

impl TypeInfo {
    /// 複合型への参照を作成
    pub fn basic(compound: ScopeId, nullable: bool) -> Self {
        TypeInfo::Basic(BasicType {
            compound: Some(compound),
            args: Vec::new(),
            nullable,
        })
    }

    /// 「型」リテラルの擬似型
    pub fn type_literal() -> Self {
        TypeInfo::Basic(BasicType {
            compound: None,
            args: Vec::new(),
            nullable: false,
        })
    }

    /// nullを許容するか
    pub fn is_nullable(&self) -> bool {
        match self {
            TypeInfo::Basic(basic) => basic.nullable,
            TypeInfo::Function(function) => function.nullable,
        }
    }

    /// null許容性を変更した型
    pub fn with_nullable(&self, nullable: bool) -> Self {
        let mut ty = self.clone();
        match &mut ty {
            TypeInfo::Basic(basic) => basic.nullable = nullable,
            TypeInfo::Function(function) => function.nullable = nullable,
        }
        ty
    }

    /// 名前付き型の場合は参照する複合型
    pub fn compound(&self) -> Option<ScopeId> {
        match self {
            TypeInfo::Basic(basic) => basic.compound,
            TypeInfo::Function(_) => None,
        }
    }

    /// 関数型の場合はその型
    pub fn as_function(&self) -> Option<&FunctionType> {
        match self {
            TypeInfo::Function(function) => Some(function),
            TypeInfo::Basic(_) => None,
        }
    }

    /// オーバーロード互換性比較用の緩い等価性
    ///
    /// null許容性を無視し、型引数はどちらかが省略されていれば一致とみなします。
    pub fn weak_equals(&self, other: &TypeInfo) -> bool {
        match (self, other) {
            (TypeInfo::Basic(a), TypeInfo::Basic(b)) => {
                a.compound == b.compound
                    && (a.args.is_empty()
                        || b.args.is_empty()
                        || (a.args.len() == b.args.len()
                            && a.args.iter().zip(&b.args).all(|(x, y)| x.weak_equals(y))))
            }
            (TypeInfo::Function(a), TypeInfo::Function(b)) => {
                let list = |x: &[ParamInfo], y: &[ParamInfo]| {
                    x.len() == y.len()
                        && x.iter()
                            .zip(y)
                            .all(|(p, q)| p.is_variadic == q.is_variadic && p.ty.weak_equals(&q.ty))
                };
                a.ret.weak_equals(&b.ret)
                    && list(&a.positional, &b.positional)
                    && list(&a.regular, &b.regular)
                    && list(&a.keyword, &b.keyword)
            }
            _ => false,
        }
    }

    /// 診断用の表示文字列
    pub fn render(&self, tree: &ScopeTree) -> String {
        match self {
            TypeInfo::Basic(basic) => {
                let mut text = match basic.compound {
                    Some(id) => tree.get(id).name.clone(),
                    None => "type".to_string(),
                };
                if !basic.args.is_empty() {
                    let args: Vec<String> = basic.args.iter().map(|a| a.render(tree)).collect();
                    let _ = write!(text, "<{}>", args.join(","));
                }
                if basic.nullable {
                    text.push('?');
                }
                text
            }
            TypeInfo::Function(function) => {
                let mut text = format!("fun({}):{}", render_params(function, tree), function.ret.render(tree));
                if function.nullable {
                    text.push('?');
                }
                text
            }
        }
    }
}

/// パラメータリストを `int,/,string,*,key:int...` 形式で表示
pub fn render_params(function: &FunctionType, tree: &ScopeTree) -> String {
    let render = |p: &ParamInfo, named: bool| {
        let mut text = if named && !p.name.is_empty() {
            format!("{}:{}", p.name, p.ty.render(tree))
        } else {
            p.ty.render(tree)
        };
        if p.is_variadic {
            text.push_str("...");
        }
        text
    };
    let mut parts: Vec<String> = function.positional.iter().map(|p| render(p, false)).collect();
    if !function.positional.is_empty() {
        parts.push("/".to_string());
    }
    parts.extend(function.regular.iter().map(|p| render(p, false)));
    if !function.keyword.is_empty() {
        parts.push("*".to_string());
        parts.extend(function.keyword.iter().map(|p| render(p, true)));
    }
    parts.join(",")
}

/// 値の性質
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValueInfo {
    /// 代入可能な場所か
    pub is_lvalue: bool,
    /// const宣言か
    pub is_const: bool,
    /// nullリテラルか
    pub is_null: bool,
    /// this/superか
    pub is_self: bool,
    /// 参照する宣言
    pub declaration: Option<ScopeId>,
}

impl ValueInfo {
    /// 一時値（右辺値）
    pub fn rvalue() -> Self {
        Self::default()
    }
}

/// オーバーロード集合を表す式の情報
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionInfo {
    /// 候補関数（宣言順、継承したものを含む）
    pub functions: Vec<ScopeId>,
    /// レシーバーの型（インスタンスメンバーとして参照された場合）
    pub receiver: Option<TypeInfo>,
    /// `?.` 経由で参照されたか（呼び出し結果がnull許容になる）
    pub nullable_result: bool,
}

/// 式が表すもの
#[derive(Debug, Clone, PartialEq)]
pub enum ExprInfo {
    /// 値
    Normal { ty: TypeInfo, value: ValueInfo },
    /// 型そのもの（常に名前付き型）
    Static(TypeInfo),
    /// モジュール
    Module(ScopeId),
    /// オーバーロード集合
    FunctionSet(FunctionInfo),
}

impl ExprInfo {
    /// 右辺値を作成
    pub fn value(ty: TypeInfo) -> Self {
        ExprInfo::Normal {
            ty,
            value: ValueInfo::rvalue(),
        }
    }

    /// 値の型（値でない場合はNone）
    pub fn ty(&self) -> Option<&TypeInfo> {
        match self {
            ExprInfo::Normal { ty, .. } => Some(ty),
            _ => None,
        }
    }

    /// 診断用の種類名
    pub fn describe(&self) -> &'static str {
        match self {
            ExprInfo::Normal { .. } => "値",
            ExprInfo::Static(_) => "型",
            ExprInfo::Module(_) => "モジュール",
            ExprInfo::FunctionSet(_) => "関数",
        }
    }
}
