//! # 抽象構文木（AST）
//!
//! Corvid言語のソースコードを表現する抽象構文木（AST）の定義です。
//! パーサーが生成し、スコープツリー構築と意味解析で参照されます。
//!
//! 宣言ノードは `Arc` で共有され、スコープツリーは所有権を持たない参照として
//! 保持します。構文木はコンパイル全体より長く生存します。

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::frontend::error::SourceLocation;

/// ノードID（モジュール内の各式を一意に識別する整数）
pub type NodeId = usize;

/// 位置情報を持つトレイト
pub trait Locatable {
    /// ソースコード内の位置情報を取得
    fn location(&self) -> SourceLocation;
}

/// 識別子
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    /// 名前
    pub name: String,
    /// 位置情報
    pub location: SourceLocation,
}

impl Identifier {
    /// 新しい識別子を作成
    pub fn new(name: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            name: name.into(),
            location,
        }
    }
}

/// モジュール（1ファイル分の構文木）
#[derive(Debug, Clone)]
pub struct Module {
    /// モジュール名（ファイル名の語幹）
    pub name: String,
    /// ソースファイルパス
    pub path: PathBuf,
    /// インポート宣言
    pub imports: Vec<Arc<Import>>,
    /// トップレベル宣言
    pub declarations: Vec<Declaration>,
    /// 位置情報
    pub location: SourceLocation,
}

/// インポート宣言
///
/// `import a.b.c`, `import a.b.*`, `import .x as y`, `import ..x`
#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    /// 先頭のドットの数（0 = 検索ディレクトリから、1 = 同じディレクトリ、2以上 = 親へ遡る）
    pub relative: usize,
    /// パスのセグメント
    pub segments: Vec<Identifier>,
    /// 別名
    pub alias: Option<Identifier>,
    /// `.*` で終わるオープンインポートかどうか
    pub open: bool,
    /// 位置情報
    pub location: SourceLocation,
}

impl Import {
    /// 修飾インポートが束縛する名前
    pub fn binding_name(&self) -> Option<&str> {
        if self.open {
            return None;
        }
        self.alias
            .as_ref()
            .or_else(|| self.segments.last())
            .map(|ident| ident.name.as_str())
    }

    /// ソース上の表記
    pub fn display_path(&self) -> String {
        let mut text = ".".repeat(self.relative);
        let names: Vec<&str> = self.segments.iter().map(|s| s.name.as_str()).collect();
        text.push_str(&names.join("."));
        if self.open {
            text.push_str(".*");
        }
        text
    }
}

/// 宣言
#[derive(Debug, Clone)]
pub enum Declaration {
    /// クラス・インターフェース・列挙型・アノテーション
    Compound(Arc<CompoundDecl>),
    /// 関数・コンストラクタ
    Function(Arc<FunctionDecl>),
    /// 変数・定数
    Variable(Arc<VariableDecl>),
}

impl Declaration {
    /// 宣言名
    pub fn name(&self) -> &Identifier {
        match self {
            Declaration::Compound(decl) => &decl.name,
            Declaration::Function(decl) => &decl.name,
            Declaration::Variable(decl) => &decl.name,
        }
    }
}

impl Locatable for Declaration {
    fn location(&self) -> SourceLocation {
        match self {
            Declaration::Compound(decl) => decl.location,
            Declaration::Function(decl) => decl.location,
            Declaration::Variable(decl) => decl.location,
        }
    }
}

/// 修飾子の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierKind {
    Public,
    Private,
    Internal,
    Protected,
    Static,
    Final,
    Abstract,
    Override,
    Native,
}

impl ModifierKind {
    /// アクセス修飾子かどうか
    pub fn is_accessor(self) -> bool {
        matches!(
            self,
            ModifierKind::Public | ModifierKind::Private | ModifierKind::Internal | ModifierKind::Protected
        )
    }
}

impl fmt::Display for ModifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ModifierKind::Public => "public",
            ModifierKind::Private => "private",
            ModifierKind::Internal => "internal",
            ModifierKind::Protected => "protected",
            ModifierKind::Static => "static",
            ModifierKind::Final => "final",
            ModifierKind::Abstract => "abstract",
            ModifierKind::Override => "override",
            ModifierKind::Native => "native",
        };
        write!(f, "{}", text)
    }
}

/// 修飾子トークン
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Modifier {
    /// 種類
    pub kind: ModifierKind,
    /// 位置情報
    pub location: SourceLocation,
}

/// 修飾子リスト
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Modifiers(pub Vec<Modifier>);

impl Modifiers {
    /// 指定した修飾子を持つかどうか
    pub fn has(&self, kind: ModifierKind) -> bool {
        self.0.iter().any(|m| m.kind == kind)
    }

    /// 指定した修飾子を取得
    pub fn get(&self, kind: ModifierKind) -> Option<&Modifier> {
        self.0.iter().find(|m| m.kind == kind)
    }

    /// アクセス修飾子を取得
    pub fn accessor(&self) -> Option<ModifierKind> {
        self.0.iter().map(|m| m.kind).find(|k| k.is_accessor())
    }

    /// 修飾子の反復子
    pub fn iter(&self) -> impl Iterator<Item = &Modifier> {
        self.0.iter()
    }
}

/// 複合型の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompoundKind {
    Class,
    Interface,
    Enum,
    Annotation,
}

impl fmt::Display for CompoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompoundKind::Class => write!(f, "クラス"),
            CompoundKind::Interface => write!(f, "インターフェース"),
            CompoundKind::Enum => write!(f, "列挙型"),
            CompoundKind::Annotation => write!(f, "アノテーション"),
        }
    }
}

/// 複合型宣言
#[derive(Debug, Clone)]
pub struct CompoundDecl {
    /// 修飾子
    pub modifiers: Modifiers,
    /// 種類
    pub kind: CompoundKind,
    /// 名前
    pub name: Identifier,
    /// 型パラメータ
    pub type_params: Vec<Identifier>,
    /// 親型
    pub supers: Vec<TypeExpr>,
    /// 列挙子（列挙型のみ）
    pub enumerators: Vec<Identifier>,
    /// メンバー宣言
    pub members: Vec<Declaration>,
    /// 位置情報
    pub location: SourceLocation,
}

/// パラメータ
#[derive(Debug, Clone)]
pub struct Param {
    /// 名前
    pub name: Identifier,
    /// 型
    pub ty: TypeExpr,
    /// constパラメータかどうか
    pub is_const: bool,
    /// 可変長パラメータかどうか
    pub is_variadic: bool,
    /// デフォルト値
    pub default: Option<Expression>,
    /// 位置情報
    pub location: SourceLocation,
}

/// 3つに分かれたパラメータリスト
#[derive(Debug, Clone, Default)]
pub struct ParamLists {
    /// 位置専用パラメータ（`/` より前）
    pub positional: Vec<Param>,
    /// 位置・キーワード兼用パラメータ
    pub regular: Vec<Param>,
    /// キーワード専用パラメータ（`*` より後）
    pub keyword: Vec<Param>,
}

impl ParamLists {
    /// すべてのパラメータ
    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.positional.iter().chain(self.regular.iter()).chain(self.keyword.iter())
    }
}

/// 関数宣言
#[derive(Debug, Clone)]
pub struct FunctionDecl {
    /// 修飾子
    pub modifiers: Modifiers,
    /// 名前（コンストラクタは `constructor`）
    pub name: Identifier,
    /// コンストラクタかどうか
    pub is_constructor: bool,
    /// パラメータ
    pub params: ParamLists,
    /// 戻り値の型
    pub return_type: Option<TypeExpr>,
    /// 本体
    pub body: Option<Block>,
    /// 位置情報
    pub location: SourceLocation,
}

/// 変数宣言
#[derive(Debug, Clone)]
pub struct VariableDecl {
    /// 修飾子
    pub modifiers: Modifiers,
    /// constかどうか
    pub is_const: bool,
    /// 名前
    pub name: Identifier,
    /// 型注釈
    pub ty: Option<TypeExpr>,
    /// 初期化式
    pub initializer: Option<Expression>,
    /// 位置情報
    pub location: SourceLocation,
}

/// 型式
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    /// 名前付き型 `a.B<T>?`
    Named {
        path: Vec<Identifier>,
        args: Vec<TypeExpr>,
        nullable: bool,
        location: SourceLocation,
    },
    /// 関数型 `fun(int, /, string, *, k: int): void`
    Function {
        params: FunctionTypeParams,
        return_type: Box<TypeExpr>,
        nullable: bool,
        location: SourceLocation,
    },
}

/// 関数型のパラメータ
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionTypeParams {
    pub positional: Vec<FunctionTypeParam>,
    pub regular: Vec<FunctionTypeParam>,
    pub keyword: Vec<FunctionTypeParam>,
}

/// 関数型の1パラメータ
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionTypeParam {
    pub name: Option<Identifier>,
    pub ty: TypeExpr,
    pub is_variadic: bool,
}

impl Locatable for TypeExpr {
    fn location(&self) -> SourceLocation {
        match self {
            TypeExpr::Named { location, .. } | TypeExpr::Function { location, .. } => *location,
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Named { path, args, nullable, .. } => {
                let names: Vec<&str> = path.iter().map(|p| p.name.as_str()).collect();
                write!(f, "{}", names.join("."))?;
                if !args.is_empty() {
                    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                    write!(f, "<{}>", args.join(","))?;
                }
                if *nullable {
                    write!(f, "?")?;
                }
                Ok(())
            }
            TypeExpr::Function { params, return_type, nullable, .. } => {
                let render = |p: &FunctionTypeParam| {
                    let mut text = match &p.name {
                        Some(name) => format!("{}:{}", name.name, p.ty),
                        None => p.ty.to_string(),
                    };
                    if p.is_variadic {
                        text.push_str("...");
                    }
                    text
                };
                let mut parts: Vec<String> = params.positional.iter().map(render).collect();
                if !params.positional.is_empty() {
                    parts.push("/".to_string());
                }
                parts.extend(params.regular.iter().map(render));
                if !params.keyword.is_empty() {
                    parts.push("*".to_string());
                    parts.extend(params.keyword.iter().map(render));
                }
                write!(f, "fun({}):{}", parts.join(","), return_type)?;
                if *nullable {
                    write!(f, "?")?;
                }
                Ok(())
            }
        }
    }
}

/// ブロック
#[derive(Debug, Clone)]
pub struct Block {
    /// 文のリスト
    pub statements: Vec<Statement>,
    /// 位置情報
    pub location: SourceLocation,
}

/// 文
#[derive(Debug, Clone)]
pub struct Statement {
    /// 文の種類
    pub kind: StatementKind,
    /// 位置情報
    pub location: SourceLocation,
}

/// catch節
#[derive(Debug, Clone)]
pub struct CatchClause {
    /// 例外を受け取る変数
    pub name: Identifier,
    /// 捕捉する型
    pub ty: TypeExpr,
    /// 本体
    pub body: Block,
    /// 位置情報
    pub location: SourceLocation,
}

/// 文の種類
#[derive(Debug, Clone)]
pub enum StatementKind {
    /// ローカル変数宣言
    Variable(Arc<VariableDecl>),
    /// 式文
    Expression(Expression),
    /// ブロック
    Block(Block),
    /// if文
    If {
        condition: Expression,
        then_branch: Block,
        else_branch: Option<Box<Statement>>,
    },
    /// while文
    While { condition: Expression, body: Block },
    /// do-while文
    DoWhile { body: Block, condition: Expression },
    /// break文
    Break,
    /// continue文
    Continue,
    /// return文
    Return(Option<Expression>),
    /// throw文
    Throw(Expression),
    /// yield文
    Yield(Option<Expression>),
    /// try文
    Try {
        body: Block,
        catches: Vec<CatchClause>,
        finally: Option<Block>,
    },
}

/// リテラル
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Null,
}

/// 単項演算子
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// -
    Negate,
    /// !
    Not,
}

/// 二項演算子
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    And,
    Or,
}

impl BinaryOp {
    /// 演算子メソッドの名前（組み込みの演算子はNone）
    pub fn method_name(self) -> Option<&'static str> {
        match self {
            BinaryOp::Add => Some("__add__"),
            BinaryOp::Sub => Some("__sub__"),
            BinaryOp::Mul => Some("__mul__"),
            BinaryOp::Div => Some("__div__"),
            BinaryOp::Mod => Some("__mod__"),
            BinaryOp::Less => Some("__lt__"),
            BinaryOp::LessEq => Some("__le__"),
            BinaryOp::Greater => Some("__gt__"),
            BinaryOp::GreaterEq => Some("__ge__"),
            BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::And | BinaryOp::Or => None,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEq => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEq => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        };
        write!(f, "{}", text)
    }
}

/// 呼び出し引数
#[derive(Debug, Clone)]
pub struct Argument {
    /// キーワード引数の名前
    pub name: Option<Identifier>,
    /// 値
    pub value: Expression,
}

/// 式
#[derive(Debug, Clone)]
pub struct Expression {
    /// 式の種類
    pub kind: ExpressionKind,
    /// ノードID
    pub id: NodeId,
    /// 位置情報
    pub location: SourceLocation,
}

/// 式の種類
#[derive(Debug, Clone)]
pub enum ExpressionKind {
    /// リテラル
    Literal(Literal),
    /// 識別子
    Identifier(Identifier),
    /// this
    This,
    /// super
    Super,
    /// メンバーアクセス `a.b` / `a?.b`
    Member {
        object: Box<Expression>,
        name: Identifier,
        safe: bool,
    },
    /// 関数呼び出し
    Call {
        callee: Box<Expression>,
        args: Vec<Argument>,
    },
    /// インデックス `a[i]`
    Index {
        object: Box<Expression>,
        index: Box<Expression>,
    },
    /// 単項演算
    Unary { op: UnaryOp, operand: Box<Expression> },
    /// 二項演算
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// 代入（複合代入は演算子付き）
    Assign {
        op: Option<BinaryOp>,
        target: Box<Expression>,
        value: Box<Expression>,
    },
    /// キャスト `e as T` / `e as? T`
    Cast {
        expr: Box<Expression>,
        ty: TypeExpr,
        safe: bool,
    },
    /// 型検査 `e is T`
    Is { expr: Box<Expression>, ty: TypeExpr },
    /// エルビス演算子 `a ?: b`
    Elvis {
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// 無名関数
    Lambda(Arc<FunctionDecl>),
}

impl Locatable for Expression {
    fn location(&self) -> SourceLocation {
        self.location
    }
}
