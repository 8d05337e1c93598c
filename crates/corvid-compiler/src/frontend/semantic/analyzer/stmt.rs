//! 関数本体の走査と制御フローグラフ
//!
//! 文を1つ訪問するたびにフロンティア（現在到達可能なノード集合）から
//! 新しいノードへ辺を張ります。分岐はフロンティアを分けて合流させ、
//! `return`・`throw`・`yield` はフロンティアを出口へつないで空にします。

use std::sync::Arc;

use log::debug;

use crate::frontend::ast::{
    Block, CatchClause, Expression, ExpressionKind, Literal, Locatable, Statement, StatementKind, VariableDecl,
};
use crate::frontend::error::{CompilerError, ErrorCollector, ErrorKind, Result, SourceLocation};
use crate::frontend::semantic::builder::redeclaration;
use crate::frontend::semantic::cfg::{CfNodeId, CfNodeKind, FlowState, LoopFrame};
use crate::frontend::semantic::scope::{Eval, Scope, ScopeData, ScopeId, VariableData, VariableSource};
use crate::frontend::semantic::types::{ExprInfo, TypeInfo};

use super::resolve::type_error;
use super::{Analyzer, FunctionFlow};

impl Analyzer<'_> {
    /// 関数（または無名関数）の本体を解析してCFGを記録
    pub(super) fn analyze_function_body(&mut self, function: ScopeId) -> Result<()> {
        match self.tree.get_mut(function).as_function_mut() {
            Some(data) if !data.body_done => data.body_done = true,
            _ => return Ok(()),
        }
        let mut errors = ErrorCollector::new();
        errors.absorb(self.eval_proto(function));
        let decl = self.function_decl(function)?;
        let Some(body) = &decl.body else {
            return errors.finish();
        };
        let ret = match self.tree.get(function).as_function().and_then(|f| f.ty.as_ref()) {
            Some(ty) => (*ty.ret).clone(),
            None => return errors.finish(),
        };
        debug!("関数本体を解析: {}", self.tree.qualified_name(function));

        let is_constructor = decl.is_constructor;
        let result = self.in_scope(function, |this| {
            this.flow = Some(FunctionFlow {
                function,
                ret,
                is_constructor,
                state: FlowState::new(body.location),
            });
            let visited = this.visit_block(body);
            let flow = this
                .flow
                .take()
                .ok_or_else(|| CompilerError::internal("関数本体の走査状態が失われました"))?;
            let (graph, falls_through) = flow.state.finish();
            if let Some(data) = this.tree.get_mut(function).as_function_mut() {
                data.cfg = Some(graph);
            }

            let mut errors = ErrorCollector::new();
            errors.absorb(visited);
            let void = this.builtin_type(|b| b.void, false)?;
            if falls_through && !flow.is_constructor && flow.ret != void {
                let name = this.tree.get(flow.function).name.clone();
                errors.push(CompilerError::new(
                    ErrorKind::TypeMismatch,
                    format!("関数 '{}' は '{}' を返す必要がありますが、本体の末尾に到達します", name, flow.ret.render(&this.tree)),
                    Some(body.location),
                ));
            }
            errors.finish()
        });
        errors.absorb(result);
        errors.finish()
    }

    fn flow_mut(&mut self) -> Result<&mut FunctionFlow> {
        self.flow
            .as_mut()
            .ok_or_else(|| CompilerError::internal("関数本体の外で文を解析しようとしました").into())
    }

    fn step(&mut self, kind: CfNodeKind, location: SourceLocation) -> Result<CfNodeId> {
        self.flow_mut()?.state.step(kind, location)
    }

    fn take_frontier(&mut self) -> Result<Vec<CfNodeId>> {
        Ok(std::mem::take(&mut self.flow_mut()?.state.frontier))
    }

    fn set_frontier(&mut self, frontier: Vec<CfNodeId>) -> Result<()> {
        self.flow_mut()?.state.frontier = frontier;
        Ok(())
    }

    /// 新しいブロックスコープを作る
    fn new_block(&mut self, location: SourceLocation) -> Result<ScopeId> {
        self.block_counter += 1;
        let name = format!("%block{}", self.block_counter);
        let path = &self.tree.get(self.current).path / name.as_str();
        let scope = Scope::new(name.clone(), path, Some(location), ScopeData::Block);
        self.tree
            .add_member(self.current, &name, scope)
            .map_err(|_| CompilerError::internal(format!("ブロック '{}' が重複しています", name)).into())
    }

    fn visit_block(&mut self, block: &Block) -> Result<()> {
        let scope = self.new_block(block.location)?;
        self.with_current(scope, |this| this.visit_statements(&block.statements))
    }

    /// 文の列を訪問（到達不能コードを見つけたら残りは訪問しない）
    fn visit_statements(&mut self, statements: &[Statement]) -> Result<()> {
        let mut errors = ErrorCollector::new();
        for statement in statements {
            let reachable = self.flow.as_ref().map(|f| f.state.is_reachable()).unwrap_or(true);
            errors.absorb(self.visit_statement(statement));
            if !reachable {
                break;
            }
        }
        errors.finish()
    }

    fn visit_statement(&mut self, statement: &Statement) -> Result<()> {
        let location = statement.location;
        match &statement.kind {
            StatementKind::Variable(decl) => {
                self.step(CfNodeKind::Statement, location)?;
                self.declare_local(decl)
            }
            StatementKind::Expression(expr) => {
                self.step(CfNodeKind::Statement, location)?;
                let info = self.visit_expr(expr)?;
                self.check_discarded(expr, &info)
            }
            StatementKind::Block(block) => {
                self.step(CfNodeKind::Statement, location)?;
                self.visit_block(block)
            }
            StatementKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let cond = self.step(CfNodeKind::Condition, location)?;
                self.expect_bool(condition)?;
                let mut errors = ErrorCollector::new();
                errors.absorb(self.visit_block(then_branch));
                let mut ends = self.take_frontier()?;
                self.set_frontier(vec![cond])?;
                if let Some(else_branch) = else_branch {
                    errors.absorb(self.visit_statement(else_branch));
                }
                ends.extend(self.take_frontier()?);
                self.set_frontier(ends)?;
                errors.finish()
            }
            StatementKind::While { condition, body } => {
                let cond = self.step(CfNodeKind::Condition, location)?;
                self.expect_bool(condition)?;
                self.flow_mut()?.state.loops.push(LoopFrame {
                    condition: Some(cond),
                    ..LoopFrame::default()
                });
                let body_result = self.visit_block(body);
                let frame = self.pop_loop()?;
                let body_end = self.take_frontier()?;

                let state = &mut self.flow_mut()?.state;
                state.connect(&body_end, cond);
                state.connect(&frame.continues, cond);
                let mut exits = if is_literal_true(condition) { Vec::new() } else { vec![cond] };
                exits.extend(frame.breaks.iter().copied());
                state.frontier = exits;

                let mut errors = ErrorCollector::new();
                errors.absorb(body_result);
                if body_end.is_empty() && frame.continues.is_empty() {
                    errors.push(redundant_loop(location));
                }
                errors.finish()
            }
            StatementKind::DoWhile { body, condition } => {
                let join = self.step(CfNodeKind::Join, location)?;
                self.flow_mut()?.state.loops.push(LoopFrame::default());
                let body_result = self.visit_block(body);
                let frame = self.pop_loop()?;
                let mut body_end = self.take_frontier()?;
                body_end.extend(frame.continues.iter().copied());

                let mut errors = ErrorCollector::new();
                errors.absorb(body_result);
                if body_end.is_empty() {
                    errors.push(redundant_loop(location));
                    self.set_frontier(frame.breaks)?;
                    return errors.finish();
                }
                self.set_frontier(body_end)?;
                let cond = self.step(CfNodeKind::Condition, condition.location)?;
                errors.absorb(self.expect_bool(condition));
                let state = &mut self.flow_mut()?.state;
                state.connect(&[cond], join);
                let mut exits = if is_literal_true(condition) { Vec::new() } else { vec![cond] };
                exits.extend(frame.breaks.iter().copied());
                state.frontier = exits;
                errors.finish()
            }
            StatementKind::Break | StatementKind::Continue => {
                let is_break = matches!(statement.kind, StatementKind::Break);
                let node = self.step(CfNodeKind::Statement, location)?;
                let state = &mut self.flow_mut()?.state;
                let Some(frame) = state.loops.last_mut() else {
                    let keyword = if is_break { "break" } else { "continue" };
                    return Err(CompilerError::syntax_error(
                        format!("ループの外で '{}' は使えません", keyword),
                        Some(location),
                    )
                    .into());
                };
                if is_break {
                    frame.breaks.push(node);
                } else {
                    frame.continues.push(node);
                }
                state.frontier.clear();
                Ok(())
            }
            StatementKind::Return(value) | StatementKind::Yield(value) => {
                let keyword = if matches!(statement.kind, StatementKind::Return(_)) { "return" } else { "yield" };
                let node = self.step(CfNodeKind::Statement, location)?;
                let checked = self.check_return(value.as_ref(), keyword, location);
                self.flow_mut()?.state.terminate(node);
                checked
            }
            StatementKind::Throw(value) => {
                let node = self.step(CfNodeKind::Throw, location)?;
                let checked = self.check_throwable(value);
                self.flow_mut()?.state.terminate(node);
                checked
            }
            StatementKind::Try { body, catches, finally } => self.visit_try(body, catches, finally.as_ref(), location),
        }
    }

    fn pop_loop(&mut self) -> Result<LoopFrame> {
        self.flow_mut()?
            .state
            .loops
            .pop()
            .ok_or_else(|| CompilerError::internal("ループの状態が失われました").into())
    }

    /// ローカル変数を現在のブロックに宣言して評価
    fn declare_local(&mut self, decl: &Arc<VariableDecl>) -> Result<()> {
        let name = decl.name.name.as_str();
        let path = &self.tree.get(self.current).path / name;
        let data = VariableData::new(VariableSource::Declared(Arc::clone(decl)), decl.is_const);
        let scope = Scope::new(name, path, Some(decl.name.location), ScopeData::Variable(data))
            .with_modifiers(decl.modifiers.clone());
        let variable = match self.tree.add_member(self.current, name, scope) {
            Ok(id) => id,
            Err(existing) => {
                return Err(redeclaration(name, decl.name.location, self.tree.get(existing).location).into());
            }
        };
        self.eval_variable(variable).map(|_| ())
    }

    /// 捨てられた値の警告
    fn check_discarded(&mut self, expr: &Expression, info: &ExprInfo) -> Result<()> {
        let exempt = match &expr.kind {
            ExpressionKind::Assign { .. } => true,
            ExpressionKind::Call { callee, .. } => matches!(callee.kind, ExpressionKind::This | ExpressionKind::Super),
            _ => false,
        };
        if exempt {
            return Ok(());
        }
        let void = self.builtin_type(|b| b.void, false)?;
        let discarded = match info {
            ExprInfo::Normal { ty, .. } => !ty.weak_equals(&void),
            _ => true,
        };
        if discarded {
            self.warn(CompilerError::warning(
                ErrorKind::Unused,
                format!("式の{}が使われていません", info.describe()),
                Some(expr.location),
            ));
        }
        Ok(())
    }

    /// `return` / `yield` の値を検査
    fn check_return(&mut self, value: Option<&Expression>, keyword: &str, location: SourceLocation) -> Result<()> {
        let (ret, is_constructor) = {
            let flow = self.flow_mut()?;
            (flow.ret.clone(), flow.is_constructor)
        };
        if is_constructor {
            if keyword == "yield" {
                return Err(type_error("コンストラクタの中で 'yield' は使えません", location));
            }
            if let Some(value) = value {
                return Err(type_error("コンストラクタの中で値を返すことはできません", value.location));
            }
            return Ok(());
        }

        let void = self.builtin_type(|b| b.void, false)?;
        match value {
            Some(value) => {
                let info = self.visit_expr(value)?;
                if ret == void {
                    return Err(type_error("void 関数は値を返せません", value.location));
                }
                self.check_assign(&ret, &info, value.location)
            }
            None if ret != void => Err(type_error(
                format!("'{}' 型の値を返す必要があります", ret.render(&self.tree)),
                location,
            )),
            None => Ok(()),
        }
    }

    /// `throw` の値は Throwable の派生型でなければならない
    fn check_throwable(&mut self, value: &Expression) -> Result<()> {
        let ty = self.expect_value(value)?;
        self.require_throwable(&ty, value.location)
    }

    fn require_throwable(&mut self, ty: &TypeInfo, location: SourceLocation) -> Result<()> {
        let throwable = self.builtins()?.throwable;
        if let Some(compound) = ty.compound() {
            if self.is_subtype_of(compound, throwable)? {
                return Ok(());
            }
        }
        Err(type_error(
            format!("'{}' は Throwable の派生型ではありません", ty.render(&self.tree)),
            location,
        ))
    }

    fn visit_try(
        &mut self,
        body: &Block,
        catches: &[CatchClause],
        finally: Option<&Block>,
        location: SourceLocation,
    ) -> Result<()> {
        let entry = self.take_frontier()?;
        if entry.is_empty() {
            return Err(CompilerError::new(ErrorKind::UnreachableCode, "到達不能なコードです", Some(location)).into());
        }
        self.set_frontier(entry.clone())?;
        let first = self.flow_mut()?.state.graph.len();

        let mut errors = ErrorCollector::new();
        errors.absorb(self.visit_block(body));
        let mut ends = self.take_frontier()?;
        let last = self.flow_mut()?.state.graph.len();
        let mut throwing: Vec<CfNodeId> = entry.clone();
        throwing.extend((first..last).map(CfNodeId));

        for clause in catches {
            let state = &mut self.flow_mut()?.state;
            let node = state.graph.add_node(CfNodeKind::Catch, Some(clause.location));
            state.connect(&throwing, node);
            state.frontier = vec![node];
            errors.absorb(self.visit_catch(clause));
            ends.extend(self.take_frontier()?);
        }

        let Some(finally) = finally else {
            return self.set_frontier(ends).and(errors.finish());
        };
        let state = &mut self.flow_mut()?.state;
        let node = state.graph.add_node(CfNodeKind::Finally, Some(finally.location));
        let normal_exit = !ends.is_empty();
        if normal_exit {
            state.connect(&ends, node);
        } else {
            let all: Vec<CfNodeId> = entry.iter().copied().chain((first..state.graph.len() - 1).map(CfNodeId)).collect();
            state.connect(&all, node);
        }
        state.frontier = vec![node];
        errors.absorb(self.visit_block(finally));
        if !normal_exit {
            let tail = self.take_frontier()?;
            let state = &mut self.flow_mut()?.state;
            for node in tail {
                state.terminate(node);
            }
        }
        errors.finish()
    }

    /// catch節：例外変数を専用のブロックに宣言して本体を訪問
    fn visit_catch(&mut self, clause: &CatchClause) -> Result<()> {
        let ty = self.resolve_type(&clause.ty)?;
        self.require_throwable(&ty, clause.ty.location())?;
        let block = self.new_block(clause.location)?;
        let name = clause.name.name.as_str();
        let mut data = VariableData::new(VariableSource::Catch, false);
        data.ty = Some(ty);
        data.eval = Eval::Done;
        data.assigned = 1;
        let path = &self.tree.get(block).path / name;
        let scope = Scope::new(name, path, Some(clause.name.location), ScopeData::Variable(data));
        self.tree
            .add_member(block, name, scope)
            .map_err(|_| CompilerError::internal("catch変数が重複しています"))?;
        self.with_current(block, |this| this.visit_block(&clause.body))
    }
}

fn redundant_loop(location: SourceLocation) -> CompilerError {
    CompilerError::new(
        ErrorKind::RedundantLoop,
        "ループの本体が条件に戻らないため、このループは冗長です",
        Some(location),
    )
}

fn is_literal_true(condition: &Expression) -> bool {
    matches!(condition.kind, ExpressionKind::Literal(Literal::Bool(true)))
}
