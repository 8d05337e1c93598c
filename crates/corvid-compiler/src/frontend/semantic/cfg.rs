//! # 制御フローグラフ
//!
//! 関数本体ごとに構築する軽量な制御フローグラフ（CFG）です。
//! 文の訪問に合わせて「現在到達可能なノード集合」（フロンティア）を
//! 持ち回り、新しい文ノードにはフロンティアのすべてのノードから辺を張ります。
//! フロンティアが空の状態で文を追加しようとすると到達不能コードです。

use std::collections::VecDeque;

use crate::frontend::error::{CompilerError, ErrorKind, Result, SourceLocation};

/// CFGノードID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CfNodeId(pub usize);

/// CFGノードの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CfNodeKind {
    /// 関数の入口
    Start,
    /// 関数の出口（return/throw/yieldと本体末尾が合流する）
    End,
    /// 通常の文
    Statement,
    /// ループ・分岐の条件
    Condition,
    /// do-whileの先頭などの合流点
    Join,
    /// throw文
    Throw,
    /// catch節の入口
    Catch,
    /// finally節の入口
    Finally,
}

/// CFGノード
#[derive(Debug, Clone)]
pub struct CfNode {
    /// 種類
    pub kind: CfNodeKind,
    /// 対応するソース位置
    pub location: Option<SourceLocation>,
    /// 後続ノード
    pub successors: Vec<CfNodeId>,
}

/// 制御フローグラフ
#[derive(Debug, Clone)]
pub struct ControlFlowGraph {
    nodes: Vec<CfNode>,
}

impl ControlFlowGraph {
    /// 入口と出口だけを持つグラフを作成
    pub fn new(location: SourceLocation) -> Self {
        let mut graph = Self { nodes: Vec::new() };
        graph.add_node(CfNodeKind::Start, Some(location));
        graph.add_node(CfNodeKind::End, None);
        graph
    }

    /// 入口ノード
    pub fn start(&self) -> CfNodeId {
        CfNodeId(0)
    }

    /// 出口ノード
    pub fn end(&self) -> CfNodeId {
        CfNodeId(1)
    }

    /// ノードを追加
    pub fn add_node(&mut self, kind: CfNodeKind, location: Option<SourceLocation>) -> CfNodeId {
        self.nodes.push(CfNode {
            kind,
            location,
            successors: Vec::new(),
        });
        CfNodeId(self.nodes.len() - 1)
    }

    /// 辺を追加（重複は無視）
    pub fn add_edge(&mut self, from: CfNodeId, to: CfNodeId) {
        let successors = &mut self.nodes[from.0].successors;
        if !successors.contains(&to) {
            successors.push(to);
        }
    }

    /// ノードを取得
    pub fn node(&self, id: CfNodeId) -> &CfNode {
        &self.nodes[id.0]
    }

    /// ノード数
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// 入口と出口以外のノードがないか
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 2
    }

    /// `from` から `to` へ到達可能か
    pub fn is_reachable(&self, from: CfNodeId, to: CfNodeId) -> bool {
        self.reachable_avoiding(from, to, |_| false)
    }

    /// throwノードを経由せずに入口から出口へ到達可能か
    pub fn end_reachable_without_throw(&self) -> bool {
        self.reachable_avoiding(self.start(), self.end(), |node| node.kind == CfNodeKind::Throw)
    }

    fn reachable_avoiding(&self, from: CfNodeId, to: CfNodeId, avoid: impl Fn(&CfNode) -> bool) -> bool {
        let mut visited = vec![false; self.nodes.len()];
        let mut queue = VecDeque::from([from]);
        while let Some(id) = queue.pop_front() {
            if id == to {
                return true;
            }
            if visited[id.0] || avoid(self.node(id)) {
                continue;
            }
            visited[id.0] = true;
            queue.extend(self.node(id).successors.iter().copied());
        }
        false
    }
}

/// ループごとのcontinue/breakの蓄積
#[derive(Debug, Clone, Default)]
pub struct LoopFrame {
    /// 条件ノード（do-whileでは本体の後で作られる）
    pub condition: Option<CfNodeId>,
    /// continue文のノード
    pub continues: Vec<CfNodeId>,
    /// break文のノード
    pub breaks: Vec<CfNodeId>,
}

/// 関数本体の走査中に持ち回るCFG構築状態
#[derive(Debug, Clone)]
pub struct FlowState {
    /// 構築中のグラフ
    pub graph: ControlFlowGraph,
    /// 現在到達可能なノード集合
    pub frontier: Vec<CfNodeId>,
    /// ループのスタック
    pub loops: Vec<LoopFrame>,
}

impl FlowState {
    /// 新しい構築状態を作成
    pub fn new(location: SourceLocation) -> Self {
        let graph = ControlFlowGraph::new(location);
        let frontier = vec![graph.start()];
        Self {
            graph,
            frontier,
            loops: Vec::new(),
        }
    }

    /// 到達可能な位置にいるか
    pub fn is_reachable(&self) -> bool {
        !self.frontier.is_empty()
    }

    /// フロンティアから新しいノードへ進む
    pub fn step(&mut self, kind: CfNodeKind, location: SourceLocation) -> Result<CfNodeId> {
        if self.frontier.is_empty() {
            return Err(CompilerError::new(ErrorKind::UnreachableCode, "到達不能なコードです", Some(location)).into());
        }
        let node = self.graph.add_node(kind, Some(location));
        let preds = std::mem::take(&mut self.frontier);
        self.connect(&preds, node);
        self.frontier.push(node);
        Ok(node)
    }

    /// 複数のノードから1つのノードへ辺を張る
    pub fn connect(&mut self, preds: &[CfNodeId], node: CfNodeId) {
        for pred in preds {
            self.graph.add_edge(*pred, node);
        }
    }

    /// ノードから出口へ辺を張り、フロンティアを空にする
    pub fn terminate(&mut self, node: CfNodeId) {
        let end = self.graph.end();
        self.graph.add_edge(node, end);
        self.frontier.clear();
    }

    /// 本体末尾のフロンティアを出口に合流させてグラフを返す
    ///
    /// 戻り値の2番目は本体末尾に到達可能だったかどうかです。
    pub fn finish(mut self) -> (ControlFlowGraph, bool) {
        let end = self.graph.end();
        let falls_through = !self.frontier.is_empty();
        for node in std::mem::take(&mut self.frontier) {
            self.graph.add_edge(node, end);
        }
        (self.graph, falls_through)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(line: usize) -> SourceLocation {
        SourceLocation::new(line, 1, 0, 1)
    }

    #[test]
    fn test_step_after_terminate_is_unreachable() {
        let mut flow = FlowState::new(loc(1));
        let ret = flow.step(CfNodeKind::Statement, loc(2)).unwrap();
        flow.terminate(ret);
        let error = flow.step(CfNodeKind::Statement, loc(3)).unwrap_err();
        assert_eq!(error.first().kind, ErrorKind::UnreachableCode);
        assert_eq!(error.first().location.unwrap().line, 3);
    }

    #[test]
    fn test_branch_join() {
        let mut flow = FlowState::new(loc(1));
        let cond = flow.step(CfNodeKind::Condition, loc(2)).unwrap();
        let then = flow.step(CfNodeKind::Statement, loc(3)).unwrap();
        flow.terminate(then);
        flow.frontier = vec![cond];
        flow.step(CfNodeKind::Statement, loc(4)).unwrap();
        let (graph, falls_through) = flow.finish();
        assert!(falls_through);
        assert!(graph.is_reachable(graph.start(), graph.end()));
        assert!(graph.end_reachable_without_throw());
    }

    #[test]
    fn test_throw_only_path() {
        let mut flow = FlowState::new(loc(1));
        let throw = flow.step(CfNodeKind::Throw, loc(2)).unwrap();
        flow.terminate(throw);
        let (graph, falls_through) = flow.finish();
        assert!(!falls_through);
        assert!(graph.is_reachable(graph.start(), graph.end()));
        assert!(!graph.end_reachable_without_throw());
    }
}
