//! Arena tree of schema variants along an instance position.
use crate::pointer::PointerPosition;
use crate::schema::Schema;
use crate::variants::operation::{Operation, ResolveState};

/// Index of a node inside its [`VariantsTree`].
pub type NodeId = usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mark {
    Schema,
    /// Anything goes here.
    Any,
    /// Nothing may appear here.
    Nothing,
}

#[derive(Clone, Debug)]
pub struct TreeNode {
    pub parent: Option<NodeId>,
    pub schema: Option<Schema>,
    pub mark: Mark,
    /// One-of group this alternative belongs to, unique within the tree.
    pub excluding_group: Option<usize>,
    pub state: ResolveState,
    /// Remaining steps below this node.
    pub position: PointerPosition,
    pub children: Vec<NodeId>,
}

impl TreeNode {
    pub fn is_any(&self) -> bool {
        self.mark == Mark::Any
    }

    pub fn is_nothing(&self) -> bool {
        self.mark == Mark::Nothing
    }
}

#[derive(Clone, Debug)]
pub struct VariantsTree {
    nodes: Vec<TreeNode>,
    next_group: usize,
}

impl VariantsTree {
    pub(crate) fn new(root: Schema) -> Self {
        let node = TreeNode {
            parent: None,
            schema: Some(root),
            mark: Mark::Schema,
            excluding_group: None,
            state: ResolveState::Normal,
            position: PointerPosition::new(),
            children: Vec::new(),
        };
        Self { nodes: vec![node], next_group: 0 }
    }

    pub const ROOT: NodeId = 0;

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut TreeNode {
        &mut self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push_child(&mut self, parent: NodeId, schema: Option<Schema>, mark: Mark) -> NodeId {
        // children sit one step below their parent
        let position = self.nodes[parent].position.skip(1).unwrap_or_default();
        let id = self.nodes.len();
        self.nodes.push(TreeNode {
            parent: Some(parent),
            schema,
            mark,
            excluding_group: None,
            state: ResolveState::Normal,
            position,
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        id
    }

    pub(crate) fn any_child(&mut self, parent: NodeId) {
        self.push_child(parent, None, Mark::Any);
    }

    pub(crate) fn nothing_child(&mut self, parent: NodeId) {
        self.push_child(parent, None, Mark::Nothing);
    }

    pub(crate) fn schema_child(&mut self, parent: NodeId, schema: Schema) -> NodeId {
        self.push_child(parent, Some(schema), Mark::Schema)
    }

    /// Attach the outcome of a composition operation below `parent`.
    pub(crate) fn children_from_operation(&mut self, parent: NodeId, operation: Operation) {
        if operation.state != ResolveState::Normal {
            let id = self.push_child(parent, None, Mark::Schema);
            self.nodes[id].state = operation.state;
            return;
        }
        for schema in operation.any_of {
            self.schema_child(parent, schema);
        }
        for group in operation.one_of {
            let number = self.next_group;
            self.next_group += 1;
            for schema in group {
                let id = self.schema_child(parent, schema);
                self.nodes[id].excluding_group = Some(number);
            }
        }
    }

    /// Leaves in breadth-first order, skipping `nothing` and unresolved ones.
    pub fn leaves(&self) -> impl Iterator<Item = NodeId> + '_ {
        let mut queue: std::collections::VecDeque<NodeId> = self.nodes[Self::ROOT].children.iter().copied().collect();
        std::iter::from_fn(move || {
            while let Some(id) = queue.pop_front() {
                let node = &self.nodes[id];
                if !node.children.is_empty() {
                    queue.extend(node.children.iter().copied());
                    continue;
                }
                if !node.is_nothing() && node.state == ResolveState::Normal {
                    return Some(id);
                }
            }
            None
        })
    }
}
