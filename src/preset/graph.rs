use super::definition::{BudgetDefinition, PresetDefinition};
use super::error::{PresetError, PresetResult};
use super::id::NodeIndex;
use std::collections::{HashMap, HashSet};

/// Lower dwell bound as a fraction of the expected dwell
pub const BUDGET_LOWER_RATIO: f64 = 0.4;
/// Upper dwell bound as a fraction of the expected dwell
pub const BUDGET_UPPER_RATIO: f64 = 1.6;

/// Resolved dwell budget of a node, in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DwellBudget {
    pub expected: f64,
    pub lower: f64,
    pub upper: f64,
}

impl DwellBudget {
    fn resolve(def: &BudgetDefinition) -> Result<Self, String> {
        if !def.expected.is_finite() || def.expected <= 0.0 {
            return Err(format!("expected dwell {} must be positive", def.expected));
        }
        let lower = def.lower.unwrap_or(def.expected * BUDGET_LOWER_RATIO);
        let upper = def.upper.unwrap_or(def.expected * BUDGET_UPPER_RATIO);
        if !lower.is_finite() || !upper.is_finite() || lower < 0.0 {
            return Err("bounds must be finite and non-negative".to_string());
        }
        if lower > upper {
            return Err(format!("lower bound {} exceeds upper bound {}", lower, upper));
        }
        Ok(Self {
            expected: def.expected,
            lower,
            upper,
        })
    }
}

/// One state of a loaded preset
#[derive(Debug, Clone)]
pub struct Node {
    id: String,
    label: String,
    allowed_next: HashSet<NodeIndex>,
    aliases: Vec<String>,
    budget: Option<DwellBudget>,
}

impl Node {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn allowed_next(&self) -> &HashSet<NodeIndex> {
        &self.allowed_next
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn budget(&self) -> Option<&DwellBudget> {
        self.budget.as_ref()
    }
}

/// Validated, immutable workflow graph
///
/// All nodes are owned by one arena and addressed by [`NodeIndex`]. Cycles and
/// self-loops are ordinary adjacency entries. There is no mutation API: a
/// preset is built once by [`Preset::load`] and shared read-only between
/// sessions.
#[derive(Debug, Clone)]
pub struct Preset {
    id: String,
    name: String,
    nodes: Vec<Node>,
    by_id: HashMap<String, NodeIndex>,
    start: NodeIndex,
    label_map: HashMap<String, NodeIndex>,
    /// Lowercased alias -> node
    aliases: HashMap<String, NodeIndex>,
    fallback_label: Option<String>,
}

impl Preset {
    /// Validate a definition and build the graph.
    ///
    /// Fails when the start node or any successor, label target or fallback
    /// refers to a node that does not exist, when node ids repeat, when two
    /// nodes claim the same alias, or when a dwell budget is malformed.
    pub fn load(def: &PresetDefinition) -> PresetResult<Preset> {
        if def.nodes.is_empty() {
            return Err(PresetError::Empty(def.id.clone()));
        }

        let by_id = Self::index_nodes(def)?;
        let lookup = |node: &str| by_id.get(node).copied();

        let start = lookup(&def.start_node).ok_or_else(|| PresetError::UnknownStartNode {
            preset: def.id.clone(),
            node: def.start_node.clone(),
        })?;

        let mut nodes = Vec::with_capacity(def.nodes.len());
        for node_def in &def.nodes {
            let mut allowed_next = HashSet::with_capacity(node_def.allowed_next.len());
            for next in &node_def.allowed_next {
                let idx = lookup(next).ok_or_else(|| PresetError::UnknownSuccessor {
                    preset: def.id.clone(),
                    from: node_def.id.clone(),
                    to: next.clone(),
                })?;
                allowed_next.insert(idx);
            }

            let budget = node_def
                .budget
                .as_ref()
                .map(DwellBudget::resolve)
                .transpose()
                .map_err(|reason| PresetError::InvalidBudget {
                    preset: def.id.clone(),
                    node: node_def.id.clone(),
                    reason,
                })?;

            nodes.push(Node {
                id: node_def.id.clone(),
                label: if node_def.label.is_empty() {
                    node_def.id.clone()
                } else {
                    node_def.label.clone()
                },
                allowed_next,
                aliases: node_def.aliases.clone(),
                budget,
            });
        }

        let mut label_map = HashMap::with_capacity(def.label_map.len());
        for (label, node) in &def.label_map {
            let idx = lookup(node).ok_or_else(|| PresetError::UnknownLabelTarget {
                preset: def.id.clone(),
                label: label.clone(),
                node: node.clone(),
            })?;
            label_map.insert(label.clone(), idx);
        }

        let aliases = Self::index_aliases(def, &by_id)?;

        let preset = Preset {
            id: def.id.clone(),
            name: if def.name.is_empty() {
                def.id.clone()
            } else {
                def.name.clone()
            },
            nodes,
            by_id,
            start,
            label_map,
            aliases,
            fallback_label: def.fallback_label.clone(),
        };

        if let Some(label) = &preset.fallback_label {
            if preset.resolve_label(label).is_none() {
                return Err(PresetError::UnresolvedFallback {
                    preset: preset.id.clone(),
                    label: label.clone(),
                });
            }
        }

        Ok(preset)
    }

    /// Map node ids to arena indices, rejecting duplicates
    fn index_nodes(def: &PresetDefinition) -> PresetResult<HashMap<String, NodeIndex>> {
        let mut by_id = HashMap::with_capacity(def.nodes.len());
        for (i, node) in def.nodes.iter().enumerate() {
            if by_id.insert(node.id.clone(), NodeIndex(i as u32)).is_some() {
                return Err(PresetError::DuplicateNode {
                    preset: def.id.clone(),
                    node: node.id.clone(),
                });
            }
        }
        Ok(by_id)
    }

    /// Build the case-insensitive alias table
    fn index_aliases(
        def: &PresetDefinition,
        by_id: &HashMap<String, NodeIndex>,
    ) -> PresetResult<HashMap<String, NodeIndex>> {
        let mut aliases: HashMap<String, NodeIndex> = HashMap::new();
        for node in &def.nodes {
            let idx = by_id[&node.id];
            for alias in &node.aliases {
                let key = alias.trim().to_lowercase();
                if key.is_empty() {
                    continue;
                }
                match aliases.get(&key) {
                    Some(&other) if other != idx => {
                        return Err(PresetError::AmbiguousAlias {
                            preset: def.id.clone(),
                            alias: alias.clone(),
                            first: def.nodes[other.index()].id.clone(),
                            second: node.id.clone(),
                        });
                    }
                    _ => {
                        aliases.insert(key, idx);
                    }
                }
            }
        }
        Ok(aliases)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start(&self) -> NodeIndex {
        self.start
    }

    pub fn start_id(&self) -> &str {
        &self.nodes[self.start.index()].id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, idx: NodeIndex) -> Option<&Node> {
        self.nodes.get(idx.index())
    }

    /// Arena index of a node id
    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.by_id.get(id).copied()
    }

    /// Node id for an index issued by this preset
    pub fn node_id(&self, idx: NodeIndex) -> &str {
        self.nodes
            .get(idx.index())
            .map(|n| n.id.as_str())
            .unwrap_or("<invalid>")
    }

    /// Whether `to` may follow `from`. Unknown ids are never allowed.
    pub fn is_transition_allowed(&self, from: &str, to: &str) -> bool {
        match (self.index_of(from), self.index_of(to)) {
            (Some(from), Some(to)) => self.allows(from, to),
            _ => false,
        }
    }

    /// Index-based variant of [`Preset::is_transition_allowed`]
    #[inline]
    pub fn allows(&self, from: NodeIndex, to: NodeIndex) -> bool {
        self.nodes
            .get(from.index())
            .is_some_and(|node| node.allowed_next.contains(&to))
    }

    /// Map a segment label to a node.
    ///
    /// Tries the explicit label map first, then node aliases against the
    /// whole label, then aliases against the leading action word of a
    /// combined `"<action> <object>"` label.
    pub fn resolve_label(&self, label: &str) -> Option<NodeIndex> {
        if let Some(&idx) = self.label_map.get(label) {
            return Some(idx);
        }
        let lowered = label.trim().to_lowercase();
        if let Some(&idx) = self.aliases.get(&lowered) {
            return Some(idx);
        }
        lowered
            .split_whitespace()
            .next()
            .filter(|action| *action != lowered)
            .and_then(|action| self.aliases.get(action).copied())
    }

    pub fn fallback_label(&self) -> Option<&str> {
        self.fallback_label.as_deref()
    }

    /// Node targeted by the fallback label
    pub fn fallback(&self) -> Option<NodeIndex> {
        self.fallback_label
            .as_deref()
            .and_then(|label| self.resolve_label(label))
    }

    /// Nodes that cannot be reached from the start node
    pub fn unreachable_nodes(&self) -> Vec<NodeIndex> {
        let mut reachable = vec![false; self.nodes.len()];
        let mut stack = vec![self.start];
        reachable[self.start.index()] = true;

        while let Some(idx) = stack.pop() {
            for &next in &self.nodes[idx.index()].allowed_next {
                if !reachable[next.index()] {
                    reachable[next.index()] = true;
                    stack.push(next);
                }
            }
        }

        reachable
            .iter()
            .enumerate()
            .filter(|(_, &r)| !r)
            .map(|(i, _)| NodeIndex(i as u32))
            .collect()
    }
}
