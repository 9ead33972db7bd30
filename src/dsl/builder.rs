use crate::dsl::{BlockKind, BlockNode, Overrides, PromptDocument, WildcardTable};

pub struct PromptBuilder {
    id: String,
    name: String,
    wildcards: WildcardTable,
    blocks: Vec<BlockNode>,
    overrides: Overrides,
}

impl PromptBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            wildcards: WildcardTable::new(),
            blocks: Vec::new(),
            overrides: Overrides::new(),
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn wildcard(mut self, name: &str, values: &[&str]) -> Self {
        self.wildcards
            .insert(name, values.iter().map(|v| v.to_string()).collect());
        self
    }

    /// Adds an independent root.
    pub fn root(mut self, block: BlockBuilder) -> Self {
        self.blocks.push(block.build());
        self
    }

    pub fn content(self, text: &str) -> Self {
        self.root(BlockBuilder::content(text))
    }

    pub fn extension(self, name: &str) -> Self {
        self.root(BlockBuilder::extension(name))
    }

    pub fn pin(mut self, scope: &str, name: &str, value: &str) -> Self {
        self.overrides.pin(scope, name, value);
        self
    }

    pub fn build(self) -> PromptDocument {
        PromptDocument {
            id: self.id,
            name: self.name,
            wildcards: self.wildcards,
            blocks: self.blocks,
            overrides: self.overrides,
        }
    }
}

/// Builds one node and its `after` children.
pub struct BlockBuilder {
    node: BlockNode,
}

impl BlockBuilder {
    pub fn content(text: &str) -> Self {
        Self {
            node: BlockNode::content(text),
        }
    }

    pub fn extension(name: &str) -> Self {
        Self {
            node: BlockNode::extension(name),
        }
    }

    /// Only meaningful on extension references; ignored on content blocks.
    pub fn max_per_bucket(mut self, max: u64) -> Self {
        if let BlockKind::ExtensionRef { max_per_bucket, .. } = &mut self.node.kind {
            *max_per_bucket = Some(max);
        }
        self
    }

    pub fn then(mut self, child: BlockBuilder) -> Self {
        self.node.after.push(child.build());
        self
    }

    pub fn then_content(self, text: &str) -> Self {
        self.then(BlockBuilder::content(text))
    }

    pub fn build(self) -> BlockNode {
        self.node
    }
}
