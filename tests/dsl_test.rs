use prompt_composer::dsl::builder::{BlockBuilder, PromptBuilder};
use prompt_composer::dsl::{
    declared_bucket_max, leaf_paths, referenced_extensions, walk, BlockKind, BlockPath, Overrides,
};
use prompt_composer::CompositionError;

fn p(s: &str) -> BlockPath {
    s.parse().expect("valid path")
}

#[test]
fn test_block_path_parse_and_display() {
    let path: BlockPath = "0.1.0".parse().expect("parse failed");
    assert_eq!(path, BlockPath(vec![0, 1, 0]));
    assert_eq!(path.to_string(), "0.1.0");
    assert_eq!(path.root(), 0);
    assert_eq!(path.depth(), 3);

    for good in ["0", "10", "3.0.12"] {
        let parsed: BlockPath = good.parse().expect("parse failed");
        assert_eq!(parsed.to_string(), good);
    }

    for bad in ["", "*", "0..1", "a.b", "-1", "0.+1", "+0", "01", "1.00", " 1", "٣"] {
        assert_eq!(
            bad.parse::<BlockPath>(),
            Err(CompositionError::InvalidPath(bad.to_string()))
        );
    }
}

#[test]
fn test_build_tree() {
    let doc = PromptBuilder::new("tree")
        .wildcard("x", &["1", "2"])
        .root(
            BlockBuilder::content("root")
                .then(BlockBuilder::extension("style").then_content("deep"))
                .then_content("leaf"),
        )
        .extension("style")
        .root(BlockBuilder::extension("light").max_per_bucket(3))
        .build();

    assert_eq!(doc.id, "tree");
    assert_eq!(doc.blocks.len(), 3);
    assert_eq!(doc.wildcards.get("x").map(|v| v.len()), Some(2));

    let mut order = Vec::new();
    walk(&doc.blocks, |path, _| order.push(path.to_string()));
    assert_eq!(order, vec!["0", "0.0", "0.0.0", "0.1", "1", "2"]);

    assert_eq!(referenced_extensions(&doc.blocks), vec!["style", "light"]);
    assert_eq!(declared_bucket_max(&doc.blocks), Some(3));

    let leaves = leaf_paths(&doc.blocks);
    assert_eq!(leaves, vec![vec![p("0.0.0"), p("0.1")], vec![p("1")], vec![p("2")]]);

    // max_per_bucket is ignored on content blocks
    let content = BlockBuilder::content("x").max_per_bucket(4).build();
    assert!(matches!(content.kind, BlockKind::Content { .. }));
}

#[test]
fn test_override_lookup_precedence() {
    let mut overrides = Overrides::new();
    overrides.pin("*", "mood", "sad");
    overrides.pin("0.1", "mood", "happy");

    assert_eq!(overrides.lookup(&p("0.1"), "mood"), Some("happy"));
    assert_eq!(overrides.lookup(&p("0"), "mood"), Some("sad"));
    assert_eq!(overrides.lookup(&p("0.1"), "pose"), None);
}

#[test]
fn test_overrides_merge_and_keep_malformed_scopes() {
    let mut base = Overrides::new();
    base.pin("*", "mood", "sad");
    base.pin("bogus", "mood", "happy");

    let mut extra = Overrides::new();
    extra.pin("*", "mood", "angry");
    extra.pin("0", "pose", "sit");

    let merged = base.merged_with(&extra);
    assert_eq!(merged.lookup(&p("3"), "mood"), Some("angry"));
    assert_eq!(merged.lookup(&p("0"), "pose"), Some("sit"));
    assert_eq!(merged.malformed_scopes().collect::<Vec<_>>(), vec!["bogus"]);

    let json = serde_json::to_value(&merged).expect("serialize failed");
    assert_eq!(json["*"]["mood"], "angry");
    assert_eq!(json["bogus"]["mood"], "happy");
    assert_eq!(json["0"]["pose"], "sit");
}
