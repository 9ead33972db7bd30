use prompt_composer::dsl::builder::{BlockBuilder, PromptBuilder};
use prompt_composer::dsl::{BlockPath, ExtensionData, ExtensionTable, Overrides, WildcardTable};
use prompt_composer::runtime::resolver::{resolve_tree, Diagnostic};
use prompt_composer::runtime::text;

fn p(s: &str) -> BlockPath {
    s.parse().expect("valid path")
}

#[test]
fn test_child_accumulates_parent_text() {
    let doc = PromptBuilder::new("nested")
        .wildcard("x", &["1", "2"])
        .root(BlockBuilder::content("A __x__").then_content("B __x__"))
        .build();

    let resolved = resolve_tree(&doc.blocks, &doc.wildcards, &ExtensionTable::new(), 0, &Overrides::new());

    let root = resolved.get(&p("0")).expect("root resolved");
    assert_eq!(root.plain_text, "A 1");
    assert_eq!(root.accumulated_text, "A 1");
    assert_eq!(root.parent_accumulated_text, "");

    let child = resolved.get(&p("0.0")).expect("child resolved");
    assert_eq!(child.plain_text, "B 1");
    assert_eq!(child.parent_accumulated_text, "A 1");
    assert_eq!(child.accumulated_text, "A 1 B 1");
    assert!(resolved.diagnostics.is_empty());
}

#[test]
fn test_mood_pose_resolution() {
    let doc = PromptBuilder::new("mood-pose")
        .wildcard("mood", &["happy", "sad"])
        .wildcard("pose", &["stand", "sit", "run", "jump"])
        .content("__mood__ __pose__")
        .build();

    let first = resolve_tree(&doc.blocks, &doc.wildcards, &ExtensionTable::new(), 0, &Overrides::new());
    assert_eq!(first.accumulated(&p("0")), Some("happy stand"));

    let fifth = resolve_tree(&doc.blocks, &doc.wildcards, &ExtensionTable::new(), 5, &Overrides::new());
    assert_eq!(fifth.accumulated(&p("0")), Some("sad sit"));
}

#[test]
fn test_extension_text_uses_ext_index() {
    let doc = PromptBuilder::new("ext").extension("theme/a").build();
    let mut extensions = ExtensionTable::new();
    extensions.insert("theme/a", ExtensionData::with_values(vec!["X", "Y", "Z"]));

    let resolved = resolve_tree(&doc.blocks, &doc.wildcards, &extensions, 4, &Overrides::new());
    assert_eq!(resolved.ext_index, 1);
    assert_eq!(resolved.accumulated(&p("0")), Some("Y"));
}

#[test]
fn test_ext_index_shared_across_extension_blocks() {
    // Two extensions: ext_text size is 3 + 2 = 5
    let doc = PromptBuilder::new("ext-shared")
        .extension("a")
        .extension("b")
        .root(BlockBuilder::extension("a"))
        .build();
    let mut extensions = ExtensionTable::new();
    extensions.insert("a", ExtensionData::with_values(vec!["a0", "a1", "a2"]));
    extensions.insert("b", ExtensionData::with_values(vec!["b0", "b1"]));

    let resolved = resolve_tree(&doc.blocks, &doc.wildcards, &extensions, 4, &Overrides::new());
    assert_eq!(resolved.ext_index, 4);
    assert_eq!(resolved.accumulated(&p("0")), Some("a1"));
    assert_eq!(resolved.accumulated(&p("1")), Some("b0"));
    assert_eq!(resolved.accumulated(&p("2")), Some("a1"));
}

#[test]
fn test_extension_wildcards_fill_gaps_only() {
    let doc = PromptBuilder::new("merge")
        .wildcard("x", &["a"])
        .extension("e")
        .build();
    let mut extensions = ExtensionTable::new();
    extensions.insert(
        "e",
        ExtensionData::with_values(vec!["__x__ __y__"])
            .wildcard("x", &["b"])
            .wildcard("y", &["c", "d"]),
    );

    // dims: ext 1, x 1, y 2
    let resolved = resolve_tree(&doc.blocks, &doc.wildcards, &extensions, 1, &Overrides::new());
    assert_eq!(resolved.accumulated(&p("0")), Some("a d"));
}

#[test]
fn test_block_override_beats_global_override() {
    let doc = PromptBuilder::new("pins")
        .wildcard("x", &["1", "2", "3"])
        .root(BlockBuilder::content("__x__").then_content("__x__"))
        .build();

    let mut overrides = Overrides::new();
    overrides.pin("*", "x", "2");
    overrides.pin("0.0", "x", "3");

    let resolved = resolve_tree(&doc.blocks, &doc.wildcards, &ExtensionTable::new(), 0, &overrides);

    let root = resolved.get(&p("0")).expect("root resolved");
    assert_eq!(root.plain_text, "2");
    assert!(root.choices[0].is_override);
    assert_eq!(root.choices[0].index, 1);

    let child = resolved.get(&p("0.0")).expect("child resolved");
    assert_eq!(child.plain_text, "3");
    assert_eq!(child.choices[0].index, 2);
    assert_eq!(child.accumulated_text, "2 3");
}

#[test]
fn test_override_value_outside_table() {
    let doc = PromptBuilder::new("free-pin")
        .wildcard("x", &["1", "2"])
        .content("__x__")
        .build();
    let mut overrides = Overrides::new();
    overrides.pin_global("x", "custom");

    let resolved = resolve_tree(&doc.blocks, &doc.wildcards, &ExtensionTable::new(), 1, &overrides);
    let root = resolved.get(&p("0")).expect("root resolved");
    assert_eq!(root.plain_text, "custom");
    assert_eq!(root.choices[0].index, 0);
    // Dropdowns stay unrestricted
    assert_eq!(root.dropdowns[0].available_values, vec!["1", "2"]);
}

#[test]
fn test_unknown_wildcard_left_verbatim() {
    let doc = PromptBuilder::new("unknown").content("hi __nope__").build();
    let resolved = resolve_tree(&doc.blocks, &WildcardTable::new(), &ExtensionTable::new(), 3, &Overrides::new());

    assert_eq!(resolved.accumulated(&p("0")), Some("hi __nope__"));
    assert!(resolved.diagnostics.contains(&Diagnostic::UnknownWildcard {
        path: p("0"),
        name: "nope".to_string(),
    }));
}

#[test]
fn test_empty_and_missing_extensions_render_placeholders() {
    let doc = PromptBuilder::new("broken")
        .extension("empty")
        .extension("gone")
        .content("still here")
        .build();
    let mut extensions = ExtensionTable::new();
    extensions.insert("empty", ExtensionData::default());

    let resolved = resolve_tree(&doc.blocks, &doc.wildcards, &extensions, 0, &Overrides::new());

    assert_eq!(resolved.accumulated(&p("0")), Some("[empty extension: empty]"));
    assert_eq!(resolved.accumulated(&p("1")), Some("[missing extension: gone]"));
    assert_eq!(resolved.accumulated(&p("2")), Some("still here"));
    assert!(resolved.diagnostics.contains(&Diagnostic::EmptyExtension { name: "empty".to_string() }));
    assert!(resolved.diagnostics.contains(&Diagnostic::MissingExtension { name: "gone".to_string() }));
}

#[test]
fn test_markers_and_dropdowns() {
    let doc = PromptBuilder::new("markers")
        .wildcard("a", &["p", "q"])
        .wildcard("b", &["r", "s"])
        .content("__b__ __a__ __b__")
        .build();

    // dims: ext 1, a 2, b 2 -> id 3 picks a=1, b=1
    let resolved = resolve_tree(&doc.blocks, &doc.wildcards, &ExtensionTable::new(), 3, &Overrides::new());
    let root = resolved.get(&p("0")).expect("root resolved");

    assert_eq!(root.plain_text, "s q s");
    assert_eq!(root.marked_text, "«b=s» «a=q» «b=s»");
    assert_eq!(text::strip_markers(&root.marked_text), root.plain_text);

    let choice_names: Vec<&str> = root.choices.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(choice_names, vec!["b", "a"]);

    let dropdown_names: Vec<&str> = root.dropdowns.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(dropdown_names, vec!["a", "b"]);
    assert_eq!(root.dropdowns[0].chosen_index, 1);
    assert_eq!(root.dropdowns[1].available_values, vec!["r", "s"]);
}

#[test]
fn test_marker_values_with_marker_characters() {
    let doc = PromptBuilder::new("quoted")
        .wildcard("q", &["«fancy» a=b \\ end"])
        .content("say __q__!")
        .build();

    let resolved = resolve_tree(&doc.blocks, &doc.wildcards, &ExtensionTable::new(), 0, &Overrides::new());
    let root = resolved.get(&p("0")).expect("root resolved");

    assert_eq!(root.plain_text, "say «fancy» a=b \\ end!");
    assert_eq!(root.marked_text, "say «q=\\«fancy\\» a=b \\\\ end»!");
    assert_eq!(text::strip_markers(&root.marked_text), root.plain_text);
    assert_eq!(text::strip_markers("open «q=never closed"), "open «q=never closed");
}

#[test]
fn test_override_diagnostics() {
    let doc = PromptBuilder::new("diag")
        .wildcard("x", &["1"])
        .content("__x__")
        .build();
    let mut overrides = Overrides::new();
    overrides.pin("4.2", "x", "1");
    overrides.pin("not-a-path", "x", "1");

    let resolved = resolve_tree(&doc.blocks, &doc.wildcards, &ExtensionTable::new(), 0, &overrides);
    assert_eq!(resolved.accumulated(&p("0")), Some("1"));
    assert!(resolved.diagnostics.contains(&Diagnostic::UnmatchedOverride { scope: "4.2".to_string() }));
    assert!(resolved.diagnostics.contains(&Diagnostic::MalformedOverridePath {
        scope: "not-a-path".to_string()
    }));
}

#[test]
fn test_join_rule() {
    assert_eq!(text::join("", "x"), "x");
    assert_eq!(text::join("x", ""), "x");
    assert_eq!(text::join("", ""), "");
    assert_eq!(text::join("a", "b"), "a b");
    assert_eq!(text::join("a,", "b"), "a,b");
    assert_eq!(text::join("a", " b"), "a b");
    assert_eq!(text::join("a\n", "b"), "a\nb");
    assert_eq!(text::join("a", "\tb"), "a\tb");
}

#[test]
fn test_scan_tokens() {
    assert_eq!(text::token_names("__a__ and __b_c__ and __a__"), vec!["a", "b_c"]);
    assert!(text::token_names("no tokens _here_").is_empty());
    assert!(text::token_names("__ __").is_empty());
    assert_eq!(text::token_names("__style/hair__"), vec!["style/hair"]);
}
