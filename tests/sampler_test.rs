use prompt_composer::compiler::codec::compute_total_compositions;
use prompt_composer::dsl::WildcardTable;
use prompt_composer::runtime::sampler::{
    composition_passes_filter, count_filtered_compositions, sample_composition_ids, ValueSelection,
};
use std::collections::{BTreeSet, HashMap, HashSet};

fn mood_pose() -> WildcardTable {
    [
        ("mood", vec!["happy", "sad"]),
        ("pose", vec!["stand", "sit", "run", "jump"]),
    ]
    .into_iter()
    .collect()
}

fn select(pairs: Vec<(&str, Vec<&str>)>) -> ValueSelection {
    pairs
        .into_iter()
        .map(|(name, values)| {
            let allowed: HashSet<String> = values.iter().map(|v| v.to_string()).collect();
            (name.to_string(), allowed)
        })
        .collect()
}

fn brute_force(table: &WildcardTable, selected: &ValueSelection, ext_count: u64) -> u64 {
    let total = compute_total_compositions(ext_count, table.counts()).expect("small space");
    (0..total)
        .filter(|&id| composition_passes_filter(id, ext_count, table, selected))
        .count() as u64
}

#[test]
fn test_small_space_returns_everything() {
    assert_eq!(sample_composition_ids(5, 10, 3), (0..5).collect::<BTreeSet<u64>>());
    assert_eq!(sample_composition_ids(4, 4, 99), (0..4).collect::<BTreeSet<u64>>());
    assert!(sample_composition_ids(0, 4, 7).is_empty());
}

#[test]
fn test_sample_spreads_and_includes_current() {
    let ids = sample_composition_ids(100, 4, 37);
    assert_eq!(ids, BTreeSet::from([0, 25, 37, 50]));

    let wrapped = sample_composition_ids(100, 4, 137);
    assert!(wrapped.contains(&37));
}

#[test]
fn test_sample_is_deterministic() {
    for current in [0u64, 5, 999, 123_456] {
        let first = sample_composition_ids(1_000, 7, current);
        let second = sample_composition_ids(1_000, 7, current);
        assert_eq!(first, second);
        assert!(first.contains(&(current % 1_000)));
        assert!(first.len() <= 7);
    }
}

#[test]
fn test_filter_single_composition() {
    let table = mood_pose();
    let selected = select(vec![("mood", vec!["sad"])]);
    // dims: ext 1, mood 2, pose 4 -> id 5 = sad/sit, id 1 = happy/sit
    assert!(composition_passes_filter(5, 0, &table, &selected));
    assert!(!composition_passes_filter(1, 0, &table, &selected));

    let unknown = select(vec![("nope", vec!["x"])]);
    assert!(composition_passes_filter(1, 0, &table, &unknown));
}

#[test]
fn test_analytic_count_matches_brute_force() {
    let table = mood_pose();
    let cases = vec![
        select(vec![]),
        select(vec![("mood", vec!["sad"])]),
        select(vec![("mood", vec!["sad"]), ("pose", vec!["sit", "run"])]),
        select(vec![("pose", vec!["fly"])]),
        select(vec![("nope", vec!["x"])]),
        select(vec![("mood", vec![])]),
    ];

    for ext_count in [0u64, 1, 3] {
        for selected in &cases {
            let analytic = count_filtered_compositions(&table, selected, ext_count, 0, &HashMap::new())
                .expect("count failed");
            assert_eq!(analytic, brute_force(&table, selected, ext_count), "{:?}", selected);
        }
    }

    let both = select(vec![("mood", vec!["sad"]), ("pose", vec!["sit", "run"])]);
    assert_eq!(count_filtered_compositions(&table, &both, 3, 0, &HashMap::new()), Ok(6));
}

#[test]
fn test_count_with_duplicate_values() {
    let table: WildcardTable = [("c", vec!["a", "a", "b"])].into_iter().collect();
    let selected = select(vec![("c", vec!["a"])]);
    let count = count_filtered_compositions(&table, &selected, 0, 0, &HashMap::new()).expect("count failed");
    assert_eq!(count, 2);
    assert_eq!(count, brute_force(&table, &selected, 0));
}

#[test]
fn test_bucketed_count_tests_bucket_starts() {
    let table = mood_pose();
    let per = HashMap::from([("pose".to_string(), 2u64)]);

    // mood and ext collapse to one bucket; pose buckets start at stand and run
    let run = select(vec![("pose", vec!["run"])]);
    assert_eq!(count_filtered_compositions(&table, &run, 0, 0, &per), Ok(1));

    let sit = select(vec![("pose", vec!["sit"])]);
    assert_eq!(count_filtered_compositions(&table, &sit, 0, 0, &per), Ok(0));

    let all = select(vec![]);
    assert_eq!(count_filtered_compositions(&table, &all, 0, 0, &per), Ok(2));
}
