// End-to-end retrieval scenarios over an in-memory dictionary.
//
// Covers each input mode, escalation thresholds, ordering across stages and
// deduplication. Every orchestrator here runs with the deadline disabled so
// escalation decisions only depend on result counts.

use std::collections::HashSet;
use std::sync::Arc;

use pinyin_staged::{
    CancelToken, CandidateRecord, Config, DictionaryEntry, Engine, InputMode, MatchKind, MemoryStore, Orchestrator,
    Partition, PrefixTrie, SharedTrie,
};

fn entry(word: &str, romanization: &str, frequency: u32, partition: Partition) -> DictionaryEntry {
    DictionaryEntry::new(word, romanization, frequency, partition)
}

fn config() -> Config {
    Config {
        deadline_ms: 0,
        ..Config::default()
    }
}

fn orchestrator_with(entries: Vec<DictionaryEntry>, config: Config) -> Orchestrator {
    Orchestrator::new(
        Arc::new(MemoryStore::from_entries(entries)),
        SharedTrie::new(),
        Arc::new(config),
    )
    .unwrap()
}

fn orchestrator(entries: Vec<DictionaryEntry>) -> Orchestrator {
    orchestrator_with(entries, config())
}

fn words(records: &[CandidateRecord]) -> Vec<&str> {
    records.iter().map(|r| r.word()).collect()
}

fn query(o: &Orchestrator, input: &str, limit: usize) -> Vec<CandidateRecord> {
    o.query_candidates(input, limit, &CancelToken::new())
}

fn sample() -> Vec<DictionaryEntry> {
    vec![
        entry("我", "wo", 1000, Partition::Chars),
        entry("为", "wei", 800, Partition::Chars),
        entry("网", "wang", 600, Partition::Chars),
        entry("你", "ni", 900, Partition::Chars),
        entry("先", "xian", 500, Partition::Chars),
        entry("想", "xiang", 700, Partition::Chars),
        entry("我们", "wo men", 700, Partition::Base),
        entry("你好", "ni hao", 800, Partition::Base),
        entry("你好吗", "ni hao ma", 300, Partition::Base),
        entry("现在", "xian zai", 650, Partition::Base),
        entry("西安", "xi an", 400, Partition::Base),
        entry("北京", "bei jing", 900, Partition::Base),
    ]
}

#[test]
fn single_letter_returns_chars_by_frequency() {
    let o = orchestrator(sample());
    let out = query(&o, "w", 10);
    assert_eq!(words(&out), vec!["我", "为", "网"]);
    assert!(out.iter().all(|r| r.entry.partition == Partition::Chars));

    let capped = query(&o, "w", 2);
    assert_eq!(words(&capped), vec!["我", "为"]);
}

#[test]
fn exact_syllable_covers_chars_and_words() {
    let o = orchestrator(sample());
    let out = query(&o, "xian", 10);
    let got = words(&out);
    assert_eq!(got[0], "先");
    assert!(got.contains(&"现在"));
    assert!(!got.contains(&"想"), "prefix of a longer syllable is not the same syllable");
    assert!(!got.contains(&"西安"));
}

#[test]
fn pinyin_exact_match_ranks_first() {
    let o = orchestrator(sample());
    let out = query(&o, "nihao", 10);
    assert_eq!(words(&out), vec!["你好", "你好吗"]);
    assert_eq!(out[0].match_kind, MatchKind::Exact);
    assert_eq!(out[1].match_kind, MatchKind::Prefix);
}

#[test]
fn prefix_index_and_store_paths_agree() {
    let store = Arc::new(MemoryStore::from_entries(sample()));
    let trie = PrefixTrie::build_from_store(&*store, 4).unwrap();
    let engine = Engine::with_trie(store.clone(), config(), trie).unwrap();
    assert!(engine.is_index_loaded());
    let plain = orchestrator(sample());

    for input in ["nihao", "xianzai", "beijing", "women"] {
        let indexed: Vec<String> = engine.generate_candidates(input, 10).into_iter().map(|c| c.text).collect();
        let direct: Vec<String> = query(&plain, input, 10).iter().map(|r| r.word().to_string()).collect();
        assert_eq!(indexed, direct, "{input}");
    }
}

// More homophones than the limit, all with one frequency: separately built
// indexes must still pick the same ones.
#[test]
fn separately_built_indexes_answer_alike() {
    let homophones: Vec<DictionaryEntry> = (0..30)
        .map(|i| {
            let rom = if i % 2 == 0 { "ni hao" } else { "ni hao ma" };
            entry(&format!("你好{}", i), rom, 100, Partition::Base)
        })
        .collect();
    let store = Arc::new(MemoryStore::from_entries(homophones));
    let answers: Vec<Vec<String>> = (0..6)
        .map(|i| {
            let trie = PrefixTrie::build_from_store(&*store, 1 + i).unwrap();
            let engine = Engine::with_trie(store.clone(), config(), trie).unwrap();
            engine.generate_candidates("nihao", 6).into_iter().map(|c| c.text).collect()
        })
        .collect();
    assert!(!answers[0].is_empty());
    assert!(answers.iter().all(|a| *a == answers[0]), "{answers:?}");
}

#[test]
fn acronym_exact_initials_beat_fuzzy() {
    let mut cfg = config();
    cfg.acronym_shortcuts.clear();
    let o = orchestrator_with(
        vec![
            entry("北京", "bei jing", 900, Partition::Base),
            entry("阿布吉", "a bu ji", 5000, Partition::Base),
        ],
        cfg,
    );
    let outcome = o.query_with_debug("bj", 10, &CancelToken::new());
    assert_eq!(outcome.mode, Some(InputMode::AcronymLike));
    assert_eq!(words(&outcome.records), vec!["北京", "阿布吉"]);
    assert_eq!(outcome.records[0].stage, 1);
    assert_eq!(outcome.records[1].match_kind, MatchKind::Fuzzy);

    // 北京 came back from the fuzzy stage too; only the Stage 1 copy survives.
    let debug = outcome.debug.unwrap();
    assert_eq!(debug.conflicts.len(), 1);
    assert_eq!(debug.conflicts[0].word, "北京");
}

#[test]
fn shortcuts_fill_in_without_duplicates() {
    let o = orchestrator(vec![entry("北京", "bei jing", 900, Partition::Base)]);
    let out = query(&o, "bj", 10);
    let got = words(&out);
    assert_eq!(got.iter().filter(|w| **w == "北京").count(), 1);
    assert!(got.contains(&"宝鸡"));
    assert!(got.contains(&"边界"));
    assert!(out.iter().filter(|r| r.word() != "北京").all(|r| r.entry.synthetic));
}

// The real entry for a shortcut word only shows up in Stage 2 here.
#[test]
fn shortcut_word_found_later_appears_once() {
    let o = orchestrator(vec![
        entry("边境", "bian jing", 200, Partition::Base),
        entry("北京", "bei jing", 300, Partition::Correlation),
    ]);
    let outcome = o.query_with_debug("bj", 10, &CancelToken::new());
    let got = words(&outcome.records);
    assert_eq!(got.iter().filter(|w| **w == "北京").count(), 1, "{got:?}");
    let beijing = outcome.records.iter().find(|r| r.word() == "北京").unwrap();
    assert!(!beijing.entry.synthetic);
    assert_eq!(beijing.entry.partition, Partition::Correlation);
    assert!(got.contains(&"宝鸡"));

    let debug = outcome.debug.unwrap();
    assert!(debug.conflicts.iter().any(|c| c.word == "北京" && c.kept == Partition::Correlation));
}

fn bjdx_dictionary() -> Vec<DictionaryEntry> {
    vec![
        entry("北京大学", "bei jing da xue", 900, Partition::Base),
        entry("经典", "jing dian", 500, Partition::Correlation),
        entry("大学生", "da xue sheng", 400, Partition::Associational),
        entry("北京", "bei jing", 300, Partition::Correlation),
        entry("兄弟", "xiong di", 800, Partition::Correlation),
        entry("金大侠", "jin da xia", 200, Partition::People),
        entry("京大", "jing da xue", 950, Partition::Place),
        entry("北京东", "bei jing dong", 700, Partition::Place),
    ]
}

fn stage_of(records: &[CandidateRecord], word: &str) -> Option<u8> {
    records.iter().find(|r| r.word() == word).map(|r| r.stage)
}

// Every adjacent letter pair of a longer acronym is looked up in Stage 2,
// then the three trailing letters in the domain partitions.
#[test]
fn long_acronym_windows_and_tail() {
    let mut cfg = config();
    cfg.acronym_shortcuts.clear();
    let o = orchestrator_with(bjdx_dictionary(), cfg);
    let out = query(&o, "bjdx", 10);

    assert_eq!(stage_of(&out, "北京大学"), Some(1));
    // Windows "bj", "jd" and "dx"; the last one fills by prefix.
    assert_eq!(stage_of(&out, "北京"), Some(2));
    assert_eq!(stage_of(&out, "经典"), Some(2));
    assert_eq!(stage_of(&out, "大学生"), Some(2));
    // "xd" is not a window of the input.
    assert_eq!(stage_of(&out, "兄弟"), None);

    // Tail "jdx": only words of at least three characters.
    assert_eq!(stage_of(&out, "金大侠"), Some(3));
    assert_eq!(stage_of(&out, "京大"), None);
    // Leading letters are not part of the tail.
    assert_eq!(stage_of(&out, "北京东"), None);
    assert_eq!(out.len(), 5);
}

#[test]
fn tail_window_skipped_once_enough_results() {
    let mut cfg = config();
    cfg.acronym_shortcuts.clear();
    let mut dictionary = bjdx_dictionary();
    dictionary.push(entry("大小", "da xiao", 100, Partition::Associational));
    let o = orchestrator_with(dictionary, cfg);
    let out = query(&o, "bjdx", 10);
    assert_eq!(out.len(), 5);
    assert!(out.iter().all(|r| r.stage <= 2));
    assert_eq!(stage_of(&out, "金大侠"), None);
}

#[test]
fn forced_acronym_prefix_matches_plain_acronym() {
    let o = orchestrator(sample());
    assert_eq!(words(&query(&o, "abbr:bj", 10)), words(&query(&o, "bj", 10)));
    assert_eq!(o.classify("an").mode, InputMode::ExactSyllable);
    assert_eq!(o.classify("abbr:an").mode, InputMode::AcronymLike);
}

#[test]
fn empty_and_zero_limit_inputs() {
    let o = orchestrator(sample());
    assert!(query(&o, "", 10).is_empty());
    assert!(query(&o, "   ", 10).is_empty());
    assert!(query(&o, "nihao", 0).is_empty());
    assert!(query(&o, "abbr:", 10).is_empty());
}

#[test]
fn results_are_unique_by_word_and_romanization() {
    let mut entries = sample();
    entries.push(entry("北京", "bei jing", 120, Partition::Correlation));
    entries.push(entry("北京", "bei jing", 50, Partition::Place));
    entries.push(entry("你好", "ni hao", 40, Partition::Correlation));
    let o = orchestrator(entries);

    for input in ["bj", "beijing", "nihao", "n", "ni"] {
        let out = query(&o, input, 20);
        let mut seen = HashSet::new();
        for r in &out {
            assert!(
                seen.insert((r.word().to_string(), r.entry.romanization.clone())),
                "{input}: duplicate {}",
                r.word()
            );
        }
    }
}

#[test]
fn pinyin_stage_two_skipped_when_primary_is_full() {
    let mut entries: Vec<DictionaryEntry> = (0..12)
        .map(|i| entry(&format!("你好{}", i), "ni hao", 100 + i, Partition::Base))
        .collect();
    entries.push(entry("你好啊", "ni hao a", 900, Partition::Correlation));
    let o = orchestrator(entries);

    let outcome = o.query_with_debug("nihao", 40, &CancelToken::new());
    let stages: Vec<u8> = outcome.debug.unwrap().stages.iter().map(|s| s.stage).collect();
    assert_eq!(stages, vec![1]);
    assert!(!words(&outcome.records).contains(&"你好啊"));
}

#[test]
fn pinyin_escalates_through_all_stages_when_starved() {
    let o = orchestrator(vec![
        entry("你好", "ni hao", 800, Partition::Base),
        entry("你好啊", "ni hao a", 900, Partition::Correlation),
        entry("尼好", "ni hao", 700, Partition::Place),
        entry("尼好镇", "ni hao zhen", 60, Partition::Place),
        entry("你号", "ni hao", 30, Partition::Corrections),
    ]);
    let outcome = o.query_with_debug("nihao", 20, &CancelToken::new());
    let debug = outcome.debug.unwrap();
    let stages: Vec<u8> = debug.stages.iter().map(|s| s.stage).collect();
    assert_eq!(stages, vec![1, 2, 3, 4]);

    let got = words(&outcome.records);
    assert_eq!(got, vec!["你好", "你好啊", "尼好镇", "你号"]);
    assert!(!got.contains(&"尼好"), "domain stage keeps only long words");
}

#[test]
fn stage_order_is_monotonic() {
    let o = orchestrator(vec![
        entry("你好", "ni hao", 10, Partition::Base),
        entry("你好啊", "ni hao a", 9000, Partition::Correlation),
        entry("你号", "ni hao", 8000, Partition::Corrections),
    ]);
    let out = query(&o, "nihao", 20);
    let stages: Vec<u8> = out.iter().map(|r| r.stage).collect();
    let mut sorted = stages.clone();
    sorted.sort_unstable();
    assert_eq!(stages, sorted);
    assert_eq!(out[0].word(), "你好");
}

#[test]
fn fallback_skipped_for_long_inputs() {
    let o = orchestrator(vec![
        entry("中华人", "zhong hua ren", 10, Partition::Compatible),
        entry("中华人民", "zhong hua ren min", 10, Partition::Compatible),
    ]);
    assert_eq!(words(&query(&o, "zhonghuaren", 10)), vec!["中华人", "中华人民"]);
    assert!(query(&o, "zhonghuarenmin", 10).is_empty());
}

#[test]
fn v_spelling_reaches_umlaut_entries() {
    let o = orchestrator(vec![
        entry("绿", "lü", 500, Partition::Chars),
        entry("绿色", "lü se", 400, Partition::Base),
        entry("女孩", "nü hai", 300, Partition::Base),
    ]);
    assert_eq!(words(&query(&o, "lv", 10))[0], "绿");
    assert_eq!(words(&query(&o, "lvse", 10)), vec!["绿色"]);
    assert_eq!(words(&query(&o, "nvhai", 10)), vec!["女孩"]);
}

#[test]
fn unclassifiable_input_uses_prefix_index() {
    let entries = vec![entry("中华人民共和国", "zhong hua ren min gong he guo", 500, Partition::Base)];
    let store = Arc::new(MemoryStore::from_entries(entries.clone()));
    let trie = PrefixTrie::build_from_store(&*store, 16).unwrap();
    let engine = Engine::with_trie(store, config(), trie).unwrap();

    let outcome = engine.query("zhonghuarenmingongh", 10, &CancelToken::new());
    assert_eq!(outcome.mode, Some(InputMode::Unclassifiable));
    assert_eq!(words(&outcome.records), vec!["中华人民共和国"]);

    let cold = orchestrator(entries);
    assert!(query(&cold, "zhonghuarenmingongh", 10).is_empty());
}

#[test]
fn repeated_queries_are_deterministic() {
    let o = orchestrator(sample());
    let first: Vec<Vec<String>> = ["w", "nihao", "bj", "xian"]
        .iter()
        .map(|i| query(&o, i, 10).iter().map(|r| r.word().to_string()).collect())
        .collect();
    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..10 {
                    let again: Vec<Vec<String>> = ["w", "nihao", "bj", "xian"]
                        .iter()
                        .map(|i| query(&o, i, 10).iter().map(|r| r.word().to_string()).collect())
                        .collect();
                    assert_eq!(again, first);
                }
            });
        }
    });
}

#[test]
fn explain_json_is_well_formed() {
    let engine = Engine::with_trie(
        Arc::new(MemoryStore::from_entries(sample())),
        config(),
        PrefixTrie::new(),
    )
    .unwrap();
    let ex = engine.explain("nihao", 5);
    let json = ex.debug.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["input"], "nihao");
    assert_eq!(value["mode"], "segmentable_multi_syllable");
    assert_eq!(value["segmentation"][0], "ni");
    assert_eq!(value["top"][0]["word"], "你好");
    assert_eq!(value["stages"][0]["stage"], 1);
}
