use super::*;

fn fixed(separator: &str, chunk_size: usize, chunk_overlap: usize) -> FixedSplitter {
    FixedSplitter::new(separator, chunk_size, chunk_overlap).expect("valid fixed splitter")
}

fn recursive(chunk_size: usize, chunk_overlap: usize) -> RecursiveSplitter {
    RecursiveSplitter::new(
        ChunkingConfig::default().separators,
        chunk_size,
        chunk_overlap,
    )
    .expect("valid recursive splitter")
}

fn texts(chunks: &[Chunk]) -> Vec<&str> {
    chunks.iter().map(|c| c.text.as_str()).collect()
}

/// Rebuild the source from its chunks: skipped separator gaps are taken from
/// the source, carried prefixes are dropped from the chunks.
fn reassemble<'a>(source: &'a str, chunks: &[Chunk]) -> (String, Vec<&'a str>) {
    let mut out = String::new();
    let mut gaps = Vec::new();
    let mut cursor = 0;

    for chunk in chunks {
        assert_eq!(chunk.text, &source[chunk.start..chunk.end]);
        if chunk.start >= cursor {
            assert_eq!(chunk.overlap, 0, "chunk after a gap cannot overlap");
            let gap = &source[cursor..chunk.start];
            gaps.push(gap);
            out.push_str(gap);
        } else {
            assert_eq!(chunk.start + chunk.overlap, cursor);
        }
        out.push_str(chunk.fresh_text());
        cursor = chunk.end;
    }
    let tail = &source[cursor..];
    gaps.push(tail);
    out.push_str(tail);

    (out, gaps)
}

fn sample_texts() -> Vec<String> {
    vec![
        "A\nB\nC\nD".to_string(),
        "The quick brown fox jumps over the lazy dog.\nPack my box with five dozen liquor jugs.\n\nSphinx of black quartz, judge my vow."
            .to_string(),
        "\n\nleading and trailing separators\n\n".to_string(),
        "unbroken_text_without_any_separator_at_all_that_goes_on".to_string(),
        "héllo wörld\nünïcödé lines\n\nçà et là, naïve café".to_string(),
        "line one\nline two\nline three\n".repeat(12),
    ]
}

#[test]
fn fixed_single_character_lines() {
    let chunks = fixed("\n", 2, 0).split("A\nB\nC\nD");
    assert_eq!(texts(&chunks), vec!["A", "B", "C", "D"]);
    assert!(chunks.iter().all(|c| c.overlap == 0 && !c.oversized));
}

#[test]
fn split_text_uses_configured_strategy() {
    let config = ChunkingConfig {
        chunk_size: 2,
        chunk_overlap: 0,
        ..ChunkingConfig::default()
    };
    let chunks = split_text("A\nB\nC\nD", &config).expect("config is valid");
    assert_eq!(texts(&chunks), vec!["A", "B", "C", "D"]);

    let config = ChunkingConfig {
        strategy: SplitterStrategy::Recursive,
        chunk_size: 12,
        chunk_overlap: 0,
        ..ChunkingConfig::default()
    };
    let chunks = split_text("para one.\n\npara two is longer than ten", &config)
        .expect("config is valid");
    assert_eq!(
        texts(&chunks),
        vec!["para one.", "para two is", "longer than", "ten"]
    );
}

#[test]
fn empty_input_yields_no_chunks() {
    assert!(fixed("\n", 10, 2).split("").is_empty());
    assert!(recursive(10, 2).split("").is_empty());
    assert!(fixed("\n", 10, 2).split("\n\n\n").is_empty());
    assert!(recursive(10, 2).split("\n\n \n").is_empty());
}

#[test]
fn separator_only_pieces_are_not_emitted() {
    let chunks = recursive(5, 0).split("Hello\n\n \n\nWorld");
    assert_eq!(texts(&chunks), vec!["Hello", "World"]);

    let chunks = recursive(3, 0).split("one\n\n \n \n\ntwo\n\n\t");
    assert_eq!(texts(&chunks), vec!["one", "two", "\t"]);
    assert!(chunks.iter().all(|c| !c.text.trim_matches([' ', '\n']).is_empty()));
}

#[test]
fn overlap_not_smaller_than_size_is_rejected() {
    for chunk_size in 1..40 {
        for chunk_overlap in chunk_size..chunk_size + 3 {
            for strategy in [SplitterStrategy::Fixed, SplitterStrategy::Recursive] {
                let config = ChunkingConfig {
                    strategy,
                    chunk_size,
                    chunk_overlap,
                    ..ChunkingConfig::default()
                };
                let result = split_text("some text", &config);
                assert!(
                    matches!(result, Err(ConfigError::OverlapTooLarge { .. })),
                    "size {} overlap {} should be rejected",
                    chunk_size,
                    chunk_overlap
                );
            }
        }
    }
}

#[test]
fn invalid_settings_are_rejected() {
    assert!(matches!(
        FixedSplitter::new("\n", 0, 0),
        Err(ConfigError::InvalidChunkSize(0))
    ));
    assert!(matches!(
        FixedSplitter::new("", 10, 0),
        Err(ConfigError::EmptySeparator)
    ));
    assert!(matches!(
        RecursiveSplitter::new(vec!["\n".to_string(), String::new()], 10, 0),
        Err(ConfigError::EmptySeparator)
    ));
    assert!(ChunkingConfig::default().validate().is_ok());
}

#[test]
fn oversized_unit_is_emitted_whole_and_flagged() {
    let chunks = fixed("\n", 10, 0).split("short\nthis line is much too long\nend");

    assert_eq!(
        texts(&chunks),
        vec!["short", "this line is much too long", "end"]
    );
    assert!(!chunks[0].oversized);
    assert!(chunks[1].oversized);
    assert!(!chunks[2].oversized);
}

#[test]
fn overlap_carries_trailing_characters() {
    let chunks = fixed("\n", 9, 2).split("aaaa\nbbbb\ncccc");

    assert_eq!(texts(&chunks), vec!["aaaa\nbbbb", "bb\ncccc"]);
    assert_eq!(chunks[1].overlap, 2);
    assert_eq!(chunks[1].fresh_text(), "\ncccc");
}

#[test]
fn overlap_is_shortened_to_fit() {
    let chunks = fixed("\n", 6, 4).split("abcde\nfg");
    assert_eq!(texts(&chunks), vec!["abcde", "cde\nfg"]);
    assert_eq!(chunks[1].overlap, 3);

    // No room at all for carried text
    let chunks = fixed("\n", 6, 4).split("abc\ndefgh");
    assert_eq!(texts(&chunks), vec!["abc", "defgh"]);
    assert_eq!(chunks[1].overlap, 0);
}

#[test]
fn recursive_hard_splits_unbroken_text() {
    let chunks = recursive(4, 0).split("abcdefghij");
    assert_eq!(texts(&chunks), vec!["abcd", "efgh", "ij"]);
    assert!(chunks.iter().all(|c| !c.oversized));

    let chunks = recursive(4, 1).split("abcdefghij");
    assert_eq!(texts(&chunks), vec!["abcd", "efgh", "hij"]);
    assert_eq!(chunks[2].overlap, 1);
}

#[test]
fn multibyte_text_is_split_on_character_boundaries() {
    let chunks = recursive(5, 0).split("héllo wörld");
    assert_eq!(texts(&chunks), vec!["héllo", "wörld"]);

    let chunks = recursive(2, 0).split("ééééé");
    assert_eq!(texts(&chunks), vec!["éé", "éé", "é"]);
    assert!(chunks.iter().all(|c| c.char_len() <= 2));
}

#[test]
fn chunks_respect_size_and_reassemble_source() {
    for source in sample_texts() {
        for chunk_size in [1, 2, 3, 5, 8, 13, 40, 100, 1000] {
            for chunk_overlap in [0, 1, chunk_size / 2, chunk_size - 1] {
                if chunk_overlap >= chunk_size {
                    continue;
                }

                let splitter = fixed("\n", chunk_size, chunk_overlap);
                let chunks = splitter.split(&source);
                let (rebuilt, gaps) = reassemble(&source, &chunks);
                assert_eq!(rebuilt, source);
                assert!(gaps.iter().all(|gap| gap.replace('\n', "").is_empty()));
                for chunk in &chunks {
                    if chunk.oversized {
                        assert!(!chunk.text.contains('\n'));
                        assert_eq!(chunk.overlap, 0);
                    } else {
                        assert!(chunk.char_len() <= chunk_size);
                    }
                }

                let splitter = recursive(chunk_size, chunk_overlap);
                let chunks = splitter.split(&source);
                let (rebuilt, gaps) = reassemble(&source, &chunks);
                assert_eq!(rebuilt, source);
                assert!(
                    gaps.iter()
                        .all(|gap| gap.chars().all(|c| c == '\n' || c == ' '))
                );
                assert!(
                    chunks
                        .iter()
                        .all(|c| !c.oversized && c.char_len() <= chunk_size)
                );
            }
        }
    }
}

#[test]
fn chunk_order_is_stable() {
    let source = sample_texts().concat();
    let splitter = Splitter::from_config(&ChunkingConfig {
        chunk_size: 30,
        chunk_overlap: 10,
        ..ChunkingConfig::default()
    })
    .expect("valid config");

    let first = splitter.split(&source);
    let second = splitter.split(&source);
    assert_eq!(first, second);
    assert!(first.windows(2).all(|w| w[0].start < w[1].start && w[0].end < w[1].end));
}
