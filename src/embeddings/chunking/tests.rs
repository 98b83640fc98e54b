use super::*;

fn config(chunk_size: usize, chunk_overlap: usize) -> ChunkingConfig {
    ChunkingConfig {
        chunk_size,
        chunk_overlap,
    }
}

/// Rejoin chunks by dropping the shared prefix of every chunk after the first
fn reassemble(chunks: &[String], overlap: usize) -> String {
    let mut out = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if i == 0 {
            out.push_str(chunk);
        } else {
            out.extend(chunk.chars().skip(overlap));
        }
    }
    out
}

#[test]
fn short_document_is_single_chunk() {
    let text = "In Unity XR Toolkit, the TeleportationProvider is required.";
    let chunks = chunk_text(text, &ChunkingConfig::default()).expect("chunking should succeed");
    assert_eq!(chunks, vec![text.to_string()]);
}

#[test]
fn document_of_exact_size_is_single_chunk() {
    let text = "a".repeat(1000);
    let chunks = chunk_text(&text, &ChunkingConfig::default()).expect("chunking should succeed");
    assert_eq!(chunks.len(), 1);
}

#[test]
fn empty_document_has_no_chunks() {
    let chunks = chunk_text("", &ChunkingConfig::default()).expect("chunking should succeed");
    assert!(chunks.is_empty());
}

#[test]
fn unbroken_text_uses_fixed_windows() {
    let text: String = ('a'..='z').cycle().take(250).collect();
    let chunks = chunk_text(&text, &config(100, 10)).expect("chunking should succeed");

    // 0..100, 90..190, 180..250
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].chars().count(), 100);
    assert_eq!(chunks[1].chars().count(), 100);
    assert_eq!(chunks[2].chars().count(), 70);
    assert_eq!(reassemble(&chunks, 10), text);
}

#[test]
fn consecutive_chunks_share_overlap() {
    let text = "The XR Origin tracks the headset. ".repeat(80);
    let overlap = 25;
    let chunks = chunk_text(&text, &config(200, overlap)).expect("chunking should succeed");
    assert!(chunks.len() > 1);

    for pair in chunks.windows(2) {
        let prev_tail: String = pair[0]
            .chars()
            .skip(pair[0].chars().count() - overlap)
            .collect();
        let next_head: String = pair[1].chars().take(overlap).collect();
        assert_eq!(prev_tail, next_head);
    }
}

#[test]
fn chunking_roundtrip_and_bounds() {
    let samples = [
        "word ".repeat(700),
        "Paragraph one about locomotion.\n\nParagraph two about snap turning.\n".repeat(60),
        "line\n".repeat(333),
        "nospaces".repeat(300),
        "mixed é ü 日本語 text with multibyte characters. ".repeat(50),
    ];
    let configs = [config(1000, 100), config(120, 30), config(64, 0), config(10, 9)];

    for text in &samples {
        for cfg in &configs {
            let chunks = chunk_text(text, cfg).expect("chunking should succeed");
            assert!(
                chunks.iter().all(|c| c.chars().count() <= cfg.chunk_size),
                "chunk exceeded {} chars",
                cfg.chunk_size
            );
            assert_eq!(&reassemble(&chunks, cfg.chunk_overlap), text);
        }
    }
}

#[test]
fn prefers_paragraph_boundaries() {
    let first = "a".repeat(70);
    let second = "b".repeat(70);
    let text = format!("{first}\n\n{second}");
    let chunks = chunk_text(&text, &config(100, 0)).expect("chunking should succeed");

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0], format!("{first}\n\n"));
    assert_eq!(chunks[1], second);
}

#[test]
fn chunk_document_tracks_offsets() {
    let document = Document::new("https://docs.unity3d.com/Manual/xr_input.html", "x".repeat(250));
    let chunks = chunk_document(&document, &config(100, 10)).expect("chunking should succeed");

    let starts: Vec<usize> = chunks.iter().map(|c| c.start).collect();
    assert_eq!(starts, vec![0, 90, 180]);
    assert!(chunks.iter().enumerate().all(|(i, c)| c.chunk_index == i));
    assert!(chunks.iter().all(|c| c.source == document.source));
}

#[test]
fn invalid_config_rejected() {
    assert!(matches!(
        chunk_text("text", &config(0, 0)),
        Err(ConfigError::InvalidChunkSize(0))
    ));
    assert!(matches!(
        chunk_text("text", &config(100, 100)),
        Err(ConfigError::OverlapTooLarge(100, 100))
    ));
}
