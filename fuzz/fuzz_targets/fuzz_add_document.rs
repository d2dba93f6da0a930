#![no_main]

use libfuzzer_sys::fuzz_target;
use newsindex::{Config, DocumentIndex, EmbeddingDimension, Source};

// Arbitrary ids and contents must either be admitted or rejected with a
// validation error, never panic.
fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let mid = text
        .char_indices()
        .nth(text.chars().count() / 3)
        .map_or(text.len(), |(i, _)| i);
    let (id, content) = text.split_at(mid);

    let config = Config {
        embedding_dimension: EmbeddingDimension::Custom(16),
        ..Config::without_streaming()
    };
    let index = DocumentIndex::in_memory(config).unwrap();

    match index.add_document(id, content, Source::Manual) {
        Ok(added) => assert_eq!(added.document.embedding.len(), 16),
        Err(e) => assert!(e.is_validation()),
    }
});
