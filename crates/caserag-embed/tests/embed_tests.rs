use caserag_core::traits::Embedder;
use caserag_core::types::Category;
use caserag_embed::{hashing_service, HashEmbedder};

#[test]
fn embed_batch_is_deterministic_and_dimension_stable() {
    let embedder = HashEmbedder::new(64);
    let texts = vec![
        "public void call() { child.run(); }".to_string(),
        "Forwards every call to the child.".to_string(),
    ];

    let a = embedder.embed_batch(&texts).expect("embed");
    let b = embedder.embed_batch(&texts).expect("embed again");

    assert_eq!(a.len(), 2, "one vector per input text");
    assert_eq!(a, b, "same input must produce the same vectors");
    for v in &a {
        assert_eq!(v.len(), embedder.dim());
    }
}

#[test]
fn vectors_are_unit_length_for_non_empty_text() {
    let embedder = HashEmbedder::new(32);
    let out = embedder
        .embed_batch(&["class Client extends Base {}".to_string()])
        .expect("embed");
    let norm: f32 = out[0].iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-3, "norm was {}", norm);
}

#[test]
fn distinct_texts_produce_distinct_vectors() {
    let embedder = HashEmbedder::new(128);
    let out = embedder
        .embed_batch(&[
            "alpha bravo charlie".to_string(),
            "delta echo foxtrot".to_string(),
        ])
        .expect("embed");
    assert_ne!(out[0], out[1]);
}

#[test]
fn service_keeps_one_dimension_per_category() {
    let service = hashing_service(256, 384);
    assert_eq!(service.dim(Category::Code), 256);
    assert_eq!(service.dim(Category::Text), 384);

    let code = service
        .embed_batch(Category::Code, &["int x = 1;".to_string()])
        .expect("code embed");
    let text = service
        .embed_batch(Category::Text, &["increments a counter".to_string()])
        .expect("text embed");
    assert_eq!(code[0].len(), 256);
    assert_eq!(text[0].len(), 384);
}
