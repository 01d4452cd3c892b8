use candle_core::{DType, Device, Tensor};
use citerag_core::config::{EmbeddingBackend, EmbeddingSettings};
use citerag_core::traits::Embedder;
use citerag_embed::{get_default_embedder, masked_mean_l2, HashEmbedder};

fn cosine(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }

#[test]
fn hash_embedder_shapes_and_determinism() {
    let settings = EmbeddingSettings { backend: EmbeddingBackend::Hash, dim: 64, ..EmbeddingSettings::default() };
    let embedder = get_default_embedder(&settings).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let (v1, v2) = (&embs[0], &embs[1]);

    assert_eq!(v1.len(), 64);
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");
    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn hash_embedder_prefers_overlapping_text() {
    let e = HashEmbedder::new(256);
    let q = e.embed("swc minify options").unwrap();
    let near = e.embed("configure swc minify options here").unwrap();
    let far = e.embed("slack thread about lunch").unwrap();
    assert!(cosine(&q, &near) > cosine(&q, &far));
}

#[test]
fn empty_text_embeds_to_zero_vector() {
    let v = HashEmbedder::new(8).embed("").unwrap();
    assert!(v.iter().all(|&x| x == 0.0));
}

#[test]
fn missing_model_dir_is_an_error() {
    std::env::remove_var("APP_MODEL_DIR");
    let settings = EmbeddingSettings { backend: EmbeddingBackend::Candle, model_dir: "/nonexistent/model".into(), ..EmbeddingSettings::default() };
    assert!(get_default_embedder(&settings).is_err());
}

#[test]
fn masked_mean_l2_basic() {
    let dev = Device::Cpu;
    // Two tokens with hidden dim 4; second token is masked out.
    let h = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0,  // token 0
                                 5.0, 6.0, 7.0, 8.0],    // token 1
                               (1, 2, 4), &dev).unwrap();
    let mask = Tensor::from_slice(&[1u32, 0u32], (1, 2), &dev).unwrap().to_dtype(DType::F32).unwrap();
    let out = masked_mean_l2(&h, &mask).unwrap();
    let v: Vec<Vec<f32>> = out.to_vec2().unwrap();
    let norm: f32 = (1.0f32 + 4.0 + 9.0 + 16.0).sqrt();
    let expected = [1.0 / norm, 2.0 / norm, 3.0 / norm, 4.0 / norm];
    for (a, b) in v[0].iter().copied().zip(expected) {
        assert!((a - b).abs() < 1e-5, "a={a} b={b}");
    }
}
