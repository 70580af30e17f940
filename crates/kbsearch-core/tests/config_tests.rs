use std::time::Duration;

use figment::Jail;
use kbsearch_core::config::{mask_secret, EmbeddingConfig, MilvusMetric, Settings, StoreBackend};
use kbsearch_core::Error;

#[test]
fn defaults_select_xinference_and_milvus() {
    Jail::expect_with(|_jail| {
        let cfg = Settings::load().map_err(|e| e.to_string())?.resolve().map_err(|e| e.to_string())?;
        assert_eq!(
            cfg.embedding,
            EmbeddingConfig::Xinference {
                base_url: "http://localhost:9997".into(),
                model: "bge-base-en-v1.5".into(),
                dimension: 768,
            }
        );
        match &cfg.store.backend {
            StoreBackend::Milvus { uri, token, metric, vector_field } => {
                assert_eq!(uri, "http://localhost:19530");
                assert!(token.is_none());
                assert_eq!(*metric, MilvusMetric::L2);
                assert_eq!(vector_field, "embedding");
            }
            other => panic!("unexpected backend {other:?}"),
        }
        assert_eq!(cfg.store.collection, "iec_knowledge_base");
        assert_eq!(cfg.rerank.as_ref().map(|r| r.model.as_str()), Some("bge-reranker-base"));
        assert_eq!(cfg.router.overfetch_factor, 2);
        assert_eq!(cfg.router.overfetch_cap, 20);
        assert_eq!(cfg.router.health_refresh, Some(Duration::from_secs(30)));
        assert_eq!(cfg.retry.max_attempts(), 2);
        Ok(())
    });
}

#[test]
fn environment_overrides_toml() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
            embedding_provider = "hash"
            hash_embedding_dimensions = 64
            vector_store = "lance"
            lance_uri = "indexes/lancedb"
            "#,
        )?;
        jail.set_env("HASH_EMBEDDING_DIMENSIONS", "32");
        jail.set_env("XINFERENCE_RERANK_MODEL", "none");
        jail.set_env("HEALTH_REFRESH_SECS", "0");
        jail.set_env("RETRY_MAX_ATTEMPTS", "1");
        jail.set_env("RETRY_BACKOFF_MS", "50");
        jail.set_env("REQUEST_TIMEOUT_MS", "3000");
        let cfg = Settings::load().map_err(|e| e.to_string())?.resolve().map_err(|e| e.to_string())?;
        assert_eq!(cfg.embedding, EmbeddingConfig::Hash { dimension: 32 });
        assert_eq!(cfg.retry.max_attempts(), 1);
        assert_eq!(cfg.retry.backoff(), Duration::from_millis(50));
        assert_eq!(cfg.retry.attempt_timeout(), Duration::from_secs(3));
        assert_eq!(cfg.store.backend, StoreBackend::Lance { uri: "indexes/lancedb".into() });
        assert!(cfg.rerank.is_none(), "rerank disabled by 'none'");
        assert!(cfg.router.health_refresh.is_none());
        Ok(())
    });
}

#[test]
fn openai_compatible_requires_an_api_key() {
    Jail::expect_with(|jail| {
        jail.set_env("EMBEDDING_PROVIDER", "openai_compatible");
        let settings = Settings::load().map_err(|e| e.to_string())?;
        assert!(matches!(settings.resolve(), Err(Error::Configuration(_))));

        jail.set_env("DASHSCOPE_API_KEY", "sk-dashscope-0123456789");
        let cfg = Settings::load().map_err(|e| e.to_string())?.resolve().map_err(|e| e.to_string())?;
        match cfg.embedding {
            EmbeddingConfig::OpenAiCompatible { api_key, dimension, base_url, .. } => {
                assert_eq!(api_key, "sk-dashscope-0123456789");
                assert_eq!(dimension, 1024);
                assert_eq!(base_url, "https://dashscope.aliyuncs.com/compatible-mode/v1");
            }
            other => panic!("unexpected provider {other:?}"),
        }
        Ok(())
    });
}

#[test]
fn invalid_values_are_configuration_errors() {
    let unknown = Settings { embedding_provider: "word2vec".into(), ..Settings::default() };
    assert!(matches!(unknown.resolve(), Err(Error::Configuration(_))));

    let zero_dim = Settings { xinference_embedding_dimensions: 0, ..Settings::default() };
    assert!(matches!(zero_dim.resolve(), Err(Error::Configuration(_))));

    let bad_metric = Settings { milvus_metric: "hamming".into(), ..Settings::default() };
    assert!(matches!(bad_metric.resolve(), Err(Error::Configuration(_))));

    let bad_store = Settings { vector_store: "faiss".into(), ..Settings::default() };
    assert!(matches!(bad_store.resolve(), Err(Error::Configuration(_))));

    let no_overfetch = Settings { overfetch_factor: 0, ..Settings::default() };
    assert!(matches!(no_overfetch.resolve(), Err(Error::Configuration(_))));
}

#[test]
fn secrets_are_masked() {
    assert_eq!(mask_secret("short"), "***");
    assert_eq!(mask_secret("sk-0123456789abcdef"), "sk-01234...cdef");
}
