use kbsearch_core::{DataSource, Provenance, SearchResponse, SearchResult};

/// Prefix of every synthesized snippet.
pub const FALLBACK_MARKER: &str = "[Fallback result: knowledge base unavailable, not authoritative]";

const FALLBACK_SOURCE: &str = "fallback";
const BASE_URL: &str = "https://iec-knowledge.internal";

struct Template {
    kind: &'static str,
    path: &'static str,
    title: &'static str,
    body: &'static str,
}

const TEMPLATES: [Template; 3] = [
    Template {
        kind: "doc",
        path: "doc",
        title: "IEC knowledge base document",
        body: "Internal IEC knowledge base content about \"{q}\". Covers technical specifications, \
               standards documents and implementation guidance, with the related requirements and best practices.",
    },
    Template {
        kind: "std",
        path: "standards",
        title: "Technical standard",
        body: "Detailed provisions of the IEC technical standards on \"{q}\": definitions, test methods, \
               compliance requirements and implementation recommendations.",
    },
    Template {
        kind: "guide",
        path: "guides",
        title: "Implementation guide",
        body: "Implementation guide and operating manual for \"{q}\", with step-by-step instructions, \
               caveats and frequently asked questions.",
    },
];

/// Offline stub generator. The same query always yields the same stubs.
#[derive(Debug, Clone)]
pub struct FallbackSynthesizer {
    cap: usize,
}

impl Default for FallbackSynthesizer {
    fn default() -> Self {
        Self::new(10)
    }
}

impl FallbackSynthesizer {
    pub fn new(cap: usize) -> Self {
        Self { cap: cap.max(1) }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// `min(top_k, cap)` stubs cycling through the document, standard and
    /// guide templates. The response is not marked degraded; callers set the
    /// cause.
    pub fn synthesize(&self, query: &str, top_k: usize) -> SearchResponse {
        let digest = blake3::hash(query.as_bytes());
        let hex = digest.to_hex();
        let mut seed = [0u8; 8];
        seed.copy_from_slice(&digest.as_bytes()[..8]);
        let bucket = u64::from_le_bytes(seed) % 1000;

        let results = (0..top_k.min(self.cap))
            .map(|i| {
                let t = &TEMPLATES[i % TEMPLATES.len()];
                let round = i / TEMPLATES.len();
                let (title, url) = if round == 0 {
                    (format!("{} - {query}", t.title), format!("{BASE_URL}/{}/{bucket}", t.path))
                } else {
                    (
                        format!("{} ({}) - {query}", t.title, round + 1),
                        format!("{BASE_URL}/{}/{bucket}-{}", t.path, round + 1),
                    )
                };
                SearchResult {
                    id: format!("fallback-{}-{}-{i}", &hex.as_str()[..16], t.kind),
                    title,
                    content: format!("{FALLBACK_MARKER} {}", t.body.replace("{q}", query)),
                    source: FALLBACK_SOURCE.to_string(),
                    url: Some(url),
                    page_number: None,
                    similarity_score: None,
                    relevance_score: None,
                    provenance: Provenance::Fallback,
                }
            })
            .collect();
        SearchResponse { data_source: DataSource::KnowledgeBase, results, degraded: None }
    }
}
