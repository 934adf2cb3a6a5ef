//! Aggregation: join summary fragments into the final report.
//!
//! Fragments are concatenated in chunk order. When section headers are
//! enabled, a `## <section>` line is inserted each time the section label
//! changes. If the joined text exceeds `max_report_chars`, exactly one
//! condensing request is made and its answer becomes the report as-is, even
//! if it is still over the limit.

use crate::document::DocumentMetadata;
use crate::error::SummarizeError;
use crate::output::SummaryFragment;
use crate::pipeline::llm::{GenerationRequest, SummaryClient};
use crate::prompts::{condense_content, CONDENSE_PROMPT};
use tracing::info;

/// The aggregated report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregated {
    pub report: String,
    /// Whether the condensing pass ran.
    pub condensed: bool,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    pub section_headers: bool,
    pub max_report_chars: Option<usize>,
}

impl Aggregator {
    pub fn new(section_headers: bool, max_report_chars: Option<usize>) -> Self {
        Self {
            section_headers,
            max_report_chars,
        }
    }

    /// Concatenate fragments in order, with optional section headers.
    pub fn join(&self, fragments: &[SummaryFragment]) -> String {
        let mut out = String::new();
        let mut current: Option<&str> = None;
        for fragment in fragments {
            if !out.is_empty() {
                out.push('\n');
            }
            let label = fragment.section.as_deref();
            match label {
                Some(l) if self.section_headers && label != current => {
                    out.push_str(&format!("## {l}\n\n"));
                }
                _ => {}
            }
            current = label;
            out.push_str(fragment.text.trim_end());
            out.push('\n');
        }
        out
    }

    /// Join fragments and condense once if the result is too long.
    pub async fn aggregate(
        &self,
        fragments: &[SummaryFragment],
        client: &SummaryClient,
    ) -> Result<Aggregated, SummarizeError> {
        let joined = self.join(fragments);
        let len = joined.chars().count();

        let max = match self.max_report_chars {
            Some(max) if len > max => max,
            _ => {
                return Ok(Aggregated {
                    report: joined,
                    condensed: false,
                    input_tokens: 0,
                    output_tokens: 0,
                })
            }
        };

        info!("Report is {} chars (limit {}), condensing once", len, max);
        let request = GenerationRequest {
            instruction: CONDENSE_PROMPT.to_string(),
            content: condense_content(&joined, max),
            context: None,
        };
        let (generation, _) = client
            .generate("condense", &request)
            .await
            .map_err(|f| SummarizeError::CondenseFailed {
                attempts: f.attempts,
                source: f.failure,
            })?;

        Ok(Aggregated {
            report: generation.text,
            condensed: true,
            input_tokens: generation.input_tokens,
            output_tokens: generation.output_tokens,
        })
    }
}

/// Format document metadata as YAML front matter.
pub fn format_yaml_front_matter(title: &str, meta: &DocumentMetadata, model: Option<&str>) -> String {
    let mut yaml = String::from("---\n");
    yaml.push_str(&format!("title: \"{}\"\n", escape(title)));
    if let Some(ref a) = meta.author {
        yaml.push_str(&format!("author: \"{}\"\n", escape(a)));
    }
    if let Some(ref s) = meta.subject {
        yaml.push_str(&format!("subject: \"{}\"\n", escape(s)));
    }
    if let Some(ref c) = meta.creation_date {
        yaml.push_str(&format!("created: \"{}\"\n", escape(c)));
    }
    yaml.push_str(&format!("pages: {}\n", meta.page_count));
    if let Some(m) = model {
        yaml.push_str(&format!("model: \"{}\"\n", escape(m)));
    }
    yaml.push_str("---\n\n");
    yaml
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use crate::error::ApiFailure;
    use crate::pipeline::llm::{Generation, TextGenerator};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct Fixed {
        answer: Result<String, ApiFailure>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextGenerator for Fixed {
        async fn generate(&self, _r: &GenerationRequest) -> Result<Generation, ApiFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer.clone().map(Generation::text)
        }
    }

    fn client(answer: Result<&str, ApiFailure>) -> (SummaryClient, Arc<Fixed>) {
        let gen = Arc::new(Fixed {
            answer: answer.map(str::to_string),
            calls: AtomicUsize::new(0),
        });
        let client = SummaryClient::new(gen.clone(), RetryPolicy::none(), Duration::from_secs(5));
        (client, gen)
    }

    fn frag(chunk: usize, section: Option<&str>, text: &str) -> SummaryFragment {
        SummaryFragment {
            chunk,
            section: section.map(str::to_string),
            text: text.to_string(),
            input_tokens: 0,
            output_tokens: 0,
            retries: 0,
        }
    }

    #[test]
    fn join_keeps_order_without_headers() {
        let agg = Aggregator::new(false, None);
        let out = agg.join(&[frag(1, Some("A"), "one\n"), frag(2, Some("B"), "two\n")]);
        assert_eq!(out, "one\n\ntwo\n");
    }

    #[test]
    fn join_inserts_header_on_section_change() {
        let agg = Aggregator::new(true, None);
        let out = agg.join(&[
            frag(1, Some("Intro"), "a\n"),
            frag(2, Some("Intro"), "b\n"),
            frag(3, Some("Methods"), "c\n"),
            frag(4, None, "d\n"),
        ]);
        assert_eq!(out, "## Intro\n\na\n\nb\n\n## Methods\n\nc\n\nd\n");
    }

    #[tokio::test]
    async fn short_report_is_not_condensed() {
        let (client, gen) = client(Ok("short"));
        let agg = Aggregator::new(false, Some(1000));
        let out = agg.aggregate(&[frag(1, None, "text\n")], &client).await.unwrap();
        assert_eq!(out.report, "text\n");
        assert!(!out.condensed);
        assert_eq!(gen.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn long_report_is_condensed_exactly_once() {
        // The condensed answer is still over the limit and is kept as-is.
        let (client, gen) = client(Ok("still far too long for the limit"));
        let agg = Aggregator::new(false, Some(10));
        let fragments = vec![frag(1, None, "x".repeat(30).as_str())];
        let out = agg.aggregate(&fragments, &client).await.unwrap();
        assert!(out.condensed);
        assert_eq!(out.report, "still far too long for the limit\n");
        assert_eq!(gen.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn condense_failure_is_reported() {
        let (client, _) = client(Err(ApiFailure::InvalidRequest {
            detail: "too big".into(),
        }));
        let agg = Aggregator::new(false, Some(5));
        let err = agg
            .aggregate(&[frag(1, None, "long enough text")], &client)
            .await
            .unwrap_err();
        assert!(matches!(err, SummarizeError::CondenseFailed { attempts: 1, .. }));
    }

    #[test]
    fn front_matter_escapes_quotes() {
        let meta = DocumentMetadata {
            author: Some("Ann \"A\" Lee".into()),
            page_count: 3,
            ..Default::default()
        };
        let yaml = format_yaml_front_matter("Report", &meta, Some("gemini-2.5-flash"));
        assert!(yaml.starts_with("---\ntitle: \"Report\"\n"));
        assert!(yaml.contains("author: \"Ann \\\"A\\\" Lee\"\n"));
        assert!(yaml.contains("pages: 3\n"));
        assert!(yaml.ends_with("---\n\n"));
    }
}
