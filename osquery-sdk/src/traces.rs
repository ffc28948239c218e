//! Pluggable span sink for instrumenting SDK calls.
//!
//! Unless the consuming application installs a tracer, every span is a no-op
//! and costs a single read lock. The provider is process-wide; swapping it is
//! safe against concurrent span starts.

use std::sync::{Arc, OnceLock, RwLock};

use crate::context::Context;

/// Attribute keys are namespaced so they stay distinguishable when exported
/// alongside application spans.
const ATTRIBUTE_NAMESPACE: &str = "osquery-sdk";

/// Instrumentation version reported with every span. Comes from build
/// metadata; the fallback matches a build stripped of package metadata.
pub fn instrumentation_version() -> &'static str {
    option_env!("CARGO_PKG_VERSION").unwrap_or("0.0.0")
}

/// A started span. Ended explicitly or when the guard drops.
pub trait Span: Send {
    fn end(&mut self);
}

/// Creates spans. Implement this to bridge into a real tracing backend.
pub trait Tracer: Send + Sync {
    /// `attributes` are already namespaced key/value pairs.
    fn start_span(&self, name: &str, attributes: &[(String, String)]) -> Box<dyn Span>;
}

struct NoopSpan;

impl Span for NoopSpan {
    fn end(&mut self) {}
}

struct NoopTracer;

impl Tracer for NoopTracer {
    fn start_span(&self, _name: &str, _attributes: &[(String, String)]) -> Box<dyn Span> {
        Box::new(NoopSpan)
    }
}

fn provider() -> &'static RwLock<Arc<dyn Tracer>> {
    static PROVIDER: OnceLock<RwLock<Arc<dyn Tracer>>> = OnceLock::new();
    PROVIDER.get_or_init(|| RwLock::new(Arc::new(NoopTracer)))
}

/// Replaces the process-wide tracer. Spans started before the swap keep the
/// old provider; spans started after use the new one.
pub fn set_tracer(tracer: Arc<dyn Tracer>) {
    let mut guard = match provider().write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    *guard = tracer;
}

/// Ends the underlying span exactly once, on [`SpanGuard::end`] or drop.
pub struct SpanGuard {
    span: Option<Box<dyn Span>>,
}

impl SpanGuard {
    pub fn end(mut self) {
        if let Some(mut span) = self.span.take() {
            span.end();
        }
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        if let Some(mut span) = self.span.take() {
            span.end();
        }
    }
}

/// Starts a span named `name` with namespaced string attributes.
///
/// The returned context should be passed to nested calls; the guard must be
/// kept alive for the duration of the traced work.
pub fn start_span(ctx: &Context, name: &str, key_vals: &[(&str, &str)]) -> (Context, SpanGuard) {
    let attributes: Vec<(String, String)> = key_vals
        .iter()
        .map(|(key, value)| (format!("{ATTRIBUTE_NAMESPACE}.{key}"), value.to_string()))
        .collect();

    let tracer = {
        let guard = match provider().read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(&*guard)
    };
    let span = tracer.start_span(name, &attributes);

    (ctx.clone(), SpanGuard { span: Some(span) })
}
