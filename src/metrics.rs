//! Process-wide pipeline counters
//!
//! Plain atomic counters rendered in Prometheus text exposition format by
//! the `/metrics` handler. Initialized once, shared freely.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counter
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

pub static REQUESTS_TOTAL: Counter = Counter::new();
pub static REQUESTS_SUCCESS: Counter = Counter::new();
pub static REQUESTS_FAILED: Counter = Counter::new();
pub static LLM_CALLS_TOTAL: Counter = Counter::new();
pub static LLM_ERRORS_TOTAL: Counter = Counter::new();
pub static LLM_TOKENS_USED: Counter = Counter::new();
pub static CACHE_HITS: Counter = Counter::new();
pub static CACHE_MISSES: Counter = Counter::new();

/// Render all counters in Prometheus text exposition format
pub fn render() -> String {
    let counters: [(&str, &str, &Counter); 8] = [
        ("nlp_requests_total", "Total number of analysis requests", &REQUESTS_TOTAL),
        ("nlp_requests_success_total", "Total number of successful requests", &REQUESTS_SUCCESS),
        ("nlp_requests_failed_total", "Total number of failed requests", &REQUESTS_FAILED),
        ("nlp_llm_calls_total", "Total number of LLM API calls", &LLM_CALLS_TOTAL),
        ("nlp_llm_errors_total", "Total number of LLM errors", &LLM_ERRORS_TOTAL),
        ("nlp_llm_tokens_used_total", "Total tokens used by LLM", &LLM_TOKENS_USED),
        ("nlp_cache_hits_total", "Total number of cache hits", &CACHE_HITS),
        ("nlp_cache_misses_total", "Total number of cache misses", &CACHE_MISSES),
    ];

    let mut out = String::new();
    for (name, help, counter) in counters {
        out.push_str(&format!("# HELP {name} {help}\n"));
        out.push_str(&format!("# TYPE {name} counter\n"));
        out.push_str(&format!("{name} {}\n", counter.get()));
    }
    out
}
