use ahash::AHashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{OnceLock, PoisonError, RwLock};

// Metric names shared by the server and the upstream adapters.
pub const HTTP_REQUESTS_TOTAL: &str = "api_requests_total";
pub const HTTP_REQUEST_DURATION: &str = "api_request_duration_seconds";
pub const UPSTREAM_REQUESTS_TOTAL: &str = "upstream_requests_total";
pub const UPSTREAM_REQUEST_DURATION: &str = "upstream_request_duration_seconds";
pub const BOARD_INITIATIVES: &str = "board_initiatives";

// ---------------------------------------------------------------------------
// Histogram
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<f64>,
    counts: Vec<AtomicU64>,
    sum_bits: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    pub fn new(buckets: Vec<f64>) -> Self {
        let counts = buckets.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            buckets,
            counts,
            sum_bits: AtomicU64::new(0f64.to_bits()),
            count: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, value: f64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        // f64 has no atomic add; CAS on the bit pattern.
        let _ = self
            .sum_bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits) + value).to_bits())
            });
        for (boundary, count) in self.buckets.iter().zip(&self.counts) {
            if value <= *boundary {
                count.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn sum(&self) -> f64 {
        f64::from_bits(self.sum_bits.load(Ordering::Relaxed))
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// `(upper_bound, observations <= upper_bound)` pairs.
    fn cumulative(&self) -> impl Iterator<Item = (f64, u64)> + '_ {
        self.buckets
            .iter()
            .zip(&self.counts)
            .map(|(b, c)| (*b, c.load(Ordering::Relaxed)))
    }
}

/// Upstream calls run for seconds, not milliseconds, so the buckets reach 30s.
fn default_duration_buckets() -> Vec<f64> {
    vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
}

// ---------------------------------------------------------------------------
// Labels
// ---------------------------------------------------------------------------

/// Sorted key/value pairs distinguishing series within a family.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Labels(Vec<(String, String)>);

impl Labels {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        let mut v: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        v.sort();
        Self(v)
    }

    /// `{key="value",...}`, or the empty string when there are no labels.
    pub fn prometheus_str(&self) -> String {
        if self.0.is_empty() {
            return String::new();
        }
        let inner: Vec<String> = self
            .0
            .iter()
            .map(|(k, v)| format!("{k}=\"{}\"", escape_label(v)))
            .collect();
        format!("{{{}}}", inner.join(","))
    }
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

// ---------------------------------------------------------------------------
// MetricsCollector
// ---------------------------------------------------------------------------

type SeriesKey = (String, Labels);

/// Process-local metrics registry.
///
/// Series are registered lazily on first use. Values are atomics, so the
/// write lock is only taken when a new series appears.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    counters: RwLock<AHashMap<SeriesKey, AtomicU64>>,
    gauges: RwLock<AHashMap<String, AtomicI64>>,
    histograms: RwLock<AHashMap<SeriesKey, Histogram>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Counters -----------------------------------------------------------

    pub fn increment_counter(&self, name: &str, labels: &[(&str, &str)]) {
        self.increment_counter_by(name, labels, 1);
    }

    pub fn increment_counter_by(&self, name: &str, labels: &[(&str, &str)], amount: u64) {
        let key = (name.to_string(), Labels::new(labels));
        {
            let map = self.counters.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(c) = map.get(&key) {
                c.fetch_add(amount, Ordering::Relaxed);
                return;
            }
        }
        let mut map = self.counters.write().unwrap_or_else(PoisonError::into_inner);
        map.entry(key)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(amount, Ordering::Relaxed);
    }

    pub fn get_counter(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        let key = (name.to_string(), Labels::new(labels));
        let map = self.counters.read().unwrap_or_else(PoisonError::into_inner);
        map.get(&key).map(|c| c.load(Ordering::Relaxed)).unwrap_or(0)
    }

    // -- Gauges -------------------------------------------------------------

    pub fn set_gauge(&self, name: &str, value: i64) {
        {
            let map = self.gauges.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(g) = map.get(name) {
                g.store(value, Ordering::Relaxed);
                return;
            }
        }
        let mut map = self.gauges.write().unwrap_or_else(PoisonError::into_inner);
        map.entry(name.to_string())
            .or_insert_with(|| AtomicI64::new(0))
            .store(value, Ordering::Relaxed);
    }

    pub fn get_gauge(&self, name: &str) -> i64 {
        let map = self.gauges.read().unwrap_or_else(PoisonError::into_inner);
        map.get(name).map(|g| g.load(Ordering::Relaxed)).unwrap_or(0)
    }

    // -- Histograms ---------------------------------------------------------

    /// Record a duration-like value. New series get the default buckets.
    pub fn record_histogram(&self, name: &str, labels: &[(&str, &str)], value: f64) {
        let key = (name.to_string(), Labels::new(labels));
        {
            let map = self.histograms.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(h) = map.get(&key) {
                h.observe(value);
                return;
            }
        }
        let mut map = self.histograms.write().unwrap_or_else(PoisonError::into_inner);
        map.entry(key)
            .or_insert_with(|| Histogram::new(default_duration_buckets()))
            .observe(value);
    }

    pub fn histogram_count(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        let key = (name.to_string(), Labels::new(labels));
        let map = self.histograms.read().unwrap_or_else(PoisonError::into_inner);
        map.get(&key).map(Histogram::count).unwrap_or(0)
    }

    // -- Export --------------------------------------------------------------

    /// Prometheus text exposition format, families sorted by name.
    pub fn export_prometheus(&self) -> String {
        let mut out = String::new();

        {
            let map = self.counters.read().unwrap_or_else(PoisonError::into_inner);
            let mut series: Vec<(&SeriesKey, u64)> = map
                .iter()
                .map(|(k, v)| (k, v.load(Ordering::Relaxed)))
                .collect();
            series.sort_by(|a, b| a.0.cmp(b.0));
            let mut last_family: Option<&str> = None;
            for ((name, labels), value) in series {
                if last_family != Some(name.as_str()) {
                    out.push_str(&format!("# TYPE {name} counter\n"));
                    last_family = Some(name.as_str());
                }
                out.push_str(&format!("{name}{} {value}\n", labels.prometheus_str()));
            }
        }

        {
            let map = self.gauges.read().unwrap_or_else(PoisonError::into_inner);
            let mut names: Vec<&String> = map.keys().collect();
            names.sort();
            for name in names {
                let value = map[name].load(Ordering::Relaxed);
                out.push_str(&format!("# TYPE {name} gauge\n{name} {value}\n"));
            }
        }

        {
            let map = self.histograms.read().unwrap_or_else(PoisonError::into_inner);
            let mut keys: Vec<&SeriesKey> = map.keys().collect();
            keys.sort();
            let mut last_family: Option<&str> = None;
            for key in keys {
                let (name, labels) = key;
                let h = &map[key];
                if last_family != Some(name.as_str()) {
                    out.push_str(&format!("# TYPE {name} histogram\n"));
                    last_family = Some(name.as_str());
                }
                for (le, count) in h.cumulative() {
                    let le = le.to_string();
                    let bucket_labels = with_le(labels, &le);
                    out.push_str(&format!("{name}_bucket{bucket_labels} {count}\n"));
                }
                let inf = with_le(labels, "+Inf");
                out.push_str(&format!("{name}_bucket{inf} {}\n", h.count()));
                out.push_str(&format!("{name}_sum{} {}\n", labels.prometheus_str(), h.sum()));
                out.push_str(&format!(
                    "{name}_count{} {}\n",
                    labels.prometheus_str(),
                    h.count()
                ));
            }
        }

        out
    }

    /// Same data as [`export_prometheus`](Self::export_prometheus), as JSON.
    pub fn export_json(&self) -> serde_json::Value {
        let mut counters = serde_json::Map::new();
        {
            let map = self.counters.read().unwrap_or_else(PoisonError::into_inner);
            for ((name, labels), value) in map.iter() {
                counters.insert(
                    format!("{name}{}", labels.prometheus_str()),
                    serde_json::json!(value.load(Ordering::Relaxed)),
                );
            }
        }

        let mut gauges = serde_json::Map::new();
        {
            let map = self.gauges.read().unwrap_or_else(PoisonError::into_inner);
            for (name, value) in map.iter() {
                gauges.insert(name.clone(), serde_json::json!(value.load(Ordering::Relaxed)));
            }
        }

        let mut histograms = serde_json::Map::new();
        {
            let map = self.histograms.read().unwrap_or_else(PoisonError::into_inner);
            for ((name, labels), h) in map.iter() {
                let buckets: Vec<serde_json::Value> = h
                    .cumulative()
                    .map(|(le, count)| serde_json::json!({ "le": le, "count": count }))
                    .collect();
                histograms.insert(
                    format!("{name}{}", labels.prometheus_str()),
                    serde_json::json!({
                        "buckets": buckets,
                        "sum": h.sum(),
                        "count": h.count(),
                    }),
                );
            }
        }

        serde_json::json!({
            "counters": counters,
            "gauges": gauges,
            "histograms": histograms,
        })
    }
}

fn with_le(labels: &Labels, le: &str) -> String {
    let mut pairs: Vec<(&str, &str)> = labels
        .0
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    pairs.push(("le", le));
    Labels::new(&pairs).prometheus_str()
}

/// The process-wide collector.
pub fn global_metrics() -> &'static MetricsCollector {
    static INSTANCE: OnceLock<MetricsCollector> = OnceLock::new();
    INSTANCE.get_or_init(MetricsCollector::new)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
