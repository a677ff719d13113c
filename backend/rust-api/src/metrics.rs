use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter_vec, register_int_gauge,
    CounterVec, Encoder, HistogramVec, IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Cache Metrics (Redis)
    pub static ref CACHE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cache_operations_total",
        "Total number of cache operations",
        &["operation", "status"]
    )
    .unwrap();

    pub static ref CACHE_HIT_RATIO: CounterVec = register_counter_vec!(
        "cache_hit_ratio",
        "Cache hit/miss ratio",
        &["result"]
    )
    .unwrap();

    pub static ref CACHE_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "cache_operation_duration_seconds",
        "Cache operation duration in seconds",
        &["operation"],
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1]
    )
    .unwrap();

    // Business Metrics
    pub static ref PRACTICE_EXAMS_STARTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "practice_exams_started_total",
        "Total number of practice exams served",
        &["exam_type"]
    )
    .unwrap();

    pub static ref PRACTICE_EXAM_REJECTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "practice_exam_rejections_total",
        "Practice exam requests rejected, by reason",
        &["reason"]
    )
    .unwrap();

    pub static ref TASK_POOL_REFRESHES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "task_pool_refreshes_total",
        "Task pool rebuilds from the authoritative store",
        &["slot", "exam_type"]
    )
    .unwrap();

    // Kept separate from other rejection reasons so content-provisioning gaps
    // stand out in monitoring.
    pub static ref TASK_POOL_EMPTY_TOTAL: IntCounterVec = register_int_counter_vec!(
        "task_pool_empty_total",
        "Selections that found an empty task pool",
        &["slot", "exam_type"]
    )
    .unwrap();

    pub static ref SESSIONS_LOCKED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "sessions_locked_total",
        "Session lock acquisitions",
        &["outcome"]
    )
    .unwrap();

    pub static ref SESSIONS_ACTIVE: IntGauge = register_int_gauge!(
        "sessions_active",
        "Number of currently locked exam sessions"
    )
    .unwrap();

    pub static ref EVALUATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "evaluations_total",
        "Evaluation results computed",
        &["kind"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Helper: track cache operation with metrics
pub async fn track_cache_operation<F, T>(operation: &str, future: F) -> Result<T, anyhow::Error>
where
    F: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    CACHE_OPERATIONS_TOTAL
        .with_label_values(&[operation, status])
        .inc();

    CACHE_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(duration);

    result
}

/// Record cache hit
pub fn record_cache_hit() {
    CACHE_HIT_RATIO.with_label_values(&["hit"]).inc();
}

/// Record cache miss
pub fn record_cache_miss() {
    CACHE_HIT_RATIO.with_label_values(&["miss"]).inc();
}
