use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    pub compile_requests: IntCounter,
    pub compile_outcomes: IntCounterVec,
    pub artifacts_reclaimed: IntCounter,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("emcc_sandboxd".into()), None)?;

        let compile_requests =
            IntCounter::new("compile_requests", "Number of compile requests received")?;
        let compile_outcomes = IntCounterVec::new(
            Opts::new("compile_outcomes", "Compile requests by terminal outcome"),
            &["outcome"],
        )?;
        let artifacts_reclaimed = IntCounter::new(
            "artifacts_reclaimed",
            "Number of artifact directories deleted by the reclaimer",
        )?;

        registry.register(Box::new(compile_requests.clone()))?;
        registry.register(Box::new(compile_outcomes.clone()))?;
        registry.register(Box::new(artifacts_reclaimed.clone()))?;

        Ok(Self {
            registry,
            compile_requests,
            compile_outcomes,
            artifacts_reclaimed,
        })
    }

    pub fn outcome(&self, outcome: &str) {
        self.compile_outcomes.with_label_values(&[outcome]).inc();
    }

    pub fn encode(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_the_exposition() {
        let metrics = Metrics::new().unwrap();
        metrics.compile_requests.inc();
        metrics.outcome("success");

        let text = metrics.encode().unwrap();
        assert!(text.contains("emcc_sandboxd_compile_requests 1"));
        assert!(text.contains("outcome=\"success\""));
    }
}
