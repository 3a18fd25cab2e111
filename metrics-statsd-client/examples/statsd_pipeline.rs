use std::time::Duration;

use metrics_statsd_client::{MetricEmitter, StatsdClientBuilder};

fn main() {
    tracing_subscriber::fmt::init();

    let mut client = StatsdClientBuilder::default()
        .with_remote_address("localhost", 8125)
        .with_prefix("example")
        .with_respect_ttl(true)
        .build()
        .expect("failed to build StatsD client");

    // Loop over and over, pretending to do some work.
    loop {
        client.incr("loops");

        let result = client.time("work", || {
            std::thread::sleep(Duration::from_millis(50));
            42
        });

        let mut pipeline = client.pipeline();
        pipeline.gauge("last_result", f64::from(result));
        pipeline.gauge_delta("in_flight", 1.0);
        pipeline.gauge_delta("in_flight", -1.0);
        pipeline.set("workers", "worker-1");
        let flushed = pipeline.flush();
        tracing::info!(packets_sent = flushed.packets_sent(), packets_dropped = flushed.packets_dropped(), "Flushed.");
        drop(pipeline);

        tracing::info!(stats = ?client.stats(), "Client stats.");
        std::thread::sleep(Duration::from_secs(1));
    }
}
