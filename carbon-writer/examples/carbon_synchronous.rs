use std::{
    thread,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use carbon_writer::{config::Setting, CarbonBuilder, Sample};

fn main() {
    tracing_subscriber::fmt::init();

    let settings = [
        Setting::new("LineReceiverHost", ["localhost"]),
        Setting::new("LineReceiverPort", ["2003"]),
        Setting::new("MetricPrefix", ["collectd"]),
        Setting::flag("DifferentiateCountersOverTime"),
    ];

    let writer = CarbonBuilder::from_settings(&settings)
        .expect("failed to parse settings")
        .with_type_definitions("load shortterm:GAUGE:0:5000, midterm:GAUGE:0:5000, longterm:GAUGE:0:5000")
        .with_type_definitions("if_octets rx:DERIVE:0:U, tx:DERIVE:0:U")
        .build()
        .expect("failed to build Carbon writer");

    let mut rx_bytes = 0.0;
    let mut tx_bytes = 0.0;

    // Loop over and over, pretending to collect some samples every 10 seconds or so.
    loop {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs());

        rx_bytes += 1_500_000.0;
        tx_bytes += 250_000.0;

        let samples = [
            Sample::new("web01.example.com", "load", "load", now, vec![0.42, 0.38, 0.35]),
            Sample::new("web01.example.com", "interface", "if_octets", now, vec![rx_bytes, tx_bytes])
                .with_plugin_instance("eth0"),
        ];

        let summary = writer.write_batch(&samples);
        println!("sent {} lines, dropped {} samples", summary.lines_sent, summary.samples_dropped);

        thread::sleep(Duration::from_secs(10));
    }
}
