use color_eyre::Result;

mod config;
mod event;
mod probe;
mod ros;
mod service;

use config::ProbeConfig;
use probe::LatencyProbe;
use ros::RosParameterService;

// Subscribing before the declare gives a couple of events at ~80ms,
// subscribing after it gives a single event at ~3000ms.
const ORDERINGS: [bool; 2] = [false, true];

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let probe = LatencyProbe::new(ProbeConfig::default());
    probe
        .run_trials(&ORDERINGS, RosParameterService::create)
        .await?;

    Ok(())
}
