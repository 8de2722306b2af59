use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use color_eyre::Result;

use crate::{
    config::ProbeConfig,
    event::ParameterEvent,
    service::{EventCallback, ParameterService},
};

pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Where the probe writes its report lines.
pub trait LogSink: Send + Sync + 'static {
    fn info(&self, line: &str);
    fn debug(&self, line: &str);
}

/// ROS logging under a named logger.
#[derive(Debug, Clone)]
pub struct RosLog {
    logger: String,
}

impl RosLog {
    pub fn new(logger: impl Into<String>) -> RosLog {
        RosLog {
            logger: logger.into(),
        }
    }
}

impl LogSink for RosLog {
    fn info(&self, line: &str) {
        r2r::log_info!(self.logger.as_str(), "{}", line);
    }

    fn debug(&self, line: &str) {
        r2r::log_debug!(self.logger.as_str(), "{}", line);
    }
}

/// State of one run, shared between the probe and its event callback.
#[derive(Debug)]
struct Trial {
    start: Option<Instant>,
    latencies: Vec<Duration>,
}

impl Trial {
    fn new() -> Trial {
        Trial {
            start: None,
            latencies: vec![],
        }
    }

    /// Events that arrive before `start` is captured count as zero latency.
    fn record(&mut self, at: Instant) -> Duration {
        let elapsed = self
            .start
            .map(|start| at.saturating_duration_since(start))
            .unwrap_or_default();
        self.latencies.push(elapsed);
        elapsed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrialReport {
    pub declare_before_subscribe: bool,
    pub latencies: Vec<Duration>,
}

pub fn banner(declare_before_subscribe: bool) -> &'static str {
    if declare_before_subscribe {
        "Running declare _before_ subscribe"
    } else {
        "Running declare _after_ subscribe"
    }
}

pub fn event_line(elapsed: Duration) -> String {
    format!("Got event {} ms after set", elapsed.as_millis())
}

pub fn summary_line(report: &TrialReport) -> String {
    format!(
        "Trial finished with {} event(s) (declare before subscribe: {})",
        report.latencies.len(),
        report.declare_before_subscribe
    )
}

pub struct LatencyProbe<C = SystemClock, L = RosLog> {
    config: ProbeConfig,
    clock: Arc<C>,
    log: Arc<L>,
}

impl LatencyProbe {
    pub fn new(config: ProbeConfig) -> LatencyProbe {
        LatencyProbe::with_clock(config, SystemClock)
    }
}

impl<C: Clock> LatencyProbe<C> {
    pub fn with_clock(config: ProbeConfig, clock: C) -> LatencyProbe<C> {
        let log = RosLog::new(config.logger.clone());
        LatencyProbe {
            config,
            clock: Arc::new(clock),
            log: Arc::new(log),
        }
    }
}

impl<C: Clock, L: LogSink> LatencyProbe<C, L> {
    pub fn with_log<M: LogSink>(self, log: M) -> LatencyProbe<C, M> {
        LatencyProbe {
            config: self.config,
            clock: self.clock,
            log: Arc::new(log),
        }
    }

    /// Runs one trial per ordering, each on a service freshly built by `connect`.
    ///
    /// The service is dropped before the next one is connected.
    pub async fn run_trials<S, F>(&self, orderings: &[bool], mut connect: F) -> Result<Vec<TrialReport>>
    where
        S: ParameterService,
        F: FnMut(&ProbeConfig) -> Result<S>,
    {
        let mut reports = vec![];

        for &declare_before_subscribe in orderings {
            self.log.info(banner(declare_before_subscribe));

            let mut service = connect(&self.config)?;
            let report = self.run(declare_before_subscribe, &mut service).await?;

            self.log.info(&summary_line(&report));
            reports.push(report);
        }

        Ok(reports)
    }

    /// Runs one trial on `service` and blocks in its event loop until it returns.
    pub async fn run<S: ParameterService>(
        &self,
        declare_before_subscribe: bool,
        service: &mut S,
    ) -> Result<TrialReport> {
        let name = self.config.param_name.clone();

        if declare_before_subscribe {
            service.declare_parameter(&name, self.config.default_value.clone())?;
        }

        let trial = Arc::new(Mutex::new(Trial::new()));
        let subscription = service.subscribe_to_parameter_events(self.on_event(trial.clone()))?;

        let start = self.clock.now();
        trial.lock().unwrap().start = Some(start);

        if !declare_before_subscribe {
            service.declare_parameter(&name, self.config.default_value.clone())?;
        }

        service.set_parameters(vec![(name, self.config.set_value.clone())])?;

        service.run_event_loop().await?;
        drop(subscription);

        let latencies = trial.lock().unwrap().latencies.clone();
        Ok(TrialReport {
            declare_before_subscribe,
            latencies,
        })
    }

    fn on_event(&self, trial: Arc<Mutex<Trial>>) -> EventCallback {
        let clock = self.clock.clone();
        let log = self.log.clone();

        Box::new(move |event: &ParameterEvent| {
            let elapsed = trial.lock().unwrap().record(clock.now());
            log.debug(&format!("Event from {}", event.node));
            log.info(&event_line(elapsed));
        })
    }
}
