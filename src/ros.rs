use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use color_eyre::{
    eyre::{eyre, WrapErr},
    Result,
};
use futures::{future, stream::StreamExt};
use r2r::{
    rcl_interfaces::{msg, srv::SetParameters},
    Parameter, ParameterValue, QosProfile,
};
use tokio::task::{self, JoinHandle};

use crate::{
    config::ProbeConfig,
    event::ParameterEvent,
    service::{EventCallback, ParameterService},
};

const PARAMETER_EVENTS: &str = "/parameter_events";

/// Aborts the event task when dropped.
pub struct SubscriptionHandle(JoinHandle<()>);

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Tasks tied to one service; all are aborted when it is dropped.
#[derive(Default)]
struct BackgroundTasks {
    tasks: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    fn spawn<F>(&mut self, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.tasks.retain(|task| !task.is_finished());
        self.tasks.push(task::spawn(future));
    }
}

impl Drop for BackgroundTasks {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// One ROS 2 context and node, with its parameter services running.
pub struct RosParameterService {
    // Dropped first, before the node goes away.
    tasks: BackgroundTasks,
    config: ProbeConfig,
    node: Arc<Mutex<r2r::Node>>,
    events: Arc<r2r::Publisher<msg::ParameterEvent>>,
    client: r2r::Client<SetParameters::Service>,
}

impl RosParameterService {
    /// Must be called from within a tokio runtime.
    pub fn create(config: &ProbeConfig) -> Result<RosParameterService> {
        let ctx = r2r::Context::create().wrap_err("initializing ROS context")?;
        let mut node = r2r::Node::create(ctx, &config.node_name, &config.namespace)
            .wrap_err_with(|| format!("creating node {}", config.node_path()))?;

        let events = Arc::new(
            node.create_publisher::<msg::ParameterEvent>(PARAMETER_EVENTS, QosProfile::default())?,
        );
        let client = node.create_client::<SetParameters::Service>(
            &config.set_parameters_service(),
            QosProfile::default(),
        )?;

        let mut tasks = BackgroundTasks::default();
        let (handler, changes) = node.make_parameter_handler()?;
        tasks.spawn(handler);

        // The parameter services apply the change; announce it like a declare does.
        let publisher = events.clone();
        let node_path = config.node_path();
        let logger = config.logger.clone();
        tasks.spawn(changes.for_each(move |(name, value)| {
            let event = msg::ParameterEvent {
                node: node_path.clone(),
                changed_parameters: vec![parameter_msg(&name, &value)],
                ..Default::default()
            };
            if let Err(e) = publisher.publish(&event) {
                r2r::log_error!(logger.as_str(), "Failed to publish change of {}: {}", name, e);
            }
            future::ready(())
        }));

        Ok(RosParameterService {
            tasks,
            config: config.clone(),
            node: Arc::new(Mutex::new(node)),
            events,
            client,
        })
    }

    fn publish(&self, event: msg::ParameterEvent) -> Result<()> {
        self.events
            .publish(&event)
            .wrap_err("publishing parameter event")
    }
}

impl ParameterService for RosParameterService {
    type Subscription = SubscriptionHandle;

    fn declare_parameter(&mut self, name: &str, default: ParameterValue) -> Result<()> {
        let params = self.node.lock().unwrap().params.clone();
        {
            let mut params = params.lock().unwrap();
            if params.contains_key(name) {
                return Err(eyre!("parameter {} is already declared", name));
            }
            params.insert(name.to_string(), Parameter::new(default.clone()));
        }

        self.publish(msg::ParameterEvent {
            node: self.config.node_path(),
            new_parameters: vec![parameter_msg(name, &default)],
            ..Default::default()
        })
    }

    fn set_parameters(&mut self, params: Vec<(String, ParameterValue)>) -> Result<()> {
        let request = SetParameters::Request {
            parameters: params
                .iter()
                .map(|(name, value)| parameter_msg(name, value))
                .collect(),
        };
        let response = self
            .client
            .request(&request)
            .wrap_err("sending set_parameters request")?;

        let logger = self.config.logger.clone();
        self.tasks.spawn(async move {
            match response.await {
                Ok(response) => {
                    for result in response.results.iter().filter(|r| !r.successful) {
                        r2r::log_error!(logger.as_str(), "Parameter rejected: {}", result.reason);
                    }
                }
                Err(e) => r2r::log_error!(logger.as_str(), "set_parameters failed: {}", e),
            }
        });

        Ok(())
    }

    fn subscribe_to_parameter_events(
        &mut self,
        mut callback: EventCallback,
    ) -> Result<SubscriptionHandle> {
        let events = self
            .node
            .lock()
            .unwrap()
            .subscribe::<msg::ParameterEvent>(PARAMETER_EVENTS, QosProfile::default())?;

        let task = task::spawn(events.for_each(move |event| {
            callback(&ParameterEvent::from(event));
            future::ready(())
        }));
        Ok(SubscriptionHandle(task))
    }

    async fn run_event_loop(&mut self) -> Result<()> {
        let running = Arc::new(AtomicBool::new(true));

        let node = self.node.clone();
        let period = self.config.spin_period;
        let spinning = running.clone();
        let spinner = task::spawn_blocking(move || {
            while spinning.load(Ordering::Relaxed) {
                node.lock().unwrap().spin_once(period);
            }
        });

        tokio::signal::ctrl_c()
            .await
            .wrap_err("waiting for shutdown signal")?;
        running.store(false, Ordering::Relaxed);
        spinner.await?;

        Ok(())
    }
}

fn parameter_msg(name: &str, value: &ParameterValue) -> msg::Parameter {
    msg::Parameter {
        name: name.to_string(),
        value: value_msg(value),
    }
}

fn value_msg(value: &ParameterValue) -> msg::ParameterValue {
    let mut out = msg::ParameterValue::default();
    match value {
        ParameterValue::NotSet => out.type_ = msg::ParameterType::PARAMETER_NOT_SET,
        ParameterValue::Bool(v) => {
            out.type_ = msg::ParameterType::PARAMETER_BOOL;
            out.bool_value = *v;
        }
        ParameterValue::Integer(v) => {
            out.type_ = msg::ParameterType::PARAMETER_INTEGER;
            out.integer_value = *v;
        }
        ParameterValue::Double(v) => {
            out.type_ = msg::ParameterType::PARAMETER_DOUBLE;
            out.double_value = *v;
        }
        ParameterValue::String(v) => {
            out.type_ = msg::ParameterType::PARAMETER_STRING;
            out.string_value = v.clone();
        }
        ParameterValue::ByteArray(v) => {
            out.type_ = msg::ParameterType::PARAMETER_BYTE_ARRAY;
            out.byte_array_value = v.clone();
        }
        ParameterValue::BoolArray(v) => {
            out.type_ = msg::ParameterType::PARAMETER_BOOL_ARRAY;
            out.bool_array_value = v.clone();
        }
        ParameterValue::IntegerArray(v) => {
            out.type_ = msg::ParameterType::PARAMETER_INTEGER_ARRAY;
            out.integer_array_value = v.clone();
        }
        ParameterValue::DoubleArray(v) => {
            out.type_ = msg::ParameterType::PARAMETER_DOUBLE_ARRAY;
            out.double_array_value = v.clone();
        }
        ParameterValue::StringArray(v) => {
            out.type_ = msg::ParameterType::PARAMETER_STRING_ARRAY;
            out.string_array_value = v.clone();
        }
    }
    out
}
