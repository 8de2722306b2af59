use color_eyre::Result;
use r2r::ParameterValue;

use crate::event::ParameterEvent;

/// Invoked once per received parameter event, never concurrently.
pub type EventCallback = Box<dyn FnMut(&ParameterEvent) + Send + 'static>;

/// The parts of a parameter-aware middleware client the probe needs.
///
/// `declare_parameter` and `set_parameters` are fire-and-forget: their effect
/// is only observed through the event callback.
#[allow(async_fn_in_trait)]
pub trait ParameterService {
    /// Keeps the callback registered while alive.
    type Subscription;

    fn declare_parameter(&mut self, name: &str, default: ParameterValue) -> Result<()>;

    fn set_parameters(&mut self, params: Vec<(String, ParameterValue)>) -> Result<()>;

    fn subscribe_to_parameter_events(&mut self, callback: EventCallback)
        -> Result<Self::Subscription>;

    /// Dispatches callbacks until the process is asked to stop.
    async fn run_event_loop(&mut self) -> Result<()>;
}
