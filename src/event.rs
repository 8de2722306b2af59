use r2r::rcl_interfaces::msg;

/// A parameter change seen on `/parameter_events`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterEvent {
    pub node: String,
    pub new_parameters: Vec<String>,
    pub changed_parameters: Vec<String>,
    pub deleted_parameters: Vec<String>,
}

impl From<msg::ParameterEvent> for ParameterEvent {
    fn from(event: msg::ParameterEvent) -> Self {
        let names = |params: Vec<msg::Parameter>| params.into_iter().map(|p| p.name).collect();
        ParameterEvent {
            node: event.node,
            new_parameters: names(event.new_parameters),
            changed_parameters: names(event.changed_parameters),
            deleted_parameters: names(event.deleted_parameters),
        }
    }
}
