/// Execution classes used for worker scheduling and observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// The serialized control loop: reconciliation passes and container calls.
	Control,
	/// Helper tasks that feed the control loop (timers, pumps, supervisors).
	Background,
}

impl TaskClass {
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::Control => "control",
			Self::Background => "background",
		}
	}
}
