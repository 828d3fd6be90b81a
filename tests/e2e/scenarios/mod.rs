mod crash_recovery;
mod fixtures_and_helpers;
mod happy_path;
mod payment_gate;
mod retry_policy;
mod state_transitions;
