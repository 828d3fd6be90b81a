use crate::harness::clock::MockClock;
use crate::harness::workspace::Fixture;
use crate::harness::{Assertion, Scenario, StateMatch};
use forge_core::BuildReport;

const TINY_OUTPUT: &str = "=== FILE: app/page.tsx ===
export default function Page() {
  return <main>Hello</main>
}
=== END FILE ===