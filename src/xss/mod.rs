// XPROBE XSS Module
// Reflection analysis, exploitability rules, WAF handling and verification

pub mod context;
pub mod dom;
pub mod mutate;
pub mod payloads;
pub mod probe;
pub mod reflect;
pub mod tamper;
pub mod validate;
pub mod verify;
pub mod waf;

// Re-export types
pub use context::ContextKind;
pub use dom::{analyze_dom, DomSinkHint};
pub use probe::{ParameterProbe, PayloadSender, ProbeOutcome};
pub use reflect::{find_reflections, ReflectionMatch};
pub use validate::{best_exploitable, is_exploitable, Confidence, Rule};
pub use verify::VerificationPass;
pub use waf::{BlockGuard, WafProfile};
