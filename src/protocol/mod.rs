//! Text protocol spoken by the external SDD tool.
//!
//! The tool's only interface is unstructured stdout text, versioned but
//! undocumented. This module turns that text into typed results: one stable
//! internal schema per result type, decoded by an ordered list of pattern
//! matchers tried newest-first. Every decoder is a pure function of one
//! captured stdout string; decoding never has side effects and never
//! retries.

mod decode;
mod results;

pub use decode::{
    decode_agents, decode_decompose, decode_map, decode_plan, decode_prompt, decode_spec,
    decode_task, decode_verify, decode_workflow_guidance, decode_workflow_status, DecodeError,
};
pub use results::{
    AgentInfo, AgentStatus, DecomposeResult, MapResult, PlanResult, SpecResult, TaskInfo,
    TaskResult, TaskState, VerifyResult, VerifyStatus, WorkflowGuidance, WorkflowStatus,
};
