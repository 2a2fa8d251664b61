//! Performance benchmarks for Flowpilot.
//!
//! This module contains benchmarks for:
//! - Decoder throughput over small and large tool outputs
//! - Task queue decoding as the queue grows
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use flowpilot::protocol::{
    decode_agents, decode_decompose, decode_plan, decode_verify, decode_workflow_status,
};

// ============================================================================
// Mock Data Fixtures
// ============================================================================

mod fixtures {
    /// Generate a task queue listing with `num_tasks` entries.
    pub fn generate_task_queue(num_tasks: usize) -> String {
        let glyphs = ["⬜", "🔄", "✅", "❌"];
        let mut out = String::from("# Task Queue: plan-benchmark.md\n\n");
        for i in 0..num_tasks {
            out.push_str(&format!(
                "## {} task-{}: Implement component number {}\n",
                glyphs[i % glyphs.len()],
                i + 1,
                i + 1
            ));
        }
        out
    }

    /// Generate an agents listing with `num_agents` entries.
    pub fn generate_agents(num_agents: usize) -> String {
        let mut out = String::new();
        for i in 0..num_agents {
            if i % 2 == 0 {
                out.push_str(&format!("- **Agent {}**: ✅ Available\n", i + 1));
            } else {
                out.push_str(&format!("- **Agent {}**: ❌ Not installed\n", i + 1));
            }
        }
        out.push_str("Install: `npm install -g some-agent`\n");
        out
    }

    pub const PLAN_OUTPUT: &str =
        "Created plan: /project/sdd-planning/plans/plan-2024-03-01-benchmark.md\n\
         To fill this plan, run:\n  sdd prompt plan plan-2024-03-01-benchmark.md\n";

    pub const VERIFY_OUTPUT: &str = "Report saved: /project/verify-2024-03-01.md\n\
         **Status**: ✅ passed\n\
         **Checks**: 12/14\n";

    pub const WORKFLOW_OUTPUT: &str = "# Workflow Status: wf-42\n\
         **Name**: benchmark\n\
         **Current Phase**: execution\n\n\
         Spec: /project/SPEC.md\n\
         Plan: /project/plan.md\n\
         Tasks: /project/tasks.md\n\
         Verification: (none)\n\n\
         Suggested next phase: **verification**\n\
         17 transitions recorded\n";
}

// ============================================================================
// Decoder Benchmarks
// ============================================================================

fn bench_simple_decoders(c: &mut Criterion) {
    let mut group = c.benchmark_group("decoders");

    group.bench_function("decode_plan", |b| {
        b.iter(|| decode_plan(black_box(fixtures::PLAN_OUTPUT)));
    });

    group.bench_function("decode_verify", |b| {
        b.iter(|| decode_verify(black_box(fixtures::VERIFY_OUTPUT)));
    });

    group.bench_function("decode_workflow_status", |b| {
        b.iter(|| decode_workflow_status(black_box(fixtures::WORKFLOW_OUTPUT)));
    });

    group.finish();
}

fn bench_task_queue_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("task_queue");

    for num_tasks in [10, 100, 1000] {
        let input = fixtures::generate_task_queue(num_tasks);
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(num_tasks),
            &input,
            |b, input| {
                b.iter(|| decode_decompose(black_box(input)));
            },
        );
    }

    group.finish();
}

fn bench_agents_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("agents");

    for num_agents in [5, 50] {
        let input = fixtures::generate_agents(num_agents);
        group.bench_with_input(
            BenchmarkId::from_parameter(num_agents),
            &input,
            |b, input| {
                b.iter(|| decode_agents(black_box(input)));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_simple_decoders, bench_task_queue_scaling, bench_agents_scaling);
criterion_main!(benches);
