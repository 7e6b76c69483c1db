// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers for one user-facing goal:
// training a model, or re-evaluating a saved one.
//
// No model math lives here, only workflow coordination.
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// The training workflow
pub mod train_use_case;

// Test-split evaluation of a saved checkpoint
pub mod evaluate_use_case;
