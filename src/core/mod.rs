//! 核心共享层：计划类型、构建器、错误分类、不可信输出校验

pub mod builder;
pub mod error;
pub mod types;
pub mod validate;

pub use builder::PlanBuilder;
pub use error::OrchestratorError;
pub use types::{
    ExecutionStrategy, PlanStatus, ReflectionResult, Task, TaskPlan, TaskStatus,
};
pub use validate::{
    extract_json_array, extract_json_object, parse_llm_array, parse_llm_object, Validated,
};
