//! Application services for task lifecycle orchestration.

mod events;
mod lifecycle;

pub use events::TaskEvent;
pub use lifecycle::{
    CreateSubTaskRequest, CreateTaskRequest, TaskLifecycleError, TaskLifecycleResult, TaskLifecycleService,
};
