//! 递归处理轨迹
//!
//! 记录一次顶层 execute 期间发起的全部模型调用（含父子关系与深度），
//! 纯观测用途：执行结束后冻结为 Trajectory，失败时也完整返回供诊断。

use std::sync::Mutex;

use serde::Serialize;

/// 单次调用状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Pending,
    Completed,
    Failed,
}

/// 一次模型调用（或一次扇出编排节点）的记录
#[derive(Debug, Clone, Serialize)]
pub struct RlmCall {
    pub id: String,
    /// prompt 前缀预览（完整 prompt 不入轨迹，控制内存）
    pub prompt_preview: String,
    pub depth: usize,
    pub parent_id: Option<String>,
    pub status: CallStatus,
    pub result_preview: Option<String>,
    pub error: Option<String>,
    pub started_at: i64,
    pub completed_at: Option<i64>,
}

/// 冻结后的执行轨迹
#[derive(Debug, Clone, Serialize)]
pub struct Trajectory {
    pub calls: Vec<RlmCall>,
    pub total_calls: usize,
    pub max_depth: usize,
    pub duration_ms: u64,
}

const PREVIEW_CHARS: usize = 200;

fn preview(text: &str) -> String {
    if text.chars().count() > PREVIEW_CHARS {
        format!("{}...", text.chars().take(PREVIEW_CHARS).collect::<String>())
    } else {
        text.to_string()
    }
}

/// 执行期间的轨迹累加器；并发分支共享，结束时 finish 冻结
#[derive(Default)]
pub struct TrajectoryRecorder {
    calls: Mutex<Vec<RlmCall>>,
}

impl TrajectoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一次调用开始，返回调用 ID
    pub fn begin(&self, prompt: &str, depth: usize, parent_id: Option<&str>) -> String {
        let id = format!("call_{}", uuid::Uuid::new_v4());
        let call = RlmCall {
            id: id.clone(),
            prompt_preview: preview(prompt),
            depth,
            parent_id: parent_id.map(String::from),
            status: CallStatus::Pending,
            result_preview: None,
            error: None,
            started_at: chrono::Utc::now().timestamp_millis(),
            completed_at: None,
        };
        self.calls.lock().expect("trajectory lock poisoned").push(call);
        id
    }

    pub fn complete(&self, id: &str, result: &str) {
        let mut calls = self.calls.lock().expect("trajectory lock poisoned");
        if let Some(call) = calls.iter_mut().find(|c| c.id == id) {
            call.status = CallStatus::Completed;
            call.result_preview = Some(preview(result));
            call.completed_at = Some(chrono::Utc::now().timestamp_millis());
        }
    }

    pub fn fail(&self, id: &str, error: &str) {
        let mut calls = self.calls.lock().expect("trajectory lock poisoned");
        if let Some(call) = calls.iter_mut().find(|c| c.id == id) {
            call.status = CallStatus::Failed;
            call.error = Some(error.to_string());
            call.completed_at = Some(chrono::Utc::now().timestamp_millis());
        }
    }

    /// 冻结为不可变轨迹
    pub fn finish(self, duration_ms: u64) -> Trajectory {
        let calls = self.calls.into_inner().expect("trajectory lock poisoned");
        let total_calls = calls.len();
        let max_depth = calls.iter().map(|c| c.depth).max().unwrap_or(0);
        Trajectory {
            calls,
            total_calls,
            max_depth,
            duration_ms,
        }
    }
}
