//! 控制端 <-> Worker 消息协议
//!
//! 入站：`{"start": ProblemInput}`、`"resume"`、`"rungen"`、`"finish"`；
//! 出站：`{"progress": ..}`、`{"success": ..}`、`{"error": ..}`。每条入站消息恰好对应一条出站消息。

mod message;

pub use message::{
    Action, ErrorReport, FinishReport, Inbound, Outbound, ProblemInput, SolverSettings, StepReport,
};
